use indexmap::IndexMap;
use lockstep_core::{ConvergenceMeasure, DataId, Storage};
use ndarray::Array1;
use tracing::{debug, warn};

use super::BaseScheme;
use crate::{ConfigError, Error};

/// A convergence measure bound to one coupling data.
pub(crate) struct MeasureSlot {
    pub(crate) data: DataId,
    /// Convergence of this measure alone ends the window.
    pub(crate) suffices: bool,
    pub(crate) measure: Box<dyn ConvergenceMeasure>,
}

impl BaseScheme {
    pub(super) fn initialize_implicit(&mut self) -> Result<(), Error> {
        if let Some(slot) = self
            .measures
            .iter()
            .find(|slot| !self.data.contains_key(&slot.data))
        {
            return Err(Error::UnknownData(slot.data));
        }
        if self.measures.is_empty() && self.config.max_iterations.is_none() {
            return Err(ConfigError::NoConvergenceCriterion.into());
        }
        if let Some(acceleration) = self.acceleration.as_mut() {
            if let Some(id) = acceleration
                .data_ids()
                .iter()
                .find(|id| !self.data.contains_key(*id))
            {
                return Err(Error::UnknownData(*id));
            }
            acceleration.initialize(&self.data)?;
        }
        Ok(())
    }

    /// Measures convergence of the current iterate and either closes the
    /// window or prepares the next iterate.
    ///
    /// Only the measuring side calls this; the other side learns the outcome
    /// through the convergence flag.
    pub(crate) fn implicit_step(&mut self) -> Result<bool, Error> {
        let design = self
            .acceleration
            .as_ref()
            .map(|acceleration| acceleration.design_specification(&self.data))
            .unwrap_or_default();
        let measured = self.measure_convergence(&design)?;

        let capped = self
            .config
            .max_iterations
            .is_some_and(|max| self.iterations >= max);
        if capped && !measured {
            warn!(
                window = self.time_windows,
                iterations = self.iterations,
                "max iterations reached without convergence"
            );
        }
        self.converged = measured || capped;

        if self.converged {
            if let Some(acceleration) = self.acceleration.as_mut() {
                acceleration.iterations_converged(&mut self.data)?;
            }
            for slot in &mut self.measures {
                slot.measure.new_measurement_series();
            }
            for data in self.data.values_mut() {
                data.store_iteration();
            }
            self.move_to_next_window()?;
        } else {
            if let Some(acceleration) = self.acceleration.as_mut() {
                acceleration.perform_acceleration(&mut self.data)?;
                // The accelerated buffer is what gets sent; keep the history in step.
                for id in acceleration.data_ids() {
                    let data = self.data.get_mut(id).ok_or(Error::UnknownData(*id))?;
                    data.store_sample(Storage::WINDOW_END)?;
                }
            }
            for data in self.data.values_mut() {
                data.store_iteration();
            }
        }
        Ok(self.converged)
    }

    /// All measures converged, or one converged measure suffices.
    fn measure_convergence(&mut self, design: &IndexMap<DataId, Array1<f64>>) -> Result<bool, Error> {
        if self.measures.is_empty() {
            return Ok(false);
        }
        let mut all = true;
        let mut sufficient = false;
        for slot in &mut self.measures {
            let data = self
                .data
                .get(&slot.data)
                .ok_or(Error::UnknownData(slot.data))?;
            let values = data.values();
            let offset = design
                .get(&slot.data)
                .cloned()
                .unwrap_or_else(|| Array1::zeros(values.len()));
            slot.measure
                .measure(data.previous_iteration().view(), values.view(), offset.view());

            let converged = slot.measure.is_converged();
            debug!(
                data = %slot.data,
                residual = slot.measure.norm_residual(),
                converged,
                "{}",
                slot.measure.describe()
            );
            all &= converged;
            sufficient |= converged && slot.suffices;
        }
        Ok(all || sufficient)
    }
}
