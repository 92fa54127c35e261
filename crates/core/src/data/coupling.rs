use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::Tolerance;
use crate::time::{ExtrapolationOrder, Storage, Waveform, WaveformError};

use super::{DataError, DataId, Field, Mesh, MeshId};

/// Whether the local participant writes or reads a coupling data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Send,
    Receive,
}

/// Per-data options a scheme derives from its configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataSettings {
    /// Index of the remote partner this data is exchanged with.
    pub partner: usize,
    pub requires_initialization: bool,
    pub interpolation_order: usize,
    pub extrapolation: ExtrapolationOrder,
    pub tolerance: Tolerance,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            partner: 0,
            requires_initialization: false,
            interpolation_order: 0,
            extrapolation: ExtrapolationOrder::Constant,
            tolerance: Tolerance::default(),
        }
    }
}

/// One exchanged field as seen by a coupling scheme.
///
/// Wraps the host's [`Field`] buffer and a weak reference to its [`Mesh`].
/// Adds the previous iterate used by convergence measures and acceleration,
/// the current window's [`Waveform`] and the end values of recently finished
/// windows.
#[derive(Debug)]
pub struct CouplingData {
    field: Rc<Field>,
    mesh: Weak<Mesh>,
    mesh_id: MeshId,
    direction: Direction,
    settings: DataSettings,
    previous_iteration: Array1<f64>,
    waveform: Waveform,
    history: VecDeque<Array1<f64>>,
}

impl CouplingData {
    /// Wraps `field` living on `mesh`.
    ///
    /// # Errors
    ///
    /// Fails if the interpolation order is not supported.
    pub fn new(
        field: Rc<Field>,
        mesh: &Rc<Mesh>,
        direction: Direction,
        settings: DataSettings,
    ) -> Result<Self, DataError> {
        let waveform = Waveform::new(settings.interpolation_order, settings.tolerance).map_err(
            |source| DataError::Waveform {
                id: field.id(),
                source,
            },
        )?;
        let previous_iteration = field.values();
        Ok(Self {
            mesh: Rc::downgrade(mesh),
            mesh_id: mesh.id(),
            field,
            direction,
            settings,
            previous_iteration,
            waveform,
            history: VecDeque::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> DataId {
        self.field.id()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.field.name()
    }

    #[must_use]
    pub fn field(&self) -> &Rc<Field> {
        &self.field
    }

    #[must_use]
    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    /// The mesh, if the host still holds it.
    #[must_use]
    pub fn mesh(&self) -> Option<Rc<Mesh>> {
        self.mesh.upgrade()
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn partner(&self) -> usize {
        self.settings.partner
    }

    #[must_use]
    pub fn requires_initialization(&self) -> bool {
        self.settings.requires_initialization
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.field.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.field.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> Array1<f64> {
        self.field.values()
    }

    /// Overwrites the buffer, e.g. with an accelerated iterate.
    ///
    /// # Errors
    ///
    /// Fails if `values` has the wrong length.
    pub fn set_values(&self, values: Array1<f64>) -> Result<(), DataError> {
        self.field.write(values)
    }

    #[must_use]
    pub fn previous_iteration(&self) -> &Array1<f64> {
        &self.previous_iteration
    }

    /// Remembers the current values as the previous iterate.
    pub fn store_iteration(&mut self) {
        self.previous_iteration = self.field.values();
    }

    #[must_use]
    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        self.waveform.storage()
    }

    /// End values of the most recently finished windows, newest last.
    ///
    /// Holds at most `extrapolation order + 1` entries.
    #[must_use]
    pub fn window_history(&self) -> &VecDeque<Array1<f64>> {
        &self.history
    }

    /// Seeds the time history with the current buffer and stores it as the
    /// previous iterate.
    pub fn initialize_storage(&mut self) {
        self.waveform.storage_mut().initialize(self.field.sample());
        self.store_iteration();
    }

    /// Stores the current buffer at normalized time `time`.
    ///
    /// A write at or before the latest stored time starts a new pass
    /// through the window and trims the history back to its start.
    ///
    /// # Errors
    ///
    /// Fails if `time` lies outside the window.
    pub fn store_sample(&mut self, time: f64) -> Result<(), DataError> {
        let id = self.id();
        let tolerance = self.settings.tolerance;
        let storage = self.waveform.storage_mut();
        if let Some(latest) = storage.max_stored_time() {
            if !tolerance.greater(time, latest) {
                storage.trim();
            }
        }
        storage
            .set_sample_at_time(time, self.field.sample())
            .map_err(|source| DataError::Storage { id, source })
    }

    /// Writes values received from a partner into the buffer and the window
    /// end of the time history.
    ///
    /// # Errors
    ///
    /// Fails if `values` has the wrong length.
    pub fn store_received(&mut self, values: Array1<f64>) -> Result<(), DataError> {
        self.field.write(values)?;
        self.store_sample(Storage::WINDOW_END)
    }

    /// Writes received initial values, seeding both window anchors.
    ///
    /// # Errors
    ///
    /// Fails if `values` has the wrong length.
    pub fn store_initial(&mut self, values: Array1<f64>) -> Result<(), DataError> {
        self.field.write(values)?;
        self.initialize_storage();
        Ok(())
    }

    /// Rolls the time history into the next window and loads the
    /// extrapolated seed into the buffer.
    ///
    /// # Errors
    ///
    /// Fails if the current window has no end sample.
    pub fn move_to_next_window(&mut self) -> Result<(), DataError> {
        if let Some(end) = self.storage().latest() {
            self.history.push_back(end.values.clone());
            while self.history.len() > self.settings.extrapolation.order() + 1 {
                self.history.pop_front();
            }
        }

        let id = self.id();
        let order = self.settings.extrapolation;
        self.waveform
            .storage_mut()
            .move_to_next_window(order)
            .map_err(|source| DataError::Storage { id, source })?;

        let seed = self
            .storage()
            .latest()
            .cloned()
            .unwrap_or_else(|| self.field.sample());
        self.field.write_sample(seed)
    }

    /// Reconstructs the values at normalized time `time` of this window.
    ///
    /// # Errors
    ///
    /// Fails if `time` cannot be sampled.
    pub fn sample(&self, time: f64) -> Result<Array1<f64>, DataError> {
        self.waveform
            .sample(time)
            .map_err(|source: WaveformError| DataError::Waveform {
                id: self.id(),
                source,
            })
    }
}
