//! One controller iterating with several partners at once.
//!
//! The controller merges the data of all partners into one map, so a single
//! set of measures and one acceleration see every exchanged quantity. Each
//! partner runs a [`ParallelScheme`](crate::ParallelScheme) as the first
//! participant against the controller.

use std::rc::Rc;

use lockstep_core::{Acceleration, Channel, ConvergenceMeasure, DataId, Direction, Field, Mesh, MeshId};
use tracing::debug;

use crate::base::{BaseScheme, WindowSizeExchange, delegate_to_base};
use crate::{
    ChangedMeshes, Config, ConfigError, CouplingScheme, Error, SchemeState, TimeWindowSize,
    WindowReport,
};

struct Partner {
    name: String,
    channel: Box<dyn Channel>,
}

pub struct MultiScheme {
    base: BaseScheme,
    local: String,
    partners: Vec<Partner>,
}

impl MultiScheme {
    /// Creates the controller `local` talking to `partners` in the given
    /// order.
    ///
    /// # Errors
    ///
    /// Fails unless `config` is valid and implicit with a fixed window size,
    /// or if a partner is named twice or after the controller.
    pub fn new(
        config: Config,
        local: impl Into<String>,
        partners: Vec<(String, Box<dyn Channel>)>,
    ) -> Result<Self, Error> {
        if !config.is_implicit() {
            return Err(ConfigError::ExplicitUnsupported("multi").into());
        }
        if config.time_window_size == TimeWindowSize::FirstParticipant {
            return Err(ConfigError::FirstParticipantUnsupported("multi").into());
        }
        let local = local.into();
        let mut seen = vec![local.as_str()];
        for (name, _) in &partners {
            if seen.contains(&name.as_str()) {
                return Err(ConfigError::SameParticipant(name.clone()).into());
            }
            seen.push(name);
        }

        let base = BaseScheme::new(config, WindowSizeExchange::None, true)?;
        let partners = partners
            .into_iter()
            .map(|(name, channel)| Partner { name, channel })
            .collect();
        Ok(Self {
            base,
            local,
            partners,
        })
    }

    fn partner_index(&self, partner: &str) -> Result<usize, Error> {
        self.partners
            .iter()
            .position(|p| p.name == partner)
            .ok_or_else(|| Error::UnknownPartner(partner.to_owned()))
    }

    /// # Errors
    ///
    /// Fails for an unknown partner, after `initialize` or for duplicate data.
    pub fn add_data_to_send(
        &mut self,
        field: Rc<Field>,
        mesh: &Rc<Mesh>,
        requires_initialization: bool,
        partner: &str,
    ) -> Result<(), Error> {
        let index = self.partner_index(partner)?;
        self.base
            .add_data(field, mesh, Direction::Send, index, requires_initialization)
    }

    /// # Errors
    ///
    /// Fails for an unknown partner, after `initialize` or for duplicate data.
    pub fn add_data_to_receive(
        &mut self,
        field: Rc<Field>,
        mesh: &Rc<Mesh>,
        requires_initialization: bool,
        partner: &str,
    ) -> Result<(), Error> {
        let index = self.partner_index(partner)?;
        self.base
            .add_data(field, mesh, Direction::Receive, index, requires_initialization)
    }

    /// # Errors
    ///
    /// Fails after `initialize`.
    pub fn add_convergence_measure(
        &mut self,
        data: DataId,
        suffices: bool,
        measure: impl ConvergenceMeasure + 'static,
    ) -> Result<(), Error> {
        self.base.add_measure_boxed(data, suffices, Box::new(measure))
    }

    pub fn set_acceleration(&mut self, acceleration: impl Acceleration + 'static) {
        self.base.set_acceleration(Box::new(acceleration));
    }

    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        self.base.config()
    }

    #[must_use]
    pub fn total_iterations(&self) -> usize {
        self.base.total_iterations()
    }

    #[must_use]
    pub fn window_reports(&self) -> &[WindowReport] {
        self.base.window_reports()
    }

    #[must_use]
    pub fn state(&self) -> SchemeState {
        self.base.state()
    }

    pub fn apply_state(&mut self, state: &SchemeState) {
        self.base.apply_state(state);
    }
}

impl CouplingScheme for MultiScheme {
    delegate_to_base!();

    fn initialize(&mut self, start_time: f64, start_window: usize) -> Result<(), Error> {
        self.base.initialize(start_time, start_window)?;
        debug!(partners = self.partners.len(), "multi coupling scheme ready");
        Ok(())
    }

    fn initialize_data(&mut self) -> Result<(), Error> {
        if !self.base.begin_initialize_data()? {
            return Ok(());
        }
        for (index, partner) in self.partners.iter_mut().enumerate() {
            self.base
                .receive_initial_data(&mut *partner.channel, index)?;
        }
        for (index, partner) in self.partners.iter_mut().enumerate() {
            self.base.send_initial_data(&mut *partner.channel, index)?;
        }
        self.base.finish_initialize_data();
        Ok(())
    }

    fn first_synchronization(&mut self, local_changes: &[MeshId]) -> Result<ChangedMeshes, Error> {
        if !self.base.synchronizes_meshes() {
            return Ok(ChangedMeshes::new());
        }
        let mut remote = ChangedMeshes::new();
        for partner in &mut self.partners {
            remote.extend(self.base.receive_changed_meshes(&mut *partner.channel)?);
        }
        for partner in &mut self.partners {
            self.base
                .send_changed_meshes(&mut *partner.channel, local_changes)?;
        }
        remote.sort_unstable();
        remote.dedup();
        Ok(remote)
    }

    fn first_exchange(&mut self) -> Result<(), Error> {
        self.base.begin_advance()?;
        if !self.base.reached_end_of_window() {
            return Ok(());
        }
        self.base.store_window_end()?;
        for (index, partner) in self.partners.iter_mut().enumerate() {
            self.base.receive_data(&mut *partner.channel, index)?;
        }
        self.base.implicit_step()?;
        Ok(())
    }

    fn second_synchronization(&mut self) -> Result<ChangedMeshes, Error> {
        Ok(ChangedMeshes::new())
    }

    fn second_exchange(&mut self) -> Result<(), Error> {
        self.base.begin_second_exchange()?;
        if !self.base.reached_end_of_window() {
            return Ok(());
        }
        for (index, partner) in self.partners.iter_mut().enumerate() {
            self.base.send_convergence(&mut *partner.channel)?;
            self.base.send_data(&mut *partner.channel, index)?;
        }
        self.base.finish_iteration();
        Ok(())
    }

    fn coupling_partners(&self) -> Vec<String> {
        self.partners.iter().map(|p| p.name.clone()).collect()
    }
}
