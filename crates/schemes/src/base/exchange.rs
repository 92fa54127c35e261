use lockstep_core::{Channel, DataId, Direction, MeshId};
use tracing::{debug, trace};

use super::{BaseScheme, WindowSizeExchange};
use crate::Error;

impl BaseScheme {
    /// Ids exchanged with `partner` in `direction`, in wire order.
    fn exchange_order(&self, direction: Direction, partner: usize, initial_only: bool) -> Vec<DataId> {
        let mut ids: Vec<DataId> = self
            .data
            .values()
            .filter(|data| data.direction() == direction && data.partner() == partner)
            .filter(|data| !initial_only || data.requires_initialization())
            .map(|data| data.id())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn send_data(&self, channel: &mut dyn Channel, partner: usize) -> Result<(), Error> {
        for id in self.exchange_order(Direction::Send, partner, false) {
            let data = self.data.get(&id).ok_or(Error::UnknownData(id))?;
            trace!(data = %id, mesh = %data.mesh_id(), "sending values");
            channel.send_values(id, data.mesh_id(), data.values().view())?;
        }
        Ok(())
    }

    pub(crate) fn receive_data(
        &mut self,
        channel: &mut dyn Channel,
        partner: usize,
    ) -> Result<(), Error> {
        for id in self.exchange_order(Direction::Receive, partner, false) {
            let data = self.data.get_mut(&id).ok_or(Error::UnknownData(id))?;
            let values = channel.receive_values(id, data.mesh_id(), data.len())?;
            trace!(data = %id, "received values");
            data.store_received(values)?;
        }
        self.data_received = true;
        Ok(())
    }

    /// Sends the values written before `initialize_data`, seeding the local
    /// time history with them first.
    pub(crate) fn send_initial_data(
        &mut self,
        channel: &mut dyn Channel,
        partner: usize,
    ) -> Result<(), Error> {
        for id in self.exchange_order(Direction::Send, partner, true) {
            let data = self.data.get_mut(&id).ok_or(Error::UnknownData(id))?;
            data.initialize_storage();
            debug!(data = %id, "sending initial values");
            channel.send_values(id, data.mesh_id(), data.values().view())?;
        }
        Ok(())
    }

    pub(crate) fn receive_initial_data(
        &mut self,
        channel: &mut dyn Channel,
        partner: usize,
    ) -> Result<(), Error> {
        for id in self.exchange_order(Direction::Receive, partner, true) {
            let data = self.data.get_mut(&id).ok_or(Error::UnknownData(id))?;
            let values = channel.receive_values(id, data.mesh_id(), data.len())?;
            debug!(data = %id, "received initial values");
            data.store_initial(values)?;
        }
        Ok(())
    }

    pub(crate) fn send_convergence(&self, channel: &mut dyn Channel) -> Result<(), Error> {
        channel.send_flag(self.converged)?;
        Ok(())
    }

    pub(crate) fn receive_convergence(&mut self, channel: &mut dyn Channel) -> Result<(), Error> {
        self.converged = channel.receive_flag()?;
        trace!(converged = self.converged, "received convergence");
        Ok(())
    }

    /// Sends the length of the window just computed, if we define it.
    pub(crate) fn send_window_size(&self, channel: &mut dyn Channel) -> Result<(), Error> {
        if self.window_size_exchange == WindowSizeExchange::Sends {
            trace!(size = self.computed, "sending time window size");
            channel.send_scalar(self.computed)?;
        }
        Ok(())
    }

    pub(crate) fn receive_window_size(&mut self, channel: &mut dyn Channel) -> Result<(), Error> {
        if self.window_size_exchange == WindowSizeExchange::Receives {
            let size = channel.receive_scalar()?;
            if !size.is_finite() || !self.tolerance.greater(size, 0.0) {
                return Err(Error::InvalidWindowSize(size));
            }
            debug!(size, "received time window size");
            self.window_size = Some(size);
        }
        Ok(())
    }

    /// Mesh synchronization only happens at the end of a window.
    pub(crate) fn synchronizes_meshes(&self) -> bool {
        self.config.mesh_synchronization && self.reached_end_of_window()
    }

    pub(crate) fn send_changed_meshes(
        &self,
        channel: &mut dyn Channel,
        meshes: &[MeshId],
    ) -> Result<(), Error> {
        channel.send_mesh_ids(meshes)?;
        Ok(())
    }

    pub(crate) fn receive_changed_meshes(
        &self,
        channel: &mut dyn Channel,
    ) -> Result<Vec<MeshId>, Error> {
        Ok(channel.receive_mesh_ids()?)
    }
}
