use lockstep_core::{Acceleration, AccelerationError, DataId, DataMap};
use tracing::debug;

/// Under-relaxation with a fixed factor `omega`:
/// `x = omega * x_new + (1 - omega) * x_previous`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRelaxation {
    omega: f64,
    data_ids: Vec<DataId>,
}

impl ConstantRelaxation {
    /// Relaxes the data listed in `data_ids` with factor `omega`.
    ///
    /// # Errors
    ///
    /// Fails unless `omega` lies within `(0, 1]`.
    pub fn new(omega: f64, data_ids: Vec<DataId>) -> Result<Self, AccelerationError> {
        if !(omega > 0.0 && omega <= 1.0) {
            return Err(AccelerationError::InvalidParameter(
                "relaxation factor must lie within (0, 1]",
            ));
        }
        Ok(Self { omega, data_ids })
    }

    #[must_use]
    pub fn omega(&self) -> f64 {
        self.omega
    }
}

impl Acceleration for ConstantRelaxation {
    fn data_ids(&self) -> &[DataId] {
        &self.data_ids
    }

    fn initialize(&mut self, data: &DataMap) -> Result<(), AccelerationError> {
        match self.data_ids.iter().find(|id| !data.contains_key(*id)) {
            Some(missing) => Err(AccelerationError::MissingData(*missing)),
            None => Ok(()),
        }
    }

    fn perform_acceleration(&mut self, data: &mut DataMap) -> Result<(), AccelerationError> {
        for id in &self.data_ids {
            let coupling = data.get(id).ok_or(AccelerationError::MissingData(*id))?;
            let relaxed =
                coupling.values() * self.omega + coupling.previous_iteration() * (1.0 - self.omega);
            coupling.set_values(relaxed)?;
        }
        debug!(omega = self.omega, "applied constant relaxation");
        Ok(())
    }

    fn iterations_converged(&mut self, _data: &mut DataMap) -> Result<(), AccelerationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc::Rc;

    use approx::assert_relative_eq;
    use lockstep_core::{CouplingData, DataSettings, Direction, Field, Mesh, MeshId};
    use ndarray::array;

    fn data_map(field: &Rc<Field>, mesh: &Rc<Mesh>) -> DataMap {
        let mut data = CouplingData::new(
            Rc::clone(field),
            mesh,
            Direction::Send,
            DataSettings::default(),
        )
        .expect("valid settings");
        data.initialize_storage();
        let mut map = DataMap::new();
        map.insert(field.id(), data);
        map
    }

    #[test]
    fn blends_new_and_previous_iterate() {
        let mesh = Rc::new(Mesh::new(MeshId(0), "Interface", 2));
        let field = Rc::new(Field::new(DataId(1), "Displacements", 1, array![0.0, 4.0]));
        let mut map = data_map(&field, &mesh);

        let mut relaxation = ConstantRelaxation::new(0.5, vec![DataId(1)]).expect("valid omega");
        relaxation.initialize(&map).expect("data present");

        field.write(array![2.0, 2.0]).expect("length");
        relaxation
            .perform_acceleration(&mut map)
            .expect("relaxation succeeds");

        let values = field.values();
        assert_relative_eq!(values[0], 1.0);
        assert_relative_eq!(values[1], 3.0);
    }

    #[test]
    fn reports_missing_data() {
        let mesh = Rc::new(Mesh::new(MeshId(0), "Interface", 2));
        let field = Rc::new(Field::new(DataId(1), "Displacements", 1, array![0.0]));
        let map = data_map(&field, &mesh);

        let mut relaxation = ConstantRelaxation::new(0.5, vec![DataId(9)]).expect("valid omega");
        assert!(matches!(
            relaxation.initialize(&map),
            Err(AccelerationError::MissingData(DataId(9)))
        ));
    }

    #[test]
    fn omega_must_be_a_fraction() {
        assert!(ConstantRelaxation::new(0.0, vec![]).is_err());
        assert!(ConstantRelaxation::new(1.2, vec![]).is_err());
        assert!(ConstantRelaxation::new(1.0, vec![]).is_ok());
    }
}
