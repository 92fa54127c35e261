use std::cell::RefCell;

use ndarray::{Array1, Array2};

use crate::time::Sample;

use super::{DataError, DataId};

/// A host-owned value buffer shared with the coupling scheme.
///
/// The host writes the values it computes and reads the values the scheme
/// received. Both sides hold an `Rc<Field>`; the buffer length never changes.
#[derive(Debug)]
pub struct Field {
    id: DataId,
    name: String,
    dimensions: usize,
    sample: RefCell<Sample>,
}

impl Field {
    #[must_use]
    pub fn new(id: DataId, name: impl Into<String>, dimensions: usize, values: Array1<f64>) -> Self {
        Self {
            id,
            name: name.into(),
            dimensions,
            sample: RefCell::new(Sample::new(values)),
        }
    }

    #[must_use]
    pub fn id(&self) -> DataId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components per vertex.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sample.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the current values.
    #[must_use]
    pub fn values(&self) -> Array1<f64> {
        self.sample.borrow().values.clone()
    }

    /// A copy of the current values and gradient.
    #[must_use]
    pub fn sample(&self) -> Sample {
        self.sample.borrow().clone()
    }

    /// Replaces the current values.
    ///
    /// # Errors
    ///
    /// Fails if `values` has a different length than the buffer.
    pub fn write(&self, values: Array1<f64>) -> Result<(), DataError> {
        self.check_len(values.len())?;
        self.sample.borrow_mut().values = values;
        Ok(())
    }

    /// Replaces values and gradient.
    ///
    /// # Errors
    ///
    /// Fails if the sample has a different length than the buffer.
    pub fn write_sample(&self, sample: Sample) -> Result<(), DataError> {
        self.check_len(sample.len())?;
        *self.sample.borrow_mut() = sample;
        Ok(())
    }

    pub fn set_gradient(&self, gradient: Option<Array2<f64>>) {
        self.sample.borrow_mut().gradient = gradient;
    }

    /// Edits the values in place.
    pub fn update(&self, edit: impl FnOnce(&mut Array1<f64>)) {
        edit(&mut self.sample.borrow_mut().values);
    }

    fn check_len(&self, found: usize) -> Result<(), DataError> {
        let expected = self.len();
        if found != expected {
            return Err(DataError::SizeMismatch {
                id: self.id,
                expected,
                found,
            });
        }
        Ok(())
    }
}
