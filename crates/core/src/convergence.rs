use ndarray::ArrayView1;

/// A criterion deciding whether an implicit window has converged.
///
/// A measure is bound to one coupling data. Each iteration it sees the
/// previous and the new iterate of that data; a measurement series spans one
/// window.
pub trait ConvergenceMeasure {
    /// Forgets the state of the finished window.
    fn new_measurement_series(&mut self);

    /// Evaluates one iterate.
    ///
    /// `design_specification` is the target offset of the residual
    /// `new - old`; it is zero unless an acceleration provides one.
    fn measure(
        &mut self,
        old: ArrayView1<'_, f64>,
        new: ArrayView1<'_, f64>,
        design_specification: ArrayView1<'_, f64>,
    );

    fn is_converged(&self) -> bool;

    /// Norm of the residual seen by the last measurement.
    fn norm_residual(&self) -> f64;

    /// A short line describing the last measurement, for logs.
    fn describe(&self) -> String;
}

impl<M: ConvergenceMeasure + ?Sized> ConvergenceMeasure for Box<M> {
    fn new_measurement_series(&mut self) {
        (**self).new_measurement_series();
    }

    fn measure(
        &mut self,
        old: ArrayView1<'_, f64>,
        new: ArrayView1<'_, f64>,
        design_specification: ArrayView1<'_, f64>,
    ) {
        (**self).measure(old, new, design_specification);
    }

    fn is_converged(&self) -> bool {
        (**self).is_converged()
    }

    fn norm_residual(&self) -> f64 {
        (**self).norm_residual()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
