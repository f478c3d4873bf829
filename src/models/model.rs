use crate::domain::{Signal, TimeSeriesData, TracerClass};
use crate::prior::PriorTable;

/// A closed-form kinetic model.
///
/// Implementations are pure: `signal` depends only on its arguments, so one
/// model value can be shared by every worker of a fan-out.
pub trait ForwardModel: Send + Sync {
    /// Short identifier used in logs and artifact names.
    fn name(&self) -> &'static str;

    /// Parameter labels, in vector order. The last one is always the noise scale.
    fn labels(&self) -> &'static [&'static str];

    fn ndim(&self) -> usize {
        self.labels().len()
    }

    /// Prior ranges for this model and tracer family.
    fn prior_table(&self, tracer: TracerClass) -> PriorTable;

    /// Evaluate the model.
    ///
    /// # Panics
    /// May panic if `params.len() < self.ndim()`; callers check the length.
    fn signal(&self, params: &[f64], data: &TimeSeriesData) -> Signal;
}
