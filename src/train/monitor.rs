use std::sync::atomic::{AtomicBool, Ordering};

/// Statistics of one completed training iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// 1-based iteration number
    pub iteration: usize,
    /// Training objective after the iteration, when the algorithm has one
    pub objective: Option<f64>,
    /// Fraction of training events predicted correctly
    pub accuracy: Option<f64>,
}

/// Observer polled by trainers between iterations
///
/// A trainer never checks the monitor in the middle of an iteration. Once
/// [`TrainingMonitor::is_cancelled`] returns `true` the trainer stops before
/// the next iteration and builds the model from the last completed one.
pub trait TrainingMonitor: Send + Sync {
    fn is_cancelled(&self) -> bool {
        false
    }

    fn iteration_completed(&self, _report: &IterationReport) {}
}

impl TrainingMonitor for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}
