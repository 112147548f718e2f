use std::time::Duration;

/// Result of a successful reconciliation pass.
///
/// Errors are returned as `Err` and retried by the dispatcher with its own
/// backoff; `RequeueAfter` asks for a fixed delay without signalling failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    RequeueAfter(Duration),
}

impl Outcome {
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Outcome::Done => None,
            Outcome::RequeueAfter(d) => Some(*d),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Done => write!(f, "done"),
            Outcome::RequeueAfter(d) => write!(f, "requeue after {}s", d.as_secs()),
        }
    }
}
