//! Progress reporting.
//!
//! Agglomeration and cluster extension announce themselves with
//! [`ProgressEvent::Describe`] and then send [`ProgressEvent::Increment`]s.
//! Matrix correlation is a single parallel pass and reports nothing. The core
//! never blocks on the receiver and does not support cancellation through
//! this channel.

/// A progress notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Clear any previous state.
    Reset,
    /// A new phase begins with `maximum` expected increments.
    Describe {
        /// Human-readable phase name.
        description: String,
        /// Number of increments expected for this phase.
        maximum: usize,
    },
    /// `n` more units of work completed.
    Increment(usize),
}

/// Receiver of progress events.
///
/// Implemented for any `Fn(ProgressEvent) + Send + Sync`, so a closure or a
/// channel sender wrapper can be passed directly.
pub trait Progress: Send + Sync {
    /// Handle one event.
    fn report(&self, event: ProgressEvent);
}

impl<F> Progress for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}
