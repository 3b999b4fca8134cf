use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::error::{ReelError, ReelResult};

/// Coarse export milestone for progress reporting. Advisory only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Preparing,
    Generating,
    Encoding,
    Finalizing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Preparing => "preparing",
            Self::Generating => "generating",
            Self::Encoding => "encoding",
            Self::Finalizing => "finalizing",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub percent: u8,
}

/// Handle for requesting cancellation of an in-flight export from another
/// thread. Cancellation is cooperative: the pipeline polls the flag at
/// frame boundaries and never preempts an in-flight encoder call.
#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

type ProgressFn = dyn Fn(ProgressUpdate) + Send + Sync;

/// Mutable state bound to one export invocation: the cancellation flag and
/// the progress sink. Created at export start, dropped at export end;
/// never shared between exports.
pub struct ExportSession {
    cancelled: Arc<AtomicBool>,
    progress: Option<Box<ProgressFn>>,
}

impl ExportSession {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    pub fn with_progress(f: impl Fn(ProgressUpdate) + Send + Sync + 'static) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: Some(Box::new(f)),
        }
    }

    /// Install (or replace) the progress sink after construction.
    pub fn set_progress(&mut self, f: impl Fn(ProgressUpdate) + Send + Sync + 'static) {
        self.progress = Some(Box::new(f));
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fails with `Cancelled` if cancellation was requested. Called at
    /// every cooperative suspension point in the pipeline.
    pub fn checkpoint(&self) -> ReelResult<()> {
        if self.is_cancelled() {
            Err(ReelError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn report(&self, phase: Phase, percent: u8) {
        if let Some(f) = &self.progress {
            f(ProgressUpdate {
                phase,
                percent: percent.min(100),
            });
        }
    }
}

impl Default for ExportSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportSession")
            .field("cancelled", &self.is_cancelled())
            .field("has_progress_sink", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn checkpoint_passes_until_cancelled() {
        let session = ExportSession::new();
        assert!(session.checkpoint().is_ok());

        let handle = session.cancel_handle();
        handle.cancel();
        assert!(session.is_cancelled());
        assert!(matches!(session.checkpoint(), Err(ReelError::Cancelled)));
    }

    #[test]
    fn handle_observes_cancellation_across_clones() {
        let session = ExportSession::new();
        let a = session.cancel_handle();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
        assert!(session.is_cancelled());
    }

    #[test]
    fn report_clamps_percent_and_reaches_sink() {
        let seen: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let session = ExportSession::with_progress(move |u| sink.lock().unwrap().push(u));

        session.report(Phase::Generating, 42);
        session.report(Phase::Encoding, 200);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].phase, Phase::Generating);
        assert_eq!(seen[0].percent, 42);
        assert_eq!(seen[1].percent, 100);
    }
}
