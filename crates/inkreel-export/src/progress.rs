//! Job state shared between the export worker and its observers.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of an export job. Moves forward only; the last three are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ExportStatus {
    Idle = 0,
    Encoding = 1,
    /// Encoder drained; the container is being finalized.
    Muxing = 2,
    Complete = 3,
    Error = 4,
    Cancelled = 5,
}

impl ExportStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExportStatus::Complete | ExportStatus::Error | ExportStatus::Cancelled
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ExportStatus::Encoding,
            2 => ExportStatus::Muxing,
            3 => ExportStatus::Complete,
            4 => ExportStatus::Error,
            5 => ExportStatus::Cancelled,
            _ => ExportStatus::Idle,
        }
    }
}

impl std::fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportStatus::Idle => "idle",
            ExportStatus::Encoding => "encoding",
            ExportStatus::Muxing => "muxing",
            ExportStatus::Complete => "complete",
            ExportStatus::Error => "error",
            ExportStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct ProgressState {
    status: AtomicU8,
    /// `f32` bits of the completed fraction.
    fraction: AtomicU32,
}

/// Pollable view of a job's status and completed fraction. Cheap to clone;
/// all clones observe the same job.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    state: Arc<ProgressState>,
}

impl ExportProgress {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ProgressState {
                status: AtomicU8::new(ExportStatus::Idle as u8),
                fraction: AtomicU32::new(0f32.to_bits()),
            }),
        }
    }

    pub fn status(&self) -> ExportStatus {
        ExportStatus::from_u8(self.state.status.load(Ordering::Acquire))
    }

    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        f32::from_bits(self.state.fraction.load(Ordering::Acquire))
    }

    /// Raise the fraction to `value` unless it is already higher. Returns the
    /// stored fraction.
    pub(crate) fn publish(&self, value: f32) -> f32 {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        match self
            .state
            .fraction
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (f32::from_bits(bits) < value).then(|| value.to_bits())
            }) {
            Ok(_) => value,
            Err(bits) => f32::from_bits(bits),
        }
    }

    /// Move to `next` if it is later than the current status and the current
    /// status is not terminal. Returns whether the status changed.
    pub(crate) fn advance(&self, next: ExportStatus) -> bool {
        self.state
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let current = ExportStatus::from_u8(current);
                (!current.is_terminal() && next > current).then_some(next as u8)
            })
            .is_ok()
    }
}

impl Default for ExportProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation flag, checked by the job once per frame.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic() {
        let progress = ExportProgress::new();
        assert_eq!(progress.publish(0.25), 0.25);
        assert_eq!(progress.publish(0.1), 0.25);
        assert_eq!(progress.fraction(), 0.25);
        assert_eq!(progress.publish(2.0), 1.0);
        assert_eq!(progress.publish(f32::NAN), 1.0);
    }

    #[test]
    fn test_status_moves_forward_only() {
        let progress = ExportProgress::new();
        assert_eq!(progress.status(), ExportStatus::Idle);
        assert!(progress.advance(ExportStatus::Encoding));
        assert!(!progress.advance(ExportStatus::Idle));
        assert!(progress.advance(ExportStatus::Muxing));
        assert!(progress.advance(ExportStatus::Complete));
        assert!(!progress.advance(ExportStatus::Error));
        assert!(!progress.advance(ExportStatus::Cancelled));
        assert_eq!(progress.status(), ExportStatus::Complete);
    }

    #[test]
    fn test_error_reachable_from_idle() {
        let progress = ExportProgress::new();
        assert!(progress.advance(ExportStatus::Error));
        assert!(progress.status().is_terminal());
        assert_eq!(progress.status().to_string(), "error");
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
