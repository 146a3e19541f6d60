//! Progress reporting and cooperative cancellation.

use crate::{Error, Result};
use log::info;
use parking_lot::Mutex;
use std::fmt;
use std::ops::BitOr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

type ProgressFn<'a> = &'a (dyn Fn(f64, &str) + Sync);

/// Handed to long running capabilities: a stop predicate, a cancel check
/// and a progress sink taking a percentage of the job.
#[derive(Clone, Copy)]
pub struct JobController<'a> {
    cancel: &'a CancelToken,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> JobController<'a> {
    pub fn new(cancel: &'a CancelToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_cancel(&self) -> Result<()> {
        self.cancel.check()
    }

    pub fn report(&self, percent: f64, message: &str) {
        if let Some(progress) = self.progress {
            progress(percent, message);
        }
    }
}

impl fmt::Debug for JobController<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobController")
            .field("stopped", &self.stopped())
            .finish()
    }
}

/// Hints for the consumer of status updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StatusFlags(u32);

impl StatusFlags {
    pub const DEFAULT: Self = Self(0);
    pub const RELOAD_SCENE: Self = Self(1);
    pub const RELOAD_SLA_SUPPORT_POINTS: Self = Self(2);
    pub const RELOAD_SLA_PREVIEW: Self = Self(4);

    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for StatusFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One status update.
#[derive(Clone, Debug, PartialEq)]
pub struct SlicingStatus {
    pub percent: u32,
    pub message: String,
    pub flags: StatusFlags,
}

pub type StatusCallback = Arc<dyn Fn(&SlicingStatus) + Send + Sync>;

/// Forwards status updates to an optional callback and remembers the last
/// reported percentage.
#[derive(Default)]
pub struct StatusReporter {
    callback: Option<StatusCallback>,
    current: Mutex<f64>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_callback(&mut self, callback: Option<StatusCallback>) {
        self.callback = callback;
    }

    pub fn current(&self) -> f64 {
        *self.current.lock()
    }

    pub fn set_status(&self, percent: f64, message: &str, flags: StatusFlags) {
        *self.current.lock() = percent;
        self.emit(percent, message, flags);
    }

    /// Re-send the current percentage with new flags.
    pub fn notify(&self, message: &str, flags: StatusFlags) {
        let percent = self.current();
        self.emit(percent, message, flags);
    }

    /// Report only when the rounded percentage moves forward.
    pub fn report_throttled(&self, percent: f64, message: &str) {
        {
            let mut current = self.current.lock();
            if current.round() >= percent.round() {
                return;
            }
            *current = percent;
        }
        self.emit(percent, message, StatusFlags::DEFAULT);
    }

    fn emit(&self, percent: f64, message: &str, flags: StatusFlags) {
        let status = SlicingStatus {
            percent: percent.round().clamp(0.0, 100.0) as u32,
            message: message.to_string(),
            flags,
        };
        if !message.is_empty() {
            info!("{}% => {}", status.percent, message);
        }
        if let Some(callback) = &self.callback {
            callback(&status);
        }
    }
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("has_callback", &self.callback.is_some())
            .field("current", &self.current())
            .finish()
    }
}
