use std::time::{Duration, Instant};

/// Token identifying one armed frame, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHandle(u64);

/// Animation scheduling port.
///
/// At most one frame is armed at a time: the render step arms the next frame
/// only after finishing its own paint, so slow frames delay the next tick
/// instead of queuing.
pub trait FrameScheduler {
    /// Arm the next frame. Replaces any previously armed frame.
    fn schedule(&mut self) -> FrameHandle;

    /// Disarm `handle` if it is still pending.
    fn cancel(&mut self, handle: FrameHandle);

    /// Block until the armed frame is due, consuming it. `None` when nothing
    /// is armed.
    fn wait_due(&mut self) -> Option<FrameHandle>;
}

/// Fixed-rate fallback scheduler: frames are due `floor(1000 / framerate)`
/// milliseconds apart, the degraded path when no native refresh signal
/// exists.
pub struct TimerScheduler {
    interval: Duration,
    pending: Option<(FrameHandle, Instant)>,
    next_id: u64,
}

impl TimerScheduler {
    pub fn new(framerate: u32) -> Self {
        Self {
            interval: Duration::from_millis(u64::from(1000 / framerate.max(1))),
            pending: None,
            next_id: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameScheduler for TimerScheduler {
    fn schedule(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending = Some((handle, Instant::now() + self.interval));
        handle
    }

    fn cancel(&mut self, handle: FrameHandle) {
        if self.pending.is_some_and(|(h, _)| h == handle) {
            self.pending = None;
        }
    }

    fn wait_due(&mut self) -> Option<FrameHandle> {
        let (handle, deadline) = self.pending.take()?;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        Some(handle)
    }
}

/// Scheduler whose frames are due immediately; drives tests and offline
/// rendering without wall-clock waits. Counts arms and cancels.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    pending: Option<FrameHandle>,
    next_id: u64,
    scheduled: u64,
    cancelled: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> u64 {
        self.scheduled
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule(&mut self) -> FrameHandle {
        self.next_id += 1;
        self.scheduled += 1;
        let handle = FrameHandle(self.next_id);
        self.pending = Some(handle);
        handle
    }

    fn cancel(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
            self.cancelled += 1;
        }
    }

    fn wait_due(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }
}
