//! Frame and timer scheduling
//!
//! The controller has exactly two suspension points: one pending animation
//! frame and one self-rescheduling refresh timer. Both go through
//! [`FrameScheduler`]. The browser host maps them onto
//! `requestAnimationFrame`/`setTimeout`; [`ManualScheduler`] lets tests and the
//! CLI step frames and virtual time explicitly.

use std::cell::RefCell;
use std::mem;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a pending timeout
    pub struct TimerId;
}

/// One-shot scheduled callback
pub type FrameCallback = Box<dyn FnOnce()>;

/// Host scheduling primitives
pub trait FrameScheduler {
    /// Run `callback` before the next repaint
    fn request_frame(&self, callback: FrameCallback);

    /// Run `callback` once after `delay_ms`
    fn set_timeout(&self, delay_ms: u32, callback: FrameCallback) -> TimerId;

    /// Cancel a pending timeout; fired or unknown ids are ignored
    fn clear_timeout(&self, id: TimerId);

    /// Monotonic milliseconds, used for event timestamps
    fn now_ms(&self) -> f64;
}

// ============================================================================
// Manual Scheduler
// ============================================================================

struct PendingTimer {
    due: f64,
    seq: u64,
    callback: FrameCallback,
}

#[derive(Default)]
struct ManualInner {
    now: f64,
    seq: u64,
    frames: Vec<FrameCallback>,
    timers: SlotMap<TimerId, PendingTimer>,
}

/// Deterministic scheduler driven by the caller
///
/// Frames queue up until [`run_frame`](Self::run_frame); timers fire in due
/// order while [`advance`](Self::advance) moves the virtual clock. Callbacks
/// always run with no internal borrow held, so they may schedule more work.
#[derive(Default)]
pub struct ManualScheduler {
    inner: RefCell<ManualInner>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frame callbacks waiting for the next frame
    pub fn pending_frames(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    /// Number of timers not yet fired
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Run every frame callback queued so far
    ///
    /// Callbacks requested while the frame runs wait for the next frame.
    /// Returns the number of callbacks run.
    pub fn run_frame(&self) -> usize {
        let frames = mem::take(&mut self.inner.borrow_mut().frames);
        let count = frames.len();
        for callback in frames {
            callback();
        }
        count
    }

    /// Move the clock forward, firing due timers in order
    ///
    /// Timers scheduled by a firing timer run within the same call when they
    /// fall due before the new time.
    pub fn advance(&self, ms: f64) {
        let target = self.inner.borrow().now + ms;
        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                let due = inner
                    .timers
                    .iter()
                    .filter(|(_, t)| t.due <= target)
                    .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)))
                    .map(|(id, _)| id);
                match due.and_then(|id| inner.timers.remove(id)) {
                    Some(timer) => {
                        inner.now = timer.due;
                        Some(timer.callback)
                    }
                    None => None,
                }
            };
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.inner.borrow_mut().now = target;
    }

    /// Advance the clock by one frame interval, then run the frame
    pub fn tick(&self, frame_ms: f64) -> usize {
        self.advance(frame_ms);
        self.run_frame()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        self.inner.borrow_mut().frames.push(callback);
    }

    fn set_timeout(&self, delay_ms: u32, callback: FrameCallback) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        inner.seq += 1;
        let timer = PendingTimer {
            due: inner.now + f64::from(delay_ms),
            seq: inner.seq,
            callback,
        };
        inner.timers.insert(timer)
    }

    fn clear_timeout(&self, id: TimerId) {
        self.inner.borrow_mut().timers.remove(id);
    }

    fn now_ms(&self) -> f64 {
        self.inner.borrow().now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_frames_run_once() {
        let scheduler = ManualScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        scheduler.request_frame(Box::new(move || h.set(h.get() + 1)));

        assert_eq!(scheduler.pending_frames(), 1);
        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(scheduler.run_frame(), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let scheduler = Rc::new(ManualScheduler::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        for (delay, label) in [(30, "c"), (10, "a"), (20, "b")] {
            let log = log.clone();
            scheduler.set_timeout(delay, Box::new(move || log.borrow_mut().push(label)));
        }
        scheduler.advance(25.0);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(scheduler.now_ms(), 25.0);

        scheduler.advance(10.0);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rescheduling_timer_within_advance() {
        let scheduler = Rc::new(ManualScheduler::new());
        let fired = Rc::new(Cell::new(0));

        fn arm(scheduler: &Rc<ManualScheduler>, fired: &Rc<Cell<u32>>) {
            let s = scheduler.clone();
            let f = fired.clone();
            scheduler.set_timeout(
                100,
                Box::new(move || {
                    f.set(f.get() + 1);
                    arm(&s, &f);
                }),
            );
        }

        arm(&scheduler, &fired);
        scheduler.advance(350.0);
        assert_eq!(fired.get(), 3);
        assert_eq!(scheduler.pending_timers(), 1);
    }

    #[test]
    fn test_cleared_timer_never_fires() {
        let scheduler = ManualScheduler::new();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let id = scheduler.set_timeout(5, Box::new(move || f.set(true)));
        scheduler.clear_timeout(id);
        scheduler.advance(10.0);
        assert!(!fired.get());
    }
}
