use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use web_time::Instant;
use winit::event_loop::ControlFlow;

/// Longest step handed to the controls, so a stalled frame cannot fling the
/// camera across the scene.
pub const MAX_FRAME_DELTA: f32 = 0.1;

pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self { last: now }
    }

    /// Seconds since the previous tick, clamped to [`MAX_FRAME_DELTA`].
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let dt = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        dt.min(MAX_FRAME_DELTA)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub dt: f32,
}

/// Counts render iterations and stops handing out frames once cancelled.
pub struct FrameLoop {
    clock: FrameClock,
    iterations: u64,
    token: CancelToken,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::with_clock(FrameClock::new())
    }

    pub fn with_clock(clock: FrameClock) -> Self {
        Self {
            clock,
            iterations: 0,
            token: CancelToken::new(),
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Cancels the loop without waiting for another frame and returns how
    /// many frames ran.
    pub fn stop(&self) -> u64 {
        self.token.cancel();
        self.iterations
    }

    pub fn begin_frame(&mut self) -> Option<Frame> {
        self.begin_frame_at(Instant::now())
    }

    pub fn begin_frame_at(&mut self, now: Instant) -> Option<Frame> {
        if self.token.is_cancelled() {
            return None;
        }
        let dt = self.clock.tick_at(now);
        self.iterations += 1;
        Some(Frame {
            index: self.iterations,
            dt,
        })
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Paces redraw requests to an optional frame-rate cap. Uncapped loops just
/// ask for the next redraw as soon as a frame is done.
pub struct FramePacer {
    frame_time: Option<Duration>,
    target: Instant,
}

impl FramePacer {
    pub fn new(max_fps: Option<u32>) -> Self {
        Self {
            frame_time: max_fps
                .filter(|fps| *fps > 0)
                .map(|fps| Duration::from_nanos(1_000_000_000 / fps as u64)),
            target: Instant::now(),
        }
    }

    /// Whether a wakeup at `now` should trigger a paced redraw.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.frame_time {
            Some(frame_time) if self.target <= now => {
                self.target += frame_time;
                true
            }
            _ => false,
        }
    }

    /// Whether to request the next redraw straight after finishing a frame.
    pub fn after_frame(&mut self, now: Instant) -> bool {
        match self.frame_time {
            None => true,
            Some(frame_time) if self.target <= now => {
                self.target = now + frame_time;
                true
            }
            Some(_) => false,
        }
    }

    pub fn control_flow(&self) -> ControlFlow {
        match self.frame_time {
            Some(_) => ControlFlow::WaitUntil(self.target),
            None => ControlFlow::Wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_clamps_long_frames() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let dt = clock.tick_at(start + Duration::from_millis(16));
        assert!((dt - 0.016).abs() < 1e-6);
        assert_eq!(clock.tick_at(start + Duration::from_secs(5)), MAX_FRAME_DELTA);
        // going backwards yields zero rather than a negative step
        assert_eq!(clock.tick_at(start), 0.0);
    }

    #[test]
    fn iterations_increase_until_cancelled() {
        let start = Instant::now();
        let mut frames = FrameLoop::with_clock(FrameClock::starting_at(start));
        let mut last = 0;
        for i in 1..=5 {
            let frame = frames.begin_frame_at(start + Duration::from_millis(i * 10)).unwrap();
            assert!(frame.index > last);
            last = frame.index;
        }
        assert_eq!(frames.iterations(), 5);

        let token = frames.token();
        assert!(frames.is_running());
        token.cancel();
        assert!(!frames.is_running());
        assert!(frames.begin_frame_at(start + Duration::from_secs(1)).is_none());
        assert_eq!(frames.iterations(), 5);
    }

    #[test]
    fn stop_ends_the_loop_immediately() {
        let start = Instant::now();
        let mut frames = FrameLoop::with_clock(FrameClock::starting_at(start));
        frames.begin_frame_at(start + Duration::from_millis(16)).unwrap();
        frames.begin_frame_at(start + Duration::from_millis(32)).unwrap();

        let token = frames.token();
        assert_eq!(frames.stop(), 2);
        assert!(token.is_cancelled());
        assert!(!frames.is_running());
        // a redraw that still arrives renders nothing and counts nothing
        assert!(frames.begin_frame_at(start + Duration::from_millis(48)).is_none());
        assert_eq!(frames.stop(), 2);
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn uncapped_pacer_always_redraws() {
        let mut pacer = FramePacer::new(None);
        let now = Instant::now();
        assert!(pacer.after_frame(now));
        assert!(!pacer.poll(now));
        assert_eq!(pacer.control_flow(), ControlFlow::Wait);
    }

    #[test]
    fn capped_pacer_waits_for_next_slot() {
        let mut pacer = FramePacer::new(Some(100));
        let now = pacer.target;
        assert!(pacer.after_frame(now));
        assert!(!pacer.after_frame(now + Duration::from_millis(5)));
        assert_eq!(
            pacer.control_flow(),
            ControlFlow::WaitUntil(now + Duration::from_millis(10))
        );
        assert!(pacer.poll(now + Duration::from_millis(10)));
        assert!(!pacer.poll(now + Duration::from_millis(11)));
    }
}
