use std::time::{Duration, Instant};

use crate::{
    error::{ReelError, ReelResult},
    model::{MAX_FRAME_RATE, MIN_FRAME_RATE},
    session::{ExportSession, Phase},
    surface::Surface,
};

/// Delay after starting the recorder before playback begins, letting the
/// encoder stabilize.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// How long the last frame is held before stopping the recorder, so the
/// encoder flushes a final chunk.
const FINAL_HOLD: Duration = Duration::from_millis(500);

/// Granularity of the playback loop's yield when no frame is due.
const TICK: Duration = Duration::from_millis(1);

/// Manually-clocked capture sink. A frame is committed to the output only
/// on an explicit `write_frame` call; there is no automatic capture rate.
pub trait Recorder: Send {
    /// Begin a recording session. Called once, before any frame.
    fn start(&mut self) -> ReelResult<()>;

    /// Commit the current surface state as the next output frame.
    fn write_frame(&mut self, frame: &Surface) -> ReelResult<()>;

    /// Stop recording and return the accumulated container bytes.
    fn finish(self: Box<Self>) -> ReelResult<Vec<u8>>;

    /// Stop recording and discard all state. Used on cancellation and
    /// error paths; must release every underlying resource.
    fn abort(self: Box<Self>);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EncoderState {
    Idle,
    Priming,
    Playing,
    Finalizing,
    Done,
}

/// Wall-clock frame pacing with drift compensation.
///
/// When a frame comes due after `elapsed >= ms_per_frame`, the reference
/// timestamp advances by exactly `ms_per_frame` (equivalently: `now` minus
/// the overshoot) instead of resetting to `now`. Scheduler jitter on one
/// frame is thereby repaid on the next, and the average rate converges to
/// the target over the whole sequence instead of drifting.
#[derive(Debug)]
pub struct FramePacer {
    ms_per_frame: f64,
    last: Instant,
}

impl FramePacer {
    pub fn new(frame_rate: u32, start: Instant) -> Self {
        Self {
            ms_per_frame: 1000.0 / f64::from(frame_rate.max(1)),
            last: start,
        }
    }

    /// True when the next frame should be committed at `now`, advancing
    /// the internal reference time.
    pub fn frame_due(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64() * 1000.0;
        if elapsed < self.ms_per_frame {
            return false;
        }
        let overshoot = elapsed - self.ms_per_frame;
        self.last = now
            .checked_sub(Duration::from_secs_f64(overshoot / 1000.0))
            .unwrap_or(now);
        true
    }
}

/// Plays a frame sequence against a [`Recorder`] with wall-clock-accurate
/// pacing and finalizes the encoded container bytes.
///
/// One persistent drawing surface is owned by the encoder for the lifetime
/// of the session and never reused across sessions. The lifecycle is an
/// explicit state machine: Idle, Priming (first frame drawn, recorder
/// started, settle delay), Playing (paced capture loop), Finalizing (hold
/// last frame, stop recorder), Done.
#[derive(Debug)]
pub struct StreamEncoder {
    width: u32,
    height: u32,
    frame_rate: u32,
    settle: Duration,
    final_hold: Duration,
    tick: Duration,
    state: EncoderState,
}

impl StreamEncoder {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> ReelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelError::validation("encode width/height must be > 0"));
        }
        if !(MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&frame_rate) {
            return Err(ReelError::validation(format!(
                "frame rate must be in [{MIN_FRAME_RATE},{MAX_FRAME_RATE}], got {frame_rate}"
            )));
        }
        Ok(Self {
            width,
            height,
            frame_rate,
            settle: SETTLE_DELAY,
            final_hold: FINAL_HOLD,
            tick: TICK,
            state: EncoderState::Idle,
        })
    }

    /// Override the settle/hold/tick delays. Tests shrink these to keep
    /// playback wall time manageable.
    pub fn with_pacing(mut self, settle: Duration, final_hold: Duration, tick: Duration) -> Self {
        self.settle = settle;
        self.final_hold = final_hold;
        self.tick = tick;
        self
    }

    fn enter(&mut self, next: EncoderState) {
        tracing::debug!(from = ?self.state, to = ?next, "stream encoder state");
        self.state = next;
    }

    /// Play `frames` in order against `recorder` and return the finished
    /// container bytes. Fails with `Cancelled` if the session flag is
    /// observed mid-playback (the recorder is aborted, no partial output
    /// is returned) and with `Encoding` if the recorder errors or produces
    /// zero bytes.
    pub fn encode(
        mut self,
        frames: &[Surface],
        mut recorder: Box<dyn Recorder>,
        session: &ExportSession,
    ) -> ReelResult<Vec<u8>> {
        if frames.is_empty() {
            return Err(ReelError::validation(
                "cannot encode an empty frame sequence",
            ));
        }

        let mut surface = Surface::new(self.width, self.height)?;

        self.enter(EncoderState::Priming);
        if let Err(e) = surface.copy_from(&frames[0]) {
            recorder.abort();
            return Err(e);
        }
        if let Err(e) = recorder.start() {
            recorder.abort();
            return Err(e);
        }
        std::thread::sleep(self.settle);

        self.enter(EncoderState::Playing);
        let mut pacer = FramePacer::new(self.frame_rate, Instant::now());
        let mut index = 0usize;
        while index < frames.len() {
            if session.is_cancelled() {
                recorder.abort();
                return Err(ReelError::Cancelled);
            }

            if pacer.frame_due(Instant::now()) {
                let committed = surface
                    .copy_from(&frames[index])
                    .and_then(|()| recorder.write_frame(&surface));
                if let Err(e) = committed {
                    recorder.abort();
                    return Err(e);
                }
                index += 1;
                session.report(Phase::Encoding, (index * 100 / frames.len()) as u8);
            } else {
                std::thread::sleep(self.tick);
            }
        }

        self.enter(EncoderState::Finalizing);
        // The last frame stays presented on the surface through the hold.
        std::thread::sleep(self.final_hold);
        let bytes = recorder.finish()?;

        self.enter(EncoderState::Done);
        if bytes.is_empty() {
            return Err(ReelError::encoding("recorder produced an empty output"));
        }
        tracing::info!(
            frames = frames.len(),
            bytes = bytes.len(),
            "stream encode finished"
        );
        Ok(bytes)
    }
}
