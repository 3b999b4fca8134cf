use gif::{Encoder, Frame, Repeat};

use crate::{
    error::{ReelError, ReelResult},
    model::{TimingSpec, TransitionSpec},
    session::{ExportSession, Phase},
    surface::{FrameFactory, Surface},
    transition::render_transition,
};

/// Hard ceiling on the long edge of a GIF export. Palette encoding cost
/// grows with pixel count times frame count, so the cap is applied by
/// downscaling the slides before any frame is rendered, never as a
/// post-hoc resize of finished frames.
pub const MAX_GIF_EDGE: u32 = 800;

/// Quantization speed handed to the palette encoder (1 = best, 30 =
/// fastest); 10 matches the quality/speed balance of the exporter this
/// pipeline replaces.
const QUANT_SPEED: i32 = 10;

/// Encodes slides and transitions into an animated GIF.
///
/// Unlike the stream encoder, timing here is explicit per-frame delay
/// metadata rather than wall-clock playback: each hold frame carries the
/// full hold duration, each transition sub-frame carries an equal share of
/// the transition duration.
#[derive(Clone, Copy, Debug)]
pub struct GifEncoderAdapter {
    timing: TimingSpec,
    transition: TransitionSpec,
    loop_forever: bool,
}

impl GifEncoderAdapter {
    pub fn new(
        timing: TimingSpec,
        transition: TransitionSpec,
        loop_forever: bool,
    ) -> ReelResult<Self> {
        timing.validate()?;
        transition.validate()?;
        Ok(Self {
            timing,
            transition,
            loop_forever,
        })
    }

    /// Encode the deck into GIF bytes. Cancellation is checked between
    /// frames; on observation every partially-built encoder structure is
    /// dropped and no partial GIF is emitted.
    #[tracing::instrument(skip(self, slides, session), fields(slide_count = slides.len()))]
    pub fn encode(&self, slides: &[Surface], session: &ExportSession) -> ReelResult<Vec<u8>> {
        if slides.is_empty() {
            return Err(ReelError::validation("cannot encode an empty slide deck"));
        }
        let factory = FrameFactory::for_slides(slides)?;

        let (width, height) = capped_dimensions(factory.width(), factory.height());
        let scaled: Option<Vec<Surface>> =
            if width != factory.width() || height != factory.height() {
                tracing::debug!(width, height, "downscaling slides to GIF cap");
                Some(
                    slides
                        .iter()
                        .map(|s| downscale(s, width, height))
                        .collect::<ReelResult<_>>()?,
                )
            } else {
                None
            };
        let slides: &[Surface] = scaled.as_deref().unwrap_or(slides);
        let factory = FrameFactory::new(width, height)?;

        let frames_per_transition = self.transition.frames(self.timing.frame_rate);
        let hold_ms = self.timing.hold_seconds * 1000.0;
        let transition_ms = if frames_per_transition > 0 {
            self.transition.duration_seconds * 1000.0 / frames_per_transition as f64
        } else {
            0.0
        };

        // Written frames: one per slide plus the transition sub-frames.
        let total = slides.len() as u64 + (slides.len() as u64 - 1) * frames_per_transition;
        let mut written = 0u64;

        let mut encoder = Encoder::new(Vec::new(), width as u16, height as u16, &[])
            .map_err(|e| ReelError::encoding(format!("failed to create GIF encoder: {e}")))?;
        if self.loop_forever {
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| ReelError::encoding(format!("failed to set GIF repeat: {e}")))?;
        }

        for (i, slide) in slides.iter().enumerate() {
            session.checkpoint()?;
            write_gif_frame(&mut encoder, slide, hold_ms)?;
            written += 1;
            session.report(Phase::Encoding, (written * 100 / total) as u8);

            if i + 1 < slides.len() && frames_per_transition > 0 {
                let next = &slides[i + 1];
                let mut frame = factory.blank();
                for t in 0..frames_per_transition {
                    session.checkpoint()?;
                    let progress = t as f64 / frames_per_transition as f64;
                    render_transition(&mut frame, slide, next, progress, self.transition.effect)?;
                    write_gif_frame(&mut encoder, &frame, transition_ms)?;
                    written += 1;
                }
                session.report(Phase::Encoding, (written * 100 / total) as u8);
            }
        }

        let bytes = encoder
            .into_inner()
            .map_err(|e| ReelError::encoding(format!("failed to finalize GIF: {e}")))?;
        if bytes.is_empty() {
            return Err(ReelError::encoding("GIF encoder produced an empty output"));
        }
        tracing::info!(frames = written, bytes = bytes.len(), "GIF encode finished");
        Ok(bytes)
    }

    /// Expected frame count of the encoded GIF, counting each hold as one
    /// frame. Differs from [`crate::sequence::total_frames`], which counts
    /// playback frames at the stream frame rate.
    pub fn frame_count(&self, slide_count: usize) -> u64 {
        if slide_count == 0 {
            return 0;
        }
        let n = slide_count as u64;
        n + (n - 1) * self.transition.frames(self.timing.frame_rate)
    }
}

fn write_gif_frame(
    encoder: &mut Encoder<Vec<u8>>,
    surface: &Surface,
    delay_ms: f64,
) -> ReelResult<()> {
    let mut pixels = surface.data().to_vec();
    let mut frame = Frame::from_rgba_speed(
        surface.width() as u16,
        surface.height() as u16,
        &mut pixels,
        QUANT_SPEED,
    );
    // GIF delays are in 10ms units; convert the exact millisecond value
    // once, here, so hold and transition delays round identically.
    frame.delay = (delay_ms / 10.0).round() as u16;
    encoder
        .write_frame(&frame)
        .map_err(|e| ReelError::encoding(format!("failed to write GIF frame: {e}")))
}

/// Scale `(width, height)` down so the long edge is at most
/// [`MAX_GIF_EDGE`], preserving aspect ratio. Never upscales.
pub fn capped_dimensions(width: u32, height: u32) -> (u32, u32) {
    let long = width.max(height);
    if long <= MAX_GIF_EDGE {
        return (width, height);
    }
    let scale = f64::from(MAX_GIF_EDGE) / f64::from(long);
    let w = ((f64::from(width) * scale).round() as u32).max(1);
    let h = ((f64::from(height) * scale).round() as u32).max(1);
    (w, h)
}

fn downscale(surface: &Surface, width: u32, height: u32) -> ReelResult<Surface> {
    let img = surface.to_rgba_image();
    let resized =
        image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle);
    Surface::from_rgba_image(&resized)
}
