use crate::{
    error::ReelResult,
    model::{TimingSpec, TransitionSpec},
    session::{ExportSession, Phase},
    surface::{FrameFactory, Surface},
    transition::render_transition,
};

/// Total frames an export of `slide_count` slides produces:
/// `N * frames_per_slide + (N-1) * frames_per_transition`. There is no
/// transition after the last slide.
pub fn total_frames(slide_count: usize, timing: &TimingSpec, transition: &TransitionSpec) -> u64 {
    if slide_count == 0 {
        return 0;
    }
    let n = slide_count as u64;
    n * timing.frames_per_slide() + (n - 1) * transition.frames(timing.frame_rate)
}

/// Expand a slide deck into the ordered, time-quantized frame sequence.
///
/// Each hold frame is a fresh copy of its slide (downstream consumers may
/// retain or overwrite frames); each transition frame is rendered between
/// the adjacent pair at `progress = t / frames_per_transition`. An empty
/// deck yields an empty sequence; the orchestrator rejects that case before
/// ever invoking an encoder.
///
/// Cancellation is polled and progress reported at slide boundaries, the
/// generator's cooperative suspension points.
#[tracing::instrument(skip(slides, session), fields(slide_count = slides.len()))]
pub fn generate_frames(
    slides: &[Surface],
    timing: &TimingSpec,
    transition: &TransitionSpec,
    session: &ExportSession,
) -> ReelResult<Vec<Surface>> {
    if slides.is_empty() {
        return Ok(Vec::new());
    }
    timing.validate()?;
    transition.validate()?;
    let factory = FrameFactory::for_slides(slides)?;

    let frames_per_slide = timing.frames_per_slide();
    let frames_per_transition = transition.frames(timing.frame_rate);
    let total = total_frames(slides.len(), timing, transition);
    let mut frames = Vec::with_capacity(total as usize);

    for (i, slide) in slides.iter().enumerate() {
        session.checkpoint()?;

        for _ in 0..frames_per_slide {
            frames.push(factory.frame_of(slide)?);
        }

        if i + 1 < slides.len() && frames_per_transition > 0 {
            let next = &slides[i + 1];
            for t in 0..frames_per_transition {
                let progress = t as f64 / frames_per_transition as f64;
                let mut frame = factory.blank();
                render_transition(&mut frame, slide, next, progress, transition.effect)?;
                frames.push(frame);
            }
        }

        let percent = ((i + 1) * 100 / slides.len()) as u8;
        session.report(Phase::Generating, percent);
    }

    tracing::debug!(frames = frames.len(), "frame sequence generated");
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransitionEffect;

    fn solid(rgba: [u8; 4]) -> Surface {
        let mut s = Surface::new(8, 8).unwrap();
        s.fill(rgba);
        s
    }

    fn timing(hold: f64, fps: u32) -> TimingSpec {
        TimingSpec {
            hold_seconds: hold,
            frame_rate: fps,
        }
    }

    fn fade(duration: f64) -> TransitionSpec {
        TransitionSpec {
            effect: TransitionEffect::Fade,
            duration_seconds: duration,
        }
    }

    #[test]
    fn empty_deck_yields_empty_sequence() {
        let session = ExportSession::new();
        let frames = generate_frames(&[], &timing(2.0, 10), &fade(0.5), &session).unwrap();
        assert!(frames.is_empty());
        assert_eq!(total_frames(0, &timing(2.0, 10), &fade(0.5)), 0);
    }

    #[test]
    fn three_slides_at_ten_fps_yield_seventy_frames() {
        // 3 slides, hold 2s, transition 0.5s, 10 fps: 3*20 + 2*5 = 70.
        let slides = vec![
            solid([10, 0, 0, 255]),
            solid([0, 10, 0, 255]),
            solid([0, 0, 10, 255]),
        ];
        let session = ExportSession::new();
        let frames = generate_frames(&slides, &timing(2.0, 10), &fade(0.5), &session).unwrap();
        assert_eq!(frames.len(), 70);
        assert_eq!(total_frames(3, &timing(2.0, 10), &fade(0.5)), 70);
    }

    #[test]
    fn zero_duration_transition_produces_no_transition_frames() {
        let slides = vec![solid([1, 1, 1, 255]), solid([2, 2, 2, 255])];
        let session = ExportSession::new();
        let frames = generate_frames(&slides, &timing(1.0, 10), &fade(0.0), &session).unwrap();
        assert_eq!(frames.len(), 20);
    }

    #[test]
    fn single_slide_has_no_transitions() {
        let slides = vec![solid([1, 1, 1, 255])];
        let session = ExportSession::new();
        let frames = generate_frames(&slides, &timing(1.5, 10), &fade(0.5), &session).unwrap();
        assert_eq!(frames.len(), 15);
    }

    #[test]
    fn first_transition_frame_equals_outgoing_slide() {
        let from = solid([100, 0, 0, 255]);
        let to = solid([0, 100, 0, 255]);
        let slides = vec![from.clone(), to.clone()];
        let session = ExportSession::new();
        let frames = generate_frames(&slides, &timing(1.0, 10), &fade(0.5), &session).unwrap();
        // 10 hold frames, then 5 transition frames, then 10 hold frames.
        assert_eq!(frames.len(), 25);
        assert_eq!(frames[9], from);
        assert_eq!(frames[10], from); // progress 0/5
        assert_ne!(frames[12], from); // mid-blend
        assert_eq!(frames[15], to);
    }

    #[test]
    fn hold_frames_are_independent_copies() {
        let slides = vec![solid([5, 5, 5, 255])];
        let session = ExportSession::new();
        let mut frames = generate_frames(&slides, &timing(1.0, 10), &fade(0.0), &session).unwrap();
        frames[0].fill([0, 0, 0, 255]);
        assert_ne!(frames[0], frames[1]);
        assert_eq!(slides[0].pixel(0, 0), [5, 5, 5, 255]);
    }

    #[test]
    fn cancellation_is_observed_at_slide_boundaries() {
        let slides = vec![solid([1, 1, 1, 255]), solid([2, 2, 2, 255])];
        let session = ExportSession::new();
        session.cancel_handle().cancel();
        let err = generate_frames(&slides, &timing(1.0, 10), &fade(0.5), &session).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn mixed_slide_sizes_are_rejected() {
        let slides = vec![solid([1, 1, 1, 255]), {
            let mut s = Surface::new(4, 4).unwrap();
            s.fill([2, 2, 2, 255]);
            s
        }];
        let session = ExportSession::new();
        assert!(generate_frames(&slides, &timing(1.0, 10), &fade(0.5), &session).is_err());
    }
}
