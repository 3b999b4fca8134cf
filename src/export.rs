use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    encode_ffmpeg::{FfmpegRecorder, RecorderConfig},
    encode_gif::GifEncoderAdapter,
    encode_stream::StreamEncoder,
    error::{ReelError, ReelResult},
    model::{ExportFormat, ExportRequest},
    sequence::generate_frames,
    session::{ExportSession, Phase},
    surface::{FrameFactory, Surface},
};

/// Finished export: the encoded container bytes plus enough metadata for
/// the caller to save or serve them.
#[derive(Clone, Debug)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
}

impl ExportOutput {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// `video-export-<timestamp>.<ext>`.
    pub fn suggested_filename(&self) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        format!("video-export-{timestamp}.{}", self.extension())
    }
}

/// Run one export end to end: validate the request, expand the deck into
/// frames, drive the chosen encoder, and return the finished blob.
///
/// All failures surface here as the single returned `Result`; no partial
/// output is ever exposed, and encoder resources are released on every
/// exit path. `Cancelled` is distinguished from `Encoding` so callers can
/// suppress failure messaging for user-requested aborts.
#[tracing::instrument(skip(slides, request, session), fields(slide_count = slides.len(), format = ?request.format))]
pub fn export(
    slides: &[Surface],
    request: &ExportRequest,
    session: &ExportSession,
) -> ReelResult<ExportOutput> {
    request.validate()?;
    // Rejects an empty deck and mixed slide dimensions before any
    // rendering starts.
    let factory = FrameFactory::for_slides(slides)?;
    session.report(Phase::Preparing, 0);
    session.checkpoint()?;

    let timing = request.timing();
    let transition = request.transition();

    let bytes = match request.format {
        ExportFormat::Gif => GifEncoderAdapter::new(timing, transition, request.loop_forever)?
            .encode(slides, session)?,
        ExportFormat::Webm => {
            let frames = generate_frames(slides, &timing, &transition, session)?;
            if frames.is_empty() {
                // Possible when hold*fps rounds to zero; the stream
                // encoder must never be invoked with zero frames.
                return Err(ReelError::validation(
                    "export would produce zero frames; increase hold duration or frame rate",
                ));
            }
            let recorder = FfmpegRecorder::new(RecorderConfig {
                width: factory.width(),
                height: factory.height(),
                frame_rate: timing.frame_rate,
                quality: request.quality,
            })?;
            StreamEncoder::new(factory.width(), factory.height(), timing.frame_rate)?.encode(
                &frames,
                Box::new(recorder),
                session,
            )?
        }
    };

    session.report(Phase::Finalizing, 100);
    Ok(ExportOutput {
        bytes,
        format: request.format,
    })
}
