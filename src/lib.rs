#![forbid(unsafe_code)]

pub mod encode_ffmpeg;
pub mod encode_gif;
pub mod encode_stream;
pub mod error;
pub mod export;
pub mod model;
pub mod sequence;
pub mod session;
pub mod surface;
pub mod transition;

pub use encode_ffmpeg::{
    FfmpegRecorder, RecorderConfig, VideoCodec, is_ffmpeg_on_path, probe_codec,
};
pub use encode_gif::{GifEncoderAdapter, MAX_GIF_EDGE, capped_dimensions};
pub use encode_stream::{FramePacer, Recorder, StreamEncoder};
pub use error::{ReelError, ReelResult};
pub use export::{ExportOutput, export};
pub use model::{
    ExportEstimate, ExportFormat, ExportRequest, MAX_FRAME_RATE, MAX_GIF_FRAME_RATE,
    MIN_FRAME_RATE, QualityTier, TimingSpec, TransitionEffect, TransitionSpec,
};
pub use sequence::{generate_frames, total_frames};
pub use session::{CancelHandle, ExportSession, Phase, ProgressUpdate};
pub use surface::{FrameFactory, Surface};
pub use transition::render_transition;
