use std::{
    io::{Read as _, Write as _},
    process::{Child, ChildStdin, Command, Stdio},
    thread::JoinHandle,
};

use crate::{
    encode_stream::Recorder,
    error::{ReelError, ReelResult},
    model::{MAX_FRAME_RATE, MIN_FRAME_RATE, QualityTier},
    surface::Surface,
};

/// Video codec chosen by probing the local ffmpeg build, in preference
/// order. When neither VP codec is available the recorder falls back to
/// H.264 in a fragmented MP4 (the generic-container fallback; faststart is
/// not possible on a piped output).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    Vp9,
    Vp8,
    H264,
}

impl VideoCodec {
    pub fn encoder_name(self) -> &'static str {
        match self {
            Self::Vp9 => "libvpx-vp9",
            Self::Vp8 => "libvpx",
            Self::H264 => "libx264",
        }
    }

    pub fn container(self) -> &'static str {
        match self {
            Self::Vp9 | Self::Vp8 => "webm",
            Self::H264 => "mp4",
        }
    }

    fn mux_args(self) -> &'static [&'static str] {
        match self {
            Self::Vp9 | Self::Vp8 => &["-f", "webm"],
            Self::H264 => &["-f", "mp4", "-movflags", "+frag_keyframe+empty_moov"],
        }
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Probe the local ffmpeg for supported encoders and pick the preferred
/// available codec.
pub fn probe_codec() -> ReelResult<VideoCodec> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            ReelError::encoding(format!(
                "ffmpeg is required for video encoding, but was not found on PATH: {e}"
            ))
        })?;
    Ok(pick_codec(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `ffmpeg -encoders` output. Each entry line is
/// `<flags> <name> <description>`; the name is the second token.
fn pick_codec(encoders: &str) -> VideoCodec {
    let has = |name: &str| {
        encoders.lines().any(|line| {
            let mut tokens = line.split_whitespace();
            tokens.next().is_some_and(|flags| flags.starts_with('V'))
                && tokens.next() == Some(name)
        })
    };

    if has("libvpx-vp9") {
        VideoCodec::Vp9
    } else if has("libvpx") {
        VideoCodec::Vp8
    } else {
        VideoCodec::H264
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RecorderConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub quality: QualityTier,
}

impl RecorderConfig {
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::validation(
                "recorder width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p output requires even dimensions.
            return Err(ReelError::validation(
                "recorder width/height must be even (required for yuv420p output)",
            ));
        }
        if !(MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&self.frame_rate) {
            return Err(ReelError::validation(format!(
                "recorder frame rate must be in [{MIN_FRAME_RATE},{MAX_FRAME_RATE}], got {}",
                self.frame_rate
            )));
        }
        Ok(())
    }
}

/// Recorder backed by a system `ffmpeg` child process: raw RGBA frames are
/// written to its stdin, and the muxed container stream is accumulated
/// from its stdout by a drain thread (one chunk per read) until `finish`
/// concatenates them.
///
/// The system binary is used rather than linking FFmpeg to avoid native
/// dev header/lib requirements.
pub struct FfmpegRecorder {
    cfg: RecorderConfig,
    codec: VideoCodec,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl FfmpegRecorder {
    /// Validate the config and probe codec support. The child process is
    /// not spawned until [`Recorder::start`].
    pub fn new(cfg: RecorderConfig) -> ReelResult<Self> {
        cfg.validate()?;
        let codec = probe_codec()?;
        if codec == VideoCodec::H264 {
            tracing::warn!(
                "no VP8/VP9 encoder available, falling back to {} in {}",
                codec.encoder_name(),
                codec.container()
            );
        }
        Ok(Self {
            cfg,
            codec,
            child: None,
            stdin: None,
            drain: None,
        })
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    fn teardown(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(drain) = self.drain.take() {
            let _ = drain.join();
        }
    }
}

impl Recorder for FfmpegRecorder {
    fn start(&mut self) -> ReelResult<()> {
        if self.child.is_some() {
            return Err(ReelError::encoding("recorder already started"));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", self.cfg.width, self.cfg.height),
            "-r",
            &self.cfg.frame_rate.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            self.codec.encoder_name(),
            "-b:v",
            &self.cfg.quality.bits_per_second().to_string(),
            "-pix_fmt",
            "yuv420p",
        ])
        .args(self.codec.mux_args())
        .arg("pipe:1");

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::encoding(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::encoding("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelError::encoding("failed to open ffmpeg stdout (unexpected)"))?;

        let drain = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
            let mut chunks = Vec::new();
            let mut buf = [0u8; 64 * 1024];
            loop {
                let n = stdout.read(&mut buf)?;
                if n == 0 {
                    return Ok(chunks);
                }
                chunks.extend_from_slice(&buf[..n]);
            }
        });

        tracing::debug!(
            codec = self.codec.encoder_name(),
            container = self.codec.container(),
            bitrate = self.cfg.quality.bits_per_second(),
            "ffmpeg recorder started"
        );

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.drain = Some(drain);
        Ok(())
    }

    fn write_frame(&mut self, frame: &Surface) -> ReelResult<()> {
        if frame.width() != self.cfg.width || frame.height() != self.cfg.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::encoding(
                "ffmpeg recorder is not started or already finalized",
            ));
        };

        stdin
            .write_all(frame.data())
            .map_err(|e| ReelError::encoding(format!("failed to write frame to ffmpeg: {e}")))
    }

    fn finish(mut self: Box<Self>) -> ReelResult<Vec<u8>> {
        drop(self.stdin.take());

        if self.child.is_none() {
            return Err(ReelError::encoding("ffmpeg recorder was never started"));
        }

        // The child stays owned until the drain result is in hand: an
        // early return here drops the recorder, whose teardown kills and
        // reaps the process instead of leaving a zombie.
        let bytes = match self.drain.take() {
            Some(drain) => drain
                .join()
                .map_err(|_| ReelError::encoding("ffmpeg output drain thread panicked"))?
                .map_err(|e| ReelError::encoding(format!("failed to read ffmpeg output: {e}")))?,
            None => Vec::new(),
        };

        let Some(child) = self.child.take() else {
            return Err(ReelError::encoding("ffmpeg recorder was never started"));
        };

        // stdout was already taken by the drain thread, so this only
        // collects the exit status and stderr.
        let output = child
            .wait_with_output()
            .map_err(|e| ReelError::encoding(format!("failed to wait for ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::encoding(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(bytes)
    }

    fn abort(mut self: Box<Self>) {
        tracing::debug!("ffmpeg recorder aborted");
        self.teardown();
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_catches_bad_values() {
        let base = RecorderConfig {
            width: 640,
            height: 360,
            frame_rate: 30,
            quality: QualityTier::Medium,
        };
        assert!(base.validate().is_ok());
        assert!(RecorderConfig { width: 0, ..base }.validate().is_err());
        assert!(RecorderConfig { width: 641, ..base }.validate().is_err());
        assert!(
            RecorderConfig {
                height: 361,
                ..base
            }
            .validate()
            .is_err()
        );
        assert!(
            RecorderConfig {
                frame_rate: 0,
                ..base
            }
            .validate()
            .is_err()
        );
        assert!(
            RecorderConfig {
                frame_rate: 240,
                ..base
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn codec_preference_order() {
        let listing = "\
Encoders:
 V..... libvpx               libvpx VP8 (codec vp8)
 V..... libvpx-vp9           libvpx VP9 (codec vp9)
 V..... libx264              libx264 H.264 (codec h264)
";
        assert_eq!(pick_codec(listing), VideoCodec::Vp9);

        let vp8_only = "\
Encoders:
 V..... libvpx               libvpx VP8 (codec vp8)
 V..... libx264              libx264 H.264 (codec h264)
";
        assert_eq!(pick_codec(vp8_only), VideoCodec::Vp8);

        let x264_only = " V..... libx264              libx264 H.264 (codec h264)\n";
        assert_eq!(pick_codec(x264_only), VideoCodec::H264);
    }

    #[test]
    fn description_text_does_not_fool_the_probe() {
        // "libvpx" appears in the VP9 line's description column; only the
        // name token counts.
        let listing = " V..... libvpx-vp9           libvpx VP9 (codec vp9)\n";
        assert_eq!(pick_codec(listing), VideoCodec::Vp9);
        let no_vp8 = " A..... aac                  AAC (libvpx is not here)\n";
        assert_eq!(pick_codec(no_vp8), VideoCodec::H264);
    }

    #[test]
    fn finish_reaps_the_child_when_the_drain_fails() {
        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();
        let drain = std::thread::spawn(|| -> std::io::Result<Vec<u8>> {
            Err(std::io::Error::other("stream torn down"))
        });
        let recorder: Box<FfmpegRecorder> = Box::new(FfmpegRecorder {
            cfg: RecorderConfig {
                width: 2,
                height: 2,
                frame_rate: 30,
                quality: QualityTier::Medium,
            },
            codec: VideoCodec::Vp9,
            child: Some(child),
            stdin: None,
            drain: Some(drain),
        });

        let err = recorder.finish().unwrap_err();
        assert!(matches!(err, ReelError::Encoding(_)));

        // Killed and reaped: signal 0 fails for a gone pid but would
        // still succeed for an unreaped zombie.
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap()
            .success();
        assert!(!alive, "ffmpeg child {pid} was left behind");
    }

    #[test]
    fn fallback_codec_reports_mp4_container() {
        assert_eq!(VideoCodec::Vp9.container(), "webm");
        assert_eq!(VideoCodec::Vp8.container(), "webm");
        assert_eq!(VideoCodec::H264.container(), "mp4");
    }
}
