use crate::error::{ReelError, ReelResult};

pub const MIN_FRAME_RATE: u32 = 1;
pub const MAX_FRAME_RATE: u32 = 120;

/// GIF playback above this rate is not honored by mainstream viewers, so
/// GIF exports clamp to it.
pub const MAX_GIF_FRAME_RATE: u32 = 30;

/// Transition effect between two adjacent slides. A closed set: every
/// encoder path matches on it exhaustively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionEffect {
    Fade,
    Crossfade,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    Zoom,
    /// Hard cut, no blending.
    #[serde(rename = "none", alias = "cut")]
    Cut,
}

impl TransitionEffect {
    pub fn parse(s: &str) -> ReelResult<Self> {
        let kind = s.trim().to_ascii_lowercase();
        match kind.as_str() {
            "fade" => Ok(Self::Fade),
            "crossfade" => Ok(Self::Crossfade),
            "slide-left" | "slideleft" => Ok(Self::SlideLeft),
            "slide-right" | "slideright" => Ok(Self::SlideRight),
            "slide-up" | "slideup" => Ok(Self::SlideUp),
            "slide-down" | "slidedown" => Ok(Self::SlideDown),
            "zoom" => Ok(Self::Zoom),
            "none" | "cut" => Ok(Self::Cut),
            other => Err(ReelError::validation(format!(
                "unknown transition effect '{other}'"
            ))),
        }
    }
}

/// Effect plus duration, applied uniformly between every adjacent slide
/// pair of an export.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitionSpec {
    pub effect: TransitionEffect,
    pub duration_seconds: f64,
}

impl TransitionSpec {
    pub fn validate(&self) -> ReelResult<()> {
        if !self.duration_seconds.is_finite() || self.duration_seconds < 0.0 {
            return Err(ReelError::validation(
                "transition duration must be finite and >= 0",
            ));
        }
        Ok(())
    }

    /// Number of frames this transition occupies at `frame_rate`. Zero
    /// duration means zero frames (a hard cut between holds).
    pub fn frames(&self, frame_rate: u32) -> u64 {
        (self.duration_seconds * f64::from(frame_rate)).round() as u64
    }
}

/// Per-slide hold time and the export frame rate.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimingSpec {
    pub hold_seconds: f64,
    pub frame_rate: u32,
}

impl TimingSpec {
    pub fn validate(&self) -> ReelResult<()> {
        if !self.hold_seconds.is_finite() || self.hold_seconds <= 0.0 {
            return Err(ReelError::validation(
                "hold duration must be finite and > 0",
            ));
        }
        if self.frame_rate < MIN_FRAME_RATE || self.frame_rate > MAX_FRAME_RATE {
            return Err(ReelError::validation(format!(
                "frame rate must be in [{MIN_FRAME_RATE},{MAX_FRAME_RATE}], got {}",
                self.frame_rate
            )));
        }
        Ok(())
    }

    pub fn frames_per_slide(&self) -> u64 {
        (self.hold_seconds * f64::from(self.frame_rate)).round() as u64
    }

    pub fn ms_per_frame(&self) -> f64 {
        1000.0 / f64::from(self.frame_rate)
    }
}

/// Target bitrate tier for the video recorder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

impl QualityTier {
    pub fn bits_per_second(self) -> u64 {
        match self {
            Self::High => 8_000_000,
            Self::Medium => 5_000_000,
            Self::Low => 2_500_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Webm,
    Gif,
}

impl ExportFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Webm => "video/webm",
            Self::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Gif => "gif",
        }
    }
}

/// Everything the UI layer chooses for one export.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub frame_rate: u32,
    pub hold_seconds: f64,
    pub transition_seconds: f64,
    pub effect: TransitionEffect,
    pub quality: QualityTier,
    /// GIF only: loop forever vs play once.
    #[serde(default = "default_loop")]
    pub loop_forever: bool,
}

fn default_loop() -> bool {
    true
}

impl ExportRequest {
    pub fn validate(&self) -> ReelResult<()> {
        // Validate the requested frame rate before the GIF clamp is
        // applied; an out-of-range rate is rejected, never silently
        // corrected down to the GIF ceiling.
        TimingSpec {
            hold_seconds: self.hold_seconds,
            frame_rate: self.frame_rate,
        }
        .validate()?;
        self.transition().validate()
    }

    pub fn timing(&self) -> TimingSpec {
        let frame_rate = match self.format {
            ExportFormat::Gif => self.frame_rate.min(MAX_GIF_FRAME_RATE),
            ExportFormat::Webm => self.frame_rate,
        };
        TimingSpec {
            hold_seconds: self.hold_seconds,
            frame_rate,
        }
    }

    pub fn transition(&self) -> TransitionSpec {
        TransitionSpec {
            effect: self.effect,
            duration_seconds: self.transition_seconds,
        }
    }

    /// Rough duration/size preview for a deck of `slide_count` slides.
    pub fn estimate(&self, slide_count: usize) -> ExportEstimate {
        let n = slide_count as f64;
        let duration_seconds = n * (self.hold_seconds + self.transition_seconds);
        let total_frames = duration_seconds * f64::from(self.timing().frame_rate);
        let bytes_per_frame = match self.format {
            ExportFormat::Gif => 50.0 * 1024.0,
            ExportFormat::Webm => 10.0 * 1024.0,
        };
        ExportEstimate {
            duration_seconds,
            approx_bytes: (total_frames * bytes_per_frame) as u64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportEstimate {
    pub duration_seconds: f64,
    pub approx_bytes: u64,
}
