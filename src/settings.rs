use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::error::{PreviewError, Result};

/// Fallback canvas size when a resolution selector cannot be parsed.
pub const DEFAULT_RESOLUTION: (u32, u32) = (1920, 1080);

/// Policy for scaling a source image onto the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// No scaling; original size, centered.
    None,
    /// Scale so image width matches the canvas width, preserving aspect.
    Width,
    /// Scale so image height matches the canvas height, preserving aspect.
    Height,
    /// Entire image visible; may letterbox.
    Fit,
    /// Canvas fully covered; may crop.
    Fill,
    /// Stretch both axes independently, ignoring aspect.
    Distort,
    /// Alias of `none`.
    Center,
}

impl Default for FitMode {
    fn default() -> Self {
        FitMode::Fit
    }
}

impl FromStr for FitMode {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(FitMode::None),
            "width" => Ok(FitMode::Width),
            "height" => Ok(FitMode::Height),
            "fit" => Ok(FitMode::Fit),
            "fill" => Ok(FitMode::Fill),
            "distort" => Ok(FitMode::Distort),
            "center" => Ok(FitMode::Center),
            other => Err(PreviewError::MonitorResolution(format!(
                "unknown fit mode {other:?}"
            ))),
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FitMode::None => "none",
            FitMode::Width => "width",
            FitMode::Height => "height",
            FitMode::Fit => "fit",
            FitMode::Fill => "fill",
            FitMode::Distort => "distort",
            FitMode::Center => "center",
        };
        f.write_str(s)
    }
}

/// How the session presents its current entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// One image.
    #[serde(alias = "simple")]
    Single,
    /// Two images with a movable vertical split line.
    Comparison,
    /// Ordered sequence with keyboard navigation.
    Slideshow,
}

impl Default for DisplayMode {
    fn default() -> Self {
        DisplayMode::Single
    }
}

impl FromStr for DisplayMode {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" | "simple" => Ok(DisplayMode::Single),
            "comparison" => Ok(DisplayMode::Comparison),
            "slideshow" => Ok(DisplayMode::Slideshow),
            other => Err(PreviewError::MonitorResolution(format!(
                "unknown display mode {other:?}"
            ))),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisplayMode::Single => "single",
            DisplayMode::Comparison => "comparison",
            DisplayMode::Slideshow => "slideshow",
        };
        f.write_str(s)
    }
}

/// Frame pacing mode. `Smart` keeps a 30 fps loop but skips recompositing
/// whenever nothing relevant changed since the previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FpsMode {
    #[serde(rename = "smart")]
    Smart,
    #[serde(rename = "15fps")]
    Fixed15,
    #[serde(rename = "30fps")]
    Fixed30,
    #[serde(rename = "60fps")]
    Fixed60,
}

impl FpsMode {
    pub fn target_fps(self) -> u32 {
        match self {
            FpsMode::Smart => 30,
            FpsMode::Fixed15 => 15,
            FpsMode::Fixed30 => 30,
            FpsMode::Fixed60 => 60,
        }
    }

    pub fn is_smart(self) -> bool {
        matches!(self, FpsMode::Smart)
    }
}

impl Default for FpsMode {
    fn default() -> Self {
        FpsMode::Smart
    }
}

impl FromStr for FpsMode {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "smart" => Ok(FpsMode::Smart),
            "15fps" => Ok(FpsMode::Fixed15),
            "30fps" => Ok(FpsMode::Fixed30),
            "60fps" => Ok(FpsMode::Fixed60),
            other => Err(PreviewError::MonitorResolution(format!(
                "unknown fps mode {other:?}"
            ))),
        }
    }
}

/// Whether the invocation turns the target monitor on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PowerState {
    On,
    Off,
}

impl FromStr for PowerState {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "On" | "on" => Ok(PowerState::On),
            "Off" | "off" => Ok(PowerState::Off),
            other => Err(PreviewError::MonitorResolution(format!(
                "unknown power state {other:?}"
            ))),
        }
    }
}

/// Queue accumulation policy for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitMode {
    /// Clear accumulated entries and start a fresh queue.
    New,
    /// Extend the existing queue, skipping byte-identical resubmissions.
    Append,
}

impl Default for SubmitMode {
    fn default() -> Self {
        SubmitMode::New
    }
}

impl FromStr for SubmitMode {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(SubmitMode::New),
            "append" => Ok(SubmitMode::Append),
            other => Err(PreviewError::MonitorResolution(format!(
                "unknown submit mode {other:?}"
            ))),
        }
    }
}

/// Per-invocation display settings. Replaced wholesale on every invocation;
/// there is no partial merge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DisplaySettings {
    pub fit_mode: FitMode,
    #[serde(deserialize_with = "de_resolution")]
    pub target_resolution: (u32, u32),
    pub gain: f32,
    pub gamma: f32,
    pub saturation: f32,
    pub white_matte: bool,
    pub fps_mode: FpsMode,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            fit_mode: FitMode::default(),
            target_resolution: DEFAULT_RESOLUTION,
            gain: 1.0,
            gamma: 1.0,
            saturation: 1.0,
            white_matte: false,
            fps_mode: FpsMode::default(),
        }
    }
}

impl DisplaySettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.gain > 0.0) || !(self.gamma > 0.0) || !(self.saturation >= 0.0) {
            return Err(PreviewError::MonitorResolution(format!(
                "gain/gamma must be > 0 and saturation >= 0 (got {}, {}, {})",
                self.gain, self.gamma, self.saturation
            )));
        }
        let (w, h) = self.target_resolution;
        if w == 0 || h == 0 {
            return Err(PreviewError::MonitorResolution(format!(
                "target resolution must be non-zero (got {w}x{h})"
            )));
        }
        Ok(())
    }

    /// True when gain/gamma/saturation leave pixel values untouched.
    pub fn is_identity_adjustment(&self) -> bool {
        self.gain == 1.0 && self.gamma == 1.0 && self.saturation == 1.0
    }
}

/// Parse a `"WxH"` resolution selector.
pub fn parse_resolution(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| PreviewError::MonitorResolution(s.to_string()))?;
    let w: u32 = w
        .trim()
        .parse()
        .map_err(|_| PreviewError::MonitorResolution(s.to_string()))?;
    let h: u32 = h
        .trim()
        .parse()
        .map_err(|_| PreviewError::MonitorResolution(s.to_string()))?;
    if w == 0 || h == 0 {
        return Err(PreviewError::MonitorResolution(s.to_string()));
    }
    Ok((w, h))
}

/// Parse a resolution selector, falling back to 1920x1080 on malformed input.
/// Malformed selectors are a recovered condition, never an error.
pub fn resolution_or_default(s: &str) -> (u32, u32) {
    match parse_resolution(s) {
        Ok(res) => res,
        Err(_) => {
            warn!(selector = s, "malformed resolution selector, using default");
            DEFAULT_RESOLUTION
        }
    }
}

fn de_resolution<'de, D>(de: D) -> std::result::Result<(u32, u32), D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(de)?;
    parse_resolution(&raw).map_err(serde::de::Error::custom)
}

/// Load display settings for the demo binary from a YAML file.
pub fn from_yaml_file(path: &Path) -> Result<DisplaySettings> {
    let text = std::fs::read_to_string(path)?;
    let settings: DisplaySettings = serde_yaml::from_str(&text)?;
    Ok(settings)
}
