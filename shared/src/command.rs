//! Command builder
//!
//! Turns a [`CommandSet`] into the ordered frames that apply it:
//! mode first, then brightness, then power.

use thiserror::Error;

use crate::codec::{self, command_id, Frame, FrameError};
use crate::color::{self, Rgb};
use crate::scenes::SceneCatalog;

/// Default sensitivity for music and video modes
pub const DEFAULT_SENSITIVITY: u8 = 100;

/// Default per-zone brightness for video mode
pub const DEFAULT_ZONE_BRIGHTNESS: [u8; 4] = [100, 100, 100, 100];

/// Mask sent when a color command targets every segment
const ALL_SEGMENTS: [u8; 3] = [0xff, 0xff, 0xff];

/// Errors that can occur while building frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Unknown scene: {0}")]
    UnknownScene(String),

    #[error("Invalid color temperature: {0} mired")]
    InvalidTemperature(u16),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Music-reactive effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicMode {
    Rhythm,
    Energetic,
    Spectrum,
    Rolling,
}

impl MusicMode {
    pub fn code(self) -> u8 {
        match self {
            MusicMode::Rhythm => 0x03,
            MusicMode::Spectrum => 0x04,
            MusicMode::Energetic => 0x05,
            MusicMode::Rolling => 0x06,
        }
    }
}

/// Screen area sampled in video-sync mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoRegion {
    #[default]
    Region,
    All,
}

/// The lighting behavior selected by a command. Exactly one is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandIntent {
    /// Static color, optionally restricted to a segment mask
    Color { rgb: Rgb, mask: Option<String> },
    /// White at a color temperature, optionally restricted to a segment mask
    Temperature { mired: u16, mask: Option<String> },
    /// Built-in scene by name
    Scene { name: String },
    Music {
        mode: MusicMode,
        sensitivity: u8,
        calm: bool,
        color: Option<Rgb>,
    },
    Video {
        region: VideoRegion,
        game_mode: bool,
        sound_reactive: bool,
        sensitivity: u8,
        zone_brightness: [u8; 4],
    },
}

impl CommandIntent {
    /// Music mode with default sensitivity and calm effect
    pub fn music(mode: MusicMode) -> Self {
        CommandIntent::Music {
            mode,
            sensitivity: DEFAULT_SENSITIVITY,
            calm: true,
            color: None,
        }
    }

    /// Video mode with default settings
    pub fn video(region: VideoRegion) -> Self {
        CommandIntent::Video {
            region,
            game_mode: false,
            sound_reactive: false,
            sensitivity: DEFAULT_SENSITIVITY,
            zone_brightness: DEFAULT_ZONE_BRIGHTNESS,
        }
    }
}

/// Everything a single command may change on a light
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSet {
    pub mode: Option<CommandIntent>,
    /// Brightness in percent (0-100)
    pub brightness: Option<u8>,
    pub power: Option<bool>,
}

impl CommandSet {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.brightness.is_none() && self.power.is_none()
    }
}

/// Build the ordered frames for a command set
pub fn build(commands: &CommandSet, scenes: &dyn SceneCatalog) -> Result<Vec<Frame>, BuildError> {
    let mut frames = Vec::with_capacity(3);

    if let Some(mode) = &commands.mode {
        let payload = mode_payload(mode, scenes)?;
        frames.push(codec::encode(command_id::MODE, &payload)?);
    }

    if let Some(percent) = commands.brightness {
        frames.push(codec::encode(command_id::BRIGHTNESS, &[brightness_byte(percent)])?);
    }

    if let Some(on) = commands.power {
        frames.push(codec::encode(command_id::POWER, &[u8::from(on)])?);
    }

    Ok(frames)
}

/// Scale a 0-100 percentage to the 0-255 level the light expects
pub fn brightness_byte(percent: u8) -> u8 {
    let percent = u32::from(percent.min(100));
    ((percent * 255 + 50) / 100) as u8
}

/// Pack a segment mask string into three little-endian bytes
///
/// Characters are read left to right; `1`, `x`, `X`, `+` and `#` select a
/// segment, anything else leaves it out.
pub fn pack_mask(mask: &str) -> [u8; 3] {
    let value = mask.chars().fold(0u32, |acc, ch| {
        let bit = u32::from(matches!(ch, '1' | 'x' | 'X' | '+' | '#'));
        (acc << 1) | bit
    });
    let [lo, mid, hi, _] = value.to_le_bytes();
    [lo, mid, hi]
}

fn mode_payload(mode: &CommandIntent, scenes: &dyn SceneCatalog) -> Result<Vec<u8>, BuildError> {
    let payload = match mode {
        CommandIntent::Scene { name } => {
            let code = scenes
                .lookup(name)
                .ok_or_else(|| BuildError::UnknownScene(name.clone()))?;
            let [lo, hi] = code.to_le_bytes();
            vec![0x04, lo, hi]
        }

        CommandIntent::Music {
            mode,
            sensitivity,
            calm,
            color,
        } => {
            let mut payload = vec![0x13, mode.code(), *sensitivity, u8::from(*calm)];
            if let Some(rgb) = color {
                payload.push(0x01);
                payload.extend_from_slice(&rgb.to_bytes());
            }
            payload
        }

        CommandIntent::Video {
            region,
            game_mode,
            sound_reactive,
            sensitivity,
            zone_brightness,
        } => {
            let mut payload = vec![
                0x00,
                u8::from(*region == VideoRegion::All),
                u8::from(*game_mode),
                0x00,
                u8::from(*sound_reactive),
                *sensitivity,
                0x00,
            ];
            payload.extend_from_slice(zone_brightness);
            payload
        }

        CommandIntent::Temperature { mired, mask } => {
            let kelvin = color::mired_to_kelvin(*mired)
                .ok_or(BuildError::InvalidTemperature(*mired))?;
            let rgb = color::kelvin_to_rgb(kelvin);

            let mut payload = vec![0x15, 0x01, 0x00, 0x00, 0x00];
            payload.push((kelvin & 0xff) as u8);
            payload.push(((kelvin >> 8) & 0xff) as u8);
            payload.extend_from_slice(&rgb.to_bytes());
            payload.extend_from_slice(&segment_mask(mask.as_deref()));
            payload
        }

        CommandIntent::Color { rgb, mask } => {
            let mut payload = vec![0x15, 0x01];
            payload.extend_from_slice(&rgb.to_bytes());
            payload.extend_from_slice(&[0x00; 5]);
            payload.extend_from_slice(&segment_mask(mask.as_deref()));
            payload
        }
    };

    Ok(payload)
}

fn segment_mask(mask: Option<&str>) -> [u8; 3] {
    mask.map(pack_mask).unwrap_or(ALL_SEGMENTS)
}
