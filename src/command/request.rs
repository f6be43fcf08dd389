//! Host command requests
//!
//! The JSON shape a host sends to a light, resolved into a [`CommandSet`].
//! Only one lighting mode is honored per request, picked in the order
//! scene, music, video, temperature, color.

use govee_ble_shared::command::{DEFAULT_SENSITIVITY, DEFAULT_ZONE_BRIGHTNESS};
use govee_ble_shared::{CommandIntent, CommandSet, MusicMode, Rgb, VideoRegion};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while resolving a request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Unknown music mode: {0}")]
    UnknownMusicMode(String),

    #[error("Brightness {0} is out of range (0-100)")]
    BrightnessOutOfRange(u8),

    #[error("Invalid command request: {0}")]
    InvalidJson(String),
}

/// Mode-specific options
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestExtra {
    /// `calm` for music, `game` for video
    pub mode: Option<String>,
    #[serde(default)]
    pub sound_effect: bool,
    #[serde(rename = "sensivity", alias = "sensitivity")]
    pub sensitivity: Option<u8>,
    /// Per-zone brightness for video mode
    pub tv_brightness: Option<Vec<u8>>,
}

/// A command as delivered by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandRequest {
    pub scene: Option<String>,
    pub music: Option<String>,
    pub video: Option<String>,
    pub color: Option<Rgb>,
    /// Color temperature in mired
    pub temp: Option<u16>,
    pub mask: Option<String>,
    #[serde(default)]
    pub extra: RequestExtra,
    /// Brightness in percent
    pub brightness: Option<u8>,
    pub on_off: Option<bool>,
}

impl CommandRequest {
    pub fn from_json(json: &str) -> Result<Self, RequestError> {
        serde_json::from_str(json).map_err(|e| RequestError::InvalidJson(e.to_string()))
    }

    /// Resolve the request into the commands to send
    pub fn to_command_set(&self) -> Result<CommandSet, RequestError> {
        if let Some(brightness) = self.brightness {
            if brightness > 100 {
                return Err(RequestError::BrightnessOutOfRange(brightness));
            }
        }

        Ok(CommandSet {
            mode: self.intent()?,
            brightness: self.brightness,
            power: self.on_off,
        })
    }

    fn intent(&self) -> Result<Option<CommandIntent>, RequestError> {
        let sensitivity = self.extra.sensitivity.unwrap_or(DEFAULT_SENSITIVITY);

        if let Some(name) = &self.scene {
            return Ok(Some(CommandIntent::Scene { name: name.clone() }));
        }

        if let Some(music) = &self.music {
            return Ok(Some(CommandIntent::Music {
                mode: parse_music_mode(music)?,
                sensitivity,
                calm: self.extra.mode.as_deref().map_or(true, |m| m == "calm"),
                color: self.color,
            }));
        }

        if let Some(video) = &self.video {
            let region = if video == "all" {
                VideoRegion::All
            } else {
                VideoRegion::Region
            };
            let zone_brightness = self
                .extra
                .tv_brightness
                .as_deref()
                .and_then(|zones| <[u8; 4]>::try_from(zones).ok())
                .unwrap_or(DEFAULT_ZONE_BRIGHTNESS);

            return Ok(Some(CommandIntent::Video {
                region,
                game_mode: self.extra.mode.as_deref() == Some("game"),
                sound_reactive: self.extra.sound_effect,
                sensitivity,
                zone_brightness,
            }));
        }

        if let Some(mired) = self.temp {
            return Ok(Some(CommandIntent::Temperature {
                mired,
                mask: self.mask.clone(),
            }));
        }

        Ok(self.color.map(|rgb| CommandIntent::Color {
            rgb,
            mask: self.mask.clone(),
        }))
    }
}

fn parse_music_mode(name: &str) -> Result<MusicMode, RequestError> {
    match name {
        // Older hosts send the misspelled name
        "rhythm" | "rhytm" => Ok(MusicMode::Rhythm),
        "energetic" => Ok(MusicMode::Energetic),
        "spectrum" => Ok(MusicMode::Spectrum),
        "rolling" => Ok(MusicMode::Rolling),
        other => Err(RequestError::UnknownMusicMode(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govee_ble_shared::{command, SceneTable};

    #[test]
    fn test_parse_full_request() {
        let request = CommandRequest::from_json(
            r#"{"color": [255, 0, 0], "mask": "1100", "brightness": 50, "on_off": true}"#,
        )
        .expect("valid request");

        let commands = request.to_command_set().expect("resolves");
        assert_eq!(
            commands.mode,
            Some(CommandIntent::Color {
                rgb: Rgb::new(255, 0, 0),
                mask: Some("1100".into()),
            })
        );
        assert_eq!(commands.brightness, Some(50));
        assert_eq!(commands.power, Some(true));
    }

    #[test]
    fn test_scene_wins_over_color() {
        let request =
            CommandRequest::from_json(r#"{"scene": "Aurora", "color": [0, 0, 255]}"#).unwrap();
        let commands = request.to_command_set().unwrap();

        let scenes: SceneTable = [("Aurora", 0x0bb1)].into_iter().collect();
        let frames = command::build(&commands, &scenes).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].payload()[..3], &[0x04, 0xb1, 0x0b]);
    }

    #[test]
    fn test_precedence() {
        let request = CommandRequest::from_json(
            r#"{"music": "spectrum", "video": "all", "temp": 250, "color": [1, 2, 3]}"#,
        )
        .unwrap();
        assert!(matches!(
            request.to_command_set().unwrap().mode,
            Some(CommandIntent::Music { mode: MusicMode::Spectrum, color: Some(_), .. })
        ));

        let request = CommandRequest::from_json(r#"{"video": "region", "temp": 250}"#).unwrap();
        assert!(matches!(
            request.to_command_set().unwrap().mode,
            Some(CommandIntent::Video { region: VideoRegion::Region, .. })
        ));

        let request = CommandRequest::from_json(r#"{"temp": 250, "color": [1, 2, 3]}"#).unwrap();
        assert_eq!(
            request.to_command_set().unwrap().mode,
            Some(CommandIntent::Temperature { mired: 250, mask: None })
        );
    }

    #[test]
    fn test_music_options() {
        let request = CommandRequest::from_json(r#"{"music": "rhytm", "extra": {"sensivity": 50}}"#)
            .unwrap();
        assert_eq!(
            request.to_command_set().unwrap().mode,
            Some(CommandIntent::Music {
                mode: MusicMode::Rhythm,
                sensitivity: 50,
                calm: true,
                color: None,
            })
        );

        let request =
            CommandRequest::from_json(r#"{"music": "rolling", "extra": {"mode": "dynamic"}}"#)
                .unwrap();
        assert!(matches!(
            request.to_command_set().unwrap().mode,
            Some(CommandIntent::Music { calm: false, sensitivity: 100, .. })
        ));

        let request = CommandRequest::from_json(r#"{"music": "disco"}"#).unwrap();
        assert_eq!(
            request.to_command_set(),
            Err(RequestError::UnknownMusicMode("disco".into()))
        );
    }

    #[test]
    fn test_video_options() {
        let request = CommandRequest::from_json(
            r#"{"video": "all", "extra": {"mode": "game", "sound_effect": true, "tv_brightness": [10, 20, 30, 40]}}"#,
        )
        .unwrap();
        assert_eq!(
            request.to_command_set().unwrap().mode,
            Some(CommandIntent::Video {
                region: VideoRegion::All,
                game_mode: true,
                sound_reactive: true,
                sensitivity: 100,
                zone_brightness: [10, 20, 30, 40],
            })
        );

        let request =
            CommandRequest::from_json(r#"{"video": "all", "extra": {"tv_brightness": [10, 20]}}"#)
                .unwrap();
        assert!(matches!(
            request.to_command_set().unwrap().mode,
            Some(CommandIntent::Video { zone_brightness: [100, 100, 100, 100], game_mode: false, .. })
        ));
    }

    #[test]
    fn test_brightness_range() {
        let request = CommandRequest::from_json(r#"{"brightness": 101}"#).unwrap();
        assert_eq!(
            request.to_command_set(),
            Err(RequestError::BrightnessOutOfRange(101))
        );

        let request = CommandRequest::from_json(r#"{"brightness": 100}"#).unwrap();
        assert_eq!(request.to_command_set().unwrap().brightness, Some(100));
    }

    #[test]
    fn test_empty_and_invalid() {
        let request = CommandRequest::from_json("{}").unwrap();
        assert!(request.to_command_set().unwrap().is_empty());

        assert!(matches!(
            CommandRequest::from_json(r#"{"brightness": "high"}"#),
            Err(RequestError::InvalidJson(_))
        ));
    }
}
