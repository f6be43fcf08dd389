//! Color temperature conversion
//!
//! Lights take white-point commands as kelvin plus an RGB approximation of the
//! same white. The approximation is the usual black-body curve fit, clamped to
//! 1000K..=40000K.

use serde::{Deserialize, Serialize};

/// An 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(rgb: Rgb) -> Self {
        rgb.to_bytes()
    }
}

const MIN_KELVIN: u32 = 1000;
const MAX_KELVIN: u32 = 40000;

/// Convert mireds to kelvin, rounding down. Returns `None` for zero.
pub fn mired_to_kelvin(mired: u16) -> Option<u32> {
    if mired == 0 {
        return None;
    }
    Some(1_000_000 / u32::from(mired))
}

/// Approximate the RGB color of a black body at `kelvin`
pub fn kelvin_to_rgb(kelvin: u32) -> Rgb {
    let temp = f64::from(kelvin.clamp(MIN_KELVIN, MAX_KELVIN)) / 100.0;

    let red = if temp <= 66.0 {
        255.0
    } else {
        329.698727446 * (temp - 60.0).powf(-0.1332047592)
    };

    let green = if temp <= 66.0 {
        99.4708025861 * temp.ln() - 161.1195681661
    } else {
        288.1221695283 * (temp - 60.0).powf(-0.0755148492)
    };

    let blue = if temp >= 66.0 {
        255.0
    } else if temp <= 19.0 {
        0.0
    } else {
        138.5177312231 * (temp - 10.0).ln() - 305.0447927307
    };

    Rgb::new(channel(red), channel(green), channel(blue))
}

fn channel(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}
