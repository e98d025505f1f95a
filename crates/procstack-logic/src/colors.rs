//! Color channels for texture-set mask recoloring.
//!
//! A texture set paints a model through N mask channels; each channel
//! is an RGBA tuple plus a glow strength. Channels round-trip through a
//! compact text blob (`r,g,b,a,glow;...`) so the persistence
//! collaborator can store one string per slot. The codec is exact:
//! `decode(encode(x)) == x` for any well-formed channel list.

use serde::{Deserialize, Serialize};

/// One recolorable mask channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorChannel {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
    pub glow: f32,
}

impl ColorChannel {
    pub fn new(r: f32, g: f32, b: f32, a: f32, glow: f32) -> Self {
        Self { r, g, b, a, glow }
    }

    /// Mid-gray, opaque, no glow. Used when a definition ships no
    /// texture sets at all.
    pub fn neutral() -> Self {
        Self::new(0.5, 0.5, 0.5, 1.0, 0.0)
    }
}

/// The placeholder channel list for definitions without texture sets.
pub fn neutral_channels() -> Vec<ColorChannel> {
    vec![ColorChannel::neutral(); 3]
}

/// Encode a channel list as `r,g,b,a,glow;r,g,b,a,glow;...`.
///
/// Floats are written with Rust's shortest-round-trip formatting, so
/// decoding reproduces the exact bit pattern.
pub fn encode_channels(channels: &[ColorChannel]) -> String {
    channels
        .iter()
        .map(|c| format!("{},{},{},{},{}", c.r, c.g, c.b, c.a, c.glow))
        .collect::<Vec<_>>()
        .join(";")
}

/// Decode a channel blob. Returns `None` when any channel is malformed;
/// an empty string decodes to an empty list.
pub fn decode_channels(text: &str) -> Option<Vec<ColorChannel>> {
    if text.is_empty() {
        return Some(Vec::new());
    }
    let mut channels = Vec::new();
    for entry in text.split(';') {
        let parts: Vec<f32> = entry
            .split(',')
            .map(|p| p.trim().parse().ok())
            .collect::<Option<Vec<f32>>>()?;
        if parts.len() != 5 {
            return None;
        }
        channels.push(ColorChannel::new(
            parts[0], parts[1], parts[2], parts[3], parts[4],
        ));
    }
    Some(channels)
}
