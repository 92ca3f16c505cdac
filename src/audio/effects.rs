use serde::Serialize;
use std::{fmt, str::FromStr};

/// Named effect presets available through `/effect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Rotation,
    Karaoke,
    Reset,
    Mono,
    Intense,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Effect `{0}` not found.")]
pub struct UnknownEffect(pub String);

impl FromStr for Effect {
    type Err = UnknownEffect;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_lowercase().as_str() {
            "rotation" | "rotate" | "8d" => Ok(Effect::Rotation),
            "karaoke" => Ok(Effect::Karaoke),
            "reset" | "default" | "off" => Ok(Effect::Reset),
            "mono" => Ok(Effect::Mono),
            "intense" => Ok(Effect::Intense),
            _ => Err(UnknownEffect(name.to_string())),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Effect::Rotation => "rotation",
            Effect::Karaoke => "karaoke",
            Effect::Reset => "reset",
            Effect::Mono => "mono",
            Effect::Intense => "intense",
        };
        f.write_str(name)
    }
}

impl Effect {
    pub const NAMES: [&'static str; 5] = ["rotation", "karaoke", "reset", "mono", "intense"];

    /// Filter configuration sent to the backend for this preset.
    ///
    /// `Reset` maps to an empty configuration, which clears every filter.
    pub fn filters(self) -> FilterSpec {
        match self {
            Effect::Rotation => FilterSpec {
                rotation: Some(RotationFilter { rotation_hz: 2.0 }),
                ..Default::default()
            },
            Effect::Karaoke => FilterSpec {
                karaoke: Some(KaraokeFilter {
                    level: 1.0,
                    mono_level: 1.0,
                    filter_band: 220.0,
                    filter_width: 100.0,
                }),
                ..Default::default()
            },
            Effect::Reset => FilterSpec::default(),
            Effect::Mono => FilterSpec {
                channel_mix: Some(ChannelMixFilter {
                    left_to_left: 0.5,
                    left_to_right: 0.5,
                    right_to_left: 0.5,
                    right_to_right: 0.5,
                }),
                ..Default::default()
            },
            Effect::Intense => FilterSpec {
                equalizer: Some(
                    [0.3, 0.25, 0.2, 0.1, 0.05]
                        .into_iter()
                        .enumerate()
                        .map(|(band, gain)| EqualizerBand { band: band as u8, gain })
                        .collect(),
                ),
                timescale: Some(TimescaleFilter {
                    speed: 1.0,
                    pitch: 1.05,
                    rate: 1.0,
                }),
                ..Default::default()
            },
        }
    }
}

/// Backend filter configuration, serialized in Lavalink's camelCase shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equalizer: Option<Vec<EqualizerBand>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub karaoke: Option<KaraokeFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timescale: Option<TimescaleFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_mix: Option<ChannelMixFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EqualizerBand {
    pub band: u8,
    pub gain: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KaraokeFilter {
    pub level: f32,
    pub mono_level: f32,
    pub filter_band: f32,
    pub filter_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimescaleFilter {
    pub speed: f64,
    pub pitch: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationFilter {
    pub rotation_hz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMixFilter {
    pub left_to_left: f32,
    pub left_to_right: f32,
    pub right_to_left: f32,
    pub right_to_right: f32,
}
