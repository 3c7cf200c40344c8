use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Easing curve applied to an instruction's progress. Serialized with the GSAP-style names
/// that Mermaid init directives use (`power1.inOut`, `sine.inOut`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ease {
    #[serde(rename = "none", alias = "linear")]
    Linear,
    #[serde(rename = "power1.in")]
    InQuad,
    #[serde(rename = "power1.out", alias = "power1")]
    OutQuad,
    #[default]
    #[serde(rename = "power1.inOut")]
    InOutQuad,
    #[serde(rename = "power2.in")]
    InCubic,
    #[serde(rename = "power2.out", alias = "power2")]
    OutCubic,
    #[serde(rename = "power2.inOut")]
    InOutCubic,
    #[serde(rename = "sine.inOut")]
    InOutSine,
}

const NAMES: &[(&str, Ease)] = &[
    ("none", Ease::Linear),
    ("linear", Ease::Linear),
    ("power1.in", Ease::InQuad),
    ("power1.out", Ease::OutQuad),
    ("power1", Ease::OutQuad),
    ("power1.inOut", Ease::InOutQuad),
    ("power2.in", Ease::InCubic),
    ("power2.out", Ease::OutCubic),
    ("power2", Ease::OutCubic),
    ("power2.inOut", Ease::InOutCubic),
    ("sine.inOut", Ease::InOutSine),
];

impl Ease {
    pub const ALL: [Ease; 8] = [
        Ease::Linear,
        Ease::InQuad,
        Ease::OutQuad,
        Ease::InOutQuad,
        Ease::InCubic,
        Ease::OutCubic,
        Ease::InOutCubic,
        Ease::InOutSine,
    ];

    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::InOutSine => (1.0 - (std::f64::consts::PI * t).cos()) / 2.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "none",
            Self::InQuad => "power1.in",
            Self::OutQuad => "power1.out",
            Self::InOutQuad => "power1.inOut",
            Self::InCubic => "power2.in",
            Self::OutCubic => "power2.out",
            Self::InOutCubic => "power2.inOut",
            Self::InOutSine => "sine.inOut",
        }
    }
}

impl fmt::Display for Ease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ease `{0}`")]
pub struct UnknownEase(pub String);

impl FromStr for Ease {
    type Err = UnknownEase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        NAMES
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, ease)| *ease)
            .ok_or_else(|| UnknownEase(name.to_string()))
    }
}
