use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Light,
    Dark,
}

impl FromStr for ThemeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" | "default" | "base" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme `{other}`")),
        }
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Light => "light",
            Self::Dark => "dark",
        })
    }
}

/// Colours the animation layer draws with. The accent colours markers when no tracer palette
/// is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub name: ThemeName,
    pub background: String,
    pub foreground: String,
    pub accent: String,
}

impl Theme {
    pub fn light() -> Self {
        Self {
            name: ThemeName::Light,
            background: "#ffffff".to_string(),
            foreground: "#0b1220".to_string(),
            accent: "#1b74e4".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            name: ThemeName::Dark,
            background: "#0b0f14".to_string(),
            foreground: "#e6edf3".to_string(),
            accent: "#7cc1ff".to_string(),
        }
    }

    pub fn named(name: ThemeName) -> Self {
        match name {
            ThemeName::Light => Self::light(),
            ThemeName::Dark => Self::dark(),
        }
    }

    /// Mermaid's own theme name for this palette.
    pub fn mermaid_theme(&self) -> &'static str {
        match self.name {
            ThemeName::Light => "default",
            ThemeName::Dark => "dark",
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_constructors() {
        assert_eq!(Theme::named(ThemeName::Dark).accent, "#7cc1ff");
        assert_eq!(Theme::default().name, ThemeName::Light);
        assert_eq!("base".parse::<ThemeName>(), Ok(ThemeName::Light));
        assert!("neon".parse::<ThemeName>().is_err());
        assert_eq!(Theme::dark().mermaid_theme(), "dark");
    }
}
