use crate::ease::Ease;
use crate::error::AnimateError;
use crate::graph::RootFallback;
use crate::theme::{Theme, ThemeName};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Auto,
    EdgeDraw,
    Tracer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    Waves,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Seconds per edge.
    pub step: f64,
    /// Seconds between waves.
    pub gap: f64,
    pub ease: Ease,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            step: 1.0,
            gap: 0.25,
            ease: Ease::InOutQuad,
        }
    }
}

impl DrawConfig {
    /// Step and gap divided by `speed`. Non-positive speeds leave the timing unchanged.
    pub fn scaled(self, speed: f64) -> Self {
        if !(speed.is_finite() && speed > 0.0) {
            return self;
        }
        Self {
            step: self.step / speed,
            gap: self.gap / speed,
            ease: self.ease,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Marker radius.
    pub size: f64,
    pub ease: Ease,
    pub count: usize,
    pub color: Option<ColorSpec>,
    /// Seconds between consecutive markers; one step when unset.
    pub stagger: Option<f64>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            size: 4.0,
            ease: Ease::InOutQuad,
            count: 1,
            color: None,
            stagger: None,
        }
    }
}

impl TracerConfig {
    pub fn palette(&self) -> Vec<String> {
        match &self.color {
            None => Vec::new(),
            Some(ColorSpec::One(color)) => vec![color.clone()],
            Some(ColorSpec::Many(colors)) => colors.clone(),
        }
    }

    pub fn marker_count(&self) -> usize {
        self.count.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoplayConfig {
    pub when_visible: bool,
    /// Milliseconds.
    pub start_delay: u64,
    /// Milliseconds.
    pub replay_delay: u64,
    /// Fractional spread applied to each restart delay.
    pub jitter: f64,
    pub seed: Option<u64>,
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            when_visible: true,
            start_delay: 1000,
            replay_delay: 2000,
            jitter: 0.0,
            seed: None,
        }
    }
}

impl AutoplayConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay)
    }

    pub fn replay_delay(&self) -> Duration {
        Duration::from_millis(self.replay_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimateConfig {
    pub mode: Mode,
    /// Per-kind default when unset: sequence and state diagrams loop, flowcharts don't.
    #[serde(rename = "loop")]
    pub looping: Option<bool>,
    pub speed: f64,
    pub split: Split,
    pub draw: DrawConfig,
    pub tracer: TracerConfig,
    pub autoplay: AutoplayConfig,
    pub root_fallback: RootFallback,
}

impl Default for AnimateConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            looping: None,
            speed: 1.0,
            split: Split::Waves,
            draw: DrawConfig::default(),
            tracer: TracerConfig::default(),
            autoplay: AutoplayConfig::default(),
            root_fallback: RootFallback::None,
        }
    }
}

impl AnimateConfig {
    pub fn validate(&self) -> Result<(), AnimateError> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(AnimateError::config(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }
        if !(self.draw.step.is_finite() && self.draw.step >= 0.0) {
            return Err(AnimateError::config("draw.step must be non-negative"));
        }
        if !(self.draw.gap.is_finite() && self.draw.gap >= 0.0) {
            return Err(AnimateError::config("draw.gap must be non-negative"));
        }
        if let Some(stagger) = self.tracer.stagger {
            if !(stagger.is_finite() && stagger >= 0.0) {
                return Err(AnimateError::config("tracer.stagger must be non-negative"));
            }
        }
        if !(0.0..=1.0).contains(&self.autoplay.jitter) {
            return Err(AnimateError::config("autoplay.jitter must be within [0, 1]"));
        }
        Ok(())
    }

    /// Draw timing with the speed multiplier applied.
    pub fn timing(&self) -> DrawConfig {
        self.draw.scaled(self.speed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub animate: AnimateConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    animate: Option<serde_json::Value>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let parsed: ConfigFile = match serde_json::from_str(&contents) {
        Ok(parsed) => parsed,
        Err(_) => json5::from_str(&contents)?,
    };

    if let Some(theme_name) = parsed.theme.as_deref() {
        let name: ThemeName = theme_name.parse().map_err(anyhow::Error::msg)?;
        config.theme = Theme::named(name);
    }

    if let Some(animate) = parsed.animate {
        config.animate = overlay_animate(&config.animate, animate)?;
    }
    config.animate.validate()?;

    Ok(config)
}

/// Applies the `theme` and `animate` keys of a `%%{init: ...}%%` directive. Invalid overrides
/// are ignored and the incoming config is returned unchanged.
pub fn merge_init_config(mut config: Config, init: &serde_json::Value) -> Config {
    if let Some(theme_name) = init.get("theme").and_then(|v| v.as_str()) {
        match theme_name.parse::<ThemeName>() {
            Ok(name) => config.theme = Theme::named(name),
            Err(err) => tracing::debug!(%err, "ignoring init theme"),
        }
    }

    if let Some(animate) = init.get("animate") {
        match overlay_animate(&config.animate, animate.clone()) {
            Ok(merged) if merged.validate().is_ok() => config.animate = merged,
            Ok(_) => tracing::debug!("ignoring invalid init animate override"),
            Err(err) => tracing::debug!(%err, "ignoring malformed init animate override"),
        }
    }
    config
}

fn overlay_animate(
    base: &AnimateConfig,
    overlay: serde_json::Value,
) -> Result<AnimateConfig, serde_json::Error> {
    let mut merged = serde_json::to_value(base)?;
    merge_json(&mut merged, overlay);
    serde_json::from_value(merged)
}

fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
