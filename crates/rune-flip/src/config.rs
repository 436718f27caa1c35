//! Flip configuration and its three-level resolution.
//!
//! Per-phase settings are resolved node → scope → global:
//!
//! ```text
//! PhaseOverride::Inherit      defer to the next level
//! PhaseOverride::Disabled     zero-duration version of the next level
//! PhaseOverride::Override(p)  fields of `p` replace the next level's fields
//! ```
//!
//! The global level ([`FlipDefaults`]) is always complete, so resolution can
//! never come back empty.

use std::collections::BTreeMap;
use std::fmt;

use rune_config::FlipSettings;
use serde::{Deserialize, Serialize};

use crate::easing::EasingFunction;

/// Animation phase, chosen from the node state when a batch is flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Enter,
    Update,
    Exit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enter => "enter",
            Self::Update => "update",
            Self::Exit => "exit",
        })
    }
}

/// Target for one style property in a phase's style map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StyleTargetRepr", into = "StyleTargetRepr")]
pub enum StyleTarget {
    /// Animate between the measured before and after values.
    Auto,
    /// Use this explicit value: the starting value for enter/update, the
    /// final value for exit.
    Value(String),
}

impl StyleTarget {
    pub fn value(value: impl Into<String>) -> Self {
        Self::Value(value.into())
    }

    pub fn explicit(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Value(value) => Some(value),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StyleTargetRepr {
    Flag(bool),
    Value(String),
}

impl TryFrom<StyleTargetRepr> for StyleTarget {
    type Error = String;

    fn try_from(repr: StyleTargetRepr) -> Result<Self, Self::Error> {
        match repr {
            StyleTargetRepr::Flag(true) => Ok(Self::Auto),
            StyleTargetRepr::Flag(false) => {
                Err("`false` is not a style target; use `true` to auto-transition".to_string())
            }
            StyleTargetRepr::Value(value) => Ok(Self::Value(value)),
        }
    }
}

impl From<StyleTarget> for StyleTargetRepr {
    fn from(target: StyleTarget) -> Self {
        match target {
            StyleTarget::Auto => Self::Flag(true),
            StyleTarget::Value(value) => Self::Value(value),
        }
    }
}

/// Style property name → target.
pub type StyleMap = BTreeMap<String, StyleTarget>;

/// Build a [`StyleMap`] from `(property, target)` pairs.
pub fn style_map<I, K>(entries: I) -> StyleMap
where
    I: IntoIterator<Item = (K, StyleTarget)>,
    K: Into<String>,
{
    entries
        .into_iter()
        .map(|(property, target)| (property.into(), target))
        .collect()
}

/// Fully resolved settings for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub duration_ms: f64,
    pub delay_ms: f64,
    pub easing: EasingFunction,
    pub styles: StyleMap,
}

impl AnimationConfig {
    /// Same styles, but nothing visibly animates.
    pub fn zero_duration(mut self) -> Self {
        self.duration_ms = 0.0;
        self.delay_ms = 0.0;
        self.easing = EasingFunction::Linear;
        self
    }

    /// Explicit `(property, value)` pairs of the style map.
    pub fn explicit_styles(&self) -> impl Iterator<Item = (&str, &str)> {
        self.styles
            .iter()
            .filter_map(|(property, target)| {
                target.explicit().map(|value| (property.as_str(), value))
            })
    }

    /// Every property the phase reads, explicit or auto.
    pub fn style_properties(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(String::as_str)
    }
}

/// Partial [`AnimationConfig`]; present fields win over the fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easing: Option<EasingFunction>,
    /// Replaces the fallback's style map wholesale when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles: Option<StyleMap>,
}

impl AnimationOverrides {
    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_delay(mut self, delay_ms: f64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_easing(mut self, easing: EasingFunction) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn with_styles(mut self, styles: StyleMap) -> Self {
        self.styles = Some(styles);
        self
    }

    fn merge_over(&self, fallback: AnimationConfig) -> AnimationConfig {
        AnimationConfig {
            duration_ms: self.duration_ms.unwrap_or(fallback.duration_ms),
            delay_ms: self.delay_ms.unwrap_or(fallback.delay_ms),
            easing: self.easing.unwrap_or(fallback.easing),
            styles: self.styles.clone().unwrap_or(fallback.styles),
        }
    }
}

/// One level's say about a phase.
///
/// Deserializes from `true` (inherit), `false` (disabled) or a table of
/// [`AnimationOverrides`] fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PhaseOverrideRepr", into = "PhaseOverrideRepr")]
pub enum PhaseOverride {
    #[default]
    Inherit,
    Disabled,
    Override(AnimationOverrides),
}

impl PhaseOverride {
    /// Apply this level on top of the already-resolved lower levels.
    pub fn apply(&self, fallback: AnimationConfig) -> AnimationConfig {
        match self {
            Self::Inherit => fallback,
            Self::Disabled => fallback.zero_duration(),
            Self::Override(overrides) => overrides.merge_over(fallback),
        }
    }

    pub fn is_inherit(&self) -> bool {
        matches!(self, Self::Inherit)
    }
}

impl From<bool> for PhaseOverride {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Inherit } else { Self::Disabled }
    }
}

impl From<AnimationOverrides> for PhaseOverride {
    fn from(overrides: AnimationOverrides) -> Self {
        Self::Override(overrides)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PhaseOverrideRepr {
    Flag(bool),
    Partial(AnimationOverrides),
}

impl From<PhaseOverrideRepr> for PhaseOverride {
    fn from(repr: PhaseOverrideRepr) -> Self {
        match repr {
            PhaseOverrideRepr::Flag(flag) => flag.into(),
            PhaseOverrideRepr::Partial(overrides) => Self::Override(overrides),
        }
    }
}

impl From<PhaseOverride> for PhaseOverrideRepr {
    fn from(value: PhaseOverride) -> Self {
        match value {
            PhaseOverride::Inherit => Self::Flag(true),
            PhaseOverride::Disabled => Self::Flag(false),
            PhaseOverride::Override(overrides) => Self::Partial(overrides),
        }
    }
}

/// Which axes take part in translate or scale animation.
///
/// Deserializes from `true`, `false`, `"x"` or `"y"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AxesRepr", into = "AxesRepr")]
pub enum Axes {
    #[default]
    None,
    X,
    Y,
    Both,
}

impl Axes {
    pub fn x(self) -> bool {
        matches!(self, Self::X | Self::Both)
    }

    pub fn y(self) -> bool {
        matches!(self, Self::Y | Self::Both)
    }
}

impl From<bool> for Axes {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Both } else { Self::None }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AxesRepr {
    Flag(bool),
    Axis(String),
}

impl TryFrom<AxesRepr> for Axes {
    type Error = String;

    fn try_from(repr: AxesRepr) -> Result<Self, Self::Error> {
        match repr {
            AxesRepr::Flag(flag) => Ok(flag.into()),
            AxesRepr::Axis(axis) => match axis.as_str() {
                "x" => Ok(Self::X),
                "y" => Ok(Self::Y),
                other => Err(format!("unknown axis `{other}`, expected \"x\" or \"y\"")),
            },
        }
    }
}

impl From<Axes> for AxesRepr {
    fn from(axes: Axes) -> Self {
        match axes {
            Axes::None => Self::Flag(false),
            Axes::Both => Self::Flag(true),
            Axes::X => Self::Axis("x".to_string()),
            Axes::Y => Self::Axis("y".to_string()),
        }
    }
}

/// Per-node configuration, replaced on every registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipConfig {
    /// Cascade set: flipping any member flips all of them.
    pub group: Option<String>,
    /// Named scope supplying the middle level of defaults.
    pub scope: Option<String>,
    pub position: Option<Axes>,
    pub scale: Option<Axes>,
    pub enter: PhaseOverride,
    pub update: PhaseOverride,
    pub exit: PhaseOverride,
    /// Native timeline speed multiplier.
    pub playback_rate: Option<f64>,
}

impl FlipConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_position(mut self, axes: impl Into<Axes>) -> Self {
        self.position = Some(axes.into());
        self
    }

    pub fn with_scale(mut self, axes: impl Into<Axes>) -> Self {
        self.scale = Some(axes.into());
        self
    }

    pub fn with_enter(mut self, enter: impl Into<PhaseOverride>) -> Self {
        self.enter = enter.into();
        self
    }

    pub fn with_update(mut self, update: impl Into<PhaseOverride>) -> Self {
        self.update = update.into();
        self
    }

    pub fn with_exit(mut self, exit: impl Into<PhaseOverride>) -> Self {
        self.exit = exit.into();
        self
    }

    pub fn with_playback_rate(mut self, rate: f64) -> Self {
        self.playback_rate = Some(rate);
        self
    }

    pub fn phase(&self, phase: Phase) -> &PhaseOverride {
        match phase {
            Phase::Enter => &self.enter,
            Phase::Update => &self.update,
            Phase::Exit => &self.exit,
        }
    }
}

/// Defaults shared by every node that names the scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub position: Option<Axes>,
    pub scale: Option<Axes>,
    pub enter: PhaseOverride,
    pub update: PhaseOverride,
    pub exit: PhaseOverride,
    pub playback_rate: Option<f64>,
}

impl ScopeConfig {
    pub fn phase(&self, phase: Phase) -> &PhaseOverride {
        match phase {
            Phase::Enter => &self.enter,
            Phase::Update => &self.update,
            Phase::Exit => &self.exit,
        }
    }
}

/// Process-wide defaults: the always-complete bottom level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipDefaults {
    /// When false every phase resolves to zero duration.
    pub enabled: bool,
    pub playback_rate: f64,
    pub enter: AnimationConfig,
    pub update: AnimationConfig,
    pub exit: AnimationConfig,
}

impl Default for FlipDefaults {
    fn default() -> Self {
        Self::from_total_duration(FlipSettings::DEFAULT_DURATION_MS)
    }
}

impl FlipDefaults {
    /// Split `total_ms` the standard way: enter waits 30% and animates for
    /// 70%, update takes all of it, exit takes the first 30%.
    pub fn from_total_duration(total_ms: f64) -> Self {
        Self {
            enabled: true,
            playback_rate: 1.0,
            enter: AnimationConfig {
                duration_ms: total_ms * 0.7,
                delay_ms: total_ms * 0.3,
                easing: EasingFunction::ENTER,
                styles: style_map([("opacity", StyleTarget::value("0"))]),
            },
            update: AnimationConfig {
                duration_ms: total_ms,
                delay_ms: 0.0,
                easing: EasingFunction::UPDATE,
                styles: style_map([
                    ("opacity", StyleTarget::Auto),
                    ("background-color", StyleTarget::Auto),
                ]),
            },
            exit: AnimationConfig {
                duration_ms: total_ms * 0.3,
                delay_ms: 0.0,
                easing: EasingFunction::EXIT,
                styles: style_map([("opacity", StyleTarget::value("0"))]),
            },
        }
    }

    pub fn from_settings(settings: &FlipSettings) -> Self {
        Self {
            enabled: settings.enabled,
            playback_rate: settings.playback_rate,
            ..Self::from_total_duration(settings.duration_ms)
        }
    }

    pub fn phase(&self, phase: Phase) -> &AnimationConfig {
        match phase {
            Phase::Enter => &self.enter,
            Phase::Update => &self.update,
            Phase::Exit => &self.exit,
        }
    }
}

/// Resolve one phase through the node, scope and global levels.
pub fn resolve(
    phase: Phase,
    config: &FlipConfig,
    scope: Option<&ScopeConfig>,
    defaults: &FlipDefaults,
) -> AnimationConfig {
    let global = defaults.phase(phase).clone();
    let scoped = match scope {
        Some(scope) => scope.phase(phase).apply(global),
        None => global,
    };
    let resolved = config.phase(phase).apply(scoped);

    if defaults.enabled {
        resolved
    } else {
        resolved.zero_duration()
    }
}

/// Resolve translate and scale axes; both are off unless a level asks.
pub fn resolve_axes(config: &FlipConfig, scope: Option<&ScopeConfig>) -> (Axes, Axes) {
    let position = config
        .position
        .or_else(|| scope.and_then(|s| s.position))
        .unwrap_or_default();
    let scale = config
        .scale
        .or_else(|| scope.and_then(|s| s.scale))
        .unwrap_or_default();
    (position, scale)
}

pub fn resolve_playback_rate(
    config: &FlipConfig,
    scope: Option<&ScopeConfig>,
    defaults: &FlipDefaults,
) -> f64 {
    config
        .playback_rate
        .or_else(|| scope.and_then(|s| s.playback_rate))
        .unwrap_or(defaults.playback_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split() {
        let defaults = FlipDefaults::default();
        assert_eq!(defaults.enter.duration_ms, 210.0);
        assert_eq!(defaults.enter.delay_ms, 90.0);
        assert_eq!(defaults.update.duration_ms, 300.0);
        assert_eq!(defaults.update.delay_ms, 0.0);
        assert_eq!(defaults.exit.duration_ms, 90.0);
        assert_eq!(defaults.exit.delay_ms, 0.0);
        assert_eq!(defaults.enter.easing, EasingFunction::ENTER);
        assert_eq!(defaults.exit.easing, EasingFunction::EXIT);
    }

    #[test]
    fn test_inherit_falls_through_to_global() {
        let defaults = FlipDefaults::default();
        let resolved = resolve(Phase::Update, &FlipConfig::new(), None, &defaults);
        assert_eq!(resolved, defaults.update);
    }

    #[test]
    fn test_disabled_keeps_styles() {
        let defaults = FlipDefaults::default();
        let config = FlipConfig::new().with_exit(false);
        let resolved = resolve(Phase::Exit, &config, None, &defaults);
        assert_eq!(resolved.duration_ms, 0.0);
        assert_eq!(resolved.delay_ms, 0.0);
        assert_eq!(resolved.styles, defaults.exit.styles);
    }

    #[test]
    fn test_override_merges_over_scope() {
        let defaults = FlipDefaults::default();
        let scope = ScopeConfig {
            update: AnimationOverrides::default()
                .with_duration(500.0)
                .with_easing(EasingFunction::Linear)
                .into(),
            ..ScopeConfig::default()
        };
        let config = FlipConfig::new().with_update(AnimationOverrides::default().with_delay(20.0));

        let resolved = resolve(Phase::Update, &config, Some(&scope), &defaults);
        assert_eq!(resolved.duration_ms, 500.0);
        assert_eq!(resolved.delay_ms, 20.0);
        assert_eq!(resolved.easing, EasingFunction::Linear);
        assert_eq!(resolved.styles, defaults.update.styles);
    }

    #[test]
    fn test_styles_replaced_wholesale() {
        let defaults = FlipDefaults::default();
        let styles = style_map([("color", StyleTarget::Auto)]);
        let config = FlipConfig::new()
            .with_update(AnimationOverrides::default().with_styles(styles.clone()));
        let resolved = resolve(Phase::Update, &config, None, &defaults);
        assert_eq!(resolved.styles, styles);
        assert!(!resolved.styles.contains_key("opacity"));
    }

    #[test]
    fn test_scope_disable_and_node_override() {
        let defaults = FlipDefaults::default();
        let scope = ScopeConfig {
            enter: PhaseOverride::Disabled,
            ..ScopeConfig::default()
        };
        let config = FlipConfig::new().with_enter(true);
        let resolved = resolve(Phase::Enter, &config, Some(&scope), &defaults);
        assert_eq!(resolved.duration_ms, 0.0);

        let config =
            FlipConfig::new().with_enter(AnimationOverrides::default().with_duration(100.0));
        let resolved = resolve(Phase::Enter, &config, Some(&scope), &defaults);
        assert_eq!(resolved.duration_ms, 100.0);
    }

    #[test]
    fn test_globally_disabled() {
        let defaults = FlipDefaults {
            enabled: false,
            ..FlipDefaults::default()
        };
        let config =
            FlipConfig::new().with_update(AnimationOverrides::default().with_duration(800.0));
        assert_eq!(resolve(Phase::Update, &config, None, &defaults).duration_ms, 0.0);
    }

    #[test]
    fn test_axes_resolution() {
        let scope = ScopeConfig {
            position: Some(Axes::Both),
            ..ScopeConfig::default()
        };
        let (position, scale) = resolve_axes(&FlipConfig::new(), Some(&scope));
        assert_eq!(position, Axes::Both);
        assert_eq!(scale, Axes::None);

        let (position, _) = resolve_axes(&FlipConfig::new().with_position(Axes::Y), Some(&scope));
        assert!(!position.x());
        assert!(position.y());
    }

    #[test]
    fn test_playback_rate_resolution() {
        let defaults = FlipDefaults::default();
        assert_eq!(resolve_playback_rate(&FlipConfig::new(), None, &defaults), 1.0);
        let config = FlipConfig::new().with_playback_rate(0.5);
        assert_eq!(resolve_playback_rate(&config, None, &defaults), 0.5);
    }

    #[test]
    fn test_from_settings() {
        let settings = FlipSettings {
            enabled: false,
            duration_ms: 1000.0,
            playback_rate: 2.0,
        };
        let defaults = FlipDefaults::from_settings(&settings);
        assert!(!defaults.enabled);
        assert_eq!(defaults.playback_rate, 2.0);
        assert_eq!(defaults.enter.delay_ms, 300.0);
        assert_eq!(defaults.exit.duration_ms, 300.0);
    }

    #[test]
    fn test_config_deserialization() {
        let config: FlipConfig = serde_json::from_value(serde_json::json!({
            "group": "tabs",
            "position": true,
            "scale": "x",
            "enter": false,
            "update": { "duration_ms": 120.0, "styles": { "opacity": true, "color": "red" } },
        }))
        .unwrap();

        assert_eq!(config.group.as_deref(), Some("tabs"));
        assert_eq!(config.position, Some(Axes::Both));
        assert_eq!(config.scale, Some(Axes::X));
        assert_eq!(config.enter, PhaseOverride::Disabled);
        assert!(config.exit.is_inherit());
        match &config.update {
            PhaseOverride::Override(overrides) => {
                assert_eq!(overrides.duration_ms, Some(120.0));
                let styles = overrides.styles.as_ref().unwrap();
                assert_eq!(styles["opacity"], StyleTarget::Auto);
                assert_eq!(styles["color"], StyleTarget::value("red"));
            }
            other => panic!("expected override, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_axis_rejected() {
        let result: Result<Axes, _> = serde_json::from_value(serde_json::json!("z"));
        assert!(result.is_err());
    }
}
