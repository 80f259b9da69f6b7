//! Scene and controller options
//!
//! Options arrive as patches ([`SceneOptions`], [`ControllerOptions`]) that
//! may come from code (builder methods) or from a config file (serde). Values
//! are validated when applied; an invalid value is logged and replaced by the
//! default from the stage's [`OptionRegistry`].

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use indexmap::IndexMap;
use scrollscene_host::{Container, Dom, ElementId};
use serde::de::{self, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StageError};
use crate::log::LogLevel;

// ============================================================================
// Element References
// ============================================================================

/// An element given by handle or by selector
#[derive(Clone, Debug, PartialEq)]
pub enum ElementRef {
    Element(ElementId),
    Elements(Vec<ElementId>),
    Selector(String),
}

impl ElementRef {
    /// Every live element this reference names, in document order for selectors
    pub fn resolve_all(&self, dom: &dyn Dom) -> Vec<ElementId> {
        match self {
            ElementRef::Element(id) => [*id].into_iter().filter(|id| dom.exists(*id)).collect(),
            ElementRef::Elements(ids) => ids.iter().copied().filter(|id| dom.exists(*id)).collect(),
            ElementRef::Selector(selector) => dom.query(selector),
        }
    }

    /// The first element this reference names
    pub fn resolve(&self, dom: &dyn Dom) -> Option<ElementId> {
        self.resolve_all(dom).into_iter().next()
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRef::Element(id) => write!(f, "{:?}", id),
            ElementRef::Elements(ids) => write!(f, "{:?}", ids),
            ElementRef::Selector(selector) => f.write_str(selector),
        }
    }
}

impl From<ElementId> for ElementRef {
    fn from(id: ElementId) -> Self {
        ElementRef::Element(id)
    }
}

impl From<Vec<ElementId>> for ElementRef {
    fn from(ids: Vec<ElementId>) -> Self {
        ElementRef::Elements(ids)
    }
}

impl From<&str> for ElementRef {
    fn from(selector: &str) -> Self {
        ElementRef::Selector(selector.to_string())
    }
}

impl From<String> for ElementRef {
    fn from(selector: String) -> Self {
        ElementRef::Selector(selector)
    }
}

impl<'de> Deserialize<'de> for ElementRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(ElementRef::Selector)
    }
}

/// The scroll container of a controller
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ContainerRef {
    #[default]
    Window,
    Element(ElementId),
    Selector(String),
}

impl ContainerRef {
    /// Resolve to a host container; `None` when the element cannot be found
    pub fn resolve(&self, dom: &dyn Dom) -> Option<Container> {
        match self {
            ContainerRef::Window => Some(Container::Window),
            ContainerRef::Element(id) => dom.exists(*id).then_some(Container::Element(*id)),
            ContainerRef::Selector(selector) => {
                dom.query(selector).first().copied().map(Container::Element)
            }
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRef::Window => f.write_str("window"),
            ContainerRef::Element(id) => write!(f, "{:?}", id),
            ContainerRef::Selector(selector) => f.write_str(selector),
        }
    }
}

impl From<ElementId> for ContainerRef {
    fn from(id: ElementId) -> Self {
        ContainerRef::Element(id)
    }
}

impl From<&str> for ContainerRef {
    fn from(selector: &str) -> Self {
        match selector {
            "window" => ContainerRef::Window,
            other => ContainerRef::Selector(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for ContainerRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ContainerRef::from(raw.as_str()))
    }
}

// ============================================================================
// Duration
// ============================================================================

/// Computes a duration from the controller's viewport size
pub type DurationFn = Rc<dyn Fn(f64) -> f64>;

/// Length of a scene's active scroll window
#[derive(Clone)]
pub enum SceneDuration {
    /// Pixels
    Fixed(f64),
    /// Percent of the controller's viewport size, re-resolved on refresh
    PercentOfViewport(f64),
    /// Arbitrary function of the viewport size, re-resolved on refresh
    Computed(DurationFn),
}

impl SceneDuration {
    /// Whether the value must be re-evaluated on refresh
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, SceneDuration::Fixed(_))
    }

    /// Resolve against a viewport size (0 while detached)
    pub fn evaluate(&self, viewport_size: f64) -> f64 {
        match self {
            SceneDuration::Fixed(v) => *v,
            SceneDuration::PercentOfViewport(pct) => viewport_size * pct / 100.0,
            SceneDuration::Computed(f) => f(viewport_size),
        }
    }

    /// Build a computed duration from a closure
    pub fn computed(f: impl Fn(f64) -> f64 + 'static) -> Self {
        SceneDuration::Computed(Rc::new(f))
    }
}

impl Default for SceneDuration {
    fn default() -> Self {
        SceneDuration::Fixed(0.0)
    }
}

impl fmt::Debug for SceneDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneDuration::Fixed(v) => write!(f, "Fixed({})", v),
            SceneDuration::PercentOfViewport(v) => write!(f, "PercentOfViewport({})", v),
            SceneDuration::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl PartialEq for SceneDuration {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SceneDuration::Fixed(a), SceneDuration::Fixed(b)) => a == b,
            (SceneDuration::PercentOfViewport(a), SceneDuration::PercentOfViewport(b)) => a == b,
            (SceneDuration::Computed(a), SceneDuration::Computed(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<f64> for SceneDuration {
    fn from(v: f64) -> Self {
        SceneDuration::Fixed(v)
    }
}

impl FromStr for SceneDuration {
    type Err = StageError;

    /// `"300"` is fixed, `"50%"` is relative to the viewport
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || StageError::invalid_option("duration", s);
        match trimmed.strip_suffix('%') {
            Some(pct) => pct
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(SceneDuration::PercentOfViewport)
                .ok_or_else(invalid),
            None => trimmed
                .parse::<f64>()
                .map(SceneDuration::Fixed)
                .map_err(|_| invalid()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for SceneDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(v) => Ok(SceneDuration::Fixed(v)),
            NumberOrText::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

impl Serialize for SceneDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SceneDuration::Fixed(v) => serializer.serialize_f64(*v),
            SceneDuration::PercentOfViewport(v) => serializer.serialize_str(&format!("{}%", v)),
            SceneDuration::Computed(_) => Err(serde::ser::Error::custom(
                "computed durations cannot be serialized",
            )),
        }
    }
}

// ============================================================================
// Trigger Hook
// ============================================================================

/// Fraction of the viewport at which a trigger element fires
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TriggerHook {
    /// 1: bottom edge of the viewport
    OnEnter,
    /// 0.5: viewport center
    #[default]
    OnCenter,
    /// 0: top edge of the viewport
    OnLeave,
    Ratio(f64),
}

impl TriggerHook {
    pub fn value(&self) -> f64 {
        match self {
            TriggerHook::OnEnter => 1.0,
            TriggerHook::OnCenter => 0.5,
            TriggerHook::OnLeave => 0.0,
            TriggerHook::Ratio(v) => *v,
        }
    }

    /// Clamp ratios into `[0, 1]`; a NaN ratio is invalid
    pub fn validate(self) -> Result<Self> {
        match self {
            TriggerHook::Ratio(v) if v.is_nan() => {
                Err(StageError::invalid_option("triggerHook", v))
            }
            TriggerHook::Ratio(v) => Ok(TriggerHook::Ratio(v.clamp(0.0, 1.0))),
            named => Ok(named),
        }
    }
}

impl From<f64> for TriggerHook {
    fn from(v: f64) -> Self {
        TriggerHook::Ratio(v)
    }
}

impl FromStr for TriggerHook {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "onEnter" => Ok(TriggerHook::OnEnter),
            "onCenter" => Ok(TriggerHook::OnCenter),
            "onLeave" => Ok(TriggerHook::OnLeave),
            other => other
                .parse::<f64>()
                .map(TriggerHook::Ratio)
                .map_err(|_| StageError::invalid_option("triggerHook", s)),
        }
    }
}

impl fmt::Display for TriggerHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerHook::OnEnter => f.write_str("onEnter"),
            TriggerHook::OnCenter => f.write_str("onCenter"),
            TriggerHook::OnLeave => f.write_str("onLeave"),
            TriggerHook::Ratio(v) => write!(f, "{}", v),
        }
    }
}

impl<'de> Deserialize<'de> for TriggerHook {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(v) => Ok(TriggerHook::Ratio(v)),
            NumberOrText::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

impl Serialize for TriggerHook {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TriggerHook::Ratio(v) => serializer.serialize_f64(*v),
            named => serializer.serialize_str(&named.to_string()),
        }
    }
}

// ============================================================================
// Option Identity and Values
// ============================================================================

/// Names a scene option, built-in or registered
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SceneOption {
    Duration,
    Offset,
    TriggerElement,
    TriggerHook,
    Reverse,
    LogLevel,
    Custom(Rc<str>),
}

impl SceneOption {
    pub const BUILT_IN: [&'static str; 6] = [
        "duration",
        "offset",
        "triggerElement",
        "triggerHook",
        "reverse",
        "loglevel",
    ];

    pub fn name(&self) -> &str {
        match self {
            SceneOption::Duration => "duration",
            SceneOption::Offset => "offset",
            SceneOption::TriggerElement => "triggerElement",
            SceneOption::TriggerHook => "triggerHook",
            SceneOption::Reverse => "reverse",
            SceneOption::LogLevel => "loglevel",
            SceneOption::Custom(name) => name,
        }
    }

    /// Whether changing this option moves the scroll window
    pub fn shifts(&self) -> bool {
        matches!(
            self,
            SceneOption::Duration | SceneOption::Offset | SceneOption::TriggerHook
        )
    }
}

impl fmt::Display for SceneOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scalar value of a registered custom option
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl OptionValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{}", v),
            OptionValue::Number(v) => write!(f, "{}", v),
            OptionValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Number(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

// ============================================================================
// Scene Options
// ============================================================================

/// A partial set of scene options
///
/// `None` fields keep the current (or default) value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    pub duration: Option<SceneDuration>,
    pub offset: Option<f64>,
    #[serde(alias = "triggerElement")]
    pub trigger_element: Option<ElementRef>,
    #[serde(alias = "triggerHook")]
    pub trigger_hook: Option<TriggerHook>,
    pub reverse: Option<bool>,
    pub loglevel: Option<LogLevel>,
    /// Registered custom options; anything else is warned about and dropped
    #[serde(flatten)]
    pub extra: IndexMap<String, OptionValue>,
}

impl SceneOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, duration: impl Into<SceneDuration>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn trigger_element(mut self, element: impl Into<ElementRef>) -> Self {
        self.trigger_element = Some(element.into());
        self
    }

    pub fn trigger_hook(mut self, hook: impl Into<TriggerHook>) -> Self {
        self.trigger_hook = Some(hook.into());
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = Some(reverse);
        self
    }

    pub fn loglevel(mut self, level: LogLevel) -> Self {
        self.loglevel = Some(level);
        self
    }

    /// Set a registered custom option
    pub fn custom(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.extra.insert(name.to_string(), value.into());
        self
    }
}

// ============================================================================
// Controller Options
// ============================================================================

/// Controller configuration
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerOptions {
    pub container: ContainerRef,
    pub vertical: bool,
    /// Applied to every scene added to the controller
    #[serde(alias = "globalSceneOptions")]
    pub global_scene_options: SceneOptions,
    pub loglevel: LogLevel,
    /// Milliseconds between refresh passes; 0 disables
    #[serde(alias = "refreshInterval")]
    pub refresh_interval: u32,
    /// Keys nobody recognises; warned about at construction
    #[serde(flatten)]
    pub unknown: IndexMap<String, IgnoredAny>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            container: ContainerRef::Window,
            vertical: true,
            global_scene_options: SceneOptions::default(),
            loglevel: LogLevel::Warn,
            refresh_interval: 100,
            unknown: IndexMap::new(),
        }
    }
}

impl ControllerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(mut self, container: impl Into<ContainerRef>) -> Self {
        self.container = container.into();
        self
    }

    pub fn vertical(mut self, vertical: bool) -> Self {
        self.vertical = vertical;
        self
    }

    pub fn global_scene_options(mut self, options: SceneOptions) -> Self {
        self.global_scene_options = options;
        self
    }

    pub fn loglevel(mut self, level: LogLevel) -> Self {
        self.loglevel = level;
        self
    }

    pub fn refresh_interval(mut self, ms: u32) -> Self {
        self.refresh_interval = ms;
        self
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Validates (and may normalize) a custom option value
pub type OptionValidator = Rc<dyn Fn(&OptionValue) -> std::result::Result<OptionValue, String>>;

/// A registered custom scene option
#[derive(Clone)]
pub struct CustomOption {
    pub default: OptionValue,
    pub validator: Option<OptionValidator>,
    /// Changing the option fires `shift`
    pub shifts: bool,
}

impl CustomOption {
    pub fn new(default: impl Into<OptionValue>) -> Self {
        Self {
            default: default.into(),
            validator: None,
            shifts: false,
        }
    }

    pub fn validator(
        mut self,
        f: impl Fn(&OptionValue) -> std::result::Result<OptionValue, String> + 'static,
    ) -> Self {
        self.validator = Some(Rc::new(f));
        self
    }

    pub fn shifts(mut self, shifts: bool) -> Self {
        self.shifts = shifts;
        self
    }

    /// Run the validator, if any
    pub fn validate(&self, name: &str, value: &OptionValue) -> Result<OptionValue> {
        match &self.validator {
            Some(validator) => {
                validator(value).map_err(|reason| StageError::invalid_option(name, reason))
            }
            None => Ok(value.clone()),
        }
    }
}

impl fmt::Debug for CustomOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomOption")
            .field("default", &self.default)
            .field("validator", &self.validator.is_some())
            .field("shifts", &self.shifts)
            .finish()
    }
}

/// Defaults for the built-in scene options
#[derive(Clone, Debug, PartialEq)]
pub struct SceneDefaults {
    pub duration: f64,
    pub offset: f64,
    pub trigger_hook: TriggerHook,
    pub reverse: bool,
    pub loglevel: LogLevel,
}

impl Default for SceneDefaults {
    fn default() -> Self {
        Self {
            duration: 0.0,
            offset: 0.0,
            trigger_hook: TriggerHook::OnCenter,
            reverse: true,
            loglevel: LogLevel::Warn,
        }
    }
}

/// Scene option defaults plus registered custom options
#[derive(Clone, Debug, Default)]
pub struct OptionRegistry {
    defaults: SceneDefaults,
    custom: IndexMap<Rc<str>, CustomOption>,
}

impl OptionRegistry {
    pub fn new(defaults: SceneDefaults) -> Self {
        Self {
            defaults,
            custom: IndexMap::new(),
        }
    }

    pub fn defaults(&self) -> &SceneDefaults {
        &self.defaults
    }

    /// Register a custom option; built-in and duplicate names are rejected
    pub fn add_option(&mut self, name: &str, option: CustomOption) -> Result<()> {
        if SceneOption::BUILT_IN.contains(&name) || self.custom.contains_key(name) {
            return Err(StageError::invalid_argument(
                "add_option",
                format!("option \"{}\" already exists", name),
            ));
        }
        self.custom.insert(Rc::from(name), option);
        Ok(())
    }

    /// Look up a custom option, returning its interned name too
    pub fn custom(&self, name: &str) -> Option<(&Rc<str>, &CustomOption)> {
        self.custom.get_key_value(name)
    }

    pub fn custom_options(&self) -> impl Iterator<Item = (&Rc<str>, &CustomOption)> {
        self.custom.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_parsing() {
        assert_eq!("300".parse::<SceneDuration>().unwrap(), SceneDuration::Fixed(300.0));
        assert_eq!(
            "50%".parse::<SceneDuration>().unwrap(),
            SceneDuration::PercentOfViewport(50.0)
        );
        assert!("wide".parse::<SceneDuration>().is_err());
        assert!("-5%".parse::<SceneDuration>().is_err());
        assert_eq!(SceneDuration::PercentOfViewport(50.0).evaluate(800.0), 400.0);
        assert!(SceneDuration::computed(|size| size).is_dynamic());
    }

    #[test]
    fn test_trigger_hook_aliases_and_clamp() {
        assert_eq!("onEnter".parse::<TriggerHook>().unwrap().value(), 1.0);
        assert_eq!("0.25".parse::<TriggerHook>().unwrap().value(), 0.25);
        assert!("onTop".parse::<TriggerHook>().is_err());
        assert_eq!(TriggerHook::Ratio(3.0).validate().unwrap().value(), 1.0);
        assert_eq!(TriggerHook::Ratio(-1.0).validate().unwrap().value(), 0.0);
        assert!(TriggerHook::Ratio(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_scene_options_from_toml() {
        let options: SceneOptions = toml::from_str(
            r##"
            duration = "50%"
            offset = 20
            triggerElement = "#hero"
            trigger_hook = "onLeave"
            loglevel = 3
            parallax = 0.5
            "##,
        )
        .unwrap();
        assert_eq!(options.duration, Some(SceneDuration::PercentOfViewport(50.0)));
        assert_eq!(options.offset, Some(20.0));
        assert_eq!(options.trigger_element, Some(ElementRef::from("#hero")));
        assert_eq!(options.trigger_hook, Some(TriggerHook::OnLeave));
        assert_eq!(options.loglevel, Some(LogLevel::Debug));
        assert_eq!(options.extra.get("parallax"), Some(&OptionValue::Number(0.5)));
    }

    #[test]
    fn test_controller_options_defaults_and_unknown() {
        let options: ControllerOptions = toml::from_str(
            r##"
            container = "#scroller"
            refreshInterval = 0
            bogus = true
            "##,
        )
        .unwrap();
        assert_eq!(options.container, ContainerRef::Selector("#scroller".into()));
        assert!(options.vertical);
        assert_eq!(options.refresh_interval, 0);
        assert!(options.unknown.contains_key("bogus"));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = OptionRegistry::default();
        assert!(registry.add_option("offset", CustomOption::new(0.0)).is_err());
        assert!(registry.add_option("speed", CustomOption::new(1.0)).is_ok());
        assert!(registry.add_option("speed", CustomOption::new(2.0)).is_err());

        let (name, option) = registry.custom("speed").unwrap();
        assert_eq!(&**name, "speed");
        assert_eq!(option.default, OptionValue::Number(1.0));
    }

    #[test]
    fn test_custom_validator() {
        let option = CustomOption::new(1.0).validator(|value| match value.as_f64() {
            Some(v) if v > 0.0 => Ok(OptionValue::Number(v)),
            _ => Err(format!("{} is not a positive number", value)),
        });
        assert!(option.validate("speed", &OptionValue::Number(2.0)).is_ok());
        assert!(option.validate("speed", &OptionValue::Bool(true)).is_err());
    }
}
