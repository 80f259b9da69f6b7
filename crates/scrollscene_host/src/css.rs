//! CSS read/write helpers
//!
//! Values written through [`css_set`] follow the browser convention the
//! engine relies on: anything that looks numeric gets a `px` suffix, an empty
//! string removes the inline declaration.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::dom::{Dom, ElementId};
use crate::error::HostError;

/// A value written to an inline style
#[derive(Clone, Debug, PartialEq)]
pub enum CssValue {
    /// Pixel length, written as `"{n}px"`
    Px(f64),
    /// Raw text. Numeric-looking text is still suffixed with `px`.
    Text(String),
}

impl CssValue {
    /// Empty value; removes the declaration
    pub fn unset() -> Self {
        CssValue::Text(String::new())
    }

    /// The string written to the style declaration
    pub fn to_css(&self) -> String {
        match self {
            CssValue::Px(v) => format_px(*v),
            CssValue::Text(text) => {
                let trimmed = text.trim();
                match trimmed.parse::<f64>() {
                    Ok(v) if v.is_finite() => format_px(v),
                    _ => trimmed.to_string(),
                }
            }
        }
    }
}

impl From<f64> for CssValue {
    fn from(v: f64) -> Self {
        CssValue::Px(v)
    }
}

impl From<&str> for CssValue {
    fn from(v: &str) -> Self {
        CssValue::Text(v.to_string())
    }
}

impl From<String> for CssValue {
    fn from(v: String) -> Self {
        CssValue::Text(v)
    }
}

/// Format a pixel value without trailing `.0`
pub fn format_px(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}px", v as i64)
    } else {
        format!("{}px", v)
    }
}

/// Parse the leading number of a css value (`parseFloat` semantics)
///
/// Returns `None` when the value does not start with a number, e.g. `auto`.
pub fn parse_float(value: &str) -> Option<f64> {
    let value = value.trim();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in value.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    value[..end].parse::<f64>().ok()
}

/// `parse_float` that treats missing values as zero
pub fn px_or_zero(value: &str) -> f64 {
    parse_float(value).unwrap_or(0.0)
}

/// Display types whose vertical margins collapse with neighbours
pub fn is_margin_collapse_type(display: &str) -> bool {
    matches!(
        display,
        "block" | "flex" | "list-item" | "table" | "-webkit-box"
    )
}

// ============================================================================
// Lengths
// ============================================================================

/// A declared css length
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CssLength {
    Px(f64),
    Percent(f64),
    Auto,
}

impl CssLength {
    pub fn is_percent(&self) -> bool {
        matches!(self, CssLength::Percent(_))
    }
}

impl FromStr for CssLength {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "auto" {
            return Ok(CssLength::Auto);
        }
        if let Some(pct) = s.strip_suffix('%') {
            return pct
                .trim()
                .parse::<f64>()
                .map(CssLength::Percent)
                .map_err(|_| HostError::InvalidLength(s.to_string()));
        }
        let number = s.strip_suffix("px").unwrap_or(s);
        number
            .trim()
            .parse::<f64>()
            .map(CssLength::Px)
            .map_err(|_| HostError::InvalidLength(s.to_string()))
    }
}

impl fmt::Display for CssLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CssLength::Px(v) => f.write_str(&format_px(*v)),
            CssLength::Percent(v) => write!(f, "{}%", v),
            CssLength::Auto => f.write_str("auto"),
        }
    }
}

// ============================================================================
// Get / Set
// ============================================================================

/// Read one computed property
pub fn css_get(dom: &dyn Dom, id: ElementId, property: &str) -> String {
    dom.computed_style(id, property)
}

/// Read several computed properties, keeping the requested order
pub fn css_get_many(dom: &dyn Dom, id: ElementId, properties: &[&str]) -> IndexMap<String, String> {
    properties
        .iter()
        .map(|p| (p.to_string(), dom.computed_style(id, p)))
        .collect()
}

/// Write inline properties in order
pub fn css_set<'a, I, V>(dom: &dyn Dom, id: ElementId, values: I)
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: Into<CssValue>,
{
    for (property, value) in values {
        dom.set_inline_style(id, property, &value.into().to_css());
    }
}

/// Write a previously captured set of inline declarations verbatim
pub fn css_restore(dom: &dyn Dom, id: ElementId, values: &IndexMap<String, String>) {
    for (property, value) in values {
        dom.set_inline_style(id, property, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_text_gets_px() {
        assert_eq!(CssValue::from("12").to_css(), "12px");
        assert_eq!(CssValue::from("auto").to_css(), "auto");
        assert_eq!(CssValue::from(0.0).to_css(), "0px");
        assert_eq!(CssValue::from(12.5).to_css(), "12.5px");
        assert_eq!(CssValue::unset().to_css(), "");
        assert_eq!(CssValue::from("50%").to_css(), "50%");
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float("12px"), Some(12.0));
        assert_eq!(parse_float("-3.5em"), Some(-3.5));
        assert_eq!(parse_float("auto"), None);
        assert_eq!(parse_float(""), None);
        assert_eq!(px_or_zero("auto"), 0.0);
    }

    #[test]
    fn test_css_length() {
        assert_eq!("50%".parse::<CssLength>().unwrap(), CssLength::Percent(50.0));
        assert_eq!("120px".parse::<CssLength>().unwrap(), CssLength::Px(120.0));
        assert_eq!("auto".parse::<CssLength>().unwrap(), CssLength::Auto);
        assert!("wide".parse::<CssLength>().is_err());
    }

    #[test]
    fn test_margin_collapse_types() {
        assert!(is_margin_collapse_type("block"));
        assert!(!is_margin_collapse_type("inline-block"));
    }
}
