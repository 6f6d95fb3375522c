//! Popup definitions and their evaluation
//!
//! A `Popup` pairs one located feature with the formatting rules its layer
//! exposes. A `PopupManager` is the per-presentation evaluation of a popup:
//! interpolated title plus the visible rows in definition order. Managers
//! are constructed anew each time the popup viewer is revealed.

use crate::engine::GeoFeature;
use std::collections::HashMap;

/// Attribute fields commonly used as a display name, checked in order when
/// a feature has no popup definition of its own.
const DISPLAY_FIELD_CANDIDATES: &[&str] = &["NAME", "Name", "name", "TITLE", "Title", "title"];

/// Formatting hints for one popup field
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldFormat {
    /// Number of decimal places for numeric values
    pub places: Option<u8>,
    /// Insert thousands separators into numeric values
    pub digit_separator: bool,
    /// Treat the value as epoch milliseconds and render a calendar date
    pub date: bool,
}

/// One field entry of a popup definition
#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo {
    /// Attribute name in the feature's attribute map
    pub field_name: String,
    /// Human-readable label; falls back to the field name when empty
    pub label: String,
    /// Hidden fields are kept in the definition but never rendered
    pub visible: bool,
    /// Optional formatting hints
    pub format: Option<FieldFormat>,
}

impl FieldInfo {
    pub fn new(field_name: impl Into<String>) -> Self {
        let field_name = field_name.into();
        FieldInfo {
            label: field_name.clone(),
            field_name,
            visible: true,
            format: None,
        }
    }

    /// Label to render for this field
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.field_name
        } else {
            &self.label
        }
    }
}

/// Formatting rules a layer exposes for its features
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PopupDefinition {
    /// Title template with `{field}` placeholders
    pub title: String,
    /// Ordered field list
    pub fields: Vec<FieldInfo>,
}

/// A display-ready pairing of a feature and a popup definition
#[derive(Clone, Debug)]
pub struct Popup {
    feature: GeoFeature,
    definition: PopupDefinition,
}

impl Popup {
    /// Pair a feature with its layer's popup definition
    pub fn new(feature: GeoFeature, definition: PopupDefinition) -> Self {
        Popup { feature, definition }
    }

    /// Default popup for a feature whose layer exposes no popup definition:
    /// every attribute becomes a visible row, and the title is guessed from
    /// common display fields (falling back to the layer name).
    pub fn from_feature(feature: GeoFeature) -> Self {
        let title = DISPLAY_FIELD_CANDIDATES
            .iter()
            .copied()
            .find_map(|name| feature.attribute(name))
            .map(format_value)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| feature.layer_name().to_string());

        let fields = feature
            .attributes()
            .keys()
            .map(|name| FieldInfo::new(name.clone()))
            .collect();

        Popup {
            feature,
            definition: PopupDefinition { title, fields },
        }
    }

    #[inline]
    pub fn feature(&self) -> &GeoFeature {
        &self.feature
    }

    #[inline]
    pub fn definition(&self) -> &PopupDefinition {
        &self.definition
    }

    /// Title with `{field}` placeholders interpolated from the feature's
    /// attributes. An un-renderable template is kept verbatim; an empty
    /// render falls back to the layer name.
    pub fn evaluated_title(&self) -> String {
        let vars: HashMap<String, String> = self
            .feature
            .attributes()
            .iter()
            .map(|(k, v)| (k.clone(), format_value(v)))
            .collect();

        let title = strfmt::strfmt(&self.definition.title, &vars)
            .unwrap_or_else(|_| self.definition.title.clone());

        if title.trim().is_empty() {
            self.feature.layer_name().to_string()
        } else {
            title
        }
    }
}

/// Per-presentation evaluation of a popup: the interpolated title and the
/// visible rows in definition order, with field formats applied.
#[derive(Clone, Debug)]
pub struct PopupManager {
    title: String,
    layer_name: String,
    rows: Vec<(String, String)>,
}

impl PopupManager {
    pub fn new(popup: &Popup) -> Self {
        let title = popup.evaluated_title();
        let layer_name = popup.feature().layer_name().to_string();

        let rows = popup
            .definition()
            .fields
            .iter()
            .filter(|f| f.visible)
            .map(|f| {
                let raw = popup.feature().attribute(&f.field_name);
                let value = match (&f.format, raw) {
                    (Some(format), Some(value)) => format_with_hints(value, format),
                    (None, Some(value)) => format_value(value),
                    (_, None) => String::new(),
                };
                (f.display_label().to_string(), value)
            })
            .collect();

        PopupManager {
            title,
            layer_name,
            rows,
        }
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    /// Visible rows as (label, formatted value), in definition order
    #[inline]
    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }
}

/// Render a raw attribute value without formatting hints
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Render a raw attribute value honoring the field's formatting hints
fn format_with_hints(value: &serde_json::Value, format: &FieldFormat) -> String {
    if format.date {
        if let Some(millis) = value.as_i64() {
            return format_epoch_millis(millis);
        }
    }

    if let Some(n) = value.as_f64() {
        let mut text = match format.places {
            Some(places) => format!("{:.*}", places as usize, n),
            None => format_value(value),
        };
        if format.digit_separator {
            text = insert_digit_separators(&text);
        }
        return text;
    }

    format_value(value)
}

/// Insert comma separators into the integer part of a numeric string
fn insert_digit_separators(text: &str) -> String {
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Render epoch milliseconds as a `YYYY-MM-DD` calendar date (UTC).
fn format_epoch_millis(millis: i64) -> String {
    // Civil-from-days conversion; days are relative to 1970-01-01.
    let days = millis.div_euclid(86_400_000);
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{y:04}-{m:02}-{d:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};

    fn feature(attrs: &[(&str, serde_json::Value)]) -> GeoFeature {
        GeoFeature::new(
            Geometry::Point(Point::new(1.0, 2.0)),
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            "Test Layer",
        )
        .unwrap()
    }

    #[test]
    fn title_interpolates_placeholders() {
        let popup = Popup::new(
            feature(&[
                ("CITY", serde_json::json!("Lisbon")),
                ("COUNTRY", serde_json::json!("Portugal")),
            ]),
            PopupDefinition {
                title: "{CITY} ({COUNTRY})".into(),
                fields: vec![],
            },
        );
        assert_eq!(popup.evaluated_title(), "Lisbon (Portugal)");
    }

    #[test]
    fn empty_title_falls_back_to_layer_name() {
        let popup = Popup::new(
            feature(&[("CITY", serde_json::json!(""))]),
            PopupDefinition {
                title: "{CITY}".into(),
                fields: vec![],
            },
        );
        assert_eq!(popup.evaluated_title(), "Test Layer");
    }

    #[test]
    fn manager_preserves_order_and_skips_hidden_fields() {
        let mut hidden = FieldInfo::new("SECRET");
        hidden.visible = false;
        let mut labeled = FieldInfo::new("POP");
        labeled.label = "Population".into();

        let popup = Popup::new(
            feature(&[
                ("POP", serde_json::json!(504718)),
                ("SECRET", serde_json::json!("classified")),
                ("CITY", serde_json::json!("Lisbon")),
            ]),
            PopupDefinition {
                title: "{CITY}".into(),
                fields: vec![FieldInfo::new("CITY"), labeled, hidden],
            },
        );

        let manager = PopupManager::new(&popup);
        assert_eq!(manager.title(), "Lisbon");
        assert_eq!(
            manager.rows(),
            &[
                ("CITY".to_string(), "Lisbon".to_string()),
                ("Population".to_string(), "504718".to_string()),
            ]
        );
    }

    #[test]
    fn default_popup_lists_all_attributes() {
        let popup = Popup::from_feature(feature(&[
            ("NAME", serde_json::json!("Lisbon")),
            ("POP", serde_json::json!(504718)),
        ]));

        assert_eq!(popup.evaluated_title(), "Lisbon");
        let manager = PopupManager::new(&popup);
        assert_eq!(manager.rows().len(), 2);
    }

    #[test]
    fn default_popup_without_display_field_uses_layer_name() {
        let popup = Popup::from_feature(feature(&[("POP", serde_json::json!(1))]));
        assert_eq!(popup.evaluated_title(), "Test Layer");
    }

    #[test]
    fn numeric_format_hints_apply() {
        let format = FieldFormat {
            places: Some(1),
            digit_separator: true,
            date: false,
        };
        assert_eq!(
            format_with_hints(&serde_json::json!(1234567.89), &format),
            "1,234,567.9"
        );
        assert_eq!(insert_digit_separators("-1234"), "-1,234");
    }

    #[test]
    fn date_format_hint_renders_calendar_date() {
        let format = FieldFormat {
            date: true,
            ..Default::default()
        };
        // 2020-01-01T00:00:00Z
        assert_eq!(
            format_with_hints(&serde_json::json!(1_577_836_800_000_i64), &format),
            "2020-01-01"
        );
        // Pre-epoch dates round toward earlier days
        assert_eq!(format_epoch_millis(-86_400_000), "1969-12-31");
    }
}
