//! Session record data structures
//!
//! Field names follow the content script's wire format (`hasForm`, `interactive`, ...).
//! Keys the core doesn't interpret are kept verbatim so a stored record reads back
//! exactly as the content script sent it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Page-structure flags reported by the content script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStructure {
    #[serde(default, deserialize_with = "truthy")]
    pub has_form: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub has_products: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub has_navigation: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub has_content: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub has_login: bool,
    /// Everything else the content script attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One element the content script found on the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Element category (`form`, `content`, `button`, ...)
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "truthy")]
    pub interactive: bool,
    /// Nesting depth in the DOM
    #[serde(default, deserialize_with = "lenient_depth")]
    pub depth: u32,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ElementDescriptor {
    pub fn new(kind: impl Into<String>, interactive: bool, depth: u32) -> Self {
        Self {
            kind: kind.into(),
            interactive,
            depth,
            attributes: Map::new(),
        }
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Payload of an `ANALYZE_WEBSITE` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub structure: PageStructure,
    #[serde(default)]
    pub elements: Vec<ElementDescriptor>,
    #[serde(default)]
    pub navigation: Value,
}

/// Snapshot of the last analysis performed for a tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Address of the analyzed page
    #[serde(rename = "url")]
    pub source_url: String,
    /// When the analysis was received
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
    pub structure: PageStructure,
    pub elements: Vec<ElementDescriptor>,
    /// Navigation graph, opaque to the core
    pub navigation: Value,
}

impl SessionRecord {
    pub fn new(input: AnalysisInput) -> Self {
        Self::captured(input, Utc::now())
    }

    pub fn captured(input: AnalysisInput, captured_at: DateTime<Utc>) -> Self {
        Self {
            source_url: input.url,
            captured_at,
            structure: input.structure,
            elements: input.elements,
            navigation: input.navigation,
        }
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

/// Accept the loose truthiness the page scripts produce (`1`, `"yes"`, `null`, ...)
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Missing, negative or non-numeric depths count as zero
fn lenient_depth<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let depth = value
        .as_f64()
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.min(u32::MAX as f64) as u32)
        .unwrap_or(0);
    Ok(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structure_flags_and_extras() {
        let structure: PageStructure = serde_json::from_value(json!({
            "hasForm": true,
            "hasProducts": 3,
            "hasLogin": null,
            "title": "Shop"
        }))
        .unwrap();

        assert!(structure.has_form);
        assert!(structure.has_products);
        assert!(!structure.has_login);
        assert!(!structure.has_navigation);
        assert_eq!(structure.extra.get("title"), Some(&json!("Shop")));
    }

    #[test]
    fn test_element_defaults() {
        let element: ElementDescriptor =
            serde_json::from_value(json!({ "type": "button", "selector": "#buy" })).unwrap();

        assert_eq!(element.kind, "button");
        assert!(!element.interactive);
        assert_eq!(element.depth, 0);
        assert_eq!(element.attributes.get("selector"), Some(&json!("#buy")));

        let negative: ElementDescriptor =
            serde_json::from_value(json!({ "type": "div", "depth": -4 })).unwrap();
        assert_eq!(negative.depth, 0);
    }

    #[test]
    fn test_record_wire_format() {
        let input: AnalysisInput = serde_json::from_value(json!({
            "url": "https://shop.example.com",
            "structure": { "hasForm": true },
            "elements": [{ "type": "form", "interactive": true, "depth": 2 }],
            "navigation": { "links": ["/cart"] }
        }))
        .unwrap();

        let captured_at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let record = SessionRecord::captured(input, captured_at);
        let wire = serde_json::to_value(&record).unwrap();

        assert_eq!(wire["url"], "https://shop.example.com");
        assert_eq!(wire["timestamp"], 1_700_000_000_000i64);
        assert_eq!(wire["elements"][0]["type"], "form");
        assert_eq!(wire["navigation"]["links"][0], "/cart");

        let back: SessionRecord = serde_json::from_value(wire).unwrap();
        assert_eq!(back, record);
    }
}
