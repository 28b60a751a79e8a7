//! Context derivation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wayfinder_session::{ElementDescriptor, SessionRecord};

use crate::page_type::PageType;

/// How many elements make it into `primary_elements`
pub const PRIMARY_ELEMENT_LIMIT: usize = 10;

const MAX_COMPLEXITY: u32 = 10;
const COMPLEXITY_DIVISOR: u32 = 5;

/// Summary of a page handed to the backend with each query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub page_type: PageType,
    pub primary_elements: Vec<ElementDescriptor>,
    pub navigation_paths: Value,
    pub forms: Vec<ElementDescriptor>,
    pub interactive_elements: Vec<ElementDescriptor>,
    pub content_areas: Vec<ElementDescriptor>,
    /// 0 (trivial) to 10 (very busy page)
    #[serde(rename = "estimatedComplexity")]
    pub complexity_score: u32,
}

pub fn build(record: &SessionRecord) -> Context {
    let elements = &record.elements;

    Context {
        page_type: PageType::classify(&record.structure),
        primary_elements: elements.iter().take(PRIMARY_ELEMENT_LIMIT).cloned().collect(),
        navigation_paths: record.navigation.clone(),
        forms: filtered(elements, |e| e.is_kind("form")),
        interactive_elements: filtered(elements, |e| e.interactive),
        content_areas: filtered(elements, |e| e.is_kind("content")),
        complexity_score: complexity_score(elements),
    }
}

/// `floor((interactive + max_depth) / 5)`, capped at 10
pub fn complexity_score(elements: &[ElementDescriptor]) -> u32 {
    let interactive = elements.iter().filter(|e| e.interactive).count() as u64;
    let max_depth = elements.iter().map(|e| e.depth).max().unwrap_or(0) as u64;

    let raw = (interactive + max_depth) / COMPLEXITY_DIVISOR as u64;
    raw.min(MAX_COMPLEXITY as u64) as u32
}

fn filtered<F>(elements: &[ElementDescriptor], keep: F) -> Vec<ElementDescriptor>
where
    F: Fn(&ElementDescriptor) -> bool,
{
    elements.iter().filter(|e| keep(e)).cloned().collect()
}
