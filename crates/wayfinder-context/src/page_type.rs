//! Page classification
//!
//! First match wins:
//! ```text
//! form + products        -> ecommerce
//! navigation + content   -> content
//! login or form          -> form
//! otherwise              -> general
//! ```

use serde::{Deserialize, Serialize};
use wayfinder_session::PageStructure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Ecommerce,
    Content,
    Form,
    General,
}

impl PageType {
    pub fn classify(structure: &PageStructure) -> Self {
        if structure.has_form && structure.has_products {
            PageType::Ecommerce
        } else if structure.has_navigation && structure.has_content {
            PageType::Content
        } else if structure.has_login || structure.has_form {
            PageType::Form
        } else {
            PageType::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Ecommerce => "ecommerce",
            PageType::Content => "content",
            PageType::Form => "form",
            PageType::General => "general",
        }
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
