use nova_core::types::MemoryCategory;
use serde::{Deserialize, Serialize};

/// A candidate fact returned by the extraction operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFact {
    /// The fact as a concise sentence, e.g. "User is allergic to peanuts".
    pub fact: String,
    pub category: MemoryCategory,
}

impl ExtractedFact {
    /// Build a fact from provider output, validating the category at the
    /// boundary.
    ///
    /// An absent category defaults to `Fact`; an unrecognized one falls back
    /// to `Other`.
    pub fn from_provider(fact: impl Into<String>, category: Option<&str>) -> Self {
        let category = match category {
            Some(raw) => MemoryCategory::parse_lenient(raw),
            None => MemoryCategory::Fact,
        };
        Self {
            fact: fact.into(),
            category,
        }
    }
}
