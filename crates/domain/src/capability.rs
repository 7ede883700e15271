//! Model capability tags used to gate case execution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A capability a model may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTag {
    /// Plain text chat. Every model has it.
    Text,
    /// Accepts image parts in user messages.
    Vision,
}

impl fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Vision => write!(f, "vision"),
        }
    }
}

/// The tags a model was found to support. Always contains [`CapabilityTag::Text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<CapabilityTag>);

impl CapabilitySet {
    /// Text only.
    pub fn text_only() -> Self {
        Self(BTreeSet::from([CapabilityTag::Text]))
    }

    /// Text plus vision.
    pub fn with_vision() -> Self {
        Self(BTreeSet::from([CapabilityTag::Text, CapabilityTag::Vision]))
    }

    /// Whether `tag` is present.
    pub fn contains(&self, tag: CapabilityTag) -> bool {
        self.0.contains(&tag)
    }

    /// Whether every tag in `required` is present.
    pub fn satisfies(&self, required: &BTreeSet<CapabilityTag>) -> bool {
        required.is_subset(&self.0)
    }

    /// Tags in stable order.
    pub fn iter(&self) -> impl Iterator<Item = CapabilityTag> + '_ {
        self.0.iter().copied()
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::text_only()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = self.iter().map(|t| t.to_string()).collect();
        write!(f, "{{{}}}", tags.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_rejects_vision_requirement() {
        let required = BTreeSet::from([CapabilityTag::Vision]);
        assert!(!CapabilitySet::text_only().satisfies(&required));
        assert!(CapabilitySet::with_vision().satisfies(&required));
    }

    #[test]
    fn test_empty_requirement_always_satisfied() {
        assert!(CapabilitySet::text_only().satisfies(&BTreeSet::new()));
    }

    #[test]
    fn test_display() {
        assert_eq!(CapabilitySet::with_vision().to_string(), "{text, vision}");
    }
}
