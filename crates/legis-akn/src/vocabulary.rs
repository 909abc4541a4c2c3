//! Canonical vocabulary mapping for discovered element types.
//!
//! The oracle labels hierarchy units with free-form strings ("chapter",
//! "regulation", "artikel"). Serialization needs the fixed AKN element
//! set, so discovered labels are routed through a total mapping: exact
//! vocabulary match, then a jurisdiction alias table, then a structural
//! fallback that the serializer renders as a generically named container.

use std::collections::HashMap;

/// Hierarchical element names native to Akoma Ntoso 3.0.
pub const AKN_HIERARCHY: &[&str] = &[
    "alinea",
    "article",
    "book",
    "chapter",
    "clause",
    "division",
    "indent",
    "level",
    "list",
    "paragraph",
    "part",
    "point",
    "proviso",
    "rule",
    "section",
    "subchapter",
    "subclause",
    "subdivision",
    "sublist",
    "subparagraph",
    "subpart",
    "subrule",
    "subsection",
    "subtitle",
    "title",
    "tome",
    "transitional",
];

/// Maps raw oracle type strings to canonical element names.
///
/// The mapping is pure and total: unknown input always degrades to the
/// fallback pair `(raw, false)`, it never fails.
#[derive(Debug, Clone)]
pub struct TypeMapper {
    aliases: HashMap<String, String>,
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMapper {
    /// Mapper with the built-in jurisdiction alias table.
    #[must_use]
    pub fn new() -> Self {
        let mut aliases = HashMap::new();
        // Statutory Instruments and subsidiary legislation.
        for (from, to) in [
            ("regulation", "rule"),
            ("reg", "rule"),
            ("order", "rule"),
            ("sub-section", "subsection"),
            ("sub-clause", "subclause"),
            ("sub-rule", "subrule"),
            ("sub-paragraph", "subparagraph"),
            ("schedule", "division"),
            ("annexure", "division"),
            ("explanation", "proviso"),
        ] {
            aliases.insert(from.to_string(), to.to_string());
        }
        Self { aliases }
    }

    /// Mapper with no aliases at all.
    #[must_use]
    pub fn bare() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Add or replace an alias. The target should be a native element
    /// name; the mapper reports whatever it maps to as native.
    #[must_use]
    pub fn with_alias(mut self, from: &str, to: &str) -> Self {
        self.aliases
            .insert(from.trim().to_lowercase(), to.trim().to_lowercase());
        self
    }

    /// Map a raw type string to `(canonical_name, is_native)`.
    ///
    /// `is_native = false` signals the serializer to emit a generic named
    /// container instead of a native element.
    #[must_use]
    pub fn map(&self, raw: &str) -> (String, bool) {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return ("unknown".to_string(), false);
        }
        if AKN_HIERARCHY.contains(&normalized.as_str()) {
            return (normalized, true);
        }
        if let Some(mapped) = self.aliases.get(&normalized) {
            return (mapped.clone(), true);
        }
        (normalized, false)
    }
}

/// The AKN naming-convention abbreviation used in `eId` values for a
/// native element, e.g. `chapter` -> `chp`, `section` -> `sec`.
#[must_use]
pub fn eid_abbreviation(canonical: &str) -> &str {
    match canonical {
        "alinea" => "al",
        "article" => "art",
        "chapter" => "chp",
        "clause" => "cl",
        "division" => "dvs",
        "indent" => "ind",
        "level" => "lvl",
        "paragraph" => "para",
        "proviso" => "prov",
        "section" => "sec",
        "subchapter" => "subchp",
        "subclause" => "subcl",
        "subdivision" => "subdvs",
        "subparagraph" => "subpara",
        "subsection" => "subsec",
        other => other,
    }
}
