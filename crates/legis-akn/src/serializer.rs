//! Akoma Ntoso 3.0 XML serialization.
//!
//! A deterministic depth-first walk over a hierarchy forest. Each node
//! resolves its element name through the [`TypeMapper`]; unmapped types are
//! emitted as `<hcontainer name="...">` rather than rejected. Every element
//! carries a stable `eId` built from its ancestor path, so identifiers do
//! not change across repeated serialization runs given unchanged
//! ancestry/number/type.

use std::collections::HashSet;

use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;
use tracing::debug;

use legis_core::{DocumentStructure, HierarchyNode};

use crate::vocabulary::{eid_abbreviation, TypeMapper};

/// AKN 3.0 namespace.
pub const AKN_NAMESPACE: &str = "http://docs.oasis-open.org/legaldocml/ns/akn/3.0";

/// Identifier path separator between ancestor segments.
const EID_SEPARATOR: &str = "__";

/// Serialization failures. Fatal for the document; reported with the
/// offending node's identifier path.
#[derive(Error, Debug)]
pub enum AknError {
    /// Two elements resolved to the same identifier even after numeric
    /// disambiguation.
    #[error("duplicate identifier '{0}' after disambiguation")]
    DuplicateId(String),

    /// A structurally invalid node, e.g. a non-leaf carrying content.
    #[error("invalid node at '{eid}': {reason}")]
    InvalidNode { eid: String, reason: String },

    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("serialized document is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Type alias for [`Result<T, AknError>`].
pub type Result<T> = std::result::Result<T, AknError>;

/// Options for AKN serialization.
#[derive(Debug, Clone)]
pub struct AknOptions {
    /// FRBR expression language code (default "eng").
    pub language: String,
    /// FRBR country code; derived from the jurisdiction when `None`.
    pub country: Option<String>,
    /// Indent output with two spaces (default true).
    pub indent: bool,
}

impl Default for AknOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            country: None,
            indent: true,
        }
    }
}

/// Tree serializer: hierarchy forest + document structure -> AKN XML.
#[derive(Debug, Clone, Default)]
pub struct AknSerializer {
    mapper: TypeMapper,
    options: AknOptions,
}

impl AknSerializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(mut self, options: AknOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_mapper(mut self, mapper: TypeMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Serialize a document structure and node forest to AKN 3.0 XML.
    pub fn serialize(
        &self,
        structure: &DocumentStructure,
        nodes: &[HierarchyNode],
    ) -> Result<String> {
        let mut writer = if self.options.indent {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("akomaNtoso");
        root.push_attribute(("xmlns", AKN_NAMESPACE));
        writer.write_event(Event::Start(root))?;

        let doc_tag = doc_element(&structure.document_type);
        let mut doc_start = BytesStart::new(doc_tag);
        doc_start.push_attribute(("name", compact_name(&structure.title).as_str()));
        writer.write_event(Event::Start(doc_start))?;

        self.write_meta(&mut writer, structure, doc_tag)?;

        writer.write_event(Event::Start(BytesStart::new("body")))?;
        let mut used_eids: HashSet<String> = HashSet::new();
        for node in nodes {
            self.write_node(&mut writer, node, "", &mut used_eids)?;
        }
        writer.write_event(Event::End(BytesEnd::new("body")))?;

        writer.write_event(Event::End(BytesEnd::new(doc_tag)))?;
        writer.write_event(Event::End(BytesEnd::new("akomaNtoso")))?;

        Ok(String::from_utf8(writer.into_inner())?)
    }

    /// Metadata block: FRBR Work/Expression/Manifestation, generated once
    /// from the document structure, independent of the node tree.
    fn write_meta(
        &self,
        writer: &mut Writer<Vec<u8>>,
        structure: &DocumentStructure,
        doc_tag: &str,
    ) -> Result<()> {
        let enacted = structure
            .enactment_date
            .as_deref()
            .map(normalize_date);
        let year = enacted
            .as_deref()
            .and_then(|d| d.get(..4))
            .unwrap_or("0000")
            .to_string();
        let enacted = enacted.unwrap_or_else(|| format!("{year}-01-01"));
        let num = structure
            .number
            .as_deref()
            .map(sanitize_token)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "1".to_string());
        let country = self
            .options
            .country
            .clone()
            .unwrap_or_else(|| country_code(&structure.jurisdiction).to_string());
        let lang = &self.options.language;
        let work_uri = format!("/{country}/{doc_tag}/{year}/{num}");
        let expr_uri = format!("{work_uri}/{lang}@{enacted}");
        let today = Utc::now().format("%Y-%m-%d").to_string();

        writer.write_event(Event::Start(BytesStart::new("meta")))?;
        let mut identification = BytesStart::new("identification");
        identification.push_attribute(("source", "#source"));
        writer.write_event(Event::Start(identification))?;

        writer.write_event(Event::Start(BytesStart::new("FRBRWork")))?;
        write_empty(writer, "FRBRthis", &[("value", &format!("{work_uri}/main"))])?;
        write_empty(writer, "FRBRuri", &[("value", &work_uri)])?;
        write_empty(writer, "FRBRcountry", &[("value", &country)])?;
        write_empty(writer, "FRBRdate", &[("date", &enacted), ("name", "enacted")])?;
        write_empty(writer, "FRBRnumber", &[("value", &num)])?;
        write_empty(writer, "FRBRname", &[("value", &structure.title)])?;
        writer.write_event(Event::End(BytesEnd::new("FRBRWork")))?;

        writer.write_event(Event::Start(BytesStart::new("FRBRExpression")))?;
        write_empty(writer, "FRBRthis", &[("value", &format!("{expr_uri}/main"))])?;
        write_empty(writer, "FRBRuri", &[("value", &expr_uri)])?;
        write_empty(
            writer,
            "FRBRdate",
            &[("date", &enacted), ("name", "publication")],
        )?;
        write_empty(writer, "FRBRlanguage", &[("language", lang)])?;
        writer.write_event(Event::End(BytesEnd::new("FRBRExpression")))?;

        writer.write_event(Event::Start(BytesStart::new("FRBRManifestation")))?;
        write_empty(
            writer,
            "FRBRthis",
            &[("value", &format!("{expr_uri}/main.xml"))],
        )?;
        write_empty(writer, "FRBRuri", &[("value", &format!("{expr_uri}/main.xml"))])?;
        write_empty(writer, "FRBRdate", &[("date", &today), ("name", "transform")])?;
        writer.write_event(Event::End(BytesEnd::new("FRBRManifestation")))?;

        writer.write_event(Event::End(BytesEnd::new("identification")))?;
        writer.write_event(Event::End(BytesEnd::new("meta")))?;
        Ok(())
    }

    fn write_node(
        &self,
        writer: &mut Writer<Vec<u8>>,
        node: &HierarchyNode,
        ancestor_eid: &str,
        used_eids: &mut HashSet<String>,
    ) -> Result<()> {
        let (canonical, native) = self.mapper.map(&node.kind);
        if !native {
            debug!(
                "type '{}' has no canonical mapping, emitting hcontainer",
                node.kind
            );
        }

        let abbrev = if native {
            eid_abbreviation(&canonical).to_string()
        } else {
            sanitize_token(&canonical)
        };
        let token = sanitize_token(&node.number);
        let segment = if token.is_empty() {
            abbrev
        } else {
            format!("{abbrev}_{token}")
        };
        let base = if ancestor_eid.is_empty() {
            segment
        } else {
            format!("{ancestor_eid}{EID_SEPARATOR}{segment}")
        };
        let eid = claim_eid(base, used_eids)?;

        if !node.children.is_empty() && node.content.is_some() {
            return Err(AknError::InvalidNode {
                eid,
                reason: "non-leaf node carries content".to_string(),
            });
        }

        let tag: &str = if native { &canonical } else { "hcontainer" };
        let mut start = BytesStart::new(tag);
        start.push_attribute(("eId", eid.as_str()));
        if !native {
            start.push_attribute(("name", canonical.as_str()));
        }
        writer.write_event(Event::Start(start))?;

        if !node.number.is_empty() {
            write_text_element(writer, "num", &node.number)?;
        }
        if let Some(title) = &node.title {
            write_text_element(writer, "heading", title)?;
        }

        if node.children.is_empty() {
            if let Some(content) = &node.content {
                writer.write_event(Event::Start(BytesStart::new("content")))?;
                write_text_element(writer, "p", content)?;
                writer.write_event(Event::End(BytesEnd::new("content")))?;
            }
        } else {
            for child in &node.children {
                self.write_node(writer, child, &eid, used_eids)?;
            }
        }

        writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }
}

/// Reserve an identifier, disambiguating sibling collisions with a numeric
/// suffix. A collision surviving disambiguation is fatal.
fn claim_eid(base: String, used: &mut HashSet<String>) -> Result<String> {
    if used.insert(base.clone()) {
        return Ok(base);
    }
    for n in 2..10_000u32 {
        let candidate = format!("{base}_{n}");
        if used.insert(candidate.clone()) {
            return Ok(candidate);
        }
    }
    Err(AknError::DuplicateId(base))
}

fn write_empty(writer: &mut Writer<Vec<u8>>, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut element = BytesStart::new(tag);
    for (key, value) in attrs {
        element.push_attribute((*key, *value));
    }
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// AKN document element for a discovered document type.
fn doc_element(document_type: &str) -> &'static str {
    match document_type.trim().to_lowercase().as_str() {
        "bill" => "bill",
        "judgment" => "judgment",
        // Acts, rules, regulations, orders and notifications are all
        // enacted normative text.
        "act" | "rules" | "regulation" | "regulations" | "order" | "ordinance"
        | "notification" | "statutory instrument" => "act",
        _ => "doc",
    }
}

/// Document name attribute: title with whitespace and punctuation removed.
fn compact_name(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '.')
        .collect()
}

/// Reduce a number string to a safe identifier token: alphanumerics are
/// lowercased, separator runs collapse to a single dash, everything else
/// is dropped at the edges. `"(a)"` -> `"a"`, `"1.2"` -> `"1-2"`.
fn sanitize_token(raw: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            for lower in c.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    out
}

/// FRBR country code for a jurisdiction name. Unknown jurisdictions fall
/// back to the "un" placeholder; override via [`AknOptions::country`].
fn country_code(jurisdiction: &str) -> &'static str {
    match jurisdiction.trim().to_lowercase().as_str() {
        "india" => "in",
        "ireland" => "ie",
        "uk" | "united kingdom" | "great britain" => "gb",
        "usa" | "united states" | "united states of america" => "us",
        "australia" => "au",
        "canada" => "ca",
        "new zealand" => "nz",
        "south africa" => "za",
        "kenya" => "ke",
        "singapore" => "sg",
        _ => "un",
    }
}

/// Convert assorted enactment-date spellings to ISO `YYYY-MM-DD`.
///
/// `"11th August, 2023"` -> `"2023-08-11"`. Unparsable input is returned
/// as-is rather than rejected.
fn normalize_date(date_str: &str) -> String {
    use chrono::NaiveDate;

    let trimmed = date_str.trim();
    if NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
        return trimmed.to_string();
    }

    let cleaned = strip_ordinal_suffixes(trimmed);
    for format in ["%d %B, %Y", "%B %d, %Y", "%d %B %Y", "%d/%m/%Y"] {
        if let Ok(parsed) = NaiveDate::parse_from_str(&cleaned, format) {
            return parsed.format("%Y-%m-%d").to_string();
        }
    }
    trimmed.to_string()
}

/// Remove ordinal suffixes following digits: "11th" -> "11", "1st" -> "1".
fn strip_ordinal_suffixes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if i > 0 && chars[i - 1].is_ascii_digit() && i + 1 < chars.len() {
            let pair: String = chars[i..i + 2].iter().collect();
            if matches!(pair.as_str(), "st" | "nd" | "rd" | "th") {
                i += 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use legis_core::{Citation, NodeStatus};

    fn structure() -> DocumentStructure {
        DocumentStructure {
            document_type: "act".to_string(),
            jurisdiction: "India".to_string(),
            hierarchy_types: vec!["chapter".to_string(), "section".to_string()],
            title: "The Test Act, 2023".to_string(),
            enactment_date: Some("11th August, 2023".to_string()),
            number: Some("22".to_string()),
        }
    }

    fn node(
        kind: &str,
        number: &str,
        start: u32,
        end: u32,
        content: Option<&str>,
        children: Vec<HierarchyNode>,
    ) -> HierarchyNode {
        HierarchyNode {
            id: format!("{kind}-{number}"),
            level: 1,
            kind: kind.to_string(),
            number: number.to_string(),
            title: None,
            content: content.map(str::to_string),
            citation: Citation {
                page: 1,
                start_line: start,
                end_line: end,
                snippet: String::new(),
            },
            confidence: 0.9,
            status: NodeStatus::Pending,
            reviewer_notes: None,
            children,
            parent_id: None,
        }
    }

    fn sample_tree() -> Vec<HierarchyNode> {
        vec![node(
            "chapter",
            "I",
            1,
            50,
            None,
            vec![
                node("section", "1", 1, 25, Some("Short title."), vec![]),
                node("section", "2", 26, 50, Some("Definitions."), vec![]),
            ],
        )]
    }

    #[test]
    fn test_serializes_nested_identifiers() {
        let xml = AknSerializer::new()
            .serialize(&structure(), &sample_tree())
            .unwrap();
        assert!(xml.contains(r#"<chapter eId="chp_i">"#));
        assert!(xml.contains(r#"<section eId="chp_i__sec_1">"#));
        assert!(xml.contains(r#"<section eId="chp_i__sec_2">"#));
        assert!(xml.contains("<num>I</num>"));
        assert!(xml.contains("<p>Short title.</p>"));
    }

    #[test]
    fn test_metadata_block() {
        let xml = AknSerializer::new()
            .serialize(&structure(), &sample_tree())
            .unwrap();
        assert!(xml.contains(r#"xmlns="http://docs.oasis-open.org/legaldocml/ns/akn/3.0""#));
        assert!(xml.contains(r#"<act name="TheTestAct2023">"#));
        assert!(xml.contains(r#"<FRBRcountry value="in"/>"#));
        assert!(xml.contains(r#"<FRBRdate date="2023-08-11" name="enacted"/>"#));
        assert!(xml.contains(r#"<FRBRuri value="/in/act/2023/22"/>"#));
        assert!(xml.contains(r#"<FRBRlanguage language="eng"/>"#));
    }

    #[test]
    fn test_unknown_type_becomes_named_hcontainer() {
        let tree = vec![node("artikel", "1", 1, 10, Some("Inhalt."), vec![])];
        let xml = AknSerializer::new().serialize(&structure(), &tree).unwrap();
        assert!(xml.contains(r#"<hcontainer eId="artikel_1" name="artikel">"#));
    }

    #[test]
    fn test_alias_serializes_as_native_element() {
        let tree = vec![node("regulation", "4", 1, 10, Some("Text."), vec![])];
        let xml = AknSerializer::new().serialize(&structure(), &tree).unwrap();
        assert!(xml.contains(r#"<rule eId="rule_4">"#));
    }

    #[test]
    fn test_sibling_collision_disambiguated() {
        let tree = vec![
            node("section", "1", 1, 5, Some("a"), vec![]),
            node("section", "1", 6, 10, Some("b"), vec![]),
        ];
        let xml = AknSerializer::new().serialize(&structure(), &tree).unwrap();
        assert!(xml.contains(r#"eId="sec_1""#));
        assert!(xml.contains(r#"eId="sec_1_2""#));
    }

    #[test]
    fn test_identifier_stability_across_runs() {
        let serializer = AknSerializer::new();
        let first = serializer.serialize(&structure(), &sample_tree()).unwrap();
        let second = serializer.serialize(&structure(), &sample_tree()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_nonleaf_with_content_is_fatal() {
        let mut tree = sample_tree();
        tree[0].content = Some("must not be here".to_string());
        let err = AknSerializer::new()
            .serialize(&structure(), &tree)
            .unwrap_err();
        match err {
            AknError::InvalidNode { eid, .. } => assert_eq!(eid, "chp_i"),
            other => panic!("expected InvalidNode, got {other}"),
        }
    }

    #[test]
    fn test_filtered_empty_container_allowed() {
        // A review filter can leave a non-leaf childless; it serializes as
        // an element with num/heading only.
        let tree = vec![node("chapter", "I", 1, 50, None, vec![])];
        let xml = AknSerializer::new().serialize(&structure(), &tree).unwrap();
        assert!(xml.contains(r#"<chapter eId="chp_i">"#));
        assert!(!xml.contains("<content>"));
    }

    #[test]
    fn test_country_override() {
        let serializer = AknSerializer::new().with_options(AknOptions {
            country: Some("ie".to_string()),
            ..AknOptions::default()
        });
        let xml = serializer.serialize(&structure(), &sample_tree()).unwrap();
        assert!(xml.contains(r#"<FRBRcountry value="ie"/>"#));
    }

    #[test]
    fn test_sanitize_token() {
        assert_eq!(sanitize_token("(a)"), "a");
        assert_eq!(sanitize_token("1.2"), "1-2");
        assert_eq!(sanitize_token("I"), "i");
        assert_eq!(sanitize_token("  IV-A "), "iv-a");
        assert_eq!(sanitize_token("..."), "");
    }

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("2023-08-11"), "2023-08-11");
        assert_eq!(normalize_date("11th August, 2023"), "2023-08-11");
        assert_eq!(normalize_date("1st August, 2023"), "2023-08-01");
        assert_eq!(normalize_date("August 11, 2023"), "2023-08-11");
        assert_eq!(normalize_date("11 August 2023"), "2023-08-11");
        assert_eq!(normalize_date("11/08/2023"), "2023-08-11");
        assert_eq!(normalize_date("sometime in 2023"), "sometime in 2023");
    }

    #[test]
    fn test_doc_element_mapping() {
        assert_eq!(doc_element("act"), "act");
        assert_eq!(doc_element("Regulations"), "act");
        assert_eq!(doc_element("bill"), "bill");
        assert_eq!(doc_element("treaty"), "doc");
    }

    #[test]
    fn test_country_codes() {
        assert_eq!(country_code("India"), "in");
        assert_eq!(country_code("Ireland"), "ie");
        assert_eq!(country_code("Atlantis"), "un");
    }

    #[test]
    fn test_escaping_in_content() {
        let tree = vec![node(
            "section",
            "1",
            1,
            5,
            Some("a < b & c > d"),
            vec![],
        )];
        let xml = AknSerializer::new().serialize(&structure(), &tree).unwrap();
        assert!(xml.contains("a &lt; b &amp; c &gt; d"));
    }
}
