//! Prompt templates for the segment-discovery and classification calls.

/// Prompt for finding all elements of a known type within a line range.
const FIXED_TYPE_TEMPLATE: &str = r#"Find all {element_type} elements in this legal document section.

The text has line numbers prefixed (e.g., "  10| CHAPTER I" or " 42| (1) The Board...").

For each {element_type} found, provide:
- type: "{element_type}"
- number: The identifier (e.g., "I", "II", "1", "2", "(a)", "(b)", "(1)", "(2)", "(i)", "(ii)")
- title: The heading text if present, null if none
- start_line: Line number where this {element_type} STARTS
- end_line: Line number where this {element_type} ENDS (before next {element_type} or section end)
- confidence: How certain you are this is a real {element_type}, 0.0-1.0

Rules:
- Use the LINE NUMBERS shown to the left of "|"
- Every line in range {start_line} to {end_line} must belong to exactly one {element_type}
- Segments must not overlap
- Segments must be in document order
- In Statutory Instruments and Rules, "X. (Y)" means item X starting here with (Y) as its CHILD, not a sibling
- If no {element_type} elements found, return empty segments list

Return ONLY valid JSON matching:
{"segments": [{"type": "...", "number": "...", "title": null, "start_line": 0, "end_line": 0, "confidence": 1.0}]}

TEXT (lines {start_line} to {end_line}):
{text_slice}
"#;

/// Prompt for the one-shot document-structure classification.
const ANALYZE_STRUCTURE_TEMPLATE: &str = r#"Analyze this legal document and identify its structure.

Determine:
1. document_type: What kind of document is this? (act, rules, regulation, bill, ordinance, notification, etc.)
2. jurisdiction: Which country/state? (India, UK, USA, Ireland, etc.)
3. hierarchy_types: What are the hierarchical levels used? List from top to bottom.
   Examples:
   - Indian Act: ["chapter", "section", "subsection", "clause", "subclause"]
   - Indian Rules: ["rule", "subrule", "clause", "subclause"]
   - UK Act: ["part", "section", "subsection"]
   - US Code: ["title", "chapter", "section", "subsection"]
4. title: The full title of the document
5. enactment_date: When was it enacted/notified (if mentioned), null otherwise
6. number: Document number (e.g., "Act No. 22 of 2023", "S.I. 607 of 2024"), null otherwise

Return ONLY valid JSON matching:
{"document_type": "...", "jurisdiction": "...", "hierarchy_types": ["..."], "title": "...", "enactment_date": null, "number": null}

DOCUMENT TEXT (sample):
{text}
"#;

/// Render the fixed-type discovery prompt.
#[must_use]
pub fn fixed_type_prompt(
    element_type: &str,
    start_line: u32,
    end_line: u32,
    text_slice: &str,
) -> String {
    FIXED_TYPE_TEMPLATE
        .replace("{element_type}", element_type)
        .replace("{start_line}", &start_line.to_string())
        .replace("{end_line}", &end_line.to_string())
        .replace("{text_slice}", text_slice)
}

/// Render the structure-analysis prompt over a document sample.
#[must_use]
pub fn analyze_structure_prompt(sample: &str) -> String {
    ANALYZE_STRUCTURE_TEMPLATE.replace("{text}", sample)
}
