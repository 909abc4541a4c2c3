//! Integration tests for the legis binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use legis_core::{
    Citation, DocumentStructure, ExtractionArtifact, HierarchyNode, NodeStatus,
};

fn legis() -> Command {
    Command::cargo_bin("legis").expect("binary builds")
}

fn sample_text() -> &'static str {
    "[PAGE:1]\nCHAPTER I\nPRELIMINARY\n1. Short title.\n[PAGE:2]\n2. Definitions.\n(1) In this Act...\n"
}

fn node(
    id: &str,
    level: u32,
    kind: &str,
    number: &str,
    status: NodeStatus,
    children: Vec<HierarchyNode>,
) -> HierarchyNode {
    let content = if children.is_empty() {
        Some("body text".to_string())
    } else {
        None
    };
    HierarchyNode {
        id: id.to_string(),
        level,
        kind: kind.to_string(),
        number: number.to_string(),
        title: Some("Heading".to_string()),
        content,
        citation: Citation {
            page: 1,
            start_line: 1,
            end_line: 10,
            snippet: "snippet".to_string(),
        },
        confidence: 0.9,
        status,
        reviewer_notes: None,
        children,
        parent_id: None,
    }
}

fn sample_artifact() -> ExtractionArtifact {
    let structure = DocumentStructure {
        document_type: "act".to_string(),
        jurisdiction: "India".to_string(),
        hierarchy_types: vec!["chapter".to_string(), "section".to_string()],
        title: "The Test Act, 2023".to_string(),
        enactment_date: Some("2023-08-11".to_string()),
        number: Some("22".to_string()),
    };
    let nodes = vec![node(
        "chp-1",
        1,
        "chapter",
        "I",
        NodeStatus::Pending,
        vec![
            node("sec-1", 2, "section", "1", NodeStatus::Approved, vec![]),
            node("sec-2", 2, "section", "2", NodeStatus::Rejected, vec![]),
        ],
    )];
    ExtractionArtifact::from_nodes("test.txt", structure, nodes)
}

#[test]
fn help_lists_subcommands() {
    legis()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("review"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn inspect_shows_numbered_lines_and_pages() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("act.txt");
    std::fs::write(&input, sample_text()).unwrap();

    legis()
        .arg("inspect")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("5 lines, pages 1..2"))
        .stdout(predicate::str::contains("1| CHAPTER I"));
}

#[test]
fn inspect_rejects_malformed_marker() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("bad.txt");
    std::fs::write(&input, "[PAGE:oops]\ntext\n").unwrap();

    legis()
        .arg("inspect")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed page marker"));
}

#[test]
fn generate_writes_akn_xml() {
    let dir = TempDir::new().unwrap();
    let artifact_path = dir.path().join("act.artifact.json");
    sample_artifact().save(&artifact_path).unwrap();

    legis()
        .arg("generate")
        .arg(&artifact_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated"));

    let xml = std::fs::read_to_string(dir.path().join("act.artifact.xml")).unwrap();
    assert!(xml.contains("akomaNtoso"));
    assert!(xml.contains(r#"<chapter eId="chp_i">"#));
    assert!(xml.contains(r#"<section eId="chp_i__sec_1">"#));
}

#[test]
fn generate_respects_status_filter() {
    let dir = TempDir::new().unwrap();
    let artifact_path = dir.path().join("act.artifact.json");
    sample_artifact().save(&artifact_path).unwrap();
    let output = dir.path().join("approved.xml");

    // The chapter is still pending, so approved-only filtering prunes
    // everything under it and there is nothing left to serialize.
    legis()
        .args(["generate", "--include", "approved"])
        .arg(&artifact_path)
        .args(["--output"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no nodes to serialize"));

    // Including pending keeps the chapter and both sections.
    legis()
        .args(["generate", "--include", "pending,approved,rejected"])
        .arg(&artifact_path)
        .args(["--output"])
        .arg(&output)
        .assert()
        .success();
    let xml = std::fs::read_to_string(&output).unwrap();
    assert!(xml.contains(r#"<section eId="chp_i__sec_1">"#));
}

#[test]
fn review_set_then_list() {
    let dir = TempDir::new().unwrap();
    let artifact_path = dir.path().join("act.artifact.json");
    sample_artifact().save(&artifact_path).unwrap();

    legis()
        .arg("review")
        .arg(&artifact_path)
        .args(["set", "chp-1", "approved", "--notes", "looks right"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chp-1 -> approved"));

    let artifact = ExtractionArtifact::load(&artifact_path).unwrap();
    assert_eq!(artifact.nodes[0].status, NodeStatus::Approved);
    assert_eq!(artifact.nodes[0].reviewer_notes.as_deref(), Some("looks right"));

    legis()
        .arg("review")
        .arg(&artifact_path)
        .args(["list", "--status", "approved"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chp-1"))
        .stdout(predicate::str::contains("approved"));
}

#[test]
fn review_rejects_invalid_transition() {
    let dir = TempDir::new().unwrap();
    let artifact_path = dir.path().join("act.artifact.json");
    sample_artifact().save(&artifact_path).unwrap();

    // sec-2 is already rejected (terminal).
    legis()
        .arg("review")
        .arg(&artifact_path)
        .args(["set", "sec-2", "approved"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid review transition"));
}

#[test]
fn extract_requires_oracle_configuration() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("act.txt");
    std::fs::write(&input, sample_text()).unwrap();

    legis()
        .env_remove("ANTHROPIC_API_KEY")
        .arg("extract")
        .arg(&input)
        .args(["--types", "chapter,section"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}
