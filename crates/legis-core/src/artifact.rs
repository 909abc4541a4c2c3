//! Review artifact: the file boundary with the human-review collaborator.
//!
//! An [`ExtractionArtifact`] serializes a segmented tree together with its
//! document structure and summary statistics, and can reconstruct an
//! equivalent tree (modulo status/reviewer-notes edits) when loaded back.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{visit_nodes, DocumentStructure, HierarchyNode};

/// Overall review state of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    PendingReview,
    InReview,
    Approved,
    Rejected,
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PendingReview => "pending_review",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// Summary statistics over the node forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStatistics {
    pub total_nodes: u32,
    /// Node count per hierarchy level (1 = top level).
    pub nodes_by_level: BTreeMap<u32, u32>,
    pub avg_confidence: f32,
}

impl ArtifactStatistics {
    /// Compute statistics by walking the forest.
    #[must_use]
    pub fn compute(nodes: &[HierarchyNode]) -> Self {
        let mut total: u32 = 0;
        let mut by_level: BTreeMap<u32, u32> = BTreeMap::new();
        let mut confidence_sum: f64 = 0.0;

        visit_nodes(nodes, &mut |node| {
            total += 1;
            *by_level.entry(node.level).or_insert(0) += 1;
            confidence_sum += f64::from(node.confidence);
        });

        let avg_confidence = if total == 0 {
            0.0
        } else {
            (confidence_sum / f64::from(total)) as f32
        };

        Self {
            total_nodes: total,
            nodes_by_level: by_level,
            avg_confidence,
        }
    }
}

/// The round-trippable review artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionArtifact {
    pub id: String,
    /// Where the document came from, e.g. a file path.
    pub source_reference: String,
    pub extracted_at: DateTime<Utc>,
    pub structure: DocumentStructure,
    pub nodes: Vec<HierarchyNode>,
    pub status: ArtifactStatus,
    pub statistics: ArtifactStatistics,
}

impl ExtractionArtifact {
    /// Wrap a freshly segmented forest into a pending-review artifact.
    #[must_use]
    pub fn from_nodes(
        source_reference: impl Into<String>,
        structure: DocumentStructure,
        nodes: Vec<HierarchyNode>,
    ) -> Self {
        let statistics = ArtifactStatistics::compute(&nodes);
        Self {
            id: Uuid::new_v4().to_string(),
            source_reference: source_reference.into(),
            extracted_at: Utc::now(),
            structure,
            nodes,
            status: ArtifactStatus::PendingReview,
            statistics,
        }
    }

    /// Recompute statistics after review edits.
    pub fn refresh_statistics(&mut self) {
        self.statistics = ArtifactStatistics::compute(&self.nodes);
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reconstruct an artifact from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the artifact to a file as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load an artifact from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Citation, NodeStatus};

    fn sample_structure() -> DocumentStructure {
        DocumentStructure {
            document_type: "act".to_string(),
            jurisdiction: "India".to_string(),
            hierarchy_types: vec!["chapter".to_string(), "section".to_string()],
            title: "Test Act, 2023".to_string(),
            enactment_date: Some("2023-08-11".to_string()),
            number: Some("22".to_string()),
        }
    }

    fn sample_nodes() -> Vec<HierarchyNode> {
        let section = HierarchyNode {
            id: "sec-1".to_string(),
            level: 2,
            kind: "section".to_string(),
            number: "1".to_string(),
            title: Some("Short title".to_string()),
            content: Some("This Act may be called the Test Act.".to_string()),
            citation: Citation {
                page: 1,
                start_line: 3,
                end_line: 5,
                snippet: "1. Short title".to_string(),
            },
            confidence: 0.9,
            status: NodeStatus::Pending,
            reviewer_notes: None,
            children: vec![],
            parent_id: Some("chp-1".to_string()),
        };
        vec![HierarchyNode {
            id: "chp-1".to_string(),
            level: 1,
            kind: "chapter".to_string(),
            number: "I".to_string(),
            title: Some("Preliminary".to_string()),
            content: None,
            citation: Citation {
                page: 1,
                start_line: 1,
                end_line: 5,
                snippet: "CHAPTER I".to_string(),
            },
            confidence: 0.8,
            status: NodeStatus::Pending,
            reviewer_notes: None,
            children: vec![section],
            parent_id: None,
        }]
    }

    #[test]
    fn test_statistics_computation() {
        let stats = ArtifactStatistics::compute(&sample_nodes());
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.nodes_by_level.get(&1), Some(&1));
        assert_eq!(stats.nodes_by_level.get(&2), Some(&1));
        assert!((stats.avg_confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_statistics_empty_forest() {
        let stats = ArtifactStatistics::compute(&[]);
        assert_eq!(stats.total_nodes, 0);
        assert_eq!(stats.avg_confidence, 0.0);
        assert!(stats.nodes_by_level.is_empty());
    }

    #[test]
    fn test_artifact_json_round_trip() {
        let artifact = ExtractionArtifact::from_nodes("test.txt", sample_structure(), sample_nodes());
        let json = artifact.to_json().unwrap();
        let back = ExtractionArtifact::from_json(&json).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_fresh_artifact_is_pending_review() {
        let artifact = ExtractionArtifact::from_nodes("test.txt", sample_structure(), sample_nodes());
        assert_eq!(artifact.status, ArtifactStatus::PendingReview);
        assert_eq!(artifact.statistics.total_nodes, 2);
        assert_eq!(artifact.source_reference, "test.txt");
    }

    #[test]
    fn test_artifact_file_round_trip() {
        let artifact = ExtractionArtifact::from_nodes("test.txt", sample_structure(), sample_nodes());
        let dir = std::env::temp_dir().join(format!("legis-artifact-{}", artifact.id));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("artifact.json");

        artifact.save(&path).unwrap();
        let back = ExtractionArtifact::load(&path).unwrap();
        assert_eq!(back, artifact);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_refresh_statistics_after_edit() {
        let mut artifact =
            ExtractionArtifact::from_nodes("test.txt", sample_structure(), sample_nodes());
        artifact.nodes.clear();
        artifact.refresh_statistics();
        assert_eq!(artifact.statistics.total_nodes, 0);
    }

    #[test]
    fn test_artifact_status_serde_names() {
        let json = serde_json::to_string(&ArtifactStatus::PendingReview).unwrap();
        assert_eq!(json, "\"pending_review\"");
        let json = serde_json::to_string(&ArtifactStatus::InReview).unwrap();
        assert_eq!(json, "\"in_review\"");
    }
}
