//! Wave-based recursive hierarchy segmentation.
//!
//! Discovery proceeds top-down by depth but breadth-first by dispatch: all
//! parent ranges at a given depth across the whole tree are sent to the
//! oracle as one ordered concurrent wave, bounding oracle round trips to
//! one serial wave per hierarchy level rather than one call per node.
//!
//! Validation applied to every oracle response, in order: out-of-range
//! segments are dropped, overlapping siblings are trimmed or dropped, and
//! a child whose range equals its parent's own range is suppressed (the
//! parent is flagged and kept as a leaf) so a miscalibrated oracle can
//! never reproduce the parent unchanged.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use legis_core::{
    new_node_id, Citation, HierarchyNode, LegisError, LineIndex, NodeStatus, Segment,
};
use legis_oracle::{DiscoveryRequest, OracleError, SegmentOracle};

use crate::dispatcher::{CancelFlag, DispatchError, OracleTask, ParallelDispatcher, RetryPolicy};

/// Configuration for a segmentation run.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Concurrent oracle calls per wave.
    pub max_workers: usize,
    /// Ranges with `end - start` below this are not re-queried; they become
    /// leaves directly.
    pub min_parent_span: u32,
    pub retry: RetryPolicy,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            min_parent_span: 2,
            retry: RetryPolicy::default(),
        }
    }
}

/// A non-fatal observation recorded during segmentation. Branch-local:
/// never aborts sibling extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentationWarning {
    /// A segment fell outside its parent's bounds and was dropped.
    InvalidRange {
        kind: String,
        number: String,
        start_line: u32,
        end_line: u32,
        parent_start: u32,
        parent_end: u32,
    },
    /// A sibling overlapped its predecessor; `trimmed_to` is the forced
    /// new start, or `None` if the trim emptied the segment.
    OverlappingSegments {
        kind: String,
        number: String,
        start_line: u32,
        end_line: u32,
        trimmed_to: Option<u32>,
    },
    /// The oracle returned the parent's own range as a child; recursion
    /// stopped and the parent was kept as a leaf.
    SameRangeLoop {
        node_id: String,
        start_line: u32,
        end_line: u32,
    },
    /// The oracle response failed its schema; treated as zero segments.
    OracleMalformed {
        node_id: String,
        start_line: u32,
        end_line: u32,
        detail: String,
    },
    /// The oracle stayed unavailable after retries; the branch became a
    /// leaf, siblings unaffected.
    BranchFailed {
        node_id: String,
        start_line: u32,
        end_line: u32,
        detail: String,
    },
}

impl fmt::Display for SegmentationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange {
                kind,
                number,
                start_line,
                end_line,
                parent_start,
                parent_end,
            } => write!(
                f,
                "dropped {kind} {number}: range {start_line}..={end_line} outside parent {parent_start}..={parent_end}"
            ),
            Self::OverlappingSegments {
                kind,
                number,
                start_line,
                end_line,
                trimmed_to: Some(new_start),
            } => write!(
                f,
                "trimmed {kind} {number}: start {start_line} overlaps previous sibling, moved to {new_start} (end {end_line})"
            ),
            Self::OverlappingSegments {
                kind,
                number,
                start_line,
                end_line,
                trimmed_to: None,
            } => write!(
                f,
                "dropped {kind} {number}: range {start_line}..={end_line} fully overlapped by previous sibling"
            ),
            Self::SameRangeLoop {
                node_id,
                start_line,
                end_line,
            } => write!(
                f,
                "node {node_id}: oracle returned the parent range {start_line}..={end_line} as a child; kept as leaf for review"
            ),
            Self::OracleMalformed {
                node_id,
                start_line,
                end_line,
                detail,
            } => write!(
                f,
                "node {node_id}: malformed oracle response for {start_line}..={end_line} ({detail}); treated as no children"
            ),
            Self::BranchFailed {
                node_id,
                start_line,
                end_line,
                detail,
            } => write!(
                f,
                "node {node_id}: oracle unavailable for {start_line}..={end_line} after retries ({detail}); branch kept as leaf"
            ),
        }
    }
}

/// Result of a segmentation run.
///
/// `complete` is false when the run was cancelled; a partial tree is a
/// valid cancellation outcome for diagnostics but must not be mistaken
/// for a complete one.
#[derive(Debug)]
pub struct SegmentationOutcome {
    pub nodes: Vec<HierarchyNode>,
    pub warnings: Vec<SegmentationWarning>,
    pub complete: bool,
}

/// The recursive segmentation engine.
///
/// Holds its dependencies explicitly; the only shared mutable state is the
/// dispatcher's per-task result slots. The [`LineIndex`] is read-only and
/// safe for unlimited concurrent readers.
pub struct RecursiveSegmenter {
    index: Arc<LineIndex>,
    oracle: Arc<dyn SegmentOracle>,
    config: SegmenterConfig,
    cancel: CancelFlag,
}

/// Arena entry used while the tree is under construction. Children are
/// index lists; ownership is materialized once the run finishes.
struct BuildNode {
    id: String,
    level: u32,
    kind: String,
    number: String,
    title: Option<String>,
    start_line: u32,
    end_line: u32,
    confidence: f32,
    children: Vec<usize>,
}

/// A parent range queued for the next wave. `None` is the virtual document
/// root at depth 0.
type Frontier = Vec<(Option<usize>, u32, u32)>;

impl RecursiveSegmenter {
    pub fn new(index: Arc<LineIndex>, oracle: Arc<dyn SegmentOracle>) -> Self {
        Self {
            index,
            oracle,
            config: SegmenterConfig::default(),
            cancel: CancelFlag::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SegmenterConfig) -> Self {
        self.config = config;
        self
    }

    /// The flag that cancels this run. Cancellation abandons in-flight
    /// oracle calls and leaves already-completed subtrees in place.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Segment the full indexed extent.
    pub async fn segment_document(
        &self,
        hierarchy_types: &[String],
    ) -> Result<SegmentationOutcome, LegisError> {
        match self.index.bounds() {
            Some((start, end)) => self.segment(hierarchy_types, start, end).await,
            None => Ok(SegmentationOutcome {
                nodes: vec![],
                warnings: vec![],
                complete: true,
            }),
        }
    }

    /// Segment the inclusive range `start..=end` against the given
    /// hierarchy, outermost type first.
    pub async fn segment(
        &self,
        hierarchy_types: &[String],
        start: u32,
        end: u32,
    ) -> Result<SegmentationOutcome, LegisError> {
        // Fail fast on a bad root range; child ranges are validated
        // against their parents below.
        self.index.slice(start, end)?;

        let mut arena: Vec<BuildNode> = Vec::new();
        let mut roots: Vec<usize> = Vec::new();
        let mut warnings: Vec<SegmentationWarning> = Vec::new();
        let mut complete = true;

        let dispatcher = ParallelDispatcher::new(self.config.max_workers)
            .with_retry(self.config.retry.clone())
            .with_cancel(self.cancel.clone());

        let mut frontier: Frontier = vec![(None, start, end)];

        for (depth, expected_type) in hierarchy_types.iter().enumerate() {
            if frontier.is_empty() {
                break;
            }
            if self.cancel.is_cancelled() {
                complete = false;
                break;
            }

            info!(
                "wave {}: discovering '{}' across {} range(s)",
                depth + 1,
                expected_type,
                frontier.len()
            );

            let tasks = self.build_wave_tasks(expected_type, &frontier)?;
            let results = dispatcher.run_all(tasks).await;

            if self.cancel.is_cancelled() {
                // Discard the whole wave: no partial node is attached.
                complete = false;
                break;
            }

            let mut next_frontier: Frontier = Vec::new();

            for ((parent, p_start, p_end), result) in frontier.iter().zip(results) {
                let parent_label = parent
                    .map(|i| arena[i].id.clone())
                    .unwrap_or_else(|| "<document>".to_string());

                let segments = match result {
                    Ok(segments) => segments,
                    Err(DispatchError::Cancelled) => {
                        complete = false;
                        continue;
                    }
                    Err(DispatchError::Oracle(OracleError::Malformed(detail))) => {
                        warnings.push(SegmentationWarning::OracleMalformed {
                            node_id: parent_label,
                            start_line: *p_start,
                            end_line: *p_end,
                            detail,
                        });
                        continue;
                    }
                    Err(e) => {
                        warnings.push(SegmentationWarning::BranchFailed {
                            node_id: parent_label,
                            start_line: *p_start,
                            end_line: *p_end,
                            detail: e.to_string(),
                        });
                        continue;
                    }
                };

                let accepted = validate_segments(
                    segments,
                    *p_start,
                    *p_end,
                    parent.is_some().then(|| parent_label.clone()),
                    &mut warnings,
                );

                debug!(
                    "{parent_label}: {} accepted '{}' segment(s) in {}..={}",
                    accepted.len(),
                    expected_type,
                    p_start,
                    p_end
                );

                for seg in accepted {
                    let node_index = arena.len();
                    let queue_range = (seg.start_line, seg.end_line);
                    arena.push(BuildNode {
                        id: new_node_id(),
                        level: depth as u32 + 1,
                        kind: seg.kind,
                        number: seg.number,
                        title: seg.title,
                        start_line: seg.start_line,
                        end_line: seg.end_line,
                        confidence: seg.confidence,
                        children: Vec::new(),
                    });
                    match *parent {
                        Some(parent_index) => arena[parent_index].children.push(node_index),
                        None => roots.push(node_index),
                    }
                    let wide_enough =
                        queue_range.1 - queue_range.0 >= self.config.min_parent_span;
                    if depth + 1 < hierarchy_types.len() && wide_enough {
                        next_frontier.push((Some(node_index), queue_range.0, queue_range.1));
                    }
                }
            }

            frontier = next_frontier;
        }

        let nodes = roots
            .iter()
            .map(|&root| self.realize(&arena, root, None))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SegmentationOutcome {
            nodes,
            warnings,
            complete,
        })
    }

    fn build_wave_tasks(
        &self,
        expected_type: &str,
        frontier: &Frontier,
    ) -> Result<Vec<OracleTask<Vec<Segment>>>, LegisError> {
        let mut tasks: Vec<OracleTask<Vec<Segment>>> = Vec::with_capacity(frontier.len());
        for (_, start, end) in frontier {
            let request = DiscoveryRequest {
                expected_type: expected_type.to_string(),
                numbered_text: self.index.numbered_text(*start, *end)?,
                start_line: *start,
                end_line: *end,
            };
            let oracle = Arc::clone(&self.oracle);
            tasks.push(Box::new(move || {
                let oracle = Arc::clone(&oracle);
                let request = request.clone();
                Box::pin(async move { oracle.discover(request).await })
            }));
        }
        Ok(tasks)
    }

    /// Materialize an arena subtree into an owned node, filling leaf
    /// content and citations from the line index.
    fn realize(
        &self,
        arena: &[BuildNode],
        index: usize,
        parent_id: Option<&str>,
    ) -> Result<HierarchyNode, LegisError> {
        let build = &arena[index];
        let children = build
            .children
            .iter()
            .map(|&child| self.realize(arena, child, Some(&build.id)))
            .collect::<Result<Vec<_>, _>>()?;

        let content = if children.is_empty() {
            Some(self.index.raw_text(build.start_line, build.end_line)?)
        } else {
            None
        };
        let citation: Citation = self.index.citation_for(build.start_line, build.end_line)?;

        Ok(HierarchyNode {
            id: build.id.clone(),
            level: build.level,
            kind: build.kind.clone(),
            number: build.number.clone(),
            title: build.title.clone(),
            content,
            citation,
            confidence: build.confidence,
            status: NodeStatus::Pending,
            reviewer_notes: None,
            children,
            parent_id: parent_id.map(str::to_string),
        })
    }
}

/// Apply the validation pipeline to one oracle response.
///
/// Order matters: out-of-range segments are dropped first, survivors are
/// sorted and de-overlapped, and finally any segment reproducing the
/// parent's own range is suppressed. The same-range guard only applies
/// under a real parent node; at depth 0 a segment legitimately may span
/// the whole document.
fn validate_segments(
    segments: Vec<Segment>,
    parent_start: u32,
    parent_end: u32,
    parent_id: Option<String>,
    warnings: &mut Vec<SegmentationWarning>,
) -> Vec<Segment> {
    let mut in_bounds: Vec<Segment> = Vec::with_capacity(segments.len());
    for seg in segments {
        let valid = seg.start_line >= parent_start
            && seg.end_line <= parent_end
            && seg.start_line <= seg.end_line;
        if valid {
            in_bounds.push(seg);
        } else {
            warnings.push(SegmentationWarning::InvalidRange {
                kind: seg.kind,
                number: seg.number,
                start_line: seg.start_line,
                end_line: seg.end_line,
                parent_start,
                parent_end,
            });
        }
    }

    in_bounds.sort_by_key(|seg| seg.start_line);

    let mut accepted: Vec<Segment> = Vec::with_capacity(in_bounds.len());
    let mut cursor: Option<u32> = None;
    for mut seg in in_bounds {
        if let Some(prev_end) = cursor {
            if seg.start_line <= prev_end {
                let forced = prev_end + 1;
                if forced > seg.end_line {
                    warnings.push(SegmentationWarning::OverlappingSegments {
                        kind: seg.kind,
                        number: seg.number,
                        start_line: seg.start_line,
                        end_line: seg.end_line,
                        trimmed_to: None,
                    });
                    continue;
                }
                warnings.push(SegmentationWarning::OverlappingSegments {
                    kind: seg.kind.clone(),
                    number: seg.number.clone(),
                    start_line: seg.start_line,
                    end_line: seg.end_line,
                    trimmed_to: Some(forced),
                });
                seg.start_line = forced;
            }
        }
        cursor = Some(cursor.map_or(seg.end_line, |c| c.max(seg.end_line)));
        accepted.push(seg);
    }

    if let Some(node_id) = parent_id {
        let before = accepted.len();
        accepted.retain(|seg| !(seg.start_line == parent_start && seg.end_line == parent_end));
        if accepted.len() < before {
            warnings.push(SegmentationWarning::SameRangeLoop {
                node_id,
                start_line: parent_start,
                end_line: parent_end,
            });
        }
    }

    accepted
}
