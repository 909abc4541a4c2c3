//! Scripted mock oracle for tests.
//!
//! Responses are keyed by `(expected_type, start_line, end_line)` and
//! consumed as a queue per key; the last queued response repeats. Keys with
//! no script return zero segments, so a mocked hierarchy terminates
//! naturally at its leaves.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use legis_core::{DocumentStructure, Segment};

use crate::{DiscoveryRequest, OracleError, SegmentOracle};

type Key = (String, u32, u32);

/// One scripted outcome for a discovery call.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Segments(Vec<Segment>),
    Unavailable(String),
    Malformed(String),
}

impl ScriptedOutcome {
    fn into_result(self) -> Result<Vec<Segment>, OracleError> {
        match self {
            Self::Segments(segments) => Ok(segments),
            Self::Unavailable(msg) => Err(OracleError::Unavailable(msg)),
            Self::Malformed(msg) => Err(OracleError::Malformed(msg)),
        }
    }
}

/// Mock oracle that replays configured responses and records every call.
#[derive(Default)]
pub struct MockOracle {
    scripts: Mutex<HashMap<Key, Vec<ScriptedOutcome>>>,
    structure: Mutex<Option<DocumentStructure>>,
    call_log: Mutex<Vec<Key>>,
}

impl MockOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful discovery response for a range.
    #[must_use]
    pub fn with_segments(
        self,
        expected_type: &str,
        start_line: u32,
        end_line: u32,
        segments: Vec<Segment>,
    ) -> Self {
        self.push_outcome(
            expected_type,
            start_line,
            end_line,
            ScriptedOutcome::Segments(segments),
        );
        self
    }

    /// Queue a failure for a range.
    #[must_use]
    pub fn with_outcome(
        self,
        expected_type: &str,
        start_line: u32,
        end_line: u32,
        outcome: ScriptedOutcome,
    ) -> Self {
        self.push_outcome(expected_type, start_line, end_line, outcome);
        self
    }

    /// Configure the structure returned by `classify`.
    #[must_use]
    pub fn with_structure(self, structure: DocumentStructure) -> Self {
        *self.structure.lock().unwrap() = Some(structure);
        self
    }

    fn push_outcome(&self, expected_type: &str, start_line: u32, end_line: u32, outcome: ScriptedOutcome) {
        self.scripts
            .lock()
            .unwrap()
            .entry((expected_type.to_string(), start_line, end_line))
            .or_default()
            .push(outcome);
    }

    /// Every discovery call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Key> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of discovery calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

#[async_trait]
impl SegmentOracle for MockOracle {
    async fn discover(&self, request: DiscoveryRequest) -> Result<Vec<Segment>, OracleError> {
        let key = (
            request.expected_type.clone(),
            request.start_line,
            request.end_line,
        );
        self.call_log.lock().unwrap().push(key.clone());

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&key) {
            Some(queue) if !queue.is_empty() => {
                let outcome = if queue.len() == 1 {
                    queue[0].clone()
                } else {
                    queue.remove(0)
                };
                outcome.into_result()
            }
            _ => Ok(vec![]),
        }
    }

    async fn classify(&self, _sample: &str) -> Result<DocumentStructure, OracleError> {
        self.structure
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| OracleError::Malformed("no structure scripted".to_string()))
    }
}

/// Convenience constructor for test segments.
#[must_use]
pub fn segment(kind: &str, number: &str, start_line: u32, end_line: u32, confidence: f32) -> Segment {
    Segment {
        kind: kind.to_string(),
        number: number.to_string(),
        title: None,
        start_line,
        end_line,
        confidence,
    }
}
