//! Match encoding
//!
//! This module encodes query matches into JSON payloads for the presentation
//! layer: session identity, grade, distance, the query that produced it and
//! the chart data of the matched session.

use crate::chart::ChartData;
use crate::error::LensError;
use crate::query::{QueryMatch, TargetVector};
use crate::types::{Exam, Feature, PerFeature, StudentId};
use crate::{LENS_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Current payload schema version
pub const PAYLOAD_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, Serialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Identity of the matched session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub student: StudentId,
    pub exam: Exam,
    pub grade: i32,
    pub duration_minutes: u32,
    /// Position in the enumerated session set
    pub index: usize,
}

/// The query that produced the match
#[derive(Debug, Clone, Serialize)]
pub struct QuerySummary {
    pub active_features: Vec<Feature>,
    pub target: TargetVector,
    pub distance: f64,
}

/// Complete match payload
#[derive(Debug, Clone, Serialize)]
pub struct MatchPayload {
    pub payload_version: String,
    pub producer: Producer,
    pub computed_at_utc: String,
    pub session: SessionSummary,
    pub query: QuerySummary,
    pub averages: PerFeature<Option<f64>>,
    pub summary: String,
    pub chart: ChartData,
}

/// Encoder for producing match payloads
pub struct MatchEncoder {
    instance_id: String,
}

impl Default for MatchEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Encode a match into a payload
    pub fn encode(&self, found: &QueryMatch<'_>) -> MatchPayload {
        let session = found.session;

        MatchPayload {
            payload_version: PAYLOAD_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: LENS_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            session: SessionSummary {
                student: session.student,
                exam: session.exam,
                grade: session.grade,
                duration_minutes: session.duration_minutes,
                index: found.index,
            },
            query: QuerySummary {
                active_features: found.target.features(),
                target: found.target.clone(),
                distance: found.distance,
            },
            averages: session.avg.clone(),
            summary: summary_text(found),
            chart: ChartData::all_features(session),
        }
    }

    /// Encode to compact JSON
    pub fn encode_to_json(&self, found: &QueryMatch<'_>) -> Result<String, LensError> {
        serde_json::to_string(&self.encode(found)).map_err(LensError::JsonError)
    }
}

/// One-line description of a match, e.g.
/// `Score of the student with the closest average HR to the selected value: 182`
pub fn summary_text(found: &QueryMatch<'_>) -> String {
    let features = found.target.features();
    let names = match features.as_slice() {
        [] => String::new(),
        [only] => only.as_str().to_string(),
        [init @ .., last] => {
            let init: Vec<&str> = init.iter().map(Feature::as_str).collect();
            format!("{} and {}", init.join(", "), last.as_str())
        }
    };
    let noun = if features.len() == 1 { "value" } else { "values" };

    format!(
        "Score of the student with the closest average {names} to the selected {noun}: {}",
        found.session.grade
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryResolver;
    use crate::types::ExamSession;
    use pretty_assertions::assert_eq;

    fn make_sessions() -> Vec<ExamSession> {
        [(1, 182, 95.0), (2, 180, 70.0)]
            .into_iter()
            .map(|(n, grade, hr)| ExamSession {
                student: StudentId::new(n).unwrap(),
                exam: Exam::Final,
                grade,
                duration_minutes: 180,
                time_series: PerFeature::default(),
                avg: PerFeature::from_fn(|f| if f == Feature::Hr { Some(hr) } else { Some(1.0) }),
            })
            .collect()
    }

    #[test]
    fn test_encode_payload_fields() {
        let sessions = make_sessions();
        let target = TargetVector::single(Feature::Hr, 72.0).unwrap();
        let found = QueryResolver::resolve(&target, &sessions).unwrap();

        let encoder = MatchEncoder::with_instance_id("test-instance".to_string());
        let json = encoder.encode_to_json(&found).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["payload_version"], "1.0.0");
        assert_eq!(payload["producer"]["name"], "exam-lens");
        assert_eq!(payload["producer"]["instance_id"], "test-instance");
        assert_eq!(payload["session"]["student"], "s2");
        assert_eq!(payload["session"]["exam"], "final");
        assert_eq!(payload["session"]["grade"], 180);
        assert_eq!(payload["session"]["index"], 1);
        assert_eq!(payload["query"]["active_features"], serde_json::json!(["HR"]));
        assert_eq!(payload["query"]["target"]["HR"], 72.0);
        assert_eq!(payload["query"]["distance"], 2.0);
        assert_eq!(payload["averages"]["HR"], 70.0);
        assert_eq!(payload["chart"]["x_domain"], serde_json::json!([0.0, 180.0]));
    }

    #[test]
    fn test_summary_text() {
        let sessions = make_sessions();

        let single = TargetVector::single(Feature::Hr, 100.0).unwrap();
        let found = QueryResolver::resolve(&single, &sessions).unwrap();
        assert_eq!(
            summary_text(&found),
            "Score of the student with the closest average HR to the selected value: 182"
        );

        let controls = PerFeature::from_fn(|_| 1.0);
        let physio =
            TargetVector::from_controls(crate::query::ActiveFeatures::Physiological, &controls);
        let found = QueryResolver::resolve(&physio, &sessions).unwrap();
        assert_eq!(
            summary_text(&found),
            "Score of the student with the closest average HR, EDA, BVP and TEMP to the selected values: 180"
        );
    }
}
