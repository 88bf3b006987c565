//! Chart data extraction
//!
//! Collects what a renderer needs to draw the multi-line chart of a session:
//! axis domains and one line per feature. Nothing here draws.

use crate::types::{ExamSession, Feature};
use serde::{Deserialize, Serialize};

/// One plotted series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartLine {
    pub feature: Feature,
    pub label: String,
    /// `(minute, value)` pairs with absent readings dropped
    pub points: Vec<(f64, f64)>,
}

/// Plot payload for a single session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// `[0, exam duration]` in minutes
    pub x_domain: (f64, f64),
    /// `[0, largest plotted value]`
    pub y_domain: (f64, f64),
    /// Lines in legend order
    pub lines: Vec<ChartLine>,
}

impl ChartData {
    /// Build chart data for the given features of a session
    pub fn for_session(session: &ExamSession, features: &[Feature]) -> Self {
        let lines: Vec<ChartLine> = Feature::ALL
            .into_iter()
            .filter(|feature| features.contains(feature))
            .map(|feature| ChartLine {
                feature,
                label: feature.label().to_string(),
                points: session.time_series[feature].present().collect(),
            })
            .collect();

        let y_max = lines
            .iter()
            .filter_map(|line| session.time_series[line.feature].max_value())
            .fold(0.0, f64::max);

        Self {
            x_domain: (0.0, f64::from(session.duration_minutes)),
            y_domain: (0.0, y_max),
            lines,
        }
    }

    /// Chart data with every feature plotted
    pub fn all_features(session: &ExamSession) -> Self {
        Self::for_session(session, &Feature::ALL)
    }
}
