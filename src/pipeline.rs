//! Pipeline orchestration
//!
//! This module provides the public API for Exam Lens. It runs the load stages
//! once (tables → sessions → ranges) and then answers control events against
//! the immutable session set.

use crate::aggregator::SessionAggregator;
use crate::config::{LensConfig, ReferenceData};
use crate::error::LensError;
use crate::query::{ActiveFeatures, QueryMatch, QueryResolver, TargetVector};
use crate::range::RangeEstimator;
use crate::table::TableSet;
use crate::types::{ExamSession, Feature, FeatureRange, PerFeature};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, warn};

/// Load every table under the configured data directory and aggregate sessions.
///
/// Pipeline stages:
/// 1. TableSet - Read all (feature, exam) tables, failing if any is missing
/// 2. SessionAggregator - Build one session per (student, exam)
pub fn load_sessions(config: &LensConfig) -> Result<Vec<ExamSession>, LensError> {
    let tables = TableSet::load_dir(&config.data_dir)?;
    SessionAggregator::aggregate(&tables, &config.reference)
}

/// A change to one control, written as `FEATURE=VALUE` (e.g. `HR=92`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlEvent {
    pub feature: Feature,
    pub value: f64,
}

impl FromStr for ControlEvent {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (feature, value) = s
            .split_once('=')
            .ok_or_else(|| LensError::InvalidEvent(format!("expected FEATURE=VALUE, got {s:?}")))?;
        let feature = feature.parse()?;
        let value = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| LensError::InvalidEvent(format!("invalid value in {s:?}")))?;
        Ok(Self { feature, value })
    }
}

/// Interactive dashboard state.
///
/// Owns the immutable session set and the current control values. Each
/// control event updates the state and resolves the nearest session before
/// the next event is handled.
pub struct Dashboard {
    sessions: Vec<ExamSession>,
    ranges: BTreeMap<Feature, FeatureRange>,
    controls: PerFeature<f64>,
    active: ActiveFeatures,
}

impl Dashboard {
    /// Load tables from disk and build the dashboard
    pub fn load(config: &LensConfig) -> Result<Self, LensError> {
        let tables = TableSet::load_dir(&config.data_dir)?;
        Self::from_tables(&tables, &config.reference)
    }

    /// Build from tables that are already in memory
    pub fn from_tables(tables: &TableSet, reference: &ReferenceData) -> Result<Self, LensError> {
        Self::from_sessions(SessionAggregator::aggregate(tables, reference)?)
    }

    /// Build from an aggregated session set.
    ///
    /// Controls start at the midpoint of their range and the physiological
    /// features are active.
    pub fn from_sessions(sessions: Vec<ExamSession>) -> Result<Self, LensError> {
        let ranges = RangeEstimator::estimate(&sessions)?;
        let controls = PerFeature::from_fn(|feature| {
            ranges.get(&feature).map_or(0.0, FeatureRange::midpoint)
        });

        Ok(Self {
            sessions,
            ranges,
            controls,
            active: ActiveFeatures::default(),
        })
    }

    pub fn sessions(&self) -> &[ExamSession] {
        &self.sessions
    }

    pub fn ranges(&self) -> &BTreeMap<Feature, FeatureRange> {
        &self.ranges
    }

    /// Current value of a control
    pub fn control(&self, feature: Feature) -> f64 {
        self.controls[feature]
    }

    pub fn active(&self) -> ActiveFeatures {
        self.active
    }

    /// Target built from the current state
    pub fn target(&self) -> TargetVector {
        TargetVector::from_controls(self.active, &self.controls)
    }

    /// Handle a control change: store the value (clamped to the control's
    /// range), make the control's dimension set active and resolve.
    ///
    /// A NaN or infinite value is ignored and the state is left unchanged.
    pub fn set_control(&mut self, feature: Feature, value: f64) -> Option<QueryMatch<'_>> {
        if !value.is_finite() {
            warn!(%feature, value, "ignoring non-finite control value");
            return self.current_match();
        }

        let value = self
            .ranges
            .get(&feature)
            .map_or(value, |range| range.clamp(value));

        self.controls[feature] = value;
        self.active = ActiveFeatures::driven_by(feature);
        debug!(%feature, value, active = ?self.active, "control changed");

        self.current_match()
    }

    /// Apply a parsed control event
    pub fn apply(&mut self, event: ControlEvent) -> Option<QueryMatch<'_>> {
        self.set_control(event.feature, event.value)
    }

    /// Resolve the nearest session for the current state
    pub fn current_match(&self) -> Option<QueryMatch<'_>> {
        QueryResolver::resolve(&self.target(), &self.sessions)
    }
}
