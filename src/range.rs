//! Control range estimation
//!
//! Sizes each feature's input control from the spread of per-session averages.

use crate::error::LensError;
use crate::types::{ExamSession, Feature, FeatureRange};
use std::collections::BTreeMap;
use tracing::warn;

/// Estimates integer control bounds per feature
pub struct RangeEstimator;

impl RangeEstimator {
    /// `{floor(min avg), ceil(max avg)}` for every feature.
    ///
    /// Undefined averages are skipped. A feature without any defined average
    /// has no usable range and is left out of the result.
    pub fn estimate(
        sessions: &[ExamSession],
    ) -> Result<BTreeMap<Feature, FeatureRange>, LensError> {
        if sessions.is_empty() {
            return Err(LensError::EmptySessionSet);
        }

        let mut ranges = BTreeMap::new();
        for feature in Feature::ALL {
            match feature_range(sessions, feature) {
                Some(range) => {
                    ranges.insert(feature, range);
                }
                None => warn!(%feature, "no session has a defined average"),
            }
        }

        Ok(ranges)
    }
}

fn feature_range(sessions: &[ExamSession], feature: Feature) -> Option<FeatureRange> {
    let (raw_min, raw_max) = sessions
        .iter()
        .filter_map(|session| session.avg[feature])
        .fold(None, |acc: Option<(f64, f64)>, value| match acc {
            Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
            None => Some((value, value)),
        })?;

    Some(FeatureRange {
        min: raw_min.floor() as i64,
        max: raw_max.ceil() as i64,
        raw_min,
        raw_max,
    })
}
