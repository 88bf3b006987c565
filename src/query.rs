//! Nearest-session matching
//!
//! Resolves a target point in feature space to the exam session whose averages
//! are closest to it. Distance is Euclidean and only covers the features named
//! in the target, so a STRESS-only query ignores every other dimension.

use crate::error::LensError;
use crate::types::{ExamSession, Feature, PerFeature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Which dimensions a query covers.
///
/// Determined by the control that was changed last: the stress control
/// queries STRESS alone, any other control queries the four physiological
/// features together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveFeatures {
    #[default]
    Physiological,
    Stress,
}

impl ActiveFeatures {
    /// Active set selected by a change to `control`
    pub fn driven_by(control: Feature) -> Self {
        match control {
            Feature::Stress => ActiveFeatures::Stress,
            _ => ActiveFeatures::Physiological,
        }
    }

    pub fn features(&self) -> &'static [Feature] {
        match self {
            ActiveFeatures::Physiological => &Feature::PHYSIOLOGICAL,
            ActiveFeatures::Stress => &[Feature::Stress],
        }
    }

}

/// Query point: a value for each of a non-empty set of features
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TargetVector {
    values: BTreeMap<Feature, f64>,
}

impl TargetVector {
    /// Build from an arbitrary mapping; an empty mapping or a NaN/infinite
    /// value is rejected
    pub fn new(values: BTreeMap<Feature, f64>) -> Result<Self, LensError> {
        if values.is_empty() {
            return Err(LensError::EmptyQuery);
        }
        if let Some((&feature, &value)) = values.iter().find(|(_, value)| !value.is_finite()) {
            return Err(LensError::NonFiniteTarget { feature, value });
        }
        Ok(Self { values })
    }

    /// Target over one feature
    pub fn single(feature: Feature, value: f64) -> Result<Self, LensError> {
        Self::new(BTreeMap::from([(feature, value)]))
    }

    /// Take the current control value of every active feature.
    ///
    /// Controls must hold finite values.
    pub fn from_controls(active: ActiveFeatures, controls: &PerFeature<f64>) -> Self {
        let values: BTreeMap<Feature, f64> = active
            .features()
            .iter()
            .map(|&feature| (feature, controls[feature]))
            .collect();
        debug_assert!(values.values().all(|value| value.is_finite()));
        Self { values }
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(&feature).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.values.iter().map(|(&feature, &value)| (feature, value))
    }

    pub fn features(&self) -> Vec<Feature> {
        self.values.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Euclidean distance between a session's averages and the target, over the
/// target's features only.
///
/// Returns `None` when the session has no average for one of those features;
/// such a session cannot be compared and is never selected.
pub fn distance(session: &ExamSession, target: &TargetVector) -> Option<f64> {
    let mut sum = 0.0;
    for (feature, value) in target.iter() {
        let diff = session.avg[feature]? - value;
        sum += diff * diff;
    }
    Some(sum.sqrt())
}

/// Result of resolving a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch<'a> {
    pub session: &'a ExamSession,
    /// Position of the session in the enumerated set
    pub index: usize,
    pub distance: f64,
    pub target: TargetVector,
}

/// Nearest-session matcher
pub struct QueryResolver;

impl QueryResolver {
    /// Find the session closest to `target`.
    ///
    /// Sessions are scanned in slice order and a candidate only replaces the
    /// current best when strictly closer, so the earliest session wins ties.
    /// Returns `None` if no session has averages for every target feature.
    pub fn resolve<'a>(
        target: &TargetVector,
        sessions: &'a [ExamSession],
    ) -> Option<QueryMatch<'a>> {
        let mut best: Option<(usize, f64)> = None;
        let mut disqualified = 0usize;

        for (index, session) in sessions.iter().enumerate() {
            let Some(d) = distance(session, target) else {
                disqualified += 1;
                continue;
            };
            if best.map_or(true, |(_, best_distance)| d < best_distance) {
                best = Some((index, d));
            }
        }

        if disqualified > 0 {
            debug!(disqualified, "sessions skipped for undefined averages");
        }

        best.map(|(index, distance)| QueryMatch {
            session: &sessions[index],
            index,
            distance,
            target: target.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Exam, StudentId};
    use pretty_assertions::assert_eq;

    fn make_session(n: u8, avgs: &[(Feature, Option<f64>)]) -> ExamSession {
        let mut avg = PerFeature::from_fn(|_| Some(0.0));
        for &(feature, value) in avgs {
            avg[feature] = value;
        }
        ExamSession {
            student: StudentId::new(n).unwrap(),
            exam: Exam::Midterm1,
            grade: 70 + i32::from(n),
            duration_minutes: 90,
            time_series: PerFeature::default(),
            avg,
        }
    }

    #[test]
    fn test_partial_match_ignores_other_features() {
        let sessions = vec![
            make_session(1, &[(Feature::Hr, Some(100.0)), (Feature::Eda, Some(50.0))]),
            make_session(2, &[(Feature::Hr, Some(120.0)), (Feature::Eda, Some(10.0))]),
        ];
        let target = TargetVector::single(Feature::Hr, 100.0).unwrap();

        let found = QueryResolver::resolve(&target, &sessions).unwrap();
        assert_eq!(found.index, 0);
        assert_eq!(found.distance, 0.0);
    }

    #[test]
    fn test_euclidean_distance_over_target_features() {
        let session = make_session(
            1,
            &[(Feature::Hr, Some(3.0)), (Feature::Eda, Some(4.0)), (Feature::Bvp, Some(99.0))],
        );
        let target = TargetVector::new(BTreeMap::from([(Feature::Hr, 0.0), (Feature::Eda, 0.0)]))
            .unwrap();

        assert_eq!(distance(&session, &target), Some(5.0));
    }

    #[test]
    fn test_first_seen_wins_ties() {
        let sessions = vec![
            make_session(1, &[(Feature::Stress, Some(0.2))]),
            make_session(2, &[(Feature::Stress, Some(0.6))]),
            make_session(3, &[(Feature::Stress, Some(0.2))]),
        ];
        let target = TargetVector::single(Feature::Stress, 0.2).unwrap();

        let first = QueryResolver::resolve(&target, &sessions).unwrap();
        let second = QueryResolver::resolve(&target, &sessions).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.session.student, second.session.student);
    }

    #[test]
    fn test_equidistant_sessions_keep_earliest() {
        let sessions = vec![
            make_session(1, &[(Feature::Hr, Some(90.0))]),
            make_session(2, &[(Feature::Hr, Some(110.0))]),
        ];
        let target = TargetVector::single(Feature::Hr, 100.0).unwrap();

        let found = QueryResolver::resolve(&target, &sessions).unwrap();
        assert_eq!(found.index, 0);
        assert_eq!(found.distance, 10.0);
    }

    #[test]
    fn test_undefined_average_disqualifies() {
        let sessions = vec![
            make_session(1, &[(Feature::Temp, None)]),
            make_session(2, &[(Feature::Temp, Some(500.0))]),
        ];
        // session 1 would be closer on every other feature
        let target = TargetVector::single(Feature::Temp, 0.0).unwrap();

        let found = QueryResolver::resolve(&target, &sessions).unwrap();
        assert_eq!(found.index, 1);
    }

    #[test]
    fn test_undefined_average_outside_target_is_irrelevant() {
        let sessions = vec![make_session(1, &[(Feature::Temp, None), (Feature::Hr, Some(80.0))])];
        let target = TargetVector::single(Feature::Hr, 75.0).unwrap();

        let found = QueryResolver::resolve(&target, &sessions).unwrap();
        assert_eq!(found.distance, 5.0);
    }

    #[test]
    fn test_no_match_when_all_disqualified() {
        let sessions = vec![make_session(1, &[(Feature::Stress, None)])];
        let target = TargetVector::single(Feature::Stress, 0.5).unwrap();
        assert!(QueryResolver::resolve(&target, &sessions).is_none());
        assert!(QueryResolver::resolve(&target, &[]).is_none());
    }

    #[test]
    fn test_empty_target_is_rejected() {
        assert!(matches!(
            TargetVector::new(BTreeMap::new()).unwrap_err(),
            LensError::EmptyQuery
        ));
    }

    #[test]
    fn test_non_finite_target_is_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                TargetVector::single(Feature::Hr, value).unwrap_err(),
                LensError::NonFiniteTarget { feature: Feature::Hr, .. }
            ));
        }

        let mixed = BTreeMap::from([(Feature::Hr, 70.0), (Feature::Eda, f64::NAN)]);
        assert!(matches!(
            TargetVector::new(mixed).unwrap_err(),
            LensError::NonFiniteTarget { feature: Feature::Eda, .. }
        ));

        // a finite target still resolves to the genuinely closest session
        let sessions = vec![
            make_session(1, &[(Feature::Hr, Some(70.0))]),
            make_session(2, &[(Feature::Hr, Some(100.0))]),
        ];
        let target = TargetVector::single(Feature::Hr, 99.0).unwrap();
        assert_eq!(QueryResolver::resolve(&target, &sessions).unwrap().index, 1);
    }

    #[test]
    fn test_active_set_from_controls() {
        let controls = PerFeature::from_fn(|f| match f {
            Feature::Hr => 80.0,
            Feature::Eda => 120.0,
            Feature::Bvp => 10.0,
            Feature::Temp => 160.0,
            Feature::Stress => 0.3,
        });

        let physio =
            TargetVector::from_controls(ActiveFeatures::driven_by(Feature::Eda), &controls);
        assert_eq!(
            physio.features(),
            vec![Feature::Hr, Feature::Eda, Feature::Bvp, Feature::Temp]
        );
        assert_eq!(physio.get(Feature::Stress), None);
        assert_eq!(physio.get(Feature::Temp), Some(160.0));

        let stress =
            TargetVector::from_controls(ActiveFeatures::driven_by(Feature::Stress), &controls);
        assert_eq!(stress.features(), vec![Feature::Stress]);
        assert_eq!(stress.get(Feature::Stress), Some(0.3));

        assert_eq!(ActiveFeatures::default(), ActiveFeatures::Physiological);
    }
}
