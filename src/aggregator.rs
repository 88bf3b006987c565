//! Session aggregation
//!
//! Turns the loaded per-(feature, exam) tables into one [`ExamSession`] per
//! (student, exam) pair, each carrying its scaled time series, per-feature
//! averages and reference grade.

use crate::config::ReferenceData;
use crate::error::LensError;
use crate::table::TableSet;
use crate::types::{Exam, ExamSession, Feature, FeatureSeries, PerFeature, StudentId};
use tracing::info;

/// Builds the immutable session set
pub struct SessionAggregator;

impl SessionAggregator {
    /// Aggregate every (exam, student) pair.
    ///
    /// Sessions are returned exam-major (midterm1, midterm2, final) and
    /// student-minor (s1..s10). Nearest-session tie-breaking relies on this
    /// order, so it must not change.
    pub fn aggregate(
        tables: &TableSet,
        reference: &ReferenceData,
    ) -> Result<Vec<ExamSession>, LensError> {
        tables.ensure_complete()?;

        let mut sessions = Vec::new();
        for exam in Exam::ALL {
            let duration_minutes = reference.duration(exam)?;
            for student in StudentId::all() {
                let grade = reference.grade(exam, student)?;
                sessions.push(build_session(tables, exam, student, grade, duration_minutes)?);
            }
        }

        let undefined = sessions
            .iter()
            .map(|s| s.undefined_features().count())
            .sum::<usize>();
        info!(
            sessions = sessions.len(),
            undefined_averages = undefined,
            "aggregated exam sessions"
        );

        Ok(sessions)
    }
}

fn build_session(
    tables: &TableSet,
    exam: Exam,
    student: StudentId,
    grade: i32,
    duration_minutes: u32,
) -> Result<ExamSession, LensError> {
    let mut time_series = PerFeature::<FeatureSeries>::default();
    for feature in Feature::ALL {
        let table = tables.get(feature, exam)?;
        time_series[feature] = table.series(&feature.column_name(student, exam), feature.scale());
    }

    let avg = PerFeature::from_fn(|feature| time_series[feature].mean());

    Ok(ExamSession {
        student,
        exam,
        grade,
        duration_minutes,
        time_series,
        avg,
    })
}
