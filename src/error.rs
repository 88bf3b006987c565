//! Error types for Exam Lens

use crate::types::{Exam, Feature, StudentId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, aggregating or querying sessions
#[derive(Debug, Error)]
pub enum LensError {
    #[error("Failed to parse {source_name} line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("I/O error reading {}: {error}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Missing table for {feature} / {exam}")]
    MissingTable {
        feature: Feature,
        exam: Exam,
    },

    #[error("No grade configured for {student} in {exam}")]
    MissingGrade {
        student: StudentId,
        exam: Exam,
    },

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Unknown exam: {0}")]
    UnknownExam(String),

    #[error("Unknown student: {0}")]
    UnknownStudent(String),

    #[error("Query target vector is empty")]
    EmptyQuery,

    #[error("Target value for {feature} is not finite: {value}")]
    NonFiniteTarget {
        feature: Feature,
        value: f64,
    },

    #[error("Session set is empty")]
    EmptySessionSet,

    #[error("Invalid control event: {0}")]
    InvalidEvent(String),
}
