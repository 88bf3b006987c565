//! Exam Lens - Nearest-session matching over exam-stress recordings
//!
//! Lens turns per-feature wristband tables recorded during exams into one
//! aggregated session per (student, exam) and answers "which session is closest
//! to this point in feature space?" through a deterministic pipeline:
//! table loading → session aggregation → range estimation → query resolution
//! → match encoding.
//!
//! ## Modules
//!
//! - **Loading**: `table` parses the per-(feature, exam) CSV tables
//! - **Core**: `aggregator`, `range` and `query` build and search the session set
//! - **Presentation**: `pipeline` holds dashboard state, `chart` and `encoder`
//!   produce what a renderer consumes

pub mod aggregator;
pub mod chart;
pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod range;
pub mod table;
pub mod types;

pub use config::{LensConfig, ReferenceData};
pub use error::LensError;
pub use pipeline::{load_sessions, ControlEvent, Dashboard};
pub use query::{ActiveFeatures, QueryMatch, QueryResolver, TargetVector};
pub use types::{Exam, ExamSession, Feature, FeatureRange, FeatureSeries, StudentId};

/// Lens version embedded in all match payloads
pub const LENS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for match payloads
pub const PRODUCER_NAME: &str = "exam-lens";
