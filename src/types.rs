//! Core types for Exam Lens
//!
//! This module defines the data structures that flow through the matching engine:
//! feature and exam identifiers, per-student time series, aggregated exam sessions
//! and the per-feature control ranges derived from them.

use crate::error::LensError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// Number of students in the recording study
pub const STUDENT_COUNT: u8 = 10;

/// Physiological feature recorded (or derived) for every exam session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Feature {
    Hr,
    Eda,
    Bvp,
    Temp,
    Stress,
}

impl Feature {
    /// Every feature, in legend order
    pub const ALL: [Feature; 5] = [
        Feature::Hr,
        Feature::Eda,
        Feature::Bvp,
        Feature::Temp,
        Feature::Stress,
    ];

    /// Features measured directly by the wristband (everything except STRESS)
    pub const PHYSIOLOGICAL: [Feature; 4] =
        [Feature::Hr, Feature::Eda, Feature::Bvp, Feature::Temp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Hr => "HR",
            Feature::Eda => "EDA",
            Feature::Bvp => "BVP",
            Feature::Temp => "TEMP",
            Feature::Stress => "STRESS",
        }
    }

    /// Human-readable label used for controls and legends
    pub fn label(&self) -> &'static str {
        match self {
            Feature::Hr => "Heart Rate",
            Feature::Eda => "Electrodermal Activity",
            Feature::Bvp => "Blood Volume Pulse",
            Feature::Temp => "Skin Temperature",
            Feature::Stress => "Stress",
        }
    }

    /// Unit scale applied to raw readings at ingestion so that all series
    /// share a comparable plotting range.
    pub fn scale(&self) -> f64 {
        match self {
            Feature::Hr => 1.0,
            Feature::Eda => 100.0,
            Feature::Bvp => 5.0,
            Feature::Temp => 5.0,
            Feature::Stress => 1.0,
        }
    }

    /// Column holding this feature for a student in a given exam table.
    ///
    /// HR/EDA/BVP/TEMP tables use `{student}_{exam}_{feature}`, STRESS tables
    /// use `{student}_stress`.
    pub fn column_name(&self, student: StudentId, exam: Exam) -> String {
        match self {
            Feature::Stress => format!("{student}_stress"),
            _ => format!("{student}_{}_{}", exam.label(), self.as_str()),
        }
    }

    fn index(&self) -> usize {
        match self {
            Feature::Hr => 0,
            Feature::Eda => 1,
            Feature::Bvp => 2,
            Feature::Temp => 3,
            Feature::Stress => 4,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HR" => Ok(Feature::Hr),
            "EDA" => Ok(Feature::Eda),
            "BVP" => Ok(Feature::Bvp),
            "TEMP" => Ok(Feature::Temp),
            "STRESS" => Ok(Feature::Stress),
            _ => Err(LensError::UnknownFeature(s.to_string())),
        }
    }
}

/// Exam in which a session was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exam {
    Midterm1,
    Midterm2,
    Final,
}

impl Exam {
    /// Every exam, in session enumeration order
    pub const ALL: [Exam; 3] = [Exam::Midterm1, Exam::Midterm2, Exam::Final];

    /// Label used in column names and file names
    pub fn label(&self) -> &'static str {
        match self {
            Exam::Midterm1 => "midterm1",
            Exam::Midterm2 => "midterm2",
            Exam::Final => "final",
        }
    }
}

impl fmt::Display for Exam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Exam {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Exam::ALL
            .into_iter()
            .find(|exam| exam.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LensError::UnknownExam(s.to_string()))
    }
}

/// Student identifier (`s1` .. `s10`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StudentId(u8);

impl StudentId {
    /// Create a student id, returning `None` outside `1..=STUDENT_COUNT`
    pub fn new(number: u8) -> Option<Self> {
        (1..=STUDENT_COUNT).contains(&number).then_some(Self(number))
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// Every student, in session enumeration order
    pub fn all() -> impl Iterator<Item = StudentId> {
        (1..=STUDENT_COUNT).map(StudentId)
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl FromStr for StudentId {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .strip_prefix('s')
            .or_else(|| trimmed.strip_prefix('S'))
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(StudentId::new)
            .ok_or_else(|| LensError::UnknownStudent(s.to_string()))
    }
}

impl Serialize for StudentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StudentId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One value per feature.
///
/// Backed by a fixed array so that every session always carries exactly one
/// entry for each known feature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PerFeature<T>([T; 5]);

impl<T> PerFeature<T> {
    /// Build by evaluating `f` for every feature in `Feature::ALL` order
    pub fn from_fn(mut f: impl FnMut(Feature) -> T) -> Self {
        Self(Feature::ALL.map(&mut f))
    }

    /// Iterate `(feature, value)` pairs in `Feature::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (Feature, &T)> {
        Feature::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<Feature> for PerFeature<T> {
    type Output = T;

    fn index(&self, feature: Feature) -> &T {
        &self.0[feature.index()]
    }
}

impl<T> IndexMut<Feature> for PerFeature<T> {
    fn index_mut(&mut self, feature: Feature) -> &mut T {
        &mut self.0[feature.index()]
    }
}

impl<T: Serialize> Serialize for PerFeature<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Feature::ALL.len()))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.as_str(), value)?;
        }
        map.end()
    }
}

/// A single reading at a point in the exam
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Minutes since the exam started
    pub minute: f64,
    /// Scaled reading, `None` when the student had no value for this row
    pub value: Option<f64>,
}

/// Ordered readings of one feature for one (student, exam) pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSeries {
    pub points: Vec<SeriesPoint>,
}

impl FeatureSeries {
    pub fn new(points: Vec<SeriesPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Readings that are present, with their minute
    pub fn present(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.value.map(|value| (p.minute, value)))
    }

    /// Arithmetic mean of the present readings, `None` if there are none
    pub fn mean(&self) -> Option<f64> {
        let (sum, count) = self
            .present()
            .fold((0.0, 0usize), |(sum, count), (_, value)| (sum + value, count + 1));
        if count == 0 {
            return None;
        }
        Some(sum / count as f64)
    }

    /// Largest present reading
    pub fn max_value(&self) -> Option<f64> {
        self.present().map(|(_, value)| value).reduce(f64::max)
    }
}

/// One (student, exam) observation with its full time series and averages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamSession {
    pub student: StudentId,
    pub exam: Exam,
    /// Score from the reference grade table
    pub grade: i32,
    /// Scheduled exam length (minutes)
    pub duration_minutes: u32,
    pub time_series: PerFeature<FeatureSeries>,
    /// Mean of each series, `None` when the series has no readings
    pub avg: PerFeature<Option<f64>>,
}

impl ExamSession {
    /// Features whose average is undefined for this session
    pub fn undefined_features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.avg
            .iter()
            .filter(|(_, avg)| avg.is_none())
            .map(|(feature, _)| feature)
    }
}

/// Integer bounds of a control derived from per-session averages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    /// Floor of the smallest session average
    pub min: i64,
    /// Ceiling of the largest session average
    pub max: i64,
    /// Smallest session average before snapping
    pub raw_min: f64,
    /// Largest session average before snapping
    pub raw_max: f64,
}

impl FeatureRange {
    /// Initial control position: rounded midpoint of the raw averages
    pub fn midpoint(&self) -> f64 {
        ((self.raw_min + self.raw_max) / 2.0).round()
    }

    /// Snap a value into `[min, max]`
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min as f64, self.max as f64)
    }
}
