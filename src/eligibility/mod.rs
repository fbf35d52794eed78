pub mod evaluator;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An applicant's academic history, keyed on the declared study track.
/// Exactly one branch is populated; each variant carries its own fields so
/// the "other group absent" invariant holds structurally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "track", rename_all = "snake_case")]
pub enum AcademicRecord {
    Gpa {
        ssc_gpa: f64,
        hsc_gpa: f64,
    },
    GradePoint {
        mid_level_results: Vec<GradeResult>,
        adv_level_results: Vec<GradeResult>,
    },
}

impl AcademicRecord {
    pub fn track(&self) -> Track {
        match self {
            Self::Gpa { .. } => Track::Gpa,
            Self::GradePoint { .. } => Track::GradePoint,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Gpa,
    GradePoint,
}

impl Track {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Gpa => "gpa",
            Self::GradePoint => "grade_point",
        }
    }

    /// Human-readable statement of what the track requires to pass,
    /// surfaced to applicants whose submission failed.
    pub fn requirement(&self) -> &'static str {
        match self {
            Self::Gpa => "both SSC and HSC GPA must be 4.0 or higher",
            Self::GradePoint => {
                "minimum 20 points required from best 5 mid-level and 2 advanced-level results"
            }
        }
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Gpa => "GPA",
            Self::GradePoint => "Grade Point",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown track: {0}")]
pub struct TrackParseError(pub String);

impl FromStr for Track {
    type Err = TrackParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "gpa" | "gpa_track" => Ok(Self::Gpa),
            "grade_point" | "grade_point_track" => Ok(Self::GradePoint),
            _ => Err(TrackParseError(s.to_string())),
        }
    }
}

/// One letter-grade result at a qualification level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradeResult {
    pub subject: String,
    pub grade: Grade,
}

/// Letter grade on the A-F scale. Anything outside the scale deserializes
/// to `Unknown`, which scores zero points rather than erroring.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
    #[serde(rename = "?")]
    Unknown,
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Self::Unknown))
    }
}

impl Grade {
    pub fn points(&self) -> u32 {
        match self {
            Self::A => 5,
            Self::B => 4,
            Self::C => 3,
            Self::D => 2,
            Self::E => 1,
            Self::F | Self::Unknown => 0,
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown grade: {0}")]
pub struct GradeParseError(pub String);

impl FromStr for Grade {
    type Err = GradeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "E" => Ok(Self::E),
            "F" => Ok(Self::F),
            _ => Err(GradeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown verdict: {0}")]
pub struct VerdictParseError(pub String);

impl FromStr for Verdict {
    type Err = VerdictParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            _ => Err(VerdictParseError(s.to_string())),
        }
    }
}

/// The evaluator's sole output, computed once per record and stored as an
/// immutable derived attribute alongside it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EligibilityResult {
    pub score: f64,
    pub verdict: Verdict,
}

impl EligibilityResult {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Precondition violation the record type cannot exclude structurally.
/// Callers must reject the submission outright, never coerce to FAIL.
#[derive(Debug, Error)]
pub enum InvalidRecordError {
    #[error("SSC GPA {0} is not a finite value in 0.0..=5.0")]
    SscGpaOutOfRange(f64),
    #[error("HSC GPA {0} is not a finite value in 0.0..=5.0")]
    HscGpaOutOfRange(f64),
}
