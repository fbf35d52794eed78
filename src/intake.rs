use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eligibility::{AcademicRecord, Grade, GradeResult, Track};

/// Raw application body as submitted over the wire. Both track field
/// groups are optional here; `validate_submission` checks the group the
/// declared track requires and produces the structurally-typed record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationSubmission {
    #[serde(default)]
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub track: Option<String>,
    pub ssc_gpa: Option<f64>,
    pub hsc_gpa: Option<f64>,
    pub mid_level_results: Option<Vec<GradeEntry>>,
    pub adv_level_results: Option<Vec<GradeEntry>>,
    pub department_choice: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeEntry {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub grade: String,
}

/// Applicant identity fields, validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicantProfile {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub email: String,
    pub phone: String,
    pub department: Department,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Cse,
    Bba,
    English,
}

impl Department {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Cse => "cse",
            Self::Bba => "bba",
            Self::English => "english",
        }
    }
}

impl Display for Department {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Cse => "CSE",
            Self::Bba => "BBA",
            Self::English => "English",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown department: {0}")]
pub struct DepartmentParseError(pub String);

impl FromStr for Department {
    type Err = DepartmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cse" => Ok(Self::Cse),
            "bba" => Ok(Self::Bba),
            "english" => Ok(Self::English),
            _ => Err(DepartmentParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("full name must be between 2 and 50 characters")]
    FullName,
    #[error("date of birth is required and must be in the past")]
    DateOfBirth,
    #[error("please enter a valid email address")]
    Email,
    #[error("please enter a valid 11-digit phone number")]
    Phone,
    #[error("department choice is required (cse, bba or english)")]
    Department,
    #[error("track is required (gpa or grade_point)")]
    MissingTrack,
    #[error("unknown track: {0}")]
    UnknownTrack(String),
    #[error("SSC and HSC GPA are required for the GPA track")]
    MissingGpa,
    #[error("GPA must be between 0.0 and 5.0")]
    GpaOutOfRange,
    #[error("minimum 5 mid-level and 2 advanced-level results are required")]
    TooFewResults,
    #[error("every result needs a subject label")]
    EmptySubject,
    #[error("unknown grade: {0}")]
    UnknownGrade(String),
}

/// Validated submission, ready for evaluation and persistence.
#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    pub profile: ApplicantProfile,
    pub record: AcademicRecord,
}

pub fn validate_submission(
    submission: &ApplicationSubmission,
) -> Result<ValidatedSubmission, ValidationError> {
    let profile = validate_profile(submission)?;
    let record = validate_record(submission)?;
    Ok(ValidatedSubmission { profile, record })
}

fn validate_profile(
    submission: &ApplicationSubmission,
) -> Result<ApplicantProfile, ValidationError> {
    let full_name = submission.full_name.trim();
    if !(2..=50).contains(&full_name.chars().count()) {
        return Err(ValidationError::FullName);
    }

    let date_of_birth = submission.date_of_birth.ok_or(ValidationError::DateOfBirth)?;
    if date_of_birth >= Utc::now().date_naive() {
        return Err(ValidationError::DateOfBirth);
    }

    let email = submission.email.trim();
    if !looks_like_email(email) {
        return Err(ValidationError::Email);
    }

    let phone = submission.phone.trim();
    if phone.len() != 11 || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::Phone);
    }

    let department = submission
        .department_choice
        .as_deref()
        .ok_or(ValidationError::Department)?
        .parse::<Department>()
        .map_err(|_| ValidationError::Department)?;

    Ok(ApplicantProfile {
        full_name: full_name.to_string(),
        date_of_birth,
        email: email.to_string(),
        phone: phone.to_string(),
        department,
    })
}

fn validate_record(submission: &ApplicationSubmission) -> Result<AcademicRecord, ValidationError> {
    let raw_track = submission
        .track
        .as_deref()
        .ok_or(ValidationError::MissingTrack)?;
    let track = raw_track
        .parse::<Track>()
        .map_err(|e| ValidationError::UnknownTrack(e.0))?;

    match track {
        Track::Gpa => {
            let (Some(ssc_gpa), Some(hsc_gpa)) = (submission.ssc_gpa, submission.hsc_gpa) else {
                return Err(ValidationError::MissingGpa);
            };
            for gpa in [ssc_gpa, hsc_gpa] {
                if !gpa.is_finite() || !(0.0..=5.0).contains(&gpa) {
                    return Err(ValidationError::GpaOutOfRange);
                }
            }
            Ok(AcademicRecord::Gpa { ssc_gpa, hsc_gpa })
        }
        Track::GradePoint => {
            let mid = submission.mid_level_results.as_deref().unwrap_or_default();
            let adv = submission.adv_level_results.as_deref().unwrap_or_default();
            if mid.len() < 5 || adv.len() < 2 {
                return Err(ValidationError::TooFewResults);
            }
            Ok(AcademicRecord::GradePoint {
                mid_level_results: parse_entries(mid)?,
                adv_level_results: parse_entries(adv)?,
            })
        }
    }
}

fn parse_entries(entries: &[GradeEntry]) -> Result<Vec<GradeResult>, ValidationError> {
    entries
        .iter()
        .map(|entry| {
            let subject = entry.subject.trim();
            if subject.is_empty() {
                return Err(ValidationError::EmptySubject);
            }
            let grade = entry
                .grade
                .parse::<Grade>()
                .map_err(|e| ValidationError::UnknownGrade(e.0))?;
            Ok(GradeResult {
                subject: subject.to_string(),
                grade,
            })
        })
        .collect()
}

fn looks_like_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || raw.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_submission() -> ApplicationSubmission {
        ApplicationSubmission {
            full_name: "Ayesha Rahman".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2005, 3, 14),
            email: "ayesha@example.com".to_string(),
            phone: "01712345678".to_string(),
            department_choice: Some("cse".to_string()),
            ..ApplicationSubmission::default()
        }
    }

    fn entries(grades: &[&str]) -> Vec<GradeEntry> {
        grades
            .iter()
            .enumerate()
            .map(|(i, grade)| GradeEntry {
                subject: format!("Subject {i}"),
                grade: grade.to_string(),
            })
            .collect()
    }

    #[test]
    fn accepts_complete_gpa_submission() {
        let mut submission = base_submission();
        submission.track = Some("gpa".to_string());
        submission.ssc_gpa = Some(4.5);
        submission.hsc_gpa = Some(4.2);

        let validated = validate_submission(&submission).expect("valid submission");
        assert_eq!(
            validated.record,
            AcademicRecord::Gpa {
                ssc_gpa: 4.5,
                hsc_gpa: 4.2
            }
        );
        assert_eq!(validated.profile.department, Department::Cse);
    }

    #[test]
    fn gpa_track_requires_both_figures() {
        let mut submission = base_submission();
        submission.track = Some("gpa".to_string());
        submission.ssc_gpa = Some(4.5);

        let err = validate_submission(&submission).expect_err("must reject");
        assert_eq!(err, ValidationError::MissingGpa);
    }

    #[test]
    fn gpa_out_of_range_is_rejected() {
        let mut submission = base_submission();
        submission.track = Some("gpa".to_string());
        submission.ssc_gpa = Some(4.5);
        submission.hsc_gpa = Some(5.3);

        let err = validate_submission(&submission).expect_err("must reject");
        assert_eq!(err, ValidationError::GpaOutOfRange);
    }

    #[test]
    fn grade_point_track_enforces_minimum_counts() {
        let mut submission = base_submission();
        submission.track = Some("grade_point".to_string());
        submission.mid_level_results = Some(entries(&["A", "B", "C", "D"]));
        submission.adv_level_results = Some(entries(&["A", "B"]));

        let err = validate_submission(&submission).expect_err("must reject");
        assert_eq!(err, ValidationError::TooFewResults);
    }

    #[test]
    fn grade_point_track_accepts_minimum_counts() {
        let mut submission = base_submission();
        submission.track = Some("grade_point".to_string());
        submission.mid_level_results = Some(entries(&["A", "B", "C", "D", "E"]));
        submission.adv_level_results = Some(entries(&["A", "B"]));

        let validated = validate_submission(&submission).expect("valid submission");
        assert_eq!(validated.record.track(), Track::GradePoint);
    }

    #[test]
    fn unknown_grade_is_rejected_at_intake() {
        let mut submission = base_submission();
        submission.track = Some("grade_point".to_string());
        submission.mid_level_results = Some(entries(&["A", "B", "C", "D", "X"]));
        submission.adv_level_results = Some(entries(&["A", "B"]));

        let err = validate_submission(&submission).expect_err("must reject");
        assert_eq!(err, ValidationError::UnknownGrade("X".to_string()));
    }

    #[test]
    fn missing_track_is_rejected() {
        let submission = base_submission();
        let err = validate_submission(&submission).expect_err("must reject");
        assert_eq!(err, ValidationError::MissingTrack);
    }

    #[test]
    fn unknown_track_is_rejected() {
        let mut submission = base_submission();
        submission.track = Some("madrasa".to_string());
        let err = validate_submission(&submission).expect_err("must reject");
        assert_eq!(err, ValidationError::UnknownTrack("madrasa".to_string()));
    }

    #[test]
    fn rejects_malformed_contact_fields() {
        let mut submission = base_submission();
        submission.phone = "0171234567".to_string();
        assert_eq!(
            validate_submission(&submission).expect_err("short phone"),
            ValidationError::Phone
        );

        let mut submission = base_submission();
        submission.email = "not-an-email".to_string();
        assert_eq!(
            validate_submission(&submission).expect_err("bad email"),
            ValidationError::Email
        );

        let mut submission = base_submission();
        submission.full_name = "A".to_string();
        assert_eq!(
            validate_submission(&submission).expect_err("short name"),
            ValidationError::FullName
        );
    }
}
