use crate::eligibility::{
    AcademicRecord, EligibilityResult, GradeResult, InvalidRecordError, Verdict,
};

/// Both GPA figures must reach this to pass the GPA track.
pub const GPA_PASS_MINIMUM: f64 = 4.0;
/// Minimum combined points to pass the grade-point track (max is 35).
pub const GRADE_POINT_PASS_MINIMUM: u32 = 20;
/// How many mid-level results count toward the score.
pub const MID_LEVEL_BEST: usize = 5;
/// How many advanced-level results count toward the score.
pub const ADV_LEVEL_BEST: usize = 2;

/// Scores an academic record. Pure and deterministic: no I/O, no state,
/// identical results for identical inputs, whether invoked for
/// pre-submission feedback or authoritative persistence.
pub fn evaluate(record: &AcademicRecord) -> Result<EligibilityResult, InvalidRecordError> {
    match record {
        AcademicRecord::Gpa { ssc_gpa, hsc_gpa } => evaluate_gpa(*ssc_gpa, *hsc_gpa),
        AcademicRecord::GradePoint {
            mid_level_results,
            adv_level_results,
        } => Ok(evaluate_grade_point(mid_level_results, adv_level_results)),
    }
}

fn evaluate_gpa(ssc_gpa: f64, hsc_gpa: f64) -> Result<EligibilityResult, InvalidRecordError> {
    if !ssc_gpa.is_finite() || !(0.0..=5.0).contains(&ssc_gpa) {
        return Err(InvalidRecordError::SscGpaOutOfRange(ssc_gpa));
    }
    if !hsc_gpa.is_finite() || !(0.0..=5.0).contains(&hsc_gpa) {
        return Err(InvalidRecordError::HscGpaOutOfRange(hsc_gpa));
    }

    // Score is withheld entirely on failure, not reported as the true
    // average. The grade-point track does the opposite; both behaviors are
    // product decisions carried over from the original rules.
    let result = if ssc_gpa >= GPA_PASS_MINIMUM && hsc_gpa >= GPA_PASS_MINIMUM {
        EligibilityResult {
            score: (ssc_gpa + hsc_gpa) / 2.0,
            verdict: Verdict::Pass,
        }
    } else {
        EligibilityResult {
            score: 0.0,
            verdict: Verdict::Fail,
        }
    };
    Ok(result)
}

fn evaluate_grade_point(
    mid_level: &[GradeResult],
    adv_level: &[GradeResult],
) -> EligibilityResult {
    let total = best_n_points(mid_level, MID_LEVEL_BEST) + best_n_points(adv_level, ADV_LEVEL_BEST);
    let verdict = if total >= GRADE_POINT_PASS_MINIMUM {
        Verdict::Pass
    } else {
        Verdict::Fail
    };
    EligibilityResult {
        score: f64::from(total),
        verdict,
    }
}

/// Sum of the `n` highest point values. Ties can land in any order; the
/// sum only depends on the selected values. Fewer than `n` entries sums
/// whatever is present; enforcing minimum counts is the intake layer's job.
pub fn best_n_points(results: &[GradeResult], n: usize) -> u32 {
    let mut points: Vec<u32> = results.iter().map(|r| r.grade.points()).collect();
    points.sort_unstable_by(|a, b| b.cmp(a));
    points.into_iter().take(n).sum()
}
