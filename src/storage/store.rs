use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::auth::Role;
use crate::eligibility::{AcademicRecord, EligibilityResult, Verdict};
use crate::intake::{ApplicantProfile, Department};
use crate::storage::migrations::BASE_MIGRATION;

pub struct PortalStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredUser {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub applicant_id: Option<i64>,
    pub profile: ApplicantProfile,
    pub record: AcademicRecord,
    pub result: EligibilityResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredApplication {
    pub id: i64,
    pub applicant_id: Option<i64>,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub email: String,
    pub phone: String,
    pub department: Department,
    pub record: AcademicRecord,
    pub result: EligibilityResult,
    pub created_at: DateTime<Utc>,
}

impl PortalStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    pub fn insert_user(
        &self,
        full_name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<StoredUser> {
        let created_at = Utc::now();
        self.conn.execute(
            r#"
INSERT INTO users(full_name, email, password_hash, role, created_at)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
            params![
                full_name,
                email,
                password_hash,
                role.as_slug(),
                created_at.to_rfc3339()
            ],
        )?;
        Ok(StoredUser {
            id: self.conn.last_insert_rowid(),
            full_name: full_name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at,
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let user = self
            .conn
            .prepare(
                r#"
SELECT id, full_name, email, password_hash, role, created_at
FROM users
WHERE email = ?1
"#,
            )?
            .query_row(params![email], row_to_user)
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_id(&self, id: i64) -> Result<Option<StoredUser>> {
        let user = self
            .conn
            .prepare(
                r#"
SELECT id, full_name, email, password_hash, role, created_at
FROM users
WHERE id = ?1
"#,
            )?
            .query_row(params![id], row_to_user)
            .optional()?;
        Ok(user)
    }

    pub fn insert_session(
        &self,
        token: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions(token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, expires_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Resolves a bearer token to its user, ignoring expired sessions.
    pub fn session_user(&self, token: &str) -> Result<Option<StoredUser>> {
        let user = self
            .conn
            .prepare(
                r#"
SELECT u.id, u.full_name, u.email, u.password_hash, u.role, u.created_at
FROM sessions s
JOIN users u ON u.id = s.user_id
WHERE s.token = ?1 AND s.expires_at > ?2
"#,
            )?
            .query_row(params![token, Utc::now().to_rfc3339()], row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Persists an application together with its computed result in a
    /// single INSERT, so a row is never observable with a track populated
    /// but no score/verdict.
    pub fn insert_application(&self, new: &NewApplication) -> Result<StoredApplication> {
        let created_at = Utc::now();
        self.conn.execute(
            r#"
INSERT INTO applications(
    applicant_id, full_name, date_of_birth, email, phone, department,
    track, record_json, score, verdict, created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#,
            params![
                new.applicant_id,
                new.profile.full_name,
                new.profile.date_of_birth.to_string(),
                new.profile.email,
                new.profile.phone,
                new.profile.department.as_slug(),
                new.record.track().as_slug(),
                serde_json::to_string(&new.record)?,
                new.result.score,
                new.result.verdict.as_slug(),
                created_at.to_rfc3339()
            ],
        )?;
        Ok(StoredApplication {
            id: self.conn.last_insert_rowid(),
            applicant_id: new.applicant_id,
            full_name: new.profile.full_name.clone(),
            date_of_birth: new.profile.date_of_birth,
            email: new.profile.email.clone(),
            phone: new.profile.phone.clone(),
            department: new.profile.department,
            record: new.record.clone(),
            result: new.result,
            created_at,
        })
    }

    pub fn load_application(&self, id: i64) -> Result<Option<StoredApplication>> {
        let application = self
            .conn
            .prepare(&format!("{APPLICATION_SELECT} WHERE id = ?1"))?
            .query_row(params![id], row_to_application)
            .optional()?;
        Ok(application)
    }

    pub fn applications_for_user(&self, user_id: i64) -> Result<Vec<StoredApplication>> {
        let rows = self
            .conn
            .prepare(&format!(
                "{APPLICATION_SELECT} WHERE applicant_id = ?1 ORDER BY created_at DESC, id DESC"
            ))?
            .query_map(params![user_id], row_to_application)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_applications(&self) -> Result<Vec<StoredApplication>> {
        let rows = self
            .conn
            .prepare(&format!(
                "{APPLICATION_SELECT} ORDER BY created_at DESC, id DESC"
            ))?
            .query_map([], row_to_application)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

const APPLICATION_SELECT: &str = r#"
SELECT id, applicant_id, full_name, date_of_birth, email, phone, department,
       record_json, score, verdict, created_at
FROM applications
"#;

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredUser> {
    let role_raw: String = row.get(4)?;
    let role = role_raw
        .parse::<Role>()
        .map_err(|e| conversion_error(4, e))?;
    Ok(StoredUser {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role,
        created_at: parse_timestamp(row.get::<_, String>(5)?, 5)?,
    })
}

fn row_to_application(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredApplication> {
    let department_raw: String = row.get(6)?;
    let department = department_raw
        .parse::<Department>()
        .map_err(|e| conversion_error(6, e))?;
    let record_json: String = row.get(7)?;
    let record: AcademicRecord =
        serde_json::from_str(&record_json).map_err(|e| conversion_error(7, e))?;
    let verdict_raw: String = row.get(9)?;
    let verdict = verdict_raw
        .parse::<Verdict>()
        .map_err(|e| conversion_error(9, e))?;
    let dob_raw: String = row.get(3)?;
    let date_of_birth = dob_raw
        .parse::<NaiveDate>()
        .map_err(|e| conversion_error(3, e))?;
    Ok(StoredApplication {
        id: row.get(0)?,
        applicant_id: row.get(1)?,
        full_name: row.get(2)?,
        date_of_birth,
        email: row.get(4)?,
        phone: row.get(5)?,
        department,
        record,
        result: EligibilityResult {
            score: row.get(8)?,
            verdict,
        },
        created_at: parse_timestamp(row.get::<_, String>(10)?, 10)?,
    })
}

fn parse_timestamp(raw: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn conversion_error(
    column: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::{Grade, GradeResult};

    fn open_store() -> (tempfile::TempDir, PortalStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PortalStore::open(&dir.path().join("portal.db")).expect("open store");
        (dir, store)
    }

    fn sample_application(applicant_id: Option<i64>) -> NewApplication {
        NewApplication {
            applicant_id,
            profile: ApplicantProfile {
                full_name: "Ayesha Rahman".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(2005, 3, 14).expect("date"),
                email: "ayesha@example.com".to_string(),
                phone: "01712345678".to_string(),
                department: Department::Cse,
            },
            record: AcademicRecord::Gpa {
                ssc_gpa: 4.5,
                hsc_gpa: 4.2,
            },
            result: EligibilityResult {
                score: 4.35,
                verdict: Verdict::Pass,
            },
        }
    }

    #[test]
    fn application_roundtrip_keeps_record_and_result() {
        let (_dir, store) = open_store();
        let stored = store
            .insert_application(&sample_application(None))
            .expect("insert");

        let loaded = store
            .load_application(stored.id)
            .expect("load")
            .expect("present");
        assert_eq!(loaded.record, stored.record);
        assert_eq!(loaded.result, stored.result);
        assert_eq!(loaded.department, Department::Cse);
        assert_eq!(loaded.date_of_birth, stored.date_of_birth);
    }

    #[test]
    fn grade_point_record_survives_json_column() {
        let (_dir, store) = open_store();
        let mut new = sample_application(None);
        new.record = AcademicRecord::GradePoint {
            mid_level_results: vec![
                GradeResult {
                    subject: "Mathematics".to_string(),
                    grade: Grade::A,
                },
                GradeResult {
                    subject: "Physics".to_string(),
                    grade: Grade::B,
                },
            ],
            adv_level_results: vec![GradeResult {
                subject: "Chemistry".to_string(),
                grade: Grade::C,
            }],
        };
        new.result = EligibilityResult {
            score: 12.0,
            verdict: Verdict::Fail,
        };
        let stored = store.insert_application(&new).expect("insert");
        let loaded = store
            .load_application(stored.id)
            .expect("load")
            .expect("present");
        assert_eq!(loaded.record, new.record);
        assert_eq!(loaded.result.verdict, Verdict::Fail);
        assert_eq!(loaded.result.score, 12.0);
    }

    #[test]
    fn listings_are_scoped_and_ordered() {
        let (_dir, store) = open_store();
        let user = store
            .insert_user("Ayesha Rahman", "ayesha@example.com", "salt$digest", Role::Applicant)
            .expect("insert user");
        store
            .insert_application(&sample_application(Some(user.id)))
            .expect("insert");
        store
            .insert_application(&sample_application(None))
            .expect("insert");

        assert_eq!(store.applications_for_user(user.id).expect("list").len(), 1);
        let all = store.all_applications().expect("list all");
        assert_eq!(all.len(), 2);
        assert!(all[0].id >= all[1].id);
    }

    #[test]
    fn duplicate_email_is_rejected_by_unique_index() {
        let (_dir, store) = open_store();
        store
            .insert_user("Ayesha Rahman", "ayesha@example.com", "salt$digest", Role::Applicant)
            .expect("insert user");
        let err = store.insert_user("Imposter", "ayesha@example.com", "salt$digest", Role::Admin);
        assert!(err.is_err());
    }

    #[test]
    fn sessions_expire() {
        let (_dir, store) = open_store();
        let user = store
            .insert_user("Ayesha Rahman", "ayesha@example.com", "salt$digest", Role::Applicant)
            .expect("insert user");

        store
            .insert_session("live-token", user.id, Utc::now() + chrono::Duration::days(1))
            .expect("insert session");
        store
            .insert_session("dead-token", user.id, Utc::now() - chrono::Duration::days(1))
            .expect("insert session");

        assert!(store.session_user("live-token").expect("query").is_some());
        assert!(store.session_user("dead-token").expect("query").is_none());
        assert!(store.session_user("missing").expect("query").is_none());
    }
}
