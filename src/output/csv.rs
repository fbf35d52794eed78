use anyhow::Result;

use crate::storage::StoredApplication;

pub fn applications_to_csv(applications: &[StoredApplication]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "full_name",
        "email",
        "department",
        "track",
        "verdict",
        "score",
        "created_at",
    ])?;
    for application in applications {
        writer.write_record([
            application.id.to_string(),
            application.full_name.clone(),
            application.email.clone(),
            application.department.as_slug().to_string(),
            application.record.track().as_slug().to_string(),
            application.result.verdict.as_slug().to_string(),
            format!("{:.2}", application.result.score),
            application.created_at.to_rfc3339(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
