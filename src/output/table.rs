use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::eligibility::{EligibilityResult, Track};
use crate::storage::StoredApplication;

fn verdict_cell(result: &EligibilityResult) -> Cell {
    if result.passed() {
        Cell::new("PASS").fg(Color::Green)
    } else {
        Cell::new("FAIL").fg(Color::Red)
    }
}

pub fn render_result_table(track: Track, result: &EligibilityResult) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Track", "Verdict", "Score"]);
    table.add_row(Row::from(vec![
        Cell::new(track.to_string()),
        verdict_cell(result),
        Cell::new(format!("{:.2}", result.score)),
    ]));
    table.to_string()
}

pub fn render_applications_table(applications: &[StoredApplication]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID",
        "Applicant",
        "Department",
        "Track",
        "Verdict",
        "Score",
        "Submitted",
    ]);

    for application in applications {
        table.add_row(Row::from(vec![
            Cell::new(application.id.to_string()),
            Cell::new(application.full_name.clone()),
            Cell::new(application.department.to_string()),
            Cell::new(application.record.track().to_string()),
            verdict_cell(&application.result),
            Cell::new(format!("{:.2}", application.result.score)),
            Cell::new(application.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]));
    }
    table.to_string()
}
