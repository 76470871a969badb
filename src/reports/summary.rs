//! Legacy multi-line summary projection of a report.
//!
//! The summary is display-only. Nothing in the store parses it back to make a
//! decision; the helpers here exist so the migrator can repair stored headers
//! and so tests can check the projection against the structured fields.

use crate::reports::model::Report;

pub const REPORT_ID_PREFIX: &str = "Report ID:";
pub const ARCHIVED_PREFIX: &str = "Archived:";

/// Render every field as one `Label: value` line. Free text is flattened to a
/// single line so it can never forge a `Report ID:` or `Archived:` line.
pub fn render_summary(report: &Report) -> String {
    let location = report
        .location
        .as_ref()
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let category = report
        .category_id
        .map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string());

    [
        format!("Username: {}", single_line(&report.submitter_name)),
        format!("UUID: {}", single_line(&report.submitter_id)),
        format!("World: {}", single_line(&report.environment_name)),
        format!("Category ID: {}", category),
        format!("Full Message: {}", single_line(&report.body)),
        format!("{} {}", ARCHIVED_PREFIX, u8::from(report.archived)),
        format!("{} {}", REPORT_ID_PREFIX, report.id),
        format!("Timestamp: {}", report.created_at),
        format!("Location: {}", location),
        format!("Gamemode: {}", single_line(&report.mode)),
    ]
    .join("\n")
}

/// Replace the value of every line starting with `prefix`, leaving other
/// lines untouched. Text without such a line is returned unchanged.
pub fn rewrite_line(text: &str, prefix: &str, value: &str) -> String {
    text.lines()
        .map(|line| {
            if line.starts_with(prefix) {
                format!("{} {}", prefix, value)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Value of the first line starting with `prefix`, trimmed.
pub fn read_line<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.strip_prefix(prefix))
        .map(str::trim)
}

fn single_line(text: &str) -> String {
    text.lines().collect::<Vec<_>>().join(" ")
}
