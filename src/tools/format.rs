//! Markdown formatting shared by the tools.

use crate::models::QueryResult;
use chrono::{DateTime, Utc};

/// Text returned when a statement produced no rows.
pub const NO_RESULTS: &str = "Query executed successfully. No results returned.";

/// Placeholder for absent values.
pub const NOT_AVAILABLE: &str = "N/A";

/// Appended below a table that was cut at the row cap.
pub const TRUNCATION_NOTICE: &str = "*Note: Results limited to 1000 rows.*";

/// Escape a value for use inside a markdown table cell.
pub fn escape_cell(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace(['\n', '\r'], "<br>")
}

/// Render a markdown table with a `| --- |` separator row.
///
/// Cells are escaped; rows shorter than the header are padded with empty cells.
pub fn markdown_table<H, R, C>(headers: &[H], rows: R) -> String
where
    H: AsRef<str>,
    R: IntoIterator,
    R::Item: IntoIterator<Item = C>,
    C: AsRef<str>,
{
    let mut out = String::new();
    push_row(&mut out, headers.iter().map(|h| escape_cell(h.as_ref())), headers.len());
    push_row(&mut out, headers.iter().map(|_| "---".to_string()), headers.len());
    for row in rows {
        push_row(
            &mut out,
            row.into_iter().map(|c| escape_cell(c.as_ref())),
            headers.len(),
        );
    }
    out
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>, width: usize) {
    let mut cells: Vec<String> = cells.take(width).collect();
    cells.resize(width, String::new());
    out.push_str("| ");
    out.push_str(&cells.join(" | "));
    out.push_str(" |\n");
}

/// Render a query result as a markdown table, NULL shown as `NULL`.
pub fn format_query_result(result: &QueryResult) -> String {
    if result.columns.is_empty() || result.rows.is_empty() {
        return NO_RESULTS.to_string();
    }

    let rows = result.rows.iter().map(|row| {
        row.iter()
            .map(|cell| cell.as_deref().unwrap_or("NULL"))
            .collect::<Vec<_>>()
    });
    let mut out = markdown_table(&result.column_names(), rows);

    if result.truncated {
        push_truncation_notice(&mut out);
    }
    out
}

/// Append [`TRUNCATION_NOTICE`] below a rendered table.
pub fn push_truncation_notice(out: &mut String) {
    out.push('\n');
    out.push_str(TRUNCATION_NOTICE);
    out.push('\n');
}

/// UTC timestamp as `%Y-%m-%d %H:%M:%S`, or `N/A`.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Keep at most `max` characters, appending `...` when something was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

pub fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(NOT_AVAILABLE)
}
