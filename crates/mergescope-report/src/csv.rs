use std::collections::BTreeSet;
use std::fmt::Write;

use mergescope_core::{CollectedMergeMethodData, MergeScopeError, ModifiedMethod, ReportConfig};
use tracing::info;

/// Column names of the attribution report.
pub const HEADER: [&str; 9] = [
    "project",
    "merge commit",
    "className",
    "method",
    "left modifications",
    "left deletions",
    "right modifications",
    "right deletions",
    "entrypoints",
];

/// Characters removed from every column but the last in compact mode.
const COMPACT_STRIPPED: &[char] = &[' ', '+', '^', '?', '<', '>', '|'];

/// Escape one field for the report.
///
/// Line breaks become spaces. A field containing a double quote, a single
/// quote or the separator has its double quotes doubled and is wrapped in
/// double quotes.
///
/// # Examples
///
/// ```
/// use mergescope_report::escape_field;
///
/// assert_eq!(escape_field("plain", ";"), "plain");
/// assert_eq!(escape_field("a\nb", ";"), "a b");
/// assert_eq!(escape_field("say \"hi\"", ";"), "\"say \"\"hi\"\"\"");
/// assert_eq!(escape_field("m(int,long)", ","), "\"m(int,long)\"");
/// ```
pub fn escape_field(field: &str, separator: &str) -> String {
    quote(flatten(field), separator)
}

fn flatten(field: &str) -> String {
    field.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn quote(field: String, separator: &str) -> String {
    if field.contains('"') || field.contains('\'') || field.contains(separator) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field
    }
}

/// Strip spaces and `+^?<>|` from a field.
///
/// # Examples
///
/// ```
/// use mergescope_report::compact_field;
///
/// assert_eq!(compact_field("[1, 2]"), "[1,2]");
/// ```
pub fn compact_field(field: &str) -> String {
    field.chars().filter(|c| !COMPACT_STRIPPED.contains(c)).collect()
}

fn line_set(lines: &BTreeSet<u32>) -> String {
    let items: Vec<String> = lines.iter().map(u32::to_string).collect();
    format!("[{}]", items.join(", "))
}

fn entrypoint_list(entrypoints: &[ModifiedMethod]) -> String {
    let items: Vec<String> = entrypoints.iter().map(|m| m.signature.to_string()).collect();
    format!("[{}]", items.join(", "))
}

/// Render one record as an escaped row.
///
/// Fields are joined with `config.separator`. With `config.compact`, every
/// field but the entry points is compacted before it is quoted.
pub fn to_csv_row(
    record: &CollectedMergeMethodData,
    entrypoints: &[ModifiedMethod],
    config: &ReportConfig,
) -> String {
    let sep = config.separator.as_str();
    let fields = [
        record.project.name.clone(),
        record.merge_commit.sha().to_string(),
        record.class_name.clone(),
        record.method_signature.to_string(),
        line_set(&record.left_added_lines),
        line_set(&record.left_deleted_lines),
        line_set(&record.right_added_lines),
        line_set(&record.right_deleted_lines),
        entrypoint_list(entrypoints),
    ];
    let last = fields.len() - 1;
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let flat = flatten(field);
            let flat = if config.compact && i != last {
                compact_field(&flat)
            } else {
                flat
            };
            quote(flat, sep)
        })
        .collect::<Vec<_>>()
        .join(sep)
}

/// One report row: a record and the entry points of its merge.
pub type ReportRow<'a> = (&'a CollectedMergeMethodData, &'a [ModifiedMethod]);

/// Render the full report: header, then one row per record.
///
/// In compact mode the header is left untouched.
pub fn render_report<'a, I>(rows: I, config: &ReportConfig) -> String
where
    I: IntoIterator<Item = ReportRow<'a>>,
{
    let sep = config.separator.as_str();
    let mut out = String::new();
    let header: Vec<String> = HEADER.iter().map(|h| escape_field(h, sep)).collect();
    let _ = writeln!(out, "{}", header.join(sep));

    for (record, entrypoints) in rows {
        let row = to_csv_row(record, entrypoints, config);
        if row.trim().is_empty() {
            continue;
        }
        let _ = writeln!(out, "{row}");
    }
    out
}

/// Render the report and write it to `config.output`, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`MergeScopeError::Io`] if the directory or file cannot be written.
pub fn write_report<'a, I>(rows: I, config: &ReportConfig) -> Result<(), MergeScopeError>
where
    I: IntoIterator<Item = ReportRow<'a>>,
{
    if let Some(parent) = config.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let report = render_report(rows, config);
    std::fs::write(&config.output, &report)?;
    info!(
        path = %config.output.display(),
        rows = report.lines().count().saturating_sub(1),
        "wrote report"
    );
    Ok(())
}
