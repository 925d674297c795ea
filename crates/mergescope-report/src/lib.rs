//! Report rendering for collected merge data.
//!
//! [`csv`] writes the per-method attribution table; [`text`] renders
//! human-readable summaries for the terminal.

pub mod csv;
pub mod text;

pub use csv::{
    compact_field, escape_field, render_report, to_csv_row, write_report, ReportRow, HEADER,
};
pub use text::{format_ancestors, format_attribution};
