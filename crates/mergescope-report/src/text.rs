use std::collections::BTreeSet;
use std::fmt::Write;

use mergescope_core::{CollectedMergeMethodData, ModifiedMethod};

/// One line per common ancestor, simplified signature first.
///
/// # Examples
///
/// ```
/// use mergescope_core::ModifiedMethod;
/// use mergescope_report::format_ancestors;
///
/// let lca = ModifiedMethod::new("shop.Checkout.run(java.lang.String)".parse().unwrap());
/// assert_eq!(
///     format_ancestors(&[lca]),
///     "shop.Checkout.run(String)  shop.Checkout.run(java.lang.String)\n"
/// );
/// ```
pub fn format_ancestors(ancestors: &[ModifiedMethod]) -> String {
    if ancestors.is_empty() {
        return "no common ancestors\n".to_string();
    }
    let mut out = String::new();
    for method in ancestors {
        let _ = writeln!(
            out,
            "{}  {}",
            method.signature.simplified(),
            method.signature
        );
    }
    out
}

fn numbers(lines: &BTreeSet<u32>) -> String {
    let items: Vec<String> = lines.iter().map(u32::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Attribution records grouped under their class, one method per block.
pub fn format_attribution(records: &[CollectedMergeMethodData]) -> String {
    if records.is_empty() {
        return "no mutually modified methods\n".to_string();
    }

    let mut out = String::new();
    let mut current_class: Option<&str> = None;
    for record in records {
        if current_class != Some(record.class_name.as_str()) {
            let _ = writeln!(out, "{}", record.class_name);
            current_class = Some(record.class_name.as_str());
        }
        let _ = writeln!(out, "  {}", record.method_signature.simplified());
        let _ = writeln!(
            out,
            "    left   added {}  deleted {}",
            numbers(&record.left_added_lines),
            numbers(&record.left_deleted_lines)
        );
        let _ = writeln!(
            out,
            "    right  added {}  deleted {}",
            numbers(&record.right_added_lines),
            numbers(&record.right_deleted_lines)
        );
    }
    out
}
