//! Integration test: three diffs → method line sets → attribution.

use std::collections::BTreeSet;

use mergescope_core::{ModifiedMethod, MethodSignature};
use mergescope_lines::{attribute, methods_touched, parse_unified_diff, MethodSpan};

const LEFT: &str = "\
--- a/src/app/Cart.java
+++ b/src/app/Cart.java
@@ -9,2 +9,3 @@
     int a = 1;
+    log(a);
     int b = 2;
";

const RIGHT: &str = "\
--- a/src/app/Cart.java
+++ b/src/app/Cart.java
@@ -11,3 +11,2 @@
     int c = 3;
-    int d = 4;
     int e = 5;
";

const MERGE: &str = "\
--- a/src/app/Cart.java
+++ b/src/app/Cart.java
@@ -9,5 +9,5 @@
     int a = 1;
+    log(a);
     int b = 2;
     int c = 3;
-    int d = 4;
     int e = 5;
";

fn cart_add() -> MethodSignature {
    "app.Cart.add(int)".parse().unwrap()
}

fn method_from(diff: &str) -> ModifiedMethod {
    let spans = [MethodSpan {
        signature: cart_add(),
        start: 5,
        end: 20,
    }];
    let files = parse_unified_diff(diff).unwrap();
    let touched = methods_touched(&spans, &spans, &files[0].modified_lines());
    touched
        .into_iter()
        .next()
        .unwrap_or_else(|| ModifiedMethod::new(cart_add()))
}

#[test]
fn each_parent_keeps_its_own_edit() {
    let result = attribute(&method_from(MERGE), &method_from(LEFT), &method_from(RIGHT));
    assert_eq!(result.left_added, BTreeSet::from([10]));
    assert!(result.left_deleted.is_empty());
    assert!(result.right_added.is_empty());
    assert_eq!(result.right_deleted, BTreeSet::from([12]));
}

#[test]
fn same_edit_in_both_parents_is_attributed_twice() {
    let result = attribute(&method_from(LEFT), &method_from(LEFT), &method_from(LEFT));
    assert_eq!(result.left_added, BTreeSet::from([10]));
    assert_eq!(result.right_added, BTreeSet::from([10]));
}

#[test]
fn merge_only_edit_is_dropped() {
    let empty = ModifiedMethod::new(cart_add());
    let result = attribute(&method_from(LEFT), &empty, &empty);
    assert!(result.is_empty());
}

#[test]
fn attribution_serializes_camel_case() {
    let result = attribute(&method_from(MERGE), &method_from(LEFT), &method_from(RIGHT));
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["leftAdded"], serde_json::json!([10]));
    assert_eq!(value["rightDeleted"], serde_json::json!([12]));
}
