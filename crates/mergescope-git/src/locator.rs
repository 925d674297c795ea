use mergescope_core::MergeScopeError;
use mergescope_lines::MethodSpan;

/// Source roots stripped when deriving a type name from a path.
const SOURCE_ROOTS: &[&str] = &["src/main/java/", "src/test/java/", "src/main/kotlin/", "src/"];

/// Finds the methods declared in a source file.
pub trait MethodLocator {
    /// Method spans of `source`, the content of `path` at some revision.
    fn locate(&self, path: &str, source: &str) -> Result<Vec<MethodSpan>, MergeScopeError>;

    /// Fully-qualified name of the type declared by `path`.
    ///
    /// `source` is `None` when the file does not exist at the revision.
    /// Defaults to [`type_name_from_path`].
    fn type_name(&self, path: &str, _source: Option<&str>) -> Result<String, MergeScopeError> {
        Ok(type_name_from_path(path))
    }
}

/// Derive a type name from a conventional source path.
///
/// # Examples
///
/// ```
/// use mergescope_git::type_name_from_path;
///
/// assert_eq!(type_name_from_path("core/src/main/java/com/acme/Cart.java"), "com.acme.Cart");
/// assert_eq!(type_name_from_path("Cart.java"), "Cart");
/// ```
pub fn type_name_from_path(path: &str) -> String {
    let relative = SOURCE_ROOTS
        .iter()
        .find_map(|root| path.find(root).map(|i| &path[i + root.len()..]))
        .unwrap_or(path);
    let stem = match relative.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem,
        _ => relative,
    };
    stem.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maven_layout() {
        assert_eq!(type_name_from_path("src/main/java/a/b/C.java"), "a.b.C");
        assert_eq!(type_name_from_path("src/test/java/a/CTest.java"), "a.CTest");
    }

    #[test]
    fn plain_src_root() {
        assert_eq!(type_name_from_path("src/pkg/Main.java"), "pkg.Main");
    }

    #[test]
    fn no_extension() {
        assert_eq!(type_name_from_path("lib/v1.0/Thing"), "lib.v1.0.Thing");
    }
}
