//! Conversions between dotted and internal (slash-separated) class names

/// The hierarchy root every ancestor walk terminates at
pub const OBJECT_ROOT: &str = "java/lang/Object";

const CLASS_SUFFIX: &str = ".class";

pub fn to_dotted(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

pub fn to_internal(dotted_name: &str) -> String {
    dotted_name.replace('.', "/")
}

/// Strip the `.class` extension from an archive or directory-relative path,
/// yielding the internal name. Returns `None` for non-class paths.
pub fn class_name_from_path(path: &str) -> Option<&str> {
    path.strip_suffix(CLASS_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Parse a comma-separated list of dotted names into internal names.
///
/// Entries are trimmed, blanks dropped, and order preserved.
pub fn parse_base_classes(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(to_internal)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_converts_names() {
        assert_eq!(to_dotted("a/b/C"), "a.b.C");
        assert_eq!(to_internal("x.y.Z"), "x/y/Z");
        assert_eq!(class_name_from_path("foo/bar/Baz.class"), Some("foo/bar/Baz"));
        assert_eq!(class_name_from_path("foo/bar/Baz.txt"), None);
        assert_eq!(class_name_from_path(".class"), None);
    }

    #[test]
    fn test_parses_base_classes() {
        assert!(parse_base_classes("").is_empty());
        assert!(parse_base_classes("   ").is_empty());
        assert_eq!(
            parse_base_classes(" com.example.Service, ,java.lang.Runnable  "),
            vec!["com/example/Service", "java/lang/Runnable"]
        );
    }

    proptest! {
        #[test]
        fn dotted_names_round_trip(name in "[a-zA-Z_$][a-zA-Z0-9_$]{0,12}(\\.[a-zA-Z_$][a-zA-Z0-9_$]{0,12}){0,5}") {
            prop_assert_eq!(to_dotted(&to_internal(&name)), name);
        }
    }
}
