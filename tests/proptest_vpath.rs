//! Property-based tests for the path algebra
//!
//! Generated paths use `/` roots and plain component names, mixed with `.` and `..`.

use std::cmp::Ordering;

use proptest::prelude::*;
use vfs_sandbox::{CaseSensitivity, VirtualFileSystem, vpath};

/// Strategies for generating virtual paths
mod strategies {
    use proptest::prelude::*;

    /// A single path component, sometimes `.` or `..`
    pub fn component() -> impl Strategy<Value = String> {
        prop_oneof![
            4 => prop::string::string_regex("[a-zA-Z0-9_][a-zA-Z0-9_.]{0,7}").unwrap(),
            1 => Just(".".to_string()),
            1 => Just("..".to_string()),
        ]
    }

    /// A file name without dots
    pub fn name() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9_]{1,8}").unwrap()
    }

    /// Components joined by `/`, sometimes with a trailing separator
    fn joined() -> impl Strategy<Value = String> {
        (prop::collection::vec(component(), 0..6), any::<bool>()).prop_map(|(parts, slash)| {
            let mut path = parts.join("/");
            if slash && !path.is_empty() {
                path.push('/');
            }
            path
        })
    }

    pub fn relative_path() -> impl Strategy<Value = String> {
        joined()
    }

    pub fn absolute_path() -> impl Strategy<Value = String> {
        joined().prop_map(|path| format!("/{path}"))
    }

    pub fn any_path() -> impl Strategy<Value = String> {
        prop_oneof![relative_path(), absolute_path()]
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Normalizing twice changes nothing
    #[test]
    fn normalize_is_idempotent(path in strategies::any_path()) {
        let once = vpath::normalize(&path);
        prop_assert_eq!(vpath::normalize(&once), once);
    }

    /// Parsing and formatting a normalized path gives it back. Parsing drops a trailing
    /// separator after the root, so that one is put back before comparing.
    #[test]
    fn parse_format_round_trip(path in strategies::any_path()) {
        let normalized = vpath::normalize(&path);
        let formatted = vpath::format(&vpath::parse(&normalized));
        let root_only = normalized.len() == vpath::get_root_length(&normalized);
        if vpath::has_trailing_separator(&normalized) && !root_only {
            prop_assert_eq!(vpath::add_trailing_separator(&formatted), normalized);
        } else {
            prop_assert_eq!(formatted, normalized);
        }
    }

    /// Resolving the relative path from `from` leads to `to` under either case rule
    #[test]
    fn relative_inverts_resolve(
        from in strategies::absolute_path(),
        to in strategies::absolute_path(),
        ignore_case in any::<bool>(),
    ) {
        let relative = vpath::relative(&from, &to, ignore_case).unwrap();
        prop_assert!(!vpath::has_root(&relative), "relative path is rooted: {}", relative);

        let resolved = vpath::resolve(&from, &[relative.as_str()]);
        let expected = vpath::normalize(&to);
        prop_assert!(
            vpath::equate(&resolved, &expected, ignore_case),
            "{} from {} resolved to {}, expected {}", relative, from, resolved, expected
        );
    }

    /// A resolved child always lies beneath its base
    #[test]
    fn resolved_child_is_beneath(base in strategies::absolute_path(), name in strategies::name()) {
        let child = vpath::resolve(&base, &[name.as_str()]);
        prop_assert!(vpath::beneath(&base, &child, false));
        prop_assert_eq!(vpath::basename(&child), name);
    }

    /// Names differing only in case are equal exactly when case is ignored
    #[test]
    fn case_rule(name in "[a-z]{1,8}") {
        let upper = name.to_uppercase();
        prop_assert!(vpath::equate(&upper, &name, true));
        prop_assert!(!vpath::equate(&upper, &name, false));
        prop_assert_eq!(vpath::compare(&upper, &name, true), Ordering::Equal);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Listings are strictly ordered under the case rule, whatever the insertion order
    #[test]
    fn listing_is_ordered(
        names in prop::collection::vec(strategies::name(), 1..20),
        ignore_case in any::<bool>(),
    ) {
        let mut fs = VirtualFileSystem::new(CaseSensitivity::from_ignore_case(ignore_case));
        for name in &names {
            fs.add_file(&format!("/{name}"), name.as_str()).unwrap();
        }

        let files = fs.get_accessible_file_system_entries("/").files;
        for pair in files.windows(2) {
            prop_assert_eq!(vpath::compare(&pair[0], &pair[1], ignore_case), Ordering::Less);
        }
    }

    /// Writes to a clone are never visible in the original, and the other way round
    #[test]
    fn clone_isolation(names in prop::collection::vec(strategies::name(), 1..10)) {
        let mut original = VirtualFileSystem::new(CaseSensitivity::Sensitive);
        for name in &names {
            original.add_file(&format!("/{name}"), "").unwrap();
        }
        let before = original.get_accessible_file_system_entries("/");

        let mut sandbox = original.clone();
        sandbox.add_file("/written_by_sandbox", "").unwrap();
        sandbox.remove(&format!("/{}", names[0])).unwrap();
        original.add_file("/written_by_original", "").unwrap();

        prop_assert!(!original.file_exists("/written_by_sandbox"));
        let removed_path = format!("/{}", names[0]);
        prop_assert!(original.file_exists(&removed_path));
        prop_assert!(!sandbox.file_exists("/written_by_original"));
        prop_assert_eq!(sandbox.get_accessible_file_system_entries("/").files.len(), before.files.len());
    }
}
