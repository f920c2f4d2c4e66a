//! Property-Based Tests for kmodprep
//!
//! Uses proptest for testing parsing and normalization invariants:
//! - Display-name normalization is idempotent and produces canonical names
//! - The listing parser never panics and never invents dependents
//! - Lookups are exact-match, never substring

use proptest::prelude::*;

use kmodprep::listing::{ModuleListing, display_module_name};

// =============================================================================
// Display Name Properties
// =============================================================================

/// Strategy for plausible module file stems (letters, digits, `-`, `_`).
fn module_stem_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,20}"
}

proptest! {
    /// Normalization is idempotent: applying it to its own output is identity.
    #[test]
    fn display_name_idempotent(stem in module_stem_strategy()) {
        let path = format!("/lib/modules/{}.ko", stem);
        let once = display_module_name(&path).expect("valid path");
        let twice = display_module_name(&once).expect("valid name");
        prop_assert_eq!(once, twice);
    }

    /// The canonical name carries no directory, `.ko` suffix, or `-`.
    #[test]
    fn display_name_is_canonical(stem in module_stem_strategy()) {
        let path = format!("/data/local/{}.ko", stem);
        let name = display_module_name(&path).expect("valid path");
        prop_assert!(!name.contains('/'));
        prop_assert!(!name.contains('\\'));
        prop_assert!(!name.contains('-'));
        prop_assert!(!name.ends_with(".ko"));
        prop_assert_eq!(name, stem.replace('-', "_"));
    }

    /// Path and bare file name resolve to the same module name.
    #[test]
    fn display_name_ignores_directories(stem in module_stem_strategy()) {
        let from_path = display_module_name(&format!("/a/b/c/{}.ko", stem)).expect("path");
        let from_file = display_module_name(&format!("{}.ko", stem)).expect("file");
        prop_assert_eq!(from_path, from_file);
    }
}

// =============================================================================
// Listing Parser Properties
// =============================================================================

proptest! {
    /// The parser accepts arbitrary text without panicking, and entries only
    /// come from lines with numeric size and use-count fields.
    #[test]
    fn parse_never_panics(text in ".{0,400}") {
        let listing = ModuleListing::parse(&text);
        for entry in listing.entries() {
            prop_assert!(!entry.name.is_empty());
        }
    }

    /// A well-formed line with N comma-separated dependents yields exactly
    /// those N names, in order.
    #[test]
    fn dependents_preserved_in_order(
        name in module_stem_strategy(),
        deps in prop::collection::vec(module_stem_strategy(), 1..5),
        size in 1u64..10_000_000,
        use_count in 0u64..100,
    ) {
        let line = format!("{} {} {} {}", name, size, use_count, deps.join(","));
        let listing = ModuleListing::parse(&line);
        let expected: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
        prop_assert_eq!(listing.dependents_of(&name), expected);
    }

    /// A line without a dependents column yields an empty dependents list,
    /// but the module still counts as loaded.
    #[test]
    fn loaded_without_dependents(
        name in module_stem_strategy(),
        size in 1u64..10_000_000,
        use_count in 0u64..100,
    ) {
        let line = format!("{} {} {}", name, size, use_count);
        let listing = ModuleListing::parse(&line);
        prop_assert!(listing.is_loaded(&name));
        prop_assert!(listing.dependents_of(&name).is_empty());
    }

    /// Names absent from the listing are never loaded and never have
    /// dependents — and that is not an error.
    #[test]
    fn absent_names_are_not_loaded(name in module_stem_strategy()) {
        let listing = ModuleListing::parse("sec_touch 663552 0\n");
        // Lookup normalizes `-` to `_`, so exclude that alias too.
        prop_assume!(name.replace('-', "_") != "sec_touch");
        prop_assert!(!listing.is_loaded(&name));
        prop_assert!(listing.dependents_of(&name).is_empty());
    }
}
