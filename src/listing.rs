//! lsmod output parsing and module name normalization.
//!
//! The `lsmod` listing is the only introspection primitive the device offers,
//! so every decision in this crate is derived by re-parsing it rather than by
//! keeping state: the loaded-module set can change underneath us (other
//! processes, prior partial failures). Line splitting and field mapping live
//! here and nowhere else, so a format drift is a one-place fix.
//!
//! Each listing line has the shape:
//!
//! ```text
//! <name> <size> <use-count> [<dep1,dep2,...>]
//! ```
//!
//! The fourth column is absent when nothing depends on the module. An entry
//! with an empty dependents list is still *loaded* — that is a different fact
//! from the name not appearing in the listing at all.

use crate::error::{PrepError, Result};
use log::debug;

/// The command whose output this module parses.
pub const LSMOD_COMMAND: &str = "lsmod";

/// Normalize a module name the way the kernel reports it: no `.ko` suffix,
/// `-` mapped to `_`. Idempotent; applied to both sides of every lookup.
fn normalize(name: &str) -> String {
    let name = name.strip_suffix(".ko").unwrap_or(name);
    name.replace('-', "_")
}

/// Return a module's name as it is displayed after loading.
///
/// Takes the last path segment (either separator works), strips a trailing
/// `.ko`, and maps `-` to `_`:
///
/// ```
/// use kmodprep::listing::display_module_name;
///
/// assert_eq!(display_module_name("/data/kunit-test.ko").unwrap(), "kunit_test");
/// assert_eq!(display_module_name("kunit-test.ko").unwrap(), "kunit_test");
/// ```
///
/// # Errors
///
/// `Config` if the path ends with a path separator (no file name to derive
/// the module name from).
pub fn display_module_name(module_path: &str) -> Result<String> {
    let file_name = module_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(module_path);
    if file_name.is_empty() {
        return Err(PrepError::config(format!(
            "module path '{}' must not end with a path separator",
            module_path
        )));
    }
    Ok(normalize(file_name))
}

/// One parsed line of `lsmod` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Module name, as reported by the kernel.
    pub name: String,
    /// Resident size in bytes.
    pub size: u64,
    /// Reference count.
    pub use_count: u64,
    /// Names of loaded modules that depend on this one, in listed order.
    pub dependents: Vec<String>,
}

/// A point-in-time snapshot of the loaded-module listing.
///
/// Parsed fresh from `lsmod` output at every decision point and then
/// discarded; never cached across commands.
#[derive(Debug, Clone, Default)]
pub struct ModuleListing {
    entries: Vec<ModuleEntry>,
}

impl ModuleListing {
    /// Parse the full text of an `lsmod` invocation.
    ///
    /// Lines that do not fit the `<name> <size> <use-count> [...]` shape are
    /// skipped, not errors — the header line `Module Size Used by` is the
    /// usual case.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let (Some(name), Some(size), Some(use_count)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let (Ok(size), Ok(use_count)) = (size.parse(), use_count.parse()) else {
                continue;
            };
            let dependents = fields
                .next()
                .map(|field| {
                    field
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            entries.push(ModuleEntry {
                name: name.to_string(),
                size,
                use_count,
                dependents,
            });
        }
        Self { entries }
    }

    /// All parsed entries, in listing order.
    pub fn entries(&self) -> &[ModuleEntry] {
        &self.entries
    }

    /// Look up the entry for a module by exact (normalized) name.
    /// No substring matches.
    pub fn entry(&self, module_name: &str) -> Option<&ModuleEntry> {
        let key = normalize(module_name);
        self.entries.iter().find(|e| normalize(&e.name) == key)
    }

    /// Whether the module currently appears in the listing.
    pub fn is_loaded(&self, module_name: &str) -> bool {
        self.entry(module_name).is_some()
    }

    /// Names of the modules that depend on the given module, in listed order.
    ///
    /// Empty when the module has no dependents column — and also when the
    /// module is not in the listing at all, which simply means "not loaded",
    /// never an error.
    pub fn dependents_of(&self, module_name: &str) -> Vec<String> {
        match self.entry(module_name) {
            Some(entry) => {
                if !entry.dependents.is_empty() {
                    debug!(
                        "'{}' has depending modules: {}",
                        module_name,
                        entry.dependents.join(",")
                    );
                }
                entry.dependents.clone()
            }
            None => Vec::new(),
        }
    }
}
