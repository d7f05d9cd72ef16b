//! Call-site triage.

use crate::paths::LibPathSet;
use crate::trace::CodeLocation;

/// Predicate deciding whether a call site is eligible for observation.
///
/// Evaluated once per observed call, potentially from many threads at once,
/// so implementations must be pure over `&self`.
pub trait CodeFilter: Send + Sync {
    /// Returns true if the call originating at `location` should be traced.
    fn trace(&self, location: &CodeLocation) -> bool;
}

/// The default filter: excludes the standard library and installed packages.
///
/// A location with no resolvable source file cannot be attributed to user
/// code and is excluded as well.
#[derive(Debug, Clone)]
pub struct LibCodeFilter {
    lib_paths: LibPathSet,
}

impl LibCodeFilter {
    pub fn new(lib_paths: LibPathSet) -> Self {
        Self { lib_paths }
    }

    /// The prefix set this filter excludes.
    pub fn lib_paths(&self) -> &LibPathSet {
        &self.lib_paths
    }
}

impl CodeFilter for LibCodeFilter {
    fn trace(&self, location: &CodeLocation) -> bool {
        match location.file.as_deref() {
            Some(file) if !file.as_os_str().is_empty() => !self.lib_paths.contains_prefix_of(file),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn filter() -> LibCodeFilter {
        LibCodeFilter::new(LibPathSet::from_prefixes([
            PathBuf::from("/opt/rt/lib/rt3.12"),
            PathBuf::from("/opt/rt/lib/rt3.12/site-packages"),
        ]))
    }

    #[test]
    fn test_no_source_file_is_not_traced() {
        assert!(!filter().trace(&CodeLocation::unresolved()));
        assert!(!filter().trace(&CodeLocation::from_file("")));
    }

    #[test]
    fn test_library_code_is_not_traced() {
        let filter = filter();
        assert!(!filter.trace(&CodeLocation::from_file("/opt/rt/lib/rt3.12/json/decoder.py")));
        assert!(!filter.trace(&CodeLocation::from_file(
            "/opt/rt/lib/rt3.12/site-packages/requests/api.py"
        )));
    }

    #[test]
    fn test_user_code_is_traced() {
        // A unique temporary directory cannot share a prefix with the set.
        let dir = tempdir().unwrap();
        let location = CodeLocation::from_file(dir.path().join("app.py"))
            .with_module("app")
            .with_line(3);
        assert!(filter().trace(&location));
    }

    #[test]
    fn test_empty_set_traces_all_resolvable_code() {
        let filter = LibCodeFilter::new(LibPathSet::empty());
        assert!(filter.trace(&CodeLocation::from_file("/anywhere/app.py")));
        assert!(!filter.trace(&CodeLocation::unresolved()));
    }
}
