//! Install-path resolution for library-code recognition.
//!
//! The default code filter needs to know which filesystem prefixes hold the
//! traced runtime's standard library and installed packages. That knowledge
//! is split in two: [`InstallLayout`] is the raw answer from the runtime's
//! own path-configuration facility, and [`LibPathSet`] is the frozen,
//! deduplicated prefix set derived from it once at startup.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

/// Error type for install-layout probing.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("failed to run interpreter: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("interpreter probe exited with {status}: {stderr}")]
    Probe {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("malformed probe output: {0}")]
    Parse(#[from] serde_json::Error),
}

// The defaulted getattr means a runtime that never sets the isolation
// indicator reports null instead of failing the probe.
const PROBE_SCRIPT: &str = "\
import json, sys, sysconfig
print(json.dumps({
    'stdlib': sysconfig.get_path('stdlib'),
    'purelib': sysconfig.get_path('purelib'),
    'platlib': sysconfig.get_path('platlib'),
    'installed_base': sysconfig.get_config_var('installed_base'),
    'real_prefix': getattr(sys, 'real_prefix', None),
}))
";

/// Install locations reported by the traced runtime.
///
/// Every field is optional: a location the runtime cannot report is simply
/// absent and drops out of the resolved [`LibPathSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstallLayout {
    /// Standard-library install location.
    pub stdlib: Option<PathBuf>,
    /// Pure-library package install location.
    pub purelib: Option<PathBuf>,
    /// Platform-specific package install location.
    pub platlib: Option<PathBuf>,
    /// Install base the reported paths are rooted under.
    pub installed_base: Option<PathBuf>,
    /// Set when running inside an isolated environment: the prefix of the
    /// real (non-isolated) installation.
    pub real_prefix: Option<PathBuf>,
}

impl InstallLayout {
    /// Probe the default interpreter (`python3` on the search path).
    pub fn probe() -> Result<Self, LayoutError> {
        Self::probe_with("python3")
    }

    /// Probe a specific interpreter for its install layout.
    pub fn probe_with(interpreter: &str) -> Result<Self, LayoutError> {
        let output = Command::new(interpreter)
            .arg("-c")
            .arg(PROBE_SCRIPT)
            .output()?;
        if !output.status.success() {
            return Err(LayoutError::Probe {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        let layout: InstallLayout = serde_json::from_slice(&output.stdout)?;
        debug!("probed install layout from {}: {:?}", interpreter, layout);
        Ok(layout)
    }
}

/// The frozen set of path prefixes recognized as library code.
///
/// Computed once at startup and shared read-only for the rest of the
/// process. Prefixes are held sorted for reproducible iteration; order
/// carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibPathSet {
    prefixes: Vec<PathBuf>,
}

impl LibPathSet {
    /// Resolve the prefix set from an install layout.
    ///
    /// Absent and empty locations are dropped rather than kept as
    /// match-everything empty prefixes. When the layout carries a real
    /// prefix (isolated environment), the standard-library path is rebased
    /// from `installed_base` onto it and added as well; if any ingredient
    /// for that rebase is missing, the step is skipped.
    pub fn resolve(layout: &InstallLayout) -> Self {
        let mut prefixes: BTreeSet<PathBuf> = BTreeSet::new();

        for path in [&layout.stdlib, &layout.purelib, &layout.platlib]
            .into_iter()
            .flatten()
        {
            if !path.as_os_str().is_empty() {
                prefixes.insert(path.clone());
            }
        }

        if let Some(real_prefix) = layout
            .real_prefix
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
        {
            if let (Some(stdlib), Some(base)) = (&layout.stdlib, &layout.installed_base) {
                if let Ok(relative) = stdlib.strip_prefix(base) {
                    prefixes.insert(real_prefix.join(relative));
                }
            }
        }

        Self {
            prefixes: prefixes.into_iter().collect(),
        }
    }

    /// An empty set: nothing is recognized as library code.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set directly from known prefixes; empty entries are dropped.
    pub fn from_prefixes(prefixes: impl IntoIterator<Item = PathBuf>) -> Self {
        let set: BTreeSet<PathBuf> = prefixes
            .into_iter()
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        Self {
            prefixes: set.into_iter().collect(),
        }
    }

    /// Whether `path` sits under any prefix in the set.
    ///
    /// Matching is component-wise, so `/usr/lib` does not claim
    /// `/usr/lib64`.
    pub fn contains_prefix_of(&self, path: &Path) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }

    /// The resolved prefixes, in sorted order.
    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> InstallLayout {
        InstallLayout {
            stdlib: Some(PathBuf::from("/opt/rt/lib/rt3.12")),
            purelib: Some(PathBuf::from("/opt/rt/lib/rt3.12/site-packages")),
            platlib: Some(PathBuf::from("/opt/rt/lib/rt3.12/site-packages")),
            installed_base: Some(PathBuf::from("/opt/rt")),
            real_prefix: None,
        }
    }

    #[test]
    fn test_resolve_collects_and_dedups() {
        let set = LibPathSet::resolve(&layout());
        // purelib and platlib collapse into one entry.
        assert_eq!(
            set.prefixes(),
            &[
                PathBuf::from("/opt/rt/lib/rt3.12"),
                PathBuf::from("/opt/rt/lib/rt3.12/site-packages"),
            ]
        );
    }

    #[test]
    fn test_resolve_drops_absent_and_empty_entries() {
        let mut layout = layout();
        layout.purelib = None;
        layout.platlib = Some(PathBuf::new());

        let set = LibPathSet::resolve(&layout);
        assert_eq!(set.prefixes(), &[PathBuf::from("/opt/rt/lib/rt3.12")]);
        assert!(!set.prefixes().iter().any(|p| p.as_os_str().is_empty()));
    }

    #[test]
    fn test_real_prefix_rebases_stdlib() {
        let mut layout = layout();
        layout.real_prefix = Some(PathBuf::from("/usr"));

        let set = LibPathSet::resolve(&layout);
        assert!(
            set.prefixes()
                .contains(&PathBuf::from("/usr/lib/rt3.12"))
        );
    }

    #[test]
    fn test_absent_indicator_matches_empty_indicator() {
        let absent = layout();
        let mut empty = layout();
        empty.real_prefix = Some(PathBuf::new());

        assert_eq!(LibPathSet::resolve(&absent), LibPathSet::resolve(&empty));
    }

    #[test]
    fn test_rebase_skipped_without_installed_base() {
        let mut layout = layout();
        layout.installed_base = None;
        layout.real_prefix = Some(PathBuf::from("/usr"));

        let set = LibPathSet::resolve(&layout);
        assert_eq!(set, LibPathSet::resolve(&self::layout()));
    }

    #[test]
    fn test_contains_prefix_of_is_component_wise() {
        let set = LibPathSet::from_prefixes([PathBuf::from("/usr/lib")]);
        assert!(set.contains_prefix_of(Path::new("/usr/lib/rt3.12/os.py")));
        assert!(!set.contains_prefix_of(Path::new("/usr/lib64/thing.py")));
    }

    #[test]
    fn test_probe_output_shape_parses() {
        let json = r#"{
            "stdlib": "/usr/lib/rt3.12",
            "purelib": "/usr/lib/rt3.12/site-packages",
            "platlib": "/usr/lib/rt3.12/site-packages",
            "installed_base": "/usr",
            "real_prefix": null
        }"#;
        let layout: InstallLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.stdlib, Some(PathBuf::from("/usr/lib/rt3.12")));
        assert_eq!(layout.real_prefix, None);
    }
}
