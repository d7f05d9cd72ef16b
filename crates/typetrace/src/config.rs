//! The configuration contract and its default realization.
//!
//! A deployment supplies one [`Config`] and every other component reaches
//! its collaborators through it: where traces persist, how they are logged,
//! which call sites are eligible, how often eligible calls are sampled, and
//! how observed types are normalized for stubs. Policy lives here;
//! mechanism (the tracer, the store internals, stub rendering) lives with
//! the collaborators.

use std::env;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::filter::{CodeFilter, LibCodeFilter};
use crate::paths::{InstallLayout, LibPathSet};
use crate::rewrite::{TypeRewriter, default_rewriter};
use crate::store::{CallTraceStore, JsonlStore, StoreError, StoreLogger};
use crate::trace::CallTraceLogger;

/// Environment variable naming the default store's filesystem path.
pub const DB_PATH_VAR: &str = "MT_DB_PATH";

/// Fallback store path, relative to the working directory, when
/// [`DB_PATH_VAR`] is unset.
pub const DEFAULT_DB_PATH: &str = "monkeytype.sqlite3";

/// Ties together the concrete implementations that make up a deployment of
/// the tracing pipeline.
///
/// `trace_store` and `type_rewriter` are required; without them no useful
/// output exists, and a type that omits either does not implement `Config`.
/// The remaining accessors have safe defaults: log straight into the store,
/// trace everything, sample nothing out.
pub trait Config {
    /// The store for persistence and retrieval of call traces.
    fn trace_store(&self) -> Result<Box<dyn CallTraceStore>, StoreError>;

    /// The rewriter applied to observed types when generating stubs.
    fn type_rewriter(&self) -> Arc<dyn TypeRewriter>;

    /// The logger the tracer hands observed calls to.
    ///
    /// Defaults to a [`StoreLogger`] that buffers into
    /// [`trace_store`](Config::trace_store). Override this independently of
    /// the store for, e.g., batched or asynchronous logging.
    fn trace_logger(&self) -> Result<Box<dyn CallTraceLogger>, StoreError> {
        Ok(Box::new(StoreLogger::new(self.trace_store()?)))
    }

    /// The predicate for triaging call sites.
    ///
    /// `None` means no filter: every call is traced and logged.
    fn code_filter(&self) -> Option<Arc<dyn CodeFilter>> {
        None
    }

    /// Sample rate for call tracing: with a rate of N, 1/N eligible calls
    /// are traced. `None` means every call. Applying the rate (counting) is
    /// the tracer's job, not this module's.
    fn sample_rate(&self) -> Option<NonZeroU32> {
        None
    }
}

/// The zero-configuration [`Config`].
///
/// Resolves everything once at construction: the store path from
/// [`DB_PATH_VAR`], the library prefix set from the runtime's install
/// layout, and a shared default rewriter chain. Accessors are plain reads,
/// so a `DefaultConfig` can be shared freely across concurrent tracing
/// operations.
pub struct DefaultConfig {
    db_path: PathBuf,
    filter: Arc<LibCodeFilter>,
    rewriter: Arc<dyn TypeRewriter>,
}

impl DefaultConfig {
    /// Build from the process environment.
    ///
    /// A failed install-layout probe degrades to an empty prefix set: the
    /// pipeline still runs, it just stops excluding library code.
    pub fn from_env() -> Self {
        let db_path = env::var_os(DB_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let layout = match InstallLayout::probe() {
            Ok(layout) => layout,
            Err(err) => {
                warn!(
                    "install layout probe failed, library code will not be excluded: {}",
                    err
                );
                InstallLayout::default()
            }
        };

        Self::new(db_path, LibPathSet::resolve(&layout))
    }

    /// Build from explicit values. Tests use this instead of mutating the
    /// process environment.
    pub fn new(db_path: impl Into<PathBuf>, lib_paths: LibPathSet) -> Self {
        Self {
            db_path: db_path.into(),
            filter: Arc::new(LibCodeFilter::new(lib_paths)),
            rewriter: default_rewriter(),
        }
    }

    /// Path the default store opens at.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl Config for DefaultConfig {
    fn trace_store(&self) -> Result<Box<dyn CallTraceStore>, StoreError> {
        Ok(Box::new(JsonlStore::make_store(&self.db_path)?))
    }

    fn type_rewriter(&self) -> Arc<dyn TypeRewriter> {
        Arc::clone(&self.rewriter)
    }

    fn code_filter(&self) -> Option<Arc<dyn CodeFilter>> {
        let filter: Arc<dyn CodeFilter> = self.filter.clone();
        Some(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::NoOpRewriter;
    use crate::trace::{CallTrace, CodeLocation, TraceType};
    use serial_test::serial;
    use tempfile::tempdir;

    /// A config supplying only the two required accessors.
    struct BareConfig {
        db_path: PathBuf,
    }

    impl Config for BareConfig {
        fn trace_store(&self) -> Result<Box<dyn CallTraceStore>, StoreError> {
            Ok(Box::new(JsonlStore::make_store(&self.db_path)?))
        }

        fn type_rewriter(&self) -> Arc<dyn TypeRewriter> {
            Arc::new(NoOpRewriter)
        }
    }

    #[test]
    #[serial]
    fn test_db_path_falls_back_to_literal() {
        unsafe { env::remove_var(DB_PATH_VAR) };
        let config = DefaultConfig::from_env();
        assert_eq!(config.db_path(), Path::new(DEFAULT_DB_PATH));
        assert_eq!(config.db_path(), Path::new("monkeytype.sqlite3"));
    }

    #[test]
    #[serial]
    fn test_db_path_honors_env_var() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.db");
        unsafe { env::set_var(DB_PATH_VAR, &path) };

        let config = DefaultConfig::from_env();
        assert_eq!(config.db_path(), path.as_path());

        let store = config.trace_store().unwrap();
        assert_eq!(store.path(), Some(path.as_path()));

        unsafe { env::remove_var(DB_PATH_VAR) };
    }

    #[test]
    fn test_default_code_filter_excludes_library_code() {
        let config = DefaultConfig::new(
            "unused.db",
            LibPathSet::from_prefixes([PathBuf::from("/opt/rt/lib/rt3.12")]),
        );

        // Distinct from "no filter".
        let filter = config.code_filter().expect("default config has a filter");
        assert!(!filter.trace(&CodeLocation::unresolved()));
        assert!(!filter.trace(&CodeLocation::from_file("/opt/rt/lib/rt3.12/os.py")));
        assert!(filter.trace(&CodeLocation::from_file("/home/me/app.py")));
    }

    #[test]
    fn test_default_config_sampling_and_rewriter() {
        let config = DefaultConfig::new("unused.db", LibPathSet::empty());
        assert_eq!(config.sample_rate(), None);

        // The rewriter is a single shared instance, not built per call.
        let a = config.type_rewriter();
        let b = config.type_rewriter();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_bare_config_gets_working_defaults() {
        let dir = tempdir().unwrap();
        let config = BareConfig {
            db_path: dir.path().join("traces.db"),
        };

        assert!(config.code_filter().is_none());
        assert_eq!(config.sample_rate(), None);

        // The default logger is backed by the config's store.
        let mut logger = config.trace_logger().unwrap();
        logger.log(
            CallTrace::new("myapp", "run").with_return(TraceType::none()),
        );
        logger.flush().unwrap();

        let store = config.trace_store().unwrap();
        let traces = store.filter("myapp", None, 10).unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].qualname, "run");
    }

    #[test]
    fn test_store_round_trip_through_default_config() {
        let dir = tempdir().unwrap();
        let config = DefaultConfig::new(dir.path().join("traces.db"), LibPathSet::empty());

        let mut store = config.trace_store().unwrap();
        store
            .add(vec![CallTrace::new("m", "f").with_arg("x", TraceType::scalar("int"))])
            .unwrap();

        let traces = store.filter("m", None, 10).unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(
            traces[0].arg_types.get("x"),
            Some(&TraceType::scalar("int"))
        );
    }
}
