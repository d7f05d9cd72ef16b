//! Extensibility contract for a call-trace capture and stub generation
//! pipeline.
//!
//! A deployment supplies one [`Config`] exposing four roles — a trace store,
//! a trace logger, an optional code filter plus sample rate, and a type
//! rewriter — and everything else in the pipeline depends on those roles,
//! never on concrete implementations. This crate defines the contract, the
//! role interfaces, and a default realization:
//!
//! - **Contract**: [`Config`] with two required accessors (store, rewriter)
//!   and three defaulted ones (logger, filter, sample rate)
//! - **Defaults**: [`DefaultConfig`] (env-driven store path, library-code
//!   exclusion, default rewriter chain), [`StoreLogger`], [`JsonlStore`],
//!   [`LibCodeFilter`]
//! - **Path resolution**: [`InstallLayout`] and [`LibPathSet`] for
//!   recognizing standard-library and installed-package code
//!
//! # Usage
//!
//! ```rust,no_run
//! use typetrace::{CallTrace, Config, DefaultConfig, TraceType};
//!
//! fn main() -> Result<(), typetrace::StoreError> {
//!     let config = DefaultConfig::from_env();
//!
//!     // The (external) tracer consumes the roles at session start.
//!     let filter = config.code_filter();
//!     let mut logger = config.trace_logger()?;
//!
//!     logger.log(
//!         CallTrace::new("myapp.views", "index")
//!             .with_return(TraceType::scalar("str")),
//!     );
//!     logger.flush()?;
//!     Ok(())
//! }
//! ```
//!
//! # Custom deployments
//!
//! A minimal config implements only the two required accessors and inherits
//! a store-backed logger, no filtering, and no sampling:
//!
//! ```rust,ignore
//! struct MyConfig;
//!
//! impl Config for MyConfig {
//!     fn trace_store(&self) -> Result<Box<dyn CallTraceStore>, StoreError> {
//!         Ok(Box::new(JsonlStore::make_store("/var/lib/myapp/traces.db")?))
//!     }
//!
//!     fn type_rewriter(&self) -> Arc<dyn TypeRewriter> {
//!         typetrace::default_rewriter()
//!     }
//! }
//! ```

pub mod config;
pub mod filter;
pub mod paths;
pub mod rewrite;
pub mod store;
pub mod trace;

// Re-export main types
pub use config::{Config, DB_PATH_VAR, DEFAULT_DB_PATH, DefaultConfig};
pub use filter::{CodeFilter, LibCodeFilter};
pub use paths::{InstallLayout, LayoutError, LibPathSet};
pub use rewrite::{
    ChainedRewriter, CollapseLargeUnion, NoOpRewriter, RemoveEmptyContainers, TypeRewriter,
    default_rewriter,
};
pub use store::{CallTraceStore, JsonlStore, StoreError, StoreLogger};
pub use trace::{CallTrace, CallTraceLogger, CodeLocation, TraceType};
