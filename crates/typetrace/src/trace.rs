//! Call-trace data model.
//!
//! These types are the currency of the pipeline: the tracer produces
//! `CallTrace` records and `CodeLocation` descriptors, loggers and stores
//! move the records around, and the rewriter normalizes the `TraceType`s
//! they carry before stub rendering.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// An observed type, as seen at a traced call site.
///
/// This is a structural descriptor, not a resolved type: `Scalar` carries the
/// dotted name the runtime reported (e.g. `builtins.int` or
/// `myapp.models.User`), and `Unknown` stands in wherever nothing could be
/// observed (an empty container's element, an unresolvable value).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceType {
    /// A concrete named type.
    Scalar(String),
    List(Box<TraceType>),
    Set(Box<TraceType>),
    Dict {
        key: Box<TraceType>,
        value: Box<TraceType>,
    },
    Tuple(Vec<TraceType>),
    /// Two or more alternatives observed for the same slot.
    Union(Vec<TraceType>),
    /// Nothing observable; renders as `Any` in stub output.
    Unknown,
}

impl TraceType {
    /// A named scalar type.
    pub fn scalar(name: impl Into<String>) -> Self {
        TraceType::Scalar(name.into())
    }

    /// The none/unit type.
    pub fn none() -> Self {
        TraceType::Scalar("None".to_string())
    }

    /// Build a union from observed alternatives.
    ///
    /// Nested unions are flattened, duplicates collapse (first occurrence
    /// wins), a single survivor is returned bare, and an empty input yields
    /// `Unknown`.
    pub fn union(members: impl IntoIterator<Item = TraceType>) -> Self {
        let mut flat: Vec<TraceType> = Vec::new();
        for member in members {
            match member {
                TraceType::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        let mut out: Vec<TraceType> = Vec::new();
        for member in flat {
            if !out.contains(&member) {
                out.push(member);
            }
        }

        match out.len() {
            0 => TraceType::Unknown,
            1 => out.remove(0),
            _ => TraceType::Union(out),
        }
    }

    /// Whether this is a container observed with no contents, i.e. one whose
    /// parameters are all `Unknown` (or an empty tuple).
    pub fn is_empty_container(&self) -> bool {
        match self {
            TraceType::List(elem) | TraceType::Set(elem) => **elem == TraceType::Unknown,
            TraceType::Dict { key, value } => {
                **key == TraceType::Unknown && **value == TraceType::Unknown
            }
            TraceType::Tuple(items) => items.is_empty(),
            _ => false,
        }
    }
}

/// One observed invocation: the types seen for each argument and for the
/// return/yield slots of a single call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTrace {
    /// Dotted module of the traced function.
    pub module: String,
    /// Qualified name of the traced function within its module.
    pub qualname: String,
    /// Observed argument types, keyed by parameter name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arg_types: BTreeMap<String, TraceType>,
    /// Observed return type, if the call returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<TraceType>,
    /// Observed yield type, if the call was a generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_type: Option<TraceType>,
}

impl CallTrace {
    /// Create a trace for the given function with no observations yet.
    pub fn new(module: impl Into<String>, qualname: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            qualname: qualname.into(),
            arg_types: BTreeMap::new(),
            return_type: None,
            yield_type: None,
        }
    }

    /// Record an observed argument type.
    pub fn with_arg(mut self, name: impl Into<String>, ty: TraceType) -> Self {
        self.arg_types.insert(name.into(), ty);
        self
    }

    /// Record the observed return type.
    pub fn with_return(mut self, ty: TraceType) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Record the observed yield type.
    pub fn with_yield(mut self, ty: TraceType) -> Self {
        self.yield_type = Some(ty);
        self
    }
}

/// Where a traced call originates.
///
/// Produced by the tracer for each call-site evaluation and handed to the
/// configured [`CodeFilter`](crate::filter::CodeFilter). Only `file` takes
/// part in the default filtering policy; the rest is context for richer
/// filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    /// Absolute path of the source file, when the runtime can report one.
    pub file: Option<PathBuf>,
    /// Dotted module name, when known.
    pub module: Option<String>,
    /// Qualified name of the enclosing function, when known.
    pub qualname: Option<String>,
    /// Line of the call site, when known.
    pub line: Option<u32>,
}

impl CodeLocation {
    /// A location known only by its source file.
    pub fn from_file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
            ..Self::default()
        }
    }

    /// A location the runtime could not attribute to any source file.
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Attach the dotted module name.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attach the call-site line.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Sink for call traces produced during a tracing session.
///
/// The tracer calls [`log`](CallTraceLogger::log) per observed call and
/// [`flush`](CallTraceLogger::flush) at session boundaries. Implementations
/// may persist eagerly, in which case the default no-op `flush` suffices.
pub trait CallTraceLogger {
    /// Accept one observed call.
    fn log(&mut self, trace: CallTrace);

    /// Make everything logged so far durable.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
