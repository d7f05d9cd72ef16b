//! Type rewriting for stub generation.
//!
//! A rewriter normalizes the raw types collected during tracing into
//! something worth putting in a stub: observed unions get pruned of noise,
//! unhelpfully wide unions collapse, and so on. The default chain is what
//! [`DefaultConfig`](crate::config::DefaultConfig) hands out.

use std::sync::Arc;

use crate::trace::TraceType;

/// Normalizes an observed type before stub rendering.
///
/// Rewrites are pure: same input, same output, no side effects.
pub trait TypeRewriter: Send + Sync {
    fn rewrite(&self, ty: TraceType) -> TraceType;
}

/// Apply `rewriter` to every child of `ty`, rebuilding unions through
/// [`TraceType::union`] so they stay flattened and deduplicated.
fn rewrite_children<R: TypeRewriter + ?Sized>(rewriter: &R, ty: TraceType) -> TraceType {
    match ty {
        TraceType::List(elem) => TraceType::List(Box::new(rewriter.rewrite(*elem))),
        TraceType::Set(elem) => TraceType::Set(Box::new(rewriter.rewrite(*elem))),
        TraceType::Dict { key, value } => TraceType::Dict {
            key: Box::new(rewriter.rewrite(*key)),
            value: Box::new(rewriter.rewrite(*value)),
        },
        TraceType::Tuple(items) => {
            TraceType::Tuple(items.into_iter().map(|t| rewriter.rewrite(t)).collect())
        }
        TraceType::Union(members) => {
            TraceType::union(members.into_iter().map(|t| rewriter.rewrite(t)))
        }
        other => other,
    }
}

/// Identity rewriter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRewriter;

impl TypeRewriter for NoOpRewriter {
    fn rewrite(&self, ty: TraceType) -> TraceType {
        ty
    }
}

/// Applies a sequence of rewriters in order.
pub struct ChainedRewriter {
    rewriters: Vec<Arc<dyn TypeRewriter>>,
}

impl ChainedRewriter {
    pub fn new(rewriters: Vec<Arc<dyn TypeRewriter>>) -> Self {
        Self { rewriters }
    }
}

impl TypeRewriter for ChainedRewriter {
    fn rewrite(&self, ty: TraceType) -> TraceType {
        self.rewriters
            .iter()
            .fold(ty, |ty, rewriter| rewriter.rewrite(ty))
    }
}

/// Drops empty-container members from unions when a populated member of the
/// same container kind is present.
///
/// Tracing an occasionally-empty list argument yields
/// `Union[List[Unknown], List[int]]`; the empty observation adds no
/// information, so only `List[int]` survives.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveEmptyContainers;

fn same_container_kind(a: &TraceType, b: &TraceType) -> bool {
    matches!(
        (a, b),
        (TraceType::List(_), TraceType::List(_))
            | (TraceType::Set(_), TraceType::Set(_))
            | (TraceType::Dict { .. }, TraceType::Dict { .. })
            | (TraceType::Tuple(_), TraceType::Tuple(_))
    )
}

impl TypeRewriter for RemoveEmptyContainers {
    fn rewrite(&self, ty: TraceType) -> TraceType {
        let ty = rewrite_children(self, ty);
        match ty {
            TraceType::Union(members) => {
                let kept: Vec<TraceType> = members
                    .iter()
                    .filter(|member| {
                        let redundant = member.is_empty_container()
                            && members.iter().any(|other| {
                                same_container_kind(other, member) && !other.is_empty_container()
                            });
                        !redundant
                    })
                    .cloned()
                    .collect();
                TraceType::union(kept)
            }
            other => other,
        }
    }
}

/// Collapses unions wider than `max_members` to `Unknown`.
///
/// A six-way union in a stub is noise, not documentation.
#[derive(Debug, Clone, Copy)]
pub struct CollapseLargeUnion {
    max_members: usize,
}

impl CollapseLargeUnion {
    pub fn new(max_members: usize) -> Self {
        Self { max_members }
    }
}

impl Default for CollapseLargeUnion {
    fn default() -> Self {
        Self::new(5)
    }
}

impl TypeRewriter for CollapseLargeUnion {
    fn rewrite(&self, ty: TraceType) -> TraceType {
        let ty = rewrite_children(self, ty);
        match ty {
            TraceType::Union(members) if members.len() > self.max_members => TraceType::Unknown,
            other => other,
        }
    }
}

/// The default rewriter chain: empty-container elimination followed by
/// large-union collapse.
pub fn default_rewriter() -> Arc<dyn TypeRewriter> {
    Arc::new(ChainedRewriter::new(vec![
        Arc::new(RemoveEmptyContainers),
        Arc::new(CollapseLargeUnion::default()),
    ]))
}
