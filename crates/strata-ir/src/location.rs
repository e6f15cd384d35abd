//! Source location types attached to every operation, block and region.

use crate::refs::PathRef;

/// A span of source code, represented as byte offsets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Source location in the IR. Copy-able, no lifetime parameter.
///
/// Lowerings tag every operation they create with the location of the
/// construct being rewritten, so diagnostics on the CFG still point at the
/// original `scf` construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: PathRef,
    pub span: Span,
}

impl Location {
    pub const fn new(path: PathRef, span: Span) -> Self {
        Self { path, span }
    }
}
