//! Hierarchical command ensembles.
//!
//! An *ensemble* is a compound command whose first argument selects one of its
//! named *parts*. Parts are kept sorted so that any unambiguous prefix selects
//! a part (`info b` for `info body`), may themselves be ensembles, and every
//! failure renders a usage listing built from the same part tables.
//!
//! ```
//! use ensemble::Interp;
//!
//! let mut interp = Interp::new();
//! interp
//!     .eval(
//!         r#"
//!         ensemble test_numbers {
//!             part one {x} { return "one: $x" }
//!             part two {x y} { return "two: $x, $y" }
//!         }
//!         "#,
//!     )
//!     .unwrap();
//!
//! assert_eq!(interp.eval("test_numbers one 1").unwrap(), "one: 1");
//! assert_eq!(interp.eval("test_numbers tw a b").unwrap(), "two: a, b");
//! ```
//!
//! The crate is split in two halves:
//!
//! - `engine`: part tables, the per-interpreter ensemble registry, the
//!   declaration parser, the dispatcher and the usage formatter.
//! - `runtime`: the small command runtime the engine plugs into (tokenizer,
//!   argument lists, command table, evaluator).
//!
//! Everything is reached through [`Interp`].

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod runtime;


use std::fmt;

pub use api::{
    DEFAULT_MAX_NESTING_DEPTH, DEFAULT_NAMESPACE_ROOT, EnsembleReport, Interp, Options, PartKind, PartReport,
};
pub use engine::Handler;
pub use error::{Error, ErrorKind, Result};
pub use runtime::{ArgList, FormalArg, Native, Procedure, list_element, merge_list, split_list};

// --- Identifiers -------------------------------------------------------------

/// Small integer naming an ensemble and its private namespace area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnsembleId(u32);

impl EnsembleId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EnsembleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to an entry in an interpreter's command table.
///
/// Handles are never reused within one interpreter, so a stale handle simply
/// stops resolving after its command is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandHandle(u32);

impl CommandHandle {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }
}
