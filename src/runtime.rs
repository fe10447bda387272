//! The command runtime ensembles live in.
//!
//! The ensemble engine needs a host: somewhere to register commands, a way to
//! turn an argument specification into formal parameters, and an evaluator
//! for procedure bodies. This module is that host, kept as small as the engine
//! allows:
//!
//! ```text
//! script text ── words::parse_script ──> ParsedCommand { words, line }
//!                                              │
//!                                              v
//!                     eval: substitute words, look up argv[0]
//!                                              │
//!                    ┌─────────────────────────┼──────────────────────┐
//!                    v                         v                      v
//!               Builtin fn            Native (host closure)   Ensemble dispatcher
//!          (set, return, ...)                                  (engine::dispatch)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `words.rs`: script/list tokenizer, list quoting, `SubstFlags`.
//! - `arglist.rs`: argument specifications, usage strings, argument binding.
//! - `commands.rs`: the command table and native command wrappers.
//! - `eval.rs`: variable frames, substitution, builtins, procedures.

#[path = "runtime/arglist.rs"]
mod arglist;
#[path = "runtime/commands.rs"]
mod commands;
#[path = "runtime/eval.rs"]
mod eval;
#[path = "runtime/words.rs"]
mod words;

pub use arglist::{ArgList, FormalArg};
pub(crate) use commands::{CommandTable, CommandTarget};
pub use commands::Native;
pub(crate) use eval::{BUILTINS, Flow, Frame, command_trace};
pub use eval::Procedure;
pub(crate) use words::{SubstFlags, Word, parse_script};
pub use words::{list_element, merge_list, split_list};
