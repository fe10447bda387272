//! The ensemble engine.
//!
//! ## How the parts work together
//!
//! ```text
//! ensemble foo { part ... ; ensemble bar { ... } }
//!        │
//!        v
//!   declare::ensemble_command        (declare.rs)
//!     - find or create the Ensemble  ──> Registry (registry.rs)
//!     - walk the body, one declaration per command
//!         part/option NAME ARGS BODY ──> PartTable::insert (part_table.rs)
//!         ensemble NAME BODY         ──> Registry::create_nested, recurse
//!
//! foo b baz 1 2
//!        │
//!        v
//!   dispatch::dispatch               (dispatch.rs)
//!     - PartTable::find_by_prefix("b") ─ Found ──> run the part's Handler
//!                                      └ NotFound / Ambiguous
//!                                          ├─ @error part ──> run it
//!                                          └─ UsageFormatter (usage.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `part_table.rs`: the sorted part array, exact and prefix lookup, and the
//!   minimum-abbreviation bookkeeping.
//! - `registry.rs`: per-interpreter ensemble records, command bindings,
//!   nested-ensemble creation, path resolution and destruction.
//! - `declare.rs`: the restricted `part`/`option`/`ensemble` language used in
//!   ensemble bodies.
//! - `dispatch.rs`: per-invocation resolution and the unknown-part fallback.
//! - `usage.rs`: per-part and whole-ensemble usage text.
//!
//! Administrative paths (`create_ensemble("a b c")`) match every segment
//! exactly; invocations accept any unambiguous prefix. The two lookups are
//! deliberately separate functions on `PartTable`.

#[path = "engine/declare.rs"]
pub(crate) mod declare;
#[path = "engine/dispatch.rs"]
pub(crate) mod dispatch;
#[path = "engine/part_table.rs"]
mod part_table;
#[path = "engine/registry.rs"]
mod registry;
#[path = "engine/usage.rs"]
mod usage;

pub use part_table::Handler;
pub(crate) use part_table::Lookup;
pub(crate) use registry::Registry;
pub(crate) use usage::UsageFormatter;
