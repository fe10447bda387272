//! Usage text.
//!
//! One formatter serves every diagnostic and introspection path, so the
//! listing in `bad option "x": should be one of...` is byte-for-byte what
//! [`crate::Interp::ensemble_usage`] hands to a caller.
//!
//! A part's usage line is its full invocation path followed by its argument
//! summary:
//!
//! ```text
//! test_numbers three x y z      declared part
//! foo bar option ?arg arg ...?  nested ensemble without explicit usage
//! ```
//!
//! An ensemble listing is one such line per part, each indented by two
//! spaces, in table order.

use super::part_table::{Handler, Part};
use super::registry::Registry;
use crate::EnsembleId;
use crate::runtime::{CommandTable, list_element};

/// Part that catches every unresolved name.
pub(crate) const CATCH_ALL: &str = "@error";

/// Internal part never shown in listings.
const BUILTIN_INFO: &str = "@itcl-builtin_info";

const ENSEMBLE_SUFFIX: &str = "option ?arg arg ...?";
const OPEN_ENDED_NOTE: &str = "...and others described on the man page";

pub(crate) struct UsageFormatter<'a> {
    registry: &'a Registry,
    commands: &'a CommandTable,
}

impl<'a> UsageFormatter<'a> {
    pub fn new(registry: &'a Registry, commands: &'a CommandTable) -> Self {
        Self { registry, commands }
    }

    /// `<top-command> <nested part names...> <part> [usage]`.
    pub fn part_usage(&self, ensemble: EnsembleId, part: &Part) -> String {
        let mut out = self.invocation_path(ensemble, &part.name);
        match part.usage.as_deref() {
            Some(usage) if !usage.is_empty() => {
                out.push(' ');
                out.push_str(usage);
            }
            _ if matches!(part.handler, Handler::Ensemble(_)) => {
                out.push(' ');
                out.push_str(ENSEMBLE_SUFFIX);
            }
            _ => {}
        }
        out
    }

    /// The words that invoke `ensemble`: its top-level command name followed
    /// by every part name leading down to it, as a list.
    pub fn ensemble_path(&self, ensemble: EnsembleId) -> String {
        let Some((top, trail)) = self.registry.trail(ensemble) else {
            return String::new();
        };
        let mut words = vec![list_element(self.commands.name(top.command).unwrap_or(""))];
        words.extend(trail.into_iter().map(list_element));
        words.join(" ")
    }

    pub fn invocation_path(&self, ensemble: EnsembleId, part: &str) -> String {
        let mut path = self.ensemble_path(ensemble);
        if !path.is_empty() {
            path.push(' ');
        }
        path.push_str(&list_element(part));
        path
    }

    /// Two-space-indented usage lines for `parts`, one per line.
    pub fn part_lines<'p>(&self, ensemble: EnsembleId, parts: impl IntoIterator<Item = &'p Part>) -> String {
        parts.into_iter().map(|part| format!("  {}", self.part_usage(ensemble, part))).collect::<Vec<_>>().join("\n")
    }

    /// Append the listing for `ensemble` to `out`.
    pub fn append_ensemble_usage(&self, ensemble: EnsembleId, out: &mut String) {
        let Some(ens) = self.registry.get(ensemble) else {
            return;
        };
        let listed = ens.parts.iter().filter(|part| part.name != CATCH_ALL && part.name != BUILTIN_INFO);
        out.push_str(&self.part_lines(ensemble, listed));
        if ens.parts.find_exact(CATCH_ALL).is_some() {
            out.push('\n');
            out.push_str(OPEN_ENDED_NOTE);
        }
    }

    pub fn ensemble_usage(&self, ensemble: EnsembleId) -> String {
        let mut out = String::new();
        self.append_ensemble_usage(ensemble, &mut out);
        out
    }
}
