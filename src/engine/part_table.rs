//! Sorted part tables.
//!
//! Each ensemble keeps its parts in a `Vec` sorted by name (byte order), so
//! both exact lookup and prefix lookup are binary searches. Every part also
//! caches `min_chars`: the shortest prefix that names it unambiguously among
//! its siblings.
//!
//! ## Minimum abbreviation
//!
//! In a sorted table the sibling sharing the longest common prefix with a
//! part is always one of its two neighbors, so:
//!
//! ```text
//! min_chars(i) = min(len(name_i), max(1, lcp(i, i-1) + 1, lcp(i, i+1) + 1))
//! ```
//!
//! Inserting or removing at position `i` can only change the answer for the
//! parts now at `i-1`, `i` and `i+1`, so only those are recomputed.
//!
//! A name that is a strict prefix of a sibling (`in` next to `info`) ends up
//! with `min_chars == len(name)`: typing the whole name selects it.

use crate::error::{ErrorKind, Result};
use crate::runtime::{Native, Procedure};
use crate::{CommandHandle, EnsembleId};
use std::rc::Rc;

/// What runs when a part is selected.
#[derive(Debug, Clone)]
pub enum Handler {
    /// Host callable registered through [`crate::Interp::add_ensemble_part`].
    Native(Rc<Native>),
    /// Procedure declared with `part`/`option` in an ensemble body.
    Procedure(Rc<Procedure>),
    /// A nested ensemble, reached through its own dispatcher command.
    Ensemble(CommandHandle),
}

impl Handler {
    pub fn is_ensemble(&self) -> bool {
        matches!(self, Handler::Ensemble(_))
    }
}

#[derive(Debug)]
pub(crate) struct Part {
    pub name: String,
    pub min_chars: usize,
    pub usage: Option<String>,
    pub handler: Handler,
}

/// Result of [`PartTable::find_by_prefix`].
#[derive(Debug)]
pub(crate) enum Lookup<'a> {
    Found(&'a Part),
    /// Every sibling sharing the prefix, in table order.
    Ambiguous(Vec<&'a Part>),
    NotFound,
}

#[derive(Debug)]
pub(crate) struct PartTable {
    owner: EnsembleId,
    parts: Vec<Part>,
}

impl PartTable {
    pub fn new(owner: EnsembleId) -> Self {
        Self { owner, parts: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Part> {
        self.parts.iter()
    }

    /// Insert a new part, keeping the table sorted.
    ///
    /// Fails with [`ErrorKind::Duplicate`] when `name` is already present; the
    /// table is left untouched in that case.
    pub fn insert(&mut self, name: &str, usage: Option<String>, handler: Handler) -> Result<&Part> {
        let pos = match self.position(name) {
            Ok(_) => return Err(ErrorKind::Duplicate { part: name.to_string() }.into()),
            Err(pos) => pos,
        };

        self.parts.insert(pos, Part { name: name.to_string(), min_chars: 0, usage, handler });
        self.recompute_around(pos);
        tracing::trace!(ensemble = %self.owner, part = name, pos, "part inserted");
        Ok(&self.parts[pos])
    }

    /// Remove the part named exactly `name`. Dropping the returned part
    /// releases its handler.
    pub fn remove(&mut self, name: &str) -> Option<Part> {
        let pos = self.position(name).ok()?;
        Some(self.remove_at(pos))
    }

    /// Remove the first part in table order.
    pub fn remove_first(&mut self) -> Option<Part> {
        if self.parts.is_empty() { None } else { Some(self.remove_at(0)) }
    }

    fn remove_at(&mut self, pos: usize) -> Part {
        let part = self.parts.remove(pos);
        self.recompute_around(pos);
        part
    }

    pub fn find_exact(&self, name: &str) -> Option<&Part> {
        self.position(name).ok().map(|pos| &self.parts[pos])
    }

    /// Resolve `text` as a full name or an unambiguous prefix.
    pub fn find_by_prefix(&self, text: &str) -> Lookup<'_> {
        if text.is_empty() {
            return Lookup::NotFound;
        }

        // Any part whose name starts with `text` compares equal here.
        let probe = self.parts.binary_search_by(|part| {
            let name = part.name.as_bytes();
            let head = &name[..name.len().min(text.len())];
            head.cmp(text.as_bytes())
        });
        let Ok(mut pos) = probe else {
            return Lookup::NotFound;
        };

        let typed = text.chars().count();
        if typed < self.parts[pos].min_chars {
            while pos > 0 && self.parts[pos - 1].name.starts_with(text) {
                pos -= 1;
            }
        }

        if typed < self.parts[pos].min_chars {
            let matches = self.parts[pos..].iter().take_while(|part| part.name.starts_with(text)).collect();
            return Lookup::Ambiguous(matches);
        }
        Lookup::Found(&self.parts[pos])
    }

    fn position(&self, name: &str) -> std::result::Result<usize, usize> {
        self.parts.binary_search_by(|part| part.name.as_str().cmp(name))
    }

    fn recompute_around(&mut self, pos: usize) {
        for i in pos.saturating_sub(1)..=pos + 1 {
            self.compute_min_chars(i);
        }
    }

    fn compute_min_chars(&mut self, pos: usize) {
        if pos >= self.parts.len() {
            return;
        }
        let name = &self.parts[pos].name;
        let mut needed = 1;
        if pos > 0 {
            needed = needed.max(common_prefix(name, &self.parts[pos - 1].name) + 1);
        }
        if let Some(right) = self.parts.get(pos + 1) {
            needed = needed.max(common_prefix(name, &right.name) + 1);
        }
        let len = name.chars().count();
        self.parts[pos].min_chars = needed.min(len);
    }
}

fn common_prefix(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn noop() -> Handler {
        Handler::Native(Rc::new(Native::new(|_, _| Ok(String::new()))))
    }

    fn table(names: &[&str]) -> PartTable {
        let mut table = PartTable::new(EnsembleId::new(1));
        for name in names {
            table.insert(name, None, noop()).unwrap();
        }
        table
    }

    fn min_chars(table: &PartTable) -> Vec<(&str, usize)> {
        table.iter().map(|part| (part.name.as_str(), part.min_chars)).collect()
    }

    fn found(lookup: Lookup<'_>) -> Option<&str> {
        match lookup {
            Lookup::Found(part) => Some(part.name.as_str()),
            _ => None,
        }
    }

    #[test]
    fn parts_stay_sorted() {
        let table = table(&["two", "one", "three"]);
        let names: Vec<_> = table.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["one", "three", "two"]);
    }

    #[test]
    fn duplicate_insert_fails_and_leaves_table_alone() {
        let mut table = table(&["one", "two", "three"]);
        let before = min_chars(&table).into_iter().map(|(n, c)| (n.to_string(), c)).collect::<Vec<_>>();

        let err = table.insert("three", Some("x".into()), noop()).unwrap_err();
        assert_eq!(err.to_string(), "part \"three\" already exists in ensemble");

        let after = min_chars(&table).into_iter().map(|(n, c)| (n.to_string(), c)).collect::<Vec<_>>();
        assert_eq!(before, after);
        assert_eq!(table.find_exact("three").unwrap().usage, None);
    }

    #[test]
    fn prefixes_resolve_or_report_ambiguity() {
        let table = table(&["one", "two", "three"]);
        assert_eq!(found(table.find_by_prefix("o")), Some("one"));
        assert_eq!(found(table.find_by_prefix("th")), Some("three"));
        assert_eq!(found(table.find_by_prefix("two")), Some("two"));

        match table.find_by_prefix("t") {
            Lookup::Ambiguous(parts) => {
                let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["three", "two"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }

        assert!(matches!(table.find_by_prefix("four"), Lookup::NotFound));
        assert!(matches!(table.find_by_prefix("onex"), Lookup::NotFound));
        assert!(matches!(table.find_by_prefix(""), Lookup::NotFound));
    }

    #[test]
    fn min_chars_for_every_insertion_order() {
        let orders = [
            ["hex", "octal", "digits"],
            ["hex", "digits", "octal"],
            ["octal", "hex", "digits"],
            ["octal", "digits", "hex"],
            ["digits", "hex", "octal"],
            ["digits", "octal", "hex"],
        ];
        for order in orders {
            let table = table(&order);
            assert_eq!(min_chars(&table), vec![("digits", 1), ("hex", 1), ("octal", 1)], "order {order:?}");
        }

        let table = table(&["two", "three", "one"]);
        assert_eq!(min_chars(&table), vec![("one", 1), ("three", 2), ("two", 2)]);
    }

    #[test]
    fn name_that_prefixes_a_sibling_needs_its_full_length() {
        let table = table(&["info", "in"]);
        assert_eq!(min_chars(&table), vec![("in", 2), ("info", 3)]);
        assert_eq!(found(table.find_by_prefix("in")), Some("in"));
        assert_eq!(found(table.find_by_prefix("inf")), Some("info"));
        assert!(matches!(table.find_by_prefix("i"), Lookup::Ambiguous(_)));
    }

    #[test]
    fn removal_recomputes_neighbors() {
        let mut table = table(&["one", "two", "three"]);
        let removed = table.remove("three").unwrap();
        assert_eq!(removed.name, "three");
        assert_eq!(min_chars(&table), vec![("one", 1), ("two", 1)]);
        assert_eq!(found(table.find_by_prefix("t")), Some("two"));
        assert!(table.remove("three").is_none());
    }

    #[test]
    fn remove_first_drains_in_order() {
        let mut table = table(&["b", "c", "a"]);
        let drained: Vec<_> = std::iter::from_fn(|| table.remove_first()).map(|p| p.name).collect();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert_eq!(table.len(), 0);
    }

    fn brute_min_chars(name: &str, all: &[String]) -> usize {
        let len = name.chars().count();
        let needed =
            all.iter().filter(|other| other.as_str() != name).map(|other| common_prefix(name, other) + 1).max();
        needed.unwrap_or(1).max(1).min(len)
    }

    proptest! {
        #[test]
        fn min_chars_matches_brute_force(
            names in prop::collection::hash_set("[a-d]{1,4}", 1..10)
                .prop_map(|set| set.into_iter().collect::<Vec<_>>())
                .prop_shuffle()
        ) {
            let mut table = PartTable::new(EnsembleId::new(7));
            for name in &names {
                table.insert(name, None, noop()).unwrap();
            }
            for name in &names {
                prop_assert!(table.insert(name, None, noop()).is_err());
            }
            prop_assert_eq!(table.len(), names.len());

            for part in table.iter() {
                prop_assert_eq!(part.min_chars, brute_min_chars(&part.name, &names));

                let exact = found(table.find_by_prefix(&part.name));
                prop_assert_eq!(exact, Some(part.name.as_str()));

                let shortest: String = part.name.chars().take(part.min_chars).collect();
                prop_assert_eq!(found(table.find_by_prefix(&shortest)), Some(part.name.as_str()));
            }
        }
    }
}
