//! Command table.
//!
//! Maps command names to opaque [`CommandHandle`]s and handles to what runs
//! when the command is invoked. Ensemble commands carry no payload here: the
//! ensemble registry owns the handle-to-ensemble mapping, which is also how
//! "is this command an ensemble?" is answered.

use super::eval::Flow;
use crate::{CommandHandle, Interp, Result};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub(crate) type BuiltinFn = fn(&mut Interp, &[String]) -> Result<Flow>;

type NativeFn = dyn Fn(&mut Interp, &[String]) -> Result<String>;

/// A host-provided callable, usable as a command or as an ensemble part.
///
/// Data the callable needs is captured by the closure. An optional delete
/// callback runs exactly once, when the last owner (the command or the part)
/// lets go of it.
///
/// ```
/// use ensemble::{Interp, Native};
///
/// let mut interp = Interp::new();
/// interp.register_command("greet", Native::new(|_, argv| Ok(format!("hello {}", argv[1..].join(" ")))));
/// assert_eq!(interp.eval("greet world").unwrap(), "hello world");
/// ```
pub struct Native {
    func: Box<NativeFn>,
    on_delete: Option<Box<dyn FnOnce()>>,
}

impl Native {
    pub fn new(func: impl Fn(&mut Interp, &[String]) -> Result<String> + 'static) -> Self {
        Self { func: Box::new(func), on_delete: None }
    }

    /// Attach a callback that releases associated data when the owner is deleted.
    pub fn on_delete(mut self, cleanup: impl FnOnce() + 'static) -> Self {
        self.on_delete = Some(Box::new(cleanup));
        self
    }

    /// Invoke with `argv[0]` naming the command (or the full part name).
    pub fn call(&self, interp: &mut Interp, argv: &[String]) -> Result<String> {
        (self.func)(interp, argv)
    }
}

impl Drop for Native {
    fn drop(&mut self) {
        if let Some(cleanup) = self.on_delete.take() {
            cleanup();
        }
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Native")
            .field("func", &"<function>")
            .field("on_delete", &self.on_delete.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) enum CommandTarget {
    Builtin(BuiltinFn),
    Native(Rc<Native>),
    /// Bound to the ensemble dispatcher; the registry knows which ensemble.
    Ensemble,
}

impl fmt::Debug for CommandTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandTarget::Builtin(_) => f.write_str("Builtin"),
            CommandTarget::Native(_) => f.write_str("Native"),
            CommandTarget::Ensemble => f.write_str("Ensemble"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CommandEntry {
    pub name: String,
    pub target: CommandTarget,
}

#[derive(Debug, Default)]
pub(crate) struct CommandTable {
    by_name: HashMap<String, CommandHandle>,
    entries: HashMap<CommandHandle, CommandEntry>,
    next: u32,
}

impl CommandTable {
    /// Register `name`, returning its handle and whatever entry it replaced.
    pub fn create(
        &mut self,
        name: &str,
        target: CommandTarget,
    ) -> (CommandHandle, Option<(CommandHandle, CommandEntry)>) {
        let replaced = self.by_name.get(name).copied().and_then(|old| self.remove(old).map(|entry| (old, entry)));

        self.next += 1;
        let handle = CommandHandle::new(self.next);
        self.by_name.insert(name.to_string(), handle);
        self.entries.insert(handle, CommandEntry { name: name.to_string(), target });
        (handle, replaced)
    }

    pub fn find(&self, name: &str) -> Option<CommandHandle> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, handle: CommandHandle) -> Option<&CommandEntry> {
        self.entries.get(&handle)
    }

    pub fn name(&self, handle: CommandHandle) -> Option<&str> {
        self.entries.get(&handle).map(|entry| entry.name.as_str())
    }

    pub fn remove(&mut self, handle: CommandHandle) -> Option<CommandEntry> {
        let entry = self.entries.remove(&handle)?;
        if self.by_name.get(&entry.name) == Some(&handle) {
            self.by_name.remove(&entry.name);
        }
        Some(entry)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn create_replaces_existing_name() {
        let mut table = CommandTable::default();
        let (first, replaced) = table.create("foo", CommandTarget::Ensemble);
        assert!(replaced.is_none());

        let (second, replaced) = table.create("foo", CommandTarget::Ensemble);
        assert_ne!(first, second);
        assert_eq!(replaced.map(|(handle, _)| handle), Some(first));
        assert_eq!(table.find("foo"), Some(second));
        assert!(table.get(first).is_none());
    }

    #[test]
    fn remove_forgets_name() {
        let mut table = CommandTable::default();
        let (handle, _) = table.create("b", CommandTarget::Ensemble);
        table.create("a", CommandTarget::Ensemble);
        assert_eq!(table.names(), vec!["a", "b"]);

        let entry = table.remove(handle).unwrap();
        assert_eq!(entry.name, "b");
        assert_eq!(table.find("b"), None);
        assert_eq!(table.names(), vec!["a"]);
    }

    #[test]
    fn native_cleanup_runs_once_on_drop() {
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let native = Rc::new(Native::new(|_, _| Ok(String::new())).on_delete(move || counter.set(counter.get() + 1)));
        let extra = native.clone();
        drop(native);
        assert_eq!(hits.get(), 0);
        drop(extra);
        assert_eq!(hits.get(), 1);
    }
}
