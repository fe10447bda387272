//! Per-interpreter ensemble registry.
//!
//! The registry owns every [`Ensemble`] record of one interpreter and answers
//! "which ensemble is bound to this command?" for the dispatcher. It also
//! hands out ensemble ids and the namespace paths derived from them:
//!
//! ```text
//! <root>::<id>                           private namespace of ensemble <id>
//! <root>::subensembles::<parent-id>::<name>  command bound to a nested ensemble
//! ```
//!
//! Back-references are plain ids: a nested ensemble records the id of its
//! parent and the name of the part that represents it there, and the parent
//! part holds the nested ensemble's command handle.

use super::part_table::{Handler, PartTable};
use crate::error::{ErrorKind, Result};
use crate::runtime::{CommandTable, CommandTarget, list_element};
use crate::{CommandHandle, EnsembleId};
use std::collections::HashMap;
use std::rc::Rc;

/// Where a nested ensemble hangs in its parent.
#[derive(Debug, Clone)]
pub(crate) struct ParentLink {
    pub ensemble: EnsembleId,
    pub part: String,
}

#[derive(Debug)]
pub(crate) struct Ensemble {
    pub id: EnsembleId,
    pub command: CommandHandle,
    pub parent: Option<ParentLink>,
    pub namespace: Rc<str>,
    pub parts: PartTable,
}

#[derive(Debug)]
pub(crate) struct Registry {
    ensembles: HashMap<EnsembleId, Ensemble>,
    by_command: HashMap<CommandHandle, EnsembleId>,
    // Interned sub-ensemble command paths.
    sub_paths: HashMap<String, Rc<str>>,
    next_id: u32,
    namespace_root: String,
}

impl Registry {
    pub fn new(namespace_root: &str) -> Self {
        Self {
            ensembles: HashMap::new(),
            by_command: HashMap::new(),
            sub_paths: HashMap::new(),
            next_id: 0,
            namespace_root: namespace_root.to_string(),
        }
    }

    pub fn get(&self, id: EnsembleId) -> Option<&Ensemble> {
        self.ensembles.get(&id)
    }

    pub fn get_mut(&mut self, id: EnsembleId) -> Option<&mut Ensemble> {
        self.ensembles.get_mut(&id)
    }

    pub fn by_command(&self, handle: CommandHandle) -> Option<EnsembleId> {
        self.by_command.get(&handle).copied()
    }

    /// Top-level ensembles, ordered by id.
    pub fn top_level(&self) -> Vec<&Ensemble> {
        let mut top: Vec<&Ensemble> = self.ensembles.values().filter(|ens| ens.parent.is_none()).collect();
        top.sort_by_key(|ens| ens.id);
        top
    }

    pub fn len(&self) -> usize {
        self.ensembles.len()
    }

    /// Walk from `id` up to its top-level ensemble, returning the top-level
    /// record and the part names leading back down, outermost first.
    pub fn trail(&self, id: EnsembleId) -> Option<(&Ensemble, Vec<&str>)> {
        let mut ens = self.ensembles.get(&id)?;
        let mut names = Vec::new();
        while let Some(link) = &ens.parent {
            names.push(link.part.as_str());
            ens = self.ensembles.get(&link.ensemble)?;
        }
        names.reverse();
        Some((ens, names))
    }

    fn allocate(&mut self, command: CommandHandle, parent: Option<ParentLink>) -> EnsembleId {
        self.next_id += 1;
        let id = EnsembleId::new(self.next_id);
        let namespace: Rc<str> = Rc::from(format!("{}::{id}", self.namespace_root));
        self.ensembles.insert(id, Ensemble { id, command, parent, namespace, parts: PartTable::new(id) });
        self.by_command.insert(command, id);
        id
    }

    fn sub_path_key(&self, parent: EnsembleId, name: &str) -> String {
        format!("{}::subensembles::{parent}::{name}", self.namespace_root)
    }

    fn intern_sub_path(&mut self, key: String) -> Rc<str> {
        self.sub_paths.entry(key).or_insert_with_key(|key| Rc::from(key.as_str())).clone()
    }

    /// Register a top-level ensemble command under `name`. An existing
    /// command of that name is replaced; if it was an ensemble it is
    /// destroyed.
    pub fn create_top_level(&mut self, commands: &mut CommandTable, name: &str) -> Result<EnsembleId> {
        if name.is_empty() {
            return Err(ErrorKind::InvalidName(String::new()).into());
        }
        let (handle, replaced) = commands.create(name, CommandTarget::Ensemble);
        if let Some((old, _)) = replaced {
            self.destroy_command(commands, old);
        }

        let id = self.allocate(handle, None);
        tracing::debug!(ensemble = %id, name, "ensemble created");
        Ok(id)
    }

    /// Create ensemble `name` as a new part of `parent`.
    pub fn create_nested(&mut self, commands: &mut CommandTable, parent: EnsembleId, name: &str) -> Result<EnsembleId> {
        let parent_ens = self.ensembles.get(&parent).ok_or_else(|| ErrorKind::InvalidName(name.to_string()))?;
        if parent_ens.parts.find_exact(name).is_some() {
            return Err(ErrorKind::Duplicate { part: name.to_string() }.into());
        }

        let key = self.sub_path_key(parent, name);
        let (handle, replaced) = commands.create(&key, CommandTarget::Ensemble);
        if let Some((old, _)) = replaced {
            self.destroy_command(commands, old);
        }
        let path = self.intern_sub_path(key);

        let id = self.allocate(handle, Some(ParentLink { ensemble: parent, part: name.to_string() }));
        let inserted = match self.ensembles.get_mut(&parent) {
            Some(parent_ens) => parent_ens.parts.insert(name, None, Handler::Ensemble(handle)).map(|_| ()),
            None => Err(ErrorKind::InvalidName(name.to_string()).into()),
        };
        if let Err(err) = inserted {
            self.destroy(commands, id);
            return Err(err);
        }

        tracing::debug!(ensemble = %id, parent = %parent, name, command = &*path, "nested ensemble created");
        Ok(id)
    }

    /// Resolve a path of exact names: a top-level ensemble command followed by
    /// nested ensemble part names.
    pub fn resolve_path<S: AsRef<str>>(&self, commands: &CommandTable, segments: &[S]) -> Result<EnsembleId> {
        let Some((first, rest)) = segments.split_first() else {
            return Err(ErrorKind::InvalidName(String::new()).into());
        };
        let first = first.as_ref();
        let mut id = commands
            .find(first)
            .and_then(|handle| self.by_command(handle))
            .ok_or_else(|| ErrorKind::NotAnEnsemble(format!("command \"{first}\" is not an ensemble")))?;

        for (i, segment) in rest.iter().enumerate() {
            let segment = segment.as_ref();
            let ens = self.ensembles.get(&id).ok_or_else(|| ErrorKind::InvalidName(first.to_string()))?;
            let Some(part) = ens.parts.find_exact(segment) else {
                let so_far: Vec<String> = segments[..=i].iter().map(|s| list_element(s.as_ref())).collect();
                return Err(ErrorKind::InvalidName(so_far.join(" ")).into());
            };
            id = match part.handler {
                Handler::Ensemble(handle) => self.by_command(handle),
                _ => None,
            }
            .ok_or_else(|| ErrorKind::NotAnEnsemble(format!("part \"{segment}\" is not an ensemble")))?;
        }
        Ok(id)
    }

    /// Destroy whatever ensemble is bound to `handle`, if any.
    pub fn destroy_command(&mut self, commands: &mut CommandTable, handle: CommandHandle) -> bool {
        match self.by_command(handle) {
            Some(id) => {
                self.destroy(commands, id);
                true
            }
            None => false,
        }
    }

    /// Destroy an ensemble: detach it from its parent, unregister its command
    /// and destroy its parts front to back, cascading into nested ensembles.
    pub fn destroy(&mut self, commands: &mut CommandTable, id: EnsembleId) {
        let Some(mut ens) = self.ensembles.remove(&id) else {
            return;
        };
        self.by_command.remove(&ens.command);
        commands.remove(ens.command);
        if let Some(link) = &ens.parent {
            let key = self.sub_path_key(link.ensemble, &link.part);
            self.sub_paths.remove(&key);
            if let Some(parent) = self.ensembles.get_mut(&link.ensemble) {
                let bound_here = parent
                    .parts
                    .find_exact(&link.part)
                    .is_some_and(|part| matches!(part.handler, Handler::Ensemble(h) if h == ens.command));
                if bound_here {
                    parent.parts.remove(&link.part);
                }
            }
        }

        while let Some(part) = ens.parts.remove_first() {
            if let Handler::Ensemble(child) = part.handler {
                self.destroy_command(commands, child);
            }
        }
        tracing::debug!(ensemble = %id, "ensemble destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Native;

    const ROOT: &str = "::itcl::internal::commands::ensembles";

    fn setup() -> (Registry, CommandTable) {
        (Registry::new(ROOT), CommandTable::default())
    }

    #[test]
    fn top_level_ensembles_get_commands_and_namespaces() {
        let (mut reg, mut cmds) = setup();
        let id = reg.create_top_level(&mut cmds, "test_numbers").unwrap();
        let ens = reg.get(id).unwrap();
        assert_eq!(cmds.find("test_numbers"), Some(ens.command));
        assert_eq!(reg.by_command(ens.command), Some(id));
        assert_eq!(&*ens.namespace, "::itcl::internal::commands::ensembles::1");
        assert!(ens.parent.is_none());

        let err = reg.create_top_level(&mut cmds, "").unwrap_err();
        assert_eq!(err.to_string(), "invalid ensemble name \"\"");
    }

    #[test]
    fn nested_ensembles_hang_off_a_parent_part() {
        let (mut reg, mut cmds) = setup();
        let top = reg.create_top_level(&mut cmds, "foo").unwrap();
        let bar = reg.create_nested(&mut cmds, top, "bar").unwrap();

        let sub = cmds.find("::itcl::internal::commands::ensembles::subensembles::1::bar").unwrap();
        assert_eq!(reg.by_command(sub), Some(bar));
        let part = reg.get(top).unwrap().parts.find_exact("bar").unwrap();
        assert!(matches!(part.handler, Handler::Ensemble(h) if h == sub));

        let (root, trail) = reg.trail(bar).unwrap();
        assert_eq!(root.id, top);
        assert_eq!(trail, vec!["bar"]);

        let err = reg.create_nested(&mut cmds, top, "bar").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Duplicate { part: "bar".into() });
    }

    #[test]
    fn resolve_path_uses_exact_names() {
        let (mut reg, mut cmds) = setup();
        let top = reg.create_top_level(&mut cmds, "foo").unwrap();
        let bar = reg.create_nested(&mut cmds, top, "bar").unwrap();
        let baz = reg.create_nested(&mut cmds, bar, "baz").unwrap();
        let leaf = Handler::Native(Rc::new(Native::new(|_, _| Ok(String::new()))));
        reg.get_mut(bar).unwrap().parts.insert("leaf", None, leaf).unwrap();

        assert_eq!(reg.resolve_path(&cmds, &["foo"]).unwrap(), top);
        assert_eq!(reg.resolve_path(&cmds, &["foo", "bar", "baz"]).unwrap(), baz);

        let err = reg.resolve_path(&cmds, &["foo", "b"]).unwrap_err();
        assert_eq!(err.to_string(), "invalid ensemble name \"foo\"");
        let err = reg.resolve_path(&cmds, &["nope"]).unwrap_err();
        assert_eq!(err.to_string(), "command \"nope\" is not an ensemble");
        let err = reg.resolve_path(&cmds, &["foo", "bar", "leaf"]).unwrap_err();
        assert_eq!(err.to_string(), "part \"leaf\" is not an ensemble");
        let err = reg.resolve_path::<&str>(&cmds, &[]).unwrap_err();
        assert_eq!(err.to_string(), "invalid ensemble name \"\"");
    }

    #[test]
    fn destroy_cascades_and_detaches() {
        let (mut reg, mut cmds) = setup();
        let top = reg.create_top_level(&mut cmds, "foo").unwrap();
        let bar = reg.create_nested(&mut cmds, top, "bar").unwrap();
        reg.create_nested(&mut cmds, bar, "baz").unwrap();
        assert_eq!(reg.len(), 3);

        assert_eq!(reg.sub_paths.len(), 2);

        reg.destroy(&mut cmds, bar);
        assert_eq!(reg.len(), 1);
        assert!(reg.sub_paths.is_empty());
        assert_eq!(reg.get(top).unwrap().parts.len(), 0);
        assert_eq!(cmds.names(), vec!["foo"]);

        let handle = cmds.find("foo").unwrap();
        assert!(reg.destroy_command(&mut cmds, handle));
        assert_eq!(reg.len(), 0);
        assert!(cmds.names().is_empty());
    }

    #[test]
    fn replacing_a_top_level_command_destroys_the_old_ensemble() {
        let (mut reg, mut cmds) = setup();
        let first = reg.create_top_level(&mut cmds, "foo").unwrap();
        reg.create_nested(&mut cmds, first, "bar").unwrap();
        let second = reg.create_top_level(&mut cmds, "foo").unwrap();
        assert_ne!(first, second);
        assert!(reg.get(first).is_none());
        assert_eq!(reg.len(), 1);
        assert_eq!(cmds.names(), vec!["foo"]);
    }

    #[test]
    fn create_destroy_cycles_do_not_accumulate_paths() {
        let (mut reg, mut cmds) = setup();
        let top = reg.create_top_level(&mut cmds, "foo").unwrap();
        for i in 0..20 {
            let name = format!("sub{i}");
            let sub = reg.create_nested(&mut cmds, top, &name).unwrap();
            reg.destroy(&mut cmds, sub);
        }
        assert!(reg.sub_paths.is_empty());
        assert_eq!(cmds.names(), vec!["foo"]);
    }
}
