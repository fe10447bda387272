use crate::engine::{Handler, Lookup, Registry, UsageFormatter, declare};
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::{BUILTINS, CommandTable, CommandTarget, Flow, Frame, Native, split_list};
use crate::{CommandHandle, EnsembleId};
use std::rc::Rc;

/// Namespace area under which ensemble namespaces are allocated by default.
pub const DEFAULT_NAMESPACE_ROOT: &str = "::itcl::internal::commands::ensembles";

/// Interpreter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Root of the private namespaces allocated for ensembles. Ensemble `N`
    /// owns `<root>::N`; nested ensemble `c` under parent `P` is registered as
    /// `<root>::subensembles::P::c`.
    pub namespace_root: String,
    /// Maximum nesting of script evaluations, procedure calls, ensemble
    /// bodies and nested-ensemble dispatches. Every level costs native stack,
    /// so the default fits comfortably in a 2 MiB thread.
    pub max_nesting_depth: usize,
}

/// Default for [`Options::max_nesting_depth`].
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 100;

impl Default for Options {
    fn default() -> Self {
        Self { namespace_root: DEFAULT_NAMESPACE_ROOT.to_string(), max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH }
    }
}

/// Snapshot of one ensemble, as returned by [`Interp::describe_ensembles`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsembleReport {
    /// Invocation path: the top-level command followed by nested part names.
    pub name: String,
    pub id: EnsembleId,
    pub namespace: String,
    /// Parts in table (lexicographic) order.
    pub parts: Vec<PartReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartReport {
    pub name: String,
    pub min_chars: usize,
    /// The part's full usage line, as shown in error listings.
    pub usage: String,
    pub kind: PartKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartKind {
    Native,
    Procedure,
    Ensemble(Box<EnsembleReport>),
}

/// An interpreter: command table, variable frames and ensemble registry.
///
/// Independent interpreters share nothing; dropping one releases every
/// ensemble, part and native handler it owns.
#[derive(Debug)]
pub struct Interp {
    pub(crate) options: Options,
    pub(crate) registry: Registry,
    pub(crate) commands: CommandTable,
    pub(crate) frames: Vec<Frame>,
    pub(crate) depth: usize,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let mut commands = CommandTable::default();
        for (name, func) in BUILTINS {
            commands.create(name, CommandTarget::Builtin(*func));
        }
        let registry = Registry::new(&options.namespace_root);
        Self { options, registry, commands, frames: vec![Frame::global()], depth: 0 }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    // --- Evaluation --------------------------------------------------------------

    /// Evaluate `script` and return the result of its last command.
    pub fn eval(&mut self, script: &str) -> Result<String> {
        self.eval_flow(script).map(Flow::into_value)
    }

    /// Evaluate `script` command by command, handing every result to
    /// `on_result`. Stops at the first error.
    pub fn eval_each(&mut self, script: &str, on_result: impl FnMut(&str)) -> Result<()> {
        self.eval_each_command(script, on_result)
    }

    /// Invoke an already split command, e.g. `words!["test_numbers", "one", "1"]`.
    pub fn invoke(&mut self, argv: &[String]) -> Result<String> {
        self.nested(|interp| interp.invoke_flow(argv)).map(Flow::into_value)
    }

    // --- Commands ----------------------------------------------------------------

    /// Register a host command. A command already registered under `name` is
    /// replaced; if it was an ensemble, that ensemble is destroyed.
    pub fn register_command(&mut self, name: &str, native: Native) -> CommandHandle {
        let (handle, replaced) = self.commands.create(name, CommandTarget::Native(Rc::new(native)));
        if let Some((old, _)) = replaced {
            self.registry.destroy_command(&mut self.commands, old);
        }
        tracing::debug!(name, "command registered");
        handle
    }

    /// Delete a command. Deleting an ensemble command destroys the ensemble
    /// and everything nested in it.
    pub fn delete_command(&mut self, name: &str) -> bool {
        let Some(handle) = self.commands.find(name) else {
            return false;
        };
        self.commands.remove(handle);
        let was_ensemble = self.registry.destroy_command(&mut self.commands, handle);
        tracing::debug!(name, was_ensemble, "command deleted");
        true
    }

    pub fn find_command(&self, name: &str) -> Option<CommandHandle> {
        self.commands.find(name)
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        self.commands.names().into_iter().map(str::to_string).collect()
    }

    // --- Ensembles ---------------------------------------------------------------

    /// Create the ensemble at `path`, or locate it if it already exists.
    ///
    /// `path` is a list of exact names: `"a"` is a top-level ensemble command,
    /// `"a b c"` is ensemble `c` nested in `a b`, which must already exist.
    pub fn create_ensemble(&mut self, path: &str) -> Result<CommandHandle> {
        self.create_ensemble_at(path).map_err(|err| err.with_note(format!("(while creating ensemble \"{path}\")")))
    }

    fn create_ensemble_at(&mut self, path: &str) -> Result<CommandHandle> {
        let segments = split_list(path)?;
        let id = match segments.as_slice() {
            [] => return Err(ErrorKind::InvalidName(path.to_string()).into()),
            [name] => declare::locate_top_level(self, name)?,
            [parents @ .., name] => {
                let parent = self.registry.resolve_path(&self.commands, parents)?;
                declare::locate_nested(self, parent, name)?
            }
        };
        self.ensemble_command(id)
    }

    /// Add a host-backed part to the ensemble at `path`. `usage` is the
    /// argument summary shown in listings.
    pub fn add_ensemble_part(&mut self, path: &str, name: &str, usage: Option<&str>, native: Native) -> Result<()> {
        self.add_ensemble_part_at(path, name, usage, native)
            .map_err(|err| err.with_note(format!("(while adding to ensemble \"{path}\")")))
    }

    fn add_ensemble_part_at(&mut self, path: &str, name: &str, usage: Option<&str>, native: Native) -> Result<()> {
        let id = self.resolve(path)?;
        let ens = self.registry.get_mut(id).ok_or_else(|| ErrorKind::InvalidName(path.to_string()))?;
        ens.parts.insert(name, usage.map(str::to_string), Handler::Native(Rc::new(native)))?;
        tracing::debug!(ensemble = %id, part = name, "native part added");
        Ok(())
    }

    /// Look up a part of the ensemble at `path`. The part name may be any
    /// unambiguous prefix.
    pub fn get_ensemble_part(&self, path: &str, name: &str) -> Result<Handler> {
        let id = self.resolve(path)?;
        let ens = self.registry.get(id).ok_or_else(|| ErrorKind::InvalidName(path.to_string()))?;
        let fmt = UsageFormatter::new(&self.registry, &self.commands);
        match ens.parts.find_by_prefix(name) {
            Lookup::Found(part) => Ok(part.handler.clone()),
            Lookup::Ambiguous(parts) => {
                Err(ErrorKind::Ambiguous { prefix: name.to_string(), usage: fmt.part_lines(id, parts) }.into())
            }
            Lookup::NotFound => {
                Err(ErrorKind::UnknownOption { option: name.to_string(), usage: fmt.ensemble_usage(id) }.into())
            }
        }
    }

    /// Whether `handle` is bound to an ensemble dispatcher.
    pub fn is_ensemble(&self, handle: CommandHandle) -> bool {
        self.registry.by_command(handle).is_some()
    }

    /// Append the usage listing of the ensemble at `path` to `out`. Returns
    /// `false`, leaving `out` alone, if `path` names no ensemble.
    pub fn ensemble_usage(&self, path: &str, out: &mut String) -> bool {
        match self.resolve(path) {
            Ok(id) => {
                UsageFormatter::new(&self.registry, &self.commands).append_ensemble_usage(id, out);
                true
            }
            Err(_) => false,
        }
    }

    /// Like [`Interp::ensemble_usage`], for a command name rather than a path.
    pub fn ensemble_usage_for_command(&self, command: &str, out: &mut String) -> bool {
        let Some(id) = self.commands.find(command).and_then(|handle| self.registry.by_command(handle)) else {
            return false;
        };
        UsageFormatter::new(&self.registry, &self.commands).append_ensemble_usage(id, out);
        true
    }

    /// Report every top-level ensemble, nested ensembles included.
    pub fn describe_ensembles(&self) -> Vec<EnsembleReport> {
        tracing::trace!(ensembles = self.registry.len(), "describing ensembles");
        self.registry.top_level().into_iter().filter_map(|ens| self.report(ens.id)).collect()
    }

    fn report(&self, id: EnsembleId) -> Option<EnsembleReport> {
        let ens = self.registry.get(id)?;
        let fmt = UsageFormatter::new(&self.registry, &self.commands);
        let mut parts = Vec::with_capacity(ens.parts.len());
        for part in ens.parts.iter() {
            let kind = match &part.handler {
                Handler::Native(_) => PartKind::Native,
                Handler::Procedure(_) => PartKind::Procedure,
                Handler::Ensemble(handle) => {
                    let nested = self.registry.by_command(*handle).and_then(|child| self.report(child))?;
                    PartKind::Ensemble(Box::new(nested))
                }
            };
            parts.push(PartReport {
                name: part.name.clone(),
                min_chars: part.min_chars,
                usage: fmt.part_usage(id, part),
                kind,
            });
        }
        Some(EnsembleReport { name: fmt.ensemble_path(id), id, namespace: ens.namespace.to_string(), parts })
    }

    fn resolve(&self, path: &str) -> Result<EnsembleId> {
        let segments = split_list(path)?;
        self.registry.resolve_path(&self.commands, &segments)
    }

    fn ensemble_command(&self, id: EnsembleId) -> Result<CommandHandle> {
        self.registry.get(id).map(|ens| ens.command).ok_or_else(|| Error::new(ErrorKind::InvalidName(id.to_string())))
    }
}
