//! Script evaluation.
//!
//! Evaluation is a straight walk over parsed commands: substitute each word,
//! look the first word up in the command table, run it. `return` is the only
//! non-local exit and travels as [`Flow::Return`] until it reaches the
//! procedure (or top-level script) that owns it.
//!
//! Procedures back declared ensemble parts. Each call gets a fresh variable
//! frame; the procedure itself carries the namespace of the ensemble the part
//! belongs to. The body is tokenized once, on first call, and reused
//! afterwards.

use super::arglist::ArgList;
use super::commands::{BuiltinFn, CommandTarget};
use super::words::{ParsedCommand, Piece, SubstFlags, Word, merge_list, parse_script};
use crate::Interp;
use crate::engine::{declare, dispatch};
use crate::error::{Error, ErrorKind, Result};
use once_cell::unsync::OnceCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Longest command text quoted in an error trace.
const TRACE_TEXT_LIMIT: usize = 150;

/// Completion of a command or script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flow {
    Normal(String),
    Return(String),
}

impl Flow {
    pub fn into_value(self) -> String {
        match self {
            Flow::Normal(value) | Flow::Return(value) => value,
        }
    }
}

/// One level of variable scope.
#[derive(Debug, Clone, Default)]
pub(crate) struct Frame {
    pub vars: HashMap<String, String>,
}

impl Frame {
    pub fn global() -> Self {
        Self::default()
    }
}

/// A user-defined procedure: formal arguments plus a body script.
#[derive(Debug)]
pub struct Procedure {
    name: String,
    args: ArgList,
    body: String,
    namespace: Rc<str>,
    compiled: OnceCell<Vec<ParsedCommand>>,
}

impl Procedure {
    pub(crate) fn new(name: &str, args: ArgList, body: &str, namespace: Rc<str>) -> Self {
        Self { name: name.to_string(), args, body: body.to_string(), namespace, compiled: OnceCell::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &ArgList {
        &self.args
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Namespace the body runs in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn compiled(&self) -> Result<&[ParsedCommand]> {
        self.compiled.get_or_try_init(|| parse_script(&self.body, SubstFlags::all())).map(Vec::as_slice)
    }
}

/// Add the "while executing" / "invoked from within" note for `text`.
pub(crate) fn command_trace(err: Error, text: &str) -> Error {
    let quoted = if text.chars().count() > TRACE_TEXT_LIMIT {
        format!("{}...", text.chars().take(TRACE_TEXT_LIMIT).collect::<String>())
    } else {
        text.to_string()
    };
    let lead = if err.notes().is_empty() { "while executing" } else { "invoked from within" };
    err.with_note(format!("{lead}\n\"{quoted}\""))
}

// --- Builtins ------------------------------------------------------------------

pub(crate) const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("concat", builtin_concat),
    ("ensemble", builtin_ensemble),
    ("error", builtin_error),
    ("list", builtin_list),
    ("puts", builtin_puts),
    ("return", builtin_return),
    ("set", builtin_set),
];

fn builtin_ensemble(interp: &mut Interp, argv: &[String]) -> Result<Flow> {
    declare::ensemble_command(interp, None, argv).map(Flow::Normal)
}

fn builtin_return(_: &mut Interp, argv: &[String]) -> Result<Flow> {
    match argv {
        [_] => Ok(Flow::Return(String::new())),
        [_, value] => Ok(Flow::Return(value.clone())),
        _ => Err(ErrorKind::WrongArgs("return ?value?".into()).into()),
    }
}

fn builtin_error(_: &mut Interp, argv: &[String]) -> Result<Flow> {
    match argv {
        [_, message] => Err(ErrorKind::User(message.clone()).into()),
        _ => Err(ErrorKind::WrongArgs("error message".into()).into()),
    }
}

fn builtin_set(interp: &mut Interp, argv: &[String]) -> Result<Flow> {
    match argv {
        [_, name] => interp.get_var(name).map(Flow::Normal),
        [_, name, value] => {
            interp.set_var(name, value);
            Ok(Flow::Normal(value.clone()))
        }
        _ => Err(ErrorKind::WrongArgs("set varName ?newValue?".into()).into()),
    }
}

fn builtin_list(_: &mut Interp, argv: &[String]) -> Result<Flow> {
    Ok(Flow::Normal(merge_list(&argv[1..])))
}

fn builtin_concat(_: &mut Interp, argv: &[String]) -> Result<Flow> {
    let parts: Vec<&str> = argv[1..].iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    Ok(Flow::Normal(parts.join(" ")))
}

fn builtin_puts(_: &mut Interp, argv: &[String]) -> Result<Flow> {
    match argv {
        [_, text] => {
            println!("{text}");
            Ok(Flow::Normal(String::new()))
        }
        _ => Err(ErrorKind::WrongArgs("puts string".into()).into()),
    }
}

// --- Evaluation ----------------------------------------------------------------

impl Interp {
    /// Run `f` one evaluation level deeper, enforcing the nesting limit.
    ///
    /// Every cycle of recursion passes here exactly once: a script (or
    /// bracketed substitution) being evaluated, a procedure body being run,
    /// or a nested ensemble being dispatched into.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.options.max_nesting_depth {
            return Err(ErrorKind::NestingTooDeep.into());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    pub(crate) fn get_var(&self, name: &str) -> Result<String> {
        let (frame, key) = self.var_frame(name);
        frame.vars.get(key).cloned().ok_or_else(|| ErrorKind::NoSuchVariable(name.to_string()).into())
    }

    pub(crate) fn set_var(&mut self, name: &str, value: &str) {
        let global = name.starts_with("::");
        let key = name.trim_start_matches("::").to_string();
        let frame = if global { self.frames.first_mut() } else { self.frames.last_mut() };
        if let Some(frame) = frame {
            frame.vars.insert(key, value.to_string());
        }
    }

    fn var_frame<'a>(&self, name: &'a str) -> (&Frame, &'a str) {
        let global = name.starts_with("::");
        let frame = if global { &self.frames[0] } else { &self.frames[self.frames.len() - 1] };
        (frame, name.trim_start_matches("::"))
    }

    fn subst_word(&mut self, word: &Word) -> Result<String> {
        let mut out = String::new();
        for piece in &word.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Var(name) => out.push_str(&self.get_var(name)?),
                Piece::Script(script) => out.push_str(&self.eval_flow(script)?.into_value()),
            }
        }
        Ok(out)
    }

    /// Invoke a fully substituted command.
    pub(crate) fn invoke_flow(&mut self, argv: &[String]) -> Result<Flow> {
        let Some(name) = argv.first() else {
            return Ok(Flow::Normal(String::new()));
        };
        let handle = self.commands.find(name).ok_or_else(|| Error::new(ErrorKind::UnknownCommand(name.clone())))?;
        let target = match self.commands.get(handle) {
            Some(entry) => entry.target.clone(),
            None => return Err(ErrorKind::UnknownCommand(name.clone()).into()),
        };

        match target {
            CommandTarget::Builtin(func) => func(self, argv),
            CommandTarget::Native(native) => native.call(self, argv).map(Flow::Normal),
            CommandTarget::Ensemble => dispatch::dispatch(self, handle, argv).map(Flow::Normal),
        }
    }

    fn eval_command(&mut self, command: &ParsedCommand) -> Result<Flow> {
        let mut argv = Vec::with_capacity(command.words.len());
        for word in &command.words {
            argv.push(self.subst_word(word)?);
        }
        self.invoke_flow(&argv)
    }

    /// Evaluate commands in order; on failure report the failing line.
    fn eval_commands(&mut self, commands: &[ParsedCommand]) -> std::result::Result<Flow, (Error, usize)> {
        let mut last = Flow::Normal(String::new());
        for command in commands {
            match self.eval_command(command) {
                Ok(Flow::Return(value)) => return Ok(Flow::Return(value)),
                Ok(flow) => last = flow,
                Err(err) => return Err((command_trace(err, &command.text), command.line)),
            }
        }
        Ok(last)
    }

    pub(crate) fn eval_flow(&mut self, script: &str) -> Result<Flow> {
        let commands = parse_script(script, SubstFlags::all())?;
        self.nested(|interp| interp.eval_commands(&commands).map_err(|(err, _)| err))
    }

    /// Evaluate `script`, handing each top-level command's result to `on_result`.
    pub(crate) fn eval_each_command(&mut self, script: &str, mut on_result: impl FnMut(&str)) -> Result<()> {
        let commands = parse_script(script, SubstFlags::all())?;
        for command in &commands {
            let flow = self.eval_commands(std::slice::from_ref(command)).map_err(|(err, _)| err)?;
            on_result(&flow.into_value());
        }
        Ok(())
    }

    /// Call `procedure` with already bound arguments in a fresh frame.
    pub(crate) fn call_procedure(&mut self, procedure: &Procedure, bindings: Vec<(String, String)>) -> Result<String> {
        let commands = procedure.compiled()?;
        tracing::trace!(procedure = procedure.name(), namespace = procedure.namespace(), "invoking procedure");

        self.nested(|interp| {
            interp.frames.push(Frame { vars: bindings.into_iter().collect() });
            let outcome = interp.eval_commands(commands);
            interp.frames.pop();
            outcome.map(Flow::into_value).map_err(|(err, line)| {
                err.with_note(format!("(procedure \"{}\" line {line})", procedure.name()))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_and_command_substitution() {
        let mut interp = Interp::new();
        assert_eq!(interp.eval("set a 5; set b \"a=$a [list x {y z}]\"").unwrap(), "a=5 x {y z}");
        assert_eq!(interp.eval("set b").unwrap(), "a=5 x {y z}");
    }

    #[test]
    fn unknown_variables_and_commands_fail() {
        let mut interp = Interp::new();
        let err = interp.eval("set q $nope").unwrap_err();
        assert_eq!(err.to_string(), "can't read \"nope\": no such variable");

        let err = interp.eval("frobnicate 1").unwrap_err();
        assert_eq!(err.to_string(), "invalid command name \"frobnicate\"");
        assert_eq!(err.notes(), &["while executing\n\"frobnicate 1\"".to_string()]);
    }

    #[test]
    fn return_stops_the_script() {
        let mut interp = Interp::new();
        assert_eq!(interp.eval("return early; error late").unwrap(), "early");
    }

    #[test]
    fn error_builtin_raises_user_error() {
        let mut interp = Interp::new();
        let err = interp.eval("error {something broke}").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::User("something broke".into()));
    }

    #[test]
    fn concat_trims_and_joins() {
        let mut interp = Interp::new();
        assert_eq!(interp.eval("concat { a } {} b").unwrap(), "a b");
    }

    #[test]
    fn nesting_limit_stops_runaway_recursion() {
        let mut interp = Interp::with_options(crate::Options { max_nesting_depth: 8, ..Default::default() });
        let err = interp.eval("list [list [list [list [list [list [list [list [list x]]]]]]]]").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NestingTooDeep);
    }

    #[test]
    fn long_commands_are_truncated_in_traces() {
        let long = "x".repeat(200);
        let err = command_trace(Error::user("boom"), &long);
        let note = &err.notes()[0];
        assert!(note.ends_with("...\""));
        assert!(note.len() < 200);
    }
}
