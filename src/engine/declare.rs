//! The ensemble declaration language.
//!
//! `ensemble NAME BODY` does not evaluate BODY as a script. BODY is tokenized
//! as a list-structured command sequence and each command must be one of:
//!
//! - `part NAME ARGS BODY` / `option NAME ARGS BODY`: add a procedure-backed
//!   part to the ensemble being built.
//! - `ensemble NAME ?BODY?` / `ensemble NAME CMD ARG...`: find or create a
//!   nested ensemble and declare into it.
//!
//! Words get backslash substitution only, so `$x` and `[cmd]` in argument
//! specs and bodies reach the part verbatim. Every failure inside BODY gains
//! the offending command text and a `("ensemble" body line N)` note.

use super::part_table::Handler;
use super::usage::UsageFormatter;
use crate::error::{ErrorKind, Result};
use crate::runtime::{ArgList, Procedure, SubstFlags, Word, command_trace, parse_script};
use crate::{EnsembleId, Interp};
use std::rc::Rc;

/// `ensemble name ?command arg arg...?`, at top level (`current == None`) or
/// inside the body of `current`.
pub(crate) fn ensemble_command(interp: &mut Interp, current: Option<EnsembleId>, argv: &[String]) -> Result<String> {
    let keyword = argv.first().map(String::as_str).unwrap_or("ensemble");
    let Some(name) = argv.get(1) else {
        return Err(ErrorKind::WrongArgs(format!("{keyword} name ?command arg arg...?")).into());
    };

    let id = match current {
        Some(parent) => locate_nested(interp, parent, name)?,
        None => locate_top_level(interp, name)?,
    };

    match &argv[2..] {
        [] => {}
        [body] => eval_body(interp, id, body)?,
        declaration => declare(interp, id, declaration)?,
    }
    Ok(String::new())
}

pub(crate) fn locate_top_level(interp: &mut Interp, name: &str) -> Result<EnsembleId> {
    match interp.commands.find(name) {
        None => interp.registry.create_top_level(&mut interp.commands, name),
        Some(handle) => interp
            .registry
            .by_command(handle)
            .ok_or_else(|| ErrorKind::NotAnEnsemble(format!("command \"{name}\" is not an ensemble")).into()),
    }
}

pub(crate) fn locate_nested(interp: &mut Interp, parent: EnsembleId, name: &str) -> Result<EnsembleId> {
    let existing =
        interp.registry.get(parent).and_then(|ens| ens.parts.find_exact(name)).map(|part| part.handler.clone());
    let not_an_ensemble = || ErrorKind::NotAnEnsemble(format!("part \"{name}\" already exists and is not an ensemble"));

    match existing {
        None => interp.registry.create_nested(&mut interp.commands, parent, name),
        Some(Handler::Ensemble(handle)) => interp.registry.by_command(handle).ok_or_else(|| not_an_ensemble().into()),
        Some(_) => Err(not_an_ensemble().into()),
    }
}

fn eval_body(interp: &mut Interp, id: EnsembleId, body: &str) -> Result<()> {
    let commands = parse_script(body, SubstFlags::BACKSLASHES)?;
    interp.nested(|interp| {
        for command in &commands {
            let argv: Vec<String> = command.words.iter().map(Word::literal).collect();
            declare(interp, id, &argv).map_err(|err| {
                command_trace(err, &command.text).with_note(format!("(\"ensemble\" body line {})", command.line))
            })?;
        }
        Ok(())
    })
}

/// One declaration against the ensemble `id`.
fn declare(interp: &mut Interp, id: EnsembleId, argv: &[String]) -> Result<()> {
    let Some(keyword) = argv.first() else {
        return Ok(());
    };
    match keyword.as_str() {
        "part" | "option" => declare_part(interp, id, argv),
        "ensemble" => ensemble_command(interp, Some(id), argv).map(drop),
        other => Err(ErrorKind::UnknownCommand(other.to_string()).into()),
    }
}

fn declare_part(interp: &mut Interp, id: EnsembleId, argv: &[String]) -> Result<()> {
    let [keyword, name, spec, body] = argv else {
        let keyword = argv.first().map(String::as_str).unwrap_or("part");
        return Err(ErrorKind::WrongArgs(format!("{keyword} name args body")).into());
    };

    let args = ArgList::parse(spec, name)?;
    let usage = args.usage();
    let Some(ens) = interp.registry.get_mut(id) else {
        return Err(ErrorKind::InvalidName(name.clone()).into());
    };
    let procedure = Procedure::new(name, args, body, ens.namespace.clone());

    let inserted = ens.parts.insert(name, Some(usage), Handler::Procedure(Rc::new(procedure))).map(drop);
    match inserted {
        Ok(()) => {
            tracing::debug!(ensemble = %id, part = name.as_str(), keyword = keyword.as_str(), "part declared");
            Ok(())
        }
        Err(err) => {
            let path = UsageFormatter::new(&interp.registry, &interp.commands).ensemble_path(id);
            Err(err.with_note(format!("(while adding to ensemble \"{path}\")")))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{ErrorKind, Interp};

    #[test]
    fn option_is_an_alias_for_part() {
        let mut interp = Interp::new();
        interp.eval("ensemble cfg { option verbose {{level 1}} { return \"level $level\" } }").unwrap();
        assert_eq!(interp.eval("cfg verbose").unwrap(), "level 1");
        assert_eq!(interp.eval("cfg v 3").unwrap(), "level 3");

        let mut usage = String::new();
        assert!(interp.ensemble_usage("cfg", &mut usage));
        assert_eq!(usage, "  cfg verbose ?level?");
    }

    #[test]
    fn redeclaring_a_part_fails_with_context() {
        let mut interp = Interp::new();
        interp.eval("ensemble test_numbers { part three {x y z} { return 3 } }").unwrap();
        let err = interp.eval("ensemble test_numbers {\n    part three {x} { return again }\n}").unwrap_err();

        assert_eq!(err.to_string(), "part \"three\" already exists in ensemble");
        assert_eq!(
            err.notes()[..3],
            [
                "(while adding to ensemble \"test_numbers\")".to_string(),
                "invoked from within\n\"part three {x} { return again }\"".to_string(),
                "(\"ensemble\" body line 2)".to_string(),
            ]
        );
        // The first definition survives.
        assert_eq!(interp.eval("test_numbers three a b c").unwrap(), "3");
    }

    #[test]
    fn wrong_word_count_names_the_keyword() {
        let mut interp = Interp::new();
        let err = interp.eval("ensemble e { option x {} }").unwrap_err();
        assert_eq!(err.to_string(), "wrong # args: should be \"option name args body\"");

        let err = interp.eval("ensemble").unwrap_err();
        assert_eq!(err.to_string(), "wrong # args: should be \"ensemble name ?command arg arg...?\"");
    }

    #[test]
    fn unknown_declarations_are_rejected() {
        let mut interp = Interp::new();
        let err = interp.eval("ensemble e {\n\n  proc x {} {}\n}").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownCommand("proc".into()));
        assert!(err.notes().contains(&"(\"ensemble\" body line 3)".to_string()));
    }

    #[test]
    fn bad_argument_specs_surface() {
        let mut interp = Interp::new();
        let err = interp.eval("ensemble e { part x {{a b c}} {} }").unwrap_err();
        assert_eq!(err.to_string(), "too many fields in argument specifier \"a b c\"");
        assert!(matches!(err.kind(), ErrorKind::ArgSpec(_)));
    }

    #[test]
    fn nested_ensemble_over_plain_part_is_rejected() {
        let mut interp = Interp::new();
        interp.eval("ensemble e { part x {} { return x } }").unwrap();
        let err = interp.eval("ensemble e { ensemble x { part y {} {} } }").unwrap_err();
        assert_eq!(err.to_string(), "part \"x\" already exists and is not an ensemble");
    }

    #[test]
    fn top_level_name_must_not_be_a_plain_command() {
        let mut interp = Interp::new();
        let err = interp.eval("ensemble set { part x {} {} }").unwrap_err();
        assert_eq!(err.to_string(), "command \"set\" is not an ensemble");
    }

    #[test]
    fn single_declaration_form_and_bare_name() {
        let mut interp = Interp::new();
        interp.eval("ensemble e").unwrap();
        interp.eval("ensemble e part hi {who} { return \"hi $who\" }").unwrap();
        interp.eval("ensemble e ensemble sub part deep {} { return deep }").unwrap();
        assert_eq!(interp.eval("e hi bob").unwrap(), "hi bob");
        assert_eq!(interp.eval("e s d").unwrap(), "deep");
    }

    #[test]
    fn part_bodies_read_globals_at_call_time() {
        let mut interp = Interp::new();
        interp.eval("set greeting hello").unwrap();
        interp.eval("ensemble e { part show {} {return $::greeting} }").unwrap();
        assert_eq!(interp.eval("e show").unwrap(), "hello");
        interp.eval("set greeting bye").unwrap();
        assert_eq!(interp.eval("e show").unwrap(), "bye");
    }
}
