//! Ensemble dispatch.
//!
//! Every ensemble command, top-level or nested, is bound to [`dispatch`].
//! One invocation goes through these steps:
//!
//! 1. `argv = [self, part, args...]`; with no part name, fail with
//!    `wrong # args: should be one of...` and the usage listing.
//! 2. Resolve `part` by exact name or unambiguous prefix.
//! 3. Found: run the part's handler with `[full-part-name, args...]`. A
//!    nested ensemble is just another dispatcher, so this recurses.
//! 4. Not found (or ambiguous): run the `@error` part with
//!    `[@error, part, args...]` if there is one, else fail with
//!    `bad option "part": should be one of...`.
//!
//! Errors coming out of a part gain a `(part "x" of ensemble "y")` note on
//! their way out, one per nesting level.

use super::part_table::{Handler, Lookup};
use super::usage::{CATCH_ALL, UsageFormatter};
use crate::error::{Error, ErrorKind, Result};
use crate::{CommandHandle, EnsembleId, Interp};

pub(crate) fn dispatch(interp: &mut Interp, command: CommandHandle, argv: &[String]) -> Result<String> {
    let self_name = argv.first().map(String::as_str).unwrap_or_default();
    let Some(id) = interp.registry.by_command(command) else {
        return Err(ErrorKind::UnknownCommand(self_name.to_string()).into());
    };
    let Some(ens) = interp.registry.get(id) else {
        return Err(ErrorKind::UnknownCommand(self_name.to_string()).into());
    };

    let Some(requested) = argv.get(1) else {
        let usage = UsageFormatter::new(&interp.registry, &interp.commands).ensemble_usage(id);
        return Err(ErrorKind::MissingSubcommand { usage }.into());
    };

    let resolved = match ens.parts.find_by_prefix(requested) {
        Lookup::Found(part) => Some((part.name.clone(), part.handler.clone())),
        Lookup::Ambiguous(_) | Lookup::NotFound => None,
    };

    if let Some((part, handler)) = resolved {
        tracing::trace!(ensemble = %id, requested = requested.as_str(), part = part.as_str(), "part resolved");
        let mut part_argv = Vec::with_capacity(argv.len() - 1);
        part_argv.push(part.clone());
        part_argv.extend_from_slice(&argv[2..]);
        return invoke_part(interp, id, &part, handler, &part_argv).map_err(|err| part_note(interp, id, &part, err));
    }

    let catch_all = ens.parts.find_exact(CATCH_ALL).map(|part| part.handler.clone());
    match catch_all {
        Some(handler) => {
            tracing::debug!(ensemble = %id, requested = requested.as_str(), "unresolved part sent to catch-all");
            let mut part_argv = Vec::with_capacity(argv.len());
            part_argv.push(CATCH_ALL.to_string());
            part_argv.extend_from_slice(&argv[1..]);
            invoke_part(interp, id, CATCH_ALL, handler, &part_argv).map_err(|err| part_note(interp, id, CATCH_ALL, err))
        }
        None => {
            tracing::debug!(ensemble = %id, requested = requested.as_str(), "unknown part");
            let usage = UsageFormatter::new(&interp.registry, &interp.commands).ensemble_usage(id);
            Err(ErrorKind::UnknownOption { option: requested.clone(), usage }.into())
        }
    }
}

/// Run one part. `argv[0]` is the full part name.
fn invoke_part(
    interp: &mut Interp,
    ensemble: EnsembleId,
    part: &str,
    handler: Handler,
    argv: &[String],
) -> Result<String> {
    match handler {
        Handler::Native(native) => native.call(interp, argv),
        Handler::Procedure(procedure) => {
            let Some(bindings) = procedure.args().bind(&argv[1..]) else {
                return Err(ErrorKind::WrongArgs(declared_usage(interp, ensemble, part)).into());
            };
            interp.call_procedure(&procedure, bindings)
        }
        Handler::Ensemble(nested) => interp.nested(|interp| dispatch(interp, nested, argv)),
    }
}

fn declared_usage(interp: &Interp, ensemble: EnsembleId, part: &str) -> String {
    let fmt = UsageFormatter::new(&interp.registry, &interp.commands);
    match interp.registry.get(ensemble).and_then(|ens| ens.parts.find_exact(part)) {
        Some(found) => fmt.part_usage(ensemble, found),
        None => fmt.invocation_path(ensemble, part),
    }
}

fn part_note(interp: &Interp, ensemble: EnsembleId, part: &str, err: Error) -> Error {
    let path = UsageFormatter::new(&interp.registry, &interp.commands).ensemble_path(ensemble);
    err.with_note(format!("(part \"{part}\" of ensemble \"{path}\")"))
}

#[cfg(test)]
mod tests {
    use crate::{ErrorKind, Interp, Native};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn numbers() -> Interp {
        let mut interp = Interp::new();
        interp
            .eval(
                r#"
                ensemble test_numbers {
                    part one {x} { return "one: $x" }
                    part two {x y} { return "two: $x, $y" }
                    part three {x y z} { return "three: $x, $y, $z" }
                }
                "#,
            )
            .unwrap();
        interp
    }

    #[test]
    fn exact_names_and_prefixes_dispatch() {
        let mut interp = numbers();
        assert_eq!(interp.eval("test_numbers one 1").unwrap(), "one: 1");
        assert_eq!(interp.eval("test_numbers o 1").unwrap(), "one: 1");
        assert_eq!(interp.eval("test_numbers th a b c").unwrap(), "three: a, b, c");
        assert_eq!(interp.eval("test_numbers tw a b").unwrap(), "two: a, b");
    }

    #[test]
    fn ambiguous_prefix_without_catch_all_is_a_bad_option() {
        let mut interp = numbers();
        let err = interp.eval("test_numbers t 1 2").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownOption { option, .. } if option == "t"));
    }

    #[test]
    fn missing_part_name_lists_usage() {
        let mut interp = numbers();
        let err = interp.eval("test_numbers").unwrap_err();
        assert_eq!(
            err.to_string(),
            "wrong # args: should be one of...\n  test_numbers one x\n  test_numbers three x y z\n  test_numbers two x y"
        );
    }

    #[test]
    fn wrong_argument_count_reports_part_usage() {
        let mut interp = numbers();
        let err = interp.eval("test_numbers two 1").unwrap_err();
        assert_eq!(err.to_string(), "wrong # args: should be \"test_numbers two x y\"");
        assert_eq!(err.notes()[0], "(part \"two\" of ensemble \"test_numbers\")");
    }

    #[test]
    fn native_parts_see_the_full_part_name() {
        let mut interp = Interp::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        interp.create_ensemble("tool").unwrap();
        interp
            .add_ensemble_part(
                "tool",
                "inspect",
                Some("?arg ...?"),
                Native::new(move |_, argv| {
                    sink.borrow_mut().push(argv.to_vec());
                    Ok(argv.len().to_string())
                }),
            )
            .unwrap();

        assert_eq!(interp.eval("tool ins a b").unwrap(), "3");
        assert_eq!(seen.borrow()[0], crate::words!["inspect", "a", "b"]);
    }

    #[test]
    fn catch_all_receives_the_unresolved_name() {
        let mut interp = numbers();
        interp.eval("ensemble test_numbers { part @error {name args} { return \"caught $name ($args)\" } }").unwrap();
        assert_eq!(interp.eval("test_numbers foo x y").unwrap(), "caught foo (x y)");
        assert_eq!(interp.eval("test_numbers t 1").unwrap(), "caught t (1)");
        assert_eq!(interp.eval("test_numbers one 1").unwrap(), "one: 1");
    }
}
