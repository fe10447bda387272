//! Formal argument lists for procedure-backed parts.
//!
//! An argument specification is a list whose elements are either a bare name
//! or a `{name default}` pair. A final element named `args` collects every
//! remaining actual argument.
//!
//! The parsed list renders a usage string in the conventional form:
//!
//! ```text
//! {x {y 1} args}  ->  x ?y? ?arg arg ...?
//! ```

use super::words::{merge_list, split_list};
use crate::error::{Error, ErrorKind, Result};

/// One formal parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalArg {
    pub name: String,
    pub default: Option<String>,
}

/// A parsed argument specification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgList {
    formals: Vec<FormalArg>,
    variadic: bool,
}

impl ArgList {
    /// Parse `spec` for the procedure called `proc_name` (used in messages).
    pub fn parse(spec: &str, proc_name: &str) -> Result<Self> {
        let elements = split_list(spec).map_err(|err| Error::new(ErrorKind::ArgSpec(err.to_string())))?;
        let mut formals = Vec::with_capacity(elements.len());

        for element in &elements {
            let fields = split_list(element).map_err(|err| Error::new(ErrorKind::ArgSpec(err.to_string())))?;
            let (name, default) = match fields.as_slice() {
                [] => {
                    let msg = format!("procedure \"{proc_name}\" has argument with no name");
                    return Err(ErrorKind::ArgSpec(msg).into());
                }
                [name] => (name.clone(), None),
                [name, default] => (name.clone(), Some(default.clone())),
                _ => {
                    let msg = format!("too many fields in argument specifier \"{element}\"");
                    return Err(ErrorKind::ArgSpec(msg).into());
                }
            };
            if name.is_empty() {
                return Err(ErrorKind::ArgSpec(format!("procedure \"{proc_name}\" has argument with no name")).into());
            }
            if name.contains("::") {
                return Err(ErrorKind::ArgSpec(format!(
                    "procedure \"{proc_name}\" has formal parameter \"{name}\" that is not a simple name"
                ))
                .into());
            }
            formals.push(FormalArg { name, default });
        }

        let variadic = formals.last().is_some_and(|f| f.name == "args");
        Ok(Self { formals, variadic })
    }

    pub fn formals(&self) -> &[FormalArg] {
        &self.formals
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Render the argument summary shown in usage listings.
    pub fn usage(&self) -> String {
        let mut parts = Vec::with_capacity(self.formals.len());
        for (idx, formal) in self.formals.iter().enumerate() {
            if self.variadic && idx + 1 == self.formals.len() {
                parts.push("?arg arg ...?".to_string());
            } else if formal.default.is_some() {
                parts.push(format!("?{}?", formal.name));
            } else {
                parts.push(formal.name.clone());
            }
        }
        parts.join(" ")
    }

    /// Bind actual arguments to formals, or `None` if the count is wrong.
    pub fn bind(&self, actual: &[String]) -> Option<Vec<(String, String)>> {
        let fixed = if self.variadic { &self.formals[..self.formals.len() - 1] } else { &self.formals[..] };
        let mut bound = Vec::with_capacity(self.formals.len());
        let mut rest = actual.iter();

        for formal in fixed {
            let value = match rest.next() {
                Some(value) => value.clone(),
                None => formal.default.clone()?,
            };
            bound.push((formal.name.clone(), value));
        }

        let remaining: Vec<&String> = rest.collect();
        if self.variadic {
            bound.push(("args".to_string(), merge_list(&remaining)));
        } else if !remaining.is_empty() {
            return None;
        }
        Some(bound)
    }
}
