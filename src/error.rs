//! Error types.
//!
//! Every fallible operation in the crate returns [`Error`]: a [`ErrorKind`]
//! carrying the primary, user-facing message plus an ordered list of context
//! notes. The message is what a caller sees as the command result; the notes
//! form the error trace and are appended as an error unwinds through nested
//! ensembles, declaration bodies and creation helpers.
//!
//! ```text
//! bad option "foo": should be one of...       <- Display (the message)
//!   test_numbers one x
//!     (while adding to ensemble "test_numbers") <- note, error_info() only
//! ```

use std::fmt;

/// Shorthand used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The kind of failure, with its primary message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A part or sub-ensemble with this name already exists.
    #[error("part \"{part}\" already exists in ensemble")]
    Duplicate { part: String },

    /// A path segment or declaration named something that is not an ensemble.
    #[error("{0}")]
    NotAnEnsemble(String),

    /// Malformed or empty ensemble name/path.
    #[error("invalid ensemble name \"{0}\"")]
    InvalidName(String),

    /// A prefix matched more than one sibling part.
    #[error("ambiguous option \"{prefix}\": should be one of...\n{usage}")]
    Ambiguous { prefix: String, usage: String },

    /// Nothing matched and the ensemble has no `@error` part.
    #[error("bad option \"{option}\": should be one of...\n{usage}")]
    UnknownOption { option: String, usage: String },

    /// An ensemble was invoked without a part name.
    #[error("wrong # args: should be one of...\n{usage}")]
    MissingSubcommand { usage: String },

    /// An argument specification failed to parse.
    #[error("{0}")]
    ArgSpec(String),

    /// A command or procedure was invoked with the wrong number of arguments.
    #[error("wrong # args: should be \"{0}\"")]
    WrongArgs(String),

    #[error("invalid command name \"{0}\"")]
    UnknownCommand(String),

    /// Malformed script or list text.
    #[error("{0}")]
    Syntax(String),

    #[error("can't read \"{0}\": no such variable")]
    NoSuchVariable(String),

    /// Raised by script code through the `error` command or by native handlers.
    #[error("{0}")]
    User(String),

    #[error("too many nested evaluations (infinite loop?)")]
    NestingTooDeep,
}

/// An [`ErrorKind`] plus the context notes accumulated while unwinding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    notes: Vec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, notes: Vec::new() }
    }

    /// Convenience for native handlers that want to fail with a plain message.
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User(message.into()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Context notes, innermost first.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Append a context note and return `self`, for use in `map_err`.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// The message followed by every note, each on its own indented line.
    pub fn error_info(&self) -> String {
        let mut out = self.kind.to_string();
        for note in &self.notes {
            out.push_str("\n    ");
            out.push_str(note);
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
