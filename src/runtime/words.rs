//! Script and list tokenization.
//!
//! Scripts are sequences of commands separated by newlines or `;`; commands are
//! sequences of words. A word is one of:
//!
//! ```text
//! {literal {nested} text}   braces: no substitution at all
//! "quoted $var [cmd]"       quotes: substitution, whitespace kept
//! bare$var[cmd]             bare:   substitution, ends at whitespace
//! ```
//!
//! Substitution is described by [`Piece`]s and performed later by the
//! evaluator; the tokenizer only decides *where* substitutions are, filtered by
//! [`SubstFlags`]. The declaration parser tokenizes with backslashes only, so
//! every word it sees is a literal.
//!
//! Lists share the word syntax but have no command separators and no comments.

use crate::error::{ErrorKind, Result};

bitflags::bitflags! {
    /// Which substitutions the tokenizer recognizes inside non-braced words.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SubstFlags: u8 {
        const BACKSLASHES = 1 << 0;
        const VARIABLES   = 1 << 1;
        const COMMANDS    = 1 << 2;
    }
}

/// One segment of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    /// `$name` or `${name}`.
    Var(String),
    /// `[script]`, holding the script text between the brackets.
    Script(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Word {
    pub pieces: Vec<Piece>,
}

impl Word {
    fn push_char(&mut self, c: char) {
        match self.pieces.last_mut() {
            Some(Piece::Text(text)) => text.push(c),
            _ => self.pieces.push(Piece::Text(c.to_string())),
        }
    }

    /// Concatenated text of a word that has no substitutions.
    ///
    /// Variable and command pieces are rendered back in their source form, so
    /// this is only lossless for words tokenized without those flags.
    pub fn literal(&self) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Var(name) => {
                    out.push('$');
                    out.push_str(name);
                }
                Piece::Script(script) => {
                    out.push('[');
                    out.push_str(script);
                    out.push(']');
                }
            }
        }
        out
    }
}

/// A command as it appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub words: Vec<Word>,
    /// 1-based line of the first word, relative to the start of the script.
    pub line: usize,
    /// Source text of the command, without the trailing separator.
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Script,
    List,
}

struct Tokenizer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    flags: SubstFlags,
    mode: Mode,
    src: &'a str,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str, flags: SubstFlags, mode: Mode) -> Self {
        Self { chars: src.chars().collect(), pos: 0, line: 1, flags, mode, src }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn at_backslash_newline(&self) -> bool {
        self.peek() == Some('\\') && self.peek_at(1) == Some('\n')
    }

    fn is_separator(&self, c: char) -> bool {
        match self.mode {
            Mode::Script => c == '\n' || c == ';',
            Mode::List => false,
        }
    }

    fn is_word_space(&self, c: char) -> bool {
        match self.mode {
            Mode::Script => c == ' ' || c == '\t' || c == '\r',
            Mode::List => c.is_whitespace(),
        }
    }

    fn at_word_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(c) => self.is_word_space(c) || self.is_separator(c) || self.at_backslash_newline(),
        }
    }

    /// Skip blanks inside a command (or anywhere, for lists).
    fn skip_word_space(&mut self) {
        loop {
            if self.at_backslash_newline() {
                self.bump();
                self.bump();
                while matches!(self.peek(), Some(' ') | Some('\t')) {
                    self.bump();
                }
                continue;
            }
            match self.peek() {
                Some(c) if self.is_word_space(c) => {
                    self.bump();
                }
                _ => break,
            }
        }
    }

    /// Skip blanks, separators and comments between commands.
    fn skip_command_gap(&mut self) {
        loop {
            self.skip_word_space();
            match self.peek() {
                Some(c) if self.is_separator(c) => {
                    self.bump();
                }
                Some('#') if self.mode == Mode::Script => self.skip_comment(),
                _ => break,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                self.bump();
                continue;
            }
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn parse_commands(&mut self) -> Result<Vec<ParsedCommand>> {
        let mut commands = Vec::new();
        loop {
            self.skip_command_gap();
            if self.peek().is_none() {
                break;
            }

            let start = self.pos;
            let line = self.line;
            let mut words = Vec::new();
            loop {
                self.skip_word_space();
                match self.peek() {
                    None => break,
                    Some(c) if self.is_separator(c) => break,
                    Some(_) => words.push(self.parse_word()?),
                }
            }

            let text: String = self.chars[start..self.pos].iter().collect();
            if !words.is_empty() {
                commands.push(ParsedCommand { words, line, text: text.trim_end().to_string() });
            }
        }
        Ok(commands)
    }

    fn parse_word(&mut self) -> Result<Word> {
        match self.peek() {
            Some('{') => self.parse_braced(),
            Some('"') => self.parse_quoted(),
            _ => self.parse_bare(),
        }
    }

    fn parse_braced(&mut self) -> Result<Word> {
        self.bump();
        let mut depth = 1usize;
        let mut text = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(ErrorKind::Syntax("missing close-brace".into()).into());
            };
            match c {
                '\\' => {
                    text.push(c);
                    if let Some(next) = self.bump() {
                        text.push(next);
                    }
                }
                '{' => {
                    depth += 1;
                    text.push(c);
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    text.push(c);
                }
                _ => text.push(c),
            }
        }
        if !self.at_word_end() {
            let msg = match self.mode {
                Mode::Script => "extra characters after close-brace",
                Mode::List => "list element in braces followed by extra characters",
            };
            return Err(ErrorKind::Syntax(msg.into()).into());
        }
        Ok(Word { pieces: vec![Piece::Text(text)] })
    }

    fn parse_quoted(&mut self) -> Result<Word> {
        self.bump();
        let mut word = Word::default();
        loop {
            match self.peek() {
                None => return Err(ErrorKind::Syntax("missing \"".into()).into()),
                Some('"') => {
                    self.bump();
                    break;
                }
                Some(_) => self.parse_piece(&mut word)?,
            }
        }
        if !self.at_word_end() {
            let msg = match self.mode {
                Mode::Script => "extra characters after close-quote",
                Mode::List => "list element in quotes followed by extra characters",
            };
            return Err(ErrorKind::Syntax(msg.into()).into());
        }
        if word.pieces.is_empty() {
            word.pieces.push(Piece::Text(String::new()));
        }
        Ok(word)
    }

    fn parse_bare(&mut self) -> Result<Word> {
        let mut word = Word::default();
        while !self.at_word_end() {
            self.parse_piece(&mut word)?;
        }
        Ok(word)
    }

    /// Consume one character (or one substitution) into `word`.
    fn parse_piece(&mut self, word: &mut Word) -> Result<()> {
        let Some(c) = self.peek() else {
            return Ok(());
        };
        match c {
            '\\' => {
                self.bump();
                if self.flags.contains(SubstFlags::BACKSLASHES) {
                    self.backslash(word);
                } else {
                    word.push_char('\\');
                    if let Some(next) = self.bump() {
                        word.push_char(next);
                    }
                }
            }
            '$' if self.flags.contains(SubstFlags::VARIABLES) => {
                self.bump();
                self.variable(word)?;
            }
            '[' if self.flags.contains(SubstFlags::COMMANDS) => {
                self.bump();
                let script = self.bracketed()?;
                word.pieces.push(Piece::Script(script));
            }
            _ => {
                self.bump();
                word.push_char(c);
            }
        }
        Ok(())
    }

    fn backslash(&mut self, word: &mut Word) {
        let Some(c) = self.bump() else {
            word.push_char('\\');
            return;
        };
        match c {
            'n' => word.push_char('\n'),
            't' => word.push_char('\t'),
            'r' => word.push_char('\r'),
            '\n' => {
                while matches!(self.peek(), Some(' ') | Some('\t')) {
                    self.bump();
                }
                word.push_char(' ');
            }
            other => word.push_char(other),
        }
    }

    fn variable(&mut self, word: &mut Word) -> Result<()> {
        if self.peek() == Some('{') {
            self.bump();
            let mut name = String::new();
            loop {
                match self.bump() {
                    None => return Err(ErrorKind::Syntax("missing close-brace for variable name".into()).into()),
                    Some('}') => break,
                    Some(c) => name.push(c),
                }
            }
            word.pieces.push(Piece::Var(name));
            return Ok(());
        }

        let mut name = String::new();
        while let Some(c) = self.peek() {
            let namespace_sep = c == ':' && self.peek_at(1) == Some(':');
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else if namespace_sep {
                name.push_str("::");
                self.bump();
                self.bump();
            } else {
                break;
            }
        }
        if name.is_empty() {
            word.push_char('$');
        } else {
            word.pieces.push(Piece::Var(name));
        }
        Ok(())
    }

    fn bracketed(&mut self) -> Result<String> {
        let mut depth = 1usize;
        let mut brace_depth = 0usize;
        let mut script = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(ErrorKind::Syntax("missing close-bracket".into()).into());
            };
            match c {
                '\\' => {
                    script.push(c);
                    if let Some(next) = self.bump() {
                        script.push(next);
                    }
                    continue;
                }
                '{' => brace_depth += 1,
                '}' => brace_depth = brace_depth.saturating_sub(1),
                '[' if brace_depth == 0 => depth += 1,
                ']' if brace_depth == 0 => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            script.push(c);
        }
        Ok(script)
    }
}

/// Split `src` into commands, recognizing the substitutions in `flags`.
pub fn parse_script(src: &str, flags: SubstFlags) -> Result<Vec<ParsedCommand>> {
    Tokenizer::new(src, flags, Mode::Script).parse_commands()
}

/// Split a list into its elements.
pub fn split_list(src: &str) -> Result<Vec<String>> {
    let mut tokenizer = Tokenizer::new(src, SubstFlags::BACKSLASHES, Mode::List);
    let mut items = Vec::new();
    loop {
        tokenizer.skip_word_space();
        if tokenizer.peek().is_none() {
            break;
        }
        items.push(tokenizer.parse_word()?.literal());
    }
    tracing::trace!(src = tokenizer.src, count = items.len(), "split list");
    Ok(items)
}

/// Quote `s` so that it reads back as exactly one list element.
pub fn list_element(s: &str) -> String {
    if s.is_empty() {
        return "{}".to_string();
    }

    let special = |c: char| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '[' | ']' | '$' | '"' | '\\');
    if !s.starts_with('#') && !s.chars().any(special) {
        return s.to_string();
    }

    if braces_balanced(s) && !s.ends_with('\\') {
        return format!("{{{s}}}");
    }

    let mut out = String::with_capacity(s.len() + 8);
    for (i, c) in s.chars().enumerate() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '#' if i == 0 => out.push_str("\\#"),
            c if special(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Join `items` into a well-formed list.
pub fn merge_list<S: AsRef<str>>(items: &[S]) -> String {
    items.iter().map(|item| list_element(item.as_ref())).collect::<Vec<_>>().join(" ")
}

fn braces_balanced(s: &str) -> bool {
    let mut depth = 0i64;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
