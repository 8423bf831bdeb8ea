//! Parsing of a token stream into a [`Command`].

use crate::lexer::{self, Token};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A non-empty piece of text: a command argument or a redirect target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Word(String);

impl Word {
    /// Wrap `content` as a word. Returns `None` for an empty string.
    pub fn new(content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.is_empty() {
            None
        } else {
            Some(Self(content))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of redirection.
///
/// Each kind is spelled by one or more literal operators; see [`RedirectType::symbols`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectType {
    /// `>` or `1>`: standard output to a file, truncating it.
    Output,
    /// `>>` or `1>>`: standard output to a file, appending.
    OutputAppend,
    /// `2>`: standard error to a file, truncating it.
    Error,
    /// `2>>`: standard error to a file, appending.
    ErrorAppend,
    /// `&>`: both output streams to one file, truncating it.
    AllOutput,
    /// `&>>`: both output streams to one file, appending.
    AllAppend,
    /// `<`: standard input from a file.
    Input,
}

impl RedirectType {
    pub const ALL: [RedirectType; 7] = [
        RedirectType::Output,
        RedirectType::OutputAppend,
        RedirectType::Error,
        RedirectType::ErrorAppend,
        RedirectType::AllOutput,
        RedirectType::AllAppend,
        RedirectType::Input,
    ];

    /// Every literal spelling accepted for this kind.
    pub fn symbols(self) -> &'static [&'static str] {
        match self {
            RedirectType::Output => &[">", "1>"],
            RedirectType::OutputAppend => &[">>", "1>>"],
            RedirectType::Error => &["2>"],
            RedirectType::ErrorAppend => &["2>>"],
            RedirectType::AllOutput => &["&>"],
            RedirectType::AllAppend => &["&>>"],
            RedirectType::Input => &["<"],
        }
    }

    /// Whether `text` spells a known redirect operator exactly.
    pub fn is_operator(text: &str) -> bool {
        text.parse::<RedirectType>().is_ok()
    }

    /// Whether `c` may precede `>` as part of the operator (`1>`, `2>`, `&>`).
    pub fn is_prefix(c: char) -> bool {
        matches!(c, '1' | '2' | '&')
    }

    pub fn is_append(self) -> bool {
        matches!(
            self,
            RedirectType::OutputAppend | RedirectType::ErrorAppend | RedirectType::AllAppend
        )
    }
}

impl FromStr for RedirectType {
    type Err = ParseErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RedirectType::ALL
            .into_iter()
            .find(|kind| kind.symbols().iter().any(|sym| *sym == s))
            .ok_or_else(|| ParseErrorKind::UnknownRedirect(s.to_string()))
    }
}

/// A redirect directive: where one or more streams read from or write to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectType,
    pub target: Word,
}

impl Redirect {
    pub fn new(kind: RedirectType, target: Word) -> Self {
        Self { kind, target }
    }
}

/// A simple command: its argument words and redirects, both in input order.
///
/// The first argument is the command name, so `args` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Word>,
    redirects: Vec<Redirect>,
}

impl Command {
    /// Build a command. Returns `None` when `args` is empty.
    pub fn new(args: Vec<Word>, redirects: Vec<Redirect>) -> Option<Self> {
        if args.is_empty() {
            None
        } else {
            Some(Self { args, redirects })
        }
    }

    pub fn name(&self) -> &str {
        self.args[0].as_str()
    }

    /// Arguments following the command name.
    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.args[1..].iter().map(Word::as_str)
    }

    /// The full argument vector, command name included.
    pub fn argv(&self) -> Vec<String> {
        self.args.iter().map(|w| w.as_str().to_string()).collect()
    }

    pub fn redirects(&self) -> &[Redirect] {
        &self.redirects
    }
}

/// What went wrong while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unknown redirect operator: {0}")]
    UnknownRedirect(String),
    #[error("redirect operator {0} requires a target file")]
    MissingTarget(String),
    #[error("redirect target must be a word, got redirect {0}")]
    TargetNotWord(String),
    #[error("command cannot be empty")]
    EmptyCommand,
}

/// A grammar error together with the token position it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
}

struct CommandBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl CommandBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        CommandBuilder { tokens, pos: 0 }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            position: self.pos,
        }
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Parse a command: (word | redirect word)*
    fn build_command(mut self) -> Result<Command, ParseError> {
        let mut args = Vec::new();
        let mut redirects = Vec::new();

        while let Some(token) = self.consume() {
            match token {
                Token::Word(text) => args.extend(Word::new(text)),
                Token::Redirect(op) => redirects.push(self.parse_redirect(op)?),
            }
        }

        Command::new(args, redirects).ok_or_else(|| self.error(ParseErrorKind::EmptyCommand))
    }

    /// Parse the target of a redirect whose operator `op` was just consumed.
    fn parse_redirect(&mut self, op: String) -> Result<Redirect, ParseError> {
        let kind = op.parse::<RedirectType>().map_err(|kind| self.error(kind))?;

        match self.consume() {
            Some(Token::Word(text)) => {
                let target = Word::new(text)
                    .ok_or_else(|| self.error(ParseErrorKind::MissingTarget(op.clone())))?;
                Ok(Redirect::new(kind, target))
            }
            Some(Token::Redirect(next)) => Err(self.error(ParseErrorKind::TargetNotWord(next))),
            None => Err(self.error(ParseErrorKind::MissingTarget(op))),
        }
    }
}

/// Parse a token sequence produced by [`lexer::tokenize`].
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Command, ParseError> {
    CommandBuilder::from(tokens).build_command()
}

/// Tokenize and parse one input line.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let tokens = lexer::tokenize(line.trim());
    log::debug!("tokens: {tokens:?}");
    parse_tokens(tokens)
}
