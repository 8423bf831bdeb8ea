//! Lexical analysis of a single input line.
//!
//! The lexer is a four-state finite state machine. Every state is a plain
//! enum variant and every transition is a function of the current character
//! and a shared [`ScanContext`]. Lexing never fails: malformed input simply
//! degenerates into best-effort tokens and the parser decides what is valid.

use crate::parser::RedirectType;

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text with quotes and escapes already resolved. Never empty.
    Word(String),
    /// The literal spelling of a redirect operator, e.g. `>>` or `2>`.
    Redirect(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Redirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
    Redirect,
}

/// Characters that lose their special meaning when escaped inside double quotes.
const DOUBLE_QUOTE_ESCAPABLE: &[char] = &['"', '\\', '`', '$', '\n'];

/// Mutable state shared by all lexer states for the duration of one line.
#[derive(Debug, Default)]
struct ScanContext {
    tokens: Vec<Token>,
    buffer: String,
    escaped: bool,
}

impl ScanContext {
    fn push(&mut self, ch: char) {
        self.buffer.push(ch);
    }

    /// Emit the pending buffer as a token of the given kind, unless it is empty.
    fn save_if_not_empty(&mut self, kind: TokenKind) {
        if self.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buffer);
        self.tokens.push(match kind {
            TokenKind::Word => Token::Word(text),
            TokenKind::Redirect => Token::Redirect(text),
        });
    }
}

impl LexingState {
    fn process(self, ch: char, ctx: &mut ScanContext) -> LexingState {
        match self {
            LexingState::Unquoted => handle_unquoted(ch, ctx),
            LexingState::SingleQuoted => handle_single_quoted(ch, ctx),
            LexingState::DoubleQuoted => handle_double_quoted(ch, ctx),
            LexingState::Redirect => handle_redirect(ch, ctx),
        }
    }

    /// Flush whatever the state was still collecting once input runs out.
    ///
    /// Unterminated quotes keep what they collected instead of dropping it.
    fn finalise(self, ctx: &mut ScanContext) {
        match self {
            LexingState::Redirect => ctx.save_if_not_empty(TokenKind::Redirect),
            _ => ctx.save_if_not_empty(TokenKind::Word),
        }
    }
}

fn handle_unquoted(ch: char, ctx: &mut ScanContext) -> LexingState {
    if ctx.escaped {
        ctx.push(ch);
        ctx.escaped = false;
        return LexingState::Unquoted;
    }

    match ch {
        '\'' => LexingState::SingleQuoted,
        '"' => LexingState::DoubleQuoted,
        '\\' => {
            ctx.escaped = true;
            LexingState::Unquoted
        }
        ' ' => {
            ctx.save_if_not_empty(TokenKind::Word);
            LexingState::Unquoted
        }
        '<' => {
            ctx.save_if_not_empty(TokenKind::Word);
            ctx.push(ch);
            ctx.save_if_not_empty(TokenKind::Redirect);
            LexingState::Unquoted
        }
        '>' => begin_redirect(ch, ctx),
        c => {
            ctx.push(c);
            LexingState::Unquoted
        }
    }
}

/// Decide whether the pending word is a file-descriptor prefix (`1`, `2`, `&`)
/// that belongs to the operator starting at `ch`, or a word of its own.
fn begin_redirect(ch: char, ctx: &mut ScanContext) -> LexingState {
    let mut pending = ctx.buffer.chars();
    let is_prefix = match (pending.next(), pending.next()) {
        (None, _) => true,
        (Some(c), None) => RedirectType::is_prefix(c),
        _ => false,
    };

    if !is_prefix {
        ctx.save_if_not_empty(TokenKind::Word);
    }
    ctx.push(ch);
    LexingState::Redirect
}

fn handle_single_quoted(ch: char, ctx: &mut ScanContext) -> LexingState {
    match ch {
        '\'' => LexingState::Unquoted,
        c => {
            ctx.push(c);
            LexingState::SingleQuoted
        }
    }
}

fn handle_double_quoted(ch: char, ctx: &mut ScanContext) -> LexingState {
    if ctx.escaped {
        ctx.escaped = false;
        if !DOUBLE_QUOTE_ESCAPABLE.contains(&ch) {
            ctx.push('\\');
        }
        ctx.push(ch);
        return LexingState::DoubleQuoted;
    }

    match ch {
        '"' => LexingState::Unquoted,
        '\\' => {
            ctx.escaped = true;
            LexingState::DoubleQuoted
        }
        c => {
            ctx.push(c);
            LexingState::DoubleQuoted
        }
    }
}

/// Grow the operator while it still spells a known redirect, otherwise emit it
/// and hand the character back to the unquoted rules.
fn handle_redirect(ch: char, ctx: &mut ScanContext) -> LexingState {
    let mut candidate = ctx.buffer.clone();
    candidate.push(ch);
    if RedirectType::is_operator(&candidate) {
        ctx.buffer = candidate;
        return LexingState::Redirect;
    }

    ctx.save_if_not_empty(TokenKind::Redirect);
    handle_unquoted(ch, ctx)
}

/// Split one input line into words and redirect operators.
///
/// Quotes are resolved, escapes applied, and redirect operators separated from
/// the words around them. Empty words are never produced, so `''` on its own
/// yields nothing.
pub fn tokenize(line: &str) -> Vec<Token> {
    let mut ctx = ScanContext::default();
    let mut state = LexingState::Unquoted;

    for ch in line.chars() {
        state = state.process(ch, &mut ctx);
    }
    state.finalise(&mut ctx);

    ctx.tokens
}
