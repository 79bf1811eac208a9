//! Shell lexer for inline step scripts.
//!
//! Recognizes just enough of POSIX sh / bash to check that quotes, groups and
//! compound commands are balanced. Heredoc bodies are skipped, and
//! `${{ ... }}` template expressions are single tokens because the CI runner
//! substitutes them before the shell ever runs.

use std::ops::Range;

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
pub enum Token {
    #[token("\n")]
    Newline,

    #[token("\\\n")]
    LineContinuation,

    #[token(";;")]
    #[token(";&")]
    #[token(";;&")]
    CaseBreak,

    #[token(";")]
    Semi,

    #[token("&&")]
    AndIf,

    #[token("||")]
    OrIf,

    #[token("|")]
    #[token("|&")]
    Pipe,

    #[token("&")]
    Amp,

    #[token("$(")]
    SubstOpen,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    /// `${{ expr }}`
    #[regex(r"\$\{\{[^}\n]*\}\}")]
    Template,

    /// `${name}` / `${name:-${fallback}}`
    #[token("${", parameter_body)]
    Param,

    #[regex(r"\$[A-Za-z0-9_@*#?$!-]*")]
    Dollar,

    #[regex(r"'[^']*'")]
    SingleQuoted,

    #[regex(r#""([^"\\]|\\[^\n]|\\\n)*""#)]
    DoubleQuoted,

    #[regex(r"`([^`\\]|\\[^\n]|\\\n)*`")]
    Backtick,

    #[regex(r"#[^\n]*")]
    Comment,

    #[regex(r#"<<-?[ \t]*['"]?[A-Za-z_][A-Za-z0-9_]*['"]?"#)]
    HereDoc,

    #[regex(r"[0-9]*(<|>|>>|<&|>&|<>|&>|&>>|>\||<<<)")]
    Redirect,

    #[regex(r"\\[^\n]")]
    Escaped,

    #[regex(r#"[^ \t\r\f\n;&|()<>{}'"`$\\#][^ \t\r\f\n;&|()<>{}'"`$\\]*"#)]
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<'a> {
    pub token: Token,
    pub text: &'a str,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

/// One-based line number of a byte offset.
pub fn line_at(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

/// Consume a parameter expansion up to its matching `}`. Nested expansions
/// and quoted text inside it are skipped over.
fn parameter_body(lex: &mut logos::Lexer<'_, Token>) -> bool {
    let rest = lex.remainder();
    let mut depth = 1usize;
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\'' | '"' => {
                let Some(close) = rest[i + 1..].find(c) else {
                    return false;
                };
                let end = i + 1 + close;
                while chars.next().is_some_and(|(j, _)| j < end) {}
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    lex.bump(i + 1);
                    return true;
                }
            }
            '\n' => return false,
            _ => {}
        }
    }
    false
}

struct PendingHereDoc {
    delimiter: String,
    strip_tabs: bool,
    offset: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned<'_>>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut pending: Vec<PendingHereDoc> = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let text = lexer.slice();
        let token = match result {
            Ok(token) => token,
            Err(()) => return Err(unexpected(source, span.start)),
        };

        match token {
            Token::HereDoc => pending.push(heredoc(text, span.start)),
            Token::Newline if !pending.is_empty() => {
                tokens.push(Spanned { token, text, span });
                for doc in pending.drain(..) {
                    let consumed = heredoc_body_len(lexer.remainder(), &doc).ok_or_else(|| {
                        LexError {
                            offset: doc.offset,
                            message: format!("heredoc '{}' is never terminated", doc.delimiter),
                        }
                    })?;
                    lexer.bump(consumed);
                }
                continue;
            }
            _ => {}
        }

        tokens.push(Spanned { token, text, span });
    }

    if let Some(doc) = pending.first() {
        return Err(LexError {
            offset: doc.offset,
            message: format!("heredoc '{}' is never terminated", doc.delimiter),
        });
    }

    Ok(tokens)
}

fn heredoc(text: &str, offset: usize) -> PendingHereDoc {
    let rest = &text[2..];
    let strip_tabs = rest.starts_with('-');
    let delimiter = rest
        .trim_start_matches('-')
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string();
    PendingHereDoc {
        delimiter,
        strip_tabs,
        offset,
    }
}

/// Bytes up to and including the terminator line, or `None` if the body runs
/// to the end of the script without one.
fn heredoc_body_len(remainder: &str, doc: &PendingHereDoc) -> Option<usize> {
    let mut consumed = 0;
    for line in remainder.split_inclusive('\n') {
        consumed += line.len();
        let mut content = line.trim_end_matches(['\n', '\r']);
        if doc.strip_tabs {
            content = content.trim_start_matches('\t');
        }
        if content == doc.delimiter {
            return Some(consumed);
        }
    }
    None
}

fn unexpected(source: &str, offset: usize) -> LexError {
    let message = match source[offset..].chars().next() {
        Some('\'') => "unterminated single-quoted string".to_string(),
        Some('"') => "unterminated double-quoted string".to_string(),
        Some('`') => "unterminated backtick substitution".to_string(),
        Some('$') => "unterminated parameter expansion".to_string(),
        Some('\\') => "dangling escape at end of script".to_string(),
        Some(c) => format!("unexpected character '{}'", c),
        None => "unexpected end of script".to_string(),
    };
    LexError { offset, message }
}
