//! Static analysis of inline shell fragments. Nothing here ever executes a
//! script.

pub mod lexer;
pub mod loops;
pub mod syntax;

pub use syntax::{check, SyntaxError};

use lexer::Token;

/// Shells whose syntax the lexer understands.
const SUPPORTED_SHELLS: &[&str] = &["bash", "sh"];

/// The shell a step runs under: the first word of its `shell:` setting, or
/// `bash` when unset (the runner default).
pub fn dialect(shell: Option<&str>) -> &str {
    shell
        .and_then(|s| s.split_whitespace().next())
        .map(|s| s.rsplit('/').next().unwrap_or(s))
        .unwrap_or("bash")
}

pub fn is_supported(shell: Option<&str>) -> bool {
    SUPPORTED_SHELLS.contains(&dialect(shell))
}

const RESERVED_WORDS: &[&str] = &[
    "if", "then", "elif", "else", "fi", "while", "until", "for", "select", "do", "done", "case",
    "esac", "function", "!", "time",
];

/// One simple command: the reserved words that introduce it and the words
/// that follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCommand<'a> {
    pub keywords: Vec<&'a str>,
    /// Command name first, then arguments, as written.
    pub words: Vec<&'a str>,
    pub line: usize,
}

impl<'a> SimpleCommand<'a> {
    pub fn name(&self) -> Option<&'a str> {
        self.words.first().copied()
    }

    pub fn arg(&self, n: usize) -> Option<&'a str> {
        self.words.get(n + 1).copied()
    }
}

/// Split a script into simple commands at list operators, pipes, newlines
/// and subshell boundaries. Redirections and their targets are not words.
pub fn commands(script: &str) -> Result<Vec<SimpleCommand<'_>>, lexer::LexError> {
    let mut out = Vec::new();
    let mut current: Option<SimpleCommand<'_>> = None;
    let mut redirect_target = false;

    for tok in lexer::tokenize(script)? {
        if std::mem::take(&mut redirect_target)
            && !matches!(tok.token, Token::Newline | Token::Semi | Token::Comment)
        {
            continue;
        }
        match tok.token {
            Token::Newline
            | Token::Semi
            | Token::AndIf
            | Token::OrIf
            | Token::Pipe
            | Token::Amp
            | Token::CaseBreak
            | Token::SubstOpen
            | Token::LParen
            | Token::RParen => out.extend(current.take()),
            Token::Comment | Token::LineContinuation | Token::HereDoc => {}
            Token::Redirect => redirect_target = true,
            _ => {
                let cmd = current.get_or_insert_with(|| SimpleCommand {
                    keywords: vec![],
                    words: vec![],
                    line: lexer::line_at(script, tok.span.start),
                });
                if tok.token == Token::Word
                    && cmd.words.is_empty()
                    && RESERVED_WORDS.contains(&tok.text)
                {
                    cmd.keywords.push(tok.text);
                } else {
                    cmd.words.push(tok.text);
                }
            }
        }
    }
    out.extend(current);
    Ok(out)
}

/// The script with comments and heredoc bodies removed, so text heuristics
/// only see executable code. Runs of blanks collapse to one space; tokens
/// written adjacently stay adjacent. Falls back to the raw text when the
/// script does not lex.
pub fn code_text(script: &str) -> String {
    let Ok(tokens) = lexer::tokenize(script) else {
        return script.to_string();
    };

    let mut out = String::with_capacity(script.len());
    let mut prev_end = 0;
    for tok in tokens {
        // A gap spanning a newline is a skipped heredoc body.
        let gap = &script[prev_end..tok.span.start];
        if !gap.is_empty() && !gap.contains('\n') {
            out.push(' ');
        }
        prev_end = tok.span.end;
        match tok.token {
            Token::Comment => {}
            Token::LineContinuation => out.push(' '),
            _ => out.push_str(tok.text),
        }
    }
    out
}
