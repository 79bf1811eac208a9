//! Structural syntax check over the token stream.
//!
//! Tracks compound commands (`if`/`fi`, loops, `case`/`esac`), subshells,
//! command substitutions and brace groups on a single stack. Reserved words
//! only count in command position, so `echo done` is an ordinary command.

use std::fmt;

use super::lexer::{line_at, tokenize, Spanned, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// One-based line within the script.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    If { then_seen: bool },
    Loop { do_seen: bool },
    Case,
    Paren,
    Subst,
    Brace,
}

impl Frame {
    fn closer(self) -> &'static str {
        match self {
            Frame::If { then_seen: false } => "then",
            Frame::If { then_seen: true } => "fi",
            Frame::Loop { do_seen: false } => "do",
            Frame::Loop { do_seen: true } => "done",
            Frame::Case => "esac",
            Frame::Paren | Frame::Subst => ")",
            Frame::Brace => "}",
        }
    }

    fn opener(self) -> &'static str {
        match self {
            Frame::If { .. } => "if",
            Frame::Loop { .. } => "loop",
            Frame::Case => "case",
            Frame::Paren => "(",
            Frame::Subst => "$(",
            Frame::Brace => "{",
        }
    }
}

struct Checker<'s> {
    source: &'s str,
    stack: Vec<(Frame, usize)>,
    command_start: bool,
    /// Between `case` and its `in`.
    case_subject: bool,
    case_pattern: bool,
}

/// Check that a script is well-formed for a POSIX-family shell.
pub fn check(source: &str) -> Result<(), SyntaxError> {
    let tokens = tokenize(source).map_err(|e| SyntaxError {
        line: line_at(source, e.offset),
        message: e.message,
    })?;

    let mut checker = Checker {
        source,
        stack: Vec::new(),
        command_start: true,
        case_subject: false,
        case_pattern: false,
    };
    for token in &tokens {
        checker.accept(token)?;
    }

    match checker.stack.last() {
        Some(&(frame, line)) => Err(SyntaxError {
            line,
            message: format!(
                "'{}' opened here is never closed with '{}'",
                frame.opener(),
                frame.closer()
            ),
        }),
        None => Ok(()),
    }
}

impl Checker<'_> {
    fn accept(&mut self, tok: &Spanned<'_>) -> Result<(), SyntaxError> {
        if self.case_pattern {
            return self.accept_case_pattern(tok);
        }

        match tok.token {
            Token::Newline
            | Token::Semi
            | Token::AndIf
            | Token::OrIf
            | Token::Pipe
            | Token::Amp => self.command_start = true,
            Token::CaseBreak => {
                self.expect_top(tok, |f| f == Frame::Case)?;
                self.case_pattern = true;
            }
            Token::SubstOpen => {
                self.push(Frame::Subst, tok);
                self.command_start = true;
            }
            Token::LParen => {
                self.push(Frame::Paren, tok);
                self.command_start = true;
            }
            Token::RParen => {
                self.expect_top(tok, |f| matches!(f, Frame::Paren | Frame::Subst))?;
                self.stack.pop();
                self.command_start = false;
            }
            Token::LBrace => {
                self.push(Frame::Brace, tok);
                self.command_start = true;
            }
            Token::RBrace => {
                self.expect_top(tok, |f| f == Frame::Brace)?;
                self.stack.pop();
                self.command_start = false;
            }
            Token::Word if self.case_subject && tok.text == "in" => {
                self.case_subject = false;
                self.case_pattern = true;
            }
            Token::Word if self.command_start => self.accept_command_word(tok)?,
            Token::Comment
            | Token::LineContinuation
            | Token::HereDoc
            | Token::Redirect => {}
            _ => self.command_start = false,
        }
        Ok(())
    }

    fn accept_command_word(&mut self, tok: &Spanned<'_>) -> Result<(), SyntaxError> {
        match tok.text {
            "if" => {
                self.push(Frame::If { then_seen: false }, tok);
            }
            "then" => {
                self.expect_top(tok, |f| f == Frame::If { then_seen: false })?;
                self.set_top(Frame::If { then_seen: true });
            }
            "elif" => {
                self.expect_top(tok, |f| f == Frame::If { then_seen: true })?;
                self.set_top(Frame::If { then_seen: false });
            }
            "else" => {
                self.expect_top(tok, |f| f == Frame::If { then_seen: true })?;
            }
            "fi" => {
                self.expect_top(tok, |f| f == Frame::If { then_seen: true })?;
                self.stack.pop();
                self.command_start = false;
            }
            "for" | "select" => {
                self.push(Frame::Loop { do_seen: false }, tok);
                self.command_start = false;
            }
            "while" | "until" => {
                self.push(Frame::Loop { do_seen: false }, tok);
            }
            "do" => {
                self.expect_top(tok, |f| f == Frame::Loop { do_seen: false })?;
                self.set_top(Frame::Loop { do_seen: true });
            }
            "done" => {
                self.expect_top(tok, |f| f == Frame::Loop { do_seen: true })?;
                self.stack.pop();
                self.command_start = false;
            }
            "case" => {
                self.push(Frame::Case, tok);
                self.case_subject = true;
                self.command_start = false;
            }
            "!" | "time" => {}
            word if is_assignment(word) => {}
            _ => self.command_start = false,
        }
        Ok(())
    }

    /// Inside `case ... in`, until the `)` that ends a pattern list.
    fn accept_case_pattern(&mut self, tok: &Spanned<'_>) -> Result<(), SyntaxError> {
        match tok.token {
            Token::RParen => {
                self.case_pattern = false;
                self.command_start = true;
            }
            Token::Word if tok.text == "esac" => {
                self.expect_top(tok, |f| f == Frame::Case)?;
                self.stack.pop();
                self.case_pattern = false;
                self.command_start = false;
            }
            _ => {}
        }
        Ok(())
    }

    fn top(&self) -> Option<Frame> {
        self.stack.last().map(|&(f, _)| f)
    }

    fn push(&mut self, frame: Frame, tok: &Spanned<'_>) {
        let line = line_at(self.source, tok.span.start);
        self.stack.push((frame, line));
        self.command_start = true;
    }

    fn set_top(&mut self, frame: Frame) {
        if let Some(top) = self.stack.last_mut() {
            top.0 = frame;
        }
        self.command_start = true;
    }

    fn expect_top(
        &mut self,
        tok: &Spanned<'_>,
        accepts: impl Fn(Frame) -> bool,
    ) -> Result<(), SyntaxError> {
        match self.top() {
            Some(frame) if accepts(frame) => {
                self.command_start = true;
                Ok(())
            }
            Some(frame) => Err(self.error(
                tok,
                format!("unexpected '{}', expected '{}'", tok.text, frame.closer()),
            )),
            None => Err(self.error(tok, format!("unexpected '{}'", tok.text))),
        }
    }

    fn error(&self, tok: &Spanned<'_>, message: String) -> SyntaxError {
        SyntaxError {
            line: line_at(self.source, tok.span.start),
            message,
        }
    }
}

fn is_assignment(word: &str) -> bool {
    let Some((name, _)) = word.split_once('=') else {
        return false;
    };
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
