//! Parser for `if:` predicates and the protected-branch analysis used by the
//! branch-gating rule.

use std::fmt;

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum Tok {
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[regex("<=|>=|<|>")]
    Order,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[regex(r"'([^']|'')*'")]
    Str,
    #[regex(r"-?[0-9]+(\.[0-9]+)?")]
    Num,
    #[regex(r"[A-Za-z_][A-Za-z0-9_-]*(\.[A-Za-z0-9_*-]+|\[[^\]]*\])*")]
    Ident,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Order(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    /// Context path such as `github.ref`.
    Path(String),
    Str(String),
    /// Numbers, booleans and `null`.
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateError {
    pub message: String,
}

impl fmt::Display for PredicateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a predicate, with or without its `${{ }}` wrapper.
pub fn parse(input: &str) -> Result<Expr, PredicateError> {
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix("${{")
        .and_then(|s| s.strip_suffix("}}"))
        .unwrap_or(trimmed);

    let mut tokens = Vec::new();
    let mut lexer = Tok::lexer(inner);
    while let Some(result) = lexer.next() {
        match result {
            Ok(tok) => tokens.push((tok, lexer.slice())),
            Err(()) => {
                return Err(PredicateError {
                    message: format!("unexpected '{}' in predicate", lexer.slice()),
                });
            }
        }
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or()?;
    match parser.peek() {
        None => Ok(expr),
        Some((_, text)) => Err(PredicateError {
            message: format!("unexpected '{}' after expression", text),
        }),
    }
}

/// True when the predicate can only hold on `branch`.
///
/// A conjunction restricts if any conjunct does; a disjunction only if every
/// alternative does. Negations, inequalities and function calls such as
/// `startsWith` never restrict.
pub fn admits_only_branch(input: &str, branch: &str) -> Result<bool, PredicateError> {
    Ok(restricts(&parse(input)?, branch))
}

fn restricts(expr: &Expr, branch: &str) -> bool {
    match expr {
        Expr::Or(alternatives) => alternatives.iter().all(|e| restricts(e, branch)),
        Expr::And(conjuncts) => conjuncts.iter().any(|e| restricts(e, branch)),
        Expr::Eq(lhs, rhs) => branch_equals(lhs, rhs, branch) || branch_equals(rhs, lhs, branch),
        _ => false,
    }
}

fn branch_equals(context: &Expr, literal: &Expr, branch: &str) -> bool {
    let (Expr::Path(path), Expr::Str(value)) = (context, literal) else {
        return false;
    };
    match path.to_ascii_lowercase().as_str() {
        "github.ref" => value.strip_prefix("refs/heads/") == Some(branch),
        "github.ref_name" | "github.base_ref" | "github.event.pull_request.base.ref" => {
            value == branch
        }
        _ => false,
    }
}

struct Parser<'a> {
    tokens: Vec<(Tok, &'a str)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<(Tok, &'a str)> {
        self.tokens.get(self.pos).copied()
    }

    fn eat(&mut self, tok: Tok) -> bool {
        if matches!(self.peek(), Some((t, _)) if t == tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Expr, PredicateError> {
        let mut alternatives = vec![self.and()?];
        while self.eat(Tok::Or) {
            alternatives.push(self.and()?);
        }
        Ok(flatten(alternatives, Expr::Or))
    }

    fn and(&mut self) -> Result<Expr, PredicateError> {
        let mut conjuncts = vec![self.unary()?];
        while self.eat(Tok::And) {
            conjuncts.push(self.unary()?);
        }
        Ok(flatten(conjuncts, Expr::And))
    }

    fn unary(&mut self) -> Result<Expr, PredicateError> {
        if self.eat(Tok::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, PredicateError> {
        let lhs = self.primary()?;
        let ctor: fn(Box<Expr>, Box<Expr>) -> Expr = match self.peek() {
            Some((Tok::Eq, _)) => Expr::Eq,
            Some((Tok::Ne, _)) => Expr::Ne,
            Some((Tok::Order, _)) => Expr::Order,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.primary()?;
        Ok(ctor(Box::new(lhs), Box::new(rhs)))
    }

    fn primary(&mut self) -> Result<Expr, PredicateError> {
        let Some((tok, text)) = self.peek() else {
            return Err(PredicateError {
                message: "predicate ends unexpectedly".into(),
            });
        };
        self.pos += 1;
        match tok {
            Tok::LParen => {
                let inner = self.or()?;
                if !self.eat(Tok::RParen) {
                    return Err(PredicateError {
                        message: "missing ')' in predicate".into(),
                    });
                }
                Ok(inner)
            }
            Tok::Str => Ok(Expr::Str(text[1..text.len() - 1].replace("''", "'"))),
            Tok::Num => Ok(Expr::Literal(text.to_string())),
            Tok::Ident if self.eat(Tok::LParen) => {
                let mut args = Vec::new();
                if !self.eat(Tok::RParen) {
                    loop {
                        args.push(self.or()?);
                        if self.eat(Tok::RParen) {
                            break;
                        }
                        if !self.eat(Tok::Comma) {
                            return Err(PredicateError {
                                message: format!("malformed arguments to '{}'", text),
                            });
                        }
                    }
                }
                Ok(Expr::Call(text.to_string(), args))
            }
            Tok::Ident => match text {
                "true" | "false" | "null" => Ok(Expr::Literal(text.to_string())),
                _ => Ok(Expr::Path(text.to_string())),
            },
            _ => Err(PredicateError {
                message: format!("unexpected '{}' in predicate", text),
            }),
        }
    }
}

fn flatten(mut items: Vec<Expr>, ctor: fn(Vec<Expr>) -> Expr) -> Expr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        ctor(items)
    }
}
