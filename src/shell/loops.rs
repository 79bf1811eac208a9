//! Loop structure of a script: each `for`/`while`/`until`/`select` loop,
//! whether it polls, and whether anything bounds its iterations.

use super::lexer::{self, LexError, Token};

/// `test` operators that compare a counter or clock against a limit.
const COUNTER_TESTS: &[&str] = &["-lt", "-le", "-gt", "-ge"];

/// Reserved words after which the next word is again a command name.
const PREFIX_WORDS: &[&str] = &[
    "if", "then", "elif", "else", "while", "until", "do", "!", "time",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellLoop<'a> {
    pub keyword: &'a str,
    pub line: usize,
    /// A `sleep` runs in the condition or the body.
    pub polls: bool,
    /// A finite `for` list, a counter comparison in the condition, or a
    /// comparison in the body that leads to `exit` or `break`.
    pub bounded: bool,
}

#[derive(Debug, Clone, Copy)]
struct Item<'a> {
    token: Token,
    text: &'a str,
    offset: usize,
    /// In command position.
    command: bool,
}

impl Item<'_> {
    fn is_word(&self, word: &str) -> bool {
        self.command && self.token == Token::Word && self.text == word
    }

    fn leaves_loop(&self) -> bool {
        self.command
            && self.token == Token::Word
            && matches!(self.text, "exit" | "break" | "return")
    }
}

fn items(script: &str) -> Result<Vec<Item<'_>>, LexError> {
    let mut out: Vec<Item<'_>> = Vec::new();
    for tok in lexer::tokenize(script)? {
        if matches!(tok.token, Token::Comment | Token::LineContinuation) {
            continue;
        }
        let command = match out.last() {
            None => true,
            Some(prev) => match prev.token {
                Token::Newline
                | Token::Semi
                | Token::AndIf
                | Token::OrIf
                | Token::Pipe
                | Token::Amp
                | Token::CaseBreak
                | Token::LParen
                | Token::SubstOpen
                | Token::LBrace => true,
                Token::Word => prev.command && PREFIX_WORDS.contains(&prev.text),
                _ => false,
            },
        };
        out.push(Item {
            token: tok.token,
            text: tok.text,
            offset: tok.span.start,
            command,
        });
    }
    Ok(out)
}

struct OpenLoop {
    keyword: usize,
    do_at: Option<usize>,
}

/// Every complete loop in the script, in source order.
pub fn analyze(script: &str) -> Result<Vec<ShellLoop<'_>>, LexError> {
    let items = items(script)?;
    let mut open: Vec<OpenLoop> = Vec::new();
    let mut found: Vec<(usize, ShellLoop<'_>)> = Vec::new();

    for (i, item) in items.iter().enumerate() {
        if !(item.command && item.token == Token::Word) {
            continue;
        }
        match item.text {
            "for" | "while" | "until" | "select" => open.push(OpenLoop {
                keyword: i,
                do_at: None,
            }),
            "do" => {
                if let Some(frame) = open.last_mut().filter(|f| f.do_at.is_none()) {
                    frame.do_at = Some(i);
                }
            }
            "done" => {
                if let Some(OpenLoop {
                    keyword,
                    do_at: Some(do_at),
                }) = open.pop()
                {
                    found.push((keyword, shell_loop(script, &items, keyword, do_at, i)));
                }
            }
            _ => {}
        }
    }

    found.sort_by_key(|(keyword, _)| *keyword);
    Ok(found.into_iter().map(|(_, l)| l).collect())
}

fn shell_loop<'a>(
    script: &str,
    items: &[Item<'a>],
    keyword: usize,
    do_at: usize,
    done_at: usize,
) -> ShellLoop<'a> {
    let kind = items[keyword].text;
    let header = &items[keyword + 1..do_at];
    let body = &items[do_at + 1..done_at];

    let guarded = match kind {
        "for" => finite_list(header),
        "select" => false,
        _ => (0..header.len()).any(|i| is_comparison(header, i)),
    };

    ShellLoop {
        keyword: kind,
        line: lexer::line_at(script, items[keyword].offset),
        polls: header.iter().chain(body).any(|t| t.is_word("sleep")),
        bounded: guarded || exits_on_comparison(body),
    }
}

/// `for ((...))`, a literal word list, a brace range or `$(seq ...)`.
fn finite_list(header: &[Item<'_>]) -> bool {
    if header.first().is_some_and(|t| t.token == Token::LParen) {
        return true;
    }
    // `for name; do` walks the positional parameters
    if !header.get(1).is_some_and(|t| t.token == Token::Word && t.text == "in") {
        return true;
    }
    let list: Vec<&Item<'_>> = header[2..]
        .iter()
        .take_while(|t| !matches!(t.token, Token::Semi | Token::Newline))
        .collect();
    match list.as_slice() {
        [open, name, ..] if open.token == Token::SubstOpen => name.text == "seq",
        [one] if one.token == Token::Backtick => {
            one.text.trim_start_matches('`').split_whitespace().next() == Some("seq")
        }
        _ => list.iter().all(|t| is_literal(t)),
    }
}

fn is_literal(item: &Item<'_>) -> bool {
    match item.token {
        Token::Word | Token::SingleQuoted | Token::Escaped | Token::LBrace | Token::RBrace => true,
        Token::DoubleQuoted => !item.text.contains(['$', '`']),
        _ => false,
    }
}

fn is_comparison(items: &[Item<'_>], i: usize) -> bool {
    let item = &items[i];
    match item.token {
        Token::Word => COUNTER_TESTS.contains(&item.text),
        Token::Redirect => matches!(item.text, "<" | ">") && in_test_expression(items, i),
        _ => false,
    }
}

/// Inside `[[ ... ]]` or `(( ... ))`, `<` and `>` compare rather than
/// redirect.
fn in_test_expression(items: &[Item<'_>], i: usize) -> bool {
    let Some(start) = items[..i].iter().rposition(|t| t.command) else {
        return false;
    };
    if items[start].text == "[[" {
        return true;
    }
    start >= 2
        && items[start - 1].token == Token::LParen
        && matches!(items[start - 2].token, Token::LParen | Token::SubstOpen)
}

/// A comparison in the loop body whose outcome leaves the loop, either
/// through an and-or list (`[ "$n" -ge 30 ] && exit 1`) or as the branch of
/// an `if`.
fn exits_on_comparison(body: &[Item<'_>]) -> bool {
    (0..body.len())
        .filter(|&i| is_comparison(body, i))
        .any(|i| list_leaves_loop(body, i) || branch_leaves_loop(body, i))
}

fn list_leaves_loop(body: &[Item<'_>], i: usize) -> bool {
    let mut at = i;
    loop {
        let Some(op) = body[at..]
            .iter()
            .position(|t| {
                matches!(
                    t.token,
                    Token::AndIf | Token::OrIf | Token::Newline | Token::Semi | Token::Amp
                )
            })
            .map(|p| at + p)
        else {
            return false;
        };
        if !matches!(body[op].token, Token::AndIf | Token::OrIf) {
            return false;
        }
        let Some(next) = body[op + 1..]
            .iter()
            .position(|t| t.token != Token::Newline)
            .map(|p| op + 1 + p)
        else {
            return false;
        };
        if body[next].leaves_loop() {
            return true;
        }
        if body[next].token == Token::LBrace
            && body[next..]
                .iter()
                .take_while(|t| t.token != Token::RBrace)
                .any(Item::leaves_loop)
        {
            return true;
        }
        at = next;
    }
}

fn branch_leaves_loop(body: &[Item<'_>], i: usize) -> bool {
    let Some(mut start) = body[..=i].iter().rposition(|t| t.command) else {
        return false;
    };
    while start > 0 && (body[start - 1].is_word("!") || body[start - 1].token == Token::LParen) {
        start -= 1;
    }
    if !(start > 0 && (body[start - 1].is_word("if") || body[start - 1].is_word("elif"))) {
        return false;
    }
    let Some(then) = body[i..].iter().position(|t| t.is_word("then")).map(|p| i + p) else {
        return false;
    };

    let mut depth = 0usize;
    for item in &body[then + 1..] {
        if !(item.command && item.token == Token::Word) {
            continue;
        }
        match item.text {
            "if" => depth += 1,
            "fi" | "else" | "elif" if depth == 0 => return false,
            "fi" => depth -= 1,
            "exit" | "break" | "return" => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(script: &str) -> ShellLoop<'_> {
        let loops = analyze(script).unwrap();
        assert_eq!(loops.len(), 1, "{:#?}", loops);
        loops.into_iter().next().unwrap()
    }

    #[test]
    fn brace_range_and_seq_are_finite() {
        assert!(only("for i in {1..30}; do sleep 1; done\n").bounded);
        assert!(only("for i in $(seq 1 20); do sleep 1; done\n").bounded);
        assert!(only("for i in `seq 5`; do sleep 1; done\n").bounded);
        assert!(only("for ((i = 0; i < 10; i++)); do sleep 1; done\n").bounded);
    }

    #[test]
    fn literal_list_is_finite() {
        assert!(only("for i in 1 2 3 4 5; do\n  sleep 5\ndone\n").bounded);
        assert!(!only("for host in $HOSTS; do\n  sleep 5\ndone\n").bounded);
    }

    #[test]
    fn redirect_is_not_a_comparison() {
        let l = only("until curl -sf \"$URL\" > /dev/null; do sleep 5; done\n");
        assert!(l.polls);
        assert!(!l.bounded);
    }

    #[test]
    fn comparisons_in_the_condition() {
        assert!(only("while [ \"$n\" -lt 10 ]; do sleep 1; done\n").bounded);
        assert!(only("while [[ $n < 10 ]]; do sleep 1; done\n").bounded);
        assert!(only("while (( n < 10 )); do sleep 1; done\n").bounded);
        assert!(!only("while [ \"$status\" != ok ]; do sleep 1; done\n").bounded);
    }

    #[test]
    fn counter_check_in_the_body() {
        let script = "while true; do\n  n=$((n+1))\n  [ \"$n\" -ge 30 ] && exit 1\n  sleep 2\ndone\n";
        assert!(only(script).bounded);

        let script = "while :; do\n  if [ $SECONDS -gt 300 ]; then\n    echo timed out\n    exit 1\n  fi\n  sleep 2\ndone\n";
        assert!(only(script).bounded);

        let script = "while :; do\n  [ $n -gt 3 ] && echo many\n  sleep 2\ndone\n";
        assert!(!only(script).bounded);
    }

    #[test]
    fn nested_loops_in_source_order() {
        let loops = analyze("for i in 1 2; do\n  while true; do sleep 1; done\ndone\n").unwrap();
        let kinds: Vec<&str> = loops.iter().map(|l| l.keyword).collect();
        assert_eq!(kinds, vec!["for", "while"]);
        assert!(loops[0].polls);
        assert!(!loops[1].bounded);
    }

    #[test]
    fn loop_words_as_arguments_are_ignored() {
        assert!(analyze("echo while do done\n").unwrap().is_empty());
    }
}
