//! Comment stripping (§4.1) and tokenization feeding the recursive-descent
//! parser (§4.2).

use std::{collections::BTreeMap, rc::Rc};

use crate::error::{Error, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    None,
    Slash,
    Line,
    Multi,
    Star,
    Quote,
    Back,
}

/// Strips comments from `src`, replacing every comment byte with a space so
/// that line/column numbers of surviving tokens are unaffected. Returns the
/// blanked text and a map from 1-indexed line number to the doc-comment text
/// ending on that line (only `//...` and `/**...*/` are retained; adjacent
/// `///`-style line comments on consecutive lines coalesce).
pub fn strip_comments(src: &str, filename: &Rc<str>) -> Result<(String, BTreeMap<u32, String>), Error> {
    let mut out = String::with_capacity(src.len());
    // Raw `///` doc-line text keyed by the line it appeared on; coalesced
    // into `docs` (keyed by the line the run ends on) in a second pass.
    let mut raw_line_docs: BTreeMap<u32, String> = BTreeMap::new();
    let mut docs: BTreeMap<u32, String> = BTreeMap::new();
    let mut state = ScanState::None;
    let mut line: u32 = 1;
    let mut doc_buf: Option<(bool, String)> = None; // (is_doc, text)
    let mut quote_open_line: u32 = 0;
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match state {
            ScanState::None => match c {
                '/' => {
                    state = ScanState::Slash;
                    out.push(' ');
                }
                '"' => {
                    state = ScanState::Quote;
                    quote_open_line = line;
                    out.push(c);
                }
                '\n' => {
                    out.push('\n');
                    line += 1;
                }
                _ => out.push(c),
            },
            ScanState::Slash => match c {
                '/' => {
                    state = ScanState::Line;
                    out.push(' ');
                }
                '*' => {
                    state = ScanState::Multi;
                    out.push(' ');
                }
                _ => {
                    // not actually a comment: emit the deferred '/' as code.
                    out.push('/');
                    state = ScanState::None;
                    continue;
                }
            },
            ScanState::Line => {
                if c == '\n' {
                    if let Some((true, text)) = doc_buf.take() {
                        raw_line_docs.insert(line, text.trim().to_owned());
                    }
                    out.push('\n');
                    line += 1;
                    state = ScanState::None;
                } else {
                    if doc_buf.is_none() {
                        // `///` (one extra slash) marks a doc comment; ordinary `//` does not.
                        let is_doc = c == '/';
                        doc_buf = Some((is_doc, String::new()));
                        if is_doc {
                            i += 1;
                            out.push(' ');
                            continue;
                        }
                    }
                    if let Some((true, text)) = &mut doc_buf {
                        text.push(c);
                    }
                    out.push(' ');
                }
            }
            ScanState::Multi => {
                if c == '*' {
                    state = ScanState::Star;
                    out.push(' ');
                } else {
                    if doc_buf.is_none() {
                        doc_buf = Some((false, String::new()));
                    }
                    if let Some((_, text)) = &mut doc_buf {
                        text.push(c);
                    }
                    if c == '\n' {
                        out.push('\n');
                        line += 1;
                    } else {
                        out.push(' ');
                    }
                }
            }
            ScanState::Star => {
                if c == '/' {
                    // A doc block comment is `/**...*/`; detect it retroactively
                    // by checking whether the buffered text started with `*`.
                    if let Some((_, text)) = doc_buf.take() {
                        if let Some(rest) = text.strip_prefix('*') {
                            docs.insert(line, rest.trim().to_owned());
                        }
                    }
                    state = ScanState::None;
                    out.push(' ');
                } else if c == '\n' {
                    if let Some((_, text)) = &mut doc_buf {
                        text.push('*');
                    }
                    out.push('\n');
                    line += 1;
                    state = ScanState::Multi;
                } else {
                    if let Some((_, text)) = &mut doc_buf {
                        text.push('*');
                        text.push(c);
                    }
                    out.push(' ');
                    state = ScanState::Multi;
                }
            }
            ScanState::Quote => match c {
                '\\' => {
                    state = ScanState::Back;
                    out.push(c);
                }
                '"' => {
                    state = ScanState::None;
                    out.push(c);
                }
                '\n' => {
                    return Err(Error::parse(
                        "unterminated string literal",
                        SourceSpan::new(filename.clone(), quote_open_line, 1),
                        None,
                    ));
                }
                _ => out.push(c),
            },
            ScanState::Back => {
                out.push(c);
                state = ScanState::Quote;
            }
        }
        i += 1;
    }

    if state == ScanState::Quote || state == ScanState::Back {
        return Err(Error::parse(
            "unterminated string literal",
            SourceSpan::new(filename.clone(), quote_open_line, 1),
            None,
        ));
    }
    // A trailing `///` line with no final newline never hit the `\n` arm above.
    if let Some((true, text)) = doc_buf.take() {
        raw_line_docs.insert(line, text.trim().to_owned());
    }

    // Coalesce runs of doc-line comments on consecutive source lines into a
    // single entry keyed by the line the run ends on (§4.1).
    let mut pending: Option<(u32, String)> = None;
    for (&doc_line, text) in &raw_line_docs {
        match pending.take() {
            Some((prev_line, mut acc)) if doc_line == prev_line + 1 => {
                acc.push('\n');
                acc.push_str(text);
                pending = Some((doc_line, acc));
            }
            Some((prev_line, acc)) => {
                docs.insert(prev_line, acc);
                pending = Some((doc_line, text.clone()));
            }
            None => pending = Some((doc_line, text.clone())),
        }
    }
    if let Some((line, acc)) = pending {
        docs.insert(line, acc);
    }

    Ok((out, docs))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokKind {
    Ident,
    Number,
    HexNumber,
    StringLit,
    HexStringLit,
    Symbol,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// Tokenizes already comment-stripped source (CR is dropped per §6 "CR is
/// stripped").
pub fn tokenize(src: &str, filename: &Rc<str>) -> Result<Vec<Token>, Error> {
    let chars: Vec<char> = src.chars().filter(|c| *c != '\r').collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    let mut line = 1u32;
    let mut col = 1u32;

    macro_rules! push {
        ($kind:expr, $text:expr, $line:expr, $col:expr) => {
            tokens.push(Token {
                kind: $kind,
                text: $text,
                line: $line,
                column: $col,
            })
        };
    }

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            col = 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            col += 1;
            continue;
        }
        let start_line = line;
        let start_col = col;
        if c == '"' {
            let mut text = String::from("\"");
            i += 1;
            col += 1;
            while i < chars.len() && chars[i] != '"' {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    text.push(chars[i]);
                    text.push(chars[i + 1]);
                    i += 2;
                    col += 2;
                } else {
                    text.push(chars[i]);
                    i += 1;
                    col += 1;
                }
            }
            if i >= chars.len() {
                return Err(Error::parse(
                    "unterminated string literal",
                    SourceSpan::new(filename.clone(), start_line, start_col),
                    None,
                ));
            }
            text.push('"');
            i += 1;
            col += 1;
            push!(TokKind::StringLit, text, start_line, start_col);
            continue;
        }
        if is_ident_start(c) {
            let mut text = String::new();
            while i < chars.len() && is_ident_continue(chars[i]) {
                text.push(chars[i]);
                i += 1;
                col += 1;
            }
            // `hex"..."` special-cased after the word is read; `0x...` never
            // reaches this branch since digits aren't `is_ident_start`.
            if (text == "hex") && i < chars.len() && chars[i] == '"' {
                let mut lit = String::from("hex\"");
                i += 1;
                col += 1;
                while i < chars.len() && chars[i] != '"' {
                    lit.push(chars[i]);
                    i += 1;
                    col += 1;
                }
                if i >= chars.len() {
                    return Err(Error::parse(
                        "unterminated hex string literal",
                        SourceSpan::new(filename.clone(), start_line, start_col),
                        None,
                    ));
                }
                lit.push('"');
                i += 1;
                col += 1;
                push!(TokKind::HexStringLit, lit, start_line, start_col);
                continue;
            }
            push!(TokKind::Ident, text, start_line, start_col);
            continue;
        }
        if c.is_ascii_digit() {
            if c == '0' && i + 1 < chars.len() && (chars[i + 1] == 'x' || chars[i + 1] == 'X') {
                let mut text = String::from("0x");
                i += 2;
                col += 2;
                while i < chars.len() && (chars[i].is_ascii_hexdigit() || chars[i] == '_') {
                    text.push(chars[i]);
                    i += 1;
                    col += 1;
                }
                push!(TokKind::HexNumber, text, start_line, start_col);
                continue;
            }
            let mut text = String::new();
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                text.push(chars[i]);
                i += 1;
                col += 1;
            }
            push!(TokKind::Number, text, start_line, start_col);
            continue;
        }
        // multi-char symbols
        let two: Option<&str> = if i + 1 < chars.len() {
            match (chars[i], chars[i + 1]) {
                (':', '=') => Some(":="),
                ('|', '=') => Some("|="),
                ('-', '>') => Some("->"),
                _ => None,
            }
        } else {
            None
        };
        if let Some(sym) = two {
            push!(TokKind::Symbol, sym.to_owned(), start_line, start_col);
            i += 2;
            col += 2;
            continue;
        }
        push!(TokKind::Symbol, c.to_string(), start_line, start_col);
        i += 1;
        col += 1;
    }
    tokens.push(Token {
        kind: TokKind::Eof,
        text: String::new(),
        line,
        column: col,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_comments_are_dropped_doc_comments_retained() {
        let filename: Rc<str> = Rc::from("t.yulx");
        let src = "// plain\n/// doc one\nlet x := 1\n/** block doc */\nlet y := 2\n";
        let (code, docs) = strip_comments(src, &filename).unwrap();
        assert!(!code.contains("plain"));
        assert_eq!(docs.get(&2).map(String::as_str), Some("doc one"));
        assert_eq!(docs.get(&4).map(String::as_str), Some("block doc"));
        assert!(docs.get(&1).is_none());
    }

    #[test]
    fn adjacent_doc_lines_coalesce() {
        let filename: Rc<str> = Rc::from("t.yulx");
        let src = "/// line one\n/// line two\nlet x := 1\n";
        let (_, docs) = strip_comments(src, &filename).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs.get(&2).unwrap(), "line one\nline two");
    }

    #[test]
    fn unterminated_string_fails_with_opening_line() {
        let filename: Rc<str> = Rc::from("t.yulx");
        let src = "let x := \"unterminated\nlet y := 2\n";
        let err = strip_comments(src, &filename).unwrap_err();
        match err {
            Error::Parse { at, .. } => assert_eq!(at.line, 1),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn tokenizes_hex_and_decimal_numbers() {
        let filename: Rc<str> = Rc::from("t.yulx");
        let toks = tokenize("let x := 0xFF\nlet y := 42", &filename).unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind.clone()).collect();
        assert!(kinds.contains(&TokKind::HexNumber));
        assert!(kinds.contains(&TokKind::Number));
    }

    #[test]
    fn tokenizes_walrus_and_or_assign() {
        let filename: Rc<str> = Rc::from("t.yulx");
        let toks = tokenize("x := 1 y |= 2", &filename).unwrap();
        let symbols: Vec<_> = toks.iter().filter(|t| t.kind == TokKind::Symbol).map(|t| t.text.clone()).collect();
        assert!(symbols.contains(&":=".to_owned()));
        assert!(symbols.contains(&"|=".to_owned()));
    }
}
