//! Tokenizer for binding recipes.
//!
//! ```
//! # use loadgen_core::bindings::lexer::Token;
//! # use logos::Logos;
//! let tokens: Vec<_> = Token::lexer("Mod(10).ToString()").collect();
//! assert_eq!(tokens.len(), 8);
//! ```

use logos::Logos;
use std::fmt;
use std::ops::Range;

/// Recipe token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    /// Keyword `compose`
    #[token("compose")]
    Compose,
    /// `->`
    #[token("->")]
    Arrow,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,

    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Bool(bool),

    /// Integer literal, optionally suffixed with `L`
    #[regex(r"-?[0-9]+[lL]?", |lex| {
        lex.slice().trim_end_matches(['l', 'L']).parse::<i64>().ok()
    })]
    Integer(i64),

    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    /// Single- or double-quoted string with backslash escapes
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unquote(lex.slice()))]
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Compose => write!(f, "compose"),
            Token::Arrow => write!(f, "->"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Semicolon => write!(f, ";"),
            Token::Bool(b) => write!(f, "{b}"),
            Token::Integer(n) => write!(f, "{n}"),
            Token::Float(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Ident(s) => write!(f, "{s}"),
        }
    }
}

/// Strip the surrounding quotes and resolve escapes. Unknown escapes are
/// kept verbatim so template strings like `'\{'` survive intact.
fn unquote(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Tokenize `source`, returning each token with its byte span, or the byte
/// offset of the first unrecognized input.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, usize> {
    Token::lexer(source)
        .spanned()
        .map(|(token, span)| token.map(|t| (t, span.clone())).map_err(|_| span.start))
        .collect()
}
