//! Lexer: source text to a flat token stream.
//!
//! String literals are extracted into a side table and replaced by an indexed
//! [`Token::Str`] placeholder, so delimiter characters inside strings are never
//! split. Each of `( ) [ ] ' ` ,` forms a token of its own, `[` and `]` behave as
//! `(` and `)`, `;` comments run to end of line and whitespace only separates.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace1, not_line_ending, one_of},
    combinator::{all_consuming, map, value},
    error::ErrorKind,
    multi::many0,
    number::complete::recognize_float,
    sequence::pair,
};
use std::fmt;

use crate::{Error, ParseError, ParseErrorKind};

/// Characters that always form a token of their own
pub(crate) const DELIMITERS: &str = "()[]'`,";

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `(` or `[`
    Open,
    /// `)` or `]`
    Close,
    /// `'`
    Quote,
    /// Index into the string side table
    Str(usize),
    /// Any other run of characters, including `.`, backquote and comma
    Atom(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
            Token::Quote => write!(f, "'"),
            Token::Str(index) => write!(f, "<string #{index}>"),
            Token::Atom(text) => write!(f, "{text}"),
        }
    }
}

/// Tokens plus the string literal bodies they reference, with a read cursor
#[derive(Debug, Clone, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
    cursor: usize,
    strings: Vec<String>,
}

impl TokenStream {
    fn new(tokens: Vec<Token>, strings: Vec<String>) -> Self {
        TokenStream {
            tokens,
            cursor: 0,
            strings,
        }
    }

    /// Next token without consuming it, `None` at end of stream
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    /// Consume and return the next token, `None` at end of stream
    pub fn pop(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(token)
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    /// Body of an extracted string literal, escapes already decoded
    pub fn string(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

enum Lexeme<'a> {
    Delimiter(char),
    Str(String),
    Atom(&'a str),
}

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && !DELIMITERS.contains(c) && c != '"' && c != ';'
}

/// Whitespace and `;` comments
fn trivia(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(char(';'), not_line_ending)),
        ))),
    )
    .parse(input)
}

fn delimiter(input: &str) -> IResult<&str, Lexeme<'_>> {
    map(one_of(DELIMITERS), Lexeme::Delimiter).parse(input)
}

fn atom(input: &str) -> IResult<&str, Lexeme<'_>> {
    map(take_while1(is_atom_char), Lexeme::Atom).parse(input)
}

/// Scan a string literal, decoding escapes as it goes.
///
/// `\n`, `\t` and `\r` are control characters; any other escaped character
/// stands for itself, which covers `\\` and `\"`. A literal with no closing
/// quote is a hard failure reported at its opening quote.
fn string_literal(input: &str) -> IResult<&str, Lexeme<'_>> {
    let Some(mut remaining) = input.strip_prefix('"') else {
        return Err(nom::Err::Error(nom::error::Error::new(input, ErrorKind::Char)));
    };
    let unterminated = || nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Char));
    let mut text = String::new();

    loop {
        let mut chars = remaining.chars();
        match chars.next() {
            Some('"') => return Ok((chars.as_str(), Lexeme::Str(text))),
            Some('\\') => {
                match chars.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(other) => text.push(other),
                    None => return Err(unterminated()),
                }
                remaining = chars.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = chars.as_str();
            }
            None => return Err(unterminated()),
        }
    }
}

/// Convert nom errors to parse errors positioned in the original source
fn lex_error(source: &str, error: nom::Err<nom::error::Error<&str>>) -> Error {
    match error {
        nom::Err::Failure(e) => {
            let position = source.len().saturating_sub(e.input.len());
            let snippet: String = e.input.chars().take(10).collect();
            Error::ParseError(ParseError::new(
                ParseErrorKind::Incomplete,
                format!("unterminated string literal at position {position}"),
                Some(snippet),
            ))
        }
        nom::Err::Error(e) => {
            let position = source.len().saturating_sub(e.input.len());
            Error::parse(
                ParseErrorKind::InvalidSyntax,
                format!("unexpected character at position {position}"),
            )
        }
        nom::Err::Incomplete(_) => Error::parse(ParseErrorKind::Incomplete, "incomplete input"),
    }
}

/// Split source text into tokens and a string side table
pub fn tokenize(source: &str) -> Result<TokenStream, Error> {
    let mut tokens = Vec::new();
    let mut strings = Vec::new();
    let mut input = source;

    loop {
        let (rest, ()) = trivia(input).map_err(|e| lex_error(source, e))?;
        if rest.is_empty() {
            break;
        }

        let (rest, lexeme) = alt((delimiter, string_literal, atom))
            .parse(rest)
            .map_err(|e| lex_error(source, e))?;

        tokens.push(match lexeme {
            Lexeme::Delimiter('(' | '[') => Token::Open,
            Lexeme::Delimiter(')' | ']') => Token::Close,
            Lexeme::Delimiter('\'') => Token::Quote,
            Lexeme::Delimiter(other) => Token::Atom(other.to_string()),
            Lexeme::Str(text) => {
                strings.push(text);
                Token::Str(strings.len() - 1)
            }
            Lexeme::Atom(text) => Token::Atom(text.to_owned()),
        });
        input = rest;
    }

    Ok(TokenStream::new(tokens, strings))
}

/// Parse an atom as a number if the whole atom is a floating point literal.
///
/// `Infinity` and `-Infinity` (the printed form of infinite numbers) are
/// accepted; other spellings such as `inf` and `nan` stay symbols.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    match text {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    let recognized: IResult<&str, &str> = all_consuming(recognize_float).parse(text);
    recognized.ok().and_then(|(_, literal)| literal.parse().ok())
}
