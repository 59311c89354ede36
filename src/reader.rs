//! Reader: token stream to [`Value`] trees.
//!
//! Each call to [`parse`] consumes exactly one datum, so a driver can call it
//! repeatedly to read several top-level forms from one stream. Lists are built
//! from fresh pairs, `(a . b)` produces a dotted tail and `'x` reads as
//! `(quote x)`. Atoms that are entirely a floating point literal become numbers;
//! every other atom, including `true`, `false` and `nil`, is a symbol.

use crate::ast::{Value, sym};
use crate::lexer::{Token, TokenStream, parse_number, tokenize};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

fn expected_close(found: Option<&Token>) -> Error {
    match found {
        None => Error::parse(ParseErrorKind::Incomplete, "expected ')'"),
        Some(token) => Error::ParseError(ParseError::new(
            ParseErrorKind::InvalidSyntax,
            "expected ')'",
            Some(token.to_string()),
        )),
    }
}

fn unexpected(token: &Token) -> Error {
    Error::ParseError(ParseError::new(
        ParseErrorKind::InvalidSyntax,
        format!("unexpected '{token}'"),
        Some(token.to_string()),
    ))
}

/// Read one datum from the stream
pub fn parse(tokens: &mut TokenStream) -> Result<Value, Error> {
    parse_datum(tokens, 0)
}

fn parse_datum(tokens: &mut TokenStream, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(Error::parse(
            ParseErrorKind::TooDeeplyNested,
            format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        ));
    }

    match tokens.pop() {
        None => Err(Error::parse(
            ParseErrorKind::Incomplete,
            "unexpected end of input",
        )),
        Some(Token::Open) => parse_list(tokens, depth + 1),
        Some(Token::Quote) => {
            let quoted = parse_datum(tokens, depth + 1)?;
            Ok(Value::list([sym("quote"), quoted]))
        }
        Some(Token::Str(index)) => tokens
            .string(index)
            .map(Value::string)
            .ok_or_else(|| Error::parse(ParseErrorKind::InvalidSyntax, "dangling string index")),
        Some(Token::Atom(text)) if text == "." => Err(unexpected(&Token::Atom(text))),
        Some(Token::Atom(text)) => Ok(atom_value(&text)),
        Some(token @ Token::Close) => Err(unexpected(&token)),
    }
}

/// Read list elements after the opening paren, up to and including the closing one
fn parse_list(tokens: &mut TokenStream, depth: usize) -> Result<Value, Error> {
    let mut items = Vec::new();

    loop {
        match tokens.peek() {
            None => return Err(expected_close(None)),
            Some(Token::Close) => {
                tokens.pop();
                return Ok(Value::list(items));
            }
            Some(Token::Atom(text)) if text == "." => {
                if items.is_empty() {
                    return Err(unexpected(&Token::Atom(".".into())));
                }
                tokens.pop();
                if tokens.is_at_end() {
                    return Err(expected_close(None));
                }
                let tail = parse_datum(tokens, depth)?;
                return match tokens.pop() {
                    Some(Token::Close) => Ok(Value::list_with_tail(items, tail)),
                    other => Err(expected_close(other.as_ref())),
                };
            }
            Some(_) => items.push(parse_datum(tokens, depth)?),
        }
    }
}

fn atom_value(text: &str) -> Value {
    match parse_number(text) {
        Some(n) => Value::Number(n),
        None => Value::symbol(text),
    }
}

/// Read the first datum of a source string
pub fn read_str(source: &str) -> Result<Value, Error> {
    let mut tokens = tokenize(source)?;
    parse(&mut tokens)
}

/// Read every datum of a source string
pub fn read_all(source: &str) -> Result<Vec<Value>, Error> {
    let mut tokens = tokenize(source)?;
    let mut forms = Vec::new();
    while !tokens.is_at_end() {
        forms.push(parse(&mut tokens)?);
    }
    Ok(forms)
}
