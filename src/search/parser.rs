// src/search/parser.rs

//! Query text parsing
//!
//! Grammar:
//! ```text
//! query  := clause ("and" clause)*
//! clause := field "=" value
//! value  := word | '"' any-but-quote* '"'
//! ```

use super::Predicate;
use crate::error::{Error, Result};
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Eq,
}

/// Parse a query into its conjunction of predicates
pub fn parse(query: &str) -> Result<Vec<Predicate>> {
    let tokens = tokenize(query)?;
    if tokens.is_empty() {
        return Err(Error::Search("empty query".to_string()));
    }

    let mut predicates = Vec::new();
    let mut iter = tokens.into_iter();

    loop {
        let field = match iter.next() {
            Some(Token::Word(field)) => field,
            Some(other) => {
                return Err(Error::Search(format!("expected field name, found {other:?}")));
            }
            None => return Err(Error::Search("query ends after 'and'".to_string())),
        };

        if iter.next() != Some(Token::Eq) {
            return Err(Error::Search(format!("expected '=' after '{field}'")));
        }

        let value = match iter.next() {
            Some(Token::Word(value)) | Some(Token::Quoted(value)) => value,
            _ => return Err(Error::Search(format!("missing value for '{field}'"))),
        };

        predicates.push(Predicate::from_field(&field, &value)?);

        match iter.next() {
            None => break,
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("and") => continue,
            Some(other) => {
                return Err(Error::Search(format!("expected 'and', found {other:?}")));
            }
        }
    }

    Ok(predicates)
}

fn tokenize(query: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = query.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '"' => {
                chars.next();
                tokens.push(Token::Quoted(quoted(&mut chars)?));
            }
            _ => tokens.push(Token::Word(word(&mut chars))),
        }
    }

    Ok(tokens)
}

fn quoted(chars: &mut Peekable<Chars<'_>>) -> Result<String> {
    let mut value = String::new();
    for c in chars.by_ref() {
        if c == '"' {
            return Ok(value);
        }
        value.push(c);
    }
    Err(Error::Search("unterminated quoted value".to_string()))
}

fn word(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut value = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == '=' || c == '"' {
            break;
        }
        value.push(c);
        chars.next();
    }
    value
}
