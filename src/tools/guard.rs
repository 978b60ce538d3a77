//! Query guard for the SQL tool.
//!
//! A syntactic allow-list: one statement, starting with SELECT, SHOW or
//! DESCRIBE, no longer than `MAX_SQL_LENGTH` characters. Everything that
//! reaches the warehouse goes through [`validate`], which is the only way to
//! obtain a [`QueryRequest`].
//!
//! Statement boundaries come from the sqlparser tokenizer, not from a parse,
//! so Databricks syntax sqlparser does not model still passes. Lexical forms
//! the tokenizer cannot split the way the warehouse does (prefixed literals,
//! nested comments, continued line comments) are refused outright. A SELECT
//! calling a side-effecting function is not detected.

use crate::error::{DbxError, DbxResult};
use crate::models::{MAX_SQL_LENGTH, QueryRequest, StatementKind};
use sqlparser::dialect::Dialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

/// Maximum length of a table reference accepted by `describe_table`.
pub const MAX_TABLE_NAME_LENGTH: usize = 256;

/// String and identifier quoting as the SQL warehouse lexes it: backslash
/// escapes in both quote styles, backtick identifiers, no `#` comments.
#[derive(Debug, Default)]
struct WarehouseDialect;

impl Dialect for WarehouseDialect {
    fn is_identifier_start(&self, ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    fn is_identifier_part(&self, ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_'
    }

    fn is_delimited_identifier_start(&self, ch: char) -> bool {
        ch == '`'
    }

    fn supports_string_literal_backslash_escape(&self) -> bool {
        true
    }
}

/// Validate a SQL string and turn it into an executable request.
///
/// Checks run in order: length, emptiness, lexical form and statement count,
/// leading keyword. Any tokenizer error is a refusal.
pub fn validate(sql: &str) -> DbxResult<QueryRequest> {
    if sql.chars().count() > MAX_SQL_LENGTH {
        return Err(DbxError::query_rejected(format!(
            "Query too long. Please limit queries to {} characters.",
            group_thousands(MAX_SQL_LENGTH)
        )));
    }

    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(empty_query());
    }

    let tokens = Tokenizer::new(&WarehouseDialect, trimmed)
        .with_unescape(false)
        .tokenize()
        .map_err(|e| {
            DbxError::query_rejected(format!(
                "Could not read the query: {}. Check for unterminated quotes or comments.",
                e
            ))
        })?;
    check_lexical_forms(&tokens)?;

    let statement = single_statement(trimmed, &tokens)?;
    if statement.is_empty() {
        return Err(empty_query());
    }

    let keyword = leading_keyword(statement);
    match StatementKind::from_keyword(&keyword) {
        Some(kind) => Ok(QueryRequest::validated(statement.to_string(), kind)),
        None => Err(DbxError::query_rejected(format!(
            "Only SELECT, SHOW, and DESCRIBE statements are allowed. Detected: {}",
            keyword
        ))),
    }
}

/// Validate a table reference such as `catalog.schema.table`.
///
/// Only ASCII alphanumerics, `_`, `.`, `-` and backticks are accepted, which
/// keeps the name from carrying anything but an identifier into SQL.
pub fn validate_table_name(name: &str) -> DbxResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DbxError::invalid_input("table_name must not be empty"));
    }
    if name.chars().count() > MAX_TABLE_NAME_LENGTH {
        return Err(DbxError::invalid_input(format!(
            "table_name exceeds {} characters",
            MAX_TABLE_NAME_LENGTH
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '`')))
    {
        return Err(DbxError::invalid_input(format!(
            "table_name contains invalid character '{}'",
            bad
        )));
    }
    Ok(name)
}

fn empty_query() -> DbxError {
    DbxError::query_rejected("Empty query. Provide a SELECT, SHOW, or DESCRIBE statement.")
}

fn prefixed_literal() -> DbxError {
    DbxError::query_rejected(
        "Prefixed string literals such as r'...' or X'...' are not supported. Use a plain quoted string.",
    )
}

/// Refuse token shapes whose extent the warehouse lexes differently.
///
/// Raw strings (`r'C:\'`) end at the first quote on the warehouse but look
/// like a word followed by an escaped string here, so a quoted literal glued
/// to a preceding word is refused along with every prefixed literal kind.
fn check_lexical_forms(tokens: &[Token]) -> DbxResult<()> {
    let mut previous: Option<&Token> = None;
    for token in tokens {
        match token {
            Token::SingleQuotedString(_) | Token::DoubleQuotedString(_) => {
                if matches!(previous, Some(Token::Word(w)) if w.quote_style.is_none()) {
                    return Err(prefixed_literal());
                }
            }
            Token::DollarQuotedString(_) => return Err(prefixed_literal()),
            Token::Whitespace(Whitespace::MultiLineComment(body)) => {
                if body.contains("/*") {
                    return Err(DbxError::query_rejected(
                        "Nested block comments are not supported.",
                    ));
                }
                if let Some(hint) = body.strip_prefix('+') {
                    check_hint(hint)?;
                }
            }
            Token::Whitespace(Whitespace::SingleLineComment { comment, .. }) => {
                if comment.trim_end_matches(['\r', '\n']).ends_with('\\') {
                    return Err(DbxError::query_rejected(
                        "Line comments must not end with a backslash.",
                    ));
                }
            }
            Token::Word(_) => {}
            other => {
                // X'..', N'..' and friends render with their prefix
                let text = other.to_string();
                if text.starts_with(|c: char| c.is_ascii_alphabetic())
                    && text.contains(['\'', '"'])
                {
                    return Err(prefixed_literal());
                }
            }
        }
        previous = Some(token);
    }
    Ok(())
}

/// Hint bodies (`/*+ ... */`) are lexed as code by the warehouse.
fn check_hint(hint: &str) -> DbxResult<()> {
    let plain = hint.chars().all(|c| {
        c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '_' | ',' | '(' | ')' | '.')
    });
    if plain {
        Ok(())
    } else {
        Err(DbxError::query_rejected(
            "Query hints may only contain hint names, identifiers and commas.",
        ))
    }
}

/// Strip trailing `;` and reject anything that would run a second statement.
fn single_statement<'a>(sql: &'a str, tokens: &[Token]) -> DbxResult<&'a str> {
    let Some(first) = tokens.iter().position(|t| matches!(t, Token::SemiColon)) else {
        return Ok(sql);
    };
    let only_terminators = tokens[first..].iter().all(|t| {
        matches!(
            t,
            Token::SemiColon
                | Token::Whitespace(Whitespace::Space | Whitespace::Newline | Whitespace::Tab)
        )
    });
    if only_terminators {
        Ok(sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace()))
    } else {
        Err(DbxError::query_rejected(
            "Multiple statements are not allowed. Submit one statement at a time.",
        ))
    }
}

/// The leading keyword, upper-cased.
///
/// Falls back to the first whitespace-delimited token when the statement does
/// not start with a word character, so the rejection message still names it.
fn leading_keyword(sql: &str) -> String {
    let word: String = sql
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if !word.is_empty() {
        return word.to_ascii_uppercase();
    }
    sql.split_whitespace()
        .next()
        .map(|t| t.chars().take(32).collect::<String>().to_uppercase())
        .unwrap_or_default()
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
