//! # Query Execution
//!
//! Runs generated SQL against the configured storage provider. Only read-only
//! statements are sent; every failure is turned into a formatted message and no
//! partial result is ever returned.

use crate::{errors::PromptError, providers::db::storage::Storage, types::ResultSet};
use tracing::{error, info};

/// The outcome of one execution. Exactly one of the fields is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub result: Option<ResultSet>,
    pub error: Option<String>,
}

/// The parts of a statement that decide what it does. Literals, quoted
/// identifiers and comments are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Semicolon,
}

/// Skips past the `close` that ends a quoted section; a doubled quote is part of it.
fn skip_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, close: char) {
    while let Some(c) = chars.next() {
        if c == close {
            if close != ']' && chars.peek() == Some(&close) {
                chars.next();
                continue;
            }
            return;
        }
    }
}

fn tokenize(sql: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            '\'' | '"' | '`' => skip_quoted(&mut chars, c),
            '[' => skip_quoted(&mut chars, ']'),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            ';' => tokens.push(Token::Semicolon),
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = c.to_string();
                while let Some(&next) = chars.peek() {
                    if !(next.is_alphanumeric() || next == '_' || next == '$') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(Token::Word(word.to_ascii_uppercase()));
            }
            _ => {}
        }
    }
    tokens
}

/// Keywords that start the main statement after a `WITH` clause.
const MAIN_STATEMENT_KEYWORDS: [&str; 6] =
    ["SELECT", "VALUES", "INSERT", "UPDATE", "DELETE", "REPLACE"];

/// True for a single `SELECT` statement, or a `WITH` clause whose main
/// statement is a `SELECT`.
///
/// Leading and trailing semicolons are ignored; any other semicolon means a
/// second statement and the whole input is rejected.
pub fn is_read_only(sql: &str) -> bool {
    let tokens = tokenize(sql);
    let first = tokens.iter().position(|t| *t != Token::Semicolon);
    let last = tokens.iter().rposition(|t| *t != Token::Semicolon);
    let (Some(first), Some(last)) = (first, last) else {
        return false;
    };
    let statement = &tokens[first..=last];
    if statement.contains(&Token::Semicolon) {
        return false;
    }

    match statement.first() {
        Some(Token::Word(w)) if w == "SELECT" => true,
        Some(Token::Word(w)) if w == "WITH" => {
            let mut depth = 0usize;
            for token in &statement[1..] {
                match token {
                    Token::Open => depth += 1,
                    Token::Close => depth = depth.saturating_sub(1),
                    Token::Word(w)
                        if depth == 0 && MAIN_STATEMENT_KEYWORDS.contains(&w.as_str()) =>
                    {
                        return w == "SELECT";
                    }
                    _ => {}
                }
            }
            false
        }
        _ => false,
    }
}

/// Executes read-only SQL against a storage provider.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    storage: Box<dyn Storage>,
}

impl QueryExecutor {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn execute(&self, sql: &str) -> Execution {
        let outcome = if is_read_only(sql) {
            self.storage.execute_query(sql).await
        } else {
            Err(PromptError::NotReadOnly(
                sql.lines().next().unwrap_or_default().to_string(),
            ))
        };

        match outcome {
            Ok(result) => {
                info!(
                    "[execute] {} rows, {} columns",
                    result.len(),
                    result.columns.len()
                );
                Execution {
                    result: Some(result),
                    error: None,
                }
            }
            Err(e) => {
                error!(kind = ?e.kind(), "[execute] Query execution error: {e:?}");
                Execution {
                    result: None,
                    error: Some(format!("Query failed: {e}")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_and_cte_are_read_only() {
        assert!(is_read_only("SELECT 1"));
        assert!(is_read_only("  select * from t"));
        assert!(is_read_only(";WITH totals AS (SELECT 1) SELECT * FROM totals"));
        assert!(is_read_only("-- totals\n/* by channel */\nSELECT 1"));
        assert!(is_read_only("SELECT 1;\n"));
        assert!(is_read_only(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 3) SELECT x FROM n"
        ));
    }

    #[test]
    fn keywords_inside_literals_and_comments_are_ignored() {
        assert!(is_read_only("SELECT 'a; DELETE FROM t' AS note"));
        assert!(is_read_only("SELECT \"delete\" FROM t -- ; drop table t"));
        assert!(is_read_only("SELECT 'it''s; fine' /* ; */ FROM t"));
    }

    #[test]
    fn data_modifying_cte_is_rejected() {
        assert!(!is_read_only("WITH x AS (SELECT 1) DELETE FROM Customer"));
        assert!(!is_read_only(
            "WITH ids AS (SELECT CustomerID FROM Customer) UPDATE Customer SET Region = NULL"
        ));
        assert!(!is_read_only("with x as (select 1) insert into t select * from x"));
        assert!(!is_read_only("WITH x AS (SELECT 1)"));
    }

    #[test]
    fn stacked_statements_are_rejected() {
        assert!(!is_read_only("SELECT 1; DELETE FROM Customer"));
        assert!(!is_read_only("SELECT 1; SELECT 2"));
        assert!(!is_read_only("SELECT 1 ;; DROP TABLE Customer;"));
    }

    #[test]
    fn writes_are_rejected() {
        assert!(!is_read_only("DELETE FROM orders"));
        assert!(!is_read_only("update orders set qty = 0"));
        assert!(!is_read_only("SELECTED"));
        assert!(!is_read_only("-- only a comment"));
        assert!(!is_read_only(";;"));
        assert!(!is_read_only(""));
    }
}
