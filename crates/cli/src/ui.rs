//! # Terminal Rendering
//!
//! Turns the conversation log into plain text for the terminal. The log is
//! append-only, so a `Renderer` only has to print the turns it has not shown
//! yet.

use salesbot::prompts::core::SQL_DETAILS_MARKER;
use salesbot::{ClarificationRequest, ResultSet, Role, SessionState, Turn, TurnContent};
use serde_json::Value;

const SQL_OPEN: &str = "<code class=\"language-sql\">";
const SQL_CLOSE: &str = "</code>";

/// Formats one cell. Fractional numbers get two decimals; nulls are blank.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .map(|f| format!("{f:.2}"))
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Splits an assistant turn into its visible text and the embedded SQL.
pub fn split_sql_turn(text: &str) -> (&str, Option<String>) {
    let Some((visible, details)) = text.split_once(SQL_DETAILS_MARKER) else {
        return (text, None);
    };
    let sql = details
        .split_once(SQL_OPEN)
        .and_then(|(_, rest)| rest.split_once(SQL_CLOSE))
        .map(|(sql, _)| unescape_html(sql));
    (visible, sql)
}

/// Lays out a result set as an aligned text grid.
pub fn render_table(result: &ResultSet, rows_before_scroll: usize) -> String {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(result.columns.as_slice())];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.extend(cells.iter().map(|row| line(row.as_slice())));
    if result.len() > rows_before_scroll {
        out.push(format!("({} rows, scroll up to see them all)", result.len()));
    }
    out.join("\n")
}

/// Renders one turn of the log.
pub fn render_turn(turn: &Turn, rows_before_scroll: usize) -> String {
    match (&turn.role, &turn.content) {
        (_, TurnContent::Table(result)) => render_table(result, rows_before_scroll),
        (Role::User, TurnContent::Text(text)) => format!("you> {text}"),
        (_, TurnContent::Text(text)) => {
            let (visible, sql) = split_sql_turn(text);
            let mut out = format!("bot> {}", visible.trim());
            if let Some(sql) = sql {
                out.push_str("\n--- Generated SQL ---\n");
                out.push_str(sql.trim());
            }
            out
        }
    }
}

pub fn render_clarification(request: &ClarificationRequest) -> String {
    match request {
        ClarificationRequest::Ambiguity { term, options } => {
            let mut out = format!("bot> '{term}' can mean several things. Which one?");
            for (idx, option) in options.iter().enumerate() {
                out.push_str(&format!("\n  {}. {option}", idx + 1));
            }
            out
        }
        ClarificationRequest::MissingTimeframe { message } => format!("bot> {message}"),
    }
}

pub fn render_suggestions(suggestions: &[String]) -> String {
    let mut out = String::from("Follow-up questions (type the number to ask):");
    for (idx, question) in suggestions.iter().enumerate() {
        out.push_str(&format!("\n  {}. {question}", idx + 1));
    }
    out
}

/// Prints the part of a session that has not been shown yet.
#[derive(Debug, Default)]
pub struct Renderer {
    printed: usize,
    rows_before_scroll: usize,
}

impl Renderer {
    pub fn new(rows_before_scroll: usize) -> Self {
        Self {
            printed: 0,
            rows_before_scroll,
        }
    }

    /// New turns since the last call. A shorter log means the session was
    /// reset, so it is shown from the start.
    pub fn new_turns(&mut self, session: &SessionState) -> Option<String> {
        if session.log.len() < self.printed {
            self.printed = 0;
        }
        let fresh = &session.log[self.printed..];
        self.printed = session.log.len();
        (!fresh.is_empty()).then(|| {
            fresh
                .iter()
                .map(|turn| render_turn(turn, self.rows_before_scroll))
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    /// Everything the user should see once the pipeline has come to rest:
    /// new turns, a pending clarification, a warning and the suggestions.
    pub fn settle(&mut self, session: &SessionState) -> String {
        let mut parts = Vec::new();
        parts.extend(self.new_turns(session));
        if let Some(request) = session.phase.clarification() {
            parts.push(render_clarification(request));
        }
        if let Some(warning) = &session.warning {
            parts.push(format!("warning: {warning}"));
        }
        if !session.suggestions.is_empty() {
            parts.push(render_suggestions(&session.suggestions));
        }
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesbot::conversation::render_sql_turn;
    use serde_json::json;

    #[test]
    fn numbers_get_two_decimals() {
        assert_eq!(format_value(&json!(12.5)), "12.50");
        assert_eq!(format_value(&json!(7)), "7");
        assert_eq!(format_value(&json!(null)), "");
        assert_eq!(format_value(&json!("Online")), "Online");
    }

    #[test]
    fn sql_turn_splits_back_into_text_and_sql() {
        let sql = "SELECT a FROM t WHERE b < 'x' AND c = \"y\"";
        let text = render_sql_turn(Some("Explains it."), sql);
        let (visible, extracted) = split_sql_turn(&text);
        assert_eq!(visible, "Explains it.");
        assert_eq!(extracted.as_deref(), Some(sql));

        assert_eq!(split_sql_turn("plain"), ("plain", None));
    }

    #[test]
    fn table_is_aligned_with_scroll_hint() {
        let result = ResultSet::new(
            vec!["Channel".into(), "Total".into()],
            vec![
                vec![json!("Online"), json!(120.0)],
                vec![json!("Retail"), json!(99.5)],
            ],
        );
        assert_eq!(
            render_table(&result, 10),
            "Channel | Total\n--------+-------\nOnline  | 120.00\nRetail  | 99.50"
        );
        assert!(render_table(&result, 1).ends_with("(2 rows, scroll up to see them all)"));
    }

    #[test]
    fn renderer_prints_each_turn_once_and_restarts_after_reset() {
        let mut session = SessionState::new();
        let mut renderer = Renderer::new(10);
        assert_eq!(
            renderer.new_turns(&session).as_deref(),
            Some("bot> Hello, How can I help you?")
        );
        assert_eq!(renderer.new_turns(&session), None);

        session.log.push(Turn::user("sales 2024"));
        assert_eq!(renderer.new_turns(&session).as_deref(), Some("you> sales 2024"));

        session.reset();
        assert!(renderer.new_turns(&session).is_some());
    }

    #[test]
    fn ambiguity_lists_numbered_options() {
        let text = render_clarification(&ClarificationRequest::Ambiguity {
            term: "price".into(),
            options: vec!["UnitPrice".into(), "NetPrice".into()],
        });
        assert!(text.ends_with("\n  1. UnitPrice\n  2. NetPrice"));
    }
}
