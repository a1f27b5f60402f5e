//! # Default Prompt Templates
//!
//! This module contains the default prompt templates and fixed conversation
//! messages. The two templates can be overridden at runtime through the
//! `tasks` section of the CLI configuration.

// --- SQL Generation ---

/// The default system instruction for SQL generation.
///
/// It carries the business rules and the formatted schema and is built once per
/// session.
///
/// Placeholders: `{language}`, `{db_name}`, `{schema}`
pub const SQL_GENERATION_SYSTEM_PROMPT: &str = r#"You are an expert-level {language} architect for {db_name}. Your sole function is to generate a single, optimized, syntactically correct and simple read-only {language} query based on the user's request and the rules below.
You follow this four-step internal process:
- Deconstruct Request: silently identify all required metrics, dimensions and filters.
- Apply Logic: apply all relevant business logic, error handling and metric formulas.
- Generate Query: construct the query, adhering to all syntax, performance and naming conventions.
- Format Output: present the final response using the structure in Part 3.
---
Part 1: Database Schema Reference
{schema}
---
Part 2: Core Directives & Rules

A. Syntax, Naming & Performance
- Always round numeric results to 2 decimal places.
- Start the query with a CTE when more than one step is needed. Remove unused CTEs.
- Default to LEFT JOIN. Use INNER JOIN only for mandatory, non-nullable relationships. Never use FULL OUTER JOIN.
- Use short, intuitive table aliases (the alias listed next to each table) and prefix every column with its alias.
- Only use columns with the tables they exist in.

B. Error Handling & Type Safety
- Prefer safe casts over plain casts so conversion errors cannot abort the query.
- Wrap every denominator with NULLIF(expression, 0).
- Never cast alphanumeric text columns to integers; align data types instead.
- Use proper date functions instead of string manipulation for filtering and grouping.

C. Standard Business Logic & Filters
- Only return the top 1000 rows.
- Always display the total values for the question asked.
- When a single date is specified, use the full range of that day.
- A fiscal year (e.g., 'FY2024') runs from April 1st to March 31st of the following year.
- For top-selling products, order descending by the summed quantity.
- When filtering on names or channels, use LIKE with wildcards rather than exact matches.
---
Part 3: Final Output Format
Answer with a 2-3 line explanation of the query's objective and logic, followed by the query in a single fenced block:
```sql
-- the query
```
Provide no other commentary."#;

// --- Follow-up Suggestions ---

/// The prompt used to ask for follow-up questions after a successful query.
///
/// Placeholders: `{question}`, `{sql}`, `{columns}`
pub const FOLLOW_UP_PROMPT: &str = r#"Based on the user's last question and the data columns from the result, suggest 3 insightful and relevant follow-up questions a data analyst might ask next.
The goal is to explore the data further, such as breaking it down by another dimension, comparing time periods, or focusing on top/bottom performers.

PREVIOUS QUESTION: "{question}"
GENERATED SQL QUERY: "{sql}"
RESULTING DATA COLUMNS: {columns}

Return ONLY a list of 3 short, clear question strings, each in double quotes.
Example: ["Can you break this down by sales channel?", "How does this compare to the previous year?", "What are the top 5 products in this category?"]"#;

// --- Conversation Messages ---

/// The assistant turn that opens every new session.
pub const GREETING: &str = "Hello, How can I help you?";

/// The clarification shown when a question has no time period.
pub const MISSING_TIMEFRAME_MESSAGE: &str =
    "No time period specified. Please specify the 'YEAR' or 'FY' (e.g., 2025).";

/// Used when the model replied without any SQL and without an explanation.
pub const NO_SQL_GENERATED: &str = "The model did not generate a SQL query.";

pub const EXECUTION_SUCCEEDED: &str = "✅ Query executed successfully!";
pub const EXECUTION_EMPTY: &str = "✅ Query executed successfully, but returned no results.";

/// Marks the start of the collapsible SQL block inside an assistant turn.
pub const SQL_DETAILS_MARKER: &str = "\n\n<details>";

/// Fills the SQL generation system instruction.
pub fn build_generation_system_prompt(
    template: &str,
    language: &str,
    db_name: &str,
    schema: &str,
) -> String {
    template
        .replace("{language}", language)
        .replace("{db_name}", db_name)
        .replace("{schema}", schema)
}

/// Fills the follow-up suggestion prompt.
pub fn build_follow_up_prompt(template: &str, question: &str, sql: &str, columns: &[String]) -> String {
    template
        .replace("{question}", question)
        .replace("{sql}", sql)
        .replace("{columns}", &columns.join(", "))
}
