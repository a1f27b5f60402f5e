//! # Chat Application
//!
//! Wires a `ConversationController` from the configuration and drives it from
//! the terminal, either interactively or for a single question.

use crate::config::{AppConfig, FOLLOW_UP_TASK, SQL_GENERATION_TASK};
use crate::ui::Renderer;
use anyhow::{bail, Context, Result};
use salesbot::providers::db::sqlite::SqliteProvider;
use salesbot::providers::factory::create_provider;
use salesbot::validator::QuestionValidator;
use salesbot::{ClarificationRequest, ConversationController, SessionState, UserEvent};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const NEW_CHAT_COMMAND: &str = "/new";
const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

/// Builds the controller described by the configuration.
pub async fn build_controller(config: &AppConfig) -> Result<ConversationController> {
    let generation_task = config.task(SQL_GENERATION_TASK);
    let follow_up_task = config.task(FOLLOW_UP_TASK);
    let generation_provider = create_provider(config.provider_for(SQL_GENERATION_TASK)?)?;
    let suggestion_provider = create_provider(config.provider_for(FOLLOW_UP_TASK)?)?;

    info!("Opening database at '{}'.", config.db_url);
    let storage = SqliteProvider::new(&config.db_url)
        .await
        .with_context(|| format!("Failed to open database '{}'", config.db_url))?;

    let controller = ConversationController::builder()
        .generation_provider(generation_provider)
        .suggestion_provider(suggestion_provider)
        .storage(Box::new(storage))
        .schema_names(config.schema_names.clone())
        .schema_hint(config.resolved_schema_hint()?)
        .system_prompt_template(generation_task.prompt)
        .follow_up_prompt_template(follow_up_task.prompt)
        .validator(QuestionValidator::new(
            config.ambiguous_terms.clone(),
            config.time_keywords.clone(),
        ))
        .continuation_phrases(config.continuation_phrases.clone())
        .build()
        .await?;
    Ok(controller)
}

/// Maps a line typed in the chat to an event.
///
/// A bare number picks an option of a pending ambiguity, or else one of the
/// suggested follow-up questions.
pub fn parse_line(line: &str, session: &SessionState) -> UserEvent {
    let line = line.trim();
    if line.eq_ignore_ascii_case(NEW_CHAT_COMMAND) {
        return UserEvent::NewChat;
    }
    if let Some(choice) = line.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) {
        if let Some(ClarificationRequest::Ambiguity { options, .. }) =
            session.phase.clarification()
        {
            if let Some(option) = options.get(choice) {
                return UserEvent::SelectOption(option.clone());
            }
        } else if let Some(suggestion) = session.suggestions.get(choice) {
            return UserEvent::SelectSuggestion(suggestion.clone());
        }
    }
    UserEvent::Input(line.to_string())
}

fn print_flush(text: &str) {
    if !text.is_empty() {
        println!("{text}");
    }
    let _ = std::io::stdout().flush();
}

/// Applies an event and prints every transition as it happens.
async fn submit(
    controller: &ConversationController,
    session: &mut SessionState,
    renderer: &mut Renderer,
    event: UserEvent,
) -> bool {
    if !controller.handle_event(session, event) {
        return false;
    }
    if let Some(text) = renderer.new_turns(session) {
        print_flush(&text);
    }
    controller
        .run_until_idle(session, |state| {
            if let Some(text) = renderer.new_turns(state) {
                print_flush(&text);
            }
        })
        .await;
    print_flush(&renderer.settle(session));
    true
}

/// Runs the interactive chat until end of input or `/quit`.
pub async fn run_chat(controller: &ConversationController, rows_before_scroll: usize) -> Result<()> {
    let mut session = SessionState::new();
    let mut renderer = Renderer::new(rows_before_scroll);
    print_flush(&renderer.settle(&session));
    println!("(type {NEW_CHAT_COMMAND} to start over, /quit to leave)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if QUIT_COMMANDS.iter().any(|q| trimmed.eq_ignore_ascii_case(q)) {
            break;
        }
        let event = parse_line(trimmed, &session);
        if !submit(controller, &mut session, &mut renderer, event).await {
            println!("bot> That input cannot be used right now.");
        }
    }
    Ok(())
}

/// Answers one question, replying to clarifications from the given flags.
pub async fn run_ask(
    controller: &ConversationController,
    rows_before_scroll: usize,
    question: &str,
    mut year: Option<String>,
    mut option: Option<usize>,
) -> Result<()> {
    let mut session = SessionState::new();
    let mut renderer = Renderer::new(rows_before_scroll);
    renderer.new_turns(&session);

    submit(
        controller,
        &mut session,
        &mut renderer,
        UserEvent::Input(question.to_string()),
    )
    .await;

    while let Some(request) = session.phase.clarification().cloned() {
        let event = match request {
            ClarificationRequest::MissingTimeframe { .. } => match year.take() {
                Some(year) => UserEvent::Input(year),
                None => bail!("The question needs a time period; pass --year."),
            },
            ClarificationRequest::Ambiguity { term, options } => {
                let Some(n) = option.take() else {
                    bail!("'{term}' is ambiguous; pass --option N.");
                };
                match n.checked_sub(1).and_then(|idx| options.get(idx)) {
                    Some(choice) => UserEvent::SelectOption(choice.clone()),
                    None => bail!("--option {n} is not one of the {} choices.", options.len()),
                }
            }
        };
        submit(controller, &mut session, &mut renderer, event).await;
    }
    Ok(())
}

/// Prints the schema text the model is given.
pub fn print_schema(controller: &ConversationController) {
    println!("{}", controller.formatted_schema());
}
