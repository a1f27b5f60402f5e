use super::{default_continuation_phrases, ConversationController};
use crate::{
    errors::PromptError,
    executor::QueryExecutor,
    generator::SqlGenerator,
    prompts::core::{build_generation_system_prompt, SQL_GENERATION_SYSTEM_PROMPT},
    providers::{ai::AiProvider, db::sqlite::MAIN_SCHEMA, db::storage::Storage},
    schema::{load_schema, PromptCache},
    suggester::FollowUpSuggester,
    types::Schema,
    validator::QuestionValidator,
};
use std::sync::Arc;
use tracing::info;

/// Shown when no table could be read from the data store.
pub const EMPTY_SCHEMA_MESSAGE: &str = "Could not load schema from database.";

/// Builds a `ConversationController`.
#[derive(Default)]
pub struct ConversationControllerBuilder {
    generation_provider: Option<Box<dyn AiProvider>>,
    suggestion_provider: Option<Box<dyn AiProvider>>,
    storage: Option<Box<dyn Storage>>,
    schema_names: Vec<String>,
    schema: Option<Schema>,
    schema_hint: Option<String>,
    system_prompt_template: Option<String>,
    follow_up_prompt_template: Option<String>,
    validator: Option<QuestionValidator>,
    continuation_phrases: Option<Vec<String>>,
    current_year: Option<i32>,
    prompt_cache: Option<PromptCache>,
}

impl ConversationControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the provider used for SQL generation.
    pub fn generation_provider(mut self, provider: Box<dyn AiProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Sets the provider used for follow-up suggestions. Defaults to the
    /// generation provider.
    pub fn suggestion_provider(mut self, provider: Box<dyn AiProvider>) -> Self {
        self.suggestion_provider = Some(provider);
        self
    }

    pub fn storage(mut self, storage: Box<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// The schemas to introspect, in order. Defaults to `main`.
    pub fn schema_names(mut self, names: Vec<String>) -> Self {
        self.schema_names = names;
        self
    }

    /// Uses a ready-made schema instead of introspecting the storage.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Free-form notes appended to the formatted schema.
    pub fn schema_hint(mut self, hint: Option<String>) -> Self {
        self.schema_hint = hint;
        self
    }

    pub fn system_prompt_template(mut self, template: Option<String>) -> Self {
        self.system_prompt_template = template;
        self
    }

    pub fn follow_up_prompt_template(mut self, template: Option<String>) -> Self {
        self.follow_up_prompt_template = template;
        self
    }

    pub fn validator(mut self, validator: QuestionValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn continuation_phrases(mut self, phrases: Vec<String>) -> Self {
        self.continuation_phrases = Some(phrases);
        self
    }

    /// Pins the calendar year used for time-period validation.
    pub fn current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    /// Shares a formatted-schema cache between controllers.
    pub fn prompt_cache(mut self, cache: PromptCache) -> Self {
        self.prompt_cache = Some(cache);
        self
    }

    /// Loads the schema, builds the system instruction and assembles the
    /// controller.
    ///
    /// Fails when a provider is missing or when the schema has no columns at
    /// all, since nothing useful can be generated without one.
    pub async fn build(self) -> Result<ConversationController, PromptError> {
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| PromptError::MissingAiProvider("sql_generation".to_string()))?;
        let suggestion_provider = self
            .suggestion_provider
            .unwrap_or_else(|| dyn_clone::clone_box(&*generation_provider));
        let storage = self.storage.ok_or(PromptError::MissingStorageProvider)?;

        let schema = match self.schema {
            Some(schema) => schema,
            None => {
                let names = if self.schema_names.is_empty() {
                    vec![MAIN_SCHEMA.to_string()]
                } else {
                    self.schema_names
                };
                load_schema(storage.as_ref(), &names).await
            }
        };
        if schema.values().all(|columns| columns.is_empty()) {
            return Err(PromptError::StorageOperationFailed(
                EMPTY_SCHEMA_MESSAGE.to_string(),
            ));
        }

        let cache = self.prompt_cache.unwrap_or_default();
        let formatted = cache
            .formatted(&schema, self.schema_hint.as_deref())
            .await;
        let template = self
            .system_prompt_template
            .unwrap_or_else(|| SQL_GENERATION_SYSTEM_PROMPT.to_string());
        let system_prompt = Arc::new(build_generation_system_prompt(
            &template,
            storage.language(),
            storage.name(),
            &formatted,
        ));
        info!(
            "System instruction built from {} tables ({} chars).",
            schema.values().filter(|c| !c.is_empty()).count(),
            system_prompt.len()
        );

        let mut suggester = FollowUpSuggester::new(suggestion_provider);
        if let Some(template) = self.follow_up_prompt_template {
            suggester = suggester.with_prompt_template(template);
        }

        Ok(ConversationController {
            validator: self.validator.unwrap_or_default(),
            generator: SqlGenerator::new(generation_provider, system_prompt),
            executor: QueryExecutor::new(storage),
            suggester,
            continuation_phrases: self
                .continuation_phrases
                .unwrap_or_else(default_continuation_phrases)
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            current_year: self.current_year,
            formatted_schema: formatted,
        })
    }
}
