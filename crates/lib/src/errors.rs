use thiserror::Error;

/// Custom error types for the application.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI provider: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    AiApi(String),
    #[error("AI provider is not configured: {0}")]
    MissingAiProvider(String),
    #[error("Storage provider is missing")]
    MissingStorageProvider,
    #[error("Storage provider connection error: {0}")]
    StorageConnection(String),
    #[error("Storage operation failed: {0}")]
    StorageOperationFailed(String),
    #[error("Refusing to run a statement that is not read-only: {0}")]
    NotReadOnly(String),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

/// The failure classes a conversation turn can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The data store or the completion service could not be reached.
    Connection,
    /// The completion service answered, but not with usable SQL.
    Generation,
    /// The SQL was rejected or failed against the data store.
    Execution,
}

impl PromptError {
    /// Classifies the error for reporting in the conversation log.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PromptError::ReqwestClientBuild(_)
            | PromptError::AiRequest(_)
            | PromptError::AiApi(_)
            | PromptError::MissingAiProvider(_)
            | PromptError::MissingStorageProvider
            | PromptError::StorageConnection(_) => ErrorKind::Connection,
            PromptError::AiDeserialization(_)
            | PromptError::Regex(_)
            | PromptError::JsonSerialization(_) => ErrorKind::Generation,
            PromptError::StorageOperationFailed(_) | PromptError::NotReadOnly(_) => {
                ErrorKind::Execution
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_classify_by_stage() {
        assert_eq!(
            PromptError::StorageConnection("refused".into()).kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            PromptError::StorageOperationFailed("no such table".into()).kind(),
            ErrorKind::Execution
        );
        assert_eq!(
            PromptError::AiApi("quota exceeded".into()).kind(),
            ErrorKind::Connection
        );
    }
}
