use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain entity `{entity}` not found")]
    NotFound { entity: &'static str },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Message suitable for a client-facing validation response.
    pub fn client_message(&self) -> String {
        match self {
            DomainError::NotFound { entity } => format!("{entity} not found"),
            DomainError::Validation { message } => message.clone(),
        }
    }
}
