use crate::service::CredentialService;
use crate::status::{OSStatus, ERR_SEC_ITEM_NOT_FOUND};
use thiserror::Error;

/// Errors produced by keychain operations
#[derive(Error, Debug)]
pub enum KeychainError {
    /// The platform answered with a status other than success or, for
    /// search-style calls, not-found
    #[error("{message}")]
    OperationFailed {
        code: OSStatus,
        context: Option<String>,
        message: String,
    },

    #[error("no attribute accessor named `{0}`")]
    UnknownAttribute(String),

    #[error("password must be a string, got {0}")]
    InvalidPasswordValue(&'static str),

    #[error("stored password is not valid UTF-8: {0}")]
    PasswordEncoding(#[from] std::string::FromUtf8Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl KeychainError {
    /// Build a platform failure, resolving the message through `service`
    pub fn operation_failed(
        context: Option<&str>,
        code: OSStatus,
        service: &dyn CredentialService,
    ) -> Self {
        Self::with_message(context, code, &service.message_for(code))
    }

    /// Build a platform failure from an already resolved platform message
    pub fn with_message(context: Option<&str>, code: OSStatus, platform_message: &str) -> Self {
        let message = match context {
            Some(prefix) => format!("{}. [Error code: {}] {}", prefix, code, platform_message),
            None => format!("[Error code: {}] {}", code, platform_message),
        };

        KeychainError::OperationFailed {
            code,
            context: context.map(str::to_string),
            message,
        }
    }

    /// Platform status code, when the error came from the platform
    pub fn code(&self) -> Option<OSStatus> {
        match self {
            KeychainError::OperationFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(ERR_SEC_ITEM_NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, KeychainError>;
