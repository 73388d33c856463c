//! Session core for the skin-photo triage client.
//!
//! [`App`] is a Crux app: events go in through [`Core::process_event`], effects
//! come out, and the platform shell executes them and resolves each request
//! with its output. Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod location;
pub mod model;
pub mod prompts;
pub mod resource_guard;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod view;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::{Core, Request};
pub use config::{ApiBase, ApiConfig, SessionConfig};
pub use event::{ChatTag, Event, PreviewHandle};
pub use location::{Coordinates, LocationProbe, LocationUnavailable, ProbeState};
pub use model::{Message, Model, Sender, SessionEpoch, TriageResult, View};
pub use resource_guard::ResourceGuard;
pub use view::{confidence_percent, ViewModel, ViewState};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_LOCATION_TIMEOUT_MS: u64 = 1_500;
pub const ANALYZE_PATH: &str = "analyze/quick";
pub const CHAT_PATH: &str = "chat";
pub const IMAGE_FIELD_NAME: &str = "image";

pub const CHAT_FALLBACK_REPLY: &str = "Sorry, I'm having trouble connecting to the server.";
pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Analyze failed. Is the analysis server running and reachable?";
pub const GENERIC_CHAT_SUBJECT: &str = "the uploaded image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Server,
    Client,
    MalformedResponse,
    NotConfigured,
    InvalidImage,
    ImageTooLarge,
    PickerUnavailable,
    PermissionDenied,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Server => "SERVER_ERROR",
            Self::Client => "CLIENT_ERROR",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::NotConfigured => "API_NOT_CONFIGURED",
            Self::InvalidImage => "INVALID_IMAGE",
            Self::ImageTooLarge => "IMAGE_TOO_LARGE",
            Self::PickerUnavailable => "PICKER_UNAVAILABLE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Server | Self::PickerUnavailable => {
                ErrorSeverity::Transient
            }

            Self::Internal => ErrorSeverity::Fatal,

            Self::Client
            | Self::MalformedResponse
            | Self::NotConfigured
            | Self::InvalidImage
            | Self::ImageTooLarge
            | Self::PermissionDenied
            | Self::InvalidRequest => ErrorSeverity::Permanent,
        }
    }

    /// Whether the user may usefully trigger the same action again.
    /// Nothing in the core retries on its own.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Server | Self::PickerUnavailable
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            // Gateway failures carry their own alert text.
            ErrorKind::Network
            | ErrorKind::Timeout
            | ErrorKind::Server
            | ErrorKind::Client
            | ErrorKind::MalformedResponse
            | ErrorKind::InvalidRequest => self.message.clone(),
            ErrorKind::NotConfigured => {
                "The analysis server is not configured. Set API_BASE and reload.".into()
            }
            ErrorKind::InvalidImage => {
                "Unable to read the image. Please try a different photo.".into()
            }
            ErrorKind::ImageTooLarge => format!(
                "The image is too large. Please use an image smaller than {} MB.",
                MAX_IMAGE_BYTES / (1024 * 1024)
            ),
            ErrorKind::PickerUnavailable => {
                "Unable to open the photo picker. Please try again.".into()
            }
            ErrorKind::PermissionDenied => {
                "Photo access is required. Please enable permissions in Settings.".into()
            }
            ErrorKind::Internal => {
                "An unexpected error occurred. Please reload the page.".into()
            }
        }
    }

    #[must_use]
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            408 => ErrorKind::Timeout,
            400..=499 => ErrorKind::Client,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::MalformedResponse,
        };

        Self::new(kind, message).with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

/// Failure of the quick-classification call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("analysis endpoint is not configured")]
    NotConfigured,

    #[error("could not build analysis request: {0}")]
    InvalidRequest(String),

    #[error("analysis transport failed: {0}")]
    Transport(String),

    #[error("analysis request timed out")]
    Timeout,

    #[error("analysis endpoint returned HTTP {status}")]
    Status { status: u16, body: Option<String> },

    #[error("malformed analysis response: {0}")]
    Malformed(String),
}

/// Failure of the conversational call. Never reaches the user as an alert;
/// the chat gateway turns it into a fallback assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("chat endpoint is not configured")]
    NotConfigured,

    #[error("could not build chat request: {0}")]
    InvalidRequest(String),

    #[error("chat transport failed: {0}")]
    Transport(String),

    #[error("chat request timed out")]
    Timeout,

    #[error("chat endpoint returned HTTP {status}")]
    Status { status: u16, body: Option<String> },

    #[error("malformed chat response: {0}")]
    Malformed(String),
}

impl From<&AnalysisError> for AppError {
    fn from(err: &AnalysisError) -> Self {
        let base = match err {
            AnalysisError::NotConfigured => AppError::new(ErrorKind::NotConfigured, err.to_string()),
            AnalysisError::InvalidRequest(_) => {
                AppError::new(ErrorKind::InvalidRequest, ANALYSIS_FAILED_MESSAGE)
            }
            AnalysisError::Transport(_) => AppError::new(ErrorKind::Network, ANALYSIS_FAILED_MESSAGE),
            AnalysisError::Timeout => AppError::new(ErrorKind::Timeout, ANALYSIS_FAILED_MESSAGE),
            AnalysisError::Status { status, .. } => {
                AppError::from_http_status(*status, ANALYSIS_FAILED_MESSAGE)
            }
            AnalysisError::Malformed(_) => {
                AppError::new(ErrorKind::MalformedResponse, ANALYSIS_FAILED_MESSAGE)
            }
        };
        base.with_internal(err.to_string())
    }
}
