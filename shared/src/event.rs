use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{GeolocationResult, PickedImage, PickerResult};
use crate::config::{ApiConfig, ConfigError, SessionConfig};
use crate::model::{SessionEpoch, TriageResult};
use crate::{AnalysisError, ChatError};

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "-{}"), uuid::Uuid::new_v4().simple()))
            }

            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(PreviewHandle, "preview");

/// Identifies the chat sub-session a reply belongs to. A reply is applied
/// only while both epochs still match the live session.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatTag {
    pub image_epoch: SessionEpoch,
    pub chat_epoch: SessionEpoch,
}

// --- Event enum: large variants boxed ---

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    Mounted(SessionConfig),
    Unmounted,
    ConfigLoadRequested {
        url: String,
    },
    ConfigLoaded {
        epoch: SessionEpoch,
        result: Box<Result<ApiConfig, ConfigError>>,
    },

    // Image selection
    OpenPicker,
    CapturePhotoRequested,
    PickerResolved {
        epoch: SessionEpoch,
        result: Box<PickerResult>,
    },
    ImagePicked(Box<PickedImage>),

    // Quick analysis
    AnalysisRequested,
    AnalysisCompleted {
        epoch: SessionEpoch,
        result: Box<Result<TriageResult, AnalysisError>>,
    },

    // Deep search
    StartDeepSearch,
    ChatInputChanged {
        text: String,
    },
    SendMessage,
    SuggestedPromptSelected {
        prompt: String,
    },
    ChatReplyReceived {
        tag: ChatTag,
        result: Box<Result<String, ChatError>>,
    },

    // Location
    LocationProbeRequested,
    LocationResolved {
        epoch: SessionEpoch,
        result: Box<GeolocationResult>,
    },

    DismissError,
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Event::Mounted(_) => "mounted",
            Event::Unmounted => "unmounted",
            Event::ConfigLoadRequested { .. } => "config_load_requested",
            Event::ConfigLoaded { .. } => "config_loaded",
            Event::OpenPicker => "open_picker",
            Event::CapturePhotoRequested => "capture_photo_requested",
            Event::PickerResolved { .. } => "picker_resolved",
            Event::ImagePicked(_) => "image_picked",
            Event::AnalysisRequested => "analysis_requested",
            Event::AnalysisCompleted { .. } => "analysis_completed",
            Event::StartDeepSearch => "start_deep_search",
            Event::ChatInputChanged { .. } => "chat_input_changed",
            Event::SendMessage => "send_message",
            Event::SuggestedPromptSelected { .. } => "suggested_prompt_selected",
            Event::ChatReplyReceived { .. } => "chat_reply_received",
            Event::LocationProbeRequested => "location_probe_requested",
            Event::LocationResolved { .. } => "location_resolved",
            Event::DismissError => "dismiss_error",
        }
    }

    /// Events that come back from the shell rather than from the user.
    #[must_use]
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            Event::ConfigLoaded { .. }
                | Event::PickerResolved { .. }
                | Event::AnalysisCompleted { .. }
                | Event::ChatReplyReceived { .. }
                | Event::LocationResolved { .. }
        )
    }

    pub fn image_picked(image: PickedImage) -> Self {
        Event::ImagePicked(Box::new(image))
    }
}
