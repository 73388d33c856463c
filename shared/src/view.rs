use serde::{Deserialize, Serialize};

use crate::location::ProbeState;
use crate::model::{Model, Sender, View};
use crate::prompts::suggestions_for;
use crate::UserFacingError;

const ANALYZE_LABEL: &str = "Run Fast Analysis";
const RERUN_LABEL: &str = "Run Fast Analysis Again";
const DEEP_SEARCH_LABEL: &str = "Start Deep Search";
const PENDING_LABEL: &str = "Analyzing…";

/// Whole-percent rendering of a confidence in `[0, 1]`, rounding half away
/// from zero. Values are snapped to 1e-9 first so `0.705` shows as 71
/// despite `0.705 * 100.0` landing just under 70.5.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn confidence_percent(confidence: f64) -> u8 {
    if !confidence.is_finite() {
        return 0;
    }
    let scaled = confidence.clamp(0.0, 1.0) * 100.0;
    let snapped = (scaled * 1e9).round() / 1e9;
    snapped.round() as u8
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionView {
    pub label: String,
    pub enabled: bool,
}

impl ActionView {
    fn new(label: impl Into<String>, enabled: bool) -> Self {
        Self {
            label: label.into(),
            enabled,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriageView {
    pub condition: String,
    pub confidence_percent: u8,
    /// e.g. `Eczema (71%)`
    pub label: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    Plain,
    /// Assistant text; the shell renders it as markdown and sanitizes it.
    Markdown,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageView {
    pub sender: Sender,
    pub text: String,
    pub format: MessageFormat,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Landing,
    Preview {
        analyze: ActionView,
        deep_search: ActionView,
    },
    FastTriage {
        triage: Option<TriageView>,
        rerun: ActionView,
        deep_search: ActionView,
    },
    DeepSearch {
        context: Option<String>,
        messages: Vec<MessageView>,
        is_typing: bool,
        suggestions: Vec<String>,
        suggestions_enabled: bool,
        input: String,
        can_send: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewView {
    pub handle: String,
    pub alt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiStatusView {
    pub configured: bool,
    pub label: String,
    pub base: Option<String>,
}

/// Whether analysis requests will carry a location hint.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationView {
    pub state: ProbeState,
    pub has_hint: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub state: ViewState,
    pub preview: Option<PreviewView>,
    pub api: ApiStatusView,
    pub location: LocationView,
    pub error: Option<UserFacingError>,
    pub can_change_image: bool,
}

impl ViewModel {
    #[must_use]
    pub fn from_model(model: &Model) -> Self {
        let state = match model.view {
            View::Landing => ViewState::Landing,

            View::Preview => ViewState::Preview {
                analyze: analyze_action(model, ANALYZE_LABEL),
                deep_search: ActionView::new(DEEP_SEARCH_LABEL, deep_search_enabled(model)),
            },

            View::FastTriage => {
                let triage = model.triage.as_ref().map(|t| {
                    let percent = confidence_percent(t.confidence());
                    TriageView {
                        condition: t.condition().to_string(),
                        confidence_percent: percent,
                        label: format!("{} ({percent}%)", t.condition()),
                    }
                });
                let deep_label = model.triage.as_ref().map_or_else(
                    || DEEP_SEARCH_LABEL.to_string(),
                    |t| format!("{DEEP_SEARCH_LABEL} on {}", t.condition()),
                );
                ViewState::FastTriage {
                    triage,
                    rerun: analyze_action(model, RERUN_LABEL),
                    deep_search: ActionView::new(deep_label, deep_search_enabled(model)),
                }
            }

            View::DeepSearch => {
                let waiting = model.pending_chat_reply;
                ViewState::DeepSearch {
                    context: model.chat_context.clone(),
                    messages: model
                        .transcript
                        .messages()
                        .iter()
                        .map(|m| MessageView {
                            sender: m.sender(),
                            text: m.text().to_string(),
                            format: match m.sender() {
                                Sender::User => MessageFormat::Plain,
                                Sender::Assistant => MessageFormat::Markdown,
                            },
                        })
                        .collect(),
                    is_typing: waiting,
                    suggestions: suggestions_for(model.chat_context.as_deref())
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    suggestions_enabled: !waiting,
                    input: model.chat_input.clone(),
                    can_send: !waiting && !model.chat_input.trim().is_empty(),
                }
            }
        };

        let preview = model
            .preview
            .current()
            .zip(model.selected_image.as_ref())
            .map(|(handle, image)| PreviewView {
                handle: handle.as_str().to_string(),
                alt: image.file_name().to_string(),
            });

        let base = model.api.base().map(ToString::to_string);
        let api = ApiStatusView {
            configured: base.is_some(),
            label: if base.is_some() { "API ok" } else { "API not set" }.to_string(),
            base,
        };

        ViewModel {
            state,
            preview,
            api,
            location: LocationView {
                state: model.location.state(),
                has_hint: model.location.hint().is_some(),
            },
            error: model.active_error.as_ref().map(UserFacingError::from),
            can_change_image: model.selected_image.is_some(),
        }
    }
}

fn analyze_action(model: &Model, idle_label: &str) -> ActionView {
    if model.pending_analysis {
        ActionView::new(PENDING_LABEL, false)
    } else {
        ActionView::new(idle_label, model.selected_image.is_some())
    }
}

fn deep_search_enabled(model: &Model) -> bool {
    model.selected_image.is_some() && !model.pending_analysis
}
