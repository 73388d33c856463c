use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::{AppPreview, PickedImage};
use crate::config::ApiConfig;
use crate::event::PreviewHandle;
use crate::location::LocationProbe;
use crate::resource_guard::ResourceGuard;
use crate::{AppError, GENERIC_CHAT_SUBJECT};

/// The image the session is working on. Owned bytes plus file name.
pub type SelectedImage = PickedImage;

#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Landing,
    Preview,
    FastTriage,
    DeepSearch,
}

impl View {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            View::Landing => "landing",
            View::Preview => "preview",
            View::FastTriage => "fast_triage",
            View::DeepSearch => "deep_search",
        }
    }

    /// Views from which a quick analysis may be (re-)run.
    #[must_use]
    pub fn accepts_analysis(self) -> bool {
        matches!(self, View::Preview | View::FastTriage)
    }
}

/// Monotonic generation counter. Requests carry the value current at
/// issuance; completions with an older value are stale.
#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionEpoch(u64);

impl SessionEpoch {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// Immutable once appended.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    sender: Sender,
    text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn sender(&self) -> Sender {
        self.sender
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Append-only within a chat sub-session. Only a new sub-session (or a new
/// image) starts it over.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.0.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn restart(&mut self) {
        self.0.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidTriage {
    #[error("condition is empty")]
    EmptyCondition,
    #[error("confidence {0} is not a finite number")]
    NonFiniteConfidence(f64),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TriageResult {
    condition: String,
    confidence: f64,
}

impl TriageResult {
    /// Confidence is clamped into `[0, 1]`; NaN and infinities are rejected.
    pub fn new(condition: impl Into<String>, confidence: f64) -> Result<Self, InvalidTriage> {
        let condition = condition.into().trim().to_string();
        if condition.is_empty() {
            return Err(InvalidTriage::EmptyCondition);
        }
        if !confidence.is_finite() {
            return Err(InvalidTriage::NonFiniteConfidence(confidence));
        }
        Ok(Self {
            condition,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    #[must_use]
    pub fn condition(&self) -> &str {
        &self.condition
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub view: View,

    // Image + preview ownership
    pub selected_image: Option<SelectedImage>,
    pub preview: ResourceGuard,

    // Quick analysis
    pub triage: Option<TriageResult>,
    pub pending_analysis: bool,

    // Deep search
    pub transcript: Transcript,
    pub chat_input: String,
    pub chat_context: Option<String>,
    pub pending_chat_reply: bool,

    // Staleness guards
    pub session_epoch: SessionEpoch,
    pub image_epoch: SessionEpoch,
    pub chat_epoch: SessionEpoch,

    pub location: LocationProbe,
    pub api: ApiConfig,

    pub active_error: Option<AppError>,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    /// Make `image` the working image. Revokes the previous preview, drops
    /// the triage and the chat, and supersedes anything in flight.
    pub fn select_image(&mut self, image: SelectedImage, preview: &AppPreview) -> PreviewHandle {
        let handle = self.preview.set(preview, &image);
        self.selected_image = Some(image);

        self.triage = None;
        self.pending_analysis = false;
        self.end_chat();

        self.image_epoch.advance();
        self.view = View::Preview;
        self.active_error = None;
        handle
    }

    pub fn commit_triage(&mut self, triage: TriageResult) {
        self.triage = Some(triage);
        if self.view.accepts_analysis() {
            self.view = View::FastTriage;
        }
    }

    /// Open a fresh chat sub-session bound to the current triage.
    pub fn begin_deep_search(&mut self) {
        self.end_chat();
        self.chat_context = self.triage.as_ref().map(|t| t.condition().to_string());
        let subject = self.chat_context.as_deref().unwrap_or(GENERIC_CHAT_SUBJECT);
        self.transcript.push(Message::assistant(seed_message(subject)));
        self.view = View::DeepSearch;
    }

    fn end_chat(&mut self) {
        self.transcript.restart();
        self.chat_context = None;
        self.pending_chat_reply = false;
        self.chat_epoch.advance();
    }

    /// Return to the initial state. Revokes the preview and advances every
    /// epoch so nothing issued before the reset can land afterwards.
    pub fn reset(&mut self, preview: &AppPreview) {
        self.preview.clear(preview);
        let session_epoch = self.session_epoch.next();
        let image_epoch = self.image_epoch.next();
        let chat_epoch = self.chat_epoch.next();
        *self = Self {
            session_epoch,
            image_epoch,
            chat_epoch,
            ..Self::default()
        };
    }
}

#[must_use]
pub fn seed_message(subject: &str) -> String {
    format!("I'm ready to discuss {subject}. You can ask me about common symptoms or treatments.")
}

#[cfg(test)]
mod tests {
    use crux_core::testing::AppTester;

    use super::*;
    use crate::capabilities::Effect;
    use crate::App;

    fn tester() -> AppTester<App, Effect> {
        AppTester::default()
    }

    fn image() -> SelectedImage {
        PickedImage::new("rash.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap()
    }

    #[test]
    fn triage_rejects_garbage() {
        assert_eq!(TriageResult::new("  ", 0.5), Err(InvalidTriage::EmptyCondition));
        assert!(TriageResult::new("Eczema", f64::NAN).is_err());
        assert_eq!(TriageResult::new("Eczema", 1.7).unwrap().confidence(), 1.0);
        assert_eq!(TriageResult::new(" Eczema ", 0.5).unwrap().condition(), "Eczema");
    }

    #[test]
    fn select_image_clears_derived_state() {
        let app = tester();
        let preview = &app.as_ref().preview;
        let mut model = Model::new();
        model.select_image(image(), preview);
        model.commit_triage(TriageResult::new("Eczema", 0.71).unwrap());
        model.begin_deep_search();
        model.pending_chat_reply = true;
        let epoch = model.image_epoch;

        model.select_image(image(), preview);

        assert_eq!(model.view, View::Preview);
        assert!(model.triage.is_none());
        assert!(model.transcript.is_empty());
        assert!(model.chat_context.is_none());
        assert!(!model.pending_chat_reply);
        assert!(model.image_epoch > epoch);

        model.reset(preview);
    }

    #[test]
    fn deep_search_seed_names_the_condition() {
        let app = tester();
        let preview = &app.as_ref().preview;
        let mut model = Model::new();
        model.select_image(image(), preview);
        model.commit_triage(TriageResult::new("Eczema", 0.71).unwrap());
        model.begin_deep_search();

        assert_eq!(model.transcript.len(), 1);
        let seed = &model.transcript.messages()[0];
        assert_eq!(seed.sender(), Sender::Assistant);
        assert!(seed.text().contains("Eczema"));
        assert_eq!(model.chat_context.as_deref(), Some("Eczema"));

        model.reset(preview);
    }

    #[test]
    fn deep_search_without_triage_uses_placeholder() {
        let app = tester();
        let preview = &app.as_ref().preview;
        let mut model = Model::new();
        model.select_image(image(), preview);
        model.begin_deep_search();

        assert!(model.transcript.messages()[0]
            .text()
            .contains(GENERIC_CHAT_SUBJECT));
        assert!(model.chat_context.is_none());

        model.reset(preview);
    }

    #[test]
    fn commit_in_deep_search_keeps_the_view() {
        let mut model = Model::new();
        model.view = View::DeepSearch;
        model.commit_triage(TriageResult::new("Psoriasis", 0.4).unwrap());
        assert_eq!(model.view, View::DeepSearch);
        assert!(model.triage.is_some());
    }

    #[test]
    fn reset_advances_epochs() {
        let app = tester();
        let preview = &app.as_ref().preview;
        let mut model = Model::new();
        model.select_image(image(), preview);
        let (session_epoch, image_epoch, chat_epoch) =
            (model.session_epoch, model.image_epoch, model.chat_epoch);

        model.reset(preview);

        assert_eq!(model.view, View::Landing);
        assert!(model.selected_image.is_none());
        assert!(!model.preview.is_live());
        assert!(model.session_epoch > session_epoch);
        assert!(model.image_epoch > image_epoch);
        assert!(model.chat_epoch > chat_epoch);
    }

    #[test]
    fn selecting_an_image_keeps_the_session_epoch() {
        let app = tester();
        let preview = &app.as_ref().preview;
        let mut model = Model::new();
        let session_epoch = model.session_epoch;

        model.select_image(image(), preview);
        model.select_image(image(), preview);

        assert_eq!(model.session_epoch, session_epoch);
        model.reset(preview);
    }
}
