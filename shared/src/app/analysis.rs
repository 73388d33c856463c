//! Quick-classification gateway: `POST {api_base}/analyze/quick`.

use crux_http::http::Method;
use crux_http::Response;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ApiBase;
use crate::event::Event;
use crate::location::Coordinates;
use crate::model::{Model, SelectedImage, SessionEpoch, TriageResult};
use crate::{AnalysisError, AppError, Capabilities, ANALYZE_PATH, IMAGE_FIELD_NAME};

const ERROR_BODY_SNIPPET_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    condition: String,
    confidence: f64,
}

impl From<crux_http::Error> for AnalysisError {
    fn from(err: crux_http::Error) -> Self {
        match err {
            crux_http::Error::Http(http) => AnalysisError::Status {
                status: u16::from(http.code),
                body: http.body.as_deref().and_then(body_snippet),
            },
            crux_http::Error::Json(reason) => AnalysisError::Malformed(reason),
            crux_http::Error::Url(reason) => AnalysisError::InvalidRequest(reason),
            crux_http::Error::Io(reason) => AnalysisError::Transport(reason),
            crux_http::Error::Timeout => AnalysisError::Timeout,
        }
    }
}

pub(crate) fn body_snippet(body: &[u8]) -> Option<String> {
    let text: String = String::from_utf8_lossy(body)
        .chars()
        .take(ERROR_BODY_SNIPPET_CHARS)
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// A `multipart/form-data` body, encoded in the core so shells only ever
/// send raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: format!("----derma-{}", uuid::Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    /// Append a file part. Quotes and line breaks in the file name would
    /// break the part header, so they are replaced.
    #[must_use]
    pub fn file(mut self, field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        let file_name: String = file_name
            .chars()
            .map(|c| if matches!(c, '"' | '\r' | '\n' | '\\') { '_' } else { c })
            .collect();

        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        self.body
            .extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Close the form and return the encoded body.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

/// The analysis endpoint, with the location hint as query parameters when
/// one is known.
pub fn analysis_url(base: &ApiBase, hint: Option<Coordinates>) -> Result<Url, AnalysisError> {
    let mut url = Url::parse(&base.endpoint(ANALYZE_PATH))
        .map_err(|e| AnalysisError::InvalidRequest(e.to_string()))?;
    if let Some(coords) = hint {
        url.query_pairs_mut().extend_pairs(coords.query_pairs());
    }
    Ok(url)
}

#[must_use]
pub fn upload_form(image: &SelectedImage) -> MultipartForm {
    MultipartForm::new().file(
        IMAGE_FIELD_NAME,
        image.file_name(),
        image.mime_type(),
        image.data(),
    )
}

/// All-or-nothing: either a complete triage result or an error.
fn parse_response(
    result: crux_http::Result<Response<AnalyzeResponse>>,
) -> Result<TriageResult, AnalysisError> {
    let mut response = result?;
    let body = response
        .take_body()
        .ok_or_else(|| AnalysisError::Malformed("empty response body".to_string()))?;

    TriageResult::new(body.condition, body.confidence)
        .map_err(|e| AnalysisError::Malformed(e.to_string()))
}

pub(crate) fn request(model: &mut Model, caps: &Capabilities) {
    if model.pending_analysis {
        debug!("analysis already in flight; ignoring request");
        return;
    }
    if !model.view.accepts_analysis() {
        debug!(view = model.view.as_str(), "analysis not available from this view");
        return;
    }
    let Some(image) = model.selected_image.as_ref() else {
        debug!("no image selected; ignoring analysis request");
        return;
    };

    let Some(base) = model.api.base() else {
        warn!("analysis requested but no API base is configured");
        model.set_error(AppError::from(&AnalysisError::NotConfigured));
        caps.render.render();
        return;
    };

    let hint = model.location.hint();
    let url = match analysis_url(base, hint) {
        Ok(url) => url,
        Err(err) => {
            warn!(error = %err, "could not build analysis request");
            model.set_error(AppError::from(&err));
            caps.render.render();
            return;
        }
    };
    let form = upload_form(image);

    let epoch = model.image_epoch;
    info!(
        epoch = epoch.value(),
        bytes = image.len(),
        with_location = hint.is_some(),
        "issuing quick analysis"
    );

    model.pending_analysis = true;
    model.clear_error();
    caps.http
        .request(Method::Post, url)
        .header("Content-Type", form.content_type())
        .body_bytes(form.finish())
        .expect_json::<AnalyzeResponse>()
        .send(move |result| Event::AnalysisCompleted {
            epoch,
            result: Box::new(parse_response(result)),
        });
    caps.render.render();
}

pub(crate) fn complete(
    model: &mut Model,
    epoch: SessionEpoch,
    result: Result<TriageResult, AnalysisError>,
    caps: &Capabilities,
) {
    if epoch != model.image_epoch {
        debug!(
            issued = epoch.value(),
            current = model.image_epoch.value(),
            "discarding stale analysis result"
        );
        return;
    }

    model.pending_analysis = false;
    match result {
        Ok(triage) => {
            info!(
                condition = triage.condition(),
                confidence = triage.confidence(),
                "triage committed"
            );
            model.commit_triage(triage);
        }
        Err(err) => {
            warn!(error = %err, "quick analysis failed");
            model.set_error(AppError::from(&err));
        }
    }
    caps.render.render();
}
