//! Conversational gateway: `POST {api_base}/chat`.

use crux_http::http::Method;
use crux_http::Response;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::analysis::body_snippet;
use crate::config::ApiBase;
use crate::event::{ChatTag, Event};
use crate::model::{Message, Model, View};
use crate::{Capabilities, ChatError, CHAT_FALLBACK_REPLY, CHAT_PATH};

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    message: &'a str,
    context: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    reply: String,
}

impl From<crux_http::Error> for ChatError {
    fn from(err: crux_http::Error) -> Self {
        match err {
            crux_http::Error::Http(http) => ChatError::Status {
                status: u16::from(http.code),
                body: http.body.as_deref().and_then(body_snippet),
            },
            crux_http::Error::Json(reason) => ChatError::Malformed(reason),
            crux_http::Error::Url(reason) => ChatError::InvalidRequest(reason),
            crux_http::Error::Io(reason) => ChatError::Transport(reason),
            crux_http::Error::Timeout => ChatError::Timeout,
        }
    }
}

pub fn chat_url(base: &ApiBase) -> Result<Url, ChatError> {
    Url::parse(&base.endpoint(CHAT_PATH)).map_err(|e| ChatError::InvalidRequest(e.to_string()))
}

fn parse_response(result: crux_http::Result<Response<ChatResponseBody>>) -> Result<String, ChatError> {
    let mut response = result?;
    response
        .take_body()
        .map(|body| body.reply)
        .ok_or_else(|| ChatError::Malformed("empty response body".to_string()))
}

pub(crate) fn start_deep_search(model: &mut Model, caps: &Capabilities) {
    if model.selected_image.is_none() {
        debug!("deep search needs a selected image");
        return;
    }
    if !model.view.accepts_analysis() {
        debug!(view = model.view.as_str(), "deep search not available from this view");
        return;
    }
    if model.pending_analysis {
        debug!("deep search unavailable while analysis is in flight");
        return;
    }

    model.begin_deep_search();
    info!(context = ?model.chat_context, "deep search started");
    caps.render.render();
}

/// Send `direct` if given (a suggested prompt), otherwise the input field.
pub(crate) fn send(model: &mut Model, caps: &Capabilities, direct: Option<String>) {
    if model.view != View::DeepSearch {
        debug!(view = model.view.as_str(), "chat is only available in deep search");
        return;
    }
    if model.pending_chat_reply {
        debug!("chat reply already pending; ignoring send");
        return;
    }

    let text = direct.unwrap_or_else(|| model.chat_input.clone());
    if text.trim().is_empty() {
        debug!("ignoring blank chat message");
        return;
    }

    model.transcript.push(Message::user(text.clone()));
    model.chat_input.clear();

    let tag = ChatTag {
        image_epoch: model.image_epoch,
        chat_epoch: model.chat_epoch,
    };
    let body = ChatRequestBody {
        message: &text,
        context: model.chat_context.as_deref(),
    };
    let request = model
        .api
        .base()
        .ok_or(ChatError::NotConfigured)
        .and_then(chat_url)
        .and_then(|url| {
            caps.http
                .request(Method::Post, url)
                .body_json(&body)
                .map_err(ChatError::from)
        });

    let request = match request {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "chat request not sent");
            model.transcript.push(Message::assistant(CHAT_FALLBACK_REPLY));
            caps.render.render();
            return;
        }
    };

    debug!(
        image_epoch = tag.image_epoch.value(),
        chat_epoch = tag.chat_epoch.value(),
        "issuing chat request"
    );
    model.pending_chat_reply = true;
    request
        .expect_json::<ChatResponseBody>()
        .send(move |result| Event::ChatReplyReceived {
            tag,
            result: Box::new(parse_response(result)),
        });
    caps.render.render();
}

pub(crate) fn complete(
    model: &mut Model,
    tag: ChatTag,
    result: Result<String, ChatError>,
    caps: &Capabilities,
) {
    if tag.image_epoch != model.image_epoch || tag.chat_epoch != model.chat_epoch {
        debug!("discarding chat reply for a closed chat session");
        return;
    }

    model.pending_chat_reply = false;
    let reply = match result {
        Ok(reply) => reply,
        Err(err) => {
            warn!(error = %err, "chat request failed");
            CHAT_FALLBACK_REPLY.to_string()
        }
    };
    model.transcript.push(Message::assistant(reply));
    caps.render.render();
}

#[cfg(test)]
mod tests {
    use crux_http::testing::ResponseBuilder;

    use super::*;

    #[test]
    fn url_keeps_the_base_prefix() {
        let base = ApiBase::parse("https://derma.example.com/api/").unwrap();
        assert_eq!(
            chat_url(&base).unwrap().as_str(),
            "https://derma.example.com/api/chat"
        );
    }

    #[test]
    fn missing_context_serializes_as_null() {
        let body = serde_json::to_value(ChatRequestBody {
            message: "hi",
            context: None,
        })
        .unwrap();
        assert_eq!(body["message"], "hi");
        assert!(body["context"].is_null());
    }

    #[test]
    fn reply_is_returned_verbatim() {
        let reply = parse_response(Ok(ResponseBuilder::ok()
            .body(ChatResponseBody {
                reply: "**Triggers** include <b>stress</b>.".to_string(),
            })
            .build()));
        assert_eq!(reply.unwrap(), "**Triggers** include <b>stress</b>.");
    }

    #[test]
    fn failures_are_typed() {
        assert_eq!(
            parse_response(Err(crux_http::Error::Timeout)),
            Err(ChatError::Timeout)
        );
        assert!(matches!(
            parse_response(Err(crux_http::Error::Json("missing field `reply`".into()))),
            Err(ChatError::Malformed(_))
        ));
        assert!(matches!(
            parse_response(Err(crux_http::Error::Io("refused".into()))),
            Err(ChatError::Transport(_))
        ));
    }
}
