use assert_matches::assert_matches;
use derma_core::capabilities::{HttpRequest, HttpResponse, HttpResult, PickedImage};
use derma_core::testing::{resolve, Tester, UpdateExt};
use derma_core::{
    Event, LocationUnavailable, Model, Request, Sender, SessionConfig, View, ViewState,
    CHAT_FALLBACK_REPLY,
};

fn png(name: &str) -> PickedImage {
    PickedImage::new(name, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec()).unwrap()
}

fn respond(status: u16, body: &str) -> HttpResult {
    HttpResult::Ok(HttpResponse::status(status).body(body).build())
}

fn json_body(request: &Request<HttpRequest>) -> serde_json::Value {
    serde_json::from_slice(&request.operation.body).unwrap()
}

/// Mounted, image picked, triaged as `condition`.
fn triaged(app: &Tester, api_base: Option<&str>, condition: &str) -> Model {
    let mut model = Model::default();
    let config = match api_base {
        Some(base) => SessionConfig::default().with_api_base(base),
        None => SessionConfig::default(),
    };
    let mut update = app.update(Event::Mounted(config), &mut model);
    let mut lookup = update.take_geolocation().remove(0);
    resolve(app, &mut model, &mut lookup, Err(LocationUnavailable::Timeout));

    app.update(Event::image_picked(png("arm.png")), &mut model);
    model.commit_triage(derma_core::TriageResult::new(condition, 0.8).unwrap());
    model
}

fn texts(model: &Model) -> Vec<(Sender, String)> {
    model
        .transcript
        .messages()
        .iter()
        .map(|m| (m.sender(), m.text().to_string()))
        .collect()
}

#[test]
fn deep_search_seeds_and_chats() {
    let app = Tester::default();
    let mut model = triaged(&app, Some("http://localhost:8001"), "Eczema");

    let update = app.update(Event::StartDeepSearch, &mut model);
    assert!(update.rendered());
    assert_eq!(model.view, View::DeepSearch);
    assert_eq!(model.transcript.len(), 1);
    assert!(model.transcript.messages()[0].text().contains("Eczema"));

    app.update(
        Event::ChatInputChanged {
            text: "Is it contagious?".into(),
        },
        &mut model,
    );
    let mut update = app.update(Event::SendMessage, &mut model);
    let mut request = update.expect_one_http();
    assert!(model.pending_chat_reply);
    assert!(model.chat_input.is_empty());
    assert_eq!(request.operation.method, "POST");
    assert_eq!(request.operation.url, "http://localhost:8001/chat");

    let body = json_body(&request);
    assert_eq!(body["message"], "Is it contagious?");
    assert_eq!(body["context"], "Eczema");

    let ViewState::DeepSearch { is_typing, can_send, suggestions_enabled, .. } =
        app.view(&model).state
    else {
        panic!("expected deep search");
    };
    assert!(is_typing);
    assert!(!can_send);
    assert!(!suggestions_enabled);

    resolve(
        &app,
        &mut model,
        &mut request,
        respond(200, r#"{"reply":"No, it is not."}"#),
    );

    assert!(!model.pending_chat_reply);
    let messages = texts(&model);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1], (Sender::User, "Is it contagious?".into()));
    assert_eq!(messages[2], (Sender::Assistant, "No, it is not.".into()));

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn blank_messages_are_not_sent() {
    let app = Tester::default();
    let mut model = triaged(&app, Some("http://localhost:8001"), "Eczema");
    app.update(Event::StartDeepSearch, &mut model);

    app.update(Event::ChatInputChanged { text: "   ".into() }, &mut model);
    let update = app.update(Event::SendMessage, &mut model);

    assert!(update.effects.is_empty());
    assert_eq!(model.transcript.len(), 1);
    assert_eq!(model.chat_input, "   ");
    assert!(!model.pending_chat_reply);

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn suggested_prompt_sends_directly() {
    let app = Tester::default();
    let mut model = triaged(&app, Some("http://localhost:8001"), "Psoriasis");
    app.update(Event::StartDeepSearch, &mut model);

    let mut update = app.update(
        Event::SuggestedPromptSelected {
            prompt: "Are there different types of Psoriasis?".into(),
        },
        &mut model,
    );
    let request = update.expect_one_http();
    let body = json_body(&request);
    assert_eq!(body["message"], "Are there different types of Psoriasis?");
    assert_eq!(body["context"], "Psoriasis");

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn send_while_reply_pending_is_ignored() {
    let app = Tester::default();
    let mut model = triaged(&app, Some("http://localhost:8001"), "Eczema");
    app.update(Event::StartDeepSearch, &mut model);
    app.update(Event::ChatInputChanged { text: "one".into() }, &mut model);
    let _pending = app.update(Event::SendMessage, &mut model).expect_one_http();

    let locked = app.update(Event::ChatInputChanged { text: "two".into() }, &mut model);
    assert!(locked.effects.is_empty());
    assert!(model.chat_input.is_empty());

    let mut second = app.update(
        Event::SuggestedPromptSelected {
            prompt: "When should I see a doctor for Eczema?".into(),
        },
        &mut model,
    );
    assert!(second.take_http().is_empty());
    assert_eq!(model.transcript.len(), 2);

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn chat_failure_appends_fallback() {
    let app = Tester::default();
    let mut model = triaged(&app, Some("http://localhost:8001"), "Eczema");
    app.update(Event::StartDeepSearch, &mut model);
    app.update(Event::ChatInputChanged { text: "hello".into() }, &mut model);

    let mut request = app.update(Event::SendMessage, &mut model).expect_one_http();
    resolve(
        &app,
        &mut model,
        &mut request,
        HttpResult::Err(crux_http::Error::Io("connection refused".into())),
    );

    assert_eq!(
        model.transcript.last().map(|m| (m.sender(), m.text())),
        Some((Sender::Assistant, CHAT_FALLBACK_REPLY))
    );
    assert!(!model.pending_chat_reply);
    assert!(model.active_error.is_none());

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn unconfigured_chat_answers_locally() {
    let app = Tester::default();
    let mut model = triaged(&app, None, "Eczema");
    app.update(Event::StartDeepSearch, &mut model);
    app.update(Event::ChatInputChanged { text: "hello".into() }, &mut model);

    let mut update = app.update(Event::SendMessage, &mut model);
    assert!(update.take_http().is_empty());
    assert!(update.rendered());

    let messages = texts(&model);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1], (Sender::User, "hello".into()));
    assert_eq!(messages[2], (Sender::Assistant, CHAT_FALLBACK_REPLY.into()));
    assert!(!model.pending_chat_reply);

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn reply_for_previous_chat_session_is_dropped() {
    let app = Tester::default();
    let mut model = triaged(&app, Some("http://localhost:8001"), "Eczema");
    app.update(Event::StartDeepSearch, &mut model);
    app.update(Event::ChatInputChanged { text: "hello".into() }, &mut model);
    let mut stale = app.update(Event::SendMessage, &mut model).expect_one_http();

    // A new image ends the chat; starting over opens a fresh sub-session.
    app.update(Event::image_picked(png("leg.png")), &mut model);
    assert_eq!(model.view, View::Preview);
    assert!(!model.pending_chat_reply);
    app.update(Event::StartDeepSearch, &mut model);
    assert_eq!(model.transcript.len(), 1);

    let update = resolve(&app, &mut model, &mut stale, respond(200, r#"{"reply":"late"}"#));

    assert!(update.effects.is_empty());
    assert_eq!(model.transcript.len(), 1);
    assert!(model.chat_context.is_none());

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn deep_search_requires_an_image_and_no_pending_analysis() {
    let app = Tester::default();
    let mut model = Model::default();
    let update = app.update(Event::StartDeepSearch, &mut model);
    assert!(update.effects.is_empty());
    assert_eq!(model.view, View::Landing);

    let mut model = triaged(&app, Some("http://localhost:8001"), "Eczema");
    let _analysis = app
        .update(Event::AnalysisRequested, &mut model)
        .expect_one_http();
    let update = app.update(Event::StartDeepSearch, &mut model);
    assert!(update.effects.is_empty());
    assert_eq!(model.view, View::FastTriage);

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn chat_is_only_reachable_from_deep_search() {
    let app = Tester::default();
    let mut model = triaged(&app, Some("http://localhost:8001"), "Eczema");
    app.update(Event::ChatInputChanged { text: "hi".into() }, &mut model);

    let update = app.update(Event::SendMessage, &mut model);
    assert!(update.effects.is_empty());
    assert!(model.transcript.is_empty());

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn markdown_in_replies_is_preserved_for_the_shell() {
    let app = Tester::default();
    let mut model = triaged(&app, Some("http://localhost:8001"), "Eczema");
    app.update(Event::StartDeepSearch, &mut model);
    app.update(Event::ChatInputChanged { text: "tips?".into() }, &mut model);
    let mut request = app.update(Event::SendMessage, &mut model).expect_one_http();
    resolve(
        &app,
        &mut model,
        &mut request,
        respond(200, r#"{"reply":"- moisturise\n- <script>x</script>"}"#),
    );

    assert_matches!(
        app.view(&model).state,
        ViewState::DeepSearch { ref messages, .. }
            if messages[2].text == "- moisturise\n- <script>x</script>"
    );

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn pick_analyze_and_discuss() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut update = app.update(
        Event::Mounted(SessionConfig::default().with_api_base("http://localhost:8001")),
        &mut model,
    );
    let mut lookup = update.take_geolocation().remove(0);
    resolve(
        &app,
        &mut model,
        &mut lookup,
        Err(LocationUnavailable::PermissionDenied),
    );

    app.update(Event::image_picked(png("arm.png")), &mut model);
    let mut analysis = app
        .update(Event::AnalysisRequested, &mut model)
        .expect_one_http();
    resolve(
        &app,
        &mut model,
        &mut analysis,
        respond(200, r#"{"condition":"Eczema","confidence":0.71}"#),
    );

    assert_eq!(model.view, View::FastTriage);
    assert_matches!(
        app.view(&model).state,
        ViewState::FastTriage { triage: Some(ref t), .. } if t.label == "Eczema (71%)"
    );

    app.update(Event::StartDeepSearch, &mut model);
    assert_eq!(model.transcript.len(), 1);
    assert!(model.transcript.messages()[0].text().contains("Eczema"));

    app.update(
        Event::ChatInputChanged {
            text: "What are common Eczema triggers?".into(),
        },
        &mut model,
    );
    let mut chat = app.update(Event::SendMessage, &mut model).expect_one_http();
    assert_eq!(
        texts(&model).last(),
        Some(&(Sender::User, "What are common Eczema triggers?".to_string()))
    );

    resolve(
        &app,
        &mut model,
        &mut chat,
        respond(200, r#"{"reply":"Common triggers include dry skin and stress."}"#),
    );

    let messages = texts(&model);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].0, Sender::Assistant);

    app.update(Event::Unmounted, &mut model);
}

#[test]
fn server_error_reply_falls_back() {
    let app = Tester::default();
    let mut model = triaged(&app, Some("http://localhost:8001"), "Eczema");
    app.update(Event::StartDeepSearch, &mut model);
    app.update(Event::ChatInputChanged { text: "hello".into() }, &mut model);

    let mut request = app.update(Event::SendMessage, &mut model).expect_one_http();
    resolve(&app, &mut model, &mut request, respond(503, "overloaded"));

    assert_eq!(
        texts(&model).last(),
        Some(&(Sender::Assistant, CHAT_FALLBACK_REPLY.to_string()))
    );
    assert!(model.active_error.is_none());

    app.update(Event::Unmounted, &mut model);
}
