pub mod analysis;
pub mod chat;

use crux_http::http::Method;
use tracing::{debug, info, warn};
use url::Url;

use crate::capabilities::{PickConfig, PickerOutput};
use crate::config::{parse_static_config, ApiConfig, ConfigError, SessionConfig};
use crate::event::Event;
use crate::location::LocationProbe;
use crate::model::{Model, SelectedImage, SessionEpoch};
use crate::view::ViewModel;
use crate::{AppError, Capabilities};

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(
            event = event.name(),
            completion = event.is_completion(),
            view = model.view.as_str(),
            "update"
        );

        match event {
            Event::Mounted(config) => Self::mount(config, model, caps),

            Event::Unmounted => {
                model.reset(&caps.preview);
                info!("session torn down");
            }

            Event::ConfigLoadRequested { url } => match Url::parse(&url) {
                Ok(url) => {
                    let epoch = model.session_epoch;
                    caps.http.request(Method::Get, url).send(move |result| {
                        let result = result
                            .map_err(|err| ConfigError::Fetch(err.to_string()))
                            .and_then(|mut response| {
                                parse_static_config(&response.take_body().unwrap_or_default())
                            });
                        Event::ConfigLoaded {
                            epoch,
                            result: Box::new(result),
                        }
                    });
                }
                Err(err) => warn!(%url, error = %err, "config URL rejected"),
            },

            Event::ConfigLoaded { epoch, result } => {
                if !Self::is_current(model, epoch, "config") {
                    return;
                }
                Self::apply_static_config(*result, model);
                caps.render.render();
            }

            Event::OpenPicker => {
                let epoch = model.session_epoch;
                caps.picker
                    .pick_image(PickConfig::default(), move |result| Event::PickerResolved {
                        epoch,
                        result: Box::new(result),
                    });
            }

            Event::CapturePhotoRequested => {
                let epoch = model.session_epoch;
                caps.picker
                    .capture_photo(PickConfig::default(), move |result| {
                        Event::PickerResolved {
                            epoch,
                            result: Box::new(result),
                        }
                    });
            }

            Event::PickerResolved { epoch, result } => {
                if !Self::is_current(model, epoch, "picker") {
                    return;
                }
                match *result {
                    Ok(PickerOutput::Picked(image)) => Self::select_image(image, model, caps),
                    Ok(PickerOutput::Cancelled) => debug!("picker cancelled"),
                    Err(err) => {
                        warn!(error = %err, "image pick failed");
                        model.set_error(AppError::from(&err));
                        caps.render.render();
                    }
                }
            }

            Event::ImagePicked(image) => Self::select_image(*image, model, caps),

            Event::AnalysisRequested => analysis::request(model, caps),

            Event::AnalysisCompleted { epoch, result } => {
                analysis::complete(model, epoch, *result, caps);
            }

            Event::StartDeepSearch => chat::start_deep_search(model, caps),

            Event::ChatInputChanged { text } => {
                if model.pending_chat_reply {
                    debug!("input locked while a reply is pending");
                    return;
                }
                model.chat_input = text;
                caps.render.render();
            }

            Event::SendMessage => chat::send(model, caps, None),

            Event::SuggestedPromptSelected { prompt } => chat::send(model, caps, Some(prompt)),

            Event::ChatReplyReceived { tag, result } => chat::complete(model, tag, *result, caps),

            Event::LocationProbeRequested => {
                let session = model.session_epoch;
                model.location.reprobe(&caps.geolocation, session);
            }

            Event::LocationResolved { epoch, result } => {
                if model.location.settle(epoch, *result) {
                    caps.render.render();
                }
            }

            Event::DismissError => {
                model.clear_error();
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from_model(model)
    }
}

impl App {
    fn mount(config: SessionConfig, model: &mut Model, caps: &Capabilities) {
        model.reset(&caps.preview);

        model.api = match ApiConfig::from_raw(config.api_base.as_deref()) {
            Ok(api) => api,
            Err(err) => {
                warn!(error = %err, "ignoring unusable API base");
                ApiConfig::NotConfigured
            }
        };
        match model.api.base() {
            Some(base) => info!(api_base = %base, "API configured"),
            None => info!("API not configured"),
        }

        let session = model.session_epoch;
        model.location = LocationProbe::new(config.location_timeout_ms);
        model.location.probe(&caps.geolocation, session);
        caps.render.render();
    }

    // Completions issued under an earlier mount must not touch this one.
    fn is_current(model: &Model, epoch: SessionEpoch, what: &'static str) -> bool {
        if epoch == model.session_epoch {
            return true;
        }
        debug!(
            what,
            issued = epoch.value(),
            current = model.session_epoch.value(),
            "discarding completion from an earlier session"
        );
        false
    }

    fn apply_static_config(result: Result<ApiConfig, ConfigError>, model: &mut Model) {
        match result {
            Ok(ApiConfig::NotConfigured) => debug!("config document has no API base"),
            Ok(api) => {
                if let Some(base) = api.base() {
                    info!(api_base = %base, "API configured from config document");
                }
                model.api = api;
            }
            Err(ConfigError::Fetch(reason)) => warn!(%reason, "config fetch failed"),
            Err(err) => warn!(error = %err, "config document ignored"),
        }
    }

    fn select_image(image: SelectedImage, model: &mut Model, caps: &Capabilities) {
        info!(
            file_name = image.file_name(),
            mime_type = image.mime_type(),
            bytes = image.len(),
            "image selected"
        );
        model.select_image(image, &caps.preview);
        caps.render.render();
    }
}
