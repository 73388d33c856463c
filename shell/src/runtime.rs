use std::sync::Arc;
use std::time::Duration;

use derma_core::capabilities::{
    Capabilities, GeolocationOperation, GeolocationResult, HttpRequest, HttpResult,
    PickerOperation, PickerResult,
};
use derma_core::{App, Core, Effect, Event, LocationUnavailable, Request, ViewModel};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::ShellConfig;
use crate::http::{ReqwestTransport, Transport};
use crate::location::{LocationProvider, Unsupported};
use crate::picker::{ImageSource, NoImageSource};
use crate::preview::PreviewRegistry;

/// A request together with the output the platform produced for it.
enum Resolution {
    Http(Request<HttpRequest>, HttpResult),
    Geolocation(Request<GeolocationOperation>, GeolocationResult),
    Picker(Request<PickerOperation>, PickerResult),
}

impl Resolution {
    fn name(&self) -> &'static str {
        match self {
            Resolution::Http(..) => "http",
            Resolution::Geolocation(..) => "geolocation",
            Resolution::Picker(..) => "picker",
        }
    }
}

/// Drives a Crux [`Core`]: events are processed synchronously, effects that
/// need I/O run as tokio tasks and their outputs resolve the original request.
pub struct Shell {
    core: Core<Effect, App>,
    config: ShellConfig,
    transport: Arc<dyn Transport>,
    location: Arc<dyn LocationProvider>,
    images: Arc<dyn ImageSource>,
    previews: PreviewRegistry,
    tasks: JoinSet<Resolution>,
    view_tx: watch::Sender<ViewModel>,
}

impl Shell {
    #[must_use]
    pub fn new(config: ShellConfig) -> Self {
        let core = Core::new::<Capabilities>();
        let (view_tx, _) = watch::channel(core.view());
        let transport = ReqwestTransport::new().with_timeout(config.http_timeout);
        Self {
            core,
            config,
            transport: Arc::new(transport),
            location: Arc::new(Unsupported),
            images: Arc::new(NoImageSource),
            previews: PreviewRegistry::new(),
            tasks: JoinSet::new(),
            view_tx,
        }
    }

    #[must_use]
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl LocationProvider + 'static) -> Self {
        self.location = Arc::new(location);
        self
    }

    #[must_use]
    pub fn with_image_source(mut self, images: impl ImageSource + 'static) -> Self {
        self.images = Arc::new(images);
        self
    }

    /// Mount the session, and fetch the static config document if one is
    /// configured.
    #[instrument(skip(self))]
    pub fn start(&mut self) {
        info!(
            api_base = self.config.api_base.as_deref().unwrap_or("<unset>"),
            "starting session"
        );
        self.dispatch(Event::Mounted(self.config.session_config()));
        if let Some(url) = self.config.config_url.clone() {
            self.dispatch(Event::ConfigLoadRequested { url });
        }
    }

    #[instrument(skip_all, fields(event = event.name()))]
    pub fn dispatch(&mut self, event: Event) {
        let effects = self.core.process_event(event);
        self.run_all(effects);
    }

    fn run_all(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.run(effect);
        }
    }

    fn run(&mut self, effect: Effect) {
        match effect {
            Effect::Render(_) => {
                self.view_tx.send_replace(self.core.view());
            }

            Effect::Preview(request) => {
                if let Err(err) = self.previews.apply(request.operation) {
                    warn!(error = %err, "preview operation rejected");
                }
            }

            Effect::Http(request) => {
                let transport = Arc::clone(&self.transport);
                self.tasks.spawn(async move {
                    let result = transport.execute(request.operation.clone()).await;
                    Resolution::Http(request, result)
                });
            }

            Effect::Geolocation(request) => {
                let GeolocationOperation::CurrentPosition {
                    timeout_ms,
                    high_accuracy,
                } = request.operation;
                let location = Arc::clone(&self.location);
                self.tasks.spawn(async move {
                    let lookup = location.current_position(high_accuracy);
                    let result = tokio::time::timeout(Duration::from_millis(timeout_ms), lookup)
                        .await
                        .unwrap_or(Err(LocationUnavailable::Timeout));
                    Resolution::Geolocation(request, result)
                });
            }

            Effect::Picker(request) => {
                let images = Arc::clone(&self.images);
                self.tasks.spawn(async move {
                    let result = match &request.operation {
                        PickerOperation::PickImage { config } => images.pick(config).await,
                        PickerOperation::CapturePhoto { config } => images.capture(config).await,
                    };
                    Resolution::Picker(request, result)
                });
            }
        }
    }

    #[instrument(skip_all, fields(effect = resolution.name()))]
    fn resolve(&mut self, resolution: Resolution) {
        let effects = match resolution {
            Resolution::Http(mut request, result) => self.core.resolve(&mut request, result),
            Resolution::Geolocation(mut request, result) => {
                self.core.resolve(&mut request, result)
            }
            Resolution::Picker(mut request, result) => self.core.resolve(&mut request, result),
        };
        self.run_all(effects);
    }

    /// Feed back completions until nothing is in flight.
    #[instrument(skip(self), fields(in_flight = self.tasks.len()))]
    pub async fn settle(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(resolution) => self.resolve(resolution),
                Err(err) if err.is_cancelled() => debug!("effect task cancelled"),
                Err(err) => warn!(error = %err, "effect task failed"),
            }
        }
    }

    /// Tear the session down. Results still in flight are abandoned.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) {
        self.dispatch(Event::Unmounted);
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        info!(live_previews = self.previews.live_count(), "session stopped");
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.view_tx.subscribe()
    }

    #[must_use]
    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    #[must_use]
    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }
}
