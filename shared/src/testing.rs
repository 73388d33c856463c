//! Helpers on top of Crux's `AppTester`: pull typed requests out of an
//! update, resolve them, and run the events they produce back through the
//! app the way a shell would.

use std::collections::VecDeque;

use crux_core::capability::Operation;
use crux_core::testing::{AppTester, Update};
use crux_core::Request;

use crate::capabilities::{GeolocationOperation, HttpRequest, PickerOperation, PreviewOperation};
use crate::{App, Effect, Event, Model};

pub type Tester = AppTester<App, Effect>;
pub type AppUpdate = Update<Effect, Event>;

macro_rules! take_requests {
    ($fn_name:ident, $into:ident, $op:ty) => {
        fn $fn_name(&mut self) -> Vec<Request<$op>> {
            let mut taken = Vec::new();
            let mut rest = Vec::new();
            for effect in std::mem::take(&mut self.effects) {
                if let Effect::$into(request) = effect {
                    taken.push(request);
                } else {
                    rest.push(effect);
                }
            }
            self.effects = rest;
            taken
        }
    };
}

pub trait UpdateExt {
    fn rendered(&self) -> bool;
    fn take_http(&mut self) -> Vec<Request<HttpRequest>>;
    fn take_picker(&mut self) -> Vec<Request<PickerOperation>>;
    fn take_geolocation(&mut self) -> Vec<Request<GeolocationOperation>>;
    fn take_preview(&mut self) -> Vec<Request<PreviewOperation>>;

    /// Preview operations in emission order.
    fn preview_ops(&mut self) -> Vec<PreviewOperation> {
        self.take_preview()
            .into_iter()
            .map(|request| request.operation)
            .collect()
    }

    /// The single HTTP request this update issued.
    ///
    /// # Panics
    /// If there is not exactly one.
    fn expect_one_http(&mut self) -> Request<HttpRequest> {
        let mut requests = self.take_http();
        assert_eq!(requests.len(), 1, "expected exactly one http request");
        requests.remove(0)
    }
}

impl UpdateExt for AppUpdate {
    fn rendered(&self) -> bool {
        self.effects.iter().any(Effect::is_render)
    }

    take_requests!(take_http, Http, HttpRequest);
    take_requests!(take_picker, Picker, PickerOperation);
    take_requests!(take_geolocation, Geolocation, GeolocationOperation);
    take_requests!(take_preview, Preview, PreviewOperation);
}

/// Feed every event a capability dispatched back into the app until none
/// are left. The returned update holds all effects in emission order.
pub fn run_events(app: &Tester, model: &mut Model, update: AppUpdate) -> AppUpdate {
    let Update { mut effects, events } = update;
    let mut queue: VecDeque<Event> = events.into();
    while let Some(event) = queue.pop_front() {
        let next = app.update(event, model);
        effects.extend(next.effects);
        queue.extend(next.events);
    }
    Update {
        effects,
        events: Vec::new(),
    }
}

/// Resolve `request` with `output`, then run the resulting events.
///
/// # Panics
/// If the request was already resolved or never expected an answer.
pub fn resolve<Op: Operation>(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<Op>,
    output: Op::Output,
) -> AppUpdate {
    let update = app
        .resolve(request, output)
        .expect("request should accept a resolution");
    run_events(app, model, update)
}

/// Run queued capability work without changing anything the user can see.
pub fn flush(app: &Tester) -> AppUpdate {
    app.update(Event::DismissError, &mut Model::default())
}
