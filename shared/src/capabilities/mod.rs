mod geolocation;
mod picker;
mod preview;

pub use self::geolocation::{Geolocation, GeolocationOperation, GeolocationResult};
pub use self::picker::{
    PickConfig, PickedImage, Picker, PickerError, PickerOperation, PickerOutput, PickerResult,
};
pub use self::preview::{Preview, PreviewOperation};

// Render and HTTP come straight from Crux.
pub use crux_core::render::{Render, RenderOperation};
pub use crux_http::protocol::{HttpHeader, HttpRequest, HttpResponse, HttpResult};
pub use crux_http::Http;

use crux_core::capability::{Capability, ProtoContext};
use crux_core::Request;
use serde::Serialize;

use crate::app::App;
use crate::event::Event;

pub type AppHttp = Http<Event>;
pub type AppRender = Render<Event>;
pub type AppPicker = Picker<Event>;
pub type AppGeolocation = Geolocation<Event>;
pub type AppPreview = Preview<Event>;

pub struct Capabilities {
    pub http: AppHttp,
    pub render: AppRender,
    pub picker: AppPicker,
    pub geolocation: AppGeolocation,
    pub preview: AppPreview,
}

#[derive(Debug)]
pub enum Effect {
    Http(Request<<AppHttp as Capability<Event>>::Operation>),
    Render(Request<<AppRender as Capability<Event>>::Operation>),
    Picker(Request<<AppPicker as Capability<Event>>::Operation>),
    Geolocation(Request<<AppGeolocation as Capability<Event>>::Operation>),
    Preview(Request<<AppPreview as Capability<Event>>::Operation>),
}

/// Serializable mirror of [`Effect`] for FFI shells.
#[derive(Serialize)]
#[serde(rename = "Effect")]
pub enum EffectFfi {
    Http(HttpRequest),
    Render(RenderOperation),
    Picker(PickerOperation),
    Geolocation(GeolocationOperation),
    Preview(PreviewOperation),
}

impl crux_core::Effect for Effect {
    type Ffi = EffectFfi;

    fn serialize(self) -> (Self::Ffi, crux_core::bridge::ResolveSerialized) {
        match self {
            Effect::Http(request) => request.serialize(EffectFfi::Http),
            Effect::Render(request) => request.serialize(EffectFfi::Render),
            Effect::Picker(request) => request.serialize(EffectFfi::Picker),
            Effect::Geolocation(request) => request.serialize(EffectFfi::Geolocation),
            Effect::Preview(request) => request.serialize(EffectFfi::Preview),
        }
    }
}

impl crux_core::WithContext<App, Effect> for Capabilities {
    fn new_with_context(context: ProtoContext<Effect, Event>) -> Capabilities {
        Capabilities {
            http: Http::new(context.specialize(Effect::Http)),
            render: Render::new(context.specialize(Effect::Render)),
            picker: Picker::new(context.specialize(Effect::Picker)),
            geolocation: Geolocation::new(context.specialize(Effect::Geolocation)),
            preview: Preview::new(context.specialize(Effect::Preview)),
        }
    }
}

macro_rules! effect_accessors {
    ($is:ident, $into:ident, $variant:ident, $op:ty) => {
        impl Effect {
            #[must_use]
            pub fn $is(&self) -> bool {
                matches!(self, Effect::$variant(_))
            }

            #[must_use]
            pub fn $into(self) -> Option<Request<$op>> {
                match self {
                    Effect::$variant(request) => Some(request),
                    _ => None,
                }
            }
        }
    };
}

effect_accessors!(is_http, into_http, Http, HttpRequest);
effect_accessors!(is_render, into_render, Render, RenderOperation);
effect_accessors!(is_picker, into_picker, Picker, PickerOperation);
effect_accessors!(is_geolocation, into_geolocation, Geolocation, GeolocationOperation);
effect_accessors!(is_preview, into_preview, Preview, PreviewOperation);
