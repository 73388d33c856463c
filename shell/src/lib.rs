//! Native shell for the triage core: runs the effects the core asks for on
//! tokio and feeds the results back in as events.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod http;
pub mod location;
pub mod picker;
pub mod preview;
pub mod runtime;

pub use config::{ShellConfig, ShellConfigError};
pub use http::{ReqwestTransport, Transport};
pub use location::{FixedLocation, LocationProvider, Unsupported};
pub use picker::{FileImageSource, ImageSource, NoImageSource};
pub use preview::{PreviewError, PreviewRegistry};
pub use runtime::Shell;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins; otherwise `info`.
/// Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
