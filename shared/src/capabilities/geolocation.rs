use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::location::{Coordinates, LocationUnavailable};

pub struct Geolocation<Ev> {
    context: CapabilityContext<GeolocationOperation, Ev>,
}

impl<Ev> Clone for Geolocation<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Capability<Ev> for Geolocation<Ev> {
    type Operation = GeolocationOperation;
    type MappedSelf<MappedEv> = Geolocation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Geolocation::new(self.context.map_event(f))
    }
}

impl<Ev> Geolocation<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<GeolocationOperation, Ev>) -> Self {
        Self { context }
    }

    /// One-shot position lookup. The shell owns the clock and must resolve
    /// with `LocationUnavailable::Timeout` once `timeout_ms` has elapsed.
    pub fn current_position<F>(&self, timeout_ms: u64, callback: F)
    where
        F: FnOnce(GeolocationResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(GeolocationOperation::CurrentPosition {
                    timeout_ms,
                    high_accuracy: false,
                })
                .await;
            ctx.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeolocationOperation {
    CurrentPosition { timeout_ms: u64, high_accuracy: bool },
}

impl GeolocationOperation {
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        match self {
            GeolocationOperation::CurrentPosition { timeout_ms, .. } => *timeout_ms,
        }
    }
}

impl Operation for GeolocationOperation {
    type Output = GeolocationResult;
}

pub type GeolocationResult = Result<Coordinates, LocationUnavailable>;
