use std::time::Duration;

use async_trait::async_trait;
use derma_core::capabilities::GeolocationResult;
use derma_core::{Coordinates, LocationUnavailable};

/// Source of the device position. The runtime bounds every call with the
/// timeout the core asked for.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self, high_accuracy: bool) -> GeolocationResult;
}

/// Devices without positioning.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

#[async_trait]
impl LocationProvider for Unsupported {
    async fn current_position(&self, _high_accuracy: bool) -> GeolocationResult {
        Err(LocationUnavailable::Unsupported)
    }
}

/// A configured position, optionally answered after a delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coordinates: Coordinates,
    delay: Duration,
}

impl FixedLocation {
    #[must_use]
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self, _high_accuracy: bool) -> GeolocationResult {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.coordinates)
    }
}
