//! Best-effort ambient location used to enrich analysis requests.
//!
//! Failure to acquire a position is never an error from the user's point of
//! view: every [`LocationUnavailable`] resolves silently to "no hint".

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::capabilities::{AppGeolocation, GeolocationResult};
use crate::event::Event;
use crate::model::SessionEpoch;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("coordinate is not a finite number")]
    NonFinite,
    #[error("latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    #[must_use]
    pub const fn latitude(self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub const fn longitude(self) -> f64 {
        self.longitude
    }

    /// `latitude` / `longitude` query pairs for the analysis endpoint.
    #[must_use]
    pub fn query_pairs(self) -> [(&'static str, String); 2] {
        [
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LocationUnavailable {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location lookup timed out")]
    Timeout,
    #[error("location is not supported on this platform")]
    Unsupported,
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("platform reported invalid coordinates")]
    InvalidCoordinates,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeState {
    #[default]
    Idle,
    Probing,
    Settled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationProbe {
    state: ProbeState,
    hint: Option<Coordinates>,
    timeout_ms: u64,
    // Session the outstanding lookup was issued for.
    issued_in: SessionEpoch,
}

impl Default for LocationProbe {
    fn default() -> Self {
        Self::new(crate::DEFAULT_LOCATION_TIMEOUT_MS)
    }
}

impl LocationProbe {
    #[must_use]
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            state: ProbeState::Idle,
            hint: None,
            timeout_ms: timeout_ms.max(1),
            issued_in: SessionEpoch::default(),
        }
    }

    /// Start the one lookup for this session. Returns whether a lookup was
    /// issued; later calls are no-ops.
    pub fn probe(&mut self, geolocation: &AppGeolocation, session: SessionEpoch) -> bool {
        if self.state != ProbeState::Idle {
            debug!(state = ?self.state, "location already probed; reusing result");
            return false;
        }
        self.issue(geolocation, session);
        true
    }

    /// Look up the position again. The previous hint stays in use until a
    /// new one arrives.
    pub fn reprobe(&mut self, geolocation: &AppGeolocation, session: SessionEpoch) -> bool {
        if self.state == ProbeState::Probing {
            debug!("location lookup already in flight");
            return false;
        }
        self.issue(geolocation, session);
        true
    }

    fn issue(&mut self, geolocation: &AppGeolocation, session: SessionEpoch) {
        self.state = ProbeState::Probing;
        self.issued_in = session;
        geolocation.current_position(self.timeout_ms, move |result| Event::LocationResolved {
            epoch: session,
            result: Box::new(result),
        });
    }

    /// Apply the shell's answer. Results with no lookup outstanding, or
    /// issued for an earlier session, are ignored. Returns whether the
    /// result was applied.
    pub fn settle(&mut self, session: SessionEpoch, result: GeolocationResult) -> bool {
        if self.state != ProbeState::Probing {
            debug!("dropping location result with no lookup outstanding");
            return false;
        }
        if session != self.issued_in {
            debug!(
                issued = session.value(),
                current = self.issued_in.value(),
                "dropping location result from an earlier session"
            );
            return false;
        }
        self.state = ProbeState::Settled;
        match result {
            Ok(coords) => {
                info!(
                    latitude = coords.latitude(),
                    longitude = coords.longitude(),
                    "location hint acquired"
                );
                self.hint = Some(coords);
            }
            Err(reason) => {
                debug!(%reason, "location unavailable; continuing without a hint");
            }
        }
        true
    }

    #[must_use]
    pub fn hint(&self) -> Option<Coordinates> {
        self.hint
    }

    #[must_use]
    pub fn state(&self) -> ProbeState {
        self.state
    }

    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}
