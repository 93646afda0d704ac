//! Location-to-airport resolution.
//!
//! A linear scan over the directory picks the closest airport inside the
//! search radius. When nothing is in range, an optional fallback airport
//! stands in (degraded mode), otherwise the location is rejected.

use serde::Serialize;

use crate::directory::AirportDirectory;
use crate::geo::distance_km;
use crate::types::{AirboardError, AirportRecord, Coordinate, Result};

pub const DEFAULT_RADIUS_KM: f64 = 5.0;
pub const DEFAULT_FALLBACK_CODE: &str = "GRU";

/// Outcome of resolving one coordinate.
///
/// `airport` is `None` only when nothing is in range and fallback is off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub airport: Option<AirportRecord>,
    pub is_fallback: bool,
    /// Distance to the resolved airport. Absent for fallback and rejection.
    pub distance_km: Option<f64>,
}

impl Resolution {
    fn found(airport: &AirportRecord, distance_km: f64) -> Self {
        Resolution {
            airport: Some(airport.clone()),
            is_fallback: false,
            distance_km: Some(distance_km),
        }
    }

    fn fallback(airport: &AirportRecord) -> Self {
        Resolution {
            airport: Some(airport.clone()),
            is_fallback: true,
            distance_km: None,
        }
    }

    fn rejected() -> Self {
        Resolution {
            airport: None,
            is_fallback: false,
            distance_km: None,
        }
    }

    /// No airport: the location is unsupported.
    pub fn is_rejected(&self) -> bool {
        self.airport.is_none()
    }

    /// Fallback results must be confirmed by the user before use.
    pub fn needs_confirmation(&self) -> bool {
        self.is_fallback
    }
}

/// Resolver tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub radius_km: f64,
    pub fallback_enabled: bool,
    pub fallback_code: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            radius_km: DEFAULT_RADIUS_KM,
            fallback_enabled: false,
            fallback_code: DEFAULT_FALLBACK_CODE.into(),
        }
    }
}

/// Find the closest airport within `radius_km` (inclusive).
///
/// Ties go to the entry that appears first in the directory.
pub fn nearest_within<'a>(
    coordinate: &Coordinate,
    directory: &'a AirportDirectory,
    radius_km: f64,
) -> Option<(&'a AirportRecord, f64)> {
    let mut best: Option<(&AirportRecord, f64)> = None;

    for apt in directory.iter() {
        let dist = distance_km(coordinate, &apt.position());
        if dist > radius_km {
            continue;
        }
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((apt, dist)),
        }
    }

    best
}

/// Resolve a coordinate to an airport.
///
/// The only error is a fallback code missing from the directory, which is a
/// configuration fault rather than a property of the coordinate.
pub fn resolve(
    coordinate: &Coordinate,
    directory: &AirportDirectory,
    radius_km: f64,
    fallback_enabled: bool,
    fallback_code: &str,
) -> Result<Resolution> {
    let fallback = if fallback_enabled {
        Some(
            directory
                .get(fallback_code)
                .ok_or_else(|| AirboardError::UnknownFallbackAirport(fallback_code.into()))?,
        )
    } else {
        None
    };
    Ok(resolve_with(coordinate, directory, radius_km, fallback))
}

fn resolve_with(
    coordinate: &Coordinate,
    directory: &AirportDirectory,
    radius_km: f64,
    fallback: Option<&AirportRecord>,
) -> Resolution {
    if let Some((apt, dist)) = nearest_within(coordinate, directory, radius_km) {
        tracing::debug!(code = %apt.code, distance_km = dist, "Nearest airport in range");
        return Resolution::found(apt, dist);
    }

    match fallback {
        Some(apt) => {
            tracing::info!(code = %apt.code, radius_km, "No airport in range, using fallback");
            Resolution::fallback(apt)
        }
        None => {
            tracing::info!(
                lat = coordinate.latitude(),
                lon = coordinate.longitude(),
                radius_km,
                "No airport in range"
            );
            Resolution::rejected()
        }
    }
}

/// Resolver bound to a directory, with settings validated up front.
///
/// Construction fails if the fallback airport is missing, so a running
/// resolver can never hit that configuration error mid-session.
#[derive(Debug, Clone)]
pub struct Resolver {
    directory: AirportDirectory,
    settings: ResolverSettings,
}

impl Resolver {
    pub fn new(directory: AirportDirectory, settings: ResolverSettings) -> Result<Self> {
        if !settings.radius_km.is_finite() || settings.radius_km < 0.0 {
            return Err(AirboardError::Config(format!(
                "search radius must be a non-negative number of km, got {}",
                settings.radius_km
            )));
        }
        if settings.fallback_enabled && directory.get(&settings.fallback_code).is_none() {
            return Err(AirboardError::UnknownFallbackAirport(
                settings.fallback_code.clone(),
            ));
        }
        Ok(Resolver {
            directory,
            settings,
        })
    }

    pub fn resolve(&self, coordinate: &Coordinate) -> Resolution {
        let fallback = if self.settings.fallback_enabled {
            self.directory.get(&self.settings.fallback_code)
        } else {
            None
        };
        resolve_with(coordinate, &self.directory, self.settings.radius_km, fallback)
    }

    pub fn directory(&self) -> &AirportDirectory {
        &self.directory
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
