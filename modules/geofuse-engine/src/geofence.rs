//! Hard geographic containment for location candidates.
//!
//! Regions are loaded once (built-in table plus any configured extras) and
//! only read afterwards. A candidate survives when its point lies inside or
//! on the boundary of one of the region's polygons.

use std::collections::HashMap;
use std::sync::LazyLock;

use geo::{Intersects, LineString, MultiPolygon, Point, Polygon};
use tracing::debug;

use geofuse_common::config::GeofenceSpec;
use geofuse_common::{FusionResult, GeofuseError, LocationCandidate};

// ---------------------------------------------------------------------------
// Built-in regions
// ---------------------------------------------------------------------------

type Ring = &'static [[f64; 2]];

/// Simplified department outlines, `[lng, lat]` vertices.
const BUILTIN_REGIONS: &[(&str, &str, &[Ring])] = &[
    (
        "75",
        "Paris",
        &[&[
            [2.2241, 48.8535],
            [2.2520, 48.8390],
            [2.2900, 48.8280],
            [2.3320, 48.8170],
            [2.3900, 48.8240],
            [2.4160, 48.8330],
            [2.4690, 48.8350],
            [2.4670, 48.8450],
            [2.4150, 48.8460],
            [2.4130, 48.8720],
            [2.3990, 48.8850],
            [2.3700, 48.9010],
            [2.3200, 48.9010],
            [2.2800, 48.8800],
            [2.2550, 48.8740],
        ]],
    ),
    (
        "92",
        "Hauts-de-Seine",
        &[&[
            [2.1450, 48.9500],
            [2.2900, 48.9510],
            [2.3200, 48.9010],
            [2.2800, 48.8800],
            [2.2550, 48.8740],
            [2.2241, 48.8535],
            [2.2520, 48.8390],
            [2.2900, 48.8280],
            [2.3320, 48.8170],
            [2.3300, 48.7300],
            [2.2200, 48.7300],
            [2.1450, 48.8100],
        ]],
    ),
    (
        "93",
        "Seine-Saint-Denis",
        &[&[
            [2.3200, 48.9010],
            [2.3700, 48.9010],
            [2.3990, 48.8850],
            [2.4130, 48.8720],
            [2.4150, 48.8460],
            [2.4670, 48.8450],
            [2.6000, 48.8400],
            [2.6030, 48.9400],
            [2.5500, 49.0120],
            [2.4200, 48.9600],
            [2.2900, 48.9510],
        ]],
    ),
    (
        "94",
        "Val-de-Marne",
        &[&[
            [2.3320, 48.8170],
            [2.3900, 48.8240],
            [2.4160, 48.8330],
            [2.4690, 48.8350],
            [2.4670, 48.8450],
            [2.6000, 48.8400],
            [2.6150, 48.8050],
            [2.6000, 48.7000],
            [2.5000, 48.6900],
            [2.3300, 48.7300],
        ]],
    ),
    (
        "69",
        "Rhône",
        &[&[
            [4.24, 45.70],
            [4.39, 45.55],
            [4.76, 45.55],
            [5.16, 45.80],
            [4.92, 45.95],
            [4.88, 46.30],
            [4.30, 46.30],
            [4.25, 45.95],
        ]],
    ),
    (
        "13",
        "Bouches-du-Rhône",
        &[&[
            [4.23, 43.46],
            [4.60, 43.35],
            [5.02, 43.32],
            [5.36, 43.20],
            [5.68, 43.17],
            [5.81, 43.40],
            [5.75, 43.70],
            [5.23, 43.77],
            [4.65, 43.90],
            [4.43, 43.75],
        ]],
    ),
];

static STANDARD: LazyLock<GeofenceRegistry> = LazyLock::new(|| {
    let mut registry = GeofenceRegistry::default();
    for (code, name, rings) in BUILTIN_REGIONS {
        registry.insert(Geofence::from_rings(code, name, rings.iter().copied()));
    }
    registry
});

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A named containment region made of one or more closed polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    pub code: String,
    pub name: String,
    area: MultiPolygon<f64>,
}

/// Counters produced by a filter run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeofenceStats {
    pub kept: u32,
    /// Dropped for missing or non-finite coordinates.
    pub invalid: u32,
    pub outside: u32,
}

impl Geofence {
    fn from_rings<'a>(code: &str, name: &str, rings: impl IntoIterator<Item = &'a [[f64; 2]]>) -> Self {
        let polygons = rings
            .into_iter()
            .map(|ring| {
                let exterior: LineString<f64> =
                    ring.iter().map(|[lng, lat]| (*lng, *lat)).collect::<Vec<_>>().into();
                Polygon::new(exterior, vec![])
            })
            .collect::<Vec<_>>();
        Self {
            code: normalize_code(code),
            name: name.to_string(),
            area: MultiPolygon::new(polygons),
        }
    }

    /// Build from configuration, rejecting degenerate or out-of-range rings.
    pub fn from_spec(spec: &GeofenceSpec) -> FusionResult<Self> {
        let invalid = |reason: String| GeofuseError::InvalidGeofence {
            code: spec.code.clone(),
            reason,
        };

        if normalize_code(&spec.code).is_empty() {
            return Err(invalid("region code is empty".to_string()));
        }
        if spec.polygons.is_empty() {
            return Err(invalid("no polygons".to_string()));
        }
        for (i, ring) in spec.polygons.iter().enumerate() {
            if let Some([lng, lat]) = ring.iter().find(|[lng, lat]| {
                !lng.is_finite() || !lat.is_finite() || lng.abs() > 180.0 || lat.abs() > 90.0
            }) {
                return Err(invalid(format!("polygon {i} has out-of-range vertex [{lng}, {lat}]")));
            }
            let mut distinct: Vec<[f64; 2]> = Vec::with_capacity(ring.len());
            for v in ring {
                if !distinct.contains(v) {
                    distinct.push(*v);
                }
            }
            if distinct.len() < 3 {
                return Err(invalid(format!(
                    "polygon {i} needs at least 3 distinct vertices, got {}",
                    distinct.len()
                )));
            }
        }

        Ok(Self::from_rings(
            &spec.code,
            &spec.name,
            spec.polygons.iter().map(|ring| ring.as_slice()),
        ))
    }

    /// Point-in-region test. Boundary points count as inside.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        self.area.intersects(&Point::new(lng, lat))
    }

    pub fn polygon_count(&self) -> usize {
        self.area.0.len()
    }

    /// Keep the candidates inside this region, in their original order.
    pub fn retain_inside(&self, candidates: Vec<LocationCandidate>) -> (Vec<LocationCandidate>, GeofenceStats) {
        let mut stats = GeofenceStats::default();
        let mut kept = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match candidate.point() {
                None => stats.invalid += 1,
                Some((lat, lng)) if self.contains(lat, lng) => {
                    stats.kept += 1;
                    kept.push(candidate);
                }
                Some((lat, lng)) => {
                    debug!(
                        region = self.code.as_str(),
                        method = %candidate.method,
                        lat,
                        lng,
                        "Candidate outside geofence"
                    );
                    stats.outside += 1;
                }
            }
        }

        (kept, stats)
    }
}

/// Lookup table of regions keyed by normalized code.
#[derive(Debug, Clone, Default)]
pub struct GeofenceRegistry {
    regions: HashMap<String, Geofence>,
}

impl GeofenceRegistry {
    /// The shared built-in table, built on first use.
    pub fn standard() -> &'static GeofenceRegistry {
        &STANDARD
    }

    /// Built-in regions plus the given configured ones. Configured regions
    /// replace built-ins with the same code.
    pub fn with_specs(specs: &[GeofenceSpec]) -> FusionResult<Self> {
        let mut registry = STANDARD.clone();
        for spec in specs {
            registry.insert(Geofence::from_spec(spec)?);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, fence: Geofence) {
        self.regions.insert(fence.code.clone(), fence);
    }

    pub fn get(&self, code: &str) -> Option<&Geofence> {
        self.regions.get(&normalize_code(code))
    }

    /// Like `get`, but an unknown code is a configuration error.
    pub fn require(&self, code: &str) -> FusionResult<&Geofence> {
        self.get(code)
            .ok_or_else(|| GeofuseError::UnknownRegion(code.to_string()))
    }

    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.regions.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Drop every candidate outside `region_code`. Survivors are returned
/// unmodified and in their original order. An unknown region is an error,
/// never a pass-through.
pub fn filter_candidates(
    candidates: Vec<LocationCandidate>,
    registry: &GeofenceRegistry,
    region_code: &str,
) -> FusionResult<(Vec<LocationCandidate>, GeofenceStats)> {
    let fence = registry.require(region_code)?;
    Ok(fence.retain_inside(candidates))
}
