//! Geolocation reduction and great-circle distance

use crate::data::GeoSample;
use std::collections::HashMap;
use tracing::warn;

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers between two (lat, lng) pairs given in
/// degrees, via the haversine formula.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// One representative coordinate per postal prefix.
///
/// The raw geolocation table carries many samples per prefix; the index
/// collapses each prefix to the arithmetic mean of its samples. After
/// reduction a prefix is a unique key.
#[derive(Debug, Clone, Default)]
pub struct GeoIndex {
    points: HashMap<u32, (f64, f64)>,
}

impl GeoIndex {
    /// Group samples by postal prefix and average their coordinates.
    ///
    /// An empty input yields an empty index: lookups miss and coordinates
    /// stay unresolved downstream, which the feature gate later filters.
    pub fn from_samples(samples: &[GeoSample]) -> Self {
        if samples.is_empty() {
            warn!("geolocation table is empty; all coordinate lookups will miss");
            return Self::default();
        }

        let mut sums: HashMap<u32, (f64, f64, usize)> = HashMap::new();
        for sample in samples {
            let entry = sums
                .entry(sample.geolocation_zip_code_prefix)
                .or_insert((0.0, 0.0, 0));
            entry.0 += sample.geolocation_lat;
            entry.1 += sample.geolocation_lng;
            entry.2 += 1;
        }

        let points = sums
            .into_iter()
            .map(|(prefix, (lat_sum, lng_sum, n))| {
                (prefix, (lat_sum / n as f64, lng_sum / n as f64))
            })
            .collect();

        Self { points }
    }

    /// Resolve a postal prefix to its reduced (lat, lng), if sampled.
    pub fn resolve(&self, prefix: u32) -> Option<(f64, f64)> {
        self.points.get(&prefix).copied()
    }

    /// Number of distinct prefixes in the index.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no prefix was sampled.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
