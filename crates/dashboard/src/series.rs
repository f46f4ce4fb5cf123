//! Synthetic sensor series for the dashboard.
//!
//! Every sample is drawn independently around a fixed baseline; there is no
//! temporal coherence between neighbours.  Two irrigation events are injected
//! per series and raise soil humidity for the event sample and the three
//! samples after it.

use serde::Serialize;
use time::{Duration, OffsetDateTime};

/// Upper bound for any humidity value, in percent.
pub const MAX_HUMIDITY: f64 = 100.0;

/// Number of irrigation events injected into a fresh series.
const INJECTED_EVENTS: usize = 2;

/// Samples affected by one event (the event sample plus the following ones).
const EVENT_SPAN: usize = 4;

/// Samples kept clear of each series boundary when picking event indices.
const EVENT_MARGIN: usize = 3;

// ---------------------------------------------------------------------------
// Random source
// ---------------------------------------------------------------------------

/// Source of randomness for the generator.  Interactive sessions use an
/// entropy-seeded `fastrand::Rng`; tests pass a seeded or scripted source.
pub trait RandomSource {
    /// Uniform value in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform index in `low..=high`.
    fn index(&mut self, low: usize, high: usize) -> usize;
}

impl RandomSource for fastrand::Rng {
    fn unit(&mut self) -> f64 {
        self.f64()
    }

    fn index(&mut self, low: usize, high: usize) -> usize {
        self.usize(low..=high)
    }
}

fn uniform<R: RandomSource + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    low + (high - low) * rng.unit()
}

fn round_to(value: f64, places: i32) -> f64 {
    let p = 10f64.powi(places);
    (value * p).round() / p
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// One time-aligned reading across all channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub temperature: f64,
    pub ambient_humidity: f64,
    pub soil_humidity: f64,
    pub irrigated: bool,
}

/// Four parallel channels plus timestamps, oldest first.  All vectors always
/// have the same length; the fields are private so nothing can break that.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    timestamps: Vec<OffsetDateTime>,
    temperature: Vec<f64>,
    ambient_humidity: Vec<f64>,
    soil_humidity: Vec<f64>,
    irrigation: Vec<u8>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[OffsetDateTime] {
        &self.timestamps
    }

    pub fn temperature(&self) -> &[f64] {
        &self.temperature
    }

    pub fn ambient_humidity(&self) -> &[f64] {
        &self.ambient_humidity
    }

    pub fn soil_humidity(&self) -> &[f64] {
        &self.soil_humidity
    }

    /// Irrigation flags, `1` for a sample with an irrigation event.
    pub fn irrigation(&self) -> &[u8] {
        &self.irrigation
    }

    pub fn get(&self, index: usize) -> Option<Sample> {
        Some(Sample {
            timestamp: *self.timestamps.get(index)?,
            temperature: self.temperature[index],
            ambient_humidity: self.ambient_humidity[index],
            soil_humidity: self.soil_humidity[index],
            irrigated: self.irrigation[index] == 1,
        })
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<Sample> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Add `amount` to the soil humidity at `index`, capped at
    /// [`MAX_HUMIDITY`].  The result is not re-rounded; out-of-range indices
    /// are ignored.
    pub fn boost_soil(&mut self, index: usize, amount: f64) {
        if let Some(v) = self.soil_humidity.get_mut(index) {
            *v = (*v + amount).min(MAX_HUMIDITY);
        }
    }

    /// Boost the most recent soil humidity sample.
    pub fn boost_latest_soil(&mut self, amount: f64) {
        if let Some(last) = self.len().checked_sub(1) {
            self.boost_soil(last, amount);
        }
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Number of samples covering `hours` at one sample every `interval_min`.
pub fn sample_count(hours: u32, interval_min: u32) -> usize {
    if interval_min == 0 {
        return 0;
    }
    (u64::from(hours) * 60 / u64::from(interval_min)) as usize
}

/// Generate a series of `sample_count(hours, interval_min)` samples whose
/// last timestamp is `now`, spaced `interval_min` apart.
pub fn generate<R: RandomSource + ?Sized>(
    now: OffsetDateTime,
    hours: u32,
    interval_min: u32,
    rng: &mut R,
) -> Series {
    let n = sample_count(hours, interval_min);
    let step_min = i64::from(interval_min);

    let timestamps: Vec<OffsetDateTime> = (0..n)
        .map(|i| now - Duration::minutes(step_min * (n - 1 - i) as i64))
        .collect();

    let temperature = (0..n)
        .map(|_| round_to(21.0 + 2.0 * rng.unit() + 1.5 * uniform(rng, -1.0, 1.0), 2))
        .collect();
    let ambient_humidity = (0..n)
        .map(|_| round_to(55.0 + 6.0 * uniform(rng, -1.0, 1.0), 1))
        .collect();
    let soil_humidity = (0..n)
        .map(|_| round_to(38.0 + 10.0 * uniform(rng, -1.0, 1.0), 1))
        .collect();

    let mut series = Series {
        timestamps,
        temperature,
        ambient_humidity,
        soil_humidity,
        irrigation: vec![0; n],
    };

    if series.is_empty() {
        return series;
    }

    // Too short to keep clear of both ends: fall back to the whole range.
    let (low, high) = if n > 2 * EVENT_MARGIN {
        (EVENT_MARGIN, n - 1 - EVENT_MARGIN)
    } else {
        (0, n - 1)
    };

    for _ in 0..INJECTED_EVENTS {
        // Collisions are not guarded: a repeated index is boosted again.
        let at = rng.index(low, high);
        series.irrigation[at] = 1;
        for k in at..(at + EVENT_SPAN).min(n) {
            let boost = uniform(rng, 4.0, 8.0);
            series.boost_soil(k, boost);
        }
    }

    series
}

// ===========================================================================
// Tests
// ===========================================================================
