//! Per-browser-session state: the generated series, the irrigation
//! configuration record and the activation status record.
//!
//! Sessions are created lazily on first request and live in memory until they
//! sit idle past the configured timeout.  Nothing is persisted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, Time};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::series::{self, Series};

/// Widget bounds for the soil humidity threshold, in percent.
pub const THRESHOLD_MIN: f64 = 10.0;
pub const THRESHOLD_MAX: f64 = 90.0;

/// Widget bounds for the irrigation duration, in seconds.
pub const DURATION_MIN: u32 = 5;
pub const DURATION_MAX: u32 = 600;

const HH_MM: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");
const HH_MM_SS: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Current wall-clock time in the local offset, or UTC when the local offset
/// cannot be determined (e.g. from a multi-threaded runtime on Unix).
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

/// A time of day rendered and parsed as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime(Time);

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        Time::from_hms(hour, minute, 0).ok().map(Self)
    }
}

impl FromStr for ClockTime {
    type Err = String;

    /// Accepts `HH:MM`, and `HH:MM:SS` with the seconds dropped, since some
    /// browsers submit time inputs with seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Time::parse(s, HH_MM)
            .or_else(|_| Time::parse(s, HH_MM_SS))
            .ok()
            .and_then(|t| ClockTime::new(t.hour(), t.minute()))
            .ok_or_else(|| format!("invalid time '{s}' (expected HH:MM)"))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Irrigation configuration as entered on the irrigation tab.
///
/// These values are stored and echoed back only.  No process evaluates the
/// automatic flag, the threshold or the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigationConfig {
    pub auto: bool,
    pub threshold: f64,
    pub time1: ClockTime,
    pub time2: ClockTime,
    pub duration_sec: u32,
}

impl Default for IrrigationConfig {
    fn default() -> Self {
        Self {
            auto: true,
            threshold: 40.0,
            time1: ClockTime(time::macros::time!(7:30)),
            time2: ClockTime(time::macros::time!(19:00)),
            duration_sec: 30,
        }
    }
}

/// Manual activation bookkeeping.  `activations_today` never rolls over.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IrrigationStatus {
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_activation: Option<OffsetDateTime>,
    pub activations_today: u32,
}

pub struct SessionState {
    pub series: Series,
    pub config: IrrigationConfig,
    pub status: IrrigationStatus,
    /// One-shot confirmation shown on the next render.
    pub flash: Option<String>,
}

impl SessionState {
    pub fn new(series: Series, config: IrrigationConfig) -> Self {
        Self {
            series,
            config,
            status: IrrigationStatus::default(),
            flash: None,
        }
    }

    pub fn take_flash(&mut self) -> Option<String> {
        self.flash.take()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Everything a new session is initialized from.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub hours: u32,
    pub interval_min: u32,
    pub seed: Option<u64>,
    pub defaults: IrrigationConfig,
    pub idle_timeout: Duration,
    pub max_sessions: usize,
}

impl SessionSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            hours: cfg.series.hours,
            interval_min: cfg.series.interval_min,
            seed: cfg.series.seed,
            defaults: cfg.irrigation.clone(),
            idle_timeout: Duration::minutes(i64::from(cfg.session.idle_timeout_min)),
            max_sessions: cfg.session.max_sessions,
        }
    }
}

struct Entry {
    state: SessionState,
    last_seen: OffsetDateTime,
}

/// Process-wide map of isolated per-session states.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    settings: Arc<SessionSettings>,
}

impl SessionStore {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(settings),
        }
    }

    /// Resolve `id` to a live session, creating one when the id is missing,
    /// unknown or expired.  Returns the session id and whether it was created.
    pub async fn get_or_create(&self, id: Option<&str>, now: OffsetDateTime) -> (String, bool) {
        let mut sessions = self.sessions.write().await;
        let timeout = self.settings.idle_timeout;

        if let Some(id) = id {
            if let Some(entry) = sessions.get_mut(id) {
                if now - entry.last_seen <= timeout {
                    entry.last_seen = now;
                    return (id.to_string(), false);
                }
            }
        }

        let before = sessions.len();
        sessions.retain(|_, e| now - e.last_seen <= timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "idle sessions evicted");
        }

        while sessions.len() >= self.settings.max_sessions.max(1) {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    sessions.remove(&k);
                    debug!(session = %k, "session dropped at capacity");
                }
                None => break,
            }
        }

        let id = mint_session_id();
        sessions.insert(
            id.clone(),
            Entry {
                state: self.new_state(now),
                last_seen: now,
            },
        );
        info!(session = %id, sessions = sessions.len(), "session initialized");
        (id, true)
    }

    /// Run `f` against the session's state under the write lock.
    pub async fn with_session<T>(&self, id: &str, f: impl FnOnce(&mut SessionState) -> T) -> Option<T> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(|e| f(&mut e.state))
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn new_state(&self, now: OffsetDateTime) -> SessionState {
        let s = &self.settings;
        let mut rng = match s.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let series = series::generate(now, s.hours, s.interval_min, &mut rng);
        SessionState::new(series, s.defaults.clone())
    }
}

/// Random (v4) UUID drawn from the OS random source, as 32 hex digits.
fn mint_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-03-14 12:00 UTC);

    fn test_store() -> SessionStore {
        SessionStore::new(SessionSettings {
            hours: 24,
            interval_min: 10,
            seed: Some(11),
            defaults: IrrigationConfig::default(),
            idle_timeout: Duration::minutes(60),
            max_sessions: 100,
        })
    }

    #[test]
    fn clock_time_parses_and_formats() {
        let t: ClockTime = "08:05".parse().unwrap();
        assert_eq!(t.to_string(), "08:05");
        let t: ClockTime = "20:00:59".parse().unwrap();
        assert_eq!(t.to_string(), "20:00");
        let t: ClockTime = " 07:30 ".parse().unwrap();
        assert_eq!(t, ClockTime::new(7, 30).unwrap());
    }

    #[test]
    fn clock_time_rejects_garbage() {
        assert!("25:00".parse::<ClockTime>().is_err());
        assert!("noon".parse::<ClockTime>().is_err());
        assert!("".parse::<ClockTime>().is_err());
    }

    #[test]
    fn default_config_matches_initial_values() {
        let c = IrrigationConfig::default();
        assert!(c.auto);
        assert_eq!(c.threshold, 40.0);
        assert_eq!(c.time1.to_string(), "07:30");
        assert_eq!(c.time2.to_string(), "19:00");
        assert_eq!(c.duration_sec, 30);
    }

    #[test]
    fn config_serializes_times_as_hh_mm() {
        let json = serde_json::to_value(IrrigationConfig::default()).unwrap();
        assert_eq!(json["time1"], "07:30");
        assert_eq!(json["time2"], "19:00");
    }

    #[test]
    fn status_serializes_null_before_activation() {
        let json = serde_json::to_value(IrrigationStatus::default()).unwrap();
        assert!(json["last_activation"].is_null());
        assert_eq!(json["activations_today"], 0);
    }

    #[tokio::test]
    async fn missing_id_creates_session() {
        let store = test_store();
        let (id, created) = store.get_or_create(None, NOW).await;
        assert!(created);
        assert_eq!(id.len(), 32);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn known_id_reuses_session() {
        let store = test_store();
        let (id, _) = store.get_or_create(None, NOW).await;
        store
            .with_session(&id, |s| s.status.activations_today = 5)
            .await
            .unwrap();

        let (again, created) = store.get_or_create(Some(&id), NOW + Duration::minutes(5)).await;
        assert!(!created);
        assert_eq!(again, id);
        let count = store.with_session(&id, |s| s.status.activations_today).await;
        assert_eq!(count, Some(5));
    }

    #[tokio::test]
    async fn unknown_id_gets_fresh_session() {
        let store = test_store();
        let (id, created) = store.get_or_create(Some("nope"), NOW).await;
        assert!(created);
        assert_ne!(id, "nope");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = test_store();
        let (a, _) = store.get_or_create(None, NOW).await;
        let (b, _) = store.get_or_create(None, NOW).await;
        assert_ne!(a, b);

        store.with_session(&a, |s| s.config.auto = false).await;
        let b_auto = store.with_session(&b, |s| s.config.auto).await;
        assert_eq!(b_auto, Some(true));
    }

    #[tokio::test]
    async fn new_session_is_initialized_from_settings() {
        let store = test_store();
        let (id, _) = store.get_or_create(None, NOW).await;
        let (len, cfg, status) = store
            .with_session(&id, |s| (s.series.len(), s.config.clone(), s.status.clone()))
            .await
            .unwrap();
        assert_eq!(len, 144);
        assert_eq!(cfg, IrrigationConfig::default());
        assert_eq!(status, IrrigationStatus::default());
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = test_store();
        let (old, _) = store.get_or_create(None, NOW).await;

        let later = NOW + Duration::minutes(61);
        let (fresh, created) = store.get_or_create(Some(&old), later).await;
        assert!(created);
        assert_ne!(fresh, old);
        // The stale entry is evicted while creating the new one.
        assert_eq!(store.len().await, 1);
        assert!(store.with_session(&old, |_| ()).await.is_none());
    }

    #[tokio::test]
    async fn session_ids_are_v4_uuids() {
        let store = test_store();
        let (a, _) = store.get_or_create(None, NOW).await;
        let (b, _) = store.get_or_create(None, NOW).await;
        assert_ne!(a, b);
        let parsed = Uuid::parse_str(&a).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[tokio::test]
    async fn capacity_drops_least_recently_seen() {
        let store = SessionStore::new(SessionSettings {
            max_sessions: 2,
            ..test_store().settings.as_ref().clone()
        });
        let (first, _) = store.get_or_create(None, NOW).await;
        let (second, _) = store.get_or_create(None, NOW + Duration::minutes(1)).await;
        // Touch the first so the second becomes the oldest.
        store.get_or_create(Some(&first), NOW + Duration::minutes(2)).await;

        let (third, _) = store.get_or_create(None, NOW + Duration::minutes(3)).await;
        assert_eq!(store.len().await, 2);
        assert!(store.with_session(&first, |_| ()).await.is_some());
        assert!(store.with_session(&third, |_| ()).await.is_some());
        assert!(store.with_session(&second, |_| ()).await.is_none());
    }

    #[tokio::test]
    async fn with_session_unknown_id_is_none() {
        let store = test_store();
        assert!(store.with_session("missing", |_| ()).await.is_none());
    }
}
