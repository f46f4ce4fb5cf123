//! Server-rendered dashboard page: KPI tiles, tab bar and the four tabs.

use std::fmt::{self, Write};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use crate::chart::{self, Line};
use crate::series::Series;
use crate::session::{
    IrrigationStatus, SessionState, DURATION_MAX, DURATION_MIN, THRESHOLD_MAX, THRESHOLD_MIN,
};

/// Shown where a value does not exist yet.
pub const PLACEHOLDER: &str = "—";

/// Single row shown when the look-back window holds no samples.
pub const NO_DATA_MESSAGE: &str = "No data in the selected range";

/// Look-back window bounds and default for the sensor tab, in hours.
pub const WINDOW_MIN_HOURS: u32 = 1;
pub const WINDOW_MAX_HOURS: u32 = 72;
pub const WINDOW_DEFAULT_HOURS: u32 = 24;

const DAY_MONTH_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month] [hour]:[minute]");

const SOIL_COLOR: &str = "#3aa76d";
const TEMP_COLOR: &str = "#e4572e";
const AMBIENT_COLOR: &str = "#2e86ab";
const IRRIGATION_COLOR: &str = "#4f6df5";

fn short_stamp(t: OffsetDateTime) -> String {
    t.format(DAY_MONTH_TIME).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tabs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Sensors,
    Irrigation,
    Notes,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Dashboard, Tab::Sensors, Tab::Irrigation, Tab::Notes];

    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "sensors" => Self::Sensors,
            "irrigation" => Self::Irrigation,
            "notes" => Self::Notes,
            _ => Self::Dashboard, // default
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Sensors => "Sensors",
            Self::Irrigation => "Irrigation",
            Self::Notes => "Settings/Notes",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dashboard => write!(f, "dashboard"),
            Self::Sensors => write!(f, "sensors"),
            Self::Irrigation => write!(f, "irrigation"),
            Self::Notes => write!(f, "notes"),
        }
    }
}

// ---------------------------------------------------------------------------
// KPI tiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Kpi {
    pub label: &'static str,
    pub value: String,
    pub delta: Option<String>,
}

/// Latest value of every metric plus the last manual activation.
pub fn kpis(series: &Series, status: &IrrigationStatus) -> [Kpi; 4] {
    let latest = series.latest();
    let metric = |label: &'static str, value: Option<String>| Kpi {
        label,
        value: value.unwrap_or_else(|| PLACEHOLDER.to_string()),
        delta: None,
    };

    let last_irrigation = match status.last_activation {
        Some(t) => Kpi {
            label: "Last irrigation",
            value: short_stamp(t),
            delta: Some(format!("{} today", status.activations_today)),
        },
        None => metric("Last irrigation", None),
    };

    [
        metric("Temperature", latest.map(|s| format!("{:.2} °C", s.temperature))),
        metric("Ambient humidity", latest.map(|s| format!("{:.1} %", s.ambient_humidity))),
        metric("Soil humidity", latest.map(|s| format!("{:.1} %", s.soil_humidity))),
        last_irrigation,
    ]
}

// ---------------------------------------------------------------------------
// Sensor table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SensorRow {
    pub time: String,
    pub temperature: f64,
    pub ambient_humidity: f64,
    pub soil_humidity: f64,
    pub irrigation: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorTable {
    Rows(Vec<SensorRow>),
    Empty(&'static str),
}

/// Clamp a requested look-back window to the slider's bounds.
pub fn clamp_window(hours: Option<u32>) -> u32 {
    hours
        .unwrap_or(WINDOW_DEFAULT_HOURS)
        .clamp(WINDOW_MIN_HOURS, WINDOW_MAX_HOURS)
}

/// Samples with a timestamp at or after `now - hours`, oldest first.
pub fn sensor_table(series: &Series, now: OffsetDateTime, hours: u32) -> SensorTable {
    let cutoff = now - Duration::hours(i64::from(hours));
    let rows: Vec<SensorRow> = series
        .samples()
        .filter(|s| s.timestamp >= cutoff)
        .map(|s| SensorRow {
            time: short_stamp(s.timestamp),
            temperature: s.temperature,
            ambient_humidity: s.ambient_humidity,
            soil_humidity: s.soil_humidity,
            irrigation: if s.irrigated { "Yes" } else { "No" },
        })
        .collect();

    if rows.is_empty() {
        SensorTable::Empty(NO_DATA_MESSAGE)
    } else {
        SensorTable::Rows(rows)
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// Render the full page for `tab`.  `flash` is a one-shot message from the
/// previous action, if any.
pub fn render_page(
    state: &SessionState,
    tab: Tab,
    hours: u32,
    now: OffsetDateTime,
    flash: Option<&str>,
) -> String {
    let mut out = String::with_capacity(16 * 1024);
    out.push_str(PAGE_HEAD);

    out.push_str(
        r#"<header><h1>🌿 Automated Garden — Visual Demo</h1><p class="muted">Monitoring and control UI (front end only).</p></header><hr>"#,
    );

    out.push_str(r#"<section class="kpis">"#);
    for k in kpis(&state.series, &state.status) {
        let _ = write!(
            out,
            r#"<div class="card"><div class="muted">{}</div><div class="kpi">{}</div>"#,
            k.label, k.value
        );
        if let Some(d) = k.delta {
            let _ = write!(out, r#"<div class="delta">{d}</div>"#);
        }
        out.push_str("</div>");
    }
    out.push_str(r#"</section><p class="muted">Simulated data, for visual design only.</p>"#);

    if let Some(msg) = flash {
        let _ = write!(out, r#"<div class="flash">{msg}</div>"#);
    }

    out.push_str("<nav>");
    for t in Tab::ALL {
        let class = if t == tab { r#" class="active""# } else { "" };
        let _ = write!(out, r#"<a href="/?tab={t}"{class}>{}</a>"#, t.title());
    }
    out.push_str("</nav><main>");

    match tab {
        Tab::Dashboard => render_dashboard(&mut out, &state.series),
        Tab::Sensors => render_sensors(&mut out, &state.series, now, hours),
        Tab::Irrigation => render_irrigation(&mut out, state),
        Tab::Notes => out.push_str(NOTES_HTML),
    }

    out.push_str(
        r#"</main><hr><p class="muted">Garden • Visual demo (in-memory state only).</p></body></html>"#,
    );
    out
}

fn render_dashboard(out: &mut String, series: &Series) {
    let irrigation: Vec<f64> = series.irrigation().iter().map(|&f| f64::from(f)).collect();

    out.push_str(r#"<div class="cols"><div><h2>Soil humidity (%)</h2>"#);
    out.push_str(&chart::line_chart(&[Line {
        label: "Soil humidity (%)",
        color: SOIL_COLOR,
        values: series.soil_humidity(),
    }]));
    out.push_str("</div><div><h2>Temperature / Ambient humidity</h2>");
    out.push_str(&chart::line_chart(&[
        Line {
            label: "Temperature (°C)",
            color: TEMP_COLOR,
            values: series.temperature(),
        },
        Line {
            label: "Ambient hum. (%)",
            color: AMBIENT_COLOR,
            values: series.ambient_humidity(),
        },
    ]));
    out.push_str("</div></div><h2>Irrigation events</h2>");
    out.push_str(&chart::bar_chart("Irrigation (1=on)", IRRIGATION_COLOR, &irrigation));
}

fn render_sensors(out: &mut String, series: &Series, now: OffsetDateTime, hours: u32) {
    let _ = write!(
        out,
        r#"<h2>Recent readings</h2><form method="get" action="/"><input type="hidden" name="tab" value="sensors"><label>Range (hours) <input type="range" name="hours" min="{WINDOW_MIN_HOURS}" max="{WINDOW_MAX_HOURS}" value="{hours}" oninput="this.nextElementSibling.value=this.value"><output>{hours}</output></label> <button type="submit">Apply</button></form>"#
    );

    out.push_str("<table>");
    match sensor_table(series, now, hours) {
        SensorTable::Rows(rows) => {
            out.push_str(
                "<tr><th>Time</th><th>Temp (°C)</th><th>Amb. hum (%)</th><th>Soil hum (%)</th><th>Irrigation</th></tr>",
            );
            for r in rows {
                let _ = write!(
                    out,
                    "<tr><td>{}</td><td>{:.2}</td><td>{:.1}</td><td>{:.1}</td><td>{}</td></tr>",
                    r.time, r.temperature, r.ambient_humidity, r.soil_humidity, r.irrigation
                );
            }
        }
        SensorTable::Empty(msg) => {
            let _ = write!(out, "<tr><th>Message</th></tr><tr><td>{msg}</td></tr>");
        }
    }
    out.push_str("</table>");
}

fn render_irrigation(out: &mut String, state: &SessionState) {
    let cfg = &state.config;
    let checked = if cfg.auto { " checked" } else { "" };

    let _ = write!(
        out,
        r#"<h2>Irrigation control (simulated)</h2><div class="cols"><div>
<h3>Automatic mode</h3>
<form method="post" action="/irrigation/automatic">
<label><input type="checkbox" name="auto"{checked}> Enable automatic</label><br>
<label>Soil humidity threshold (%) <input type="number" name="threshold" min="{THRESHOLD_MIN}" max="{THRESHOLD_MAX}" step="1" value="{threshold}"></label>
<button type="submit">Apply</button>
</form>
<hr>
<h3>Manual irrigation</h3>
<form method="post" action="/irrigation/manual"><button type="submit" class="wide">Irrigate now</button></form>
</div><div>
<h3>Time schedule</h3>
<form method="post" action="/irrigation/schedule">
<label>Time 1 <input type="time" name="time1" value="{time1}" required></label><br>
<label>Time 2 <input type="time" name="time2" value="{time2}" required></label><br>
<label>Duration (seconds) <input type="number" name="duration_sec" min="{DURATION_MIN}" max="{DURATION_MAX}" step="5" value="{duration}"></label><br>
<button type="submit">Save schedule</button>
</form>
</div></div>
<p class="info">Pure front end: these controls do not call hardware or APIs.</p>"#,
        threshold = cfg.threshold,
        time1 = cfg.time1,
        time2 = cfg.time2,
        duration = cfg.duration_sec,
    );
}

const NOTES_HTML: &str = r#"<h2>Notes</h2>
<ul>
<li>All readings are generated in memory when your session starts; reloading keeps them until the session expires.</li>
<li>Automatic mode, the threshold and the schedule are stored only. Nothing evaluates them or opens a valve.</li>
<li>To connect a real backend, replace the generated series with readings fetched from an API and drive irrigation with HTTP/MQTT commands for your hardware.</li>
</ul>"#;

const PAGE_HEAD: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Garden • Visual Demo</title>
<style>
  body { font: 15px/1.4 system-ui, sans-serif; margin: 0 auto; padding: 16px; max-width: 1200px; background:#0b1020; color:#eaeef5; }
  h1 { font-weight: 600; margin: 0 0 4px; }
  hr { border: 0; border-top: 1px solid #26304f; margin: 16px 0; }
  .muted { color:#9aa4bf; font-size: 13px; }
  .kpis { display:grid; gap:12px; grid-template-columns: repeat(auto-fit, minmax(200px,1fr)); }
  .card { background:#111831; border-radius:14px; padding:14px; }
  .kpi { font-size:26px; font-weight:700; margin-top:6px; }
  .delta { color:#3aa76d; font-size:13px; }
  nav { display:flex; gap:4px; margin:16px 0; border-bottom:1px solid #26304f; }
  nav a { padding:8px 14px; color:#9aa4bf; text-decoration:none; }
  nav a.active { color:#eaeef5; border-bottom:2px solid #4f6df5; }
  .cols { display:grid; gap:16px; grid-template-columns: repeat(auto-fit, minmax(320px,1fr)); }
  .chart { width:100%; height:220px; background:#111831; border-radius:10px; }
  .chart .axis { stroke:#26304f; }
  .chart text { fill:#9aa4bf; font-size:11px; }
  table { border-collapse: collapse; width:100%; }
  th, td { text-align:left; padding:4px 8px; border-bottom:1px solid #26304f; }
  button { font-size:15px; padding:8px 14px; border-radius:10px; border:0; background:#2d5bff; color:#fff; cursor:pointer; }
  button.wide { width:100%; }
  input { margin:4px 0; }
  .flash { background:#15391f; color:#b8f5c8; padding:10px 14px; border-radius:10px; margin-top:12px; }
  .info { background:#122a46; color:#b8d8f5; padding:10px 14px; border-radius:10px; }
</style>
</head>
<body>
"#;

// ===========================================================================
// Tests
// ===========================================================================
