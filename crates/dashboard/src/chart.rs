//! Minimal inline SVG line and bar charts.

use std::fmt::Write;

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 220.0;
const PAD: f64 = 32.0;

/// One named series in a line chart.
pub struct Line<'a> {
    pub label: &'a str,
    pub color: &'a str,
    pub values: &'a [f64],
}

fn open_svg(out: &mut String) {
    let _ = write!(
        out,
        r#"<svg class="chart" viewBox="0 0 {WIDTH} {HEIGHT}" preserveAspectRatio="none" role="img">"#
    );
}

fn empty_chart() -> String {
    let mut out = String::new();
    open_svg(&mut out);
    let _ = write!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle" class="muted">no data</text></svg>"#,
        WIDTH / 2.0,
        HEIGHT / 2.0
    );
    out
}

/// Value range across all lines, widened when flat so the scale never
/// divides by zero.
fn bounds(lines: &[Line<'_>]) -> (f64, f64) {
    let (lo, hi) = lines
        .iter()
        .flat_map(|l| l.values.iter().copied())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if hi - lo < f64::EPSILON {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

fn x_at(i: usize, n: usize) -> f64 {
    if n <= 1 {
        return WIDTH / 2.0;
    }
    PAD + i as f64 * (WIDTH - 2.0 * PAD) / (n - 1) as f64
}

fn y_at(v: f64, lo: f64, hi: f64) -> f64 {
    HEIGHT - PAD - (v - lo) / (hi - lo) * (HEIGHT - 2.0 * PAD)
}

fn legend(out: &mut String, items: &[(&str, &str)]) {
    for (i, (label, color)) in items.iter().enumerate() {
        let x = PAD + i as f64 * 160.0;
        let _ = write!(
            out,
            r#"<rect x="{x}" y="6" width="10" height="10" fill="{color}"/><text x="{}" y="15" class="legend">{label}</text>"#,
            x + 14.0
        );
    }
}

fn y_axis(out: &mut String, lo: f64, hi: f64) {
    let _ = write!(
        out,
        r#"<line x1="{PAD}" y1="{PAD}" x2="{PAD}" y2="{y0}" class="axis"/><line x1="{PAD}" y1="{y0}" x2="{x1}" y2="{y0}" class="axis"/><text x="{tx}" y="{PAD}" class="tick" text-anchor="end">{hi:.1}</text><text x="{tx}" y="{y0}" class="tick" text-anchor="end">{lo:.1}</text>"#,
        y0 = HEIGHT - PAD,
        x1 = WIDTH - PAD,
        tx = PAD - 4.0,
    );
}

/// Render one or more lines sharing a y scale.
pub fn line_chart(lines: &[Line<'_>]) -> String {
    if lines.iter().all(|l| l.values.is_empty()) {
        return empty_chart();
    }
    let (lo, hi) = bounds(lines);

    let mut out = String::new();
    open_svg(&mut out);
    y_axis(&mut out, lo, hi);
    for line in lines {
        let n = line.values.len();
        let points: Vec<String> = line
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| format!("{:.1},{:.1}", x_at(i, n), y_at(v, lo, hi)))
            .collect();
        let _ = write!(
            out,
            r#"<polyline fill="none" stroke="{}" stroke-width="1.5" points="{}"/>"#,
            line.color,
            points.join(" ")
        );
    }
    let items: Vec<(&str, &str)> = lines.iter().map(|l| (l.label, l.color)).collect();
    legend(&mut out, &items);
    out.push_str("</svg>");
    out
}

/// Render one bar per value, scaled against the larger of the max and 1.
pub fn bar_chart(label: &str, color: &str, values: &[f64]) -> String {
    if values.is_empty() {
        return empty_chart();
    }
    let hi = values.iter().copied().fold(1.0_f64, f64::max);
    let slot = (WIDTH - 2.0 * PAD) / values.len() as f64;

    let mut out = String::new();
    open_svg(&mut out);
    y_axis(&mut out, 0.0, hi);
    for (i, &v) in values.iter().enumerate() {
        if v <= 0.0 {
            continue;
        }
        let h = v / hi * (HEIGHT - 2.0 * PAD);
        let _ = write!(
            out,
            r#"<rect class="bar" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{color}"/>"#,
            PAD + i as f64 * slot,
            HEIGHT - PAD - h,
            (slot * 0.8).max(1.0),
            h
        );
    }
    legend(&mut out, &[(label, color)]);
    out.push_str("</svg>");
    out
}

// ===========================================================================
// Tests
// ===========================================================================
