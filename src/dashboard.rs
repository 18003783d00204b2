//! Server-rendered dashboard page: header, model sidebar, input form, and
//! the result panel (metric readout plus a single-bar SVG chart).

use std::fmt::Write;

use crate::error::PredictError;
use crate::features::{DispatchBase, N_FEATURES};
use crate::types::{ChartSpec, FormFields, PredictionOut};

/// What to show below the form.
pub enum Outcome<'a> {
    Idle,
    Success(&'a PredictionOut),
    Failure(&'a PredictError),
}

pub struct PageContext<'a> {
    pub title: &'a str,
    pub model_name: &'a str,
}

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; display: flex; }
aside { width: 260px; background: #f0f2f6; padding: 1.5rem; min-height: 100vh; }
main { flex: 1; padding: 1.5rem 3rem; }
h1 { text-align: center; color: #FF4B4B; }
.sub { text-align: center; font-size: 18px; }
.cols { display: flex; gap: 3rem; }
.cols div { flex: 1; }
label { display: block; margin-top: .8rem; }
input, select { width: 100%; padding: .3rem; }
.ok { background: #e6f4ea; padding: .8rem; }
.err { background: #fdecea; padding: .8rem; }
.warn { background: #fff4e5; padding: .8rem; }
.metric { font-size: 2.4rem; font-weight: bold; }
footer { text-align: center; margin-top: 2rem; }
"#;

pub fn render_page(ctx: &PageContext<'_>, fields: &FormFields, outcome: Outcome<'_>) -> String {
    let mut html = String::with_capacity(8 * 1024);
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title><style>{STYLE}</style></head><body>",
        title = escape_html(ctx.title)
    );
    render_sidebar(&mut html, ctx);

    html.push_str("<main>");
    let _ = write!(
        html,
        "<h1>{}</h1><p class=\"sub\">Predict daily trip demand using Machine Learning</p><hr>",
        escape_html(ctx.title)
    );
    render_form(&mut html, fields);
    html.push_str("<hr>");

    match outcome {
        Outcome::Idle => {}
        Outcome::Success(out) => render_result(&mut html, out),
        Outcome::Failure(err) => {
            let _ = write!(html, "<div class=\"err\">{}</div>", escape_html(&err.to_string()));
        }
    }

    html.push_str("<hr><footer>Uber Trip Demand Forecasting</footer></main></body></html>");
    html
}

fn render_sidebar(html: &mut String, ctx: &PageContext<'_>) {
    let _ = write!(
        html,
        "<aside><h2>Model Information</h2><p><b>Model Used:</b> {}<br><b>Total Features:</b> {N_FEATURES}<br>\
         <b>Validation Method:</b> Time-based Split<br><b>Use Case:</b> Daily Trip Demand Forecasting</p></aside>",
        escape_html(ctx.model_name)
    );
}

fn number_input(html: &mut String, name: &str, label: &str, value: &str, attrs: &str) {
    let _ = write!(
        html,
        "<label for=\"{name}\">{label}</label><input type=\"number\" id=\"{name}\" name=\"{name}\" value=\"{}\" {attrs}>",
        escape_html(value)
    );
}

fn select(html: &mut String, name: &str, label: &str, options: &[&str], selected: &str) {
    let _ = write!(html, "<label for=\"{name}\">{label}</label><select id=\"{name}\" name=\"{name}\">");
    for opt in options {
        let sel = if *opt == selected { " selected" } else { "" };
        let _ = write!(html, "<option value=\"{opt}\"{sel}>{opt}</option>");
    }
    html.push_str("</select>");
}

fn render_form(html: &mut String, f: &FormFields) {
    html.push_str("<h3>Enter Input Features</h3><form method=\"post\" action=\"/predict\"><div class=\"cols\"><div>");
    number_input(html, "active_vehicles", "Active Vehicles", &f.active_vehicles, "min=\"0\" step=\"1\"");
    number_input(html, "day_of_week", "Day of Week (0=Mon, 6=Sun)", &f.day_of_week, "min=\"0\" max=\"6\" step=\"1\"");
    number_input(html, "month", "Month", &f.month, "min=\"1\" max=\"12\" step=\"1\"");
    select(html, "is_weekend", "Is Weekend?", &["0", "1"], f.is_weekend.trim());
    html.push_str("</div><div>");
    number_input(html, "prev_day", "Previous Day Trips", &f.prev_day, "min=\"0\" step=\"1\"");
    number_input(html, "prev_week", "Previous Week Trips", &f.prev_week, "min=\"0\" step=\"1\"");
    number_input(html, "trips_per_vehicle", "Trips Per Vehicle", &f.trips_per_vehicle, "min=\"0\" step=\"any\"");
    let bases: Vec<&str> = DispatchBase::ALL.iter().map(|b| b.as_str()).collect();
    select(html, "dispatch", "Select Dispatch Base", &bases, f.dispatch.trim());
    html.push_str("</div></div><p><button type=\"submit\">Predict Demand</button></p></form>");
}

fn render_result(html: &mut String, out: &PredictionOut) {
    html.push_str("<div class=\"ok\">Prediction Generated Successfully!</div>");
    if let Some(warning) = &out.warning {
        let _ = write!(html, "<div class=\"warn\">{}</div>", escape_html(warning));
    }
    let _ = write!(
        html,
        "<p>Predicted Daily Trips</p><p class=\"metric\" id=\"metric\">{}</p>",
        out.display_value
    );
    html.push_str(&bar_chart_svg(&out.chart));
}

/// Smallest 1/2/5 x 10^k value at or above `v`.
pub fn nice_ceiling(v: f64) -> f64 {
    if !v.is_finite() || v <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powi(v.log10().floor() as i32);
    let step = match v / magnitude {
        f if f <= 1.0 => 1.0,
        f if f <= 2.0 => 2.0,
        f if f <= 5.0 => 5.0,
        _ => 10.0,
    };
    step * magnitude
}

/// Single-category bar chart with the value printed on the bar.
pub fn bar_chart_svg(chart: &ChartSpec) -> String {
    const W: f64 = 480.0;
    const H: f64 = 320.0;
    const LEFT: f64 = 70.0;
    const TOP: f64 = 40.0;
    const BOTTOM: f64 = 40.0;
    const TICKS: u32 = 5;

    let plot_h = H - TOP - BOTTOM;
    let axis_max = nice_ceiling(chart.value);
    let bar_h = (chart.value.max(0.0) / axis_max * plot_h).min(plot_h);
    let base_y = TOP + plot_h;

    let mut svg = String::with_capacity(2048);
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" id=\"chart\" width=\"{W}\" height=\"{H}\" viewBox=\"0 0 {W} {H}\">\
         <text x=\"{x}\" y=\"24\" text-anchor=\"middle\" font-size=\"16\">{title}</text>",
        x = W / 2.0,
        title = escape_html(&chart.title)
    );
    for i in 0..=TICKS {
        let frac = f64::from(i) / f64::from(TICKS);
        let y = base_y - frac * plot_h;
        let _ = write!(
            svg,
            "<line x1=\"{LEFT}\" y1=\"{y:.1}\" x2=\"{W}\" y2=\"{y:.1}\" stroke=\"#ddd\"/>\
             <text x=\"{tx}\" y=\"{ty:.1}\" text-anchor=\"end\" font-size=\"11\">{label}</text>",
            tx = LEFT - 6.0,
            ty = y + 4.0,
            label = format_tick(axis_max * frac)
        );
    }

    let bar_w = (W - LEFT) * 0.5;
    let bar_x = LEFT + (W - LEFT - bar_w) / 2.0;
    let _ = write!(
        svg,
        "<rect x=\"{bar_x:.1}\" y=\"{y:.1}\" width=\"{bar_w:.1}\" height=\"{bar_h:.1}\" fill=\"#636EFA\"/>\
         <text x=\"{cx:.1}\" y=\"{ty:.1}\" text-anchor=\"middle\" font-size=\"13\">{value:.2}</text>\
         <text x=\"{cx:.1}\" y=\"{ly:.1}\" text-anchor=\"middle\" font-size=\"12\">{category}</text></svg>",
        y = base_y - bar_h,
        cx = bar_x + bar_w / 2.0,
        ty = (base_y - bar_h - 6.0).max(TOP - 4.0),
        value = chart.value,
        ly = base_y + 20.0,
        category = escape_html(&chart.category)
    );
    svg
}

fn format_tick(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
