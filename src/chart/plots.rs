//! Drawing routines, one per computed chart. Each one paints onto the area it
//! is handed and keeps no state of its own.

use chrono::{NaiveDate, Weekday};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::aggregate::{weekday_name, CorrelationMatrix};
use super::canvas::{Area, FONT_FAMILY};

const CRIMSON: RGBColor = RGBColor(220, 20, 60);
const LIGHT_CORAL: RGBColor = RGBColor(240, 128, 128);
const FOREST_GREEN: RGBColor = RGBColor(34, 139, 34);
const SEA_GREEN: RGBColor = RGBColor(60, 179, 113);
const SLATE_BLUE: RGBColor = RGBColor(106, 90, 205);
const STEEL_BLUE: RGBColor = RGBColor(70, 130, 180);
const GRID: RGBColor = RGBColor(220, 220, 220);
const MISSING_CELL: RGBColor = RGBColor(235, 235, 235);

pub struct Line<'a> {
    pub label: &'a str,
    pub values: Vec<Option<f64>>,
    pub style: ShapeStyle,
}

fn millions(v: &f64) -> String {
    format!("{:.1}M", v * 1e-6)
}

fn plain(v: &f64) -> String {
    if v.abs() >= 1000.0 {
        format!("{:.0}", v)
    } else {
        format!("{}", (v * 100.0).round() / 100.0)
    }
}

/// Value range with 5% headroom that always includes zero.
fn y_range<I: IntoIterator<Item = f64>>(values: I) -> (f64, f64) {
    let (mut lo, mut hi) = (0.0f64, 0.0f64);
    for v in values {
        if v.is_finite() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if hi <= lo {
        hi = lo + 1.0;
    }
    let pad = (hi - lo) * 0.05;
    (if lo < 0.0 { lo - pad } else { lo }, hi + pad)
}

/// Splits a series at missing values so gaps are left undrawn.
fn runs(values: &[Option<f64>]) -> Vec<Vec<(usize, f64)>> {
    let mut out = Vec::new();
    let mut cur = Vec::new();
    for (i, v) in values.iter().enumerate() {
        match v {
            Some(v) => cur.push((i, *v)),
            None if !cur.is_empty() => out.push(std::mem::take(&mut cur)),
            None => {}
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Line plot against report dates (x is the position in `dates`).
pub fn date_lines(
    root: &Area<'_>,
    text: bool,
    title: &str,
    y_desc: &str,
    dates: &[NaiveDate],
    lines: &[Line<'_>],
) -> anyhow::Result<()> {
    let x_max = dates.len().saturating_sub(1).max(1);
    let (y_lo, y_hi) = y_range(lines.iter().flat_map(|l| l.values.iter().flatten().copied()));

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if text {
        builder
            .caption(title, (FONT_FAMILY, 26))
            .x_label_area_size(45)
            .y_label_area_size(80);
    }
    let mut chart = builder.build_cartesian_2d(0usize..x_max, y_lo..y_hi)?;

    let x_fmt = |i: &usize| dates.get(*i).map(|d| d.to_string()).unwrap_or_default();
    let y_fmt = plain;
    let mut mesh = chart.configure_mesh();
    mesh.light_line_style(&GRID).bold_line_style(&GRID);
    if text {
        mesh.x_desc("Date")
            .y_desc(y_desc)
            .x_labels(8)
            .y_labels(10)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .label_style((FONT_FAMILY, 13));
    }
    mesh.draw()?;

    for line in lines {
        let mut labelled = false;
        for run in runs(&line.values) {
            let series = chart.draw_series(LineSeries::new(run, line.style))?;
            if text && !labelled {
                let style = line.style;
                series
                    .label(line.label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
                labelled = true;
            }
        }
    }

    if text && lines.len() > 1 {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font((FONT_FAMILY, 14))
            .draw()?;
    }
    Ok(())
}

pub struct Bars<'a> {
    pub title: &'a str,
    pub y_desc: &'a str,
    pub labels: Vec<String>,
    pub values: Vec<Option<f64>>,
    pub color: RGBColor,
    pub in_millions: bool,
}

/// Categorical bar plot; missing values leave an empty slot.
pub fn bars(root: &Area<'_>, text: bool, spec: &Bars<'_>) -> anyhow::Result<()> {
    let n = spec.labels.len().max(1);
    let (y_lo, y_hi) = y_range(spec.values.iter().flatten().copied());

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if text {
        builder
            .caption(spec.title, (FONT_FAMILY, 26))
            .x_label_area_size(60)
            .y_label_area_size(80);
    }
    let mut chart = builder.build_cartesian_2d((0..n).into_segmented(), y_lo..y_hi)?;

    let x_fmt = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(i) => spec.labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    };
    let y_fmt: fn(&f64) -> String = if spec.in_millions { millions } else { plain };
    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh().light_line_style(&GRID).bold_line_style(&GRID);
    if text {
        mesh.y_desc(spec.y_desc)
            .x_labels(n)
            .y_labels(10)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .x_label_style((FONT_FAMILY, 11))
            .y_label_style((FONT_FAMILY, 13));
    }
    mesh.draw()?;

    chart.draw_series(spec.values.iter().enumerate().filter_map(|(i, v)| {
        v.map(|v| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), v)],
                spec.color.filled(),
            );
            bar.set_margin(0, 0, 8, 8);
            bar
        })
    }))?;
    Ok(())
}

pub fn weekday_bars(values: &[(Weekday, Option<f64>)]) -> Bars<'static> {
    Bars {
        title: "Average New Deaths by Day of the Week",
        y_desc: "Avg New Deaths",
        labels: values.iter().map(|(d, _)| weekday_name(*d).to_string()).collect(),
        values: values.iter().map(|(_, v)| *v).collect(),
        color: SLATE_BLUE,
        in_millions: false,
    }
}

pub fn top_countries_bars(rows: &[(String, Option<f64>)]) -> Bars<'static> {
    Bars {
        title: "Top 10 Countries by Cumulative Deaths",
        y_desc: "Deaths",
        labels: rows.iter().map(|(k, _)| k.clone()).collect(),
        values: rows.iter().map(|(_, v)| *v).collect(),
        color: FOREST_GREEN,
        in_millions: true,
    }
}

pub fn region_bars(rows: &[(String, Option<f64>)]) -> Bars<'static> {
    Bars {
        title: "Total COVID-19 Deaths by WHO Region",
        y_desc: "Total Cumulative Deaths",
        labels: rows.iter().map(|(k, _)| k.clone()).collect(),
        values: rows.iter().map(|(_, v)| *v).collect(),
        color: SEA_GREEN,
        in_millions: true,
    }
}

pub fn global_new_deaths(root: &Area<'_>, text: bool, series: &[(NaiveDate, f64)]) -> anyhow::Result<()> {
    let dates: Vec<NaiveDate> = series.iter().map(|(d, _)| *d).collect();
    let line = Line {
        label: "Daily Deaths",
        values: series.iter().map(|(_, v)| Some(*v)).collect(),
        style: ShapeStyle::from(&RED).stroke_width(2),
    };
    date_lines(root, text, "Global Daily New Deaths Over Time", "Number of Deaths", &dates, &[line])
}

pub fn country_new_deaths(
    root: &Area<'_>,
    text: bool,
    country: &str,
    series: &[(NaiveDate, Option<f64>)],
) -> anyhow::Result<()> {
    let dates: Vec<NaiveDate> = series.iter().map(|(d, _)| *d).collect();
    let line = Line {
        label: country,
        values: series.iter().map(|(_, v)| *v).collect(),
        style: ShapeStyle::from(&RED).stroke_width(2),
    };
    let title = format!("Daily COVID-19 Deaths in {}", country);
    date_lines(root, text, &title, "New Deaths", &dates, &[line])
}

pub fn moving_average(
    root: &Area<'_>,
    text: bool,
    dates: &[NaiveDate],
    daily: &[f64],
    averaged: &[f64],
) -> anyhow::Result<()> {
    let lines = [
        Line {
            label: "Daily Deaths",
            values: daily.iter().map(|v| Some(*v)).collect(),
            style: ShapeStyle::from(&LIGHT_CORAL.mix(0.5)).stroke_width(1),
        },
        Line {
            label: "7-Day Moving Avg",
            values: averaged.iter().map(|v| Some(*v)).collect(),
            style: ShapeStyle::from(&CRIMSON).stroke_width(2),
        },
    ];
    date_lines(
        root,
        text,
        "Global New Deaths with 7-Day Moving Average",
        "Number of Deaths",
        dates,
        &lines,
    )
}

/// Diverging blue-white-red scale over [-1, 1].
pub fn coolwarm(r: f64) -> RGBColor {
    let cold = (59.0, 76.0, 192.0);
    let mid = (221.0, 221.0, 221.0);
    let warm = (180.0, 4.0, 38.0);
    let t = r.clamp(-1.0, 1.0);
    let (a, b, f) = if t < 0.0 { (cold, mid, t + 1.0) } else { (mid, warm, t) };
    let lerp = |x: f64, y: f64| (x + (y - x) * f).round() as u8;
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

pub fn correlation_heatmap(root: &Area<'_>, text: bool, matrix: &CorrelationMatrix) -> anyhow::Result<()> {
    let k = matrix.columns.len().max(1);

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if text {
        builder
            .caption("Feature Correlation Heatmap", (FONT_FAMILY, 26))
            .x_label_area_size(40)
            .y_label_area_size(140);
    }
    let mut chart =
        builder.build_cartesian_2d((0..k).into_segmented(), (0..k).into_segmented())?;

    // Row 0 of the matrix is drawn at the top.
    let x_fmt = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(j) => matrix.columns.get(*j).map(|s| s.to_string()).unwrap_or_default(),
        _ => String::new(),
    };
    let y_fmt = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(r) if *r < k => matrix
            .columns
            .get(k - 1 - *r)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };
    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh();
    if text {
        mesh.x_labels(k)
            .y_labels(k)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .label_style((FONT_FAMILY, 13));
    }
    mesh.draw()?;

    let n = matrix.columns.len();
    let cells = (0..n).flat_map(|i| (0..n).map(move |j| (i, j)));
    chart.draw_series(cells.clone().map(|(i, j)| {
        let row = n - 1 - i;
        let color = matrix.get(i, j).map_or(MISSING_CELL, coolwarm);
        Rectangle::new(
            [
                (SegmentValue::Exact(j), SegmentValue::Exact(row)),
                (SegmentValue::Exact(j + 1), SegmentValue::Exact(row + 1)),
            ],
            color.filled(),
        )
    }))?;

    if text {
        let style = TextStyle::from((FONT_FAMILY, 16)).pos(Pos::new(HPos::Center, VPos::Center));
        chart.draw_series(cells.filter_map(|(i, j)| {
            matrix.get(i, j).map(|r| {
                Text::new(
                    format!("{:.2}", r),
                    (SegmentValue::CenterOf(j), SegmentValue::CenterOf(n - 1 - i)),
                    style.clone(),
                )
            })
        }))?;
    }
    Ok(())
}

/// Box summary of one group: quartiles, whiskers clamped to the most
/// extreme observations inside the 1.5·IQR fences (never inside the box),
/// and the outliers beyond.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

/// Linearly interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

impl BoxStats {
    pub fn new(values: &[f64]) -> Option<Self> {
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        finite.sort_by(f64::total_cmp);
        let (q1, median, q3) = (
            percentile(&finite, 0.25),
            percentile(&finite, 0.5),
            percentile(&finite, 0.75),
        );
        let iqr = q3 - q1;
        let (lower_fence, upper_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        let inside = finite.iter().copied().filter(|v| *v >= lower_fence && *v <= upper_fence);
        let whisker_low = inside.clone().fold(q1, f64::min);
        let whisker_high = inside.fold(q3, f64::max);
        let outliers = finite
            .into_iter()
            .filter(|v| *v < lower_fence || *v > upper_fence)
            .collect();
        Some(Self {
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            outliers,
        })
    }
}

pub fn region_boxplot(root: &Area<'_>, text: bool, groups: &[(String, Vec<f64>)]) -> anyhow::Result<()> {
    const HALF_BOX: i32 = 15;
    const HALF_CAP: i32 = 8;

    let n = groups.len().max(1);
    let (y_lo, y_hi) = y_range(groups.iter().flat_map(|(_, v)| v.iter().copied()));

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if text {
        builder
            .caption("Distribution of Daily New Deaths by WHO Region", (FONT_FAMILY, 26))
            .x_label_area_size(45)
            .y_label_area_size(80);
    }
    let mut chart =
        builder.build_cartesian_2d((0..n).into_segmented(), (y_lo as f32)..(y_hi as f32))?;

    let x_fmt = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(i) => groups.get(*i).map(|(k, _)| k.clone()).unwrap_or_default(),
        _ => String::new(),
    };
    let mut mesh = chart.configure_mesh();
    mesh.light_line_style(&GRID).bold_line_style(&GRID);
    if text {
        mesh.x_desc("WHO_region")
            .y_desc("New_deaths")
            .x_labels(n)
            .x_label_formatter(&x_fmt)
            .label_style((FONT_FAMILY, 13));
    }
    mesh.draw()?;

    let outline = ShapeStyle::from(&STEEL_BLUE).stroke_width(1);
    for (i, (_, values)) in groups.iter().enumerate() {
        let Some(stats) = BoxStats::new(values) else {
            continue;
        };
        // Box and whisker widths are in pixels, so draw them in backend space.
        let at = |y: f64| chart.backend_coord(&(SegmentValue::CenterOf(i), y as f32));
        let (cx, top) = at(stats.q3);
        let (_, bottom) = at(stats.q1);
        let (_, mid) = at(stats.median);
        let (_, low) = at(stats.whisker_low);
        let (_, high) = at(stats.whisker_high);

        root.draw(&Rectangle::new(
            [(cx - HALF_BOX, top), (cx + HALF_BOX, bottom)],
            STEEL_BLUE.mix(0.35).filled(),
        ))?;
        root.draw(&Rectangle::new([(cx - HALF_BOX, top), (cx + HALF_BOX, bottom)], outline))?;
        root.draw(&PathElement::new(
            vec![(cx - HALF_BOX, mid), (cx + HALF_BOX, mid)],
            ShapeStyle::from(&STEEL_BLUE).stroke_width(2),
        ))?;
        for (edge, end) in [(top, high), (bottom, low)] {
            root.draw(&PathElement::new(vec![(cx, edge), (cx, end)], outline))?;
            root.draw(&PathElement::new(vec![(cx - HALF_CAP, end), (cx + HALF_CAP, end)], outline))?;
        }

        chart.draw_series(
            stats
                .outliers
                .iter()
                .map(|v| Circle::new((SegmentValue::CenterOf(i), *v as f32), 2, BLACK.filled())),
        )?;
    }
    Ok(())
}
