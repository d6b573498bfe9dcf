use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::{
    analysis::envelope::Envelope,
    signal::{PeakSet, RRIntervals, Signal},
    synth::SyntheticSignal,
};

/// Default cap on points per series handed to a backend.
pub const MAX_POINTS: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    /// Stroke width for lines, marker radius for points.
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    /// Unconnected markers sharing the line layout.
    Points(LineSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(s) | Series::Points(s) => &s.points,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Series::Line(s) | Series::Points(s) => &s.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn with_labels(mut self, x: &str, y: &str) -> Self {
        self.x.label = Some(x.into());
        self.y.label = Some(y.into());
        self
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over all series, `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

fn line(name: &str, points: Vec<[f64; 2]>, width: f32, color: u32) -> Series {
    Series::Line(LineSeries {
        name: name.into(),
        points: decimate_points(&points, MAX_POINTS),
        style: Style {
            width,
            dash: None,
            color: Color(color),
        },
    })
}

fn markers(name: &str, points: Vec<[f64; 2]>, color: u32) -> Series {
    Series::Points(LineSeries {
        name: name.into(),
        points,
        style: Style {
            width: 3.0,
            dash: None,
            color: Color(color),
        },
    })
}

fn zoom_range(time: &[f64], zoom: Option<(f64, f64)>) -> Range<usize> {
    match zoom {
        Some((start, end)) => {
            let lo = time.partition_point(|&t| t < start);
            let hi = time.partition_point(|&t| t <= end).max(lo);
            lo..hi
        }
        None => 0..time.len(),
    }
}

fn trace(time: &[f64], values: &[f64], range: Range<usize>) -> Vec<[f64; 2]> {
    range
        .filter_map(|i| Some([*time.get(i)?, *values.get(i)?]))
        .collect()
}

pub fn figure_from_rr_limit(rr: &RRIntervals, max_points: usize) -> Figure {
    let mut fig = Figure::new(Some("RR intervals".into())).with_labels("beat", "RR (s)");
    let points: Vec<[f64; 2]> = rr
        .rr
        .iter()
        .enumerate()
        .map(|(i, value)| [i as f64, *value])
        .collect();
    fig.add_series(Series::Line(LineSeries {
        name: "RR".into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 2.0,
            dash: None,
            color: Color(0xFF0077),
        },
    }));
    fig
}

pub fn figure_from_rr(rr: &RRIntervals) -> Figure {
    figure_from_rr_limit(rr, 1024)
}

/// Signal trace with detected peaks marked, optionally restricted to
/// `[start, end]` seconds.
pub fn figure_from_signal_with_peaks(
    title: &str,
    signal: &Signal,
    peaks: &PeakSet,
    zoom: Option<(f64, f64)>,
) -> Figure {
    let range = zoom_range(signal.time(), zoom);
    let mut fig = Figure::new(Some(title.into())).with_labels("time (s)", "amplitude");
    fig.add_series(line(
        "signal",
        trace(signal.time(), signal.samples(), range.clone()),
        1.2,
        0x1F77B4,
    ));
    let marked: Vec<[f64; 2]> = peaks
        .indices
        .iter()
        .filter(|&&idx| range.contains(&idx))
        .map(|&idx| [signal.time()[idx], signal.samples()[idx]])
        .collect();
    fig.add_series(markers("peaks", marked, 0xD62728));
    fig
}

pub fn figure_from_envelope(
    signal: &Signal,
    envelope: &Envelope,
    method: &str,
    zoom: Option<(f64, f64)>,
) -> Figure {
    let time = signal.time();
    let range = zoom_range(time, zoom);
    let mut fig = Figure::new(Some(format!("Envelope ({method})")))
        .with_labels("time (s)", "amplitude");
    fig.add_series(line(
        "signal",
        trace(time, signal.samples(), range.clone()),
        1.0,
        0x7F7F7F,
    ));
    fig.add_series(line(
        "upper",
        trace(time, &envelope.upper, range.clone()),
        1.6,
        0x2CA02C,
    ));
    if let Some(lower) = &envelope.lower {
        fig.add_series(line("lower", trace(time, lower, range), 1.6, 0x9467BD));
    }
    fig
}

pub fn figure_from_trend(
    signal: &Signal,
    trend: &[f64],
    method: &str,
    zoom: Option<(f64, f64)>,
) -> Figure {
    let time = signal.time();
    let range = zoom_range(time, zoom);
    let mut fig =
        Figure::new(Some(format!("Trend ({method})"))).with_labels("time (s)", "amplitude");
    fig.add_series(line(
        "signal",
        trace(time, signal.samples(), range.clone()),
        1.0,
        0x7F7F7F,
    ));
    fig.add_series(line("trend", trace(time, trend, range), 2.0, 0xFF7F0E));
    fig
}

pub fn figure_from_synthetic(synthetic: &SyntheticSignal, zoom: Option<(f64, f64)>) -> Figure {
    let range = zoom_range(&synthetic.time, zoom);
    let mut fig =
        Figure::new(Some("Synthetic signal".into())).with_labels("time (s)", "amplitude");
    fig.add_series(line(
        "synthetic",
        trace(&synthetic.time, &synthetic.samples, range.clone()),
        1.2,
        0x8B0000,
    ));
    let apexes: Vec<[f64; 2]> = synthetic
        .r_peaks
        .iter()
        .filter(|&&idx| range.contains(&idx))
        .filter_map(|&idx| Some([*synthetic.time.get(idx)?, *synthetic.samples.get(idx)?]))
        .collect();
    fig.add_series(markers("R", apexes, 0x1F77B4));
    fig
}
