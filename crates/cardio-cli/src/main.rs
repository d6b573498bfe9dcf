use anyhow::{bail, Result};
use cardio_lib::{
    analysis::{
        envelope::AmplitudeAnalyzer, trend::TrendExtractor, EnvelopeMethod, TrendMethod,
    },
    detectors::peaks::{detect_r_peaks, PeakWindow},
    io::{export::write_columns_csv, recording::DEFAULT_INTERVAL_MS, text as text_io, Recording},
    metrics::{RrStats, SeriesSummary},
    noise::NoiseConfig,
    pipeline::{read_pipeline_config, run_synthesis, PipelineConfig},
    plot::{
        figure_from_envelope, figure_from_rr, figure_from_signal_with_peaks,
        figure_from_synthetic, figure_from_trend, Figure, PlotBackend, Series,
    },
    signal::{RRIntervals, Signal},
};
use clap::{Args, Parser, Subcommand};
use log::info;
use plotters::prelude::*;
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "cardio",
    version,
    about = "Beat detection, envelope/trend extraction and surrogate waveform synthesis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Tab-separated lab recording (Time, HR, Av BP, BP, D, BP2, ...)
    #[arg(long, conflicts_with = "input")]
    recording: Option<PathBuf>,
    /// Recording channel to analyse
    #[arg(long, default_value = "HR")]
    channel: String,
    /// Recording sample interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_INTERVAL_MS)]
    interval_ms: f64,
    /// Crop the recording before analysis (seconds)
    #[arg(long, requires = "crop_end")]
    crop_start: Option<f64>,
    #[arg(long, requires = "crop_start")]
    crop_end: Option<f64>,
    /// Newline-delimited samples; stdin when neither this nor --recording is given
    #[arg(long)]
    input: Option<PathBuf>,
    /// Sampling rate of --input / stdin samples (Hz)
    #[arg(long, default_value_t = 200.0)]
    fs: f64,
}

#[derive(Args)]
struct ZoomArgs {
    #[arg(long, requires = "zoom_end")]
    zoom_start: Option<f64>,
    #[arg(long, requires = "zoom_start")]
    zoom_end: Option<f64>,
}

impl ZoomArgs {
    fn window(&self) -> Option<(f64, f64)> {
        self.zoom_start.zip(self.zoom_end)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Detect R-peaks and report RR intervals with summary statistics
    Peaks {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, default_value_t = 0.4)]
        min_spacing_s: f64,
        #[arg(long, default_value_t = 3.0)]
        min_prominence: f64,
        #[command(flatten)]
        zoom: ZoomArgs,
        /// Render the signal with its peaks to a PNG
        #[arg(long)]
        plot: Option<PathBuf>,
        /// Render the RR series to a PNG
        #[arg(long)]
        rr_plot: Option<PathBuf>,
    },
    /// Extract an amplitude envelope and summarise it
    Envelope {
        #[command(flatten)]
        input: InputArgs,
        /// hilbert, interp or minmax
        #[arg(long, default_value = "minmax")]
        method: EnvelopeMethod,
        /// Sliding window for minmax (samples)
        #[arg(long)]
        window_size: Option<usize>,
        /// Peak spacing for interp (samples)
        #[arg(long)]
        distance: Option<usize>,
        /// Peak prominence for interp
        #[arg(long)]
        prominence: Option<f64>,
        #[command(flatten)]
        zoom: ZoomArgs,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// Extract the slow trend and summarise it
    Trend {
        #[command(flatten)]
        input: InputArgs,
        /// rolling, spline or combined
        #[arg(long, default_value = "rolling")]
        method: TrendMethod,
        #[arg(long)]
        window_size: Option<usize>,
        #[arg(long)]
        smoothing: Option<f64>,
        #[command(flatten)]
        zoom: ZoomArgs,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// Detect beats, measure and optionally perturb them, then assemble a surrogate signal
    Synthesize {
        #[command(flatten)]
        input: InputArgs,
        /// Pipeline configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Noise seed; overrides the configuration
        #[arg(long)]
        seed: Option<u64>,
        /// Perturb with default noise when the configuration has none
        #[arg(long)]
        noise: bool,
        #[command(flatten)]
        zoom: ZoomArgs,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        plot: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Peaks {
            input,
            min_spacing_s,
            min_prominence,
            zoom,
            plot,
            rr_plot,
        } => cmd_peaks(
            &input,
            min_spacing_s,
            min_prominence,
            &zoom,
            plot.as_deref(),
            rr_plot.as_deref(),
        )?,
        Commands::Envelope {
            input,
            method,
            window_size,
            distance,
            prominence,
            zoom,
            csv,
            plot,
        } => {
            let method = envelope_method(method, window_size, distance, prominence);
            cmd_envelope(&input, &method, &zoom, csv.as_deref(), plot.as_deref())?
        }
        Commands::Trend {
            input,
            method,
            window_size,
            smoothing,
            zoom,
            csv,
            plot,
        } => {
            let method = trend_method(method, window_size, smoothing);
            cmd_trend(&input, &method, &zoom, csv.as_deref(), plot.as_deref())?
        }
        Commands::Synthesize {
            input,
            config,
            seed,
            noise,
            zoom,
            csv,
            plot,
        } => cmd_synthesize(
            &input,
            config.as_deref(),
            seed,
            noise,
            &zoom,
            csv.as_deref(),
            plot.as_deref(),
        )?,
    }
    Ok(())
}

fn envelope_method(
    method: EnvelopeMethod,
    window_size: Option<usize>,
    distance: Option<usize>,
    prominence: Option<f64>,
) -> EnvelopeMethod {
    match method {
        EnvelopeMethod::Hilbert => EnvelopeMethod::Hilbert,
        EnvelopeMethod::Interp {
            distance: d,
            prominence: p,
        } => EnvelopeMethod::Interp {
            distance: distance.unwrap_or(d),
            prominence: prominence.unwrap_or(p),
        },
        EnvelopeMethod::MinMax { window_size: w } => EnvelopeMethod::MinMax {
            window_size: window_size.unwrap_or(w),
        },
    }
}

fn trend_method(
    method: TrendMethod,
    window_size: Option<usize>,
    smoothing: Option<f64>,
) -> TrendMethod {
    match method {
        TrendMethod::Rolling { window_size: w } => TrendMethod::Rolling {
            window_size: window_size.unwrap_or(w),
        },
        TrendMethod::Spline { smoothing: s } => TrendMethod::Spline {
            smoothing: smoothing.unwrap_or(s),
        },
        TrendMethod::Combined {
            window_size: w,
            smoothing: s,
        } => TrendMethod::Combined {
            window_size: window_size.unwrap_or(w),
            smoothing: smoothing.unwrap_or(s),
        },
    }
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn load_signal(args: &InputArgs) -> Result<Signal> {
    if let Some(path) = &args.recording {
        let mut recording = Recording::read(path, args.interval_ms)?;
        if let (Some(start), Some(end)) = (args.crop_start, args.crop_end) {
            recording = recording.crop(start, end)?;
        }
        let signal = recording.channel(&args.channel)?;
        info!(
            "loaded {} samples of {} from {}",
            signal.len(),
            args.channel,
            path.display()
        );
        return Ok(signal);
    }
    let samples = read_samples(args.input.as_deref())?;
    Ok(Signal::uniform(samples, args.fs)?)
}

#[derive(Serialize)]
struct PeaksOutput<'a> {
    peaks: &'a [usize],
    rr: &'a RRIntervals,
    stats: RrStats,
}

fn cmd_peaks(
    input: &InputArgs,
    min_spacing_s: f64,
    min_prominence: f64,
    zoom: &ZoomArgs,
    plot: Option<&Path>,
    rr_plot: Option<&Path>,
) -> Result<()> {
    let signal = load_signal(input)?;
    let detection = detect_r_peaks(&signal, min_spacing_s, min_prominence);
    let window: Option<PeakWindow> = zoom
        .window()
        .map(|(start, end)| detection.window(&signal, start, end));
    let output = PeaksOutput {
        peaks: window
            .as_ref()
            .map_or(&detection.peaks.indices, |w| &w.peaks),
        rr: &detection.rr,
        stats: detection.stats(),
    };
    println!("{}", serde_json::to_string(&output)?);
    if let Some(path) = plot {
        let fig = figure_from_signal_with_peaks(
            &input.channel,
            &signal,
            &detection.peaks,
            zoom.window(),
        );
        PngBackend { path }.draw(&fig)?;
    }
    if let Some(path) = rr_plot {
        PngBackend { path }.draw(&figure_from_rr(&detection.rr))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct SummaryOutput<T: Serialize> {
    method: T,
    samples: usize,
    summary: Option<SeriesSummary>,
}

fn cmd_envelope(
    input: &InputArgs,
    method: &EnvelopeMethod,
    zoom: &ZoomArgs,
    csv: Option<&Path>,
    plot: Option<&Path>,
) -> Result<()> {
    let signal = load_signal(input)?;
    let mut analyzer = AmplitudeAnalyzer::new(&signal);
    let summary = analyzer.analyze_amplitude(method)?;
    println!(
        "{}",
        serde_json::to_string(&SummaryOutput {
            method: *method,
            samples: signal.len(),
            summary,
        })?
    );
    let envelope = analyzer.envelope(method)?;
    if let Some(path) = csv {
        let mut columns = vec![("time", signal.time()), ("upper", envelope.upper.as_slice())];
        if let Some(lower) = &envelope.lower {
            columns.push(("lower", lower.as_slice()));
        }
        write_columns_csv(path, &columns)?;
    }
    if let Some(path) = plot {
        let fig = figure_from_envelope(&signal, envelope, method.name(), zoom.window());
        PngBackend { path }.draw(&fig)?;
    }
    Ok(())
}

fn cmd_trend(
    input: &InputArgs,
    method: &TrendMethod,
    zoom: &ZoomArgs,
    csv: Option<&Path>,
    plot: Option<&Path>,
) -> Result<()> {
    let signal = load_signal(input)?;
    let mut extractor = TrendExtractor::new(&signal);
    let trend = extractor.extract(method)?;
    println!(
        "{}",
        serde_json::to_string(&SummaryOutput {
            method: *method,
            samples: signal.len(),
            summary: cardio_lib::metrics::summarize(trend),
        })?
    );
    if let Some(path) = csv {
        write_columns_csv(
            path,
            &[
                ("time", signal.time()),
                ("signal", signal.samples()),
                ("trend", trend),
            ],
        )?;
    }
    if let Some(path) = plot {
        let fig = figure_from_trend(&signal, trend, method.name(), zoom.window());
        PngBackend { path }.draw(&fig)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct SynthesisOutput<'a> {
    sampling_rate: f64,
    source_peaks: usize,
    source_stats: RrStats,
    beats: usize,
    samples: usize,
    beat_intervals: &'a [f64],
    amplitudes: &'a [f64],
    r_peaks: &'a [usize],
    synthetic_stats: RrStats,
}

fn cmd_synthesize(
    input: &InputArgs,
    config: Option<&Path>,
    seed: Option<u64>,
    noise: bool,
    zoom: &ZoomArgs,
    csv: Option<&Path>,
    plot: Option<&Path>,
) -> Result<()> {
    let signal = load_signal(input)?;
    let mut cfg = match config {
        Some(path) => read_pipeline_config(path)?,
        None => PipelineConfig::default(),
    };
    if seed.is_some() {
        cfg.seed = seed;
    }
    if noise && cfg.noise.is_none() {
        cfg.noise = Some(NoiseConfig::default());
    }
    let report = run_synthesis(&signal, &cfg)?;
    if report.synthetic.is_empty() {
        bail!(
            "synthesis needs at least two detected peaks, found {}",
            report.source.peaks.len()
        );
    }
    let output = SynthesisOutput {
        sampling_rate: report.sampling_rate,
        source_peaks: report.source.peaks.len(),
        source_stats: report.source_stats,
        beats: report.synthetic.r_peaks.len(),
        samples: report.synthetic.len(),
        beat_intervals: &report.beat_intervals,
        amplitudes: &report.amplitudes,
        r_peaks: &report.synthetic.r_peaks,
        synthetic_stats: report.synthetic_stats,
    };
    println!("{}", serde_json::to_string(&output)?);
    if let Some(path) = csv {
        write_columns_csv(
            path,
            &[
                ("time", report.synthetic.time.as_slice()),
                ("synthetic", report.synthetic.samples.as_slice()),
            ],
        )?;
    }
    if let Some(path) = plot {
        let fig = figure_from_synthetic(&report.synthetic, zoom.window());
        PngBackend { path }.draw(&fig)?;
    }
    Ok(())
}

struct PngBackend<'a> {
    path: &'a Path,
}

impl PlotBackend for PngBackend<'_> {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        draw_plotters_figure(self.path, fig)
    }
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, hi + 0.5)
    }
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let Some((x_min, x_max, y_min, y_max)) = fig.bounds() else {
        bail!("nothing to plot");
    };
    let (x_min, x_max) = padded(x_min, x_max);
    let (y_min, y_max) = padded(y_min, y_max);
    let backend = BitMapBackend::new(path, (1200, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                ))?;
            }
            Series::Points(points) => {
                let (r, g, b) = points.style.color.rgb();
                let radius = points.style.width.round().max(1.0) as i32;
                chart.draw_series(points.points.iter().map(|p| {
                    Circle::new((p[0], p[1]), radius, RGBColor(r, g, b).filled())
                }))?;
            }
        }
    }
    root.present()?;
    info!("wrote plot {}", path.display());
    Ok(())
}
