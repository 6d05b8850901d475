use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use emsim_core::export::{self, Provenance};
use emsim_core::{
    EventsLoader, FieldKernel, Image, LfpParams, PointSourceKernel, SamplePoints, Scene, Vec3,
    Volume, VsdLoader, VsdParams,
};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Project simulated neural activity onto imaging grids
#[derive(Parser, Debug)]
#[command(name = "emsim", version)]
#[command(about = "Voltage-sensitive dye and extracellular field projection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Voltage-sensitive dye images, one per frame
    Vsd(VsdArgs),
    /// Extracellular field volumes and probe time series
    Lfp(LfpArgs),
}

/// Arguments shared by both pipelines
#[derive(Args, Debug)]
struct CommonArgs {
    /// Scene file holding the circuit and its reports (JSON)
    #[arg(short, long)]
    scene: PathBuf,

    /// Base path of every output file
    #[arg(short, long)]
    output: PathBuf,

    /// Base parameter file (JSON); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cell target, every cell when absent
    #[arg(short, long)]
    target: Option<String>,

    /// Fraction of the target to load, in [0, 1]
    #[arg(long)]
    fraction: Option<f32>,

    /// First frame time (ms)
    #[arg(long)]
    start_time: Option<f32>,

    /// Last frame time (ms)
    #[arg(long)]
    end_time: Option<f32>,

    /// Write the volume of every frame
    #[arg(long)]
    export_volume: bool,
}

#[derive(Args, Debug)]
struct VsdArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Voltage report name
    #[arg(long)]
    voltage_report: Option<String>,

    /// Area report name
    #[arg(long)]
    area_report: Option<String>,

    /// Dye attenuation curve, one value per line
    #[arg(long)]
    curve: Option<PathBuf>,

    /// Sensor pixels per side
    #[arg(long)]
    sensor_res: Option<usize>,

    /// Sensor side (µm)
    #[arg(long)]
    sensor_dim: Option<f32>,

    /// Frame interval (ms), rounded to a multiple of the report step
    #[arg(long)]
    time_step: Option<f32>,

    /// Depth of the cortical surface (µm)
    #[arg(long)]
    depth: Option<f32>,

    /// Absorption plus scattering coefficient (1/µm)
    #[arg(long)]
    sigma: Option<f32>,

    /// Resting potential (mV)
    #[arg(long, allow_hyphen_values = true)]
    v0: Option<f32>,

    /// Fluorescence at rest
    #[arg(long, allow_hyphen_values = true)]
    g0: Option<f32>,

    /// Voltage clamp applied before projection (mV)
    #[arg(long, allow_hyphen_values = true)]
    ap_threshold: Option<f32>,

    /// Interpolate between attenuation curve samples
    #[arg(long)]
    interpolate_attenuation: bool,

    /// Write the soma pixel table
    #[arg(long)]
    soma_pixels: bool,
}

#[derive(Args, Debug)]
struct LfpArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Current report name
    #[arg(long)]
    report: Option<String>,

    /// Voxel size as x,y,z
    #[arg(long, value_parser = parse_vec3)]
    voxel_size: Option<Vec3>,

    /// Padding around the circuit as x,y,z
    #[arg(long, value_parser = parse_vec3)]
    volume_extent: Option<Vec3>,

    /// Probe position as x,y,z (repeatable)
    #[arg(long = "sample-point", value_parser = parse_vec3, allow_hyphen_values = true)]
    sample_points: Vec<Vec3>,
}

/// Parse `x,y,z` into a vector
fn parse_vec3(text: &str) -> std::result::Result<Vec3, String> {
    let values: Vec<f32> = text
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid number in '{text}': {e}"))?;
    match values.as_slice() {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(format!("expected x,y,z, got '{text}'")),
    }
}

/// Parameters from `--config`, or their defaults
fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn load_scene(path: &Path) -> Result<Scene> {
    Scene::load(path).with_context(|| format!("loading scene {}", path.display()))
}

impl CommonArgs {
    fn provenance(&self, target: &str, report: &str) -> Provenance {
        Provenance {
            scene: self.scene.display().to_string(),
            target: target.to_string(),
            report: report.to_string(),
        }
    }
}

impl VsdArgs {
    fn params(&self) -> Result<VsdParams> {
        let c = &self.common;
        let mut params: VsdParams = load_config(c.config.as_deref())?;
        if let Some(target) = &c.target {
            params.target.clone_from(target);
        }
        if let Some(fraction) = c.fraction {
            params.fraction = fraction;
        }
        if let Some(start) = c.start_time {
            params.time_range.start = start;
        }
        if let Some(end) = c.end_time {
            params.time_range.end = end;
        }
        params.export_volume |= c.export_volume;
        if let Some(report) = &self.voltage_report {
            params.voltage_report.clone_from(report);
        }
        if let Some(report) = &self.area_report {
            params.area_report.clone_from(report);
        }
        if let Some(curve) = &self.curve {
            params.curve_file = Some(curve.clone());
        }
        if let Some(res) = self.sensor_res {
            params.sensor_res = res;
        }
        if let Some(dim) = self.sensor_dim {
            params.sensor_dim = dim;
        }
        if let Some(dt) = self.time_step {
            params.time_step = Some(dt);
        }
        if let Some(depth) = self.depth {
            params.depth = depth;
        }
        if let Some(sigma) = self.sigma {
            params.sigma = sigma;
        }
        if let Some(v0) = self.v0 {
            params.v0 = v0;
        }
        if let Some(g0) = self.g0 {
            params.g0 = g0;
        }
        if let Some(threshold) = self.ap_threshold {
            params.ap_threshold = threshold;
        }
        params.interpolate_attenuation |= self.interpolate_attenuation;
        params.export_soma_pixels |= self.soma_pixels;
        Ok(params)
    }
}

impl LfpArgs {
    fn params(&self) -> Result<LfpParams> {
        let c = &self.common;
        let mut params: LfpParams = load_config(c.config.as_deref())?;
        if let Some(target) = &c.target {
            params.target.clone_from(target);
        }
        if let Some(fraction) = c.fraction {
            params.fraction = fraction;
        }
        if let Some(start) = c.start_time {
            params.time_range.start = start;
        }
        if let Some(end) = c.end_time {
            params.time_range.end = end;
        }
        params.export_volume |= c.export_volume;
        if let Some(report) = &self.report {
            params.report.clone_from(report);
        }
        if let Some(size) = self.voxel_size {
            params.voxel_size = size;
        }
        if let Some(extent) = self.volume_extent {
            params.extent = extent;
        }
        params.sample_points.extend(self.sample_points.iter().copied());
        Ok(params)
    }
}

fn run_vsd(args: &VsdArgs) -> Result<()> {
    let params = args.params()?;
    let scene = load_scene(&args.common.scene)?;
    let voltage = scene.report(&params.voltage_report)?;
    let mut area = scene.report(&params.area_report)?;

    let mut loader = VsdLoader::new(&params, &scene.circuit, Box::new(voltage), &mut area)
        .context("setting up the VSD projection")?;

    let output = &args.common.output;
    if params.export_soma_pixels {
        export::write_soma_pixels(output, &loader.soma_pixels())?;
    }

    let provenance = args
        .common
        .provenance(&params.target, &params.voltage_report);
    let unit = loader.data_unit().to_string();
    let timeline = *loader.timeline();

    for frame in 0..timeline.frames_count() {
        let time = timeline.time_of(frame);
        let volume = loader.load_next_frame()?;
        if params.export_volume {
            export::write_meta_image(output, time, volume)?;
        }
        let image = Image::project_y(volume);
        export::write_image(output, time, &image, &unit, &provenance)?;
    }

    info!("Projected {} frames", timeline.frames_count());
    Ok(())
}

fn run_lfp(args: &LfpArgs) -> Result<()> {
    let params = args.params()?;
    if params.sample_points.is_empty() && !params.export_volume {
        warn!("Neither sample points nor volume export requested, only loading the circuit");
    }

    let scene = load_scene(&args.common.scene)?;
    let report = scene.report(&params.report)?;
    let mut loader = EventsLoader::new(&params, &scene.circuit, Box::new(report))
        .context("loading events")?;

    let timeline = *loader.timeline();
    let unit = loader.data_unit().to_string();
    let provenance = args.common.provenance(&params.target, &params.report);
    let output = &args.common.output;

    let mut samples = if params.sample_points.is_empty() {
        None
    } else {
        Some(SamplePoints::new(
            timeline.frames_count(),
            params.sample_points.clone(),
        )?)
    };
    let mut volume = if params.export_volume {
        Some(Volume::new(
            params.voxel_size,
            params.extent,
            loader.circuit_bounds(),
        )?)
    } else {
        None
    };
    let kernel = PointSourceKernel::default();

    for frame in 0..timeline.frames_count() {
        let time = timeline.time_of(frame);
        let events = loader.load_next_frame()?;
        if let Some(samples) = samples.as_mut() {
            samples.compute_next_frame(events)?;
        }
        if let Some(volume) = volume.as_mut() {
            kernel.compute(events, volume);
            export::write_volume(output, time, volume, &unit, &provenance)?;
        }
    }

    if let Some(samples) = &samples {
        export::write_sample_points(output, samples, &timeline, &provenance)?;
    }

    info!("Processed {} frames", timeline.frames_count());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Vsd(args) => run_vsd(args),
        Command::Lfp(args) => run_lfp(args),
    }
}
