#[macro_use]
extern crate anyhow;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::info;
use serde::Serialize;
use structopt::StructOpt;

use model::{
    compute_metrics, filter_window, parse_timestamp, AggregateMetrics, Model, Segment, SpeedMode,
    Trajectory, VehicleName, WindowedView,
};

#[derive(StructOpt)]
#[structopt(
    name = "fleet_metrics",
    about = "Distance and speed metrics for a fleet of vehicle position logs"
)]
struct Args {
    /// The path to a vehicle positions CSV file (Vehiculo, Tiempo, X, Z, Velocidad)
    #[structopt(long)]
    data: String,
    /// Analyze one vehicle. If omitted, list all vehicles instead.
    #[structopt(long)]
    vehicle: Option<String>,
    /// Window start, "HH:MM:SS" or "YYYY-MM-DD HH:MM:SS". Defaults to the
    /// vehicle's first sample.
    #[structopt(long)]
    start: Option<String>,
    /// Window end. Defaults to the vehicle's last sample.
    #[structopt(long)]
    end: Option<String>,
    /// When listing vehicles, only keep those active at least this many minutes
    #[structopt(long, default_value = "0")]
    min_minutes: f64,
    /// Average speed estimator: wallclock or moving
    #[structopt(long, default_value = "wallclock")]
    mode: SpeedMode,
    /// Write the per-sample time/distance-so-far/speed series to this CSV path
    #[structopt(long)]
    export_series: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::from_args();

    let file = fs_err::File::open(&args.data)?;
    let model = Model::load(file).with_context(|| format!("loading {}", args.data))?;
    info!("loaded {} vehicles from {}", model.vehicles().count(), args.data);

    match &args.vehicle {
        Some(name) => analyze(&args, &model, &VehicleName(name.clone())),
        None => {
            list_vehicles(&model, args.min_minutes);
            Ok(())
        }
    }
}

fn list_vehicles(model: &Model, min_minutes: f64) {
    let retained = model.filter_active(min_minutes);
    let total = model.vehicles().count();
    println!(
        "{} of {} vehicles active at least {} minutes:",
        retained.len(),
        total,
        min_minutes
    );
    for vehicle in retained {
        // filter_active only returns known vehicles
        let trajectory = model.trajectory(&vehicle).unwrap();
        println!(
            "  {}: {} samples, active {:.1} minutes",
            vehicle,
            trajectory.len(),
            trajectory.active_duration_seconds() / 60.0
        );
    }
}

fn analyze(args: &Args, model: &Model, vehicle: &VehicleName) -> Result<()> {
    let trajectory = model.trajectory(vehicle)?;
    let view = window(args, trajectory)?;
    if view.is_empty() {
        println!("Vehicle {}: no samples in the selected window", vehicle);
        return Ok(());
    }

    let (segments, cumulative, metrics) = compute_metrics(&view, args.mode);
    print_summary(vehicle, &view, &metrics, args.mode);

    if let Some(path) = &args.export_series {
        export_series(path, &view, &segments, &cumulative)?;
        println!("Wrote series to {}", path);
    }
    Ok(())
}

fn window(args: &Args, trajectory: &Trajectory) -> Result<WindowedView> {
    if args.start.is_none() && args.end.is_none() {
        return Ok(WindowedView::full(trajectory));
    }
    let bound = |raw: &Option<String>, default: Option<NaiveDateTime>| -> Result<NaiveDateTime> {
        match raw {
            Some(raw) => parse_timestamp(raw).with_context(|| format!("bad time \"{}\"", raw)),
            None => default.ok_or_else(|| anyhow!("trajectory is empty, specify both bounds")),
        }
    };
    let t_start = bound(&args.start, trajectory.start_time())?;
    let t_end = bound(&args.end, trajectory.end_time())?;
    filter_window(trajectory, t_start, t_end)
}

fn print_summary(
    vehicle: &VehicleName,
    view: &WindowedView,
    metrics: &AggregateMetrics,
    mode: SpeedMode,
) {
    let samples = view.samples();
    println!(
        "Vehicle {}: {} samples from {} to {}",
        vehicle,
        samples.len(),
        samples[0].time.time(),
        samples[samples.len() - 1].time.time()
    );
    println!("  Total distance: {:.2}", metrics.total_distance);
    let marker = |m: SpeedMode| if m == mode { "  <- selected" } else { "" };
    println!(
        "  Average speed (wallclock): {:.2} units/h{}",
        metrics.avg_speed_wallclock,
        marker(SpeedMode::Wallclock)
    );
    println!(
        "  Average speed (moving): {:.2} units/h{}",
        metrics.avg_speed_moving,
        marker(SpeedMode::Moving)
    );
    println!("  Max speed: {:.2} units/h", metrics.max_speed);
    println!(
        "  Active duration: {:.1} minutes",
        metrics.active_duration_seconds / 60.0
    );
}

fn export_series(
    path: &str,
    view: &WindowedView,
    segments: &[Segment],
    cumulative: &[f64],
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(fs_err::File::create(path)?);
    for (idx, sample) in view.samples().iter().enumerate() {
        // Segment i ends at sample i+1; the first sample has no segment behind it
        let speed_units_per_hour = if idx == 0 {
            0.0
        } else {
            segments[idx - 1].speed * 3600.0
        };
        writer.serialize(SeriesRow {
            time: sample.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            distance_so_far: cumulative[idx],
            speed_units_per_hour,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct SeriesRow {
    time: String,
    distance_so_far: f64,
    speed_units_per_hour: f64,
}
