use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use ode_core::{CoreError, Params};
use ode_sim::{
    Eviction, Frame, Launchable, ManualClock, Renderer, Session, SimError, StopReason, WallClock,
};
use ode_solver::Method;
use ode_systems::{DoublePendulum, Pendulum};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "ode-cli")]
#[command(about = "ODE playback runtime - headless demo system runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available demo systems
    Systems,
    /// Show a system's launch defaults as JSON
    Defaults {
        /// System name (see `systems`)
        system: String,
    },
    /// Run a system and emit frames as CSV
    Run {
        /// System name (see `systems`)
        system: String,
        #[command(flatten)]
        opts: RunOpts,
    },
}

#[derive(Args)]
struct RunOpts {
    /// Simulation end time in seconds (defaults to 10 when the system has
    /// no horizon of its own)
    #[arg(long)]
    t_end: Option<f64>,
    /// Display samples per simulated second
    #[arg(long)]
    srate: Option<f64>,
    /// Simulated seconds per wall-clock second
    #[arg(long)]
    speed: Option<f64>,
    /// Trail window in seconds of simulated time
    #[arg(long)]
    trail: Option<f64>,
    /// Solver variant: dopri5 or tsit5
    #[arg(long)]
    method: Option<String>,
    /// Relative error tolerance
    #[arg(long)]
    rtol: Option<f64>,
    /// Upper bound on the internal step size in seconds
    #[arg(long)]
    max_step: Option<f64>,
    /// Initial-condition override, repeatable (e.g. -p theta=120)
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,
    /// Pace playback against the wall clock instead of running flat out
    #[arg(long)]
    realtime: bool,
    /// Print coarse wall-time accounting (same gate as ODESIM_TIMING)
    #[arg(long)]
    timing: bool,
    /// Output CSV file path (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("Unknown system '{0}' (try `ode-cli systems`)")]
    UnknownSystem(String),

    #[error("Invalid parameter override '{0}': expected NAME=VALUE")]
    BadParam(String),

    #[error("Unknown method '{0}': expected dopri5 or tsit5")]
    BadMethod(String),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Systems => cmd_systems(),
        Commands::Defaults { system } => cmd_defaults(&system),
        Commands::Run { system, opts } => match system.as_str() {
            "pendulum" => cmd_run(default_pendulum()?, &opts),
            "double-pendulum" => cmd_run(DoublePendulum::symmetric(), &opts),
            other => Err(CliError::UnknownSystem(other.to_string())),
        },
    }
}

/// Unit rod under standard gravity.
fn default_pendulum() -> Result<Pendulum, CliError> {
    Ok(Pendulum::new(1.0, 9.81)?)
}

fn cmd_systems() -> Result<(), CliError> {
    println!("Available systems:");
    println!("  pendulum         - planar pendulum (params: theta [deg], dtheta [deg/s])");
    println!(
        "  double-pendulum  - chaotic double pendulum (params: theta1, theta2, dtheta1, dtheta2 [deg])"
    );
    Ok(())
}

fn cmd_defaults(system: &str) -> Result<(), CliError> {
    let defaults = match system {
        "pendulum" => default_pendulum()?.launch_defaults(),
        "double-pendulum" => DoublePendulum::symmetric().launch_defaults(),
        other => return Err(CliError::UnknownSystem(other.to_string())),
    };
    println!("{}", serde_json::to_string_pretty(&defaults)?);
    Ok(())
}

fn cmd_run<F: Launchable>(system: F, opts: &RunOpts) -> Result<(), CliError> {
    if opts.timing {
        ode_core::timing::enable_timing();
    }
    let mut cfg = system.launch_defaults();
    if let Some(t_end) = opts.t_end {
        cfg.t_end = Some(t_end);
    } else if cfg.t_end.is_none() {
        // Headless runs need a horizon or they never stop.
        cfg.t_end = Some(10.0);
    }
    if let Some(srate) = opts.srate {
        cfg.rates.srate = srate;
    }
    if let Some(speed) = opts.speed {
        cfg.rates.speed = speed;
    }
    if let Some(trail) = opts.trail {
        cfg.trail = Eviction::Window(trail);
    }
    if let Some(method) = &opts.method {
        cfg.stepper.method =
            Method::from_str(method).map_err(|_| CliError::BadMethod(method.clone()))?;
    }
    if let Some(rtol) = opts.rtol {
        cfg.stepper.rtol = rtol;
    }
    if let Some(max_step) = opts.max_step {
        cfg.stepper.max_step = max_step;
    }

    let params = parse_params(&opts.params)?;
    let init = system.make_state(&params)?;
    let name = system.name();
    tracing::info!(system = name, t_end = ?cfg.t_end, "launching session");

    let mut session = Session::new(system, &cfg, init)?;

    let to_file = opts.output.is_some();
    let mut renderer: CsvRenderer<Box<dyn Write>> = match &opts.output {
        Some(path) => CsvRenderer::new(Box::new(BufWriter::new(File::create(path)?))),
        None => CsvRenderer::new(Box::new(io::stdout().lock())),
    };

    let reason = if opts.realtime {
        let mut clock = WallClock::new();
        session.run(&mut renderer, &mut clock)?
    } else {
        let mut clock = ManualClock::new();
        session.run(&mut renderer, &mut clock)?
    };
    let frames = renderer.finish()?;

    // Keep the summary off the CSV stream when it goes to stdout.
    let mut summary: Box<dyn Write> = if to_file {
        Box::new(io::stdout().lock())
    } else {
        Box::new(io::stderr().lock())
    };
    let stats = session.stats();
    writeln!(summary, "✓ Run finished: {name}")?;
    match reason {
        StopReason::Completed => writeln!(summary, "  Stopped: reached t = {:.6}", session.t())?,
        StopReason::Predicate { t } => {
            writeln!(summary, "  Stopped: termination predicate at t = {t:.6}")?
        }
        StopReason::Command => writeln!(summary, "  Stopped: by command at t = {:.6}", session.t())?,
        StopReason::Failed => writeln!(summary, "  Stopped: integration failure")?,
    }
    writeln!(summary, "  Frames: {frames}")?;
    writeln!(
        summary,
        "  Steps: {} accepted, {} rejected, {} evaluations",
        stats.n_accepted, stats.n_rejected, stats.n_eval
    )?;
    if opts.realtime {
        writeln!(summary, "  Perf ratio: {:.3}", session.perf_ratio())?;
    }
    Ok(())
}

fn parse_params(raw: &[String]) -> Result<Params, CliError> {
    let mut params = Params::new();
    for item in raw {
        let (name, value) = item
            .split_once('=')
            .ok_or_else(|| CliError::BadParam(item.clone()))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| CliError::BadParam(item.clone()))?;
        params.set(name.trim(), value);
    }
    Ok(params)
}

/// Streams one CSV row per frame: time followed by state components.
struct CsvRenderer<W: Write> {
    out: W,
    frames: u64,
    /// First write error, reported when the run finishes.
    error: Option<io::Error>,
}

impl<W: Write> CsvRenderer<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            frames: 0,
            error: None,
        }
    }

    fn finish(mut self) -> Result<u64, CliError> {
        if let Some(err) = self.error.take() {
            return Err(err.into());
        }
        self.out.flush()?;
        Ok(self.frames)
    }
}

impl<W: Write> Renderer for CsvRenderer<W> {
    fn render(&mut self, frame: Frame<'_>) {
        if self.error.is_some() {
            return;
        }
        let mut write_row = || -> io::Result<()> {
            if self.frames == 0 {
                write!(self.out, "t")?;
                for i in 0..frame.state.len() {
                    write!(self.out, ",y{i}")?;
                }
                writeln!(self.out)?;
            }
            write!(self.out, "{:.9}", frame.t)?;
            for v in frame.state.iter() {
                write!(self.out, ",{v:.9}")?;
            }
            writeln!(self.out)
        };
        if let Err(err) = write_row() {
            self.error = Some(err);
        }
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_overrides_parse() {
        let params = parse_params(&["theta=120".into(), "dtheta = -5.5".into()]).unwrap();
        assert_eq!(params.get("theta").unwrap(), 120.0);
        assert_eq!(params.get("dtheta").unwrap(), -5.5);
        assert!(parse_params(&["theta".into()]).is_err());
        assert!(parse_params(&["theta=abc".into()]).is_err());
    }

    #[test]
    fn csv_renderer_writes_header_once() {
        use nalgebra::dvector;
        use ode_sim::{Eviction, TrailCache};

        let trail = TrailCache::new(Eviction::Capacity(4)).unwrap();
        let state = dvector![1.0, 2.0];
        let mut renderer = CsvRenderer::new(Vec::new());
        for t in [0.0, 0.04] {
            renderer.render(Frame {
                t,
                state: &state,
                trail: trail.window(),
            });
        }
        let text = String::from_utf8(renderer.out.clone()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("t,y0,y1"));
        assert_eq!(lines.clone().count(), 2);
        assert_eq!(renderer.finish().unwrap(), 2);
    }
}
