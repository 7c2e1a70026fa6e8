use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use clario_lib::config::SerialConfig;
use clario_lib::constants::DEFAULT_PORT;
use clario_lib::response::DataResponse;
use clario_lib::{Clario, DiscreteAbsCfg, FlCfg, PlateCfg, RunCfg, SessionConfig};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Drive a BMG CLARIOstar plate reader over its serial link.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial device of the reader
    #[arg(short, long, default_value = DEFAULT_PORT)]
    port: String,
    /// Also write logs to this file
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the decoded status flags
    Status,
    /// Move the plate carrier out
    Open,
    /// Pull the plate carrier in
    Close,
    /// Print every status change until interrupted
    Watch,
    /// Run a discrete absorbance assay described by a JSON file
    Abs { file: PathBuf },
    /// Run an endpoint fluorescence assay described by a JSON file
    Fl { file: PathBuf },
    /// Raw Qubit fluorescence values of a 96-well PCR plate
    Qubit,
}

/// Assay file contents: shared run settings, optional well list, assay settings
#[derive(Debug, Deserialize)]
struct AssayFile<A> {
    run: RunCfg,
    wells: Option<Vec<usize>>,
    assay: A,
}

/// A finished read as printed to stdout
#[derive(Debug, Serialize)]
struct Report {
    finished: DateTime<Utc>,
    #[serde(flatten)]
    data: DataResponse,
}

fn setup_logging(log_file_path: Option<&Path>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    // stdout carries the JSON results
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_file_path {
        Some(path) => {
            let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
            let (writer, guard) = tracing_appender::non_blocking(log_file);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn load_assay<A: for<'de> Deserialize<'de>>(path: &Path) -> Result<(RunCfg, A)> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read assay file {:?}", path))?;
    let file: AssayFile<A> =
        serde_json::from_str(&text).with_context(|| format!("Invalid assay file {:?}", path))?;
    let mut run = file.run;
    if let Some(wells) = file.wells {
        if wells.is_empty() {
            bail!("Assay file {:?} lists an empty well selection", path);
        }
        run.plate.set_wells(wells)?;
    }
    Ok((run, file.assay))
}

fn qubit_preset() -> (RunCfg, FlCfg) {
    let fl = FlCfg {
        ex: 483,
        ex_bw: 14,
        dich: 5025,
        em: 530,
        em_bw: 30,
        gain: 3000,
        focal_height: 40,
        flashes: 200,
        settling_time: 0,
        ..Default::default()
    };
    (RunCfg::new(PlateCfg::sbs_96()), fl)
}

/// Transmission values that JSON can only carry as null
fn non_finite_readings(data: &DataResponse) -> usize {
    match data {
        DataResponse::DiscreteAbsorbance(abs) => abs.transmission.iter().flatten().filter(|t| !t.is_finite()).count(),
        DataResponse::Fluorescence(_) => 0,
    }
}

fn print_report(data: DataResponse) -> Result<()> {
    let non_finite = non_finite_readings(&data);
    if non_finite > 0 {
        warn!("{} transmission values are not finite (degenerate calibration), written as null", non_finite);
    }
    let report = Report {
        finished: Utc::now(),
        data,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let serial = SerialConfig::new(&cli.port);
    let mut clario = Clario::open_serial(&serial, SessionConfig::default())
        .with_context(|| format!("Could not open {}", cli.port))?;

    match cli.command {
        Command::Status => {
            let status = clario.get_status().await?;
            println!("{}", status);
            info!("{}", status.bit_dump());
        }
        Command::Open => clario.open().await?,
        Command::Close => clario.close().await?,
        Command::Watch => {
            info!("Watching status, Ctrl+C to stop");
            tokio::select! {
                _ = clario.watch_status(|status| println!("{} {}", Utc::now().format("%H:%M:%S%.3f"), status)) => {}
                _ = tokio::signal::ctrl_c() => info!("Stopped"),
            }
        }
        Command::Abs { file } => {
            let (run, abs) = load_assay::<DiscreteAbsCfg>(&file)?;
            let data = clario.run_discrete_absorbance(&run, &abs).await?;
            print_report(DataResponse::DiscreteAbsorbance(data))?;
        }
        Command::Fl { file } => {
            let (run, fl) = load_assay::<FlCfg>(&file)?;
            let data = clario.run_fluorescence(&run, &fl).await?;
            print_report(DataResponse::Fluorescence(data))?;
        }
        Command::Qubit => {
            let (run, fl) = qubit_preset();
            let data = clario.run_fluorescence(&run, &fl).await?;
            print_report(DataResponse::Fluorescence(data))?;
            clario.close().await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.as_deref(), &cli.verbose)?;

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
