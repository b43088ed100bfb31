use anyhow::{anyhow, Context};
use clap::Parser;
use console::{spawn_stdin_reader, OperatorConsole};
use generator::profile::{MagnetField, SyntheticSource};
use generator::sequence::ImageSequenceSource;
use gui_bridge::bridge::OperatorBridge;
use gui_bridge::model::StatusBoard;
use log::{error, info, warn};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::oneshot;
use vantagecore::actuator::MagnetActuator;
use vantagecore::hardware::{FrameSource, SimulatedBoard};
use vantagecore::project::{ProjectRecord, ProjectSettings};
use vantagecore::telemetry::AuditLog;
use workflow::command::{request_channel, OperatorCommand};
use workflow::config::{RigConfig, SourceConfig};
use workflow::frame_loop::{FrameLoop, LoopTiming, SessionSummary, ShutdownOutcome};
use workflow::runner::{ControlSettings, Session};

mod console;
mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "VANTAGE particle tracking and magnet control rig")]
struct Args {
    /// Load runtime settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Project file (.vtp) with camera, thresholds, size band and regions
    #[arg(long)]
    project: Option<PathBuf>,
    /// Run this many frame ticks without wall-clock timers, then shut down
    #[arg(long)]
    offline: Option<usize>,
    /// Expose status and commands over HTTP while the session runs
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Make shutdown zeroing fail, to drill the critical alert
    #[arg(long, default_value_t = false)]
    simulate_zero_failure: bool,
    /// Apply a manual magnet amplitude (-4 to 4) before the loop starts
    #[arg(long, allow_hyphen_values = true)]
    manual_amplitude: Option<f64>,
    /// Report the DAC board id before starting
    #[arg(long, default_value_t = false)]
    detect_board: bool,
    /// Save the final project state here (.vtp is appended when missing)
    #[arg(long)]
    save_project: Option<PathBuf>,
    /// Acknowledge the critical alert automatically once its countdown ends
    #[arg(long, default_value_t = false)]
    unattended: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RigConfig::load(path)?,
        None => RigConfig::default(),
    };
    config.simulate_zero_failure |= args.simulate_zero_failure;
    config.auto_acknowledge |= args.unattended;

    let project = match &args.project {
        Some(path) => ProjectRecord::load(path)
            .and_then(|record| record.to_settings())
            .with_context(|| format!("loading project {}", path.display()))?,
        None => ProjectSettings::default(),
    };

    let audit = AuditLog::open(&config.audit_log)
        .with_context(|| format!("opening audit log {}", config.audit_log.display()))?;
    audit.info("Session started");

    let field = MagnetField::default();
    let source: Box<dyn FrameSource> = match &config.source {
        SourceConfig::Synthetic(synthetic) => Box::new(SyntheticSource::new(
            synthetic.clone(),
            project.resolution,
            field.clone(),
        )),
        SourceConfig::Sequence { directory } => {
            Box::new(ImageSequenceSource::open(directory, project.resolution)?)
        }
    };

    let mut actuator = MagnetActuator::new(SimulatedBoard::new(config.board_id), audit.clone());
    if config.simulate_zero_failure {
        actuator.set_simulated_zero_failure(true);
    }

    let control = ControlSettings {
        gains: config.gains,
        setpoint: config.setpoint,
        pid_active: config.pid_active,
        dt: config.control_dt(),
        strategy: config.strategy,
        enhance: config.enhance,
    };
    let mut session = Session::new(source, actuator, audit.clone(), project, control, field);

    // Everything fallible happens before the first magnet write; past this point the
    // session always ends through the frame loop's shutdown sequence.
    let board = StatusBoard::new(session.project_record());
    let (sender, receiver) = request_channel();
    let bridge = if args.serve {
        let (stop, stopped) = oneshot::channel::<()>();
        let server = OperatorBridge::new(board.clone(), sender.clone()).serve(
            config.bridge_address,
            async move {
                let _ = stopped.await;
            },
        )?;
        Some((stop, tokio::spawn(server)))
    } else {
        None
    };

    if args.detect_board {
        match session.detect_board() {
            Ok(id) => println!("[CONSOLE] DAC board detected, id {}", id),
            Err(err) => println!("[CONSOLE] DAC board not detected: {:#}", err),
        }
    }
    if let Some(amplitude) = args.manual_amplitude {
        match session.apply(OperatorCommand::ManualAmplitude { amplitude }) {
            Ok(message) => println!("[CONSOLE] {}", message),
            Err(err) => println!("[CONSOLE] manual amplitude rejected: {:#}", err),
        }
    }

    let console = OperatorConsole::new(audit.clone(), config.auto_acknowledge);
    let timing = LoopTiming {
        frame_tick: config.frame_tick(),
        control_tick: config.control_tick(),
        alert_countdown: config.alert_countdown(),
    };
    let frame_loop = FrameLoop::new(session, board, console, timing);
    spawn_stdin_reader(sender);

    let summary = match args.offline {
        Some(frames) => frame_loop.run_offline(frames, receiver).await,
        None => {
            info!("running; Ctrl+C or `quit` ends the session");
            frame_loop.run(receiver, wait_for_interrupt()).await
        }
    };

    if let Some((stop, server)) = bridge {
        let _ = stop.send(());
        server.await.context("joining operator bridge")?;
    }

    report(&summary);
    if let Some(path) = &args.save_project {
        let written = summary
            .project
            .save(path)
            .with_context(|| format!("saving project {}", path.display()))?;
        println!("[CONSOLE] project saved to {}", written.display());
    }

    match summary.outcome {
        ShutdownOutcome::Zeroed => {
            audit.info("Session closed");
            Ok(())
        }
        ShutdownOutcome::ZeroFailed(_) => Err(anyhow!(
            "magnet channels failed to zero; shut down the power supplies manually"
        )),
    }
}

async fn wait_for_interrupt() {
    if let Err(err) = signal::ctrl_c().await {
        error!("cannot listen for Ctrl+C: {}", err);
        warn!("use `quit` on the console to end the session");
        std::future::pending::<()>().await;
    }
}

fn report(summary: &SessionSummary) {
    let counters = summary.status.counters;
    println!(
        "Session -> frames {} (missed {}), control ticks {} (withheld {}), safety rejections {}, driver faults {}",
        counters.frames_processed,
        counters.frames_missed,
        counters.control_ticks,
        counters.actuations_withheld,
        counters.safety_rejections,
        counters.driver_faults
    );
    if let Some(frame) = &summary.status.frame {
        println!(
            "Last frame -> red {} (mean area {:.1}), green {} (mean area {:.1}), ROI green {} red {} mismatched {}",
            frame.red.count,
            frame.red.mean_area,
            frame.green.count,
            frame.green.mean_area,
            frame.tally.matched_green,
            frame.tally.matched_red,
            frame.tally.mismatched
        );
    }
    if let Some(control) = &summary.status.control {
        match serde_json::to_string(control) {
            Ok(json) => println!("Last control tick -> {}", json),
            Err(err) => error!("cannot render control report: {}", err),
        }
    }
}
