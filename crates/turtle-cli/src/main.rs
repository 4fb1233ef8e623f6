//! `turtle-move` – runs the scripted turtle programme.
//!
//! 1. Installs logging (see `turtle_runtime::telemetry`).
//! 2. Loads `~/.turtle-move/config.toml`, writing the defaults on first run,
//!    then applies `TURTLE_*` overrides.
//! 3. Wires a [`MotionController`] to either the in-process simulator or a
//!    rosbridge server.
//! 4. Intercepts **Ctrl-C** (and SIGTERM/SIGHUP): the first signal publishes a
//!    stop command and asks the sequencer to finish after the current
//!    primitive; a second one publishes the stop again and exits with
//!    status 130.

mod config;

use colored::Colorize;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use turtle_hal::SimTurtle;
use turtle_middleware::{BusLink, EventBus, RosbridgeClient, Topic};
use turtle_runtime::{LoopRate, MotionController, SequenceSummary, Sequencer, init_tracing, turtle_script};
use turtle_types::{Event, EventPayload, MotionError, VelocityCommand};

use config::{Backend, Config};

/// Poll interval while waiting for the bridge to deliver its first pose.
const CONNECT_POLL: Duration = Duration::from_millis(10);

/// Time given to the bridge to forward the final stop before teardown.
const FLUSH_GRACE: Duration = Duration::from_millis(200);

/// Exit status after a repeated interrupt (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

fn main() -> ExitCode {
    let guard = init_tracing("turtle-move");
    info!(otlp_export = guard.is_exporting(), "tracing initialised");

    print_banner();

    let cfg = load_config();
    println!(
        "  Backend {}  sequence {:?}  gate {:?}\n",
        cfg.backend.to_string().bold(),
        cfg.sequence,
        cfg.sample_gate
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let bus = Arc::new(EventBus::default());
    install_ctrlc_handler(Arc::clone(&shutdown), Arc::clone(&bus));

    let sequencer = Sequencer::new(turtle_script(), cfg.sequence).with_shutdown(Arc::clone(&shutdown));

    let outcome = match cfg.backend {
        Backend::Sim => Ok(run_sim(&cfg, &sequencer)),
        Backend::Rosbridge => run_rosbridge(&cfg, &sequencer, bus, &shutdown),
    };

    match outcome {
        Ok(summary) => {
            info!(steps = summary.steps, ticks = summary.ticks, "turtle-move finished");
            println!("{}", "  ✓ Sequence finished, vehicle stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "turtle-move aborted");
            println!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> Config {
    let path = config::config_path();
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!("  Default config written to {}", path.display().to_string().bold()),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Backends
// ─────────────────────────────────────────────────────────────────────────────

fn run_sim(cfg: &Config, sequencer: &Sequencer) -> SequenceSummary {
    let mut controller =
        MotionController::new(SimTurtle::new(), LoopRate::new()).with_sample_gate(cfg.sample_gate);
    let summary = sequencer.run(&mut controller);
    controller.stop();
    let pose = controller.link().pose();
    info!(
        x = pose.x,
        y = pose.y,
        theta = pose.theta,
        overruns = controller.pacer().overruns(),
        "simulated turtle at rest"
    );
    summary
}

fn run_rosbridge(
    cfg: &Config,
    sequencer: &Sequencer,
    bus: Arc<EventBus>,
    shutdown: &AtomicBool,
) -> Result<SequenceSummary, MotionError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| MotionError::Transport(format!("start async runtime: {e}")))?;

    // The link must subscribe to poses before the bridge can deliver any.
    let link = BusLink::new(Arc::clone(&bus));
    let client = RosbridgeClient::new(Arc::clone(&bus), cfg.topics());
    let bridge = runtime.spawn(client.run(cfg.rosbridge_url.clone()));

    let mut controller = MotionController::new(link, LoopRate::new()).with_sample_gate(cfg.sample_gate);

    print!("  Waiting for {} on {} … ", cfg.pose_topic.dimmed(), cfg.rosbridge_url.dimmed());
    std::io::stdout().flush().ok();
    while !controller.service_feed() {
        if bridge.is_finished() {
            println!("{}", "failed".red());
            return match runtime.block_on(bridge) {
                Ok(Ok(())) => Err(MotionError::Transport("rosbridge closed before the first pose".to_string())),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(MotionError::Transport(format!("bridge task: {e}"))),
            };
        }
        if shutdown.load(Ordering::Acquire) {
            println!("{}", "cancelled".yellow());
            return Ok(SequenceSummary::default());
        }
        std::thread::sleep(CONNECT_POLL);
    }
    println!("{}", "online".green());

    let summary = sequencer.run(&mut controller);
    controller.stop();
    info!(overruns = controller.pacer().overruns(), "control loop finished");
    std::thread::sleep(FLUSH_GRACE);

    if bridge.is_finished() {
        match runtime.block_on(bridge) {
            Ok(Err(e)) => warn!(error = %e, "rosbridge link ended with an error"),
            Err(e) => warn!(error = %e, "rosbridge task failed"),
            Ok(Ok(())) => {}
        }
    } else {
        bridge.abort();
    }
    runtime.shutdown_timeout(FLUSH_GRACE);
    Ok(summary)
}

// ─────────────────────────────────────────────────────────────────────────────
// Ctrl-C
// ─────────────────────────────────────────────────────────────────────────────

fn install_ctrlc_handler(shutdown: Arc<AtomicBool>, bus: Arc<EventBus>) {
    if let Err(e) = ctrlc::set_handler(move || {
        if handle_interrupt(&shutdown, &bus) {
            // Give the bridge time to forward the stop.
            std::thread::sleep(FLUSH_GRACE);
            std::process::exit(FORCED_EXIT_CODE);
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the sequence can only be stopped by killing the process");
    }
}

/// Publish a stop command and raise the shutdown flag.
///
/// Returns `true` when the flag was already raised: the running primitive
/// ignored the first request and the process should exit now.
fn handle_interrupt(shutdown: &AtomicBool, bus: &EventBus) -> bool {
    let repeated = shutdown.swap(true, Ordering::AcqRel);
    println!();
    if repeated {
        println!("{}", "⚠  Second interrupt – exiting now.".red().bold());
    } else {
        println!("{}", "⚠  Ctrl-C received – stopping after the current primitive …".yellow().bold());
    }

    let stop = Event::new(
        "turtle-cli",
        EventPayload::VelocityCommand(VelocityCommand::STOP),
    );
    if bus.publish_to(Topic::CmdVel, stop).is_ok() {
        println!("{}", "  ✓ Stop command published.".green());
    }
    repeated
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"  ______           __  __        "#.bold().green());
    println!("{}", r#" /_  __/_  _______/ /_/ /__      "#.bold().green());
    println!("{}", r#"  / / / / / / ___/ __/ / _ \     "#.bold().green());
    println!("{}", r#" / / / /_/ / /  / /_/ /  __/     "#.bold().green());
    println!("{}", r#"/_/  \__,_/_/   \__/_/\___/ move "#.bold().green());
    println!();
    println!("  {} {}",
        "turtle-move".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Closed-loop move / rotate / arc controller");
    println!();
}
