//! `rbcam` – publish a camera to a rosbridge server.
//!
//! ```text
//! rbcam [HOST] [PORT] [--codec bson|json] [--ws URL] [--frames N] ...
//! ```
//!
//! The binary:
//!
//! 1. Resolves configuration from `~/.rbcam/config.toml` (or `--config`),
//!    `RBCAM_*` environment variables and the command line.
//! 2. Opens a camera (OpenCV device or the built-in test pattern).
//! 3. Connects to rosbridge, advertises `/webcam/image` and
//!    `/webcam/image_status`, publishes the frames, unadvertises, and
//!    disconnects.  Any failure releases the camera and retries after a fixed
//!    delay.
//! 4. Intercepts **Ctrl-C** to cut the frame loop short, unadvertise and exit.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::Colorize;
use rbcam_bridge::{EndpointConnector, WireCodec};
use rbcam_hal::{Camera, SimCamera};
use rbcam_runtime::{SessionReport, Supervisor, telemetry};
use rbcam_types::RbError;
use tracing::{error, info, warn};

use config::{CameraSource, Config};

/// Publish camera frames to a rosbridge server as BSON or JSON.
#[derive(Parser, Debug, Default)]
#[command(name = "rbcam", version, about)]
struct Args {
    /// rosbridge server host [default: 127.0.0.1]
    host: Option<String>,

    /// rosbridge server port [default: 9090]
    port: Option<String>,

    /// Configuration file [default: ~/.rbcam/config.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wire encoding
    #[arg(long)]
    codec: Option<WireCodec>,

    /// Connect over WebSocket instead of raw TCP (e.g. ws://localhost:9090)
    #[arg(long)]
    ws: Option<String>,

    /// Number of images to publish
    #[arg(long)]
    frames: Option<u32>,

    /// Frame source [default: opencv in builds with the opencv-capture
    /// feature, otherwise sim, a synthetic test pattern]
    #[arg(long, value_enum)]
    camera: Option<CameraSource>,

    /// Capture device index
    #[arg(long)]
    camera_index: Option<i32>,

    /// Do not open a preview window
    #[arg(long)]
    no_preview: bool,

    /// Stop retrying after this many failed connection attempts
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Write the resolved configuration back to the config file and exit
    #[arg(long)]
    write_config: bool,
}

fn main() -> ExitCode {
    let otel = telemetry::init_tracing("rbcam");
    let args = Args::parse();
    if otel.is_exporting() {
        info!("exporting spans over OTLP");
    }

    print_banner();

    let config_path = args.config.clone().unwrap_or_else(config::config_path);
    let cfg = match resolve_config(&args, &config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if args.write_config {
        return match config::save_to(&cfg, &config_path) {
            Ok(()) => {
                println!(
                    "  {} Config saved to {}",
                    "✓".green().bold(),
                    config_path.display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "could not save configuration");
                ExitCode::FAILURE
            }
        };
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – unadvertising and shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will terminate without unadvertising");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cfg, shutdown)) {
        Ok(Some(report)) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            info!("stopped before a session completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "giving up");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: &Config, shutdown: Arc<AtomicBool>) -> Result<Option<SessionReport>, RbError> {
    let endpoint = cfg.endpoint()?;
    println!("  {} {}  codec: {}", "rosbridge:".bold(), endpoint, cfg.codec);

    if let Some(notice) = sim_notice(cfg) {
        warn!("{notice}");
    }
    let mut camera = build_camera(cfg)?;
    let connector = EndpointConnector::new(endpoint, cfg.codec).with_timeout(cfg.connect_timeout());
    let supervisor = Supervisor::new(connector, cfg.session_config(), cfg.supervisor_config(), shutdown);
    supervisor.run(camera.as_mut()).await
}

/// Defaults, then the config file, then `RBCAM_*`, then the command line.
fn resolve_config(args: &Args, path: &std::path::Path) -> Result<Config, RbError> {
    let mut cfg = match config::load_from(path)? {
        Some(cfg) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        None => Config::default(),
    };
    config::apply_env_overrides(&mut cfg);
    apply_cli_overrides(&mut cfg, args);
    Ok(cfg)
}

fn apply_cli_overrides(cfg: &mut Config, args: &Args) {
    if let Some(host) = &args.host {
        cfg.host = host.clone();
    }
    if let Some(port) = &args.port {
        match port.parse::<u16>() {
            Ok(p) => cfg.port = p,
            Err(_) => error!("Invalid number {port}"),
        }
    }
    if let Some(codec) = args.codec {
        cfg.codec = codec;
    }
    if let Some(url) = &args.ws {
        cfg.ws_url = Some(url.clone());
    }
    if let Some(frames) = args.frames {
        cfg.session.frame_count = frames;
    }
    if let Some(source) = args.camera {
        cfg.camera.source = source;
    }
    if let Some(index) = args.camera_index {
        cfg.camera.index = index;
    }
    if args.no_preview {
        cfg.camera.preview = false;
    }
    if let Some(max) = args.max_attempts {
        cfg.retry.max_attempts = Some(max);
    }
}

/// Warning shown when the published frames are synthetic.
fn sim_notice(cfg: &Config) -> Option<&'static str> {
    (cfg.camera.source == CameraSource::Sim).then_some(
        "publishing the built-in test pattern, not a real camera; \
         use --camera opencv in a build with the opencv-capture feature",
    )
}

fn build_camera(cfg: &Config) -> Result<Box<dyn Camera>, RbError> {
    match cfg.camera.source {
        CameraSource::Sim => Ok(Box::new(
            SimCamera::new("sim").with_size(cfg.camera.sim_width, cfg.camera.sim_height),
        )),
        #[cfg(feature = "opencv-capture")]
        CameraSource::Opencv => Ok(Box::new(
            rbcam_hal::OpenCvCamera::new(cfg.camera.index).with_preview(cfg.camera.preview),
        )),
        #[cfg(not(feature = "opencv-capture"))]
        CameraSource::Opencv => Err(RbError::Config(
            "this build has no OpenCV support; rebuild with --features opencv-capture or use --camera sim"
                .to_string(),
        )),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "rbcam".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Camera → rosbridge publisher");
    println!();
}

fn print_report(report: &SessionReport) {
    println!();
    println!("  {} Session complete", "✓".green().bold());
    println!("    images published : {}", report.frames_published);
    if report.empty_frames > 0 {
        println!("    empty captures   : {}", report.empty_frames.to_string().yellow());
    }
    if !report.camera_ok {
        println!("    camera           : {}", "failed to open".red());
    }
    println!("    bytes sent       : {}", report.stats.bytes_sent);
    if report.interrupted {
        println!("    {}", "interrupted by Ctrl-C".yellow());
    }
}
