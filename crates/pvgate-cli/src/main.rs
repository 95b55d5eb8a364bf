//! `pvgate` – process-variable gateway demo runner.
//!
//! 1. Initialises logging (and OTLP export when configured).
//! 2. Loads the configuration file, falling back to a built-in demo.
//! 3. Builds the simulated server and address space, registers every
//!    mapping and starts the gateway.
//! 4. Runs until **Ctrl-C**, then stops the gateway and exits.

mod bootstrap;
mod config;
mod telemetry;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use pvgate_sim::SimTicker;

/// Interval between statistics log lines.
const STATS_INTERVAL: Duration = Duration::from_secs(10);

fn main() {
    let _telemetry = telemetry::init_tracing("pvgate");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping gateway …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the process must be killed to stop");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let path = config::resolve_path(std::env::args().nth(1));
    let cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            println!(
                "  No config at {}; {}",
                path.display().to_string().dimmed(),
                "running the built-in demo.".yellow()
            );
            let mut cfg = config::Config::demo();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            std::process::exit(2);
        }
    };

    // ── Bootstrap ─────────────────────────────────────────────────────────
    let boot = match bootstrap::build(&cfg) {
        Ok(boot) => boot,
        Err(e) => {
            error!(error = %e, "bootstrap failed");
            println!("{}: {}", "Bootstrap error".red(), e);
            std::process::exit(2);
        }
    };

    if let Err(e) = boot.gateway.start() {
        error!(error = %e, "gateway failed to start");
        std::process::exit(1);
    }
    println!(
        "  {} {} mapping(s), {} worker(s)",
        "✓ Gateway running:".green().bold(),
        boot.gateway.mappings().len(),
        boot.gateway.worker_count()
    );

    let mut ticker = if cfg.simulation.enabled {
        match SimTicker::spawn(
            boot.context.clone(),
            Duration::from_millis(cfg.simulation.period_ms.max(1)),
        ) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(error = %e, "simulation ticker not started");
                None
            }
        }
    } else {
        None
    };

    // ── Main loop ─────────────────────────────────────────────────────────
    let mut last_report = Instant::now();
    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
        if last_report.elapsed() >= STATS_INTERVAL {
            let s = boot.gateway.stats();
            info!(
                updates_applied = s.updates_applied,
                update_failures = s.update_failures,
                writes_forwarded = s.writes_forwarded,
                write_failures = s.write_failures,
                write_timeouts = s.write_timeouts,
                spurious_wakes = s.spurious_wakes,
                dispatch_panics = s.dispatch_panics,
                "gateway statistics"
            );
            last_report = Instant::now();
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────
    if let Some(t) = ticker.as_mut() {
        t.stop();
    }
    boot.gateway.stop();
    println!("{}", "  ✓ Gateway stopped.".green());
    for mapping in boot.gateway.mappings().mappings() {
        if let Some(value) = boot.address_space.value(&mapping.node_id) {
            println!("    {} = {}", mapping.node_id.to_string().dimmed(), value);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ____ _    __________  ____________"#.bold().cyan());
    println!("{}", r#"   / __ \ |  / / ____/ / / /_  __/ __/"#.bold().cyan());
    println!("{}", r#"  / /_/ / | / / / __/ /_/ / / / / _/  "#.bold().cyan());
    println!("{}", r#" / ____/| |/ / /_/ / __  / / / / /___ "#.bold().cyan());
    println!("{}", r#"/_/     |___/\____/_/ /_/ /_/ /_____/ "#.bold().cyan());
    println!();
    println!("  {} {}",
        "pvgate".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Process-variable ⇄ address-space gateway");
    println!();
}
