//! Binary entrypoint for the codecsync CLI.
//!
//! Commands:
//! - `start` - connect to the configured codec and log every state change
//! - `init` - create a starter `config.toml`
//! - `smoketest [--timeout <s>]` - connect, wait for initial sync, print a JSON snapshot
//! - `set-password` - interactively set the codec login password in the config file
//!
//! See the library crate docs for module-level details: `codecsync::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use codecsync::codec::device::CodecDevice;
use codecsync::codec::CodecEvent;
use codecsync::config::{Config, TransportKind};
use codecsync::metrics;

#[derive(Parser)]
#[command(name = "codecsync")]
#[command(about = "Protocol synchronization engine for Cisco Room-OS video codecs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the codec and stay in sync until interrupted
    Start {
        /// Override the codec host from the config file
        #[arg(long)]
        host: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Connect, wait for initial sync and print a JSON snapshot
    SmokeTest {
        /// Seconds to wait before giving up
        #[arg(short, long, default_value_t = 30)]
        timeout: u64,
    },
    /// Set or update the codec login password in the config file
    SetPassword,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { host } => {
            let mut config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            if let Some(host) = host {
                config.codec.transport = TransportKind::Tcp;
                config.codec.host = host;
            }
            info!("Starting codecsync v{}", env!("CARGO_PKG_VERSION"));
            run_until_interrupted(config).await?;
        }
        Commands::Init => {
            info!("Initializing new codecsync configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::SetPassword => {
            let mut config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            println!("Setting codec password for user '{}'.", config.codec.username);
            let pass1 = rpassword::prompt_password("New password: ")?;
            if pass1.len() > 128 {
                println!("Error: password too long.");
                return Ok(());
            }
            let pass2 = rpassword::prompt_password("Confirm password: ")?;
            if pass1 != pass2 {
                println!("Error: passwords do not match.");
                return Ok(());
            }
            config.codec.password = pass1;
            config.save(&cli.config).await?;
            println!("Codec password updated successfully.");
        }
        Commands::SmokeTest { timeout } => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            let synced = smoke_test(config, timeout).await?;
            std::process::exit(if synced { 0 } else { 1 });
        }
    }

    Ok(())
}

async fn run_until_interrupted(config: Config) -> Result<()> {
    let (device, handle, mut events) = CodecDevice::from_config(&config)?;
    let worker = tokio::spawn(device.run());

    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Some(ev) => log_event(&ev),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                handle.shutdown();
                break;
            }
        }
    }

    match worker.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("device worker failed: {}", e),
        Err(e) => error!("device worker panicked: {}", e),
    }
    Ok(())
}

fn log_event(event: &CodecEvent) {
    match event {
        CodecEvent::Connected(up) => info!("codec link {}", if *up { "up" } else { "down" }),
        CodecEvent::SyncComplete => info!("codec in sync"),
        CodecEvent::LoginRejected => warn!("codec rejected the configured credentials"),
        CodecEvent::MeetingStartingSoon(b) => {
            info!("meeting '{}' starts at {}", b.title, b.start.format("%H:%M"))
        }
        CodecEvent::CallStatusChanged(c) => {
            info!("call {} {} ({})", c.id, c.status.as_str(), c.number)
        }
        CodecEvent::CallDisconnected(c) => info!("call {} disconnected", c.id),
        other => log::debug!("event: {:?}", other),
    }
}

async fn smoke_test(config: Config, timeout: u64) -> Result<bool> {
    use tokio::time::{sleep_until, Duration, Instant};

    let (device, handle, mut events) = CodecDevice::from_config(&config)?;
    let worker = tokio::spawn(device.run());
    info!(
        "Starting smoke test against {:?} codec, waiting up to {}s",
        config.codec.transport, timeout
    );

    let deadline = Instant::now() + Duration::from_secs(timeout);
    let mut synced = false;
    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Some(CodecEvent::SyncComplete) => {
                    synced = true;
                    break;
                }
                Some(CodecEvent::LoginRejected) => break,
                Some(ev) => log::debug!("event: {:?}", ev),
                None => break,
            },
            _ = sleep_until(deadline) => break,
        }
    }

    let snapshot = handle.snapshot().await?;
    if !synced {
        warn!(
            "Initial sync did not complete; still waiting for: {}",
            snapshot.pending_milestones.join(", ")
        );
    }
    let payload = serde_json::json!({
        "status": if synced { "ok" } else { "incomplete" },
        "timeout_seconds": timeout,
        "state": snapshot,
        "metrics": metrics::snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);

    handle.shutdown();
    let _ = worker.await;
    Ok(synced)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground runs also echo to the console
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
