//! Binary entrypoint for the btserial CLI.
//!
//! Commands:
//! - `init` - write a starter `btserial.toml`
//! - `check --mac <addr> --msg <text> [--crlf] [--hex]` - validate and show the summary
//! - `save --mac <addr> --msg <text> [--crlf] [--hex] --out <file>` - store a validated record
//! - `blurb <record>` - print a stored record's summary
//! - `peers` - list the paired devices from the config
//! - `fire <record> [--var NAME=VALUE]... [--timeout <s>]` - substitute, connect and send
//! - `send --mac <addr> --msg <text> [--crlf] [--hex] [--timeout <s>]` - send without a record file
//!
//! See the library crate docs for module-level details: `btserial::`.
use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use std::collections::HashMap;
use std::str::FromStr;

use btserial::config::Config;
use btserial::descriptor::CommandDescriptor;
use btserial::fire::{self, DeliveryOutcome};
use btserial::metrics;
use btserial::record::DescriptorRecord;

#[derive(Parser)]
#[command(name = "btserial")]
#[command(about = "Send messages to paired Bluetooth serial devices from automation triggers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "btserial.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args, Clone)]
struct DescriptorArgs {
    /// Target device address (00:11:22:AA:BB:CC) or a %variable
    #[arg(short, long)]
    mac: String,
    /// Message body, hex digits with --hex, or a %variable
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    msg: String,
    /// Append CR/LF to the message
    #[arg(long)]
    crlf: bool,
    /// Interpret the message as hex digits
    #[arg(long)]
    hex: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Validate a descriptor and print its summary
    Check {
        #[command(flatten)]
        descriptor: DescriptorArgs,
    },
    /// Validate a descriptor and save it as a record file
    Save {
        #[command(flatten)]
        descriptor: DescriptorArgs,
        /// Record file to write
        #[arg(short, long)]
        out: String,
    },
    /// Print the summary of a record file
    Blurb {
        /// Record file
        record: String,
    },
    /// List configured paired devices
    Peers,
    /// Fire a record: substitute variables, connect and send
    Fire {
        /// Record file
        record: String,
        /// Variable values for %placeholders (NAME=VALUE, repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
        /// Give up after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Send a descriptor given on the command line
    Send {
        #[command(flatten)]
        descriptor: DescriptorArgs,
        /// Give up after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init runs before a config exists; everything else logs per config
    let loaded = match cli.command {
        Commands::Init => Err(anyhow!("{} is not read by init", cli.config)),
        _ => Config::load(&cli.config).await,
    };
    init_logging(loaded.as_ref().ok(), cli.verbose);
    if let Err(e) = &loaded {
        if !matches!(cli.command, Commands::Init) && std::path::Path::new(&cli.config).exists() {
            warn!("Ignoring unusable config: {}", e);
        }
    }

    match cli.command {
        Commands::Init => {
            info!("Writing default configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Check { descriptor } => {
            let max_length = summary_length(loaded.as_ref().ok());
            match build_descriptor(&descriptor) {
                Ok(cmd) => println!("{}", cmd.summary(max_length)),
                Err(message) => {
                    println!("Error: {}", message);
                    std::process::exit(1);
                }
            }
        }
        Commands::Save { descriptor, out } => {
            match DescriptorRecord::generate(
                &descriptor.mac,
                &descriptor.msg,
                descriptor.crlf,
                descriptor.hex,
            ) {
                Ok(record) => {
                    record.save(&out).await?;
                    let max_length = summary_length(loaded.as_ref().ok());
                    if let Some(blurb) = record.blurb_with_length(max_length) {
                        println!("{}", blurb);
                    }
                    info!("Record written to {}", out);
                }
                Err(e) => {
                    println!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Blurb { record } => {
            let record = DescriptorRecord::load(&record).await?;
            match record.blurb_with_length(summary_length(loaded.as_ref().ok())) {
                Some(blurb) => println!("{}", blurb),
                None => {
                    println!("Error: record is not valid");
                    std::process::exit(1);
                }
            }
        }
        Commands::Peers => {
            let config = require_config(loaded, &cli.config)?;
            if config.peers.is_empty() {
                println!("No paired devices configured.");
            }
            for peer in &config.peers {
                println!("{}", peer.peer());
            }
        }
        Commands::Fire {
            record,
            vars,
            timeout,
        } => {
            let config = require_config(loaded, &cli.config)?;
            let stored = DescriptorRecord::load(&record).await?;
            if !stored.is_valid() {
                warn!("Stored record {} does not validate", record);
            }
            let vars = parse_vars(&vars)?;
            let fired = stored.substitute(&vars);
            run_delivery(&config, fired, timeout).await?;
        }
        Commands::Send {
            descriptor,
            timeout,
        } => {
            let config = require_config(loaded, &cli.config)?;
            let record = match DescriptorRecord::generate(
                &descriptor.mac,
                &descriptor.msg,
                descriptor.crlf,
                descriptor.hex,
            ) {
                Ok(record) => record,
                Err(e) => {
                    println!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            run_delivery(&config, record, timeout).await?;
        }
    }

    Ok(())
}

fn build_descriptor(args: &DescriptorArgs) -> std::result::Result<CommandDescriptor, String> {
    CommandDescriptor::new(&args.mac, &args.msg, args.crlf, args.hex).map_err(|e| e.to_string())
}

fn summary_length(config: Option<&Config>) -> usize {
    config
        .map(|c| c.summary.max_length)
        .unwrap_or(btserial::descriptor::DEFAULT_SUMMARY_LENGTH)
}

fn require_config(loaded: Result<Config>, path: &str) -> Result<Config> {
    loaded.map_err(|e| {
        if std::path::Path::new(path).exists() {
            e
        } else {
            anyhow!("{} (run `btserial init` to create {})", e, path)
        }
    })
}

fn parse_vars(raw: &[String]) -> Result<HashMap<String, String>> {
    raw.iter()
        .map(|entry| {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", entry))?;
            let name = name.trim_start_matches('%');
            if name.is_empty() {
                return Err(anyhow!("Empty variable name in '{}'", entry));
            }
            Ok((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(feature = "serial")]
async fn run_delivery(config: &Config, record: DescriptorRecord, timeout: Option<u64>) -> Result<()> {
    use std::sync::Arc;
    use tokio::time::{timeout as deadline, Duration};

    let negotiator = Arc::new(btserial::bluetooth::serial::negotiator_from_config(config)?);
    let peers: Arc<dyn btserial::bluetooth::PeerSource> = Arc::new(config.peers.clone());
    info!(
        "Firing {}",
        btserial::logutil::escape_log(&record.blurb().unwrap_or_else(|| "<invalid record>".to_string()))
    );

    let task = fire::fire_async(record, peers, negotiator);
    let result = match timeout {
        Some(secs) => match deadline(Duration::from_secs(secs), task).await {
            Ok(result) => result,
            Err(_) => {
                // the worker keeps running until the platform call returns
                error!("Delivery did not finish within {}s", secs);
                print_outcome(DeliveryOutcome::ConnectionFailed, None, Some("timed out"));
                std::process::exit(1);
            }
        },
        None => task.await,
    };

    let outcome = fire::outcome_of(&result);
    match result {
        Ok(report) => {
            print_outcome(outcome, Some(serde_json::to_value(&report)?), None);
            Ok(())
        }
        Err(e) => {
            print_outcome(outcome, None, Some(&e.to_string()));
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "serial"))]
async fn run_delivery(_config: &Config, _record: DescriptorRecord, _timeout: Option<u64>) -> Result<()> {
    error!("Sending requires the 'serial' feature (no radio backend compiled in)");
    std::process::exit(2);
}

fn print_outcome(outcome: DeliveryOutcome, report: Option<serde_json::Value>, error: Option<&str>) {
    let payload = serde_json::json!({
        "outcome": outcome,
        "report": report,
        "error": error,
        "metrics": metrics::snapshot(),
    });
    println!("{}", payload);
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let configured = config
        .and_then(|c| log::LevelFilter::from_str(&c.logging.level).ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .and_then(|c| c.logging.file.clone())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when someone is watching
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
