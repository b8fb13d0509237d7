//! # btprinter CLI
//!
//! Command-line interface for Bluetooth thermal printers.
//!
//! ## Usage
//!
//! ```bash
//! # Adapter state and bonded devices
//! btprinter devices
//!
//! # Print text in size 4
//! btprinter print --address 66:22:B3:0A:11:9C --size 4 "HELLO"
//!
//! # Send a named command or raw bytes
//! btprinter raw --address 66:22:B3:0A:11:9C --command feed_paper_and_cut
//! btprinter raw --address 66:22:B3:0A:11:9C 27 64 10
//!
//! # Show what would be sent, without a printer
//! btprinter --dry-run print --address 00:00:00:00:00:00 "test"
//!
//! # Serve the method-call bridge over HTTP
//! btprinter serve --listen 127.0.0.1:8765
//! ```

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use btprinter::{
    ConnectionManager, ManagerConfig, PrinterError,
    bridge::Bridge,
    platform::LinuxPlatform,
    protocol::commands,
    protocol::text::{FontSize, PrintDirective},
    server::{self, DEFAULT_LISTEN_ADDR, ServerConfig},
    transport::{Adapter, BluezAdapter, MockAdapter},
};

/// btprinter - Bluetooth thermal printer utility
#[derive(Parser, Debug)]
#[command(name = "btprinter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Seconds to wait for the RFCOMM handshake
    #[arg(long, global = true, default_value = "10")]
    connect_timeout: u64,

    /// RFCOMM channel used when binding a new device
    #[arg(long, global = true, default_value = "1")]
    channel: u8,

    /// Use an in-memory printer and hex-dump what would be sent
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show adapter state and bonded devices
    Devices,

    /// Connect and check that the printer answers
    Status {
        /// Printer Bluetooth address
        #[arg(long)]
        address: String,
    },

    /// Print a line of text
    Print {
        /// Printer Bluetooth address
        #[arg(long)]
        address: String,

        /// Font size, 1-5
        #[arg(long, default_value = "2")]
        size: i32,

        /// Text to print (a trailing newline is added)
        text: String,
    },

    /// Send raw bytes or a named command
    Raw {
        /// Printer Bluetooth address
        #[arg(long)]
        address: String,

        /// Command table entry (see `btprinter commands`)
        #[arg(long, conflicts_with = "bytes")]
        command: Option<String>,

        /// Byte values, truncated to 8 bits
        #[arg(allow_negative_numbers = true)]
        bytes: Vec<i64>,
    },

    /// List the command table
    Commands,

    /// Serve the method-call bridge over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
        listen: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("btprinter=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PrinterError> {
    let cli = Cli::parse();

    let config = ManagerConfig {
        connect_timeout: Duration::from_secs(cli.connect_timeout),
        rfcomm_channel: cli.channel,
        ..Default::default()
    };

    if cli.dry_run {
        let adapter = MockAdapter::new();
        let result = execute(cli.command, adapter.clone(), config).await;
        let written = adapter.written();
        if !written.is_empty() {
            println!("{}", hex_dump(&written));
        }
        result
    } else {
        execute(cli.command, BluezAdapter::new(config.clone()), config).await
    }
}

async fn execute<A: Adapter>(
    command: Commands,
    adapter: A,
    config: ManagerConfig,
) -> Result<(), PrinterError> {
    let manager = Arc::new(ConnectionManager::new(adapter, config));

    match command {
        Commands::Devices => {
            let enabled = manager.is_adapter_enabled().await;
            println!("Adapter: {}", if enabled { "on" } else { "off" });
            let devices = manager.list_paired_devices().await;
            if devices.is_empty() {
                println!("No bonded devices (or no permission to list them)");
            }
            for device in devices {
                println!("  {}  {}", device.address, device.name);
            }
        }
        Commands::Status { address } => {
            manager.connect(&address).await?;
            let alive = manager.probe().await;
            println!("{}: {}", address, if alive { "connected" } else { "not responding" });
            manager.disconnect().await?;
        }
        Commands::Print {
            address,
            size,
            text,
        } => {
            let line = format!("{}\n", text);
            let directive = PrintDirective {
                size: FontSize::clamped(size),
                text: &line,
            };
            manager.connect(&address).await?;
            manager.print_directive(&directive).await?;
            manager.disconnect().await?;
            println!("Printed successfully!");
        }
        Commands::Raw {
            address,
            command,
            bytes,
        } => {
            let data = match command {
                Some(name) => commands::by_name(&name)
                    .ok_or_else(|| {
                        PrinterError::InvalidArguments(format!(
                            "Unknown command '{}'. Run `btprinter commands` to see available options.",
                            name
                        ))
                    })?
                    .to_vec(),
                None if bytes.is_empty() => {
                    return Err(PrinterError::InvalidArguments(
                        "Nothing to send: pass --command or byte values".to_string(),
                    ));
                }
                None => btprinter::protocol::text::raw_bytes(&bytes),
            };
            manager.connect(&address).await?;
            manager.write(data).await?;
            manager.disconnect().await?;
        }
        Commands::Commands => {
            println!("Available commands:");
            for name in commands::list_commands() {
                if let Some(bytes) = commands::by_name(name) {
                    println!("  {:<40} {}", name, hex_dump(bytes));
                }
            }
        }
        Commands::Serve { listen } => {
            let bridge = Bridge::new(manager, LinuxPlatform);
            server::serve(ServerConfig { listen_addr: listen }, bridge).await?;
        }
    }

    Ok(())
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
