//! # printwire CLI
//!
//! Command-line interface for printing images on receipt and label printers.
//!
//! ## Usage
//!
//! ```bash
//! # List printer backends
//! printwire printers
//!
//! # Discover endpoints (all backends, or one)
//! printwire endpoints --printer "Raw USB Printing"
//!
//! # Print an image with saved settings
//! printwire print --settings settings.json receipt.png
//!
//! # Override the printer for one job
//! printwire print --printer Serial --endpoint /dev/ttyUSB0:9600_N81 receipt.png
//!
//! # Write the encoded job to a file instead of printing
//! printwire print --dump job.bin receipt.png
//!
//! # Cut the paper / open a cash drawer
//! printwire command --settings settings.json cut
//!
//! # Accept jobs from other machines
//! printwire serve --settings settings.json --listen 0.0.0.0:7123
//! ```
//!
//! Set `RUST_LOG=debug` for transport details.

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use printwire::{
    Bitmap, Dispatcher, PrintError, PrinterCommand, PrinterRegistry, Settings,
    server::{self, ServerConfig},
};

/// printwire - Receipt and label printer utility
#[derive(Parser, Debug)]
#[command(name = "printwire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List printer backends
    Printers,

    /// Discover endpoints
    Endpoints {
        /// Only query this backend
        #[arg(long)]
        printer: Option<String>,
    },

    /// Print an image
    Print {
        /// Image file (PNG, JPEG, ...)
        image: PathBuf,

        /// Settings file (defaults are used when omitted)
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,

        /// Printer backend name, overrides the settings
        #[arg(long)]
        printer: Option<String>,

        /// Printer endpoint, overrides the settings
        #[arg(long)]
        endpoint: Option<String>,

        /// Write the encoded job to FILE instead of printing
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,
    },

    /// Send a stand-alone printer command
    Command {
        /// Command to send
        #[arg(value_enum)]
        command: CommandArg,

        /// Settings file (defaults are used when omitted)
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,
    },

    /// Run the relay receiver
    Serve {
        /// Settings file with the local printer
        #[arg(long, value_name = "FILE")]
        settings: PathBuf,

        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:7123")]
        listen: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CommandArg {
    Cut,
    Drawer1,
    Drawer2,
}

impl From<CommandArg> for PrinterCommand {
    fn from(arg: CommandArg) -> Self {
        match arg {
            CommandArg::Cut => PrinterCommand::Cut,
            CommandArg::Drawer1 => PrinterCommand::Drawer1,
            CommandArg::Drawer2 => PrinterCommand::Drawer2,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, PrintError> {
    match path {
        Some(path) => Settings::load(path),
        None => Ok(Settings::default()),
    }
}

fn run() -> Result<(), PrintError> {
    let cli = Cli::parse();
    let dispatcher = Dispatcher::new(PrinterRegistry::with_defaults());

    match cli.command {
        Commands::Printers => {
            for printer in dispatcher.registry().descriptors() {
                println!("{}", printer.name);
                println!("    {}", printer.description);
            }
        }

        Commands::Endpoints { printer } => {
            let registry = dispatcher.registry();
            let all: BTreeMap<String, BTreeMap<String, String>> = match printer {
                Some(name) => {
                    let endpoints = registry.get(&name)?.available_endpoints()?;
                    [(name, endpoints)].into_iter().collect()
                }
                None => registry.available_endpoints(),
            };

            for (name, endpoints) in all {
                println!("{}:", name);
                if endpoints.is_empty() {
                    println!("    (none found)");
                }
                for (label, endpoint) in endpoints {
                    println!("    {:<40} {}", label, endpoint);
                }
            }
        }

        Commands::Print {
            image,
            settings,
            printer,
            endpoint,
            dump,
        } => {
            let mut settings = load_settings(settings.as_deref())?;
            if let Some(printer) = printer {
                settings.printer_type = printer;
            }
            if let Some(endpoint) = endpoint {
                settings.printer_endpoint = endpoint;
            }

            let bitmap = Bitmap::open(&image)?;
            info!(
                "Loaded {} ({}x{})",
                image.display(),
                bitmap.width(),
                bitmap.height()
            );

            match dump {
                Some(path) => {
                    let data = dispatcher.build_commands(&settings, &bitmap)?.concat();
                    std::fs::write(&path, &data)?;
                    println!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => {
                    dispatcher.print(&settings, &bitmap)?;
                    println!("Printed {} on {}", image.display(), settings.printer_type);
                }
            }
        }

        Commands::Command { command, settings } => {
            let settings = load_settings(settings.as_deref())?;
            dispatcher.send_command(&settings, command.into())?;
        }

        Commands::Serve { settings, listen } => {
            let settings = Settings::load(&settings)?;
            let config = ServerConfig {
                listen_addr: listen,
                ..ServerConfig::default()
            };

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(config, settings, dispatcher))?;
        }
    }

    Ok(())
}
