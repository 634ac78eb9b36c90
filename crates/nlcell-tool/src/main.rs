//! `nlcell`: drive a NimbeLink cellular modem from the command line.

mod config;
mod error;
mod transfer;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use nlcell_at::{Interface, SerialPort};
use nlcell_modem::dfu::ImageType;
use nlcell_modem::{Key, Model, Modem};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::transfer::Xmodem;

#[derive(Parser, Debug)]
#[command(name = "nlcell", version, about = "Drive a NimbeLink cellular modem")]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// AT command port.
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Line rate for both ports.
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Kernel-log port used for firmware uploads.
    #[arg(long, global = true)]
    kernel_log: Option<String>,

    /// Modem model (nano, src7611, tg1wwg).
    #[arg(short, long, global = true)]
    model: Option<Model>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one AT command and print the reply.
    Command {
        /// The command, e.g. AT+CGMR.
        command: String,

        /// Reply deadline in seconds.
        #[arg(short, long)]
        timeout: Option<f64>,
    },

    /// Print notifications until none arrives within the timeout.
    Urc {
        /// Only print notifications matching this regular expression.
        #[arg(long)]
        pattern: Option<String>,

        /// Seconds to wait for each notification.
        #[arg(short, long, default_value_t = 10.0)]
        timeout: f64,
    },

    /// Upload a firmware image over the kernel-log port with XMODEM.
    Upload {
        file: PathBuf,

        /// Image type (stack, application, modem, key, partition).
        #[arg(short, long)]
        image: ImageType,

        /// Stage the image without rebooting into it.
        #[arg(long)]
        no_reboot: bool,
    },

    /// Have the modem download and apply an image itself.
    Fota {
        url: String,

        #[arg(long)]
        no_reboot: bool,
    },

    /// Print a SIM's ICCID.
    Iccid {
        /// SIM id or name; the active SIM if omitted.
        #[arg(short, long, value_parser = Key::from_str)]
        sim: Option<Key>,
    },

    /// Print firmware component versions.
    Version {
        /// App id or name; every app if omitted.
        #[arg(value_parser = Key::from_str)]
        app: Option<Key>,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Reboot the modem.
    Reboot,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge the configuration file with command line overrides.
fn resolve_config(cli: &Cli) -> Result<ToolConfig, ToolError> {
    let mut config = match &cli.config {
        Some(path) => ToolConfig::load(path)?,
        None => ToolConfig::default(),
    };

    if let Some(port) = &cli.port {
        config.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.interface.baud_rate = baud;
    }
    if let Some(kernel_log) = &cli.kernel_log {
        config.kernel_log = Some(kernel_log.clone());
    }
    if let Some(model) = cli.model {
        config.modem.model = model;
    }

    debug!(?config, "resolved configuration");
    Ok(config)
}

fn open_modem(config: &ToolConfig, with_kernel_log: bool) -> Result<Modem, ToolError> {
    let at = Interface::open(&config.port, config.interface.clone())?;
    info!(port = %config.port, model = %config.modem.model, "opened modem");
    let mut modem = Modem::new(config.modem.clone()).with_at(at);

    if with_kernel_log {
        if let Some(path) = &config.kernel_log {
            let port = SerialPort::open(
                path,
                config.interface.baud_rate,
                config.interface.flow_control,
                config.interface.timeout(),
            )?;
            modem = modem.with_kernel_log(port);
        }
    }

    Ok(modem)
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

fn run(cli: Cli) -> Result<(), ToolError> {
    let config = resolve_config(&cli)?;
    let needs_kernel_log = matches!(cli.command, Command::Upload { .. });
    let mut modem = open_modem(&config, needs_kernel_log)?;

    match cli.command {
        Command::Command { command, timeout } => {
            let mut at = modem.at()?;
            let response = match timeout {
                Some(secs) => at.send_command_with_timeout(&command, Duration::from_secs_f64(secs))?,
                None => at.send_command(&command)?,
            };
            println!("{}", response);
            if !response.is_ok() {
                return Err(ToolError::CommandFailed(response.result().to_string()));
            }
        }
        Command::Urc { pattern, timeout } => {
            let mut at = modem.at()?;
            let urcs = at.urcs(pattern.as_deref(), Some(Duration::from_secs_f64(timeout)))?;
            for urc in urcs {
                println!("{} {}", timestamp(), urc?);
            }
        }
        Command::Upload {
            file,
            image,
            no_reboot,
        } => {
            let data = fs::read(&file).map_err(|source| ToolError::ReadFile {
                path: file.display().to_string(),
                source,
            })?;
            let mut transfer = Xmodem::new()
                .with_timeout(config.transfer.timeout())
                .with_retries(config.transfer.retries);
            modem.upload(&mut transfer, &data, image, !no_reboot)?;
            println!("uploaded {} ({} bytes)", file.display(), data.len());
        }
        Command::Fota { url, no_reboot } => {
            modem.fota(&url, !no_reboot)?;
            println!("updated from {}", url);
        }
        Command::Iccid { sim } => {
            println!("{}", modem.iccid(sim.as_ref())?);
        }
        Command::Version { app, json } => match app {
            Some(app) => println!("{}", modem.app_version(&app)?),
            None => {
                let versions = modem.app_versions()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&versions)?);
                } else {
                    for (tag, version) in versions {
                        println!("{}: {}", tag, version);
                    }
                }
            }
        },
        Command::Reboot => {
            modem.reboot()?;
            println!("rebooted");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::parse_from([
            "nlcell", "--port", "/dev/ttyUSB0", "--baud", "921600", "--model", "tg1wwg", "reboot",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.interface.baud_rate, 921_600);
        assert_eq!(config.modem.model, Model::Tg1wwg);
        assert!(config.kernel_log.is_none());
    }

    #[test]
    fn test_parse_upload() {
        let cli = Cli::parse_from(["nlcell", "upload", "fw.bin", "--image", "modem", "--no-reboot"]);
        match cli.command {
            Command::Upload {
                file,
                image,
                no_reboot,
            } => {
                assert_eq!(file, PathBuf::from("fw.bin"));
                assert_eq!(image, ImageType::Modem);
                assert!(no_reboot);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_keys() {
        let cli = Cli::parse_from(["nlcell", "iccid", "--sim", "caged"]);
        assert!(matches!(
            cli.command,
            Command::Iccid { sim: Some(Key::Name(ref name)) } if name == "caged"
        ));

        let cli = Cli::parse_from(["nlcell", "version", "1"]);
        assert!(matches!(cli.command, Command::Version { app: Some(Key::Id(1)), json: false }));

        let cli = Cli::parse_from(["nlcell", "iccid", "--sim", "0"]);
        assert!(matches!(cli.command, Command::Iccid { sim: Some(Key::Id(0)) }));

        let cli = Cli::parse_from(["nlcell", "version", "stack", "--json"]);
        assert!(matches!(
            cli.command,
            Command::Version { app: Some(Key::Name(ref name)), json: true } if name == "stack"
        ));
    }

    #[test]
    fn test_rejects_unknown_image() {
        assert!(Cli::try_parse_from(["nlcell", "upload", "fw.bin", "--image", "bios"]).is_err());
    }
}
