//! `letpot` command line client

use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use letpot::observability::init_logging_with_level;
use letpot::{
    BrokerCredentials, Connector, DeviceClient, DeviceError, DeviceStatus, LetPotConfig,
    MqttConnector,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};

/// Locations searched when no configuration file is given
const DEFAULT_CONFIG_PATHS: &[&str] = &["letpot.toml", "config/letpot.toml"];

/// How long `set` waits for a status report, before and after the command
const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Control LetPot hydroponic gardens
#[derive(Parser)]
#[command(name = "letpot")]
#[command(about = "Control LetPot hydroponic gardens over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every status report as JSON until interrupted
    Watch,
    /// Show device and broker details without connecting
    Info,
    /// Change one device setting
    Set {
        #[command(subcommand)]
        setting: Setting,
    },
    /// Validate the configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum Setting {
    /// Turn the garden on or off
    Power {
        #[arg(value_parser = parse_switch)]
        state: bool,
    },
    /// Light mode (0 flower, 1 vegetable)
    LightMode { mode: u8 },
    /// Light brightness, one of the levels listed by `info`
    Brightness { level: u16 },
    /// Light schedule; omitted times are kept
    Schedule {
        #[arg(long, value_parser = parse_time)]
        start: Option<NaiveTime>,
        #[arg(long, value_parser = parse_time)]
        end: Option<NaiveTime>,
    },
    /// Plant day counter
    PlantDays { days: u16 },
    /// Scheduled pump on or off
    Pump {
        #[arg(value_parser = parse_switch)]
        state: bool,
    },
    /// Alarm sound on or off
    Sound {
        #[arg(value_parser = parse_switch)]
        state: bool,
    },
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM, got '{s}': {e}"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => None,
        1 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    };
    init_logging_with_level(level);

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // One TLS configuration for every connection this process opens
    let connector: Arc<dyn Connector> = Arc::new(MqttConnector::new());

    let result = match cli.command {
        Commands::Watch => watch(&config, connector).await,
        Commands::Info => info_command(&config, connector),
        Commands::Set { setting } => set(&config, connector, setting).await,
        Commands::Config { show } => config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(path: Option<&Path>) -> Result<LetPotConfig, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        info!("Loading configuration from: {}", path.display());
        return Ok(LetPotConfig::load_from_file(path)?);
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(LetPotConfig::load_from_file(path)?);
        }
    }

    Err("No configuration file found. Provide one with -c/--config or create letpot.toml".into())
}

fn print_status(status: &DeviceStatus) {
    match serde_json::to_string(status) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!("Failed to serialize status: {}", e),
    }
}

/// Start the session in the background, forwarding reports to a channel
fn start_session(
    client: &Arc<DeviceClient>,
) -> (
    tokio::task::JoinHandle<Result<(), DeviceError>>,
    mpsc::UnboundedReceiver<DeviceStatus>,
) {
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let session = Arc::clone(client);
    let handle = tokio::spawn(async move {
        session
            .subscribe(move |status| {
                let _ = status_tx.send(status);
            })
            .await
    });
    (handle, status_rx)
}

async fn watch(
    config: &LetPotConfig,
    connector: Arc<dyn Connector>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(DeviceClient::with_connector(config, connector)?);
    let (mut handle, mut statuses) = start_session(&client);
    info!(serial = %client.identity().serial(), "Watching device, press Ctrl-C to stop");

    loop {
        tokio::select! {
            Some(status) = statuses.recv() => print_status(&status),
            _ = signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                client.shutdown();
                (&mut handle).await??;
                return Ok(());
            }
            result = &mut handle => {
                result??;
                return Ok(());
            }
        }
    }
}

fn info_command(
    config: &LetPotConfig,
    connector: Arc<dyn Connector>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = DeviceClient::with_connector(config, connector)?;
    let identity = client.identity();
    let credentials = BrokerCredentials::derive(&config.account_identity()?);

    println!("Serial:            {}", identity.serial());
    println!("Device type:       {}", identity.device_type());
    match identity.model() {
        Some(model) => println!("Model:             {} ({})", model.name, model.code),
        None => println!("Model:             unknown"),
    }
    let levels = client.light_brightness_levels();
    if levels.is_empty() {
        println!("Brightness levels: not adjustable");
    } else {
        let levels: Vec<String> = levels.iter().map(u16::to_string).collect();
        println!("Brightness levels: {}", levels.join(", "));
    }
    println!(
        "Broker:            wss://{}:{}{}",
        config.broker.host, config.broker.port, config.broker.path
    );
    println!("Broker username:   {}", credentials.username);
    Ok(())
}

async fn set(
    config: &LetPotConfig,
    connector: Arc<dyn Connector>,
    setting: Setting,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(DeviceClient::with_connector(config, connector)?);
    let (handle, mut statuses) = start_session(&client);

    let outcome = async {
        tokio::time::timeout(REPORT_TIMEOUT, statuses.recv())
            .await
            .map_err(|_| "No status report received from the device")?;

        match setting {
            Setting::Power { state } => client.set_power(state).await?,
            Setting::LightMode { mode } => client.set_light_mode(mode).await?,
            Setting::Brightness { level } => client.set_light_brightness(level).await?,
            Setting::Schedule { start, end } => client.set_light_schedule(start, end).await?,
            Setting::PlantDays { days } => client.set_plant_days(days).await?,
            Setting::Pump { state } => client.set_pump_mode(state).await?,
            Setting::Sound { state } => client.set_sound(state).await?,
        }
        info!("Command sent, waiting for the device to confirm");

        match tokio::time::timeout(REPORT_TIMEOUT, statuses.recv()).await {
            Ok(Some(status)) => print_status(&status),
            _ => warn!("Device did not report back within {:?}", REPORT_TIMEOUT),
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .await;

    client.shutdown();
    handle.await??;
    outcome
}

fn config_command(config: &LetPotConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    config.account_identity()?;
    info!("Configuration is valid");

    if show {
        let mut shown = config.clone();
        if shown.account.user_id.is_some() {
            shown.account.user_id = Some("***".to_string());
        }
        print!("{}", toml::to_string_pretty(&shown)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("on"), Ok(true));
        assert_eq!(parse_switch("OFF"), Ok(false));
        assert!(parse_switch("maybe").is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time("07:30"),
            Ok(NaiveTime::from_hms_opt(7, 30, 0).unwrap())
        );
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn test_cli_parses_set_schedule() {
        let cli = Cli::parse_from(["letpot", "set", "schedule", "--start", "06:00"]);
        match cli.command {
            Commands::Set {
                setting: Setting::Schedule { start, end },
            } => {
                assert_eq!(start, NaiveTime::from_hms_opt(6, 0, 0));
                assert_eq!(end, None);
            }
            _ => panic!("expected set schedule"),
        }
    }
}
