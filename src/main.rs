use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fridgeread::{logging, sync, Config, DomoticzSettings, FridgeClient};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "fridgeread")]
#[command(about = "Read the status of a WT-0001 BLE fridge, or set its target temperature")]
struct Args {
    /// Set the target temperature (°C)
    #[arg(short, long, allow_negative_numbers = true)]
    temp: Option<i8>,

    /// Bluetooth address of the fridge [default: 07:4D:FB:A7:C4:5E]
    #[arg(short, long)]
    address: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stay connected and keep the fridge in sync with Domoticz
    #[arg(long)]
    sync: bool,

    /// Send the pairing handshake before anything else
    #[arg(long)]
    bind: bool,

    /// Debug logging, including raw frames
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_cli_logger(args.verbose);

    exit_code(run(args).await)
}

/// Failures reach stderr through the logger only
fn exit_code(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(address) = &args.address {
        config.device.address = address.clone();
    }

    let domoticz = match (args.sync, config.domoticz.take()) {
        (true, Some(domoticz)) => Some(domoticz),
        (true, None) => anyhow::bail!("--sync needs a [domoticz] section in the config file"),
        (false, _) => None,
    };

    let mut client = FridgeClient::new(config.device).await?;

    let result = session(&mut client, &args, domoticz).await;
    finish(result, client.stop()).await
}

/// Disconnect after a session. A failed disconnect is logged so it cannot hide the session's own error.
async fn finish(result: anyhow::Result<()>, stop: impl Future<Output = anyhow::Result<()>>) -> anyhow::Result<()> {
    if let Err(err) = stop.await {
        warn!("Failed to disconnect: {err:#}");
    }
    result
}

async fn session(client: &mut FridgeClient, args: &Args, domoticz: Option<DomoticzSettings>) -> anyhow::Result<()> {
    if args.bind {
        info!("Sending bind command");
        client.bind().await?;
    }

    if let Some(domoticz) = domoticz {
        return sync::run(client, &domoticz, args.temp).await;
    }

    let state = match args.temp {
        Some(temp) => client.set_target_temperature(temp).await?,
        None => client.fetch_state().await?,
    };
    println!("{state}");
    Ok(())
}

#[tokio::test]
async fn test_finish_keeps_session_error() {
    let result = finish(Err(anyhow::anyhow!("query timed out")), async { Err(anyhow::anyhow!("not connected")) }).await;
    assert_eq!(result.unwrap_err().to_string(), "query timed out");
}

#[tokio::test]
async fn test_finish_ignores_disconnect_failure_after_success() {
    let result = finish(Ok(()), async { Err(anyhow::anyhow!("not connected")) }).await;
    assert!(result.is_ok());
}

#[test]
fn test_exit_code() {
    assert_eq!(format!("{:?}", exit_code(Ok(()))), format!("{:?}", ExitCode::SUCCESS));
    assert_eq!(format!("{:?}", exit_code(Err(anyhow::anyhow!("no adapter")))), format!("{:?}", ExitCode::FAILURE));
}
