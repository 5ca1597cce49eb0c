// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use padcast::shell::{self, ConnectOptions};
use padcast::{
    CommandVocabulary, ControllerKind, PlaybackConfig, ScriptStart, Session, SimulatedDevice,
    compile,
};

#[derive(Parser)]
#[command(name = "padcast", version, about = "Drive an emulated game controller from macro scripts")]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script and print the expanded program
    Check {
        script: PathBuf,

        #[arg(long, value_enum, default_value_t = ControllerKind::ProController)]
        controller: ControllerKind,
    },
    /// Connect, run a script to completion and print the final status
    Run {
        script: PathBuf,

        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Interactive control console
    Shell {
        #[command(flatten)]
        device: DeviceArgs,

        /// Start disconnected
        #[arg(long)]
        no_connect: bool,
    },
}

#[derive(Args)]
struct DeviceArgs {
    #[arg(long, value_enum, default_value_t = ControllerKind::ProController)]
    controller: ControllerKind,

    /// Resume a previous pairing with this console address
    #[arg(long)]
    reconnect: Option<String>,

    /// SPI flash image to present to the console
    #[arg(long)]
    firmware: Option<PathBuf>,

    /// How long a scripted tap holds its button
    #[arg(long, default_value_t = 100)]
    tap_hold_ms: u64,
}

impl DeviceArgs {
    async fn connect_options(&self) -> Result<ConnectOptions> {
        let firmware = match &self.firmware {
            Some(path) => Some(
                tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read firmware {}", path.display()))?,
            ),
            None => None,
        };
        Ok(ConnectOptions {
            kind: self.controller,
            reconnect: self.reconnect.clone(),
            firmware,
        })
    }

    fn session(&self) -> Session {
        let config = PlaybackConfig {
            tap_hold: Duration::from_millis(self.tap_hold_ms),
        };
        Session::new(Arc::new(SimulatedDevice::new()), config)
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "padcast=info",
        1 => "padcast=debug",
        _ => "padcast=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn read_script(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read script {}", path.display()))
}

async fn check(script: &Path, controller: ControllerKind) -> Result<()> {
    let source = read_script(script).await?;
    let program = compile(&source, &CommandVocabulary::for_controller(controller))?;

    for (step, action) in program.actions.iter().enumerate() {
        println!("{:>6}  {action}", step + 1);
    }
    for skipped in &program.skipped {
        eprintln!("skipped {skipped}");
    }
    println!(
        "{} actions, {} lines skipped",
        program.len(),
        program.skipped.len()
    );
    Ok(())
}

async fn run(script: &Path, device: &DeviceArgs) -> Result<()> {
    let source = read_script(script).await?;
    let options = device.connect_options().await?;
    let session = device.session();

    let peer = session
        .connect(options.kind, options.reconnect, options.firmware)
        .await
        .context("Failed to connect")?;
    info!(%peer, "device ready");

    let handle = session.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl-C, stopping script...");
        handle.cancel_script();
    })?;

    match session.run_script(&source).await? {
        ScriptStart::Started => {}
        other => bail!("Script was not started: {other:?}"),
    }

    if let Some(outcome) = session.wait_script().await {
        info!(?outcome, "script stopped");
    }

    println!("{}", serde_json::to_string_pretty(&session.get_status().await)?);
    session.disconnect().await;
    Ok(())
}

async fn shell(device: &DeviceArgs, no_connect: bool) -> Result<()> {
    let options = device.connect_options().await?;
    let session = device.session();

    if !no_connect {
        let peer = session
            .connect(options.kind, options.reconnect.clone(), options.firmware.clone())
            .await
            .context("Failed to connect")?;
        println!("connected to {peer}");
    }

    shell::run_shell(session, options).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Check { script, controller } => check(&script, controller).await,
        Commands::Run { script, device } => run(&script, &device).await,
        Commands::Shell { device, no_connect } => shell(&device, no_connect).await,
    }
}
