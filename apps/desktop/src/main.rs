use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use client_core::{spawn_control_loop, ControlEvent, WsTransport};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;

use console::{parse_line, Console, Flow, HELP};

#[derive(Parser, Debug)]
struct Args {
    /// Vehicle host, overrides settings file and environment.
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref());
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }

    let control_config = settings.control_config();
    info!(
        endpoint = %control_config.endpoint,
        protocol = ?control_config.protocol,
        "desktop: starting"
    );
    let transport = WsTransport::new(settings.connect_timeout());
    let (control, control_task) = spawn_control_loop(transport, control_config);

    let mut events = control.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControlEvent::StateChanged(state)) => println!("[state] {state}"),
                Ok(ControlEvent::LogAppended(line)) => println!("[log] {line}"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "desktop: event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("{HELP}");
    let mut console = Console::new(control.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("error: {err:#}");
                continue;
            }
        };
        match console.execute(command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(err) => println!("error: {err:#}"),
        }
    }

    control.shutdown();
    drop(console);
    control_task.await?;
    Ok(())
}
