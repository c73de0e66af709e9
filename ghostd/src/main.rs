use std::sync::Arc;

use ghost_core::PublicShareClient;
use ghostd::config::{self, DaemonConfig};
use ghostd::logging;
use ghostd::startup::{self, ConnectPlan};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    ResetSession,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--reset-session" => mode = CliMode::ResetSession,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_env_files();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        println!("Usage: ghostd [--reset-session]");
        println!("  --reset-session   Remove the saved session credentials and exit");
        return Ok(());
    }

    let config = DaemonConfig::from_env()?;
    logging::init(config.json_logs);

    if mode == CliMode::ResetSession {
        if startup::reset_session(&config).await? {
            info!(path = %config.session_file().display(), "saved session removed");
        } else {
            info!("no saved session to remove");
        }
        return Ok(());
    }

    info!(workspace = %config.workspace.display(), "preparing workspace");
    let provider = Arc::new(PublicShareClient::with_base_url(&config.api_base_url)?);
    let report = startup::prepare(&config, provider).await;

    match report.plan {
        ConnectPlan::ResumeSession => info!("session credentials ready; resuming session"),
        ConnectPlan::InteractiveLogin => warn!("no usable session; interactive login required"),
    }
    Ok(())
}
