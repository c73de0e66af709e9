use std::sync::Arc;

use anyhow::Context;
use ghost_core::RemoteProvider;
use tracing::info;

use crate::config::DaemonConfig;
use crate::sync::bootstrap::{BootstrapFetcher, BootstrapReport};
use crate::sync::orchestrator::SyncOrchestrator;
use crate::sync::outcome::AggregateReport;

/// How the messaging client should connect once startup is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPlan {
    ResumeSession,
    InteractiveLogin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    pub assets: AggregateReport,
    pub session: BootstrapReport,
    pub plan: ConnectPlan,
}

/// Ensures asset folders, then fetches the session credentials. Neither step
/// can abort startup.
pub async fn prepare(config: &DaemonConfig, provider: Arc<dyn RemoteProvider>) -> StartupReport {
    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&provider),
        config.workspace.clone(),
        config.sync.clone(),
    );
    let assets = orchestrator.ensure_assets(&config.folders).await;

    let fetcher = BootstrapFetcher::new(provider, orchestrator.executor());
    let session = fetcher
        .fetch(config.session_locator.as_deref(), &config.session_file())
        .await;

    let plan = if session.is_degraded() {
        ConnectPlan::InteractiveLogin
    } else {
        ConnectPlan::ResumeSession
    };
    info!(?plan, failed_assets = assets.failed, "startup prepared");
    StartupReport {
        assets,
        session,
        plan,
    }
}

/// Removes the local credential file. Returns whether one existed.
pub async fn reset_session(config: &DaemonConfig) -> anyhow::Result<bool> {
    let path = config.session_file();
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}
