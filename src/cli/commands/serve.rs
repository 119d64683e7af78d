// serveコマンドの実装
//
// 設定を読み込み、ウェイクアッププロバイダを構築して待ち受けを開始する

use crate::cli::ServeArgs;
use crate::cli::commands::CommandResult;
use crate::common::config::Config;
use crate::common::error::Error;
use crate::common::types::TargetAddress;
use crate::proxy::{Acceptor, Orchestrator};
use crate::wakeup::build_provider;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn execute(config_path: Option<&Path>, args: ServeArgs) -> CommandResult {
    let mut config = Config::layered(config_path)?;

    if let Some(listen) = args.listen {
        let addr: TargetAddress = listen
            .parse()
            .map_err(|e| Error::config(format!("Invalid listen address: {}", e)))?;
        config.listen.host = addr.host;
        config.listen.port = addr.port;
    }
    if let Some(target) = args.target {
        config.target.host = target.host;
        config.target.port = target.port;
    }

    let settings = config.into_runtime()?;
    let wakeup = build_provider(&settings.wakeup)?;
    info!(
        "Using {} wakeup provider for target {} ({} attempts, {:?} apart)",
        wakeup.name(),
        settings.target,
        settings.retry.max_attempts,
        settings.retry.delay
    );

    let acceptor = Acceptor::bind(&settings.listen)
        .await?
        .with_connection_limit(settings.max_connections);
    info!("wakegate listening on {}", acceptor.local_addr()?);

    let orchestrator = Arc::new(Orchestrator::new(settings.target, settings.retry, wakeup));

    tokio::select! {
        _ = acceptor.run(orchestrator) => {}
        _ = shutdown_signal() => {
            info!("Shutdown signal received, dropping in-flight connections");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
