// wakeコマンドの実装
//
// 設定されたプロバイダで一度だけウェイクアップを実行（認証情報の確認用）

use crate::cli::commands::CommandResult;
use crate::common::config::Config;
use crate::wakeup::build_provider;
use std::path::Path;
use tracing::info;

pub async fn execute(config_path: Option<&Path>) -> CommandResult {
    let config = Config::load(config_path)?;
    let wakeup = build_provider(&config.wakeup_config()?)?;

    info!("Triggering {} wakeup", wakeup.name());
    wakeup.wake().await?;

    println!("✅ Wakeup signal delivered via {}", wakeup.name());
    Ok(())
}
