// configコマンドの実装

use crate::cli::{ConfigAction, ConfigArgs};
use crate::cli::commands::CommandResult;
use crate::common::config::{Config, DEFAULT_CONFIG_FILE};
use crate::common::error::Error;
use crate::wakeup::WakeupConfig;
use comfy_table::{Attribute, Cell, Color, Table};
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn execute(config_path: Option<&Path>, args: ConfigArgs) -> CommandResult {
    match args.action {
        ConfigAction::Show { format } => show_config(config_path, &format).await,
        ConfigAction::Validate { file } => {
            validate_config(file.as_deref().or(config_path)).await
        }
        ConfigAction::Generate { output } => generate_config(output).await,
    }
}

/// Effective settings as (key, value) rows, token redacted
fn effective_rows(config: &Config) -> Result<Vec<(&'static str, String)>, Error> {
    let runtime = config.into_runtime()?;
    let mut rows = vec![
        ("listen", runtime.listen.clone()),
        ("target", runtime.target.to_string()),
        ("retry.attempts", runtime.retry.max_attempts.to_string()),
        ("retry.delay", format!("{:?}", runtime.retry.delay)),
        (
            "limits.max_connections",
            runtime
                .max_connections
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unbounded".to_string()),
        ),
        ("wakeup.method", runtime.wakeup.method().to_string()),
    ];

    match &runtime.wakeup {
        WakeupConfig::WakeOnLan { mac, broadcast } => {
            rows.push(("wakeup.wol.mac", mac.clone()));
            rows.push(("wakeup.wol.broadcast", broadcast.clone()));
        }
        WakeupConfig::HypervisorPowerOn(settings) => {
            rows.push(("wakeup.proxmox.api_url", settings.api_url.clone()));
            rows.push(("wakeup.proxmox.node", settings.node.clone()));
            rows.push(("wakeup.proxmox.kind", settings.kind.to_string()));
            rows.push(("wakeup.proxmox.vmid", settings.resource_id.clone()));
            rows.push(("wakeup.proxmox.token", "<redacted>".to_string()));
            rows.push(("wakeup.proxmox.insecure", settings.insecure.to_string()));
        }
        WakeupConfig::Noop => {}
    }

    Ok(rows)
}

async fn show_config(config_path: Option<&Path>, format: &str) -> CommandResult {
    let config = Config::load(config_path)?;
    let rows = effective_rows(&config)?;

    match format {
        "json" => {
            let map: serde_json::Map<String, serde_json::Value> = rows
                .into_iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        _ => {
            let mut table = Table::new();
            table.set_header(vec![
                Cell::new("Setting").add_attribute(Attribute::Bold).fg(Color::Blue),
                Cell::new("Value").add_attribute(Attribute::Bold).fg(Color::Blue),
            ]);
            for (key, value) in rows {
                table.add_row(vec![Cell::new(key), Cell::new(value)]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}

async fn validate_config(file: Option<&Path>) -> CommandResult {
    let shown = file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    info!("Validating configuration file: {}", shown.display());

    match Config::load(file) {
        Ok(config) => {
            println!("✅ Configuration is valid");
            println!("🎯 Target: {}:{}", config.target.host, config.target.port);
            println!("⏰ Wakeup method: {}", config.wakeup.method.to_lowercase());
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

async fn generate_config(output: Option<PathBuf>) -> CommandResult {
    let output_path = output.unwrap_or_else(|| PathBuf::from("wakegate-sample.toml"));

    if output_path.exists() {
        return Err(Error::config(format!("Output file '{}' already exists", output_path.display())));
    }

    let sample_config = Config::sample();
    sample_config.to_file(&output_path)?;

    println!("✅ Sample configuration generated: {}", output_path.display());
    println!("📝 Edit the target and [wakeup] sections, then rename it to {}", DEFAULT_CONFIG_FILE);

    Ok(())
}
