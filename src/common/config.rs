// wakegateの設定管理
//
// 複数のソースから設定を読み込み管理：
// CLI引数 > 環境変数 > 設定ファイル > デフォルト値

use crate::common::error::{Error, Result};
use crate::common::types::{MacAddress, ResourceKind, RetryPolicy, TargetAddress};
use crate::wakeup::{ProxmoxSettings, WakeupConfig};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "wakegate.toml";

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "WAKEGATE_";

// メイン設定構造体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: ListenConfig,
    pub target: TargetConfig,
    pub retry: RetryConfig,
    pub limits: LimitsConfig,
    pub wakeup: WakeupSection,
}

// 待ち受けアドレス
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2222,
        }
    }
}

// 起動対象のサービス
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 15,
            delay_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeupSection {
    /// `wol`, `proxmox` or `noop`
    pub method: String,
    pub wol: WolConfig,
    pub proxmox: ProxmoxConfig,
}

impl Default for WakeupSection {
    fn default() -> Self {
        Self {
            method: "wol".to_string(),
            wol: WolConfig::default(),
            proxmox: ProxmoxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WolConfig {
    pub mac: String,
    pub broadcast: String,
}

impl Default for WolConfig {
    fn default() -> Self {
        Self {
            mac: String::new(),
            broadcast: "255.255.255.255".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxmoxConfig {
    pub api_url: String,
    pub node: String,
    pub vmid: String,
    pub token: String,
    /// `qemu` (vm) or `lxc` (container)
    pub kind: String,
    pub insecure: bool,
}

impl Default for ProxmoxConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            node: String::new(),
            vmid: String::new(),
            token: String::new(),
            kind: "qemu".to_string(),
            insecure: false,
        }
    }
}

/// Validated, immutable settings shared by every connection
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub listen: String,
    pub target: TargetAddress,
    pub retry: RetryPolicy,
    pub wakeup: WakeupConfig,
    pub max_connections: Option<usize>,
}

impl Config {
    /// Load file, apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::layered(path)?;
        config.validate()?;
        Ok(config)
    }

    /// File and environment layers without validation, so callers can
    /// apply CLI overrides first.
    ///
    /// With `path == None` the default file is optional; an explicit path
    /// must exist.
    pub fn layered(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::config(format!(
                        "Configuration file {} not found",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    // ファイルから設定を読み込み
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    // 設定をファイルに保存
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| Error::config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    // サンプル設定を生成
    pub fn sample() -> Self {
        let mut config = Self::default();
        config.target.host = "192.168.1.50".to_string();
        config.wakeup.wol.mac = "AA:BB:CC:DD:EE:FF".to_string();
        config.wakeup.wol.broadcast = "192.168.1.255".to_string();
        config.wakeup.proxmox = ProxmoxConfig {
            api_url: "https://pve.lan:8006/api2/json".to_string(),
            node: "pve".to_string(),
            vmid: "100".to_string(),
            token: "root@pam!wakegate=00000000-0000-0000-0000-000000000000".to_string(),
            kind: "qemu".to_string(),
            insecure: false,
        };
        config
    }

    /// Apply `WAKEGATE_*` overrides from `vars`.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match name {
                "LISTEN_HOST" => self.listen.host = value,
                "LISTEN_PORT" => self.listen.port = parse_env(&key, &value)?,
                "TARGET_HOST" => self.target.host = value,
                "TARGET_PORT" => self.target.port = parse_env(&key, &value)?,
                "RETRY_ATTEMPTS" => self.retry.attempts = parse_env(&key, &value)?,
                "RETRY_DELAY_SECONDS" => self.retry.delay_seconds = parse_env(&key, &value)?,
                "MAX_CONNECTIONS" => self.limits.max_connections = Some(parse_env(&key, &value)?),
                "WAKEUP_METHOD" => self.wakeup.method = value,
                "WOL_MAC" => self.wakeup.wol.mac = value,
                "WOL_BROADCAST" => self.wakeup.wol.broadcast = value,
                "PROXMOX_API_URL" => self.wakeup.proxmox.api_url = value,
                "PROXMOX_NODE" => self.wakeup.proxmox.node = value,
                "PROXMOX_VMID" => self.wakeup.proxmox.vmid = value,
                "PROXMOX_TOKEN" => self.wakeup.proxmox.token = value,
                "PROXMOX_KIND" => self.wakeup.proxmox.kind = value,
                "PROXMOX_INSECURE" => self.wakeup.proxmox.insecure = parse_bool(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    // 設定の妥当性を検証
    pub fn validate(&self) -> Result<()> {
        if self.listen.host.is_empty() {
            return Err(Error::config("listen.host cannot be empty"));
        }

        if self.listen.port == 0 {
            return Err(Error::config("listen.port cannot be 0"));
        }

        if self.target.host.is_empty() {
            return Err(Error::config("target.host is required"));
        }

        if self.target.port == 0 {
            return Err(Error::config("target.port cannot be 0"));
        }

        if self.retry.attempts == 0 {
            return Err(Error::config("retry.attempts must be at least 1"));
        }

        if self.limits.max_connections == Some(0) {
            return Err(Error::config("limits.max_connections must be at least 1"));
        }

        self.wakeup_config().map(|_| ())
    }

    /// Wake strategy described by the `[wakeup]` section
    pub fn wakeup_config(&self) -> Result<WakeupConfig> {
        let method = self.wakeup.method.to_lowercase();
        match method.as_str() {
            "wol" => {
                let wol = &self.wakeup.wol;
                if wol.mac.is_empty() {
                    return Err(Error::config("wakeup.wol.mac is required when method is 'wol'"));
                }
                MacAddress::from_str(&wol.mac).map_err(Error::config)?;
                wol.broadcast.parse::<Ipv4Addr>().map_err(|_| {
                    Error::config(format!("wakeup.wol.broadcast is not an IPv4 address: {}", wol.broadcast))
                })?;

                Ok(WakeupConfig::WakeOnLan {
                    mac: wol.mac.clone(),
                    broadcast: wol.broadcast.clone(),
                })
            }
            "proxmox" => {
                let p = &self.wakeup.proxmox;
                for (field, value) in [
                    ("api_url", &p.api_url),
                    ("node", &p.node),
                    ("vmid", &p.vmid),
                    ("token", &p.token),
                ] {
                    if value.is_empty() {
                        return Err(Error::config(format!(
                            "wakeup.proxmox.{} is required when method is 'proxmox'",
                            field
                        )));
                    }
                }
                if !(p.api_url.starts_with("https://") || p.api_url.starts_with("http://")) {
                    return Err(Error::config(format!(
                        "wakeup.proxmox.api_url must start with https:// or http://: {}",
                        p.api_url
                    )));
                }
                let kind = ResourceKind::from_str(&p.kind).map_err(Error::config)?;

                Ok(WakeupConfig::HypervisorPowerOn(ProxmoxSettings {
                    api_url: p.api_url.clone(),
                    node: p.node.clone(),
                    kind,
                    resource_id: p.vmid.clone(),
                    token: p.token.clone(),
                    insecure: p.insecure,
                }))
            }
            "noop" => Ok(WakeupConfig::Noop),
            other => Err(Error::config(format!("Unknown wakeup method: {}", other))),
        }
    }

    /// Validate and freeze into the settings the proxy runs with
    pub fn into_runtime(&self) -> Result<RuntimeSettings> {
        self.validate()?;
        Ok(RuntimeSettings {
            listen: self.listen_addr(),
            target: TargetAddress::new(self.target.host.clone(), self.target.port),
            retry: RetryPolicy::new(self.retry.attempts, Duration::from_secs(self.retry.delay_seconds)),
            wakeup: self.wakeup_config()?,
            max_connections: self.limits.max_connections,
        })
    }

    /// Listening address as `host:port`
    pub fn listen_addr(&self) -> String {
        TargetAddress::new(self.listen.host.clone(), self.listen.port).to_string()
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("Invalid value for {}: {}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::config(format!("Invalid boolean for {}: {}", key, value))),
    }
}
