// ハイパーバイザ (Proxmox VE) API によるVM/コンテナ起動
//
// 1. GET  {base}/nodes/{node}/{qemu|lxc}/{id}/status/current
// 2. running でなければ POST .../status/start

use super::WakeupProvider;
use crate::common::error::{Error, Result, WakeError};
use crate::common::types::ResourceKind;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::{redirect, Client, Method, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of redirects followed per request
pub const MAX_REDIRECTS: usize = 10;

/// Connection details for one hypervisor guest
#[derive(Clone, PartialEq, Eq)]
pub struct ProxmoxSettings {
    /// API root, e.g. `https://pve.lan:8006/api2/json`
    pub api_url: String,
    pub node: String,
    pub kind: ResourceKind,
    pub resource_id: String,
    /// API token in `USER@REALM!TOKENID=UUID` form
    pub token: String,
    /// Skip TLS certificate validation
    pub insecure: bool,
}

impl fmt::Debug for ProxmoxSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxmoxSettings")
            .field("api_url", &self.api_url)
            .field("node", &self.node)
            .field("kind", &self.kind)
            .field("resource_id", &self.resource_id)
            .field("token", &"<redacted>")
            .field("insecure", &self.insecure)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    data: Option<StatusData>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusData {
    #[serde(default)]
    status: String,
}

/// Trim trailing slashes and refuse to talk plaintext HTTP.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    match trimmed.strip_prefix("http://") {
        Some(rest) => {
            warn!("Hypervisor API URL uses http; upgrading to https so the token is never sent in plaintext");
            format!("https://{}", rest)
        }
        None => trimmed.to_string(),
    }
}

/// Token shape expected by the API
fn token_looks_valid(token: &str) -> bool {
    token.contains('!') && token.contains('=')
}

/// Powers on a VM or container through the hypervisor REST API
#[derive(Debug, Clone)]
pub struct HypervisorPowerOn {
    settings: ProxmoxSettings,
    base_url: String,
    client: Client,
}

impl HypervisorPowerOn {
    pub fn new(settings: ProxmoxSettings) -> Result<Self> {
        let base_url = normalize_base_url(&settings.api_url);

        let client = Client::builder()
            .danger_accept_invalid_certs(settings.insecure)
            .redirect(redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            settings,
            base_url,
            client,
        })
    }

    /// Base URL after normalisation
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of a status endpoint such as `status/current`
    pub fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/nodes/{}/{}/{}/{}",
            self.base_url,
            self.settings.node,
            self.settings.kind.path_segment(),
            self.settings.resource_id,
            action
        )
    }

    fn authorization(&self) -> String {
        format!("PVEAPIToken={}", self.settings.token)
    }

    /// Send one request, following redirects by hand so the authorization
    /// header is present on every hop.
    async fn send(&self, method: Method, url: &str) -> std::result::Result<(StatusCode, String), WakeError> {
        let mut method = method;
        let mut url = Url::parse(url)
            .map_err(|e| WakeError::Transport(format!("Invalid request URL {}: {}", url, e)))?;
        let mut redirects = 0;

        loop {
            info!("Hypervisor request: {} {}", method, url);

            let response = self
                .client
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, self.authorization())
                .send()
                .await?;
            let status = response.status();

            if !status.is_redirection() {
                let body = response.text().await?;
                return Ok((status, body));
            }

            redirects += 1;
            if redirects > MAX_REDIRECTS {
                return Err(WakeError::TooManyRedirects(MAX_REDIRECTS));
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| {
                    WakeError::Transport(format!("{} redirect without a Location header", status))
                })?;
            let mut next = url
                .join(location)
                .map_err(|e| WakeError::Transport(format!("Invalid redirect target {}: {}", location, e)))?;
            if next.scheme() == "http" && next.set_scheme("https").is_err() {
                return Err(WakeError::Transport(format!("Cannot upgrade redirect target {}", next)));
            }

            let rewrites_to_get = matches!(
                status,
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
            );
            if rewrites_to_get && method != Method::GET && method != Method::HEAD {
                method = Method::GET;
            }

            debug!("Following {} redirect to {}", status, next);
            url = next;
        }
    }

    /// Current power state reported by the API (e.g. `running`, `stopped`)
    pub async fn current_status(&self) -> std::result::Result<String, WakeError> {
        let (status, body) = self.send(Method::GET, &self.endpoint("status/current")).await?;
        if !status.is_success() {
            return Err(WakeError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: StatusResponse = serde_json::from_str(&body)
            .map_err(|e| WakeError::MalformedResponse(format!("Failed to parse status JSON: {}", e)))?;
        Ok(parsed.data.map(|d| d.status).unwrap_or_default())
    }

    async fn start(&self) -> std::result::Result<(), WakeError> {
        if !token_looks_valid(&self.settings.token) {
            warn!("Hypervisor token format looks incorrect. Expected 'USER@REALM!TOKENID=UUID'");
        }

        let (status, body) = self.send(Method::POST, &self.endpoint("status/start")).await?;
        if !status.is_success() {
            return Err(WakeError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        info!("Hypervisor start accepted: {}", body.trim());
        Ok(())
    }
}

#[async_trait]
impl WakeupProvider for HypervisorPowerOn {
    async fn wake(&self) -> std::result::Result<(), WakeError> {
        let state = self.current_status().await?;
        info!(
            "Current state of {} {} on {}: {}",
            self.settings.kind, self.settings.resource_id, self.settings.node, state
        );

        if state == "running" {
            info!("Guest is already running; skipping start");
            return Ok(());
        }

        self.start().await
    }

    fn name(&self) -> &'static str {
        "proxmox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_url: &str, kind: ResourceKind) -> ProxmoxSettings {
        ProxmoxSettings {
            api_url: api_url.to_string(),
            node: "pve1".to_string(),
            kind,
            resource_id: "100".to_string(),
            token: "root@pam!wake=secret".to_string(),
            insecure: false,
        }
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://pve:8006/api2/json/"), "https://pve:8006/api2/json");
        assert_eq!(normalize_base_url("http://pve:8006/api2/json"), "https://pve:8006/api2/json");
        assert_eq!(normalize_base_url("https://pve"), "https://pve");
    }

    #[test]
    fn test_endpoint_paths() {
        let vm = HypervisorPowerOn::new(settings("http://pve:8006/api2/json/", ResourceKind::Vm)).unwrap();
        assert_eq!(
            vm.endpoint("status/current"),
            "https://pve:8006/api2/json/nodes/pve1/qemu/100/status/current"
        );

        let ct = HypervisorPowerOn::new(settings("https://pve:8006/api2/json", ResourceKind::Container)).unwrap();
        assert_eq!(
            ct.endpoint("status/start"),
            "https://pve:8006/api2/json/nodes/pve1/lxc/100/status/start"
        );
    }

    #[test]
    fn test_token_shape() {
        assert!(token_looks_valid("root@pam!wake=1234"));
        assert!(!token_looks_valid("plain-token"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", settings("https://pve", ResourceKind::Vm));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_status_response_parsing() {
        let parsed: StatusResponse = serde_json::from_str(r#"{"data":{"status":"stopped","vmid":100}}"#).unwrap();
        assert_eq!(parsed.data.unwrap().status, "stopped");

        let empty: StatusResponse = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(empty.data.is_none());

        assert!(serde_json::from_str::<StatusResponse>("<html>").is_err());
    }
}
