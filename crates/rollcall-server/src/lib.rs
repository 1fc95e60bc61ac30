//! Server configuration and wiring for the `rollcall` binary.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use rollcall_api::{AppState, Backend};
use rollcall_core::codec::PayloadKey;
use rollcall_session::{issuer::IssuerConfig, qr::DEFAULT_MODULE_PX};
use serde::Deserialize;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROLLCALL_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  /// Department the presentation screen operates in.
  pub department:           String,
  #[serde(default = "default_rotation_interval_ms")]
  pub rotation_interval_ms: u64,
  #[serde(default = "default_qr_module_px")]
  pub qr_module_px:         u32,
  /// Enables signed payloads when set.
  #[serde(default)]
  pub payload_secret:       Option<String>,
  /// Sign payloads even without `payload_secret`, using a random key that
  /// lives only as long as the process.
  #[serde(default)]
  pub sign_payloads:        bool,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 5240 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/rollcall/ledger.db") }

fn default_rotation_interval_ms() -> u64 { 3000 }

fn default_qr_module_px() -> u32 { DEFAULT_MODULE_PX }

impl ServerConfig {
  pub fn issuer_config(&self) -> anyhow::Result<IssuerConfig> {
    anyhow::ensure!(
      !self.department.trim().is_empty(),
      "department must not be empty"
    );
    anyhow::ensure!(
      self.rotation_interval_ms > 0,
      "rotation_interval_ms must be positive"
    );

    let signing_key = match self.payload_secret.as_deref() {
      Some(secret) => Some(PayloadKey::new(secret).context("invalid payload_secret")?),
      None if self.sign_payloads => {
        tracing::warn!("no payload_secret set; signing with a per-process key");
        Some(PayloadKey::generate().context("failed to generate payload key")?)
      }
      None => None,
    };

    let mut config = IssuerConfig::new(self.department.trim());
    config.rotation_interval = Duration::from_millis(self.rotation_interval_ms);
    config.signing_key = signing_key;
    Ok(config)
  }

  /// Build handler state over `store`.
  pub fn app_state<S: Backend>(&self, store: Arc<S>) -> anyhow::Result<AppState<S>> {
    Ok(AppState::new(store, self.issuer_config()?).with_qr_module_px(self.qr_module_px))
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
