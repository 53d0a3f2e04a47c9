//! Process configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use forgeship_shipments::ShopShippingOptions;

pub const LABEL_DIR_VAR: &str = "FORGESHIP_LABEL_DIR";
pub const BIND_ADDR_VAR: &str = "FORGESHIP_BIND_ADDR";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const COD_MODULE_VAR: &str = "FORGESHIP_COD_MODULE";
pub const LABEL_PREFIX_VAR: &str = "FORGESHIP_LABEL_PREFIX";
pub const SWEEP_INTERVAL_VAR: &str = "FORGESHIP_SWEEP_INTERVAL_SECS";

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingConfig {
    /// Root directory of the label blob store.
    pub label_dir: PathBuf,
    pub bind_addr: String,
    /// In-memory repositories are used when absent.
    pub database_url: Option<String>,
    /// Payment module treated as cash on delivery, for shops without their own setting.
    pub cod_module: Option<String>,
    pub label_prefix: Option<String>,
    /// Seconds between orphan label sweeps; 0 turns the background sweep off.
    pub sweep_interval_secs: u64,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            label_dir: PathBuf::from("var/labels"),
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            cod_module: None,
            label_prefix: None,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ShippingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let label_dir = get(LABEL_DIR_VAR).map(PathBuf::from).unwrap_or_else(|| {
            warn!(
                "{LABEL_DIR_VAR} not set; storing labels under {}",
                defaults.label_dir.display()
            );
            defaults.label_dir.clone()
        });
        let bind_addr = get(BIND_ADDR_VAR).unwrap_or_else(|| defaults.bind_addr.clone());
        let database_url = get(DATABASE_URL_VAR);
        if database_url.is_none() {
            warn!("{DATABASE_URL_VAR} not set; using in-memory repositories");
        }

        let sweep_interval_secs = match get(SWEEP_INTERVAL_VAR) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(
                    "{SWEEP_INTERVAL_VAR}={raw} is not a number of seconds; using {}",
                    defaults.sweep_interval_secs
                );
                defaults.sweep_interval_secs
            }),
            None => defaults.sweep_interval_secs,
        };

        Self {
            label_dir,
            bind_addr,
            database_url,
            cod_module: get(COD_MODULE_VAR),
            label_prefix: get(LABEL_PREFIX_VAR),
            sweep_interval_secs,
        }
    }

    /// `None` when the background sweep is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Shipping options of shops that have none of their own.
    pub fn default_options(&self) -> ShopShippingOptions {
        ShopShippingOptions {
            cod_module: self.cod_module.clone(),
            label_prefix: self.label_prefix.clone(),
            ..Default::default()
        }
    }
}
