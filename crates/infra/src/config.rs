//! Runtime configuration loaded from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use pettycash_ledger::PolicyWindow;

pub const POLICY_WINDOW_DAYS_VAR: &str = "PETTY_CASH_POLICY_WINDOW_DAYS";
pub const MAX_CONFLICT_RETRIES_VAR: &str = "PETTY_CASH_MAX_CONFLICT_RETRIES";
pub const BIND_ADDR_VAR: &str = "PETTY_CASH_BIND_ADDR";
pub const JWT_SECRET_VAR: &str = "JWT_SECRET";

const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PettyCashConfig {
    /// Age after which an unjustified withdrawal is flagged `not_closed`.
    pub policy_window: PolicyWindow,
    /// Reload-and-reapply attempts after a version conflict.
    pub max_conflict_retries: u32,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
}

impl Default for PettyCashConfig {
    fn default() -> Self {
        Self {
            policy_window: PolicyWindow::default(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
        }
    }
}

impl PettyCashConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (unset keys fall back to defaults).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let policy_window = match lookup(POLICY_WINDOW_DAYS_VAR) {
            None => PolicyWindow::default(),
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|days| PolicyWindow::days(days).ok())
                .ok_or(ConfigError::Invalid {
                    key: POLICY_WINDOW_DAYS_VAR,
                    value: raw,
                })?,
        };

        let max_conflict_retries = match lookup(MAX_CONFLICT_RETRIES_VAR) {
            None => DEFAULT_MAX_CONFLICT_RETRIES,
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                key: MAX_CONFLICT_RETRIES_VAR,
                value: raw.clone(),
            })?,
        };

        let bind_raw = lookup(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.trim().parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            key: BIND_ADDR_VAR,
            value: bind_raw.clone(),
        })?;

        let jwt_secret = match lookup(JWT_SECRET_VAR).filter(|s| !s.trim().is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("{JWT_SECRET_VAR} not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            policy_window,
            max_conflict_retries,
            bind_addr,
            jwt_secret,
        })
    }
}
