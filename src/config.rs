//! Runtime configuration, read once at startup.
//!
//! Every value comes from the environment (optionally via a `.env` file
//! loaded in `main`). The resulting [`Config`] is immutable and handed to
//! each component constructor; request-handling code never reaches back
//! into the process environment.

use figment::{Figment, providers::Env};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// SQL endpoint, e.g. `myserver.database.windows.net` or `host,1433`.
    #[serde(default)]
    pub sql_server: Option<String>,
    #[serde(default)]
    pub sql_database: Option<String>,
    /// Authentication mode selector; only `entra` is supported.
    #[serde(default = "default_auth_mode")]
    pub sql_auth_mode: String,

    /// Listen address for the HTTP server.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Fallback log filter when `RUST_LOG` is unset.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Timeout for caller-directed outbound HTTP fetches.
    #[serde(default = "default_outbound_timeout")]
    pub outbound_timeout_secs: u64,
    /// Timeout for a single DNS query.
    #[serde(default = "default_dns_timeout")]
    pub dns_timeout_secs: u64,
    /// Timeout covering TCP connect + TDS handshake.
    #[serde(default = "default_db_connect_timeout")]
    pub db_connect_timeout_secs: u64,
    /// Timeout for executing one statement.
    #[serde(default = "default_db_query_timeout")]
    pub db_query_timeout_secs: u64,

    // Identity-chain settings, captured here so the chain never consults
    // the environment after startup.
    #[serde(default)]
    pub azure_tenant_id: Option<String>,
    #[serde(default)]
    pub azure_client_id: Option<String>,
    #[serde(default)]
    pub azure_client_secret: Option<String>,
    /// App-Service managed-identity endpoint, when the platform injects one.
    #[serde(default)]
    pub identity_endpoint: Option<String>,
    #[serde(default)]
    pub identity_header: Option<String>,
}

fn default_auth_mode() -> String {
    "entra".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_outbound_timeout() -> u64 {
    5
}

fn default_dns_timeout() -> u64 {
    5
}

fn default_db_connect_timeout() -> u64 {
    15
}

fn default_db_query_timeout() -> u64 {
    15
}

impl Config {
    /// Extract the configuration from the process environment.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new().merge(Env::raw()).extract()
    }

    pub fn entra_auth(&self) -> bool {
        self.sql_auth_mode.eq_ignore_ascii_case("entra")
    }
}

impl Default for Config {
    fn default() -> Self {
        Figment::new()
            .extract()
            .expect("default Config must deserialize from an empty figment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = Config::default();
        assert_eq!(cfg.listen, "0.0.0.0:8000");
        assert_eq!(cfg.sql_auth_mode, "entra");
        assert!(cfg.entra_auth());
        assert_eq!(cfg.outbound_timeout_secs, 5);
        assert_eq!(cfg.db_connect_timeout_secs, 15);
        assert!(cfg.sql_server.is_none());
        assert!(cfg.sql_database.is_none());
    }

    #[test]
    fn environment_overrides_are_picked_up() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SQL_SERVER", "db.example.net");
            jail.set_env("SQL_DATABASE", "diagnostics");
            jail.set_env("SQL_AUTH_MODE", "ENTRA");
            jail.set_env("OUTBOUND_TIMEOUT_SECS", "9");
            let cfg: Config = Figment::new()
                .merge(Env::raw())
                .extract()
                .expect("config should extract");
            assert_eq!(cfg.sql_server.as_deref(), Some("db.example.net"));
            assert_eq!(cfg.sql_database.as_deref(), Some("diagnostics"));
            assert!(cfg.entra_auth());
            assert_eq!(cfg.outbound_timeout_secs, 9);
            Ok(())
        });
    }
}
