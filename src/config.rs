//! Responder configuration.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::notification::DEFAULT_INFORM_TIMEOUT;
use crate::store::LoadMode;
use crate::util::hex;
use crate::v3::{LocalEngine, UsmUser};

/// Default maximum message size: Ethernet MTU minus IP/UDP headers.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1472;

/// Smallest message size every SNMP entity must accept (RFC 3417).
pub const MIN_MESSAGE_SIZE: usize = 484;

/// Largest UDP payload over IPv4.
pub const MAX_MESSAGE_SIZE: usize = 65507;

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Everything needed to start a [`Responder`](crate::Responder).
///
/// ```
/// use snmp_responder::ResponderConfig;
///
/// let config = ResponderConfig {
///     endpoints: vec!["127.0.0.1:1161".parse().unwrap()],
///     ..ResponderConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub endpoints: Vec<SocketAddr>,
    /// Directory scanned recursively for `*.snmprec` files.
    pub data_dir: PathBuf,
    pub load_mode: LoadMode,
    pub users: Vec<UsmUser>,
    /// Hex engine id. Generated when absent.
    pub engine_id: Option<String>,
    /// Context served for an empty v3 context name.
    pub default_context: String,
    pub max_message_size: usize,
    pub inform_timeout: Duration,
    pub shutdown_grace: Duration,
    pub queue_depth: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![SocketAddr::from(([127, 0, 0, 1], 1161))],
            data_dir: PathBuf::from("data"),
            load_mode: LoadMode::default(),
            users: Vec::new(),
            engine_id: None,
            default_context: "public".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            inform_timeout: DEFAULT_INFORM_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl ResponderConfig {
    /// Check the configuration without touching the network or disk.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::config("at least one endpoint is required"));
        }
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.port() != 0 && !seen.insert(endpoint) {
                return Err(Error::config(format!("endpoint {endpoint} listed twice")));
            }
        }

        if !(MIN_MESSAGE_SIZE..=MAX_MESSAGE_SIZE).contains(&self.max_message_size) {
            return Err(Error::config(format!(
                "max message size {} outside {MIN_MESSAGE_SIZE}..={MAX_MESSAGE_SIZE}",
                self.max_message_size
            )));
        }
        if self.queue_depth == 0 {
            return Err(Error::config("notification queue depth must be positive"));
        }
        if self.inform_timeout.is_zero() {
            return Err(Error::config("inform timeout must be positive"));
        }

        self.engine()?;

        let mut names = HashSet::new();
        for user in &self.users {
            let name = String::from_utf8_lossy(&user.name);
            if user.name.is_empty() {
                return Err(Error::config("v3 user name is empty"));
            }
            if !names.insert(user.name.clone()) {
                return Err(Error::config(format!("v3 user '{name}' configured twice")));
            }
            if user.privacy.is_some() && user.auth.is_none() {
                return Err(Error::config(format!(
                    "v3 user '{name}' has privacy without authentication"
                )));
            }
        }
        Ok(())
    }

    /// The local engine: the configured id, or a generated one.
    pub fn engine(&self) -> Result<LocalEngine> {
        let Some(text) = &self.engine_id else {
            return Ok(LocalEngine::generated());
        };
        let id = hex::decode(text)
            .map_err(|e| Error::config(format!("engine id '{text}': {e}")))?;
        // RFC 3411 SnmpEngineID is 5 to 32 octets.
        if !(5..=32).contains(&id.len()) {
            return Err(Error::config(format!(
                "engine id must be 5 to 32 octets, got {}",
                id.len()
            )));
        }
        Ok(LocalEngine::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v3::{AuthProtocol, PrivProtocol};

    fn config_err(config: &ResponderConfig) -> String {
        match *config.validate().unwrap_err() {
            Error::Config(msg) => msg.into_string(),
            other => panic!("expected config error, got {other}"),
        }
    }

    #[test]
    fn default_is_valid() {
        ResponderConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_sizes_and_endpoints() {
        let config = ResponderConfig {
            endpoints: Vec::new(),
            ..Default::default()
        };
        assert!(config_err(&config).contains("endpoint"));

        let addr: SocketAddr = "127.0.0.1:1161".parse().unwrap();
        let config = ResponderConfig {
            endpoints: vec![addr, addr],
            ..Default::default()
        };
        assert!(config_err(&config).contains("twice"));

        let config = ResponderConfig {
            max_message_size: 100,
            ..Default::default()
        };
        assert!(config_err(&config).contains("max message size"));

        let config = ResponderConfig {
            queue_depth: 0,
            ..Default::default()
        };
        assert!(config_err(&config).contains("queue"));
    }

    #[test]
    fn ephemeral_endpoints_may_repeat() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ResponderConfig {
            endpoints: vec![addr, addr],
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn engine_id_parsing() {
        let config = ResponderConfig {
            engine_id: Some("80001f8805c0ffee".into()),
            ..Default::default()
        };
        assert_eq!(config.engine().unwrap().engine_id().as_ref(), &[0x80, 0x00, 0x1f, 0x88, 0x05, 0xc0, 0xff, 0xee]);

        let config = ResponderConfig {
            engine_id: Some("8000".into()),
            ..Default::default()
        };
        assert!(config_err(&config).contains("5 to 32"));

        let config = ResponderConfig {
            engine_id: Some("zz".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn user_checks() {
        let mut privacy_only = UsmUser::new("eve");
        privacy_only.privacy = Some((PrivProtocol::Aes128, "secret".into()));
        let config = ResponderConfig {
            users: vec![privacy_only],
            ..Default::default()
        };
        assert!(config_err(&config).contains("without authentication"));

        let user = UsmUser::new("simulator").with_auth(AuthProtocol::Sha1, "auctoritas");
        let config = ResponderConfig {
            users: vec![user.clone(), user],
            ..Default::default()
        };
        assert!(config_err(&config).contains("twice"));
    }
}
