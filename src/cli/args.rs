//! Command-line arguments for `snmp-responder`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_QUEUE_DEPTH, ResponderConfig,
};
use crate::store::LoadMode;
use crate::v3::{AuthProtocol, PrivProtocol, UsmUser};

/// Answer SNMP requests from recorded device snapshots.
#[derive(Debug, Parser)]
#[command(name = "snmp-responder", version, about)]
pub struct Args {
    /// UDP endpoint to serve; repeat for several.
    #[arg(short = 'l', long = "listen", value_name = "ADDR", default_value = "127.0.0.1:1161")]
    pub endpoints: Vec<SocketAddr>,

    /// Directory scanned recursively for *.snmprec files.
    #[arg(long = "data-dir", value_name = "DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// How unparseable record lines are treated: lenient or strict.
    #[arg(long = "load-mode", default_value = "lenient")]
    pub load_mode: LoadMode,

    /// SNMPv3 user as name[:authproto:authpass[:privproto:privpass]].
    #[arg(long = "v3-user", value_name = "USER", value_parser = parse_user)]
    pub users: Vec<UsmUser>,

    /// SNMPv3 engine id in hex. Generated when omitted.
    #[arg(long = "engine-id", value_name = "HEX")]
    pub engine_id: Option<String>,

    /// Context served for an empty SNMPv3 context name.
    #[arg(long = "default-context", default_value = "public")]
    pub default_context: String,

    /// Largest response message in bytes.
    #[arg(long = "max-message-size", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,

    /// Seconds an inform waits for its acknowledgement.
    #[arg(long = "inform-timeout", default_value = "5")]
    pub inform_timeout: f64,

    /// Seconds to wait for tasks after a shutdown signal.
    #[arg(long = "shutdown-grace", default_value = "5")]
    pub shutdown_grace: f64,

    /// Capacity of the notification queue.
    #[arg(long = "queue-depth", default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Enable debug logging (snmp_responder=debug).
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Enable trace logging (snmp_responder=trace).
    #[arg(short = 'D', long = "trace")]
    pub trace: bool,
}

impl Args {
    pub fn config(&self) -> Result<ResponderConfig, String> {
        Ok(ResponderConfig {
            endpoints: self.endpoints.clone(),
            data_dir: self.data_dir.clone(),
            load_mode: self.load_mode,
            users: self.users.clone(),
            engine_id: self.engine_id.clone(),
            default_context: self.default_context.clone(),
            max_message_size: self.max_message_size,
            inform_timeout: seconds("inform timeout", self.inform_timeout)?,
            shutdown_grace: seconds("shutdown grace", self.shutdown_grace)?,
            queue_depth: self.queue_depth,
        })
    }

    /// Initialize tracing from the debug/trace flags. `RUST_LOG` wins when
    /// set.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = if self.trace {
            "snmp_responder=trace"
        } else if self.debug {
            "snmp_responder=debug"
        } else {
            "snmp_responder=warn"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

fn seconds(what: &str, value: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(value).map_err(|_| format!("{what} '{value}' is not a valid number of seconds"))
}

/// Parse `name[:authproto:authpass[:privproto:privpass]]`. The privacy
/// password may itself contain `:`.
pub fn parse_user(s: &str) -> Result<UsmUser, String> {
    let mut parts = s.splitn(5, ':');
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err("v3 user name is empty".into());
    }
    let mut user = UsmUser::new(name.to_string());

    match (parts.next(), parts.next()) {
        (None, _) => return Ok(user),
        (Some(proto), Some(pass)) if !pass.is_empty() => {
            let proto: AuthProtocol = proto.parse().map_err(|e| format!("{e}"))?;
            user = user.with_auth(proto, pass.to_string());
        }
        _ => return Err(format!("v3 user '{name}': expected name:authproto:authpass")),
    }

    match (parts.next(), parts.next()) {
        (None, _) => Ok(user),
        (Some(proto), Some(pass)) if !pass.is_empty() => {
            let proto: PrivProtocol = proto.parse().map_err(|e| format!("{e}"))?;
            Ok(user.with_privacy(proto, pass.to_string()))
        }
        _ => Err(format!("v3 user '{name}': expected ...:privproto:privpass")),
    }
}
