//! Notification jobs and the well-known OIDs their payload starts with.

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::oid::Oid;
use crate::version::Version;

/// Well-known notification OIDs (RFC 3418).
pub mod oids {
    use crate::oid;
    use crate::oid::Oid;

    /// sysUpTime.0
    pub fn sys_uptime() -> Oid {
        oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
    }

    /// snmpTrapOID.0
    pub fn snmp_trap_oid() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
    }

    /// snmpTraps.1
    pub fn cold_start() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1)
    }

    /// snmpTraps.2
    pub fn warm_start() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 2)
    }
}

/// Unconfirmed or confirmed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyKind {
    #[default]
    Trap,
    Inform,
}

impl fmt::Display for NotifyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trap => "trap",
            Self::Inform => "inform",
        })
    }
}

impl std::str::FromStr for NotifyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trap" => Ok(Self::Trap),
            "inform" => Ok(Self::Inform),
            _ => Err(format!("unknown notification kind '{s}'")),
        }
    }
}

/// How a job is secured on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Security {
    Community { version: Version, community: Bytes },
    /// A configured v3 user, sent at the highest level its keys allow.
    Usm { user: Bytes },
}

impl Security {
    pub fn v2c(community: impl Into<Bytes>) -> Self {
        Self::Community {
            version: Version::V2c,
            community: community.into(),
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Self::Community { version, .. } => *version,
            Self::Usm { .. } => Version::V3,
        }
    }
}

/// What caused a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Timer,
    Read { oid: Oid },
    Write { oid: Oid },
    Explicit,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer => f.write_str("timer"),
            Self::Read { oid } => write!(f, "read of {oid}"),
            Self::Write { oid } => write!(f, "write of {oid}"),
            Self::Explicit => f.write_str("explicit"),
        }
    }
}

/// A pending notification. Consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationJob {
    pub target: SocketAddr,
    pub security: Security,
    pub kind: NotifyKind,
    pub trap_oid: Oid,
    /// Resolved through `context` into the varbinds after the two
    /// mandatory ones.
    pub payload: Vec<Oid>,
    pub context: Option<String>,
    pub reason: Reason,
}

impl NotificationJob {
    /// An explicit v2c coldStart trap with no payload.
    pub fn new(target: SocketAddr, security: Security) -> Self {
        Self {
            target,
            security,
            kind: NotifyKind::Trap,
            trap_oid: oids::cold_start(),
            payload: Vec::new(),
            context: None,
            reason: Reason::Explicit,
        }
    }

    pub fn kind(mut self, kind: NotifyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn trap_oid(mut self, trap_oid: Oid) -> Self {
        self.trap_oid = trap_oid;
        self
    }

    pub fn payload(mut self, payload: impl IntoIterator<Item = Oid>) -> Self {
        self.payload = payload.into_iter().collect();
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn reason(mut self, reason: Reason) -> Self {
        self.reason = reason;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let target: SocketAddr = "127.0.0.1:162".parse().unwrap();
        let job = NotificationJob::new(target, Security::v2c("public"));
        assert_eq!(job.kind, NotifyKind::Trap);
        assert_eq!(job.trap_oid, oids::cold_start());
        assert_eq!(job.security.version(), Version::V2c);
        assert_eq!(job.reason, Reason::Explicit);

        let job = job
            .kind(NotifyKind::Inform)
            .payload([oids::sys_uptime()])
            .context("public");
        assert_eq!(job.payload.len(), 1);
        assert_eq!(job.context.as_deref(), Some("public"));
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("INFORM".parse::<NotifyKind>().unwrap(), NotifyKind::Inform);
        assert!("pigeon".parse::<NotifyKind>().is_err());
    }
}
