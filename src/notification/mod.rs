//! Notification sending (RFC 3413 notification originator).
//!
//! A [`NotificationJob`] names a target, how to secure the message, the
//! trap OID and the payload OIDs. Jobs come from three places:
//!
//! - a `notify` variation firing during a GET or SET, queued by the dispatcher
//! - a timer started with [`NotificationSender::spawn_periodic`]
//! - a direct call to [`NotificationSender::send`]
//!
//! Every v2c/v3 notification starts with `sysUpTime.0` and `snmpTrapOID.0`.
//! Payload values are read through the same store and variation path as
//! requests, with side effects disabled so a notification cannot trigger
//! another one.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use snmp_responder::{ContextRegistry, LoadMode, NotificationJob, NotificationSender, oid};
//! use snmp_responder::notification::{NotifyKind, Security};
//! use snmp_responder::v3::LocalEngine;
//!
//! # async fn example() -> snmp_responder::Result<()> {
//! let registry = Arc::new(ContextRegistry::load("data", LoadMode::Lenient)?);
//! let sender = NotificationSender::builder(registry, Arc::new(LocalEngine::generated()))
//!     .inform_timeout(Duration::from_secs(2))
//!     .build();
//!
//! let job = NotificationJob::new("192.0.2.10:162".parse().unwrap(), Security::v2c("public"))
//!     .kind(NotifyKind::Inform)
//!     .payload([oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)])
//!     .context("public");
//! sender.send(&job).await?;
//! # Ok(())
//! # }
//! ```

mod sender;
mod types;

pub use sender::{DEFAULT_INFORM_TIMEOUT, NotificationSender, NotificationSenderBuilder};
pub use types::{NotificationJob, NotifyKind, Reason, Security, oids};
