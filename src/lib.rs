//! # snmp-responder
//!
//! An SNMP responder that simulates network devices from recorded MIB
//! snapshots.
//!
//! ## Features
//!
//! - SNMPv1, v2c and v3 (USM with MD5/SHA-1/SHA-2 and DES/AES)
//! - One store per community or v3 context, loaded from `*.snmprec` files
//! - GET, GETNEXT, GETBULK and atomic SET against a per-store write overlay
//! - Variations: counters, uptime, write caches, persisted values and
//!   notification triggers
//! - Trap and inform sending from the same object space
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snmp_responder::{Responder, ResponderConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<snmp_responder::Error>> {
//!     let responder = Responder::from_config(&ResponderConfig {
//!         endpoints: vec!["0.0.0.0:1161".parse().unwrap()],
//!         data_dir: "data".into(),
//!         ..ResponderConfig::default()
//!     })?;
//!
//!     let cancel = responder.cancel();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         cancel.cancel();
//!     });
//!     responder.run().await
//! }
//! ```
//!
//! ## Record format
//!
//! One entry per line, `OID|TAG|VALUE[|VARIATION]`:
//!
//! ```text
//! 1.3.6.1.2.1.1.1.0|4|Linux zeus 4.8.6
//! 1.3.6.1.2.1.1.3.0|67|0|uptime
//! 1.3.6.1.2.1.1.6.0|4|SNMPv1 trap sender|writecache
//! 1.3.6.1.2.1.2.2.1.10.1|65|1000|counter:step=250
//! ```

pub mod ber;
pub mod config;
pub mod error;
pub mod message;
pub mod notification;
pub mod oid;
pub mod pdu;
pub mod registry;
pub mod responder;
pub mod store;
pub mod util;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod variation;
pub mod version;

mod dispatch;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::ResponderConfig;
pub use error::{Error, ErrorStatus, Result, TransportFailure};
pub use message::SecurityLevel;
pub use notification::{NotificationJob, NotificationSender};
pub use oid::Oid;
pub use pdu::{GenericTrap, Pdu, PduType, TrapV1Pdu};
pub use registry::ContextRegistry;
pub use responder::{Responder, ResponderBuilder};
pub use store::{Entry, LoadMode, Record, Store};
pub use v3::{AuthProtocol, LocalEngine, ParseProtocolError, PrivProtocol, UsmUser};
pub use value::Value;
pub use varbind::VarBind;
pub use variation::Variation;
pub use version::Version;
