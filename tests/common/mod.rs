//! Shared test infrastructure for snmp-responder.
//!
//! Provides TestResponder (in-process responder), a raw UDP client built on
//! the crate's codec, and record fixtures.

// Not every test file uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod client;
pub mod fixtures;
pub mod responder;

pub use client::TestClient;
pub use fixtures::{
    ENGINE_ID, if_in_octets, ifdescr_column, interfaces_subtree, monitor, nonexistent_oid, records,
    sys_descr, sys_location, sys_name, sys_uptime, system_subtree, user,
};
pub use responder::{TestResponder, TestResponderBuilder};
