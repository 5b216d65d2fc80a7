//! Command-line support for the `snmp-responder` binary.

pub mod args;
