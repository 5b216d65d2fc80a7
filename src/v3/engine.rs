//! Local and remote SNMP engine state (RFC 3414 Section 2-4).
//!
//! The responder is authoritative for requests it receives, so it owns one
//! [`LocalEngine`]: an engine id, a boots counter and a clock started at
//! construction. Requests outside the 150 second window around that clock
//! are answered with a `usmStatsNotInTimeWindows` report.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use bytes::Bytes;

use super::{SaltCounter, UsmSecurityParams};
use crate::oid::Oid;

/// Time window in seconds.
pub const TIME_WINDOW: u32 = 150;

/// snmpEngineTime and snmpEngineBoots are capped here (RFC 3414 2.2.2).
pub(crate) const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// Report varbind OIDs.
pub mod report_oids {
    use crate::oid;
    use crate::oid::Oid;

    pub fn unsupported_sec_levels() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0)
    }

    pub fn not_in_time_windows() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0)
    }

    pub fn unknown_user_names() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0)
    }

    pub fn unknown_engine_ids() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0)
    }

    pub fn wrong_digests() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0)
    }

    pub fn decryption_errors() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0)
    }

    pub fn unknown_contexts() -> Oid {
        oid!(1, 3, 6, 1, 6, 3, 12, 1, 5, 0)
    }
}

/// Why an inbound v3 message was refused. Each maps to one report OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsmFailure {
    UnsupportedSecLevel,
    NotInTimeWindow,
    UnknownUserName,
    UnknownEngineId,
    WrongDigest,
    DecryptionError,
    UnknownContext,
}

impl UsmFailure {
    const ALL: usize = 7;

    fn index(self) -> usize {
        self as usize
    }

    pub fn report_oid(self) -> Oid {
        match self {
            Self::UnsupportedSecLevel => report_oids::unsupported_sec_levels(),
            Self::NotInTimeWindow => report_oids::not_in_time_windows(),
            Self::UnknownUserName => report_oids::unknown_user_names(),
            Self::UnknownEngineId => report_oids::unknown_engine_ids(),
            Self::WrongDigest => report_oids::wrong_digests(),
            Self::DecryptionError => report_oids::decryption_errors(),
            Self::UnknownContext => report_oids::unknown_contexts(),
        }
    }

    /// Which failure a received Report names, if any.
    pub fn from_report_oid(oid: &Oid) -> Option<Self> {
        [
            Self::UnsupportedSecLevel,
            Self::NotInTimeWindow,
            Self::UnknownUserName,
            Self::UnknownEngineId,
            Self::WrongDigest,
            Self::DecryptionError,
            Self::UnknownContext,
        ]
        .into_iter()
        .find(|failure| failure.report_oid() == *oid)
    }
}

impl std::fmt::Display for UsmFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UnsupportedSecLevel => "unsupported security level",
            Self::NotInTimeWindow => "not in time window",
            Self::UnknownUserName => "unknown user name",
            Self::UnknownEngineId => "unknown engine id",
            Self::WrongDigest => "wrong digest",
            Self::DecryptionError => "decryption error",
            Self::UnknownContext => "unknown context",
        })
    }
}

/// This process's authoritative engine.
#[derive(Debug)]
pub struct LocalEngine {
    engine_id: Bytes,
    boots: u32,
    started: Instant,
    salt: SaltCounter,
    failures: [AtomicU32; UsmFailure::ALL],
}

impl LocalEngine {
    pub fn new(engine_id: impl Into<Bytes>) -> Self {
        Self {
            engine_id: engine_id.into(),
            boots: 1,
            started: Instant::now(),
            salt: SaltCounter::new(),
            failures: Default::default(),
        }
    }

    /// Engine with a generated id: the net-snmp enterprise prefix, format
    /// "octets", then eight random bytes.
    pub fn generated() -> Self {
        let mut id = vec![0x80, 0x00, 0x1F, 0x88, 0x05];
        let mut random = [0u8; 8];
        if getrandom::fill(&mut random).is_err() {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default();
            random = nanos.to_be_bytes();
        }
        id.extend_from_slice(&random);
        Self::new(id)
    }

    pub fn engine_id(&self) -> &Bytes {
        &self.engine_id
    }

    pub fn boots(&self) -> u32 {
        self.boots
    }

    /// Seconds since this engine started.
    pub fn time(&self) -> u32 {
        self.started.elapsed().as_secs().min(MAX_ENGINE_TIME as u64) as u32
    }

    pub(crate) fn salt(&self) -> &SaltCounter {
        &self.salt
    }

    pub fn is_in_time_window(&self, msg_boots: u32, msg_time: u32) -> bool {
        self.boots != MAX_ENGINE_TIME
            && msg_boots == self.boots
            && msg_time.abs_diff(self.time()) <= TIME_WINDOW
    }

    /// Count a failure and return the new counter value for the report.
    pub(crate) fn record(&self, failure: UsmFailure) -> u32 {
        self.failures[failure.index()]
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
    }

    pub fn failures(&self, failure: UsmFailure) -> u32 {
        self.failures[failure.index()].load(Ordering::Relaxed)
    }
}

/// A peer's authoritative engine, learned by discovery.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    pub engine_id: Bytes,
    pub boots: u32,
    pub time: u32,
    synced_at: Instant,
}

impl RemoteEngine {
    /// Read the engine fields out of a discovery Report's USM parameters.
    /// An empty engine id is not a usable answer.
    pub fn from_report(params: &UsmSecurityParams) -> Option<Self> {
        if params.engine_id.is_empty() {
            return None;
        }
        Some(Self {
            engine_id: params.engine_id.clone(),
            boots: params.engine_boots,
            time: params.engine_time,
            synced_at: Instant::now(),
        })
    }

    /// The peer's clock, advanced by the time since discovery.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = self.synced_at.elapsed().as_secs().min(MAX_ENGINE_TIME as u64) as u32;
        self.time.saturating_add(elapsed).min(MAX_ENGINE_TIME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_window() {
        let engine = LocalEngine::new(Bytes::from_static(b"\x80\x00\x1f\x88\x05test"));
        assert!(engine.is_in_time_window(1, 0));
        assert!(engine.is_in_time_window(1, TIME_WINDOW));
        assert!(!engine.is_in_time_window(1, TIME_WINDOW + 1));
        assert!(!engine.is_in_time_window(2, 0));
    }

    #[test]
    fn generated_ids_differ() {
        let a = LocalEngine::generated();
        let b = LocalEngine::generated();
        assert_eq!(a.engine_id().len(), 13);
        assert_eq!(&a.engine_id()[..5], &[0x80, 0x00, 0x1F, 0x88, 0x05]);
        assert_ne!(a.engine_id(), b.engine_id());
    }

    #[test]
    fn failure_counters() {
        let engine = LocalEngine::generated();
        assert_eq!(engine.record(UsmFailure::WrongDigest), 1);
        assert_eq!(engine.record(UsmFailure::WrongDigest), 2);
        assert_eq!(engine.failures(UsmFailure::WrongDigest), 2);
        assert_eq!(engine.failures(UsmFailure::UnknownUserName), 0);
    }

    #[test]
    fn report_oid_lookup() {
        for failure in [UsmFailure::UnknownEngineId, UsmFailure::UnknownContext] {
            assert_eq!(UsmFailure::from_report_oid(&failure.report_oid()), Some(failure));
        }
        assert_eq!(UsmFailure::from_report_oid(&crate::oid!(1, 3, 6)), None);
    }

    #[test]
    fn remote_engine_needs_id() {
        assert!(RemoteEngine::from_report(&UsmSecurityParams::discovery(b"user")).is_none());
        let params = UsmSecurityParams::new(Bytes::from_static(b"peer"), 4, 99, Bytes::new());
        let remote = RemoteEngine::from_report(&params).unwrap();
        assert_eq!(remote.boots, 4);
        assert!(remote.estimated_time() >= 99);
    }
}
