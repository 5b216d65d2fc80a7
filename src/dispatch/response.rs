//! SNMPv3 replies: Reports for USM failures and sealed Responses.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::Result;
use crate::message::{ScopedPdu, SecurityLevel, V3Message};
use crate::pdu::{Pdu, PduType};
use crate::v3::{Outgoing, UserKeys, UsmFailure, UsmSecurityParams, seal};
use crate::value::Value;
use crate::varbind::VarBind;

use super::Dispatcher;

impl Dispatcher {
    /// Answer a USM failure with a Report carrying the failure counter.
    ///
    /// Reports are only sent for reportable messages (RFC 3412 section
    /// 7.1). They go out unauthenticated unless `secured` supplies a level
    /// and keys: a notInTimeWindow report must be authenticated so the
    /// manager can trust the clock it carries.
    pub(super) fn report(
        &self,
        incoming: &V3Message,
        params: &UsmSecurityParams,
        failure: UsmFailure,
        secured: Option<(SecurityLevel, &UserKeys)>,
        source: SocketAddr,
    ) -> Result<Option<Bytes>> {
        let count = self.engine.record(failure);
        if !incoming.global_data.msg_flags.reportable {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, %failure }, "not reportable, dropping");
            return Ok(None);
        }

        let (request_id, context_name) = match incoming.scoped_pdu() {
            Some(scoped) => (scoped.pdu.request_id, scoped.context_name.clone()),
            None => (incoming.msg_id(), Bytes::new()),
        };
        let report = ScopedPdu::new(
            self.engine.engine_id().clone(),
            context_name,
            Pdu::new(
                PduType::Report,
                request_id,
                vec![VarBind::new(failure.report_oid(), Value::Counter32(count))],
            ),
        );

        let no_keys = UserKeys::default();
        let (level, keys) = secured.unwrap_or((SecurityLevel::NoAuthNoPriv, &no_keys));
        tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, %failure, count, ?level }, "sending report");
        self.seal_response(incoming, params, level, keys, &report)
            .map(Some)
    }

    /// Seal a reply to `incoming` with this engine as authoritative.
    pub(super) fn seal_response(
        &self,
        incoming: &V3Message,
        params: &UsmSecurityParams,
        level: SecurityLevel,
        keys: &UserKeys,
        scoped: &ScopedPdu,
    ) -> Result<Bytes> {
        let out = Outgoing {
            msg_id: incoming.msg_id(),
            max_size: self.max_message_size.min(i32::MAX as usize) as i32,
            level,
            reportable: false,
            engine_id: self.engine.engine_id(),
            boots: self.engine.boots(),
            time: self.engine.time(),
            user: &params.username,
            keys,
        };
        seal(&out, scoped, self.engine.salt())
    }
}
