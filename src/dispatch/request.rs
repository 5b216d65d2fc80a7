//! SNMPv3 request path: USM checks, then the shared dispatch.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::Result;
use crate::message::{ScopedPdu, SecurityLevel, V3Message};
use crate::v3::{self, UsmFailure, UsmSecurityParams};
use crate::version::Version;

use super::Dispatcher;

impl Dispatcher {
    /// Handle a v3 message. Checks run in RFC 3414 section 3.2 order and the
    /// first failure answers with a Report.
    pub(super) fn handle_v3(
        &self,
        raw: &Bytes,
        message: V3Message,
        source: SocketAddr,
    ) -> Result<Option<Bytes>> {
        let params = UsmSecurityParams::decode(message.security_params.clone())?;

        if params.engine_id.is_empty() {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source }, "engine discovery request");
            return self.report(&message, &params, UsmFailure::UnknownEngineId, None, source);
        }
        if params.engine_id != *self.engine.engine_id() {
            return self.report(&message, &params, UsmFailure::UnknownEngineId, None, source);
        }

        let Some(keys) = self.users.get(&params.username) else {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, snmp.user = %String::from_utf8_lossy(&params.username) }, "unknown user");
            return self.report(&message, &params, UsmFailure::UnknownUserName, None, source);
        };

        // A user is served only at the level its keys were configured for.
        let level = message.security_level();
        if level < keys.max_level() {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, ?level, required = ?keys.max_level() }, "security level below the user's");
            return self.report(&message, &params, UsmFailure::UnsupportedSecLevel, None, source);
        }

        if let Err(failure) = v3::verify(raw, &message, &params, keys) {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, %failure }, "USM check failed");
            return self.report(&message, &params, failure, None, source);
        }

        // Timeliness is judged before decryption (RFC 3414 section 3.2 step 7).
        if level.requires_auth()
            && !self
                .engine
                .is_in_time_window(params.engine_boots, params.engine_time)
        {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, boots = params.engine_boots, time = params.engine_time }, "message outside time window");
            return self.report(
                &message,
                &params,
                UsmFailure::NotInTimeWindow,
                Some((SecurityLevel::AuthNoPriv, keys)),
                source,
            );
        }

        let scoped = match v3::decrypt(&message, &params, keys) {
            Ok(scoped) => scoped,
            Err(failure) => {
                tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, %failure }, "USM check failed");
                return self.report(&message, &params, failure, None, source);
            }
        };

        let Ok(store) = self.registry.resolve_v3_context(&scoped.context_name) else {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, snmp.context = %String::from_utf8_lossy(&scoped.context_name) }, "unknown context");
            return self.report(
                &message,
                &params,
                UsmFailure::UnknownContext,
                Some((level, keys)),
                source,
            );
        };

        if !scoped.pdu.is_request() {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, snmp.pdu_type = %scoped.pdu.pdu_type }, "ignoring non-request PDU");
            return Ok(None);
        }

        let context = if scoped.context_name.is_empty() {
            String::from_utf8_lossy(self.registry.default_context()).into_owned()
        } else {
            String::from_utf8_lossy(&scoped.context_name).into_owned()
        };
        let max_size = self
            .max_message_size
            .min(message.global_data.msg_max_size.max(0) as usize);
        let response = self.dispatch(store, &context, Version::V3, &scoped.pdu, source, max_size);

        let reply = ScopedPdu::new(
            self.engine.engine_id().clone(),
            scoped.context_name.clone(),
            response,
        );
        let bytes = self.seal_response(&message, &params, level, keys, &reply)?;
        if bytes.len() <= max_size {
            return Ok(Some(bytes));
        }

        tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, size = bytes.len() }, "response exceeds message size");
        let reply = ScopedPdu::new(
            self.engine.engine_id().clone(),
            scoped.context_name,
            super::too_big(&scoped.pdu),
        );
        self.seal_response(&message, &params, level, keys, &reply).map(Some)
    }
}
