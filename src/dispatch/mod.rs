//! Request dispatcher.
//!
//! Each endpoint runs one task that receives a datagram, decodes it,
//! resolves the request against its context store and sends the response
//! before taking the next datagram. Nothing a peer sends ends the loop:
//! undecodable or unauthorized messages are dropped with a debug event.
//!
//! v1 and v2c requests pick their store by community. v3 requests go
//! through USM first (see `request.rs`) and pick their store by context
//! name.

mod bulk;
mod request;
mod response;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::{Error, ErrorStatus, Result};
use crate::message::{CommunityMessage, Message};
use crate::notification::NotificationJob;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::registry::ContextRegistry;
use crate::store::{ReadView, Slot, Store};
use crate::util::bind_udp_socket;
use crate::v3::{LocalEngine, UserKeys};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::variation::{Operation, ResolveContext};
use crate::version::Version;

/// Encoding overhead reserved around the varbind list when sizing
/// responses (message header, community or USM, PDU header).
pub(crate) const RESPONSE_OVERHEAD: usize = 100;

/// Largest datagram an endpoint reads.
const RECV_BUFFER_SIZE: usize = 65535;

/// State shared by every endpoint.
pub(crate) struct Dispatcher {
    pub(crate) registry: Arc<ContextRegistry>,
    pub(crate) engine: Arc<LocalEngine>,
    /// v3 users, keys localized to `engine`.
    pub(crate) users: HashMap<Bytes, UserKeys>,
    pub(crate) max_message_size: usize,
    pub(crate) notifications: Option<mpsc::Sender<NotificationJob>>,
}

impl Dispatcher {
    /// Handle one datagram. `Ok(None)` means nothing is sent back.
    pub(crate) fn handle(&self, data: Bytes, source: SocketAddr) -> Result<Option<Bytes>> {
        match Message::decode(data.clone(), source)? {
            Message::Community(message) => self.handle_community(message, source),
            Message::V3(message) => self.handle_v3(&data, message, source),
        }
    }

    fn handle_community(
        &self,
        message: CommunityMessage,
        source: SocketAddr,
    ) -> Result<Option<Bytes>> {
        let store = self.registry.resolve(&message.community)?;

        if !message.pdu.is_request() {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, snmp.pdu_type = %message.pdu.pdu_type }, "ignoring non-request PDU");
            return Ok(None);
        }
        if message.version == Version::V1 && message.pdu.pdu_type == PduType::GetBulkRequest {
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source }, "dropping GetBulk in an SNMPv1 message");
            return Ok(None);
        }

        let context = String::from_utf8_lossy(&message.community);
        let response = self.dispatch(
            store,
            &context,
            message.version,
            &message.pdu,
            source,
            self.max_message_size,
        );

        let encode = |pdu: Pdu| CommunityMessage::new(message.version, &message.community, pdu).encode();
        let bytes = encode(response);
        if bytes.len() <= self.max_message_size {
            return Ok(Some(bytes));
        }
        tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, size = bytes.len() }, "response exceeds message size");
        Ok(Some(encode(too_big(&message.pdu))))
    }

    /// Resolve one request PDU against `store` and build its Response.
    pub(crate) fn dispatch(
        &self,
        store: &Store,
        context: &str,
        version: Version,
        pdu: &Pdu,
        source: SocketAddr,
        max_size: usize,
    ) -> Pdu {
        let mut jobs = Vec::new();
        let response = match pdu.pdu_type {
            PduType::GetRequest => {
                let ctx = ResolveContext::new(Operation::Get, context).request(pdu.request_id, source);
                get(&store.read(), &ctx, version, pdu, &mut jobs)
            }
            PduType::GetNextRequest => {
                let ctx = ResolveContext::new(Operation::GetNext, context).request(pdu.request_id, source);
                get_next(&store.read(), &ctx, version, pdu, &mut jobs)
            }
            PduType::GetBulkRequest => {
                let ctx = ResolveContext::new(Operation::GetBulk, context).request(pdu.request_id, source);
                let budget = max_size.saturating_sub(RESPONSE_OVERHEAD);
                bulk::get_bulk(&store.read(), &ctx, pdu, budget, &mut jobs)
            }
            PduType::SetRequest => {
                let ctx = ResolveContext::new(Operation::Set, context).request(pdu.request_id, source);
                set(store, &ctx, version, pdu, &mut jobs)
            }
            PduType::InformRequest => Pdu::response(pdu.request_id, pdu.varbinds.clone()),
            _ => pdu.to_error_response(ErrorStatus::GenErr, 0),
        };

        tracing::trace!(target: "snmp_responder::dispatch", { snmp.source = %source, snmp.context = %context, snmp.pdu_type = %pdu.pdu_type, snmp.request_id = pdu.request_id, snmp.error_status = %response.error_status(), snmp.varbinds = response.varbinds.len() }, "request resolved");
        self.enqueue(jobs);
        response
    }

    fn enqueue(&self, jobs: Vec<NotificationJob>) {
        let Some(queue) = &self.notifications else {
            return;
        };
        for job in jobs {
            match queue.try_send(job) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(job)) => {
                    tracing::warn!(target: "snmp_responder::dispatch", { snmp.target = %job.target, reason = %job.reason }, "notification queue full, dropping job");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(target: "snmp_responder::dispatch", "notification queue closed");
                }
            }
        }
    }
}

/// tooBig with an empty varbind list, which always fits.
fn too_big(request: &Pdu) -> Pdu {
    Pdu {
        varbinds: Vec::new(),
        ..request.to_error_response(ErrorStatus::TooBig, 0)
    }
}

/// The v2 exception for a GET miss: noSuchInstance when the object has
/// recorded instances, noSuchObject otherwise.
fn missing(view: &ReadView<'_>, oid: &Oid) -> Value {
    match oid.parent() {
        Some(parent) if view.has_children(&parent) => Value::NoSuchInstance,
        _ => Value::NoSuchObject,
    }
}

/// Successor of `oid`. SNMPv1 cannot carry Counter64, so v1 walks step
/// over those entries.
fn next_slot<'s>(view: &ReadView<'s>, oid: &Oid, version: Version) -> Option<Slot<'s>> {
    let mut slot = view.lookup_next(oid)?;
    while version == Version::V1 && matches!(slot.value, Value::Counter64(_)) {
        slot = view.lookup_next(&slot.oid)?;
    }
    Some(slot)
}

fn get(
    view: &ReadView<'_>,
    ctx: &ResolveContext<'_>,
    version: Version,
    pdu: &Pdu,
    jobs: &mut Vec<NotificationJob>,
) -> Pdu {
    // Every slot is looked up before any variation runs, so a v1 miss
    // leaves counters and notifications untouched.
    let mut slots = Vec::with_capacity(pdu.varbinds.len());
    for (index, vb) in pdu.varbinds.iter().enumerate() {
        let slot = view.lookup_exact(&vb.oid);
        if version == Version::V1 && !slot.as_ref().is_some_and(|slot| fits_v1(&slot.value)) {
            return pdu.to_error_response(ErrorStatus::NoSuchName, index as i32 + 1);
        }
        slots.push(slot);
    }

    let mut pending = Vec::new();
    let mut varbinds = Vec::with_capacity(pdu.varbinds.len());
    for (index, (vb, slot)) in pdu.varbinds.iter().zip(slots).enumerate() {
        let value = match slot {
            Some(slot) => {
                let (value, job) = slot.resolve(ctx);
                pending.extend(job);
                value
            }
            None => missing(view, &vb.oid),
        };
        if version == Version::V1 && !fits_v1(&value) {
            return pdu.to_error_response(ErrorStatus::NoSuchName, index as i32 + 1);
        }
        varbinds.push(VarBind::new(vb.oid.clone(), value));
    }
    jobs.extend(pending);
    Pdu::response(pdu.request_id, varbinds)
}

/// SNMPv1 has neither exceptions nor Counter64.
fn fits_v1(value: &Value) -> bool {
    !value.is_exception() && !matches!(value, Value::Counter64(_))
}

fn get_next(
    view: &ReadView<'_>,
    ctx: &ResolveContext<'_>,
    version: Version,
    pdu: &Pdu,
    jobs: &mut Vec<NotificationJob>,
) -> Pdu {
    let mut slots = Vec::with_capacity(pdu.varbinds.len());
    for (index, vb) in pdu.varbinds.iter().enumerate() {
        let slot = next_slot(view, &vb.oid, version);
        if slot.is_none() && version == Version::V1 {
            return pdu.to_error_response(ErrorStatus::NoSuchName, index as i32 + 1);
        }
        slots.push(slot);
    }

    let varbinds = pdu
        .varbinds
        .iter()
        .zip(slots)
        .map(|(vb, slot)| match slot {
            Some(slot) => {
                let (value, job) = slot.resolve(ctx);
                jobs.extend(job);
                VarBind::new(slot.oid, value)
            }
            None => VarBind::new(vb.oid.clone(), Value::EndOfMibView),
        })
        .collect();
    Pdu::response(pdu.request_id, varbinds)
}

/// Validate every varbind, then commit all of them, under one write guard.
fn set(
    store: &Store,
    ctx: &ResolveContext<'_>,
    version: Version,
    pdu: &Pdu,
    jobs: &mut Vec<NotificationJob>,
) -> Pdu {
    let mut view = store.write_guard();

    for (index, vb) in pdu.varbinds.iter().enumerate() {
        let status = match view.lookup_exact(&vb.oid) {
            None => Some(ErrorStatus::NoCreation),
            Some(_) => view.check(&vb.oid, &vb.value).err().map(|e| e.write_status()),
        };
        if let Some(status) = status {
            let status = if version == Version::V1 { status.to_v1() } else { status };
            tracing::debug!(target: "snmp_responder::dispatch", { snmp.oid = %vb.oid, snmp.error_status = %status, snmp.error_index = index + 1 }, "SET rejected");
            return pdu.to_error_response(status, index as i32 + 1);
        }
    }

    for vb in &pdu.varbinds {
        view.apply(&vb.oid, vb.value.clone());
    }
    for vb in &pdu.varbinds {
        if let Some(slot) = view.lookup_exact(&vb.oid) {
            let (_, job) = slot.resolve(ctx);
            jobs.extend(job);
        }
    }

    Pdu::response(pdu.request_id, pdu.varbinds.clone())
}

/// One bound UDP endpoint.
pub struct Endpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
}

impl Endpoint {
    pub(crate) fn bind(
        addr: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let network = |source| Error::Network { addr, source }.boxed();
        let socket = bind_udp_socket(addr).map_err(network)?;
        let local_addr = socket.local_addr().map_err(network)?;
        tracing::info!(target: "snmp_responder::dispatch", { snmp.local_addr = %local_addr }, "endpoint bound");
        Ok(Self {
            socket,
            local_addr,
            dispatcher,
            cancel,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until cancelled.
    #[instrument(skip(self), err, fields(snmp.local_addr = %self.local_addr))]
    pub async fn run(self) -> Result<()> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let (len, source) = tokio::select! {
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        tracing::warn!(target: "snmp_responder::dispatch", { error = %e }, "receive failed");
                        continue;
                    }
                },
                _ = self.cancel.cancelled() => {
                    tracing::info!(target: "snmp_responder::dispatch", "endpoint shutdown requested");
                    return Ok(());
                }
            };

            let data = Bytes::copy_from_slice(&buf[..len]);
            match self.dispatcher.handle(data, source) {
                Ok(Some(response)) => {
                    if let Err(e) = self.socket.send_to(&response, source).await {
                        tracing::warn!(target: "snmp_responder::dispatch", { snmp.source = %source, error = %e }, "failed to send response");
                    }
                }
                Ok(None) => {}
                Err(e) => match *e {
                    Error::Decode { .. } | Error::Unauthorized { .. } => {
                        tracing::debug!(target: "snmp_responder::dispatch", { snmp.source = %source, error = %e }, "dropping request");
                    }
                    _ => {
                        tracing::warn!(target: "snmp_responder::dispatch", { snmp.source = %source, error = %e }, "error handling request");
                    }
                },
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::oid;
    use crate::store::LoadMode;

    pub(crate) const RECORDS: &str = "\
1.3.6.1.2.1.1.1.0|4|Linux zeus 4.8.6
1.3.6.1.2.1.1.3.0|67|100
1.3.6.1.2.1.1.5.0|4|zeus
1.3.6.1.2.1.1.6.0|4|SNMPv1 trap sender|writecache
1.3.6.1.2.1.1.7.0|2|72|writecache
1.3.6.1.2.1.2.2.1.10.1|70|1234567890123
1.3.6.1.2.1.2.2.1.10.2|65|42
";

    pub(crate) fn dispatcher() -> Dispatcher {
        let store = Store::load("public", RECORDS, LoadMode::Strict).unwrap();
        Dispatcher {
            registry: Arc::new(ContextRegistry::builder().store("public", Arc::new(store)).build()),
            engine: Arc::new(LocalEngine::new(Bytes::from_static(b"\x80\x00\x1f\x88\x05dispatch"))),
            users: HashMap::new(),
            max_message_size: 1472,
            notifications: None,
        }
    }

    pub(crate) fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn request(version: Version, community: &str, pdu: Pdu) -> Option<CommunityMessage> {
        let raw = CommunityMessage::new(version, community, pdu).encode();
        dispatcher()
            .handle(raw, peer())
            .ok()
            .flatten()
            .map(|bytes| CommunityMessage::decode(bytes).unwrap())
    }

    fn exchange(d: &Dispatcher, version: Version, pdu: Pdu) -> Pdu {
        let raw = CommunityMessage::new(version, "public", pdu).encode();
        let bytes = d.handle(raw, peer()).unwrap().unwrap();
        CommunityMessage::decode(bytes).unwrap().pdu
    }

    #[test]
    fn get_values_and_exceptions() {
        let response = request(
            Version::V2c,
            "public",
            Pdu::get_request(
                1,
                &[
                    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0),
                    oid!(1, 3, 6, 1, 2, 1, 1, 5, 1),
                    oid!(1, 3, 6, 1, 2, 1, 1, 9, 0),
                ],
            ),
        )
        .unwrap();
        assert_eq!(response.pdu.request_id, 1);
        let values: Vec<_> = response.pdu.varbinds.iter().map(|vb| vb.value.clone()).collect();
        assert_eq!(values, [Value::from("zeus"), Value::NoSuchInstance, Value::NoSuchObject]);
    }

    #[test]
    fn v1_get_miss_is_no_such_name() {
        let request_oids = [oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), oid!(1, 3, 6, 1, 2, 1, 1, 9, 0)];
        let response = request(Version::V1, "public", Pdu::get_request(2, &request_oids)).unwrap();
        assert_eq!(response.pdu.error_status(), ErrorStatus::NoSuchName);
        assert_eq!(response.pdu.error_index, 2);
        assert_eq!(response.pdu.varbinds[1].oid, request_oids[1]);
    }

    #[test]
    fn unknown_community_gets_nothing() {
        assert!(request(Version::V2c, "private", Pdu::get_request(3, &[oid!(1, 3)])).is_none());
    }

    #[test]
    fn v1_bulk_is_dropped() {
        assert!(request(Version::V1, "public", Pdu::get_bulk(4, 0, 5, &[oid!(1, 3)])).is_none());
    }

    #[test]
    fn get_next_walks_and_ends() {
        let pdu = exchange(
            &dispatcher(),
            Version::V2c,
            Pdu::get_next_request(
                5,
                &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 2)],
            ),
        );
        assert_eq!(pdu.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 3, 0));
        assert_eq!(pdu.varbinds[0].value, Value::TimeTicks(100));
        assert_eq!(pdu.varbinds[1].value, Value::EndOfMibView);
    }

    #[test]
    fn v1_get_next_skips_counter64() {
        let d = dispatcher();
        let pdu = exchange(&d, Version::V1, Pdu::get_next_request(6, &[oid!(1, 3, 6, 1, 2, 1, 2)]));
        assert_eq!(pdu.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 2));

        let pdu = exchange(&d, Version::V1, Pdu::get_next_request(7, &[oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 2)]));
        assert_eq!(pdu.error_status(), ErrorStatus::NoSuchName);
        assert_eq!(pdu.error_index, 1);
    }

    #[test]
    fn set_is_atomic() {
        let d = dispatcher();
        let location = oid!(1, 3, 6, 1, 2, 1, 1, 6, 0);
        let pdu = exchange(
            &d,
            Version::V2c,
            Pdu::set_request(
                8,
                vec![
                    VarBind::new(location.clone(), Value::from("Shanghai")),
                    VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("hera")),
                ],
            ),
        );
        assert_eq!(pdu.error_status(), ErrorStatus::NotWritable);
        assert_eq!(pdu.error_index, 2);

        let pdu = exchange(&d, Version::V2c, Pdu::get_request(9, &[location.clone()]));
        assert_eq!(pdu.varbinds[0].value, Value::from("SNMPv1 trap sender"));

        let pdu = exchange(
            &d,
            Version::V2c,
            Pdu::set_request(10, vec![VarBind::new(location.clone(), Value::from("Shanghai"))]),
        );
        assert_eq!(pdu.error_status(), ErrorStatus::NoError);
        assert_eq!(pdu.varbinds[0].value, Value::from("Shanghai"));

        let pdu = exchange(&d, Version::V2c, Pdu::get_request(11, &[location]));
        assert_eq!(pdu.varbinds[0].value, Value::from("Shanghai"));
    }

    #[test]
    fn set_errors_by_version() {
        let d = dispatcher();
        let cases = [
            (VarBind::new(oid!(1, 3, 6, 1, 9, 9, 0), Value::Integer(1)), ErrorStatus::NoCreation, ErrorStatus::NoSuchName),
            (VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("x")), ErrorStatus::NotWritable, ErrorStatus::NoSuchName),
            (VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 7, 0), Value::from("x")), ErrorStatus::WrongType, ErrorStatus::BadValue),
        ];
        for (vb, v2, v1) in cases {
            let pdu = exchange(&d, Version::V2c, Pdu::set_request(12, vec![vb.clone()]));
            assert_eq!(pdu.error_status(), v2);
            let pdu = exchange(&d, Version::V1, Pdu::set_request(13, vec![vb]));
            assert_eq!(pdu.error_status(), v1);
            assert_eq!(pdu.error_index, 1);
        }
    }

    #[test]
    fn inform_is_acknowledged() {
        let varbinds = vec![VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(5))];
        let pdu = exchange(
            &dispatcher(),
            Version::V2c,
            Pdu::new(PduType::InformRequest, 14, varbinds.clone()),
        );
        assert_eq!(pdu.pdu_type, PduType::Response);
        assert_eq!(pdu.varbinds, varbinds);
    }

    #[test]
    fn malformed_datagram_is_an_error() {
        let err = dispatcher()
            .handle(Bytes::from_static(&[0x30, 0x03, 0x02, 0x01]), peer())
            .unwrap_err();
        assert!(matches!(*err, Error::Decode { .. }));
    }

    #[test]
    fn oversized_response_is_too_big() {
        let mut d = dispatcher();
        d.max_message_size = 40;
        let pdu = exchange(&d, Version::V2c, Pdu::get_request(15, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]));
        assert_eq!(pdu.error_status(), ErrorStatus::TooBig);
        assert!(pdu.varbinds.is_empty());
    }

    #[test]
    fn side_effects_reach_the_queue() {
        let records = "1.3.6.1.2.1.1.6.0|4|lab|notify:target=127.0.0.1:1162\n";
        let store = Store::load("public", records, LoadMode::Strict).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let mut d = dispatcher();
        d.registry = Arc::new(ContextRegistry::builder().store("public", Arc::new(store)).build());
        d.notifications = Some(tx);

        exchange(&d, Version::V2c, Pdu::get_request(16, &[oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)]));
        assert!(rx.try_recv().is_err());

        let pdu = exchange(
            &d,
            Version::V2c,
            Pdu::set_request(17, vec![VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("rack"))]),
        );
        assert_eq!(pdu.error_status(), ErrorStatus::NoError);
        let job = rx.try_recv().unwrap();
        assert_eq!(job.target, "127.0.0.1:1162".parse().unwrap());
        assert_eq!(job.context.as_deref(), Some("public"));
    }

    #[test]
    fn failed_v1_get_runs_no_variation() {
        let records = "\
1.3.6.1.2.1.1.6.0|4|lab|notify:target=127.0.0.1:1162,on=read
1.3.6.1.2.1.2.2.1.10.1|65|7|counter:step=3
";
        let store = Store::load("public", records, LoadMode::Strict).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let mut d = dispatcher();
        d.registry = Arc::new(ContextRegistry::builder().store("public", Arc::new(store)).build());
        d.notifications = Some(tx);
        let location = oid!(1, 3, 6, 1, 2, 1, 1, 6, 0);
        let octets = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 1);

        let missing = oid!(1, 3, 6, 1, 2, 1, 1, 5, 0);
        let pdu = exchange(
            &d,
            Version::V1,
            Pdu::get_request(18, &[location.clone(), octets.clone(), missing]),
        );
        assert_eq!(pdu.error_status(), ErrorStatus::NoSuchName);
        assert_eq!(pdu.error_index, 3);
        assert!(rx.try_recv().is_err());

        let pdu = exchange(&d, Version::V1, Pdu::get_request(19, &[octets, location]));
        assert_eq!(pdu.error_status(), ErrorStatus::NoError);
        assert_eq!(pdu.varbinds[0].value, Value::Counter32(7));
        assert!(rx.try_recv().is_ok());
    }
}
