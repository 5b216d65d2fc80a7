//! Trap and inform delivery.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::{Error, Result, TransportFailure};
use crate::message::{
    CommunityMessage, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, TrapV1Message, V3Message,
    V3MessageData,
};
use crate::pdu::{Pdu, PduType, TrapV1Pdu};
use crate::registry::ContextRegistry;
use crate::util::bind_ephemeral_udp_socket;
use crate::v3::{self, LocalEngine, Outgoing, RemoteEngine, UserKeys, UsmSecurityParams, UsmUser};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::variation::{Operation, ResolveContext};
use crate::version::Version;

use super::{NotificationJob, NotifyKind, Security, oids};

/// Default wait for an inform acknowledgement.
pub const DEFAULT_INFORM_TIMEOUT: Duration = Duration::from_secs(5);

const RECV_BUFFER_SIZE: usize = 65535;

/// Largest message we advertise in v3 headers.
const MAX_MESSAGE_SIZE: i32 = 65507;

/// Sends notification jobs, resolving their payload against the registry.
///
/// ```no_run
/// use std::sync::Arc;
/// use snmp_responder::{ContextRegistry, LoadMode, NotificationJob, NotificationSender};
/// use snmp_responder::notification::Security;
/// use snmp_responder::v3::LocalEngine;
///
/// # async fn example() -> snmp_responder::Result<()> {
/// let registry = Arc::new(ContextRegistry::load("data", LoadMode::Lenient)?);
/// let sender = NotificationSender::builder(registry, Arc::new(LocalEngine::generated())).build();
///
/// let job = NotificationJob::new("127.0.0.1:162".parse().unwrap(), Security::v2c("public"))
///     .context("public");
/// sender.send(&job).await?;
/// # Ok(())
/// # }
/// ```
pub struct NotificationSender {
    registry: Arc<ContextRegistry>,
    engine: Arc<LocalEngine>,
    users: HashMap<Bytes, UsmUser>,
    /// Keys localized to the local engine, for traps.
    local_keys: HashMap<Bytes, UserKeys>,
    inform_timeout: Duration,
    agent_addr: Ipv4Addr,
    started: Instant,
    next_id: AtomicI32,
    cancel: CancellationToken,
}

/// Builder for [`NotificationSender`].
pub struct NotificationSenderBuilder {
    registry: Arc<ContextRegistry>,
    engine: Arc<LocalEngine>,
    users: Vec<UsmUser>,
    inform_timeout: Duration,
    agent_addr: Ipv4Addr,
    started: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl NotificationSenderBuilder {
    /// Add a USM user that `Security::Usm` jobs can name.
    pub fn user(mut self, user: UsmUser) -> Self {
        self.users.push(user);
        self
    }

    pub fn users(mut self, users: impl IntoIterator<Item = UsmUser>) -> Self {
        self.users.extend(users);
        self
    }

    /// How long an inform waits for its Response. Default 5 seconds.
    pub fn inform_timeout(mut self, timeout: Duration) -> Self {
        self.inform_timeout = timeout;
        self
    }

    /// Agent address carried in SNMPv1 Trap-PDUs. Default `0.0.0.0`.
    pub fn agent_addr(mut self, addr: Ipv4Addr) -> Self {
        self.agent_addr = addr;
        self
    }

    /// Reference point for `sysUpTime.0`. Defaults to build time.
    pub fn started(mut self, started: Instant) -> Self {
        self.started = Some(started);
        self
    }

    /// Token that aborts a pending acknowledgement wait.
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> NotificationSender {
        let local_keys = self
            .users
            .iter()
            .map(|user| (user.name.clone(), user.localize(self.engine.engine_id())))
            .collect();
        NotificationSender {
            users: self.users.into_iter().map(|u| (u.name.clone(), u)).collect(),
            local_keys,
            registry: self.registry,
            engine: self.engine,
            inform_timeout: self.inform_timeout,
            agent_addr: self.agent_addr,
            started: self.started.unwrap_or_else(Instant::now),
            next_id: AtomicI32::new(1),
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

impl NotificationSender {
    pub fn builder(registry: Arc<ContextRegistry>, engine: Arc<LocalEngine>) -> NotificationSenderBuilder {
        NotificationSenderBuilder {
            registry,
            engine,
            users: Vec::new(),
            inform_timeout: DEFAULT_INFORM_TIMEOUT,
            agent_addr: Ipv4Addr::UNSPECIFIED,
            started: None,
            cancel: None,
        }
    }

    pub fn inform_timeout(&self) -> Duration {
        self.inform_timeout
    }

    /// Deliver one job. Traps return once sent; informs return once
    /// acknowledged.
    #[instrument(skip_all, err, fields(snmp.target = %job.target, snmp.kind = %job.kind, reason = %job.reason))]
    pub async fn send(&self, job: &NotificationJob) -> Result<()> {
        let transport = |reason: TransportFailure| {
            Error::Transport {
                target: job.target,
                reason,
            }
            .boxed()
        };
        let socket = bind_ephemeral_udp_socket(job.target).map_err(|e| transport(e.into()))?;

        match &job.security {
            Security::Community {
                version: Version::V1,
                community,
            } => {
                if job.kind == NotifyKind::Inform {
                    return Err(Error::config("SNMPv1 cannot carry an inform"));
                }
                let trap = TrapV1Message {
                    community: community.clone(),
                    pdu: TrapV1Pdu::from_trap_oid(
                        &job.trap_oid,
                        self.agent_addr,
                        self.uptime(),
                        self.payload(job),
                    ),
                };
                send_datagram(&socket, job.target, &trap.encode()).await.map_err(transport)
            }
            Security::Community { version, community } => {
                let request_id = self.next_id();
                let pdu = Pdu::new(pdu_type(job.kind), request_id, self.varbinds(job));
                let bytes = CommunityMessage::new(*version, community, pdu).encode();
                send_datagram(&socket, job.target, &bytes).await.map_err(transport)?;
                if job.kind == NotifyKind::Trap {
                    return Ok(());
                }
                self.await_reply(&socket, job.target, |data| {
                    CommunityMessage::decode(data).is_ok_and(|m| {
                        m.pdu.pdu_type == PduType::Response && m.pdu.request_id == request_id
                    })
                })
                .await
                .map(drop)
                .map_err(transport)
            }
            Security::Usm { user } => {
                let Some(usm_user) = self.users.get(user) else {
                    return Err(Error::config(format!(
                        "unknown v3 user '{}'",
                        String::from_utf8_lossy(user)
                    )));
                };
                match job.kind {
                    NotifyKind::Trap => self.send_v3_trap(&socket, job, user).await.map_err(transport),
                    NotifyKind::Inform => self
                        .send_v3_inform(&socket, job, usm_user)
                        .await
                        .map_err(transport),
                }
            }
        }
    }

    /// Consume jobs until the queue closes or `cancel` fires. Failures are
    /// logged, never fatal.
    pub async fn run(&self, mut queue: mpsc::Receiver<NotificationJob>, cancel: CancellationToken) {
        loop {
            let job = tokio::select! {
                job = queue.recv() => match job {
                    Some(job) => job,
                    None => return,
                },
                _ = cancel.cancelled() => {
                    tracing::debug!(target: "snmp_responder::notify", "notification sender shutdown requested");
                    return;
                }
            };
            self.deliver(&job).await;
        }
    }

    /// Send `job` every `interval` until cancelled. The first send happens
    /// one interval after the call.
    pub fn spawn_periodic(
        self: &Arc<Self>,
        job: NotificationJob,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let sender = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => sender.deliver(&job).await,
                    _ = cancel.cancelled() => return,
                }
            }
        })
    }

    async fn deliver(&self, job: &NotificationJob) {
        match self.send(job).await {
            Ok(()) => {
                tracing::debug!(target: "snmp_responder::notify", { snmp.target = %job.target, snmp.kind = %job.kind, reason = %job.reason }, "notification delivered");
            }
            Err(e) => {
                tracing::warn!(target: "snmp_responder::notify", { snmp.target = %job.target, error = %e }, "notification failed");
            }
        }
    }

    async fn send_v3_trap(
        &self,
        socket: &UdpSocket,
        job: &NotificationJob,
        user: &Bytes,
    ) -> std::result::Result<(), TransportFailure> {
        let keys = self.local_keys.get(user).cloned().unwrap_or_default();
        let out = Outgoing {
            msg_id: self.next_id(),
            max_size: MAX_MESSAGE_SIZE,
            level: keys.max_level(),
            reportable: false,
            engine_id: self.engine.engine_id(),
            boots: self.engine.boots(),
            time: self.engine.time(),
            user,
            keys: &keys,
        };
        let scoped = self.scoped(job, self.engine.engine_id().clone(), PduType::TrapV2);
        let bytes = v3::seal(&out, &scoped, self.engine.salt()).map_err(seal_failure)?;
        send_datagram(socket, job.target, &bytes).await
    }

    /// Discover the receiver's engine, then send the inform authoritative
    /// to it and wait for the Response carrying the same msgID.
    async fn send_v3_inform(
        &self,
        socket: &UdpSocket,
        job: &NotificationJob,
        user: &UsmUser,
    ) -> std::result::Result<(), TransportFailure> {
        let remote = self.discover(socket, job.target).await?;
        tracing::debug!(target: "snmp_responder::notify", { snmp.target = %job.target, engine_id = %crate::util::hex::Bytes(&remote.engine_id), boots = remote.boots }, "receiver engine discovered");

        let keys = user.localize(&remote.engine_id);
        let msg_id = self.next_id();
        let out = Outgoing {
            msg_id,
            max_size: MAX_MESSAGE_SIZE,
            level: keys.max_level(),
            reportable: true,
            engine_id: &remote.engine_id,
            boots: remote.boots,
            time: remote.estimated_time(),
            user: &user.name,
            keys: &keys,
        };
        let scoped = self.scoped(job, remote.engine_id.clone(), PduType::InformRequest);
        let bytes = v3::seal(&out, &scoped, self.engine.salt()).map_err(seal_failure)?;
        send_datagram(socket, job.target, &bytes).await?;

        self.await_reply(socket, job.target, |data| {
            let Ok(message) = V3Message::decode(data.clone()) else {
                return false;
            };
            if message.msg_id() != msg_id {
                return false;
            }
            let Ok(params) = UsmSecurityParams::decode(message.security_params.clone()) else {
                return false;
            };
            v3::open(&data, &message, &params, &keys).is_ok_and(|scoped| scoped.pdu.pdu_type == PduType::Response)
        })
        .await
        .map(drop)
    }

    async fn discover(&self, socket: &UdpSocket, target: SocketAddr) -> std::result::Result<RemoteEngine, TransportFailure> {
        let msg_id = self.next_id();
        let discovery = V3Message {
            global_data: MsgGlobalData::new(
                msg_id,
                MAX_MESSAGE_SIZE,
                MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
            ),
            security_params: UsmSecurityParams::discovery(b"").encode(),
            data: V3MessageData::Plaintext(ScopedPdu::new(
                Bytes::new(),
                Bytes::new(),
                Pdu::get_request(self.next_id(), &[]),
            )),
        };
        send_datagram(socket, target, &discovery.encode()).await?;

        let reply = self
            .await_reply(socket, target, |data| {
                V3Message::decode(data.clone()).is_ok_and(|m| m.msg_id() == msg_id)
            })
            .await
            .map_err(|_| TransportFailure::Discovery)?;
        let message = V3Message::decode(reply).map_err(|_| TransportFailure::Discovery)?;
        let params = UsmSecurityParams::decode(message.security_params).map_err(|_| TransportFailure::Discovery)?;
        RemoteEngine::from_report(&params).ok_or(TransportFailure::Discovery)
    }

    /// Wait for a datagram from `target` that `accept` matches. Anything
    /// else is ignored.
    async fn await_reply(
        &self,
        socket: &UdpSocket,
        target: SocketAddr,
        accept: impl Fn(Bytes) -> bool,
    ) -> std::result::Result<Bytes, TransportFailure> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let deadline = tokio::time::sleep(self.inform_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    let (len, source) = received?;
                    if source != target {
                        tracing::trace!(target: "snmp_responder::notify", { snmp.source = %source }, "ignoring datagram from another peer");
                        continue;
                    }
                    let data = Bytes::copy_from_slice(&buf[..len]);
                    if accept(data.clone()) {
                        return Ok(data);
                    }
                    tracing::trace!(target: "snmp_responder::notify", { snmp.source = %source }, "ignoring unmatched reply");
                }
                _ = &mut deadline => {
                    return Err(TransportFailure::NoAcknowledgement(self.inform_timeout));
                }
                _ = self.cancel.cancelled() => {
                    tracing::debug!(target: "snmp_responder::notify", { snmp.target = %target }, "shutdown while awaiting acknowledgement");
                    return Err(TransportFailure::NoAcknowledgement(self.inform_timeout));
                }
            }
        }
    }

    fn scoped(&self, job: &NotificationJob, context_engine_id: Bytes, pdu_type: PduType) -> ScopedPdu {
        let context_name = job.context.as_deref().map(|c| Bytes::copy_from_slice(c.as_bytes())).unwrap_or_default();
        ScopedPdu::new(
            context_engine_id,
            context_name,
            Pdu::new(pdu_type, self.next_id(), self.varbinds(job)),
        )
    }

    /// sysUpTime.0 and snmpTrapOID.0, then the payload.
    fn varbinds(&self, job: &NotificationJob) -> Vec<VarBind> {
        let mut varbinds = vec![
            VarBind::new(oids::sys_uptime(), Value::TimeTicks(self.uptime())),
            VarBind::new(oids::snmp_trap_oid(), Value::ObjectIdentifier(job.trap_oid.clone())),
        ];
        varbinds.extend(self.payload(job));
        varbinds
    }

    /// Payload OIDs resolved through the job's context without triggering
    /// further side effects.
    fn payload(&self, job: &NotificationJob) -> Vec<VarBind> {
        if job.payload.is_empty() {
            return Vec::new();
        }
        let context = match job.context.as_deref() {
            Some(context) => context.to_string(),
            None => String::from_utf8_lossy(self.registry.default_context()).into_owned(),
        };
        let Ok(store) = self.registry.resolve(context.as_bytes()) else {
            tracing::debug!(target: "snmp_responder::notify", { snmp.context = %context }, "payload context not registered, sending without payload");
            return Vec::new();
        };

        // SNMPv1 has no Counter64
        let v1 = job.security.version() == Version::V1;
        let ctx = ResolveContext::new(Operation::Get, &context).without_side_effects();
        let view = store.read();
        job.payload
            .iter()
            .filter_map(|oid| {
                let value = view
                    .lookup_exact(oid)
                    .filter(|slot| !slot.value.is_exception())
                    .filter(|slot| !(v1 && matches!(slot.value, Value::Counter64(_))))
                    .map(|slot| slot.resolve(&ctx).0);
                if value.is_none() {
                    tracing::debug!(target: "snmp_responder::notify", { snmp.oid = %oid, snmp.context = %context }, "payload OID not resolvable, skipping");
                }
                value.map(|value| VarBind::new(oid.clone(), value))
            })
            .collect()
    }

    fn uptime(&self) -> u32 {
        (self.started.elapsed().as_millis() / 10) as u32
    }

    fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) & i32::MAX
    }
}

fn pdu_type(kind: NotifyKind) -> PduType {
    match kind {
        NotifyKind::Trap => PduType::TrapV2,
        NotifyKind::Inform => PduType::InformRequest,
    }
}

fn seal_failure(e: Box<Error>) -> TransportFailure {
    TransportFailure::Io(std::io::Error::other(e))
}

async fn send_datagram(socket: &UdpSocket, target: SocketAddr, bytes: &[u8]) -> std::result::Result<(), TransportFailure> {
    socket.send_to(bytes, target).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::store::{LoadMode, Store};
    use crate::util::bind_udp_socket;
    use crate::v3::{AuthProtocol, PrivProtocol};

    const RECORDS: &str = "\
1.3.6.1.2.1.1.5.0|4|zeus
1.3.6.1.2.1.1.6.0|4|SNMPv1 trap sender
1.3.6.1.2.1.2.2.1.10.1|65|7|counter:step=3
1.3.6.1.2.1.31.1.1.1.6.1|70|1234567890123
";

    fn sender(timeout: Duration) -> NotificationSender {
        let store = Store::load("public", RECORDS, LoadMode::Strict).unwrap();
        let registry = ContextRegistry::builder().store("public", Arc::new(store)).build();
        NotificationSender::builder(
            Arc::new(registry),
            Arc::new(LocalEngine::new(Bytes::from_static(b"\x80\x00\x1f\x88\x05sender"))),
        )
        .user(
            UsmUser::new("trapper")
                .with_auth(AuthProtocol::Sha256, "auctoritas")
                .with_privacy(PrivProtocol::Aes128, "privatus"),
        )
        .inform_timeout(timeout)
        .build()
    }

    fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = bind_udp_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn recv(socket: &UdpSocket) -> (Bytes, SocketAddr) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let (len, from) = socket.recv_from(&mut buf).await.unwrap();
        (Bytes::copy_from_slice(&buf[..len]), from)
    }

    #[tokio::test]
    async fn v2c_trap_carries_uptime_trap_oid_and_payload() {
        let (socket, addr) = receiver();
        let job = NotificationJob::new(addr, Security::v2c("public"))
            .trap_oid(oids::warm_start())
            .payload([oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), oid!(1, 3, 6, 1, 9, 9), oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 1)])
            .context("public");
        sender(DEFAULT_INFORM_TIMEOUT).send(&job).await.unwrap();

        let (data, _) = recv(&socket).await;
        let message = CommunityMessage::decode(data).unwrap();
        assert_eq!(message.pdu.pdu_type, PduType::TrapV2);
        let vbs = &message.pdu.varbinds;
        assert_eq!(vbs.len(), 4);
        assert_eq!(vbs[0].oid, oids::sys_uptime());
        assert!(matches!(vbs[0].value, Value::TimeTicks(_)));
        assert_eq!(vbs[1].value, Value::ObjectIdentifier(oids::warm_start()));
        assert_eq!(vbs[2].value, Value::from("zeus"));
        assert_eq!(vbs[3].value, Value::Counter32(7));
    }

    #[tokio::test]
    async fn v1_trap_uses_trap_pdu() {
        let (socket, addr) = receiver();
        let job = NotificationJob::new(
            addr,
            Security::Community {
                version: Version::V1,
                community: Bytes::from_static(b"public"),
            },
        )
        .trap_oid(oid!(1, 3, 6, 1, 4, 1, 20408, 4, 1, 1, 2, 0, 432))
        .payload([oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)])
        .context("public");
        sender(DEFAULT_INFORM_TIMEOUT).send(&job).await.unwrap();

        let (data, _) = recv(&socket).await;
        let trap = TrapV1Message::decode(data).unwrap();
        assert_eq!(trap.pdu.enterprise, oid!(1, 3, 6, 1, 4, 1, 20408, 4, 1, 1, 2));
        assert_eq!(trap.pdu.generic_trap, 6);
        assert_eq!(trap.pdu.specific_trap, 432);
        assert_eq!(trap.pdu.varbinds[0].value, Value::from("SNMPv1 trap sender"));
    }

    #[tokio::test]
    async fn v1_trap_drops_counter64_payload() {
        let hc_in_octets = oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6, 1);
        let payload = [hc_in_octets.clone(), oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)];
        let (socket, addr) = receiver();
        let v1 = NotificationJob::new(
            addr,
            Security::Community {
                version: Version::V1,
                community: Bytes::from_static(b"public"),
            },
        )
        .payload(payload.clone())
        .context("public");
        let sender = sender(DEFAULT_INFORM_TIMEOUT);
        sender.send(&v1).await.unwrap();

        let (data, _) = recv(&socket).await;
        let trap = TrapV1Message::decode(data).unwrap();
        assert_eq!(trap.pdu.varbinds.len(), 1);
        assert_eq!(trap.pdu.varbinds[0].value, Value::from("zeus"));

        let v2c = NotificationJob::new(addr, Security::v2c("public"))
            .payload(payload)
            .context("public");
        sender.send(&v2c).await.unwrap();

        let (data, _) = recv(&socket).await;
        let message = CommunityMessage::decode(data).unwrap();
        assert_eq!(message.pdu.varbinds[2].oid, hc_in_octets);
        assert_eq!(message.pdu.varbinds[2].value, Value::Counter64(1234567890123));
    }

    #[tokio::test]
    async fn v1_inform_is_rejected() {
        let (_socket, addr) = receiver();
        let job = NotificationJob::new(
            addr,
            Security::Community {
                version: Version::V1,
                community: Bytes::from_static(b"public"),
            },
        )
        .kind(NotifyKind::Inform);
        let err = sender(DEFAULT_INFORM_TIMEOUT).send(&job).await.unwrap_err();
        assert!(matches!(*err, Error::Config(_)));
    }

    #[tokio::test]
    async fn inform_is_acknowledged() {
        let (socket, addr) = receiver();
        let acker = tokio::spawn(async move {
            let (data, from) = recv(&socket).await;
            let message = CommunityMessage::decode(data).unwrap();
            assert_eq!(message.pdu.pdu_type, PduType::InformRequest);
            let ack = Pdu::response(message.pdu.request_id, message.pdu.varbinds.clone());
            let bytes = CommunityMessage::new(Version::V2c, "public", ack).encode();
            socket.send_to(&bytes, from).await.unwrap();
        });

        let job = NotificationJob::new(addr, Security::v2c("public")).kind(NotifyKind::Inform);
        sender(Duration::from_secs(5)).send(&job).await.unwrap();
        acker.await.unwrap();
    }

    #[tokio::test]
    async fn unacknowledged_inform_times_out() {
        let (_socket, addr) = receiver();
        let job = NotificationJob::new(addr, Security::v2c("public")).kind(NotifyKind::Inform);
        let err = sender(Duration::from_millis(100)).send(&job).await.unwrap_err();
        assert!(matches!(
            *err,
            Error::Transport {
                reason: TransportFailure::NoAcknowledgement(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn v3_trap_is_authoritative_locally() {
        let (socket, addr) = receiver();
        let s = sender(DEFAULT_INFORM_TIMEOUT);
        let job = NotificationJob::new(
            addr,
            Security::Usm {
                user: Bytes::from_static(b"trapper"),
            },
        );
        s.send(&job).await.unwrap();

        let (data, _) = recv(&socket).await;
        let message = V3Message::decode(data.clone()).unwrap();
        assert_eq!(message.security_level(), SecurityLevel::AuthPriv);
        let params = UsmSecurityParams::decode(message.security_params.clone()).unwrap();
        assert_eq!(params.engine_id, *s.engine.engine_id());

        let keys = UsmUser::new("trapper")
            .with_auth(AuthProtocol::Sha256, "auctoritas")
            .with_privacy(PrivProtocol::Aes128, "privatus")
            .localize(s.engine.engine_id());
        let scoped = v3::open(&data, &message, &params, &keys).unwrap();
        assert_eq!(scoped.pdu.pdu_type, PduType::TrapV2);
        assert_eq!(scoped.pdu.varbinds[1].value, Value::ObjectIdentifier(oids::cold_start()));
    }

    #[tokio::test]
    async fn unknown_v3_user_is_config_error() {
        let (_socket, addr) = receiver();
        let job = NotificationJob::new(
            addr,
            Security::Usm {
                user: Bytes::from_static(b"nobody"),
            },
        );
        let err = sender(DEFAULT_INFORM_TIMEOUT).send(&job).await.unwrap_err();
        assert!(matches!(*err, Error::Config(_)));
    }

    #[tokio::test]
    async fn run_drains_queue_until_cancelled() {
        let (socket, addr) = receiver();
        let s = sender(DEFAULT_INFORM_TIMEOUT);
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        tx.send(NotificationJob::new(addr, Security::v2c("public"))).await.unwrap();
        let runner = {
            let cancel = cancel.clone();
            async move { s.run(rx, cancel).await }
        };
        let handle = tokio::spawn(runner);

        let (data, _) = recv(&socket).await;
        assert_eq!(CommunityMessage::decode(data).unwrap().pdu.pdu_type, PduType::TrapV2);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn periodic_sends_repeat() {
        let (socket, addr) = receiver();
        let s = Arc::new(sender(DEFAULT_INFORM_TIMEOUT));
        let cancel = CancellationToken::new();
        let handle = s.spawn_periodic(
            NotificationJob::new(addr, Security::v2c("public")),
            Duration::from_millis(20),
            cancel.clone(),
        );

        recv(&socket).await;
        recv(&socket).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
