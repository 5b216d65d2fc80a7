//! Minimal UDP manager for driving the responder with hand-built messages.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use snmp_responder::message::{
    CommunityMessage, MsgFlags, MsgGlobalData, ScopedPdu, V3Message, V3MessageData,
};
use snmp_responder::v3::{self, Outgoing, SaltCounter, UserKeys, UsmSecurityParams};
use snmp_responder::{Oid, Pdu, SecurityLevel, UsmUser, Value, VarBind, Version};
use tokio::net::UdpSocket;

/// How long a request waits before the responder counts as silent.
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

pub struct TestClient {
    socket: UdpSocket,
    target: SocketAddr,
    version: Version,
    community: String,
    next_id: std::sync::atomic::AtomicI32,
}

/// Engine parameters learned by discovery.
pub struct Discovered {
    pub engine_id: Bytes,
    pub boots: u32,
    pub time: u32,
    pub report: Pdu,
}

impl TestClient {
    pub async fn v2c(target: SocketAddr) -> Self {
        Self::new(target, Version::V2c, "public").await
    }

    pub async fn new(target: SocketAddr, version: Version, community: &str) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind client socket");
        Self {
            socket,
            target,
            version,
            community: community.to_string(),
            next_id: std::sync::atomic::AtomicI32::new(1),
        }
    }

    pub fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    pub async fn send_raw(&self, bytes: &[u8]) {
        self.socket.send_to(bytes, self.target).await.expect("send");
    }

    /// Next datagram, or `None` after [`REPLY_TIMEOUT`].
    pub async fn recv_raw(&self) -> Option<Bytes> {
        let mut buf = vec![0u8; 65535];
        match tokio::time::timeout(REPLY_TIMEOUT, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(Bytes::copy_from_slice(&buf[..len])),
            _ => None,
        }
    }

    /// Send `pdu` in a community message and decode the reply PDU.
    pub async fn request(&self, pdu: Pdu) -> Option<Pdu> {
        let bytes = CommunityMessage::new(self.version, &self.community, pdu).encode();
        self.send_raw(&bytes).await;
        let reply = self.recv_raw().await?;
        Some(CommunityMessage::decode(reply).expect("decode response").pdu)
    }

    pub async fn get(&self, oids: &[Oid]) -> Pdu {
        self.request(Pdu::get_request(self.next_id(), oids))
            .await
            .expect("no response to GET")
    }

    pub async fn get_one(&self, oid: Oid) -> Value {
        self.get(&[oid]).await.varbinds.remove(0).value
    }

    pub async fn get_next(&self, oids: &[Oid]) -> Pdu {
        self.request(Pdu::get_next_request(self.next_id(), oids))
            .await
            .expect("no response to GETNEXT")
    }

    pub async fn get_bulk(&self, non_repeaters: i32, max_repetitions: i32, oids: &[Oid]) -> Pdu {
        self.request(Pdu::get_bulk(self.next_id(), non_repeaters, max_repetitions, oids))
            .await
            .expect("no response to GETBULK")
    }

    pub async fn set(&self, varbinds: Vec<VarBind>) -> Pdu {
        self.request(Pdu::set_request(self.next_id(), varbinds))
            .await
            .expect("no response to SET")
    }

    /// Walk `root` with GETNEXT until the responder leaves the subtree.
    pub async fn walk(&self, root: &Oid) -> Vec<VarBind> {
        let mut out = Vec::new();
        let mut cursor = root.clone();
        loop {
            let mut pdu = self.get_next(&[cursor]).await;
            let vb = pdu.varbinds.remove(0);
            if vb.value == Value::EndOfMibView || !vb.oid.starts_with(root) {
                return out;
            }
            cursor = vb.oid.clone();
            out.push(vb);
        }
    }

    /// SNMPv3 discovery: an empty-engine noAuthNoPriv request.
    pub async fn discover(&self) -> Discovered {
        let message = V3Message {
            global_data: MsgGlobalData::new(self.next_id(), 65507, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true)),
            security_params: UsmSecurityParams::discovery(b"").encode(),
            data: V3MessageData::Plaintext(ScopedPdu::new(
                Bytes::new(),
                Bytes::new(),
                Pdu::get_request(self.next_id(), &[]),
            )),
        };
        self.send_raw(&message.encode()).await;
        let reply = self.recv_raw().await.expect("no discovery report");
        let message = V3Message::decode(reply).expect("decode report");
        let params = UsmSecurityParams::decode(message.security_params.clone()).expect("decode USM params");
        let report = message.scoped_pdu().expect("plaintext report").pdu.clone();
        Discovered {
            engine_id: params.engine_id,
            boots: params.engine_boots,
            time: params.engine_time,
            report,
        }
    }

    /// Send `pdu` as `user` at `level` and open the reply with the same
    /// keys. Returns the reply's level and scoped PDU.
    pub async fn v3_request(
        &self,
        engine: &Discovered,
        user: &UsmUser,
        level: SecurityLevel,
        context: &[u8],
        pdu: Pdu,
    ) -> Option<(SecurityLevel, ScopedPdu)> {
        let keys = user.localize(&engine.engine_id);
        self.v3_request_with_keys(engine, &user.name, &keys, level, context, pdu).await
    }

    pub async fn v3_request_with_keys(
        &self,
        engine: &Discovered,
        user: &Bytes,
        keys: &UserKeys,
        level: SecurityLevel,
        context: &[u8],
        pdu: Pdu,
    ) -> Option<(SecurityLevel, ScopedPdu)> {
        let out = Outgoing {
            msg_id: self.next_id(),
            max_size: 65507,
            level,
            reportable: true,
            engine_id: &engine.engine_id,
            boots: engine.boots,
            time: engine.time,
            user,
            keys,
        };
        let scoped = ScopedPdu::new(engine.engine_id.clone(), Bytes::copy_from_slice(context), pdu);
        let bytes = v3::seal(&out, &scoped, &SaltCounter::new()).expect("seal request");
        self.send_raw(&bytes).await;

        let reply = self.recv_raw().await?;
        let message = V3Message::decode(reply.clone()).expect("decode v3 reply");
        let params = UsmSecurityParams::decode(message.security_params.clone()).expect("decode USM params");
        let scoped = match message.scoped_pdu() {
            Some(scoped) => scoped.clone(),
            None => v3::open(&reply, &message, &params, keys).expect("open v3 reply"),
        };
        if message.security_level().requires_auth() {
            v3::open(&reply, &message, &params, keys).expect("reply authenticates");
        }
        Some((message.security_level(), scoped))
    }
}
