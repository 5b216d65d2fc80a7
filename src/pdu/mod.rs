//! SNMP Protocol Data Units.

use std::net::Ipv4Addr;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type, identified by its context-specific constructed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::GetRequest),
            0xA1 => Some(Self::GetNextRequest),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::SetRequest),
            0xA4 => Some(Self::TrapV1),
            0xA5 => Some(Self::GetBulkRequest),
            0xA6 => Some(Self::InformRequest),
            0xA7 => Some(Self::TrapV2),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::TrapV1 => "TrapV1",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::InformRequest => "InformRequest",
            Self::TrapV2 => "TrapV2",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Every PDU but the SNMPv1 Trap-PDU.
///
/// For GetBulkRequest, `error_status` carries non-repeaters and
/// `error_index` carries max-repetitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    pub fn new(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::new(
            PduType::GetRequest,
            request_id,
            oids.iter().cloned().map(VarBind::null).collect(),
        )
    }

    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::new(
            PduType::GetNextRequest,
            request_id,
            oids.iter().cloned().map(VarBind::null).collect(),
        )
    }

    pub fn get_bulk(request_id: i32, non_repeaters: i32, max_repetitions: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::new(PduType::SetRequest, request_id, varbinds)
    }

    /// Successful Response carrying `varbinds`.
    pub fn response(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::new(PduType::Response, request_id, varbinds)
    }

    /// Error Response echoing this request's varbinds.
    pub fn to_error_response(&self, status: ErrorStatus, index: i32) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: status.as_i32(),
            error_index: index,
            varbinds: self.varbinds.clone(),
        }
    }

    pub fn error_status(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// PDUs an agent answers.
    pub fn is_request(&self) -> bool {
        matches!(
            self.pdu_type,
            PduType::GetRequest
                | PduType::GetNextRequest
                | PduType::GetBulkRequest
                | PduType::SetRequest
                | PduType::InformRequest
        )
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder.peek_tag().unwrap_or(0);
        let pdu_type = match PduType::from_tag(tag) {
            Some(PduType::TrapV1) | None => {
                return Err(decoder.fail(DecodeErrorKind::UnknownPduType(tag)));
            }
            Some(t) => t,
        };

        let mut pdu = decoder.read_constructed(tag)?;
        let request_id = pdu.read_integer()?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

/// SNMPv1 generic-trap values (RFC 1157).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GenericTrap {
    ColdStart = 0,
    WarmStart = 1,
    LinkDown = 2,
    LinkUp = 3,
    AuthenticationFailure = 4,
    EgpNeighborLoss = 5,
    EnterpriseSpecific = 6,
}

/// `snmpTraps` (1.3.6.1.6.3.1.1.5); the generic v1 traps map to its children.
pub(crate) const SNMP_TRAPS: [u32; 9] = [1, 3, 6, 1, 6, 3, 1, 1, 5];

/// SNMPv1 Trap-PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Pdu {
    pub enterprise: Oid,
    pub agent_addr: [u8; 4],
    pub generic_trap: i32,
    pub specific_trap: i32,
    pub time_stamp: u32,
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    /// Build a v1 trap from a v2 notification OID (RFC 3584 section 3.2).
    ///
    /// `snmpTraps.N` becomes generic trap N-1. Anything else is
    /// enterprise-specific: when the second-to-last arc is 0 the enterprise is
    /// the OID minus its last two arcs, otherwise minus its last arc.
    pub fn from_trap_oid(
        trap_oid: &Oid,
        agent_addr: Ipv4Addr,
        time_stamp: u32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        let arcs = trap_oid.arcs();
        let generic = match arcs {
            [prefix @ .., n] if prefix == SNMP_TRAPS && (1..=6).contains(n) => Some(*n as i32 - 1),
            _ => None,
        };

        let (enterprise, generic_trap, specific_trap) = match generic {
            Some(g) => (Oid::from_slice(&SNMP_TRAPS), g, 0),
            None => {
                let specific = arcs.last().copied().unwrap_or(0) as i32;
                let cut = match arcs {
                    [.., 0, _] => 2,
                    _ => 1,
                };
                let enterprise = Oid::from_slice(&arcs[..arcs.len().saturating_sub(cut)]);
                (enterprise, GenericTrap::EnterpriseSpecific as i32, specific)
            }
        };

        Self {
            enterprise,
            agent_addr: agent_addr.octets(),
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::TRAP_V1, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_unsigned32(tag::application::TIMETICKS, self.time_stamp);
            buf.push_integer(self.specific_trap);
            buf.push_integer(self.generic_trap);
            buf.push_ip_address(self.agent_addr);
            buf.push_oid(&self.enterprise);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut pdu = decoder.read_constructed(tag::pdu::TRAP_V1)?;
        let enterprise = pdu.read_oid()?;
        let addr_len = pdu.expect_tag(tag::application::IP_ADDRESS)?;
        let agent_addr = pdu.read_ip_address_value(addr_len)?;
        let generic_trap = pdu.read_integer()?;
        let specific_trap = pdu.read_integer()?;
        let ticks_len = pdu.expect_tag(tag::application::TIMETICKS)?;
        let time_stamp = pdu.read_unsigned32_value(ticks_len)?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(Self {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        })
    }
}
