//! Record fixtures and well-known OIDs.

use snmp_responder::v3::{AuthProtocol, PrivProtocol};
use snmp_responder::{Oid, UsmUser, oid};

/// Engine id every TestResponder uses.
pub const ENGINE_ID: &[u8] = b"\x80\x00\x1f\x88\x05responder";

/// The `public` context: system group plus a three-row ifTable.
///
/// sysLocation.0 is a write cache holding "SNMPv1 trap sender".
pub fn records() -> String {
    let mut text = String::from(
        "\
1.3.6.1.2.1.1.1.0|4|Linux zeus 4.8.6.5-smp
1.3.6.1.2.1.1.2.0|6|1.3.6.1.4.1.8072.3.2.10
1.3.6.1.2.1.1.3.0|67|0|uptime
1.3.6.1.2.1.1.4.0|4|info@snmplabs.com|writecache
1.3.6.1.2.1.1.5.0|4|zeus.snmplabs.com
1.3.6.1.2.1.1.6.0|4|SNMPv1 trap sender|writecache
1.3.6.1.2.1.1.7.0|2|72
1.3.6.1.2.1.2.1.0|2|3
",
    );
    for i in 1..=3 {
        text.push_str(&format!("1.3.6.1.2.1.2.2.1.1.{i}|2|{i}\n"));
        text.push_str(&format!("1.3.6.1.2.1.2.2.1.2.{i}|4|eth{}\n", i - 1));
        text.push_str(&format!("1.3.6.1.2.1.2.2.1.10.{i}|65|{}|counter:step=100\n", i * 1000));
    }
    text
}

pub fn user() -> UsmUser {
    UsmUser::new("simulator")
        .with_auth(AuthProtocol::Sha256, "auctoritas")
        .with_privacy(PrivProtocol::Aes128, "privatus")
}

/// An authNoPriv user.
pub fn monitor() -> UsmUser {
    UsmUser::new("monitor").with_auth(AuthProtocol::Sha1, "auctoritas")
}

/// sysDescr.0
pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

/// sysUpTime.0
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

/// sysName.0
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}

/// sysLocation.0
pub fn sys_location() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)
}

pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

pub fn interfaces_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2)
}

/// ifDescr column
pub fn ifdescr_column() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)
}

/// ifInOctets.N
pub fn if_in_octets(index: u32) -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10).child(index)
}

pub fn nonexistent_oid() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0)
}
