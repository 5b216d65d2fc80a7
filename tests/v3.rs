//! SNMPv3 USM against a live responder.

mod common;

use common::{ENGINE_ID, TestClient, TestResponder, monitor, sys_location, sys_name, user};
use snmp_responder::v3::{AuthProtocol, PrivProtocol, UsmUser, report_oids};
use snmp_responder::{ErrorStatus, Pdu, PduType, SecurityLevel, Value, VarBind};

#[tokio::test]
async fn discovery_returns_engine_id() {
    let responder = TestResponder::new().await;
    let client = TestClient::v2c(responder.addr()).await;

    let engine = client.discover().await;
    assert_eq!(engine.engine_id.as_ref(), ENGINE_ID);
    assert_eq!(engine.boots, 1);
    assert_eq!(engine.report.pdu_type, PduType::Report);
    assert_eq!(engine.report.varbinds[0].oid, report_oids::unknown_engine_ids());
    assert!(matches!(engine.report.varbinds[0].value, Value::Counter32(n) if n >= 1));
}

#[tokio::test]
async fn auth_priv_get_round_trips() {
    let responder = TestResponder::new().await;
    let client = TestClient::v2c(responder.addr()).await;
    let engine = client.discover().await;

    let (level, scoped) = client
        .v3_request(&engine, &user(), SecurityLevel::AuthPriv, b"", Pdu::get_request(41, &[sys_name()]))
        .await
        .expect("no v3 response");
    assert_eq!(level, SecurityLevel::AuthPriv);
    assert_eq!(scoped.pdu.pdu_type, PduType::Response);
    assert_eq!(scoped.pdu.request_id, 41);
    assert_eq!(scoped.pdu.varbinds[0].value.as_str(), Some("zeus.snmplabs.com"));
}

#[tokio::test]
async fn auth_no_priv_set_then_get() {
    let responder = TestResponder::builder().user(monitor()).start().await;
    let client = TestClient::v2c(responder.addr()).await;
    let engine = client.discover().await;

    let set = Pdu::set_request(42, vec![VarBind::new(sys_location(), Value::from("Shanghai"))]);
    let (level, scoped) = client
        .v3_request(&engine, &monitor(), SecurityLevel::AuthNoPriv, b"public", set)
        .await
        .unwrap();
    assert_eq!(level, SecurityLevel::AuthNoPriv);
    assert_eq!(scoped.pdu.error_status(), ErrorStatus::NoError);

    let (_, scoped) = client
        .v3_request(&engine, &user(), SecurityLevel::AuthPriv, b"", Pdu::get_request(43, &[sys_location()]))
        .await
        .unwrap();
    assert_eq!(scoped.pdu.varbinds[0].value.as_str(), Some("Shanghai"));
}

#[tokio::test]
async fn wrong_password_is_reported() {
    let responder = TestResponder::new().await;
    let client = TestClient::v2c(responder.addr()).await;
    let engine = client.discover().await;

    let impostor = UsmUser::new("simulator")
        .with_auth(AuthProtocol::Sha256, "not the password")
        .with_privacy(PrivProtocol::Aes128, "privatus");
    let (level, scoped) = client
        .v3_request(&engine, &impostor, SecurityLevel::AuthPriv, b"", Pdu::get_request(44, &[sys_name()]))
        .await
        .unwrap();
    assert_eq!(level, SecurityLevel::NoAuthNoPriv);
    assert_eq!(scoped.pdu.pdu_type, PduType::Report);
    assert_eq!(scoped.pdu.varbinds[0].oid, report_oids::wrong_digests());
}

#[tokio::test]
async fn unknown_user_is_reported() {
    let responder = TestResponder::new().await;
    let client = TestClient::v2c(responder.addr()).await;
    let engine = client.discover().await;

    let stranger = UsmUser::new("stranger");
    let (_, scoped) = client
        .v3_request(&engine, &stranger, SecurityLevel::NoAuthNoPriv, b"", Pdu::get_request(45, &[sys_name()]))
        .await
        .unwrap();
    assert_eq!(scoped.pdu.varbinds[0].oid, report_oids::unknown_user_names());
}

#[tokio::test]
async fn level_below_user_is_reported() {
    let responder = TestResponder::new().await;
    let client = TestClient::v2c(responder.addr()).await;
    let engine = client.discover().await;

    let set = Pdu::set_request(45, vec![VarBind::new(sys_location(), Value::from("Shanghai"))]);
    let (level, scoped) = client
        .v3_request(&engine, &user(), SecurityLevel::NoAuthNoPriv, b"", set)
        .await
        .unwrap();
    assert_eq!(level, SecurityLevel::NoAuthNoPriv);
    assert_eq!(scoped.pdu.pdu_type, PduType::Report);
    assert_eq!(scoped.pdu.varbinds[0].oid, report_oids::unsupported_sec_levels());

    let (_, scoped) = client
        .v3_request(&engine, &user(), SecurityLevel::AuthNoPriv, b"", Pdu::get_request(46, &[sys_location()]))
        .await
        .unwrap();
    assert_eq!(scoped.pdu.varbinds[0].oid, report_oids::unsupported_sec_levels());

    let (_, scoped) = client
        .v3_request(&engine, &user(), SecurityLevel::AuthPriv, b"", Pdu::get_request(47, &[sys_location()]))
        .await
        .unwrap();
    assert_eq!(scoped.pdu.pdu_type, PduType::Response);
    assert_eq!(scoped.pdu.varbinds[0].value.as_str(), Some("SNMPv1 trap sender"));
}

#[tokio::test]
async fn unknown_context_is_reported_at_request_level() {
    let responder = TestResponder::new().await;
    let client = TestClient::v2c(responder.addr()).await;
    let engine = client.discover().await;

    let (level, scoped) = client
        .v3_request(&engine, &user(), SecurityLevel::AuthPriv, b"nowhere", Pdu::get_request(46, &[sys_name()]))
        .await
        .unwrap();
    assert_eq!(level, SecurityLevel::AuthPriv);
    assert_eq!(scoped.pdu.pdu_type, PduType::Report);
    assert_eq!(scoped.pdu.varbinds[0].oid, report_oids::unknown_contexts());
}

#[tokio::test]
async fn stale_clock_gets_authenticated_time_window_report() {
    let responder = TestResponder::new().await;
    let client = TestClient::v2c(responder.addr()).await;
    let mut engine = client.discover().await;
    engine.time += 10_000;

    let (level, scoped) = client
        .v3_request(&engine, &user(), SecurityLevel::AuthPriv, b"", Pdu::get_request(47, &[sys_name()]))
        .await
        .unwrap();
    assert_eq!(level, SecurityLevel::AuthNoPriv);
    assert_eq!(scoped.pdu.varbinds[0].oid, report_oids::not_in_time_windows());
}

#[tokio::test]
async fn stale_clock_wins_over_bad_privacy_key() {
    let responder = TestResponder::new().await;
    let client = TestClient::v2c(responder.addr()).await;
    let mut engine = client.discover().await;
    engine.time += 10_000;

    let garbled = UsmUser::new("simulator")
        .with_auth(AuthProtocol::Sha256, "auctoritas")
        .with_privacy(PrivProtocol::Aes128, "not the privacy password");
    let (level, scoped) = client
        .v3_request(&engine, &garbled, SecurityLevel::AuthPriv, b"", Pdu::get_request(49, &[sys_name()]))
        .await
        .unwrap();
    assert_eq!(level, SecurityLevel::AuthNoPriv);
    assert_eq!(scoped.pdu.varbinds[0].oid, report_oids::not_in_time_windows());

    engine.time -= 10_000;
    let (_, scoped) = client
        .v3_request(&engine, &garbled, SecurityLevel::AuthPriv, b"", Pdu::get_request(50, &[sys_name()]))
        .await
        .unwrap();
    assert_eq!(scoped.pdu.varbinds[0].oid, report_oids::decryption_errors());
}

#[tokio::test]
async fn v3_context_selects_store() {
    let responder = TestResponder::builder()
        .context("lab/router1", "1.3.6.1.2.1.1.5.0|4|router1.lab\n")
        .start()
        .await;
    let client = TestClient::v2c(responder.addr()).await;
    let engine = client.discover().await;

    let (_, scoped) = client
        .v3_request(&engine, &user(), SecurityLevel::AuthPriv, b"lab/router1", Pdu::get_request(48, &[sys_name()]))
        .await
        .unwrap();
    assert_eq!(scoped.pdu.varbinds[0].value.as_str(), Some("router1.lab"));
}
