use mms_core::store::{PduInspector, PduType};
use mms_daemon::pdu_peek::{peek_headers, HeaderPeek};

// m-send-conf: type, transaction id, version 1.2, status Ok, message id.
const SEND_CONF: &[u8] = &[
    0x8C, 0x81, 0x98, b'T', b'1', 0x00, 0x8D, 0x92, 0x92, 0x80, 0x8B, b'm', b'i', b'd', b'-', b'7',
    0x00,
];

#[test]
fn send_conf_headers_are_read() {
    let headers = peek_headers(SEND_CONF).expect("headers");
    assert_eq!(headers.message_type, Some(0x81));
    assert_eq!(headers.transaction_id.as_deref(), Some("T1"));
    assert_eq!(headers.mms_version, Some(0x92));
    assert_eq!(headers.response_status, Some(0x80));
    assert_eq!(headers.message_id.as_deref(), Some("mid-7"));

    let summary = HeaderPeek.send_conf(SEND_CONF).expect("summary");
    assert!(summary.is_accepted());
    assert_eq!(summary.message_id.as_deref(), Some("mid-7"));
}

#[test]
fn message_types_are_classified() {
    assert_eq!(HeaderPeek.message_type(&[0x8C, 0x80, 0x98, b'a', 0x00]), Some(PduType::SendReq));
    assert_eq!(HeaderPeek.message_type(SEND_CONF), Some(PduType::SendConf));
    assert_eq!(HeaderPeek.message_type(&[0x8C, 0x84]), Some(PduType::RetrieveConf));
    assert_eq!(HeaderPeek.message_type(&[0x8C, 0x82]), Some(PduType::Other(0x82)));
    assert_eq!(HeaderPeek.message_type(b"<html>"), None);
}

#[test]
fn walk_stops_at_content_type() {
    // retrieve-conf whose body would otherwise look like a message-id header
    let pdu = [0x8C, 0x84, 0x98, b'x', 0x00, 0x84, 0xA3, 0x8B, b'n', b'o', 0x00];
    let headers = peek_headers(&pdu).expect("headers");
    assert_eq!(headers.transaction_id.as_deref(), Some("x"));
    assert_eq!(headers.message_id, None);
}

#[test]
fn unknown_and_application_headers_are_skipped() {
    let pdu = [
        0x8C, 0x81, // message type
        0x85, 0x04, 0x60, 0x00, 0x00, 0x00, // date, long integer
        b'X', b'-', b'A', 0x00, b'v', 0x00, // application header
        0x92, 0x88, // response status: rejected
    ];
    let summary = HeaderPeek.send_conf(&pdu).expect("summary");
    assert_eq!(summary.response_status, 0x88);
    assert!(!summary.is_accepted());
    assert_eq!(summary.message_id, None);
}

#[test]
fn send_conf_needs_a_status() {
    assert_eq!(HeaderPeek.send_conf(&[0x8C, 0x81, 0x8B, b'i', 0x00]), None);
    assert_eq!(HeaderPeek.send_conf(&[0x8C, 0x84, 0x92, 0x80]), None);
}
