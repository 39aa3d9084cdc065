//! Minimal MMS header walker.
//!
//! Reads the leading WSP-encoded header block of an MMS PDU far enough to
//! tell the transport what kind of PDU it holds and how the MMSC answered a
//! send. Bodies are never decoded.

use mms_core::store::{PduInspector, PduType, SendConfSummary};

const HEADER_MESSAGE_ID: u8 = 0x8B;
const HEADER_CONTENT_TYPE: u8 = 0x84;
const HEADER_MESSAGE_TYPE: u8 = 0x8C;
const HEADER_MMS_VERSION: u8 = 0x8D;
const HEADER_RESPONSE_STATUS: u8 = 0x92;
const HEADER_TRANSACTION_ID: u8 = 0x98;

const TYPE_SEND_REQ: u8 = 0x80;
const TYPE_SEND_CONF: u8 = 0x81;
const TYPE_RETRIEVE_CONF: u8 = 0x84;

const LENGTH_QUOTE: u8 = 0x1F;
const MAX_UINTVAR_BYTES: usize = 5;

/// Header values the transport cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeekedHeaders {
    pub message_type: Option<u8>,
    pub transaction_id: Option<String>,
    pub mms_version: Option<u8>,
    pub response_status: Option<u8>,
    pub message_id: Option<String>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn byte(&mut self) -> Option<u8> {
        let value = self.peek()?;
        self.pos += 1;
        Some(value)
    }

    fn skip(&mut self, count: usize) -> Option<()> {
        let end = self.pos.checked_add(count)?;
        if end > self.bytes.len() {
            return None;
        }
        self.pos = end;
        Some(())
    }

    fn uintvar(&mut self) -> Option<usize> {
        let mut value: usize = 0;
        for _ in 0..MAX_UINTVAR_BYTES {
            let byte = self.byte()?;
            value = (value << 7) | usize::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Some(value);
            }
        }
        None
    }

    /// Null-terminated text, without a leading quote byte.
    fn text(&mut self) -> Option<String> {
        let bytes = self.bytes;
        let rest = bytes.get(self.pos..)?;
        let end = rest.iter().position(|byte| *byte == 0)?;
        let mut raw = &rest[..end];
        if let Some((first, tail)) = raw.split_first() {
            if *first == b'"' || *first == 0x7F {
                raw = tail;
            }
        }
        self.pos += end + 1;
        Some(String::from_utf8_lossy(raw).into_owned())
    }

    fn short_integer(&mut self) -> Option<u8> {
        let byte = self.byte()?;
        (byte >= 0x80).then_some(byte)
    }

    /// Skips one encoded value of any shape.
    fn skip_value(&mut self) -> Option<()> {
        match self.peek()? {
            0x80..=0xFF => self.skip(1),
            LENGTH_QUOTE => {
                self.pos += 1;
                let length = self.uintvar()?;
                self.skip(length)
            }
            length @ 0x00..=0x1E => {
                self.pos += 1;
                self.skip(usize::from(length))
            }
            _ => self.text().map(|_| ()),
        }
    }
}

/// Walks the header block until the content type or the end of the PDU.
/// Returns `None` for anything that does not start with a message type.
pub fn peek_headers(pdu: &[u8]) -> Option<PeekedHeaders> {
    let mut cursor = Cursor::new(pdu);
    if cursor.byte()? != HEADER_MESSAGE_TYPE {
        return None;
    }
    let mut headers =
        PeekedHeaders { message_type: Some(cursor.short_integer()?), ..Default::default() };

    while !cursor.at_end() {
        let Some(field) = cursor.byte() else { break };
        let parsed = match field {
            HEADER_CONTENT_TYPE => break,
            HEADER_TRANSACTION_ID => cursor.text().map(|id| headers.transaction_id = Some(id)),
            HEADER_MMS_VERSION => cursor.short_integer().map(|v| headers.mms_version = Some(v)),
            HEADER_RESPONSE_STATUS => {
                cursor.short_integer().map(|status| headers.response_status = Some(status))
            }
            HEADER_MESSAGE_ID => cursor.text().map(|id| headers.message_id = Some(id)),
            0x80..=0xFF => cursor.skip_value(),
            _ => {
                // Application header: the name is text starting at `field`.
                cursor.pos -= 1;
                cursor.text().and_then(|_| cursor.skip_value())
            }
        };
        if parsed.is_none() {
            log::debug!("pdu: truncated header block at offset {}", cursor.pos);
            break;
        }
    }
    Some(headers)
}

/// [`PduInspector`] backed by [`peek_headers`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderPeek;

impl PduInspector for HeaderPeek {
    fn message_type(&self, pdu: &[u8]) -> Option<PduType> {
        let value = peek_headers(pdu)?.message_type?;
        Some(match value {
            TYPE_SEND_REQ => PduType::SendReq,
            TYPE_SEND_CONF => PduType::SendConf,
            TYPE_RETRIEVE_CONF => PduType::RetrieveConf,
            other => PduType::Other(other),
        })
    }

    fn send_conf(&self, pdu: &[u8]) -> Option<SendConfSummary> {
        let headers = peek_headers(pdu)?;
        if headers.message_type != Some(TYPE_SEND_CONF) {
            return None;
        }
        Some(SendConfSummary {
            response_status: headers.response_status?,
            message_id: headers.message_id,
        })
    }
}
