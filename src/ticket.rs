use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AltSendError, Result},
    models::{EntryKind, TransferDescriptor},
};

pub const TICKET_PREFIX: &str = "blob";

/// Unprefixed tickets longer than this are assumed to be in some other format.
pub const MIN_LEGACY_LENGTH: usize = 50;

pub const DEFAULT_TICKET_SIZE: u64 = 1024 * 1024;

pub const DEFAULT_FILE_NAME: &str = "received_file";

const DELIMITER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(String);

impl Ticket {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<TransferDescriptor> {
        decode(&self.0)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticket {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Ticket {
    type Err = AltSendError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AltSendError::EmptyTicket);
        }
        if !is_valid(trimmed) {
            return Err(AltSendError::InvalidTicket);
        }
        Ok(Ticket(trimmed.to_string()))
    }
}

pub fn is_valid(ticket: &str) -> bool {
    let trimmed = ticket.trim();
    !trimmed.is_empty()
        && (trimmed.starts_with(TICKET_PREFIX) || trimmed.chars().count() > MIN_LEGACY_LENGTH)
}

pub fn encode(descriptor: &TransferDescriptor) -> Ticket {
    Ticket(format!(
        "{TICKET_PREFIX}{}{DELIMITER}{}{DELIMITER}{}",
        descriptor.content_id, descriptor.name, descriptor.size
    ))
}

/// Strict decoding: the prefix, all three fields and a decimal size are required.
///
/// The content id never contains the delimiter, so everything between the first
/// and the last one is the name. The entry kind is not part of the ticket and
/// always decodes as [`EntryKind::File`].
pub fn decode(ticket: &str) -> Result<TransferDescriptor> {
    let rest = ticket
        .trim()
        .strip_prefix(TICKET_PREFIX)
        .ok_or(AltSendError::MalformedTicket)?;

    let (content_id, rest) = rest
        .split_once(DELIMITER)
        .ok_or(AltSendError::MalformedTicket)?;
    let (name, size) = rest
        .rsplit_once(DELIMITER)
        .ok_or(AltSendError::MalformedTicket)?;

    if content_id.is_empty() || name.is_empty() {
        return Err(AltSendError::MalformedTicket);
    }

    let size = size
        .parse::<u64>()
        .map_err(|_| AltSendError::InvalidSize(size.to_string()))?;

    Ok(TransferDescriptor {
        content_id: content_id.to_string(),
        name: name.to_string(),
        size,
        kind: EntryKind::File,
    })
}

/// Best-effort decoding for tickets that only pass the length heuristic.
///
/// Missing or unreadable fields fall back to [`DEFAULT_FILE_NAME`] and
/// [`DEFAULT_TICKET_SIZE`]; only an empty ticket is rejected.
pub fn decode_lenient(ticket: &str) -> Result<TransferDescriptor> {
    let trimmed = ticket.trim();
    if trimmed.is_empty() {
        return Err(AltSendError::EmptyTicket);
    }

    let (head, rest) = trimmed.split_once(DELIMITER).unwrap_or((trimmed, ""));
    let content_id = head.strip_prefix(TICKET_PREFIX).unwrap_or(head).to_string();

    let (name, size) = match rest.rsplit_once(DELIMITER) {
        Some((name, size)) => (name, size.parse::<u64>().ok()),
        None => (rest, None),
    };
    let name = if name.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        name.to_string()
    };
    let size = size.unwrap_or(DEFAULT_TICKET_SIZE);

    Ok(TransferDescriptor {
        content_id,
        name,
        size,
        kind: EntryKind::File,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, size: u64) -> TransferDescriptor {
        TransferDescriptor {
            content_id: "ab".repeat(32),
            name: name.to_string(),
            size,
            kind: EntryKind::File,
        }
    }

    #[test]
    fn encoded_ticket_is_valid_and_decodes_back() {
        let d = descriptor("holiday photos.zip", 10 * 1024 * 1024);
        let ticket = encode(&d);

        assert!(ticket.as_str().starts_with("blobabab"));
        assert!(is_valid(ticket.as_str()));
        assert_eq!(decode(ticket.as_str()).unwrap(), d);
    }

    #[test]
    fn encode_is_deterministic() {
        let d = descriptor("a.txt", 3);
        assert_eq!(encode(&d), encode(&d));
    }

    #[test]
    fn delimiter_in_name_survives_round_trip() {
        let d = descriptor("12:30 notes.txt", 5);
        let ticket = encode(&d);
        assert_eq!(decode(ticket.as_str()).unwrap(), d);

        let d = descriptor("a:b:c", 0);
        assert_eq!(decode(encode(&d).as_str()).unwrap(), d);
    }

    #[test]
    fn decodes_handwritten_ticket() {
        let decoded = decode("blobAABB...:report.pdf:2048").unwrap();
        assert_eq!(decoded.name, "report.pdf");
        assert_eq!(decoded.size, 2048);
        assert_eq!(decoded.content_id, "AABB...");
    }

    #[test]
    fn validity_heuristic() {
        assert!(!is_valid(""));
        assert!(!is_valid("   "));
        assert!(!is_valid("xx"));
        assert!(is_valid("  blob  "));
        assert!(is_valid(&"x".repeat(51)));
        assert!(!is_valid(&"x".repeat(50)));
    }

    #[test]
    fn strict_decode_errors() {
        assert!(matches!(decode("xx"), Err(AltSendError::MalformedTicket)));
        assert!(matches!(decode("blobabc"), Err(AltSendError::MalformedTicket)));
        assert!(matches!(decode("blobabc:name"), Err(AltSendError::MalformedTicket)));
        assert!(matches!(decode("blob:name:12"), Err(AltSendError::MalformedTicket)));
        assert!(matches!(decode("blobabc::12"), Err(AltSendError::MalformedTicket)));
        assert!(matches!(
            decode("blobabc:name:-4"),
            Err(AltSendError::InvalidSize(s)) if s == "-4"
        ));
        assert!(matches!(
            decode("blobabc:name:lots"),
            Err(AltSendError::InvalidSize(_))
        ));
    }

    #[test]
    fn lenient_decode_falls_back() {
        let d = decode_lenient("blobabc:name:lots").unwrap();
        assert_eq!(d.name, "name");
        assert_eq!(d.size, DEFAULT_TICKET_SIZE);

        let d = decode_lenient(&"q".repeat(60)).unwrap();
        assert_eq!(d.name, DEFAULT_FILE_NAME);
        assert_eq!(d.size, DEFAULT_TICKET_SIZE);

        let d = decode_lenient("blobabc:doc.txt").unwrap();
        assert_eq!(d.name, "doc.txt");
        assert_eq!(d.size, DEFAULT_TICKET_SIZE);

        let d = decode_lenient("blobabc:doc.txt:77").unwrap();
        assert_eq!(d.content_id, "abc");
        assert_eq!(d.size, 77);

        assert!(matches!(decode_lenient(" "), Err(AltSendError::EmptyTicket)));
    }

    #[test]
    fn parse_ticket_type() {
        assert!(matches!("".parse::<Ticket>(), Err(AltSendError::EmptyTicket)));
        assert!(matches!("xx".parse::<Ticket>(), Err(AltSendError::InvalidTicket)));
        let t: Ticket = "  blobab:x:1 ".parse().unwrap();
        assert_eq!(t.as_str(), "blobab:x:1");
        assert_eq!(t.decode().unwrap().size, 1);
    }
}
