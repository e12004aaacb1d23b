use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::Transaction;

/// Keyset position in the `(created_at, transaction_id)` ordering.
/// Wire format: "{created_at_rfc3339}|{transaction_id}", base64url encoded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub transaction_id: String,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, transaction_id: impl Into<String>) -> Self {
        Self {
            created_at,
            transaction_id: transaction_id.into(),
        }
    }

    pub fn of(tx: &Transaction) -> Self {
        Self::new(tx.created_at, tx.transaction_id.clone())
    }

    pub fn encode(&self) -> String {
        encode(self.created_at, &self.transaction_id)
    }
}

pub fn encode(created_at: DateTime<Utc>, transaction_id: &str) -> String {
    let s = format!(
        "{}|{}",
        created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        transaction_id
    );
    URL_SAFE_NO_PAD.encode(s)
}

pub fn decode(cursor: &str) -> Result<Cursor, String> {
    let decoded = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|e| format!("base64 decode error: {}", e))?;
    let s = String::from_utf8(decoded).map_err(|e| format!("utf8 error: {}", e))?;
    let mut parts = s.splitn(2, '|');
    let ts_str = parts.next().ok_or_else(|| "missing timestamp in cursor".to_string())?;
    let id_str = parts
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "missing transaction id in cursor".to_string())?;
    let ts = DateTime::parse_from_rfc3339(ts_str)
        .map_err(|e| format!("timestamp parse error: {}", e))?
        .with_timezone(&Utc);
    Ok(Cursor::new(ts, id_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cursor_survives_encoding_with_nanos() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let cursor = Cursor::new(ts, "txn|with|pipes");

        let decoded = decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_garbage_cursor_rejected() {
        assert!(decode("not base64!!").is_err());
        assert!(decode(&URL_SAFE_NO_PAD.encode("2024-01-01T00:00:00Z")).is_err());
        assert!(decode(&URL_SAFE_NO_PAD.encode("yesterday|txn_001")).is_err());
    }

    #[test]
    fn test_cursor_ordering_breaks_ties_by_id() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(Cursor::new(ts, "a") < Cursor::new(ts, "b"));
        assert!(Cursor::new(ts, "z") < Cursor::new(ts + chrono::Duration::nanoseconds(1), "a"));
    }
}
