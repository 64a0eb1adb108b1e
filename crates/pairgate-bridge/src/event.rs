//! Events and version strings exchanged with the messaging client

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Protocol version, kept in the client's own notation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion(pub String);

impl ProtocolVersion {
    /// Parse the output of the client's version command
    ///
    /// Accepts a JSON array of numbers (`[2, 3000, 1023223821]`), a JSON
    /// string, or bare text.
    pub fn parse(output: &str) -> Option<Self> {
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return None;
        }

        let version = match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(parts)) => parts
                .iter()
                .map(|p| match p {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("."),
            Ok(Value::String(s)) => s,
            _ => trimmed.to_string(),
        };

        if version.is_empty() {
            None
        } else {
            Some(Self(version))
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of a `connection.update` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    /// Raw QR payload to be rendered for scanning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    /// Pairing code to be typed on the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
}

/// Event emitted by an open connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "connection.update")]
    ConnectionUpdate(ConnectionUpdate),
    #[serde(rename = "creds.update")]
    CredentialsUpdate { creds: Value },
}

impl ClientEvent {
    pub fn qr(payload: impl Into<String>) -> Self {
        ClientEvent::ConnectionUpdate(ConnectionUpdate {
            qr: Some(payload.into()),
            pairing_code: None,
        })
    }

    pub fn pairing_code(code: impl Into<String>) -> Self {
        ClientEvent::ConnectionUpdate(ConnectionUpdate {
            qr: None,
            pairing_code: Some(code.into()),
        })
    }
}

/// Parse one line of client output
///
/// Blank lines and unknown event types yield `None`.
pub fn parse_event(line: &str) -> Option<ClientEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Skipping client output {:?}: {}", line, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_formats() {
        assert_eq!(
            ProtocolVersion::parse("[2, 3000, 1023223821]\n").unwrap().to_string(),
            "2.3000.1023223821"
        );
        assert_eq!(ProtocolVersion::parse("\"2.3000.1\"").unwrap().0, "2.3000.1");
        assert_eq!(ProtocolVersion::parse("2.3000.1").unwrap().0, "2.3000.1");
        assert!(ProtocolVersion::parse("  \n").is_none());
        assert!(ProtocolVersion::parse("[]").is_none());
    }

    #[test]
    fn test_parse_connection_updates() {
        assert_eq!(
            parse_event(r#"{"type":"connection.update","qr":"2@abc"}"#),
            Some(ClientEvent::qr("2@abc"))
        );
        assert_eq!(
            parse_event(r#"{"type":"connection.update","pairingCode":"ABC-123"}"#),
            Some(ClientEvent::pairing_code("ABC-123"))
        );
        assert_eq!(
            parse_event(r#"{"type":"connection.update","connection":"open"}"#),
            Some(ClientEvent::ConnectionUpdate(ConnectionUpdate::default()))
        );
    }

    #[test]
    fn test_parse_creds_update() {
        let event = parse_event(r#"{"type":"creds.update","creds":{"registered":true}}"#);
        assert_eq!(
            event,
            Some(ClientEvent::CredentialsUpdate {
                creds: json!({ "registered": true })
            })
        );
    }

    #[test]
    fn test_parse_skips_noise() {
        assert!(parse_event("").is_none());
        assert!(parse_event("Connecting to server...").is_none());
        assert!(parse_event(r#"{"type":"messages.upsert"}"#).is_none());
    }
}
