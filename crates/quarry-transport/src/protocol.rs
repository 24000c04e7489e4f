// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire frames exchanged over the extension socket.

use quarry_core::{
    ExtensionInfo, ExtensionRegistry, ExtensionResponse, ExtensionStatus, ExtensionUuid,
    PluginRequest, Row,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::TransportError;

/// One request frame. The `method` tag selects the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Call {
        registry: String,
        item: String,
        #[serde(default)]
        request: PluginRequest,
    },
    Shutdown,
    RegisterExtension {
        info: ExtensionInfo,
        registry: ExtensionRegistry,
    },
    DeregisterExtension {
        uuid: ExtensionUuid,
    },
    Query {
        sql: String,
    },
    GetQueryColumns {
        sql: String,
    },
    StreamEvents {
        name: String,
        events: Vec<Row>,
    },
}

impl Request {
    /// Wire name of the method, as it appears in the `method` tag.
    pub fn method(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Call { .. } => "call",
            Request::Shutdown => "shutdown",
            Request::RegisterExtension { .. } => "register_extension",
            Request::DeregisterExtension { .. } => "deregister_extension",
            Request::Query { .. } => "query",
            Request::GetQueryColumns { .. } => "get_query_columns",
            Request::StreamEvents { .. } => "stream_events",
        }
    }
}

/// One reply frame.
///
/// `status` is optional on the wire so that a peer omitting it is detected
/// rather than read as success.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub status: Option<ExtensionStatus>,
    #[serde(default)]
    pub response: Vec<Row>,
}

impl Reply {
    pub fn from_status(status: ExtensionStatus) -> Self {
        Self {
            status: Some(status),
            response: Vec::new(),
        }
    }

    pub fn from_response(response: ExtensionResponse) -> Self {
        Self {
            status: Some(response.status),
            response: response.response,
        }
    }

    pub fn into_status(self) -> Result<ExtensionStatus, TransportError> {
        self.status.ok_or(TransportError::MissingStatus)
    }

    pub fn into_response(self) -> Result<ExtensionResponse, TransportError> {
        let status = self.status.ok_or(TransportError::MissingStatus)?;
        Ok(ExtensionResponse {
            status,
            response: self.response,
        })
    }
}

/// Serializes a frame to a single JSON line (without the trailing newline).
pub fn encode<T: Serialize>(frame: &T) -> Result<String, TransportError> {
    Ok(serde_json::to_string(frame)?)
}

/// Parses a single JSON line into a frame.
pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, TransportError> {
    Ok(serde_json::from_str(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::row;

    #[test]
    fn call_frame_uses_method_tag() {
        let request = Request::Call {
            registry: "table".into(),
            item: "example_table".into(),
            request: row([("action", "generate")]),
        };
        let line = encode(&request).unwrap();
        assert!(line.starts_with(r#"{"method":"call""#), "got {line}");
        assert!(!line.contains('\n'));
        assert_eq!(decode::<Request>(&line).unwrap(), request);
    }

    #[test]
    fn unit_methods_decode_from_bare_tag() {
        assert_eq!(decode::<Request>(r#"{"method":"ping"}"#).unwrap(), Request::Ping);
        assert_eq!(
            decode::<Request>(r#"{"method":"shutdown"}"#).unwrap(),
            Request::Shutdown
        );
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(decode::<Request>(r#"{"method":"explode"}"#).is_err());
    }

    #[test]
    fn reply_without_status_is_an_error() {
        let reply: Reply = decode(r#"{"response":[{"1":"1"}]}"#).unwrap();
        assert!(matches!(
            reply.into_response(),
            Err(TransportError::MissingStatus)
        ));
    }

    #[test]
    fn method_names_match_wire_tags() {
        let request = Request::StreamEvents {
            name: "example_events".into(),
            events: vec![],
        };
        let line = encode(&request).unwrap();
        assert!(line.contains(&format!(r#""method":"{}""#, request.method())));
    }
}
