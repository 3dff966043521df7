//! Purpose: Define the wire contract shared by the HTTP server and client.
//! Exports: request/response body types, the error envelope, kind/status
//! mappings, and node encode/decode helpers.
//! Role: Single source of truth for the transport codec; server and client
//! both depend on this module so the two ends cannot drift.
//! Invariants: Node GET responses are the attrs object plus the reserved
//! `parentid` and `childrenids` keys; caller attrs never contain them.
//! Invariants: The envelope `kind` string is authoritative on decode; the
//! HTTP status is only a fallback for envelope-less responses.
//! Invariants: Attr values keep their JSON number kind end to end —
//! serde_json writes whole-number floats with a trailing `.0` and parses
//! them back as floats, so integers and floats never swap kinds.

use crate::core::error::{Error, ErrorKind};
use crate::core::node::{Attrs, Node, NodeId, TitleMatch};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved key carrying the parent id (string or null) on the wire.
pub const PARENT_KEY: &str = "parentid";
/// Reserved key carrying the ordered child id list on the wire.
pub const CHILDREN_KEY: &str = "childrenids";

#[derive(Debug, Serialize, Deserialize)]
pub struct RootBody {
    pub rootid: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedBody {
    pub nodeid: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveBody {
    pub parentid: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchBody {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchesBody {
    pub matches: Vec<TitleMatch>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: WireError,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireError {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

pub fn envelope_for(err: &Error) -> ErrorEnvelope {
    ErrorEnvelope {
        error: WireError {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            node: err.node().map(str::to_string),
        },
    }
}

pub fn error_from_envelope(envelope: ErrorEnvelope) -> Error {
    let mut err = Error::new(kind_from_wire(&envelope.error.kind))
        .with_message(envelope.error.message);
    if let Some(node) = envelope.error.node {
        err = err.with_node(node);
    }
    err
}

pub fn kind_from_wire(kind: &str) -> ErrorKind {
    match kind {
        "NodeNotFound" => ErrorKind::NodeNotFound,
        "DuplicateId" => ErrorKind::DuplicateId,
        "CycleDetected" => ErrorKind::CycleDetected,
        "InvalidOperation" => ErrorKind::InvalidOperation,
        "Protocol" => ErrorKind::Protocol,
        _ => ErrorKind::Internal,
    }
}

pub fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::NodeNotFound => 404,
        ErrorKind::DuplicateId
        | ErrorKind::CycleDetected
        | ErrorKind::InvalidOperation
        | ErrorKind::Protocol => 400,
        _ => 500,
    }
}

pub fn kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 405 | 413 => ErrorKind::Protocol,
        404 => ErrorKind::NodeNotFound,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}

/// Parse a request body that must be a JSON object.
pub fn parse_object(bytes: &[u8]) -> Result<Attrs, Error> {
    let value: Value = serde_json::from_slice(bytes).map_err(|err| {
        Error::new(ErrorKind::Protocol)
            .with_message("request body is not valid json")
            .with_source(err)
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::new(ErrorKind::Protocol).with_message("request body must be a json object")),
    }
}

/// Parse a request body into a typed wire struct.
pub fn parse_body<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(bytes).map_err(|err| {
        Error::new(ErrorKind::Protocol)
            .with_message("request body does not match the expected shape")
            .with_source(err)
    })
}

/// Reject caller attrs that collide with the reserved wire keys.
pub fn ensure_plain_attrs(attrs: &Attrs) -> Result<(), Error> {
    for key in [PARENT_KEY, CHILDREN_KEY] {
        if attrs.contains_key(key) {
            return Err(Error::new(ErrorKind::Protocol)
                .with_message(format!("attribute key `{key}` is reserved by the wire protocol")));
        }
    }
    Ok(())
}

/// Split a create body into the optional parent id and the plain attrs.
pub fn split_create(mut body: Attrs) -> Result<(Option<NodeId>, Attrs), Error> {
    let parent = match body.remove(PARENT_KEY) {
        None => None,
        Some(Value::String(id)) => Some(NodeId::new(id)),
        Some(_) => {
            return Err(
                Error::new(ErrorKind::Protocol).with_message("`parentid` must be a string")
            );
        }
    };
    ensure_plain_attrs(&body)?;
    Ok((parent, body))
}

/// Encode a node snapshot as the attrs object plus reserved linkage keys.
pub fn encode_node(node: &Node) -> Value {
    let mut body = node.attrs.clone();
    body.insert(
        PARENT_KEY.to_string(),
        match &node.parent {
            Some(parent) => Value::String(parent.to_string()),
            None => Value::Null,
        },
    );
    body.insert(
        CHILDREN_KEY.to_string(),
        Value::Array(
            node.children
                .iter()
                .map(|child| Value::String(child.to_string()))
                .collect(),
        ),
    );
    Value::Object(body)
}

/// Decode a node GET response back into a snapshot. Used by the client;
/// a response missing the reserved keys is malformed.
pub fn decode_node(id: NodeId, value: Value) -> Result<Node, Error> {
    let Value::Object(mut body) = value else {
        return Err(malformed("node response is not a json object"));
    };
    let parent = match body.remove(PARENT_KEY) {
        Some(Value::Null) => None,
        Some(Value::String(parent)) => Some(NodeId::new(parent)),
        _ => return Err(malformed("node response has no `parentid`")),
    };
    let children = match body.remove(CHILDREN_KEY) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(child) => Ok(NodeId::new(child)),
                _ => Err(malformed("`childrenids` entries must be strings")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(malformed("node response has no `childrenids`")),
    };
    Ok(Node {
        id,
        parent,
        attrs: body,
        children,
    })
}

fn malformed(message: &str) -> Error {
    Error::new(ErrorKind::MalformedResponse).with_message(message)
}
