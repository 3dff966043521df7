//! Purpose: Provide the HTTP client backend for the nodebook store protocol.
//! Exports: `RemoteStore`.
//! Role: Implements `NodeStore` by issuing one blocking request per
//! operation against a server speaking the `core::wire` contract.
//! Invariants: `connect` only records the endpoint; the first operation may
//! land before the server accepts and then fails with `ConnectionRefused`,
//! which callers retry in a bounded loop without rebuilding the client.
//! Invariants: No caching — every call reflects current server state.
//! Invariants: Server error envelopes decode back to store error kinds, so
//! callers cannot tell the backends apart by error handling alone.

use crate::core::error::{Error, ErrorKind};
use crate::core::node::{Attrs, Node, NodeId, TitleMatch};
use crate::core::store::{NodeStore, StoreResult};
use crate::core::wire::{
    self, CreatedBody, ErrorEnvelope, MatchesBody, MoveBody, RootBody, SearchBody,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

pub struct RemoteStore {
    agent: ureq::Agent,
    endpoint: Option<Url>,
}

impl RemoteStore {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            endpoint: None,
        }
    }

    /// Record the endpoint the store talks to. Does not touch the network;
    /// the remote server may start accepting later.
    pub fn connect(&mut self, base_url: impl Into<String>) -> StoreResult<()> {
        self.endpoint = Some(normalize_base_url(base_url.into())?);
        Ok(())
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    fn base(&self) -> StoreResult<&Url> {
        self.endpoint.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::NotConnected)
                .with_message("no endpoint recorded; call connect first")
        })
    }

    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        build_url(self.base()?, segments)
    }

    fn request_json<T, R>(&self, method: &str, url: &Url, body: Option<&T>) -> StoreResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let request = self
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        let response = match body {
            None => request.call(),
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
        };

        match response {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(transport_error(err)),
        }
    }
}

impl Default for RemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for RemoteStore {
    fn root_id(&self) -> StoreResult<NodeId> {
        let url = self.base()?.clone();
        let body: RootBody = self.request_json::<(), _>("GET", &url, None)?;
        Ok(body.rootid)
    }

    fn node(&self, id: &NodeId) -> StoreResult<Node> {
        let url = self.url(&["nodes", id.as_str()])?;
        let value: Value = self.request_json::<(), _>("GET", &url, None)?;
        wire::decode_node(id.clone(), value)
    }

    fn create_node(
        &self,
        parent: &NodeId,
        attrs: Attrs,
        id: Option<NodeId>,
    ) -> StoreResult<NodeId> {
        wire::ensure_plain_attrs(&attrs)?;
        let mut body = attrs;
        body.insert(
            wire::PARENT_KEY.to_string(),
            Value::String(parent.to_string()),
        );
        let url = match &id {
            Some(id) => self.url(&["nodes", id.as_str()])?,
            // Trailing slash: POST to the `nodes/` collection.
            None => self.url(&["nodes", ""])?,
        };
        let created: CreatedBody = self.request_json("POST", &url, Some(&body))?;
        Ok(created.nodeid)
    }

    fn set_attrs(&self, id: &NodeId, partial: Attrs) -> StoreResult<()> {
        wire::ensure_plain_attrs(&partial)?;
        let url = self.url(&["nodes", id.as_str()])?;
        let _ack: Value = self.request_json("PUT", &url, Some(&partial))?;
        Ok(())
    }

    fn delete_node(&self, id: &NodeId) -> StoreResult<()> {
        let url = self.url(&["nodes", id.as_str()])?;
        let _ack: Value = self.request_json::<(), _>("DELETE", &url, None)?;
        Ok(())
    }

    fn move_node(&self, id: &NodeId, new_parent: &NodeId) -> StoreResult<()> {
        let url = self.url(&["nodes", id.as_str(), "parent"])?;
        let body = MoveBody {
            parentid: new_parent.clone(),
        };
        let _ack: Value = self.request_json("PUT", &url, Some(&body))?;
        Ok(())
    }

    fn search_title(&self, query: &str) -> StoreResult<Vec<TitleMatch>> {
        let url = self.url(&["search"])?;
        let body = SearchBody {
            title: query.to_string(),
        };
        let matches: MatchesBody = self.request_json("POST", &url, Some(&body))?;
        Ok(matches.matches)
    }
}

fn normalize_base_url(raw: String) -> StoreResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Protocol)
            .with_message("invalid endpoint url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Protocol).with_message("endpoint must use http or https scheme")
        );
    }
    if url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Protocol).with_message("endpoint cannot be a base url"));
    }
    // Keep any path prefix, ensure it ends with a slash so routes nest
    // under it rather than replacing the last segment.
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base: &Url, segments: &[&str]) -> StoreResult<Url> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().map_err(|()| {
            Error::new(ErrorKind::Protocol).with_message("endpoint cannot be a base url")
        })?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn read_json_response<R>(response: ureq::Response) -> StoreResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::MalformedResponse)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        return wire::error_from_envelope(envelope);
    }
    Error::new(wire::kind_from_status(status))
        .with_message(format!("remote error status {status}"))
}

fn transport_error(err: ureq::Transport) -> Error {
    let kind = if connection_was_refused(&err) {
        ErrorKind::ConnectionRefused
    } else {
        ErrorKind::Io
    };
    Error::new(kind)
        .with_message("request failed")
        .with_source(err)
}

fn connection_was_refused(err: &ureq::Transport) -> bool {
    if err.kind() == ureq::ErrorKind::ConnectionFailed {
        return true;
    }
    // Some platforms surface the refusal as a plain io error.
    let mut source = std::error::Error::source(err);
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = current.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::{RemoteStore, build_url, normalize_base_url};
    use crate::core::error::ErrorKind;
    use crate::core::node::NodeId;
    use crate::core::store::NodeStore;

    #[test]
    fn normalize_base_url_keeps_the_prefix_and_adds_a_slash() {
        let url = normalize_base_url("http://localhost:8080/notebook".to_string()).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/notebook/");
        let url = normalize_base_url("http://localhost:8080".to_string()).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn normalize_base_url_rejects_other_schemes() {
        let err = normalize_base_url("ftp://localhost/".to_string()).expect_err("scheme");
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn build_url_nests_routes_under_the_prefix() {
        let base = normalize_base_url("http://localhost:8080/notebook/".to_string()).expect("url");
        let url = build_url(&base, &["nodes", "n1"]).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/notebook/nodes/n1");
        let url = build_url(&base, &["nodes", ""]).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/notebook/nodes/");
    }

    #[test]
    fn operations_before_connect_fail_with_not_connected() {
        let store = RemoteStore::new();
        let err = store.root_id().expect_err("not connected");
        assert_eq!(err.kind(), ErrorKind::NotConnected);
        let err = store.node(&NodeId::new("n1")).expect_err("not connected");
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn connect_records_the_endpoint_without_touching_the_network() {
        let mut store = RemoteStore::new();
        store
            .connect("http://127.0.0.1:1/notebook")
            .expect("connect");
        assert_eq!(
            store.endpoint().map(|url| url.as_str()),
            Some("http://127.0.0.1:1/notebook/")
        );
    }
}
