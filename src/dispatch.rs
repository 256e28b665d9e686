//! Authenticated request dispatch.
//!
//! Every storage call goes through [`Dispatcher`]: it makes sure a valid
//! token is cached (authenticating on a miss), attaches it as
//! `X-Auth-Token` and performs the call, buffered or with a streamed body.

use crate::auth::Authenticator;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::session::{Session, TokenStore};
use crate::types::{ApiResponse, FileList, ListEntry, ListFormat};
use crate::upload::ByteStream;
use bytes::Bytes;
use reqwest::{Body, Client, Method, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const HEADER_X_AUTH_TOKEN: &str = "X-Auth-Token";

/// Where an operation is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The storage account URL itself
    Storage,
    /// A path below the storage account URL, starting with `/`
    Path(String),
    /// An absolute URL
    Url(String),
}

/// Request body of an operation
pub enum OperationBody {
    Empty,
    Bytes(Bytes),
    Stream(ByteStream),
}

/// One API call, built per request by the client
pub struct Operation {
    pub method: Method,
    pub target: Target,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: OperationBody,
}

impl Operation {
    pub fn new(method: Method, target: Target) -> Self {
        Self {
            method,
            target,
            headers: Vec::new(),
            query: Vec::new(),
            body: OperationBody::Empty,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = OperationBody::Bytes(body.into());
        self
    }

    /// Pipe `stream` as the request body
    pub fn stream(mut self, stream: ByteStream) -> Self {
        self.body = OperationBody::Stream(stream);
        self
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self.body, OperationBody::Stream(_))
    }
}

/// Sends operations with a valid token attached
#[derive(Debug)]
pub struct Dispatcher {
    http: Client,
    storage_url: String,
    authenticator: Authenticator,
    store: TokenStore,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        http: Client,
        storage_url: impl Into<String>,
        authenticator: Authenticator,
        session: Session,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            storage_url: storage_url.into(),
            authenticator,
            store: TokenStore::new(session),
            clock,
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn storage_url(&self) -> &str {
        &self.storage_url
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Return a valid token, authenticating first if the cached one is
    /// missing or expired.
    ///
    /// Concurrent callers that all find the cache invalid share a single
    /// authentication exchange.
    pub async fn ensure_token(&self) -> Result<String> {
        if let Some(token) = self.store.valid_token(self.clock.now()).await {
            return Ok(token);
        }

        let _gate = self.store.auth_gate().await;
        // Another caller may have refreshed the token while we waited.
        if let Some(token) = self.store.valid_token(self.clock.now()).await {
            return Ok(token);
        }

        let issued = self.authenticator.authorize(&self.store).await?;
        Ok(issued.token)
    }

    /// Send `operation` and return once the response headers have arrived.
    ///
    /// Non-success statuses are turned into [`Error::Status`]; a `401`
    /// also drops the cached token.
    #[instrument(skip_all, fields(method = %operation.method, streamed = operation.is_streamed()))]
    pub async fn dispatch(&self, operation: Operation) -> Result<Response> {
        let token = self.ensure_token().await?;
        let url = self.url(&operation.target);
        debug!(%url, "Dispatching");

        let mut request = self.http.request(operation.method, &url);
        for (name, value) in &operation.headers {
            if name.eq_ignore_ascii_case(HEADER_X_AUTH_TOKEN) {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        request = request.header(HEADER_X_AUTH_TOKEN, token.as_str());

        if !operation.query.is_empty() {
            request = request.query(&operation.query);
        }

        request = match operation.body {
            OperationBody::Empty => request,
            OperationBody::Bytes(bytes) => request.body(bytes),
            OperationBody::Stream(stream) => request.body(Body::wrap_stream(stream)),
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED && self.store.clear_if(&token).await {
            warn!("Token rejected by storage, cleared");
        }

        Err(status_error(status, response.text().await))
    }

    /// Send `operation` and read the whole response
    pub async fn dispatch_buffered(&self, operation: Operation) -> Result<ApiResponse> {
        let response = self.dispatch(operation).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn url(&self, target: &Target) -> String {
        match target {
            Target::Storage => self.storage_url.clone(),
            Target::Path(path) => format!("{}{}", self.storage_url, path),
            Target::Url(url) => url.clone(),
        }
    }
}

/// Parse the body of a container listing.
///
/// `Json` yields object records, `Plain` yields names (trailing newline
/// stripped, empty body gives no names) and `Xml` is refused.
pub fn parse_file_list(body: &[u8], format: ListFormat) -> Result<FileList> {
    match format {
        ListFormat::Json => {
            let entries: Vec<ListEntry> = serde_json::from_slice(body)?;
            Ok(FileList::Entries(entries))
        }
        ListFormat::Xml => Err(xml_not_supported()),
        ListFormat::Plain => Ok(FileList::Names(parse_names(body))),
    }
}

/// Split a plain-text listing into names
pub fn parse_names(body: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim_end_matches('\n');
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').map(String::from).collect()
}

/// Error for a non-success response; a body that cannot be read is a
/// transport failure, not an empty body.
fn status_error(status: StatusCode, body: reqwest::Result<String>) -> Error {
    match body {
        Ok(body) => Error::Status { status, body },
        Err(err) => {
            debug!(%status, error = %err, "Failed to read error response body");
            Error::Request(err)
        }
    }
}

pub(crate) fn xml_not_supported() -> Error {
    Error::NotSupported("xml listing format".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectRecord;

    #[test]
    fn test_plain_listing() {
        let files = parse_file_list(b"a.png\nb.png\n", ListFormat::Plain).unwrap();
        assert_eq!(
            files,
            FileList::Names(vec!["a.png".to_string(), "b.png".to_string()])
        );
    }

    #[test]
    fn test_plain_listing_empty_body() {
        let files = parse_file_list(b"", ListFormat::Plain).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_xml_listing_rejected_regardless_of_body() {
        let bodies: [&[u8]; 3] = [b"", b"<container/>", b"a.png\n"];
        for body in bodies {
            let err = parse_file_list(body, ListFormat::Xml).unwrap_err();
            assert!(matches!(err, Error::NotSupported(_)));
        }
    }

    #[test]
    fn test_json_listing() {
        let body = br#"[{"bytes":5,"content_type":"text/plain","hash":"5d41402abc4b2a76b9719d911017c592","last_modified":"2024-03-01T10:00:00.000000","name":"hello.txt"}]"#;
        let files = parse_file_list(body, ListFormat::Json).unwrap();

        assert_eq!(
            files,
            FileList::Entries(vec![ListEntry::Object(ObjectRecord {
                bytes: 5,
                content_type: "text/plain".into(),
                hash: "5d41402abc4b2a76b9719d911017c592".into(),
                last_modified: "2024-03-01T10:00:00.000000".into(),
                name: "hello.txt".into(),
            })])
        );
    }

    #[test]
    fn test_json_listing_malformed() {
        let err = parse_file_list(b"a.png\n", ListFormat::Json).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_status_error_keeps_body() {
        let err = status_error(StatusCode::NOT_FOUND, Ok("Not Found".to_string()));
        match err {
            Error::Status { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "Not Found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_error_unreadable_body_is_request_error() {
        // Nothing listens on port 9, so this yields a genuine transport error.
        let read_err = reqwest::get("http://127.0.0.1:9").await.unwrap_err();

        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, Err(read_err));
        assert!(matches!(err, Error::Request(_)));
    }

    #[test]
    fn test_operation_builder() {
        let op = Operation::new(Method::PUT, Target::Path("/c".into()))
            .header("X-Container-Meta-Type", "public")
            .query("format", "json")
            .body("payload");

        assert_eq!(op.headers.len(), 1);
        assert_eq!(op.query, vec![("format".to_string(), "json".to_string())]);
        assert!(!op.is_streamed());
    }
}
