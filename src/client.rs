use crate::auth::Authenticator;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dispatch::{parse_file_list, parse_names, xml_not_supported, Dispatcher, Operation, Target};
use crate::error::{Error, Result, ValidationError};
use crate::protocol::AuthProtocol;
use crate::session::Session;
use crate::types::*;
use crate::upload::normalize_upload_source;
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::sync::Arc;
use tracing::instrument;

/// Trait for storage operations
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Account statistics
    async fn get_account_info(&self) -> Result<AccountInfo>;

    /// Summary storage information
    async fn get_info(&self) -> Result<ApiResponse>;

    /// List containers, as JSON records or plain names
    async fn get_containers(&self, json: bool) -> Result<ContainerList>;

    /// Create a container
    async fn create_container(&self, params: CreateContainer) -> Result<ApiResponse>;

    /// Container statistics
    async fn get_container_info(&self, container: &str) -> Result<ContainerInfo>;

    /// List objects of a container
    async fn get_files(&self, params: ListFiles) -> Result<FilesResponse>;

    /// Upload one object
    async fn upload_file(&self, params: UploadFile) -> Result<UploadResponse>;

    /// Delete several objects of one container in a single request
    async fn delete_files(&self, params: DeleteFiles) -> Result<ApiResponse>;

    /// Delete one object
    async fn delete_file(&self, params: DeleteFile) -> Result<ApiResponse>;

    /// Delete an empty container
    async fn delete_container(&self, container: &str) -> Result<ApiResponse>;
}

/// Client for Selectel Cloud Storage.
///
/// Methods take `&self`; share the client through an `Arc` for concurrent use.
#[derive(Debug)]
pub struct StorageClient {
    dispatcher: Dispatcher,
    info_url: String,
}

impl StorageClient {
    /// Create a client with the system clock
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a client whose token expiry decisions use `clock`
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let endpoints = config.endpoints()?;

        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        let authenticator = Authenticator::new(
            http.clone(),
            endpoints.auth_url,
            config.protocol,
            config.credentials(),
            Arc::clone(&clock),
        );

        let session = match &config.token {
            Some(token) => Session::with_token(token.as_str(), None),
            None => Session::default(),
        };

        Ok(Self {
            dispatcher: Dispatcher::new(http, endpoints.storage_url, authenticator, session, clock),
            info_url: endpoints.info_url,
        })
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.dispatcher.authenticator().protocol()
    }

    pub fn storage_url(&self) -> &str {
        self.dispatcher.storage_url()
    }

    /// Copy of the cached token state
    pub async fn session(&self) -> Session {
        self.dispatcher.store().snapshot().await
    }

    /// Drop the cached token; the next call authenticates again
    pub async fn logout(&self) {
        self.dispatcher.store().clear().await;
    }

    /// Make sure a valid token is cached and return it
    pub async fn authorize(&self) -> Result<String> {
        self.dispatcher.ensure_token().await
    }

    /// Account statistics
    #[instrument(skip(self))]
    pub async fn get_account_info(&self) -> Result<AccountInfo> {
        let response = self
            .dispatcher
            .dispatch_buffered(Operation::new(Method::GET, Target::Storage))
            .await?;

        Ok(AccountInfo {
            status: response.status,
            container_count: header_u64(&response.headers, "x-account-container-count"),
            object_count: header_u64(&response.headers, "x-account-object-count"),
            bytes_used: header_u64(&response.headers, "x-account-bytes-used"),
        })
    }

    /// Summary storage information
    #[instrument(skip(self))]
    pub async fn get_info(&self) -> Result<ApiResponse> {
        self.dispatcher
            .dispatch_buffered(Operation::new(Method::GET, Target::Url(self.info_url.clone())))
            .await
    }

    /// List containers, as JSON records or plain names
    #[instrument(skip(self))]
    pub async fn get_containers(&self, json: bool) -> Result<ContainerList> {
        let mut operation = Operation::new(Method::GET, Target::Storage);
        if json {
            operation = operation.query("format", "json");
        }

        let response = self.dispatcher.dispatch_buffered(operation).await?;

        if json {
            let records: Vec<ContainerRecord> = serde_json::from_slice(&response.body)?;
            Ok(ContainerList::Records(records))
        } else {
            Ok(ContainerList::Names(parse_names(&response.body)))
        }
    }

    /// Create a container
    #[instrument(skip(self, params), fields(container = %params.container))]
    pub async fn create_container(&self, params: CreateContainer) -> Result<ApiResponse> {
        require_container(&params.container)?;

        let mut operation =
            Operation::new(Method::PUT, Target::Path(container_path(&params.container)))
                .header("X-Container-Meta-Type", params.container_type.as_str());
        for (key, value) in &params.metadata {
            operation = operation.header(format!("X-Container-Meta-{}", key), value.as_str());
        }

        self.dispatcher.dispatch_buffered(operation).await
    }

    /// Container statistics
    #[instrument(skip(self))]
    pub async fn get_container_info(&self, container: &str) -> Result<ContainerInfo> {
        require_container(container)?;

        let response = self
            .dispatcher
            .dispatch_buffered(Operation::new(
                Method::GET,
                Target::Path(container_path(container)),
            ))
            .await?;

        Ok(ContainerInfo {
            status: response.status,
            object_count: header_u64(&response.headers, "x-container-object-count"),
            bytes_used: header_u64(&response.headers, "x-container-bytes-used"),
            container_type: response.header("x-container-meta-type").map(String::from),
        })
    }

    /// List objects of a container
    #[instrument(skip(self, params), fields(container = %params.container))]
    pub async fn get_files(&self, params: ListFiles) -> Result<FilesResponse> {
        require_container(&params.container)?;
        if params.format == ListFormat::Xml {
            return Err(xml_not_supported());
        }

        let mut operation =
            Operation::new(Method::GET, Target::Path(container_path(&params.container)));
        if let Some(format) = params.format.query_value() {
            operation = operation.query("format", format);
        }
        if let Some(limit) = params.limit {
            operation = operation.query("limit", limit.to_string());
        }
        if let Some(marker) = &params.marker {
            operation = operation.query("marker", marker.as_str());
        }
        if let Some(prefix) = &params.prefix {
            operation = operation.query("prefix", prefix.as_str());
        }
        if let Some(delimiter) = &params.delimiter {
            operation = operation.query("delimiter", delimiter.as_str());
        }

        let response = self.dispatcher.dispatch_buffered(operation).await?;
        let files = parse_file_list(&response.body, params.format)?;

        Ok(FilesResponse {
            files,
            files_amount: header_u64(&response.headers, "x-container-object-count"),
            container_size: header_u64(&response.headers, "x-container-bytes-used"),
            container_type: response.header("x-container-meta-type").map(String::from),
        })
    }

    /// Upload one object, streaming its body
    #[instrument(skip(self, params), fields(container = %params.container, file = %params.file_name))]
    pub async fn upload_file(&self, params: UploadFile) -> Result<UploadResponse> {
        require_container(&params.container)?;
        require_file(&params.file_name)?;

        let UploadFile {
            container,
            file_name,
            source,
            delete_at,
            lifetime,
            etag,
            content_type,
            metadata,
        } = params;

        let stream = normalize_upload_source(source).await?;

        let mut operation =
            Operation::new(Method::PUT, Target::Path(object_path(&container, &file_name)));
        if let Some(delete_at) = delete_at {
            operation = operation.header("X-Delete-At", delete_at.to_string());
        }
        if let Some(lifetime) = lifetime {
            operation = operation.header("X-Delete-After", lifetime.to_string());
        }
        if let Some(etag) = etag {
            operation = operation.header("ETag", etag);
        }
        if let Some(content_type) = content_type {
            operation = operation.header("Content-Type", content_type);
        }
        for (key, value) in metadata {
            operation = operation.header(format!("X-Object-Meta-{}", key), value);
        }

        let response = self.dispatcher.dispatch(operation.stream(stream)).await?;
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Ok(UploadResponse {
            status: response.status(),
            etag,
        })
    }

    /// Delete several objects of one container in a single request.
    ///
    /// The service reports per-object outcomes in the response body, which
    /// is returned as received.
    #[instrument(skip(self, params), fields(container = %params.container, files = params.files.len()))]
    pub async fn delete_files(&self, params: DeleteFiles) -> Result<ApiResponse> {
        require_container(&params.container)?;
        if params.files.is_empty() {
            return Err(ValidationError::MissingFiles.into());
        }

        let body = params
            .files
            .iter()
            .map(|file| format!("{}/{}", params.container, file))
            .collect::<Vec<_>>()
            .join("\n");

        let operation = Operation::new(Method::POST, Target::Storage)
            .header("Content-Type", mime::TEXT_PLAIN.essence_str())
            .query("bulk-delete", "true")
            .body(body);

        self.dispatcher.dispatch_buffered(operation).await
    }

    /// Delete one object
    #[instrument(skip(self, params), fields(container = %params.container, file = %params.file))]
    pub async fn delete_file(&self, params: DeleteFile) -> Result<ApiResponse> {
        require_container(&params.container)?;
        require_file(&params.file)?;

        self.dispatcher
            .dispatch_buffered(Operation::new(
                Method::DELETE,
                Target::Path(object_path(&params.container, &params.file)),
            ))
            .await
    }

    /// Delete a container; the service refuses with `409` while it holds objects
    #[instrument(skip(self))]
    pub async fn delete_container(&self, container: &str) -> Result<ApiResponse> {
        require_container(container)?;

        self.dispatcher
            .dispatch_buffered(Operation::new(
                Method::DELETE,
                Target::Path(container_path(container)),
            ))
            .await
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    async fn get_account_info(&self) -> Result<AccountInfo> {
        StorageClient::get_account_info(self).await
    }

    async fn get_info(&self) -> Result<ApiResponse> {
        StorageClient::get_info(self).await
    }

    async fn get_containers(&self, json: bool) -> Result<ContainerList> {
        StorageClient::get_containers(self, json).await
    }

    async fn create_container(&self, params: CreateContainer) -> Result<ApiResponse> {
        StorageClient::create_container(self, params).await
    }

    async fn get_container_info(&self, container: &str) -> Result<ContainerInfo> {
        StorageClient::get_container_info(self, container).await
    }

    async fn get_files(&self, params: ListFiles) -> Result<FilesResponse> {
        StorageClient::get_files(self, params).await
    }

    async fn upload_file(&self, params: UploadFile) -> Result<UploadResponse> {
        StorageClient::upload_file(self, params).await
    }

    async fn delete_files(&self, params: DeleteFiles) -> Result<ApiResponse> {
        StorageClient::delete_files(self, params).await
    }

    async fn delete_file(&self, params: DeleteFile) -> Result<ApiResponse> {
        StorageClient::delete_file(self, params).await
    }

    async fn delete_container(&self, container: &str) -> Result<ApiResponse> {
        StorageClient::delete_container(self, container).await
    }
}

fn require_container(container: &str) -> Result<()> {
    if container.is_empty() {
        return Err(ValidationError::MissingContainer.into());
    }
    Ok(())
}

fn require_file(file: &str) -> Result<()> {
    if file.is_empty() {
        return Err(ValidationError::MissingFile.into());
    }
    Ok(())
}

fn container_path(container: &str) -> String {
    format!("/{}", urlencoding::encode(container))
}

/// Object names may contain `/`; each segment is encoded on its own.
fn object_path(container: &str, name: &str) -> String {
    let name = name
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", container_path(container), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> StorageClient {
        StorageClient::new(
            Config::new("12345_alice", "secret").with_endpoint("http://127.0.0.1:9"),
        )
        .unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client();
        assert_eq!(client.storage_url(), "http://127.0.0.1:9/v1/SEL_12345");
        assert_eq!(client.protocol(), AuthProtocol::V3);
    }

    #[test]
    fn test_client_requires_password() {
        let err = StorageClient::new(Config::new("12345_alice", "")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_object_path_encoding() {
        assert_eq!(container_path("my photos"), "/my%20photos");
        assert_eq!(
            object_path("media", "2024/summer trip.png"),
            "/media/2024/summer%20trip.png"
        );
    }

    #[tokio::test]
    async fn test_validation_precedes_network() {
        // Nothing listens on port 9; any I/O would surface as a request error.
        let client = client();

        let err = client
            .create_container(CreateContainer::new(""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingContainer)
        ));

        let err = client
            .delete_files(DeleteFiles {
                container: "c".into(),
                files: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingFiles)));

        let err = client
            .delete_file(DeleteFile {
                container: "c".into(),
                file: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingFile)));
    }

    #[tokio::test]
    async fn test_xml_rejected_before_network() {
        let client = client();
        let params = ListFiles {
            format: ListFormat::Xml,
            ..ListFiles::new("c")
        };

        let err = client.get_files(params).await.unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_trait_object() {
        let storage: Box<dyn ObjectStorage> = Box::new(client());
        let err = storage.get_container_info("").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
