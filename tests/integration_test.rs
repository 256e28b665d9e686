//! Live integration tests against a real Selectel storage account
//!
//! Every test runs once per auth protocol (v1, v2, v3) and cleans up the
//! container it creates.
//!
//! ## Environment Variables
//!
//! - `SELECTEL_USER`: user id, e.g. `12345_alice` (required)
//! - `SELECTEL_PASSWORD`: password (required)
//! - `SELECTEL_PROJECT_ID` / `SELECTEL_PROJECT_NAME`: Keystone project scope
//! - `SELECTEL_POOL`: regional host label
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test integration_test -- --ignored
//! cargo test --test integration_test v3 -- --ignored
//! ```

use bytes::Bytes;
use selectel_storage::{
    AuthProtocol, Config, ContainerType, CreateContainer, DeleteFile, DeleteFiles, Error,
    ListFiles, ListFormat, StorageClient, UploadFile,
};
use std::future::Future;
use std::io::Write;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn create_client(protocol: AuthProtocol) -> Result<StorageClient, Error> {
    let config = Config::from_env()?.with_protocol(protocol);
    StorageClient::new(config)
}

fn container_name(test: &str, protocol: AuthProtocol) -> String {
    format!(
        "it-{}-{}-{}",
        test.replace('_', "-"),
        protocol,
        chrono::Utc::now().timestamp_millis()
    )
}

/// Run `body` against a fresh private container and remove it afterwards
async fn with_container<F, Fut>(client: &StorageClient, container: String, body: F) -> TestResult
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = TestResult>,
{
    client
        .create_container(CreateContainer {
            container_type: ContainerType::Private,
            ..CreateContainer::new(container.as_str())
        })
        .await?;

    let outcome = body(container.clone()).await;

    // Best effort: leftover objects are deleted, then the container itself.
    if let Ok(listing) = client.get_files(ListFiles::new(container.as_str())).await {
        let files: Vec<String> = listing.files.names().into_iter().map(String::from).collect();
        if !files.is_empty() {
            let _ = client
                .delete_files(DeleteFiles {
                    container: container.clone(),
                    files,
                })
                .await;
        }
    }
    let _ = client.delete_container(&container).await;

    outcome
}

// ============================================================================
// Test Bodies
// ============================================================================

async fn test_authorize(client: StorageClient, _protocol: AuthProtocol) -> TestResult {
    let token = client.authorize().await?;
    assert!(!token.is_empty());

    let session = client.session().await;
    assert!(session.is_valid(chrono::Utc::now()));

    // A second call reuses the cached token.
    assert_eq!(client.authorize().await?, token);
    Ok(())
}

async fn test_account_info(client: StorageClient, _protocol: AuthProtocol) -> TestResult {
    let info = client.get_account_info().await?;
    assert!(info.status.is_success());
    assert!(info.container_count.is_some());
    Ok(())
}

async fn test_upload_list_delete(client: StorageClient, protocol: AuthProtocol) -> TestResult {
    let container = container_name("upload", protocol);
    let client = &client;
    with_container(client, container, move |container| async move {
        let data = Bytes::from("Hello, Selectel!");
        let uploaded = client
            .upload_file(UploadFile::new(container.as_str(), "hello.txt", data))
            .await?;
        assert!(uploaded.status.is_success());

        let listing = client
            .get_files(ListFiles {
                format: ListFormat::Json,
                ..ListFiles::new(container.as_str())
            })
            .await?;
        assert!(listing.files.names().contains(&"hello.txt"));

        let info = client.get_container_info(&container).await?;
        assert_eq!(info.object_count, Some(1));

        client
            .delete_file(DeleteFile {
                container: container.clone(),
                file: "hello.txt".into(),
            })
            .await?;

        let listing = client.get_files(ListFiles::new(container.as_str())).await?;
        assert!(listing.files.is_empty());
        Ok(())
    })
    .await
}

async fn test_upload_from_path(client: StorageClient, protocol: AuthProtocol) -> TestResult {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&vec![7u8; 256 * 1024])?;

    let path = file.path().to_path_buf();
    let container = container_name("path", protocol);
    let client = &client;
    with_container(client, container, move |container| async move {
        let mut params = UploadFile::new(container.as_str(), "blob.bin", path);
        params.lifetime = Some(3600);
        client.upload_file(params).await?;

        let info = client.get_container_info(&container).await?;
        assert_eq!(info.bytes_used, Some(256 * 1024));
        Ok(())
    })
    .await
}

async fn test_bulk_delete(client: StorageClient, protocol: AuthProtocol) -> TestResult {
    let container = container_name("bulk", protocol);
    let client = &client;
    with_container(client, container, move |container| async move {
        for name in ["a.txt", "b.txt"] {
            client
                .upload_file(UploadFile::new(
                    container.as_str(),
                    name,
                    Bytes::from_static(b"x"),
                ))
                .await?;
        }

        let response = client
            .delete_files(DeleteFiles {
                container: container.clone(),
                files: vec!["a.txt".into(), "b.txt".into(), "missing.txt".into()],
            })
            .await?;
        assert!(response.status.is_success());
        assert!(!response.text().is_empty());

        let listing = client.get_files(ListFiles::new(container.as_str())).await?;
        assert!(listing.files.is_empty());
        Ok(())
    })
    .await
}

// ============================================================================
// Per-Protocol Test Generation
// ============================================================================

macro_rules! protocol_test {
    ($protocol:ident, $test_fn:ident) => {
        paste::paste! {
            #[tokio::test]
            #[ignore = "Requires Selectel credentials"]
            async fn [<$test_fn _ $protocol:lower>]() -> TestResult {
                let protocol = AuthProtocol::$protocol;
                let client = create_client(protocol)?;
                $test_fn(client, protocol).await
            }
        }
    };
}

macro_rules! all_protocols {
    ($($test_fn:ident),* $(,)?) => {
        $(
            protocol_test!(V1, $test_fn);
            protocol_test!(V2, $test_fn);
            protocol_test!(V3, $test_fn);
        )*
    };
}

all_protocols!(
    test_authorize,
    test_account_info,
    test_upload_list_delete,
    test_upload_from_path,
    test_bulk_delete,
);
