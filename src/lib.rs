//! # selectel-storage
//!
//! Async client for Selectel Cloud Storage, a Swift-style object storage API.
//!
//! ## Features
//!
//! - **Three auth variants**: legacy v1 key auth, Keystone v2 and Keystone v3
//! - **Token caching**: tokens are reused until they expire, then renewed
//!   transparently before the next call
//! - **Streaming uploads**: from a local path, an in-memory buffer or any
//!   byte stream
//! - **Async/await**: built on Tokio and reqwest; clients use `&self`
//!
//! ## Quick Start
//!
//! ```no_run
//! use selectel_storage::{Config, CreateContainer, ListFiles, ListFormat, StorageClient, UploadFile};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StorageClient::new(Config::new("12345_alice", "password"))?;
//!
//!     client.create_container(CreateContainer::new("media")).await?;
//!
//!     let data = Bytes::from("Hello, World!");
//!     client.upload_file(UploadFile::new("media", "hello.txt", data)).await?;
//!
//!     let listing = client
//!         .get_files(ListFiles { format: ListFormat::Json, ..ListFiles::new("media") })
//!         .await?;
//!     println!("{} objects", listing.files.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Choosing a protocol
//!
//! ```no_run
//! use selectel_storage::{AuthProtocol, Config, StorageClient};
//!
//! let config = Config::new("12345_alice", "password")
//!     .with_protocol(AuthProtocol::V2)
//!     .with_project_name("backups");
//! let client = StorageClient::new(config)?;
//! # Ok::<(), selectel_storage::Error>(())
//! ```

pub mod auth;
pub mod client;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod session;
pub mod types;
pub mod upload;

// Re-export main types for convenience
pub use client::{ObjectStorage, StorageClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Endpoints};
pub use credentials::{Credentials, ProjectScope};
pub use error::{AuthError, Error, Result, ValidationError};
pub use protocol::{AuthProtocol, IssuedToken};
pub use session::{Session, TokenStore};
pub use types::*;
pub use upload::{normalize_upload_source, ByteStream, UploadSource};
