use crate::upload::UploadSource;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Buffered response of a storage call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }

    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Visibility of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    #[default]
    Public,
    Private,
}

impl ContainerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Public => "public",
            ContainerType::Private => "private",
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body format of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFormat {
    /// Newline-separated names
    #[default]
    Plain,
    Json,
    Xml,
}

impl ListFormat {
    /// Value of the `format` query parameter, if one is sent
    pub fn query_value(&self) -> Option<&'static str> {
        match self {
            ListFormat::Plain => None,
            ListFormat::Json => Some("json"),
            ListFormat::Xml => Some("xml"),
        }
    }
}

/// Account statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub status: StatusCode,
    pub container_count: Option<u64>,
    pub object_count: Option<u64>,
    pub bytes_used: Option<u64>,
}

/// One container in a JSON account listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub bytes: u64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub container_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_bytes: Option<u64>,
}

/// Containers of the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerList {
    Names(Vec<String>),
    Records(Vec<ContainerRecord>),
}

/// Container statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub status: StatusCode,
    pub object_count: Option<u64>,
    pub bytes_used: Option<u64>,
    pub container_type: Option<String>,
}

/// One object in a JSON container listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub bytes: u64,
    pub content_type: String,
    pub hash: String,
    pub last_modified: String,
    pub name: String,
}

/// Entry of a JSON container listing.
///
/// With a delimiter, the service folds deeper names into `subdir` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListEntry {
    Object(ObjectRecord),
    Subdir { subdir: String },
}

impl ListEntry {
    pub fn name(&self) -> &str {
        match self {
            ListEntry::Object(record) => &record.name,
            ListEntry::Subdir { subdir } => subdir,
        }
    }
}

/// Objects of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileList {
    Names(Vec<String>),
    Entries(Vec<ListEntry>),
}

impl FileList {
    pub fn names(&self) -> Vec<&str> {
        match self {
            FileList::Names(names) => names.iter().map(String::as_str).collect(),
            FileList::Entries(entries) => entries.iter().map(ListEntry::name).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FileList::Names(names) => names.len(),
            FileList::Entries(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of listing a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesResponse {
    pub files: FileList,
    pub files_amount: Option<u64>,
    pub container_size: Option<u64>,
    pub container_type: Option<String>,
}

/// Result of an object upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: StatusCode,
    pub etag: Option<String>,
}

/// Parameters for creating a container
#[derive(Debug, Clone, Default)]
pub struct CreateContainer {
    pub container: String,
    pub container_type: ContainerType,
    pub metadata: HashMap<String, String>,
}

impl CreateContainer {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Default::default()
        }
    }
}

/// Parameters for listing a container
#[derive(Debug, Clone, Default)]
pub struct ListFiles {
    pub container: String,
    pub limit: Option<u32>,
    pub marker: Option<String>,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub format: ListFormat,
}

impl ListFiles {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Default::default()
        }
    }
}

/// Parameters for uploading an object
#[derive(Debug)]
pub struct UploadFile {
    pub container: String,
    pub file_name: String,
    pub source: UploadSource,
    /// Unix timestamp after which the object is removed
    pub delete_at: Option<i64>,
    /// Seconds after which the object is removed
    pub lifetime: Option<u64>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl UploadFile {
    pub fn new(
        container: impl Into<String>,
        file_name: impl Into<String>,
        source: impl Into<UploadSource>,
    ) -> Self {
        Self {
            container: container.into(),
            file_name: file_name.into(),
            source: source.into(),
            delete_at: None,
            lifetime: None,
            etag: None,
            content_type: None,
            metadata: HashMap::new(),
        }
    }
}

/// Parameters for a bulk delete
#[derive(Debug, Clone, Default)]
pub struct DeleteFiles {
    pub container: String,
    pub files: Vec<String>,
}

/// Parameters for deleting one object
#[derive(Debug, Clone, Default)]
pub struct DeleteFile {
    pub container: String,
    pub file: String,
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub(crate) fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|s| s.trim().parse().ok())
}
