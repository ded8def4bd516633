//! Request and response types for the DMART backend API.
//!
//! Field names are snake_case on the wire. Every envelope keeps unknown
//! fields in `extra` so records fetched from the backend can be sent back
//! without losing data.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ApiError;

/// `request_type` of a request envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Create,
    Update,
    Delete,
    Move,
    Submit,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Create => "create",
            RequestType::Update => "update",
            RequestType::Delete => "delete",
            RequestType::Move => "move",
            RequestType::Submit => "submit",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(RequestType::Create),
            "update" => Ok(RequestType::Update),
            "delete" => Ok(RequestType::Delete),
            "move" => Ok(RequestType::Move),
            "submit" => Ok(RequestType::Submit),
            other => Err(format!("unknown request type: {}", other)),
        }
    }
}

/// Request envelope posted to `/managed/request`, `/submit` and `/media`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub space_name: String,
    pub request_type: RequestType,
    pub records: Vec<Record>,
}

impl Request {
    pub fn single(space_name: &str, request_type: RequestType, record: Record) -> Self {
        Self {
            space_name: space_name.to_string(),
            request_type,
            records: vec![record],
        }
    }
}

/// A backend resource envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub resource_type: String,
    pub subpath: String,
    pub shortname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_shortname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Attachment type (e.g. `media`, `comment`) -> attachments.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, Vec<Attachment>>,
    /// Computed by `entries()`; never sent by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(resource_type: &str, subpath: &str, shortname: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            subpath: subpath.to_string(),
            shortname: shortname.to_string(),
            ..Default::default()
        }
    }

    /// `attributes.displayname` when it is a non-empty string, else the shortname.
    pub fn display_name(&self) -> &str {
        match self.attributes.get("displayname") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => &self.shortname,
        }
    }
}

/// A sub-resource (media file, comment, ...) attached to a [`Record`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub subpath: String,
    #[serde(default)]
    pub shortname: String,
    #[serde(default)]
    pub attributes: AttachmentAttributes,
    /// Retrieval URL computed by this client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attachment {
    /// The payload file path, if the attachment carries a non-empty one.
    pub fn payload_filepath(&self) -> Option<&str> {
        self.attributes
            .payload
            .as_ref()
            .and_then(|p| p.filepath.as_deref())
            .filter(|f| !f.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Content payload descriptor of a record or attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// `sha1:<hex>` of the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytesize: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome marker used both at the top level and per result entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: i64,
    pub message: String,
}

/// One entry of a response's `results` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultEntry {
    pub fn is_success(&self) -> bool {
        self.status == Some(Status::Success)
    }
}

/// Generic backend response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplement: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiResponse {
    /// Top-level `status == "success"`.
    pub fn is_success(&self) -> bool {
        self.status == Some(Status::Success)
    }

    /// `results[0].status == "success"`.
    pub fn first_result_succeeded(&self) -> bool {
        self.results
            .as_ref()
            .and_then(|r| r.first())
            .is_some_and(ResultEntry::is_success)
    }

    /// Take `results[0]`, failing if the list is missing or empty.
    pub fn into_first_result(self) -> Result<ResultEntry, ApiError> {
        self.results
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ApiError::malformed("response has no results[0]"))
    }
}

/// `type` of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Search,
    #[default]
    Subpath,
    Folders,
    Events,
    History,
    Tags,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Search => "search",
            QueryType::Subpath => "subpath",
            QueryType::Folders => "folders",
            QueryType::Events => "events",
            QueryType::History => "history",
            QueryType::Tags => "tags",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(QueryType::Search),
            "subpath" => Ok(QueryType::Subpath),
            "folders" => Ok(QueryType::Folders),
            "events" => Ok(QueryType::Events),
            "history" => Ok(QueryType::History),
            "tags" => Ok(QueryType::Tags),
            other => Err(format!("unknown query type: {}", other)),
        }
    }
}

/// Body of `/managed/query`. `space_name` is filled in by [`super::query::query`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub subpath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_shortnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_shortnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Query {
    pub fn new(query_type: QueryType, subpath: &str) -> Self {
        Self {
            query_type,
            subpath: subpath.to_string(),
            ..Default::default()
        }
    }
}

/// A tag and how many records carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub frequency: u64,
}

/// Tag entry as the backend reports it inside `attributes.tags`.
#[derive(Debug, Deserialize)]
pub(crate) struct TagCount {
    pub tag: String,
    pub frequency: u64,
}

/// Body of `/user/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub shortname: &'a str,
    pub password: &'a str,
}
