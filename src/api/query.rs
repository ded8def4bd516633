//! Managed and public queries, tag listings and entry browsing.

use super::client::{read_json, ApiClient};
use super::error::ApiError;
use super::media::{attach_managed_urls, attach_public_urls};
use super::types::{ApiResponse, Query, QueryType, Record, Tag, TagCount};

/// Run an authenticated query against the active space.
///
/// POST /managed/query. `space_name` is overwritten with the active one.
pub async fn query(client: &ApiClient, mut query: Query) -> Result<ApiResponse, ApiError> {
    let endpoint = client.endpoint();
    query.space_name = Some(endpoint.space_name.clone());
    let resp = client
        .authenticated_post(&endpoint, "/managed/query", &query)
        .await?;
    read_json(resp).await
}

/// Tags used across the active space. Empty unless the query succeeded.
pub async fn tags(client: &ApiClient) -> Result<Vec<Tag>, ApiError> {
    let response = query(client, Query::new(QueryType::Tags, "")).await?;
    flatten_tags(&response)
}

/// Parameters of a public (unauthenticated) query.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicQuery {
    pub subpath: String,
    pub resource_types: Vec<String>,
    pub resource_shortnames: Vec<String>,
    pub query_type: QueryType,
    pub search: String,
    pub limit: u32,
    pub offset: u32,
}

impl PublicQuery {
    /// A subpath query matching everything, first 10 results.
    pub fn new(subpath: &str, resource_types: Vec<String>) -> Self {
        Self {
            subpath: subpath.to_string(),
            resource_types,
            resource_shortnames: Vec::new(),
            query_type: QueryType::Subpath,
            search: "*".to_string(),
            limit: 10,
            offset: 0,
        }
    }

    fn query_string(&self) -> String {
        format!(
            "type={}&search={}&resource_types={}&resource_shortnames={}&offset={}&limit={}",
            self.query_type,
            urlencoding::encode(&self.search),
            encode_list(&self.resource_types),
            urlencoding::encode(&self.resource_shortnames.join(",")),
            self.offset,
            self.limit
        )
    }
}

fn encode_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| urlencoding::encode(i).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Browse the active space without credentials.
///
/// GET /public/query/{space}/{subpath}. Media attachments that carry a
/// file get a public `url`.
pub async fn public_query(
    client: &ApiClient,
    params: &PublicQuery,
) -> Result<ApiResponse, ApiError> {
    let endpoint = client.endpoint();
    let url = endpoint.url(&format!(
        "/public/query/{}/{}?{}",
        urlencoding::encode(&endpoint.space_name),
        urlencoding::encode(&params.subpath),
        params.query_string()
    ));
    let resp = client.get(&url).await?;
    let mut response = read_json(resp).await?;

    if let Some(records) = response.records.as_mut() {
        for record in records.iter_mut() {
            attach_public_urls(&endpoint, record);
        }
    }
    Ok(response)
}

/// Public tags under `subpath` for the given resource types.
pub async fn public_tags(
    client: &ApiClient,
    subpath: &str,
    resource_types: Vec<String>,
) -> Result<Vec<Tag>, ApiError> {
    let params = PublicQuery {
        query_type: QueryType::Tags,
        ..PublicQuery::new(subpath, resource_types)
    };
    let response = public_query(client, &params).await?;
    flatten_tags(&response)
}

/// [`public_tags`] over `/posts` and `post` records.
pub async fn default_public_tags(client: &ApiClient) -> Result<Vec<Tag>, ApiError> {
    public_tags(client, "/posts", vec!["post".to_string()]).await
}

/// `results[0]` must be a success; the tags then sit in
/// `records[0].attributes.tags` as `{tag, frequency}` entries.
fn flatten_tags(response: &ApiResponse) -> Result<Vec<Tag>, ApiError> {
    if !response.first_result_succeeded() {
        log::debug!("Tag query did not succeed, returning no tags");
        return Ok(Vec::new());
    }
    let raw = response
        .records
        .as_ref()
        .and_then(|r| r.first())
        .and_then(|r| r.attributes.get("tags"))
        .ok_or_else(|| ApiError::malformed("tag response has no records[0].attributes.tags"))?;

    let counts: Vec<TagCount> = serde_json::from_value(raw.clone())
        .map_err(|e| ApiError::malformed(format!("bad tag entry: {}", e)))?;
    Ok(counts
        .into_iter()
        .map(|c| Tag {
            name: c.tag,
            frequency: c.frequency,
        })
        .collect())
}

/// Parameters of [`entries`].
#[derive(Debug, Clone, PartialEq)]
pub struct EntriesQuery {
    pub subpath: String,
    pub filter_types: Vec<String>,
    pub filter_shortnames: Vec<String>,
    pub query_type: QueryType,
    pub search: String,
    pub limit: u32,
}

impl EntriesQuery {
    /// A subpath listing with no search, first 20 results.
    pub fn new(subpath: &str, filter_types: Vec<String>) -> Self {
        Self {
            subpath: subpath.to_string(),
            filter_types,
            filter_shortnames: Vec::new(),
            query_type: QueryType::Subpath,
            search: String::new(),
            limit: 20,
        }
    }
}

/// List records for display.
///
/// Every attachment carrying a file gets a managed payload `url` and every
/// record a `displayname`. Empty unless the query status is success.
pub async fn entries(client: &ApiClient, params: &EntriesQuery) -> Result<Vec<Record>, ApiError> {
    let q = Query {
        query_type: params.query_type,
        subpath: params.subpath.clone(),
        filter_types: params.filter_types.clone(),
        filter_shortnames: params.filter_shortnames.clone(),
        search: Some(params.search.clone()),
        limit: Some(params.limit),
        ..Default::default()
    };
    let response = query(client, q).await?;
    if !response.is_success() {
        log::debug!("Entries query for {} did not succeed", params.subpath);
        return Ok(Vec::new());
    }

    // Resolved after the response so URLs match the endpoint at display time.
    let endpoint = client.endpoint();
    let mut records = response.records.unwrap_or_default();
    for record in records.iter_mut() {
        attach_managed_urls(&endpoint, record);
        record.displayname = Some(record.display_name().to_string());
    }
    Ok(records)
}
