//! User registration and session establishment.

use serde_json::{Map, Value};

use super::client::{read_json, ApiClient};
use super::error::ApiError;
use super::types::{ApiResponse, LoginRequest, Record};

/// Subpath user records live under.
const USERS_SUBPATH: &str = "users";

/// Register a new user.
///
/// POST /user/create with a `user` record. Sent without credentials.
pub async fn register(
    client: &ApiClient,
    shortname: &str,
    display_name: &str,
    email: &str,
    password: &str,
    invitation: &str,
) -> Result<ApiResponse, ApiError> {
    let endpoint = client.endpoint();
    let mut record = Record::new("user", USERS_SUBPATH, shortname);
    record.attributes.insert("email".into(), email.into());
    record.attributes.insert("password".into(), password.into());
    record.attributes.insert("display_name".into(), display_name.into());
    record.attributes.insert("invitation".into(), invitation.into());

    log::info!("Registering user {} on {}", shortname, endpoint.space_name);
    let resp = client.post(&endpoint, "/user/create", &record).await?;
    read_json(resp).await
}

/// Log in and keep the resulting session for managed calls.
///
/// POST /user/login without credentials. Cookies set by the response are
/// stored in the client's jar and a returned `auth_token` becomes the
/// bearer token.
pub async fn login(
    client: &ApiClient,
    shortname: &str,
    password: &str,
) -> Result<ApiResponse, ApiError> {
    let endpoint = client.endpoint();
    let body = LoginRequest {
        shortname,
        password,
    };
    let resp = client.post(&endpoint, "/user/login", &body).await?;
    client.capture_session(&resp);

    let response = read_json(resp).await?;
    if let Some(token) = &response.auth_token {
        client.set_access_token(token.clone()).await;
    }
    log::info!("Logged in as {}", shortname);
    Ok(response)
}

/// Drop the bearer token held by the client.
pub async fn logout(client: &ApiClient) {
    client.clear_access_token().await;
    log::info!("Cleared session token");
}

pub async fn get_profile(_client: &ApiClient) -> Result<ApiResponse, ApiError> {
    Err(ApiError::NotImplemented("get_profile"))
}

pub async fn update_profile(
    _client: &ApiClient,
    _attributes: Map<String, Value>,
) -> Result<ApiResponse, ApiError> {
    Err(ApiError::NotImplemented("update_profile"))
}
