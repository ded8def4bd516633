//! Retrieval URLs for attachment payloads.

use super::client::ApiClient;
use super::types::{Attachment, Record};
use crate::state::EndpointConfig;

fn segment(part: &str) -> &str {
    part.trim_matches('/')
}

/// `{backend}/media/{space}/{subpath}/{record}/{file}`, the public media route.
pub fn public_media_url(
    endpoint: &EndpointConfig,
    attachment: &Attachment,
    record_shortname: &str,
) -> Option<String> {
    let filepath = attachment.payload_filepath()?;
    Some(format!(
        "{}/media/{}/{}/{}/{}",
        endpoint.base_url(),
        endpoint.space_name,
        segment(&attachment.subpath),
        record_shortname,
        filepath
    ))
}

/// `{backend}/managed/payload/media/{space}/{subpath}/{record}/{file}`.
pub fn managed_media_url(
    endpoint: &EndpointConfig,
    attachment: &Attachment,
    record_shortname: &str,
) -> Option<String> {
    let filepath = attachment.payload_filepath()?;
    Some(format!(
        "{}/managed/payload/media/{}/{}/{}/{}",
        endpoint.base_url(),
        endpoint.space_name,
        segment(&attachment.subpath),
        record_shortname,
        filepath
    ))
}

/// `{backend}/payload/{space}/{subpath}/{attachment}/{file}`, addressed by
/// the attachment's own shortname.
pub fn payload_url(endpoint: &EndpointConfig, attachment: &Attachment) -> Option<String> {
    let filepath = attachment.payload_filepath()?;
    Some(format!(
        "{}/payload/{}/{}/{}/{}",
        endpoint.base_url(),
        endpoint.space_name,
        segment(&attachment.subpath),
        attachment.shortname,
        filepath
    ))
}

/// Display URL for a single attachment against the active endpoint.
///
/// `None` when the attachment has no payload file.
pub fn attachment_url(client: &ApiClient, attachment: &Attachment) -> Option<String> {
    payload_url(&client.endpoint(), attachment)
}

/// Set `url` on the `media` attachments of `record` that carry a file.
pub(crate) fn attach_public_urls(endpoint: &EndpointConfig, record: &mut Record) {
    let shortname = record.shortname.clone();
    if let Some(media) = record.attachments.get_mut("media") {
        for attachment in media.iter_mut() {
            if let Some(url) = public_media_url(endpoint, attachment, &shortname) {
                attachment.url = Some(url);
            }
        }
    }
}

/// Set `url` on every attachment of `record` that carries a file.
pub(crate) fn attach_managed_urls(endpoint: &EndpointConfig, record: &mut Record) {
    let shortname = record.shortname.clone();
    for attachment in record.attachments.values_mut().flatten() {
        if let Some(url) = managed_media_url(endpoint, attachment, &shortname) {
            attachment.url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint() -> EndpointConfig {
        EndpointConfig::new("products", "http://host:8282/")
    }

    fn attachment(value: serde_json::Value) -> Attachment {
        serde_json::from_value(value).unwrap()
    }

    fn record_with_media() -> Record {
        serde_json::from_value(json!({
            "resource_type": "post",
            "subpath": "posts",
            "shortname": "hello",
            "attributes": {},
            "attachments": {
                "media": [
                    {"subpath": "posts/hello", "shortname": "pic",
                     "attributes": {"payload": {"filepath": "a.png"}}},
                    {"subpath": "posts/hello", "shortname": "note", "attributes": {}}
                ],
                "comment": [
                    {"subpath": "/posts/hello/", "shortname": "c1",
                     "attributes": {"payload": {"filepath": "c.txt"}}}
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_payload_url_uses_attachment_shortname() {
        let a = attachment(json!({
            "subpath": "posts", "shortname": "pic",
            "attributes": {"payload": {"filepath": "a.png"}}
        }));
        assert_eq!(
            payload_url(&endpoint(), &a).as_deref(),
            Some("http://host:8282/payload/products/posts/pic/a.png")
        );
    }

    #[test]
    fn test_payload_url_absent_without_filepath() {
        let a = attachment(json!({"subpath": "posts", "shortname": "pic", "attributes": {}}));
        assert!(payload_url(&endpoint(), &a).is_none());
    }

    #[test]
    fn test_public_urls_only_touch_media_with_files() {
        let mut record = record_with_media();
        attach_public_urls(&endpoint(), &mut record);

        let media = &record.attachments["media"];
        assert_eq!(
            media[0].url.as_deref(),
            Some("http://host:8282/media/products/posts/hello/hello/a.png")
        );
        assert!(media[1].url.is_none());
        assert!(record.attachments["comment"][0].url.is_none());
    }

    #[test]
    fn test_managed_urls_cover_every_attachment_type() {
        let mut record = record_with_media();
        attach_managed_urls(&endpoint(), &mut record);

        assert_eq!(
            record.attachments["media"][0].url.as_deref(),
            Some("http://host:8282/managed/payload/media/products/posts/hello/hello/a.png")
        );
        assert!(record.attachments["media"][1].url.is_none());
        assert_eq!(
            record.attachments["comment"][0].url.as_deref(),
            Some("http://host:8282/managed/payload/media/products/posts/hello/hello/c.txt")
        );
    }
}
