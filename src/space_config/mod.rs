//! Static backend profiles selectable from the active-space store.
//!
//! Each profile carries the display metadata a front end shows for a
//! space (title, footer, languages, about text) and the connection pair
//! that becomes the active [`EndpointConfig`].

use std::collections::BTreeMap;

use crate::state::EndpointConfig;

/// Short name of the profile used when nothing has been selected yet.
pub const DEFAULT_PROFILE: &str = "products";

const ABOUT: &str = "<h4><b>Datat MART</b></h4><p><em>Data management made easy.</em><hr/> <br/> \
DMART is a Unified Data Management (UDM) platform (aka Digital Asset Management) capable of \
assimilating varying forms of data that may be additionally enriched with metadata. <br/>Once \
assimilated the data is protected by access-control rules and is indexed for quick access and \
discoverability. Data can then be selectively published for public web access (SEO-enabled) like \
a regular CMS or restricted to specific users. DMART can be useful to both Enterprises and \
individuals to establish a data warehouse with digital presence where content can be published \
and collaborated upon by other users. </p>";

/// A named backend profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceProfile {
    pub title: &'static str,
    pub footer: &'static str,
    pub short_name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Language code -> language name.
    pub languages: &'static [(&'static str, &'static str)],
    pub backend: &'static str,
    pub space_name: &'static str,
    /// HTML snippet for an "about" page.
    pub about: &'static str,
}

impl SpaceProfile {
    /// The connection pair this profile selects.
    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig {
            space_name: self.space_name.to_string(),
            backend: self.backend.to_string(),
        }
    }

    pub fn languages(&self) -> BTreeMap<String, String> {
        self.languages
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect()
    }
}

static PROFILES: &[SpaceProfile] = &[
    SpaceProfile {
        title: "Products",
        footer: "products demo of the platform",
        short_name: "products",
        display_name: "Products space",
        description: "Example of using the platform",
        languages: &[("en", "English")],
        backend: "http://127.0.0.1:8282",
        space_name: "products",
        about: ABOUT,
    },
    SpaceProfile {
        title: "DMART Structured Content Platform",
        footer: "dmart.cc unified data platform",
        short_name: "dmart",
        display_name: "DMART",
        description: "DMAR unified data platform",
        languages: &[("en", "English")],
        backend: "https://dmart.cc",
        space_name: "mydemo",
        about: ABOUT,
    },
];

/// All known profiles, default first.
pub fn profiles() -> &'static [SpaceProfile] {
    PROFILES
}

/// Look up a profile by its short name, falling back to its space name.
pub fn find(name: &str) -> Option<&'static SpaceProfile> {
    PROFILES
        .iter()
        .find(|p| p.short_name == name)
        .or_else(|| PROFILES.iter().find(|p| p.space_name == name))
}

/// The endpoint a fresh installation starts with.
pub fn default_endpoint() -> EndpointConfig {
    PROFILES[0].endpoint()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_first() {
        assert_eq!(PROFILES[0].short_name, DEFAULT_PROFILE);
        let endpoint = default_endpoint();
        assert_eq!(endpoint.space_name, "products");
        assert_eq!(endpoint.backend, "http://127.0.0.1:8282");
    }

    #[test]
    fn test_find_by_short_name_or_space_name() {
        assert_eq!(find("dmart").map(|p| p.space_name), Some("mydemo"));
        assert_eq!(find("mydemo").map(|p| p.short_name), Some("dmart"));
        assert!(find("nope").is_none());
    }

    #[test]
    fn test_languages_map() {
        let langs = find("products").unwrap().languages();
        assert_eq!(langs.get("en").map(String::as_str), Some("English"));
    }
}
