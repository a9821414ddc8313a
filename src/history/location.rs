//! Location values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a location was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Push,
    Replace,
    Pop,
}

/// A location produced by a location source. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Location {
    pub pathname: String,
    /// Query string including the leading `?`, or empty.
    pub search: String,
    /// Fragment including the leading `#`, or empty.
    pub hash: String,
    /// Arbitrary state attached by the navigator.
    pub state: Option<serde_json::Value>,
    pub action: Action,
    /// Source-assigned identity of the history entry.
    pub key: String,
}

impl Location {
    /// Build a location from a descriptor.
    pub fn new(descriptor: LocationDescriptor, action: Action, key: impl Into<String>) -> Self {
        Self {
            pathname: descriptor.pathname,
            search: descriptor.search,
            hash: descriptor.hash,
            state: descriptor.state,
            action,
            key: key.into(),
        }
    }

    /// Strip the action and key.
    pub fn descriptor(&self) -> LocationDescriptor {
        LocationDescriptor {
            pathname: self.pathname.clone(),
            search: self.search.clone(),
            hash: self.hash.clone(),
            state: self.state.clone(),
        }
    }

    /// `pathname + search + hash`.
    pub fn path(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }

    /// Decoded query parameters.
    pub fn query(&self) -> BTreeMap<String, String> {
        parse_query(&self.search)
    }
}

/// A navigation target: everything a location has except action and key.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LocationDescriptor {
    pub pathname: String,
    pub search: String,
    pub hash: String,
    pub state: Option<serde_json::Value>,
}

impl LocationDescriptor {
    /// Parse `/path?query#hash`. An empty pathname becomes `/`.
    pub fn parse(path: &str) -> Self {
        let (rest, hash) = match path.find('#') {
            Some(i) => (&path[..i], &path[i..]),
            None => (path, ""),
        };
        let (pathname, search) = match rest.find('?') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };

        let pathname = if pathname.is_empty() {
            "/".to_string()
        } else if pathname.starts_with('/') {
            pathname.to_string()
        } else {
            format!("/{}", pathname)
        };

        Self {
            pathname,
            search: if search == "?" { String::new() } else { search.to_string() },
            hash: if hash == "#" { String::new() } else { hash.to_string() },
            state: None,
        }
    }

    /// Attach navigation state.
    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        self.state = Some(state);
        self
    }

    /// `pathname + search + hash`.
    pub fn path(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }

    /// Decoded query parameters.
    pub fn query(&self) -> BTreeMap<String, String> {
        parse_query(&self.search)
    }
}

impl From<&str> for LocationDescriptor {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for LocationDescriptor {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&Location> for LocationDescriptor {
    fn from(location: &Location) -> Self {
        location.descriptor()
    }
}

impl From<Location> for LocationDescriptor {
    fn from(location: Location) -> Self {
        Self {
            pathname: location.pathname,
            search: location.search,
            hash: location.hash,
            state: location.state,
        }
    }
}

fn parse_query(search: &str) -> BTreeMap<String, String> {
    let raw = search.strip_prefix('?').unwrap_or(search);
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_path() {
        let d = LocationDescriptor::parse("/inbox/messages?sort=desc#top");
        assert_eq!(d.pathname, "/inbox/messages");
        assert_eq!(d.search, "?sort=desc");
        assert_eq!(d.hash, "#top");
        assert_eq!(d.path(), "/inbox/messages?sort=desc#top");
    }

    #[test]
    fn test_parse_normalizes_pathname() {
        assert_eq!(LocationDescriptor::parse("").pathname, "/");
        assert_eq!(LocationDescriptor::parse("about").pathname, "/about");
        assert_eq!(LocationDescriptor::parse("/a?").search, "");
        assert_eq!(LocationDescriptor::parse("?q=1").pathname, "/");
    }

    #[test]
    fn test_query_decoding() {
        let d = LocationDescriptor::parse("/search?q=rust+lang&page=2");
        let query = d.query();
        assert_eq!(query.get("q").map(String::as_str), Some("rust lang"));
        assert_eq!(query.get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_descriptor_round_trip_keeps_state() {
        let descriptor =
            LocationDescriptor::parse("/login").with_state(json!({ "nextPathname": "/dashboard" }));
        let location = Location::new(descriptor.clone(), Action::Push, "k1");
        assert_eq!(location.descriptor(), descriptor);
        assert_eq!(location.action, Action::Push);
    }
}
