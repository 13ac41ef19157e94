//! Composite resource handles.
//!
//! A handle addresses exactly one remote object inside its parent scope using
//! the layout `{parentId}/{collection}/{remoteId}`. Components are escaped so
//! that a slash or percent sign inside an identifier survives a round trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Human-readable layout quoted in decode errors.
pub const HANDLE_PATTERN: &str = "{parentId}/{collection}/{id}";

const SEPARATOR: char = '/';

/// Errors raised while encoding or decoding a handle.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HandleError {
    /// A component passed to the encoder was empty.
    #[error("handle component `{component}` must not be empty")]
    EmptyComponent {
        /// Name of the offending component.
        component: &'static str,
    },
    /// The handle string does not follow the expected layout.
    #[error("malformed handle `{handle}`: {reason}; expected `{{parentId}}/{{collection}}/{{id}}`")]
    Malformed {
        /// Handle as supplied by the caller.
        handle: String,
        /// Short description of what was wrong.
        reason: String,
    },
}

/// Parsed composite handle.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ResourceHandle {
    parent_id: String,
    collection: String,
    remote_id: String,
}

impl ResourceHandle {
    /// Builds a handle from its components.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::EmptyComponent`] when any component is empty.
    pub fn new(
        parent_id: impl Into<String>,
        collection: impl Into<String>,
        remote_id: impl Into<String>,
    ) -> Result<Self, HandleError> {
        let handle = Self {
            parent_id: parent_id.into(),
            collection: collection.into(),
            remote_id: remote_id.into(),
        };
        for (component, value) in [
            ("parentId", &handle.parent_id),
            ("collection", &handle.collection),
            ("id", &handle.remote_id),
        ] {
            if value.is_empty() {
                return Err(HandleError::EmptyComponent { component });
            }
        }
        Ok(handle)
    }

    /// Identifier of the scope that owns the object (site or workspace).
    #[must_use]
    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    /// Collection name, for example `redirects`.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Identifier assigned by the remote API.
    #[must_use]
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    /// Consumes the handle and returns `(parent_id, collection, remote_id)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String, String) {
        (self.parent_id, self.collection, self.remote_id)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            escape(&self.parent_id),
            escape(&self.collection),
            escape(&self.remote_id)
        )
    }
}

impl FromStr for ResourceHandle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

impl Serialize for ResourceHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        decode(&raw).map_err(serde::de::Error::custom)
    }
}

/// Encodes the three components into a handle string.
///
/// # Errors
///
/// Returns [`HandleError::EmptyComponent`] when any component is empty.
pub fn encode(parent_id: &str, collection: &str, remote_id: &str) -> Result<String, HandleError> {
    ResourceHandle::new(parent_id, collection, remote_id).map(|handle| handle.to_string())
}

/// Decodes a handle string into its components.
///
/// # Errors
///
/// Returns [`HandleError::Malformed`] when the segment count is not three, a
/// segment is empty, or an escape sequence is not recognised.
pub fn decode(handle: &str) -> Result<ResourceHandle, HandleError> {
    let malformed = |reason: String| HandleError::Malformed {
        handle: handle.to_owned(),
        reason,
    };

    let segments: Vec<&str> = handle.split(SEPARATOR).collect();
    let [parent, collection, remote] = segments.as_slice() else {
        return Err(malformed(format!(
            "found {} segment(s) instead of 3",
            segments.len()
        )));
    };

    let component = |name: &str, segment: &str| {
        if segment.is_empty() {
            return Err(malformed(format!("segment `{name}` is empty")));
        }
        unescape(segment).map_err(malformed)
    };

    Ok(ResourceHandle {
        parent_id: component("parentId", *parent)?,
        collection: component("collection", *collection)?,
        remote_id: component("id", *remote)?,
    })
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for ch in component.chars() {
        match ch {
            '%' => out.push_str("%25"),
            SEPARATOR => out.push_str("%2F"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(segment: &str) -> Result<String, String> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let code: String = chars.by_ref().take(2).collect();
        match code.as_str() {
            "25" => out.push('%'),
            "2F" | "2f" => out.push(SEPARATOR),
            other => return Err(format!("unsupported escape `%{other}`")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("5f0c8c9e1c9d440000e8d8c4", "redirects", "abc123")]
    #[case("ws", "sites", "a/b")]
    #[case("100%", "robots_txt", "default")]
    #[case("%2F", "redirects", "/%/")]
    fn round_trips_components(#[case] parent: &str, #[case] collection: &str, #[case] id: &str) {
        let encoded = encode(parent, collection, id)
            .unwrap_or_else(|err| panic!("encode should succeed: {err}"));
        let decoded = decode(&encoded).unwrap_or_else(|err| panic!("decode {encoded}: {err}"));
        assert_eq!(
            decoded.into_parts(),
            (parent.to_owned(), collection.to_owned(), id.to_owned())
        );
    }

    #[test]
    fn plain_components_encode_without_escapes() {
        let encoded = encode("site", "redirects", "r1")
            .unwrap_or_else(|err| panic!("encode should succeed: {err}"));
        assert_eq!(encoded, "site/redirects/r1");
    }

    #[rstest]
    #[case("", "redirects", "r1", "parentId")]
    #[case("site", "", "r1", "collection")]
    #[case("site", "redirects", "", "id")]
    fn encode_rejects_empty_components(
        #[case] parent: &str,
        #[case] collection: &str,
        #[case] id: &str,
        #[case] expected: &'static str,
    ) {
        let err = encode(parent, collection, id).expect_err("empty component should fail");
        assert_eq!(err, HandleError::EmptyComponent { component: expected });
    }

    #[rstest]
    #[case("only-one")]
    #[case("a/b")]
    #[case("a/b/c/d")]
    #[case("a//c")]
    #[case("/b/c")]
    #[case("a/b/%zz")]
    #[case("")]
    fn decode_rejects_malformed_handles(#[case] raw: &str) {
        let err = decode(raw).expect_err("malformed handle should fail");
        let message = err.to_string();
        assert!(
            message.contains(HANDLE_PATTERN),
            "error should name the pattern: {message}"
        );
    }

    #[test]
    fn handle_serialises_as_string() {
        let handle = ResourceHandle::new("ws", "sites", "s/1")
            .unwrap_or_else(|err| panic!("handle should build: {err}"));
        let json = serde_json::to_string(&handle)
            .unwrap_or_else(|err| panic!("serialise handle: {err}"));
        assert_eq!(json, "\"ws/sites/s%2F1\"");
        let back: ResourceHandle =
            serde_json::from_str(&json).unwrap_or_else(|err| panic!("deserialise handle: {err}"));
        assert_eq!(back, handle);
    }
}
