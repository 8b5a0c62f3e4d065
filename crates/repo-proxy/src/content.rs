//! # Content
//!
//! Payload handles returned to callers of the proxy, and the request
//! context they were produced for.

use std::collections::BTreeMap;
use std::io::Cursor;

use bytes::Bytes;

use crate::cache::CacheInfo;

/// An immutable payload plus the attributes the proxy tracks for it.
///
/// Cloning is cheap (the payload is reference counted), so the same content
/// can be handed to every cooperating caller and streamed independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    data: Bytes,
    content_type: Option<String>,
    etag: Option<String>,
    last_modified: Option<String>,
    cache_info: Option<CacheInfo>,
    attributes: BTreeMap<String, String>,
}

impl Content {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            etag: None,
            last_modified: None,
            cache_info: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_type_option(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_etag_option(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    pub fn with_last_modified_option(mut self, last_modified: Option<String>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn with_cache_info(mut self, cache_info: CacheInfo) -> Self {
        self.cache_info = Some(cache_info);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }

    pub fn cache_info(&self) -> Option<&CacheInfo> {
        self.cache_info.as_ref()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// An independent reader over the payload.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }
}

/// Identifies one logical request against a proxy repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Context {
    repository: String,
    path: String,
}

impl Context {
    pub fn new(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            path: path.into(),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Default cooperation key: repository identity plus request path.
    pub fn cooperation_key(&self) -> String {
        format!("{}:{}", self.repository, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn readers_are_independent() {
        let content = Content::new("ASSET").with_content_type("application/octet-stream");

        let mut first = content.reader();
        let mut second = content.reader();
        let mut a = Vec::new();
        let mut b = Vec::new();
        first.read_to_end(&mut a).await.unwrap();
        second.read_to_end(&mut b).await.unwrap();

        assert_eq!(a, b"ASSET");
        assert_eq!(b, b"ASSET");
        assert_eq!(content.content_type(), Some("application/octet-stream"));
    }

    #[test]
    fn cooperation_key_separates_repositories() {
        let central = Context::new("maven-central", "org/foo/1.0/foo-1.0.jar");
        let mirror = Context::new("maven-mirror", "org/foo/1.0/foo-1.0.jar");

        assert_ne!(central.cooperation_key(), mirror.cooperation_key());
        assert_eq!(
            central.cooperation_key(),
            "maven-central:org/foo/1.0/foo-1.0.jar"
        );
    }
}
