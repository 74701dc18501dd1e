//! URL and request construction.
//!
//! # Design
//! `RequestBuilder` resolves the root path once, when the adapter is built,
//! and afterwards only does string assembly. Building a request never touches
//! the network and never mutates the resource it is built from.

use serde_json::Value;

use crate::config::AdapterConfig;
use crate::error::SyncError;
use crate::http::{HttpMethod, HttpRequest};
use crate::resource::{Resource, ResourceType};
use crate::serializer::Serializer;

/// What a request does to the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn method(self) -> HttpMethod {
        match self {
            Operation::Create => HttpMethod::Post,
            Operation::Read => HttpMethod::Get,
            Operation::Update => HttpMethod::Put,
            Operation::Delete => HttpMethod::Delete,
        }
    }
}

/// Builds `HttpRequest` values for resources under one root path.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    root: String,
    use_content_type_extension: bool,
}

impl RequestBuilder {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            root: config.root_path(),
            use_content_type_extension: config.use_content_type_extension,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// `{root}/{resource_path}[/{key}][.{data_type}]`.
    ///
    /// An explicit `resource_key` wins over the resource's own primary key;
    /// with neither the URL addresses the collection. The key is
    /// percent-encoded so it always stays a single path segment.
    pub fn build_url(
        &self,
        ty: &ResourceType,
        resource_key: Option<&str>,
        primary_key: Option<&str>,
        data_type: Option<&str>,
    ) -> String {
        let mut url = format!("{}/{}", self.root, ty.path_segment());
        if let Some(key) = resource_key.or(primary_key).filter(|k| !k.is_empty()) {
            url.push('/');
            url.push_str(&encode_component(key));
        }
        if self.use_content_type_extension {
            if let Some(ext) = data_type.filter(|d| !d.is_empty()) {
                url.push('.');
                url.push_str(ext);
            }
        }
        url
    }

    /// Build the request for `operation` on `resource`.
    ///
    /// Reads carry no body. Every other operation carries the serialized
    /// resource. Query parameters are appended to the URL.
    pub fn build_request<R: Resource>(
        &self,
        serializer: &dyn Serializer,
        resource: &R,
        operation: Operation,
        query: &[(&str, &str)],
        resource_key: Option<&str>,
    ) -> Result<HttpRequest, SyncError> {
        let primary_key = resource.primary_key();
        let payload = match operation {
            Operation::Read => None,
            Operation::Create | Operation::Update | Operation::Delete => {
                Some(serializer.serialize(&R::TYPE, resource.to_fields()?))
            }
        };
        self.assemble(
            serializer,
            &R::TYPE,
            operation,
            resource_key.or(primary_key.as_deref()),
            query,
            payload,
        )
    }

    /// Build a read for a resource type without an instance: the collection
    /// when `resource_key` is `None`, otherwise a single record.
    pub fn build_read(
        &self,
        serializer: &dyn Serializer,
        ty: &ResourceType,
        query: &[(&str, &str)],
        resource_key: Option<&str>,
    ) -> Result<HttpRequest, SyncError> {
        self.assemble(serializer, ty, Operation::Read, resource_key, query, None)
    }

    fn assemble(
        &self,
        serializer: &dyn Serializer,
        ty: &ResourceType,
        operation: Operation,
        key: Option<&str>,
        query: &[(&str, &str)],
        payload: Option<Value>,
    ) -> Result<HttpRequest, SyncError> {
        let mut url = self.build_url(ty, key, None, serializer.data_type());
        append_query(&mut url, query);

        let media_type = serializer.content_type().to_string();
        let mut headers = vec![("accept".to_string(), media_type.clone())];
        let body = match payload {
            Some(payload) => {
                headers.push(("content-type".to_string(), media_type));
                Some(serializer.prepare_data(&payload)?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method: operation.method(),
            url,
            headers,
            body,
        })
    }
}

fn append_query(url: &mut String, query: &[(&str, &str)]) {
    for (i, (key, value)) in query.iter().enumerate() {
        url.push(if i == 0 { '?' } else { '&' });
        url.push_str(&encode_component(key));
        url.push('=');
        url.push_str(&encode_component(value));
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::JsonSerializer;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct PostGroup {
        id: Option<u64>,
        name: String,
    }

    impl Resource for PostGroup {
        const TYPE: ResourceType = ResourceType::new("PostGroup", "id");
    }

    fn builder(extension: bool) -> RequestBuilder {
        RequestBuilder::new(
            &AdapterConfig::new("https://api.example.com")
                .with_namespace("api/v1")
                .with_content_type_extension(extension),
        )
    }

    #[test]
    fn build_url_for_collection() {
        let url = builder(false).build_url(&PostGroup::TYPE, None, None, Some("json"));
        assert_eq!(url, "https://api.example.com/api/v1/post_groups");
    }

    #[test]
    fn build_url_with_key_and_extension() {
        let url = builder(true).build_url(&PostGroup::TYPE, Some("42"), None, Some("json"));
        assert_eq!(url, "https://api.example.com/api/v1/post_groups/42.json");
    }

    #[test]
    fn build_url_explicit_key_beats_primary_key() {
        let url = builder(false).build_url(&PostGroup::TYPE, Some("9"), Some("3"), None);
        assert!(url.ends_with("/post_groups/9"));
        let url = builder(false).build_url(&PostGroup::TYPE, None, Some("3"), None);
        assert!(url.ends_with("/post_groups/3"));
    }

    #[test]
    fn build_url_keeps_key_in_one_segment() {
        let b = builder(true);
        let url = b.build_url(&PostGroup::TYPE, Some("a/b"), None, Some("json"));
        assert_eq!(url, "https://api.example.com/api/v1/post_groups/a%2Fb.json");
        let url = b.build_url(&PostGroup::TYPE, Some("1?x=y#f"), None, Some("json"));
        assert_eq!(url, "https://api.example.com/api/v1/post_groups/1%3Fx%3Dy%23f.json");
    }

    #[test]
    fn build_url_extension_needs_data_type() {
        let url = builder(true).build_url(&PostGroup::TYPE, None, None, None);
        assert_eq!(url, "https://api.example.com/api/v1/post_groups");
    }

    #[test]
    fn create_request_is_post_with_payload() {
        let group = PostGroup {
            id: None,
            name: "A".into(),
        };
        let req = builder(false)
            .build_request(&JsonSerializer::new(), &group, Operation::Create, &[], None)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://api.example.com/api/v1/post_groups");
        assert_eq!(req.content_type(), Some("application/json"));
        assert_eq!(req.accept(), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["name"], "A");
    }

    #[test]
    fn update_request_targets_primary_key() {
        let group = PostGroup {
            id: Some(7),
            name: "B".into(),
        };
        let req = builder(false)
            .build_request(&JsonSerializer::new(), &group, Operation::Update, &[], None)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert!(req.url.ends_with("/post_groups/7"));
    }

    #[test]
    fn read_request_has_no_body_and_encodes_query() {
        let req = builder(true)
            .build_request(
                &JsonSerializer::new(),
                &PostGroup::default(),
                Operation::Read,
                &[("name", "a b&c"), ("page", "2")],
                None,
            )
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
        assert!(req.content_type().is_none());
        assert_eq!(
            req.url,
            "https://api.example.com/api/v1/post_groups.json?name=a%20b%26c&page=2"
        );
    }

    #[test]
    fn delete_request_uses_delete_method() {
        let group = PostGroup {
            id: Some(5),
            name: "gone".into(),
        };
        let req = builder(false)
            .build_request(&JsonSerializer::new(), &group, Operation::Delete, &[], None)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert!(req.url.ends_with("/post_groups/5"));
    }

    #[test]
    fn build_read_ignores_instance_defaults() {
        let req = builder(false)
            .build_read(&JsonSerializer::new(), &PostGroup::TYPE, &[], Some("abc"))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://api.example.com/api/v1/post_groups/abc");
        assert!(req.body.is_none());
    }

    #[test]
    fn encode_component_handles_utf8() {
        assert_eq!(encode_component("é"), "%C3%A9");
        assert_eq!(encode_component("a-b_c.d~"), "a-b_c.d~");
    }
}
