//! Adapter configuration.

/// Where resources live on the remote service.
///
/// Built once at startup and handed to `RestAdapter::new`; the adapter keeps
/// its own copy, so later changes to a config value never affect requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Base service address, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Endpoint path, e.g. `api/v1`. A leading `/` replaces the base path.
    pub namespace: Option<String>,
    /// Append the serializer's data type to URLs (`/posts/1.json`).
    pub use_content_type_extension: bool,
}

impl AdapterConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_content_type_extension(mut self, enabled: bool) -> Self {
        self.use_content_type_extension = enabled;
        self
    }

    /// Canonical URL prefix for every resource path.
    pub fn root_path(&self) -> String {
        crate::path::root_path(&self.base_url, self.namespace.as_deref())
    }
}
