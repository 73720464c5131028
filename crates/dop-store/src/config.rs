use serde::{Deserialize, Serialize};

/// Connection descriptor for one object store.
///
/// The transport adapter is supplied by the host; this crate only consumes
/// the fields that affect gateway behavior (`handle_prefix`, `page_size`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub url: String,
    pub doip_port: u16,
    pub handle_prefix: String,
    pub username: String,
    pub password: String,
    /// Number of results requested per search page.
    pub page_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:8443".into(),
            doip_port: 9000,
            handle_prefix: "test".into(),
            username: String::new(),
            password: String::new(),
            page_size: 100,
        }
    }
}
