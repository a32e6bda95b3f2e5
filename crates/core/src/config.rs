use serde::Deserialize;

pub const DEFAULT_THROWABLE_FQN: &str = "java.lang.Throwable";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassCacheConfig {
    /// Pre-sizing of the type arena and the hash index.
    pub initial_capacity: usize,
    /// Root of the exception hierarchy used by exception lookups.
    pub throwable_fqn: String,
    /// Emit dropped-reference diagnostics at `warn` instead of `debug`.
    pub warn_on_dropped_references: bool,
}

impl Default for ClassCacheConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            throwable_fqn: DEFAULT_THROWABLE_FQN.to_string(),
            warn_on_dropped_references: true,
        }
    }
}

impl ClassCacheConfig {
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
