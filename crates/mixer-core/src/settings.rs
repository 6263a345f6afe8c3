use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MixerSettings {
    /// Hex identity of the pool program the ledger streams are read from.
    #[serde(default)]
    pub pool_program: Option<String>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            pool_program: None,
            log_filter: default_log_filter(),
        }
    }
}
