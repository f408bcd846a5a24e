use serde::Deserialize;

/// Where recorded change signatures live between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStorageMode {
    /// Store signatures in a file (`.fleetdag/signatures` next to the config).
    File,
    /// Store signatures in memory only (every run starts from scratch).
    Memory,
}

impl Default for SignatureStorageMode {
    fn default() -> Self {
        SignatureStorageMode::File
    }
}
