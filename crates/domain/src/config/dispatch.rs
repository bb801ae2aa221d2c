use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch & login code rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bulk-send fan-out settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of messages sent concurrently per batch.  Must be positive;
    /// the default of `0` forces an explicit choice.
    #[serde(default)]
    pub concurrency: usize,
}

/// Login code image settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QrConfig {
    /// Edge length of the rendered PNG in pixels.  Required.
    #[serde(default)]
    pub size: u32,
}
