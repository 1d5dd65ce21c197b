//! Memory profiles that pick a flush threshold for the deployment size

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Memory profile for different pod sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MemoryProfile {
    /// Small pods (< 512MB): keep 100 rows per sheet in memory
    Low,
    /// Medium pods (512MB-1GB): keep 500 rows
    Medium,
    /// Large pods (> 1GB): keep 1000 rows (default)
    #[default]
    High,
    /// Custom threshold
    Custom { flush_threshold: usize },
}

impl MemoryProfile {
    /// Pick a profile from a memory limit in MB
    pub fn from_memory_mb(memory_mb: usize) -> Self {
        if memory_mb < 512 {
            MemoryProfile::Low
        } else if memory_mb < 1024 {
            MemoryProfile::Medium
        } else {
            MemoryProfile::High
        }
    }

    /// Detect from the `MEMORY_LIMIT_MB` environment variable, `High` when unset or invalid
    pub fn from_env() -> Self {
        let profile = std::env::var("MEMORY_LIMIT_MB")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .map(Self::from_memory_mb)
            .unwrap_or(MemoryProfile::High);
        log::debug!("memory profile from environment: {:?}", profile);
        profile
    }

    /// Rows each sheet keeps in memory before spilling to disk
    pub fn flush_threshold(&self) -> usize {
        match self {
            MemoryProfile::Low => 100,
            MemoryProfile::Medium => 500,
            MemoryProfile::High => 1000,
            MemoryProfile::Custom { flush_threshold } => (*flush_threshold).max(1),
        }
    }
}
