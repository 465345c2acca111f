//! Registry configuration.

/// Tuning knobs for an [`AssetServer`](crate::AssetServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetServerConfig {
    max_loads_per_tick: usize,
}

impl Default for AssetServerConfig {
    fn default() -> Self {
        Self {
            max_loads_per_tick: usize::MAX,
        }
    }
}

impl AssetServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of loads per tick. Zero is treated as one so the
    /// queue always makes progress.
    pub fn with_max_loads_per_tick(mut self, max: usize) -> Self {
        self.max_loads_per_tick = max.max(1);
        self
    }

    /// Upper bound on load attempts per [`update`](crate::AssetServer::update).
    ///
    /// Entries beyond the budget stay queued for the next tick. Defaults to
    /// `usize::MAX`, which drains the whole queue every tick. Never zero.
    pub fn max_loads_per_tick(&self) -> usize {
        self.max_loads_per_tick
    }

    pub fn is_bounded(&self) -> bool {
        self.max_loads_per_tick != usize::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unbounded() {
        let config = AssetServerConfig::default();
        assert_eq!(config.max_loads_per_tick(), usize::MAX);
        assert!(!config.is_bounded());
    }

    #[test]
    fn test_budget_never_zero() {
        let config = AssetServerConfig::new().with_max_loads_per_tick(0);
        assert_eq!(config.max_loads_per_tick(), 1);
        assert!(config.is_bounded());
    }
}
