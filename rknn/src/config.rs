//! Fanout configuration for a freshly created tree.

use crate::errors::{RknnError, RknnResult};

/// Fanout bounds used when a tree is created on an empty store.
///
/// A store that already holds a tree keeps the bounds it was created with;
/// the config passed when reopening it is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    max_children: usize,
    min_children: usize,
}

impl IndexConfig {
    /// Default maximum number of children per node
    pub const DEFAULT_MAX_CHILDREN: usize = 10;

    /// Creates the default configuration (10 / 5).
    pub fn new() -> Self {
        Self {
            max_children: Self::DEFAULT_MAX_CHILDREN,
            min_children: Self::DEFAULT_MAX_CHILDREN / 2,
        }
    }

    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::new()
    }

    pub fn max_children(&self) -> usize {
        self.max_children
    }

    pub fn min_children(&self) -> usize {
        self.min_children
    }

    /// Checks `2 <= max` and `1 <= min <= max / 2`.
    ///
    /// The upper bound on `min` is what lets a split of `max + 1` entries
    /// always leave both halves with at least `min` children.
    pub fn validate(&self) -> RknnResult<()> {
        if self.max_children < 2 {
            return Err(RknnError::InvalidConfig(format!(
                "max_children must be at least 2, got {}",
                self.max_children
            )));
        }
        if self.min_children < 1 || self.min_children > self.max_children / 2 {
            return Err(RknnError::InvalidConfig(format!(
                "min_children must be in 1..={}, got {}",
                self.max_children / 2,
                self.min_children
            )));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`IndexConfig`].
///
/// ```rust
/// use rknn::IndexConfig;
///
/// let config = IndexConfig::builder().max_children(4).build().unwrap();
/// assert_eq!(config.min_children(), 2);
/// ```
pub struct IndexConfigBuilder {
    max_children: usize,
    min_children: Option<usize>,
}

impl IndexConfigBuilder {
    pub fn new() -> Self {
        Self {
            max_children: IndexConfig::DEFAULT_MAX_CHILDREN,
            min_children: None,
        }
    }

    pub fn max_children(mut self, max_children: usize) -> Self {
        self.max_children = max_children;
        self
    }

    /// Overrides the minimum fanout (defaults to half the maximum).
    pub fn min_children(mut self, min_children: usize) -> Self {
        self.min_children = Some(min_children);
        self
    }

    pub fn build(self) -> RknnResult<IndexConfig> {
        let config = IndexConfig {
            max_children: self.max_children,
            min_children: self.min_children.unwrap_or(self.max_children / 2),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for IndexConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
