/// Construction parameters for a [`ModelPool`](super::ModelPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Debug label forwarded to the device buffer.
    pub label: String,

    /// Byte size of the device buffer allocated at construction.
    ///
    /// Rounded up to the copy alignment; zero is allowed and defers the first
    /// allocation to the first growing flush.
    pub initial_capacity: u64,

    /// Extra bytes reserved on every growth so a run of small allocations does
    /// not reallocate on each flush.
    pub growth_slack: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            label: "meshpool vertex buffer".to_owned(),
            initial_capacity: 0,
            growth_slack: 128,
        }
    }
}

impl PoolConfig {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_initial_capacity(mut self, bytes: u64) -> Self {
        self.initial_capacity = bytes;
        self
    }

    pub fn with_growth_slack(mut self, bytes: u64) -> Self {
        self.growth_slack = bytes;
        self
    }
}
