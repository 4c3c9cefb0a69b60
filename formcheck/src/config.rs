//! Form configuration types.

/// Per-form configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormConfig {
    /// What to do with an async check that settles after a newer check for
    /// the same rule was started.
    pub stale_async: StaleAsyncPolicy,

    /// Compare what the rule tree reported with what ended up in the
    /// fields store after each field pass, logging a warning on mismatch.
    pub check_consistency: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            stale_async: StaleAsyncPolicy::default(),
            check_consistency: true,
        }
    }
}

impl FormConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stale async policy.
    pub fn stale_async(mut self, policy: StaleAsyncPolicy) -> Self {
        self.stale_async = policy;
        self
    }

    /// Enable or disable the post-pass store consistency check.
    pub fn check_consistency(mut self, enabled: bool) -> Self {
        self.check_consistency = enabled;
        self
    }
}

/// Handling of async checks overtaken by a newer invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StaleAsyncPolicy {
    /// Drop the late result and cancel the rest of its field pass. Later
    /// siblings are not evaluated, so the store keeps the newest pass's
    /// outcomes. The stale pass reports nothing for the field.
    #[default]
    Discard,

    /// Apply every result as it settles. A slow, older check can overwrite
    /// the state written by a newer one.
    Apply,
}
