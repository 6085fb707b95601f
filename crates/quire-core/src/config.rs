//! Ratchet bounds.

/// Resource bounds for a pairwise session.
///
/// These limit how much state an adversary can force a session to hold by
/// sending messages with inflated chain indices or a stream of fresh ratchet
/// keys. They are not persisted; a restored session gets the defaults unless
/// the caller applies its own with [`Session::with_config`].
///
/// Fields are only reachable through the builders, which keep
/// `max_receiver_chains` at one or more. A session that has just ratcheted
/// needs its newest receiver chain to start its next sender chain.
///
/// [`Session::with_config`]: crate::Session::with_config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatchetConfig {
    max_message_gap: u32,
    max_skipped_message_keys: usize,
    max_receiver_chains: usize,
}

impl RatchetConfig {
    /// Default maximum skip per message
    pub const DEFAULT_MAX_MESSAGE_GAP: u32 = 2000;

    /// Default skipped-key cache size
    pub const DEFAULT_MAX_SKIPPED_MESSAGE_KEYS: usize = 40;

    /// Default receiver chain history
    pub const DEFAULT_MAX_RECEIVER_CHAINS: usize = 5;

    /// Maximum number of message keys one decrypt may skip over.
    pub fn max_message_gap(&self) -> u32 {
        self.max_message_gap
    }

    /// Maximum cached skipped message keys (oldest evicted).
    pub fn max_skipped_message_keys(&self) -> usize {
        self.max_skipped_message_keys
    }

    /// Maximum receiver chains kept for late messages (oldest evicted).
    pub fn max_receiver_chains(&self) -> usize {
        self.max_receiver_chains
    }

    /// Set the maximum skip per message.
    #[must_use]
    pub fn with_max_message_gap(mut self, max_message_gap: u32) -> Self {
        self.max_message_gap = max_message_gap;
        self
    }

    /// Set the skipped-key cache size.
    #[must_use]
    pub fn with_max_skipped_message_keys(mut self, max_skipped_message_keys: usize) -> Self {
        self.max_skipped_message_keys = max_skipped_message_keys;
        self
    }

    /// Set the receiver chain history. At least one chain is always kept.
    #[must_use]
    pub fn with_max_receiver_chains(mut self, max_receiver_chains: usize) -> Self {
        self.max_receiver_chains = max_receiver_chains.max(1);
        self
    }
}

impl Default for RatchetConfig {
    fn default() -> Self {
        Self {
            max_message_gap: Self::DEFAULT_MAX_MESSAGE_GAP,
            max_skipped_message_keys: Self::DEFAULT_MAX_SKIPPED_MESSAGE_KEYS,
            max_receiver_chains: Self::DEFAULT_MAX_RECEIVER_CHAINS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RatchetConfig::default();
        assert_eq!(config.max_message_gap(), 2000);
        assert_eq!(config.max_skipped_message_keys(), 40);
        assert_eq!(config.max_receiver_chains(), 5);
    }

    #[test]
    fn builders_override() {
        let config = RatchetConfig::default()
            .with_max_message_gap(10)
            .with_max_skipped_message_keys(3)
            .with_max_receiver_chains(0);

        assert_eq!(config.max_message_gap(), 10);
        assert_eq!(config.max_skipped_message_keys(), 3);
        assert_eq!(config.max_receiver_chains(), 1);
    }
}
