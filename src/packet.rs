//! The unit of flow between stages.

// Layer 1: Standard library
use std::fmt;

// Layer 2: Third-party
use serde::{Deserialize, Serialize};

/// A candidate name in transit through the pipeline.
///
/// `changes` only ever increases along a packet's lineage: a transformer
/// that mutates `message` must bump it, a no-op must not. `skip` is a
/// countdown of how many following stages must forward this packet
/// unchanged rather than fan it out to their transformers.
///
/// # Examples
///
/// ```rust
/// use namestream::MessagePacket;
///
/// let mut packet = MessagePacket::new("gopher");
/// packet.set_and_increment("gopher-x");
/// assert_eq!(packet.message, "gopher-x");
/// assert_eq!(packet.changes, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePacket {
    /// The current string value.
    pub message: String,
    /// Count of transformations already applied along this packet's lineage.
    pub changes: u32,
    /// Remaining number of stages that must pass this packet through
    /// untouched instead of fanning it out to transformers.
    pub skip: u32,
}

impl MessagePacket {
    /// Builds a fresh packet at the pipeline entrance: zero changes, zero skip.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            changes: 0,
            skip: 0,
        }
    }

    /// Replaces `message` and records that a transformation happened.
    pub fn set_and_increment(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.changes += 1;
    }
}

impl fmt::Display for MessagePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_packet_has_zero_changes_and_skip() {
        let p = MessagePacket::new("abc");
        assert_eq!(p.message, "abc");
        assert_eq!(p.changes, 0);
        assert_eq!(p.skip, 0);
    }

    #[test]
    fn set_and_increment_bumps_changes_only() {
        let mut p = MessagePacket::new("abc");
        p.set_and_increment("abcd");
        p.set_and_increment("abcde");
        assert_eq!(p.message, "abcde");
        assert_eq!(p.changes, 2);
    }

    #[test]
    fn display_renders_message() {
        let p = MessagePacket::new("hello");
        assert_eq!(p.to_string(), "hello");
    }
}
