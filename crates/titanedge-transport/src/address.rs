use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Numeric bus address: agent, element, and parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub agent_id: i32,
    pub element_id: i32,
    pub parameter_id: i32,
}

impl Address {
    pub const fn new(agent_id: i32, element_id: i32, parameter_id: i32) -> Self {
        Self {
            agent_id,
            element_id,
            parameter_id,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.agent_id, self.element_id, self.parameter_id
        )
    }
}

/// Where a receiver must send its replies.
pub type ReturnAddress = Address;

/// Identity of the sending element, carried in envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub agent_id: i32,
    pub element_id: i32,
}

impl Source {
    pub fn new(name: impl Into<String>, agent_id: i32, element_id: i32) -> Self {
        Self {
            name: name.into(),
            agent_id,
            element_id,
        }
    }

    /// The address on this source that receives replies for `parameter_id`.
    pub fn reply_address(&self, parameter_id: i32) -> ReturnAddress {
        Address::new(self.agent_id, self.element_id, parameter_id)
    }
}

static NEXT_CORRELATION: AtomicU64 = AtomicU64::new(1);

/// Identifier matching replies to the request that caused them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    /// Allocate a fresh, process-unique correlation id.
    pub fn next() -> Self {
        Self(NEXT_CORRELATION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_unique() {
        let a = CorrelationId::next();
        let b = CorrelationId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn address_display_is_slash_separated() {
        assert_eq!(Address::new(12, 345, 9_000_000).to_string(), "12/345/9000000");
    }

    #[test]
    fn source_reply_address_uses_own_ids() {
        let source = Source::new("ctl", 7, 42);
        assert_eq!(source.reply_address(9_000_001), Address::new(7, 42, 9_000_001));
    }

    #[test]
    fn correlation_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&CorrelationId(17)).unwrap();
        assert_eq!(json, "17");
    }
}
