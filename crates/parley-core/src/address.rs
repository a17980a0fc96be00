//! Remote device addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one device of one remote party. Stores key sessions and
/// identities by this address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolAddress {
    name: String,
    device_id: u32,
}

impl ProtocolAddress {
    /// Address of `device_id` belonging to `name`.
    pub fn new(name: impl Into<String>, device_id: u32) -> Self {
        Self { name: name.into(), device_id }
    }

    /// Remote party name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote device identifier.
    pub fn device_id(&self) -> u32 {
        self.device_id
    }
}

impl fmt::Display for ProtocolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_name_and_device() {
        assert_eq!(ProtocolAddress::new("bob", 2).to_string(), "bob.2");
    }
}
