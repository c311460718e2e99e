//! Actors and capabilities for admin-gated operations
//!
//! Balance operations are open to any caller that passes validation.
//! Account lifecycle and compliance operations require the caller to
//! present an [`Actor`] holding the matching [`Capability`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::LedgerError;

/// A capability an actor may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Create and delete accounts
    Admin,
    /// Freeze, unfreeze and flag accounts
    Compliance,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Admin => f.write_str("admin"),
            Capability::Compliance => f.write_str("compliance"),
        }
    }
}

/// The caller of an admin-gated operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub capabilities: Vec<Capability>,
}

impl Actor {
    pub fn new(id: impl Into<String>, capabilities: Vec<Capability>) -> Self {
        Self {
            id: id.into(),
            capabilities,
        }
    }

    /// Actor with every capability, used by batch tooling such as the CLI
    pub fn operator(id: impl Into<String>) -> Self {
        Self::new(id, vec![Capability::Admin, Capability::Compliance])
    }

    /// Actor with no capabilities
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new())
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Require a single capability
    pub fn require(&self, capability: Capability) -> Result<(), LedgerError> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(LedgerError::PermissionDenied {
                actor: self.id.clone(),
                capability,
            })
        }
    }

    /// Compliance operations are also open to admins
    pub fn require_compliance(&self) -> Result<(), LedgerError> {
        if self.has(Capability::Admin) {
            return Ok(());
        }
        self.require(Capability::Compliance)
    }
}
