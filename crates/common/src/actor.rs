use serde::{Deserialize, Serialize};

use crate::MerchantId;

/// Role under which an actor performs an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Merchant,
    Admin,
    Owner,
    /// Automated work such as auto-assignment.
    System,
}

impl ActorRole {
    /// Returns the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Customer => "customer",
            ActorRole::Merchant => "merchant",
            ActorRole::Admin => "admin",
            ActorRole::Owner => "owner",
            ActorRole::System => "system",
        }
    }

    /// Parses a role name, returning None for unknown roles.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(ActorRole::Customer),
            "merchant" => Some(ActorRole::Merchant),
            "admin" => Some(ActorRole::Admin),
            "owner" => Some(ActorRole::Owner),
            "system" => Some(ActorRole::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whoever triggered an operation; recorded on every lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub actor_id: String,
    pub actor_role: ActorRole,
}

impl Actor {
    pub fn new(actor_id: impl Into<String>, actor_role: ActorRole) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_role,
        }
    }

    /// The merchant acting on its own behalf.
    pub fn merchant(merchant_id: &MerchantId) -> Self {
        Self::new(merchant_id.as_str(), ActorRole::Merchant)
    }

    pub fn admin(actor_id: impl Into<String>) -> Self {
        Self::new(actor_id, ActorRole::Admin)
    }

    pub fn customer(actor_id: impl Into<String>) -> Self {
        Self::new(actor_id, ActorRole::Customer)
    }

    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }

    /// Returns true for roles allowed to override merchant ownership.
    pub fn is_administrative(&self) -> bool {
        matches!(
            self.actor_role,
            ActorRole::Admin | ActorRole::Owner | ActorRole::System
        )
    }

    /// Returns true if this actor is the given merchant.
    pub fn is_merchant(&self, merchant_id: &MerchantId) -> bool {
        self.actor_role == ActorRole::Merchant && self.actor_id == merchant_id.as_str()
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.actor_role, self.actor_id)
    }
}
