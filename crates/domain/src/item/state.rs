//! Item lifecycle states and the transition table.

use serde::{Deserialize, Serialize};

/// Status of a single order item.
///
/// ```text
/// pending ──claim──► assigned ──► processing ──► shipped ──► delivered
///    ▲  │                │            │  └─────────────────────▲
///    └──┘ reject         └────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Assigned,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 6] = [
        ItemStatus::Pending,
        ItemStatus::Assigned,
        ItemStatus::Processing,
        ItemStatus::Shipped,
        ItemStatus::Delivered,
        ItemStatus::Cancelled,
    ];

    /// Delivered and cancelled accept no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Delivered | ItemStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Assigned => "assigned",
            ItemStatus::Processing => "processing",
            ItemStatus::Shipped => "shipped",
            ItemStatus::Delivered => "delivered",
            ItemStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of an item event, without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemEventKind {
    Claim,
    Reject,
    StartProcessing,
    Ship,
    Deliver,
    Cancel,
}

impl ItemEventKind {
    pub const ALL: [ItemEventKind; 6] = [
        ItemEventKind::Claim,
        ItemEventKind::Reject,
        ItemEventKind::StartProcessing,
        ItemEventKind::Ship,
        ItemEventKind::Deliver,
        ItemEventKind::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemEventKind::Claim => "claim",
            ItemEventKind::Reject => "reject",
            ItemEventKind::StartProcessing => "start_processing",
            ItemEventKind::Ship => "ship",
            ItemEventKind::Deliver => "deliver",
            ItemEventKind::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for ItemEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every permitted (state, event) pair and its target. Anything not listed
/// is an invalid transition.
pub const TRANSITIONS: &[(ItemStatus, ItemEventKind, ItemStatus)] = &[
    (ItemStatus::Pending, ItemEventKind::Claim, ItemStatus::Assigned),
    (ItemStatus::Pending, ItemEventKind::Reject, ItemStatus::Pending),
    (ItemStatus::Assigned, ItemEventKind::StartProcessing, ItemStatus::Processing),
    (ItemStatus::Assigned, ItemEventKind::Cancel, ItemStatus::Cancelled),
    (ItemStatus::Processing, ItemEventKind::Ship, ItemStatus::Shipped),
    (ItemStatus::Processing, ItemEventKind::Deliver, ItemStatus::Delivered),
    (ItemStatus::Processing, ItemEventKind::Cancel, ItemStatus::Cancelled),
    (ItemStatus::Shipped, ItemEventKind::Deliver, ItemStatus::Delivered),
];

/// Looks up the target state for an event, None if the pair is not permitted.
pub fn transition_target(from: ItemStatus, event: ItemEventKind) -> Option<ItemStatus> {
    TRANSITIONS
        .iter()
        .find(|(state, kind, _)| *state == from && *kind == event)
        .map(|(_, _, to)| *to)
}
