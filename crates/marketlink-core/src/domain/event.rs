//! Inbox events and acknowledgment tracking
//!
//! The marketplace delivers order-lifecycle notifications through a
//! poll-and-acknowledge inbox. Events are transient: they are classified,
//! handled, and acknowledged by the highest id seen on the page.

use serde_json::Value;

// ============================================================================
// InboxEvent
// ============================================================================

/// A single notification pulled from the marketplace inbox
///
/// The id can be numeric or an opaque string depending on the marketplace
/// deployment; it is normalized to a string here and only interpreted
/// numerically for acknowledgment ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxEvent {
    /// Event id as delivered, normalized to a string (`None` if absent)
    pub id: Option<String>,
    /// Raw event type string
    pub event_type: String,
    /// Event payload object (empty object when absent or malformed)
    pub payload: Value,
}

impl InboxEvent {
    /// Builds an event from one element of the inbox response array.
    ///
    /// Returns `None` for elements that are not JSON objects; such entries
    /// cannot be classified or acknowledged and are skipped by the engine.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let id = match obj.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let event_type = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let payload = match obj.get("payload") {
            Some(p @ Value::Object(_)) => p.clone(),
            _ => Value::Object(serde_json::Map::new()),
        };

        Some(Self {
            id,
            event_type,
            payload,
        })
    }

    /// Classifies the raw event type
    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::classify(&self.event_type)
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Classification of an inbox event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A new order was placed on the marketplace
    OrderCreated,
    /// An existing marketplace order changed status
    OrderStatusChanged,
    /// Any other event type; logged and ignored
    Other,
}

impl EventKind {
    /// Maps the raw type string (including the aliases different
    /// marketplace versions emit) to a classification
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        match raw {
            "orderCreated" | "ORDER_CREATED" | "newOrder" => Self::OrderCreated,
            "orderStatusChanged" | "orderSellerStatusChanged" => Self::OrderStatusChanged,
            _ => Self::Other,
        }
    }
}

// ============================================================================
// AckTracker
// ============================================================================

/// Tracks the id to acknowledge for one inbox page.
///
/// When both the current and the candidate ids are purely numeric the
/// numerically larger one is kept; otherwise the most recently seen id wins.
/// This is a conservative tie-break, not a universally correct ordering —
/// opaque ids carry no order we could exploit.
#[derive(Debug, Default)]
pub struct AckTracker {
    last: Option<String>,
}

impl AckTracker {
    /// Creates an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes one event id
    pub fn observe(&mut self, id: &str) {
        match &self.last {
            Some(current) => {
                let keep_current = match (current.parse::<u64>(), id.parse::<u64>()) {
                    (Ok(a), Ok(b)) => a >= b,
                    _ => false,
                };
                if !keep_current {
                    self.last = Some(id.to_string());
                }
            }
            None => self.last = Some(id.to_string()),
        }
    }

    /// Returns the id to acknowledge, if any event carried one
    #[must_use]
    pub fn ack_id(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

// ============================================================================
// Tests
// ============================================================================
