//! Node type discriminant.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every node type the flow editor can produce.
///
/// Unknown type strings are preserved as [`NodeKind::Other`] so a flow that
/// references a type with no registered executor can still be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Input,
    Start,
    Message,
    Question,
    Poll,
    Catalog,
    Slot,
    StockCheck,
    AddToCart,
    CreateOrder,
    OrderSummary,
    Condition,
    FlowLink,
    MediaUpload,
    Document,
    Handover,
    Timer,
    Report,
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Input => "input",
            Self::Start => "start",
            Self::Message => "message",
            Self::Question => "question",
            Self::Poll => "poll",
            Self::Catalog => "catalog",
            Self::Slot => "slot",
            Self::StockCheck => "stockCheck",
            Self::AddToCart => "addToCart",
            Self::CreateOrder => "createOrder",
            Self::OrderSummary => "orderSummary",
            Self::Condition => "condition",
            Self::FlowLink => "flowLink",
            Self::MediaUpload => "mediaUpload",
            Self::Document => "document",
            Self::Handover => "handover",
            Self::Timer => "timer",
            Self::Report => "report",
            Self::Other(s) => s,
        }
    }

    /// Entry nodes are preferred when choosing where a new execution starts.
    pub fn is_entry(&self) -> bool {
        matches!(self, Self::Input | Self::Start)
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "input" => Self::Input,
            "start" => Self::Start,
            "message" => Self::Message,
            "question" => Self::Question,
            "poll" => Self::Poll,
            "catalog" => Self::Catalog,
            "slot" => Self::Slot,
            "stockCheck" => Self::StockCheck,
            "addToCart" => Self::AddToCart,
            "createOrder" => Self::CreateOrder,
            "orderSummary" => Self::OrderSummary,
            "condition" => Self::Condition,
            "flowLink" => Self::FlowLink,
            "mediaUpload" => Self::MediaUpload,
            "document" => Self::Document,
            "handover" => Self::Handover,
            "timer" => Self::Timer,
            "report" => Self::Report,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_round_trip_through_serde() {
        let kind: NodeKind = serde_json::from_str("\"stockCheck\"").unwrap();
        assert_eq!(kind, NodeKind::StockCheck);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"stockCheck\"");
    }

    #[test]
    fn unknown_types_are_preserved() {
        let kind = NodeKind::from("carousel");
        assert_eq!(kind, NodeKind::Other("carousel".into()));
        assert_eq!(kind.to_string(), "carousel");
    }
}
