use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Booking and ticketing status as reported by `GET /ticket/:bookingId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatus {
    #[serde(default)]
    pub booking_id: String,
    #[serde(default)]
    pub pnr: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ticket_numbers: Vec<String>,
}

const FAILED_STATUSES: &[&str] = &["cancelled", "canceled", "failed", "bookingfailed", "rejected"];

impl TicketStatus {
    pub fn is_issued(&self) -> bool {
        !self.ticket_numbers.is_empty()
    }

    /// The backend gave up on the booking; no ticket will follow.
    pub fn is_failed(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| s.replace(['_', ' '], "").to_lowercase())
            .is_some_and(|s| FAILED_STATUSES.contains(&s.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingActionKind {
    Cancel,
    Refund,
    Reissue,
}

impl BookingActionKind {
    pub fn path(&self) -> &'static str {
        match self {
            BookingActionKind::Cancel => "/flights/cancel",
            BookingActionKind::Refund => "/flights/refund-request",
            BookingActionKind::Reissue => "/flights/reissue-request",
        }
    }
}

/// A lifecycle mutation on an existing booking, keyed by its unique id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingAction {
    #[serde(rename = "UniqueID")]
    pub unique_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_date: Option<NaiveDate>,
}

impl BookingAction {
    pub fn new(unique_id: &str) -> Self {
        Self {
            unique_id: unique_id.to_string(),
            remarks: None,
            preferred_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionReceipt {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_status_deserialization() {
        let json = r#"{ "bookingId": "B123", "pnr": "ABC123", "status": "Ticketed", "ticketNumbers": ["TKT001"] }"#;
        let status: TicketStatus = serde_json::from_str(json).expect("Failed to deserialize");
        assert!(status.is_issued());
        assert!(!status.is_failed());
        assert_eq!(status.pnr.as_deref(), Some("ABC123"));
    }

    #[test]
    fn test_pending_ticket_is_neither_issued_nor_failed() {
        let status: TicketStatus = serde_json::from_str(r#"{ "bookingId": "B123" }"#).unwrap();
        assert!(!status.is_issued());
        assert!(!status.is_failed());
    }

    #[test]
    fn test_failed_statuses() {
        for raw in ["Cancelled", "BOOKING_FAILED", "failed"] {
            let status = TicketStatus { status: Some(raw.into()), ..Default::default() };
            assert!(status.is_failed(), "{}", raw);
        }
    }

    #[test]
    fn test_action_body_uses_unique_id() {
        let action = BookingAction::new("PNR42");
        let body = serde_json::to_value(&action).unwrap();
        assert_eq!(body, serde_json::json!({ "UniqueID": "PNR42" }));
    }
}
