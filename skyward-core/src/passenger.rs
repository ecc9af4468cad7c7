use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::itinerary::{FareItinerary, SelectedFare};
use crate::pii::Masked;
use crate::search::PassengerCounts;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PassengerKind {
    Adult,
    Child,
    Infant,
}

impl PassengerKind {
    pub fn label(&self) -> &'static str {
        match self {
            PassengerKind::Adult => "Adult",
            PassengerKind::Child => "Child",
            PassengerKind::Infant => "Infant",
        }
    }

    /// Prefix used in field-level error keys.
    pub fn field_group(&self) -> &'static str {
        match self {
            PassengerKind::Adult => "adults",
            PassengerKind::Child => "children",
            PassengerKind::Infant => "infants",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassportDetails {
    #[serde(default)]
    pub number: Option<Masked<String>>,
    #[serde(default)]
    pub issuing_country: Option<String>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

/// Form state for one traveller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub passport: Option<PassportDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    #[serde(default)]
    pub email: Masked<String>,
    #[serde(default)]
    pub phone: Masked<String>,
    #[serde(default)]
    pub phone_country_code: Option<String>,
}

/// Everything the customer entered on the booking form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    #[serde(default)]
    pub adults: Vec<PassengerDraft>,
    #[serde(default)]
    pub children: Vec<PassengerDraft>,
    #[serde(default)]
    pub infants: Vec<PassengerDraft>,
    #[serde(default)]
    pub contact: ContactDetails,
}

impl BookingDraft {
    pub fn counts(&self) -> PassengerCounts {
        PassengerCounts {
            adults: self.adults.len() as u32,
            children: self.children.len() as u32,
            infants: self.infants.len() as u32,
        }
    }

    /// Passengers grouped by kind, in form order.
    pub fn groups(&self) -> [(PassengerKind, &[PassengerDraft]); 3] {
        [
            (PassengerKind::Adult, self.adults.as_slice()),
            (PassengerKind::Child, self.children.as_slice()),
            (PassengerKind::Infant, self.infants.as_slice()),
        ]
    }
}

/// Body for `POST /flights/book`, also carried as checkout metadata for
/// pay-first fares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub flight_session_id: String,
    pub fare_source_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fare_source_code_inbound: Option<String>,
    pub fare_type: String,
    pub adults: Vec<PassengerDraft>,
    pub childs: Vec<PassengerDraft>,
    pub infants: Vec<PassengerDraft>,
    pub contact: ContactDetails,
    pub itinerary: Vec<FareItinerary>,
}

impl BookingRequest {
    pub fn assemble(session_id: &str, selected: &SelectedFare, draft: &BookingDraft) -> Self {
        Self {
            flight_session_id: session_id.to_string(),
            fare_source_code: selected.outbound().fare_source_code().to_string(),
            fare_source_code_inbound: selected.inbound().map(|i| i.fare_source_code().to_string()),
            fare_type: String::from(selected.fare_type().clone()),
            adults: draft.adults.clone(),
            childs: draft.children.clone(),
            infants: draft.infants.clone(),
            contact: draft.contact.clone(),
            itinerary: selected.legs().into_iter().cloned().collect(),
        }
    }
}
