use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

use crate::itinerary::FareItinerary;
use crate::{CoreError, CoreResult};

/// Seats a single search may request across all passenger types.
pub const MAX_SEATS_PER_SEARCH: u32 = 9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JourneyType {
    OneWay,
    Return,
    Circle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OriginDestination {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
}

/// Itinerary query as submitted by the customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub journey_type: JourneyType,
    pub origin_destinations: Vec<OriginDestination>,
    #[serde(default)]
    pub cabin_class: CabinClass,
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl SearchQuery {
    pub fn one_way(origin: &str, destination: &str, departure_date: NaiveDate, adults: u32) -> Self {
        Self {
            journey_type: JourneyType::OneWay,
            origin_destinations: vec![OriginDestination {
                origin: origin.to_string(),
                destination: destination.to_string(),
                departure_date,
            }],
            cabin_class: CabinClass::Economy,
            adults,
            children: 0,
            infants: 0,
            currency: default_currency(),
        }
    }

    pub fn passenger_counts(&self) -> PassengerCounts {
        PassengerCounts {
            adults: self.adults,
            children: self.children,
            infants: self.infants,
        }
    }

    /// Rejects queries the backend would refuse anyway.
    pub fn validate(&self) -> CoreResult<()> {
        if self.adults == 0 {
            return Err(CoreError::ValidationError("At least one adult is required".into()));
        }
        if self.infants > self.adults {
            return Err(CoreError::ValidationError(
                "Each infant must travel with an adult".into(),
            ));
        }
        if self.adults + self.children + self.infants > MAX_SEATS_PER_SEARCH {
            return Err(CoreError::ValidationError(format!(
                "A search may include at most {} passengers",
                MAX_SEATS_PER_SEARCH
            )));
        }
        if self.origin_destinations.is_empty() {
            return Err(CoreError::ValidationError("At least one flight leg is required".into()));
        }
        let expected_legs = match self.journey_type {
            JourneyType::OneWay => 1,
            JourneyType::Return => 2,
            JourneyType::Circle => self.origin_destinations.len().max(2),
        };
        if self.origin_destinations.len() != expected_legs {
            return Err(CoreError::ValidationError(format!(
                "{:?} journeys need {} legs, got {}",
                self.journey_type,
                expected_legs,
                self.origin_destinations.len()
            )));
        }
        for leg in &self.origin_destinations {
            if leg.origin.eq_ignore_ascii_case(&leg.destination) {
                return Err(CoreError::ValidationError(format!(
                    "Origin and destination must differ ({})",
                    leg.origin
                )));
            }
        }
        Ok(())
    }

    /// Body for `POST /flights/search`.
    pub fn to_wire(&self) -> SearchRequestBody {
        SearchRequestBody {
            journey_type: self.journey_type,
            origin_destination_info: self
                .origin_destinations
                .iter()
                .map(|leg| OriginDestinationInfo {
                    departure_date: leg.departure_date,
                    airport_origin_code: leg.origin.to_uppercase(),
                    airport_destination_code: leg.destination.to_uppercase(),
                })
                .collect(),
            class: self.cabin_class,
            adults: self.adults,
            childs: self.children,
            infants: self.infants,
            required_currency: self.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PassengerCounts {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequestBody {
    pub journey_type: JourneyType,
    #[serde(rename = "OriginDestinationInfo")]
    pub origin_destination_info: Vec<OriginDestinationInfo>,
    pub class: CabinClass,
    pub adults: u32,
    pub childs: u32,
    pub infants: u32,
    pub required_currency: String,
}

#[derive(Debug, Serialize)]
pub struct OriginDestinationInfo {
    #[serde(rename = "departureDate")]
    pub departure_date: NaiveDate,
    #[serde(rename = "airportOriginCode")]
    pub airport_origin_code: String,
    #[serde(rename = "airportDestinationCode")]
    pub airport_destination_code: String,
}

/// Priced itineraries plus the search-level token that scopes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(alias = "SessionId", alias = "session_id")]
    pub session_id: String,
    #[serde(default, alias = "FareItineraries")]
    pub itineraries: Vec<FareItinerary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_one_way_query_is_valid() {
        let query = SearchQuery::one_way("DXB", "LHR", june_first(), 1);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_query_rejects_more_infants_than_adults() {
        let mut query = SearchQuery::one_way("DXB", "LHR", june_first(), 1);
        query.infants = 2;
        assert!(matches!(query.validate(), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_query_rejects_same_origin_and_destination() {
        let query = SearchQuery::one_way("DXB", "dxb", june_first(), 1);
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_return_query_needs_two_legs() {
        let mut query = SearchQuery::one_way("DXB", "LHR", june_first(), 1);
        query.journey_type = JourneyType::Return;
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_wire_body_uses_backend_field_names() {
        let mut query = SearchQuery::one_way("dxb", "lhr", june_first(), 2);
        query.children = 1;
        let body = serde_json::to_value(query.to_wire()).unwrap();

        assert_eq!(body["journeyType"], "OneWay");
        assert_eq!(body["childs"], 1);
        assert_eq!(body["requiredCurrency"], "USD");
        assert_eq!(body["OriginDestinationInfo"][0]["airportOriginCode"], "DXB");
        assert_eq!(body["OriginDestinationInfo"][0]["departureDate"], "2025-06-01");
    }

    #[test]
    fn test_search_response_accepts_trawex_casing() {
        let json = r#"{ "SessionId": "S-1", "FareItineraries": [] }"#;
        let response: SearchResponse = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(response.session_id, "S-1");
        assert!(response.itineraries.is_empty());
    }
}
