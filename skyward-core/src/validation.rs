//! Client-side checks on the booking form.
//!
//! Everything here is pure: the same draft and departure date always give
//! the same report, and nothing touches the network or the session.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::passenger::{BookingDraft, PassengerDraft, PassengerKind, PassportDetails};
use crate::search::PassengerCounts;

const DAYS_PER_YEAR: f64 = 365.25;

/// Field-level errors plus an optional one-line summary for the form header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub field_errors: BTreeMap<String, String>,
    pub summary: Option<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty()
    }

    fn error(&mut self, field: String, message: &str) {
        self.field_errors.entry(field).or_insert_with(|| message.to_string());
    }
}

/// Age in years on `departure`, counted as whole days / 365.25.
pub fn age_at(date_of_birth: NaiveDate, departure: NaiveDate) -> f64 {
    (departure - date_of_birth).num_days() as f64 / DAYS_PER_YEAR
}

/// Returns the complaint for an age outside the passenger type's window.
pub fn age_window_error(kind: PassengerKind, age: f64) -> Option<&'static str> {
    let ok = match kind {
        PassengerKind::Adult => age > 12.0,
        PassengerKind::Child => age > 2.0 && age <= 12.0,
        PassengerKind::Infant => age > 0.0 && age <= 2.0,
    };
    if ok {
        return None;
    }
    Some(match kind {
        PassengerKind::Adult => "must be older than 12 years on the departure date",
        PassengerKind::Child => "must be between 2 and 12 years old on the departure date",
        PassengerKind::Infant => "must be under 2 years old on the departure date",
    })
}

/// Validates every passenger and the contact block against `departure`.
///
/// `expected` is the passenger mix the search was made for; a draft with a
/// different mix cannot be booked against those fares.
pub fn validate_booking(
    draft: &BookingDraft,
    departure: NaiveDate,
    passport_required: bool,
    expected: Option<PassengerCounts>,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut age_summary: Option<String> = None;

    if let Some(expected) = expected {
        let actual = draft.counts();
        if actual != expected {
            report.error(
                "passengers".to_string(),
                "Passenger details do not match the searched passenger count",
            );
        }
    }

    for (kind, passengers) in draft.groups() {
        for (index, passenger) in passengers.iter().enumerate() {
            let prefix = format!("{}[{}]", kind.field_group(), index);
            if let Some(message) =
                validate_passenger(&mut report, &prefix, kind, passenger, departure, passport_required)
            {
                age_summary.get_or_insert_with(|| format!("{} {} {}", kind.label(), index + 1, message));
            }
        }
    }

    if draft.contact.email.is_blank() {
        report.error("contact.email".to_string(), "Email is required");
    }
    if draft.contact.phone.is_blank() {
        report.error("contact.phone".to_string(), "Phone number is required");
    }

    if !report.is_valid() {
        report.summary = Some(age_summary.unwrap_or_else(|| {
            let count = report.field_errors.len();
            if count == 1 {
                "Please correct the highlighted field".to_string()
            } else {
                format!("Please correct the {} highlighted fields", count)
            }
        }));
    }

    report
}

/// Returns the age-window message, if any, for use in the summary line.
fn validate_passenger(
    report: &mut ValidationReport,
    prefix: &str,
    kind: PassengerKind,
    passenger: &PassengerDraft,
    departure: NaiveDate,
    passport_required: bool,
) -> Option<&'static str> {
    if passenger.first_name.trim().is_empty() {
        report.error(format!("{}.firstName", prefix), "First name is required");
    }
    if passenger.last_name.trim().is_empty() {
        report.error(format!("{}.lastName", prefix), "Last name is required");
    }

    let mut age_error = None;
    match passenger.date_of_birth {
        None => report.error(format!("{}.dateOfBirth", prefix), "Date of birth is required"),
        Some(dob) => {
            if let Some(message) = age_window_error(kind, age_at(dob, departure)) {
                report.error(format!("{}.dateOfBirth", prefix), &format!("{} {}", kind.label(), message));
                age_error = Some(message);
            }
        }
    }

    if passport_required {
        let empty = PassportDetails::default();
        let passport = passenger.passport.as_ref().unwrap_or(&empty);
        validate_passport(report, prefix, passport, departure);
    }

    age_error
}

fn validate_passport(
    report: &mut ValidationReport,
    prefix: &str,
    passport: &PassportDetails,
    departure: NaiveDate,
) {
    if passport.number.as_ref().map_or(true, |n| n.is_blank()) {
        report.error(format!("{}.passport.number", prefix), "Passport number is required");
    }
    if passport
        .issuing_country
        .as_deref()
        .map_or(true, |c| c.trim().is_empty())
    {
        report.error(
            format!("{}.passport.issuingCountry", prefix),
            "Issuing country is required",
        );
    }
    match passport.issue_date {
        None => report.error(format!("{}.passport.issueDate", prefix), "Issue date is required"),
        Some(issued) if issued > departure => report.error(
            format!("{}.passport.issueDate", prefix),
            "Issue date cannot be after the departure date",
        ),
        Some(_) => {}
    }
    match passport.expiry_date {
        None => report.error(format!("{}.passport.expiryDate", prefix), "Expiry date is required"),
        Some(expires) if expires < departure => report.error(
            format!("{}.passport.expiryDate", prefix),
            "Passport expires before the departure date",
        ),
        Some(_) => {}
    }
}
