use std::collections::BTreeMap;

use serde::Serialize;

/// One extracted booking. `success` is only set when the record carries a
/// well-formed PNR, at least one passenger with a real (non-placeholder)
/// name, and at least one journey segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketRecord {
    pub pnr: Option<String>,
    pub transaction_id: Option<String>,
    pub ticket_print_time: Option<String>,
    pub journeys: Vec<JourneySegment>,
    pub passengers: Vec<Passenger>,
    pub payment: PaymentBreakdown,
    pub journey_metadata: Option<JourneyMetadata>,
    pub success: bool,
    pub error: Option<String>,
    pub page_number: usize,
    pub validation: Option<ValidationReport>,
    pub extraction: Option<ExtractionMetadata>,
}

impl TicketRecord {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JourneySegment {
    pub train_number: Option<String>,
    pub train_name: Option<String>,
    pub travel_class: Option<String>,
    pub quota: Option<String>,
    pub journey_date: Option<String>,
    pub distance_km: Option<u32>,
    pub boarding: Option<StationEvent>,
    pub destination: Option<StationEvent>,
}

impl JourneySegment {
    /// Composite identity used to drop repeats of the same leg extracted
    /// from overlapping pages (confirmation page vs tax invoice page).
    pub fn identity_key(&self) -> String {
        fn part(value: Option<&str>) -> &str {
            value.unwrap_or("UNKNOWN")
        }

        fn event_part(event: Option<&StationEvent>) -> String {
            match event {
                Some(event) => format!(
                    "{}@{}",
                    event.station_code.as_deref().unwrap_or("UNKNOWN"),
                    event.datetime.as_deref().unwrap_or("UNKNOWN")
                ),
                None => "UNKNOWN@UNKNOWN".to_string(),
            }
        }

        format!(
            "{}|{}|{}|{}|{}",
            part(self.train_number.as_deref()),
            part(self.train_name.as_deref()),
            part(self.travel_class.as_deref()),
            event_part(self.boarding.as_ref()),
            event_part(self.destination.as_ref()),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.train_number.is_none()
            && self.train_name.is_none()
            && self.travel_class.is_none()
            && self.quota.is_none()
            && self.journey_date.is_none()
            && self.distance_km.is_none()
            && self.boarding.is_none()
            && self.destination.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StationEvent {
    pub station_name: Option<String>,
    pub station_code: Option<String>,
    pub datetime: Option<String>,
}

impl StationEvent {
    pub fn is_empty(&self) -> bool {
        self.station_name.is_none() && self.station_code.is_none() && self.datetime.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passenger {
    pub serial: usize,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub food_choice: Option<FoodChoice>,
    pub booking_status: Option<String>,
    pub current_status: Option<String>,
    pub passenger_key: Option<String>,
    pub confidence: Option<f64>,
    pub gender_inferred: bool,
    pub age_category: Option<AgeCategory>,
    pub fare_share: Option<f64>,
}

impl Passenger {
    pub fn is_placeholder(&self) -> bool {
        self.name.starts_with("PASSENGER_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    Male,
    Female,
    Transgender,
}

impl Gender {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            "Transgender" => Some(Self::Transgender),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Transgender => "Transgender",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FoodChoice {
    Veg,
    #[serde(rename = "Non-Veg")]
    NonVeg,
    Jain,
}

impl FoodChoice {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "Veg" => Some(Self::Veg),
            "Non-Veg" => Some(Self::NonVeg),
            "JAIN" | "Jain" => Some(Self::Jain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeCategory {
    Child,
    Minor,
    Adult,
    Senior,
}

impl AgeCategory {
    pub fn for_age(age: u32) -> Self {
        match age {
            0..=12 => Self::Child,
            13..=17 => Self::Minor,
            18..=59 => Self::Adult,
            _ => Self::Senior,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentBreakdown {
    pub ticket_fare: Option<f64>,
    pub convenience_fee: Option<f64>,
    pub insurance: Option<f64>,
    pub agent_fee: Option<f64>,
    pub gateway_charges: Option<f64>,
    pub total: Option<f64>,
}

impl PaymentBreakdown {
    pub fn populated_fields(&self) -> usize {
        [
            self.ticket_fare,
            self.convenience_fee,
            self.insurance,
            self.agent_fee,
            self.gateway_charges,
            self.total,
        ]
        .iter()
        .filter(|value| value.is_some())
        .count()
    }

    pub fn component_sum(&self) -> f64 {
        self.ticket_fare.unwrap_or(0.0)
            + self.convenience_fee.unwrap_or(0.0)
            + self.insurance.unwrap_or(0.0)
            + self.agent_fee.unwrap_or(0.0)
            + self.gateway_charges.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JourneyMetadata {
    pub total_segments: usize,
    pub is_multi_segment: bool,
    pub total_distance_km: u32,
    pub journey_type: String,
    pub connections: Vec<Connection>,
    pub has_overnight: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub station: String,
    pub from_train: Option<String>,
    pub to_train: Option<String>,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub overall_score: f64,
    pub field_validations: BTreeMap<String, FieldValidation>,
    pub cross_validations: BTreeMap<String, CrossValidation>,
    pub anomalies: Vec<String>,
    pub corrections_applied: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValidation {
    pub valid: bool,
    pub score: f64,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidation {
    pub valid: bool,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionMetadata {
    pub source_path: String,
    pub method: String,
    pub extracted_at: String,
    pub sha256: Option<String>,
    pub stats: ExtractionStats,
    pub quality_score: u32,
    pub audit: AuditTrail,
}

/// Computed fresh for every extraction call and attached to the result;
/// nothing accumulates across documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub fields_extracted: usize,
    pub passengers_extracted: usize,
    pub journeys_found: usize,
    pub validation_score: f64,
    pub anomalies_detected: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditTrail {
    pub passenger_count: usize,
    pub journey_count: usize,
    pub payment_fields: usize,
    pub validation_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Single(Box<TicketRecord>),
    Multi(MultiBookingRecord),
}

/// Wrapper returned when a multi-page document turns out to hold several
/// independent bookings rather than one booking spread over pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiBookingRecord {
    pub multi_booking: bool,
    pub booking_count: usize,
    pub bookings: Vec<TicketRecord>,
    pub success: bool,
    pub extraction: ExtractionMetadata,
}

#[cfg(test)]
mod tests {
    use super::{AgeCategory, FoodChoice, Gender, JourneySegment, StationEvent};

    #[test]
    fn identity_key_is_stable_for_identical_segments() {
        let segment = JourneySegment {
            train_number: Some("20958".to_string()),
            train_name: Some("INDORE EXPRESS".to_string()),
            travel_class: Some("3A".to_string()),
            boarding: Some(StationEvent {
                station_name: Some("NEW DELHI".to_string()),
                station_code: Some("NDLS".to_string()),
                datetime: Some("15-03-2024 22:30:00".to_string()),
            }),
            ..JourneySegment::default()
        };

        assert_eq!(segment.identity_key(), segment.clone().identity_key());
        assert!(segment.identity_key().starts_with("20958|INDORE EXPRESS|3A|NDLS@"));
    }

    #[test]
    fn identity_key_uses_unknown_for_missing_parts() {
        let segment = JourneySegment::default();
        assert_eq!(
            segment.identity_key(),
            "UNKNOWN|UNKNOWN|UNKNOWN|UNKNOWN@UNKNOWN|UNKNOWN@UNKNOWN"
        );
    }

    #[test]
    fn age_categories_follow_booking_rules() {
        assert_eq!(AgeCategory::for_age(12), AgeCategory::Child);
        assert_eq!(AgeCategory::for_age(17), AgeCategory::Minor);
        assert_eq!(AgeCategory::for_age(59), AgeCategory::Adult);
        assert_eq!(AgeCategory::for_age(60), AgeCategory::Senior);
    }

    #[test]
    fn enum_tokens_parse_from_ticket_text() {
        assert_eq!(Gender::parse("Female"), Some(Gender::Female));
        assert_eq!(Gender::parse("female"), None);
        assert_eq!(FoodChoice::parse("JAIN"), Some(FoodChoice::Jain));
        assert_eq!(FoodChoice::parse("-"), None);
    }
}
