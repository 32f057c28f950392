use std::collections::BTreeMap;

use tracing::debug;

use crate::directory::ReferenceDirectory;
use crate::extract::passenger::infer_gender_from_name;
use crate::model::{
    CrossValidation, FieldValidation, Passenger, TicketRecord, ValidationReport,
};

/// Weight vector applied to the first nine identifier digits; the modulo-10
/// complement of the weighted sum must equal the tenth digit.
const PNR_CHECKSUM_WEIGHTS: [u32; 9] = [2, 3, 4, 5, 6, 7, 2, 3, 4];

/// Digit prefixes seen on genuine booking references; a failed checksum with
/// one of these still scores as "plausible, checksum suspect".
const PNR_COMMON_PREFIXES: [char; 6] = ['1', '2', '3', '4', '8', '9'];

const BOOKING_STATUS_CODES: &[&str] = &["CNF", "RAC", "WL"];

/// Reservation-system cap on passengers per booking.
const MAX_PASSENGERS_PER_BOOKING: usize = 6;

/// Absolute tolerance when comparing the printed total against the component
/// sum; templates round individual fees independently.
const PAYMENT_SUM_TOLERANCE: f64 = 1.0;

pub fn well_formed_pnr(pnr: &str) -> bool {
    pnr.len() == 10 && pnr.chars().all(|ch| ch.is_ascii_digit())
}

/// Identifier checksum check. Returns validity and a 0-100 score: a passing
/// checksum scores 100, a failing one 85 when the prefix is plausible and 70
/// otherwise; a malformed identifier scores 0.
pub fn pnr_checksum(pnr: &str) -> (bool, f64) {
    if !well_formed_pnr(pnr) {
        return (false, 0.0);
    }

    let digits: Vec<u32> = pnr.chars().filter_map(|ch| ch.to_digit(10)).collect();
    let weighted_sum: u32 = digits
        .iter()
        .zip(PNR_CHECKSUM_WEIGHTS.iter())
        .map(|(digit, weight)| digit * weight)
        .sum();
    let check_digit = (10 - (weighted_sum % 10)) % 10;

    if check_digit == digits[9] {
        (true, 100.0)
    } else if pnr.starts_with(PNR_COMMON_PREFIXES) {
        (false, 85.0)
    } else {
        (false, 70.0)
    }
}

pub struct Validator<'a> {
    directory: &'a dyn ReferenceDirectory,
}

impl<'a> Validator<'a> {
    pub fn new(directory: &'a dyn ReferenceDirectory) -> Self {
        Self { directory }
    }

    /// Full field and cross-field validation. Mutates the record only in two
    /// sanctioned places: station-code correction and gender inference for a
    /// previously-absent field. Identifiers and names are never rewritten.
    pub fn validate(&self, record: &mut TicketRecord) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut total_score = 0.0_f64;
        let mut field_count = 0usize;

        if let Some(pnr) = record.pnr.clone() {
            let (valid, score) = pnr_checksum(&pnr);
            if !valid {
                report
                    .anomalies
                    .push(format!("invalid PNR checksum: {pnr}"));
            }
            report
                .field_validations
                .insert("pnr".to_string(), FieldValidation { valid, score, value: pnr });
            total_score += score;
            field_count += 1;
        }

        for (index, segment) in record.journeys.iter_mut().enumerate() {
            let ordinal = index + 1;

            if let Some(number) = segment.train_number.clone() {
                let (valid, score) = self.train_number(&number);
                if !valid {
                    report
                        .anomalies
                        .push(format!("unknown train number: {number}"));
                }
                report.field_validations.insert(
                    format!("journey_{ordinal}_train"),
                    FieldValidation { valid, score, value: number },
                );
                total_score += score;
                field_count += 1;
            }

            let sides = [
                ("boarding", segment.boarding.as_mut()),
                ("destination", segment.destination.as_mut()),
            ];
            for (side, event) in sides {
                let Some(event) = event else {
                    continue;
                };
                let Some(code) = event.station_code.clone() else {
                    continue;
                };

                let (valid, score) = self.station_code(&code);
                if !valid {
                    report
                        .anomalies
                        .push(format!("unknown station code: {code}"));
                    if let Some(corrected) = self.correct_station_code(&code) {
                        debug!(from = %code, to = %corrected, "station code corrected");
                        report
                            .corrections_applied
                            .push(format!("corrected station code {code} -> {corrected}"));
                        event.station_code = Some(corrected);
                    }
                }
                report.field_validations.insert(
                    format!("journey_{ordinal}_{side}_station"),
                    FieldValidation { valid, score, value: code },
                );
                total_score += score;
                field_count += 1;
            }
        }

        for passenger in record.passengers.iter_mut() {
            let (valid, score) = passenger_record(passenger);
            report.field_validations.insert(
                format!("passenger_{}", passenger.serial),
                FieldValidation {
                    valid,
                    score,
                    value: passenger.name.clone(),
                },
            );
            total_score += score;
            field_count += 1;

            if passenger.gender.is_none() {
                if let Some(inferred) = infer_gender_from_name(&passenger.name) {
                    passenger.gender = Some(inferred);
                    passenger.gender_inferred = true;
                    report.corrections_applied.push(format!(
                        "inferred gender for {}: {}",
                        passenger.name,
                        inferred.as_str()
                    ));
                }
            }
        }

        report.cross_validations = self.cross_validations(record);
        for (name, cross) in &report.cross_validations {
            if !cross.valid {
                report
                    .anomalies
                    .push(format!("cross validation failed: {name}"));
            }
        }

        if field_count > 0 {
            report.overall_score = total_score / field_count as f64;
        }

        report
    }

    fn train_number(&self, number: &str) -> (bool, f64) {
        if number.len() != 5 || !number.chars().all(|ch| ch.is_ascii_digit()) {
            return (false, 30.0);
        }

        if self.directory.train(number).is_some() {
            return (true, 100.0);
        }

        match number.parse::<u32>() {
            Ok(value) if (10000..=99999).contains(&value) => (true, 80.0),
            _ => (false, 50.0),
        }
    }

    fn station_code(&self, code: &str) -> (bool, f64) {
        if code.is_empty() || !code.chars().all(|ch| ch.is_ascii_uppercase()) {
            return (false, 20.0);
        }
        if code.len() < 2 || code.len() > 5 {
            return (false, 30.0);
        }
        if self.directory.station(code).is_some() {
            return (true, 100.0);
        }

        (false, 60.0)
    }

    /// Retry a failed station code with OCR-confusable digits mapped back to
    /// the letters they are misread from. Only a directory hit counts.
    fn correct_station_code(&self, code: &str) -> Option<String> {
        let corrected: String = code
            .chars()
            .map(|ch| match ch {
                '0' => 'O',
                '1' => 'I',
                '5' => 'S',
                '8' => 'B',
                other => other,
            })
            .collect();

        if corrected != code && self.directory.station(&corrected).is_some() {
            Some(corrected)
        } else {
            None
        }
    }

    fn cross_validations(&self, record: &TicketRecord) -> BTreeMap<String, CrossValidation> {
        let mut validations = BTreeMap::new();

        for segment in &record.journeys {
            let Some(journey_date) = segment.journey_date.as_deref() else {
                continue;
            };
            let Some(departure) = segment
                .boarding
                .as_ref()
                .and_then(|event| event.datetime.as_deref())
            else {
                continue;
            };

            validations.insert(
                "date_time_consistency".to_string(),
                CrossValidation {
                    valid: departure.contains(journey_date),
                    details: format!("journey date {journey_date} vs departure {departure}"),
                },
            );
            break;
        }

        let passenger_count = record.passengers.len();
        if passenger_count > 0 {
            validations.insert(
                "passenger_count".to_string(),
                CrossValidation {
                    valid: (1..=MAX_PASSENGERS_PER_BOOKING).contains(&passenger_count),
                    details: format!("found {passenger_count} passengers"),
                },
            );
        }

        if let (Some(total), Some(_)) = (record.payment.total, record.payment.ticket_fare) {
            let calculated = record.payment.component_sum();
            validations.insert(
                "payment_calculation".to_string(),
                CrossValidation {
                    valid: (total - calculated).abs() < PAYMENT_SUM_TOLERANCE,
                    details: format!("total: {total}, calculated: {calculated}"),
                },
            );
        }

        validations
    }
}

/// Five equally weighted presence/format checks; a record is valid when at
/// least four hold.
fn passenger_record(passenger: &Passenger) -> (bool, f64) {
    let mut score = 0.0_f64;

    if passenger.name.len() > 1 {
        score += 1.0;
    }
    if passenger.age.is_some_and(|age| (1..=120).contains(&age)) {
        score += 1.0;
    }
    if passenger.gender.is_some() {
        score += 1.0;
    }
    // Food choice is optional; absent counts as consistent.
    score += 1.0;
    if passenger
        .booking_status
        .as_deref()
        .is_some_and(|status| BOOKING_STATUS_CODES.iter().any(|code| status.contains(code)))
    {
        score += 1.0;
    }

    let percentage = score / 5.0 * 100.0;
    (percentage >= 80.0, percentage)
}

#[cfg(test)]
mod tests {
    use super::{Validator, pnr_checksum, well_formed_pnr};
    use crate::directory::BuiltinDirectory;
    use crate::model::{
        JourneySegment, Passenger, PaymentBreakdown, StationEvent, TicketRecord,
    };

    fn passenger(name: &str) -> Passenger {
        Passenger {
            serial: 1,
            name: name.to_string(),
            age: Some(35),
            gender: None,
            food_choice: None,
            booking_status: Some("CNF/B2/32/LOWER".to_string()),
            current_status: Some("CNF".to_string()),
            passenger_key: None,
            confidence: None,
            gender_inferred: false,
            age_category: None,
            fare_share: None,
        }
    }

    #[test]
    fn checksum_accepts_only_the_derived_check_digit() {
        // Digits 1..9 under the weight vector: weighted sum 186, so the
        // check digit must be (10 - 186 % 10) % 10 = 4.
        let (valid, score) = pnr_checksum("1234567894");
        assert!(valid);
        assert_eq!(score, 100.0);

        let (valid, score) = pnr_checksum("1234567890");
        assert!(!valid);
        assert_eq!(score, 85.0);

        // Unusual prefix drops the fallback score.
        let (valid, score) = pnr_checksum("5234567890");
        assert!(!valid);
        assert_eq!(score, 70.0);

        assert_eq!(pnr_checksum("12345"), (false, 0.0));
        assert!(!well_formed_pnr("12345abcde"));
    }

    #[test]
    fn train_numbers_grade_by_directory_then_range() {
        let directory = BuiltinDirectory::new();
        let validator = Validator::new(&directory);

        assert_eq!(validator.train_number("20958"), (true, 100.0));
        assert_eq!(validator.train_number("54321"), (true, 80.0));
        assert_eq!(validator.train_number("04321"), (false, 50.0));
        assert_eq!(validator.train_number("123"), (false, 30.0));
    }

    #[test]
    fn station_codes_grade_by_format_then_directory() {
        let directory = BuiltinDirectory::new();
        let validator = Validator::new(&directory);

        assert_eq!(validator.station_code("NDLS"), (true, 100.0));
        assert_eq!(validator.station_code("ZZZ"), (false, 60.0));
        assert_eq!(validator.station_code("ND1S"), (false, 20.0));
        assert_eq!(validator.station_code("ABCDEF"), (false, 30.0));
    }

    #[test]
    fn confusable_station_code_is_corrected_in_place() {
        let directory = BuiltinDirectory::new();
        let validator = Validator::new(&directory);

        let mut record = TicketRecord {
            journeys: vec![JourneySegment {
                boarding: Some(StationEvent {
                    station_name: Some("NEW DELHI".to_string()),
                    station_code: Some("NDL5".to_string()),
                    datetime: None,
                }),
                ..JourneySegment::default()
            }],
            ..TicketRecord::default()
        };

        let report = validator.validate(&mut record);

        let corrected = record.journeys[0]
            .boarding
            .as_ref()
            .and_then(|event| event.station_code.as_deref());
        assert_eq!(corrected, Some("NDLS"));
        assert!(report.corrections_applied[0].contains("NDL5"));
    }

    #[test]
    fn payment_tolerance_allows_rounding_but_not_gaps() {
        let directory = BuiltinDirectory::new();
        let validator = Validator::new(&directory);

        let mut close = TicketRecord {
            payment: PaymentBreakdown {
                ticket_fare: Some(450.0),
                convenience_fee: Some(49.5),
                total: Some(500.0),
                ..PaymentBreakdown::default()
            },
            ..TicketRecord::default()
        };
        let report = validator.validate(&mut close);
        assert!(report.cross_validations["payment_calculation"].valid);

        let mut gapped = TicketRecord {
            payment: PaymentBreakdown {
                ticket_fare: Some(450.0),
                convenience_fee: Some(45.0),
                total: Some(500.0),
                ..PaymentBreakdown::default()
            },
            ..TicketRecord::default()
        };
        let report = validator.validate(&mut gapped);
        assert!(!report.cross_validations["payment_calculation"].valid);
    }

    #[test]
    fn gender_inference_is_recorded_as_a_correction() {
        let directory = BuiltinDirectory::new();
        let validator = Validator::new(&directory);

        let mut record = TicketRecord {
            passengers: vec![passenger("SITA DEVI")],
            ..TicketRecord::default()
        };

        let report = validator.validate(&mut record);
        assert!(record.passengers[0].gender.is_some());
        assert!(record.passengers[0].gender_inferred);
        assert!(
            report
                .corrections_applied
                .iter()
                .any(|entry| entry.contains("SITA DEVI"))
        );
    }

    #[test]
    fn overall_score_is_the_mean_of_field_scores() {
        let directory = BuiltinDirectory::new();
        let validator = Validator::new(&directory);

        let mut record = TicketRecord {
            pnr: Some("1234567894".to_string()),
            journeys: vec![JourneySegment {
                train_number: Some("54321".to_string()),
                ..JourneySegment::default()
            }],
            ..TicketRecord::default()
        };

        let report = validator.validate(&mut record);
        // (100 + 80) / 2
        assert_eq!(report.overall_score, 90.0);
    }

    #[test]
    fn date_time_consistency_checks_substring() {
        let directory = BuiltinDirectory::new();
        let validator = Validator::new(&directory);

        let mut record = TicketRecord {
            journeys: vec![JourneySegment {
                journey_date: Some("15-03-2024".to_string()),
                boarding: Some(StationEvent {
                    station_name: Some("NEW DELHI".to_string()),
                    station_code: Some("NDLS".to_string()),
                    datetime: Some("15-03-2024 22:30:00".to_string()),
                }),
                ..JourneySegment::default()
            }],
            ..TicketRecord::default()
        };

        let report = validator.validate(&mut record);
        assert!(report.cross_validations["date_time_consistency"].valid);
    }
}
