use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::extract::locate::{AnchorMatch, find_anchor};
use crate::model::{AgeCategory, FoodChoice, Gender, Passenger, PaymentBreakdown};

/// Per-booking passenger cap enforced by the reservation system.
const MAX_PASSENGERS: usize = 6;

/// Numbered-list entries carrying these words are fee lines, not names.
const FEE_KEYWORDS: &[&str] = &["charges", "fee", "fare", "total", "details"];

/// Lines that end the passenger-details section.
const SECTION_END_KEYWORDS: &[&str] = &[
    "PG Charges",
    "IRCTC Convenience Fee",
    "In case of cancellation",
];

const FEMALE_NAME_MARKERS: &[&str] = &["devi", "kumari", "ben", "bai", "rani", "mata"];
const MALE_NAME_MARKERS: &[&str] = &["kumar", "singh", "sharma", "das", "raj"];

pub fn infer_gender_from_name(name: &str) -> Option<Gender> {
    let lowered = name.to_lowercase();

    if FEMALE_NAME_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return Some(Gender::Female);
    }
    if MALE_NAME_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return Some(Gender::Male);
    }

    None
}

#[derive(Debug, Default, Clone)]
struct DetailRecord {
    age: Option<u32>,
    gender: Option<Gender>,
    food_choice: Option<FoodChoice>,
    booking_status: Option<String>,
    current_status: Option<String>,
}

pub struct PassengerAssembler {
    numbered_entry: Regex,
    decimal_token: Regex,
    upper_name: Regex,
    age_token: Regex,
    status_code: Regex,
}

impl PassengerAssembler {
    pub fn new() -> Result<Self> {
        Ok(Self {
            numbered_entry: Regex::new(r"^(\d+)\.\s*(.+)$")
                .context("failed to compile numbered entry pattern")?,
            decimal_token: Regex::new(r"^\d+(\.\d+)?$")
                .context("failed to compile decimal token pattern")?,
            upper_name: Regex::new(r"^[A-Z][A-Z\s]*$")
                .context("failed to compile name pattern")?,
            age_token: Regex::new(r"^\d{1,3}$").context("failed to compile age pattern")?,
            status_code: Regex::new(r"^(CNF|RAC|RLWL|PQWL|WL)")
                .context("failed to compile status pattern")?,
        })
    }

    /// Reconcile the two independently printed passenger sections. Names and
    /// details carry no linking key, so they are zipped by ordinal position —
    /// this assumes both sections list passengers in booking order, which
    /// holds for the observed templates but is not guaranteed by the format.
    /// A missing name becomes `PASSENGER_<n>`; missing details stay unknown.
    pub fn assemble(&self, lines: &[String]) -> Vec<Passenger> {
        let names = self.scan_names(lines);
        let details = self.scan_details(lines);

        debug!(
            names = names.len(),
            details = details.len(),
            "reconciling passenger sections"
        );

        let count = names.len().max(details.len());
        let mut passengers = Vec::with_capacity(count);

        for index in 0..count {
            let (serial, name) = match names.get(index) {
                Some((serial, name)) => (*serial, name.clone()),
                None => (index + 1, format!("PASSENGER_{}", index + 1)),
            };
            let detail = details.get(index).cloned().unwrap_or_default();

            passengers.push(Passenger {
                serial,
                name,
                age: detail.age,
                gender: detail.gender,
                food_choice: detail.food_choice,
                booking_status: detail.booking_status,
                current_status: detail.current_status,
                passenger_key: None,
                confidence: None,
                gender_inferred: false,
                age_category: None,
                fare_share: None,
            });
        }

        passengers
    }

    /// Numbered name list, usually printed near the end of the page. Fee
    /// lines also use `<n>.` numbering, hence the keyword and format filters.
    fn scan_names(&self, lines: &[String]) -> Vec<(usize, String)> {
        let mut names = Vec::new();

        for line in lines {
            let Some(captures) = self.numbered_entry.captures(line) else {
                continue;
            };

            let Ok(serial) = captures[1].parse::<usize>() else {
                continue;
            };
            let name = captures[2].trim().to_uppercase();
            let lowered = name.to_lowercase();

            if serial > 10
                || name.len() <= 2
                || FEE_KEYWORDS.iter().any(|word| lowered.contains(word))
                || self.decimal_token.is_match(&name)
                || !self.upper_name.is_match(&name)
            {
                continue;
            }

            debug!(serial, name = %name, "passenger name");
            names.push((serial, name));
        }

        names
    }

    /// Detail block: after the section anchor, each passenger prints as four
    /// consecutive lines (age, gender, food choice, booking status).
    fn scan_details(&self, lines: &[String]) -> Vec<DetailRecord> {
        let Some(anchor) = find_anchor(lines, &["Passenger Details"], AnchorMatch::Contains)
        else {
            debug!("no passenger details section found");
            return Vec::new();
        };

        let mut details = Vec::new();
        let mut index = anchor + 1;

        while index < lines.len() && details.len() < MAX_PASSENGERS {
            let line = &lines[index];

            if let Some(age) = self.parse_age(line) {
                let gender = lines
                    .get(index + 1)
                    .and_then(|token| Gender::parse(token));
                let food_choice = lines
                    .get(index + 2)
                    .and_then(|token| FoodChoice::parse(token));
                let booking_status = lines
                    .get(index + 3)
                    .filter(|token| self.status_code.is_match(token))
                    .cloned();
                let current_status = booking_status
                    .as_deref()
                    .and_then(|status| status.split('/').next())
                    .map(str::to_string);

                debug!(age, ?gender, ?booking_status, "passenger detail record");
                details.push(DetailRecord {
                    age: Some(age),
                    gender,
                    food_choice,
                    booking_status,
                    current_status,
                });

                index += 4;
                continue;
            }

            if SECTION_END_KEYWORDS.iter().any(|word| line.contains(word)) {
                break;
            }

            index += 1;
        }

        details
    }

    fn parse_age(&self, line: &str) -> Option<u32> {
        if !self.age_token.is_match(line) {
            return None;
        }
        let age: u32 = line.parse().ok()?;
        (1..=120).contains(&age).then_some(age)
    }

    /// Derivation pass over the reconciled roster: identity key, confidence,
    /// gender inference, age category, and an even fare split.
    pub fn enrich(&self, passengers: &mut [Passenger], payment: &PaymentBreakdown) {
        let fare_share = payment.total.and_then(|total| {
            if passengers.is_empty() {
                None
            } else {
                Some(round2(total / passengers.len() as f64))
            }
        });

        for passenger in passengers.iter_mut() {
            if let Some(age) = passenger.age {
                if !passenger.name.is_empty() {
                    passenger.passenger_key = Some(format!("{}_{}", passenger.name, age));
                }
                passenger.age_category = Some(AgeCategory::for_age(age));
            }

            passenger.confidence = Some(self.confidence_score(passenger));
            passenger.fare_share = fare_share;

            if passenger.gender.is_none() {
                if let Some(inferred) = infer_gender_from_name(&passenger.name) {
                    debug!(name = %passenger.name, gender = inferred.as_str(), "inferred gender");
                    passenger.gender = Some(inferred);
                    passenger.gender_inferred = true;
                }
            }
        }
    }

    /// Weighted presence/format checks scaled to 0-100. Name format and food
    /// choice carry half weight.
    fn confidence_score(&self, passenger: &Passenger) -> f64 {
        let mut score = 0.0_f64;

        if passenger.name.len() > 1 {
            score += 1.0;
            if self.upper_name.is_match(&passenger.name) {
                score += 0.5;
            }
        }
        if passenger.age.is_some_and(|age| (1..=120).contains(&age)) {
            score += 1.0;
        }
        if passenger.gender.is_some() {
            score += 1.0;
        }
        if passenger.booking_status.is_some() && passenger.current_status.is_some() {
            score += 1.0;
        }
        if passenger.food_choice.is_some() {
            score += 0.5;
        }

        score / 5.0 * 100.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
