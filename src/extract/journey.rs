use std::collections::HashSet;

use tracing::debug;

use crate::directory::ReferenceDirectory;
use crate::extract::locate::{AnchorMatch, FieldLocators, find_anchor};
use crate::extract::pages;
use crate::model::{Connection, JourneyMetadata, JourneySegment, StationEvent};

/// Words that mark a candidate station line as spillover from the payment or
/// passenger sections rather than the journey block.
const STATION_CONTAMINATION: &[&str] = &["payment", "passenger", "fare", "required"];

pub struct JourneyAssembler<'a> {
    locators: &'a FieldLocators,
    directory: &'a dyn ReferenceDirectory,
}

impl<'a> JourneyAssembler<'a> {
    pub fn new(locators: &'a FieldLocators, directory: &'a dyn ReferenceDirectory) -> Self {
        Self {
            locators,
            directory,
        }
    }

    /// One candidate segment per page, deduplicated by identity key. Ticket
    /// templates repeat the journey block on confirmation and tax-invoice
    /// pages; repeats are dropped silently. A page-based pass that produces
    /// nothing falls back to treating the whole document as one segment.
    pub fn assemble(&self, lines: &[String]) -> Vec<JourneySegment> {
        let mut journeys = Vec::new();
        let mut seen_keys = HashSet::new();

        for (page_index, page) in pages::segment_by_page_marker(lines).iter().enumerate() {
            let Some(journey) = self.extract_segment(page) else {
                continue;
            };

            let key = journey.identity_key();
            if seen_keys.insert(key.clone()) {
                debug!(page = page_index + 1, key = %key, "unique journey segment");
                journeys.push(journey);
            } else {
                debug!(page = page_index + 1, key = %key, "skipping duplicate journey segment");
            }
        }

        if journeys.is_empty() {
            if let Some(journey) = self.extract_segment(lines) {
                journeys.push(journey);
            }
        }

        journeys
    }

    pub fn extract_segment(&self, lines: &[String]) -> Option<JourneySegment> {
        let mut segment = JourneySegment::default();

        if let Some(train) = self.locators.locate_groups("train", lines) {
            if train.len() == 2 {
                segment.train_number = Some(train[0].clone());
                segment.train_name = Some(train[1].clone());
            }
        }

        segment.travel_class = self.locators.locate("travel_class", lines);
        segment.quota = self.locators.locate("quota", lines);
        segment.journey_date = self.locators.locate("journey_date", lines);
        segment.distance_km = self
            .locators
            .locate("distance", lines)
            .and_then(|value| value.parse().ok());

        segment.boarding = self.boarding_event(lines);
        segment.destination = self.destination_event(lines);

        if segment.is_empty() { None } else { Some(segment) }
    }

    /// Boarding block: `Booked From` anchor with the station on the next
    /// line; when that anchor is missing, a station line within three lines
    /// of the `Departure*` anchor is accepted instead.
    fn boarding_event(&self, lines: &[String]) -> Option<StationEvent> {
        let mut event = StationEvent::default();

        if let Some(anchor) = find_anchor(lines, &["Booked From"], AnchorMatch::Contains) {
            if let Some(station_line) = lines.get(anchor + 1) {
                if let Some((name, code)) = self.parse_station_line(station_line) {
                    event.station_code = Some(self.resolve_code(&name, code));
                    event.station_name = Some(name);
                }
            }
        }

        if event.station_name.is_none() {
            if let Some(anchor) = find_anchor(lines, &["Departure*"], AnchorMatch::Contains) {
                let start = anchor.saturating_sub(3);
                let end = (anchor + 3).min(lines.len());
                for index in start..end {
                    if index == anchor {
                        continue;
                    }
                    if let Some((name, code)) = self.parse_station_line(&lines[index]) {
                        event.station_code = Some(self.resolve_code(&name, code));
                        event.station_name = Some(name);
                        break;
                    }
                }
            }
        }

        event.datetime = self.locators.locate("departure_time", lines);

        if event.is_empty() { None } else { Some(event) }
    }

    /// Destination block: a line that is exactly `To`, station on the next
    /// line, arrival timestamp anywhere within five lines of the anchor.
    fn destination_event(&self, lines: &[String]) -> Option<StationEvent> {
        for (index, line) in lines.iter().enumerate() {
            if line != "To" || index + 1 >= lines.len() {
                continue;
            }

            let station_line = &lines[index + 1];
            let lowered = station_line.to_lowercase();
            if STATION_CONTAMINATION
                .iter()
                .any(|word| lowered.contains(word))
            {
                continue;
            }

            let mut event = StationEvent::default();
            if let Some((name, code)) = self.parse_station_line(station_line) {
                event.station_code = Some(self.resolve_code(&name, code));
                event.station_name = Some(name);
            }

            let start = index.saturating_sub(5);
            let end = (index + 5).min(lines.len());
            for candidate in &lines[start..end] {
                if !candidate.contains("Arrival*") {
                    continue;
                }
                if let Some(captures) = self.locators.datetime().captures(candidate) {
                    event.datetime = Some(captures[1].to_string());
                    break;
                }
            }

            return if event.is_empty() { None } else { Some(event) };
        }

        None
    }

    /// `NAME (CODE)` with `(-)` or `()` standing for a missing code.
    fn parse_station_line(&self, line: &str) -> Option<(String, Option<String>)> {
        let captures = self.locators.station_line().captures(line)?;
        let name = captures[1].trim().to_string();
        let code = captures[2].trim();

        let code = if code.is_empty() || code == "-" {
            None
        } else {
            Some(code.to_string())
        };

        Some((name, code))
    }

    fn resolve_code(&self, station_name: &str, code: Option<String>) -> String {
        match code {
            Some(code) => code,
            None => {
                let inferred = self.directory.infer_station_code(station_name);
                debug!(station = station_name, code = %inferred, "inferred missing station code");
                inferred
            }
        }
    }
}

/// Cross-segment metadata: totals, connection legs, overnight heuristic.
pub fn analyze(journeys: &[JourneySegment]) -> JourneyMetadata {
    let mut metadata = JourneyMetadata {
        total_segments: journeys.len(),
        is_multi_segment: journeys.len() > 1,
        total_distance_km: journeys.iter().filter_map(|j| j.distance_km).sum(),
        journey_type: if journeys.len() > 1 {
            "multi_segment".to_string()
        } else {
            "single".to_string()
        },
        connections: Vec::new(),
        has_overnight: false,
    };

    for pair in journeys.windows(2) {
        if let Some(connection) = connection_between(&pair[0], &pair[1]) {
            metadata.connections.push(connection);
        }
    }

    for journey in journeys {
        let boarding_hour = journey
            .boarding
            .as_ref()
            .and_then(|event| event.datetime.as_deref())
            .and_then(hour_of);
        let arrival_hour = journey
            .destination
            .as_ref()
            .and_then(|event| event.datetime.as_deref())
            .and_then(hour_of);

        if boarding_hour.is_some_and(|hour| hour >= 22) || arrival_hour == Some(0) {
            metadata.has_overnight = true;
        }
    }

    metadata
}

/// A connection exists when one segment ends where the next one boards.
fn connection_between(first: &JourneySegment, second: &JourneySegment) -> Option<Connection> {
    let arrive = first.destination.as_ref()?;
    let depart = second.boarding.as_ref()?;

    let arrive_station = arrive.station_name.as_deref()?.trim();
    let depart_station = depart.station_name.as_deref()?.trim();
    if arrive_station.is_empty() || arrive_station != depart_station {
        return None;
    }

    Some(Connection {
        station: arrive_station.to_string(),
        from_train: first.train_number.clone(),
        to_train: second.train_number.clone(),
        arrival_time: arrive.datetime.clone(),
        departure_time: depart.datetime.clone(),
    })
}

fn hour_of(datetime: &str) -> Option<u32> {
    let time = datetime.split_whitespace().nth(1)?;
    time.split(':').next()?.parse().ok()
}
