pub mod journey;
pub mod locate;
pub mod pages;
pub mod passenger;
pub mod payment;

use std::path::Path;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::directory::ReferenceDirectory;
use crate::model::{
    AuditTrail, ExtractionMetadata, ExtractionStats, MultiBookingRecord, Outcome, TicketRecord,
};
use crate::util::{now_utc_string, sha256_file};
use crate::validate::{Validator, well_formed_pnr};

use journey::JourneyAssembler;
use locate::FieldLocators;
use passenger::PassengerAssembler;
use payment::PaymentExtractor;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub validate: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

struct DocumentContext {
    source_path: String,
    extracted_at: String,
    sha256: Option<String>,
    total_pages: usize,
}

pub struct TicketExtractor<'a> {
    options: ExtractOptions,
    directory: &'a dyn ReferenceDirectory,
    locators: FieldLocators,
    passengers: PassengerAssembler,
    payments: PaymentExtractor,
}

impl<'a> TicketExtractor<'a> {
    pub fn new(options: ExtractOptions, directory: &'a dyn ReferenceDirectory) -> Result<Self> {
        Ok(Self {
            options,
            directory,
            locators: FieldLocators::new()?,
            passengers: PassengerAssembler::new()?,
            payments: PaymentExtractor::new()?,
        })
    }

    /// Extract one document. Every failure inside the pipeline is converted
    /// into a failure-shaped record here; this boundary never raises.
    pub fn extract_document(&self, path: &Path) -> Outcome {
        match self.try_extract(path) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, path = %path.display(), "extraction failed");
                Outcome::Single(Box::new(TicketRecord::failure(err.to_string())))
            }
        }
    }

    fn try_extract(&self, path: &Path) -> Result<Outcome> {
        let raw_pages = pages::extract_pages(path)?;
        if raw_pages.is_empty() {
            bail!("no usable pages in {}", path.display());
        }

        let context = DocumentContext {
            source_path: path.display().to_string(),
            extracted_at: now_utc_string(),
            sha256: sha256_file(path).ok(),
            total_pages: raw_pages.len(),
        };

        info!(path = %path.display(), pages = context.total_pages, "starting extraction");

        if context.total_pages == 1 {
            let lines = pages::page_lines(&raw_pages[0]);
            let mut record = self.parse_page(&lines, 1);

            if self.options.validate {
                let report = Validator::new(self.directory).validate(&mut record);
                record.validation = Some(report);
            }

            record.extraction = Some(self.metadata_for(&record, &context, "single_page"));
            return Ok(Outcome::Single(Box::new(record)));
        }

        let parsed: Vec<TicketRecord> = raw_pages
            .iter()
            .enumerate()
            .map(|(index, page_text)| {
                let lines = pages::page_lines(page_text);
                self.parse_page(&lines, index + 1)
            })
            .collect();

        Ok(self.resolve_multi(parsed, &context))
    }

    /// Parse one page as one candidate booking. The success gate requires a
    /// well-formed identifier, at least one passenger with a real name, and
    /// at least one journey segment.
    pub fn parse_page(&self, lines: &[String], page_number: usize) -> TicketRecord {
        let mut record = TicketRecord {
            page_number,
            ..TicketRecord::default()
        };

        record.pnr = self
            .locators
            .locate("pnr", lines)
            .or_else(|| self.locators.fallback_identifier(lines));
        record.transaction_id = self.locators.locate("transaction_id", lines);
        record.ticket_print_time = self.locators.locate("print_time", lines);

        let journeys = JourneyAssembler::new(&self.locators, self.directory);
        record.journeys = journeys.assemble(lines);
        record.passengers = self.passengers.assemble(lines);
        record.payment = self.payments.extract(lines);

        self.passengers.enrich(&mut record.passengers, &record.payment);

        if !record.journeys.is_empty() {
            record.journey_metadata = Some(journey::analyze(&record.journeys));
        }

        record.success = has_valid_ticket_data(&record);
        if !record.success {
            debug!(
                page = page_number,
                pnr = ?record.pnr,
                passengers = record.passengers.len(),
                journeys = record.journeys.len(),
                "page did not pass the booking gate"
            );
        }

        record
    }

    /// Multi-page documents: each qualifying page is an independent booking.
    /// Exactly one qualifier collapses back to a single record; several are
    /// wrapped; none is a failure. Validation is intentionally skipped for
    /// multi-booking documents.
    fn resolve_multi(&self, parsed: Vec<TicketRecord>, context: &DocumentContext) -> Outcome {
        let mut bookings: Vec<TicketRecord> = parsed
            .into_iter()
            .filter(|record| record.success)
            .collect();

        info!(
            pages = context.total_pages,
            bookings = bookings.len(),
            "resolved multi-page document"
        );

        match bookings.len() {
            0 => Outcome::Single(Box::new(TicketRecord::failure(format!(
                "no valid ticket data found in {} pages",
                context.total_pages
            )))),
            1 => {
                let mut record = bookings.remove(0);
                record.extraction =
                    Some(self.metadata_for(&record, context, "multi_page_single_booking"));
                Outcome::Single(Box::new(record))
            }
            _ => {
                for record in bookings.iter_mut() {
                    record.extraction =
                        Some(self.metadata_for(record, context, "page_booking"));
                }

                let stats = ExtractionStats {
                    total_pages: context.total_pages,
                    fields_extracted: bookings.iter().map(fields_extracted).sum(),
                    passengers_extracted: bookings
                        .iter()
                        .map(|record| record.passengers.len())
                        .sum(),
                    journeys_found: bookings.iter().map(|record| record.journeys.len()).sum(),
                    validation_score: 0.0,
                    anomalies_detected: 0,
                };

                Outcome::Multi(MultiBookingRecord {
                    multi_booking: true,
                    booking_count: bookings.len(),
                    success: true,
                    extraction: ExtractionMetadata {
                        source_path: context.source_path.clone(),
                        method: "multi_booking".to_string(),
                        extracted_at: context.extracted_at.clone(),
                        sha256: context.sha256.clone(),
                        stats,
                        audit: AuditTrail {
                            passenger_count: bookings
                                .iter()
                                .map(|record| record.passengers.len())
                                .sum(),
                            journey_count: bookings
                                .iter()
                                .map(|record| record.journeys.len())
                                .sum(),
                            payment_fields: bookings
                                .iter()
                                .map(|record| record.payment.populated_fields())
                                .sum(),
                            validation_enabled: false,
                        },
                        quality_score: 0,
                    },
                    bookings,
                })
            }
        }
    }

    fn metadata_for(
        &self,
        record: &TicketRecord,
        context: &DocumentContext,
        method: &str,
    ) -> ExtractionMetadata {
        ExtractionMetadata {
            source_path: context.source_path.clone(),
            method: method.to_string(),
            extracted_at: context.extracted_at.clone(),
            sha256: context.sha256.clone(),
            stats: stats_for(record, context.total_pages),
            quality_score: quality_score(record),
            audit: AuditTrail {
                passenger_count: record.passengers.len(),
                journey_count: record.journeys.len(),
                payment_fields: record.payment.populated_fields(),
                validation_enabled: self.options.validate,
            },
        }
    }
}

fn has_valid_ticket_data(record: &TicketRecord) -> bool {
    let pnr_valid = record
        .pnr
        .as_deref()
        .is_some_and(well_formed_pnr);
    let has_real_name = record
        .passengers
        .iter()
        .any(|passenger| !passenger.is_placeholder());

    pnr_valid && has_real_name && !record.journeys.is_empty()
}

/// Twenty points per populated core field: identifier, transaction id,
/// passengers, journeys, payment.
fn quality_score(record: &TicketRecord) -> u32 {
    let mut score = 0;

    if record.pnr.is_some() {
        score += 20;
    }
    if record.transaction_id.is_some() {
        score += 20;
    }
    if !record.passengers.is_empty() {
        score += 20;
    }
    if !record.journeys.is_empty() {
        score += 20;
    }
    if record.payment.populated_fields() > 0 {
        score += 20;
    }

    score
}

fn fields_extracted(record: &TicketRecord) -> usize {
    usize::from(record.pnr.is_some())
        + usize::from(record.transaction_id.is_some())
        + usize::from(record.ticket_print_time.is_some())
        + record.journeys.len()
        + record.passengers.len()
        + record.payment.populated_fields()
}

fn stats_for(record: &TicketRecord, total_pages: usize) -> ExtractionStats {
    ExtractionStats {
        total_pages,
        fields_extracted: fields_extracted(record),
        passengers_extracted: record.passengers.len(),
        journeys_found: record.journeys.len(),
        validation_score: record
            .validation
            .as_ref()
            .map(|report| report.overall_score)
            .unwrap_or(0.0),
        anomalies_detected: record
            .validation
            .as_ref()
            .map(|report| report.anomalies.len())
            .unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentContext, ExtractOptions, TicketExtractor, quality_score};
    use crate::directory::BuiltinDirectory;
    use crate::model::Outcome;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    fn ticket_page() -> Vec<&'static str> {
        vec![
            "Electronic Reservation Slip",
            "PNR: 1234567894",
            "Transaction ID: 100004374650",
            "Train No./Name",
            "20958 -INDORE EXPRESS",
            "Class",
            "3A",
            "Quota",
            "GENERAL",
            "Booked From",
            "NEW DELHI (NDLS)",
            "Departure* 15-03-2024 22:30:00",
            "To",
            "INDORE (-)",
            "Arrival* 16-03-2024 08:05:00",
            "Passenger Details",
            "35",
            "Male",
            "Veg",
            "CNF/B2/32/LOWER",
            "1. SUKH BANSAL",
            "Payment Details",
            "Ticket Fare 1,245.50",
            "Total Fare",
            "1,245.50",
        ]
    }

    fn extractor(directory: &BuiltinDirectory) -> TicketExtractor<'_> {
        TicketExtractor::new(ExtractOptions::default(), directory).expect("extractor")
    }

    fn context(total_pages: usize) -> DocumentContext {
        DocumentContext {
            source_path: "ticket.pdf".to_string(),
            extracted_at: "2024-03-15T00:00:00Z".to_string(),
            sha256: None,
            total_pages,
        }
    }

    #[test]
    fn complete_page_passes_the_booking_gate() {
        let directory = BuiltinDirectory::new();
        let extractor = extractor(&directory);

        let record = extractor.parse_page(&lines(&ticket_page()), 1);

        assert!(record.success);
        assert_eq!(record.pnr.as_deref(), Some("1234567894"));
        assert_eq!(record.transaction_id.as_deref(), Some("100004374650"));
        assert_eq!(record.journeys.len(), 1);
        assert_eq!(record.passengers.len(), 1);
        assert_eq!(record.passengers[0].name, "SUKH BANSAL");
        assert_eq!(record.payment.total, Some(1245.50));
        assert_eq!(quality_score(&record), 100);
    }

    #[test]
    fn placeholder_only_roster_fails_the_gate() {
        let directory = BuiltinDirectory::new();
        let extractor = extractor(&directory);

        // Details exist but the numbered name list is missing, so every
        // passenger gets a placeholder name.
        let page = lines(&[
            "PNR: 1234567894",
            "Train No./Name",
            "20958 -INDORE EXPRESS",
            "Passenger Details",
            "35",
            "Male",
            "Veg",
            "CNF/B2/32/LOWER",
        ]);

        let record = extractor.parse_page(&page, 1);
        assert_eq!(record.passengers.len(), 1);
        assert!(record.passengers[0].is_placeholder());
        assert!(!record.journeys.is_empty());
        assert!(!record.success);
    }

    #[test]
    fn repeated_extraction_is_idempotent() {
        let directory = BuiltinDirectory::new();
        let extractor = extractor(&directory);
        let page = lines(&ticket_page());

        let first = extractor.parse_page(&page, 1);
        let second = extractor.parse_page(&page, 1);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("serialize"),
            serde_json::to_string(&second).expect("serialize")
        );
    }

    #[test]
    fn multi_page_with_two_qualifying_pages_wraps_bookings() {
        let directory = BuiltinDirectory::new();
        let extractor = extractor(&directory);

        let first = extractor.parse_page(&lines(&ticket_page()), 1);
        let mut second_page = ticket_page();
        second_page[1] = "PNR: 2213456789";
        let second = extractor.parse_page(&lines(&second_page), 2);
        let filler = extractor.parse_page(&lines(&["GST invoice boilerplate"]), 3);

        let outcome = extractor.resolve_multi(vec![first, second, filler], &context(3));
        match outcome {
            Outcome::Multi(multi) => {
                assert!(multi.multi_booking);
                assert_eq!(multi.booking_count, 2);
                assert_eq!(multi.bookings[1].pnr.as_deref(), Some("2213456789"));
                assert!(!multi.extraction.audit.validation_enabled);
            }
            Outcome::Single(_) => panic!("expected multi-booking outcome"),
        }
    }

    #[test]
    fn single_qualifying_page_collapses_to_one_record() {
        let directory = BuiltinDirectory::new();
        let extractor = extractor(&directory);

        let first = extractor.parse_page(&lines(&ticket_page()), 1);
        let filler = extractor.parse_page(&lines(&["GST invoice boilerplate"]), 2);

        let outcome = extractor.resolve_multi(vec![first, filler], &context(2));
        match outcome {
            Outcome::Single(record) => {
                assert!(record.success);
                assert_eq!(
                    record.extraction.expect("metadata").method,
                    "multi_page_single_booking"
                );
                // Multi-page documents skip validation.
                assert!(record.validation.is_none());
            }
            Outcome::Multi(_) => panic!("expected single outcome"),
        }
    }

    #[test]
    fn no_qualifying_pages_reports_a_page_counted_failure() {
        let directory = BuiltinDirectory::new();
        let extractor = extractor(&directory);

        let filler_a = extractor.parse_page(&lines(&["nothing here"]), 1);
        let filler_b = extractor.parse_page(&lines(&["or here"]), 2);

        let outcome = extractor.resolve_multi(vec![filler_a, filler_b], &context(2));
        match outcome {
            Outcome::Single(record) => {
                assert!(!record.success);
                assert_eq!(
                    record.error.as_deref(),
                    Some("no valid ticket data found in 2 pages")
                );
            }
            Outcome::Multi(_) => panic!("expected failure record"),
        }
    }
}
