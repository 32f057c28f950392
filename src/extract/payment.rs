use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::extract::locate::{AnchorMatch, find_anchor};
use crate::model::PaymentBreakdown;

pub struct PaymentExtractor {
    amount_token: Regex,
    amount_line: Regex,
}

impl PaymentExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            amount_token: Regex::new(r"[\d,]+\.?\d*")
                .context("failed to compile amount token pattern")?,
            amount_line: Regex::new(r"^[\d,]+\.?\d*$")
                .context("failed to compile amount line pattern")?,
        })
    }

    /// Walk the payment section and pull each fee line's amount. Every fee
    /// anchor reads the amount from its own line first, then from up to two
    /// following lines (templates put the figure in a separate column that
    /// extracts as a separate line).
    pub fn extract(&self, lines: &[String]) -> PaymentBreakdown {
        let mut payment = PaymentBreakdown::default();

        let Some(start) = find_anchor(
            lines,
            &["Payment Details", "Ticket Fare"],
            AnchorMatch::Contains,
        ) else {
            debug!("no payment section found");
            return payment;
        };

        for index in start..lines.len() {
            let line = &lines[index];

            if line.contains("Ticket Fare") {
                payment.ticket_fare = self.amount_near(lines, index);
            } else if line.contains("IRCTC Convenience Fee") {
                payment.convenience_fee = self.amount_near(lines, index);
            } else if line.contains("Travel Insurance Premium") || line.contains("Insurance") {
                payment.insurance = self.amount_near(lines, index);
            } else if line.contains("Travel Agent Service Charge") || line.contains("Agent") {
                payment.agent_fee = self.amount_near(lines, index);
            } else if line.contains("Pg Charges") {
                payment.gateway_charges = self.amount_near(lines, index);
            } else if line.contains("Total Fare") {
                payment.total = self.amount_near(lines, index);
            }
        }

        payment
    }

    fn amount_near(&self, lines: &[String], anchor: usize) -> Option<f64> {
        if let Some(matched) = self.amount_token.find(&lines[anchor]) {
            if let Some(amount) = parse_amount(matched.as_str()) {
                return Some(amount);
            }
        }

        for line in lines.iter().skip(anchor + 1).take(2) {
            if !self.amount_line.is_match(line) {
                continue;
            }
            if let Some(amount) = parse_amount(line) {
                return Some(amount);
            }
        }

        None
    }
}

fn parse_amount(token: &str) -> Option<f64> {
    token.replace(',', "").parse().ok()
}
