use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

/// Where a locator reads its value relative to the anchor line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchWindow {
    SameLine,
    NextLine,
    SameOrNextLine,
}

/// How an anchor phrase has to appear on a line. Short section labels like
/// `Class` must own the whole line or they contaminate from prose mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorMatch {
    Contains,
    ExactLine,
}

struct LocatorSpec {
    field: &'static str,
    anchors: &'static [&'static str],
    anchor_match: AnchorMatch,
    pattern: &'static str,
    window: SearchWindow,
}

const DATETIME_PATTERN: &str = r"(\d{2}-\d{2}-\d{4}\s+\d{2}:\d{2}:\d{2})";

/// One row per primitive field. The scanner in `FieldLocators::locate` is the
/// only control flow; per-field tuning lives entirely in this table.
const LOCATOR_SPECS: &[LocatorSpec] = &[
    LocatorSpec {
        field: "pnr",
        anchors: &["PNR:", "PNR "],
        anchor_match: AnchorMatch::Contains,
        pattern: r"\b(\d{10})\b",
        window: SearchWindow::SameOrNextLine,
    },
    LocatorSpec {
        field: "transaction_id",
        anchors: &["Transaction ID:"],
        anchor_match: AnchorMatch::Contains,
        pattern: r"\b(\d{8,15})\b",
        window: SearchWindow::SameLine,
    },
    LocatorSpec {
        field: "print_time",
        anchors: &["Ticket Printing Time"],
        anchor_match: AnchorMatch::Contains,
        pattern: DATETIME_PATTERN,
        window: SearchWindow::SameOrNextLine,
    },
    LocatorSpec {
        field: "train",
        anchors: &["Train No./Name"],
        anchor_match: AnchorMatch::Contains,
        pattern: r"(\d{4,5})\s*-(.+)",
        window: SearchWindow::NextLine,
    },
    LocatorSpec {
        field: "travel_class",
        anchors: &["Class"],
        anchor_match: AnchorMatch::ExactLine,
        pattern: r"^(\S.*)$",
        window: SearchWindow::NextLine,
    },
    LocatorSpec {
        field: "quota",
        anchors: &["Quota"],
        anchor_match: AnchorMatch::ExactLine,
        pattern: r"^(\S.*)$",
        window: SearchWindow::NextLine,
    },
    LocatorSpec {
        field: "distance",
        anchors: &["Distance"],
        anchor_match: AnchorMatch::ExactLine,
        pattern: r"(\d+)\s*KM",
        window: SearchWindow::NextLine,
    },
    LocatorSpec {
        field: "journey_date",
        anchors: &["Date of Journey"],
        anchor_match: AnchorMatch::Contains,
        pattern: r"(\d{2}-\d{2}-\d{4})",
        window: SearchWindow::SameOrNextLine,
    },
    LocatorSpec {
        field: "departure_time",
        anchors: &["Departure*"],
        anchor_match: AnchorMatch::Contains,
        pattern: DATETIME_PATTERN,
        window: SearchWindow::SameLine,
    },
];

struct CompiledLocator {
    field: &'static str,
    anchors: &'static [&'static str],
    anchor_match: AnchorMatch,
    pattern: Regex,
    window: SearchWindow,
}

pub struct FieldLocators {
    locators: Vec<CompiledLocator>,
    ten_digit: Regex,
    station_line: Regex,
    datetime: Regex,
}

const PHONE_CONTEXT_WORDS: &[&str] = &["mobile", "phone", "contact", "sms", "call"];

impl FieldLocators {
    pub fn new() -> Result<Self> {
        let mut locators = Vec::with_capacity(LOCATOR_SPECS.len());
        for spec in LOCATOR_SPECS {
            locators.push(CompiledLocator {
                field: spec.field,
                anchors: spec.anchors,
                anchor_match: spec.anchor_match,
                pattern: Regex::new(spec.pattern)
                    .with_context(|| format!("failed to compile pattern for field {}", spec.field))?,
                window: spec.window,
            });
        }

        Ok(Self {
            locators,
            ten_digit: Regex::new(r"\b(\d{10})\b").context("failed to compile 10-digit pattern")?,
            station_line: Regex::new(r"^([A-Z][A-Z\s]+?)\s*\(([A-Z-]*)\)$")
                .context("failed to compile station line pattern")?,
            datetime: Regex::new(DATETIME_PATTERN).context("failed to compile datetime pattern")?,
        })
    }

    /// First value matching the field's pattern within the first anchor
    /// occurrence. No anchor, or no match inside the window, yields `None`.
    pub fn locate(&self, field: &str, lines: &[String]) -> Option<String> {
        self.locate_groups(field, lines)
            .and_then(|groups| groups.into_iter().next())
    }

    /// Same contract as `locate` but returns every capture group, for fields
    /// whose value line carries more than one component (train number + name).
    pub fn locate_groups(&self, field: &str, lines: &[String]) -> Option<Vec<String>> {
        let locator = self
            .locators
            .iter()
            .find(|locator| locator.field == field)?;

        let anchor_index = find_anchor(lines, locator.anchors, locator.anchor_match)?;

        let candidates = match locator.window {
            SearchWindow::SameLine => vec![anchor_index],
            SearchWindow::NextLine => vec![anchor_index + 1],
            SearchWindow::SameOrNextLine => vec![anchor_index, anchor_index + 1],
        };

        for candidate in candidates {
            let Some(line) = lines.get(candidate) else {
                continue;
            };
            if let Some(captures) = locator.pattern.captures(line) {
                let groups: Vec<String> = captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|group| group.as_str().trim().to_string())
                    .collect();
                debug!(field, line = candidate, "anchored field match");
                return Some(groups);
            }
        }

        None
    }

    /// Last-resort identifier scan for templates without a `PNR` label: a
    /// standalone 10-digit token outside phone context, in the first half of
    /// the document, not starting with a phone-typical digit. False positives
    /// are tolerated here; the checksum validator grades them later.
    pub fn fallback_identifier(&self, lines: &[String]) -> Option<String> {
        let total = lines.len().max(1);

        for (index, line) in lines.iter().enumerate() {
            let lowered = line.to_lowercase();
            if PHONE_CONTEXT_WORDS.iter().any(|word| lowered.contains(word)) {
                continue;
            }

            let Some(captures) = self.ten_digit.captures(line) else {
                continue;
            };
            let candidate = captures[1].to_string();
            let position = index as f64 / total as f64;

            if candidate.starts_with(['0', '8', '9']) || position >= 0.5 {
                continue;
            }

            debug!(candidate = %candidate, position, "fallback identifier match");
            return Some(candidate);
        }

        None
    }

    pub fn station_line(&self) -> &Regex {
        &self.station_line
    }

    pub fn datetime(&self) -> &Regex {
        &self.datetime
    }
}

pub fn find_anchor(lines: &[String], anchors: &[&str], anchor_match: AnchorMatch) -> Option<usize> {
    lines.iter().position(|line| {
        anchors.iter().any(|anchor| match anchor_match {
            AnchorMatch::Contains => line.contains(anchor),
            AnchorMatch::ExactLine => line == anchor,
        })
    })
}
