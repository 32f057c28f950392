use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Marker the upstream page concatenation inserts between pages when a
/// document's text is handed over as one flat line list.
pub const PAGE_MARKER: &str = "--- PAGE";

pub fn extract_pages(pdf_path: &Path) -> Result<Vec<String>> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    Ok(pages)
}

/// Normalize one page of raw text into the trimmed, non-empty line sequence
/// every locator operates on.
pub fn page_lines(page_text: &str) -> Vec<String> {
    page_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a flattened line list back into per-page slices at the page-boundary
/// markers. Without markers the whole list is one segment.
pub fn segment_by_page_marker(lines: &[String]) -> Vec<&[String]> {
    let marker_indices: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(PAGE_MARKER))
        .map(|(index, _)| index)
        .collect();

    if marker_indices.is_empty() {
        return vec![lines];
    }

    let mut segments = Vec::with_capacity(marker_indices.len());
    for (position, &start) in marker_indices.iter().enumerate() {
        let end = marker_indices
            .get(position + 1)
            .copied()
            .unwrap_or(lines.len());
        segments.push(&lines[start..end]);
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::{page_lines, segment_by_page_marker};

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn page_lines_trims_and_drops_empties() {
        let text = "  PNR: 1234567890  \n\n\tClass\n   \n3A";
        assert_eq!(page_lines(text), lines(&["PNR: 1234567890", "Class", "3A"]));
    }

    #[test]
    fn marker_segmentation_splits_per_page() {
        let input = lines(&[
            "--- PAGE 1 ---",
            "PNR: 1234567890",
            "--- PAGE 2 ---",
            "PNR: 9876543210",
        ]);
        let segments = segment_by_page_marker(&input);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0][1], "PNR: 1234567890");
        assert_eq!(segments[1][1], "PNR: 9876543210");
    }

    #[test]
    fn no_markers_yields_single_segment() {
        let input = lines(&["PNR: 1234567890", "Class"]);
        let segments = segment_by_page_marker(&input);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 2);
    }
}
