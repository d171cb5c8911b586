//! HTML analysis page → `StructuredReport`
//!
//! The page has two parts: a label/value table with the grower's details
//! (split by a "Must know information" row into identity and season fields),
//! and accordion sections for sales, grades and creditor recoveries.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use seasonscan_engine::{
    CreditorRecovery, GradeEntry, ParseError, Parsed, RawResponse, ReportParser, SalesSummary,
    StructuredReport,
};

/// Served instead of a report when the portal has no such grower.
pub const NO_RECORD_MARKER: &str = "Please specify the grower number";
const MUST_KNOW_MARKER: &str = "Must know information";

const SALES_SUMMARY: &str = "Sales Summary";
const GRADE_ANALYSIS: &str = "Growers Grade Analysis";
const CREDITOR_RECOVERIES: &str = "Creditor Recoveries";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector")
}

static INFO_ROWS: LazyLock<Selector> = LazyLock::new(|| selector(r#"td[valign="top"] table tr"#));
static ACC_HEAD: LazyLock<Selector> = LazyLock::new(|| selector("div.acc_head"));
static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));

/// Parser for the portal's "Show Analysis" page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReportParser;

impl HtmlReportParser {
    pub fn new() -> Self {
        Self
    }
}

impl ReportParser for HtmlReportParser {
    fn parse(&self, raw: &RawResponse) -> Result<Parsed, ParseError> {
        parse_report(&raw.body)
    }
}

/// Parse one analysis page.
pub fn parse_report(html: &str) -> Result<Parsed, ParseError> {
    if html.trim().is_empty() || html.contains(NO_RECORD_MARKER) {
        return Ok(Parsed::Absent);
    }

    let document = Html::parse_document(html);
    let mut report = StructuredReport::default();
    if !parse_info(&document, &mut report) {
        return Err(ParseError::new("no grower information table"));
    }

    if let Some(rows) = section_rows(&document, SALES_SUMMARY) {
        if let Some(summary) = rows.get(1).and_then(|cells| sales_summary(cells)) {
            report.summary = summary;
        }
    }
    if let Some(rows) = section_rows(&document, GRADE_ANALYSIS) {
        report.grades = rows.iter().skip(1).filter_map(|c| grade(c)).collect();
    }
    if let Some(rows) = section_rows(&document, CREDITOR_RECOVERIES) {
        report.creditors = rows.iter().skip(1).filter_map(|c| creditor(c)).collect();
    }

    Ok(Parsed::Present(report))
}

/// Fill identity and season fields. Returns false if the page has no info
/// table at all.
fn parse_info(document: &Html, report: &mut StructuredReport) -> bool {
    let mut seen = false;
    let mut must_know = false;

    for row in document.select(&INFO_ROWS) {
        seen = true;
        let cells: Vec<ElementRef> = row.select(&CELL).collect();
        if cells.len() < 2 {
            if cell_text(row).contains(MUST_KNOW_MARKER) {
                must_know = true;
            }
            continue;
        }

        let label = clean_text(cells[0]);
        if label.is_empty() {
            continue;
        }
        let target = if must_know {
            &mut report.period_fields
        } else {
            &mut report.identity
        };
        target.insert(field_key(&label), joined_text(cells[1]));
    }
    seen
}

/// Data rows (as cell lists) of the table under the accordion head `title`.
fn section_rows<'a>(document: &'a Html, title: &str) -> Option<Vec<Vec<ElementRef<'a>>>> {
    let head = document
        .select(&ACC_HEAD)
        .find(|h| h.text().collect::<String>().trim() == title)?;
    let content = head
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "div" && e.value().classes().any(|c| c == "acc_content"))?;
    let table = content.select(&TABLE).next()?;
    Some(
        table
            .select(&ROW)
            .map(|row| row.select(&CELL).collect())
            .collect(),
    )
}

fn sales_summary(cells: &[ElementRef]) -> Option<SalesSummary> {
    if cells.len() < 4 {
        return None;
    }
    Some(SalesSummary {
        total_bales: parse_int(&cell_text(cells[0])),
        total_mass_kg: parse_number(&cell_text(cells[1])),
        total_value_usd: parse_number(&cell_text(cells[2])),
        average_price_usd: parse_number(&cell_text(cells[3])),
    })
}

fn grade(cells: &[ElementRef]) -> Option<GradeEntry> {
    if cells.len() < 4 {
        return None;
    }
    Some(GradeEntry {
        grade_name: clean_text(cells[0]),
        mass_kg: parse_number(&cell_text(cells[1])),
        value_usd: parse_number(&cell_text(cells[2])),
        average_price_usd: parse_number(&cell_text(cells[3])),
    })
}

/// Columns: row number, creditor, owed, paid, recovery.
fn creditor(cells: &[ElementRef]) -> Option<CreditorRecovery> {
    if cells.len() < 5 {
        return None;
    }
    let recovery_text = cell_text(cells[4]).trim().to_string();
    let recovery_percentage = parse_number(&recovery_text);
    Some(CreditorRecovery {
        creditor_name: clean_text(cells[1]),
        total_owed_usd: parse_number(&cell_text(cells[2])),
        total_paid_usd: parse_number(&cell_text(cells[3])),
        notes: if recovery_percentage.is_none() {
            recovery_text
        } else {
            String::new()
        },
        recovery_percentage,
    })
}

fn cell_text(el: ElementRef) -> String {
    el.text().collect()
}

/// Cell text with line breaks flattened.
fn clean_text(el: ElementRef) -> String {
    cell_text(el)
        .replace('\n', " ")
        .replace('\r', "")
        .trim()
        .to_string()
}

/// Text nodes trimmed and joined with single spaces (`<br>` becomes a space).
fn joined_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// "Farming Province (current):" → "farming_province_current"
pub fn field_key(label: &str) -> String {
    label
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | ':'))
        .collect()
}

/// Keep digits and dots: "$12,931.50" → 12931.5. Empty → `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

fn parse_int(text: &str) -> Option<u64> {
    let cleaned: String = text.chars().filter(char::is_ascii_digit).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_normalized() {
        assert_eq!(field_key("Grower Number:"), "grower_number");
        assert_eq!(field_key("Mass (kg)"), "mass_kg");
        assert_eq!(field_key("2024 Contractor:"), "2024_contractor");
    }

    #[test]
    fn numbers_keep_digits_and_dots() {
        assert_eq!(parse_number("$12,931.50"), Some(12931.5));
        assert_eq!(parse_number("75%"), Some(75.0));
        assert_eq!(parse_number("Pending"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("1.2.3"), None);
        assert_eq!(parse_int("1,204 bales"), Some(1204));
    }

    #[test]
    fn empty_body_is_absent() {
        assert_eq!(parse_report("").unwrap(), Parsed::Absent);
        assert_eq!(parse_report("  \n").unwrap(), Parsed::Absent);
    }

    #[test]
    fn marker_is_absent() {
        let html = format!("<html><body><p>{NO_RECORD_MARKER}</p></body></html>");
        assert_eq!(parse_report(&html).unwrap(), Parsed::Absent);
    }

    #[test]
    fn unknown_page_is_error() {
        assert!(parse_report("<html><body><p>Maintenance</p></body></html>").is_err());
    }
}
