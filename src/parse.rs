//! Result parser — turns the rendered case-status page into a [`CaseResult`].
//!
//! Pure and deterministic: the same HTML always yields the same result.
//! Primary path reads the `#caseTable` DataTable; when that yields nothing,
//! a fallback scans every table for labeled petitioner/respondent/date rows.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

/// Href substrings that qualify a link as an order/judgment link.
const LINK_HREF_MARKERS: [&str; 4] = [".pdf", "order", "judgment", "case-type-status-details"];

/// Link-text substrings that qualify a link as an order/judgment link.
const LINK_TEXT_MARKERS: [&str; 2] = ["orders", "view"];

/// Whether a case row was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaseStatus {
    Found,
    #[serde(rename = "Not Found")]
    NotFound,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Found => "Found",
            CaseStatus::NotFound => "Not Found",
        }
    }
}

/// Parsed outcome of one search. String fields default to empty.
#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub parties: String,
    pub filing_date: String,
    pub next_hearing_date: String,
    pub order_judgment_link: String,
    pub status: CaseStatus,
    /// Bracketed suffix of the case-number cell, uppercased; `ACTIVE` when
    /// the row has no bracketed tag. Only set by the primary table path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_status: Option<String>,
}

impl Default for CaseResult {
    fn default() -> Self {
        Self {
            parties: String::new(),
            filing_date: String::new(),
            next_hearing_date: String::new(),
            order_judgment_link: String::new(),
            status: CaseStatus::NotFound,
            case_status: None,
        }
    }
}

/// Parse a rendered case-status page.
pub fn parse_case_result(html: &str, base_url: &Url) -> CaseResult {
    let document = Html::parse_document(html);
    let mut result = CaseResult::default();

    parse_case_table(&document, base_url, &mut result);

    if result.status == CaseStatus::NotFound {
        parse_label_fallback(&document, base_url, &mut result);
    }

    result
}

/// Primary path: the `#caseTable` DataTable the site fills in via AJAX.
fn parse_case_table(document: &Html, base_url: &Url, result: &mut CaseResult) {
    let table_sel = Selector::parse("table#caseTable").unwrap();
    let row_sel = Selector::parse("tbody tr").unwrap();
    let cell_sel = Selector::parse("td").unwrap();
    let link_sel = Selector::parse("a").unwrap();

    let Some(table) = document.select(&table_sel).next() else {
        return;
    };

    for row in table.select(&row_sel) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        // Malformed rows are skipped, not errored.
        if cells.len() < 4 {
            continue;
        }

        let case_number = cell_text(&cells[1]);
        let parties = cell_text(&cells[2]);
        let listing_date = cell_text(&cells[3]);

        if case_number.is_empty() || parties.is_empty() {
            continue;
        }

        result.parties = parties;
        result.next_hearing_date = listing_date;
        result.status = CaseStatus::Found;
        result.case_status = Some(bracket_status(&case_number));

        // First qualifying link in cell order wins.
        'cells: for cell in &cells {
            for link in cell.select(&link_sel) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                let text = cell_text(&link).to_lowercase();
                if qualifies_as_order_link(href, &text) {
                    result.order_judgment_link = resolve_href(base_url, href);
                    break 'cells;
                }
            }
        }

        return;
    }
}

/// Fallback: scan every table for two-cell label/value rows.
fn parse_label_fallback(document: &Html, base_url: &Url, result: &mut CaseResult) {
    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("td, th").unwrap();
    let link_sel = Selector::parse("a").unwrap();

    for table in document.select(&table_sel) {
        for row in table.select(&row_sel) {
            let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
            if cells.len() < 2 {
                continue;
            }

            let header = cell_text(&cells[0]).to_lowercase();
            let value = cell_text(&cells[1]);

            if header.contains("petitioner") || header.contains("respondent") {
                result.parties = value;
            } else if header.contains("filing") || header.contains("registration") {
                result.filing_date = value;
            } else if header.contains("listing") || header.contains("hearing") {
                result.next_hearing_date = value;
            } else if header.contains("order") || header.contains("judgment") {
                for link in cells[1].select(&link_sel) {
                    if let Some(href) = link.value().attr("href") {
                        if href.to_lowercase().contains(".pdf") {
                            result.order_judgment_link = resolve_href(base_url, href);
                            break;
                        }
                    }
                }
            }
        }
    }

    if !result.parties.is_empty() {
        result.status = CaseStatus::Found;
    }
}

/// Collapse an element's text nodes into a single whitespace-normalized string.
fn cell_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the bracketed status tag from a composite case-number cell,
/// e.g. `"W.P.(C) 123/2024 [PENDING]"` → `"PENDING"`. Defaults to `ACTIVE`.
fn bracket_status(case_number: &str) -> String {
    match case_number.rsplit_once('[') {
        Some((_, after)) if after.contains(']') => after
            .split(']')
            .next()
            .unwrap_or("")
            .trim()
            .to_uppercase(),
        _ => "ACTIVE".to_string(),
    }
}

fn qualifies_as_order_link(href: &str, link_text: &str) -> bool {
    let href_lower = href.to_lowercase();
    LINK_HREF_MARKERS.iter().any(|m| href_lower.contains(m))
        || LINK_TEXT_MARKERS.iter().any(|m| link_text.contains(m))
}

/// Resolve a possibly-relative href against the site base.
fn resolve_href(base_url: &Url, href: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    base_url
        .join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://delhihighcourt.nic.in").unwrap()
    }

    fn case_table_page(rows: &str) -> String {
        format!(
            "<html><body><table id=\"caseTable\"><thead><tr>\
             <th>S.No.</th><th>Case No.</th><th>Parties</th><th>Listing Date</th>\
             </tr></thead><tbody>{rows}</tbody></table></body></html>"
        )
    }

    #[test]
    fn test_primary_row_found() {
        let html = case_table_page(
            "<tr><td>1</td><td>W.P.(C) 123/2024 [PENDING]</td>\
             <td>John Doe vs State</td><td>12-May-2025</td>\
             <td><a href='order1.pdf'>View</a></td></tr>",
        );
        let result = parse_case_result(&html, &base());

        assert_eq!(result.status, CaseStatus::Found);
        assert_eq!(result.parties, "John Doe vs State");
        assert_eq!(result.next_hearing_date, "12-May-2025");
        assert_eq!(result.case_status.as_deref(), Some("PENDING"));
        assert_eq!(
            result.order_judgment_link,
            "https://delhihighcourt.nic.in/order1.pdf"
        );
    }

    #[test]
    fn test_no_bracket_defaults_active() {
        let html = case_table_page(
            "<tr><td>1</td><td>CRL.A. 44/2023</td><td>A vs B</td><td>01-Jan-2026</td></tr>",
        );
        let result = parse_case_result(&html, &base());
        assert_eq!(result.case_status.as_deref(), Some("ACTIVE"));
        assert!(result.order_judgment_link.is_empty());
    }

    #[test]
    fn test_empty_tbody_not_found() {
        let html = case_table_page("");
        let result = parse_case_result(&html, &base());
        assert_eq!(result.status, CaseStatus::NotFound);
        assert!(result.parties.is_empty());
        assert!(result.filing_date.is_empty());
        assert!(result.next_hearing_date.is_empty());
        assert!(result.order_judgment_link.is_empty());
    }

    #[test]
    fn test_absent_table_and_no_labels_not_found() {
        let html = "<html><body><p>nothing here</p></body></html>";
        let result = parse_case_result(html, &base());
        assert_eq!(result.status, CaseStatus::NotFound);
    }

    #[test]
    fn test_short_rows_skipped() {
        let html = case_table_page(
            "<tr><td>header only</td></tr>\
             <tr><td>1</td><td>X 1/2024</td><td>P vs Q</td><td>02-Feb-2026</td></tr>",
        );
        let result = parse_case_result(&html, &base());
        assert_eq!(result.status, CaseStatus::Found);
        assert_eq!(result.parties, "P vs Q");
    }

    #[test]
    fn test_first_qualifying_link_wins() {
        let html = case_table_page(
            "<tr><td><a href='/app/case-type-status-details?id=9'>Orders</a></td>\
             <td>X 1/2024</td><td>P vs Q</td><td>02-Feb-2026</td>\
             <td><a href='later.pdf'>View</a></td></tr>",
        );
        let result = parse_case_result(&html, &base());
        assert_eq!(
            result.order_judgment_link,
            "https://delhihighcourt.nic.in/app/case-type-status-details?id=9"
        );
    }

    #[test]
    fn test_absolute_href_kept_verbatim() {
        let html = case_table_page(
            "<tr><td>1</td><td>X 1/2024</td><td>P vs Q</td><td>-</td>\
             <td><a href='https://elsewhere.example/j.pdf'>View</a></td></tr>",
        );
        let result = parse_case_result(&html, &base());
        assert_eq!(result.order_judgment_link, "https://elsewhere.example/j.pdf");
    }

    #[test]
    fn test_unqualified_links_ignored() {
        let html = case_table_page(
            "<tr><td><a href='/help'>Help</a></td><td>X 1/2024</td>\
             <td>P vs Q</td><td>-</td></tr>",
        );
        let result = parse_case_result(&html, &base());
        assert!(result.order_judgment_link.is_empty());
    }

    #[test]
    fn test_fallback_label_rows() {
        let html = "<html><body><table><tbody>\
             <tr><th>Petitioner / Respondent</th><td>Jane Roe vs Union</td></tr>\
             <tr><th>Filing Date</th><td>03-Mar-2024</td></tr>\
             <tr><th>Next Hearing Date</th><td>09-Sep-2026</td></tr>\
             <tr><th>Orders</th><td><a href='/orders/o2.pdf'>o2</a></td></tr>\
             </tbody></table></body></html>";
        let result = parse_case_result(html, &base());

        assert_eq!(result.status, CaseStatus::Found);
        assert_eq!(result.parties, "Jane Roe vs Union");
        assert_eq!(result.filing_date, "03-Mar-2024");
        assert_eq!(result.next_hearing_date, "09-Sep-2026");
        assert_eq!(
            result.order_judgment_link,
            "https://delhihighcourt.nic.in/orders/o2.pdf"
        );
        assert!(result.case_status.is_none());
    }

    #[test]
    fn test_fallback_without_parties_stays_not_found() {
        let html = "<html><body><table>\
             <tr><th>Filing Date</th><td>03-Mar-2024</td></tr>\
             </table></body></html>";
        let result = parse_case_result(html, &base());
        assert_eq!(result.status, CaseStatus::NotFound);
        assert_eq!(result.filing_date, "03-Mar-2024");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let html = case_table_page(
            "<tr><td>1</td><td>W.P.(C) 123/2024 [DISPOSED]</td>\
             <td>John Doe vs State</td><td>12-May-2025</td>\
             <td><a href='order1.pdf'>View</a></td></tr>",
        );
        let first = parse_case_result(&html, &base());
        let second = parse_case_result(&html, &base());
        assert_eq!(first.order_judgment_link, second.order_judgment_link);
        assert_eq!(first.status, second.status);
        assert_eq!(first.case_status, second.case_status);
    }

    #[test]
    fn test_cell_text_normalizes_whitespace() {
        let html = case_table_page(
            "<tr><td>1</td><td>X 1/2024</td><td>  John \n  Doe   vs <b>State</b> </td><td>-</td></tr>",
        );
        let result = parse_case_result(&html, &base());
        assert_eq!(result.parties, "John Doe vs State");
    }

    #[test]
    fn test_bracket_status_edge_cases() {
        assert_eq!(bracket_status("X [PENDING]"), "PENDING");
        assert_eq!(bracket_status("X [a][disposed]"), "DISPOSED");
        assert_eq!(bracket_status("no brackets"), "ACTIVE");
        assert_eq!(bracket_status("open only ["), "ACTIVE");
    }
}
