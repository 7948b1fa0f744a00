use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};

use crate::metrics::classify_risk;
use crate::types::{FilterSpec, LogRecord};

const PAGE_W_MM: f32 = 210.0;
const PAGE_H_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;

const TITLE_SIZE_PT: f32 = 18.0;
const HEADER_SIZE_PT: f32 = 11.0;
const ROW_SIZE_PT: f32 = 8.0;
const ROW_HEIGHT_PT: f32 = 11.0;

/// Table columns: label, x offset from the left margin (pt), and the
/// character budget a cell is truncated to.
const COLUMNS: &[(&str, f32, usize)] = &[
    ("Timestamp", 0.0, 24),
    ("Device", 120.0, 16),
    ("App", 210.0, 18,),
    ("URL", 310.0, 34),
    ("Risk", 490.0, 8),
];

/// Render a filtered record set as a titled tabular PDF report.
///
/// The header block restates the filter parameters (date range, device) so
/// the printed report is self-describing. Rows flow across as many pages as
/// needed, with the column header repeated on each.
pub fn activity_report_pdf(records: &[LogRecord], filter: &FilterSpec) -> Vec<u8> {
    let page_w = Mm(PAGE_W_MM);
    let page_h = Mm(PAGE_H_MM);
    let margin_pt = Mm(MARGIN_MM).into_pt().0;
    let page_h_pt = page_h.into_pt().0;

    let mut doc = PdfDocument::new("SilentAudit Activity Report");
    let mut pages: Vec<PdfPage> = Vec::new();

    let rows_per_page =
        ((page_h_pt - 2.0 * margin_pt - 100.0) / ROW_HEIGHT_PT).max(1.0) as usize;

    let mut index = 0usize;
    let mut first_page = true;
    loop {
        let mut ops: Vec<Op> = Vec::new();
        let mut y = page_h_pt - margin_pt;

        if first_page {
            text_at(&mut ops, margin_pt, y, TITLE_SIZE_PT, "SilentAudit Activity Report");
            y -= 24.0;

            let date_line = match (&filter.date_start, &filter.date_end) {
                (Some(start), Some(end)) => format!("Date Range: {} to {}", start, end),
                (Some(start), None) => format!("Date Range: from {}", start),
                (None, Some(end)) => format!("Date Range: until {}", end),
                (None, None) => "All Dates".to_string(),
            };
            text_at(&mut ops, margin_pt, y, HEADER_SIZE_PT, &date_line);
            y -= 14.0;

            if let Some(device) = &filter.device_id {
                text_at(&mut ops, margin_pt, y, HEADER_SIZE_PT, &format!("Device: {}", device));
                y -= 14.0;
            }

            text_at(
                &mut ops,
                margin_pt,
                y,
                HEADER_SIZE_PT,
                &format!("Records: {}", records.len()),
            );
            y -= 20.0;
        }

        // column header
        for (label, x_off, _) in COLUMNS {
            text_at(&mut ops, margin_pt + x_off, y, ROW_SIZE_PT + 1.0, label);
        }
        y -= ROW_HEIGHT_PT + 2.0;

        let mut used = 0usize;
        while index < records.len() && used < rows_per_page {
            let record = &records[index];
            let cells = [
                record.display_time(),
                record.device_id.clone(),
                record.active_app.clone(),
                record.browser_url.clone(),
                classify_risk(record).as_str().to_string(),
            ];
            for ((_, x_off, budget), cell) in COLUMNS.iter().zip(cells.iter()) {
                text_at(
                    &mut ops,
                    margin_pt + x_off,
                    y,
                    ROW_SIZE_PT,
                    &truncate_cell(cell, *budget),
                );
            }
            y -= ROW_HEIGHT_PT;
            index += 1;
            used += 1;
        }

        pages.push(PdfPage::new(page_w, page_h, ops));
        first_page = false;

        if index >= records.len() {
            break;
        }
    }

    doc.with_pages(pages);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        log::debug!("pdf generation produced {} warnings", warnings.len());
    }
    output
}

fn text_at(ops: &mut Vec<Op>, x_pt: f32, y_pt: f32, size_pt: f32, text: &str) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(x_pt),
            y: Pt(y_pt),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size_pt),
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text.to_string())],
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::EndTextSection);
}

fn truncate_cell(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut out: String = text.chars().take(budget.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    fn record(id: &str) -> LogRecord {
        LogRecord {
            id: id.to_string(),
            timestamp: parse_timestamp("2024-08-24T10:00:00Z"),
            device_id: "dev-a".to_string(),
            active_app: "vscode".to_string(),
            browser_url: "https://github.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_report_is_valid_pdf() {
        let records = vec![record("log-1"), record("log-2")];
        let bytes = activity_report_pdf(&records, &FilterSpec::default());
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn test_empty_report_still_renders() {
        let bytes = activity_report_pdf(&[], &FilterSpec::default());
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_long_record_set_spans_pages() {
        let records: Vec<LogRecord> = (0..200).map(|i| record(&format!("log-{}", i))).collect();
        let small = activity_report_pdf(&records[..1], &FilterSpec::default());
        let large = activity_report_pdf(&records, &FilterSpec::default());
        assert!(large.len() > small.len());
    }

    #[test]
    fn test_truncate_cell() {
        assert_eq!(truncate_cell("short", 10), "short");
        let cut = truncate_cell("https://example.com/a/very/long/path", 12);
        assert_eq!(cut.chars().count(), 12);
        assert!(cut.ends_with('…'));
    }
}
