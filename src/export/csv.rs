use csv::{QuoteStyle, WriterBuilder};

use crate::error::{AuditError, Result};
use crate::metrics::classify_risk;
use crate::types::LogRecord;

/// Column order of the exported CSV.
pub const CSV_HEADERS: &[&str] = &[
    "id",
    "timestamp",
    "device_id",
    "active_app",
    "browser_url",
    "is_suspicious",
    "suspicious_reasons",
    "risk_level",
    "city",
    "country",
    "screenshot_url",
];

/// Serialize a filtered record set to CSV text.
///
/// Every field is quoted, internal quotes doubled (RFC 4180). Timestamps
/// are written as locale-independent RFC 3339 where the record parsed;
/// otherwise the preserved raw string passes through verbatim.
pub fn logs_to_csv(records: &[LogRecord]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    writer
        .write_record(CSV_HEADERS)
        .map_err(|e| AuditError::Export(e.to_string()))?;

    for record in records {
        let timestamp = record
            .timestamp
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| record.raw_timestamp.clone());
        let (city, country) = record
            .location
            .as_ref()
            .map(|loc| (loc.city.clone(), loc.country.clone()))
            .unwrap_or_default();

        writer
            .write_record([
                record.id.as_str(),
                timestamp.as_str(),
                record.device_id.as_str(),
                record.active_app.as_str(),
                record.browser_url.as_str(),
                if record.is_suspicious { "true" } else { "false" },
                record.suspicious_reasons.join("; ").as_str(),
                classify_risk(record).as_str(),
                city.as_str(),
                country.as_str(),
                record.screenshot_url.as_str(),
            ])
            .map_err(|e| AuditError::Export(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AuditError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AuditError::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    fn record(id: &str, app: &str, url: &str) -> LogRecord {
        LogRecord {
            id: id.to_string(),
            timestamp: parse_timestamp("2024-08-24T10:00:00Z"),
            raw_timestamp: "2024-08-24T10:00:00Z".to_string(),
            device_id: "dev-a".to_string(),
            active_app: app.to_string(),
            browser_url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_header_row() {
        let csv = logs_to_csv(&[]).unwrap();
        let first = csv.lines().next().unwrap();
        assert!(first.starts_with("\"id\",\"timestamp\""));
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let mut suspicious = record("log-2", "youtube", "https://youtube.com/watch");
        suspicious.is_suspicious = true;
        suspicious.suspicious_reasons = vec!["malware detected".to_string()];

        let records = vec![record("log-1", "vscode", "https://github.com"), suspicious];
        let csv = logs_to_csv(&records).unwrap();

        let mut reader = ::csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<::csv::StringRecord> =
            reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "log-1");
        assert_eq!(&rows[0][3], "vscode");
        assert_eq!(&rows[1][5], "true");
        assert_eq!(&rows[1][6], "malware detected");
        assert_eq!(&rows[1][7], "high");
    }

    #[test]
    fn test_embedded_quote_escaped() {
        let r = record("log-3", "Notes", r#"https://example.com/?q="quoted""#);
        let csv = logs_to_csv(&[r]).unwrap();
        // doubled quotes on the wire
        assert!(csv.contains(r#"""quoted"""#));

        let mut reader = ::csv::Reader::from_reader(csv.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[4], r#"https://example.com/?q="quoted""#);
    }

    #[test]
    fn test_unparseable_timestamp_passes_through() {
        let mut r = record("log-4", "Unknown", "unknown");
        r.timestamp = None;
        r.raw_timestamp = "not-a-time".to_string();
        let csv = logs_to_csv(&[r]).unwrap();

        let mut reader = ::csv::Reader::from_reader(csv.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[1], "not-a-time");
    }

    #[test]
    fn test_location_columns() {
        let mut r = record("log-5", "Maps", "https://maps.example.com");
        r.location = Some(crate::types::LocationData {
            latitude: 19.07,
            longitude: 72.87,
            city: "Mumbai".to_string(),
            country: "India".to_string(),
        });
        let csv = logs_to_csv(&[r]).unwrap();
        let mut reader = ::csv::Reader::from_reader(csv.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[8], "Mumbai");
        assert_eq!(&row[9], "India");
    }
}
