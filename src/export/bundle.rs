use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::Result;

pub const BUNDLE_CSV_NAME: &str = "activity_report.csv";
pub const BUNDLE_PDF_NAME: &str = "activity_report.pdf";

/// Pack the CSV and PDF artifacts into one downloadable zip archive.
pub fn report_bundle(csv: &str, pdf: &[u8]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer.start_file(BUNDLE_CSV_NAME, options)?;
    writer.write_all(csv.as_bytes())?;

    writer.start_file(BUNDLE_PDF_NAME, options)?;
    writer.write_all(pdf)?;

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}
