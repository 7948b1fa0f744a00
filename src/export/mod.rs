pub mod bundle;
pub mod csv;
pub mod pdf;

pub use self::csv::logs_to_csv;
pub use bundle::report_bundle;
pub use pdf::activity_report_pdf;
