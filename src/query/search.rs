use crate::types::LogRecord;

/// Case-insensitive substring check, mirroring the search box behavior.
pub fn plain_text_contains(text: &str, pattern: &str) -> bool {
    text.to_lowercase().contains(&pattern.to_lowercase())
}

/// Free-text search across the two searchable record columns.
pub fn matches_search(record: &LogRecord, query: &str) -> bool {
    plain_text_contains(&record.active_app, query)
        || plain_text_contains(&record.browser_url, query)
}
