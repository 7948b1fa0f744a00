pub mod productivity;
pub mod risk;
pub mod usage;

pub use productivity::{productivity_score, productivity_summary, ProductivitySummary, Trend};
pub use risk::classify_risk;
pub use usage::{hourly_histogram, top_apps, top_domains, UsageCount};
