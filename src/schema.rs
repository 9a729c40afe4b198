//! Table schema definitions
//!
//! Column names of the two CSV tables. The headers match the files the
//! first dashboard version wrote, so existing data loads unchanged.

/// Ingested messages table schema
pub mod messages {
    /// Poster identity column, always read as text
    pub const AUTHOR_ID: &str = "user";
    /// Normalized message body column
    pub const TEXT: &str = "message";
    /// Source timestamp column
    pub const POSTED_AT: &str = "date";
    /// Classification label column (`report`, `comment` or empty)
    pub const CLASSIFICATION: &str = "classification";
    /// Extracted location column, empty unless the label is `report`
    pub const LOCATION: &str = "location";

    /// Header row in file order
    pub const HEADER: [&str; 5] = [AUTHOR_ID, TEXT, POSTED_AT, CLASSIFICATION, LOCATION];

    /// Values that mean "not classified yet" in the classification column
    pub const UNSET_MARKERS: [&str; 5] = ["", "nan", "none", "null", "unset"];
}

/// Location aggregate table schema
pub mod locations {
    /// Location text column
    pub const LOCATION: &str = "location";
    /// Calendar day column
    pub const DATE: &str = "date";
    /// Report count column
    pub const REPORT_COUNT: &str = "report_count";

    /// Header row in file order
    pub const HEADER: [&str; 3] = [LOCATION, DATE, REPORT_COUNT];
}
