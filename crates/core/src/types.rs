/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Free-form JSON attributes attached to records and rule parameters.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
