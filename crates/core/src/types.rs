/// Assets and projects are identified by opaque strings (UUID v4 in
/// practice, but the pipeline never inspects them).
pub type AssetId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Mint a fresh asset identifier.
pub fn new_asset_id() -> AssetId {
    uuid::Uuid::new_v4().to_string()
}
