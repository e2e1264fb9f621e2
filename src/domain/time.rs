//! Seconds-since-epoch helpers. The schema stores every timestamp as a
//! plain integer (`INTEGER`/`BIGINT` depending on backend) — `chrono` is
//! only used at the API edge for ergonomics, never persisted directly.

use chrono::{DateTime, TimeZone, Utc};

pub fn to_epoch_seconds(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

pub fn from_epoch_seconds(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_epoch_seconds() {
        let now = Utc::now();
        let secs = to_epoch_seconds(now);
        let back = from_epoch_seconds(secs);
        assert_eq!(back.timestamp(), secs);
    }
}
