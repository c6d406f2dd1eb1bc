use chrono::{DateTime, Local, TimeZone};
use mongodb::bson::Timestamp;

/// convert a change event cluster time to local datetime, only used for log.
///
/// An ambiguous local time picks the earliest one, a non-existent one gives None.
pub fn to_datetime(ts: &Timestamp) -> Option<DateTime<Local>> {
    Local.timestamp_opt(ts.time as i64, 0).earliest()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_to_datetime() {
        let dt = to_datetime(&Timestamp {
            time: 1_600_000_000,
            increment: 3,
        })
        .unwrap();
        assert_eq!(dt.timestamp(), 1_600_000_000);
    }
}
