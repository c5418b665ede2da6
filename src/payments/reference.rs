/// Transaction reference format: `KM{order_id}T{unix_timestamp}`.
///
/// The embedded order id is the last-resort lookup path when a webhook
/// arrives before the broker's transaction number has been stored.
const PREFIX: &str = "KM";
const SEPARATOR: char = 'T';

pub fn build_reference(order_id: u64, timestamp: i64) -> String {
    format!("{}{}{}{}", PREFIX, order_id, SEPARATOR, timestamp)
}

pub fn parse_order_id(reference: &str) -> Option<u64> {
    let rest = reference.strip_prefix(PREFIX)?;
    let (order_id, _timestamp) = rest.split_once(SEPARATOR)?;
    order_id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_order_id() {
        let reference = build_reference(42, 1_700_000_000);
        assert_eq!(reference, "KM42T1700000000");
        assert_eq!(parse_order_id(&reference), Some(42));
    }

    #[test]
    fn rejects_foreign_references() {
        assert_eq!(parse_order_id("TXN123"), None);
        assert_eq!(parse_order_id("KMxT123"), None);
        assert_eq!(parse_order_id("KM99"), None);
    }
}
