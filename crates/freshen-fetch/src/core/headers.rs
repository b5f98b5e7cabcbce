use chrono::{DateTime, Utc};

/// Total length from a `Content-Range` value such as `bytes 0-0/1234`.
pub fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

pub fn content_length(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

/// Parses an HTTP date (`Last-Modified`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("bytes 0-0/1234"), Some(1234));
        assert_eq!(content_range_total("bytes 10-19/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }

    #[test]
    fn test_parse_http_date() {
        assert_eq!(
            parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap())
        );
        assert_eq!(parse_http_date("yesterday"), None);
    }
}
