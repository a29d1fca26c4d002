/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use chrono::format::{Fixed, Item, Numeric, Pad, Parsed, StrftimeItems, parse};
use chrono::{DateTime, ParseResult, Utc};

/// time-val as defined in RFC 3659, YYYYMMDDHHMMSS[.sss]
const RFC3659: &[Item<'static>] = &[
    Item::Numeric(Numeric::Year, Pad::Zero),
    Item::Numeric(Numeric::Month, Pad::Zero),
    Item::Numeric(Numeric::Day, Pad::Zero),
    Item::Numeric(Numeric::Hour, Pad::Zero),
    Item::Numeric(Numeric::Minute, Pad::Zero),
    Item::Numeric(Numeric::Second, Pad::Zero),
    Item::Fixed(Fixed::Nanosecond),
];

pub(crate) fn parse_from_str(s: &str) -> ParseResult<DateTime<Utc>> {
    let mut parsed = Parsed::new();
    parse(&mut parsed, s.trim(), RFC3659.iter())?;
    parsed.to_datetime_with_timezone(&Utc)
}

/// Check a strftime style format string without formatting anything.
pub(crate) fn is_valid_format(fmt: &str) -> bool {
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn whole_seconds() {
        let dt = parse_from_str("19980312084511").unwrap();
        assert_eq!(dt.year(), 1998);
        assert_eq!(dt.month(), 3);
        assert_eq!(dt.day(), 12);
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.minute(), 45);
        assert_eq!(dt.second(), 11);
        assert_eq!(dt.timestamp_subsec_millis(), 0);
    }

    #[test]
    fn fraction_seconds() {
        let dt = parse_from_str("20240229235959.25").unwrap();
        assert_eq!(dt.day(), 29);
        assert_eq!(dt.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn invalid() {
        assert!(parse_from_str("20240230120000").is_err());
        assert!(parse_from_str("2024-02-01").is_err());
        assert!(parse_from_str("").is_err());
    }

    #[test]
    fn format_check() {
        assert!(is_valid_format("%Y-%m-%d %H:%M:%S"));
        assert!(is_valid_format("plain text"));
        assert!(!is_valid_format("%Y-%Q"));
    }
}
