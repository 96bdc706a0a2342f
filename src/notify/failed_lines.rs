//! Upload processing failures, rendered for the "processing failed" email.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Why an uploaded line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedLineReason {
    DateParseError,
    AmountParseError,
    DuplicatePayment,
    ClientNotFound,
    /// A reason code this service has no message for.
    Other(String),
}

impl FailedLineReason {
    pub fn key(&self) -> &str {
        match self {
            FailedLineReason::DateParseError => "DATE_PARSE_ERROR",
            FailedLineReason::AmountParseError => "AMOUNT_PARSE_ERROR",
            FailedLineReason::DuplicatePayment => "DUPLICATE_PAYMENT",
            FailedLineReason::ClientNotFound => "CLIENT_NOT_FOUND",
            FailedLineReason::Other(key) => key,
        }
    }

    /// Message shown to the uploader. Unknown codes have none.
    pub fn message(&self) -> &'static str {
        match self {
            FailedLineReason::DateParseError => "Unable to parse date",
            FailedLineReason::AmountParseError => "Unable to parse amount",
            FailedLineReason::DuplicatePayment => "Duplicate payment line",
            FailedLineReason::ClientNotFound => "Could not find a client with this court reference",
            FailedLineReason::Other(_) => "",
        }
    }
}

impl FromStr for FailedLineReason {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "DATE_PARSE_ERROR" => FailedLineReason::DateParseError,
            "AMOUNT_PARSE_ERROR" => FailedLineReason::AmountParseError,
            "DUPLICATE_PAYMENT" => FailedLineReason::DuplicatePayment,
            "CLIENT_NOT_FOUND" => FailedLineReason::ClientNotFound,
            other => FailedLineReason::Other(other.to_string()),
        })
    }
}

impl fmt::Display for FailedLineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// `Line N: message`, in line order.
pub fn format_failed_lines(failed_lines: &BTreeMap<u32, FailedLineReason>) -> Vec<String> {
    failed_lines
        .iter()
        .map(|(line, reason)| format!("Line {}: {}", line, reason.message()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_sorted_with_messages() {
        let lines: BTreeMap<u32, FailedLineReason> = [
            (5, "CLIENT_NOT_FOUND"),
            (1, "DATE_PARSE_ERROR"),
            (3, "AMOUNT_PARSE_ERROR"),
            (4, "DUPLICATE_PAYMENT"),
        ]
        .into_iter()
        .map(|(line, key)| (line, key.parse().unwrap()))
        .collect();

        assert_eq!(
            format_failed_lines(&lines),
            vec![
                "Line 1: Unable to parse date",
                "Line 3: Unable to parse amount",
                "Line 4: Duplicate payment line",
                "Line 5: Could not find a client with this court reference",
            ]
        );
    }

    #[test]
    fn test_unknown_reason_has_empty_message() {
        let lines = BTreeMap::from([(2, "SOMETHING_ELSE".parse::<FailedLineReason>().unwrap())]);
        assert_eq!(format_failed_lines(&lines), vec!["Line 2: "]);
        assert_eq!(lines[&2].key(), "SOMETHING_ELSE");
    }

    #[test]
    fn test_no_failures() {
        assert!(format_failed_lines(&BTreeMap::new()).is_empty());
    }
}
