//! Translate a retrieval request into `UID SEARCH` criteria.
//!
//! See [RFC 3501 section 6.4.4](https://tools.ietf.org/html/rfc3501#section-6.4.4) for the search
//! keys used here.

use chrono::NaiveDate;

/// The date format IMAP expects in `SINCE`, `BEFORE` and `ON` search keys, e.g. `02-Jan-2006`.
///
/// chrono renders `%b` with fixed English month abbreviations, so this does not depend on the
/// process locale.
pub(crate) const SEARCH_DATE_FORMAT: &str = "%d-%b-%Y";

/// Which messages of the selected mailbox a retrieval call should return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Every message in the mailbox.
    All,
    /// Messages without the `\Seen` flag.
    Unread,
    /// Messages whose internal date is on or after the given day.
    Since(NaiveDate),
}

impl RetrievalMode {
    /// The search criteria for this mode, one key or argument per element.
    pub fn search_terms(&self) -> Vec<String> {
        match *self {
            RetrievalMode::All => vec!["ALL".to_string()],
            RetrievalMode::Unread => vec!["UNSEEN".to_string()],
            RetrievalMode::Since(date) => vec![
                "SINCE".to_string(),
                date.format(SEARCH_DATE_FORMAT).to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all() {
        assert_eq!(vec!["ALL"], RetrievalMode::All.search_terms());
    }

    #[test]
    fn unread() {
        assert_eq!(vec!["UNSEEN"], RetrievalMode::Unread.search_terms());
    }

    #[test]
    fn since() {
        let date = NaiveDate::from_ymd_opt(2006, 1, 2).unwrap();
        assert_eq!(
            vec!["SINCE", "02-Jan-2006"],
            RetrievalMode::Since(date).search_terms()
        );
    }

    #[test]
    fn since_every_month() {
        let months = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        for (i, month) in months.iter().enumerate() {
            let date = NaiveDate::from_ymd_opt(2024, i as u32 + 1, 28).unwrap();
            let terms = RetrievalMode::Since(date).search_terms();
            assert_eq!(terms[1], format!("28-{}-2024", month));
        }
    }
}
