//! Agreement expiry evaluation

use crate::models::DocumentRecord;
use chrono::{DateTime, NaiveDate, Utc};

/// Default window, in days, for flagging agreements as expiring soon
pub const DEFAULT_EXPIRY_THRESHOLD_DAYS: i64 = 30;

/// Expiry facts for one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expiry {
    pub expires_on: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub expiring_soon: bool,
}

/// Decides when an agreement counts as expiring soon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub threshold_days: i64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            threshold_days: DEFAULT_EXPIRY_THRESHOLD_DAYS,
        }
    }
}

impl ExpiryPolicy {
    pub fn new(threshold_days: i64) -> Self {
        Self { threshold_days }
    }

    /// Evaluate expiry from a bucket's agreement documents.
    ///
    /// The latest due date wins. Agreements without a due date are skipped;
    /// with none left, nothing expires.
    pub fn evaluate(&self, agreements: &[DocumentRecord], today: NaiveDate) -> Expiry {
        let Some(expires_on) = agreements.iter().filter_map(|doc| doc.due_date).max() else {
            return Expiry::default();
        };

        let days = (expires_on.date_naive() - today).num_days();
        Expiry {
            expires_on: Some(expires_on),
            days_until_expiry: Some(days),
            expiring_soon: self.is_expiring_soon(days),
        }
    }

    /// Non-negative and inside the window; already-expired agreements are not flagged
    pub fn is_expiring_soon(&self, days_until_expiry: i64) -> bool {
        (0..=self.threshold_days).contains(&days_until_expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentCategory;
    use chrono::{Duration, TimeZone};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn agreement_due_in(days: i64) -> DocumentRecord {
        let noon = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        DocumentRecord::new(format!("msa-{days}"), DocumentCategory::Agreement)
            .with_due_date(noon + Duration::days(days))
    }

    #[test]
    fn test_due_in_ten_days_is_expiring_soon() {
        let expiry = ExpiryPolicy::default().evaluate(&[agreement_due_in(10)], today());
        assert_eq!(expiry.days_until_expiry, Some(10));
        assert!(expiry.expiring_soon);
    }

    #[test]
    fn test_due_in_four_hundred_days_is_not() {
        let expiry = ExpiryPolicy::default().evaluate(&[agreement_due_in(400)], today());
        assert_eq!(expiry.days_until_expiry, Some(400));
        assert!(!expiry.expiring_soon);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let policy = ExpiryPolicy::default();
        assert!(policy.evaluate(&[agreement_due_in(30)], today()).expiring_soon);
        assert!(!policy.evaluate(&[agreement_due_in(31)], today()).expiring_soon);
        assert!(policy.evaluate(&[agreement_due_in(0)], today()).expiring_soon);
    }

    #[test]
    fn test_expired_agreement_has_negative_days() {
        let expiry = ExpiryPolicy::default().evaluate(&[agreement_due_in(-3)], today());
        assert_eq!(expiry.days_until_expiry, Some(-3));
        assert!(!expiry.expiring_soon);
    }

    #[test]
    fn test_latest_due_date_wins() {
        let docs = vec![
            agreement_due_in(5),
            DocumentRecord::new("undated", DocumentCategory::Agreement),
            agreement_due_in(90),
        ];
        let expiry = ExpiryPolicy::default().evaluate(&docs, today());
        assert_eq!(expiry.days_until_expiry, Some(90));
        assert!(!expiry.expiring_soon);
    }

    #[test]
    fn test_no_dates_means_no_expiry() {
        let docs = vec![DocumentRecord::new("undated", DocumentCategory::Agreement)];
        assert_eq!(ExpiryPolicy::default().evaluate(&docs, today()), Expiry::default());
        assert_eq!(ExpiryPolicy::default().evaluate(&[], today()), Expiry::default());
    }

    #[test]
    fn test_custom_threshold() {
        let policy = ExpiryPolicy::new(7);
        assert!(!policy.evaluate(&[agreement_due_in(10)], today()).expiring_soon);
        assert!(policy.evaluate(&[agreement_due_in(7)], today()).expiring_soon);
    }
}
