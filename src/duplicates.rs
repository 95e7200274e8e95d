//! Screening of import candidates against already stored transactions.

use std::collections::HashMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::models::{Transaction, TransactionId};
use crate::scheduler::Progress;
use crate::similarity::transaction_similarity;

/// Scores at or above this count as the same transaction.
pub const DUPLICATE_THRESHOLD: f64 = 0.999;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Booking or value date missing; never imported.
    Incomplete,
    /// No stored transaction shares both dates, so nothing to compare with.
    NoComparable,
    /// Best match among stored transactions with the same dates.
    Unique { best: f64 },
    Duplicate { similarity: f64 },
}

impl Verdict {
    /// Whether the candidate should be left out of the import.
    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::Incomplete | Self::Duplicate { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateVerdict {
    pub id: TransactionId,
    pub verdict: Verdict,
}

impl DuplicateVerdict {
    pub fn is_excluded(&self) -> bool {
        self.verdict.is_excluded()
    }
}

/// Exclusion flags keyed by candidate identity (true = exclude).
pub fn into_exclusion_map(verdicts: &[DuplicateVerdict]) -> HashMap<TransactionId, bool> {
    verdicts.iter().map(|v| (v.id, v.is_excluded())).collect()
}

fn index_by_dates(existing: &[Transaction]) -> HashMap<(NaiveDate, NaiveDate), Vec<&Transaction>> {
    let mut index: HashMap<(NaiveDate, NaiveDate), Vec<&Transaction>> = HashMap::new();
    for transaction in existing {
        if let (Some(booking), Some(value)) = (transaction.booking_date, transaction.value_date) {
            index.entry((booking, value)).or_default().push(transaction);
        }
    }
    index
}

/// Decide for every candidate whether it already exists in `existing`.
///
/// Only stored transactions with the exact same booking and value date are
/// compared. Candidates are scored in parallel on the current rayon pool;
/// verdicts come back in candidate order.
pub fn detect_duplicates(
    candidates: &[Transaction],
    existing: &[Transaction],
    progress: &Progress,
) -> Vec<DuplicateVerdict> {
    info!(
        candidates = candidates.len(),
        existing = existing.len(),
        "screening import for duplicates"
    );
    progress.begin(candidates.len() as u64);
    let index = index_by_dates(existing);

    candidates
        .par_iter()
        .map(|candidate| {
            let verdict = match (candidate.booking_date, candidate.value_date) {
                (Some(booking), Some(value)) => match index.get(&(booking, value)) {
                    None => Verdict::NoComparable,
                    Some(same_day) => {
                        let best = same_day
                            .iter()
                            .map(|stored| transaction_similarity(stored, candidate))
                            .fold(0.0_f64, f64::max);
                        if best >= DUPLICATE_THRESHOLD {
                            Verdict::Duplicate { similarity: best }
                        } else {
                            Verdict::Unique { best }
                        }
                    }
                },
                _ => Verdict::Incomplete,
            };
            debug!(id = %candidate.id, ?verdict, "duplicate verdict");
            progress.step();
            DuplicateVerdict {
                id: candidate.id,
                verdict,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CurrencyAmount;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn stored() -> Transaction {
        Transaction {
            booking_date: date(2021, 10, 1),
            value_date: date(2021, 10, 1),
            counterparty: Some("Stadtwerke".to_string()),
            iban: Some("DE89370400440532013000".to_string()),
            usage_text: Some("Abschlag Strom".to_string()),
            ..Transaction::new(CurrencyAmount::new(-64.0, "EUR"))
        }
    }

    fn with_new_id(t: &Transaction) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            ..t.clone()
        }
    }

    #[test]
    fn test_exact_copy_is_duplicate() {
        let existing = vec![stored()];
        let candidate = with_new_id(&existing[0]);
        let verdicts = detect_duplicates(&[candidate.clone()], &existing, &Progress::new());
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].id, candidate.id);
        assert!(matches!(verdicts[0].verdict, Verdict::Duplicate { .. }));
        assert!(verdicts[0].is_excluded());
    }

    #[test]
    fn test_different_dates_are_not_compared() {
        let existing = vec![stored()];
        let candidate = Transaction {
            booking_date: date(2021, 11, 1),
            value_date: date(2021, 11, 1),
            ..with_new_id(&existing[0])
        };
        let verdicts = detect_duplicates(&[candidate], &existing, &Progress::new());
        assert_eq!(verdicts[0].verdict, Verdict::NoComparable);
        assert!(!verdicts[0].is_excluded());
    }

    #[test]
    fn test_value_date_must_match_too() {
        let existing = vec![stored()];
        let candidate = Transaction {
            value_date: date(2021, 10, 2),
            ..with_new_id(&existing[0])
        };
        let verdicts = detect_duplicates(&[candidate], &existing, &Progress::new());
        assert_eq!(verdicts[0].verdict, Verdict::NoComparable);
    }

    #[test]
    fn test_missing_booking_date_is_always_excluded() {
        let existing = vec![stored()];
        let candidate = Transaction {
            booking_date: None,
            ..with_new_id(&existing[0])
        };
        let verdicts = detect_duplicates(&[candidate.clone()], &[], &Progress::new());
        assert_eq!(verdicts[0].verdict, Verdict::Incomplete);
        let verdicts = detect_duplicates(&[candidate], &existing, &Progress::new());
        assert!(verdicts[0].is_excluded());
    }

    #[test]
    fn test_same_day_but_different_payment_is_unique() {
        let existing = vec![stored()];
        let candidate = Transaction {
            usage_text: Some("Abschlag Gas".to_string()),
            amount: CurrencyAmount::new(-48.0, "EUR"),
            ..with_new_id(&existing[0])
        };
        let verdicts = detect_duplicates(&[candidate], &existing, &Progress::new());
        match verdicts[0].verdict {
            Verdict::Unique { best } => assert!(best < DUPLICATE_THRESHOLD),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn test_verdicts_keep_candidate_order_and_map() {
        let existing = vec![stored()];
        let candidates: Vec<_> = (0..25)
            .map(|i| Transaction {
                booking_date: if i % 5 == 0 { None } else { existing[0].booking_date },
                ..with_new_id(&existing[0])
            })
            .collect();
        let progress = Progress::new();
        let verdicts = detect_duplicates(&candidates, &existing, &progress);
        assert_eq!(progress.done(), 25);
        let ids: Vec<_> = verdicts.iter().map(|v| v.id).collect();
        assert_eq!(ids, candidates.iter().map(|c| c.id).collect::<Vec<_>>());

        let map = into_exclusion_map(&verdicts);
        assert_eq!(map.len(), 25);
        assert!(map.values().all(|excluded| *excluded));
    }
}
