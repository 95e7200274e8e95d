//! All-pairs similarity over a transaction snapshot.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::models::{Transaction, TransactionId};
use crate::scheduler::Progress;
use crate::similarity::transaction_similarity;

/// Scores of one transaction against every other transaction of the
/// snapshot, in snapshot order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityRow {
    entries: Vec<(TransactionId, f64)>,
}

impl SimilarityRow {
    pub fn iter(&self) -> impl Iterator<Item = (TransactionId, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn score(&self, other: &TransactionId) -> Option<f64> {
        self.entries
            .iter()
            .find(|(id, _)| id == other)
            .map(|(_, score)| *score)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rows keyed by transaction identity, shared across matrix builds.
///
/// Entries are never dropped by the builder. Call [`SimilarityCache::clear`]
/// whenever the underlying transactions change.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    rows: RwLock<HashMap<TransactionId, Arc<SimilarityRow>>>,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &TransactionId) -> Option<Arc<SimilarityRow>> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn insert(&self, id: TransactionId, row: Arc<SimilarityRow>) {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, row);
    }

    pub fn clear(&self) {
        self.rows.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimilarityMatrix {
    order: Vec<TransactionId>,
    rows: HashMap<TransactionId, Arc<SimilarityRow>>,
}

impl SimilarityMatrix {
    /// Row of `id`, if it was part of the snapshot.
    pub fn row(&self, id: &TransactionId) -> Option<&SimilarityRow> {
        self.rows.get(id).map(Arc::as_ref)
    }

    pub fn score(&self, a: &TransactionId, b: &TransactionId) -> Option<f64> {
        self.row(a)?.score(b)
    }

    /// Rows in snapshot order.
    pub fn rows(&self) -> impl Iterator<Item = (TransactionId, &SimilarityRow)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.rows.get(id).map(|row| (*id, row.as_ref())))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn compute_row(source: &Transaction, transactions: &[Transaction]) -> SimilarityRow {
    SimilarityRow {
        entries: transactions
            .iter()
            .filter(|other| other.id != source.id)
            .map(|other| (other.id, transaction_similarity(source, other)))
            .collect(),
    }
}

/// Score every transaction against every other one.
///
/// Rows are computed in parallel on the current rayon pool and one progress
/// step is recorded per finished row. With a cache, rows already present are
/// reused and new rows are stored. Identities must be unique within
/// `transactions`, and the slice must not change while the build runs.
pub fn build_similarity_matrix(
    transactions: &[Transaction],
    cache: Option<&SimilarityCache>,
    progress: &Progress,
) -> SimilarityMatrix {
    info!(
        transactions = transactions.len(),
        cached = cache.is_some(),
        "computing similarity matrix"
    );
    progress.begin(transactions.len() as u64);

    let rows: Vec<(TransactionId, Arc<SimilarityRow>)> = transactions
        .par_iter()
        .map(|transaction| {
            let row = match cache.and_then(|c| c.get(&transaction.id)) {
                Some(row) => {
                    debug!(id = %transaction.id, "similarity row served from cache");
                    row
                }
                None => {
                    let row = Arc::new(compute_row(transaction, transactions));
                    if let Some(cache) = cache {
                        cache.insert(transaction.id, Arc::clone(&row));
                    }
                    row
                }
            };
            progress.step();
            (transaction.id, row)
        })
        .collect();

    SimilarityMatrix {
        order: rows.iter().map(|(id, _)| *id).collect(),
        rows: rows.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CurrencyAmount;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn sample(usage: &str, amount: f64) -> Transaction {
        Transaction {
            usage_text: Some(usage.to_string()),
            ..Transaction::new(CurrencyAmount::new(amount, "EUR"))
        }
    }

    fn samples() -> Vec<Transaction> {
        vec![
            sample("NETFLIX.COM", -12.99),
            sample("NETFLIX.COM", -12.99),
            sample("Miete Oktober", -850.0),
            sample("Gehalt", 2400.0),
        ]
    }

    #[test]
    fn test_rows_exclude_self_and_follow_input_order() {
        let transactions = samples();
        let matrix = build_similarity_matrix(&transactions, None, &Progress::new());
        assert_eq!(matrix.len(), 4);
        for (id, row) in matrix.rows() {
            assert_eq!(row.len(), 3);
            assert!(row.score(&id).is_none());
            let expected: Vec<_> = transactions.iter().map(|t| t.id).filter(|o| *o != id).collect();
            let actual: Vec<_> = row.iter().map(|(o, _)| o).collect();
            assert_eq!(actual, expected);
        }
        let order: Vec<_> = matrix.rows().map(|(id, _)| id).collect();
        assert_eq!(order, transactions.iter().map(|t| t.id).collect::<Vec<_>>());
    }

    #[test]
    fn test_matrix_is_symmetric_and_bounded() {
        let transactions = samples();
        let matrix = build_similarity_matrix(&transactions, None, &Progress::new());
        for a in &transactions {
            for b in &transactions {
                if a.id == b.id {
                    continue;
                }
                let ab = matrix.score(&a.id, &b.id).unwrap();
                let ba = matrix.score(&b.id, &a.id).unwrap();
                assert_eq!(ab, ba);
                assert!((0.0..=1.0).contains(&ab));
            }
        }
        assert_eq!(matrix.score(&transactions[0].id, &transactions[1].id), Some(1.0));
    }

    #[test]
    fn test_progress_reports_one_step_per_row() {
        let transactions = samples();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let progress = Progress::with_listener(move |_, total| {
            assert_eq!(total, 4);
            counter.fetch_add(1, Ordering::Relaxed);
        });
        build_similarity_matrix(&transactions, None, &progress);
        assert_eq!(progress.done(), 4);
        assert_eq!(progress.total(), 4);
        // begin() plus one call per row
        assert_eq!(calls.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_cache_is_populated_and_reused() {
        let transactions = samples();
        let cache = SimilarityCache::new();
        let first = build_similarity_matrix(&transactions, Some(&cache), &Progress::new());
        assert_eq!(cache.len(), 4);

        // A cached row survives data changes until the cache is cleared.
        let mut changed = transactions.clone();
        changed[1].usage_text = Some("SPOTIFY".to_string());
        let stale = build_similarity_matrix(&changed, Some(&cache), &Progress::new());
        assert_eq!(
            stale.score(&transactions[0].id, &transactions[1].id),
            first.score(&transactions[0].id, &transactions[1].id)
        );

        cache.clear();
        assert!(cache.is_empty());
        let fresh = build_similarity_matrix(&changed, Some(&cache), &Progress::new());
        assert!(fresh.score(&transactions[0].id, &transactions[1].id).unwrap() < 1.0);
    }

    #[test]
    fn test_empty_input() {
        let matrix = build_similarity_matrix(&[], None, &Progress::new());
        assert!(matrix.is_empty());
    }
}
