//! Discovery of recurring payments by clustering near-identical transactions,
//! and the review session that walks the user through the suggestions.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::error::{FinmanError, Result};
use crate::matrix::{build_similarity_matrix, SimilarityCache, SimilarityMatrix};
use crate::models::{RecurringGroup, RecurringGroupId, Transaction, TransactionId};
use crate::scheduler::Progress;

pub const DEFAULT_SUGGESTION_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone)]
pub struct RecurringCluster {
    /// Anchor transaction first, then its partners in snapshot order.
    pub members: Vec<Transaction>,
    /// Mean score between the anchor and its partners.
    pub average_similarity: f64,
}

impl RecurringCluster {
    pub fn ids(&self) -> Vec<TransactionId> {
        self.members.iter().map(|t| t.id).collect()
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.members.iter().any(|t| &t.id == id)
    }

    /// The recurring group most members already belong to, if any. Ties go to
    /// the group seen first.
    pub fn suggested_group(&self) -> Option<RecurringGroupId> {
        let mut counts: Vec<(RecurringGroupId, usize)> = Vec::new();
        for group in self.members.iter().filter_map(|t| t.recurring_group) {
            match counts.iter_mut().find(|(id, _)| *id == group) {
                Some((_, count)) => *count += 1,
                None => counts.push((group, 1)),
            }
        }
        let best = counts.iter().map(|(_, count)| *count).max()?;
        counts
            .into_iter()
            .find(|(_, count)| *count == best)
            .map(|(id, _)| id)
    }
}

// Every partner already carries the same group: nothing to suggest from this
// anchor. The anchor's own label is not consulted.
fn already_grouped(
    partners: &[(TransactionId, f64)],
    by_id: &HashMap<TransactionId, &Transaction>,
) -> bool {
    let mut groups = partners
        .iter()
        .map(|(id, _)| by_id.get(id).and_then(|t| t.recurring_group));
    let Some(Some(first)) = groups.next() else {
        return false;
    };
    groups.all(|group| group == Some(first))
}

/// Group transactions whose pairwise score reaches `threshold`.
///
/// Anchors are visited in snapshot order and the first cluster to claim a
/// transaction keeps it, so clusters are disjoint. The result is ordered by
/// descending average similarity.
pub fn find_recurring_clusters(
    transactions: &[Transaction],
    matrix: &SimilarityMatrix,
    threshold: f64,
) -> Vec<RecurringCluster> {
    let by_id: HashMap<TransactionId, &Transaction> =
        transactions.iter().map(|t| (t.id, t)).collect();

    let candidates: Vec<(&Transaction, Vec<(TransactionId, f64)>)> = transactions
        .iter()
        .filter_map(|anchor| {
            let row = matrix.row(&anchor.id)?;
            // Ids missing from the snapshot come from stale cache rows.
            let partners: Vec<(TransactionId, f64)> = row
                .iter()
                .filter(|(id, score)| *score >= threshold && by_id.contains_key(id))
                .collect();
            if partners.is_empty() || already_grouped(&partners, &by_id) {
                return None;
            }
            Some((anchor, partners))
        })
        .collect();

    let mut claimed: HashSet<TransactionId> = HashSet::new();
    let mut clusters = Vec::new();
    for (anchor, partners) in candidates {
        if claimed.contains(&anchor.id) {
            continue;
        }
        let partners: Vec<(TransactionId, f64)> = partners
            .into_iter()
            .filter(|(id, _)| !claimed.contains(id))
            .collect();
        if partners.is_empty() {
            debug!(anchor = %anchor.id, "all partners already claimed");
            continue;
        }

        let average_similarity =
            partners.iter().map(|(_, score)| score).sum::<f64>() / partners.len() as f64;
        claimed.insert(anchor.id);
        let mut members = vec![anchor.clone()];
        for (id, _) in &partners {
            claimed.insert(*id);
            if let Some(partner) = by_id.get(id) {
                members.push((*partner).clone());
            }
        }
        clusters.push(RecurringCluster {
            members,
            average_similarity,
        });
    }

    clusters.sort_by(|a, b| b.average_similarity.total_cmp(&a.average_similarity));
    clusters
}

/// Build the matrix (through `cache` when given) and cluster it.
pub fn search(
    transactions: &[Transaction],
    threshold: f64,
    cache: Option<&SimilarityCache>,
    progress: &Progress,
) -> Vec<RecurringCluster> {
    let matrix = build_similarity_matrix(transactions, cache, progress);
    let clusters = find_recurring_clusters(transactions, &matrix, threshold);
    info!(
        clusters = clusters.len(),
        threshold, "recurring transaction search finished"
    );
    clusters
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing computed, or a confirmation is waiting for a recompute.
    Idle,
    Computing,
    Presenting(usize),
    Exhausted,
}

#[derive(Debug)]
pub enum Suggestion<'a> {
    Cluster(&'a RecurringCluster),
    Exhausted,
}

/// Result of confirming a suggestion. The caller persists it, applies it to
/// its transactions and recomputes.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub group: RecurringGroup,
    pub members: Vec<TransactionId>,
}

impl Confirmation {
    pub fn apply(&self, transactions: &mut [Transaction]) {
        for transaction in transactions.iter_mut() {
            if self.members.contains(&transaction.id) {
                transaction.recurring_group = Some(self.group.id);
            }
        }
    }
}

/// Review queue over the clusters of one search.
///
/// Owns the similarity cache so that skipping and recomputing after a
/// confirmation do not rescore unchanged transactions.
pub struct SuggestionSession {
    threshold: f64,
    cache: SimilarityCache,
    clusters: Vec<RecurringCluster>,
    state: SessionState,
    resume_at: usize,
}

impl SuggestionSession {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            cache: SimilarityCache::new(),
            clusters: Vec::new(),
            state: SessionState::Idle,
            resume_at: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn clusters(&self) -> &[RecurringCluster] {
        &self.clusters
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run the search and present the first suggestion.
    ///
    /// Without `use_cache` the cache is cleared first and presentation starts
    /// over. With it, presentation resumes where the last confirmation left
    /// off so skipped suggestions are not shown again.
    pub fn compute(
        &mut self,
        transactions: &[Transaction],
        use_cache: bool,
        progress: &Progress,
    ) -> Result<Suggestion<'_>> {
        self.state = SessionState::Computing;
        if !use_cache {
            self.cache.clear();
            self.resume_at = 0;
        }
        self.clusters = search(transactions, self.threshold, Some(&self.cache), progress);
        self.state = self.position(self.resume_at);
        self.current()
    }

    fn position(&self, index: usize) -> SessionState {
        if index < self.clusters.len() {
            SessionState::Presenting(index)
        } else {
            SessionState::Exhausted
        }
    }

    pub fn current(&self) -> Result<Suggestion<'_>> {
        match self.state {
            SessionState::Idle | SessionState::Computing => Err(FinmanError::SessionNotInitialized),
            SessionState::Presenting(i) => Ok(Suggestion::Cluster(&self.clusters[i])),
            SessionState::Exhausted => Ok(Suggestion::Exhausted),
        }
    }

    /// Move to the following suggestion without confirming the current one.
    pub fn next(&mut self) -> Result<Suggestion<'_>> {
        match self.state {
            SessionState::Idle | SessionState::Computing => {
                return Err(FinmanError::SessionNotInitialized)
            }
            SessionState::Exhausted => return Err(FinmanError::SuggestionsExhausted),
            SessionState::Presenting(i) => self.state = self.position(i + 1),
        }
        self.current()
    }

    pub fn skip(&mut self) -> Result<Suggestion<'_>> {
        self.next()
    }

    /// Confirm the current suggestion under `description`.
    ///
    /// `selection` narrows the members to the given ids; `None` takes the
    /// whole cluster. If members already share a group, that group is
    /// relabelled instead of creating a new one. The session returns to
    /// `Idle` until the caller recomputes.
    pub fn confirm(
        &mut self,
        description: &str,
        selection: Option<&[TransactionId]>,
    ) -> Result<Confirmation> {
        let index = match self.state {
            SessionState::Idle | SessionState::Computing => {
                return Err(FinmanError::SessionNotInitialized)
            }
            SessionState::Exhausted => return Err(FinmanError::SuggestionsExhausted),
            SessionState::Presenting(i) => i,
        };
        let cluster = &self.clusters[index];
        let members: Vec<TransactionId> = match selection {
            Some(selected) => cluster
                .ids()
                .into_iter()
                .filter(|id| selected.contains(id))
                .collect(),
            None => cluster.ids(),
        };
        if members.is_empty() {
            return Err(FinmanError::Other(
                "select at least one transaction to confirm".to_string(),
            ));
        }
        let group = match cluster.suggested_group() {
            Some(id) => RecurringGroup {
                id,
                description: description.to_string(),
            },
            None => RecurringGroup::new(description),
        };
        info!(group = %group.id, members = members.len(), "recurring group confirmed");

        self.resume_at = index;
        self.state = SessionState::Idle;
        Ok(Confirmation { group, members })
    }

    pub fn cancel(&mut self) {
        self.clusters.clear();
        self.resume_at = 0;
        self.state = SessionState::Idle;
    }
}
