use std::collections::{BTreeMap, HashMap};

use querylens_core::{ExecutionRecord, PatternId, PlanAnalysis, QueryPattern, Recommendation};
use tokio::sync::RwLock;

/// Every profiler table, guarded together.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) patterns: BTreeMap<PatternId, QueryPattern>,
    /// Normalized text to pattern id; mirrors `patterns`.
    pub(crate) pattern_ids: HashMap<String, PatternId>,
    pub(crate) executions: Vec<ExecutionRecord>,
    pub(crate) analyses: Vec<PlanAnalysis>,
    pub(crate) recommendations: Vec<Recommendation>,
    pub(crate) next_id: i64,
}

impl Tables {
    pub(crate) fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn pattern_by_sql(&mut self, normalized_sql: &str) -> Option<&mut QueryPattern> {
        let id = self.pattern_ids.get(normalized_sql)?;
        self.patterns.get_mut(id)
    }

    pub(crate) fn insert_pattern(&mut self, pattern: QueryPattern) {
        self.pattern_ids
            .insert(pattern.normalized_sql.clone(), pattern.id);
        self.patterns.insert(pattern.id, pattern);
    }

    pub(crate) fn remove_pattern(&mut self, id: PatternId) -> Option<QueryPattern> {
        let pattern = self.patterns.remove(&id)?;
        self.pattern_ids.remove(&pattern.normalized_sql);
        Some(pattern)
    }
}

/// In-memory profiler storage.
///
/// All tables sit behind one `tokio::sync::RwLock`. Each write operation
/// takes the write lock exactly once, so an upsert and its execution insert
/// are observed together or not at all.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    pub(crate) tables: RwLock<Tables>,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored patterns.
    pub async fn pattern_count(&self) -> usize {
        self.tables.read().await.patterns.len()
    }

    /// Number of stored execution records.
    pub async fn execution_count(&self) -> usize {
        self.tables.read().await.executions.len()
    }

    /// Number of stored recommendations.
    pub async fn recommendation_count(&self) -> usize {
        self.tables.read().await.recommendations.len()
    }

    /// Deletes a pattern and everything it owns.
    ///
    /// Returns `true` if the pattern existed.
    pub async fn delete_pattern(&self, id: PatternId) -> bool {
        let mut tables = self.tables.write().await;
        if tables.remove_pattern(id).is_none() {
            return false;
        }
        tables.executions.retain(|e| e.pattern_id != id);
        tables.analyses.retain(|a| a.pattern_id != id);
        tables.recommendations.retain(|r| r.pattern_id != id);
        true
    }

    /// Removes everything.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}
