//! Test doubles shared by the profiler's unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use querylens_core::{
    ExecutionContext, ExecutionRecord, PatternId, PlanAnalysis, QueryPattern, Recommendation,
    Statement, StatementListener, StatementOutcome,
};
use querylens_db_memory::InMemoryStorage;
use querylens_reasoning::{ChatMessage, ReasoningClient, ReasoningError};
use querylens_storage::{
    CandidateThresholds, NewExecution, NewPlanAnalysis, NewRecommendation, PlanCapture,
    ProfilerStorage, SlowQueryCandidate, StorageError,
};
use serde_json::{Value, json};

use crate::recorder::is_recording;

/// Drives both hooks around a statement the way a driver adapter does.
pub(crate) async fn run_statement(
    listener: &dyn StatementListener,
    sql: &str,
    outcome: StatementOutcome,
) {
    let statement = Statement::new(sql);
    let mut ctx = ExecutionContext::new();
    listener.before_execute(&mut ctx, &statement);
    listener.after_execute(&ctx, &statement, &outcome).await;
}

/// In-memory storage whose writes run through an instrumented driver.
///
/// Every `record_execution` call first replays one statement of its own
/// through the attached listener, like a backend sitting on an instrumented
/// pool would.
pub(crate) struct HookedStorage {
    inner: InMemoryStorage,
    listener: OnceLock<Arc<dyn StatementListener>>,
    hook_invocations: AtomicUsize,
    fail_writes: bool,
}

impl HookedStorage {
    pub(crate) fn new() -> Self {
        Self {
            inner: InMemoryStorage::new(),
            listener: OnceLock::new(),
            hook_invocations: AtomicUsize::new(0),
            fail_writes: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    pub(crate) fn attach(&self, listener: Arc<dyn StatementListener>) {
        let _ = self.listener.set(listener);
    }

    pub(crate) fn inner(&self) -> &InMemoryStorage {
        &self.inner
    }

    pub(crate) fn hook_invocations(&self) -> usize {
        self.hook_invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfilerStorage for HookedStorage {
    async fn record_execution(&self, execution: &NewExecution) -> Result<PatternId, StorageError> {
        if let Some(listener) = self.listener.get() {
            self.hook_invocations.fetch_add(1, Ordering::SeqCst);
            run_statement(
                listener.as_ref(),
                "UPDATE profiler_counters SET n = n + 1 WHERE id = 1",
                StatementOutcome::Affected(1),
            )
            .await;
        }
        if self.fail_writes {
            return Err(StorageError::connection_error("connection reset by peer"));
        }
        self.inner.record_execution(execution).await
    }

    async fn get_pattern(&self, id: PatternId) -> Result<Option<QueryPattern>, StorageError> {
        self.inner.get_pattern(id).await
    }

    async fn recent_patterns(&self, limit: usize) -> Result<Vec<QueryPattern>, StorageError> {
        self.inner.recent_patterns(limit).await
    }

    async fn slow_query_candidates(
        &self,
        thresholds: &CandidateThresholds,
    ) -> Result<Vec<SlowQueryCandidate>, StorageError> {
        self.inner.slow_query_candidates(thresholds).await
    }

    async fn insert_analysis(
        &self,
        analysis: &NewPlanAnalysis,
    ) -> Result<PlanAnalysis, StorageError> {
        self.inner.insert_analysis(analysis).await
    }

    async fn get_analysis(&self, id: i64) -> Result<Option<PlanAnalysis>, StorageError> {
        self.inner.get_analysis(id).await
    }

    async fn latest_analyses(&self, limit: usize) -> Result<Vec<PlanAnalysis>, StorageError> {
        self.inner.latest_analyses(limit).await
    }

    async fn insert_recommendation(
        &self,
        recommendation: &NewRecommendation,
    ) -> Result<Recommendation, StorageError> {
        if self.fail_writes {
            return Err(StorageError::transaction_error("could not serialize access"));
        }
        self.inner.insert_recommendation(recommendation).await
    }

    async fn executions_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<ExecutionRecord>, StorageError> {
        self.inner.executions_for_patterns(pattern_ids).await
    }

    async fn analyses_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<PlanAnalysis>, StorageError> {
        self.inner.analyses_for_patterns(pattern_ids).await
    }

    async fn recommendations_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<Recommendation>, StorageError> {
        self.inner.recommendations_for_patterns(pattern_ids).await
    }
}

/// What a [`ScriptedReasoner`] does when called.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    Reply(String),
    Fail,
    Hang,
}

/// Reasoning client that replays a fixed script and keeps the prompts it saw.
pub(crate) struct ScriptedReasoner {
    script: Script,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedReasoner {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn reply(body: Value) -> Self {
        Self::new(Script::Reply(body.to_string()))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_prompt(&self) -> Option<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoner {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(messages.to_vec());
        match &self.script {
            Script::Reply(body) => Ok(body.clone()),
            Script::Fail => Err(ReasoningError::Status {
                status: 503,
                body: "upstream unavailable".into(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ReasoningError::EmptyResponse)
            }
        }
    }
}

/// A well-formed reasoning reply with the given raw confidence.
pub(crate) fn valid_reply(confidence: f64) -> Value {
    json!({
        "summary": "Add an index on orders.customer_id to avoid the sequential scan.",
        "details": "1. Problem: the planner reads all of orders.\n2. Evidence: Seq Scan on orders.\n3. Fix: CREATE INDEX ON orders (customer_id).\n4. Impact: lookups touch a few pages.",
        "confidence_score": confidence
    })
}

/// Plan capture that returns a fixed document and notes the recording guard.
pub(crate) struct StaticPlanCapture {
    response: Result<Value, String>,
    calls: AtomicUsize,
    saw_guard: AtomicBool,
}

impl StaticPlanCapture {
    pub(crate) fn new(plan: Value) -> Self {
        Self {
            response: Ok(plan),
            calls: AtomicUsize::new(0),
            saw_guard: AtomicBool::new(false),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            ..Self::new(Value::Null)
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn saw_guard(&self) -> bool {
        self.saw_guard.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanCapture for StaticPlanCapture {
    async fn capture_plan(&self, _sql: &str) -> Result<Value, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.saw_guard.store(is_recording(), Ordering::SeqCst);
        self.response.clone().map_err(StorageError::plan_capture)
    }
}

/// An `EXPLAIN (FORMAT JSON)` document with a sequential scan three levels deep.
pub(crate) fn seq_scan_plan(execution_time_ms: f64) -> Value {
    json!([{
        "Plan": {
            "Node Type": "Aggregate",
            "Plans": [{
                "Node Type": "Hash Join",
                "Plans": [
                    {
                        "Node Type": "Hash",
                        "Plans": [{ "Node Type": "Seq Scan", "Relation Name": "orders" }]
                    }
                ]
            }]
        },
        "Planning Time": 0.4,
        "Execution Time": execution_time_ms
    }])
}

/// An `EXPLAIN (FORMAT JSON)` document using only an index.
pub(crate) fn index_plan(execution_time_ms: f64) -> Value {
    json!([{
        "Plan": {
            "Node Type": "Index Scan",
            "Relation Name": "orders",
            "Index Name": "orders_pkey"
        },
        "Planning Time": 0.1,
        "Execution Time": execution_time_ms
    }])
}

/// Records `count` executions of `sql` lasting `duration_ms` each.
pub(crate) async fn seed_executions(
    storage: &dyn ProfilerStorage,
    sql: &str,
    count: usize,
    duration_ms: f64,
) -> PatternId {
    let mut pattern_id = 0;
    for _ in 0..count {
        let execution = NewExecution::from_outcome(
            querylens_core::normalize_sql(sql),
            sql,
            chrono::Utc::now(),
            duration_ms,
            &StatementOutcome::Rows(1),
        );
        pattern_id = storage.record_execution(&execution).await.unwrap();
    }
    pattern_id
}
