//! Execution-plan tree and scan-type detection.
//!
//! The tree mirrors PostgreSQL's `EXPLAIN (FORMAT JSON)` document. Fields the
//! analysis reads are typed; everything else the engine reports is kept in
//! `extra` so a stored plan re-serializes to the same document.
//!
//! ## Example
//!
//! ```
//! use querylens_core::plan::{ExplainPlan, ScanSignals};
//!
//! let doc = serde_json::json!([{
//!     "Plan": { "Node Type": "Seq Scan", "Relation Name": "orders" },
//!     "Planning Time": 0.4,
//!     "Execution Time": 2450.75
//! }]);
//!
//! let plan = ExplainPlan::from_json(&doc).unwrap();
//! let signals = ScanSignals::detect(&plan.plan);
//! assert!(signals.seq_scan);
//! assert!(!signals.index_scan);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Node-type fragment identifying a sequential scan.
pub const SEQ_SCAN: &str = "Seq Scan";

/// Node-type fragment identifying an index scan.
///
/// Matching is by containment, so `Bitmap Index Scan` and `Index Only Scan`
/// count as index scans too.
pub const INDEX_SCAN: &str = "Index Scan";

/// A single node of an execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    #[serde(rename = "Node Type")]
    pub node_type: String,

    #[serde(rename = "Relation Name", default, skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,

    #[serde(rename = "Index Name", default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    #[serde(rename = "Startup Cost", default, skip_serializing_if = "Option::is_none")]
    pub startup_cost: Option<f64>,

    #[serde(rename = "Total Cost", default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,

    #[serde(rename = "Plan Rows", default, skip_serializing_if = "Option::is_none")]
    pub plan_rows: Option<f64>,

    #[serde(rename = "Actual Rows", default, skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,

    #[serde(rename = "Actual Total Time", default, skip_serializing_if = "Option::is_none")]
    pub actual_total_time: Option<f64>,

    /// Child nodes.
    #[serde(rename = "Plans", default, skip_serializing_if = "Vec::is_empty")]
    pub plans: Vec<PlanNode>,

    /// Remaining engine-specific fields (buffers, filters, loops, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlanNode {
    /// Creates a leaf node with the given type.
    #[must_use]
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            relation_name: None,
            index_name: None,
            startup_cost: None,
            total_cost: None,
            plan_rows: None,
            actual_rows: None,
            actual_total_time: None,
            plans: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Sets the relation this node reads.
    #[must_use]
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation_name = Some(relation.into());
        self
    }

    /// Appends a child node.
    #[must_use]
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.plans.push(child);
        self
    }

    /// Depth-first, pre-order iterator over this node and all descendants.
    pub fn iter(&self) -> PlanNodes<'_> {
        PlanNodes { stack: vec![self] }
    }

    /// Returns `true` if any node's type contains `fragment`.
    ///
    /// Stops at the first match; visits every node otherwise.
    #[must_use]
    pub fn contains_node_type(&self, fragment: &str) -> bool {
        self.iter().any(|node| node.node_type.contains(fragment))
    }

    /// Relation names read by sequential scans anywhere in the tree.
    #[must_use]
    pub fn seq_scan_relations(&self) -> Vec<&str> {
        self.iter()
            .filter(|node| node.node_type.contains(SEQ_SCAN))
            .filter_map(|node| node.relation_name.as_deref())
            .collect()
    }

    /// Total number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }
}

/// Iterator returned by [`PlanNode::iter`].
#[derive(Debug)]
pub struct PlanNodes<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> Iterator for PlanNodes<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reversed so the first child is visited first.
        self.stack.extend(node.plans.iter().rev());
        Some(node)
    }
}

/// One `EXPLAIN` document: the root node and its summary timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainPlan {
    #[serde(rename = "Plan")]
    pub plan: PlanNode,

    #[serde(rename = "Planning Time", default, skip_serializing_if = "Option::is_none")]
    pub planning_time_ms: Option<f64>,

    #[serde(rename = "Execution Time", default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,

    /// Top-level fields other than the plan and timings (triggers, JIT, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExplainPlan {
    /// Wraps a root node without summary timings.
    #[must_use]
    pub fn new(plan: PlanNode) -> Self {
        Self {
            plan,
            planning_time_ms: None,
            execution_time_ms: None,
            extra: Map::new(),
        }
    }

    /// Parses an `EXPLAIN (FORMAT JSON)` result.
    ///
    /// PostgreSQL returns a one-element array; a bare object is accepted too,
    /// which is the shape [`ExplainPlan::to_json`] produces.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPlan`] if the document is empty, is not an
    /// object, or has no root `Plan` node with a `Node Type`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let document = match value {
            Value::Array(items) => items
                .first()
                .ok_or_else(|| CoreError::invalid_plan("Empty plan array"))?,
            Value::Object(_) => value,
            other => {
                return Err(CoreError::invalid_plan(format!(
                    "Expected array or object, got {}",
                    json_type_name(other)
                )));
            }
        };

        serde_json::from_value(document.clone()).map_err(|e| CoreError::invalid_plan(e.to_string()))
    }

    /// Serializes the plan back to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Scan signals for this plan's tree.
    #[must_use]
    pub fn scan_signals(&self) -> ScanSignals {
        ScanSignals::detect(&self.plan)
    }
}

/// Scan-type flags derived from a plan tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanSignals {
    pub seq_scan: bool,
    pub index_scan: bool,
}

impl ScanSignals {
    /// Searches the tree for sequential and index scans.
    #[must_use]
    pub fn detect(root: &PlanNode) -> Self {
        Self {
            seq_scan: root.contains_node_type(SEQ_SCAN),
            index_scan: root.contains_node_type(INDEX_SCAN),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
