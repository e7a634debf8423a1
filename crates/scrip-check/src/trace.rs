//! Tracing types for checker observability.
//!
//! These types capture a step-by-step record of which typing rule fired on
//! which node, enabling tooling to expose the checker's reasoning. All
//! tracing is opt-in via `CheckContext::enable_tracing()` — zero overhead
//! when disabled.

use serde::Serialize;

/// A single step in a checking trace.
#[derive(Debug, Clone, Serialize)]
pub struct CheckStep {
    pub step: usize,
    pub rule: CheckRule,
    /// Short descriptor of the node: a variable name, constructor name,
    /// operator, or the form's keyword.
    pub detail: String,
    /// Display form of the computed type.
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<(u32, u32)>,
}

/// Which typing rule fired.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRule {
    Literal,
    Var,
    Fun,
    App,
    Builtin,
    Let,
    Constr,
    MatchExpr,
    Fixpoint,
    TFun,
    TApp,
    Message,
    Load,
    Store,
    Bind,
    MapUpdate,
    MapGet,
    ReadFromBC,
    MatchStmt,
    SendMsgs,
    CreateEvnt,
}
