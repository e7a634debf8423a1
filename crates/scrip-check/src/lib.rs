//! The Scrip contract type checker.
//!
//! This crate implements:
//! - Expression typing over the explicitly-annotated contract language,
//!   including ADT constructor elaboration and explicit type
//!   abstraction/application
//! - Statement typing against a dual environment of pure locals and
//!   mutable contract fields
//! - Whole-module orchestration: recursion primitives, libraries, contract
//!   parameters, fields, and transitions, with error accumulation
//!
//! Checking either decorates every expression, ident, pattern, and
//! statement node with its qualified type, or produces located
//! diagnostics. A failure inside one library entry or transition does not
//! halt the module check: users see all errors at once.

pub mod patterns;
pub mod trace;
pub mod typeck;

use std::collections::{BTreeMap, BTreeSet};

use scrip_ast::{Ident, Span};
use scrip_types::{AdtRegistry, BuiltinDictionary, IntWidth, PrimType, QualifiedType, Type};

use crate::trace::{CheckRule, CheckStep};

// Re-export for convenience.
pub use scrip_diag::{Category, Diagnostic, DiagnosticError, SourceLocation};
pub use scrip_types::TypeQual;

/// Convert an AST span into a diagnostic location.
pub fn span_to_loc(span: Span) -> SourceLocation {
    SourceLocation {
        file_id: span.file.0,
        start: span.start,
        end: span.end,
    }
}

// ---------------------------------------------------------------------------
// Typed annotations
// ---------------------------------------------------------------------------

/// The annotation the checker attaches to every node it decorates: the
/// inferred qualified type plus the node's original source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnn {
    pub qty: QualifiedType,
    pub span: Span,
}

pub type TypedExpr = scrip_ast::Expr<TypeAnn>;
pub type TypedStmt = scrip_ast::Stmt<TypeAnn>;
pub type TypedPattern = scrip_ast::Pattern<TypeAnn>;
pub type TypedIdent = scrip_ast::Ident<TypeAnn>;
pub type TypedLibrary = scrip_ast::Library<TypeAnn>;
pub type TypedModule = scrip_ast::ContractModule<TypeAnn>;

/// Decorate an identifier occurrence with the type the environment assigned
/// at that site.
///
/// Every annotated ident in the typed AST is built through this helper, so
/// ident decoration cannot drift between call sites.
pub fn add_type_to_ident(ident: &Ident<Span>, qty: QualifiedType) -> TypedIdent {
    Ident::new(
        ident.name.clone(),
        TypeAnn {
            qty,
            span: ident.ann,
        },
    )
}

// ---------------------------------------------------------------------------
// Type environment
// ---------------------------------------------------------------------------

/// A mapping from identifier names to qualified types plus the set of
/// in-scope type variables.
///
/// Scope entry clones the environment, so sibling scopes never observe each
/// other's additions. `BTreeMap` keeps iteration deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeEnv {
    bindings: BTreeMap<String, QualifiedType>,
    tvars: BTreeSet<String>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name, shadowing any prior binding.
    pub fn bind(&mut self, name: impl Into<String>, qty: QualifiedType) {
        self.bindings.insert(name.into(), qty);
    }

    /// Bind a sequence of names left to right.
    pub fn bind_all<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, QualifiedType)>,
    {
        for (name, qty) in pairs {
            self.bind(name, qty);
        }
    }

    /// Bring a type variable into scope.
    pub fn add_tvar(&mut self, name: impl Into<String>) {
        self.tvars.insert(name.into());
    }

    pub fn tvar_in_scope(&self, name: &str) -> bool {
        self.tvars.contains(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&QualifiedType> {
        self.bindings.get(name)
    }

    /// Resolve an identifier occurrence or fail with an `Unbound`
    /// diagnostic at that occurrence.
    pub fn resolve(&self, ident: &Ident<Span>) -> Result<QualifiedType, Diagnostic> {
        self.lookup(ident.as_str()).cloned().ok_or_else(|| {
            Diagnostic::error(
                Category::Unbound,
                format!("unbound variable `{}`", ident.name),
            )
            .at(span_to_loc(ident.ann))
        })
    }

    /// Names bound in this environment, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Ensure every free type variable of `ty` is in scope and every named
    /// ADT resolves at its declared arity; map keys must be primitive.
    pub fn is_wf_type(
        &self,
        adts: &AdtRegistry,
        ty: &Type,
        loc: SourceLocation,
    ) -> Result<(), Diagnostic> {
        fn go(
            env: &TypeEnv,
            adts: &AdtRegistry,
            ty: &Type,
            bound: &mut Vec<String>,
            loc: SourceLocation,
        ) -> Result<(), Diagnostic> {
            match ty {
                Type::Prim(_) => Ok(()),
                Type::Map(key, value) => {
                    if !key.is_prim() {
                        return Err(Diagnostic::error(
                            Category::NotWellFormed,
                            format!("map key type must be primitive, got {key}"),
                        )
                        .at(loc));
                    }
                    go(env, adts, key, bound, loc)?;
                    go(env, adts, value, bound, loc)
                }
                Type::Fun(dom, cod) => {
                    go(env, adts, dom, bound, loc)?;
                    go(env, adts, cod, bound, loc)
                }
                Type::Adt(name, args) => {
                    let info = adts.lookup_adt(name).ok_or_else(|| {
                        Diagnostic::error(
                            Category::NotWellFormed,
                            format!("unknown type `{name}`"),
                        )
                        .at(loc)
                    })?;
                    if info.tparams.len() != args.len() {
                        return Err(Diagnostic::error(
                            Category::NotWellFormed,
                            format!(
                                "type `{name}` expects {} argument(s), got {}",
                                info.tparams.len(),
                                args.len()
                            ),
                        )
                        .at(loc));
                    }
                    for arg in args {
                        go(env, adts, arg, bound, loc)?;
                    }
                    Ok(())
                }
                Type::TypeVar(name) => {
                    if bound.iter().any(|b| b == name) || env.tvar_in_scope(name) {
                        Ok(())
                    } else {
                        Err(Diagnostic::error(
                            Category::NotWellFormed,
                            format!("unbound type variable `{name}`"),
                        )
                        .at(loc))
                    }
                }
                Type::PolyFun(tvar, body) => {
                    bound.push(tvar.clone());
                    let result = go(env, adts, body, bound, loc);
                    bound.pop();
                    result
                }
            }
        }
        go(self, adts, ty, &mut Vec::new(), loc)
    }
}

/// The dual statement environment: pure locals and transition parameters on
/// one side, mutable contract field declarations on the other. Only
/// `fields` is the subject of loads, stores, and map operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DualEnv {
    pub pure: TypeEnv,
    pub fields: TypeEnv,
}

// ---------------------------------------------------------------------------
// Host policy
// ---------------------------------------------------------------------------

/// Which kind of outgoing payload a message expression constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Message,
    Event,
}

impl PayloadKind {
    pub fn prim(self) -> PrimType {
        match self {
            PayloadKind::Message => PrimType::Message,
            PayloadKind::Event => PrimType::Event,
        }
    }
}

/// Host-injected contract policy: mandatory message and event headers,
/// blockchain read fields, read-only state fields, and the implicit
/// parameters bound in every contract and transition.
///
/// The checker consults this table and never hard-codes its contents;
/// `Default` carries the standard host policy.
#[derive(Debug, Clone)]
pub struct ContractHost {
    /// The header field whose presence marks a payload as a message.
    pub tag_field: String,
    /// The header field whose presence marks a payload as an event.
    pub eventname_field: String,
    /// Headers required on every message, with their required types.
    pub message_headers: BTreeMap<String, Type>,
    /// Headers required on every event, with their required types.
    pub event_headers: BTreeMap<String, Type>,
    /// Read-only blockchain values, e.g. `BLOCKNUMBER`.
    pub bc_reads: BTreeMap<String, Type>,
    /// Contract fields that reject stores.
    pub no_store_fields: BTreeSet<String>,
    /// Identifiers bound in every contract, e.g. `_this_address`.
    pub contract_params: Vec<(String, Type)>,
    /// Identifiers bound in every transition, e.g. `_sender`.
    pub transition_params: Vec<(String, Type)>,
    /// The implicit balance field and its type.
    pub balance_field: (String, Type),
}

impl Default for ContractHost {
    fn default() -> Self {
        let tag_field = "_tag".to_string();
        let eventname_field = "_eventname".to_string();
        let message_headers = BTreeMap::from([
            (tag_field.clone(), Type::string()),
            ("_recipient".to_string(), Type::address()),
            ("_amount".to_string(), Type::uint(IntWidth::W128)),
        ]);
        let event_headers = BTreeMap::from([(eventname_field.clone(), Type::string())]);
        Self {
            tag_field,
            eventname_field,
            message_headers,
            event_headers,
            bc_reads: BTreeMap::from([("BLOCKNUMBER".to_string(), Type::bnum())]),
            no_store_fields: BTreeSet::from(["_balance".to_string()]),
            contract_params: vec![
                ("_this_address".to_string(), Type::address()),
                ("_creation_block".to_string(), Type::bnum()),
            ],
            transition_params: vec![
                ("_sender".to_string(), Type::address()),
                ("_amount".to_string(), Type::uint(IntWidth::W128)),
            ],
            balance_field: ("_balance".to_string(), Type::uint(IntWidth::W128)),
        }
    }
}

impl ContractHost {
    /// Decide whether a payload with the given field names is a message or
    /// an event, and check that its mandatory headers are all present.
    pub fn classify_payload(
        &self,
        field_names: &[&str],
    ) -> Result<(PayloadKind, &BTreeMap<String, Type>), Diagnostic> {
        let has_tag = field_names.iter().any(|n| *n == self.tag_field);
        let has_event = field_names.iter().any(|n| *n == self.eventname_field);
        let (kind, headers) = match (has_tag, has_event) {
            (true, true) => {
                return Err(Diagnostic::error(
                    Category::BadMessageField,
                    format!(
                        "a payload cannot carry both `{}` and `{}`",
                        self.tag_field, self.eventname_field
                    ),
                ));
            }
            (false, false) => {
                return Err(Diagnostic::error(
                    Category::BadMessageField,
                    format!(
                        "a payload must carry `{}` or `{}`",
                        self.tag_field, self.eventname_field
                    ),
                ));
            }
            (true, false) => (PayloadKind::Message, &self.message_headers),
            (false, true) => (PayloadKind::Event, &self.event_headers),
        };
        for header in headers.keys() {
            if !field_names.iter().any(|n| *n == header.as_str()) {
                return Err(Diagnostic::error(
                    Category::BadMessageField,
                    format!("payload is missing mandatory field `{header}`"),
                ));
            }
        }
        Ok((kind, headers))
    }
}

// ---------------------------------------------------------------------------
// Check context
// ---------------------------------------------------------------------------

/// Everything the checker needs besides the environment: the ambient ADT
/// registry, the builtin-operator dictionary, the host policy, and the
/// opt-in trace buffer.
pub struct CheckContext<'a> {
    pub adts: &'a AdtRegistry,
    pub builtins: &'a BuiltinDictionary,
    pub host: &'a ContractHost,
    trace: Option<Vec<CheckStep>>,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        adts: &'a AdtRegistry,
        builtins: &'a BuiltinDictionary,
        host: &'a ContractHost,
    ) -> Self {
        Self {
            adts,
            builtins,
            host,
            trace: None,
        }
    }

    /// Start recording per-node checking steps. Zero overhead when not
    /// enabled.
    pub fn enable_tracing(&mut self) {
        self.trace = Some(Vec::new());
    }

    /// Drain the recorded trace; tracing stays enabled.
    pub fn take_trace(&mut self) -> Vec<CheckStep> {
        match &mut self.trace {
            Some(steps) => std::mem::take(steps),
            None => Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, rule: CheckRule, detail: &str, ty: &Type, span: Span) {
        if let Some(steps) = &mut self.trace {
            let step = steps.len();
            steps.push(CheckStep {
                step,
                rule,
                detail: detail.to_string(),
                ty: ty.to_string(),
                span: Some((span.start, span.end)),
            });
        }
    }
}

#[cfg(test)]
mod typeck_tests;
