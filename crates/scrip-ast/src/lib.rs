//! AST node definitions and source spans for Scrip.
//!
//! This crate defines the abstract syntax tree consumed by the type checker.
//! The tree is generic over its annotation `A`: the parser produces
//! `A = Span` nodes, and the checker replaces the annotation with a
//! qualified type plus the original span. Binders are explicitly typed, so
//! nodes embed the `scrip-types` type grammar directly.

use std::collections::BTreeSet;

use scrip_types::{IntWidth, PrimType, Type};

/// Identifies a source file in the checking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A byte offset range within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Create a span that covers both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(
            self.file, other.file,
            "cannot merge spans from different files"
        );
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// A synthetic span for host-injected nodes.
    pub fn synthetic() -> Self {
        Self {
            file: FileId(u32::MAX),
            start: 0,
            end: 0,
        }
    }
}

/// A value paired with its source location. Used for naming positions that
/// never carry a type (module, contract, and transition names).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// An identifier occurrence carrying its annotation.
///
/// In parser output the annotation is the occurrence's [`Span`]; the checker
/// rewrites it to a qualified type plus that span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident<A> {
    pub name: String,
    pub ann: A,
}

impl<A> Ident<A> {
    pub fn new(name: impl Into<String>, ann: A) -> Self {
        Self {
            name: name.into(),
            ann,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Literal values
// ---------------------------------------------------------------------------

/// A source literal. Integer digits are kept as written; the width tag alone
/// determines the literal's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    String(String),
    Int(IntWidth, String),
    Uint(IntWidth, String),
    BNum(String),
    /// Raw bytes; the byte count determines the `ByStrN` type.
    ByStr(Vec<u8>),
    /// The empty map at an explicit key/value type; the only way to
    /// initialize a map-typed field.
    Emp(Type, Type),
}

/// Map a syntactic literal to its type.
pub fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::String(_) => Type::Prim(PrimType::String),
        Literal::Int(width, _) => Type::Prim(PrimType::Int(*width)),
        Literal::Uint(width, _) => Type::Prim(PrimType::Uint(*width)),
        Literal::BNum(_) => Type::Prim(PrimType::BNum),
        Literal::ByStr(bytes) => Type::Prim(PrimType::ByStr(bytes.len())),
        Literal::Emp(key, value) => Type::map_of(key.clone(), value.clone()),
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// One payload position in a message expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload<A> {
    /// A literal tag string; always of type `String`.
    Tag(String),
    Literal(Literal),
    Var(Ident<A>),
}

/// One clause of a match expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchClause<A> {
    pub pattern: Pattern<A>,
    pub body: Expr<A>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr<A> {
    pub kind: ExprKind<A>,
    pub ann: A,
}

impl<A> Expr<A> {
    pub fn new(kind: ExprKind<A>, ann: A) -> Self {
        Self { kind, ann }
    }
}

/// Expression forms. The language is in administrative normal form:
/// application positions hold identifiers, not arbitrary expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind<A> {
    Literal(Literal),
    Var(Ident<A>),
    /// `let x [: t] = value in body`.
    Let {
        lhs: Ident<A>,
        annot: Option<Type>,
        value: Box<Expr<A>>,
        body: Box<Expr<A>>,
    },
    /// Message or event construction: named fields with payloads.
    Message(Vec<(String, MessagePayload<A>)>),
    /// `fun (x : t) => body`.
    Fun {
        param: Ident<A>,
        param_ty: Type,
        body: Box<Expr<A>>,
    },
    App {
        func: Ident<A>,
        args: Vec<Ident<A>>,
    },
    /// Saturated constructor application with explicit type arguments.
    Constr {
        name: String,
        type_args: Vec<Type>,
        args: Vec<Ident<A>>,
    },
    MatchExpr {
        scrutinee: Ident<A>,
        clauses: Vec<MatchClause<A>>,
    },
    Builtin {
        op: Ident<A>,
        args: Vec<Ident<A>>,
    },
    /// Type abstraction over one variable.
    TFun {
        tvar: Ident<A>,
        body: Box<Expr<A>>,
    },
    /// Type application of a polymorphic identifier.
    TApp {
        tfun: Ident<A>,
        type_args: Vec<Type>,
    },
    /// `fix (f : t) => body`; the body must produce `t`.
    Fixpoint {
        name: Ident<A>,
        ty: Type,
        body: Box<Expr<A>>,
    },
}

impl<A> Ident<A> {
    /// Rebuild the ident with a different annotation.
    pub fn map_ann<B>(&self, f: &impl Fn(&A) -> B) -> Ident<B> {
        Ident {
            name: self.name.clone(),
            ann: f(&self.ann),
        }
    }
}

impl<A> MessagePayload<A> {
    pub fn map_ann<B>(&self, f: &impl Fn(&A) -> B) -> MessagePayload<B> {
        match self {
            MessagePayload::Tag(tag) => MessagePayload::Tag(tag.clone()),
            MessagePayload::Literal(lit) => MessagePayload::Literal(lit.clone()),
            MessagePayload::Var(id) => MessagePayload::Var(id.map_ann(f)),
        }
    }
}

impl<A> Expr<A> {
    /// Rebuild the tree with a different annotation, e.g. strip checker
    /// decorations back to bare spans.
    pub fn map_ann<B>(&self, f: &impl Fn(&A) -> B) -> Expr<B> {
        let kind = match &self.kind {
            ExprKind::Literal(lit) => ExprKind::Literal(lit.clone()),
            ExprKind::Var(id) => ExprKind::Var(id.map_ann(f)),
            ExprKind::Let {
                lhs,
                annot,
                value,
                body,
            } => ExprKind::Let {
                lhs: lhs.map_ann(f),
                annot: annot.clone(),
                value: Box::new(value.map_ann(f)),
                body: Box::new(body.map_ann(f)),
            },
            ExprKind::Message(fields) => ExprKind::Message(
                fields
                    .iter()
                    .map(|(name, payload)| (name.clone(), payload.map_ann(f)))
                    .collect(),
            ),
            ExprKind::Fun {
                param,
                param_ty,
                body,
            } => ExprKind::Fun {
                param: param.map_ann(f),
                param_ty: param_ty.clone(),
                body: Box::new(body.map_ann(f)),
            },
            ExprKind::App { func, args } => ExprKind::App {
                func: func.map_ann(f),
                args: args.iter().map(|a| a.map_ann(f)).collect(),
            },
            ExprKind::Constr {
                name,
                type_args,
                args,
            } => ExprKind::Constr {
                name: name.clone(),
                type_args: type_args.clone(),
                args: args.iter().map(|a| a.map_ann(f)).collect(),
            },
            ExprKind::MatchExpr { scrutinee, clauses } => ExprKind::MatchExpr {
                scrutinee: scrutinee.map_ann(f),
                clauses: clauses
                    .iter()
                    .map(|clause| MatchClause {
                        pattern: clause.pattern.map_ann(f),
                        body: clause.body.map_ann(f),
                    })
                    .collect(),
            },
            ExprKind::Builtin { op, args } => ExprKind::Builtin {
                op: op.map_ann(f),
                args: args.iter().map(|a| a.map_ann(f)).collect(),
            },
            ExprKind::TFun { tvar, body } => ExprKind::TFun {
                tvar: tvar.map_ann(f),
                body: Box::new(body.map_ann(f)),
            },
            ExprKind::TApp { tfun, type_args } => ExprKind::TApp {
                tfun: tfun.map_ann(f),
                type_args: type_args.clone(),
            },
            ExprKind::Fixpoint { name, ty, body } => ExprKind::Fixpoint {
                name: name.map_ann(f),
                ty: ty.clone(),
                body: Box::new(body.map_ann(f)),
            },
        };
        Expr {
            kind,
            ann: f(&self.ann),
        }
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern<A> {
    Wildcard,
    Binder(Ident<A>),
    Constructor {
        name: String,
        args: Vec<Pattern<A>>,
    },
}

impl<A> Pattern<A> {
    pub fn map_ann<B>(&self, f: &impl Fn(&A) -> B) -> Pattern<B> {
        match self {
            Pattern::Wildcard => Pattern::Wildcard,
            Pattern::Binder(id) => Pattern::Binder(id.map_ann(f)),
            Pattern::Constructor { name, args } => Pattern::Constructor {
                name: name.clone(),
                args: args.iter().map(|arg| arg.map_ann(f)).collect(),
            },
        }
    }

    /// Binder names introduced by this pattern, in document order.
    pub fn binder_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        fn go<'p, A>(pat: &'p Pattern<A>, out: &mut Vec<&'p str>) {
            match pat {
                Pattern::Wildcard => {}
                Pattern::Binder(id) => out.push(id.as_str()),
                Pattern::Constructor { args, .. } => {
                    for arg in args {
                        go(arg, out);
                    }
                }
            }
        }
        go(self, &mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// One clause of a statement-level match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StmtMatchClause<A> {
    pub pattern: Pattern<A>,
    pub body: Vec<Stmt<A>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt<A> {
    pub kind: StmtKind<A>,
    pub ann: A,
}

impl<A> Stmt<A> {
    pub fn new(kind: StmtKind<A>, ann: A) -> Self {
        Self { kind, ann }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind<A> {
    /// `x <- f`: read a contract field into a local.
    Load { lhs: Ident<A>, field: Ident<A> },
    /// `f := r`: write a local into a contract field.
    Store { field: Ident<A>, rhs: Ident<A> },
    /// `x = e`: bind a pure expression.
    Bind { lhs: Ident<A>, rhs: Box<Expr<A>> },
    /// `m[k1]...[kn] := v` or delete when `value` is `None`.
    MapUpdate {
        map: Ident<A>,
        keys: Vec<Ident<A>>,
        value: Option<Ident<A>>,
    },
    /// `x <- m[k1]...[kn]`; `fetch` selects value lookup over existence.
    MapGet {
        lhs: Ident<A>,
        map: Ident<A>,
        keys: Vec<Ident<A>>,
        fetch: bool,
    },
    /// `x <- & BLOCKNUMBER`: read a blockchain value.
    ReadFromBC { lhs: Ident<A>, field: String },
    MatchStmt {
        scrutinee: Ident<A>,
        clauses: Vec<StmtMatchClause<A>>,
    },
    AcceptPayment,
    /// Argument must be `List Message`.
    SendMsgs(Ident<A>),
    /// Argument must be `Event`.
    CreateEvnt(Ident<A>),
    Throw(Ident<A>),
}

// ---------------------------------------------------------------------------
// Libraries, contracts, modules
// ---------------------------------------------------------------------------

/// A constructor definition inside a library type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtrDef {
    pub name: Spanned<String>,
    pub arg_types: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibEntry<A> {
    /// `let name = init`.
    Var { name: Ident<A>, init: Expr<A> },
    /// `type name = | C1 of t ... | Cn of t ...`.
    Typ {
        name: Spanned<String>,
        ctrs: Vec<CtrDef>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library<A> {
    pub name: Spanned<String>,
    pub entries: Vec<LibEntry<A>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field<A> {
    pub name: Ident<A>,
    pub ty: Type,
    pub init: Expr<A>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<A> {
    pub name: Spanned<String>,
    pub params: Vec<(Ident<A>, Type)>,
    pub body: Vec<Stmt<A>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract<A> {
    pub name: Spanned<String>,
    pub params: Vec<(Ident<A>, Type)>,
    pub fields: Vec<Field<A>>,
    pub transitions: Vec<Transition<A>>,
}

/// A whole contract module: the optional own library plus the contract.
/// External libraries and recursion primitives are supplied alongside the
/// module by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractModule<A> {
    pub name: Spanned<String>,
    pub library: Option<Library<A>>,
    pub contract: Contract<A>,
}

// ---------------------------------------------------------------------------
// Free variables
// ---------------------------------------------------------------------------

/// The free value variables of an expression.
///
/// Used by the library checker to skip entries that depend on definitions
/// whose typing already failed.
pub fn free_vars<A>(expr: &Expr<A>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_free(expr, &mut Vec::new(), &mut out);
    out
}

fn collect_free<A>(expr: &Expr<A>, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
    fn visit(name: &str, bound: &[String], out: &mut BTreeSet<String>) {
        if !bound.iter().any(|b| b == name) {
            out.insert(name.to_string());
        }
    }
    match &expr.kind {
        ExprKind::Literal(_) => {}
        ExprKind::Var(id) => visit(id.as_str(), bound, out),
        ExprKind::Let {
            lhs, value, body, ..
        } => {
            collect_free(value, bound, out);
            bound.push(lhs.name.clone());
            collect_free(body, bound, out);
            bound.pop();
        }
        ExprKind::Message(fields) => {
            for (_, payload) in fields {
                if let MessagePayload::Var(id) = payload {
                    visit(id.as_str(), bound, out);
                }
            }
        }
        ExprKind::Fun { param, body, .. } => {
            bound.push(param.name.clone());
            collect_free(body, bound, out);
            bound.pop();
        }
        ExprKind::App { func, args } => {
            visit(func.as_str(), bound, out);
            for arg in args {
                visit(arg.as_str(), bound, out);
            }
        }
        ExprKind::Constr { args, .. } => {
            for arg in args {
                visit(arg.as_str(), bound, out);
            }
        }
        ExprKind::MatchExpr { scrutinee, clauses } => {
            visit(scrutinee.as_str(), bound, out);
            for clause in clauses {
                let binders = clause.pattern.binder_names();
                let depth = bound.len();
                bound.extend(binders.iter().map(|b| b.to_string()));
                collect_free(&clause.body, bound, out);
                bound.truncate(depth);
            }
        }
        ExprKind::Builtin { args, .. } => {
            for arg in args {
                visit(arg.as_str(), bound, out);
            }
        }
        ExprKind::TFun { body, .. } => collect_free(body, bound, out),
        ExprKind::TApp { tfun, .. } => visit(tfun.as_str(), bound, out),
        ExprKind::Fixpoint { name, body, .. } => {
            bound.push(name.name.clone());
            collect_free(body, bound, out);
            bound.pop();
        }
    }
}
