//! Expression, statement, and module typing.
//!
//! This module walks the untyped AST and produces decorated nodes whose
//! annotations carry the inferred qualified type. Expression checking
//! short-circuits on the first failure; the module driver accumulates
//! failures across library entries, field initializers, and transitions so
//! users see all errors at once.

use std::collections::BTreeSet;

use scrip_ast::{
    free_vars, literal_type, Contract, ContractModule, Expr, ExprKind, Field, Ident, LibEntry,
    Library, MatchClause, MessagePayload, Span, Stmt, StmtKind, StmtMatchClause, Transition,
};
use scrip_diag::{sort_into_source_order, Category, Diagnostic, DiagnosticError, SourceLocation};
use scrip_types::{
    elab_constr_type, elab_tfun_with_args, fun_type_applies, serializable_violation,
    storable_violation, type_equiv, ApplyError, ElabError, QualifiedType, Type,
};

use crate::patterns::assign_types_for_pattern;
use crate::trace::CheckRule;
use crate::{
    add_type_to_ident, span_to_loc, CheckContext, DualEnv, TypeAnn, TypeEnv, TypedExpr,
    TypedIdent, TypedLibrary, TypedModule, TypedStmt,
};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn expect_equiv(expected: &Type, got: &Type, loc: SourceLocation) -> Result<(), Diagnostic> {
    if type_equiv(expected, got) {
        Ok(())
    } else {
        Err(Diagnostic::error(
            Category::TypeMismatch,
            format!("expected {expected}, got {got}"),
        )
        .at(loc))
    }
}

fn apply_error_to_diag(err: ApplyError, what: &str, loc: SourceLocation) -> Diagnostic {
    match err {
        ApplyError::Arity { expected, got } => Diagnostic::error(
            Category::Arity,
            format!("{what} expects {expected} argument(s), got {got}"),
        )
        .at(loc),
        ApplyError::Mismatch { expected, got } => Diagnostic::error(
            Category::TypeMismatch,
            format!("expected {expected}, got {got}"),
        )
        .at(loc),
    }
}

/// Attach the enclosing expression's location to a leaf failure, and mark
/// the failure as arising while typechecking that expression when the leaf
/// was located deeper inside.
fn wrap_typechecking(diag: Diagnostic, loc: SourceLocation) -> Diagnostic {
    let diag = diag.at_outer(loc);
    if diag.labels.is_empty() && diag.location != Some(loc) {
        diag.with_label(loc, "while typechecking this expression")
    } else {
        diag
    }
}

fn signature_text(arg_tys: &[Type]) -> String {
    arg_tys
        .iter()
        .map(|ty| ty.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Type one expression under the given environment.
///
/// Returns the decorated node; the annotation's qualified type is the
/// expression's type. The first failure is reported at the failing
/// subexpression and wrapped with the enclosing expression's location.
pub fn check_expr(
    expr: &Expr<Span>,
    env: &TypeEnv,
    ctx: &mut CheckContext,
) -> Result<TypedExpr, Diagnostic> {
    let loc = span_to_loc(expr.ann);
    let (kind, qty) =
        check_expr_kind(expr, env, ctx).map_err(|diag| wrap_typechecking(diag, loc))?;
    let (rule, detail) = expr_rule(&kind);
    ctx.record(rule, detail, &qty.ty, expr.ann);
    Ok(Expr::new(
        kind,
        TypeAnn {
            qty,
            span: expr.ann,
        },
    ))
}

fn expr_rule(kind: &ExprKind<TypeAnn>) -> (CheckRule, &str) {
    match kind {
        ExprKind::Literal(_) => (CheckRule::Literal, "literal"),
        ExprKind::Var(id) => (CheckRule::Var, id.as_str()),
        ExprKind::Let { .. } => (CheckRule::Let, "let"),
        ExprKind::Message(_) => (CheckRule::Message, "message"),
        ExprKind::Fun { .. } => (CheckRule::Fun, "fun"),
        ExprKind::App { func, .. } => (CheckRule::App, func.as_str()),
        ExprKind::Constr { name, .. } => (CheckRule::Constr, name),
        ExprKind::MatchExpr { .. } => (CheckRule::MatchExpr, "match"),
        ExprKind::Builtin { op, .. } => (CheckRule::Builtin, op.as_str()),
        ExprKind::TFun { .. } => (CheckRule::TFun, "tfun"),
        ExprKind::TApp { tfun, .. } => (CheckRule::TApp, tfun.as_str()),
        ExprKind::Fixpoint { .. } => (CheckRule::Fixpoint, "fix"),
    }
}

fn check_expr_kind(
    expr: &Expr<Span>,
    env: &TypeEnv,
    ctx: &mut CheckContext,
) -> Result<(ExprKind<TypeAnn>, QualifiedType), Diagnostic> {
    let loc = span_to_loc(expr.ann);
    match &expr.kind {
        // -- Literal --
        ExprKind::Literal(lit) => {
            let ty = literal_type(lit);
            // An empty-map literal names its types explicitly; hold it to
            // the same well-formedness bar as a written type.
            if matches!(lit, scrip_ast::Literal::Emp(_, _)) {
                env.is_wf_type(ctx.adts, &ty, loc)?;
            }
            Ok((ExprKind::Literal(lit.clone()), QualifiedType::plain(ty)))
        }

        // -- Variable reference --
        ExprKind::Var(id) => {
            let qty = env.resolve(id)?;
            Ok((ExprKind::Var(add_type_to_ident(id, qty.clone())), qty))
        }

        // -- Function abstraction --
        ExprKind::Fun {
            param,
            param_ty,
            body,
        } => {
            env.is_wf_type(ctx.adts, param_ty, span_to_loc(param.ann))?;
            let param_qty = QualifiedType::plain(param_ty.clone());
            let mut inner = env.clone();
            inner.bind(param.name.clone(), param_qty.clone());
            let typed_body = check_expr(body, &inner, ctx)?;
            let fun_ty = Type::fun(param_ty.clone(), typed_body.ann.qty.ty.clone());
            Ok((
                ExprKind::Fun {
                    param: add_type_to_ident(param, param_qty),
                    param_ty: param_ty.clone(),
                    body: Box::new(typed_body),
                },
                QualifiedType::plain(fun_ty),
            ))
        }

        // -- Application --
        ExprKind::App { func, args } => {
            let func_qty = env.resolve(func)?;
            let mut typed_args = Vec::with_capacity(args.len());
            let mut arg_tys = Vec::with_capacity(args.len());
            for arg in args {
                let arg_qty = env.resolve(arg)?;
                arg_tys.push(arg_qty.ty.clone());
                typed_args.push(add_type_to_ident(arg, arg_qty));
            }
            let ret = fun_type_applies(&func_qty.ty, &arg_tys).map_err(|err| {
                apply_error_to_diag(err, &format!("`{}`", func.name), loc)
            })?;
            Ok((
                ExprKind::App {
                    func: add_type_to_ident(func, func_qty),
                    args: typed_args,
                },
                QualifiedType::plain(ret),
            ))
        }

        // -- Builtin operator --
        ExprKind::Builtin { op, args } => {
            let mut typed_args = Vec::with_capacity(args.len());
            let mut arg_tys = Vec::with_capacity(args.len());
            for arg in args {
                let arg_qty = env.resolve(arg)?;
                arg_tys.push(arg_qty.ty.clone());
                typed_args.push(add_type_to_ident(arg, arg_qty));
            }
            let (params, ret) = ctx.builtins.resolve(op.as_str(), &arg_tys).ok_or_else(|| {
                Diagnostic::error(
                    Category::UnknownBuiltin,
                    format!(
                        "no builtin `{}` for signature ({})",
                        op.name,
                        signature_text(&arg_tys)
                    ),
                )
                .at(span_to_loc(op.ann))
            })?;
            debug_assert_eq!(params.len(), args.len(), "builtin signature arity");
            // The operator ident is annotated with the operation's result.
            Ok((
                ExprKind::Builtin {
                    op: add_type_to_ident(op, QualifiedType::plain(ret.clone())),
                    args: typed_args,
                },
                QualifiedType::plain(ret),
            ))
        }

        // -- Let binding --
        ExprKind::Let {
            lhs,
            annot,
            value,
            body,
        } => {
            let typed_value = check_expr(value, env, ctx)?;
            let value_qty = typed_value.ann.qty.clone();
            if let Some(declared) = annot {
                env.is_wf_type(ctx.adts, declared, span_to_loc(lhs.ann))?;
                expect_equiv(declared, &value_qty.ty, span_to_loc(value.ann))?;
            }
            let mut inner = env.clone();
            inner.bind(lhs.name.clone(), value_qty.clone());
            let typed_body = check_expr(body, &inner, ctx)?;
            let result_qty = typed_body.ann.qty.clone();
            Ok((
                ExprKind::Let {
                    lhs: add_type_to_ident(lhs, value_qty),
                    annot: annot.clone(),
                    value: Box::new(typed_value),
                    body: Box::new(typed_body),
                },
                result_qty,
            ))
        }

        // -- Constructor application --
        ExprKind::Constr {
            name,
            type_args,
            args,
        } => {
            for targ in type_args {
                env.is_wf_type(ctx.adts, targ, loc)?;
            }
            let (_, ctr) = ctx.adts.lookup_constructor(name).ok_or_else(|| {
                Diagnostic::error(
                    Category::Unbound,
                    format!("unknown constructor `{name}`"),
                )
                .at(loc)
            })?;
            if ctr.arity != args.len() {
                return Err(Diagnostic::error(
                    Category::Arity,
                    format!(
                        "constructor `{name}` takes {} argument(s), got {}",
                        ctr.arity,
                        args.len()
                    ),
                )
                .at(loc));
            }
            let ctr_fty = elab_constr_type(ctx.adts, name, type_args).map_err(|err| match err {
                ElabError::Arity { expected, got } => Diagnostic::error(
                    Category::Arity,
                    format!("constructor `{name}` expects {expected} type argument(s), got {got}"),
                )
                .at(loc),
                ElabError::UnknownConstructor(_) => {
                    unreachable!("constructor resolved above")
                }
                ElabError::NotAnAdt(_) | ElabError::ConstructorMismatch { .. } => {
                    unreachable!("elaboration does not inspect a scrutinee")
                }
            })?;
            let mut typed_args = Vec::with_capacity(args.len());
            let mut arg_tys = Vec::with_capacity(args.len());
            for arg in args {
                let arg_qty = env.resolve(arg)?;
                arg_tys.push(arg_qty.ty.clone());
                typed_args.push(add_type_to_ident(arg, arg_qty));
            }
            let ret = fun_type_applies(&ctr_fty, &arg_tys)
                .map_err(|err| apply_error_to_diag(err, &format!("constructor `{name}`"), loc))?;
            Ok((
                ExprKind::Constr {
                    name: name.clone(),
                    type_args: type_args.clone(),
                    args: typed_args,
                },
                QualifiedType::plain(ret),
            ))
        }

        // -- Match expression --
        ExprKind::MatchExpr { scrutinee, clauses } => {
            if clauses.is_empty() {
                return Err(Diagnostic::error(
                    Category::EmptyMatch,
                    "match expression has no clauses",
                )
                .at(loc));
            }
            let scrutinee_qty = env.resolve(scrutinee)?;
            let mut typed_clauses = Vec::with_capacity(clauses.len());
            let mut result_qty: Option<QualifiedType> = None;
            for clause in clauses {
                let (typed_pat, bindings) =
                    assign_types_for_pattern(ctx.adts, &scrutinee_qty.ty, &clause.pattern, loc)?;
                let mut inner = env.clone();
                inner.bind_all(
                    bindings
                        .into_iter()
                        .map(|(ident, qty)| (ident.name, qty)),
                );
                let typed_body = check_expr(&clause.body, &inner, ctx)?;
                match &result_qty {
                    None => result_qty = Some(typed_body.ann.qty.clone()),
                    Some(first) => {
                        expect_equiv(
                            &first.ty,
                            &typed_body.ann.qty.ty,
                            span_to_loc(clause.body.ann),
                        )?;
                    }
                }
                typed_clauses.push(MatchClause {
                    pattern: typed_pat,
                    body: typed_body,
                });
            }
            let result_qty = result_qty.expect("match has at least one clause");
            Ok((
                ExprKind::MatchExpr {
                    scrutinee: add_type_to_ident(scrutinee, scrutinee_qty),
                    clauses: typed_clauses,
                },
                result_qty,
            ))
        }

        // -- Fixpoint --
        ExprKind::Fixpoint { name, ty, body } => {
            env.is_wf_type(ctx.adts, ty, span_to_loc(name.ann))?;
            let fix_qty = QualifiedType::plain(ty.clone());
            let mut inner = env.clone();
            inner.bind(name.name.clone(), fix_qty.clone());
            let typed_body = check_expr(body, &inner, ctx)?;
            expect_equiv(ty, &typed_body.ann.qty.ty, span_to_loc(body.ann))?;
            Ok((
                ExprKind::Fixpoint {
                    name: add_type_to_ident(name, fix_qty.clone()),
                    ty: ty.clone(),
                    body: Box::new(typed_body),
                },
                fix_qty,
            ))
        }

        // -- Type abstraction --
        ExprKind::TFun { tvar, body } => {
            let mut inner = env.clone();
            inner.add_tvar(tvar.name.clone());
            let typed_body = check_expr(body, &inner, ctx)?;
            let poly_ty = Type::PolyFun(
                tvar.name.clone(),
                Box::new(typed_body.ann.qty.ty.clone()),
            );
            Ok((
                ExprKind::TFun {
                    tvar: add_type_to_ident(
                        tvar,
                        QualifiedType::plain(Type::TypeVar(tvar.name.clone())),
                    ),
                    body: Box::new(typed_body),
                },
                QualifiedType::plain(poly_ty),
            ))
        }

        // -- Type application --
        ExprKind::TApp { tfun, type_args } => {
            let tfun_qty = env.resolve(tfun)?;
            for targ in type_args {
                env.is_wf_type(ctx.adts, targ, loc)?;
            }
            let ret = elab_tfun_with_args(&tfun_qty.ty, type_args).map_err(|err| {
                apply_error_to_diag(err, &format!("type application of `{}`", tfun.name), loc)
            })?;
            Ok((
                ExprKind::TApp {
                    tfun: add_type_to_ident(tfun, tfun_qty),
                    type_args: type_args.clone(),
                },
                QualifiedType::plain(ret),
            ))
        }

        // -- Message / event construction --
        ExprKind::Message(fields) => {
            let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
            let (kind, headers) = ctx
                .host
                .classify_payload(&names)
                .map_err(|diag| diag.at_outer(loc))?;
            let mut typed_fields = Vec::with_capacity(fields.len());
            for (fname, payload) in fields {
                let (typed_payload, payload_ty) = match payload {
                    MessagePayload::Tag(tag) => {
                        (MessagePayload::Tag(tag.clone()), Type::string())
                    }
                    MessagePayload::Literal(lit) => {
                        (MessagePayload::Literal(lit.clone()), literal_type(lit))
                    }
                    MessagePayload::Var(id) => {
                        let qty = env.resolve(id)?;
                        let ty = qty.ty.clone();
                        (MessagePayload::Var(add_type_to_ident(id, qty)), ty)
                    }
                };
                if let Some(required) = headers.get(fname) {
                    if !type_equiv(required, &payload_ty) {
                        return Err(Diagnostic::error(
                            Category::BadMessageField,
                            format!(
                                "payload field `{fname}` must be {required}, got {payload_ty}"
                            ),
                        )
                        .at(loc));
                    }
                } else if let Some(violation) = serializable_violation(&payload_ty) {
                    return Err(Diagnostic::error(
                        Category::NonSerializable,
                        format!(
                            "payload field `{fname}` has non-serializable type {payload_ty}: {}",
                            violation.reason
                        ),
                    )
                    .at(loc));
                }
                typed_fields.push((fname.clone(), typed_payload));
            }
            Ok((
                ExprKind::Message(typed_fields),
                QualifiedType::plain(Type::Prim(kind.prim())),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// Type a statement sequence against the dual environment.
///
/// Environment extensions introduced by a statement are visible only to its
/// suffix; the residual environment is returned for downstream analyses.
pub fn check_stmts(
    stmts: &[Stmt<Span>],
    env: &DualEnv,
    ctx: &mut CheckContext,
) -> Result<(Vec<TypedStmt>, DualEnv), Diagnostic> {
    let mut env = env.clone();
    let mut typed = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        typed.push(check_stmt(stmt, &mut env, ctx)?);
    }
    Ok((typed, env))
}

fn check_stmt(
    stmt: &Stmt<Span>,
    env: &mut DualEnv,
    ctx: &mut CheckContext,
) -> Result<TypedStmt, Diagnostic> {
    let loc = span_to_loc(stmt.ann);
    let (kind, qty) = match &stmt.kind {
        // -- Field load --
        StmtKind::Load { lhs, field } => {
            let field_qty = env.fields.resolve(field)?;
            env.pure.bind(lhs.name.clone(), field_qty.clone());
            (
                StmtKind::Load {
                    lhs: add_type_to_ident(lhs, field_qty.clone()),
                    field: add_type_to_ident(field, field_qty.clone()),
                },
                field_qty,
            )
        }

        // -- Field store --
        StmtKind::Store { field, rhs } => {
            let field_qty = env.fields.resolve(field)?;
            if ctx.host.no_store_fields.contains(field.as_str()) {
                return Err(Diagnostic::error(
                    Category::WriteToReadOnly,
                    format!("cannot write to read-only field `{}`", field.name),
                )
                .at(span_to_loc(field.ann)));
            }
            let rhs_qty = env.pure.resolve(rhs)?;
            expect_equiv(&field_qty.ty, &rhs_qty.ty, span_to_loc(rhs.ann))?;
            (
                StmtKind::Store {
                    field: add_type_to_ident(field, field_qty.clone()),
                    rhs: add_type_to_ident(rhs, rhs_qty),
                },
                field_qty,
            )
        }

        // -- Pure binding --
        StmtKind::Bind { lhs, rhs } => {
            let typed_rhs = check_expr(rhs, &env.pure, ctx)?;
            let bound_qty = typed_rhs.ann.qty.clone();
            env.pure.bind(lhs.name.clone(), bound_qty.clone());
            (
                StmtKind::Bind {
                    lhs: add_type_to_ident(lhs, bound_qty.clone()),
                    rhs: Box::new(typed_rhs),
                },
                bound_qty,
            )
        }

        // -- In-place map update or delete --
        StmtKind::MapUpdate { map, keys, value } => {
            let (typed_map, typed_keys, value_ty) = check_map_access(map, keys, env)?;
            let typed_value = match value {
                Some(v) => {
                    let v_qty = env.pure.resolve(v)?;
                    expect_equiv(&value_ty, &v_qty.ty, span_to_loc(v.ann))?;
                    Some(add_type_to_ident(v, v_qty))
                }
                None => {
                    // Deletion must name a full access path.
                    let remaining = map_depth(&value_ty);
                    if remaining > 0 {
                        return Err(Diagnostic::error(
                            Category::Arity,
                            format!(
                                "deleting from `{}` requires all {} key(s), got {}",
                                map.name,
                                keys.len() + remaining,
                                keys.len()
                            ),
                        )
                        .at(loc));
                    }
                    None
                }
            };
            let map_qty = typed_map.ann.qty.clone();
            (
                StmtKind::MapUpdate {
                    map: typed_map,
                    keys: typed_keys,
                    value: typed_value,
                },
                map_qty,
            )
        }

        // -- Map lookup or existence check --
        StmtKind::MapGet {
            lhs,
            map,
            keys,
            fetch,
        } => {
            let (typed_map, typed_keys, value_ty) = check_map_access(map, keys, env)?;
            let bound_ty = if *fetch {
                Type::option_of(value_ty)
            } else {
                Type::bool_adt()
            };
            let bound_qty = QualifiedType::plain(bound_ty);
            env.pure.bind(lhs.name.clone(), bound_qty.clone());
            (
                StmtKind::MapGet {
                    lhs: add_type_to_ident(lhs, bound_qty.clone()),
                    map: typed_map,
                    keys: typed_keys,
                    fetch: *fetch,
                },
                bound_qty,
            )
        }

        // -- Blockchain read --
        StmtKind::ReadFromBC { lhs, field } => {
            let ty = ctx.host.bc_reads.get(field).ok_or_else(|| {
                Diagnostic::error(
                    Category::UnknownBCField,
                    format!("unknown blockchain field `{field}`"),
                )
                .at(loc)
            })?;
            let bound_qty = QualifiedType::plain(ty.clone());
            env.pure.bind(lhs.name.clone(), bound_qty.clone());
            (
                StmtKind::ReadFromBC {
                    lhs: add_type_to_ident(lhs, bound_qty.clone()),
                    field: field.clone(),
                },
                bound_qty,
            )
        }

        // -- Statement-level match --
        StmtKind::MatchStmt { scrutinee, clauses } => {
            if clauses.is_empty() {
                return Err(Diagnostic::error(
                    Category::EmptyMatch,
                    "match statement has no clauses",
                )
                .at(loc));
            }
            let scrutinee_qty = env.pure.resolve(scrutinee)?;
            let mut typed_clauses = Vec::with_capacity(clauses.len());
            for clause in clauses {
                let (typed_pat, bindings) =
                    assign_types_for_pattern(ctx.adts, &scrutinee_qty.ty, &clause.pattern, loc)?;
                let mut branch_env = env.clone();
                branch_env.pure.bind_all(
                    bindings
                        .into_iter()
                        .map(|(ident, qty)| (ident.name, qty)),
                );
                // Branch bindings do not escape into the suffix.
                let (typed_body, _) = check_stmts(&clause.body, &branch_env, ctx)?;
                typed_clauses.push(StmtMatchClause {
                    pattern: typed_pat,
                    body: typed_body,
                });
            }
            (
                StmtKind::MatchStmt {
                    scrutinee: add_type_to_ident(scrutinee, scrutinee_qty.clone()),
                    clauses: typed_clauses,
                },
                scrutinee_qty,
            )
        }

        // -- Accept incoming funds --
        StmtKind::AcceptPayment => {
            let (_, amount_ty) = &ctx.host.balance_field;
            (StmtKind::AcceptPayment, QualifiedType::plain(amount_ty.clone()))
        }

        // -- Send messages --
        StmtKind::SendMsgs(arg) => {
            let arg_qty = env.pure.resolve(arg)?;
            expect_equiv(
                &Type::list_of(Type::message()),
                &arg_qty.ty,
                span_to_loc(arg.ann),
            )?;
            (
                StmtKind::SendMsgs(add_type_to_ident(arg, arg_qty.clone())),
                arg_qty,
            )
        }

        // -- Emit event --
        StmtKind::CreateEvnt(arg) => {
            let arg_qty = env.pure.resolve(arg)?;
            expect_equiv(&Type::event(), &arg_qty.ty, span_to_loc(arg.ann))?;
            (
                StmtKind::CreateEvnt(add_type_to_ident(arg, arg_qty.clone())),
                arg_qty,
            )
        }

        StmtKind::Throw(_) => {
            return Err(Diagnostic::error(
                Category::NotImplemented,
                "`throw` is not supported by the checker",
            )
            .at(loc));
        }
    };
    if let Some((rule, detail)) = stmt_rule(&kind) {
        ctx.record(rule, detail, &qty.ty, stmt.ann);
    }
    Ok(Stmt::new(
        kind,
        TypeAnn {
            qty,
            span: stmt.ann,
        },
    ))
}

fn stmt_rule(kind: &StmtKind<TypeAnn>) -> Option<(CheckRule, &str)> {
    match kind {
        StmtKind::Load { field, .. } => Some((CheckRule::Load, field.as_str())),
        StmtKind::Store { field, .. } => Some((CheckRule::Store, field.as_str())),
        StmtKind::Bind { lhs, .. } => Some((CheckRule::Bind, lhs.as_str())),
        StmtKind::MapUpdate { map, .. } => Some((CheckRule::MapUpdate, map.as_str())),
        StmtKind::MapGet { map, .. } => Some((CheckRule::MapGet, map.as_str())),
        StmtKind::ReadFromBC { field, .. } => Some((CheckRule::ReadFromBC, field)),
        StmtKind::MatchStmt { .. } => Some((CheckRule::MatchStmt, "match")),
        StmtKind::SendMsgs(_) => Some((CheckRule::SendMsgs, "send")),
        StmtKind::CreateEvnt(_) => Some((CheckRule::CreateEvnt, "event")),
        StmtKind::AcceptPayment | StmtKind::Throw(_) => None,
    }
}

fn map_depth(ty: &Type) -> usize {
    match ty {
        Type::Map(_, value) => 1 + map_depth(value),
        _ => 0,
    }
}

/// Walk a map access path: resolve the field, check every key against the
/// corresponding key type, and return the type at the end of the path.
fn check_map_access(
    map: &Ident<Span>,
    keys: &[Ident<Span>],
    env: &DualEnv,
) -> Result<(TypedIdent, Vec<TypedIdent>, Type), Diagnostic> {
    let map_qty = env.fields.resolve(map)?;
    let mut current = map_qty.ty.clone();
    let mut typed_keys = Vec::with_capacity(keys.len());
    for (depth, key) in keys.iter().enumerate() {
        let key_qty = env.pure.resolve(key)?;
        match current {
            Type::Map(key_ty, value_ty) => {
                expect_equiv(&key_ty, &key_qty.ty, span_to_loc(key.ann))?;
                typed_keys.push(add_type_to_ident(key, key_qty));
                current = *value_ty;
            }
            _ => {
                return Err(Diagnostic::error(
                    Category::Arity,
                    format!(
                        "`{}` is indexed with {} key(s), but is only {} map(s) deep",
                        map.name,
                        keys.len(),
                        depth
                    ),
                )
                .at(span_to_loc(key.ann)));
            }
        }
    }
    Ok((add_type_to_ident(map, map_qty), typed_keys, current))
}

// ---------------------------------------------------------------------------
// Libraries
// ---------------------------------------------------------------------------

/// Result of checking one library's entries.
#[derive(Debug)]
pub struct LibraryOutcome {
    /// Entries that typed successfully, in input order.
    pub typed_entries: Vec<LibEntry<TypeAnn>>,
    /// The input environment extended with the successful value entries.
    pub env: TypeEnv,
    pub diagnostics: Vec<Diagnostic>,
    /// Names whose typing failed, including entries skipped because a
    /// dependency failed. Carried across libraries.
    pub blacklist: BTreeSet<String>,
}

/// Check a library's entries in order, error-resiliently.
///
/// A failed value entry is blacklisted; later entries whose free variables
/// intersect the blacklist are skipped (and blacklisted themselves) without
/// being re-checked, so one failure does not cascade into phantom errors.
pub fn check_library_entries(
    entries: &[LibEntry<Span>],
    env: &TypeEnv,
    blacklist: &BTreeSet<String>,
    ctx: &mut CheckContext,
) -> LibraryOutcome {
    let mut env = env.clone();
    let mut blacklist = blacklist.clone();
    let mut diagnostics = Vec::new();
    let mut typed_entries = Vec::new();

    for entry in entries {
        match entry {
            LibEntry::Typ { name, ctrs } => {
                let mut ok = true;
                for ctr in ctrs {
                    let loc = span_to_loc(ctr.name.span);
                    for arg_ty in &ctr.arg_types {
                        if let Err(diag) = env.is_wf_type(ctx.adts, arg_ty, loc) {
                            diagnostics.push(diag);
                            ok = false;
                            break;
                        }
                    }
                    if !ok {
                        break;
                    }
                }
                if ok {
                    typed_entries.push(LibEntry::Typ {
                        name: name.clone(),
                        ctrs: ctrs.clone(),
                    });
                }
            }
            LibEntry::Var { name, init } => {
                let deps = free_vars(init);
                if let Some(failed) = deps.iter().find(|dep| blacklist.contains(*dep)) {
                    diagnostics.push(
                        Diagnostic::error(
                            Category::DependencySkipped,
                            format!(
                                "library value `{}` skipped: it depends on `{failed}`, \
                                 which failed to typecheck",
                                name.name
                            ),
                        )
                        .at(span_to_loc(name.ann)),
                    );
                    blacklist.insert(name.name.clone());
                    continue;
                }
                match check_expr(init, &env, ctx) {
                    Ok(typed_init) => {
                        let qty = typed_init.ann.qty.clone();
                        env.bind(name.name.clone(), qty.clone());
                        typed_entries.push(LibEntry::Var {
                            name: add_type_to_ident(name, qty),
                            init: typed_init,
                        });
                    }
                    Err(diag) => {
                        diagnostics.push(diag);
                        blacklist.insert(name.name.clone());
                    }
                }
            }
        }
    }

    LibraryOutcome {
        typed_entries,
        env,
        diagnostics,
        blacklist,
    }
}

// ---------------------------------------------------------------------------
// Module driver
// ---------------------------------------------------------------------------

/// A fully checked module: the decorated AST, the typed external libraries
/// in input order, and the residual environments for downstream analyses.
#[derive(Debug)]
pub struct CheckedModule {
    pub module: TypedModule,
    pub ext_libs: Vec<TypedLibrary>,
    pub env: DualEnv,
}

/// Check a whole contract module.
///
/// Phases run in order: recursion primitives, external libraries, the own
/// library, contract parameters, fields, transitions. Failures in
/// libraries, fields, and transitions are accumulated; a failure in the
/// recursion primitives or the contract parameters aborts the check. The
/// module succeeds only when the final diagnostic list is empty; the list
/// is stably sorted into source order.
pub fn check_module(
    module: &ContractModule<Span>,
    rec_prims: &[LibEntry<Span>],
    ext_libs: &[Library<Span>],
    ctx: &mut CheckContext,
) -> Result<CheckedModule, DiagnosticError> {
    let host = ctx.host;
    let mut env = TypeEnv::new();

    // Phase 1: recursion primitives bootstrap the standard library and may
    // not themselves introduce user types.
    for entry in rec_prims {
        match entry {
            LibEntry::Typ { name, .. } => {
                return Err(DiagnosticError::single(
                    Diagnostic::error(
                        Category::RecPrimsTypeDecl,
                        format!(
                            "recursion primitives may not declare types (`{}`)",
                            name.node
                        ),
                    )
                    .at(span_to_loc(name.span)),
                ));
            }
            LibEntry::Var { name, init } => {
                let typed = check_expr(init, &env, ctx).map_err(DiagnosticError::single)?;
                env.bind(name.name.clone(), typed.ann.qty.clone());
            }
        }
    }

    // Phase 2: external libraries in order, then the module's own library.
    let mut diags = Vec::new();
    let mut blacklist = BTreeSet::new();
    let mut typed_ext_libs = Vec::with_capacity(ext_libs.len());
    for lib in ext_libs {
        let outcome = check_library_entries(&lib.entries, &env, &blacklist, ctx);
        env = outcome.env;
        blacklist = outcome.blacklist;
        diags.extend(outcome.diagnostics);
        typed_ext_libs.push(Library {
            name: lib.name.clone(),
            entries: outcome.typed_entries,
        });
    }
    let typed_own_lib = module.library.as_ref().map(|lib| {
        let outcome = check_library_entries(&lib.entries, &env, &blacklist, ctx);
        env = outcome.env;
        blacklist = outcome.blacklist;
        diags.extend(outcome.diagnostics);
        Library {
            name: lib.name.clone(),
            entries: outcome.typed_entries,
        }
    });

    // Phase 3: contract parameters, implicit ones first. Parameter failures
    // reject the module outright.
    let contract = &module.contract;
    let mut pure_env = env;
    for (name, ty) in &host.contract_params {
        pure_env.bind(name.clone(), QualifiedType::plain(ty.clone()));
    }
    let mut typed_params = Vec::with_capacity(contract.params.len());
    let mut seen_names: BTreeSet<String> = BTreeSet::new();
    for (ident, ty) in &contract.params {
        let loc = span_to_loc(ident.ann);
        if !seen_names.insert(ident.name.clone()) {
            diags.push(
                Diagnostic::error(
                    Category::DuplicateBinding,
                    format!("contract parameter `{}` is declared more than once", ident.name),
                )
                .at(loc),
            );
            continue;
        }
        if let Err(diag) = pure_env.is_wf_type(ctx.adts, ty, loc) {
            diags.push(diag);
            return Err(finish_err(diags));
        }
        if let Some(violation) = serializable_violation(ty) {
            diags.push(
                Diagnostic::error(
                    Category::NonSerializable,
                    format!(
                        "contract parameter `{}` has non-serializable type {ty}: {}",
                        ident.name, violation.reason
                    ),
                )
                .at(loc),
            );
            return Err(finish_err(diags));
        }
        let qty = QualifiedType::plain(ty.clone());
        pure_env.bind(ident.name.clone(), qty.clone());
        typed_params.push((add_type_to_ident(ident, qty), ty.clone()));
    }

    // Phase 4: fields. A field whose declared type is sound stays bound even
    // when its initializer fails, so transitions over it do not cascade.
    let mut fields_env = TypeEnv::new();
    let mut typed_fields = Vec::with_capacity(contract.fields.len());
    for field in &contract.fields {
        let loc = span_to_loc(field.name.ann);
        if !seen_names.insert(field.name.name.clone()) {
            diags.push(
                Diagnostic::error(
                    Category::DuplicateBinding,
                    format!("field `{}` collides with an earlier declaration", field.name.name),
                )
                .at(loc),
            );
            continue;
        }
        if let Err(diag) = pure_env.is_wf_type(ctx.adts, &field.ty, loc) {
            diags.push(diag);
            continue;
        }
        if let Some(violation) = storable_violation(&field.ty) {
            diags.push(
                Diagnostic::error(
                    Category::NonStorable,
                    format!(
                        "field `{}` has non-storable type {}: {}",
                        field.name.name, field.ty, violation.reason
                    ),
                )
                .at(loc),
            );
            continue;
        }
        let qty = QualifiedType::plain(field.ty.clone());
        fields_env.bind(field.name.name.clone(), qty.clone());
        match check_expr(&field.init, &pure_env, ctx) {
            Ok(typed_init) => {
                if type_equiv(&field.ty, &typed_init.ann.qty.ty) {
                    typed_fields.push(Field {
                        name: add_type_to_ident(&field.name, qty),
                        ty: field.ty.clone(),
                        init: typed_init,
                    });
                } else {
                    diags.push(
                        Diagnostic::error(
                            Category::TypeMismatch,
                            format!(
                                "field `{}` declares {}, initializer has type {}",
                                field.name.name, field.ty, typed_init.ann.qty.ty
                            ),
                        )
                        .at(loc),
                    );
                }
            }
            Err(diag) => diags.push(diag),
        }
    }
    let (balance_name, balance_ty) = &host.balance_field;
    fields_env.bind(balance_name.clone(), QualifiedType::plain(balance_ty.clone()));

    // Phase 5: transitions, each under copied environments so transitions
    // cannot leak into each other.
    let mut typed_transitions = Vec::with_capacity(contract.transitions.len());
    let mut seen_transitions: BTreeSet<String> = BTreeSet::new();
    for transition in &contract.transitions {
        if !seen_transitions.insert(transition.name.node.clone()) {
            diags.push(
                Diagnostic::error(
                    Category::DuplicateBinding,
                    format!(
                        "transition `{}` is declared more than once",
                        transition.name.node
                    ),
                )
                .at(span_to_loc(transition.name.span)),
            );
            continue;
        }
        let mut denv = DualEnv {
            pure: pure_env.clone(),
            fields: fields_env.clone(),
        };
        for (name, ty) in &host.transition_params {
            denv.pure.bind(name.clone(), QualifiedType::plain(ty.clone()));
        }
        let mut params_ok = true;
        let mut typed_trans_params = Vec::with_capacity(transition.params.len());
        for (ident, ty) in &transition.params {
            let loc = span_to_loc(ident.ann);
            if let Err(diag) = denv.pure.is_wf_type(ctx.adts, ty, loc) {
                diags.push(diag);
                params_ok = false;
                continue;
            }
            if let Some(violation) = serializable_violation(ty) {
                diags.push(
                    Diagnostic::error(
                        Category::NonSerializable,
                        format!(
                            "transition parameter `{}` has non-serializable type {ty}: {}",
                            ident.name, violation.reason
                        ),
                    )
                    .at(loc),
                );
                params_ok = false;
                continue;
            }
            let qty = QualifiedType::plain(ty.clone());
            denv.pure.bind(ident.name.clone(), qty.clone());
            typed_trans_params.push((add_type_to_ident(ident, qty), ty.clone()));
        }
        match check_stmts(&transition.body, &denv, ctx) {
            Ok((typed_body, _)) => {
                if params_ok {
                    typed_transitions.push(Transition {
                        name: transition.name.clone(),
                        params: typed_trans_params,
                        body: typed_body,
                    });
                }
            }
            Err(diag) => diags.push(diag),
        }
    }

    if !diags.is_empty() {
        return Err(finish_err(diags));
    }

    Ok(CheckedModule {
        module: ContractModule {
            name: module.name.clone(),
            library: typed_own_lib,
            contract: Contract {
                name: contract.name.clone(),
                params: typed_params,
                fields: typed_fields,
                transitions: typed_transitions,
            },
        },
        ext_libs: typed_ext_libs,
        env: DualEnv {
            pure: pure_env,
            fields: fields_env,
        },
    })
}

fn finish_err(mut diags: Vec<Diagnostic>) -> DiagnosticError {
    sort_into_source_order(&mut diags);
    DiagnosticError::multiple(diags)
}
