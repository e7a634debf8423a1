//! Tests for expression, statement, and module checking.
//!
//! Each test constructs an AST by hand and checks the computed type or the
//! reported diagnostics. This is verbose but precise — we know exactly what
//! we're testing.

use scrip_ast::*;
use scrip_diag::Diagnostic;
use scrip_types::*;

use crate::typeck::*;
use crate::{Category, CheckContext, ContractHost, DualEnv, TypeEnv, TypedExpr, TypedStmt};

// ---------------------------------------------------------------------------
// Helpers for constructing AST nodes
// ---------------------------------------------------------------------------

fn s() -> Span {
    Span::new(FileId(0), 0, 1)
}

fn sp(start: u32) -> Span {
    Span::new(FileId(0), start, start + 1)
}

fn id(name: &str) -> Ident<Span> {
    Ident::new(name, s())
}

fn id_at(name: &str, start: u32) -> Ident<Span> {
    Ident::new(name, sp(start))
}

fn named(name: &str) -> Spanned<String> {
    Spanned::new(name.to_string(), s())
}

fn var(name: &str) -> Expr<Span> {
    Expr::new(ExprKind::Var(id(name)), s())
}

fn lit(l: Literal) -> Expr<Span> {
    Expr::new(ExprKind::Literal(l), s())
}

fn uint32_lit(digits: &str) -> Expr<Span> {
    lit(Literal::Uint(IntWidth::W32, digits.to_string()))
}

fn uint128_lit(digits: &str) -> Expr<Span> {
    lit(Literal::Uint(IntWidth::W128, digits.to_string()))
}

fn str_lit(text: &str) -> Expr<Span> {
    lit(Literal::String(text.to_string()))
}

fn let_in(name: &str, annot: Option<Type>, value: Expr<Span>, body: Expr<Span>) -> Expr<Span> {
    Expr::new(
        ExprKind::Let {
            lhs: id(name),
            annot,
            value: Box::new(value),
            body: Box::new(body),
        },
        s(),
    )
}

fn fun(param: &str, param_ty: Type, body: Expr<Span>) -> Expr<Span> {
    Expr::new(
        ExprKind::Fun {
            param: id(param),
            param_ty,
            body: Box::new(body),
        },
        s(),
    )
}

fn app(func: &str, args: &[&str]) -> Expr<Span> {
    Expr::new(
        ExprKind::App {
            func: id(func),
            args: args.iter().map(|a| id(a)).collect(),
        },
        s(),
    )
}

fn builtin(op: &str, args: &[&str]) -> Expr<Span> {
    Expr::new(
        ExprKind::Builtin {
            op: id(op),
            args: args.iter().map(|a| id(a)).collect(),
        },
        s(),
    )
}

fn constr(name: &str, type_args: Vec<Type>, args: &[&str]) -> Expr<Span> {
    Expr::new(
        ExprKind::Constr {
            name: name.to_string(),
            type_args,
            args: args.iter().map(|a| id(a)).collect(),
        },
        s(),
    )
}

fn match_expr(scrutinee: &str, clauses: Vec<(Pattern<Span>, Expr<Span>)>) -> Expr<Span> {
    Expr::new(
        ExprKind::MatchExpr {
            scrutinee: id(scrutinee),
            clauses: clauses
                .into_iter()
                .map(|(pattern, body)| MatchClause { pattern, body })
                .collect(),
        },
        s(),
    )
}

fn ctor_pat(name: &str, args: Vec<Pattern<Span>>) -> Pattern<Span> {
    Pattern::Constructor {
        name: name.to_string(),
        args,
    }
}

fn binder(name: &str) -> Pattern<Span> {
    Pattern::Binder(id(name))
}

fn message(fields: Vec<(&str, MessagePayload<Span>)>) -> Expr<Span> {
    Expr::new(
        ExprKind::Message(
            fields
                .into_iter()
                .map(|(name, payload)| (name.to_string(), payload))
                .collect(),
        ),
        s(),
    )
}

fn tag(text: &str) -> MessagePayload<Span> {
    MessagePayload::Tag(text.to_string())
}

fn pay_lit(l: Literal) -> MessagePayload<Span> {
    MessagePayload::Literal(l)
}

fn pay_var(name: &str) -> MessagePayload<Span> {
    MessagePayload::Var(id(name))
}

fn stmt(kind: StmtKind<Span>) -> Stmt<Span> {
    Stmt::new(kind, s())
}

fn env_with(pairs: &[(&str, Type)]) -> TypeEnv {
    let mut env = TypeEnv::new();
    for (name, ty) in pairs {
        env.bind(name.to_string(), QualifiedType::plain(ty.clone()));
    }
    env
}

fn dual_env(pure: &[(&str, Type)], fields: &[(&str, Type)]) -> DualEnv {
    DualEnv {
        pure: env_with(pure),
        fields: env_with(fields),
    }
}

// ---------------------------------------------------------------------------
// Checking harness
// ---------------------------------------------------------------------------

fn check(expr: &Expr<Span>, env: &TypeEnv) -> Result<TypedExpr, Diagnostic> {
    let adts = AdtRegistry::with_stdlib();
    let builtins = BuiltinDictionary::with_stdlib();
    let host = ContractHost::default();
    let mut ctx = CheckContext::new(&adts, &builtins, &host);
    check_expr(expr, env, &mut ctx)
}

fn check_ty(expr: &Expr<Span>, env: &TypeEnv) -> Type {
    match check(expr, env) {
        Ok(typed) => typed.ann.qty.ty,
        Err(diag) => panic!("expected successful check, got: {diag}"),
    }
}

fn check_err(expr: &Expr<Span>, env: &TypeEnv, category: Category) -> Diagnostic {
    match check(expr, env) {
        Ok(typed) => panic!(
            "expected {category:?} error, got type {}",
            typed.ann.qty.ty
        ),
        Err(diag) => {
            assert_eq!(diag.category, category, "unexpected diagnostic: {diag}");
            diag
        }
    }
}

fn check_block(
    stmts: &[Stmt<Span>],
    env: &DualEnv,
) -> Result<(Vec<TypedStmt>, DualEnv), Diagnostic> {
    let adts = AdtRegistry::with_stdlib();
    let builtins = BuiltinDictionary::with_stdlib();
    let host = ContractHost::default();
    let mut ctx = CheckContext::new(&adts, &builtins, &host);
    check_stmts(stmts, env, &mut ctx)
}

fn check_block_err(stmts: &[Stmt<Span>], env: &DualEnv, category: Category) -> Diagnostic {
    match check_block(stmts, env) {
        Ok(_) => panic!("expected {category:?} error"),
        Err(diag) => {
            assert_eq!(diag.category, category, "unexpected diagnostic: {diag}");
            diag
        }
    }
}

fn check_mod(
    module: &ContractModule<Span>,
    rec_prims: &[LibEntry<Span>],
    ext_libs: &[Library<Span>],
) -> Result<CheckedModule, crate::DiagnosticError> {
    let adts = AdtRegistry::with_stdlib();
    let builtins = BuiltinDictionary::with_stdlib();
    let host = ContractHost::default();
    let mut ctx = CheckContext::new(&adts, &builtins, &host);
    check_module(module, rec_prims, ext_libs, &mut ctx)
}

// ---------------------------------------------------------------------------
// Literals and variables
// ---------------------------------------------------------------------------

#[test]
fn literal_widths_and_byte_strings() {
    let env = TypeEnv::new();
    assert_eq!(check_ty(&uint128_lit("0"), &env), Type::uint(IntWidth::W128));
    assert_eq!(
        check_ty(&lit(Literal::Int(IntWidth::W64, "-3".to_string())), &env),
        Type::int(IntWidth::W64)
    );
    assert_eq!(check_ty(&str_lit("foo"), &env), Type::string());
    assert_eq!(
        check_ty(&lit(Literal::BNum("100".to_string())), &env),
        Type::bnum()
    );
    assert_eq!(
        check_ty(&lit(Literal::ByStr(vec![0u8; 20])), &env),
        Type::address()
    );
}

#[test]
fn empty_map_literal() {
    let env = TypeEnv::new();
    let ok = lit(Literal::Emp(Type::address(), Type::uint(IntWidth::W128)));
    assert_eq!(
        check_ty(&ok, &env),
        Type::map_of(Type::address(), Type::uint(IntWidth::W128))
    );

    // Non-primitive keys are rejected just like in a written type.
    let bad = lit(Literal::Emp(Type::option_of(Type::string()), Type::bnum()));
    check_err(&bad, &env, Category::NotWellFormed);
}

#[test]
fn variable_resolution() {
    let env = env_with(&[("owner", Type::address())]);
    assert_eq!(check_ty(&var("owner"), &env), Type::address());

    let diag = check_err(&var("stranger"), &env, Category::Unbound);
    assert!(diag.message.contains("stranger"));
}

// ---------------------------------------------------------------------------
// Functions and application
// ---------------------------------------------------------------------------

#[test]
fn function_abstraction_and_application() {
    let env = env_with(&[("x", Type::uint(IntWidth::W128))]);
    let identity = fun("y", Type::uint(IntWidth::W128), var("y"));
    assert_eq!(
        check_ty(&identity, &env),
        Type::fun(Type::uint(IntWidth::W128), Type::uint(IntWidth::W128))
    );

    let applied = let_in("f", None, identity, app("f", &["x"]));
    assert_eq!(check_ty(&applied, &env), Type::uint(IntWidth::W128));
}

#[test]
fn application_mismatch_and_arity() {
    let fty = Type::fun(Type::uint(IntWidth::W128), Type::bool_adt());
    let env = env_with(&[
        ("f", fty),
        ("n", Type::uint(IntWidth::W128)),
        ("s", Type::string()),
    ]);
    assert_eq!(check_ty(&app("f", &["n"]), &env), Type::bool_adt());
    check_err(&app("f", &["s"]), &env, Category::TypeMismatch);
    check_err(&app("f", &["n", "n"]), &env, Category::Arity);
}

#[test]
fn function_param_type_must_be_well_formed() {
    let env = TypeEnv::new();
    let bad = fun("x", Type::TypeVar("'A".to_string()), var("x"));
    check_err(&bad, &env, Category::NotWellFormed);

    let bad_adt = fun("x", Type::Adt("Mystery".to_string(), vec![]), var("x"));
    check_err(&bad_adt, &env, Category::NotWellFormed);
}

// ---------------------------------------------------------------------------
// Builtins
// ---------------------------------------------------------------------------

#[test]
fn builtin_dispatch_and_annotation() {
    let env = env_with(&[
        ("a", Type::uint(IntWidth::W128)),
        ("b", Type::uint(IntWidth::W128)),
        ("s", Type::string()),
    ]);
    let typed = check(&builtin("add", &["a", "b"]), &env).expect("add");
    assert_eq!(typed.ann.qty.ty, Type::uint(IntWidth::W128));
    // The operator ident carries the operation's result type.
    match &typed.kind {
        ExprKind::Builtin { op, .. } => {
            assert_eq!(op.ann.qty.ty, Type::uint(IntWidth::W128));
        }
        other => panic!("expected builtin node, got {other:?}"),
    }

    assert_eq!(check_ty(&builtin("eq", &["s", "s"]), &env), Type::bool_adt());
}

#[test]
fn builtin_signature_errors() {
    let env = env_with(&[
        ("a", Type::uint(IntWidth::W128)),
        ("w", Type::uint(IntWidth::W32)),
    ]);
    let diag = check_err(&builtin("add", &["a", "w"]), &env, Category::UnknownBuiltin);
    assert!(diag.message.contains("add"));
    check_err(&builtin("frobnicate", &["a"]), &env, Category::UnknownBuiltin);
}

// ---------------------------------------------------------------------------
// Let bindings
// ---------------------------------------------------------------------------

#[test]
fn let_annotation_checked_against_value() {
    let env = TypeEnv::new();
    let ok = let_in(
        "n",
        Some(Type::uint(IntWidth::W128)),
        uint128_lit("5"),
        var("n"),
    );
    assert_eq!(check_ty(&ok, &env), Type::uint(IntWidth::W128));

    let bad = let_in(
        "n",
        Some(Type::string()),
        uint128_lit("5"),
        var("n"),
    );
    let diag = check_err(&bad, &env, Category::TypeMismatch);
    assert!(diag.message.contains("String"));
}

#[test]
fn let_shadowing_is_scoped() {
    let env = env_with(&[("x", Type::string())]);
    // let x = 1 in x  shadows the outer String binding.
    let inner = let_in("x", None, uint128_lit("1"), var("x"));
    assert_eq!(check_ty(&inner, &env), Type::uint(IntWidth::W128));
    // The outer environment is untouched by the nested scope.
    assert_eq!(check_ty(&var("x"), &env), Type::string());
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

#[test]
fn constructor_application() {
    let env = env_with(&[("h", Type::bystr(32))]);
    assert_eq!(
        check_ty(&constr("Some", vec![Type::bystr(32)], &["h"]), &env),
        Type::option_of(Type::bystr(32))
    );
    assert_eq!(
        check_ty(&constr("None", vec![Type::bystr(32)], &[]), &env),
        Type::option_of(Type::bystr(32))
    );
    assert_eq!(
        check_ty(&constr("Zero", vec![], &[]), &env),
        Type::nat_adt()
    );
}

#[test]
fn constructor_arity_errors() {
    let env = env_with(&[("h", Type::bystr(32))]);
    // Wrong number of value arguments.
    check_err(
        &constr("Some", vec![Type::bystr(32)], &[]),
        &env,
        Category::Arity,
    );
    // Wrong number of type arguments.
    check_err(
        &constr("Some", vec![Type::bystr(32), Type::bnum()], &["h"]),
        &env,
        Category::Arity,
    );
    check_err(&constr("Whatever", vec![], &[]), &env, Category::Unbound);
}

#[test]
fn constructor_argument_mismatch() {
    let env = env_with(&[("n", Type::bnum())]);
    check_err(
        &constr("Some", vec![Type::bystr(32)], &["n"]),
        &env,
        Category::TypeMismatch,
    );
}

// ---------------------------------------------------------------------------
// Match expressions
// ---------------------------------------------------------------------------

#[test]
fn match_on_option() {
    let env = env_with(&[
        ("opt", Type::option_of(Type::uint(IntWidth::W128))),
        ("zero", Type::uint(IntWidth::W128)),
    ]);
    let expr = match_expr(
        "opt",
        vec![
            (ctor_pat("Some", vec![binder("v")]), var("v")),
            (ctor_pat("None", vec![]), var("zero")),
        ],
    );
    assert_eq!(check_ty(&expr, &env), Type::uint(IntWidth::W128));
}

#[test]
fn match_branches_must_agree() {
    let env = env_with(&[("opt", Type::option_of(Type::string()))]);
    let expr = match_expr(
        "opt",
        vec![
            (ctor_pat("Some", vec![binder("v")]), var("v")),
            (ctor_pat("None", vec![]), uint128_lit("0")),
        ],
    );
    check_err(&expr, &env, Category::TypeMismatch);
}

#[test]
fn match_requires_clauses() {
    let env = env_with(&[("opt", Type::option_of(Type::string()))]);
    check_err(&match_expr("opt", vec![]), &env, Category::EmptyMatch);
}

#[test]
fn match_wildcard_and_nested_patterns() {
    let pair_ty = Type::Adt(
        "Pair".to_string(),
        vec![Type::string(), Type::option_of(Type::bnum())],
    );
    let env = env_with(&[("p", pair_ty)]);
    let expr = match_expr(
        "p",
        vec![
            (
                ctor_pat(
                    "Pair",
                    vec![binder("name"), ctor_pat("Some", vec![binder("when")])],
                ),
                var("name"),
            ),
            (Pattern::Wildcard, str_lit("missing")),
        ],
    );
    assert_eq!(check_ty(&expr, &env), Type::string());
}

#[test]
fn pattern_bindings_are_leftmost_first() {
    let adts = AdtRegistry::with_stdlib();
    let pair_ty = Type::Adt(
        "Pair".to_string(),
        vec![Type::string(), Type::bnum()],
    );
    let pattern = ctor_pat("Pair", vec![binder("first"), binder("second")]);
    let (_, bindings) = crate::patterns::assign_types_for_pattern(
        &adts,
        &pair_ty,
        &pattern,
        crate::span_to_loc(s()),
    )
    .expect("pattern");
    let names: Vec<&str> = bindings.iter().map(|(ident, _)| ident.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert_eq!(bindings[0].1.ty, Type::string());
    assert_eq!(bindings[1].1.ty, Type::bnum());
}

#[test]
fn pattern_constructor_arity_error() {
    let env = env_with(&[("opt", Type::option_of(Type::string()))]);
    let expr = match_expr(
        "opt",
        vec![(
            ctor_pat("Some", vec![binder("a"), binder("b")]),
            var("a"),
        )],
    );
    check_err(&expr, &env, Category::Arity);
}

#[test]
fn pattern_against_non_adt_scrutinee() {
    let env = env_with(&[("n", Type::bnum())]);
    let expr = match_expr("n", vec![(ctor_pat("Some", vec![binder("v")]), var("v"))]);
    check_err(&expr, &env, Category::TypeMismatch);
}

// ---------------------------------------------------------------------------
// Polymorphism: tfun / tapp / fixpoint
// ---------------------------------------------------------------------------

#[test]
fn type_abstraction_and_application() {
    let env = TypeEnv::new();
    // tfun 'A. fun (x : 'A) => x
    let poly_id = Expr::new(
        ExprKind::TFun {
            tvar: id("'A"),
            body: Box::new(fun("x", Type::TypeVar("'A".to_string()), var("x"))),
        },
        s(),
    );
    let poly_ty = Type::PolyFun(
        "'A".to_string(),
        Box::new(Type::fun(
            Type::TypeVar("'A".to_string()),
            Type::TypeVar("'A".to_string()),
        )),
    );
    assert_eq!(check_ty(&poly_id, &env), poly_ty.clone());

    let env = env_with(&[("poly_id", poly_ty)]);
    let tapp = Expr::new(
        ExprKind::TApp {
            tfun: id("poly_id"),
            type_args: vec![Type::bnum()],
        },
        s(),
    );
    assert_eq!(check_ty(&tapp, &env), Type::fun(Type::bnum(), Type::bnum()));

    let over_applied = Expr::new(
        ExprKind::TApp {
            tfun: id("poly_id"),
            type_args: vec![Type::bnum(), Type::bnum()],
        },
        s(),
    );
    check_err(&over_applied, &env, Category::Arity);
}

#[test]
fn type_application_checks_argument_well_formedness() {
    let poly_ty = Type::PolyFun(
        "'A".to_string(),
        Box::new(Type::TypeVar("'A".to_string())),
    );
    let env = env_with(&[("poly", poly_ty)]);
    let tapp = Expr::new(
        ExprKind::TApp {
            tfun: id("poly"),
            type_args: vec![Type::TypeVar("'Free".to_string())],
        },
        s(),
    );
    check_err(&tapp, &env, Category::NotWellFormed);
}

#[test]
fn fixpoint_body_must_match_declared_type() {
    let env = TypeEnv::new();
    let fty = Type::fun(Type::uint(IntWidth::W128), Type::uint(IntWidth::W128));
    let ok = Expr::new(
        ExprKind::Fixpoint {
            name: id("go"),
            ty: fty.clone(),
            body: Box::new(fun("n", Type::uint(IntWidth::W128), app("go", &["n"]))),
        },
        s(),
    );
    assert_eq!(check_ty(&ok, &env), fty.clone());

    let bad = Expr::new(
        ExprKind::Fixpoint {
            name: id("go"),
            ty: fty,
            body: Box::new(str_lit("nope")),
        },
        s(),
    );
    check_err(&bad, &env, Category::TypeMismatch);
}

// ---------------------------------------------------------------------------
// Messages and events
// ---------------------------------------------------------------------------

fn sender_env() -> TypeEnv {
    env_with(&[("_sender", Type::address())])
}

#[test]
fn well_formed_message() {
    let expr = message(vec![
        ("_tag", tag("")),
        ("_recipient", pay_var("_sender")),
        ("_amount", pay_lit(Literal::Uint(IntWidth::W128, "0".to_string()))),
        ("status", pay_lit(Literal::String("foo".to_string()))),
    ]);
    assert_eq!(check_ty(&expr, &sender_env()), Type::message());
}

#[test]
fn well_formed_event() {
    let expr = message(vec![
        ("_eventname", tag("Transfer")),
        ("amount", pay_lit(Literal::Uint(IntWidth::W128, "1".to_string()))),
    ]);
    assert_eq!(check_ty(&expr, &sender_env()), Type::event());
}

#[test]
fn message_amount_with_wrong_width() {
    // {_tag: ""; _recipient: _sender; _amount: num1; status: "foo"} where
    // num1 : Int32.
    let mut env = sender_env();
    env.bind("num1", QualifiedType::plain(Type::int(IntWidth::W32)));
    let expr = message(vec![
        ("_tag", tag("")),
        ("_recipient", pay_var("_sender")),
        ("_amount", pay_var("num1")),
        ("status", pay_lit(Literal::String("foo".to_string()))),
    ]);
    let diag = check_err(&expr, &env, Category::BadMessageField);
    assert!(diag.message.contains("_amount"), "{diag}");
    assert!(diag.message.contains("Uint128"), "{diag}");
    assert!(diag.message.contains("Int32"), "{diag}");
}

#[test]
fn message_tag_with_adt_value() {
    // {_tag: Zero; ...} where Zero is a Nat constructor value.
    let mut env = sender_env();
    env.bind("zero", QualifiedType::plain(Type::nat_adt()));
    let expr = message(vec![
        ("_tag", pay_var("zero")),
        ("_recipient", pay_var("_sender")),
        ("_amount", pay_lit(Literal::Uint(IntWidth::W128, "0".to_string()))),
        ("status", pay_lit(Literal::String("foo".to_string()))),
    ]);
    let diag = check_err(&expr, &env, Category::BadMessageField);
    assert!(diag.message.contains("_tag"), "{diag}");
    assert!(diag.message.contains("String"), "{diag}");
    assert!(diag.message.contains("Nat"), "{diag}");
}

#[test]
fn message_recipient_too_short() {
    // {_recipient: 0xabad; ...} — a 2-byte string is not an address.
    let expr = message(vec![
        ("_tag", tag("")),
        ("_recipient", pay_lit(Literal::ByStr(vec![0xab, 0xad]))),
        ("_amount", pay_lit(Literal::Uint(IntWidth::W128, "0".to_string()))),
        ("status", pay_lit(Literal::String("foo".to_string()))),
    ]);
    let diag = check_err(&expr, &sender_env(), Category::BadMessageField);
    assert!(diag.message.contains("_recipient"), "{diag}");
    assert!(diag.message.contains("ByStr20"), "{diag}");
    assert!(diag.message.contains("ByStr2"), "{diag}");
}

#[test]
fn message_tag_not_a_string() {
    let expr = message(vec![
        ("_tag", pay_lit(Literal::BNum("100".to_string()))),
        ("_recipient", pay_var("_sender")),
        ("_amount", pay_lit(Literal::Uint(IntWidth::W128, "0".to_string()))),
    ]);
    let diag = check_err(&expr, &sender_env(), Category::BadMessageField);
    assert!(diag.message.contains("_tag"), "{diag}");
    assert!(diag.message.contains("BNum"), "{diag}");
}

#[test]
fn message_missing_mandatory_header() {
    let expr = message(vec![
        ("_tag", tag("")),
        ("_amount", pay_lit(Literal::Uint(IntWidth::W128, "0".to_string()))),
    ]);
    let diag = check_err(&expr, &sender_env(), Category::BadMessageField);
    assert!(diag.message.contains("_recipient"), "{diag}");
}

#[test]
fn message_requires_exactly_one_kind_marker() {
    let both = message(vec![
        ("_tag", tag("")),
        ("_eventname", tag("E")),
        ("_recipient", pay_var("_sender")),
        ("_amount", pay_lit(Literal::Uint(IntWidth::W128, "0".to_string()))),
    ]);
    check_err(&both, &sender_env(), Category::BadMessageField);

    let neither = message(vec![("status", pay_lit(Literal::String("x".to_string())))]);
    check_err(&neither, &sender_env(), Category::BadMessageField);
}

#[test]
fn message_payloads_must_be_serializable() {
    let mut env = sender_env();
    env.bind(
        "ledger",
        QualifiedType::plain(Type::map_of(Type::address(), Type::uint(IntWidth::W128))),
    );
    let expr = message(vec![
        ("_tag", tag("")),
        ("_recipient", pay_var("_sender")),
        ("_amount", pay_lit(Literal::Uint(IntWidth::W128, "0".to_string()))),
        ("snapshot", pay_var("ledger")),
    ]);
    let diag = check_err(&expr, &env, Category::NonSerializable);
    assert!(diag.message.contains("snapshot"), "{diag}");
}

#[test]
fn message_policy_is_injected_not_hard_coded() {
    // A host demanding an extra mandatory `_nonce` header rejects payloads
    // the default host accepts.
    let adts = AdtRegistry::with_stdlib();
    let builtins = BuiltinDictionary::with_stdlib();
    let mut host = ContractHost::default();
    host.message_headers
        .insert("_nonce".to_string(), Type::uint(IntWidth::W32));
    let mut ctx = CheckContext::new(&adts, &builtins, &host);

    let expr = message(vec![
        ("_tag", tag("")),
        ("_recipient", pay_var("_sender")),
        ("_amount", pay_lit(Literal::Uint(IntWidth::W128, "0".to_string()))),
    ]);
    let diag = check_expr(&expr, &sender_env(), &mut ctx).expect_err("missing _nonce");
    assert_eq!(diag.category, Category::BadMessageField);
    assert!(diag.message.contains("_nonce"), "{diag}");
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[test]
fn load_store_round_trip() {
    let env = dual_env(&[], &[("count", Type::uint(IntWidth::W128))]);
    let block = [
        stmt(StmtKind::Load {
            lhs: id("current"),
            field: id("count"),
        }),
        stmt(StmtKind::Store {
            field: id("count"),
            rhs: id("current"),
        }),
    ];
    let (typed, residual) = check_block(&block, &env).expect("load/store");
    assert_eq!(typed.len(), 2);
    assert_eq!(
        residual.pure.lookup("current").map(|q| q.ty.clone()),
        Some(Type::uint(IntWidth::W128))
    );
    // Loads do not touch the field environment.
    assert_eq!(residual.fields, env.fields);
}

#[test]
fn store_requires_matching_type() {
    let env = dual_env(
        &[("text", Type::string())],
        &[("count", Type::uint(IntWidth::W128))],
    );
    let block = [stmt(StmtKind::Store {
        field: id("count"),
        rhs: id("text"),
    })];
    check_block_err(&block, &env, Category::TypeMismatch);
}

#[test]
fn store_to_balance_is_rejected() {
    let env = dual_env(
        &[("amount", Type::uint(IntWidth::W128))],
        &[("_balance", Type::uint(IntWidth::W128))],
    );
    let block = [stmt(StmtKind::Store {
        field: id("_balance"),
        rhs: id("amount"),
    })];
    let diag = check_block_err(&block, &env, Category::WriteToReadOnly);
    assert!(diag.message.contains("_balance"));
}

#[test]
fn bind_extends_environment_for_suffix() {
    let env = dual_env(&[], &[]);
    let block = [
        stmt(StmtKind::Bind {
            lhs: id("x"),
            rhs: Box::new(uint128_lit("1")),
        }),
        stmt(StmtKind::Bind {
            lhs: id("y"),
            rhs: Box::new(builtin("add", &["x", "x"])),
        }),
    ];
    let (_, residual) = check_block(&block, &env).expect("bind chain");
    assert_eq!(
        residual.pure.lookup("y").map(|q| q.ty.clone()),
        Some(Type::uint(IntWidth::W128))
    );
}

fn ledger_env() -> DualEnv {
    // ledger : Map ByStr20 (Map ByStr32 Uint128)
    dual_env(
        &[
            ("addr", Type::address()),
            ("hash", Type::bystr(32)),
            ("amount", Type::uint(IntWidth::W128)),
        ],
        &[(
            "ledger",
            Type::map_of(
                Type::address(),
                Type::map_of(Type::bystr(32), Type::uint(IntWidth::W128)),
            ),
        )],
    )
}

#[test]
fn map_update_full_path() {
    let env = ledger_env();
    let block = [stmt(StmtKind::MapUpdate {
        map: id("ledger"),
        keys: vec![id("addr"), id("hash")],
        value: Some(id("amount")),
    })];
    check_block(&block, &env).expect("map update");
}

#[test]
fn map_update_partial_path_stores_submap() {
    let mut env = ledger_env();
    env.pure.bind(
        "inner",
        QualifiedType::plain(Type::map_of(Type::bystr(32), Type::uint(IntWidth::W128))),
    );
    let block = [stmt(StmtKind::MapUpdate {
        map: id("ledger"),
        keys: vec![id("addr")],
        value: Some(id("inner")),
    })];
    check_block(&block, &env).expect("submap update");
}

#[test]
fn map_update_key_type_mismatch() {
    let env = ledger_env();
    let block = [stmt(StmtKind::MapUpdate {
        map: id("ledger"),
        keys: vec![id("hash"), id("hash")],
        value: Some(id("amount")),
    })];
    check_block_err(&block, &env, Category::TypeMismatch);
}

#[test]
fn map_access_too_deep() {
    let env = ledger_env();
    let block = [stmt(StmtKind::MapUpdate {
        map: id("ledger"),
        keys: vec![id("addr"), id("hash"), id("hash")],
        value: Some(id("amount")),
    })];
    check_block_err(&block, &env, Category::Arity);
}

#[test]
fn map_delete_requires_full_depth() {
    let env = ledger_env();
    let partial = [stmt(StmtKind::MapUpdate {
        map: id("ledger"),
        keys: vec![id("addr")],
        value: None,
    })];
    let diag = check_block_err(&partial, &env, Category::Arity);
    assert!(diag.message.contains("2 key(s)"), "{diag}");

    let full = [stmt(StmtKind::MapUpdate {
        map: id("ledger"),
        keys: vec![id("addr"), id("hash")],
        value: None,
    })];
    check_block(&full, &env).expect("full-depth delete");
}

#[test]
fn map_get_binds_option_or_bool() {
    let env = ledger_env();
    let block = [
        stmt(StmtKind::MapGet {
            lhs: id("found"),
            map: id("ledger"),
            keys: vec![id("addr"), id("hash")],
            fetch: true,
        }),
        stmt(StmtKind::MapGet {
            lhs: id("exists"),
            map: id("ledger"),
            keys: vec![id("addr")],
            fetch: false,
        }),
    ];
    let (_, residual) = check_block(&block, &env).expect("map get");
    assert_eq!(
        residual.pure.lookup("found").map(|q| q.ty.clone()),
        Some(Type::option_of(Type::uint(IntWidth::W128)))
    );
    assert_eq!(
        residual.pure.lookup("exists").map(|q| q.ty.clone()),
        Some(Type::bool_adt())
    );
}

#[test]
fn read_from_blockchain() {
    let env = dual_env(&[], &[]);
    let block = [stmt(StmtKind::ReadFromBC {
        lhs: id("now"),
        field: "BLOCKNUMBER".to_string(),
    })];
    let (_, residual) = check_block(&block, &env).expect("bc read");
    assert_eq!(
        residual.pure.lookup("now").map(|q| q.ty.clone()),
        Some(Type::bnum())
    );

    let bad = [stmt(StmtKind::ReadFromBC {
        lhs: id("x"),
        field: "GASPRICE".to_string(),
    })];
    check_block_err(&bad, &env, Category::UnknownBCField);
}

#[test]
fn match_statement_discards_branch_bindings() {
    let env = dual_env(
        &[("opt", Type::option_of(Type::uint(IntWidth::W128)))],
        &[("count", Type::uint(IntWidth::W128))],
    );
    let match_stmt = stmt(StmtKind::MatchStmt {
        scrutinee: id("opt"),
        clauses: vec![
            StmtMatchClause {
                pattern: ctor_pat("Some", vec![binder("v")]),
                body: vec![stmt(StmtKind::Store {
                    field: id("count"),
                    rhs: id("v"),
                })],
            },
            StmtMatchClause {
                pattern: ctor_pat("None", vec![]),
                body: vec![],
            },
        ],
    });

    // Inside the branch `v` is usable...
    let (_, residual) = check_block(&[match_stmt.clone()], &env).expect("match stmt");
    assert!(residual.pure.lookup("v").is_none());

    // ...but a suffix statement cannot see it.
    let leaky = [
        match_stmt,
        stmt(StmtKind::Store {
            field: id("count"),
            rhs: id("v"),
        }),
    ];
    check_block_err(&leaky, &env, Category::Unbound);
}

#[test]
fn send_and_event_statements() {
    let env = dual_env(
        &[
            ("msgs", Type::list_of(Type::message())),
            ("one_msg", Type::message()),
            ("e", Type::event()),
        ],
        &[],
    );
    let ok = [
        stmt(StmtKind::AcceptPayment),
        stmt(StmtKind::SendMsgs(id("msgs"))),
        stmt(StmtKind::CreateEvnt(id("e"))),
    ];
    check_block(&ok, &env).expect("send/event");

    // A bare message is not a message list.
    let bad_send = [stmt(StmtKind::SendMsgs(id("one_msg")))];
    check_block_err(&bad_send, &env, Category::TypeMismatch);

    let bad_event = [stmt(StmtKind::CreateEvnt(id("one_msg")))];
    check_block_err(&bad_event, &env, Category::TypeMismatch);
}

#[test]
fn throw_is_not_supported() {
    let env = dual_env(&[("e", Type::event())], &[]);
    let block = [stmt(StmtKind::Throw(id("e")))];
    check_block_err(&block, &env, Category::NotImplemented);
}

// ---------------------------------------------------------------------------
// Module driver
// ---------------------------------------------------------------------------

fn none_init(inner: Type) -> Expr<Span> {
    constr("None", vec![inner], &[])
}

/// The puzzle-game contract header: three address params, a puzzle hash,
/// optional hash/timer fields, and three transitions.
fn game_module() -> ContractModule<Span> {
    let bystr32 = Type::bystr(32);
    ContractModule {
        name: named("PuzzleGame"),
        library: None,
        contract: Contract {
            name: named("PuzzleGame"),
            params: vec![
                (id_at("owner", 10), Type::address()),
                (id_at("player_a", 20), Type::address()),
                (id_at("player_b", 30), Type::address()),
                (id_at("puzzle", 40), bystr32.clone()),
            ],
            fields: vec![
                Field {
                    name: id_at("player_a_hash", 50),
                    ty: Type::option_of(bystr32.clone()),
                    init: none_init(bystr32.clone()),
                },
                Field {
                    name: id_at("player_b_hash", 60),
                    ty: Type::option_of(bystr32.clone()),
                    init: none_init(bystr32.clone()),
                },
                Field {
                    name: id_at("timer", 70),
                    ty: Type::option_of(Type::bnum()),
                    init: none_init(Type::bnum()),
                },
            ],
            transitions: vec![
                Transition {
                    name: Spanned::new("Play".to_string(), sp(80)),
                    params: vec![(id_at("guess", 81), bystr32.clone())],
                    body: vec![stmt(StmtKind::AcceptPayment)],
                },
                Transition {
                    name: Spanned::new("ClaimReward".to_string(), sp(90)),
                    params: vec![(id_at("solution", 91), Type::int(IntWidth::W128))],
                    body: vec![stmt(StmtKind::Load {
                        lhs: id("deadline"),
                        field: id("timer"),
                    })],
                },
                Transition {
                    name: Spanned::new("Withdraw".to_string(), sp(100)),
                    params: vec![],
                    body: vec![],
                },
            ],
        },
    }
}

#[test]
fn game_contract_header_checks_cleanly() {
    let checked = check_mod(&game_module(), &[], &[]).expect("game module");

    let contract = &checked.module.contract;
    assert_eq!(contract.params.len(), 4);
    assert_eq!(contract.fields.len(), 3);
    assert_eq!(contract.transitions.len(), 3);

    // Field idents carry their declared types.
    assert_eq!(
        contract.fields[0].name.ann.qty.ty,
        Type::option_of(Type::bystr(32))
    );
    // Every field type is storable, every param serializable.
    for field in &contract.fields {
        assert!(is_storable_type(&field.ty));
    }
    for (_, ty) in &contract.params {
        assert!(is_serializable_type(ty));
    }
    // The implicit balance field lands in the residual field environment.
    assert_eq!(
        checked.env.fields.lookup("_balance").map(|q| q.ty.clone()),
        Some(Type::uint(IntWidth::W128))
    );
    // Implicit params are bound in the residual pure environment.
    assert_eq!(
        checked.env.pure.lookup("_this_address").map(|q| q.ty.clone()),
        Some(Type::address())
    );
}

#[test]
fn map_field_with_empty_map_initializer() {
    let mut module = game_module();
    module.contract.fields.push(Field {
        name: id_at("scores", 75),
        ty: Type::map_of(Type::address(), Type::uint(IntWidth::W128)),
        init: lit(Literal::Emp(Type::address(), Type::uint(IntWidth::W128))),
    });
    module.contract.transitions[2].body = vec![stmt(StmtKind::MapUpdate {
        map: id("scores"),
        keys: vec![id("_sender")],
        value: Some(id("_amount")),
    })];
    check_mod(&module, &[], &[]).expect("map field");
}

#[test]
fn module_checking_is_idempotent() {
    let module = game_module();
    let first = check_mod(&module, &[], &[]).expect("first pass");
    let second = check_mod(&module, &[], &[]).expect("second pass");
    assert_eq!(first.module, second.module);
    assert_eq!(first.ext_libs, second.ext_libs);
    assert_eq!(first.env, second.env);
}

#[test]
fn transition_bodies_see_params_fields_and_implicits() {
    let mut module = game_module();
    module.contract.transitions[0].body = vec![
        stmt(StmtKind::Load {
            lhs: id("current"),
            field: id("player_a_hash"),
        }),
        stmt(StmtKind::Bind {
            lhs: id("wrapped"),
            rhs: Box::new(constr("Some", vec![Type::bystr(32)], &["guess"])),
        }),
        stmt(StmtKind::Store {
            field: id("player_a_hash"),
            rhs: id("wrapped"),
        }),
        stmt(StmtKind::Bind {
            lhs: id("from"),
            rhs: Box::new(var("_sender")),
        }),
    ];
    let checked = check_mod(&module, &[], &[]).expect("transition body");
    let body = &checked.module.contract.transitions[0].body;
    // The load's ident carries the field's declared type.
    assert_eq!(body[0].ann.qty.ty, Type::option_of(Type::bystr(32)));
    assert_eq!(body[3].ann.qty.ty, Type::address());
}

#[test]
fn transitions_do_not_leak_into_each_other() {
    let mut module = game_module();
    // `Play` binds a local; `Withdraw` must not see it.
    module.contract.transitions[0].body = vec![stmt(StmtKind::Bind {
        lhs: id("local"),
        rhs: Box::new(uint128_lit("1")),
    })];
    module.contract.transitions[2].body = vec![stmt(StmtKind::Bind {
        lhs: id("copy"),
        rhs: Box::new(var("local")),
    })];
    let err = check_mod(&module, &[], &[]).expect_err("leak");
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].category, Category::Unbound);
}

#[test]
fn recursion_primitives_feed_libraries() {
    let rec_prims = [LibEntry::Var {
        name: id("one"),
        init: uint32_lit("1"),
    }];
    let lib = Library {
        name: named("NumberLib"),
        entries: vec![LibEntry::Var {
            name: id("two"),
            init: builtin("add", &["one", "one"]),
        }],
    };
    let checked = check_mod(&game_module(), &rec_prims, &[lib]).expect("rec prims");
    assert_eq!(checked.ext_libs.len(), 1);
    assert_eq!(
        checked.env.pure.lookup("two").map(|q| q.ty.clone()),
        Some(Type::uint(IntWidth::W32))
    );
}

#[test]
fn recursion_primitives_reject_type_declarations() {
    let rec_prims = [LibEntry::Typ {
        name: named("Sneaky"),
        ctrs: vec![],
    }];
    let err = check_mod(&game_module(), &rec_prims, &[]).expect_err("rec prim type");
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].category, Category::RecPrimsTypeDecl);
}

#[test]
fn library_failure_blacklists_dependents() {
    // [good = 1; bad = "x" + 1; later = bad + bad] — one real error, one
    // suppression note, and `good` still lands in the typed output.
    let entries = vec![
        LibEntry::Var {
            name: id_at("good", 10),
            init: uint32_lit("1"),
        },
        LibEntry::Var {
            name: id_at("bad", 20),
            init: let_in(
                "sx",
                None,
                str_lit("x"),
                let_in(
                    "one",
                    None,
                    uint32_lit("1"),
                    builtin("add", &["sx", "one"]),
                ),
            ),
        },
        LibEntry::Var {
            name: id_at("later", 30),
            init: builtin("add", &["bad", "bad"]),
        },
    ];

    let adts = AdtRegistry::with_stdlib();
    let builtins = BuiltinDictionary::with_stdlib();
    let host = ContractHost::default();
    let mut ctx = CheckContext::new(&adts, &builtins, &host);
    let outcome = check_library_entries(
        &entries,
        &TypeEnv::new(),
        &std::collections::BTreeSet::new(),
        &mut ctx,
    );

    assert_eq!(outcome.diagnostics.len(), 2);
    assert_eq!(outcome.diagnostics[0].category, Category::UnknownBuiltin);
    assert_eq!(outcome.diagnostics[1].category, Category::DependencySkipped);
    assert!(outcome.diagnostics[1].message.contains("later"));
    assert!(outcome.diagnostics[1].message.contains("bad"));

    // Only `good` survives into the typed library, and only `good` is bound.
    let typed_names: Vec<&str> = outcome
        .typed_entries
        .iter()
        .map(|entry| match entry {
            LibEntry::Var { name, .. } => name.as_str(),
            LibEntry::Typ { name, .. } => name.node.as_str(),
        })
        .collect();
    assert_eq!(typed_names, vec!["good"]);
    assert!(outcome.env.lookup("good").is_some());
    assert!(outcome.env.lookup("bad").is_none());
    assert!(outcome.env.lookup("later").is_none());
    assert_eq!(
        outcome.blacklist.into_iter().collect::<Vec<_>>(),
        vec!["bad".to_string(), "later".to_string()]
    );
}

#[test]
fn module_with_failing_library_reports_all_errors() {
    let mut module = game_module();
    module.library = Some(Library {
        name: named("GameLib"),
        entries: vec![
            LibEntry::Var {
                name: id_at("good", 1),
                init: uint32_lit("1"),
            },
            LibEntry::Var {
                name: id_at("bad", 2),
                init: builtin("add", &["good", "missing"]),
            },
            LibEntry::Var {
                name: id_at("later", 3),
                init: builtin("add", &["bad", "bad"]),
            },
        ],
    });
    let err = check_mod(&module, &[], &[]).expect_err("library errors");
    let cats: Vec<Category> = err.diagnostics().iter().map(|d| d.category).collect();
    assert_eq!(cats, vec![Category::Unbound, Category::DependencySkipped]);
}

#[test]
fn non_storable_field_is_reported_and_checking_continues() {
    let mut module = game_module();
    module.contract.fields.push(Field {
        name: id_at("pending", 110),
        ty: Type::message(),
        init: uint128_lit("0"),
    });
    // Put an unrelated error into a transition to show accumulation.
    module.contract.transitions[2].body = vec![stmt(StmtKind::Bind {
        lhs: id("x"),
        rhs: Box::new(Expr::new(
            ExprKind::Var(Ident::new("missing", sp(130))),
            sp(130),
        )),
    })];
    let err = check_mod(&module, &[], &[]).expect_err("bad field");
    let cats: Vec<Category> = err.diagnostics().iter().map(|d| d.category).collect();
    assert_eq!(cats, vec![Category::NonStorable, Category::Unbound]);
}

#[test]
fn field_initializer_mismatch_is_reported() {
    let mut module = game_module();
    module.contract.fields[2].init = uint128_lit("0");
    let err = check_mod(&module, &[], &[]).expect_err("field init");
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].category, Category::TypeMismatch);
}

#[test]
fn non_serializable_transition_param_is_rejected() {
    let mut module = game_module();
    module.contract.transitions[0].params = vec![(
        id_at("snapshot", 81),
        Type::map_of(Type::address(), Type::uint(IntWidth::W128)),
    )];
    let err = check_mod(&module, &[], &[]).expect_err("map param");
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].category, Category::NonSerializable);
}

#[test]
fn non_serializable_contract_param_aborts() {
    let mut module = game_module();
    module.contract.params.push((
        id_at("snapshot", 45),
        Type::map_of(Type::address(), Type::uint(IntWidth::W128)),
    ));
    let err = check_mod(&module, &[], &[]).expect_err("contract param");
    assert_eq!(
        err.diagnostics().last().map(|d| d.category),
        Some(Category::NonSerializable)
    );
}

#[test]
fn duplicate_declarations_are_reported() {
    let mut module = game_module();
    module.contract.fields.push(Field {
        name: id_at("timer", 120),
        ty: Type::option_of(Type::bnum()),
        init: none_init(Type::bnum()),
    });
    let err = check_mod(&module, &[], &[]).expect_err("duplicate field");
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].category, Category::DuplicateBinding);
}

#[test]
fn diagnostics_are_deterministic_and_source_ordered() {
    let mut module = game_module();
    // Two independent failures, declared out of source order.
    module.contract.transitions[1].body = vec![stmt(StmtKind::Bind {
        lhs: id("x"),
        rhs: Box::new(Expr::new(ExprKind::Var(Ident::new("late", sp(200))), sp(200))),
    })];
    module.contract.transitions[0].body = vec![stmt(StmtKind::Bind {
        lhs: id("y"),
        rhs: Box::new(Expr::new(ExprKind::Var(Ident::new("early", sp(85))), sp(85))),
    })];

    let first = check_mod(&module, &[], &[]).expect_err("first");
    let second = check_mod(&module, &[], &[]).expect_err("second");
    assert_eq!(first.diagnostics(), second.diagnostics());

    let starts: Vec<u32> = first
        .diagnostics()
        .iter()
        .filter_map(|d| d.location.map(|loc| loc.start))
        .collect();
    assert_eq!(starts, vec![85, 200]);
}

#[test]
fn tracing_records_rules_when_enabled() {
    let adts = AdtRegistry::with_stdlib();
    let builtins = BuiltinDictionary::with_stdlib();
    let host = ContractHost::default();
    let mut ctx = CheckContext::new(&adts, &builtins, &host);

    // Disabled by default: no steps accumulate.
    let env = TypeEnv::new();
    check_expr(&uint128_lit("1"), &env, &mut ctx).expect("literal");
    assert!(ctx.take_trace().is_empty());

    ctx.enable_tracing();
    let expr = let_in("n", None, uint128_lit("5"), var("n"));
    check_expr(&expr, &env, &mut ctx).expect("let");
    let steps = ctx.take_trace();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps.last().map(|s| s.ty.as_str()), Some("Uint128"));
}

#[test]
fn residual_environment_orders_deterministically() {
    let module = game_module();
    let checked = check_mod(&module, &[], &[]).expect("game module");
    let names: Vec<&str> = checked.env.fields.names().collect();
    assert_eq!(
        names,
        vec!["_balance", "player_a_hash", "player_b_hash", "timer"]
    );
}
