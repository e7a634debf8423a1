//! Synthetic contract builders shared by the scrip benchmarks.

use scrip_ast::{
    Contract, ContractModule, Expr, ExprKind, Field, FileId, Ident, Span, Spanned, Stmt, StmtKind,
    Transition,
};
use scrip_types::{IntWidth, Type};

fn s() -> Span {
    Span::new(FileId(0), 0, 1)
}

fn id(name: &str) -> Ident<Span> {
    Ident::new(name, s())
}

fn uint128_lit(digits: &str) -> Expr<Span> {
    Expr::new(
        ExprKind::Literal(scrip_ast::Literal::Uint(IntWidth::W128, digits.to_string())),
        s(),
    )
}

/// A let-chain of the given depth ending in the innermost binding:
/// `let x0 = 0 in let x1 = x0 in ... in x_{n-1}`.
pub fn deep_let_chain(depth: usize) -> Expr<Span> {
    let mut body = Expr::new(ExprKind::Var(id(&format!("x{}", depth - 1))), s());
    for i in (0..depth).rev() {
        let value = if i == 0 {
            uint128_lit("0")
        } else {
            Expr::new(ExprKind::Var(id(&format!("x{}", i - 1))), s())
        };
        body = Expr::new(
            ExprKind::Let {
                lhs: id(&format!("x{i}")),
                annot: None,
                value: Box::new(value),
                body: Box::new(body),
            },
            s(),
        );
    }
    body
}

/// A token-ledger contract with one balance map field and `transitions`
/// deposit-shaped transitions, each reading and writing the ledger.
pub fn ledger_contract(transitions: usize) -> ContractModule<Span> {
    let ledger_ty = Type::map_of(Type::address(), Type::uint(IntWidth::W128));
    let body = vec![
        Stmt::new(StmtKind::AcceptPayment, s()),
        Stmt::new(
            StmtKind::Bind {
                lhs: id("from"),
                rhs: Box::new(Expr::new(ExprKind::Var(id("_sender")), s())),
            },
            s(),
        ),
        Stmt::new(
            StmtKind::MapGet {
                lhs: id("held"),
                map: id("ledger"),
                keys: vec![id("from")],
                fetch: true,
            },
            s(),
        ),
        Stmt::new(
            StmtKind::MapUpdate {
                map: id("ledger"),
                keys: vec![id("from")],
                value: Some(id("_amount")),
            },
            s(),
        ),
    ];
    ContractModule {
        name: Spanned::new("Ledger".to_string(), s()),
        library: None,
        contract: Contract {
            name: Spanned::new("Ledger".to_string(), s()),
            params: vec![(id("owner"), Type::address())],
            fields: vec![
                Field {
                    name: id("total"),
                    ty: Type::uint(IntWidth::W128),
                    init: uint128_lit("0"),
                },
                Field {
                    name: id("ledger"),
                    ty: ledger_ty.clone(),
                    init: Expr::new(
                        ExprKind::Literal(scrip_ast::Literal::Emp(
                            Type::address(),
                            Type::uint(IntWidth::W128),
                        )),
                        s(),
                    ),
                },
            ],
            transitions: (0..transitions)
                .map(|i| Transition {
                    name: Spanned::new(format!("Deposit{i}"), s()),
                    params: vec![],
                    body: body.clone(),
                })
                .collect(),
        },
    }
}
