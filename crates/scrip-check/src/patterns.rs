//! Pattern typing for match expressions and match statements.
//!
//! Given the scrutinee type and a pattern, produce the decorated pattern
//! and the bindings it introduces. Bindings are returned in document order
//! (leftmost binder first); environment construction and downstream
//! consumers rely on that ordering.

use scrip_ast::{Ident, Pattern, Span};
use scrip_diag::{Category, Diagnostic, SourceLocation};
use scrip_types::{constr_pattern_arg_types, AdtRegistry, ElabError, QualifiedType, Type};

use crate::{add_type_to_ident, TypedPattern};

/// A binding introduced by a pattern: the binder occurrence and its type.
pub type PatternBinding = (Ident<Span>, QualifiedType);

/// Type a pattern against its scrutinee type.
///
/// Returns the decorated pattern and the introduced bindings, leftmost
/// first. Constructor subpatterns are checked against the substituted
/// argument types of the scrutinee's ADT instantiation.
pub fn assign_types_for_pattern(
    adts: &AdtRegistry,
    scrutinee_ty: &Type,
    pattern: &Pattern<Span>,
    loc: SourceLocation,
) -> Result<(TypedPattern, Vec<PatternBinding>), Diagnostic> {
    match pattern {
        Pattern::Wildcard => Ok((Pattern::Wildcard, Vec::new())),
        Pattern::Binder(ident) => {
            let qty = QualifiedType::plain(scrutinee_ty.clone());
            let typed = Pattern::Binder(add_type_to_ident(ident, qty.clone()));
            Ok((typed, vec![(ident.clone(), qty)]))
        }
        Pattern::Constructor { name, args } => {
            let arg_tys = constr_pattern_arg_types(adts, scrutinee_ty, name)
                .map_err(|err| elab_error_to_diag(err, scrutinee_ty, loc))?;
            if arg_tys.len() != args.len() {
                return Err(Diagnostic::error(
                    Category::Arity,
                    format!(
                        "constructor `{name}` takes {} argument(s), pattern has {}",
                        arg_tys.len(),
                        args.len()
                    ),
                )
                .at(loc));
            }
            let mut typed_args = Vec::with_capacity(args.len());
            let mut bindings = Vec::new();
            for (arg_ty, sub) in arg_tys.iter().zip(args) {
                let (typed_sub, sub_bindings) =
                    assign_types_for_pattern(adts, arg_ty, sub, loc)?;
                typed_args.push(typed_sub);
                bindings.extend(sub_bindings);
            }
            Ok((
                Pattern::Constructor {
                    name: name.clone(),
                    args: typed_args,
                },
                bindings,
            ))
        }
    }
}

fn elab_error_to_diag(err: ElabError, scrutinee_ty: &Type, loc: SourceLocation) -> Diagnostic {
    match err {
        ElabError::UnknownConstructor(name) => Diagnostic::error(
            Category::Unbound,
            format!("unknown constructor `{name}` in pattern"),
        )
        .at(loc),
        ElabError::Arity { expected, got } => Diagnostic::error(
            Category::Arity,
            format!("scrutinee ADT expects {expected} type argument(s), got {got}"),
        )
        .at(loc),
        ElabError::NotAnAdt(ty) => Diagnostic::error(
            Category::TypeMismatch,
            format!("cannot match a constructor pattern against {ty}"),
        )
        .at(loc),
        ElabError::ConstructorMismatch { ctr, adt } => Diagnostic::error(
            Category::TypeMismatch,
            format!(
                "constructor `{ctr}` does not belong to `{adt}` (scrutinee has type {scrutinee_ty})"
            ),
        )
        .at(loc),
    }
}
