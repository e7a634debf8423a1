//! Error reporting and diagnostics for Scrip.
//!
//! This crate provides structured diagnostics with source location tracking.
//! Diagnostics are created by other crates (for example, `scrip-check`) and
//! rendered here for display.
//!
//! The crate is deliberately independent of `scrip-ast`: callers convert
//! their spans into [`SourceLocation`] byte ranges.

use std::fmt;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Broad category for diagnostics. Used for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Identifier not in scope.
    Unbound,
    /// Type mismatch: expected X, got Y.
    TypeMismatch,
    /// Wrong number of arguments: function, constructor, type application,
    /// or map indexing depth.
    Arity,
    /// Free type variable or unknown ADT name in a type.
    NotWellFormed,
    /// No builtin operator matches the name and argument signature.
    UnknownBuiltin,
    /// A contract field's type cannot be kept in contract state.
    NonStorable,
    /// A transition parameter or message payload type cannot cross the
    /// contract boundary.
    NonSerializable,
    /// Match expression with no clauses.
    EmptyMatch,
    /// Message or event header field with the wrong type, or a malformed
    /// header set.
    BadMessageField,
    /// Store to a read-only contract field.
    WriteToReadOnly,
    /// Type declaration inside the recursion-primitive block.
    RecPrimsTypeDecl,
    /// Unknown blockchain read field.
    UnknownBCField,
    /// Construct the checker does not support.
    NotImplemented,
    /// Library entry skipped because a definition it depends on failed.
    DependencySkipped,
    /// Two contract declarations claim the same name.
    DuplicateBinding,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Category::Unbound,
        Category::TypeMismatch,
        Category::Arity,
        Category::NotWellFormed,
        Category::UnknownBuiltin,
        Category::NonStorable,
        Category::NonSerializable,
        Category::EmptyMatch,
        Category::BadMessageField,
        Category::WriteToReadOnly,
        Category::RecPrimsTypeDecl,
        Category::UnknownBCField,
        Category::NotImplemented,
        Category::DependencySkipped,
        Category::DuplicateBinding,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Unbound => "unbound",
            Category::TypeMismatch => "type_mismatch",
            Category::Arity => "arity",
            Category::NotWellFormed => "not_well_formed",
            Category::UnknownBuiltin => "unknown_builtin",
            Category::NonStorable => "non_storable",
            Category::NonSerializable => "non_serializable",
            Category::EmptyMatch => "empty_match",
            Category::BadMessageField => "bad_message_field",
            Category::WriteToReadOnly => "write_to_read_only",
            Category::RecPrimsTypeDecl => "rec_prims_type_decl",
            Category::UnknownBCField => "unknown_bc_field",
            Category::NotImplemented => "not_implemented",
            Category::DependencySkipped => "dependency_skipped",
            Category::DuplicateBinding => "duplicate_binding",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::Unbound => "S0001",
            Category::TypeMismatch => "S0002",
            Category::Arity => "S0003",
            Category::NotWellFormed => "S0004",
            Category::UnknownBuiltin => "S0005",
            Category::NonStorable => "S0006",
            Category::NonSerializable => "S0007",
            Category::EmptyMatch => "S0008",
            Category::BadMessageField => "S0009",
            Category::WriteToReadOnly => "S0010",
            Category::RecPrimsTypeDecl => "S0011",
            Category::UnknownBCField => "S0012",
            Category::NotImplemented => "S0013",
            Category::DependencySkipped => "S0014",
            Category::DuplicateBinding => "S0015",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Unbound => "A referenced variable or name is not in scope.",
            Category::TypeMismatch => "Expression type does not match expected type.",
            Category::Arity => {
                "A function, constructor, type application, or map access was \
                 given the wrong number of arguments."
            }
            Category::NotWellFormed => {
                "A type mentions an unbound type variable or an unknown ADT."
            }
            Category::UnknownBuiltin => {
                "No builtin operator matches this name and argument signature."
            }
            Category::NonStorable => "This type cannot be stored in a contract field.",
            Category::NonSerializable => {
                "This type cannot be a transition parameter or message payload."
            }
            Category::EmptyMatch => "A match expression has no clauses.",
            Category::BadMessageField => {
                "A message or event header field is missing or has the wrong type."
            }
            Category::WriteToReadOnly => "This contract field is read-only.",
            Category::RecPrimsTypeDecl => {
                "The recursion-primitive block may only contain value definitions."
            }
            Category::UnknownBCField => "Unknown blockchain read field.",
            Category::NotImplemented => "The checker does not support this construct.",
            Category::DependencySkipped => {
                "A library definition was skipped because something it uses failed."
            }
            Category::DuplicateBinding => {
                "A parameter, field, or transition name is declared more than once."
            }
        }
    }

    pub fn example_fix(self) -> &'static str {
        match self {
            Category::Unbound => "Define or import the missing name, or fix the spelling.",
            Category::TypeMismatch => {
                "Adjust the expression or its annotation so both sides agree."
            }
            Category::Arity => "Supply exactly the declared number of arguments.",
            Category::NotWellFormed => {
                "Bind the type variable with `tfun`, or register the ADT before use."
            }
            Category::UnknownBuiltin => {
                "Check the operator name and the types of its operands."
            }
            Category::NonStorable => {
                "Fields may not hold functions, messages, or events; store data instead."
            }
            Category::NonSerializable => {
                "Pass maps and closures through fields, not parameters or messages."
            }
            Category::EmptyMatch => "Add at least one clause to the match.",
            Category::BadMessageField => {
                "Give the header its required type; see the message header table."
            }
            Category::WriteToReadOnly => {
                "Use `accept` to receive funds; `_balance` cannot be assigned."
            }
            Category::RecPrimsTypeDecl => "Move the type declaration into a library.",
            Category::UnknownBCField => "Read one of the supported chain fields.",
            Category::NotImplemented => "Remove the unsupported construct.",
            Category::DependencySkipped => "Fix the failed definition it depends on.",
            Category::DuplicateBinding => "Rename one of the colliding declarations.",
        }
    }
}

// ---------------------------------------------------------------------------
// Source locations (independent of scrip-ast's Span)
// ---------------------------------------------------------------------------

/// A source location for diagnostics.
///
/// Uses byte offsets. Callers convert from `scrip-ast` spans to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    pub file_id: u32,
    pub start: u32,
    pub end: u32,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
///
/// Every diagnostic carries enough context to produce an actionable error
/// message without exposing checker internals.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. S0002).
    pub code: Option<String>,
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub location: Option<SourceLocation>,
    /// Additional labeled spans (e.g., "while typechecking this expression").
    pub labels: Vec<DiagLabel>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

/// A labeled source span within a diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagLabel {
    pub location: SourceLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Warning,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the location only if none has been attached yet. Used when
    /// wrapping leaf failures with the enclosing expression's location.
    pub fn at_outer(mut self, location: SourceLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    pub fn with_label(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.labels.push(DiagLabel {
            location,
            message: message.into(),
        });
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        if let Some(code) = &self.code {
            write!(f, "{prefix}[{code}]: {}", self.message)?;
        } else {
            write!(f, "{prefix}: {}", self.message)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

/// Stable source ordering for accumulated diagnostics: by location, with
/// located entries before synthetic ones. Ties keep insertion order when
/// used with a stable sort.
pub fn sort_into_source_order(diags: &mut [Diagnostic]) {
    diags.sort_by_key(|d| match d.location {
        Some(loc) => (0u8, loc.file_id, loc.start, loc.end),
        None => (1u8, 0, 0, 0),
    });
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_builder() {
        let loc = SourceLocation {
            file_id: 0,
            start: 10,
            end: 20,
        };
        let diag = Diagnostic::error(Category::TypeMismatch, "expected Uint128, got Int32")
            .at(loc)
            .with_help("message `_amount` fields carry Uint128");

        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some("S0002"));
        assert_eq!(diag.category, Category::TypeMismatch);
        assert!(diag.message.contains("expected Uint128"));
        assert!(diag.help.unwrap().contains("_amount"));
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::error(Category::Unbound, "unbound variable `owner`");
        let s = format!("{diag}");
        assert!(s.starts_with("error[S0001]: unbound variable `owner`"));
    }

    #[test]
    fn at_outer_keeps_inner_location() {
        let inner = SourceLocation {
            file_id: 0,
            start: 3,
            end: 5,
        };
        let outer = SourceLocation {
            file_id: 0,
            start: 0,
            end: 9,
        };
        let diag = Diagnostic::error(Category::TypeMismatch, "m").at(inner).at_outer(outer);
        assert_eq!(diag.location, Some(inner));

        let diag = Diagnostic::error(Category::TypeMismatch, "m").at_outer(outer);
        assert_eq!(diag.location, Some(outer));
    }

    #[test]
    fn source_order_is_stable() {
        let loc = |start| SourceLocation {
            file_id: 0,
            start,
            end: start + 1,
        };
        let mut diags = vec![
            Diagnostic::error(Category::Unbound, "c").at(loc(30)),
            Diagnostic::error(Category::Unbound, "a").at(loc(10)),
            Diagnostic::error(Category::Unbound, "synthetic"),
            Diagnostic::error(Category::Unbound, "b").at(loc(10)),
        ];
        sort_into_source_order(&mut diags);
        let order: Vec<&str> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(order, ["a", "b", "c", "synthetic"]);
    }

    #[test]
    fn category_metadata_is_stable_and_unique() {
        let mut codes = std::collections::BTreeSet::new();
        for cat in Category::all() {
            assert!(!cat.as_str().is_empty());
            assert!(!cat.description().is_empty());
            assert!(!cat.example_fix().is_empty());
            assert!(
                codes.insert(cat.code()),
                "duplicate diagnostic code detected: {}",
                cat.code()
            );
        }
    }
}
