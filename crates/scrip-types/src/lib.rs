//! Type representations for Scrip.
//!
//! This crate defines the semantic types used by the contract type checker:
//! the type grammar itself, qualified types, equivalence and substitution,
//! the storability discipline on field and message values, the ADT registry,
//! and the builtin-operator dictionary.
//!
//! Everything here is diagnostic-free: operations that can fail return small
//! structured error values, and `scrip-check` converts them into located
//! diagnostics.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Primitive types
// ---------------------------------------------------------------------------

/// Bit-width for the fixed-size integer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntWidth {
    W32,
    W64,
    W128,
    W256,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
            IntWidth::W128 => 128,
            IntWidth::W256 => 256,
        }
    }
}

/// A primitive contract type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimType {
    /// Signed integer of a fixed width.
    Int(IntWidth),
    /// Unsigned integer of a fixed width.
    Uint(IntWidth),
    String,
    /// Block number.
    BNum,
    /// An outgoing message value.
    Message,
    /// An emitted event value.
    Event,
    /// Byte string of a fixed length; `ByStr(20)` is the address type.
    ByStr(usize),
}

impl fmt::Display for PrimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimType::Int(w) => write!(f, "Int{}", w.bits()),
            PrimType::Uint(w) => write!(f, "Uint{}", w.bits()),
            PrimType::String => write!(f, "String"),
            PrimType::BNum => write!(f, "BNum"),
            PrimType::Message => write!(f, "Message"),
            PrimType::Event => write!(f, "Event"),
            PrimType::ByStr(n) => write!(f, "ByStr{n}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A semantic type in Scrip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Prim(PrimType),
    /// Key type must be primitive; enforced by well-formedness checks.
    Map(Box<Type>, Box<Type>),
    /// Monomorphic arrow.
    Fun(Box<Type>, Box<Type>),
    /// Named algebraic type with positional type arguments.
    Adt(String, Vec<Type>),
    /// Free only inside a surrounding `PolyFun`.
    TypeVar(String),
    /// Universally quantified over one variable; nested for multi-parameter
    /// polymorphism.
    PolyFun(String, Box<Type>),
}

impl Type {
    pub fn int(width: IntWidth) -> Type {
        Type::Prim(PrimType::Int(width))
    }

    pub fn uint(width: IntWidth) -> Type {
        Type::Prim(PrimType::Uint(width))
    }

    pub fn string() -> Type {
        Type::Prim(PrimType::String)
    }

    pub fn bnum() -> Type {
        Type::Prim(PrimType::BNum)
    }

    pub fn message() -> Type {
        Type::Prim(PrimType::Message)
    }

    pub fn event() -> Type {
        Type::Prim(PrimType::Event)
    }

    pub fn bystr(len: usize) -> Type {
        Type::Prim(PrimType::ByStr(len))
    }

    /// The address type: a 20-byte string.
    pub fn address() -> Type {
        Type::bystr(20)
    }

    pub fn fun(dom: Type, cod: Type) -> Type {
        Type::Fun(Box::new(dom), Box::new(cod))
    }

    pub fn map_of(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn bool_adt() -> Type {
        Type::Adt("Bool".to_string(), vec![])
    }

    pub fn nat_adt() -> Type {
        Type::Adt("Nat".to_string(), vec![])
    }

    pub fn option_of(inner: Type) -> Type {
        Type::Adt("Option".to_string(), vec![inner])
    }

    pub fn list_of(elem: Type) -> Type {
        Type::Adt("List".to_string(), vec![elem])
    }

    pub fn is_prim(&self) -> bool {
        matches!(self, Type::Prim(_))
    }
}

fn fmt_nested(ty: &Type, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Compound types are parenthesized when they appear as arguments.
    match ty {
        Type::Prim(_) | Type::TypeVar(_) => write!(f, "{ty}"),
        Type::Adt(_, args) if args.is_empty() => write!(f, "{ty}"),
        _ => write!(f, "({ty})"),
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Prim(p) => write!(f, "{p}"),
            Type::Map(k, v) => {
                write!(f, "Map ")?;
                fmt_nested(k, f)?;
                write!(f, " ")?;
                fmt_nested(v, f)
            }
            Type::Fun(dom, cod) => {
                match dom.as_ref() {
                    Type::Fun(_, _) | Type::PolyFun(_, _) => write!(f, "({dom})")?,
                    _ => write!(f, "{dom}")?,
                }
                write!(f, " -> {cod}")
            }
            Type::Adt(name, args) => {
                write!(f, "{name}")?;
                for arg in args {
                    write!(f, " ")?;
                    fmt_nested(arg, f)?;
                }
                Ok(())
            }
            Type::TypeVar(name) => write!(f, "{name}"),
            Type::PolyFun(tvar, body) => write!(f, "forall {tvar}. {body}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Qualified types
// ---------------------------------------------------------------------------

/// Qualification metadata attached to every checked type.
///
/// The slot is reserved for future refinements; today every leaf produces
/// `Plain`. It must survive decoration unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeQual {
    Plain,
}

/// A type paired with its qualification metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedType {
    pub ty: Type,
    pub qual: TypeQual,
}

impl QualifiedType {
    pub fn plain(ty: Type) -> Self {
        Self {
            ty,
            qual: TypeQual::Plain,
        }
    }
}

impl fmt::Display for QualifiedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)
    }
}

// ---------------------------------------------------------------------------
// Free variables and substitution
// ---------------------------------------------------------------------------

/// Collect the free type variables of a type.
pub fn free_tvars(ty: &Type) -> BTreeSet<String> {
    fn go(ty: &Type, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
        match ty {
            Type::Prim(_) => {}
            Type::Map(k, v) | Type::Fun(k, v) => {
                go(k, bound, out);
                go(v, bound, out);
            }
            Type::Adt(_, args) => {
                for arg in args {
                    go(arg, bound, out);
                }
            }
            Type::TypeVar(name) => {
                if !bound.iter().any(|b| b == name) {
                    out.insert(name.clone());
                }
            }
            Type::PolyFun(tvar, body) => {
                bound.push(tvar.clone());
                go(body, bound, out);
                bound.pop();
            }
        }
    }
    let mut out = BTreeSet::new();
    go(ty, &mut Vec::new(), &mut out);
    out
}

/// Substitute `replacement` for the free occurrences of `tvar` in `ty`.
///
/// Shadowing-aware but not capture-avoiding: callers only substitute closed
/// types (elaboration arguments are checked well-formed first), so capture
/// cannot arise.
pub fn subst_type(tvar: &str, replacement: &Type, ty: &Type) -> Type {
    match ty {
        Type::Prim(_) => ty.clone(),
        Type::Map(k, v) => Type::Map(
            Box::new(subst_type(tvar, replacement, k)),
            Box::new(subst_type(tvar, replacement, v)),
        ),
        Type::Fun(dom, cod) => Type::Fun(
            Box::new(subst_type(tvar, replacement, dom)),
            Box::new(subst_type(tvar, replacement, cod)),
        ),
        Type::Adt(name, args) => Type::Adt(
            name.clone(),
            args.iter()
                .map(|a| subst_type(tvar, replacement, a))
                .collect(),
        ),
        Type::TypeVar(name) => {
            if name == tvar {
                replacement.clone()
            } else {
                ty.clone()
            }
        }
        Type::PolyFun(bound, body) => {
            if bound == tvar {
                // Inner binder shadows the substituted variable.
                ty.clone()
            } else {
                Type::PolyFun(bound.clone(), Box::new(subst_type(tvar, replacement, body)))
            }
        }
    }
}

/// Apply a sequence of substitutions left to right.
pub fn subst_types(pairs: &[(String, Type)], ty: &Type) -> Type {
    pairs
        .iter()
        .fold(ty.clone(), |acc, (tvar, rep)| subst_type(tvar, rep, &acc))
}

// ---------------------------------------------------------------------------
// Equivalence
// ---------------------------------------------------------------------------

/// Nominal equivalence modulo alpha-renaming of `PolyFun` binders.
///
/// Bound variables compare by binder depth; free variables compare by name.
pub fn type_equiv(a: &Type, b: &Type) -> bool {
    fn rindex(stack: &[String], name: &str) -> Option<usize> {
        stack.iter().rposition(|entry| entry == name)
    }

    fn go(a: &Type, b: &Type, sa: &mut Vec<String>, sb: &mut Vec<String>) -> bool {
        match (a, b) {
            (Type::Prim(p), Type::Prim(q)) => p == q,
            (Type::Map(ka, va), Type::Map(kb, vb)) => go(ka, kb, sa, sb) && go(va, vb, sa, sb),
            (Type::Fun(da, ca), Type::Fun(db, cb)) => go(da, db, sa, sb) && go(ca, cb, sa, sb),
            (Type::Adt(na, aa), Type::Adt(nb, ab)) => {
                na == nb
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(x, y)| go(x, y, sa, sb))
            }
            (Type::TypeVar(x), Type::TypeVar(y)) => match (rindex(sa, x), rindex(sb, y)) {
                (Some(i), Some(j)) => i == j,
                (None, None) => x == y,
                _ => false,
            },
            (Type::PolyFun(x, ba), Type::PolyFun(y, bb)) => {
                sa.push(x.clone());
                sb.push(y.clone());
                let eq = go(ba, bb, sa, sb);
                sa.pop();
                sb.pop();
                eq
            }
            _ => false,
        }
    }

    go(a, b, &mut Vec::new(), &mut Vec::new())
}

// ---------------------------------------------------------------------------
// Application and instantiation
// ---------------------------------------------------------------------------

/// Why a (type-)application did not fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// More arguments than the type has arrows/binders.
    Arity { expected: usize, got: usize },
    /// An argument did not match the arrow's domain.
    Mismatch { expected: Type, got: Type },
}

/// Walk a chain of arrows, matching each argument against the current
/// domain, and return the final codomain.
pub fn fun_type_applies(fty: &Type, arg_tys: &[Type]) -> Result<Type, ApplyError> {
    let mut current = fty;
    for (idx, arg) in arg_tys.iter().enumerate() {
        match current {
            Type::Fun(dom, cod) => {
                if !type_equiv(dom, arg) {
                    return Err(ApplyError::Mismatch {
                        expected: (**dom).clone(),
                        got: arg.clone(),
                    });
                }
                current = cod;
            }
            _ => {
                return Err(ApplyError::Arity {
                    expected: idx,
                    got: arg_tys.len(),
                });
            }
        }
    }
    Ok(current.clone())
}

/// Instantiate nested `PolyFun` binders in order with the given arguments.
pub fn elab_tfun_with_args(pfty: &Type, type_args: &[Type]) -> Result<Type, ApplyError> {
    let mut current = pfty.clone();
    for (idx, targ) in type_args.iter().enumerate() {
        match current {
            Type::PolyFun(tvar, body) => {
                current = subst_type(&tvar, targ, &body);
            }
            _ => {
                return Err(ApplyError::Arity {
                    expected: idx,
                    got: type_args.len(),
                });
            }
        }
    }
    Ok(current)
}

// ---------------------------------------------------------------------------
// Storability and serializability
// ---------------------------------------------------------------------------

/// Describes why a type cannot be stored or serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorabilityViolation {
    /// The offending (sub)type.
    pub ty: Type,
    /// Human-readable reason.
    pub reason: String,
}

/// Whether a type may appear as a contract field's declared type.
///
/// `Message`, `Event` and anything with function types are never storable;
/// maps and ADTs are storable when every component is.
pub fn is_storable_type(ty: &Type) -> bool {
    storable_violation(ty).is_none()
}

/// Whether a type may cross the contract boundary: transition parameters
/// and message payload values. A strict subset of storable: maps stay in
/// contract state.
pub fn is_serializable_type(ty: &Type) -> bool {
    serializable_violation(ty).is_none()
}

/// Find the first storability violation in a type, or `None` if storable.
pub fn storable_violation(ty: &Type) -> Option<StorabilityViolation> {
    boundary_violation(ty, false)
}

/// Find the first serializability violation in a type, or `None`.
pub fn serializable_violation(ty: &Type) -> Option<StorabilityViolation> {
    boundary_violation(ty, true)
}

fn boundary_violation(ty: &Type, exclude_maps: bool) -> Option<StorabilityViolation> {
    match ty {
        Type::Prim(PrimType::Message) | Type::Prim(PrimType::Event) => {
            Some(StorabilityViolation {
                ty: ty.clone(),
                reason: "messages and events are transient values".to_string(),
            })
        }
        Type::Prim(_) => None,
        Type::Map(k, v) => {
            if exclude_maps {
                Some(StorabilityViolation {
                    ty: ty.clone(),
                    reason: "maps live in contract state and cannot cross the boundary"
                        .to_string(),
                })
            } else {
                boundary_violation(k, exclude_maps).or_else(|| boundary_violation(v, exclude_maps))
            }
        }
        Type::Fun(_, _) | Type::PolyFun(_, _) => Some(StorabilityViolation {
            ty: ty.clone(),
            reason: "function values have no stored representation".to_string(),
        }),
        Type::TypeVar(_) => Some(StorabilityViolation {
            ty: ty.clone(),
            reason: "open type variables have no stored representation".to_string(),
        }),
        Type::Adt(_, args) => args
            .iter()
            .find_map(|arg| boundary_violation(arg, exclude_maps)),
    }
}

// ---------------------------------------------------------------------------
// ADT registry
// ---------------------------------------------------------------------------

/// One constructor of an ADT. `arg_types` are schemas over the declaring
/// ADT's type parameters (as `TypeVar`s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtrInfo {
    pub name: String,
    pub arity: usize,
    pub arg_types: Vec<Type>,
}

impl CtrInfo {
    pub fn new(name: impl Into<String>, arg_types: Vec<Type>) -> Self {
        let name = name.into();
        Self {
            arity: arg_types.len(),
            name,
            arg_types,
        }
    }
}

/// A registered algebraic data type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtInfo {
    pub name: String,
    pub tparams: Vec<String>,
    pub ctrs: Vec<CtrInfo>,
}

/// The ambient registry of ADTs and their constructors.
///
/// Constructor names are globally unique: a lookup by constructor name
/// resolves to its declaring ADT. The registry ships with the standard
/// contract ADTs and accepts host registration of user types.
#[derive(Debug, Clone, Default)]
pub struct AdtRegistry {
    adts: BTreeMap<String, AdtInfo>,
    ctr_owner: BTreeMap<String, String>,
}

impl AdtRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with `Bool`, `Nat`, `Option`, `List` and
    /// `Pair`.
    pub fn with_stdlib() -> Self {
        let mut reg = Self::new();
        let tv = |name: &str| Type::TypeVar(name.to_string());

        reg.register(AdtInfo {
            name: "Bool".to_string(),
            tparams: vec![],
            ctrs: vec![CtrInfo::new("True", vec![]), CtrInfo::new("False", vec![])],
        })
        .expect("stdlib ADT registration");

        reg.register(AdtInfo {
            name: "Nat".to_string(),
            tparams: vec![],
            ctrs: vec![
                CtrInfo::new("Zero", vec![]),
                CtrInfo::new("Succ", vec![Type::nat_adt()]),
            ],
        })
        .expect("stdlib ADT registration");

        reg.register(AdtInfo {
            name: "Option".to_string(),
            tparams: vec!["'A".to_string()],
            ctrs: vec![
                CtrInfo::new("Some", vec![tv("'A")]),
                CtrInfo::new("None", vec![]),
            ],
        })
        .expect("stdlib ADT registration");

        reg.register(AdtInfo {
            name: "List".to_string(),
            tparams: vec!["'A".to_string()],
            ctrs: vec![
                CtrInfo::new("Cons", vec![tv("'A"), Type::Adt("List".to_string(), vec![tv("'A")])]),
                CtrInfo::new("Nil", vec![]),
            ],
        })
        .expect("stdlib ADT registration");

        reg.register(AdtInfo {
            name: "Pair".to_string(),
            tparams: vec!["'A".to_string(), "'B".to_string()],
            ctrs: vec![CtrInfo::new("Pair", vec![tv("'A"), tv("'B")])],
        })
        .expect("stdlib ADT registration");

        reg
    }

    /// Register an ADT. Rejects duplicate type names and constructor names
    /// already claimed by another type.
    pub fn register(&mut self, info: AdtInfo) -> Result<(), String> {
        if self.adts.contains_key(&info.name) {
            return Err(format!("ADT `{}` is already registered", info.name));
        }
        for ctr in &info.ctrs {
            if let Some(owner) = self.ctr_owner.get(&ctr.name) {
                return Err(format!(
                    "constructor `{}` is already declared by `{owner}`",
                    ctr.name
                ));
            }
        }
        for ctr in &info.ctrs {
            self.ctr_owner.insert(ctr.name.clone(), info.name.clone());
        }
        self.adts.insert(info.name.clone(), info);
        Ok(())
    }

    pub fn lookup_adt(&self, name: &str) -> Option<&AdtInfo> {
        self.adts.get(name)
    }

    /// Resolve a constructor name to its declaring ADT and constructor info.
    pub fn lookup_constructor(&self, name: &str) -> Option<(&AdtInfo, &CtrInfo)> {
        let owner = self.ctr_owner.get(name)?;
        let adt = self.adts.get(owner)?;
        let ctr = adt.ctrs.iter().find(|c| c.name == name)?;
        Some((adt, ctr))
    }
}

/// Why constructor elaboration failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElabError {
    UnknownConstructor(String),
    Arity { expected: usize, got: usize },
    /// The scrutinee of a constructor pattern is not an ADT.
    NotAnAdt(Type),
    /// The constructor belongs to a different ADT than the scrutinee.
    ConstructorMismatch { ctr: String, adt: String },
}

/// Elaborate a constructor applied to type arguments into a function type
/// `a1 -> ... -> an -> Adt(name, type_args)`.
pub fn elab_constr_type(
    registry: &AdtRegistry,
    cname: &str,
    type_args: &[Type],
) -> Result<Type, ElabError> {
    let (adt, ctr) = registry
        .lookup_constructor(cname)
        .ok_or_else(|| ElabError::UnknownConstructor(cname.to_string()))?;
    if adt.tparams.len() != type_args.len() {
        return Err(ElabError::Arity {
            expected: adt.tparams.len(),
            got: type_args.len(),
        });
    }
    let pairs: Vec<(String, Type)> = adt
        .tparams
        .iter()
        .cloned()
        .zip(type_args.iter().cloned())
        .collect();
    let result = Type::Adt(adt.name.clone(), type_args.to_vec());
    let fty = ctr
        .arg_types
        .iter()
        .rev()
        .fold(result, |acc, arg| Type::fun(subst_types(&pairs, arg), acc));
    Ok(fty)
}

/// Dual of [`elab_constr_type`]: given a known ADT instantiation and a
/// constructor name, return the substituted argument types so patterns
/// destructure correctly.
pub fn constr_pattern_arg_types(
    registry: &AdtRegistry,
    scrutinee_ty: &Type,
    cname: &str,
) -> Result<Vec<Type>, ElabError> {
    let (name, targs) = match scrutinee_ty {
        Type::Adt(name, targs) => (name, targs),
        other => return Err(ElabError::NotAnAdt(other.clone())),
    };
    let (adt, ctr) = registry
        .lookup_constructor(cname)
        .ok_or_else(|| ElabError::UnknownConstructor(cname.to_string()))?;
    if &adt.name != name {
        return Err(ElabError::ConstructorMismatch {
            ctr: cname.to_string(),
            adt: name.clone(),
        });
    }
    if adt.tparams.len() != targs.len() {
        return Err(ElabError::Arity {
            expected: adt.tparams.len(),
            got: targs.len(),
        });
    }
    let pairs: Vec<(String, Type)> = adt
        .tparams
        .iter()
        .cloned()
        .zip(targs.iter().cloned())
        .collect();
    Ok(ctr
        .arg_types
        .iter()
        .map(|arg| subst_types(&pairs, arg))
        .collect())
}

// ---------------------------------------------------------------------------
// Builtin-operator dictionary
// ---------------------------------------------------------------------------

/// Resolves one operator name against an argument signature. Returns the
/// accepted parameter types and the result type when the signature matches.
pub type BuiltinResolver = fn(&[Type]) -> Option<(Vec<Type>, Type)>;

/// Signature-directed dictionary of builtin operators.
///
/// Overload resolution is per-name: each resolver inspects the full argument
/// signature. Hosts may register additional operators.
#[derive(Debug, Clone, Default)]
pub struct BuiltinDictionary {
    ops: BTreeMap<String, BuiltinResolver>,
}

impl BuiltinDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard operator table.
    pub fn with_stdlib() -> Self {
        let mut dict = Self::new();
        dict.register("eq", builtin_eq);
        dict.register("lt", builtin_lt);
        dict.register("add", builtin_int_arith);
        dict.register("sub", builtin_int_arith);
        dict.register("mul", builtin_int_arith);
        dict.register("div", builtin_int_arith);
        dict.register("rem", builtin_int_arith);
        dict.register("pow", builtin_pow);
        dict.register("concat", builtin_concat);
        dict.register("substr", builtin_substr);
        dict.register("strlen", builtin_strlen);
        dict.register("to_string", builtin_to_string);
        dict.register("sha256hash", builtin_sha256hash);
        dict.register("blt", builtin_blt);
        dict.register("badd", builtin_badd);
        dict.register("bsub", builtin_bsub);
        dict
    }

    pub fn register(&mut self, name: impl Into<String>, resolver: BuiltinResolver) {
        self.ops.insert(name.into(), resolver);
    }

    /// Dispatch an operator against an argument signature.
    pub fn resolve(&self, op: &str, arg_tys: &[Type]) -> Option<(Vec<Type>, Type)> {
        self.ops.get(op).and_then(|resolver| resolver(arg_tys))
    }
}

fn as_int(ty: &Type) -> Option<()> {
    match ty {
        Type::Prim(PrimType::Int(_)) | Type::Prim(PrimType::Uint(_)) => Some(()),
        _ => None,
    }
}

fn builtin_eq(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [a, b] if a == b => match a {
            Type::Prim(PrimType::Message) | Type::Prim(PrimType::Event) => None,
            Type::Prim(_) => Some((vec![a.clone(), a.clone()], Type::bool_adt())),
            _ => None,
        },
        _ => None,
    }
}

fn builtin_lt(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [a, b] if a == b => {
            as_int(a)?;
            Some((vec![a.clone(), a.clone()], Type::bool_adt()))
        }
        _ => None,
    }
}

fn builtin_int_arith(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [a, b] if a == b => {
            as_int(a)?;
            Some((vec![a.clone(), a.clone()], a.clone()))
        }
        _ => None,
    }
}

fn builtin_pow(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [base, Type::Prim(PrimType::Uint(IntWidth::W32))] => {
            as_int(base)?;
            Some((
                vec![base.clone(), Type::uint(IntWidth::W32)],
                base.clone(),
            ))
        }
        _ => None,
    }
}

fn builtin_concat(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [Type::Prim(PrimType::String), Type::Prim(PrimType::String)] => Some((
            vec![Type::string(), Type::string()],
            Type::string(),
        )),
        [Type::Prim(PrimType::ByStr(a)), Type::Prim(PrimType::ByStr(b))] => Some((
            vec![Type::bystr(*a), Type::bystr(*b)],
            Type::bystr(a + b),
        )),
        _ => None,
    }
}

fn builtin_substr(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [Type::Prim(PrimType::String), Type::Prim(PrimType::Uint(IntWidth::W32)), Type::Prim(PrimType::Uint(IntWidth::W32))] => {
            Some((
                vec![
                    Type::string(),
                    Type::uint(IntWidth::W32),
                    Type::uint(IntWidth::W32),
                ],
                Type::string(),
            ))
        }
        _ => None,
    }
}

fn builtin_strlen(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [Type::Prim(PrimType::String)] => {
            Some((vec![Type::string()], Type::uint(IntWidth::W32)))
        }
        _ => None,
    }
}

fn builtin_to_string(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [a] => {
            as_int(a)?;
            Some((vec![a.clone()], Type::string()))
        }
        _ => None,
    }
}

fn builtin_sha256hash(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [a] => Some((vec![a.clone()], Type::bystr(32))),
        _ => None,
    }
}

fn builtin_blt(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [Type::Prim(PrimType::BNum), Type::Prim(PrimType::BNum)] => {
            Some((vec![Type::bnum(), Type::bnum()], Type::bool_adt()))
        }
        _ => None,
    }
}

fn builtin_badd(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [Type::Prim(PrimType::BNum), Type::Prim(PrimType::Uint(w))] => Some((
            vec![Type::bnum(), Type::uint(*w)],
            Type::bnum(),
        )),
        _ => None,
    }
}

fn builtin_bsub(args: &[Type]) -> Option<(Vec<Type>, Type)> {
    match args {
        [Type::Prim(PrimType::BNum), Type::Prim(PrimType::BNum)] => Some((
            vec![Type::bnum(), Type::bnum()],
            Type::int(IntWidth::W256),
        )),
        _ => None,
    }
}
