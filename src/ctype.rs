//! The C type system (spec §3, §4.3) and the `sizeof` seam (spec §9).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::Expr;
use crate::error::CompilerError;
use crate::location::SourceLocation;

/// `{const, volatile, restrict}` qualifier set every type carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
}

impl Qualifiers {
    pub fn none() -> Self {
        Qualifiers::default()
    }

    /// Merge in another qualifier set, erroring on an already-set qualifier
    /// (spec §4.4: "duplicate qualifiers are errors").
    pub fn add(&mut self, other: Qualifiers, loc: SourceLocation) -> Result<(), CompilerError> {
        if other.is_const {
            if self.is_const {
                return Err(CompilerError::type_spec("duplicate 'const' qualifier", loc));
            }
            self.is_const = true;
        }
        if other.is_volatile {
            if self.is_volatile {
                return Err(CompilerError::type_spec(
                    "duplicate 'volatile' qualifier",
                    loc,
                ));
            }
            self.is_volatile = true;
        }
        if other.is_restrict {
            if self.is_restrict {
                return Err(CompilerError::type_spec(
                    "duplicate 'restrict' qualifier",
                    loc,
                ));
            }
            self.is_restrict = true;
        }
        Ok(())
    }
}

/// Canonical integer subtype, after specifier-multiset resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    PlainChar,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
}

impl IntegerKind {
    /// Whether this kind is one byte wide (the only size distinction the
    /// word-sized IR mapping in spec §6 makes).
    pub fn is_char_sized(self) -> bool {
        matches!(
            self,
            IntegerKind::PlainChar | IntegerKind::SignedChar | IntegerKind::UnsignedChar
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatingKind {
    Float,
    Double,
}

/// One raw specifier token contributing to a declaration's type, collected
/// by `parse_decl_specifiers` before being canonicalized by `TypeContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSpecifier {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
}

/// An array's declared extent (spec §3).
#[derive(Debug, Clone)]
pub enum ArraySize {
    Unspecified,
    Constant(i64),
    VariableLength,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<String>,
    pub ty: CType,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: CType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Struct,
    Union,
}

/// A struct or union tag's definition, shared between every `CType` that
/// names the tag so that completing a forward declaration (parsing its
/// `{ ... }` body) is visible to every prior reference.
#[derive(Debug, Clone, Default)]
pub struct AggregateDef {
    pub tag: Option<String>,
    pub fields: Vec<Field>,
    pub complete: bool,
}

pub type AggregateRef = Rc<RefCell<AggregateDef>>;

#[derive(Debug, Clone, Default)]
pub struct EnumDef {
    pub tag: Option<String>,
    pub complete: bool,
}

pub type EnumRef = Rc<RefCell<EnumDef>>;

/// A C type, as spec §3 defines the recursive sum.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Integer(IntegerKind),
    Floating(FloatingKind),
    Void,
    Pointer(Box<CType>),
    Array {
        element: Box<CType>,
        size: ArraySize,
    },
    Function {
        params: Vec<Param>,
        return_type: Box<CType>,
        variadic: bool,
    },
    Struct(AggregateRef),
    Union(AggregateRef),
    Enum(EnumRef),
    /// A `typedef`-introduced name, resolved via the typedef table to the
    /// type it stands for.
    TypedefAlias {
        name: String,
        target: Box<CType>,
    },
}

#[derive(Debug, Clone)]
pub struct CType {
    pub kind: TypeKind,
    pub qualifiers: Qualifiers,
}

impl CType {
    pub fn new(kind: TypeKind) -> Self {
        CType {
            kind,
            qualifiers: Qualifiers::none(),
        }
    }

    pub fn with_qualifiers(mut self, qualifiers: Qualifiers) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    pub fn void() -> Self {
        CType::new(TypeKind::Void)
    }

    pub fn int() -> Self {
        CType::new(TypeKind::Integer(IntegerKind::Int))
    }

    pub fn pointer_to(target: CType) -> Self {
        CType::new(TypeKind::Pointer(Box::new(target)))
    }

    pub fn is_void(&self) -> bool {
        matches!(self.resolved().kind, TypeKind::Void)
    }

    pub fn is_function(&self) -> bool {
        matches!(self.resolved().kind, TypeKind::Function { .. })
    }

    /// Follow `TypedefAlias` chains down to the underlying concrete type.
    pub fn resolved(&self) -> &CType {
        let mut current = self;
        while let TypeKind::TypedefAlias { target, .. } = &current.kind {
            current = target;
        }
        current
    }

    pub fn as_function(&self) -> Option<(&[Param], &CType, bool)> {
        match &self.resolved().kind {
            TypeKind::Function {
                params,
                return_type,
                variadic,
            } => Some((params.as_slice(), return_type.as_ref(), *variadic)),
            _ => None,
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Integer(k) => write!(f, "{:?}", k),
            TypeKind::Floating(k) => write!(f, "{:?}", k),
            TypeKind::Void => write!(f, "void"),
            TypeKind::Pointer(t) => write!(f, "{}*", t),
            TypeKind::Array { element, .. } => write!(f, "{}[]", element),
            TypeKind::Function { return_type, .. } => write!(f, "{} (...)", return_type),
            TypeKind::Struct(def) => write!(f, "struct {}", def.borrow().tag.as_deref().unwrap_or("<anon>")),
            TypeKind::Union(def) => write!(f, "union {}", def.borrow().tag.as_deref().unwrap_or("<anon>")),
            TypeKind::Enum(def) => write!(f, "enum {}", def.borrow().tag.as_deref().unwrap_or("<anon>")),
            TypeKind::TypedefAlias { name, .. } => write!(f, "{}", name),
        }
    }
}

/// Canonicalizes a multiset of basic type specifiers into a concrete
/// integer or floating type (spec §4.3).
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeContext;

impl TypeContext {
    pub fn new() -> Self {
        TypeContext
    }

    pub fn resolve(&self, specs: &[TypeSpecifier], loc: SourceLocation) -> Result<CType, CompilerError> {
        if specs.is_empty() {
            return Err(CompilerError::type_spec(
                "expected at least one type specifier",
                loc,
            ));
        }

        let n_void = count(specs, TypeSpecifier::Void);
        let n_char = count(specs, TypeSpecifier::Char);
        let n_short = count(specs, TypeSpecifier::Short);
        let n_int = count(specs, TypeSpecifier::Int);
        let n_long = count(specs, TypeSpecifier::Long);
        let n_float = count(specs, TypeSpecifier::Float);
        let n_double = count(specs, TypeSpecifier::Double);
        let n_signed = count(specs, TypeSpecifier::Signed);
        let n_unsigned = count(specs, TypeSpecifier::Unsigned);

        if n_signed > 0 && n_unsigned > 0 {
            return Err(CompilerError::type_spec(
                "cannot combine 'signed' and 'unsigned'",
                loc,
            ));
        }

        let base_markers = [n_void > 0, n_float > 0, n_double > 0];
        if base_markers.iter().filter(|b| **b).count() > 1 {
            return Err(CompilerError::type_spec(
                "invalid combination of type specifiers",
                loc,
            ));
        }

        if n_void > 0 {
            if specs.len() > 1 {
                return Err(CompilerError::type_spec(
                    "'void' cannot combine with other specifiers",
                    loc,
                ));
            }
            return Ok(CType::new(TypeKind::Void));
        }

        if n_float > 0 {
            if n_char + n_short + n_int + n_long + n_signed + n_unsigned > 0 {
                return Err(CompilerError::type_spec(
                    "invalid combination with 'float'",
                    loc,
                ));
            }
            return Ok(CType::new(TypeKind::Floating(FloatingKind::Float)));
        }

        if n_double > 0 {
            if n_char + n_short + n_int + n_signed + n_unsigned > 0 || n_long > 1 {
                return Err(CompilerError::type_spec(
                    "invalid combination with 'double'",
                    loc,
                ));
            }
            // `long double` is accepted syntactically and canonicalized to
            // the same `Double` kind this crate's IR mapping already uses
            // for plain `double` (spec §6 only distinguishes float/double).
            return Ok(CType::new(TypeKind::Floating(FloatingKind::Double)));
        }

        let unsigned = n_unsigned > 0;

        if n_char > 0 {
            if n_char > 1 || n_short + n_int + n_long > 0 {
                return Err(CompilerError::type_spec(
                    "invalid combination with 'char'",
                    loc,
                ));
            }
            let kind = if n_signed > 0 {
                IntegerKind::SignedChar
            } else if unsigned {
                IntegerKind::UnsignedChar
            } else {
                IntegerKind::PlainChar
            };
            return Ok(CType::new(TypeKind::Integer(kind)));
        }

        if n_short > 0 {
            if n_short > 1 || n_long > 0 {
                return Err(CompilerError::type_spec(
                    "invalid combination with 'short'",
                    loc,
                ));
            }
            let kind = if unsigned {
                IntegerKind::UnsignedShort
            } else {
                IntegerKind::Short
            };
            return Ok(CType::new(TypeKind::Integer(kind)));
        }

        if n_long > 2 {
            return Err(CompilerError::type_spec("'long long long' is invalid", loc));
        }
        if n_long == 2 {
            let kind = if unsigned {
                IntegerKind::UnsignedLongLong
            } else {
                IntegerKind::LongLong
            };
            return Ok(CType::new(TypeKind::Integer(kind)));
        }
        if n_long == 1 {
            let kind = if unsigned {
                IntegerKind::UnsignedLong
            } else {
                IntegerKind::Long
            };
            return Ok(CType::new(TypeKind::Integer(kind)));
        }

        // Bare `int`, `signed`, `unsigned`, or `signed int` / `unsigned int`.
        if n_int <= 1 {
            let kind = if unsigned {
                IntegerKind::UnsignedInt
            } else {
                IntegerKind::Int
            };
            return Ok(CType::new(TypeKind::Integer(kind)));
        }

        Err(CompilerError::type_spec(
            "invalid combination of type specifiers",
            loc,
        ))
    }
}

fn count(specs: &[TypeSpecifier], target: TypeSpecifier) -> usize {
    specs.iter().filter(|s| **s == target).count()
}

/// Seam for target-specific `sizeof` (spec §9 Open Question). The crate
/// ships one implementation, [`WordTarget`], matching the documented
/// placeholder behavior of returning 8 for every type; a real back end
/// would supply its own `TargetInfo` with a proper size table.
pub trait TargetInfo {
    fn size_of(&self, ty: &CType) -> u64;
}

/// Always reports a size of 8 bytes, regardless of type. This mirrors the
/// placeholder `sizeof` the front end shipped with historically; it is not
/// a real size table.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordTarget;

impl TargetInfo for WordTarget {
    fn size_of(&self, _ty: &CType) -> u64 {
        8
    }
}

/// Two C types are considered equal for operator type-checking purposes if
/// they are structurally the same kind, with all integer types treated as
/// mutually equal (spec §9 Open Question: "too permissive"; kept as
/// documented behavior rather than silently implementing full usual
/// arithmetic conversions).
pub fn equal_types(a: &CType, b: &CType) -> bool {
    use TypeKind::*;
    match (&a.resolved().kind, &b.resolved().kind) {
        (Integer(_), Integer(_)) => true,
        (Floating(_), Floating(_)) => true,
        (Void, Void) => true,
        (Pointer(x), Pointer(y)) => equal_types(x, y),
        (Struct(x), Struct(y)) => Rc::ptr_eq(x, y),
        (Union(x), Union(y)) => Rc::ptr_eq(x, y),
        (Enum(x), Enum(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Marker so `Expr::typ` (spec §3: "non-null `typ` of kind `CType`") has an
/// explicit sentinel for "not yet computed" distinct from any real type.
pub fn unresolved_type_placeholder() -> CType {
    CType::new(TypeKind::Void)
}

/// Compute an enum constant's implicit value expression from the previous
/// one: `previous + 1`, or the literal `0` for the first constant (spec
/// §4.4).
pub fn implicit_enum_value(previous: Option<Expr>, loc: SourceLocation) -> Expr {
    match previous {
        None => Expr::literal_int(0, loc),
        Some(prev) => Expr::binop(prev, "+", Expr::literal_int(1, loc), loc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::default()
    }

    #[test]
    fn unsigned_long_int_resolves_to_unsigned_long() {
        let ctx = TypeContext::new();
        let specs = [
            TypeSpecifier::Unsigned,
            TypeSpecifier::Long,
            TypeSpecifier::Int,
        ];
        let ty = ctx.resolve(&specs, loc()).unwrap();
        assert!(matches!(
            ty.kind,
            TypeKind::Integer(IntegerKind::UnsignedLong)
        ));
    }

    #[test]
    fn float_and_int_is_invalid() {
        let ctx = TypeContext::new();
        let specs = [TypeSpecifier::Float, TypeSpecifier::Int];
        assert!(ctx.resolve(&specs, loc()).is_err());
    }

    #[test]
    fn empty_specifier_set_is_invalid() {
        let ctx = TypeContext::new();
        assert!(ctx.resolve(&[], loc()).is_err());
    }

    #[test]
    fn plain_int_resolves() {
        let ctx = TypeContext::new();
        let ty = ctx.resolve(&[TypeSpecifier::Int], loc()).unwrap();
        assert!(matches!(ty.kind, TypeKind::Integer(IntegerKind::Int)));
    }

    #[test]
    fn triple_long_is_invalid() {
        let ctx = TypeContext::new();
        let specs = [TypeSpecifier::Long, TypeSpecifier::Long, TypeSpecifier::Long];
        assert!(ctx.resolve(&specs, loc()).is_err());
    }

    #[test]
    fn all_integer_kinds_equal_under_equal_types() {
        let a = CType::new(TypeKind::Integer(IntegerKind::Int));
        let b = CType::new(TypeKind::Integer(IntegerKind::UnsignedLongLong));
        assert!(equal_types(&a, &b));
    }

    #[test]
    fn word_target_always_reports_eight() {
        let target = WordTarget;
        assert_eq!(target.size_of(&CType::new(TypeKind::Integer(IntegerKind::PlainChar))), 8);
        assert_eq!(target.size_of(&CType::int()), 8);
    }

    #[test]
    fn typedef_alias_resolves_through_to_target() {
        let alias = CType::new(TypeKind::TypedefAlias {
            name: "foo".to_string(),
            target: Box::new(CType::int()),
        });
        assert!(matches!(alias.resolved().kind, TypeKind::Integer(IntegerKind::Int)));
    }
}
