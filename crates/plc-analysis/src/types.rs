//! The type pool: an arena of structural "type formers" addressed by index.
//!
//! Every type the type-table and type-selection passes reason about —
//! primitive, declared, or synthesized — lives in one [`TypePool`]. Compound
//! formers (`Struct`, `Function`, `Specialized`, …) refer to their
//! constituent types by [`TypeId`], never by embedding them directly, so the
//! pool stays a flat, append-only structure even for recursive types.

use std::fmt;

use id_arena::Arena;
use id_arena::Id;
use indexmap::IndexMap;

/// A handle to a [`TypeFormer`] in a [`TypePool`].
pub type TypeId = Id<TypeFormer>;

/// A structural type former.
///
/// The arithmetic/bit/string/void/bool/error formers are the language's base
/// types; the rest are built up from them as declarations and expressions
/// are processed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeFormer {
    /// `void`.
    Void,
    /// `bool`.
    Bool,
    /// `int` or `int<width>`; `width` is `None` for arbitrary precision.
    Int {
        /// The declared bit width, if sized.
        width: Option<u32>,
    },
    /// `bit<width>`.
    Bit {
        /// The declared bit width.
        width: u32,
    },
    /// `varbit<max_width>`.
    Varbit {
        /// The declared maximum bit width.
        max_width: u32,
    },
    /// `string`.
    String,
    /// The error type (`error { ... }` members accumulate additively into a
    /// single global type rather than one type per declaration).
    ErrorType,
    /// `match_kind` member type.
    MatchKind,
    /// The type of `_` in a context that infers it from its required type.
    Dontcare,
    /// An `enum` type and its ordered member names.
    Enum {
        /// The enum's declared name.
        name: String,
        /// The enum's members, in declaration order.
        members: Vec<String>,
    },
    /// A type variable introduced by a generic parser/control/extern/package
    /// parameter list (e.g. the `T` in `extern E<T> { ... }`).
    TypeVar {
        /// The type variable's declared name.
        name: String,
    },
    /// A `typedef` alias.
    Typedef {
        /// The typedef's declared name.
        name: String,
        /// The type it aliases.
        aliased: TypeId,
    },
    /// A reference to a type by name, not yet resolved to its definition.
    ///
    /// Produced while building the type table for a forward reference;
    /// [`TypePool::effective_type`] follows it to the definition once the
    /// referenced declaration has itself been added to the pool.
    NameRef {
        /// The referenced name.
        name: String,
        /// The type it resolves to, once known.
        resolved: Option<TypeId>,
    },
    /// An indirect reference used for recursive/self-referential formers
    /// (e.g. a header stack's own instantiated element type during
    /// specialization).
    IdRef {
        /// The type being referred to.
        target: TypeId,
    },
    /// A fixed-length tuple of member types (`tuple<...>`, and the element
    /// type list backing named-argument matching).
    Product(Vec<TypeId>),
    /// A callable signature: ordered parameter types and a return type.
    Function {
        /// The parameter types, in declaration order.
        params: Vec<TypeId>,
        /// The return type (`Void` for statements-only constructs).
        ret: TypeId,
    },
    /// An `extern` object type: its constructors and methods.
    Extern {
        /// The extern's declared name.
        name: String,
        /// Constructor signatures, all named after the extern itself.
        constructors: Vec<TypeId>,
        /// Method signatures, by name.
        methods: IndexMap<String, TypeId>,
    },
    /// A `parser` type: its declared constructor parameter types.
    Parser {
        /// The parser's declared name.
        name: String,
        /// The constructor parameter types.
        params: Vec<TypeId>,
    },
    /// A `control` type: its declared constructor parameter types.
    Control {
        /// The control's declared name.
        name: String,
        /// The constructor parameter types.
        params: Vec<TypeId>,
    },
    /// A `package` type: its declared constructor parameter types.
    Package {
        /// The package's declared name.
        name: String,
        /// The constructor parameter types.
        params: Vec<TypeId>,
    },
    /// A `struct` type and its ordered, named fields.
    Struct {
        /// The struct's declared name.
        name: String,
        /// The fields, in declaration order.
        fields: IndexMap<String, TypeId>,
    },
    /// A `header` type and its ordered, named fields.
    Header {
        /// The header's declared name.
        name: String,
        /// The fields, in declaration order.
        fields: IndexMap<String, TypeId>,
    },
    /// A `header_union` type and its ordered, named member headers.
    Union {
        /// The union's declared name.
        name: String,
        /// The member headers, in declaration order.
        fields: IndexMap<String, TypeId>,
    },
    /// A header stack: `element[size]`.
    Stack {
        /// The element type.
        element: TypeId,
        /// The declared stack size.
        size: u32,
    },
    /// A `table` type, distinguished only by its declared name (tables do
    /// not carry a structural signature beyond identity).
    Table {
        /// The table's declared name.
        name: String,
    },
    /// A generic type former applied to concrete type arguments
    /// (`Extern<bit<8>>`, `T<...>`).
    Specialized {
        /// The generic base type.
        base: TypeId,
        /// The concrete type arguments, in order.
        args: Vec<TypeId>,
    },
    /// The meta-type of a type used as a value (a type argument position).
    TypeMeta {
        /// The type being referred to as a value.
        of: TypeId,
    },
}

impl fmt::Display for TypeFormer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Bool => write!(f, "bool"),
            Self::Int { width: Some(w) } => write!(f, "int<{w}>"),
            Self::Int { width: None } => write!(f, "int"),
            Self::Bit { width } => write!(f, "bit<{width}>"),
            Self::Varbit { max_width } => write!(f, "varbit<{max_width}>"),
            Self::String => write!(f, "string"),
            Self::ErrorType => write!(f, "error"),
            Self::MatchKind => write!(f, "match_kind"),
            Self::Dontcare => write!(f, "_"),
            Self::Enum { name, .. } => write!(f, "{name}"),
            Self::TypeVar { name } => write!(f, "{name}"),
            Self::Typedef { name, .. } => write!(f, "{name}"),
            Self::NameRef { name, .. } => write!(f, "{name}"),
            Self::IdRef { .. } => write!(f, "<ref>"),
            Self::Product(members) => {
                write!(f, "tuple<")?;
                for (i, _) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "_")?;
                }
                write!(f, ">")
            }
            Self::Function { .. } => write!(f, "<function>"),
            Self::Extern { name, .. } => write!(f, "{name}"),
            Self::Parser { name, .. } => write!(f, "{name}"),
            Self::Control { name, .. } => write!(f, "{name}"),
            Self::Package { name, .. } => write!(f, "{name}"),
            Self::Struct { name, .. } => write!(f, "{name}"),
            Self::Header { name, .. } => write!(f, "{name}"),
            Self::Union { name, .. } => write!(f, "{name}"),
            Self::Stack { size, .. } => write!(f, "<stack[{size}]>"),
            Self::Table { name } => write!(f, "{name}"),
            Self::Specialized { .. } => write!(f, "<specialized>"),
            Self::TypeMeta { .. } => write!(f, "type"),
        }
    }
}

/// The collection of every type former produced during analysis.
#[derive(Debug, Default)]
pub struct TypePool {
    arena: Arena<TypeFormer>,
}

impl TypePool {
    /// Constructs an empty type pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `former`, returning its id.
    pub fn intern(&mut self, former: TypeFormer) -> TypeId {
        self.arena.alloc(former)
    }

    /// Looks up the former behind `id`.
    pub fn get(&self, id: TypeId) -> &TypeFormer {
        &self.arena[id]
    }

    /// Resolves a pending [`TypeFormer::NameRef`].
    ///
    /// # Panics
    ///
    /// Panics if `id` does not name a `NameRef`.
    pub fn resolve_name_ref(&mut self, id: TypeId, target: TypeId) {
        match &mut self.arena[id] {
            TypeFormer::NameRef { resolved, .. } => *resolved = Some(target),
            other => panic!("resolve_name_ref called on non-reference type former {other:?}"),
        }
    }

    /// Peels the outer `TypeMeta` layer off `id`, if present; identity on
    /// every other former.
    ///
    /// This is the narrow "actual type" operator from the data model: a
    /// type-valued expression (a type argument position) is wrapped in one
    /// `TypeMeta` layer denoting "the type of this type expression", and
    /// `actual_type` is how a caller that only cares about that one layer
    /// strips it without chasing any further indirection.
    pub fn actual_type(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            TypeFormer::TypeMeta { of } => *of,
            _ => id,
        }
    }

    /// Follows `Typedef`, `NameRef`, `IdRef`, and `TypeMeta` indirections to
    /// the underlying structural type former.
    ///
    /// This is the operator the rest of analysis reaches for: member-select
    /// dispatch, `type_equiv`, and type-selection all need the real former
    /// (`Struct`, `Extern`, `Bit`, …) regardless of how many aliasing or
    /// type-argument layers sit on top of it. Stops (returning the id as-is)
    /// at an unresolved `NameRef` rather than looping forever on a forward
    /// reference that never got filled in.
    pub fn effective_type(&self, mut id: TypeId) -> TypeId {
        loop {
            match self.get(id) {
                TypeFormer::Typedef { aliased, .. } => id = *aliased,
                TypeFormer::IdRef { target } => id = *target,
                TypeFormer::NameRef { resolved: Some(target), .. } => id = *target,
                TypeFormer::TypeMeta { of } => id = *of,
                _ => return id,
            }
        }
    }

    /// Structural equality of two types after resolving indirections.
    ///
    /// An untyped integer literal (`Int { width: None }`) is the literal
    /// `0`'s type before any context has given it a width: it widens to
    /// match whatever sized `bit<N>`/`int<N>` the context requires (e.g.
    /// `bit<16> x; x = 0;`) rather than only ever matching another untyped
    /// `int`. This is the one former pair `type_eq` treats as equivalent
    /// without being structurally identical; every other former still
    /// compares by plain structural equality.
    pub fn type_eq(&self, a: TypeId, b: TypeId) -> bool {
        let a = self.effective_type(a);
        let b = self.effective_type(b);
        if a == b {
            return true;
        }
        if Self::is_untyped_int_literal_match(self.get(a), self.get(b)) {
            return true;
        }
        self.get(a) == self.get(b)
    }

    /// Whether `lhs`/`rhs` are an untyped integer literal paired with any
    /// sized `Bit` or `Int` former, in either position.
    fn is_untyped_int_literal_match(lhs: &TypeFormer, rhs: &TypeFormer) -> bool {
        fn is_sized(former: &TypeFormer) -> bool {
            matches!(
                former,
                TypeFormer::Bit { .. } | TypeFormer::Int { width: Some(_) }
            )
        }
        let untyped = TypeFormer::Int { width: None };
        (*lhs == untyped && is_sized(rhs)) || (*rhs == untyped && is_sized(lhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn effective_type_follows_typedef_chain() {
        let mut pool = TypePool::new();
        let bit8 = pool.intern(TypeFormer::Bit { width: 8 });
        let alias1 = pool.intern(TypeFormer::Typedef {
            name: "A".into(),
            aliased: bit8,
        });
        let alias2 = pool.intern(TypeFormer::Typedef {
            name: "B".into(),
            aliased: alias1,
        });
        assert_eq!(pool.effective_type(alias2), bit8);
    }

    #[test]
    fn name_ref_resolves_after_the_fact() {
        let mut pool = TypePool::new();
        let placeholder = pool.intern(TypeFormer::NameRef {
            name: "Later".into(),
            resolved: None,
        });
        // Before resolution, effective_type is a no-op.
        assert_eq!(pool.effective_type(placeholder), placeholder);

        let concrete = pool.intern(TypeFormer::Bool);
        pool.resolve_name_ref(placeholder, concrete);
        assert_eq!(pool.effective_type(placeholder), concrete);
    }

    #[test]
    fn effective_type_strips_type_meta() {
        let mut pool = TypePool::new();
        let bit8 = pool.intern(TypeFormer::Bit { width: 8 });
        let meta = pool.intern(TypeFormer::TypeMeta { of: bit8 });
        assert_eq!(pool.effective_type(meta), bit8);
    }

    #[test]
    fn actual_type_only_peels_type_meta() {
        let mut pool = TypePool::new();
        let bit8 = pool.intern(TypeFormer::Bit { width: 8 });
        let alias = pool.intern(TypeFormer::Typedef {
            name: "A".into(),
            aliased: bit8,
        });
        // actual_type does not chase a Typedef, only a TypeMeta layer.
        assert_eq!(pool.actual_type(alias), alias);
        let meta = pool.intern(TypeFormer::TypeMeta { of: alias });
        assert_eq!(pool.actual_type(meta), alias);
    }

    #[test]
    fn untyped_int_literal_is_type_eq_to_any_sized_bit_or_int() {
        let mut pool = TypePool::new();
        let untyped = pool.intern(TypeFormer::Int { width: None });
        let bit16 = pool.intern(TypeFormer::Bit { width: 16 });
        let int32 = pool.intern(TypeFormer::Int { width: Some(32) });
        assert!(pool.type_eq(untyped, bit16));
        assert!(pool.type_eq(bit16, untyped));
        assert!(pool.type_eq(untyped, int32));

        // Two differently-sized concrete formers still disagree.
        let bit8 = pool.intern(TypeFormer::Bit { width: 8 });
        assert!(!pool.type_eq(bit8, bit16));
    }

    #[test]
    fn struct_type_eq_is_structural() {
        let mut pool = TypePool::new();
        let mut fields_a = IndexMap::new();
        fields_a.insert("x".to_string(), pool.intern(TypeFormer::Bool));
        let mut fields_b = IndexMap::new();
        fields_b.insert("x".to_string(), pool.intern(TypeFormer::Bool));

        let a = pool.intern(TypeFormer::Struct {
            name: "S".into(),
            fields: fields_a,
        });
        let b = pool.intern(TypeFormer::Struct {
            name: "S".into(),
            fields: fields_b,
        });
        assert!(pool.type_eq(a, b));
    }
}
