//! Bottom-up potential-type accumulation.
//!
//! Every expression node gets a [`PotentialType`]: the set of types it could
//! still turn out to be, built strictly from its children with no knowledge
//! of where the expression is used. A later top-down pass ([`crate::select`])
//! narrows each potential type to a single committed [`crate::types::TypeId`]
//! using the context's required type. Splitting the work this way means
//! neither direction needs a fix-point: every node is visited exactly once
//! in each pass.
//!
//! This pass also raises [`AnalysisError::UnknownName`] for a `name` that
//! resolves in neither the variable nor the type namespace of its scope —
//! the scope graph itself was already built by [`crate::declare`], so this is
//! the first point a dangling reference (an undeclared `transition` target, a
//! typo'd call) can be told apart from one that is merely ambiguous.

use indexmap::IndexMap;
use indexmap::IndexSet;
use plc_ast::Arena as AstArena;
use plc_ast::AstKind;
use plc_ast::NodeId;
use plc_ast::Payload;
use plc_ast::TokenKind;

use crate::declare::ScopeMap;
use crate::diagnostics::AnalysisError;
use crate::scope::Namespace;
use crate::scope::ScopeId;
use crate::scope::Scopes;
use crate::typetable::TypeTable;
use crate::types::TypeFormer;
use crate::types::TypeId;
use crate::types::TypePool;

/// The potential type of an expression node: either a flat set of candidate
/// types, or a fixed-length product of child potential types (used for
/// argument lists being matched against overloaded parameter lists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PotentialType {
    /// A set of candidate concrete types, accumulated from the node's
    /// children (and, for leaves, its literal form).
    Set(IndexSet<TypeId>),
    /// A fixed-length tuple of child potential types — the shape used while
    /// matching a call's argument list against a callee's candidate
    /// signatures before any one signature has been committed to.
    Product(Vec<PotentialType>),
}

impl PotentialType {
    /// A potential type with exactly one candidate.
    pub fn singleton(ty: TypeId) -> Self {
        let mut set = IndexSet::new();
        set.insert(ty);
        Self::Set(set)
    }

    /// The empty candidate set (an expression with no valid type, e.g. after
    /// a prior error).
    pub fn empty() -> Self {
        Self::Set(IndexSet::new())
    }

    /// Merges `other`'s candidates into `self` in place (set union;
    /// products are merged pointwise, requiring equal arity).
    pub fn union_with(&mut self, other: &PotentialType) {
        match (self, other) {
            (Self::Set(a), Self::Set(b)) => a.extend(b.iter().copied()),
            (Self::Product(a), Self::Product(b)) if a.len() == b.len() => {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    x.union_with(y);
                }
            }
            _ => {}
        }
    }

    /// The flat candidate set, if this is not a product.
    pub fn as_set(&self) -> Option<&IndexSet<TypeId>> {
        match self {
            Self::Set(set) => Some(set),
            Self::Product(_) => None,
        }
    }
}

/// The side table mapping every expression node to its accumulated
/// potential type.
#[derive(Debug, Default)]
pub struct PotypeMap {
    entries: IndexMap<NodeId, PotentialType>,
}

impl PotypeMap {
    /// The potential type recorded for `node`, if any.
    pub fn get(&self, node: NodeId) -> Option<&PotentialType> {
        self.entries.get(&node)
    }
}

/// Runs bottom-up potential-type accumulation over every expression in the
/// tree rooted at `root`, using `table` to resolve names and literal base
/// types. Returns the accumulated side table and any
/// [`AnalysisError::UnknownName`]s raised along the way.
pub fn compute_potential_types(
    ast: &AstArena,
    root: NodeId,
    scopes: &Scopes,
    scope_map: &ScopeMap,
    table: &TypeTable,
    pool: &mut TypePool,
) -> (PotypeMap, Vec<AnalysisError>) {
    let mut map = PotypeMap::default();
    let mut errors = Vec::new();
    let root_scope = scopes.root();
    visit(ast, scope_map, root_scope, scopes, table, pool, root, &mut map, &mut errors);
    (map, errors)
}

/// Walks the whole tree, computing potential types for expression nodes.
///
/// Most node kinds simply recurse into every child (statements and
/// declarations carry expressions at arbitrary depth); a handful of shapes
/// carry a child that looks like a `Name` but is not a variable/type
/// reference at all — a struct field being selected, a named argument's
/// parameter name, a table key's match-kind, an enum/error/match_kind
/// member list — and those children are deliberately left unvisited so they
/// are never mistaken for a dangling reference.
#[allow(clippy::too_many_arguments)]
fn visit(
    ast: &AstArena,
    scope_map: &ScopeMap,
    scope: ScopeId,
    scopes: &Scopes,
    table: &TypeTable,
    pool: &mut TypePool,
    node: NodeId,
    map: &mut PotypeMap,
    errors: &mut Vec<AnalysisError>,
) {
    let kind = ast.get(node).kind();
    let child_scope = scope_map.get(node).unwrap_or(scope);

    match kind {
        // Purely structural: nothing inside is a value expression. A
        // serializable enum's member values are parsed but, like a plain
        // enum's members, never type-checked.
        AstKind::TypeRef | AstKind::IdentifierList | AstKind::SpecifiedIdentifierList | AstKind::StructField => {}
        AstKind::MemberSelector => {
            if let Some(base) = ast.nth_child(node, 0) {
                visit(ast, scope_map, child_scope, scopes, table, pool, base, map, errors);
            }
            // The field-name child is resolved structurally against the
            // base's effective type below, never through scope lookup.
        }
        AstKind::Argument => {
            // A named argument's leading `name` child is matched against the
            // callee's parameter list by the selection pass, not scope.
            if let Some(expr) = ast.children(node).last() {
                visit(ast, scope_map, child_scope, scopes, table, pool, expr, map, errors);
            }
        }
        AstKind::KeyElement => {
            if let Some(expr) = ast.nth_child(node, 0) {
                visit(ast, scope_map, child_scope, scopes, table, pool, expr, map, errors);
            }
            // The match-kind child (`exact`/`ternary`/`lpm`) is not a scoped
            // reference in this front end.
        }
        _ => {
            for child in ast.children(node) {
                visit(ast, scope_map, child_scope, scopes, table, pool, child, map, errors);
            }
        }
    }

    if let Some(pt) = potential_type_of(ast, scopes, scope, table, pool, node, map, errors) {
        map.entries.insert(node, pt);
    }
}

/// Computes the potential type of a single node from its already-visited
/// children, or returns `None` for nodes that are not expressions.
#[allow(clippy::too_many_arguments)]
fn potential_type_of(
    ast: &AstArena,
    scopes: &Scopes,
    scope: ScopeId,
    table: &TypeTable,
    pool: &mut TypePool,
    node: NodeId,
    map: &PotypeMap,
    errors: &mut Vec<AnalysisError>,
) -> Option<PotentialType> {
    let data = ast.get(node);
    match data.kind() {
        AstKind::BooleanLiteral => {
            let ty = pool.intern(TypeFormer::Bool);
            Some(PotentialType::singleton(ty))
        }
        AstKind::IntegerLiteral => {
            let ty = match data.payload() {
                Payload::Integer { width: Some(w), signed: false, .. } => {
                    pool.intern(TypeFormer::Bit { width: *w })
                }
                Payload::Integer { width: Some(w), signed: true, .. } => {
                    pool.intern(TypeFormer::Int { width: Some(*w) })
                }
                _ => pool.intern(TypeFormer::Int { width: None }),
            };
            Some(PotentialType::singleton(ty))
        }
        AstKind::StringLiteral => {
            let ty = pool.intern(TypeFormer::String);
            Some(PotentialType::singleton(ty))
        }
        AstKind::Dontcare | AstKind::Default => {
            let ty = pool.intern(TypeFormer::Dontcare);
            Some(PotentialType::singleton(ty))
        }
        AstKind::Name => {
            let name = match data.payload() {
                Payload::Ident(n) => n.clone(),
                _ => return Some(PotentialType::empty()),
            };
            let mut candidates = IndexSet::new();
            let mut resolved = false;
            if let Some(decls) = scopes.lookup(scope, &name, Namespace::Var) {
                resolved = true;
                for decl in decls {
                    if let Some(ty) = table.get(decl.node) {
                        candidates.insert(ty);
                    }
                }
            }
            if !resolved && scopes.lookup(scope, &name, Namespace::Type).is_some() {
                resolved = true;
            }
            if !resolved {
                errors.push(AnalysisError::UnknownName { span: data.span(), name });
            }
            Some(PotentialType::Set(candidates))
        }
        AstKind::LvalueExpression => ast.nth_child(node, 0).and_then(|c| map.get(c).cloned()),
        AstKind::MemberSelector => {
            let base = ast.nth_child(node, 0)?;
            let field_node = ast.nth_child(node, 1)?;
            let field = match ast.get(field_node).payload() {
                Payload::Ident(n) => n.clone(),
                _ => return Some(PotentialType::empty()),
            };
            let base_set = map.get(base)?.as_set()?;
            let mut out = IndexSet::new();
            for base_ty in base_set {
                let eff = pool.effective_type(*base_ty);
                match pool.get(eff).clone() {
                    TypeFormer::Struct { fields, .. }
                    | TypeFormer::Header { fields, .. }
                    | TypeFormer::Union { fields, .. } => {
                        if let Some(ty) = fields.get(&field) {
                            out.insert(*ty);
                        }
                    }
                    TypeFormer::Extern { methods, .. } => {
                        if let Some(ty) = methods.get(&field) {
                            out.insert(*ty);
                        }
                    }
                    TypeFormer::Enum { members, .. } => {
                        // `Enum.MEMBER` denotes a value of the enum itself,
                        // but only for one of its declared members.
                        if members.iter().any(|m| m == &field) {
                            out.insert(eff);
                        }
                    }
                    TypeFormer::ErrorType | TypeFormer::MatchKind => {
                        // `error.MEMBER` / a match_kind member denotes a
                        // value of the enclosing type; both accumulate their
                        // members globally rather than per-declaration, so
                        // membership isn't checked here.
                        out.insert(eff);
                    }
                    _ => {}
                }
            }
            Some(PotentialType::Set(out))
        }
        AstKind::ArraySubscript => {
            let base = ast.nth_child(node, 0)?;
            let base_set = map.get(base)?.as_set()?;
            let mut out = IndexSet::new();
            for base_ty in base_set {
                let eff = pool.effective_type(*base_ty);
                if let TypeFormer::Stack { element, .. } = pool.get(eff) {
                    out.insert(*element);
                }
            }
            Some(PotentialType::Set(out))
        }
        AstKind::UnaryExpression => ast.nth_child(node, 0).and_then(|c| map.get(c).cloned()),
        AstKind::BinaryExpression => {
            let op = match data.payload() {
                Payload::Operator(op) => *op,
                _ => return None,
            };
            let is_comparison = matches!(
                op,
                TokenKind::EqEq
                    | TokenKind::NotEq
                    | TokenKind::Lt
                    | TokenKind::Gt
                    | TokenKind::Le
                    | TokenKind::Ge
                    | TokenKind::AndAnd
                    | TokenKind::OrOr
            );
            if is_comparison {
                let ty = pool.intern(TypeFormer::Bool);
                return Some(PotentialType::singleton(ty));
            }
            let lhs = ast.nth_child(node, 0)?;
            let rhs = ast.nth_child(node, 1)?;
            let lhs_set = map.get(lhs)?.as_set()?.clone();
            let rhs_set = map.get(rhs)?.as_set()?.clone();
            let intersection: IndexSet<TypeId> = lhs_set
                .iter()
                .copied()
                .filter(|t| rhs_set.iter().any(|u| pool.type_eq(*t, *u)))
                .collect();
            if intersection.is_empty() {
                let mut union = lhs_set;
                union.extend(rhs_set);
                Some(PotentialType::Set(union))
            } else {
                Some(PotentialType::Set(intersection))
            }
        }
        AstKind::CastExpression => {
            let ty_node = ast.nth_child(node, 0)?;
            let ty = crate::typetable::resolve_expr_type_ref(ast, ty_node, scope, scopes, table, pool, errors);
            Some(PotentialType::singleton(ty))
        }
        AstKind::FunctionCall => {
            let callee = ast.nth_child(node, 0)?;
            let args_node = ast.nth_child(node, 1)?;
            if ast.get(args_node).kind() != AstKind::ArgumentList {
                // A generic-specialization call (`f<T>(...)`); left for the
                // selection pass, which has the specialized base committed.
                return None;
            }
            let arg_sets = match map.get(args_node)? {
                PotentialType::Product(parts) => {
                    let sets: Option<Vec<&IndexSet<TypeId>>> = parts.iter().map(|p| p.as_set()).collect();
                    sets?
                }
                _ => return None,
            };

            let mut rets = IndexSet::new();
            match ast.get(callee).kind() {
                AstKind::Name => {
                    let name = match ast.get(callee).payload() {
                        Payload::Ident(n) => n.clone(),
                        _ => return Some(PotentialType::empty()),
                    };
                    if let Some(decls) = scopes.lookup(scope, &name, Namespace::Var) {
                        for decl in decls {
                            if let Some(fn_ty) = table.get(decl.node) {
                                if let Some(ret) = match_signature(pool, fn_ty, &arg_sets) {
                                    rets.insert(ret);
                                }
                            }
                        }
                    }
                    if let Some(decls) = scopes.lookup(scope, &name, Namespace::Type) {
                        for decl in decls {
                            if let Some(ty) = table.get(decl.node) {
                                let actual = pool.effective_type(ty);
                                if let TypeFormer::Extern { constructors, .. } = pool.get(actual).clone() {
                                    for ctor in &constructors {
                                        if match_signature(pool, *ctor, &arg_sets).is_some() {
                                            rets.insert(actual);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                AstKind::MemberSelector => {
                    let base = ast.nth_child(callee, 0)?;
                    let field_node = ast.nth_child(callee, 1)?;
                    let method = match ast.get(field_node).payload() {
                        Payload::Ident(n) => n.clone(),
                        _ => return Some(PotentialType::empty()),
                    };
                    if let Some(base_set) = map.get(base).and_then(|p| p.as_set()) {
                        for base_ty in base_set.clone() {
                            let eff = pool.effective_type(base_ty);
                            if let TypeFormer::Extern { methods, .. } = pool.get(eff).clone() {
                                if let Some(sig) = methods.get(&method) {
                                    if let Some(ret) = match_signature(pool, *sig, &arg_sets) {
                                        rets.insert(ret);
                                    }
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
            Some(PotentialType::Set(rets))
        }
        AstKind::Argument => {
            let expr = ast.children(node).last()?;
            map.get(expr).cloned()
        }
        AstKind::ArgumentList | AstKind::ExpressionList | AstKind::SimpleExpressionList => {
            let parts: Vec<_> = ast
                .children(node)
                .map(|c| map.get(c).cloned().unwrap_or_else(PotentialType::empty))
                .collect();
            Some(PotentialType::Product(parts))
        }
        // A tuple keyset's only child is the `SimpleExpressionList` it wraps;
        // its product is that list's, not a length-1 product around it.
        AstKind::TupleKeysetExpression => ast.nth_child(node, 0).and_then(|c| map.get(c).cloned()),
        AstKind::SimpleKeysetExpression => ast.nth_child(node, 0).and_then(|c| map.get(c).cloned()),
        _ => None,
    }
}

/// Checks `fn_ty` (a `Function` former) against the potential argument
/// types, returning its return type if arity and every parameter position
/// has a matching candidate.
fn match_signature(pool: &TypePool, fn_ty: TypeId, arg_sets: &[&IndexSet<TypeId>]) -> Option<TypeId> {
    let actual = pool.effective_type(fn_ty);
    match pool.get(actual) {
        TypeFormer::Function { params, ret } => {
            if params.len() != arg_sets.len() {
                return None;
            }
            for (param, args) in params.iter().zip(arg_sets.iter()) {
                if !args.iter().any(|a| pool.type_eq(*a, *param)) {
                    return None;
                }
            }
            Some(*ret)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::declare::declare_names;
    use crate::typetable::build_type_table;
    use plc_ast::parse_program;

    #[test]
    fn literals_get_singleton_potential_types() {
        let (ast, root) = parse_program("control C() { apply { bool b = true; } }").unwrap();
        let mut pool = TypePool::new();
        let (scopes, scope_map, _diags) = declare_names(&ast, root);
        let table = build_type_table(&ast, root, &scopes, &scope_map, &mut pool);
        let (potypes, errors) = compute_potential_types(&ast, root, &scopes, &scope_map, &table, &mut pool);
        assert!(errors.is_empty());

        let lit = find_first(&ast, root, AstKind::BooleanLiteral).unwrap();
        let pt = potypes.get(lit).unwrap();
        assert_eq!(pt.as_set().unwrap().len(), 1);
    }

    #[test]
    fn unresolved_transition_target_is_unknown_name() {
        let src = "parser P() { state start { transition foo; } }";
        let (ast, root) = parse_program(src).unwrap();
        let mut pool = TypePool::new();
        let (scopes, scope_map, _diags) = declare_names(&ast, root);
        let table = build_type_table(&ast, root, &scopes, &scope_map, &mut pool);
        let (_potypes, errors) = compute_potential_types(&ast, root, &scopes, &scope_map, &table, &mut pool);

        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], AnalysisError::UnknownName { name, .. } if name == "foo"));
    }

    #[test]
    fn accept_resolves_as_a_built_in_state() {
        let src = "parser P() { state start { transition accept; } }";
        let (ast, root) = parse_program(src).unwrap();
        let mut pool = TypePool::new();
        let (scopes, scope_map, diags) = declare_names(&ast, root);
        assert!(diags.is_empty());
        let table = build_type_table(&ast, root, &scopes, &scope_map, &mut pool);
        let (_potypes, errors) = compute_potential_types(&ast, root, &scopes, &scope_map, &table, &mut pool);
        assert!(errors.is_empty());
    }

    #[test]
    fn struct_field_access_resolves_the_field_type() {
        let src = "struct S { bit<8> a; } control C() { apply { S s; bit<8> x = s.a; } }";
        let (ast, root) = parse_program(src).unwrap();
        let mut pool = TypePool::new();
        let (scopes, scope_map, diags) = declare_names(&ast, root);
        assert!(diags.is_empty());
        let table = build_type_table(&ast, root, &scopes, &scope_map, &mut pool);
        let (potypes, errors) = compute_potential_types(&ast, root, &scopes, &scope_map, &table, &mut pool);
        assert!(errors.is_empty());

        let sel = find_first(&ast, root, AstKind::MemberSelector).unwrap();
        let pt = potypes.get(sel).unwrap();
        let set = pt.as_set().unwrap();
        assert_eq!(set.len(), 1);
        assert!(matches!(pool.get(pool.effective_type(set[0])), TypeFormer::Bit { width: 8 }));
    }

    fn find_first(ast: &AstArena, node: NodeId, kind: AstKind) -> Option<NodeId> {
        if ast.get(node).kind() == kind {
            return Some(node);
        }
        for c in ast.children(node) {
            if let Some(found) = find_first(ast, c, kind) {
                return Some(found);
            }
        }
        None
    }
}
