//! The type-selection pass: narrows every expression's bottom-up
//! [`PotentialType`] down to a single committed [`TypeId`], using the
//! required type each statement-level context imposes on its expressions.
//!
//! [`crate::potype`] already collapsed every expression subtree into a
//! candidate set with no notion of where the expression is used; this pass
//! walks the tree a second time, top-down, injecting a required type at the
//! handful of positions the language actually constrains one (an
//! assignment's right-hand side, a variable's initializer, a `return`
//! expression, an `if`/`select` condition) and defaulting to "exactly one
//! candidate or it's an error" everywhere else. Splitting the work this way
//! means neither pass needs a fix-point.

use indexmap::IndexMap;
use indexmap::IndexSet;
use plc_ast::Arena as AstArena;
use plc_ast::AstKind;
use plc_ast::NodeId;

use crate::diagnostics::AnalysisError;
use crate::potype::PotentialType;
use crate::potype::PotypeMap;
use crate::types::TypeFormer;
use crate::types::TypeId;
use crate::types::TypePool;
use crate::typetable::TypeTable;

/// The side table mapping every expression node to the single [`TypeId`] it
/// was committed to.
#[derive(Debug, Default)]
pub struct TypeEnv {
    entries: IndexMap<NodeId, TypeId>,
}

impl TypeEnv {
    /// The type `node` was committed to, if any.
    ///
    /// Absent for a node whose potential type was empty or ambiguous (the
    /// error was already recorded) and for nodes that are not themselves
    /// expression positions (containers like an `ArgumentList`).
    pub fn get(&self, node: NodeId) -> Option<TypeId> {
        self.entries.get(&node).copied()
    }
}

/// Tracks the return type of the function/action body currently being
/// walked, so a nested `return` statement knows what it is required to
/// produce.
struct Context {
    return_ty: Option<TypeId>,
}

/// Runs the type-selection pass over the tree rooted at `root`.
pub fn select_types(
    ast: &AstArena,
    root: NodeId,
    table: &TypeTable,
    potypes: &PotypeMap,
    pool: &mut TypePool,
) -> (TypeEnv, Vec<AnalysisError>) {
    let mut env = TypeEnv::default();
    let mut errors = Vec::new();
    let mut ctx = Context { return_ty: None };
    walk(ast, root, table, potypes, pool, &mut ctx, &mut env, &mut errors);
    (env, errors)
}

/// Walks `node` as a statement/declaration, dispatching to the handful of
/// shapes that inject a required type into one of their children, and
/// otherwise recursing. A child that is itself an expression root (carries a
/// [`PotentialType`]) is committed with no required type rather than walked
/// further as a statement.
#[allow(clippy::too_many_arguments)]
fn walk(
    ast: &AstArena,
    node: NodeId,
    table: &TypeTable,
    potypes: &PotypeMap,
    pool: &mut TypePool,
    ctx: &mut Context,
    env: &mut TypeEnv,
    errors: &mut Vec<AnalysisError>,
) {
    match ast.get(node).kind() {
        AstKind::FunctionDeclaration | AstKind::FunctionPrototype | AstKind::ActionDeclaration => {
            let ret_ty = table.get(node).and_then(|fn_ty| match pool.get(pool.effective_type(fn_ty)) {
                TypeFormer::Function { ret, .. } => Some(*ret),
                _ => None,
            });
            let saved = std::mem::replace(&mut ctx.return_ty, ret_ty);
            for child in ast.children(node) {
                walk(ast, child, table, potypes, pool, ctx, env, errors);
            }
            ctx.return_ty = saved;
        }

        AstKind::VariableDeclaration => {
            if let Some(init) = ast.nth_child(node, 2) {
                let declared = table.get(node);
                commit_subtree(ast, init, declared, potypes, pool, env, errors);
            }
        }

        AstKind::AssignmentStatement => {
            let lhs = ast.nth_child(node, 0).expect("assignment has a target");
            let rhs = ast.nth_child(node, 1).expect("assignment has a value");
            commit_subtree(ast, lhs, None, potypes, pool, env, errors);
            let required = env.get(lhs);
            commit_subtree(ast, rhs, required, potypes, pool, env, errors);
        }

        AstKind::ReturnStatement => {
            if let Some(expr) = ast.nth_child(node, 0) {
                commit_subtree(ast, expr, ctx.return_ty, potypes, pool, env, errors);
            }
        }

        AstKind::ConditionalStatement => {
            let cond = ast.nth_child(node, 0).expect("conditional has a condition");
            let bool_ty = pool.intern(TypeFormer::Bool);
            commit_subtree(ast, cond, Some(bool_ty), potypes, pool, env, errors);
            for (i, child) in ast.children(node).enumerate() {
                if i == 0 {
                    continue;
                }
                walk(ast, child, table, potypes, pool, ctx, env, errors);
            }
        }

        AstKind::SwitchStatement => {
            let expr = ast.nth_child(node, 0).expect("switch has a selector expression");
            commit_subtree(ast, expr, None, potypes, pool, env, errors);
            if let Some(cases) = ast.nth_child(node, 1) {
                for case in ast.children(cases) {
                    if let Some(block) = ast.nth_child(case, 1) {
                        walk(ast, block, table, potypes, pool, ctx, env, errors);
                    }
                }
            }
        }

        AstKind::TransitionStatement => {
            if let Some(target) = ast.nth_child(node, 0) {
                if ast.get(target).kind() == AstKind::SelectExpression {
                    walk_select(ast, target, potypes, pool, env, errors);
                }
                // A bare state name is resolved by scope alone (see
                // `crate::potype`); it has no potential type to commit.
            }
        }

        _ => {
            for child in ast.children(node) {
                if potypes.get(child).is_some() {
                    commit_subtree(ast, child, None, potypes, pool, env, errors);
                } else {
                    walk(ast, child, table, potypes, pool, ctx, env, errors);
                }
            }
        }
    }
}

/// Commits a `select`'s own expression list unconstrained, then threads each
/// selector's committed type into the matching position of every case's
/// keyset.
fn walk_select(
    ast: &AstArena,
    node: NodeId,
    potypes: &PotypeMap,
    pool: &mut TypePool,
    env: &mut TypeEnv,
    errors: &mut Vec<AnalysisError>,
) {
    let exprs = ast.nth_child(node, 0).expect("select has an expression list");
    let cases = ast.nth_child(node, 1).expect("select has a case list");

    for expr in ast.children(exprs) {
        commit_subtree(ast, expr, None, potypes, pool, env, errors);
    }
    let selectors: Vec<Option<TypeId>> = ast.children(exprs).map(|e| env.get(e)).collect();

    for case in ast.children(cases) {
        let keyset = ast.nth_child(case, 0).expect("select case has a keyset");
        commit_keyset(ast, keyset, &selectors, potypes, pool, env, errors);

        if let Some(target) = ast.nth_child(case, 1) {
            if ast.get(target).kind() == AstKind::SelectExpression {
                walk_select(ast, target, potypes, pool, env, errors);
            }
        }
    }
}

/// Commits a keyset's elements against the selector types at the
/// corresponding position, positionally: a `simpleKeysetExpression` matches
/// a single-expression `select`, a `tupleKeysetExpression`'s elements match
/// a multi-expression one in order.
fn commit_keyset(
    ast: &AstArena,
    keyset: NodeId,
    selectors: &[Option<TypeId>],
    potypes: &PotypeMap,
    pool: &mut TypePool,
    env: &mut TypeEnv,
    errors: &mut Vec<AnalysisError>,
) {
    match ast.get(keyset).kind() {
        AstKind::SimpleKeysetExpression => {
            if let Some(inner) = ast.nth_child(keyset, 0) {
                let required = selectors.first().copied().flatten();
                commit_subtree(ast, inner, required, potypes, pool, env, errors);
            }
        }
        AstKind::TupleKeysetExpression => {
            if let Some(list) = ast.nth_child(keyset, 0) {
                for (i, item) in ast.children(list).enumerate() {
                    let required = selectors.get(i).copied().flatten();
                    commit_subtree(ast, item, required, potypes, pool, env, errors);
                }
            }
        }
        _ => {}
    }
}

/// Commits `node` (and, recursively, every nested expression it contains) to
/// a single type, using `required` only for `node` itself — every child
/// commits unconstrained, mirroring the structural skip-list
/// [`crate::potype`]'s bottom-up pass uses so the two passes agree on what
/// counts as an expression position.
#[allow(clippy::too_many_arguments)]
fn commit_subtree(
    ast: &AstArena,
    node: NodeId,
    required: Option<TypeId>,
    potypes: &PotypeMap,
    pool: &mut TypePool,
    env: &mut TypeEnv,
    errors: &mut Vec<AnalysisError>,
) {
    match ast.get(node).kind() {
        AstKind::TypeRef | AstKind::IdentifierList | AstKind::SpecifiedIdentifierList | AstKind::StructField => {}
        AstKind::MemberSelector => {
            if let Some(base) = ast.nth_child(node, 0) {
                commit_subtree(ast, base, None, potypes, pool, env, errors);
            }
        }
        AstKind::Argument => {
            if let Some(expr) = ast.children(node).last() {
                commit_subtree(ast, expr, None, potypes, pool, env, errors);
            }
        }
        AstKind::KeyElement => {
            if let Some(expr) = ast.nth_child(node, 0) {
                commit_subtree(ast, expr, None, potypes, pool, env, errors);
            }
        }
        AstKind::TupleKeysetExpression | AstKind::SimpleKeysetExpression => {
            // Reached only from a context that never threads a selector type
            // (e.g. a keyset outside any `select`'s case list); commit
            // unconstrained rather than duplicate `commit_keyset`'s logic.
            commit_keyset(ast, node, &[], potypes, pool, env, errors);
        }
        _ => {
            for child in ast.children(node) {
                commit_subtree(ast, child, None, potypes, pool, env, errors);
            }
        }
    }

    if let Some(PotentialType::Set(set)) = potypes.get(node) {
        let set = set.clone();
        commit_leaf(ast, pool, node, &set, required, env, errors);
    }
}

/// Picks `node`'s single committed type out of `set`, given its context's
/// `required` type, and records it in `env`.
///
/// Follows the two-step commit procedure exactly: the set's raw
/// cardinality is judged first (a multi-candidate overload that `potype`
/// never narrowed down is `AmbiguousType`; an empty set is `NoMatchingType`,
/// except for a bare `Name` node, whose failed lookup `potype` already
/// reported as `UnknownName` and which would otherwise be double-reported at
/// the same span), and only once exactly one candidate remains is it checked
/// — not searched — against `required`, so a singleton candidate that simply
/// isn't the required type reports `TypeMismatch` rather than being
/// conflated with "no candidate at all".
fn commit_leaf(
    ast: &AstArena,
    pool: &TypePool,
    node: NodeId,
    set: &IndexSet<TypeId>,
    required: Option<TypeId>,
    env: &mut TypeEnv,
    errors: &mut Vec<AnalysisError>,
) {
    let span = ast.get(node).span();
    let expr = ast.get(node).kind().to_string();

    let candidate = match set.len() {
        0 => {
            // A bare `name` that failed to resolve was already reported as
            // `UnknownName` by `crate::potype`; reporting it again here
            // would just duplicate that diagnostic at the same span. Every
            // other expression shape (a member select with no such field, a
            // call with no matching overload, …) reaches an empty set with
            // no prior diagnostic, so it is reported here instead.
            if ast.get(node).kind() != AstKind::Name {
                errors.push(AnalysisError::NoMatchingType { span, expr });
            }
            return;
        }
        1 => set[0],
        count => {
            errors.push(AnalysisError::AmbiguousType { span, expr, count });
            return;
        }
    };

    let effective = pool.effective_type(candidate);
    if let Some(req) = required {
        if !pool.type_eq(effective, req) {
            errors.push(AnalysisError::TypeMismatch {
                span,
                expected: pool.get(pool.effective_type(req)).to_string(),
                found: pool.get(effective).to_string(),
            });
            return;
        }
    }

    env.entries.insert(node, effective);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::declare::declare_names;
    use crate::potype::compute_potential_types;
    use crate::typetable::build_type_table;
    use plc_ast::parse_program;

    fn run(src: &str) -> (AstArena, NodeId, TypeTable, TypeEnv, Vec<AnalysisError>, TypePool) {
        let (ast, root) = parse_program(src).unwrap();
        let mut pool = TypePool::new();
        let (scopes, scope_map, _diags) = declare_names(&ast, root);
        let table = build_type_table(&ast, root, &scopes, &scope_map, &mut pool);
        let (potypes, _errs) = compute_potential_types(&ast, root, &scopes, &scope_map, &table, &mut pool);
        let (env, errors) = select_types(&ast, root, &table, &potypes, &mut pool);
        (ast, root, table, env, errors, pool)
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

    #[test]
    fn variable_initializer_commits_to_the_declared_type() {
        let (ast, root, _table, env, errors, pool) = run("control C() { apply { bit<8> x = 8w1; } }");
        assert!(errors.is_empty());
        let decl = find_first(&ast, root, AstKind::VariableDeclaration).unwrap();
        let init = ast.nth_child(decl, 2).unwrap();
        let ty = env.get(init).unwrap();
        assert!(matches!(pool.get(pool.effective_type(ty)), TypeFormer::Bit { width: 8 }));
    }

    #[test]
    fn assignment_mismatch_is_reported() {
        let (_ast, _root, _table, _env, errors, _pool) =
            run("control C() { apply { bit<8> x; bool y; x = y; } }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], AnalysisError::TypeMismatch { .. }));
    }

    #[test]
    fn conditional_requires_a_boolean_condition() {
        let (_ast, _root, _table, _env, errors, _pool) =
            run("control C() { apply { bit<8> x = 8w1; if (x) { } } }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], AnalysisError::TypeMismatch { .. }));
    }

    #[test]
    fn transition_to_accept_needs_no_commit() {
        let (_ast, _root, _table, _env, errors, _pool) =
            run("parser P() { state start { transition accept; } }");
        assert!(errors.is_empty());
    }
}
