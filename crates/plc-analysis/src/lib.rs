//! Name resolution, type-table construction, and bidirectional type checking
//! for a packet-processing language.
//!
//! Four passes run in sequence over an already-parsed [`plc_ast::Arena`]:
//! [`declare`] builds the scope graph and field tables, [`typetable`] turns
//! every declaration into a [`types::TypeId`], [`potype`] accumulates each
//! expression's candidate types bottom-up, and [`select`] narrows each one
//! down top-down using the required type its context imposes. [`analyze`]
//! runs all four and collects every diagnostic raised along the way.
//!
//! # Examples
//!
//! ```rust
//! use plc_ast::parse_program;
//!
//! let (ast, root) = parse_program("control C() { apply { bit<8> x = 8w1; } }").unwrap();
//! let (analysis, errors) = plc_analysis::analyze(&ast, root);
//! assert!(errors.is_empty());
//! let _ = analysis;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(clippy::missing_docs_in_private_items)]

pub mod declare;
pub mod diagnostics;
pub mod potype;
pub mod scope;
pub mod select;
pub mod types;
pub mod typetable;

use plc_ast::Arena;
use plc_ast::NodeId;

pub use diagnostics::AnalysisError;
pub use scope::Namespace;
pub use scope::ScopeId;
pub use scope::Scopes;
pub use select::TypeEnv;
pub use types::TypeFormer;
pub use types::TypeId;
pub use types::TypePool;
pub use typetable::TypeTable;

/// Everything later stages (diagnostic rendering, code generation) need out
/// of analysis: the scope graph, the type pool and table, and the final
/// per-expression type assignment.
#[derive(Debug)]
pub struct Analysis {
    /// The lexical scope graph built by [`declare`].
    pub scopes: Scopes,
    /// Every type former produced while analyzing the program.
    pub pool: TypePool,
    /// Each declaration's introduced or given type.
    pub table: TypeTable,
    /// Each expression's committed type.
    pub types: TypeEnv,
}

/// Runs the full analysis pipeline over the tree rooted at `root`, returning
/// the finished [`Analysis`] and every diagnostic raised along the way.
///
/// Passes run in a fixed order — name declaration, type-table construction,
/// potential-type accumulation, type selection — and each continues past its
/// own errors so unrelated problems elsewhere in the program are still
/// reported in a single run rather than stopping at the first one.
pub fn analyze(ast: &Arena, root: NodeId) -> (Analysis, Vec<AnalysisError>) {
    let span = tracing::info_span!("analyze");
    let _enter = span.enter();
    let mut errors = Vec::new();
    let mut pool = TypePool::new();

    let (scopes, scope_map, field_map, declare_errors) = declare::declare_names_with_fields(ast, root);
    tracing::debug!(errors = declare_errors.len(), "name declaration complete");
    errors.extend(declare_errors);

    let (table, table_errors) =
        typetable::build_type_table_with_diagnostics(ast, root, &scopes, &scope_map, &field_map, &mut pool);
    tracing::debug!(errors = table_errors.len(), "type table built");
    errors.extend(table_errors);

    let (potypes, potype_errors) = potype::compute_potential_types(ast, root, &scopes, &scope_map, &table, &mut pool);
    tracing::debug!(errors = potype_errors.len(), "potential types accumulated");
    errors.extend(potype_errors);

    let (types, select_errors) = select::select_types(ast, root, &table, &potypes, &mut pool);
    tracing::debug!(errors = select_errors.len(), "type selection complete");
    errors.extend(select_errors);

    tracing::info!(total_errors = errors.len(), "analysis complete");
    (
        Analysis {
            scopes,
            pool,
            table,
            types,
        },
        errors,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use plc_ast::parse_program;

    #[test]
    fn analyze_runs_every_pass_and_commits_a_type() {
        let (ast, root) = parse_program("control C() { apply { bit<8> x = 8w1; } }").unwrap();
        let (analysis, errors) = analyze(&ast, root);
        assert!(errors.is_empty());

        let decl = find_first(&ast, root, plc_ast::AstKind::VariableDeclaration).unwrap();
        let init = ast.nth_child(decl, 2).unwrap();
        let ty = analysis.types.get(init).unwrap();
        assert!(matches!(
            analysis.pool.get(analysis.pool.effective_type(ty)),
            TypeFormer::Bit { width: 8 }
        ));
    }

    #[test]
    fn analyze_reports_an_unknown_transition_target() {
        let (ast, root) = parse_program("parser P() { state start { transition foo; } }").unwrap();
        let (_analysis, errors) = analyze(&ast, root);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], AnalysisError::UnknownName { .. }));
    }

    fn find_first(ast: &Arena, node: NodeId, kind: plc_ast::AstKind) -> Option<NodeId> {
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
