//! End-to-end acceptance scenarios (S1-S6).
//!
//! Each test drives the public [`plc_analysis::analyze`] entry point over a
//! complete small program the way the CLI driver would, rather than calling
//! individual passes directly — these are acceptance checks for the
//! pipeline as a whole, not unit tests of a single pass.

use plc_analysis::AnalysisError;
use plc_analysis::Namespace;
use plc_analysis::TypeFormer;
use plc_analysis::analyze;
use plc_ast::Arena;
use plc_ast::AstKind;
use plc_ast::NodeId;
use plc_ast::parse_program;

fn find_first(ast: &Arena, node: NodeId, kind: AstKind) -> Option<NodeId> {
    if ast.get(node).kind() == kind {
        return Some(node);
    }
    for child in ast.children(node) {
        if let Some(found) = find_first(ast, child, kind) {
            return Some(found);
        }
    }
    None
}

/// S1 - minimal program: a parser with one state transitioning to the
/// built-in `accept` state resolves cleanly, with `P` and `start` bound in
/// the namespaces the grammar implies.
#[test]
fn s1_minimal_program_resolves_cleanly() {
    let (ast, root) = parse_program("parser P() { state start { transition accept; } }").unwrap();
    let (analysis, errors) = analyze(&ast, root);
    assert!(errors.is_empty());

    assert_eq!(ast.get(root).kind(), AstKind::Program);
    let decl_list = ast.nth_child(root, 0).unwrap();
    let parser_decl = ast.nth_child(decl_list, 0).unwrap();
    assert_eq!(ast.get(parser_decl).kind(), AstKind::ParserDeclaration);

    assert!(
        analysis
            .scopes
            .lookup_current(analysis.scopes.root(), "P", Namespace::Type)
            .is_some(),
        "P must be bound in the root scope's TYPE namespace"
    );

    let start = find_first(&ast, root, AstKind::ParserState).unwrap();
    assert_eq!(ast.get(start).kind(), AstKind::ParserState);
}

/// S2 - type error: assigning a `bool` literal to a `bit<8>` variable
/// commits the right-hand side to `bool` and then fails to reconcile it
/// with the assignment's required `bit<8>`.
#[test]
fn s2_assignment_type_mismatch_is_reported() {
    let (ast, root) = parse_program("control C() { apply { bit<8> x; x = true; } }").unwrap();
    let (_analysis, errors) = analyze(&ast, root);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], AnalysisError::TypeMismatch { .. }));
}

/// S3 - shadowing: an inner block's `bit<16> x` shadows the outer
/// `bit<8> x` for the assignment inside the block; both declarations
/// coexist without triggering a redeclaration error.
#[test]
fn s3_inner_block_shadows_outer_declaration() {
    let (ast, root) =
        parse_program("control C() { apply { bit<8> x; { bit<16> x; x = 0; } } }").unwrap();
    let (_analysis, errors) = analyze(&ast, root);
    assert!(errors.is_empty(), "shadowing a variable in a nested block must not error: {errors:?}");
}

/// S4 - redeclaration: a second top-level `struct S` in the same (root)
/// scope is rejected, citing the first declaration's position.
#[test]
fn s4_duplicate_struct_declaration_is_reported() {
    let (ast, root) = parse_program("struct S { bit<8> a; } struct S { bit<16> b; }").unwrap();
    let (_analysis, errors) = analyze(&ast, root);
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        AnalysisError::Redeclaration { name, .. } => assert_eq!(name, "S"),
        other => panic!("expected Redeclaration, got {other:?}"),
    }
}

/// S5 - overload resolution: an extern with a zero-argument and a
/// one-argument constructor resolves each instantiation to the matching
/// overload, and both instances commit to the extern's own type.
#[test]
fn s5_extern_constructor_overloads_resolve_by_arity() {
    let (ast, root) =
        parse_program("extern E { E(); E(bit<8> w); } E() e1; E(8w0) e2;").unwrap();
    let (analysis, errors) = analyze(&ast, root);
    assert!(errors.is_empty(), "overload resolution should not error: {errors:?}");

    let decl_list = ast.nth_child(root, 0).unwrap();
    let instantiations: Vec<NodeId> = ast
        .children(decl_list)
        .filter(|&c| ast.get(c).kind() == AstKind::Instantiation)
        .collect();
    assert_eq!(instantiations.len(), 2);

    for inst in instantiations {
        let ty = analysis.table.get(inst).unwrap_or_else(|| {
            // Instantiations commit their expression type via type_env,
            // not type_table; fall back to that side table.
            analysis.types.get(inst).expect("instantiation must commit to a type")
        });
        let effective = analysis.pool.effective_type(ty);
        assert!(
            matches!(analysis.pool.get(effective), TypeFormer::Extern { name, .. } if name == "E"),
            "expected both e1 and e2 to commit to extern E, got {:?}",
            analysis.pool.get(effective)
        );
    }
}

/// S6 - unknown name: a `transition` to a state that was never declared is
/// reported as an unresolved name.
#[test]
fn s6_unknown_transition_target_is_reported() {
    let (ast, root) = parse_program("parser P() { state start { transition foo; } }").unwrap();
    let (_analysis, errors) = analyze(&ast, root);
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        AnalysisError::UnknownName { name, .. } => assert_eq!(name, "foo"),
        other => panic!("expected UnknownName, got {other:?}"),
    }
}
