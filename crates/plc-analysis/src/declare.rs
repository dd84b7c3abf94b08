//! The name-declaration pass.
//!
//! Walks the finished AST once, building the scope graph and two side
//! tables: `opened_scopes` (which scope a node's children should resolve
//! names in) and `field_map` (a declaration's named, ordered fields, for
//! struct/header/header_union types). Neither table touches the AST itself;
//! both are looked up by [`NodeId`] from the outside.

use indexmap::IndexMap;
use plc_ast::Arena;
use plc_ast::AstKind;
use plc_ast::NodeId;
use plc_ast::Payload;
use plc_ast::Span;

use crate::diagnostics::AnalysisError;
use crate::scope::Namespace;
use crate::scope::ScopeId;
use crate::scope::Scopes;

/// Maps a node to the scope its children's names should be looked up in.
///
/// Every node gets an entry; for most nodes it is simply their parent's
/// scope, but nodes that open a new lexical scope (parser/control/package
/// declarations, blocks, states, actions, functions, tables) map to a fresh
/// child scope instead.
#[derive(Debug, Default)]
pub struct ScopeMap {
    entries: IndexMap<NodeId, ScopeId>,
}

impl ScopeMap {
    /// The scope recorded for `node`.
    pub fn get(&self, node: NodeId) -> Option<ScopeId> {
        self.entries.get(&node).copied()
    }
}

/// A struct/header/header_union declaration's ordered, named fields.
#[derive(Debug, Default, Clone)]
pub struct FieldList {
    /// Field name to its declaring `StructField` node, in declaration order.
    pub fields: IndexMap<String, NodeId>,
}

/// Maps a struct/header/header_union declaration node to its field list.
#[derive(Debug, Default)]
pub struct FieldMap {
    entries: IndexMap<NodeId, FieldList>,
}

impl FieldMap {
    /// The field list recorded for `node`, if it is a struct-like type
    /// declaration.
    pub fn get(&self, node: NodeId) -> Option<&FieldList> {
        self.entries.get(&node)
    }
}

/// Whether `kind` introduces its own child scope rather than reusing its
/// parent's.
fn opens_scope(kind: AstKind) -> bool {
    matches!(
        kind,
        AstKind::ParserDeclaration
            | AstKind::ParserTypeDeclaration
            | AstKind::ControlDeclaration
            | AstKind::ControlTypeDeclaration
            | AstKind::PackageTypeDeclaration
            | AstKind::ActionDeclaration
            | AstKind::FunctionDeclaration
            | AstKind::FunctionPrototype
            | AstKind::ExternTypeDeclaration
            | AstKind::ParserState
            | AstKind::BlockStatement
            | AstKind::ParserBlockStatement
            | AstKind::TableDeclaration
    )
}

/// The namespace and declared-name source for a declaration-shaped node, if
/// any. Returns `None` for nodes that don't themselves bind a name.
fn declared_name(ast: &Arena, node: NodeId) -> Option<(Namespace, NodeId, String, Span)> {
    let kind = ast.get(node).kind();
    let namespace = match kind {
        AstKind::PackageTypeDeclaration
        | AstKind::ParserDeclaration
        | AstKind::ParserTypeDeclaration
        | AstKind::ControlDeclaration
        | AstKind::ControlTypeDeclaration
        | AstKind::TypedefDeclaration
        | AstKind::StructTypeDeclaration
        | AstKind::HeaderTypeDeclaration
        | AstKind::HeaderUnionDeclaration
        | AstKind::EnumDeclaration
        | AstKind::ExternTypeDeclaration => Namespace::Type,

        AstKind::Instantiation
        | AstKind::ActionDeclaration
        | AstKind::TableDeclaration
        | AstKind::FunctionDeclaration
        | AstKind::FunctionPrototype
        | AstKind::VariableDeclaration
        | AstKind::Parameter
        | AstKind::ParserState => Namespace::Var,

        _ => return None,
    };

    for child in ast.children(node) {
        let child_data = ast.get(child);
        if child_data.kind() == AstKind::Name {
            if let Payload::Ident(name) = child_data.payload() {
                return Some((namespace, child, name.clone(), child_data.span()));
            }
        }
    }
    None
}

/// Runs the name-declaration pass over the tree rooted at `root`.
///
/// Returns the built scope graph, the `opened_scopes` side table, and any
/// [`AnalysisError::Redeclaration`]s encountered (collection continues past
/// an error so later, unrelated declarations are still processed).
pub fn declare_names(ast: &Arena, root: NodeId) -> (Scopes, ScopeMap, Vec<AnalysisError>) {
    let mut scopes = Scopes::new();
    let mut scope_map = ScopeMap::default();
    let mut field_map = FieldMap::default();
    let mut errors = Vec::new();
    let root_scope = scopes.root();

    walk(
        ast,
        root,
        root_scope,
        &mut scopes,
        &mut scope_map,
        &mut field_map,
        &mut errors,
    );

    (scopes, scope_map, errors)
}

/// Runs the name-declaration pass and additionally returns the `field_map`
/// side table (split from [`declare_names`] only to keep that function's
/// common-case signature small).
pub fn declare_names_with_fields(
    ast: &Arena,
    root: NodeId,
) -> (Scopes, ScopeMap, FieldMap, Vec<AnalysisError>) {
    let mut scopes = Scopes::new();
    let mut scope_map = ScopeMap::default();
    let mut field_map = FieldMap::default();
    let mut errors = Vec::new();
    let root_scope = scopes.root();

    walk(
        ast,
        root,
        root_scope,
        &mut scopes,
        &mut scope_map,
        &mut field_map,
        &mut errors,
    );

    (scopes, scope_map, field_map, errors)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    ast: &Arena,
    node: NodeId,
    scope: ScopeId,
    scopes: &mut Scopes,
    scope_map: &mut ScopeMap,
    field_map: &mut FieldMap,
    errors: &mut Vec<AnalysisError>,
) {
    if let Some((namespace, decl_node, name, span)) = declared_name(ast, node) {
        if let Err(e) = scopes.bind(scope, &name, namespace, decl_node, span) {
            errors.push(e);
        }
    }

    let kind = ast.get(node).kind();
    let child_scope = if opens_scope(kind) {
        scopes.create_child(scope)
    } else {
        scope
    };
    scope_map.entries.insert(node, child_scope);

    if matches!(kind, AstKind::ParserDeclaration) {
        // `accept`/`reject` are always-present implicit states; bind them
        // here rather than requiring a source declaration for either.
        let _ = scopes.bind(child_scope, "accept", Namespace::Var, node, Span::new(0, 0));
        let _ = scopes.bind(child_scope, "reject", Namespace::Var, node, Span::new(0, 0));
    }

    if matches!(
        kind,
        AstKind::StructTypeDeclaration | AstKind::HeaderTypeDeclaration | AstKind::HeaderUnionDeclaration
    ) {
        record_fields(ast, node, field_map);
    }

    for child in ast.children(node) {
        walk(ast, child, child_scope, scopes, scope_map, field_map, errors);
    }
}

/// Records the ordered, named fields of a struct/header/header_union
/// declaration into `field_map`.
fn record_fields(ast: &Arena, node: NodeId, field_map: &mut FieldMap) {
    let mut list = FieldList::default();
    for child in ast.children(node) {
        if ast.get(child).kind() != AstKind::StructFieldList {
            continue;
        }
        for field in ast.children(child) {
            if ast.get(field).kind() != AstKind::StructField {
                continue;
            }
            if let Some(name_node) = ast.nth_child(field, 1) {
                if let Payload::Ident(name) = ast.get(name_node).payload() {
                    list.fields.insert(name.clone(), field);
                }
            }
        }
    }
    field_map.entries.insert(node, list);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use plc_ast::parse_program;

    #[test]
    fn top_level_type_is_bound_in_root_scope() {
        let (ast, root) = parse_program("struct S { bit<8> a; }").unwrap();
        let (scopes, _map, errors) = declare_names(&ast, root);
        assert!(errors.is_empty());
        assert!(scopes.lookup(scopes.root(), "S", Namespace::Type).is_some());
    }

    #[test]
    fn duplicate_type_declaration_is_reported() {
        let (ast, root) = parse_program("struct S { bit<8> a; } struct S { bit<8> b; }").unwrap();
        let (_scopes, _map, errors) = declare_names(&ast, root);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], AnalysisError::Redeclaration { .. }));
    }

    #[test]
    fn action_parameters_scope_to_the_action() {
        let (ast, root) = parse_program("control C() { action a(bit<8> x) { } apply { } }").unwrap();
        let (scopes, map, errors) = declare_names(&ast, root);
        assert!(errors.is_empty());

        let control = find_first(&ast, root, AstKind::ControlDeclaration).unwrap();
        let control_scope = map.get(control).unwrap();
        let action = find_first(&ast, root, AstKind::ActionDeclaration).unwrap();
        let action_scope = map.get(action).unwrap();

        assert!(scopes.lookup_current(control_scope, "x", Namespace::Var).is_none());
        assert!(scopes.lookup_current(action_scope, "x", Namespace::Var).is_some());
    }

    #[test]
    fn struct_fields_are_recorded_in_field_map() {
        let (ast, root) = parse_program("struct S { bit<8> a; bool b; }").unwrap();
        let (_scopes, _map, field_map, _errors) = declare_names_with_fields(&ast, root);
        let s = find_first(&ast, root, AstKind::StructTypeDeclaration).unwrap();
        let fields = field_map.get(s).unwrap();
        assert_eq!(fields.fields.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    fn find_first(ast: &Arena, node: NodeId, kind: AstKind) -> Option<NodeId> {
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
