//! The recursive-descent AST builder.

use std::collections::HashSet;

use crate::ast::Arena;
use crate::ast::AstKind;
use crate::ast::NodeId;
use crate::ast::Payload;
use crate::lexer::NameClass;
use crate::lexer::NameClassifier;
use crate::lexer::TokenBuffer;
use crate::span::Span;
use crate::token::Token;
use crate::token::TokenKind;

/// Errors the builder can raise. There is no error recovery: the first
/// mismatch aborts parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A token did not match the production the grammar expected.
    #[error("{span}: expected {expected}, found {found}")]
    UnexpectedToken {
        /// The position of the offending token.
        span: Span,
        /// What the grammar expected to see.
        expected: String,
        /// What was actually found (its source text, or a description).
        found: String,
    },
    /// End-of-input was reached before a production completed.
    #[error("{span}: unexpected end of input")]
    UnexpectedEoi {
        /// The position at which input ran out.
        span: Span,
    },
}

impl ParseError {
    /// The position the error should be reported at.
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } | Self::UnexpectedEoi { span } => *span,
        }
    }
}

/// The names a parser-internal type tracker has seen declared, scoped by
/// lexical depth.
///
/// This is *not* the Scope/NameEntry/NameDeclaration structure that backs
/// name resolution — it is a minimal, write-only-during-parsing helper that
/// exists solely to resolve the `name` vs `typeName` lexical ambiguity. The
/// authoritative scope graph is rebuilt from scratch, independently, by the
/// name-declaration pass over the finished AST (see `plc-analysis`).
struct TypeNameTracker {
    scopes: Vec<HashSet<String>>,
}

impl TypeNameTracker {
    fn new() -> Self {
        let mut root = HashSet::new();
        for builtin in ["void", "bool", "int", "bit", "varbit", "string", "error", "match_kind"] {
            root.insert(builtin.to_string());
        }
        Self { scopes: vec![root] }
    }

    fn push(&mut self) {
        self.scopes.push(HashSet::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn bind_type(&mut self, name: &str) {
        self.scopes.last_mut().expect("root scope always present").insert(name.to_string());
    }

    fn is_type(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(name))
    }
}

impl NameClassifier for TypeNameTracker {
    fn classify(&self, name: &str) -> Option<NameClass> {
        if let Some(kw) = TokenKind::keyword_for(name) {
            return Some(NameClass::Keyword(kw));
        }
        if self.is_type(name) {
            return Some(NameClass::Type);
        }
        None
    }
}

/// The recursive-descent parser.
pub struct Parser<'a> {
    tokens: TokenBuffer<'a>,
    types: TypeNameTracker,
    arena: Arena,
}

/// Parses `source` into an AST, returning the arena and the root
/// `p4program` node.
pub fn parse_program(source: &str) -> Result<(Arena, NodeId), ParseError> {
    let mut parser = Parser {
        tokens: TokenBuffer::new(source),
        types: TypeNameTracker::new(),
        arena: Arena::new(),
    };
    let root = parser.parse_program()?;
    Ok((parser.arena, root))
}

impl<'a> Parser<'a> {
    fn cur(&mut self) -> Token {
        self.tokens.current(&mut self.types).clone()
    }

    fn cur_kind(&mut self) -> TokenKind {
        self.cur().kind
    }

    fn cur_span(&mut self) -> Span {
        self.tokens.span(&mut self.types)
    }

    fn peek_kind(&mut self, n: usize) -> TokenKind {
        self.tokens.peek(n, &mut self.types).kind
    }

    fn bump(&mut self) -> Result<Token, ParseError> {
        self.tokens.advance(&mut self.types).map_err(|_| ParseError::UnexpectedEoi {
            span: self.cur_span(),
        })
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.cur_kind() == kind {
            self.bump()
        } else {
            let span = self.cur_span();
            let found = self.cur().text;
            let found = if found.is_empty() { "end of input".to_string() } else { found };
            Err(ParseError::UnexpectedToken {
                span,
                expected: expected.to_string(),
                found,
            })
        }
    }

    fn error(&mut self, expected: &str) -> ParseError {
        let span = self.cur_span();
        let found = self.cur().text;
        let found = if found.is_empty() { "end of input".to_string() } else { found };
        ParseError::UnexpectedToken {
            span,
            expected: expected.to_string(),
            found,
        }
    }

    /// Runs `f` with a fresh child scope pushed onto the internal type
    /// tracker, guaranteeing the scope is popped whether `f` succeeds or
    /// fails: every scope push pairs with a pop on all exit paths, including
    /// error exits.
    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        self.types.push();
        let result = f(self);
        self.types.pop();
        result
    }

    fn alloc(&mut self, kind: AstKind, span: Span, payload: Payload) -> NodeId {
        self.arena.alloc(kind, span, payload)
    }

    fn ident_text(&mut self) -> Result<(String, Span), ParseError> {
        let span = self.cur_span();
        if self.cur_kind() != TokenKind::Identifier {
            return Err(self.error("identifier"));
        }
        let tok = self.bump()?;
        Ok((tok.text, span))
    }

    // ----------------------------------------------------------------
    // top level
    // ----------------------------------------------------------------

    fn parse_program(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let program = self.alloc(AstKind::Program, span, Payload::None);
        let list_span = span;
        let list = self.alloc(AstKind::DeclarationList, list_span, Payload::None);
        self.arena.push_child(program, list);

        while self.cur_kind() != TokenKind::EndOfInput {
            let decl = self.parse_declaration()?;
            self.arena.push_child(list, decl);
        }
        Ok(program)
    }

    fn parse_declaration(&mut self) -> Result<NodeId, ParseError> {
        match self.cur_kind() {
            TokenKind::Parser => self.parse_parser_declaration(),
            TokenKind::Control => self.parse_control_declaration(),
            TokenKind::Package => self.parse_package_type_declaration(),
            TokenKind::Typedef => self.parse_typedef_declaration(),
            TokenKind::Struct => self.parse_struct_type_declaration(),
            TokenKind::Header => self.parse_header_type_declaration(),
            TokenKind::HeaderUnion => self.parse_header_union_declaration(),
            TokenKind::Enum => self.parse_enum_declaration(),
            TokenKind::Error => self.parse_error_declaration(),
            TokenKind::MatchKind => self.parse_match_kind_declaration(),
            TokenKind::Extern => self.parse_extern_declaration(),
            TokenKind::Const => {
                self.bump()?;
                self.parse_type_led_declaration()
            }
            _ => self.parse_type_led_declaration(),
        }
    }

    // ----------------------------------------------------------------
    // parser / control
    // ----------------------------------------------------------------

    fn parse_parser_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Parser, "'parser'")?;
        let (name, name_span) = self.ident_text()?;
        self.types.bind_type(&name);
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));

        self.with_scope(|p| {
            let params = p.parse_parameter_list_parenthesized()?;

            if p.cur_kind() == TokenKind::Semi {
                p.bump()?;
                let node = p.alloc(AstKind::ParserTypeDeclaration, span, Payload::None);
                p.arena.push_child(node, name_node);
                p.arena.push_child(node, params);
                return Ok(node);
            }

            p.expect(TokenKind::LBrace, "'{'")?;
            let locals = p.parse_parser_local_elements()?;
            let states = p.parse_parser_states()?;
            p.expect(TokenKind::RBrace, "'}'")?;

            let node = p.alloc(AstKind::ParserDeclaration, span, Payload::None);
            p.arena.push_child(node, name_node);
            p.arena.push_child(node, params);
            p.arena.push_child(node, locals);
            p.arena.push_child(node, states);
            Ok(node)
        })
    }

    fn parse_parser_local_elements(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let list = self.alloc(AstKind::ParserLocalElements, span, Payload::None);
        while self.cur_kind() != TokenKind::State && self.cur_kind() != TokenKind::RBrace {
            let elem = self.parse_declaration()?;
            self.arena.push_child(list, elem);
        }
        Ok(list)
    }

    fn parse_parser_states(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let list = self.alloc(AstKind::ParserStates, span, Payload::None);
        while self.cur_kind() == TokenKind::State {
            let state = self.parse_parser_state()?;
            self.arena.push_child(list, state);
        }
        if self.arena.children(list).next().is_none() {
            return Err(self.error("at least one parser state"));
        }
        Ok(list)
    }

    fn parse_parser_state(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::State, "'state'")?;
        let (name, name_span) = self.ident_text()?;
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));

        self.with_scope(|p| {
            p.expect(TokenKind::LBrace, "'{'")?;
            let stmts_span = p.cur_span();
            let stmts = p.alloc(AstKind::ParserStatements, stmts_span, Payload::None);
            while p.cur_kind() != TokenKind::Transition {
                let stmt = p.parse_parser_statement()?;
                p.arena.push_child(stmts, stmt);
            }
            let transition = p.parse_transition_statement()?;
            p.expect(TokenKind::RBrace, "'}'")?;

            let node = p.alloc(AstKind::ParserState, span, Payload::None);
            p.arena.push_child(node, name_node);
            p.arena.push_child(node, stmts);
            p.arena.push_child(node, transition);
            Ok(node)
        })
    }

    fn parse_parser_statement(&mut self) -> Result<NodeId, ParseError> {
        match self.cur_kind() {
            TokenKind::LBrace => self.parse_parser_block_statement(),
            _ => self.parse_statement(),
        }
    }

    fn parse_parser_block_statement(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.with_scope(|p| {
            p.expect(TokenKind::LBrace, "'{'")?;
            let node = p.alloc(AstKind::ParserBlockStatement, span, Payload::None);
            while p.cur_kind() != TokenKind::RBrace {
                let stmt = p.parse_parser_statement()?;
                p.arena.push_child(node, stmt);
            }
            p.expect(TokenKind::RBrace, "'}'")?;
            Ok(node)
        })
    }

    fn parse_transition_statement(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Transition, "'transition'")?;
        let target = self.parse_state_expression()?;
        self.expect(TokenKind::Semi, "';'")?;
        let node = self.alloc(AstKind::TransitionStatement, span, Payload::None);
        self.arena.push_child(node, target);
        Ok(node)
    }

    fn parse_state_expression(&mut self) -> Result<NodeId, ParseError> {
        if self.cur_kind() == TokenKind::Select {
            self.parse_select_expression()
        } else {
            let (name, span) = self.ident_text()?;
            Ok(self.alloc(AstKind::Name, span, Payload::Ident(name)))
        }
    }

    fn parse_select_expression(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Select, "'select'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let exprs = self.parse_expression_list()?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let cases_span = self.cur_span();
        let cases = self.alloc(AstKind::SelectCaseList, cases_span, Payload::None);
        while self.cur_kind() != TokenKind::RBrace {
            let case = self.parse_select_case()?;
            self.arena.push_child(cases, case);
        }
        self.expect(TokenKind::RBrace, "'}'")?;

        let node = self.alloc(AstKind::SelectExpression, span, Payload::None);
        self.arena.push_child(node, exprs);
        self.arena.push_child(node, cases);
        Ok(node)
    }

    fn parse_select_case(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let keyset = self.parse_keyset_expression()?;
        self.expect(TokenKind::Colon, "':'")?;
        let target = self.parse_state_expression()?;
        self.expect(TokenKind::Semi, "';'")?;
        let node = self.alloc(AstKind::SelectCase, span, Payload::None);
        self.arena.push_child(node, keyset);
        self.arena.push_child(node, target);
        Ok(node)
    }

    fn parse_keyset_expression(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        if self.cur_kind() == TokenKind::LParen {
            self.bump()?;
            let list = self.parse_simple_expression_list()?;
            self.expect(TokenKind::RParen, "')'")?;
            let node = self.alloc(AstKind::TupleKeysetExpression, span, Payload::None);
            self.arena.push_child(node, list);
            Ok(node)
        } else {
            let inner = self.parse_simple_keyset_expr()?;
            let node = self.alloc(AstKind::SimpleKeysetExpression, span, Payload::None);
            self.arena.push_child(node, inner);
            Ok(node)
        }
    }

    fn parse_simple_expression_list(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let list = self.alloc(AstKind::SimpleExpressionList, span, Payload::None);
        let first = self.parse_simple_keyset_expr()?;
        self.arena.push_child(list, first);
        while self.cur_kind() == TokenKind::Comma {
            self.bump()?;
            let item = self.parse_simple_keyset_expr()?;
            self.arena.push_child(list, item);
        }
        Ok(list)
    }

    fn parse_simple_keyset_expr(&mut self) -> Result<NodeId, ParseError> {
        match self.cur_kind() {
            TokenKind::Underscore => {
                let span = self.cur_span();
                self.bump()?;
                Ok(self.alloc(AstKind::Dontcare, span, Payload::None))
            }
            TokenKind::Default => {
                let span = self.cur_span();
                self.bump()?;
                Ok(self.alloc(AstKind::Default, span, Payload::None))
            }
            _ => self.parse_expression(),
        }
    }

    fn parse_control_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Control, "'control'")?;
        let (name, name_span) = self.ident_text()?;
        self.types.bind_type(&name);
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));

        self.with_scope(|p| {
            let params = p.parse_parameter_list_parenthesized()?;

            if p.cur_kind() == TokenKind::Semi {
                p.bump()?;
                let node = p.alloc(AstKind::ControlTypeDeclaration, span, Payload::None);
                p.arena.push_child(node, name_node);
                p.arena.push_child(node, params);
                return Ok(node);
            }

            p.expect(TokenKind::LBrace, "'{'")?;
            let locals_span = p.cur_span();
            let locals = p.alloc(AstKind::ControlLocalDeclarations, locals_span, Payload::None);
            while p.cur_kind() != TokenKind::Apply {
                let local = p.parse_control_local_declaration()?;
                p.arena.push_child(locals, local);
            }
            p.expect(TokenKind::Apply, "'apply'")?;
            let apply = p.parse_block_statement()?;
            p.expect(TokenKind::RBrace, "'}'")?;

            let node = p.alloc(AstKind::ControlDeclaration, span, Payload::None);
            p.arena.push_child(node, name_node);
            p.arena.push_child(node, params);
            p.arena.push_child(node, locals);
            p.arena.push_child(node, apply);
            Ok(node)
        })
    }

    fn parse_control_local_declaration(&mut self) -> Result<NodeId, ParseError> {
        if self.cur_kind() == TokenKind::Table {
            self.parse_table_declaration()
        } else if self.cur_kind() == TokenKind::Action {
            self.parse_action_declaration()
        } else {
            self.parse_declaration()
        }
    }

    fn parse_action_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Action, "'action'")?;
        let (name, name_span) = self.ident_text()?;
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        self.with_scope(|p| {
            let params = p.parse_parameter_list_parenthesized()?;
            let body = p.parse_block_statement()?;
            let node = p.alloc(AstKind::ActionDeclaration, span, Payload::None);
            p.arena.push_child(node, name_node);
            p.arena.push_child(node, params);
            p.arena.push_child(node, body);
            Ok(node)
        })
    }

    fn parse_table_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Table, "'table'")?;
        let (name, name_span) = self.ident_text()?;
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        self.with_scope(|p| {
            p.expect(TokenKind::LBrace, "'{'")?;
            let props_span = p.cur_span();
            let props = p.alloc(AstKind::TablePropertyList, props_span, Payload::None);
            while p.cur_kind() != TokenKind::RBrace {
                let prop = p.parse_table_property()?;
                p.arena.push_child(props, prop);
            }
            p.expect(TokenKind::RBrace, "'}'")?;
            let node = p.alloc(AstKind::TableDeclaration, span, Payload::None);
            p.arena.push_child(node, name_node);
            p.arena.push_child(node, props);
            Ok(node)
        })
    }

    fn parse_table_property(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        match self.cur_kind() {
            TokenKind::Key => {
                self.bump()?;
                self.expect(TokenKind::Eq, "'='")?;
                self.expect(TokenKind::LBrace, "'{'")?;
                let list_span = self.cur_span();
                let list = self.alloc(AstKind::KeyElementList, list_span, Payload::None);
                while self.cur_kind() != TokenKind::RBrace {
                    let el = self.parse_key_element()?;
                    self.arena.push_child(list, el);
                }
                self.expect(TokenKind::RBrace, "'}'")?;
                self.expect(TokenKind::Semi, "';'")?;
                let node = self.alloc(AstKind::TableProperty, span, Payload::Ident("key".into()));
                self.arena.push_child(node, list);
                Ok(node)
            }
            TokenKind::Actions => {
                self.bump()?;
                self.expect(TokenKind::Eq, "'='")?;
                self.expect(TokenKind::LBrace, "'{'")?;
                let list_span = self.cur_span();
                let list = self.alloc(AstKind::ActionsProperty, list_span, Payload::None);
                while self.cur_kind() != TokenKind::RBrace {
                    let (name, name_span) = self.ident_text()?;
                    let action_name = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
                    let aref = self.alloc(AstKind::ActionRef, name_span, Payload::None);
                    self.arena.push_child(aref, action_name);
                    self.arena.push_child(list, aref);
                    if self.cur_kind() == TokenKind::Semi {
                        self.bump()?;
                    }
                }
                self.expect(TokenKind::RBrace, "'}'")?;
                self.expect(TokenKind::Semi, "';'")?;
                let node = self.alloc(AstKind::TableProperty, span, Payload::Ident("actions".into()));
                self.arena.push_child(node, list);
                Ok(node)
            }
            TokenKind::DefaultAction => {
                self.bump()?;
                self.expect(TokenKind::Eq, "'='")?;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semi, "';'")?;
                let node = self.alloc(AstKind::TableProperty, span, Payload::Ident("default_action".into()));
                self.arena.push_child(node, expr);
                Ok(node)
            }
            TokenKind::Entries => {
                // Disabled feature: parsed for structural completeness only,
                // never type-checked.
                self.bump()?;
                self.expect(TokenKind::Eq, "'='")?;
                self.expect(TokenKind::LBrace, "'{'")?;
                let list_span = self.cur_span();
                let list = self.alloc(AstKind::Entries, list_span, Payload::None);
                let mut depth = 1u32;
                while depth > 0 {
                    match self.cur_kind() {
                        TokenKind::LBrace => depth += 1,
                        TokenKind::RBrace => depth -= 1,
                        TokenKind::EndOfInput => return Err(self.error("'}'")),
                        _ => {}
                    }
                    if depth > 0 {
                        self.bump()?;
                    }
                }
                self.expect(TokenKind::RBrace, "'}'")?;
                self.expect(TokenKind::Semi, "';'")?;
                let node = self.alloc(AstKind::EntriesProperty, span, Payload::None);
                self.arena.push_child(node, list);
                Ok(node)
            }
            TokenKind::Identifier | TokenKind::TypeIdentifier => {
                // simpleProperty: an arbitrary `name = expr;` table property.
                // Also disabled: parsed only, never type-checked.
                let (name, _) = self.ident_text()?;
                self.expect(TokenKind::Eq, "'='")?;
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semi, "';'")?;
                let node = self.alloc(AstKind::SimpleProperty, span, Payload::Ident(name));
                self.arena.push_child(node, expr);
                Ok(node)
            }
            _ => Err(self.error("table property")),
        }
    }

    fn parse_key_element(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let expr = self.parse_expression()?;
        self.expect(TokenKind::Colon, "':'")?;
        let (kind, kind_span) = self.ident_text()?;
        self.expect(TokenKind::Semi, "';'")?;
        let node = self.alloc(AstKind::KeyElement, span, Payload::None);
        self.arena.push_child(node, expr);
        let kind_node = self.alloc(AstKind::Name, kind_span, Payload::Ident(kind));
        self.arena.push_child(node, kind_node);
        Ok(node)
    }

    // ----------------------------------------------------------------
    // package / instantiation / typedef / struct-like declarations
    // ----------------------------------------------------------------

    fn parse_package_type_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Package, "'package'")?;
        let (name, name_span) = self.ident_text()?;
        self.types.bind_type(&name);
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        let params = self.with_scope(|p| p.parse_parameter_list_parenthesized())?;
        self.expect(TokenKind::Semi, "';'")?;
        let node = self.alloc(AstKind::PackageTypeDeclaration, span, Payload::None);
        self.arena.push_child(node, name_node);
        self.arena.push_child(node, params);
        Ok(node)
    }

    fn parse_typedef_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Typedef, "'typedef'")?;
        let ty = self.parse_type_ref()?;
        let (name, name_span) = self.ident_text()?;
        self.types.bind_type(&name);
        self.expect(TokenKind::Semi, "';'")?;
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        let node = self.alloc(AstKind::TypedefDeclaration, span, Payload::None);
        self.arena.push_child(node, ty);
        self.arena.push_child(node, name_node);
        Ok(node)
    }

    fn parse_struct_type_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Struct, "'struct'")?;
        let (name, name_span) = self.ident_text()?;
        self.types.bind_type(&name);
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        let fields = self.parse_struct_field_list()?;
        let node = self.alloc(AstKind::StructTypeDeclaration, span, Payload::None);
        self.arena.push_child(node, name_node);
        self.arena.push_child(node, fields);
        Ok(node)
    }

    fn parse_header_type_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Header, "'header'")?;
        let (name, name_span) = self.ident_text()?;
        self.types.bind_type(&name);
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        let fields = self.parse_struct_field_list()?;
        let node = self.alloc(AstKind::HeaderTypeDeclaration, span, Payload::None);
        self.arena.push_child(node, name_node);
        self.arena.push_child(node, fields);
        Ok(node)
    }

    fn parse_header_union_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::HeaderUnion, "'header_union'")?;
        let (name, name_span) = self.ident_text()?;
        self.types.bind_type(&name);
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        let fields = self.parse_struct_field_list()?;
        let node = self.alloc(AstKind::HeaderUnionDeclaration, span, Payload::None);
        self.arena.push_child(node, name_node);
        self.arena.push_child(node, fields);
        Ok(node)
    }

    fn parse_struct_field_list(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::LBrace, "'{'")?;
        let list = self.alloc(AstKind::StructFieldList, span, Payload::None);
        while self.cur_kind() != TokenKind::RBrace {
            let field_span = self.cur_span();
            let ty = self.parse_type_ref()?;
            let (name, name_span) = self.ident_text()?;
            self.expect(TokenKind::Semi, "';'")?;
            let field = self.alloc(AstKind::StructField, field_span, Payload::None);
            self.arena.push_child(field, ty);
            let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
            self.arena.push_child(field, name_node);
            self.arena.push_child(list, field);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(list)
    }

    fn parse_enum_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Enum, "'enum'")?;
        let underlying = if self.cur_kind() == TokenKind::Bit {
            Some(self.parse_type_ref()?)
        } else {
            None
        };
        let (name, name_span) = self.ident_text()?;
        self.types.bind_type(&name);
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        // A serializable enum (one with an underlying `bit<N>` representation)
        // gives every member an explicit value; a plain enum just names them.
        let members = if underlying.is_some() {
            self.parse_specified_identifier_list()?
        } else {
            self.parse_identifier_list()?
        };
        let node = self.alloc(AstKind::EnumDeclaration, span, Payload::None);
        self.arena.push_child(node, name_node);
        self.arena.push_child(node, members);
        if let Some(underlying) = underlying {
            self.arena.push_child(node, underlying);
        }
        Ok(node)
    }

    /// A serializable enum's member list: `{ A = expr, B = expr, ... }`.
    fn parse_specified_identifier_list(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::LBrace, "'{'")?;
        let list = self.alloc(AstKind::SpecifiedIdentifierList, span, Payload::None);
        loop {
            let member_span = self.cur_span();
            let (name, name_span) = self.ident_text()?;
            let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
            self.expect(TokenKind::Eq, "'='")?;
            let value = self.parse_expression()?;
            let member = self.alloc(AstKind::SpecifiedIdentifier, member_span, Payload::None);
            self.arena.push_child(member, name_node);
            self.arena.push_child(member, value);
            self.arena.push_child(list, member);
            if self.cur_kind() == TokenKind::Comma {
                self.bump()?;
                continue;
            }
            break;
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(list)
    }

    fn parse_error_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Error, "'error'")?;
        let members = self.parse_identifier_list()?;
        let node = self.alloc(AstKind::ErrorDeclaration, span, Payload::None);
        self.arena.push_child(node, members);
        Ok(node)
    }

    fn parse_match_kind_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::MatchKind, "'match_kind'")?;
        let members = self.parse_identifier_list()?;
        let node = self.alloc(AstKind::MatchKindDeclaration, span, Payload::None);
        self.arena.push_child(node, members);
        Ok(node)
    }

    fn parse_identifier_list(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::LBrace, "'{'")?;
        let list = self.alloc(AstKind::IdentifierList, span, Payload::None);
        loop {
            let (name, name_span) = self.ident_text()?;
            let node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
            self.arena.push_child(list, node);
            if self.cur_kind() == TokenKind::Comma {
                self.bump()?;
                continue;
            }
            break;
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(list)
    }

    fn parse_extern_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Extern, "'extern'")?;

        if self.peek_is_extern_object() {
            let (name, name_span) = self.ident_text()?;
            self.types.bind_type(&name);
            let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name.clone()));

            self.with_scope(|p| {
                p.expect(TokenKind::LBrace, "'{'")?;
                let protos_span = p.cur_span();
                let protos = p.alloc(AstKind::MethodPrototypes, protos_span, Payload::None);
                while p.cur_kind() != TokenKind::RBrace {
                    let proto = p.parse_extern_member(&name)?;
                    p.arena.push_child(protos, proto);
                }
                p.expect(TokenKind::RBrace, "'}'")?;
                let node = p.alloc(AstKind::ExternTypeDeclaration, span, Payload::None);
                p.arena.push_child(node, name_node);
                p.arena.push_child(node, protos);
                Ok(node)
            })
        } else {
            // extern function prototype: `extern ReturnType name(params);`
            let ty = self.parse_type_ref()?;
            let (name, name_span) = self.ident_text()?;
            let params = self.with_scope(|p| p.parse_parameter_list_parenthesized())?;
            self.expect(TokenKind::Semi, "';'")?;
            let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
            let node = self.alloc(AstKind::FunctionPrototype, span, Payload::None);
            self.arena.push_child(node, ty);
            self.arena.push_child(node, name_node);
            self.arena.push_child(node, params);
            Ok(node)
        }
    }

    /// An extern declaration is an object (vs. a bare function prototype)
    /// iff its name is immediately followed by `{` or `(` — i.e. it is not
    /// led by a return-type expression.
    fn peek_is_extern_object(&mut self) -> bool {
        matches!(self.cur_kind(), TokenKind::Identifier | TokenKind::TypeIdentifier)
            && matches!(self.peek_kind(1), TokenKind::LBrace)
    }

    fn parse_extern_member(&mut self, extern_name: &str) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        // A constructor looks like `ExternName(params);` — same name as the
        // enclosing extern, with no explicit return type.
        if self.cur_kind() == TokenKind::TypeIdentifier
            && self.cur().text == extern_name
            && matches!(self.peek_kind(1), TokenKind::LParen)
        {
            let (name, name_span) = self.ident_text()?;
            let params = self.with_scope(|p| p.parse_parameter_list_parenthesized())?;
            self.expect(TokenKind::Semi, "';'")?;
            let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
            let node = self.alloc(AstKind::FunctionPrototype, span, Payload::None);
            self.arena.push_child(node, name_node);
            self.arena.push_child(node, params);
            return Ok(node);
        }

        let ty = self.parse_type_ref()?;
        let (name, name_span) = self.ident_text()?;
        let params = self.with_scope(|p| p.parse_parameter_list_parenthesized())?;
        self.expect(TokenKind::Semi, "';'")?;
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        let node = self.alloc(AstKind::FunctionPrototype, span, Payload::None);
        self.arena.push_child(node, ty);
        self.arena.push_child(node, name_node);
        self.arena.push_child(node, params);
        Ok(node)
    }

    /// Parses the fallback top-level/local shapes that all begin with a
    /// type reference: instantiation, function prototype/declaration, and
    /// variable declaration.
    fn parse_type_led_declaration(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let ty = self.parse_type_ref()?;

        if self.cur_kind() == TokenKind::LParen {
            let args = self.parse_argument_list_parenthesized()?;
            let (name, name_span) = self.ident_text()?;
            self.expect(TokenKind::Semi, "';'")?;
            let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
            let node = self.alloc(AstKind::Instantiation, span, Payload::None);
            self.arena.push_child(node, ty);
            self.arena.push_child(node, args);
            self.arena.push_child(node, name_node);
            return Ok(node);
        }

        let (name, name_span) = self.ident_text()?;
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));

        if self.cur_kind() == TokenKind::LParen {
            let params = self.with_scope(|p| p.parse_parameter_list_parenthesized())?;
            if self.cur_kind() == TokenKind::Semi {
                self.bump()?;
                let node = self.alloc(AstKind::FunctionPrototype, span, Payload::None);
                self.arena.push_child(node, ty);
                self.arena.push_child(node, name_node);
                self.arena.push_child(node, params);
                return Ok(node);
            }
            let body = self.parse_block_statement()?;
            let node = self.alloc(AstKind::FunctionDeclaration, span, Payload::None);
            self.arena.push_child(node, ty);
            self.arena.push_child(node, name_node);
            self.arena.push_child(node, params);
            self.arena.push_child(node, body);
            return Ok(node);
        }

        let node = self.alloc(AstKind::VariableDeclaration, span, Payload::None);
        self.arena.push_child(node, ty);
        self.arena.push_child(node, name_node);
        if self.cur_kind() == TokenKind::Eq {
            self.bump()?;
            let init = self.parse_expression()?;
            self.arena.push_child(node, init);
        }
        self.expect(TokenKind::Semi, "';'")?;
        Ok(node)
    }

    // ----------------------------------------------------------------
    // parameters / arguments / type refs
    // ----------------------------------------------------------------

    fn parse_parameter_list_parenthesized(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::LParen, "'('")?;
        let list = self.alloc(AstKind::ParameterList, span, Payload::None);
        if self.cur_kind() != TokenKind::RParen {
            loop {
                let param = self.parse_parameter()?;
                self.arena.push_child(list, param);
                if self.cur_kind() == TokenKind::Comma {
                    self.bump()?;
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(list)
    }

    fn parse_parameter(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let direction = match self.cur_kind() {
            TokenKind::In | TokenKind::Out | TokenKind::Inout => {
                let kind = self.cur_kind();
                self.bump()?;
                Some(kind)
            }
            _ => None,
        };
        let dir_node = self.alloc(AstKind::ParamDirection, span, Payload::Direction(direction));
        let ty = self.parse_type_ref()?;
        let (name, name_span) = self.ident_text()?;
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name.clone()));
        let node = self.alloc(AstKind::Parameter, span, Payload::None);
        self.arena.push_child(node, dir_node);
        self.arena.push_child(node, ty);
        self.arena.push_child(node, name_node);
        Ok(node)
    }

    fn parse_argument_list_parenthesized(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::LParen, "'('")?;
        let list = self.alloc(AstKind::ArgumentList, span, Payload::None);
        if self.cur_kind() != TokenKind::RParen {
            loop {
                let arg = self.parse_argument()?;
                self.arena.push_child(list, arg);
                if self.cur_kind() == TokenKind::Comma {
                    self.bump()?;
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(list)
    }

    fn parse_argument(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        // Named argument: `name = expr`.
        if self.cur_kind() == TokenKind::Identifier && self.peek_kind(1) == TokenKind::Eq {
            let (name, name_span) = self.ident_text()?;
            self.bump()?; // '='
            let expr = self.parse_expression()?;
            let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
            let node = self.alloc(AstKind::Argument, span, Payload::None);
            self.arena.push_child(node, name_node);
            self.arena.push_child(node, expr);
            return Ok(node);
        }
        let expr = self.parse_expression()?;
        let node = self.alloc(AstKind::Argument, span, Payload::None);
        self.arena.push_child(node, expr);
        Ok(node)
    }

    fn parse_type_ref(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let base = match self.cur_kind() {
            TokenKind::Bool => {
                self.bump()?;
                self.alloc(AstKind::BaseTypeBoolean, span, Payload::None)
            }
            TokenKind::Int => {
                self.bump()?;
                let node = self.alloc(AstKind::BaseTypeInteger, span, Payload::None);
                self.parse_optional_size_arg(node)?
            }
            TokenKind::Bit => {
                self.bump()?;
                let node = self.alloc(AstKind::BaseTypeBit, span, Payload::None);
                self.parse_optional_size_arg(node)?
            }
            TokenKind::Varbit => {
                self.bump()?;
                let node = self.alloc(AstKind::BaseTypeVarbit, span, Payload::None);
                self.parse_optional_size_arg(node)?
            }
            TokenKind::StringKeyword => {
                self.bump()?;
                self.alloc(AstKind::BaseTypeString, span, Payload::None)
            }
            TokenKind::Void => {
                self.bump()?;
                self.alloc(AstKind::BaseTypeVoid, span, Payload::None)
            }
            TokenKind::Error => {
                self.bump()?;
                self.alloc(AstKind::BaseTypeError, span, Payload::None)
            }
            TokenKind::TypeIdentifier => {
                let (name, name_span) = self.ident_text()?;
                let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
                let node = self.alloc(AstKind::TypeRef, span, Payload::None);
                self.arena.push_child(node, name_node);
                if self.cur_kind() == TokenKind::Lt {
                    let args = self.parse_type_argument_list()?;
                    self.arena.push_child(node, args);
                }
                node
            }
            TokenKind::Tuple => {
                self.bump()?;
                let args = self.parse_type_argument_list()?;
                let node = self.alloc(AstKind::TupleType, span, Payload::None);
                self.arena.push_child(node, args);
                node
            }
            _ => return Err(self.error("a type")),
        };

        if self.cur_kind() == TokenKind::LBracket {
            self.bump()?;
            let size = self.parse_expression()?;
            self.expect(TokenKind::RBracket, "']'")?;
            let stack = self.alloc(AstKind::HeaderStackType, span, Payload::None);
            self.arena.push_child(stack, base);
            self.arena.push_child(stack, size);
            return Ok(stack);
        }

        Ok(base)
    }

    fn parse_optional_size_arg(&mut self, node: NodeId) -> Result<NodeId, ParseError> {
        if self.cur_kind() == TokenKind::Lt {
            self.bump()?;
            let span = self.cur_span();
            let tok = self.expect(TokenKind::IntegerLiteral, "an integer type size")?;
            let value = parse_integer_text(&tok.text).0;
            let size = self.alloc(
                AstKind::IntegerLiteral,
                span,
                Payload::Integer {
                    text: tok.text,
                    value,
                    width: None,
                    signed: false,
                },
            );
            self.arena.push_child(node, size);
            self.expect(TokenKind::Gt, "'>'")?;
        }
        Ok(node)
    }

    fn parse_type_argument_list(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Lt, "'<'")?;
        let list = self.alloc(AstKind::TypeArgumentList, span, Payload::None);
        loop {
            let arg_span = self.cur_span();
            let ty = self.parse_type_ref()?;
            let arg = self.alloc(AstKind::TypeArg, arg_span, Payload::None);
            self.arena.push_child(arg, ty);
            self.arena.push_child(list, arg);
            if self.cur_kind() == TokenKind::Comma {
                self.bump()?;
                continue;
            }
            break;
        }
        self.expect(TokenKind::Gt, "'>'")?;
        Ok(list)
    }

    fn parse_expression_list(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let list = self.alloc(AstKind::ExpressionList, span, Payload::None);
        let first = self.parse_expression()?;
        self.arena.push_child(list, first);
        while self.cur_kind() == TokenKind::Comma {
            self.bump()?;
            let next = self.parse_expression()?;
            self.arena.push_child(list, next);
        }
        Ok(list)
    }

    // ----------------------------------------------------------------
    // statements
    // ----------------------------------------------------------------

    fn parse_block_statement(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.with_scope(|p| {
            p.expect(TokenKind::LBrace, "'{'")?;
            let node = p.alloc(AstKind::BlockStatement, span, Payload::None);
            let list_span = p.cur_span();
            let list = p.alloc(AstKind::StatementOrDeclList, list_span, Payload::None);
            while p.cur_kind() != TokenKind::RBrace {
                let stmt = p.parse_statement()?;
                p.arena.push_child(list, stmt);
            }
            p.expect(TokenKind::RBrace, "'}'")?;
            p.arena.push_child(node, list);
            Ok(node)
        })
    }

    fn parse_statement(&mut self) -> Result<NodeId, ParseError> {
        match self.cur_kind() {
            TokenKind::LBrace => self.parse_block_statement(),
            TokenKind::Semi => {
                let span = self.cur_span();
                self.bump()?;
                Ok(self.alloc(AstKind::EmptyStatement, span, Payload::None))
            }
            TokenKind::If => self.parse_conditional_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Exit => {
                let span = self.cur_span();
                self.bump()?;
                self.expect(TokenKind::Semi, "';'")?;
                Ok(self.alloc(AstKind::ExitStatement, span, Payload::None))
            }
            TokenKind::Return => {
                let span = self.cur_span();
                self.bump()?;
                let node = self.alloc(AstKind::ReturnStatement, span, Payload::None);
                if self.cur_kind() != TokenKind::Semi {
                    let expr = self.parse_expression()?;
                    self.arena.push_child(node, expr);
                }
                self.expect(TokenKind::Semi, "';'")?;
                Ok(node)
            }
            TokenKind::Const | TokenKind::Bool | TokenKind::Int | TokenKind::Bit | TokenKind::Varbit
            | TokenKind::StringKeyword | TokenKind::Void | TokenKind::Error | TokenKind::TypeIdentifier => {
                self.parse_statement_led_by_type_or_lvalue()
            }
            _ => self.parse_assignment_or_direct_application(),
        }
    }

    /// Disambiguates a `variableDeclaration` from an `assignmentStatement`
    /// / `directApplication` that happen to start with a type-like token.
    fn parse_statement_led_by_type_or_lvalue(&mut self) -> Result<NodeId, ParseError> {
        // `T.apply();` is a direct application, not a declaration, even
        // though `T` lexes as a type identifier.
        if self.cur_kind() == TokenKind::TypeIdentifier && self.peek_kind(1) == TokenKind::Dot {
            return self.parse_assignment_or_direct_application();
        }
        if self.cur_kind() == TokenKind::Const {
            self.bump()?;
        }
        self.parse_variable_declaration_statement()
    }

    fn parse_variable_declaration_statement(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let ty = self.parse_type_ref()?;
        let (name, name_span) = self.ident_text()?;
        let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        let node = self.alloc(AstKind::VariableDeclaration, span, Payload::None);
        self.arena.push_child(node, ty);
        self.arena.push_child(node, name_node);
        if self.cur_kind() == TokenKind::Eq {
            self.bump()?;
            let init = self.parse_expression()?;
            self.arena.push_child(node, init);
        }
        self.expect(TokenKind::Semi, "';'")?;
        Ok(node)
    }

    fn parse_conditional_statement(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::If, "'if'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        let then_stmt = self.parse_statement()?;
        let node = self.alloc(AstKind::ConditionalStatement, span, Payload::None);
        self.arena.push_child(node, cond);
        self.arena.push_child(node, then_stmt);
        if self.cur_kind() == TokenKind::Else {
            self.bump()?;
            let else_stmt = self.parse_statement()?;
            self.arena.push_child(node, else_stmt);
        }
        Ok(node)
    }

    fn parse_switch_statement(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::Switch, "'switch'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let cases_span = self.cur_span();
        let cases = self.alloc(AstKind::SwitchCases, cases_span, Payload::None);
        while self.cur_kind() != TokenKind::RBrace {
            let case = self.parse_switch_case()?;
            self.arena.push_child(cases, case);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        let node = self.alloc(AstKind::SwitchStatement, span, Payload::None);
        self.arena.push_child(node, expr);
        self.arena.push_child(node, cases);
        Ok(node)
    }

    fn parse_switch_case(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let label = if self.cur_kind() == TokenKind::Default {
            self.bump()?;
            self.alloc(AstKind::SwitchLabel, span, Payload::None)
        } else {
            let (name, name_span) = self.ident_text()?;
            let label = self.alloc(AstKind::SwitchLabel, span, Payload::None);
            let name_node = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
            self.arena.push_child(label, name_node);
            label
        };
        self.expect(TokenKind::Colon, "':'")?;
        let node = self.alloc(AstKind::SwitchCase, span, Payload::None);
        self.arena.push_child(node, label);
        if self.cur_kind() == TokenKind::LBrace {
            let block = self.parse_block_statement()?;
            self.arena.push_child(node, block);
        }
        Ok(node)
    }

    fn parse_assignment_or_direct_application(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let lhs = self.parse_lvalue_expression()?;

        if self.cur_kind() == TokenKind::Dot && self.is_apply_call(1) {
            self.bump()?; // '.'
            self.expect(TokenKind::Apply, "'apply'")?;
            self.expect(TokenKind::LParen, "'('")?;
            self.expect(TokenKind::RParen, "')'")?;
            self.expect(TokenKind::Semi, "';'")?;
            let node = self.alloc(AstKind::DirectApplication, span, Payload::None);
            self.arena.push_child(node, lhs);
            return Ok(node);
        }

        self.expect(TokenKind::Eq, "'='")?;
        let rhs = self.parse_expression()?;
        self.expect(TokenKind::Semi, "';'")?;
        let node = self.alloc(AstKind::AssignmentStatement, span, Payload::None);
        self.arena.push_child(node, lhs);
        self.arena.push_child(node, rhs);
        Ok(node)
    }

    fn is_apply_call(&mut self, dot_offset: usize) -> bool {
        self.peek_kind(dot_offset + 1) == TokenKind::Apply
    }

    fn parse_lvalue_expression(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        let (name, name_span) = self.ident_text()?;
        let base = self.alloc(AstKind::Name, name_span, Payload::Ident(name));
        let mut lv = self.alloc(AstKind::LvalueExpression, span, Payload::None);
        self.arena.push_child(lv, base);

        loop {
            match self.cur_kind() {
                TokenKind::Dot => {
                    // Leave `.apply(...)` for the caller to recognize.
                    if self.peek_kind(1) == TokenKind::Apply {
                        break;
                    }
                    self.bump()?;
                    let (field, field_span) = self.ident_text()?;
                    let field_node = self.alloc(AstKind::Name, field_span, Payload::Ident(field));
                    let sel = self.alloc(AstKind::MemberSelector, span, Payload::None);
                    self.arena.push_child(sel, lv);
                    self.arena.push_child(sel, field_node);
                    lv = sel;
                }
                TokenKind::LBracket => {
                    self.bump()?;
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    let sub = self.alloc(AstKind::ArraySubscript, span, Payload::None);
                    self.arena.push_child(sub, lv);
                    self.arena.push_child(sub, index);
                    lv = sub;
                }
                _ => break,
            }
        }
        Ok(lv)
    }

    // ----------------------------------------------------------------
    // expressions (operator-precedence climbing)
    // ----------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary_expression(1)
    }

    fn parse_binary_expression(&mut self, min_priority: u8) -> Result<NodeId, ParseError> {
        let mut lhs = self.parse_unary_expression()?;

        while let Some(prec) = self.cur_kind().binary_precedence() {
            if prec < min_priority {
                break;
            }
            let span = self.cur_span();
            let op = self.bump()?;
            let rhs = self.parse_binary_expression(prec + 1)?;
            let node = self.alloc(AstKind::BinaryExpression, span, Payload::Operator(op.kind));
            self.arena.push_child(node, lhs);
            self.arena.push_child(node, rhs);
            lhs = node;
        }
        Ok(lhs)
    }

    fn parse_unary_expression(&mut self) -> Result<NodeId, ParseError> {
        match self.cur_kind() {
            TokenKind::Bang | TokenKind::Tilde | TokenKind::Minus => {
                let span = self.cur_span();
                let op = self.bump()?;
                let operand = self.parse_unary_expression()?;
                let node = self.alloc(AstKind::UnaryExpression, span, Payload::Operator(op.kind));
                self.arena.push_child(node, operand);
                Ok(node)
            }
            TokenKind::LParen if self.looks_like_cast() => self.parse_cast_expression(),
            _ => self.parse_postfix_expression(),
        }
    }

    /// Looks ahead past a parenthesized group to decide whether it is a
    /// cast (`(T) expr`) or a parenthesized sub-expression.
    fn looks_like_cast(&mut self) -> bool {
        matches!(
            self.peek_kind(1),
            TokenKind::Bool
                | TokenKind::Int
                | TokenKind::Bit
                | TokenKind::Varbit
                | TokenKind::StringKeyword
                | TokenKind::TypeIdentifier
        ) && self.peek_kind(2) == TokenKind::RParen
    }

    fn parse_cast_expression(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        self.expect(TokenKind::LParen, "'('")?;
        let ty = self.parse_type_ref()?;
        self.expect(TokenKind::RParen, "')'")?;
        let operand = self.parse_unary_expression()?;
        let node = self.alloc(AstKind::CastExpression, span, Payload::None);
        self.arena.push_child(node, ty);
        self.arena.push_child(node, operand);
        Ok(node)
    }

    fn parse_postfix_expression(&mut self) -> Result<NodeId, ParseError> {
        let mut expr = self.parse_primary_expression()?;
        loop {
            let span = self.cur_span();
            match self.cur_kind() {
                TokenKind::Dot => {
                    self.bump()?;
                    let (field, field_span) = self.ident_text()?;
                    let field_node = self.alloc(AstKind::Name, field_span, Payload::Ident(field));
                    let node = self.alloc(AstKind::MemberSelector, span, Payload::None);
                    self.arena.push_child(node, expr);
                    self.arena.push_child(node, field_node);
                    expr = node;
                }
                TokenKind::LBracket => {
                    self.bump()?;
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    let node = self.alloc(AstKind::ArraySubscript, span, Payload::None);
                    self.arena.push_child(node, expr);
                    self.arena.push_child(node, index);
                    expr = node;
                }
                TokenKind::LParen => {
                    let args = self.parse_argument_list_parenthesized()?;
                    let node = self.alloc(AstKind::FunctionCall, span, Payload::None);
                    self.arena.push_child(node, expr);
                    self.arena.push_child(node, args);
                    expr = node;
                }
                TokenKind::Lt if self.looks_like_specialization() => {
                    let args = self.parse_type_argument_list()?;
                    let node = self.alloc(AstKind::FunctionCall, span, Payload::None);
                    self.arena.push_child(node, expr);
                    self.arena.push_child(node, args);
                    expr = node;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// A conservative heuristic: `expr<Type>(` is a generic specialization
    /// applied before a call, never a pair of `<`/`>` comparisons, because a
    /// comparison cannot itself be followed immediately by `(`.
    fn looks_like_specialization(&mut self) -> bool {
        matches!(self.peek_kind(1), TokenKind::TypeIdentifier | TokenKind::Bit | TokenKind::Int)
    }

    fn parse_primary_expression(&mut self) -> Result<NodeId, ParseError> {
        let span = self.cur_span();
        match self.cur_kind() {
            TokenKind::LParen => {
                self.bump()?;
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::True => {
                self.bump()?;
                Ok(self.alloc(AstKind::BooleanLiteral, span, Payload::Bool(true)))
            }
            TokenKind::False => {
                self.bump()?;
                Ok(self.alloc(AstKind::BooleanLiteral, span, Payload::Bool(false)))
            }
            TokenKind::IntegerLiteral => {
                let tok = self.bump()?;
                let (value, width, signed) = parse_integer_text(&tok.text);
                Ok(self.alloc(
                    AstKind::IntegerLiteral,
                    span,
                    Payload::Integer {
                        text: tok.text,
                        value,
                        width,
                        signed,
                    },
                ))
            }
            TokenKind::StringLiteral => {
                let tok = self.bump()?;
                let text = tok.text.trim_matches('"').to_string();
                Ok(self.alloc(AstKind::StringLiteral, span, Payload::Str(text)))
            }
            TokenKind::Underscore => {
                self.bump()?;
                Ok(self.alloc(AstKind::Dontcare, span, Payload::None))
            }
            TokenKind::Default => {
                self.bump()?;
                Ok(self.alloc(AstKind::Default, span, Payload::None))
            }
            TokenKind::Identifier | TokenKind::TypeIdentifier => {
                let (name, _) = self.ident_text()?;
                Ok(self.alloc(AstKind::Name, span, Payload::Ident(name)))
            }
            _ => Err(self.error("an expression")),
        }
    }
}

/// Parses an integer literal's text into `(value, width, signed)`.
///
/// Accepts plain decimal (`123`), hex (`0x7B`), unsigned sized (`8w10`),
/// and signed sized (`8s10`) forms.
fn parse_integer_text(text: &str) -> (i128, Option<u32>, bool) {
    if let Some(idx) = text.find(['w', 's']) {
        let width: u32 = text[..idx].parse().unwrap_or(0);
        let signed = text.as_bytes()[idx] == b's';
        let value: i128 = text[idx + 1..].parse().unwrap_or(0);
        return (value, Some(width), signed);
    }
    if let Some(hex) = text.strip_prefix("0x") {
        let value = i128::from_str_radix(hex, 16).unwrap_or(0);
        return (value, None, false);
    }
    (text.parse().unwrap_or(0), None, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> (Arena, NodeId) {
        parse_program(source).expect("parse should succeed")
    }

    #[test]
    fn parses_minimal_parser_program() {
        let (arena, root) = parse("parser P() { state start { transition accept; } }");
        assert_eq!(arena.get(root).kind(), AstKind::Program);
        let list = arena.nth_child(root, 0).unwrap();
        let decl = arena.nth_child(list, 0).unwrap();
        assert_eq!(arena.get(decl).kind(), AstKind::ParserDeclaration);
    }

    #[test]
    fn parses_struct_and_header() {
        let (arena, root) = parse(
            "struct S { bit<8> a; } header H { bit<16> b; }",
        );
        let list = arena.nth_child(root, 0).unwrap();
        let kinds: Vec<_> = arena.children(list).map(|c| arena.get(c).kind()).collect();
        assert_eq!(kinds, vec![AstKind::StructTypeDeclaration, AstKind::HeaderTypeDeclaration]);
    }

    #[test]
    fn type_sensitive_lexing_round_trips() {
        let (arena, root) = parse("typedef bit<8> myType; myType x;");
        let list = arena.nth_child(root, 0).unwrap();
        let kinds: Vec<_> = arena.children(list).map(|c| arena.get(c).kind()).collect();
        assert_eq!(kinds, vec![AstKind::TypedefDeclaration, AstKind::VariableDeclaration]);
    }

    #[test]
    fn operator_precedence_climbs_correctly() {
        // `1 + 2 * 3` should parse as `1 + (2 * 3)`.
        let (arena, root) = parse("int x = 1 + 2 * 3;");
        let list = arena.nth_child(root, 0).unwrap();
        let decl = arena.nth_child(list, 0).unwrap();
        let init = arena.nth_child(decl, 2).unwrap();
        assert_eq!(arena.get(init).kind(), AstKind::BinaryExpression);
        let rhs = arena.nth_child(init, 1).unwrap();
        assert_eq!(arena.get(rhs).kind(), AstKind::BinaryExpression);
    }

    #[test]
    fn unexpected_eoi_is_reported() {
        let err = parse_program("parser P(").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEoi { .. } | ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn extern_overloaded_constructors_parse() {
        let (arena, root) = parse("extern E { E(); E(bit<8> w); } E() e1; E(8w0) e2;");
        let list = arena.nth_child(root, 0).unwrap();
        let kinds: Vec<_> = arena.children(list).map(|c| arena.get(c).kind()).collect();
        assert_eq!(
            kinds,
            vec![AstKind::ExternTypeDeclaration, AstKind::Instantiation, AstKind::Instantiation]
        );
    }
}
