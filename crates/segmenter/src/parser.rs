//! Syntax-tree collaborator.
//!
//! Strategies never touch tree-sitter directly: they consume an owned,
//! normalized [`SyntaxTree`] produced by an [`AstParser`]. The default
//! [`TreeSitterParser`] walks top-level declarations (and the members of
//! classes, impls, traits and modules) and records them with 1-indexed
//! line locations.

use crate::language::Language;
use crate::types::ChunkType;
use std::sync::Arc;
use tree_sitter::{Node, Parser};

/// External parser interface
pub trait AstParser: Send + Sync {
    /// Whether `language` can be parsed at all
    fn supports(&self, language: &str) -> bool;

    /// Parse `content`; failures are reported in the outcome, never panicked
    fn parse(&self, content: &str, language: &str) -> ParseOutcome;
}

/// Result of a parse request
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub tree: Option<Arc<SyntaxTree>>,
    pub success: bool,
    pub error: Option<String>,
}

impl ParseOutcome {
    #[must_use]
    pub fn ok(tree: SyntaxTree) -> Self {
        Self {
            tree: Some(Arc::new(tree)),
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            tree: None,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Structural category of a syntax node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Module,
    Class,
    Function,
    Method,
    Property,
    Declaration,
    Import,
    Export,
}

impl NodeCategory {
    #[must_use]
    pub const fn chunk_type(self) -> ChunkType {
        match self {
            Self::Module => ChunkType::Module,
            Self::Class => ChunkType::Class,
            Self::Function => ChunkType::Function,
            Self::Method => ChunkType::Method,
            Self::Property => ChunkType::Property,
            Self::Declaration => ChunkType::Declaration,
            Self::Import => ChunkType::Import,
            Self::Export => ChunkType::Export,
        }
    }
}

/// Source location; lines are 1-indexed, columns 0-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLocation {
    pub start_line: usize,
    pub end_line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

/// A declaration-level node lifted out of the parser's tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub category: NodeCategory,
    /// Raw parser node kind (`function_item`, `class_declaration`, ...)
    pub node_type: String,
    pub name: Option<String>,
    /// Enclosing class / impl target / module
    pub parent: Option<String>,
    pub start_byte: usize,
    pub end_byte: usize,
    pub location: NodeLocation,
    /// Nesting depth; 0 for top-level items
    pub depth: usize,
}

/// Owned, parser-independent view of a parsed file
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    pub language: String,
    pub nodes: Vec<SyntaxNode>,
    /// Total number of nodes in the underlying parse tree
    pub total_nodes: usize,
    /// The parser recovered from syntax errors
    pub has_errors: bool,
}

impl SyntaxTree {
    pub fn functions(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.category, NodeCategory::Function | NodeCategory::Method))
    }

    pub fn classes(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.nodes
            .iter()
            .filter(|n| n.category == NodeCategory::Class)
    }

    pub fn imports(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.nodes
            .iter()
            .filter(|n| n.category == NodeCategory::Import)
    }

    /// Nodes that are not nested inside another recorded node
    pub fn top_level(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.nodes.iter().filter(|n| n.depth == 0)
    }

    /// Children recorded under a class/impl/module node
    pub fn members_of<'a>(&'a self, node: &'a SyntaxNode) -> impl Iterator<Item = &'a SyntaxNode> {
        self.nodes.iter().filter(move |n| {
            n.depth == node.depth + 1 && n.start_byte >= node.start_byte && n.end_byte <= node.end_byte
        })
    }

    #[must_use]
    pub fn node_text<'a>(&self, node: &SyntaxNode, content: &'a str) -> &'a str {
        content.get(node.start_byte..node.end_byte).unwrap_or("")
    }

    #[must_use]
    pub const fn node_location(&self, node: &SyntaxNode) -> NodeLocation {
        node.location
    }

    #[must_use]
    pub fn node_name<'a>(&self, node: &'a SyntaxNode) -> Option<&'a str> {
        node.name.as_deref()
    }

    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.total_nodes
    }
}

/// Tree-sitter backed parser for Rust, Python, JavaScript and TypeScript
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSitterParser;

impl TreeSitterParser {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Node kinds recorded for a language
    #[must_use]
    pub fn supported_node_types(language: Language) -> &'static [&'static str] {
        match language {
            Language::Rust => &[
                "function_item",
                "struct_item",
                "enum_item",
                "union_item",
                "trait_item",
                "impl_item",
                "mod_item",
                "const_item",
                "static_item",
                "type_item",
                "macro_definition",
                "use_declaration",
                "extern_crate_declaration",
            ],
            Language::Python => &[
                "function_definition",
                "class_definition",
                "decorated_definition",
                "import_statement",
                "import_from_statement",
                "expression_statement",
            ],
            Language::JavaScript | Language::TypeScript => &[
                "function_declaration",
                "generator_function_declaration",
                "class_declaration",
                "abstract_class_declaration",
                "interface_declaration",
                "enum_declaration",
                "type_alias_declaration",
                "lexical_declaration",
                "variable_declaration",
                "internal_module",
                "import_statement",
                "export_statement",
                "method_definition",
                "field_definition",
                "public_field_definition",
            ],
            _ => &[],
        }
    }
}

impl AstParser for TreeSitterParser {
    fn supports(&self, language: &str) -> bool {
        Language::from_name(language).supports_ast()
    }

    fn parse(&self, content: &str, language: &str) -> ParseOutcome {
        let lang = Language::from_name(language);
        let ts_language = match lang.tree_sitter_language() {
            Ok(ts) => ts,
            Err(e) => return ParseOutcome::failed(e.to_string()),
        };

        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&ts_language) {
            return ParseOutcome::failed(format!("Failed to set language: {e}"));
        }

        let Some(tree) = parser.parse(content, None) else {
            return ParseOutcome::failed("Failed to parse source code");
        };

        let root = tree.root_node();
        let mut walker = Walker {
            content,
            language: lang,
            nodes: Vec::new(),
        };
        walker.walk_scope(root, None, 0);

        ParseOutcome::ok(SyntaxTree {
            language: lang.as_str().to_string(),
            nodes: walker.nodes,
            total_nodes: root.descendant_count(),
            has_errors: root.has_error(),
        })
    }
}

struct Walker<'a> {
    content: &'a str,
    language: Language,
    nodes: Vec<SyntaxNode>,
}

impl Walker<'_> {
    fn walk_scope(&mut self, scope: Node, parent: Option<&str>, depth: usize) {
        let mut cursor = scope.walk();
        let children: Vec<_> = scope.children(&mut cursor).collect();
        for child in children {
            match self.language {
                Language::Rust => self.visit_rust(child, parent, depth),
                Language::Python => self.visit_python(child, parent, depth),
                Language::JavaScript | Language::TypeScript => self.visit_js(child, parent, depth),
                _ => {}
            }
        }
    }

    fn visit_rust(&mut self, node: Node, parent: Option<&str>, depth: usize) {
        let in_body = depth > 0 && parent.is_some();
        match node.kind() {
            "function_item" | "function_signature_item" => {
                let category = if in_body && !self.parent_is_module(parent) {
                    NodeCategory::Method
                } else {
                    NodeCategory::Function
                };
                self.record(node, category, self.symbol_name(node), parent, depth);
            }
            "struct_item" | "enum_item" | "union_item" => {
                self.record(node, NodeCategory::Class, self.symbol_name(node), parent, depth);
            }
            "trait_item" => {
                let name = self.symbol_name(node);
                self.record(node, NodeCategory::Class, name.clone(), parent, depth);
                self.walk_body(node, "declaration_list", name.as_deref(), depth + 1);
            }
            "impl_item" => {
                let target = self.impl_target(node);
                self.record(node, NodeCategory::Class, target.clone(), parent, depth);
                self.walk_body(node, "declaration_list", target.as_deref(), depth + 1);
            }
            "mod_item" => {
                let name = self.symbol_name(node);
                self.record(node, NodeCategory::Module, name.clone(), parent, depth);
                let scope = name.map(|n| format!("mod {n}"));
                self.walk_body(node, "declaration_list", scope.as_deref(), depth + 1);
            }
            "const_item" | "type_item" if in_body && !self.parent_is_module(parent) => {
                self.record(node, NodeCategory::Property, self.symbol_name(node), parent, depth);
            }
            "const_item" | "static_item" | "type_item" | "macro_definition" => {
                self.record(node, NodeCategory::Declaration, self.symbol_name(node), parent, depth);
            }
            "use_declaration" | "extern_crate_declaration" => {
                self.record(node, NodeCategory::Import, None, parent, depth);
            }
            _ => {}
        }
    }

    fn visit_python(&mut self, node: Node, parent: Option<&str>, depth: usize) {
        let target = if node.kind() == "decorated_definition" {
            node.child_by_field_name("definition").unwrap_or(node)
        } else {
            node
        };

        match target.kind() {
            "function_definition" => {
                let category = if parent.is_some() {
                    NodeCategory::Method
                } else {
                    NodeCategory::Function
                };
                self.record(node, category, self.symbol_name(target), parent, depth);
            }
            "class_definition" => {
                let name = self.symbol_name(target);
                self.record(node, NodeCategory::Class, name.clone(), parent, depth);
                self.walk_body(target, "block", name.as_deref(), depth + 1);
            }
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                self.record(node, NodeCategory::Import, None, parent, depth);
            }
            "expression_statement" if Self::is_assignment(target) => {
                let category = if parent.is_some() {
                    NodeCategory::Property
                } else {
                    NodeCategory::Declaration
                };
                let name = target
                    .named_child(0)
                    .and_then(|assign| assign.child_by_field_name("left"))
                    .map(|left| self.text(left).to_string());
                self.record(node, category, name, parent, depth);
            }
            _ => {}
        }
    }

    fn visit_js(&mut self, node: Node, parent: Option<&str>, depth: usize) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                self.record(node, NodeCategory::Function, self.symbol_name(node), parent, depth);
            }
            "class_declaration" | "abstract_class_declaration" => {
                let name = self.symbol_name(node);
                self.record(node, NodeCategory::Class, name.clone(), parent, depth);
                self.walk_body(node, "class_body", name.as_deref(), depth + 1);
            }
            "interface_declaration" | "enum_declaration" => {
                self.record(node, NodeCategory::Class, self.symbol_name(node), parent, depth);
            }
            "type_alias_declaration" => {
                self.record(node, NodeCategory::Declaration, self.symbol_name(node), parent, depth);
            }
            "lexical_declaration" | "variable_declaration" => {
                let (category, name) = self.classify_js_variable(node);
                self.record(node, category, name, parent, depth);
            }
            "internal_module" | "module" => {
                let name = self.symbol_name(node);
                self.record(node, NodeCategory::Module, name.clone(), parent, depth);
                self.walk_body(node, "statement_block", name.as_deref(), depth + 1);
            }
            "import_statement" => {
                self.record(node, NodeCategory::Import, None, parent, depth);
            }
            "export_statement" => {
                let Some(declaration) = node.child_by_field_name("declaration") else {
                    self.record(node, NodeCategory::Export, None, parent, depth);
                    return;
                };
                // Record the declaration but keep the `export` keyword in the span.
                let before = self.nodes.len();
                self.visit_js(declaration, parent, depth);
                if let Some(recorded) = self.nodes.get_mut(before) {
                    recorded.start_byte = node.start_byte();
                    recorded.location.start_line = node.start_position().row + 1;
                    recorded.location.start_column = node.start_position().column;
                }
            }
            "method_definition" => {
                self.record(node, NodeCategory::Method, self.symbol_name(node), parent, depth);
            }
            "field_definition" | "public_field_definition" => {
                self.record(node, NodeCategory::Property, self.symbol_name(node), parent, depth);
            }
            _ => {}
        }
    }

    fn classify_js_variable(&self, node: Node) -> (NodeCategory, Option<String>) {
        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let name = declarator
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string());
            let is_function = declarator.child_by_field_name("value").is_some_and(|v| {
                matches!(v.kind(), "arrow_function" | "function_expression" | "function")
            });
            let category = if is_function {
                NodeCategory::Function
            } else {
                NodeCategory::Declaration
            };
            return (category, name);
        }
        (NodeCategory::Declaration, None)
    }

    fn walk_body(&mut self, node: Node, body_kind: &str, parent: Option<&str>, depth: usize) {
        let body = node.child_by_field_name("body").or_else(|| {
            let mut cursor = node.walk();
            let found = node.children(&mut cursor).find(|c| c.kind() == body_kind);
            found
        });
        if let Some(body) = body {
            self.walk_scope(body, parent, depth);
        }
    }

    fn parent_is_module(&self, parent: Option<&str>) -> bool {
        parent.is_some_and(|p| p.starts_with("mod "))
    }

    fn is_assignment(node: Node) -> bool {
        node.named_child(0)
            .is_some_and(|c| matches!(c.kind(), "assignment" | "augmented_assignment"))
    }

    fn record(
        &mut self,
        node: Node,
        category: NodeCategory,
        name: Option<String>,
        parent: Option<&str>,
        depth: usize,
    ) {
        let start = node.start_position();
        let end = node.end_position();
        self.nodes.push(SyntaxNode {
            category,
            node_type: node.kind().to_string(),
            name,
            parent: parent.map(|p| p.trim_start_matches("mod ").to_string()),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            location: NodeLocation {
                start_line: start.row + 1,
                end_line: end.row + 1,
                start_column: start.column,
                end_column: end.column,
            },
            depth,
        });
    }

    fn text(&self, node: Node) -> &str {
        self.content
            .get(node.start_byte()..node.end_byte())
            .unwrap_or("")
    }

    /// Extract symbol name from a declaration node
    fn symbol_name(&self, node: Node) -> Option<String> {
        if let Some(name) = node.child_by_field_name("name") {
            return Some(self.text(name).to_string());
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if matches!(
                child.kind(),
                "identifier" | "name" | "type_identifier" | "field_identifier" | "property_identifier"
            ) {
                return Some(self.text(child).to_string());
            }
        }
        None
    }

    /// Extract the target of an impl block (struct/trait name)
    fn impl_target(&self, node: Node) -> Option<String> {
        let ty = node.child_by_field_name("type")?;
        match ty.kind() {
            "type_identifier" => Some(self.text(ty).to_string()),
            // impl<T> Foo<T> / impl a::Foo: take the base identifier
            "generic_type" | "scoped_type_identifier" => {
                let mut cursor = ty.walk();
                let base = ty
                    .children(&mut cursor)
                    .filter(|c| c.kind() == "type_identifier")
                    .last()
                    .map(|c| self.text(c).to_string());
                base.or_else(|| Some(self.text(ty).to_string()))
            }
            _ => Some(self.text(ty).to_string()),
        }
    }
}
