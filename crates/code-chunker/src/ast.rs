//! Semantic unit discovery on top of tree-sitter.

use crate::chunk::ChunkKind;
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use tree_sitter::{Node, Parser};

/// A function/class-like region of a file (0-based, inclusive rows)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SemanticUnit {
    pub start_row: usize,
    pub end_row: usize,
    pub kind: ChunkKind,
    pub name: Option<String>,
}

/// Parse `source` and return its semantic units in document order.
///
/// Fails when the grammar is unavailable or the tree contains syntax errors; the
/// caller falls back to line windows in that case.
pub(crate) fn semantic_units(
    source: &str,
    language: Language,
    file_path: &str,
) -> Result<Vec<SemanticUnit>> {
    let mut parser = Parser::new();
    parser.set_language(&language.tree_sitter_language()?)?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ChunkerError::parse_failed(file_path, "parser returned no tree"))?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(ChunkerError::parse_failed(file_path, "syntax errors in source"));
    }

    let src = source.as_bytes();
    let mut units = Vec::new();
    for child in named_children(root) {
        match language {
            Language::Python => visit_python(child, child, src, None, &mut units),
            Language::Rust => visit_rust(child, child, src, None, &mut units),
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                visit_js(child, child, src, None, &mut units);
            }
            _ => return Err(ChunkerError::unsupported_language(language.as_str())),
        }
    }

    units.sort_by_key(|unit| (unit.start_row, std::cmp::Reverse(unit.end_row)));
    Ok(units)
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn field_text(node: Node<'_>, field: &str, src: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|n| n.utf8_text(src).ok())
        .map(str::to_string)
}

fn qualify(parent: Option<&str>, name: Option<String>) -> Option<String> {
    match (parent, name) {
        (Some(parent), Some(name)) => Some(format!("{parent}.{name}")),
        (None, name) => name,
        (Some(parent), None) => Some(parent.to_string()),
    }
}

fn push(out: &mut Vec<SemanticUnit>, span: Node<'_>, kind: ChunkKind, name: Option<String>) {
    out.push(SemanticUnit {
        start_row: span.start_position().row,
        end_row: span.end_position().row,
        kind,
        name,
    });
}

fn visit_python(
    node: Node<'_>,
    span: Node<'_>,
    src: &[u8],
    parent: Option<&str>,
    out: &mut Vec<SemanticUnit>,
) {
    match node.kind() {
        "decorated_definition" => {
            if let Some(def) = node.child_by_field_name("definition") {
                visit_python(def, span, src, parent, out);
            }
        }
        "function_definition" => {
            let kind = if parent.is_some() {
                ChunkKind::Method
            } else {
                ChunkKind::Function
            };
            push(out, span, kind, qualify(parent, field_text(node, "name", src)));
        }
        "class_definition" => {
            let name = qualify(parent, field_text(node, "name", src));
            push(out, span, ChunkKind::Class, name.clone());
            if let Some(body) = node.child_by_field_name("body") {
                for item in named_children(body) {
                    visit_python(item, item, src, name.as_deref(), out);
                }
            }
        }
        _ => {}
    }
}

fn visit_rust(
    node: Node<'_>,
    span: Node<'_>,
    src: &[u8],
    parent: Option<&str>,
    out: &mut Vec<SemanticUnit>,
) {
    match node.kind() {
        "function_item" => {
            let kind = if parent.is_some() {
                ChunkKind::Method
            } else {
                ChunkKind::Function
            };
            push(out, span, kind, qualify(parent, field_text(node, "name", src)));
        }
        "impl_item" => {
            let ty = field_text(node, "type", src);
            let name = match (field_text(node, "trait", src), ty.as_deref()) {
                (Some(tr), Some(ty)) => Some(format!("{tr} for {ty}")),
                (None, ty) => ty.map(str::to_string),
                (Some(tr), None) => Some(tr),
            };
            push(out, span, ChunkKind::Impl, name);
            visit_rust_methods(node, src, ty.as_deref(), out);
        }
        "trait_item" => {
            let name = field_text(node, "name", src);
            push(out, span, ChunkKind::Trait, name.clone());
            visit_rust_methods(node, src, name.as_deref(), out);
        }
        "struct_item" => push(out, span, ChunkKind::Struct, field_text(node, "name", src)),
        "enum_item" => push(out, span, ChunkKind::Enum, field_text(node, "name", src)),
        "mod_item" => {
            if let Some(body) = node.child_by_field_name("body") {
                push(out, span, ChunkKind::Module, field_text(node, "name", src));
                for item in named_children(body) {
                    visit_rust(item, item, src, None, out);
                }
            }
        }
        _ => {}
    }
}

fn visit_rust_methods(
    node: Node<'_>,
    src: &[u8],
    owner: Option<&str>,
    out: &mut Vec<SemanticUnit>,
) {
    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    for item in named_children(body) {
        if item.kind() == "function_item" {
            let name = qualify(owner, field_text(item, "name", src));
            push(out, item, ChunkKind::Method, name);
        }
    }
}

fn visit_js(
    node: Node<'_>,
    span: Node<'_>,
    src: &[u8],
    parent: Option<&str>,
    out: &mut Vec<SemanticUnit>,
) {
    match node.kind() {
        "export_statement" => {
            if let Some(decl) = node.child_by_field_name("declaration") {
                visit_js(decl, span, src, parent, out);
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            push(out, span, ChunkKind::Function, field_text(node, "name", src));
        }
        "class_declaration" | "abstract_class_declaration" => {
            let name = field_text(node, "name", src);
            push(out, span, ChunkKind::Class, name.clone());
            if let Some(body) = node.child_by_field_name("body") {
                for member in named_children(body) {
                    if member.kind() == "method_definition" {
                        let method = qualify(name.as_deref(), field_text(member, "name", src));
                        push(out, member, ChunkKind::Method, method);
                    }
                }
            }
        }
        "interface_declaration" => {
            push(out, span, ChunkKind::Interface, field_text(node, "name", src));
        }
        "type_alias_declaration" => {
            push(out, span, ChunkKind::TypeAlias, field_text(node, "name", src));
        }
        "enum_declaration" => push(out, span, ChunkKind::Enum, field_text(node, "name", src)),
        "lexical_declaration" | "variable_declaration" => {
            // const handler = () => { ... }
            let function_name = named_children(node).into_iter().find_map(|declarator| {
                let value = declarator.child_by_field_name("value")?;
                matches!(
                    value.kind(),
                    "arrow_function" | "function_expression" | "function"
                )
                .then(|| field_text(declarator, "name", src))
                .flatten()
            });
            if let Some(name) = function_name {
                push(out, span, ChunkKind::Function, Some(name));
            }
        }
        _ => {}
    }
}
