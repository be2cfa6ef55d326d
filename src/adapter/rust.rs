//! Rust language adapter
//!
//! Symbol extraction walks the tree-sitter AST; the import heuristic and
//! declaration scanner are line-based and deliberately shallow.

use super::{module_components, tokenize_with, ImportRef, LanguageAdapter, Token};
use crate::index::{SymbolEntry, SymbolKind};
use anyhow::{Context, Result};

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while",
];

/// External crate roots that are never part of the repository index
const EXTERNAL_ROOTS: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

/// Adapter for `.rs` files
pub struct RustAdapter;

impl LanguageAdapter for RustAdapter {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn language_tags(&self) -> &'static [&'static str] {
        &["rust", "rs"]
    }

    fn extract_symbols(&self, path: &str, content: &str) -> Result<Vec<SymbolEntry>> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .context("Failed to load Rust grammar")?;
        let tree = parser
            .parse(content, None)
            .with_context(|| format!("Failed to parse Rust file: {}", path))?;

        let module = module_components(path, &["lib", "main", "mod"]).join("::");
        let mut symbols = Vec::new();

        if !module.is_empty() {
            symbols.push(SymbolEntry {
                qualified: module.clone(),
                path: path.to_string(),
                start_line: 1,
                end_line: content.lines().count().max(1),
                kind: SymbolKind::Module,
            });
        }

        walk(tree.root_node(), content, path, &module, &mut symbols);
        Ok(symbols)
    }

    fn tokenize(&self, text: &str) -> Vec<Token> {
        tokenize_with(text, &["//"], Some(("/*", "*/")), false, KEYWORDS)
    }

    fn import_references(&self, text: &str) -> Vec<ImportRef> {
        let mut refs = Vec::new();

        for (offset, line) in text.lines().enumerate() {
            let trimmed = line.trim();

            let rest = if let Some(rest) = trimmed.strip_prefix("use ") {
                rest
            } else if let Some(rest) = trimmed.strip_prefix("extern crate ") {
                rest
            } else if trimmed.starts_with("pub") {
                match trimmed.find("use ") {
                    Some(pos) => &trimmed[pos + 4..],
                    None => continue,
                }
            } else {
                continue;
            };

            let spec = rest.split(';').next().unwrap_or("").trim();
            if spec.is_empty() {
                continue;
            }

            for token in expand_use_spec(spec) {
                if let Some(token) = normalize_path(&token) {
                    refs.push(ImportRef {
                        token,
                        line_offset: offset,
                    });
                }
            }
        }

        refs
    }

    fn declared_names(&self, text: &str) -> Vec<String> {
        let mut names = Vec::new();

        for line in text.lines() {
            let mut rest = strip_visibility(line.trim());
            loop {
                let stripped = rest
                    .strip_prefix("async ")
                    .or_else(|| rest.strip_prefix("unsafe "))
                    .or_else(|| rest.strip_prefix("default "));
                match stripped {
                    Some(s) => rest = s,
                    None => break,
                }
            }

            for keyword in ["fn ", "struct ", "enum ", "trait ", "type ", "const ", "static ", "mod "] {
                if let Some(after) = rest.strip_prefix(keyword) {
                    if let Some(name) = leading_ident(after) {
                        names.push(name.to_string());
                    }
                    break;
                }
            }
        }

        names
    }
}

/// Expand `a::{b, c}` into `a::b`, `a::c`; pass plain paths through
fn expand_use_spec(spec: &str) -> Vec<String> {
    let Some(brace) = spec.find('{') else {
        let single = spec.split(" as ").next().unwrap_or(spec).trim();
        let single = single.trim_end_matches("::*").trim_end_matches('*');
        return vec![single.trim_end_matches("::").to_string()];
    };

    let prefix = spec[..brace].trim_end_matches("::").trim();
    let inner = spec[brace + 1..].split('}').next().unwrap_or("");

    let mut out = Vec::new();
    for item in inner.split(',') {
        let item = item.split(" as ").next().unwrap_or("").trim();
        if item.is_empty() || item == "*" || item.contains('{') {
            continue;
        }
        if item == "self" {
            out.push(prefix.to_string());
        } else if prefix.is_empty() {
            out.push(item.to_string());
        } else {
            out.push(format!("{}::{}", prefix, item));
        }
    }
    if out.is_empty() && !prefix.is_empty() {
        out.push(prefix.to_string());
    }
    out
}

/// Strip path roots that never appear in the index; drop external crates
fn normalize_path(token: &str) -> Option<String> {
    let mut path = token.trim();
    loop {
        let stripped = path
            .strip_prefix("crate::")
            .or_else(|| path.strip_prefix("self::"))
            .or_else(|| path.strip_prefix("super::"));
        match stripped {
            Some(s) => path = s,
            None => break,
        }
    }

    if path.is_empty() || !path.contains("::") && path.chars().any(|c| !is_ident_char(c)) {
        return None;
    }

    let first = path.split("::").next().unwrap_or("");
    if EXTERNAL_ROOTS.contains(&first) {
        return None;
    }

    Some(path.to_string())
}

/// Drop a leading `pub`, `pub(crate)`, `pub(in ...)` marker
fn strip_visibility(line: &str) -> &str {
    let Some(after) = line.strip_prefix("pub") else {
        return line;
    };
    let after = if let Some(paren) = after.strip_prefix('(') {
        match paren.find(')') {
            Some(pos) => &paren[pos + 1..],
            None => return line,
        }
    } else {
        after
    };
    after.trim_start()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn leading_ident(text: &str) -> Option<&str> {
    let end = text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len());
    if end == 0 {
        None
    } else {
        Some(&text[..end])
    }
}

/// Walk the AST and collect addressable definitions
fn walk(
    node: tree_sitter::Node,
    source: &str,
    path: &str,
    module: &str,
    symbols: &mut Vec<SymbolEntry>,
) {
    match node.kind() {
        "function_item" => {
            push_named(node, source, path, module, SymbolKind::Function, symbols);
        }
        "struct_item" | "enum_item" | "trait_item" | "type_item" | "union_item" => {
            push_named(node, source, path, module, SymbolKind::Type, symbols);
        }
        "const_item" | "static_item" => {
            push_named(node, source, path, module, SymbolKind::Constant, symbols);
        }
        "impl_item" => {
            collect_impl_methods(node, source, path, module, symbols);
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, path, module, symbols);
    }
}

/// Push a definition whose tree-sitter node carries a `name` field
fn push_named(
    node: tree_sitter::Node,
    source: &str,
    path: &str,
    module: &str,
    kind: SymbolKind,
    symbols: &mut Vec<SymbolEntry>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let Ok(name) = name_node.utf8_text(source.as_bytes()) else {
        return;
    };

    symbols.push(SymbolEntry {
        qualified: qualify(module, name),
        path: path.to_string(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        kind,
    });
}

/// Methods in an impl block are addressed as `Type::method`
fn collect_impl_methods(
    node: tree_sitter::Node,
    source: &str,
    path: &str,
    module: &str,
    symbols: &mut Vec<SymbolEntry>,
) {
    let type_name = node
        .child_by_field_name("type")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(|t| t.split('<').next().unwrap_or(t).trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "declaration_list" {
            continue;
        }
        let mut inner = child.walk();
        for item in child.children(&mut inner) {
            if item.kind() != "function_item" {
                continue;
            }
            let Some(name_node) = item.child_by_field_name("name") else {
                continue;
            };
            let Ok(method) = name_node.utf8_text(source.as_bytes()) else {
                continue;
            };
            symbols.push(SymbolEntry {
                qualified: qualify(module, &format!("{}::{}", type_name, method)),
                path: path.to_string(),
                start_line: item.start_position().row + 1,
                end_line: item.end_position().row + 1,
                kind: SymbolKind::Function,
            });
        }
    }
}

fn qualify(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", module, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_function_and_type() {
        let adapter = RustAdapter;
        let code = r#"
/// Greets the caller.
pub fn greet(name: &str) -> String {
    format!("Hello, {}!", name)
}

pub struct Greeter {
    prefix: String,
}

impl Greeter {
    pub fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_string() }
    }
}
"#;

        let symbols = adapter.extract_symbols("src/greet.rs", code).unwrap();
        let names: Vec<&str> = symbols.iter().map(|s| s.qualified.as_str()).collect();

        assert!(names.contains(&"greet"));
        assert!(names.contains(&"greet::greet"));
        assert!(names.contains(&"greet::Greeter"));
        assert!(names.contains(&"greet::Greeter::new"));

        let func = symbols.iter().find(|s| s.qualified == "greet::greet").unwrap();
        assert_eq!(func.kind, SymbolKind::Function);
        assert!(func.start_line >= 2);
    }

    #[test]
    fn test_import_references() {
        let adapter = RustAdapter;
        let text = "use crate::config::parse_config;\nuse std::fs;\nuse docrot::{index, report};\n";

        let refs = adapter.import_references(text);
        let tokens: Vec<&str> = refs.iter().map(|r| r.token.as_str()).collect();

        assert!(tokens.contains(&"config::parse_config"));
        assert!(tokens.contains(&"docrot::index"));
        assert!(tokens.contains(&"docrot::report"));
        assert!(!tokens.iter().any(|t| t.starts_with("std")));
    }

    #[test]
    fn test_declared_names() {
        let adapter = RustAdapter;
        let text = "pub fn parse_config(path: &str) {}\nstruct Options;\npub(crate) const LIMIT: usize = 8;\n";

        let names = adapter.declared_names(text);
        assert_eq!(names, vec!["parse_config", "Options", "LIMIT"]);
    }

    #[test]
    fn test_tokenize_skips_comments() {
        let adapter = RustAdapter;
        let tokens = adapter.tokenize("fn main() { // entry\n    let x = 3;\n}");
        assert!(tokens.iter().all(|t| !t.text.contains("entry")));
        assert!(tokens.iter().any(|t| t.text == "3"));
    }
}
