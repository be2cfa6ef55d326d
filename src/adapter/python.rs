//! Python language adapter
//!
//! Symbol extraction walks the tree-sitter AST for module-level functions,
//! classes, and class methods. Nested defs are not addressable.

use super::{module_components, tokenize_with, ImportRef, LanguageAdapter, Token};
use crate::index::{SymbolEntry, SymbolKind};
use anyhow::{Context, Result};

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Stdlib roots that are never part of the repository index
const EXTERNAL_ROOTS: &[&str] = &[
    "os", "sys", "re", "json", "typing", "pathlib", "collections", "itertools", "functools",
    "dataclasses", "abc", "io", "math", "time", "datetime", "logging", "unittest", "argparse",
    "subprocess", "enum",
];

/// Adapter for `.py` files
pub struct PythonAdapter;

impl LanguageAdapter for PythonAdapter {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn language_tags(&self) -> &'static [&'static str] {
        &["python", "py", "python3"]
    }

    fn extract_symbols(&self, path: &str, content: &str) -> Result<Vec<SymbolEntry>> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .context("Failed to load Python grammar")?;
        let tree = parser
            .parse(content, None)
            .with_context(|| format!("Failed to parse Python file: {}", path))?;

        let module = module_components(path, &["__init__", "__main__"]).join(".");
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

        let root = tree.root_node();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            collect_top_level(child, content, path, &module, &mut symbols);
        }

        Ok(symbols)
    }

    fn tokenize(&self, text: &str) -> Vec<Token> {
        tokenize_with(text, &["#"], None, true, KEYWORDS)
    }

    fn import_references(&self, text: &str) -> Vec<ImportRef> {
        let mut refs = Vec::new();

        for (offset, line) in text.lines().enumerate() {
            let trimmed = line.trim();

            if let Some(rest) = trimmed.strip_prefix("from ") {
                let Some((module, names)) = rest.split_once(" import ") else {
                    continue;
                };
                let module = module.trim().trim_start_matches('.');
                for token in import_tokens(module, names) {
                    if keep(&token) {
                        refs.push(ImportRef {
                            token,
                            line_offset: offset,
                        });
                    }
                }
            } else if let Some(rest) = trimmed.strip_prefix("import ") {
                for item in rest.split(',') {
                    let module = item.split(" as ").next().unwrap_or("").trim();
                    if !module.is_empty() && keep(module) {
                        refs.push(ImportRef {
                            token: module.to_string(),
                            line_offset: offset,
                        });
                    }
                }
            }
        }

        refs
    }

    fn declared_names(&self, text: &str) -> Vec<String> {
        let mut names = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            let rest = trimmed
                .strip_prefix("async def ")
                .or_else(|| trimmed.strip_prefix("def "))
                .or_else(|| trimmed.strip_prefix("class "));
            if let Some(after) = rest {
                let end = after
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                if end > 0 {
                    names.push(after[..end].to_string());
                }
            }
        }

        names
    }
}

/// `from a.b import c, d` resolves to `a.b.c`, `a.b.d`; `import *` keeps the module
fn import_tokens(module: &str, names: &str) -> Vec<String> {
    let mut out = Vec::new();

    for name in names.split(',') {
        let name = name.split(" as ").next().unwrap_or("").trim().trim_matches('(').trim_matches(')');
        if name.is_empty() {
            continue;
        }
        if name == "*" {
            if !module.is_empty() {
                out.push(module.to_string());
            }
            continue;
        }
        if module.is_empty() {
            out.push(name.to_string());
        } else {
            out.push(format!("{}.{}", module, name));
        }
    }

    out
}

fn keep(token: &str) -> bool {
    let first = token.split('.').next().unwrap_or("");
    !first.is_empty() && !EXTERNAL_ROOTS.contains(&first)
}

/// Collect module-level defs, classes, and class methods
fn collect_top_level(
    node: tree_sitter::Node,
    source: &str,
    path: &str,
    module: &str,
    symbols: &mut Vec<SymbolEntry>,
) {
    match node.kind() {
        "function_definition" => {
            if let Some(name) = node_name(node, source) {
                symbols.push(entry(node, path, qualify(module, &name), SymbolKind::Function));
            }
        }
        "class_definition" => {
            let Some(class_name) = node_name(node, source) else {
                return;
            };
            symbols.push(entry(node, path, qualify(module, &class_name), SymbolKind::Type));

            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for child in body.children(&mut cursor) {
                    if child.kind() != "function_definition" {
                        continue;
                    }
                    if let Some(method) = node_name(child, source) {
                        let qualified =
                            qualify(module, &format!("{}.{}", class_name, method));
                        symbols.push(entry(child, path, qualified, SymbolKind::Function));
                    }
                }
            }
        }
        // Decorated definitions wrap the real node
        "decorated_definition" => {
            if let Some(inner) = node.child_by_field_name("definition") {
                collect_top_level(inner, source, path, module, symbols);
            }
        }
        _ => {}
    }
}

fn node_name(node: tree_sitter::Node, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(|s| s.to_string())
}

fn entry(node: tree_sitter::Node, path: &str, qualified: String, kind: SymbolKind) -> SymbolEntry {
    SymbolEntry {
        qualified,
        path: path.to_string(),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        kind,
    }
}

fn qualify(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", module, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_functions_and_classes() {
        let adapter = PythonAdapter;
        let code = r#"
def scan_repo(root):
    """Scan the repository."""
    return []

class Reporter:
    def render(self):
        pass
"#;

        let symbols = adapter.extract_symbols("pkg/scanner.py", code).unwrap();
        let names: Vec<&str> = symbols.iter().map(|s| s.qualified.as_str()).collect();

        assert!(names.contains(&"pkg.scanner"));
        assert!(names.contains(&"pkg.scanner.scan_repo"));
        assert!(names.contains(&"pkg.scanner.Reporter"));
        assert!(names.contains(&"pkg.scanner.Reporter.render"));
    }

    #[test]
    fn test_import_references() {
        let adapter = PythonAdapter;
        let text = "import mypkg.core\nfrom mypkg.scan import run, report\nimport os\n";

        let refs = adapter.import_references(text);
        let tokens: Vec<&str> = refs.iter().map(|r| r.token.as_str()).collect();

        assert_eq!(tokens, vec!["mypkg.core", "mypkg.scan.run", "mypkg.scan.report"]);
    }

    #[test]
    fn test_tokenize_handles_docstrings() {
        let adapter = PythonAdapter;
        let tokens = adapter.tokenize("def f():\n    \"\"\"doc\"\"\"\n    return 1  # done\n");
        assert!(tokens.iter().any(|t| t.text == "\"\"\"doc\"\"\""));
        assert!(tokens.iter().all(|t| !t.text.contains("done")));
    }

    #[test]
    fn test_declared_names() {
        let adapter = PythonAdapter;
        let names = adapter.declared_names("class Config:\n    pass\n\nasync def load(path):\n    ...\n");
        assert_eq!(names, vec!["Config", "load"]);
    }
}
