//! Syntax-tree specifier collection and rewrite helpers.
//!
//! The parser carries exact spans for string literals but not for the
//! module string of import/export statements, so statement sites are
//! located by searching for the quoted text inside the statement's own
//! span. Every reported span is a byte range into the original text.

use derive_visitor::{Drive, Visitor};
use parse_js::ast::expr::lit::LitStrExpr;
use parse_js::ast::expr::{Expr, ImportExpr};
use parse_js::ast::node::Node;
use parse_js::ast::stmt::{ExportListStmt, ImportStmt};
use tracing::debug;
use url::Url;

use crate::error::LoadError;

/// How a resolved virtual path is spliced back into the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RewriteStyle {
    /// Quoted module specifier; declaration targets map to runtime suffixes.
    Module,
    /// Pragma or attribute value; the virtual path lands verbatim.
    Verbatim,
}

/// One specifier occurrence awaiting resolution and rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RewriteSite {
    pub start: usize,
    pub end: usize,
    pub specifier: String,
    pub style: RewriteStyle,
}

type ImportStmtNode = Node<ImportStmt>;
type ExportListStmtNode = Node<ExportListStmt>;
type ImportExprNode = Node<ImportExpr>;

struct CollectedSite {
    start: usize,
    end: usize,
    specifier: String,
    /// True when the span is the quoted literal itself rather than the
    /// enclosing statement.
    exact: bool,
}

#[derive(Default, Visitor)]
#[visitor(ImportStmtNode(enter), ExportListStmtNode(enter), ImportExprNode(enter))]
struct SpecifierCollector {
    sites: Vec<CollectedSite>,
}

impl SpecifierCollector {
    fn enter_import_stmt_node(&mut self, node: &ImportStmtNode) {
        self.sites.push(CollectedSite {
            start: node.loc.0,
            end: node.loc.1,
            specifier: node.stx.module.clone(),
            exact: false,
        });
    }

    fn enter_export_list_stmt_node(&mut self, node: &ExportListStmtNode) {
        if let Some(from) = &node.stx.from {
            self.sites.push(CollectedSite {
                start: node.loc.0,
                end: node.loc.1,
                specifier: from.clone(),
                exact: false,
            });
        }
    }

    fn enter_import_expr_node(&mut self, node: &ImportExprNode) {
        // Only literal arguments are rewritable; computed specifiers are
        // left for the runtime.
        if let Expr::LitStr(lit) = &*node.stx.module.stx {
            self.sites.push(CollectedSite {
                start: lit.loc.0,
                end: lit.loc.1,
                specifier: lit.stx.value.clone(),
                exact: true,
            });
        }
    }
}

/// Parse `text` and collect every static import/export specifier and
/// every literal dynamic-import argument. Spans of exact sites include
/// the surrounding quotes.
pub(crate) fn module_specifiers(source: &Url, text: &str) -> Result<Vec<RewriteSite>, LoadError> {
    let top_level = parse_js::parse(text.as_bytes()).map_err(|err| LoadError::Parse {
        url: source.to_string(),
        reason: err.to_string(),
    })?;

    let mut collector = SpecifierCollector::default();
    top_level.drive(&mut collector);

    let mut sites = Vec::new();
    for found in collector.sites {
        if found.exact {
            sites.push(RewriteSite {
                start: found.start,
                end: found.end,
                specifier: found.specifier,
                style: RewriteStyle::Module,
            });
            continue;
        }
        match find_quoted(text, found.start, found.end, &found.specifier) {
            Some((start, end)) => sites.push(RewriteSite {
                start,
                end,
                specifier: found.specifier,
                style: RewriteStyle::Module,
            }),
            None => debug!(
                specifier = %found.specifier,
                "could not locate specifier span, leaving as written"
            ),
        }
    }
    Ok(sites)
}

/// Locate the quoted specifier within a statement span. Searched from the
/// end since the module string closes an import/export statement.
fn find_quoted(text: &str, start: usize, end: usize, specifier: &str) -> Option<(usize, usize)> {
    let window = text.get(start..end)?;
    let double = format!("\"{specifier}\"");
    let single = format!("'{specifier}'");
    let at = window.rfind(&double).or_else(|| window.rfind(&single))?;
    Some((start + at, start + at + specifier.len() + 2))
}

/// Replacement text for a rewrite site resolved to `virtual_path`.
pub(crate) fn replacement_for(style: RewriteStyle, virtual_path: &str) -> String {
    match style {
        RewriteStyle::Module => format!("\"{}\"", importable_path(virtual_path)),
        RewriteStyle::Verbatim => virtual_path.to_string(),
    }
}

/// Map a declaration path to the runtime-module suffix the frontend
/// expects of importable modules. The store keeps the declaration key;
/// the frontend pairs the runtime name back to it on lookup.
pub(crate) fn importable_path(virtual_path: &str) -> String {
    for (declaration, runtime) in [(".d.ts", ".js"), (".d.mts", ".mjs"), (".d.cts", ".cjs")] {
        if let Some(stem) = virtual_path.strip_suffix(declaration) {
            return format!("{stem}{runtime}");
        }
    }
    virtual_path.to_string()
}
