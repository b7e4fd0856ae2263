//! AST builder.
//!
//! Validates a [`SyntaxTree`] and produces the [`AstRoot`] the loader
//! works with: the package name, unbound file imports, and the top-level
//! declaration table in source order.

use rustc_hash::FxHashSet;
use tarn_ir::{
    AstRoot, Decl, DeclKind, FileImport, NodeKind, StringInterner, SyntaxTree, BLANK_IDENT,
    INIT_FUNC, MAIN_FUNC,
};

use crate::{AstError, AstErrorKind};

/// Build the AST root of one parsed file.
#[tracing::instrument(level = "debug", skip_all, fields(file = %tree.file_name))]
pub fn build_ast(tree: SyntaxTree, interner: &StringInterner) -> Result<AstRoot, AstError> {
    let file = tree.file_name.as_str();
    let error =
        |kind: AstErrorKind, span| AstError::new(kind, file, tree.line_index.span_start(span));

    let Some((package, package_span)) = tree.package else {
        return Err(error(AstErrorKind::MissingPackageClause, tarn_ir::Span::DUMMY));
    };
    if interner.lookup(package) == BLANK_IDENT {
        return Err(error(AstErrorKind::BlankPackageName, package_span));
    }
    let is_main_package = interner.lookup(package) == MAIN_FUNC;

    let mut paths = FxHashSet::default();
    let mut aliases = FxHashSet::default();
    for spec in &tree.imports {
        if !paths.insert(spec.path.as_str()) {
            return Err(error(
                AstErrorKind::DuplicateImport {
                    path: spec.path.clone(),
                },
                spec.span,
            ));
        }
        if let Some(alias) = spec.alias {
            if interner.lookup(alias) != BLANK_IDENT && !aliases.insert(alias) {
                return Err(error(
                    AstErrorKind::DuplicateImportName {
                        name: interner.lookup(alias).to_string(),
                    },
                    spec.span,
                ));
            }
        }
    }

    let mut decls = Vec::with_capacity(tree.decls.len());
    for &node in &tree.decls {
        let span = tree.arena.span(node);
        let decl = match tree.arena.kind(node) {
            NodeKind::Var {
                name,
                value,
                constant,
                ..
            } => {
                let text = interner.lookup(*name);
                if text == INIT_FUNC {
                    return Err(error(AstErrorKind::InitNotFunction, span));
                }
                if *constant && value.is_none() {
                    return Err(error(
                        AstErrorKind::ConstWithoutValue {
                            name: text.to_string(),
                        },
                        span,
                    ));
                }
                let kind = if *constant {
                    DeclKind::Const
                } else {
                    DeclKind::Var
                };
                Decl {
                    name: *name,
                    kind,
                    node,
                    span,
                }
            }
            NodeKind::TypeDecl { name, .. } => {
                if interner.lookup(*name) == INIT_FUNC {
                    return Err(error(AstErrorKind::InitNotFunction, span));
                }
                Decl {
                    name: *name,
                    kind: DeclKind::Type,
                    node,
                    span,
                }
            }
            NodeKind::Func {
                name,
                params,
                result,
                ..
            } => {
                let text = interner.lookup(*name);
                let is_init = text == INIT_FUNC;
                let is_entry = is_init || (is_main_package && text == MAIN_FUNC);
                if is_entry && (!params.is_empty() || result.is_some()) {
                    return Err(error(
                        AstErrorKind::BadEntrySignature {
                            name: text.to_string(),
                        },
                        span,
                    ));
                }
                Decl {
                    name: *name,
                    kind: if is_init { DeclKind::Init } else { DeclKind::Func },
                    node,
                    span,
                }
            }
            // The parser only emits declaration nodes at top level.
            _ => continue,
        };
        decls.push(decl);
    }

    let imports = tree
        .imports
        .into_iter()
        .map(|spec| FileImport {
            spec,
            import_path: None,
            local_name: None,
        })
        .collect();

    tracing::debug!(decls = decls.len(), "built ast");
    Ok(AstRoot {
        file_name: tree.file_name,
        package,
        imports,
        decls,
        arena: tree.arena,
        line_index: tree.line_index,
    })
}
