//! Walk a parsed module and collect its raw export surface.
//!
//! Nothing here resolves specifiers; the export map layer turns the raw
//! records into [`super::ExportMap`] entries.

use super::doc::{capture_doc, parse_jsdoc, DocSummary};
use super::{ExportName, ParseError};
use crate::config::{DocStyle, Settings};
use rustc_hash::FxHashMap;
use std::path::Path;
use swc_common::comments::{Comment, CommentKind, Comments, SingleThreadedComments};
use swc_common::sync::Lrc;
use swc_common::{BytePos, FileName, SourceMap, Spanned};
use swc_ecma_ast::{
    CallExpr, Callee, Decl, DefaultDecl, EsVersion, ExportSpecifier, Expr, ImportSpecifier, Lit,
    Module, ModuleDecl, ModuleExportName, ModuleItem, ObjectPatProp, Pat, Stmt, TsModuleName,
    TsNamespaceBody, VarDeclarator,
};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
use swc_ecma_visit::{Visit, VisitWith};

/// Which grammar a file is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    TypeScript,
    EcmaScript,
}

impl ParserKind {
    /// Pick the grammar for `path`: an entry in `parsers` wins, then the
    /// file extension.
    #[must_use]
    pub fn for_path(path: &Path, settings: &Settings) -> Self {
        match settings.parser_for(path) {
            Some(name) if name.contains("typescript") => return Self::TypeScript,
            Some(name) if matches!(name, "ecmascript" | "espree") || name.contains("babel") => {
                return Self::EcmaScript
            }
            _ => {}
        }
        match lowercase_extension(path).as_str() {
            "ts" | "tsx" | "mts" | "cts" => Self::TypeScript,
            _ => Self::EcmaScript,
        }
    }

    fn syntax(self, path: &Path) -> Syntax {
        match self {
            Self::TypeScript => Syntax::Typescript(TsSyntax {
                tsx: lowercase_extension(path) == "tsx",
                decorators: true,
                dts: path.to_string_lossy().ends_with(".d.ts"),
                ..Default::default()
            }),
            Self::EcmaScript => Syntax::Es(EsSyntax {
                jsx: true,
                decorators: true,
                ..Default::default()
            }),
        }
    }
}

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Where an exported binding comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawOrigin {
    /// Declared in this module.
    Local,
    /// A namespace import of the given specifier, exported again.
    LocalNamespace(String),
    /// `export { x } from '<specifier>'`.
    ReExport(String),
    /// `export * as ns from '<specifier>'`.
    NamespaceReExport(String),
}

#[derive(Debug, Clone)]
pub(crate) struct RawExport {
    pub exported: ExportName,
    /// Name in this module, or in the source module for re-exports.
    pub local: Option<String>,
    pub origin: RawOrigin,
    pub doc: Option<DocSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawImport {
    pub source: String,
    pub line: usize,
    pub type_only: bool,
    pub imported: Vec<String>,
    pub dynamic: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ParsedModule {
    pub exports: Vec<RawExport>,
    /// Specifiers of value `export * from` declarations.
    pub star_exports: Vec<String>,
    pub imports: Vec<RawImport>,
    pub errors: Vec<ParseError>,
    pub doc: Option<DocSummary>,
    /// At least one import/export declaration.
    pub has_module_syntax: bool,
    pub has_dynamic_imports: bool,
    /// Parsing stopped; only `errors` is meaningful.
    pub fatal: bool,
}

/// Parse `content` and collect its exports and imports.
pub(crate) fn parse_source(path: &Path, content: &str, settings: &Settings) -> ParsedModule {
    let cm: Lrc<SourceMap> = Lrc::default();
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(path.to_string_lossy().into_owned())),
        content.to_string(),
    );
    let comments = SingleThreadedComments::default();
    let syntax = ParserKind::for_path(path, settings).syntax(path);
    let lexer = Lexer::new(syntax, EsVersion::EsNext, StringInput::from(&*fm), Some(&comments));
    let mut parser = Parser::new_from(lexer);

    let result = parser.parse_module();
    let mut errors: Vec<ParseError> = parser
        .take_errors()
        .iter()
        .map(|e| ParseError::at(&cm, e.span().lo, e.kind().msg()))
        .collect();

    let module = match result {
        Ok(module) => module,
        Err(e) => {
            errors.push(ParseError::at(&cm, e.span().lo, e.kind().msg()));
            tracing::debug!(path = %path.display(), errors = errors.len(), "parse failed");
            return ParsedModule {
                errors,
                fatal: true,
                ..ParsedModule::default()
            };
        }
    };

    let mut walker = Walker {
        cm: &cm,
        comments: &comments,
        styles: &settings.docstyle,
        namespaces: FxHashMap::default(),
        out: ParsedModule::default(),
    };
    walker.collect_namespaces(&module);
    for item in &module.body {
        walker.item(item, &module.body);
    }

    let mut dynamic = DynamicImports {
        cm: &cm,
        seen: false,
        found: Vec::new(),
    };
    module.visit_with(&mut dynamic);

    let mut out = walker.out;
    out.doc = module_doc(&comments);
    out.has_dynamic_imports = dynamic.seen;
    out.imports.extend(dynamic.found);
    out.errors = errors;
    out
}

/// The first block comment carrying a `@module` tag.
fn module_doc(comments: &SingleThreadedComments) -> Option<DocSummary> {
    let (leading, trailing) = comments.borrow_all();
    let mut all: Vec<&Comment> = leading
        .values()
        .chain(trailing.values())
        .flatten()
        .filter(|c| c.kind == CommentKind::Block)
        .collect();
    all.sort_by_key(|c| c.span.lo);
    all.into_iter()
        .map(|c| parse_jsdoc(&c.text))
        .find(|doc| doc.has_tag("module"))
}

struct Walker<'a> {
    cm: &'a SourceMap,
    comments: &'a SingleThreadedComments,
    styles: &'a [DocStyle],
    /// Local name of each `import * as x` -> its specifier.
    namespaces: FxHashMap<String, String>,
    out: ParsedModule,
}

impl Walker<'_> {
    fn collect_namespaces(&mut self, module: &Module) {
        for item in &module.body {
            let ModuleItem::ModuleDecl(ModuleDecl::Import(import)) = item else {
                continue;
            };
            for spec in &import.specifiers {
                if let ImportSpecifier::Namespace(ns) = spec {
                    self.namespaces
                        .insert(ns.local.sym.to_string(), import.src.value.to_string());
                }
            }
        }
    }

    fn doc_at(&self, pos: BytePos) -> Option<DocSummary> {
        let leading = self.comments.get_leading(pos)?;
        capture_doc(&leading, self.styles)
    }

    fn line_of(&self, pos: BytePos) -> usize {
        self.cm.lookup_char_pos(pos).line
    }

    fn push(&mut self, exported: ExportName, local: Option<String>, origin: RawOrigin, doc: Option<DocSummary>) {
        self.out.exports.push(RawExport {
            exported,
            local,
            origin,
            doc,
        });
    }

    fn push_local(&mut self, name: String, doc: Option<DocSummary>) {
        self.push(ExportName::from(name.as_str()), Some(name), RawOrigin::Local, doc);
    }

    fn record_import(&mut self, source: &str, pos: BytePos, type_only: bool, imported: Vec<String>) {
        let line = self.line_of(pos);
        self.out.imports.push(RawImport {
            source: source.to_string(),
            line,
            type_only,
            imported,
            dynamic: false,
        });
    }

    fn item(&mut self, item: &ModuleItem, body: &[ModuleItem]) {
        let ModuleItem::ModuleDecl(decl) = item else {
            return;
        };
        self.out.has_module_syntax = true;

        match decl {
            ModuleDecl::Import(import) => {
                let named_all_types = !import.specifiers.is_empty()
                    && import.specifiers.iter().all(|s| {
                        matches!(s, ImportSpecifier::Named(named) if named.is_type_only)
                    });
                let imported = import
                    .specifiers
                    .iter()
                    .map(|s| match s {
                        ImportSpecifier::Default(_) => "default".to_string(),
                        ImportSpecifier::Namespace(_) => "*".to_string(),
                        ImportSpecifier::Named(named) => named
                            .imported
                            .as_ref()
                            .map_or_else(|| named.local.sym.to_string(), export_name_text),
                    })
                    .collect();
                self.record_import(
                    &import.src.value,
                    import.span.lo,
                    import.type_only || named_all_types,
                    imported,
                );
            }
            ModuleDecl::ExportDecl(export) => {
                let doc = self.doc_at(export.span.lo);
                self.exported_decl(&export.decl, doc);
            }
            ModuleDecl::ExportNamed(named) => match &named.src {
                Some(src) => self.reexport_specifiers(&named.specifiers, &src.value, named.type_only, named.span.lo),
                None => self.local_specifiers(&named.specifiers),
            },
            ModuleDecl::ExportDefaultDecl(default) => {
                let local = match &default.decl {
                    DefaultDecl::Class(class) => class.ident.as_ref().map(|i| i.sym.to_string()),
                    DefaultDecl::Fn(func) => func.ident.as_ref().map(|i| i.sym.to_string()),
                    DefaultDecl::TsInterfaceDecl(iface) => Some(iface.id.sym.to_string()),
                };
                let doc = self.doc_at(default.span.lo);
                self.push(ExportName::Default, local, RawOrigin::Local, doc);
            }
            ModuleDecl::ExportDefaultExpr(default) => {
                let doc = self.doc_at(default.span.lo);
                let (local, origin) = match &*default.expr {
                    Expr::Ident(id) => {
                        let name = id.sym.to_string();
                        let origin = self.origin_of_local(&name);
                        (Some(name), origin)
                    }
                    _ => (None, RawOrigin::Local),
                };
                self.push(ExportName::Default, local, origin, doc);
            }
            ModuleDecl::ExportAll(all) => {
                self.record_import(&all.src.value, all.span.lo, all.type_only, vec!["*".to_string()]);
                if !all.type_only {
                    self.out.star_exports.push(all.src.value.to_string());
                }
            }
            ModuleDecl::TsExportAssignment(assign) => {
                let doc = self.doc_at(assign.span.lo);
                match &*assign.expr {
                    Expr::Ident(id) => self.export_assignment(&id.sym, body, doc),
                    _ => self.push(ExportName::Default, None, RawOrigin::Local, doc),
                }
            }
            ModuleDecl::TsNamespaceExport(ns) => {
                let doc = self.doc_at(ns.span.lo);
                self.export_assignment(&ns.id.sym, body, doc);
            }
            ModuleDecl::TsImportEquals(_) => {}
        }
    }

    fn origin_of_local(&self, name: &str) -> RawOrigin {
        match self.namespaces.get(name) {
            Some(specifier) => RawOrigin::LocalNamespace(specifier.clone()),
            None => RawOrigin::Local,
        }
    }

    fn exported_decl(&mut self, decl: &Decl, doc: Option<DocSummary>) {
        match decl {
            Decl::Var(var) => self.declarators(&var.decls, doc.as_ref()),
            Decl::Using(using) => self.declarators(&using.decls, doc.as_ref()),
            other => {
                if let Some(name) = decl_name(other) {
                    self.push_local(name, doc);
                }
            }
        }
    }

    /// Every binding of every declarator, each with its own doc or the
    /// statement's.
    fn declarators(&mut self, decls: &[VarDeclarator], fallback: Option<&DocSummary>) {
        for declarator in decls {
            let doc = self
                .doc_at(declarator.span.lo)
                .or_else(|| fallback.cloned());
            let mut names = Vec::new();
            pattern_names(&declarator.name, &mut names);
            for name in names {
                self.push_local(name, doc.clone());
            }
        }
    }

    fn local_specifiers(&mut self, specifiers: &[ExportSpecifier]) {
        for spec in specifiers {
            if let ExportSpecifier::Named(named) = spec {
                let orig = export_name_text(&named.orig);
                let exported = named
                    .exported
                    .as_ref()
                    .map_or_else(|| orig.clone(), export_name_text);
                let origin = self.origin_of_local(&orig);
                self.push(ExportName::from(exported.as_str()), Some(orig), origin, None);
            }
        }
    }

    fn reexport_specifiers(&mut self, specifiers: &[ExportSpecifier], source: &str, type_only: bool, pos: BytePos) {
        let mut imported = Vec::with_capacity(specifiers.len());
        for spec in specifiers {
            match spec {
                ExportSpecifier::Named(named) => {
                    let orig = export_name_text(&named.orig);
                    let exported = named
                        .exported
                        .as_ref()
                        .map_or_else(|| orig.clone(), export_name_text);
                    imported.push(orig.clone());
                    self.push(
                        ExportName::from(exported.as_str()),
                        Some(orig),
                        RawOrigin::ReExport(source.to_string()),
                        None,
                    );
                }
                ExportSpecifier::Default(default) => {
                    imported.push("default".to_string());
                    self.push(
                        ExportName::from(&*default.exported.sym),
                        Some("default".to_string()),
                        RawOrigin::ReExport(source.to_string()),
                        None,
                    );
                }
                ExportSpecifier::Namespace(ns) => {
                    imported.push("*".to_string());
                    self.push(
                        ExportName::from(export_name_text(&ns.name).as_str()),
                        None,
                        RawOrigin::NamespaceReExport(source.to_string()),
                        None,
                    );
                }
            }
        }
        self.record_import(source, pos, type_only, imported);
    }

    /// `export = X` / `export as namespace X`: members of a namespace `X`
    /// become named exports; any other declaration becomes `default`.
    fn export_assignment(&mut self, name: &str, body: &[ModuleItem], doc: Option<DocSummary>) {
        let decls: Vec<&Decl> = body
            .iter()
            .filter_map(|item| match item {
                ModuleItem::Stmt(Stmt::Decl(decl)) => Some(decl),
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => Some(&export.decl),
                _ => None,
            })
            .filter(|decl| declares(decl, name))
            .collect();

        if decls.is_empty() {
            self.push(ExportName::Default, None, RawOrigin::Local, doc);
            return;
        }

        for decl in decls {
            let Decl::TsModule(module) = decl else {
                let doc = self.doc_at(decl.span().lo);
                self.push(ExportName::Default, Some(name.to_string()), RawOrigin::Local, doc);
                continue;
            };
            let module_doc = self.doc_at(module.span.lo);
            match &module.body {
                Some(TsNamespaceBody::TsNamespaceDecl(inner)) => {
                    let doc = self.doc_at(inner.span.lo);
                    self.push_local(inner.id.sym.to_string(), doc);
                }
                Some(TsNamespaceBody::TsModuleBlock(block)) => {
                    for member in &block.body {
                        let (decl, pos) = match member {
                            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                                (&export.decl, export.span.lo)
                            }
                            ModuleItem::Stmt(Stmt::Decl(decl)) => (decl, decl.span().lo),
                            _ => continue,
                        };
                        let member_doc = self.doc_at(pos).or_else(|| module_doc.clone());
                        self.exported_decl(decl, member_doc);
                    }
                }
                None => {}
            }
        }
    }
}

/// Whether `decl` declares a binding called `name` at its top level.
fn declares(decl: &Decl, name: &str) -> bool {
    match decl {
        Decl::Var(var) => var
            .decls
            .iter()
            .any(|d| matches!(&d.name, Pat::Ident(id) if &*id.id.sym == name)),
        other => decl_name(other).is_some_and(|n| n == name),
    }
}

fn decl_name(decl: &Decl) -> Option<String> {
    let name = match decl {
        Decl::Class(class) => &class.ident.sym,
        Decl::Fn(func) => &func.ident.sym,
        Decl::TsInterface(iface) => &iface.id.sym,
        Decl::TsTypeAlias(alias) => &alias.id.sym,
        Decl::TsEnum(e) => &e.id.sym,
        Decl::TsModule(module) => match &module.id {
            TsModuleName::Ident(id) => &id.sym,
            TsModuleName::Str(_) => return None,
        },
        Decl::Var(_) | Decl::Using(_) => return None,
    };
    Some(name.to_string())
}

/// Binding names introduced by a (possibly destructuring) pattern.
fn pattern_names(pat: &Pat, out: &mut Vec<String>) {
    match pat {
        Pat::Ident(binding) => out.push(binding.id.sym.to_string()),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                pattern_names(elem, out);
            }
        }
        Pat::Rest(rest) => pattern_names(&rest.arg, out),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => pattern_names(&kv.value, out),
                    ObjectPatProp::Assign(assign) => out.push(assign.key.sym.to_string()),
                    ObjectPatProp::Rest(rest) => pattern_names(&rest.arg, out),
                }
            }
        }
        Pat::Assign(assign) => pattern_names(&assign.left, out),
        Pat::Invalid(_) | Pat::Expr(_) => {}
    }
}

fn export_name_text(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(id) => id.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}

/// `import('...')` calls anywhere in the module.
struct DynamicImports<'a> {
    cm: &'a SourceMap,
    seen: bool,
    found: Vec<RawImport>,
}

impl Visit for DynamicImports<'_> {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        if let Callee::Import(_) = call.callee {
            self.seen = true;
            if let Some(Expr::Lit(Lit::Str(source))) = call.args.first().map(|arg| &*arg.expr) {
                self.found.push(RawImport {
                    source: source.value.to_string(),
                    line: self.cm.lookup_char_pos(call.span.lo).line,
                    type_only: false,
                    imported: Vec::new(),
                    dynamic: true,
                });
            }
        }
        call.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(name: &str, src: &str) -> ParsedModule {
        parse_source(&PathBuf::from(name), src, &Settings::default())
    }

    fn names(parsed: &ParsedModule) -> Vec<String> {
        parsed
            .exports
            .iter()
            .map(|e| e.exported.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_declarations() {
        let parsed = parse(
            "/a.js",
            "export function f() {}\nexport class C {}\nexport const a = 1, b = 2;\nexport default 42;",
        );
        assert_eq!(names(&parsed), vec!["f", "C", "a", "b", "default"]);
        assert!(parsed.has_module_syntax);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_destructuring() {
        let parsed = parse(
            "/a.js",
            "export const { a, b: c, d = 1, ...rest } = obj;\nexport const [x, , [y], ...zs] = arr;",
        );
        assert_eq!(names(&parsed), vec!["a", "c", "d", "rest", "x", "y", "zs"]);
    }

    #[test]
    fn test_specifiers_and_reexports() {
        let parsed = parse(
            "/a.ts",
            "import * as ns from './ns';\nconst v = 1;\nexport { v as w, ns };\nexport { x as y, default as z } from './x';\nexport * as all from './all';\nexport * from './star';\nexport type * from './types';",
        );
        assert_eq!(names(&parsed), vec!["w", "ns", "y", "z", "all"]);

        let ns = &parsed.exports[1];
        assert_eq!(ns.origin, RawOrigin::LocalNamespace("./ns".to_string()));
        let y = &parsed.exports[2];
        assert_eq!(y.local.as_deref(), Some("x"));
        assert_eq!(y.origin, RawOrigin::ReExport("./x".to_string()));
        assert_eq!(parsed.exports[3].local.as_deref(), Some("default"));
        assert_eq!(
            parsed.exports[4].origin,
            RawOrigin::NamespaceReExport("./all".to_string())
        );
        assert_eq!(parsed.star_exports, vec!["./star"]);
    }

    #[test]
    fn test_default_namespace_identifier() {
        let parsed = parse("/a.js", "import * as ns from './ns';\nexport default ns;");
        assert_eq!(parsed.exports.len(), 1);
        assert_eq!(parsed.exports[0].exported, ExportName::Default);
        assert_eq!(
            parsed.exports[0].origin,
            RawOrigin::LocalNamespace("./ns".to_string())
        );
    }

    #[test]
    fn test_imports_recorded() {
        let parsed = parse(
            "/a.ts",
            "import a, { b as c } from './a';\nimport type { T } from './types';\nimport { type U } from './u';\nexport { d } from './d';\nconst lazy = () => import('./lazy');",
        );
        let sources: Vec<&str> = parsed.imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(sources, vec!["./a", "./types", "./u", "./d", "./lazy"]);
        assert_eq!(parsed.imports[0].imported, vec!["default", "b"]);
        assert_eq!(parsed.imports[0].line, 1);
        assert!(!parsed.imports[0].type_only);
        assert!(parsed.imports[1].type_only);
        assert!(parsed.imports[2].type_only);
        assert!(parsed.imports[4].dynamic);
        assert_eq!(parsed.imports[4].line, 5);
        assert!(parsed.has_dynamic_imports);
    }

    #[test]
    fn test_script_with_dynamic_import_only() {
        let parsed = parse("/a.js", "const x = () => import(name);");
        assert!(!parsed.has_module_syntax);
        assert!(parsed.has_dynamic_imports);
        assert!(parsed.imports.is_empty());
    }

    #[test]
    fn test_docs_per_declarator() {
        let parsed = parse(
            "/a.js",
            "/** shared */\nexport const a = 1,\n  /** own @deprecated */\n  b = 2;\n/** fn doc */\nexport function f() {}",
        );
        let doc = |i: usize| parsed.exports[i].doc.clone().unwrap();
        assert_eq!(doc(0).description, "shared");
        assert!(doc(1).description.starts_with("own"));
        assert_eq!(doc(2).description, "fn doc");
    }

    #[test]
    fn test_module_doc() {
        let parsed = parse("/a.js", "/**\n * Helpers.\n * @module helpers\n */\nexport const a = 1;");
        let doc = parsed.doc.unwrap();
        assert_eq!(doc.tag("module"), Some("helpers"));
        assert_eq!(doc.description, "Helpers.");
    }

    #[test]
    fn test_fatal_parse_error() {
        let parsed = parse("/a.js", "export const = ;");
        assert!(parsed.exports.is_empty());
        assert!(!parsed.errors.is_empty());
        assert_eq!(parsed.errors[0].line, 1);
    }

    #[test]
    fn test_export_assignment_namespace() {
        let parsed = parse(
            "/a.d.ts",
            "declare namespace Lib {\n  export function run(): void;\n  const version: string;\n  interface Opts {}\n}\nexport = Lib;",
        );
        assert_eq!(names(&parsed), vec!["run", "version", "Opts"]);
    }

    #[test]
    fn test_export_assignment_other() {
        let parsed = parse("/a.ts", "declare function f(): void;\nexport = f;");
        assert_eq!(names(&parsed), vec!["default"]);

        let parsed = parse("/b.ts", "export = somethingElse;");
        assert_eq!(names(&parsed), vec!["default"]);

        let parsed = parse("/c.ts", "declare namespace A.B { const x: number; }\nexport = A;");
        assert_eq!(names(&parsed), vec!["B"]);
    }

    #[test]
    fn test_parser_kind() {
        let settings = Settings::default()
            .with_parser("@typescript-eslint/parser", [".ts"])
            .with_parser("@babel/eslint-parser", [".mjs"]);
        assert_eq!(
            ParserKind::for_path(Path::new("/a.ts"), &settings),
            ParserKind::TypeScript
        );
        assert_eq!(
            ParserKind::for_path(Path::new("/a.mjs"), &settings),
            ParserKind::EcmaScript
        );
        assert_eq!(
            ParserKind::for_path(Path::new("/a.tsx"), &Settings::default()),
            ParserKind::TypeScript
        );
        assert_eq!(
            ParserKind::for_path(Path::new("/a.js"), &Settings::default()),
            ParserKind::EcmaScript
        );
    }
}
