//! Injected collaborators: path resolution and template import.
//!
//! The evaluator never touches the filesystem. When a template executes
//! `import`, the engine asks an [`Importer`] to resolve the path and hand
//! back a parsed AST (or raw source as a fallback). Caching, deduplication,
//! and any I/O discipline belong to the implementor.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Ast;
use crate::errors::ParseError;
use crate::parse::parse;

/// Resolves and loads imported templates on behalf of the evaluator.
pub trait Importer {
    /// Resolve a path referenced from `from` into a canonical file identity.
    fn resolve(&self, from: Option<&str>, path: &str) -> String;

    /// A previously parsed AST for `file`, if one is available.
    fn load_ast(&self, file: &str) -> Option<Rc<Ast>>;

    /// Raw source for `file`; the engine parses it when no AST is cached.
    fn load_source(&self, _file: &str) -> Option<String> {
        None
    }
}

/// An in-memory template collection keyed by name.
///
/// `resolve` returns the requested path unchanged, so a template registered
/// as `"arrow"` is imported with `import "arrow"`. Registered templates are
/// parsed once, up front.
#[derive(Debug, Default)]
pub struct Library {
    templates: HashMap<String, Rc<Ast>>,
}

impl Library {
    pub fn new() -> Self {
        Library::default()
    }

    /// Parse `source` and make it importable under `name`.
    pub fn register(&mut self, name: &str, source: &str) -> Result<(), ParseError> {
        let ast = parse(source).map_err(|e| e.with_file(name))?;
        self.templates.insert(name.to_string(), Rc::new(ast));
        Ok(())
    }
}

impl Importer for Library {
    fn resolve(&self, _from: Option<&str>, path: &str) -> String {
        path.to_string()
    }

    fn load_ast(&self, file: &str) -> Option<Rc<Ast>> {
        self.templates.get(file).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_parses_up_front() {
        let mut lib = Library::new();
        lib.register("arrow", "prop len; M 0,0 H len").expect("register");
        assert!(lib.load_ast("arrow").is_some());
        assert!(lib.load_ast("missing").is_none());
    }

    #[test]
    fn register_surfaces_parse_errors_with_the_template_name() {
        let mut lib = Library::new();
        let err = lib.register("broken", "for {").expect_err("must fail");
        assert_eq!(err.file(), Some("broken"));
    }

    #[test]
    fn resolve_is_the_identity() {
        let lib = Library::new();
        assert_eq!(lib.resolve(Some("a/b.path"), "c.path"), "c.path");
    }
}
