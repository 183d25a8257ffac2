//! pathru — a templating language that compiles to SVG path data.
//!
//! Templates look like SVG path data with parameters, arithmetic, loops,
//! conditionals, reusable sub-templates, and imports. Rendering a template
//! with a list of positional arguments produces a plain path-data string:
//!
//! ```
//! let path = pathru::render(
//!     "prop w (1..100) = 10, h = 10;
//!      M 0,0 h w v h h 0 - w Z",
//!     &[Some(40.0), Some(20.0)],
//!     None,
//! )?;
//! assert_eq!(path, "M0,0h40v20h-40Z");
//! # Ok::<(), pathru::Error>(())
//! ```
//!
//! The pipeline is conventional: [`tokenize`] yields located tokens,
//! [`parse`] builds a located AST, and a [`Renderer`](render::Renderer)
//! walks it. Commands repeat when given more arguments than their arity,
//! the way SVG path commands do, and `def`/`import` bind sub-templates that
//! resolve free variables against their *caller's* scope at invocation
//! time. Imports go through an injected [`Importer`]; the bundled
//! [`Library`] keeps parsed templates in memory:
//!
//! ```
//! use pathru::Library;
//!
//! let mut lib = Library::new();
//! lib.register("tick", "prop x; M x,0 v 1")?;
//! let path = pathru::render_with(&lib, "import 'tick' tick 1 tick 2", &[], None)?;
//! assert_eq!(path, "M1,0v1M2,0v1");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Every failure carries a line/column pair and, where known, a file
//! identity; [`report`] turns one into a `miette` diagnostic with the
//! offending line and a caret under the column.

pub mod ast;
pub mod errors;
pub mod host;
pub mod lexer;
mod log;
pub mod parse;
pub mod render;

use std::rc::Rc;

pub use ast::Ast;
pub use errors::{Error, ParseError, RenderError, report};
pub use host::{Importer, Library};
pub use lexer::{Location, Token, TokenKind, Tokenizer, tokenize};
pub use parse::parse;
pub use render::{PropSignature, Renderer, Scope, Value};

/// Render `source` with positional arguments and no import collaborator.
///
/// `None` entries in `args` stand for absent values: the matching prop falls
/// back to its default, or fails with a missing-default error. Every
/// `import` fails as not found; use [`render_with`] to supply templates.
pub fn render(source: &str, args: &[Option<f64>], file: Option<&str>) -> Result<String, Error> {
    render_with(&Library::new(), source, args, file)
}

/// Render `source`, resolving imports through `importer`.
pub fn render_with(
    importer: &dyn Importer,
    source: &str,
    args: &[Option<f64>],
    file: Option<&str>,
) -> Result<String, Error> {
    let ast = parse(source).map_err(|e| match file {
        Some(f) => e.with_file(f),
        None => e,
    })?;
    render_ast(importer, Rc::new(ast), args, file)
}

/// Render an already parsed template, e.g. one cached by an importer.
pub fn render_ast(
    importer: &dyn Importer,
    ast: Rc<Ast>,
    args: &[Option<f64>],
    file: Option<&str>,
) -> Result<String, Error> {
    let renderer = Renderer::new(ast, file.map(Rc::from));
    let args = args.iter().map(|a| a.map(Value::Number)).collect();
    render::render_root(importer, &renderer, args)
}

/// The positional parameter surface of a template, without rendering it.
///
/// Range and default expressions are evaluated in a scope with only the
/// builtins, so a host can present a template's parameters before asking
/// for a render.
pub fn prop_definitions(source: &str) -> Result<Vec<PropSignature>, Error> {
    let ast = parse(source)?;
    let renderer = Renderer::new(Rc::new(ast), None);
    render::prop_signatures(&Library::new(), &renderer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_carry_the_origin_file() {
        let err = render("M 0,0 (", &[], Some("main.path")).expect_err("must fail");
        assert_eq!(err.file(), Some("main.path"));
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn render_and_render_ast_agree() {
        let source = "prop a; for i in 1..a { h i }";
        let by_source = render(source, &[Some(3.0)], None).expect("render");
        let ast = Rc::new(parse(source).expect("parse"));
        let by_ast = render_ast(&Library::new(), ast, &[Some(3.0)], None).expect("render");
        assert_eq!(by_source, "h1h2h3");
        assert_eq!(by_source, by_ast);
    }

    #[test]
    fn prop_definitions_evaluates_hints() {
        let defs = prop_definitions("prop r (0..ceil(9.5)) = sqrt(4);").expect("definitions");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "r");
        assert_eq!(defs[0].range, Some((0.0, 10.0)));
        assert_eq!(defs[0].default, Some(Value::Number(2.0)));
    }
}
