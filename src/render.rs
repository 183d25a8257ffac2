//! Tree-walking evaluator.
//!
//! A [`Renderer`] binds an AST to the file it came from; invoking it walks
//! the statements, accumulating SVG path data into a per-invocation output
//! buffer. `def` and `import` bind further renderers as commands, and every
//! invocation chains the callee's scope to the *caller's* scope, so free
//! variables inside a sub-template resolve against whoever invoked it, not
//! against the definition site.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::ast::*;
use crate::errors::{Error, RenderError};
use crate::host::Importer;
use crate::lexer::Location;
use crate::log::{debug, trace};

// ============================================================================
// Values
// ============================================================================

/// A runtime value. Templates compute with numbers; strings exist for import
/// paths and call arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
}

impl Value {
    /// Numeric view; strings coerce through `parse` and fall back to NaN.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

// ============================================================================
// Builtin library
// ============================================================================

/// A builtin SVG path command and its parameter count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathOp {
    letter: char,
    arity: usize,
}

fn path_op(name: &str) -> Option<PathOp> {
    let mut chars = name.chars();
    let (Some(letter), None) = (chars.next(), chars.next()) else {
        return None;
    };
    let arity = match letter {
        'Z' | 'z' => 0,
        'H' | 'h' | 'V' | 'v' => 1,
        'M' | 'm' | 'L' | 'l' | 'T' | 't' => 2,
        'S' | 's' | 'Q' | 'q' => 4,
        'C' | 'c' => 6,
        'A' | 'a' => 7,
        _ => return None,
    };
    Some(PathOp { letter, arity })
}

/// Arc flags serialize as `0`/`1`, everything else as coordinate pairs with
/// a comma inside a pair and a space between pairs.
fn emit_path(out: &mut String, letter: char, args: &[Value]) {
    out.push(letter);
    if matches!(letter, 'A' | 'a') {
        if let [rx, ry, rot, large_arc, sweep, x, y] = args {
            out.push_str(&format!(
                "{rx},{ry} {rot} {},{} {x},{y}",
                flag(large_arc),
                flag(sweep)
            ));
        }
        return;
    }
    if let [single] = args {
        out.push_str(&format!("{single}"));
        return;
    }
    for (i, pair) in args.chunks(2).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if let [x, y] = pair {
            out.push_str(&format!("{x},{y}"));
        }
    }
}

fn flag(value: &Value) -> char {
    if value.as_number() > 0.0 { '1' } else { '0' }
}

/// Builtin math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MathFn {
    Ceil,
    Round,
    Floor,
    Sin,
    Cos,
    Tan,
    Sqrt,
    Atan2,
}

fn math_fn(name: &str) -> Option<MathFn> {
    Some(match name {
        "ceil" => MathFn::Ceil,
        "round" => MathFn::Round,
        "floor" => MathFn::Floor,
        "sin" => MathFn::Sin,
        "cos" => MathFn::Cos,
        "tan" => MathFn::Tan,
        "sqrt" => MathFn::Sqrt,
        "atan2" => MathFn::Atan2,
        _ => return None,
    })
}

impl MathFn {
    fn arity(self) -> usize {
        match self {
            MathFn::Atan2 => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let x = args.first().copied().unwrap_or(f64::NAN);
        match self {
            MathFn::Ceil => x.ceil(),
            // Half rounds toward positive infinity: round(-2.5) is -2.
            MathFn::Round => (x + 0.5).floor(),
            MathFn::Floor => x.floor(),
            MathFn::Sin => x.sin(),
            MathFn::Cos => x.cos(),
            MathFn::Tan => x.tan(),
            MathFn::Sqrt => x.sqrt(),
            MathFn::Atan2 => x.atan2(args.get(1).copied().unwrap_or(f64::NAN)),
        }
    }
}

// ============================================================================
// Scope
// ============================================================================

/// A parent-chained environment with independent variable and command/function
/// namespaces; lookups that miss the whole chain fall through to the builtin
/// tables, which user bindings may shadow but never replace.
#[derive(Debug, Default)]
pub struct Scope<'p> {
    values: HashMap<String, Value>,
    functions: HashMap<String, Rc<Renderer>>,
    parent: Option<&'p Scope<'p>>,
}

/// A resolved command: a builtin path op, or a user renderer.
enum Command {
    Builtin(PathOp),
    User(Rc<Renderer>),
}

/// A resolved function: a builtin math function, or a user renderer.
enum Function {
    Builtin(MathFn),
    User(Rc<Renderer>),
}

impl<'p> Scope<'p> {
    pub fn new(parent: Option<&'p Scope<'p>>) -> Self {
        Scope {
            values: HashMap::new(),
            functions: HashMap::new(),
            parent,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value);
        }
        self.parent.and_then(|p| p.get(name))
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<Renderer>> {
        if let Some(renderer) = self.functions.get(name) {
            return Some(renderer.clone());
        }
        self.parent.and_then(|p| p.get_function(name))
    }

    pub fn set_function(&mut self, name: &str, renderer: Rc<Renderer>) {
        self.functions.insert(name.to_string(), renderer);
    }

    fn lookup_command(&self, name: &str) -> Option<Command> {
        if let Some(renderer) = self.get_function(name) {
            return Some(Command::User(renderer));
        }
        path_op(name).map(Command::Builtin)
    }

    fn lookup_function(&self, name: &str) -> Option<Function> {
        if let Some(renderer) = self.get_function(name) {
            return Some(Function::User(renderer));
        }
        math_fn(name).map(Function::Builtin)
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// An AST bound to its originating file, invocable as a command.
///
/// The arity is fixed at construction: the number of prop slots declared by
/// top-level `prop` statements. Props nested under control flow still consume
/// arguments when they execute, but do not count toward arity.
#[derive(Debug)]
pub struct Renderer {
    ast: Rc<Ast>,
    file: Option<Rc<str>>,
    arity: usize,
}

impl Renderer {
    pub fn new(ast: Rc<Ast>, file: Option<Rc<str>>) -> Self {
        let arity = ast
            .iter()
            .filter_map(|stmt| match &stmt.kind {
                StmtKind::Prop(defs) => Some(defs.len()),
                _ => None,
            })
            .sum();
        Renderer { ast, file, arity }
    }

    /// Arguments consumed per invocation.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

/// Where a renderer was invoked from; missing-default errors are attributed
/// here rather than to the prop declaration.
#[derive(Debug, Clone)]
struct CallSite {
    loc: Location,
    file: Option<Rc<str>>,
}

/// Render the root template with the host-supplied positional arguments.
pub(crate) fn render_root(
    importer: &dyn Importer,
    renderer: &Renderer,
    args: Vec<Option<Value>>,
) -> Result<String, Error> {
    invoke(importer, renderer, args, None, None)
}

fn invoke(
    importer: &dyn Importer,
    renderer: &Renderer,
    args: Vec<Option<Value>>,
    caller: Option<&Scope<'_>>,
    call_site: Option<CallSite>,
) -> Result<String, Error> {
    debug!(file = ?renderer.file(), args = args.len(), "render");
    let mut frame = Frame {
        importer,
        file: renderer.file.clone(),
        call_site,
        args: VecDeque::from(args),
        out: String::new(),
    };
    let mut scope = Scope::new(caller);
    frame.run(&renderer.ast, &mut scope)?;
    Ok(frame.out)
}

/// Per-invocation evaluator state: the output accumulator and the cursor
/// over the positional arguments.
struct Frame<'h> {
    importer: &'h dyn Importer,
    file: Option<Rc<str>>,
    call_site: Option<CallSite>,
    args: VecDeque<Option<Value>>,
    out: String,
}

impl Frame<'_> {
    fn file_name(&self) -> Option<String> {
        self.file.as_deref().map(str::to_string)
    }

    fn run(&mut self, stmts: &[Stmt], scope: &mut Scope<'_>) -> Result<(), Error> {
        for stmt in stmts {
            self.exec(stmt, scope)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt, scope: &mut Scope<'_>) -> Result<(), Error> {
        match &stmt.kind {
            StmtKind::Prop(defs) => self.exec_prop(defs, scope),
            StmtKind::Command { name, args } => self.exec_command(stmt, name, args, scope),
            StmtKind::Set { name, value } => {
                let value = self.eval(value, scope)?;
                scope.set(name, value);
                Ok(())
            }
            StmtKind::For { var, range, body } => {
                let start = self.eval(&range.start, scope)?.as_number().floor();
                let end = self.eval(&range.end, scope)?.as_number().floor();
                let mut inner = Scope::new(Some(&*scope));
                if end < start {
                    let mut i = start;
                    while i >= end {
                        inner.set(var, Value::Number(i));
                        self.run(body, &mut inner)?;
                        i -= 1.0;
                    }
                } else {
                    let mut i = start;
                    while i <= end {
                        inner.set(var, Value::Number(i));
                        self.run(body, &mut inner)?;
                        i += 1.0;
                    }
                }
                Ok(())
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let truthy = self.eval(condition, scope)?.as_number() > 0.0;
                let mut inner = Scope::new(Some(&*scope));
                if truthy {
                    self.run(then_branch, &mut inner)
                } else if let Some(branch) = else_branch {
                    self.run(branch, &mut inner)
                } else {
                    Ok(())
                }
            }
            StmtKind::Import { path, alias } => self.exec_import(path, alias.as_deref(), scope),
            StmtKind::Def { name, body } => {
                let renderer = Renderer::new(body.clone(), self.file.clone());
                scope.set_function(name, Rc::new(renderer));
                Ok(())
            }
        }
    }

    fn exec_prop(&mut self, defs: &[PropDef], scope: &mut Scope<'_>) -> Result<(), Error> {
        for def in defs {
            // Exhausted arguments and an explicit `default` both read as "no
            // value"; a present non-number is a different failure below.
            let supplied = self.args.pop_front().flatten();
            let range = match &def.range {
                Some(r) => Some((
                    self.eval(&r.start, scope)?.as_number(),
                    self.eval(&r.end, scope)?.as_number(),
                )),
                None => None,
            };
            let value = match supplied {
                Some(Value::Number(n)) if n.is_finite() => Value::Number(n),
                other => {
                    if let Some(default) = &def.default {
                        self.eval(default, scope)?
                    } else if let Some(present) = other {
                        return Err(RenderError::InvalidValue {
                            value: present.to_string(),
                            line: def.loc.first_line,
                            column: def.loc.first_column,
                            file: self.file_name(),
                        }
                        .into());
                    } else {
                        let call_site = self.call_site.as_ref();
                        return Err(RenderError::MissingDefault {
                            name: def.name.clone(),
                            line: call_site.map(|c| c.loc.first_line),
                            column: call_site.map(|c| c.loc.first_column),
                            file: call_site.and_then(|c| c.file.as_deref().map(str::to_string)),
                        }
                        .into());
                    }
                }
            };
            let value = match range {
                Some((a, b)) => {
                    let (lo, hi) = (a.min(b), a.max(b));
                    Value::Number(value.as_number().min(hi).max(lo))
                }
                None => value,
            };
            scope.set(&def.name, value);
        }
        Ok(())
    }

    fn exec_command(
        &mut self,
        stmt: &Stmt,
        name: &str,
        args: &[Arg],
        scope: &mut Scope<'_>,
    ) -> Result<(), Error> {
        let Some(command) = scope.lookup_command(name) else {
            return Err(RenderError::UndefinedCommand {
                name: name.to_string(),
                line: stmt.loc.first_line,
                column: stmt.loc.first_column,
                file: self.file_name(),
            }
            .into());
        };
        trace!(command = name, args = args.len(), "dispatch");
        match command {
            Command::Builtin(op) => {
                // Zero-arity commands run once; their written arguments are
                // never evaluated.
                if op.arity == 0 {
                    self.out.push(op.letter);
                    return Ok(());
                }
                for chunk in args.chunks(op.arity) {
                    self.check_chunk(stmt, name, op.arity, chunk)?;
                    let mut values = Vec::with_capacity(op.arity);
                    for arg in chunk {
                        match arg {
                            Arg::Default(loc) => {
                                return Err(RenderError::IllegalDefault {
                                    name: name.to_string(),
                                    target: "command",
                                    line: loc.first_line,
                                    column: loc.first_column,
                                    file: self.file_name(),
                                }
                                .into());
                            }
                            Arg::Expr(e) => values.push(self.eval(e, scope)?),
                        }
                    }
                    emit_path(&mut self.out, op.letter, &values);
                }
                Ok(())
            }
            Command::User(renderer) => {
                let call_site = CallSite {
                    loc: stmt.loc,
                    file: self.file.clone(),
                };
                if renderer.arity() == 0 {
                    let rendered = invoke(
                        self.importer,
                        &renderer,
                        Vec::new(),
                        Some(&*scope),
                        Some(call_site),
                    )?;
                    self.out.push_str(&rendered);
                    return Ok(());
                }
                for chunk in args.chunks(renderer.arity()) {
                    self.check_chunk(stmt, name, renderer.arity(), chunk)?;
                    let mut values = Vec::with_capacity(renderer.arity());
                    for arg in chunk {
                        values.push(match arg {
                            Arg::Default(_) => None,
                            Arg::Expr(e) => Some(self.eval(e, scope)?),
                        });
                    }
                    let rendered = invoke(
                        self.importer,
                        &renderer,
                        values,
                        Some(&*scope),
                        Some(call_site.clone()),
                    )?;
                    self.out.push_str(&rendered);
                }
                Ok(())
            }
        }
    }

    fn check_chunk(
        &self,
        stmt: &Stmt,
        name: &str,
        required: usize,
        chunk: &[Arg],
    ) -> Result<(), Error> {
        if chunk.len() < required {
            return Err(RenderError::ArityMismatch {
                command: name.to_string(),
                required,
                present: chunk.len(),
                line: stmt.loc.last_line,
                column: stmt.loc.last_column,
                file: self.file_name(),
            }
            .into());
        }
        Ok(())
    }

    fn exec_import(
        &mut self,
        path: &Expr,
        alias: Option<&str>,
        scope: &mut Scope<'_>,
    ) -> Result<(), Error> {
        let target = self.eval(path, scope)?.to_string();
        let resolved = self.importer.resolve(self.file.as_deref(), &target);
        debug!(from = ?self.file_name(), %resolved, "import");
        let ast = match self.importer.load_ast(&resolved) {
            Some(ast) => ast,
            None => match self.importer.load_source(&resolved) {
                Some(source) => Rc::new(
                    crate::parse::parse(&source).map_err(|e| e.with_file(&resolved))?,
                ),
                None => {
                    return Err(RenderError::ImportNotFound {
                        path: resolved,
                        line: path.loc.first_line,
                        column: path.loc.first_column,
                        file: self.file_name(),
                    }
                    .into());
                }
            },
        };
        let name = alias
            .map(str::to_string)
            .unwrap_or_else(|| base_name(&resolved));
        let renderer = Renderer::new(ast, Some(Rc::from(resolved.as_str())));
        scope.set_function(&name, Rc::new(renderer));
        Ok(())
    }

    fn eval(&mut self, expr: &Expr, scope: &Scope<'_>) -> Result<Value, Error> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Var(name) => match scope.get(name) {
                Some(value) => Ok(value.clone()),
                None => Err(RenderError::UndefinedVariable {
                    name: name.clone(),
                    line: expr.loc.first_line,
                    column: expr.loc.first_column,
                    file: self.file_name(),
                }
                .into()),
            },
            ExprKind::Unary { op, operand } => {
                let v = self.eval(operand, scope)?.as_number();
                Ok(Value::Number(match op {
                    UnaryOp::Pos => v,
                    UnaryOp::Neg => -v,
                    // Not `v <= 0.0`: NaN is falsy, so its negation is 1.
                    UnaryOp::Not => truth(!(v > 0.0)),
                }))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                // Both sides always evaluate; `and`/`or` do not short-circuit.
                let l = self.eval(lhs, scope)?.as_number();
                let r = self.eval(rhs, scope)?.as_number();
                Ok(Value::Number(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Rem => l % r,
                    BinaryOp::Lt => truth(l < r),
                    BinaryOp::Gt => truth(l > r),
                    BinaryOp::Le => truth(l <= r),
                    BinaryOp::Ge => truth(l >= r),
                    BinaryOp::Eq => truth(l == r),
                    BinaryOp::And => truth(l > 0.0 && r > 0.0),
                    BinaryOp::Or => truth(l > 0.0 || r > 0.0),
                }))
            }
            ExprKind::Call { name, args } => self.eval_call(expr, name, args, scope),
        }
    }

    fn eval_call(
        &mut self,
        expr: &Expr,
        name: &str,
        args: &[Arg],
        scope: &Scope<'_>,
    ) -> Result<Value, Error> {
        let Some(function) = scope.lookup_function(name) else {
            return Err(RenderError::UndefinedFunction {
                name: name.to_string(),
                line: expr.loc.first_line,
                column: expr.loc.first_column,
                file: self.file_name(),
            }
            .into());
        };
        match function {
            Function::Builtin(f) => {
                if args.len() < f.arity() {
                    return Err(RenderError::ArityMismatch {
                        command: name.to_string(),
                        required: f.arity(),
                        present: args.len(),
                        line: expr.loc.first_line,
                        column: expr.loc.first_column,
                        file: self.file_name(),
                    }
                    .into());
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Arg::Default(loc) => {
                            return Err(RenderError::IllegalDefault {
                                name: name.to_string(),
                                target: "function",
                                line: loc.first_line,
                                column: loc.first_column,
                                file: self.file_name(),
                            }
                            .into());
                        }
                        Arg::Expr(e) => values.push(self.eval(e, scope)?.as_number()),
                    }
                }
                Ok(Value::Number(f.apply(&values)))
            }
            Function::User(renderer) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(match arg {
                        Arg::Default(_) => None,
                        Arg::Expr(e) => Some(self.eval(e, scope)?),
                    });
                }
                let rendered = invoke(
                    self.importer,
                    &renderer,
                    values,
                    Some(scope),
                    Some(CallSite {
                        loc: expr.loc,
                        file: self.file.clone(),
                    }),
                )?;
                self.out.push_str(&rendered);
                // A template call contributes output, not a numeric value.
                Ok(Value::Number(f64::NAN))
            }
        }
    }
}

/// `lib/arrow.min.path` imports as `arrow` when no alias is given.
fn base_name(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file.split('.').next().unwrap_or(file).to_string()
}

// ============================================================================
// Prop introspection
// ============================================================================

/// A template's positional parameter surface, for host introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct PropSignature {
    pub name: String,
    /// Evaluated, min/max-normalized clamping range.
    pub range: Option<(f64, f64)>,
    /// Evaluated default value.
    pub default: Option<Value>,
}

pub(crate) fn prop_signatures(
    importer: &dyn Importer,
    renderer: &Renderer,
) -> Result<Vec<PropSignature>, Error> {
    let mut frame = Frame {
        importer,
        file: renderer.file.clone(),
        call_site: None,
        args: VecDeque::new(),
        out: String::new(),
    };
    let scope = Scope::new(None);
    let mut signatures = Vec::new();
    for stmt in renderer.ast.iter() {
        let StmtKind::Prop(defs) = &stmt.kind else {
            continue;
        };
        for def in defs {
            let range = match &def.range {
                Some(r) => {
                    let a = frame.eval(&r.start, &scope)?.as_number();
                    let b = frame.eval(&r.end, &scope)?.as_number();
                    Some((a.min(b), a.max(b)))
                }
                None => None,
            };
            let default = match &def.default {
                Some(e) => Some(frame.eval(e, &scope)?),
                None => None,
            };
            signatures.push(PropSignature {
                name: def.name.clone(),
                range,
                default,
            });
        }
    }
    Ok(signatures)
}
