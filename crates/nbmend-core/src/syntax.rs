//! Python syntax checking for code cells.
//!
//! A cell is parsed into a module AST, then the AST is scanned for the
//! target and call-argument rules CPython enforces at parse time but this
//! grammar leaves to later passes. Duplicate parameter and keyword names
//! are the opposite case: CPython only rejects them when compiling, so
//! they are renamed and the cell is parsed again.

use rustpython_parser::ast::{self, Constant, Expr, Ranged, Stmt};
use rustpython_parser::lexer::LexicalErrorType;
use rustpython_parser::text_size::TextSize;
use rustpython_parser::{Parse, ParseErrorType};
use tracing::debug;

use crate::diagnostic::{Diagnostic, ValidationReport};
use crate::notebook::Notebook;

/// Prefix spliced in front of a repeated parameter or keyword name.
const RENAME_PREFIX: &str = "__nbmend_dup_";
const MAX_RENAMES: usize = 64;

/// A parse failure located within a single source blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxFault {
    /// 1-indexed line.
    pub line: usize,
    /// 1-indexed column, counted in characters.
    pub offset: usize,
    pub message: String,
    /// The failing line, stripped.
    pub text: String,
}

/// Parse `source` as a Python module, returning the first fault if any.
pub fn check_source(source: &str) -> Option<SyntaxFault> {
    let (at, message) = match parse_module(source) {
        Ok(parsed) => {
            let (at, message) = TargetCheck::first_fault(&parsed.text, &parsed.suite)?;
            (parsed.renames.to_original(at), message)
        }
        Err(fault) => fault,
    };
    Some(fault_at(source, at, message))
}

/// Module AST along with the text it was parsed from.
struct Parsed {
    suite: ast::Suite,
    text: String,
    renames: Renames,
}

/// Parse, renaming repeated parameter and keyword names until the grammar
/// accepts the text. Errors carry a byte offset into the original source.
fn parse_module(source: &str) -> Result<Parsed, (usize, String)> {
    let mut text = source.to_string();
    let mut renames = Renames::default();

    loop {
        let err = match ast::Suite::parse(&text, "<cell>") {
            Ok(suite) => {
                return Ok(Parsed {
                    suite,
                    text,
                    renames,
                })
            }
            Err(err) => err,
        };

        let at = u32::from(err.offset) as usize;
        if is_compile_time_check(&err.error) && renames.len() < MAX_RENAMES {
            if let Some(name_at) = name_start(&text, at) {
                text.insert_str(name_at, RENAME_PREFIX);
                renames.insert(name_at);
                continue;
            }
        }
        return Err((renames.to_original(at), err.error.to_string()));
    }
}

fn is_compile_time_check(error: &ParseErrorType) -> bool {
    matches!(
        error,
        ParseErrorType::Lexical(
            LexicalErrorType::DuplicateArgumentError(_)
                | LexicalErrorType::DuplicateKeywordArgumentError(_)
        )
    )
}

/// Byte position of the identifier reported at `at`, skipping any `*`.
fn name_start(text: &str, at: usize) -> Option<usize> {
    let (skip, first) = text
        .get(at..)?
        .char_indices()
        .find(|(_, c)| *c != '*' && !c.is_whitespace())?;
    (first == '_' || first.is_alphabetic()).then_some(at + skip)
}

/// Positions in the patched text where [`RENAME_PREFIX`] was inserted.
#[derive(Debug, Default)]
struct Renames(Vec<usize>);

impl Renames {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn insert(&mut self, at: usize) {
        for pos in self.0.iter_mut().filter(|pos| **pos >= at) {
            *pos += RENAME_PREFIX.len();
        }
        self.0.push(at);
    }

    /// Map a byte offset in the patched text back onto the original.
    fn to_original(&self, offset: usize) -> usize {
        let shift: usize = self
            .0
            .iter()
            .filter(|pos| **pos < offset)
            .map(|pos| (offset - pos).min(RENAME_PREFIX.len()))
            .sum();
        offset - shift
    }
}

/// Build a fault at `byte_offset`, pulling an EOF position back onto the
/// last line that has code.
fn fault_at(source: &str, byte_offset: usize, message: String) -> SyntaxFault {
    let (mut line, mut offset) = locate(source, byte_offset);
    let lines: Vec<&str> = source.lines().collect();

    if let Some(last) = lines.iter().rposition(|l| !l.trim().is_empty()) {
        if line > last + 1 {
            line = last + 1;
            offset = lines[last].trim_end().chars().count() + 1;
        }
    }

    let text = lines
        .get(line - 1)
        .map(|l| l.trim())
        .unwrap_or_default()
        .to_string();

    SyntaxFault {
        line,
        offset,
        message,
        text,
    }
}

/// Walks a module for targets and call arguments CPython refuses to parse.
/// Keeps the fault closest to the start of the text.
struct TargetCheck<'a> {
    text: &'a str,
    first: Option<(usize, String)>,
}

impl<'a> TargetCheck<'a> {
    fn first_fault(text: &'a str, suite: &[Stmt]) -> Option<(usize, String)> {
        let mut check = Self { text, first: None };
        check.body(suite);
        check.first
    }

    fn flag(&mut self, at: TextSize, message: String) {
        let at = u32::from(at) as usize;
        if self.first.as_ref().map_or(true, |(seen, _)| at < *seen) {
            self.first = Some((at, message));
        }
    }

    fn body(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef(ast::StmtFunctionDef {
                args,
                body,
                decorator_list,
                returns,
                ..
            })
            | Stmt::AsyncFunctionDef(ast::StmtAsyncFunctionDef {
                args,
                body,
                decorator_list,
                returns,
                ..
            }) => {
                self.exprs(decorator_list);
                self.arguments(args);
                self.opt_expr(returns.as_deref());
                self.body(body);
            }
            Stmt::ClassDef(ast::StmtClassDef {
                bases,
                keywords,
                body,
                decorator_list,
                ..
            }) => {
                self.exprs(decorator_list);
                self.exprs(bases);
                for keyword in keywords {
                    self.expr(&keyword.value);
                }
                self.body(body);
            }
            Stmt::Return(ast::StmtReturn { value, .. }) => self.opt_expr(value.as_deref()),
            Stmt::Delete(ast::StmtDelete { targets, .. }) => {
                for target in targets {
                    if let Some(bad) = invalid_target(target, true) {
                        self.flag(bad.start(), format!("cannot delete {}", describe(bad)));
                    }
                    self.expr(target);
                }
            }
            Stmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                for target in targets {
                    self.assign_target(target);
                    self.expr(target);
                }
                self.expr(value);
            }
            Stmt::AugAssign(ast::StmtAugAssign { target, value, .. }) => {
                if !is_single_target(target) {
                    self.flag(
                        target.start(),
                        format!(
                            "'{}' is an illegal expression for augmented assignment",
                            describe(target)
                        ),
                    );
                }
                self.expr(target);
                self.expr(value);
            }
            Stmt::AnnAssign(ast::StmtAnnAssign {
                target,
                annotation,
                value,
                ..
            }) => {
                let message = match &**target {
                    t if is_single_target(t) => None,
                    Expr::Tuple(_) => Some("only single target (not tuple) can be annotated"),
                    Expr::List(_) => Some("only single target (not list) can be annotated"),
                    _ => Some("illegal target for annotation"),
                };
                if let Some(message) = message {
                    self.flag(target.start(), message.to_string());
                }
                self.expr(target);
                self.expr(annotation);
                self.opt_expr(value.as_deref());
            }
            Stmt::For(ast::StmtFor {
                target,
                iter,
                body,
                orelse,
                ..
            })
            | Stmt::AsyncFor(ast::StmtAsyncFor {
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                self.assign_target(target);
                self.expr(target);
                self.expr(iter);
                self.body(body);
                self.body(orelse);
            }
            Stmt::While(ast::StmtWhile {
                test, body, orelse, ..
            })
            | Stmt::If(ast::StmtIf {
                test, body, orelse, ..
            }) => {
                self.expr(test);
                self.body(body);
                self.body(orelse);
            }
            Stmt::With(ast::StmtWith { items, body, .. })
            | Stmt::AsyncWith(ast::StmtAsyncWith { items, body, .. }) => {
                for item in items {
                    self.expr(&item.context_expr);
                    if let Some(vars) = item.optional_vars.as_deref() {
                        self.assign_target(vars);
                        self.expr(vars);
                    }
                }
                self.body(body);
            }
            Stmt::Match(ast::StmtMatch { subject, cases, .. }) => {
                self.expr(subject);
                for case in cases {
                    self.opt_expr(case.guard.as_deref());
                    self.body(&case.body);
                }
            }
            Stmt::Raise(ast::StmtRaise { exc, cause, .. }) => {
                self.opt_expr(exc.as_deref());
                self.opt_expr(cause.as_deref());
            }
            Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            })
            | Stmt::TryStar(ast::StmtTryStar {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            }) => {
                self.body(body);
                for ast::ExceptHandler::ExceptHandler(handler) in handlers {
                    self.opt_expr(handler.type_.as_deref());
                    self.body(&handler.body);
                }
                self.body(orelse);
                self.body(finalbody);
            }
            Stmt::Assert(ast::StmtAssert { test, msg, .. }) => {
                self.expr(test);
                self.opt_expr(msg.as_deref());
            }
            Stmt::Expr(ast::StmtExpr { value, .. }) => self.expr(value),
            _ => {}
        }
    }

    fn assign_target(&mut self, target: &Expr) {
        if let Some(bad) = invalid_target(target, false) {
            self.flag(bad.start(), format!("cannot assign to {}", describe(bad)));
        }
    }

    fn arguments(&mut self, args: &ast::Arguments) {
        for arg in args
            .posonlyargs
            .iter()
            .chain(&args.args)
            .chain(&args.kwonlyargs)
        {
            self.opt_expr(arg.default.as_deref());
        }
    }

    fn comprehensions(&mut self, generators: &[ast::Comprehension]) {
        for comp in generators {
            self.assign_target(&comp.target);
            self.expr(&comp.target);
            self.expr(&comp.iter);
            self.exprs(&comp.ifs);
        }
    }

    fn exprs(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.expr(expr);
        }
    }

    fn opt_expr(&mut self, expr: Option<&Expr>) {
        if let Some(expr) = expr {
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call(ast::ExprCall {
                func,
                args,
                keywords,
                ..
            }) => {
                if args.len() + keywords.len() > 1 {
                    for arg in args {
                        if let Expr::GeneratorExp(genexp) = arg {
                            if !self.parenthesized(genexp.range.start(), genexp.range.end()) {
                                self.flag(
                                    genexp.range.start(),
                                    "Generator expression must be parenthesized".to_string(),
                                );
                            }
                        }
                    }
                }
                self.expr(func);
                self.exprs(args);
                for keyword in keywords {
                    self.expr(&keyword.value);
                }
            }
            Expr::ListComp(ast::ExprListComp {
                elt, generators, ..
            })
            | Expr::SetComp(ast::ExprSetComp {
                elt, generators, ..
            })
            | Expr::GeneratorExp(ast::ExprGeneratorExp {
                elt, generators, ..
            }) => {
                self.expr(elt);
                self.comprehensions(generators);
            }
            Expr::DictComp(ast::ExprDictComp {
                key,
                value,
                generators,
                ..
            }) => {
                self.expr(key);
                self.expr(value);
                self.comprehensions(generators);
            }
            Expr::BoolOp(ast::ExprBoolOp { values, .. }) => self.exprs(values),
            Expr::NamedExpr(ast::ExprNamedExpr { value, .. }) => self.expr(value),
            Expr::BinOp(ast::ExprBinOp { left, right, .. }) => {
                self.expr(left);
                self.expr(right);
            }
            Expr::UnaryOp(ast::ExprUnaryOp { operand, .. }) => self.expr(operand),
            Expr::Lambda(ast::ExprLambda { args, body, .. }) => {
                self.arguments(args);
                self.expr(body);
            }
            Expr::IfExp(ast::ExprIfExp {
                test, body, orelse, ..
            }) => {
                self.expr(test);
                self.expr(body);
                self.expr(orelse);
            }
            Expr::Dict(ast::ExprDict { keys, values, .. }) => {
                for key in keys.iter().flatten() {
                    self.expr(key);
                }
                self.exprs(values);
            }
            Expr::Set(ast::ExprSet { elts, .. })
            | Expr::List(ast::ExprList { elts, .. })
            | Expr::Tuple(ast::ExprTuple { elts, .. }) => self.exprs(elts),
            Expr::JoinedStr(ast::ExprJoinedStr { values, .. }) => self.exprs(values),
            Expr::FormattedValue(ast::ExprFormattedValue {
                value, format_spec, ..
            }) => {
                self.expr(value);
                self.opt_expr(format_spec.as_deref());
            }
            Expr::Await(ast::ExprAwait { value, .. })
            | Expr::YieldFrom(ast::ExprYieldFrom { value, .. })
            | Expr::Attribute(ast::ExprAttribute { value, .. })
            | Expr::Starred(ast::ExprStarred { value, .. }) => self.expr(value),
            Expr::Yield(ast::ExprYield { value, .. }) => self.opt_expr(value.as_deref()),
            Expr::Compare(ast::ExprCompare {
                left, comparators, ..
            }) => {
                self.expr(left);
                self.exprs(comparators);
            }
            Expr::Subscript(ast::ExprSubscript { value, slice, .. }) => {
                self.expr(value);
                self.expr(slice);
            }
            Expr::Slice(ast::ExprSlice {
                lower, upper, step, ..
            }) => {
                self.opt_expr(lower.as_deref());
                self.opt_expr(upper.as_deref());
                self.opt_expr(step.as_deref());
            }
            Expr::Name(_) | Expr::Constant(_) => {}
        }
    }

    /// Whether the text spanning `start..end` is wrapped in its own parens.
    fn parenthesized(&self, start: TextSize, end: TextSize) -> bool {
        self.text
            .get(u32::from(start) as usize..u32::from(end) as usize)
            .map_or(false, |span| span.starts_with('(') && span.ends_with(')'))
    }
}

fn is_single_target(expr: &Expr) -> bool {
    matches!(expr, Expr::Name(_) | Expr::Attribute(_) | Expr::Subscript(_))
}

/// First sub-expression of `target` that cannot be bound (or deleted).
fn invalid_target(target: &Expr, deleting: bool) -> Option<&Expr> {
    match target {
        t if is_single_target(t) => None,
        Expr::Starred(ast::ExprStarred { value, .. }) if !deleting => {
            invalid_target(value, deleting)
        }
        Expr::Tuple(ast::ExprTuple { elts, .. }) | Expr::List(ast::ExprList { elts, .. }) => {
            elts.iter().find_map(|elt| invalid_target(elt, deleting))
        }
        other => Some(other),
    }
}

/// CPython's name for an expression kind in target errors.
fn describe(expr: &Expr) -> &'static str {
    match expr {
        Expr::Constant(ast::ExprConstant { value, .. }) => match value {
            Constant::None => "None",
            Constant::Bool(true) => "True",
            Constant::Bool(false) => "False",
            Constant::Ellipsis => "ellipsis",
            _ => "literal",
        },
        Expr::Call(_) => "function call",
        Expr::BoolOp(_) | Expr::BinOp(_) | Expr::UnaryOp(_) => "expression",
        Expr::Compare(_) => "comparison",
        Expr::IfExp(_) => "conditional expression",
        Expr::NamedExpr(_) => "named expression",
        Expr::Lambda(_) => "lambda",
        Expr::GeneratorExp(_) => "generator expression",
        Expr::ListComp(_) => "list comprehension",
        Expr::SetComp(_) => "set comprehension",
        Expr::DictComp(_) => "dict comprehension",
        Expr::Dict(_) => "dict literal",
        Expr::Set(_) => "set display",
        Expr::Await(_) => "await expression",
        Expr::Yield(_) | Expr::YieldFrom(_) => "yield expression",
        Expr::JoinedStr(_) | Expr::FormattedValue(_) => "f-string expression",
        Expr::Starred(_) => "starred",
        Expr::Tuple(_) => "tuple",
        Expr::List(_) => "list",
        Expr::Attribute(_) => "attribute",
        Expr::Subscript(_) => "subscript",
        Expr::Name(_) => "name",
        Expr::Slice(_) => "slice",
    }
}

/// Check every code cell, aggregating one diagnostic per failing cell.
///
/// Blank and whitespace-only cells are skipped.
pub fn check_cells(notebook: &Notebook) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (index, cell) in notebook.code_cells() {
        let source = cell.source.text();
        if source.trim().is_empty() {
            continue;
        }
        if let Some(fault) = check_source(&source) {
            debug!(cell = index, line = fault.line, offset = fault.offset, "syntax error");
            report.push(Diagnostic::in_cell(
                index,
                fault.line,
                fault.offset,
                fault.message,
                fault.text,
            ));
        }
    }

    report
}

/// Convert a byte offset into a 1-based `(line, column)` pair.
fn locate(source: &str, byte_offset: usize) -> (usize, usize) {
    let mut at = byte_offset.min(source.len());
    while !source.is_char_boundary(at) {
        at -= 1;
    }
    let before = &source[..at];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}
