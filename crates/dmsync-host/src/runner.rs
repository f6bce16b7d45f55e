use crate::host::{format_number, HostFunctions, HostState, Val};
use crate::parser::{parse, BinOp, DeclType, Expr, Stmt, StmtKind, UnaryOp};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// How a statement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Exit,
}

#[derive(Debug)]
struct Slot {
    ty: DeclType,
    value: Val,
}

/// Tree-walking interpreter for one script execution.
pub(crate) struct Interpreter<'s> {
    state: &'s HostState,
    scopes: Vec<HashMap<String, Slot>>,
}

fn runtime(line: usize, message: impl Into<String>) -> Error {
    Error::Runtime {
        line,
        message: message.into(),
    }
}

/// Parse and run `src` against `state`.
pub(crate) fn run(state: &HostState, src: &str) -> Result<()> {
    let program = parse(src)?;
    Interpreter::new(state).run(&program)
}

impl<'s> Interpreter<'s> {
    pub(crate) fn new(state: &'s HostState) -> Self {
        Self {
            state,
            scopes: vec![HashMap::new()],
        }
    }

    pub(crate) fn run(&mut self, program: &[Stmt]) -> Result<()> {
        for stmt in program {
            match self.exec(stmt)? {
                Flow::Normal => {}
                Flow::Exit => {
                    tracing::debug!("script exited on line {}", stmt.line);
                    return Ok(());
                }
                Flow::Break | Flow::Continue => {
                    return Err(runtime(stmt.line, "break or continue outside of a loop"))
                }
            }
        }
        Ok(())
    }

    /// Run `f` in a fresh scope, dropping it even when `f` fails.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let depth = self.scopes.len();
        self.scopes.push(HashMap::new());
        let result = f(self);
        self.scopes.truncate(depth);
        result
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow> {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Decl(ty, vars) => {
                for (name, init) in vars {
                    let value = match init {
                        Some(expr) => self.eval(expr, line)?,
                        None => default_value(*ty),
                    };
                    self.declare(name, *ty, value, line)?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::Expr(Expr::Call(name, args)) if name == "exit" => {
                for arg in args {
                    self.eval(arg, line)?;
                }
                Ok(Flow::Exit)
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, line)?;
                Ok(Flow::Normal)
            }
            StmtKind::If(cond, then, otherwise) => {
                let cond = self.eval(cond, line)?;
                if truthy(&cond, line)? {
                    self.scoped(|this| this.exec(then))
                } else if let Some(otherwise) = otherwise {
                    self.scoped(|this| this.exec(otherwise))
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While(cond, body) => loop {
                let value = self.eval(cond, line)?;
                if !truthy(&value, line)? {
                    return Ok(Flow::Normal);
                }
                match self.scoped(|this| this.exec(body))? {
                    Flow::Break => return Ok(Flow::Normal),
                    Flow::Exit => return Ok(Flow::Exit),
                    Flow::Normal | Flow::Continue => {}
                }
            },
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.exec(init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        let value = this.eval(cond, line)?;
                        if !truthy(&value, line)? {
                            return Ok(Flow::Normal);
                        }
                    }
                    match this.scoped(|this| this.exec(body))? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Exit => return Ok(Flow::Exit),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(step) = step {
                        this.eval(step, line)?;
                    }
                }
            }),
            StmtKind::Block(stmts) => self.scoped(|this| {
                for stmt in stmts {
                    match this.exec(stmt)? {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }),
            StmtKind::Try(body, catch) => match self.exec(body) {
                Ok(flow) => Ok(flow),
                Err(err @ (Error::Thrown(_) | Error::Runtime { .. })) => {
                    tracing::debug!("caught on line {}: {}", line, err);
                    // `break` leaves the catch block
                    match self.exec(catch)? {
                        Flow::Break => Ok(Flow::Normal),
                        flow => Ok(flow),
                    }
                }
                Err(err) => Err(err),
            },
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Empty => Ok(Flow::Normal),
        }
    }

    fn declare(&mut self, name: &str, ty: DeclType, value: Val, line: usize) -> Result<()> {
        let value = coerce(ty, value).map_err(|msg| runtime(line, format!("{name}: {msg}")))?;
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| runtime(line, "no scope"))?;
        if scope.contains_key(name) {
            return Err(runtime(line, format!("variable {name} is already declared")));
        }
        scope.insert(name.to_string(), Slot { ty, value });
        Ok(())
    }

    fn slot(&mut self, name: &str, line: usize) -> Result<&mut Slot> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .ok_or_else(|| runtime(line, format!("unknown variable {name}")))
    }

    fn assign(&mut self, name: &str, value: Val, line: usize) -> Result<Val> {
        let slot = self.slot(name, line)?;
        let value = coerce(slot.ty, value).map_err(|msg| runtime(line, format!("{name}: {msg}")))?;
        slot.value = value.clone();
        Ok(value)
    }

    fn eval(&mut self, expr: &Expr, line: usize) -> Result<Val> {
        match expr {
            Expr::Number(x) => Ok(Val::Num(*x)),
            Expr::Str(s) => Ok(Val::Str(s.clone())),
            Expr::Var(name) => Ok(self.slot(name, line)?.value.clone()),
            Expr::Unary(op, inner) => {
                let value = self.eval(inner, line)?;
                match op {
                    UnaryOp::Neg => match value {
                        Val::Num(x) => Ok(Val::Num(-x)),
                        other => Err(runtime(
                            line,
                            format!("cannot negate a {}", other.type_name()),
                        )),
                    },
                    UnaryOp::Not => Ok(Val::bool(!truthy(&value, line)?)),
                }
            }
            Expr::Binary(BinOp::And, lhs, rhs) => {
                let lhs = self.eval(lhs, line)?;
                if !truthy(&lhs, line)? {
                    return Ok(Val::bool(false));
                }
                let rhs = self.eval(rhs, line)?;
                Ok(Val::bool(truthy(&rhs, line)?))
            }
            Expr::Binary(BinOp::Or, lhs, rhs) => {
                let lhs = self.eval(lhs, line)?;
                if truthy(&lhs, line)? {
                    return Ok(Val::bool(true));
                }
                let rhs = self.eval(rhs, line)?;
                Ok(Val::bool(truthy(&rhs, line)?))
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, line)?;
                let rhs = self.eval(rhs, line)?;
                binary(*op, lhs, rhs).map_err(|msg| runtime(line, msg))
            }
            Expr::Ternary(cond, then, otherwise) => {
                let cond = self.eval(cond, line)?;
                if truthy(&cond, line)? {
                    self.eval(then, line)
                } else {
                    self.eval(otherwise, line)
                }
            }
            Expr::Assign(name, op, rhs) => {
                let mut value = self.eval(rhs, line)?;
                if let Some(op) = op {
                    let current = self.slot(name, line)?.value.clone();
                    value = binary(*op, current, value).map_err(|msg| runtime(line, msg))?;
                }
                self.assign(name, value, line)
            }
            Expr::Step {
                name,
                delta,
                prefix,
            } => {
                let old = match &self.slot(name, line)?.value {
                    Val::Num(x) => *x,
                    other => {
                        return Err(runtime(
                            line,
                            format!("cannot increment a {}", other.type_name()),
                        ))
                    }
                };
                let new = self.assign(name, Val::Num(old + delta), line)?;
                Ok(if *prefix { new } else { Val::Num(old) })
            }
            Expr::Call(name, args) => self.call(name, args, line),
        }
    }

    fn call(&mut self, name: &str, args: &[Expr], line: usize) -> Result<Val> {
        match name {
            "throw" => {
                let message = match args {
                    [] => String::from("script threw"),
                    [arg] => self.eval(arg, line)?.to_string(),
                    _ => return Err(runtime(line, "throw takes one argument")),
                };
                tracing::warn!("script threw on line {}: {}", line, message);
                return Err(Error::Thrown(message));
            }
            "exit" => return Err(runtime(line, "exit must be used as a statement")),
            _ => {}
        }

        if HostFunctions::is_getter(name) {
            let Some((Expr::Var(target), inputs)) = args.split_last() else {
                return Err(runtime(
                    line,
                    format!("{name} needs a variable as its last argument"),
                ));
            };
            let inputs = inputs
                .iter()
                .map(|arg| self.eval(arg, line))
                .collect::<Result<Vec<_>>>()?;
            let found = HostFunctions::get(name, &inputs).map_err(|msg| runtime(line, msg))?;
            return match found {
                Some(value) => {
                    self.assign(target, value, line)?;
                    Ok(Val::bool(true))
                }
                None => Ok(Val::bool(false)),
            };
        }

        let values = args
            .iter()
            .map(|arg| self.eval(arg, line))
            .collect::<Result<Vec<_>>>()?;
        HostFunctions::call(self.state, name, &values).map_err(|msg| runtime(line, msg))
    }
}

fn default_value(ty: DeclType) -> Val {
    match ty {
        DeclType::Number => Val::Num(0.0),
        DeclType::String => Val::Str(String::new()),
        DeclType::TagGroup => Val::Invalid,
    }
}

/// Convert `value` for storage in a variable of type `ty`.
fn coerce(ty: DeclType, value: Val) -> std::result::Result<Val, String> {
    match (ty, value) {
        (DeclType::Number, value @ Val::Num(_)) => Ok(value),
        (DeclType::String, value @ Val::Str(_)) => Ok(value),
        (DeclType::String, Val::Num(x)) => Ok(Val::Str(format_number(x))),
        (DeclType::TagGroup, value @ (Val::Group(_) | Val::Invalid)) => Ok(value),
        (ty, value) => Err(format!(
            "cannot assign a {} to a {} variable",
            value.type_name(),
            ty.keyword()
        )),
    }
}

fn truthy(value: &Val, line: usize) -> Result<bool> {
    match value {
        Val::Num(x) => Ok(*x != 0.0),
        Val::Group(_) => Ok(true),
        Val::Invalid => Ok(false),
        Val::Str(_) => Err(runtime(line, "a string cannot be used as a condition")),
    }
}

fn binary(op: BinOp, lhs: Val, rhs: Val) -> std::result::Result<Val, String> {
    match (op, lhs, rhs) {
        (BinOp::Add, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a + b)),
        (BinOp::Add, a @ (Val::Str(_) | Val::Num(_)), b @ (Val::Str(_) | Val::Num(_))) => {
            Ok(Val::Str(format!("{a}{b}")))
        }
        (BinOp::Sub, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a - b)),
        (BinOp::Mul, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a * b)),
        (BinOp::Div, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a / b)),
        (BinOp::Rem, Val::Num(a), Val::Num(b)) => Ok(Val::Num(a % b)),
        (BinOp::Eq | BinOp::Ne, a, b) => {
            let equal = match (&a, &b) {
                (Val::Num(x), Val::Num(y)) => x == y,
                (Val::Str(x), Val::Str(y)) => x == y,
                (Val::Group(x), Val::Group(y)) => Arc::ptr_eq(x, y),
                (Val::Invalid, Val::Invalid) => true,
                _ => {
                    return Err(format!(
                        "cannot compare a {} with a {}",
                        a.type_name(),
                        b.type_name()
                    ))
                }
            };
            Ok(Val::bool(equal == (op == BinOp::Eq)))
        }
        (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge, a, b) => {
            let ordering = match (&a, &b) {
                (Val::Num(x), Val::Num(y)) => x.partial_cmp(y),
                (Val::Str(x), Val::Str(y)) => Some(x.cmp(y)),
                _ => {
                    return Err(format!(
                        "cannot order a {} and a {}",
                        a.type_name(),
                        b.type_name()
                    ))
                }
            };
            let result = ordering.is_some_and(|ord| match op {
                BinOp::Lt => ord.is_lt(),
                BinOp::Le => ord.is_le(),
                BinOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            });
            Ok(Val::bool(result))
        }
        (op, a, b) => Err(format!(
            "operator {op:?} does not apply to a {} and a {}",
            a.type_name(),
            b.type_name()
        )),
    }
}
