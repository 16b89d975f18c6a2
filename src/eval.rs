use std::collections::HashMap;
use std::io;
use std::io::prelude::*;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::ast::{BinaryOp, ClassDecl, Expr, Literal, LogicalOp, Name, Stmt, UnaryOp};
use crate::callable::{natives, Callable, Function, FunctionKind};
use crate::class::{Class, Property};
use crate::config::{Config, ErrorPolicy};
use crate::ctx::Context;
use crate::diag::Position;
use crate::env::Env;
use crate::gc::Heap;
use crate::interner::Symbol;
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;

/// Error raised while executing a program, with the line of the offending construct.
#[derive(Debug, Error)]
#[error("[line {line}] {kind}")]
pub struct RuntimeError {
    pub line: Position,
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    pub fn new(line: Position, kind: RuntimeErrorKind) -> RuntimeError {
        RuntimeError { line, kind }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    OperandsMustBeNumbersOrStrings,
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("Only instances have properties.")]
    OnlyInstancesHaveProperties,
    #[error("Only instances have fields.")]
    OnlyInstancesHaveFields,
    #[error("Superclass must be a class.")]
    SuperclassMustBeClass,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Undefined property '{name}' on {class} instance.")]
    UndefinedProperty { name: String, class: String },
    #[error("Expected {expected} arguments but got {found}.")]
    Arity { expected: usize, found: usize },
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a statement completed.
#[derive(Debug, PartialEq)]
pub enum Flow {
    Normal,
    /// A `return` is unwinding to the innermost call.
    Return(Value),
}

#[derive(Debug)]
pub struct Evaluator<'t, W: Write> {
    output: &'t mut W,
    pub(crate) heap: Heap,
    global: Rc<Env>,
    config: Config,
    depth: usize,
    pub(crate) this_sym: Symbol,
    super_sym: Symbol,
    init_sym: Symbol,
}

impl<'t, W: Write> Evaluator<'t, W> {
    pub fn new(output: &'t mut W, ctx: &Context, config: Config) -> Evaluator<'t, W> {
        let mut heap = Heap::new();
        let global = heap.scope(None);
        for native in natives() {
            global.define(
                ctx.symbol(native.name),
                Value::Callable(Callable::Native(Rc::new(native))),
            );
        }
        Evaluator {
            output,
            heap,
            global,
            config,
            depth: 0,
            this_sym: ctx.symbol("this"),
            super_sym: ctx.symbol("super"),
            init_sym: ctx.symbol("init"),
        }
    }

    /// Execute top-level statements in the global scope, skipping those the parser discarded.
    ///
    /// Each failing statement contributes one error.  Whether execution goes on after the first
    /// one depends on the configured `ErrorPolicy`.
    #[instrument(level = "debug", skip_all, fields(statements = program.len()))]
    pub fn execute_program(&mut self, program: &[Option<Stmt>]) -> Result<(), Vec<RuntimeError>> {
        let global = self.global.clone();
        let mut errors = vec![];
        for stmt in program.iter().flatten() {
            if let Err(e) = self.exec(stmt, &global) {
                debug!(line = e.line, error = %e.kind, "runtime error");
                errors.push(e);
                if self.config.on_runtime_error == ErrorPolicy::Halt {
                    break;
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Run `stmts` in `env`, stopping at the first `return`.
    pub(crate) fn execute_block(
        &mut self,
        stmts: &[Stmt],
        env: &Rc<Env>,
    ) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt, env)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn enter_call(&mut self, line: Position) -> Result<(), RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::new(line, RuntimeErrorKind::StackOverflow));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        self.depth -= 1;
    }

    fn exec(&mut self, stmt: &Stmt, env: &Rc<Env>) -> Result<Flow, RuntimeError> {
        // No scope or instance is borrowed between statements.
        self.heap.maybe_collect();
        ensure_sufficient_stack(|| self.exec_stmt(stmt, env))
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Rc<Env>) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Expr(e) => {
                self.eval(e, env)?;
            }
            Stmt::Print(line, e) => {
                let v = self.eval(e, env)?;
                writeln!(self.output, "{}", v).map_err(|e| RuntimeError::new(*line, e.into()))?;
            }
            Stmt::Var(name, init) => {
                // The initializer cannot see the variable it initializes.
                let v = match init {
                    Some(e) => self.eval(e, env)?,
                    None => Value::Nil,
                };
                env.define(name.sym.clone(), v);
            }
            Stmt::Block(stmts) => {
                let scope = self.heap.scope(Some(env));
                return self.execute_block(stmts, &scope);
            }
            Stmt::If(cond, then_branch, else_branch) => {
                if self.eval(cond, env)?.is_truthy() {
                    return self.exec(then_branch, env);
                } else if let Some(else_branch) = else_branch {
                    return self.exec(else_branch, env);
                }
            }
            Stmt::While(cond, body) => {
                while self.eval(cond, env)?.is_truthy() {
                    if let Flow::Return(value) = self.exec(body, env)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Function(decl) => {
                debug!(name = %decl.name.sym, line = decl.name.line, "declare function");
                let function = Function::new(decl.clone(), env.clone(), FunctionKind::Function);
                env.define(
                    decl.name.sym.clone(),
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(e) => self.eval(e, env)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Class(decl) => self.declare_class(decl, env)?,
        };
        Ok(Flow::Normal)
    }

    fn declare_class(&mut self, decl: &ClassDecl, env: &Rc<Env>) -> Result<(), RuntimeError> {
        debug!(name = %decl.name.sym, line = decl.name.line, "declare class");
        env.define(decl.name.sym.clone(), Value::Nil);

        let superclass = match &decl.superclass {
            Some(name) => match self.lookup(&name.sym, name.line, env)? {
                Value::Callable(Callable::Class(class)) => Some(class),
                _ => {
                    return Err(RuntimeError::new(
                        name.line,
                        RuntimeErrorKind::SuperclassMustBeClass,
                    ))
                }
            },
            None => None,
        };

        let method_env = match &superclass {
            Some(superclass) => {
                let scope = self.heap.scope(Some(env));
                scope.define(
                    self.super_sym.clone(),
                    Value::Callable(Callable::Class(superclass.clone())),
                );
                scope
            }
            None => env.clone(),
        };

        let methods = decl
            .methods
            .iter()
            .map(|method| {
                let kind = if method.name.sym == self.init_sym {
                    FunctionKind::Initializer
                } else {
                    FunctionKind::Method
                };
                let function = Function::new(method.clone(), method_env.clone(), kind);
                (method.name.sym.clone(), Rc::new(function))
            })
            .collect::<HashMap<_, _>>();

        let class = Class::new(decl.name.sym.clone(), superclass, methods, &self.init_sym);
        env.define(
            decl.name.sym.clone(),
            Value::Callable(Callable::Class(Rc::new(class))),
        );
        Ok(())
    }

    fn eval(&mut self, expr: &Expr, env: &Rc<Env>) -> Result<Value, RuntimeError> {
        ensure_sufficient_stack(|| self.eval_expr(expr, env))
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Rc<Env>) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Nil => Value::Nil,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Group(e) => self.eval(e, env),
            Expr::Unary(op, operand, line) => {
                let v = self.eval(operand, env)?;
                match (op, v) {
                    (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Negate, _) => Err(RuntimeError::new(
                        *line,
                        RuntimeErrorKind::OperandMustBeNumber,
                    )),
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
                }
            }
            Expr::Binary(lhs, op, rhs, line) => {
                let l = self.eval(lhs, env)?;
                let r = self.eval(rhs, env)?;
                binary(l, *op, r).map_err(|kind| RuntimeError::new(*line, kind))
            }
            Expr::Logical(lhs, op, rhs) => {
                let l = self.eval(lhs, env)?;
                match (op, l.is_truthy()) {
                    (LogicalOp::Or, true) | (LogicalOp::And, false) => Ok(l),
                    _ => self.eval(rhs, env),
                }
            }
            Expr::Var(name) => self.lookup(&name.sym, name.line, env),
            Expr::Assign(name, rhs) => {
                let v = self.eval(rhs, env)?;
                env.assign(&name.sym, v.clone()).map_err(|e| {
                    RuntimeError::new(
                        name.line,
                        RuntimeErrorKind::UndefinedVariable(e.0.name().to_owned()),
                    )
                })?;
                Ok(v)
            }
            Expr::Call(callee, args, line) => self.call(callee, args, *line, env),
            Expr::Get(object, name) => self.get_property(object, name, env),
            Expr::Set(object, name, rhs) => {
                let Value::Instance(instance) = self.eval(object, env)? else {
                    return Err(RuntimeError::new(
                        name.line,
                        RuntimeErrorKind::OnlyInstancesHaveFields,
                    ));
                };
                let v = self.eval(rhs, env)?;
                instance.borrow_mut().set(name.sym.clone(), v.clone());
                Ok(v)
            }
            Expr::This(line) => {
                let this = self.this_sym.clone();
                self.lookup(&this, *line, env)
            }
            Expr::Super(line, method) => {
                let bound = self.super_method(*line, method, env)?;
                Ok(Value::Callable(Callable::Function(Rc::new(bound))))
            }
        }
    }

    fn lookup(&self, sym: &Symbol, line: Position, env: &Env) -> Result<Value, RuntimeError> {
        env.get(sym).ok_or_else(|| {
            RuntimeError::new(
                line,
                RuntimeErrorKind::UndefinedVariable(sym.name().to_owned()),
            )
        })
    }

    /// Evaluate `object.name`.  A method comes back bound to the instance.
    fn get_property(
        &mut self,
        object: &Expr,
        name: &Name,
        env: &Rc<Env>,
    ) -> Result<Value, RuntimeError> {
        let Value::Instance(instance) = self.eval(object, env)? else {
            return Err(RuntimeError::new(
                name.line,
                RuntimeErrorKind::OnlyInstancesHaveProperties,
            ));
        };
        let property = instance.borrow().get(&name.sym);
        match property {
            Some(Property::Field(v)) => Ok(v),
            Some(Property::Method(method)) => {
                let bound = method.bind(instance, &mut self.heap, &self.this_sym);
                Ok(Value::Callable(Callable::Function(Rc::new(bound))))
            }
            None => Err(RuntimeError::new(
                name.line,
                RuntimeErrorKind::UndefinedProperty {
                    name: name.sym.name().to_owned(),
                    class: instance.borrow().class.name.name().to_owned(),
                },
            )),
        }
    }

    /// Resolve `super.method` to the superclass method bound to the current receiver.
    fn super_method(
        &mut self,
        line: Position,
        method: &Name,
        env: &Env,
    ) -> Result<Function, RuntimeError> {
        let Value::Callable(Callable::Class(superclass)) = self.lookup(&self.super_sym, line, env)?
        else {
            return Err(RuntimeError::new(
                line,
                RuntimeErrorKind::SuperclassMustBeClass,
            ));
        };
        let Value::Instance(instance) = self.lookup(&self.this_sym, line, env)? else {
            return Err(RuntimeError::new(
                line,
                RuntimeErrorKind::UndefinedVariable(self.this_sym.name().to_owned()),
            ));
        };
        let Some(function) = superclass.find_method(&method.sym) else {
            return Err(RuntimeError::new(
                method.line,
                RuntimeErrorKind::UndefinedProperty {
                    name: method.sym.name().to_owned(),
                    class: superclass.name.name().to_owned(),
                },
            ));
        };
        Ok(function.bind(instance, &mut self.heap, &self.this_sym))
    }

    fn call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        line: Position,
        env: &Rc<Env>,
    ) -> Result<Value, RuntimeError> {
        let callee = self.eval(callee, env)?;
        let args = args
            .iter()
            .map(|arg| self.eval(arg, env))
            .collect::<Result<Vec<_>, _>>()?;
        match callee {
            Value::Callable(callable) => callable.call(self, args, line),
            _ => Err(RuntimeError::new(line, RuntimeErrorKind::NotCallable)),
        }
    }
}

fn binary(lhs: Value, op: BinaryOp, rhs: Value) -> Result<Value, RuntimeErrorKind> {
    use Value::{Bool, Number, Str};

    let v = match (op, lhs, rhs) {
        (BinaryOp::Equal, l, r) => Bool(l == r),
        (BinaryOp::NotEqual, l, r) => Bool(l != r),
        (BinaryOp::Add, Number(l), Number(r)) => Number(l + r),
        (BinaryOp::Add, Str(l), Str(r)) => Str(Rc::from(format!("{}{}", l, r))),
        (BinaryOp::Add, _, _) => return Err(RuntimeErrorKind::OperandsMustBeNumbersOrStrings),
        (BinaryOp::Sub, Number(l), Number(r)) => Number(l - r),
        (BinaryOp::Mul, Number(l), Number(r)) => Number(l * r),
        // Division by zero yields an infinity or NaN.
        (BinaryOp::Div, Number(l), Number(r)) => Number(l / r),
        (BinaryOp::Less, Number(l), Number(r)) => Bool(l < r),
        (BinaryOp::LessEqual, Number(l), Number(r)) => Bool(l <= r),
        (BinaryOp::Greater, Number(l), Number(r)) => Bool(l > r),
        (BinaryOp::GreaterEqual, Number(l), Number(r)) => Bool(l >= r),
        _ => return Err(RuntimeErrorKind::OperandsMustBeNumbers),
    };
    Ok(v)
}
