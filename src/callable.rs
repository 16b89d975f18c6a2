use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::ast::FunctionDecl;
use crate::class::{Class, Instance};
use crate::diag::Position;
use crate::env::Env;
use crate::eval::{Evaluator, Flow, RuntimeError, RuntimeErrorKind};
use crate::gc::Heap;
use crate::interner::Symbol;
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;

/// Anything that can appear left of a call's parentheses.
#[derive(Debug, Clone)]
pub enum Callable {
    Native(Rc<Native>),
    Function(Rc<Function>),
    Class(Rc<Class>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native(native) => native.arity,
            Callable::Function(function) => function.arity(),
            Callable::Class(class) => class.arity(),
        }
    }

    /// Check the argument count then invoke.
    pub fn call<W: Write>(
        &self,
        evaluator: &mut Evaluator<'_, W>,
        args: Vec<Value>,
        line: Position,
    ) -> Result<Value, RuntimeError> {
        if args.len() != self.arity() {
            return Err(RuntimeError::new(
                line,
                RuntimeErrorKind::Arity {
                    expected: self.arity(),
                    found: args.len(),
                },
            ));
        }
        match self {
            Callable::Native(native) => {
                (native.func)(&args).map_err(|kind| RuntimeError::new(line, kind))
            }
            Callable::Function(function) => function.call(evaluator, args, line),
            Callable::Class(class) => Class::instantiate(class, evaluator, args, line),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Native(l), Callable::Native(r)) => Rc::ptr_eq(l, r),
            (Callable::Function(l), Callable::Function(r)) => Rc::ptr_eq(l, r),
            (Callable::Class(l), Callable::Class(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(_) => write!(f, "<native fn>"),
            Callable::Function(function) => write!(f, "<fn {}>", function.decl.name.sym),
            Callable::Class(class) => write!(f, "{}", class.name),
        }
    }
}

/// Function implemented by the host.
pub struct Native {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, RuntimeErrorKind>,
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Native")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Natives predefined in the global scope.
pub fn natives() -> Vec<Native> {
    vec![Native {
        name: "clock",
        arity: 0,
        func: clock,
    }]
}

fn clock(_args: &[Value]) -> Result<Value, RuntimeErrorKind> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(Value::Number(now))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Method,
    /// A method named `init`: calling it always yields the receiver.
    Initializer,
}

/// User function or method, possibly bound to a receiver through its closure.
#[derive(Debug)]
pub struct Function {
    pub decl: Rc<FunctionDecl>,
    pub closure: Rc<Env>,
    pub kind: FunctionKind,
}

impl Function {
    pub fn new(decl: Rc<FunctionDecl>, closure: Rc<Env>, kind: FunctionKind) -> Function {
        Function {
            decl,
            closure,
            kind,
        }
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }

    /// Produce a copy of this method whose closure binds `this` to `instance`.
    pub fn bind(
        &self,
        instance: Rc<RefCell<Instance>>,
        heap: &mut Heap,
        this: &Symbol,
    ) -> Function {
        let env = heap.scope(Some(&self.closure));
        env.define(this.clone(), Value::Instance(instance));
        Function::new(self.decl.clone(), env, self.kind)
    }

    /// Run the body in a fresh scope nested in the closure.  Arity has already been checked.
    pub fn call<W: Write>(
        &self,
        evaluator: &mut Evaluator<'_, W>,
        args: Vec<Value>,
        line: Position,
    ) -> Result<Value, RuntimeError> {
        trace!(function = %self.decl.name.sym, line, "call");
        evaluator.enter_call(line)?;
        let env = evaluator.heap.scope(Some(&self.closure));
        for (param, arg) in self.decl.params.iter().zip(args) {
            env.define(param.sym.clone(), arg);
        }
        let flow = ensure_sufficient_stack(|| evaluator.execute_block(&self.decl.body, &env));
        evaluator.leave_call();

        let value = match flow? {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        };
        if self.kind == FunctionKind::Initializer {
            return Ok(self
                .closure
                .get_at(0, &evaluator.this_sym)
                .unwrap_or(Value::Nil));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_a_positive_number() {
        match clock(&[]) {
            Ok(Value::Number(n)) if n > 0.0 => (),
            r => panic!("unexpected output: {:?}", r),
        }
    }

    #[test]
    fn natives_render_opaquely() {
        let clock = natives().into_iter().next().map(Rc::new);
        match clock {
            Some(native) => {
                let callable = Callable::Native(native);
                assert_eq!(callable.arity(), 0);
                assert_eq!(callable.to_string(), "<native fn>");
            }
            None => panic!("no natives"),
        }
    }
}
