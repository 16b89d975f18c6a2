//! Variable scopes.
//!
//! Scopes are shared through `Rc` and link to their enclosing scope.  Blocks and calls drop their
//! scope when control leaves them; closures and bound methods keep theirs alive.  Scopes are
//! allocated through `Heap`, which also reclaims those kept alive only by cycles.

use std::cell::{BorrowError, Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::interner::Symbol;
use crate::value::Value;

/// Raised when assigning to a name no scope in the chain declares.
#[derive(Debug, Error)]
#[error("Undefined variable '{0}'.")]
pub struct Undefined(pub Symbol);

pub struct Env {
    parent: Option<Rc<Env>>,
    bindings: RefCell<HashMap<Symbol, Value>>,
}

impl Env {
    pub fn new(parent: Option<Rc<Env>>) -> Env {
        Env {
            parent,
            bindings: RefCell::new(HashMap::new()),
        }
    }

    pub fn parent(&self) -> Option<&Rc<Env>> {
        self.parent.as_ref()
    }

    /// Bind `sym` in this scope, replacing any previous binding here.
    pub fn define(&self, sym: Symbol, value: Value) {
        self.bindings.borrow_mut().insert(sym, value);
    }

    /// Look `sym` up here then in the enclosing scopes.
    pub fn get(&self, sym: &Symbol) -> Option<Value> {
        match self.bindings.borrow().get(sym) {
            Some(v) => Some(v.clone()),
            None => self.parent.as_ref().and_then(|p| p.get(sym)),
        }
    }

    /// Look `sym` up exactly `depth` scopes above this one.
    pub fn get_at(&self, depth: usize, sym: &Symbol) -> Option<Value> {
        let mut env = self;
        for _ in 0..depth {
            env = env.parent.as_deref()?;
        }
        env.bindings.borrow().get(sym).cloned()
    }

    /// Overwrite the innermost existing binding of `sym`.  Never declares.
    pub fn assign(&self, sym: &Symbol, value: Value) -> Result<(), Undefined> {
        if let Some(slot) = self.bindings.borrow_mut().get_mut(sym) {
            *slot = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(sym, value),
            None => Err(Undefined(sym.clone())),
        }
    }

    pub(crate) fn bindings(&self) -> Result<Ref<'_, HashMap<Symbol, Value>>, BorrowError> {
        self.bindings.try_borrow()
    }

    /// Remove every binding, leaving the scope empty.
    pub(crate) fn take_bindings(&self) -> HashMap<Symbol, Value> {
        self.bindings
            .try_borrow_mut()
            .map(|mut bindings| std::mem::take(&mut *bindings))
            .unwrap_or_default()
    }
}

// Bindings may hold closures over this very scope.
impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self
            .bindings
            .try_borrow()
            .map(|b| b.keys().map(|k| k.name().to_owned()).collect::<Vec<_>>())
            .unwrap_or_default();
        f.debug_struct("Env")
            .field("bindings", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::Interner;
    use pretty_assertions::assert_eq;

    #[test]
    fn define_then_get() {
        let mut interner = Interner::new();
        let global = Env::new(None);
        let foo = interner.symbol("foo");
        global.define(foo.clone(), Value::Number(1.0));
        assert_eq!(global.get(&foo), Some(Value::Number(1.0)));
        assert_eq!(global.get(&interner.symbol("bar")), None);
    }

    #[test]
    fn redefinition_overwrites() {
        let mut interner = Interner::new();
        let global = Env::new(None);
        let foo = interner.symbol("foo");
        global.define(foo.clone(), Value::Number(1.0));
        global.define(foo.clone(), Value::Bool(true));
        assert_eq!(global.get(&foo), Some(Value::Bool(true)));
    }

    #[test]
    fn inner_scope_shadows_and_sees_outer() {
        let mut interner = Interner::new();
        let global = Rc::new(Env::new(None));
        let foo = interner.symbol("foo");
        let bar = interner.symbol("bar");
        global.define(foo.clone(), Value::Number(1.0));
        global.define(bar.clone(), Value::Number(2.0));

        let inner = Env::new(Some(global.clone()));
        inner.define(foo.clone(), Value::Number(3.0));
        assert_eq!(inner.get(&foo), Some(Value::Number(3.0)));
        assert_eq!(inner.get(&bar), Some(Value::Number(2.0)));
        assert_eq!(global.get(&foo), Some(Value::Number(1.0)));
        assert_eq!(inner.get_at(1, &foo), Some(Value::Number(1.0)));
        assert_eq!(inner.get_at(0, &bar), None);
        assert_eq!(inner.get_at(2, &bar), None);
    }

    #[test]
    fn assign_updates_innermost_binding() -> Result<(), Undefined> {
        let mut interner = Interner::new();
        let global = Rc::new(Env::new(None));
        let foo = interner.symbol("foo");
        global.define(foo.clone(), Value::Number(1.0));
        let inner = Env::new(Some(global.clone()));
        inner.assign(&foo, Value::Number(2.0))?;
        assert_eq!(global.get(&foo), Some(Value::Number(2.0)));
        assert_eq!(inner.get_at(0, &foo), None);
        Ok(())
    }

    #[test]
    fn assign_never_declares() {
        let mut interner = Interner::new();
        let global = Env::new(None);
        let foo = interner.symbol("foo");
        match global.assign(&foo, Value::Nil) {
            Err(Undefined(sym)) if sym == foo => (),
            r => panic!("unexpected output: {:?}", r),
        }
        assert_eq!(global.get(&foo), None);
    }

    #[test]
    fn taking_bindings_empties_the_scope() {
        let mut interner = Interner::new();
        let global = Env::new(None);
        let foo = interner.symbol("foo");
        global.define(foo.clone(), Value::Number(1.0));
        let taken = global.take_bindings();
        assert_eq!(taken.len(), 1);
        assert_eq!(global.get(&foo), None);
    }
}
