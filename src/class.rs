use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use crate::callable::Function;
use crate::diag::Position;
use crate::eval::{Evaluator, RuntimeError};
use crate::interner::Symbol;
use crate::value::Value;

#[derive(Debug)]
pub struct Class {
    pub name: Symbol,
    pub superclass: Option<Rc<Class>>,
    methods: HashMap<Symbol, Rc<Function>>,
    initializer: Option<Rc<Function>>,
}

impl Class {
    /// `init` names the initializer method, which may also be inherited.
    pub fn new(
        name: Symbol,
        superclass: Option<Rc<Class>>,
        methods: HashMap<Symbol, Rc<Function>>,
        init: &Symbol,
    ) -> Class {
        let initializer = methods
            .get(init)
            .cloned()
            .or_else(|| superclass.as_ref().and_then(|s| s.initializer.clone()));
        Class {
            name,
            superclass,
            methods,
            initializer,
        }
    }

    /// Look a method up in this class then along the superclass chain.
    pub fn find_method(&self, name: &Symbol) -> Option<Rc<Function>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    pub fn arity(&self) -> usize {
        self.initializer.as_ref().map_or(0, |init| init.arity())
    }

    /// Every method this class holds, the inherited initializer included.
    pub fn functions(&self) -> impl Iterator<Item = &Rc<Function>> {
        self.methods.values().chain(self.initializer.iter())
    }

    /// Create an instance and run the initializer on it, if any.
    pub fn instantiate<W: Write>(
        class: &Rc<Class>,
        evaluator: &mut Evaluator<'_, W>,
        args: Vec<Value>,
        line: Position,
    ) -> Result<Value, RuntimeError> {
        let instance = evaluator.heap.instance(class.clone());
        if let Some(init) = &class.initializer {
            let bound = init.bind(instance.clone(), &mut evaluator.heap, &evaluator.this_sym);
            bound.call(evaluator, args, line)?;
        }
        Ok(Value::Instance(instance))
    }
}

/// What a property name resolves to on an instance.
#[derive(Debug)]
pub enum Property {
    Field(Value),
    /// Still unbound.
    Method(Rc<Function>),
}

pub struct Instance {
    pub class: Rc<Class>,
    fields: HashMap<Symbol, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Instance {
        Instance {
            class,
            fields: HashMap::new(),
        }
    }

    /// Fields shadow methods.
    pub fn get(&self, name: &Symbol) -> Option<Property> {
        match self.fields.get(name) {
            Some(value) => Some(Property::Field(value.clone())),
            None => self.class.find_method(name).map(Property::Method),
        }
    }

    pub fn set(&mut self, name: Symbol, value: Value) {
        self.fields.insert(name, value);
    }

    pub fn fields(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }

    pub fn take_fields(&mut self) -> HashMap<Symbol, Value> {
        std::mem::take(&mut self.fields)
    }
}

// Fields may point back at the instance.
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FunctionDecl, Name};
    use crate::callable::FunctionKind;
    use crate::env::Env;
    use crate::interner::Interner;

    fn method(interner: &mut Interner, name: &str, arity: usize) -> Rc<Function> {
        let params = (0..arity)
            .map(|i| Name {
                sym: interner.symbol(&format!("p{}", i)),
                line: 1,
            })
            .collect();
        let decl = FunctionDecl {
            name: Name {
                sym: interner.symbol(name),
                line: 1,
            },
            params,
            body: vec![],
        };
        Rc::new(Function::new(
            Rc::new(decl),
            Rc::new(Env::new(None)),
            FunctionKind::Method,
        ))
    }

    #[test]
    fn methods_are_inherited() {
        let mut interner = Interner::new();
        let init = interner.symbol("init");
        let m = interner.symbol("m");
        let mut base_methods = HashMap::new();
        base_methods.insert(m.clone(), method(&mut interner, "m", 0));
        base_methods.insert(init.clone(), method(&mut interner, "init", 2));
        let base = Rc::new(Class::new(interner.symbol("A"), None, base_methods, &init));
        let derived = Class::new(interner.symbol("B"), Some(base), HashMap::new(), &init);

        assert!(derived.find_method(&m).is_some());
        assert!(derived.find_method(&interner.symbol("other")).is_none());
        assert_eq!(derived.arity(), 2);
    }

    #[test]
    fn class_without_initializer_takes_no_arguments() {
        let mut interner = Interner::new();
        let init = interner.symbol("init");
        let class = Class::new(interner.symbol("A"), None, HashMap::new(), &init);
        assert_eq!(class.arity(), 0);
    }

    #[test]
    fn fields_shadow_methods() {
        let mut interner = Interner::new();
        let init = interner.symbol("init");
        let m = interner.symbol("m");
        let mut methods = HashMap::new();
        methods.insert(m.clone(), method(&mut interner, "m", 0));
        let class = Rc::new(Class::new(interner.symbol("A"), None, methods, &init));
        let mut instance = Instance::new(class);

        assert!(matches!(instance.get(&m), Some(Property::Method(_))));
        instance.set(m.clone(), Value::Number(1.0));
        match instance.get(&m) {
            Some(Property::Field(Value::Number(n))) if n == 1.0 => (),
            r => panic!("unexpected output: {:?}", r),
        }
        assert!(instance.get(&interner.symbol("missing")).is_none());
    }
}
