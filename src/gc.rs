//! Reclamation of scopes and instances that only reference cycles keep alive.
//!
//! Scopes and instances are reference counted, so most of them go away as soon as the last
//! handle does.  A function declared in a scope and bound there, or an instance stored in one of
//! its own fields, forms a cycle that counting alone never frees.  `Heap` remembers every scope
//! and instance it hands out and now and then looks for cycles nothing outside the heap reaches.
//!
//! A collection counts, for every heap object, the strong references other heap objects hold to
//! it.  Any reference left over comes from outside the heap (the evaluator, a value being
//! computed, a call in progress) and makes the object a root.  Whatever the roots do not reach is
//! emptied, which breaks its cycles and lets the counts drop to zero.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::callable::{Callable, Function};
use crate::class::{Class, Instance};
use crate::env::Env;
use crate::value::Value;

/// Number of tracked objects at which the first collection happens.
pub const FIRST_COLLECTION: usize = 1024;

#[derive(Debug)]
pub struct Heap {
    scopes: Vec<Weak<Env>>,
    instances: Vec<Weak<RefCell<Instance>>>,
    next_collection: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            scopes: vec![],
            instances: vec![],
            next_collection: FIRST_COLLECTION,
        }
    }

    /// Allocate a scope nested in `parent`, or a global scope.
    pub fn scope(&mut self, parent: Option<&Rc<Env>>) -> Rc<Env> {
        let env = Rc::new(Env::new(parent.cloned()));
        self.scopes.push(Rc::downgrade(&env));
        env
    }

    /// Allocate an instance of `class` with no fields.
    pub fn instance(&mut self, class: Rc<Class>) -> Rc<RefCell<Instance>> {
        let instance = Rc::new(RefCell::new(Instance::new(class)));
        self.instances.push(Rc::downgrade(&instance));
        instance
    }

    /// Number of scopes still allocated.
    pub fn live_scopes(&self) -> usize {
        self.scopes.iter().filter(|s| s.strong_count() > 0).count()
    }

    pub fn live_instances(&self) -> usize {
        self.instances.iter().filter(|i| i.strong_count() > 0).count()
    }

    /// Collect if enough objects were allocated since the previous collection.
    ///
    /// Only call this while no scope or instance is borrowed.
    pub fn maybe_collect(&mut self) {
        if self.scopes.len() + self.instances.len() >= self.next_collection {
            self.collect();
            let tracked = self.scopes.len() + self.instances.len();
            self.next_collection = FIRST_COLLECTION.max(2 * tracked);
        }
    }

    /// Empty every scope and instance that only cycles keep alive.  Returns how many there were.
    ///
    /// Only call this while no scope or instance is borrowed.
    pub fn collect(&mut self) -> usize {
        self.scopes.retain(|s| s.strong_count() > 0);
        self.instances.retain(|i| i.strong_count() > 0);

        let graph = Graph::new(self.tracked());
        let garbage = graph.unreachable();
        for &i in &garbage {
            graph.nodes[i].clear();
        }
        debug!(
            objects = graph.nodes.len(),
            garbage = garbage.len(),
            "collected cycles"
        );
        garbage.len()
    }

    fn tracked(&self) -> Vec<Node> {
        self.scopes
            .iter()
            .filter_map(Weak::upgrade)
            .map(Node::Env)
            .chain(
                self.instances
                    .iter()
                    .filter_map(Weak::upgrade)
                    .map(Node::Instance),
            )
            .collect()
    }
}

// Nothing the heap handed out outlives the interpreter.
impl Drop for Heap {
    fn drop(&mut self) {
        for node in self.tracked() {
            node.clear();
        }
    }
}

/// Heap object, or an immutable object that may point into the heap.
enum Node {
    Env(Rc<Env>),
    Instance(Rc<RefCell<Instance>>),
    Function(Rc<Function>),
    Class(Rc<Class>),
}

impl Node {
    fn of_value(value: &Value) -> Option<Node> {
        match value {
            Value::Callable(Callable::Function(function)) => Some(Node::Function(function.clone())),
            Value::Callable(Callable::Class(class)) => Some(Node::Class(class.clone())),
            Value::Instance(instance) => Some(Node::Instance(instance.clone())),
            _ => None,
        }
    }

    fn key(&self) -> *const () {
        match self {
            Node::Env(env) => Rc::as_ptr(env) as *const (),
            Node::Instance(instance) => Rc::as_ptr(instance) as *const (),
            Node::Function(function) => Rc::as_ptr(function) as *const (),
            Node::Class(class) => Rc::as_ptr(class) as *const (),
        }
    }

    fn strong_count(&self) -> usize {
        match self {
            Node::Env(env) => Rc::strong_count(env),
            Node::Instance(instance) => Rc::strong_count(instance),
            Node::Function(function) => Rc::strong_count(function),
            Node::Class(class) => Rc::strong_count(class),
        }
    }

    /// One node per strong reference this object holds, or `None` if its contents are borrowed.
    fn children(&self) -> Option<Vec<Node>> {
        let mut children = vec![];
        match self {
            Node::Env(env) => {
                children.extend(env.parent().cloned().map(Node::Env));
                let bindings = env.bindings().ok()?;
                children.extend(bindings.values().filter_map(Node::of_value));
            }
            Node::Instance(instance) => {
                let instance = instance.try_borrow().ok()?;
                children.push(Node::Class(instance.class.clone()));
                children.extend(instance.fields().filter_map(Node::of_value));
            }
            Node::Function(function) => children.push(Node::Env(function.closure.clone())),
            Node::Class(class) => {
                children.extend(class.superclass.clone().map(Node::Class));
                children.extend(class.functions().cloned().map(Node::Function));
            }
        }
        Some(children)
    }

    fn clear(&self) {
        match self {
            Node::Env(env) => drop(env.take_bindings()),
            Node::Instance(instance) => {
                let fields = instance
                    .try_borrow_mut()
                    .map(|mut instance| instance.take_fields());
                drop(fields);
            }
            Node::Function(_) | Node::Class(_) => (),
        }
    }
}

/// Every object reachable from the tracked ones, with the references between them.
struct Graph {
    /// Holds exactly one strong reference to each object.
    nodes: Vec<Node>,
    /// `None` for objects whose contents could not be inspected.
    edges: Vec<Option<Vec<usize>>>,
}

impl Graph {
    fn new(tracked: Vec<Node>) -> Graph {
        let mut index = HashMap::new();
        let mut nodes = vec![];
        for node in tracked {
            if index.insert(node.key(), nodes.len()).is_none() {
                nodes.push(node);
            }
        }

        let mut edges = vec![];
        let mut i = 0;
        while i < nodes.len() {
            let out = nodes[i].children().map(|children| {
                children
                    .into_iter()
                    .map(|child| {
                        *index.entry(child.key()).or_insert_with(|| {
                            nodes.push(child);
                            nodes.len() - 1
                        })
                    })
                    .collect::<Vec<_>>()
            });
            edges.push(out);
            i += 1;
        }
        Graph { nodes, edges }
    }

    /// Indices of the heap objects no outside reference reaches.
    fn unreachable(&self) -> Vec<usize> {
        let mut internal = vec![0; self.nodes.len()];
        for out in self.edges.iter().flatten() {
            for &j in out {
                internal[j] += 1;
            }
        }

        let mut reached: Vec<bool> = self
            .nodes
            .iter()
            .zip(&self.edges)
            .zip(&internal)
            // One of the strong references is `nodes` itself.
            .map(|((node, out), &held)| out.is_none() || node.strong_count() > held + 1)
            .collect();
        let mut pending: Vec<usize> = (0..self.nodes.len()).filter(|&i| reached[i]).collect();
        while let Some(i) = pending.pop() {
            for &j in self.edges[i].iter().flatten() {
                if !reached[j] {
                    reached[j] = true;
                    pending.push(j);
                }
            }
        }

        (0..self.nodes.len())
            .filter(|&i| !reached[i] && matches!(self.nodes[i], Node::Env(_) | Node::Instance(_)))
            .collect()
    }
}
