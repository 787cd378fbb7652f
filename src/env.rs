//! Binding environment for variables and local functions.
//!
//! An environment is a persistent linked list of frames. Extending it never
//! mutates the parent, so sibling branches of a fan-out each see their own
//! bindings and a frame is dropped as soon as the last stream using it is.

use std::rc::Rc;

use crate::{
    ast::{Expr, Param},
    value::Value,
};

/// A function body together with the environment it was defined in.
///
/// Local definitions carry their own `name` so the body can call itself:
/// the binding is re-added on every call instead of being stored in `env`,
/// which keeps the frames acyclic. Filter arguments passed to a function are
/// closures too, without a name and without parameters.
pub struct Closure<'a> {
    pub(crate) name: Option<&'a str>,
    pub(crate) params: &'a [Param],
    pub(crate) body: &'a Expr,
    pub(crate) env: Environment<'a>,
}

impl<'a> Closure<'a> {
    pub(crate) fn definition(
        name: &'a str,
        params: &'a [Param],
        body: &'a Expr,
        env: Environment<'a>,
    ) -> Self {
        Closure {
            name: Some(name),
            params,
            body,
            env,
        }
    }

    pub(crate) fn argument(body: &'a Expr, env: Environment<'a>) -> Self {
        Closure {
            name: None,
            params: &[],
            body,
            env,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

enum Binding<'a> {
    Variable(String, Value),
    Function(&'a str, Rc<Closure<'a>>),
}

struct Frame<'a> {
    binding: Binding<'a>,
    parent: Environment<'a>,
}

#[derive(Clone, Default)]
pub struct Environment<'a> {
    head: Option<Rc<Frame<'a>>>,
    /// Number of local function calls enclosing this scope
    depth: usize,
}

impl<'a> Environment<'a> {
    /// An empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an environment holding the given variables.
    pub fn with_variables<I, K>(variables: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        variables
            .into_iter()
            .fold(Self::new(), |env, (name, value)| env.bind(name, value))
    }

    fn push(&self, binding: Binding<'a>) -> Self {
        Environment {
            head: Some(Rc::new(Frame {
                binding,
                parent: self.clone(),
            })),
            depth: self.depth,
        }
    }

    /// Returns a child environment where `name` is bound to `value`.
    pub fn bind(&self, name: impl Into<String>, value: Value) -> Self {
        self.push(Binding::Variable(name.into(), value))
    }

    pub(crate) fn bind_function(&self, name: &'a str, closure: Rc<Closure<'a>>) -> Self {
        self.push(Binding::Function(name, closure))
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// The same bindings, seen from `depth` nested calls.
    pub(crate) fn at_depth(&self, depth: usize) -> Self {
        Environment {
            head: self.head.clone(),
            depth,
        }
    }

    fn frames(&self) -> impl Iterator<Item = &Frame<'a>> {
        std::iter::successors(self.head.as_deref(), |frame| frame.parent.head.as_deref())
    }

    /// Innermost value bound to `name`.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.frames().find_map(|frame| match &frame.binding {
            Binding::Variable(bound, value) if bound == name => Some(value),
            _ => None,
        })
    }

    /// Innermost function named `name` taking `arity` arguments.
    pub(crate) fn function(&self, name: &str, arity: usize) -> Option<Rc<Closure<'a>>> {
        self.frames().find_map(|frame| match &frame.binding {
            Binding::Function(bound, closure) if *bound == name && closure.arity() == arity => {
                Some(Rc::clone(closure))
            }
            _ => None,
        })
    }

    /// Arities of every visible local function named `name`.
    pub(crate) fn function_arities(&self, name: &str) -> Vec<usize> {
        self.frames()
            .filter_map(|frame| match &frame.binding {
                Binding::Function(bound, closure) if *bound == name => Some(closure.arity()),
                _ => None,
            })
            .collect()
    }
}
