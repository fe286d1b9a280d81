use crate::value::Value;
use std::collections::HashMap;

/// Session-scoped variable store: `RESULTS` plus one `_N` binding per
/// executed turn.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    vars: HashMap<String, Value>,
}

impl Bindings {
    pub const RESULTS: &'static str = "RESULTS";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Bind a turn's result as both `RESULTS` and `_{turn}`.
    pub fn record_result(&mut self, turn: usize, value: Value) {
        self.vars.insert(format!("_{turn}"), value.clone());
        self.vars.insert(Self::RESULTS.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Lookup frame. Lambdas push a child frame holding one parameter; the
/// parent is borrowed, never copied or mutated.
pub struct Scope<'a> {
    frame: Frame<'a>,
    parent: Option<&'a Scope<'a>>,
}

enum Frame<'a> {
    Session(&'a Bindings),
    Param { name: &'a str, value: Value },
}

impl<'a> Scope<'a> {
    pub fn root(bindings: &'a Bindings) -> Self {
        Self {
            frame: Frame::Session(bindings),
            parent: None,
        }
    }

    pub fn child(parent: &'a Scope<'a>, name: &'a str, value: Value) -> Self {
        Self {
            frame: Frame::Param { name, value },
            parent: Some(parent),
        }
    }

    /// Innermost binding for `name`, walking outward.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let found = match &self.frame {
            Frame::Session(bindings) => bindings.get(name),
            Frame::Param { name: param, value } => (*param == name).then_some(value),
        };
        found.or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }

    /// Give back the value bound by a parameter frame.
    pub fn into_param(self) -> Option<Value> {
        match self.frame {
            Frame::Param { value, .. } => Some(value),
            Frame::Session(_) => None,
        }
    }
}
