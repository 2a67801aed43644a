//! Scoped bindings for column values.
//!
//! Every template execution opens a scope. Writing a name that is already
//! bound first records its previous value in the innermost scope; closing the
//! scope puts the recorded values back. A nested template that reuses a
//! column name of an enclosing row therefore never leaks its value to the
//! caller, while names first bound inside the scope keep their latest value.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct Bindings {
    values: HashMap<String, Vec<u8>>,
    scopes: Vec<HashMap<String, Vec<u8>>>,
    touched: HashSet<String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Bind `name`, remembering a shadowed value in the innermost scope.
    ///
    /// Only the first write per scope is remembered, so repeated writes for
    /// successive rows still restore the value from before the scope opened.
    pub fn set(&mut self, name: &str, value: Vec<u8>) {
        if let Some(scope) = self.scopes.last_mut() {
            if !scope.contains_key(name) {
                if let Some(previous) = self.values.get(name) {
                    scope.insert(name.to_string(), previous.clone());
                }
            }
        }
        self.touched.insert(name.to_string());
        self.values.insert(name.to_string(), value);
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Close the innermost scope and restore every value it shadowed.
    pub fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            self.values.extend(scope);
        }
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Number of currently bound names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of distinct names bound at any time since creation.
    pub fn distinct_names(&self) -> usize {
        self.touched.len()
    }
}
