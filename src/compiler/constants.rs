//! Constant pool for compiled programs.
//!
//! Literals and function pages end up here, each distinct value once.
use std::collections::HashMap;

use crate::ArkNumber;

use super::page::PageId;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Number(ArkNumber),
    String(Box<str>),
    /// The code page of a function literal.
    PageAddress(PageId),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::PageAddress(_) => "page",
        }
    }
}

/// Insertion ordered, with a lookup index for deduplication.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    values: Vec<Value>,
    index: HashMap<Value, usize>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get existing constant, returns index.
    pub fn intern(&mut self, value: Value) -> usize {
        if let Some(&index) = self.index.get(&value) {
            return index;
        }

        let index = self.values.len();
        tracing::trace!(index, kind = value.kind(), "new constant");
        self.index.insert(value.clone(), index);
        self.values.push(value);
        index
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
