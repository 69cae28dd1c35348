mod data;
mod reader;
mod writer;

pub use data::{InMemoryData, Link};

use crate::{selection::Document, Keys, Resolvers, Schema};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const TYPENAME: &str = "__typename";

/// The normalized cache of one client.
pub struct Store {
    data: InMemoryData,
    schema: Arc<Schema>,
    keys: Keys,
    resolvers: Resolvers
}

impl Store {
    pub fn new(schema: Arc<Schema>, keys: Keys, resolvers: Resolvers) -> Self {
        Self {
            data: InMemoryData::new(),
            schema,
            keys,
            resolvers
        }
    }

    #[cfg(test)]
    pub fn data(&self) -> &InMemoryData {
        &self.data
    }

    /// Normalize the `data` of a response into the store.
    pub fn write_query(&self, document: &Document, variables: &Map<String, Value>, data: &Value) {
        writer::Writer {
            store: self,
            variables
        }
        .write_operation(document, data);
    }

    /// Read the data for a document. `None` means something the selection needs isn't cached.
    pub fn read_query(&self, document: &Document, variables: &Map<String, Value>) -> Option<Value> {
        reader::Reader {
            store: self,
            variables
        }
        .read_operation(document)
    }
}

/// The typename of an object in the response: its `__typename`, else the schema's field type.
fn typename_of<'a>(object: &'a Map<String, Value>, fallback: Option<&'a str>) -> Option<&'a str> {
    object
        .get(TYPENAME)
        .and_then(Value::as_str)
        .or(fallback)
}
