use super::{typename_of, Link, Store, TYPENAME};
use crate::selection::{conditions_met, Document, Selection};
use ficsit_graphql::OperationType;
use serde_json::{Map, Value};

pub(super) struct Writer<'a> {
    pub store: &'a Store,
    pub variables: &'a Map<String, Value>
}

impl<'a> Writer<'a> {
    pub fn write_operation(&self, document: &Document, data: &Value) {
        let root = match self.store.schema.root_type(document.operation_type) {
            Some(root) => root,
            None => {
                tracing::warn!(
                    "schema has no {} root type, not caching result",
                    document.operation_type
                );
                return;
            }
        };
        let data = match data {
            Value::Object(data) => data,
            _ => return
        };
        // Mutation root fields describe the call, not state. The entities they return are
        // still normalized.
        let record_root = document.operation_type != OperationType::Mutation;
        self.write_selection(root, root, &document.selection, data, record_root);
    }

    fn write_selection(
        &self,
        entity_key: &str,
        typename: &str,
        selection: &[Selection],
        data: &Map<String, Value>,
        record: bool
    ) {
        for item in selection {
            match item {
                Selection::Field(field) => {
                    if !field.is_included(self.variables) || field.name == TYPENAME {
                        continue;
                    }
                    let value = match data.get(field.response_key()) {
                        Some(value) => value,
                        None => continue
                    };
                    let arguments = field.arguments(self.variables);
                    let field_key = field.field_key(&arguments);

                    match field.selection {
                        None => {
                            if record {
                                self.store
                                    .data
                                    .write_record(entity_key, field_key, value.clone());
                            }
                        }
                        Some(ref selection) => {
                            let path = format!("{}.{}", entity_key, field_key);
                            let field_type = self.store.schema.field_type(typename, &field.name);
                            let link = self.write_value(path, field_type, selection, value);
                            if record {
                                self.store.data.write_link(entity_key, field_key, link);
                            }
                        }
                    }
                }
                Selection::Group {
                    type_condition,
                    conditions,
                    selection
                } => {
                    let applies = type_condition
                        .as_deref()
                        .map(|condition| self.store.schema.is_possible_type(condition, typename))
                        .unwrap_or(true);
                    if applies && conditions_met(conditions, self.variables) {
                        self.write_selection(entity_key, typename, selection, data, record);
                    }
                }
            }
        }
    }

    fn write_value(
        &self,
        path: String,
        field_type: Option<&str>,
        selection: &[Selection],
        value: &Value
    ) -> Link {
        match value {
            Value::Array(items) => Link::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.write_value(format!("{}.{}", path, i), field_type, selection, item)
                    })
                    .collect()
            ),
            Value::Object(object) => {
                let typename = typename_of(object, field_type);
                let entity_key = match typename {
                    Some(typename) => self.store.keys.key_of_entity(typename, object),
                    None => {
                        tracing::trace!("no typename for {}, embedding", path);
                        None
                    }
                }
                .unwrap_or(path);
                let typename = typename.unwrap_or_default();

                self.store.data.write_record(
                    &entity_key,
                    TYPENAME.to_string(),
                    Value::String(typename.to_string())
                );
                self.write_selection(&entity_key, typename, selection, object, true);
                Link::Entity(entity_key)
            }
            Value::Null => Link::Null,
            other => {
                tracing::warn!("expected an object at {}, got {}", path, other);
                Link::Null
            }
        }
    }
}
