use super::{typename_of, Link, Store, TYPENAME};
use crate::selection::{conditions_met, Document, FieldSelection, Selection};
use serde_json::{Map, Value};

pub(super) struct Reader<'a> {
    pub store: &'a Store,
    pub variables: &'a Map<String, Value>
}

impl<'a> Reader<'a> {
    pub fn read_operation(&self, document: &Document) -> Option<Value> {
        let root = self.store.schema.root_type(document.operation_type)?;
        let mut data = Map::new();
        self.read_selection(root, root, &document.selection, &mut data)?;
        Some(Value::Object(data))
    }

    fn read_selection(
        &self,
        entity_key: &str,
        typename: &str,
        selection: &[Selection],
        out: &mut Map<String, Value>
    ) -> Option<()> {
        for item in selection {
            match item {
                Selection::Field(field) => {
                    if !field.is_included(self.variables) {
                        continue;
                    }
                    let value = if field.name == TYPENAME {
                        Value::String(typename.to_string())
                    } else {
                        self.read_field(entity_key, typename, field)?
                    };
                    out.insert(field.response_key().to_string(), value);
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
                        self.read_selection(entity_key, typename, selection, out)?;
                    }
                }
            }
        }
        Some(())
    }

    fn read_field(&self, entity_key: &str, typename: &str, field: &FieldSelection) -> Option<Value> {
        let arguments = field.arguments(self.variables);
        let field_type = self.store.schema.field_type(typename, &field.name);

        if let Some(resolver) = self.store.resolvers.get(typename, &field.name) {
            let parent = self.store.data.records_of(entity_key);
            let resolved = resolver(&parent, &arguments);
            if let Some(value) = self.read_resolved(field_type, field, &resolved) {
                tracing::trace!("{}.{} served by resolver", typename, field.name);
                return Some(value);
            }
        }

        let field_key = field.field_key(&arguments);
        match field.selection {
            None => self.store.data.read_record(entity_key, &field_key),
            Some(ref selection) => {
                let link = self.store.data.read_link(entity_key, &field_key)?;
                self.read_link(&link, field_type, selection)
            }
        }
    }

    /// Interpret a resolver's result. `None` falls back to the stored link.
    fn read_resolved(
        &self,
        field_type: Option<&str>,
        field: &FieldSelection,
        resolved: &Value
    ) -> Option<Value> {
        let selection = match field.selection {
            Some(ref selection) => selection,
            None => return Some(resolved.clone())
        };
        match resolved {
            Value::Null => Some(Value::Null),
            Value::Array(items) => items
                .iter()
                .map(|item| self.read_resolved(field_type, field, item))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Value::Object(object) => {
                let typename = typename_of(object, field_type)?;
                match self.store.keys.key_of_entity(typename, object) {
                    Some(key) if self.store.data.has_entity(&key) => {
                        self.read_link(&Link::Entity(key), field_type, selection)
                    }
                    Some(_) => None,
                    None => {
                        let mut out = Map::new();
                        self.read_inline(typename, object, selection, &mut out)?;
                        Some(Value::Object(out))
                    }
                }
            }
            _ => None
        }
    }

    fn read_link(&self, link: &Link, field_type: Option<&str>, selection: &[Selection]) -> Option<Value> {
        match link {
            Link::Null => Some(Value::Null),
            Link::List(links) => links
                .iter()
                .map(|link| self.read_link(link, field_type, selection))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Link::Entity(key) => {
                let typename = self
                    .store
                    .data
                    .read_record(key, TYPENAME)
                    .and_then(|typename| typename.as_str().map(str::to_string))
                    .or_else(|| field_type.map(str::to_string))?;
                let mut out = Map::new();
                self.read_selection(key, &typename, selection, &mut out)?;
                Some(Value::Object(out))
            }
        }
    }

    /// Project a selection over an object a resolver returned.
    fn read_inline(
        &self,
        typename: &str,
        object: &Map<String, Value>,
        selection: &[Selection],
        out: &mut Map<String, Value>
    ) -> Option<()> {
        for item in selection {
            match item {
                Selection::Field(field) => {
                    if !field.is_included(self.variables) {
                        continue;
                    }
                    let value = if field.name == TYPENAME {
                        Value::String(typename.to_string())
                    } else {
                        let value = object.get(&field.name)?;
                        match field.selection {
                            Some(ref selection) => {
                                let field_type = self.store.schema.field_type(typename, &field.name);
                                self.read_inline_value(field_type, value, selection)?
                            }
                            None => value.clone()
                        }
                    };
                    out.insert(field.response_key().to_string(), value);
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
                        self.read_inline(typename, object, selection, out)?;
                    }
                }
            }
        }
        Some(())
    }

    fn read_inline_value(
        &self,
        field_type: Option<&str>,
        value: &Value,
        selection: &[Selection]
    ) -> Option<Value> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.read_inline_value(field_type, item, selection))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Value::Object(inner) => {
                let inner_type = typename_of(inner, field_type).unwrap_or_default();
                let mut nested = Map::new();
                self.read_inline(inner_type, inner, selection, &mut nested)?;
                Some(Value::Object(nested))
            }
            other => Some(other.clone())
        }
    }
}
