//! Turns a query document into the selection tree the store walks while reading and writing.
//! Fragment spreads are inlined, so the store only ever sees fields and type-conditioned groups.

use ficsit_graphql::OperationType;
use fnv::FnvHashMap;
use graphql_parser::query::{self, Definition, OperationDefinition, TypeCondition};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use thiserror::Error;

const MAX_FRAGMENT_DEPTH: usize = 32;

#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    #[error("failed to parse query document: {0}")]
    Parse(String),
    #[error("operation {0} not found in query document")]
    OperationNotFound(String),
    #[error("unknown fragment {0}")]
    UnknownFragment(String),
    #[error("fragment spreads nested too deeply (cycle through {0}?)")]
    FragmentDepth(String)
}

#[derive(Debug, Clone)]
pub struct Document {
    pub operation_type: OperationType,
    pub selection: Vec<Selection>
}

#[derive(Debug, Clone)]
pub enum Selection {
    Field(FieldSelection),
    /// An inline fragment or an inlined fragment spread.
    Group {
        type_condition: Option<String>,
        conditions: Vec<Condition>,
        selection: Vec<Selection>
    }
}

/// An `@include(if:)` or `@skip(if:)` directive.
#[derive(Debug, Clone)]
pub struct Condition {
    include: bool,
    value: query::Value
}

impl Condition {
    fn is_met(&self, variables: &Map<String, Value>) -> bool {
        let flag = argument_to_json(&self.value, variables)
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        flag == self.include
    }
}

pub fn conditions_met(conditions: &[Condition], variables: &Map<String, Value>) -> bool {
    conditions
        .iter()
        .all(|condition| condition.is_met(variables))
}

#[derive(Debug, Clone)]
pub struct FieldSelection {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<(String, query::Value)>,
    pub conditions: Vec<Condition>,
    /// `None` for scalar fields.
    pub selection: Option<Vec<Selection>>
}

impl FieldSelection {
    /// The key this field has in the response data.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// The arguments with variables substituted. Arguments whose variable wasn't provided are
    /// left out.
    pub fn arguments(&self, variables: &Map<String, Value>) -> Map<String, Value> {
        self.arguments
            .iter()
            .filter_map(|(name, value)| {
                argument_to_json(value, variables).map(|value| (name.clone(), value))
            })
            .collect()
    }

    /// The key the field is stored under: `name` or `name({"arg":value})` with sorted args.
    pub fn field_key(&self, arguments: &Map<String, Value>) -> String {
        if arguments.is_empty() {
            self.name.clone()
        } else {
            let sorted: BTreeMap<&String, &Value> = arguments.iter().collect();
            let args = serde_json::to_string(&sorted).unwrap_or_default();
            format!("{}({})", self.name, args)
        }
    }

    pub fn is_included(&self, variables: &Map<String, Value>) -> bool {
        conditions_met(&self.conditions, variables)
    }
}

fn argument_to_json(value: &query::Value, variables: &Map<String, Value>) -> Option<Value> {
    let json = match value {
        query::Value::Variable(name) => return variables.get(name).cloned(),
        query::Value::Int(n) => n.as_i64().map(Value::from).unwrap_or(Value::Null),
        query::Value::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        query::Value::String(s) => Value::String(s.clone()),
        query::Value::Boolean(b) => Value::Bool(*b),
        query::Value::Null => Value::Null,
        query::Value::Enum(e) => Value::String(e.clone()),
        query::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| argument_to_json(item, variables).unwrap_or(Value::Null))
                .collect()
        ),
        query::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter_map(|(key, value)| {
                    argument_to_json(value, variables).map(|value| (key.clone(), value))
                })
                .collect()
        )
    };
    Some(json)
}

fn to_conditions(directives: &[query::Directive]) -> Vec<Condition> {
    directives
        .iter()
        .filter(|directive| directive.name == "include" || directive.name == "skip")
        .filter_map(|directive| {
            directive
                .arguments
                .iter()
                .find(|(name, _)| name == "if")
                .map(|(_, value)| Condition {
                    include: directive.name == "include",
                    value: value.clone()
                })
        })
        .collect()
}

struct Fragments<'a> {
    definitions: FnvHashMap<&'a str, &'a query::FragmentDefinition>
}

impl<'a> Fragments<'a> {
    fn convert(
        &self,
        selection_set: &query::SelectionSet,
        depth: usize
    ) -> Result<Vec<Selection>, DocumentError> {
        selection_set
            .items
            .iter()
            .map(|item| self.convert_item(item, depth))
            .collect()
    }

    fn convert_item(
        &self,
        item: &query::Selection,
        depth: usize
    ) -> Result<Selection, DocumentError> {
        match item {
            query::Selection::Field(field) => {
                let selection = if field.selection_set.items.is_empty() {
                    None
                } else {
                    Some(self.convert(&field.selection_set, depth)?)
                };
                Ok(Selection::Field(FieldSelection {
                    name: field.name.clone(),
                    alias: field.alias.clone(),
                    arguments: field.arguments.clone(),
                    conditions: to_conditions(&field.directives),
                    selection
                }))
            }
            query::Selection::InlineFragment(fragment) => Ok(Selection::Group {
                type_condition: fragment
                    .type_condition
                    .as_ref()
                    .map(|TypeCondition::On(on)| on.clone()),
                conditions: to_conditions(&fragment.directives),
                selection: self.convert(&fragment.selection_set, depth)?
            }),
            query::Selection::FragmentSpread(spread) => {
                let name = spread.fragment_name.as_str();
                if depth >= MAX_FRAGMENT_DEPTH {
                    return Err(DocumentError::FragmentDepth(name.to_string()));
                }
                let definition = self
                    .definitions
                    .get(name)
                    .ok_or_else(|| DocumentError::UnknownFragment(name.to_string()))?;
                let TypeCondition::On(ref on) = definition.type_condition;
                Ok(Selection::Group {
                    type_condition: Some(on.clone()),
                    conditions: to_conditions(&spread.directives),
                    selection: self.convert(&definition.selection_set, depth + 1)?
                })
            }
        }
    }
}

fn operation_parts(
    operation: &OperationDefinition
) -> (OperationType, Option<&str>, &query::SelectionSet) {
    match operation {
        OperationDefinition::SelectionSet(set) => (OperationType::Query, None, set),
        OperationDefinition::Query(q) => (OperationType::Query, q.name.as_deref(), &q.selection_set),
        OperationDefinition::Mutation(m) => {
            (OperationType::Mutation, m.name.as_deref(), &m.selection_set)
        }
        OperationDefinition::Subscription(s) => (
            OperationType::Subscription,
            s.name.as_deref(),
            &s.selection_set
        )
    }
}

impl Document {
    /// Parse `query` and extract the operation called `operation_name`. A document with a single
    /// operation is used regardless of its name.
    pub fn parse(query: &str, operation_name: &str) -> Result<Self, DocumentError> {
        let document =
            graphql_parser::parse_query(query).map_err(|e| DocumentError::Parse(e.to_string()))?;

        let mut operations = Vec::new();
        let mut definitions = FnvHashMap::default();
        for definition in &document.definitions {
            match definition {
                Definition::Operation(operation) => operations.push(operation_parts(operation)),
                Definition::Fragment(fragment) => {
                    definitions.insert(fragment.name.as_str(), fragment);
                }
            }
        }

        let operation = if operations.len() == 1 {
            operations.pop()
        } else {
            operations
                .into_iter()
                .find(|(_, name, _)| *name == Some(operation_name))
        };
        let (operation_type, _, selection_set) = operation
            .ok_or_else(|| DocumentError::OperationNotFound(operation_name.to_string()))?;

        let fragments = Fragments { definitions };
        Ok(Document {
            operation_type,
            selection: fragments.convert(selection_set, 0)?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(selection: &[Selection]) -> Vec<&FieldSelection> {
        selection
            .iter()
            .filter_map(|item| match item {
                Selection::Field(field) => Some(field),
                _ => None
            })
            .collect()
    }

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn picks_named_operation() {
        let document = Document::parse(
            "query A { a } mutation B { updateMod(modId: \"x\") { id } }",
            "B"
        )
        .unwrap();

        assert_eq!(document.operation_type, OperationType::Mutation);
        assert_eq!(fields(&document.selection)[0].name, "updateMod");
    }

    #[test]
    fn missing_operation_is_an_error() {
        let error = Document::parse("query A { a } query B { b }", "C").unwrap_err();
        assert!(matches!(error, DocumentError::OperationNotFound(_)));
    }

    #[test]
    fn inlines_fragment_spreads() {
        let document = Document::parse(
            "query GetMod { getMod(modId: \"x\") { ...ModFields } } fragment ModFields on Mod { id name }",
            "GetMod"
        )
        .unwrap();

        let get_mod = fields(&document.selection)[0];
        match &get_mod.selection.as_ref().unwrap()[0] {
            Selection::Group {
                type_condition,
                selection,
                ..
            } => {
                assert_eq!(type_condition.as_deref(), Some("Mod"));
                assert_eq!(fields(selection).len(), 2);
            }
            other => panic!("expected a group, got {:?}", other)
        }
    }

    #[test]
    fn fragment_cycles_are_rejected() {
        let error = Document::parse(
            "query Q { a { ...F } } fragment F on A { b { ...F } }",
            "Q"
        )
        .unwrap_err();
        assert!(matches!(error, DocumentError::FragmentDepth(_)));
    }

    #[test]
    fn field_keys_substitute_variables() {
        let document = Document::parse(
            "query Q($ref: ModReference!) { getModByReference(modReference: $ref) { id } other: getMods(filter: { limit: 10, search: $search }) { count } }",
            "Q"
        )
        .unwrap();
        let variables = vars(json!({ "ref": "SML" }));
        let selected = fields(&document.selection);

        let args = selected[0].arguments(&variables);
        assert_eq!(
            selected[0].field_key(&args),
            r#"getModByReference({"modReference":"SML"})"#
        );

        let args = selected[1].arguments(&variables);
        assert_eq!(selected[1].response_key(), "other");
        assert_eq!(selected[1].field_key(&args), r#"getMods({"filter":{"limit":10}})"#);
    }

    #[test]
    fn include_and_skip() {
        let document = Document::parse(
            "query Q($a: Boolean!) { x @include(if: $a) y @skip(if: $a) z }",
            "Q"
        )
        .unwrap();
        let variables = vars(json!({ "a": true }));
        let included: Vec<_> = fields(&document.selection)
            .into_iter()
            .filter(|field| field.is_included(&variables))
            .map(|field| field.name.as_str())
            .collect();

        assert_eq!(included, vec!["x", "z"]);
    }
}
