use flurry::epoch;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;

type FlurryMap<K, V> = flurry::HashMap<K, V>;
type EntityMap<V> = FlurryMap<String, Mutex<HashMap<String, V>>>;

/// A reference from a field to one or more entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Null,
    Entity(String),
    List(Vec<Link>)
}

/// The normalized data: scalar records and links, both keyed by entity key then field key.
#[derive(Default)]
pub struct InMemoryData {
    records: EntityMap<Value>,
    links: EntityMap<Link>
}

impl InMemoryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_record(&self, entity_key: &str, field_key: &str) -> Option<Value> {
        let guard = epoch::pin();
        self.records
            .get(entity_key, &guard)
            .and_then(|entity| entity.lock().get(field_key).cloned())
    }

    pub fn read_link(&self, entity_key: &str, field_key: &str) -> Option<Link> {
        let guard = epoch::pin();
        self.links
            .get(entity_key, &guard)
            .and_then(|entity| entity.lock().get(field_key).cloned())
    }

    pub fn has_entity(&self, entity_key: &str) -> bool {
        let guard = epoch::pin();
        self.records.contains_key(entity_key, &guard) || self.links.contains_key(entity_key, &guard)
    }

    /// The scalar fields of an entity, keyed by field key.
    pub fn records_of(&self, entity_key: &str) -> Map<String, Value> {
        let guard = epoch::pin();
        self.records
            .get(entity_key, &guard)
            .map(|entity| {
                entity
                    .lock()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn write_record(&self, entity_key: &str, field_key: String, value: Value) {
        write_field(&self.records, entity_key, field_key, value);
    }

    pub fn write_link(&self, entity_key: &str, field_key: String, link: Link) {
        write_field(&self.links, entity_key, field_key, link);
    }
}

fn write_field<V: 'static + Send>(map: &EntityMap<V>, entity_key: &str, field_key: String, value: V) {
    let guard = epoch::pin();
    if let Some(entity) = map.get(entity_key, &guard) {
        entity.lock().insert(field_key, value);
        return;
    }

    let mut fields = HashMap::new();
    fields.insert(field_key.clone(), value);
    // Another writer may have created the entity between the lookup and the insert.
    if let Err(existing) = map.try_insert(entity_key.to_string(), Mutex::new(fields), &guard) {
        let mut fields = existing.not_inserted.into_inner();
        if let Some(value) = fields.remove(&field_key) {
            existing.current.lock().insert(field_key, value);
        }
    }
}
