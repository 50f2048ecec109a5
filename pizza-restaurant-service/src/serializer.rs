//! Nested JSON rendering of stored records.
//!
//! Every record type declares exclusion rules such as
//! `-restaurant_pizzas.restaurant`. A rule with one segment drops that field
//! where it applies; longer rules are handed down to the relation named by
//! their first segment. When a relation is rendered, the embedded record's own
//! rules are added to what it inherited, so the back-references that would
//! otherwise recurse forever are cut at every level.

use diesel::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{Pizza, Restaurant, RestaurantPizza};
use crate::store::{self, StoreError};

/// Relations below this depth are left out even if no rule excludes them.
pub const MAX_DEPTH: usize = 8;

type BoxedRecord = Box<dyn Record>;

pub enum Related {
    One(Option<BoxedRecord>),
    Many(Vec<BoxedRecord>),
}

type Loader<'r> = Box<dyn FnOnce(&mut SqliteConnection) -> QueryResult<Related> + 'r>;

/// A lazily loaded relation of a record.
pub struct Relation<'r> {
    name: &'static str,
    load: Loader<'r>,
}

impl<'r> Relation<'r> {
    pub fn one<R, F>(name: &'static str, load: F) -> Self
    where
        R: Record + 'static,
        F: FnOnce(&mut SqliteConnection) -> QueryResult<Option<R>> + 'r,
    {
        Self {
            name,
            load: Box::new(move |conn| {
                Ok(Related::One(
                    load(conn)?.map(|record| Box::new(record) as BoxedRecord),
                ))
            }),
        }
    }

    pub fn many<R, F>(name: &'static str, load: F) -> Self
    where
        R: Record + 'static,
        F: FnOnce(&mut SqliteConnection) -> QueryResult<Vec<R>> + 'r,
    {
        Self {
            name,
            load: Box::new(move |conn| {
                Ok(Related::Many(
                    load(conn)?
                        .into_iter()
                        .map(|record| Box::new(record) as BoxedRecord)
                        .collect(),
                ))
            }),
        }
    }
}

pub trait Record {
    fn serialize_rules(&self) -> &'static [&'static str];

    fn columns(&self) -> Result<Map<String, Value>, serde_json::Error>;

    fn relations(&self) -> Vec<Relation<'_>>;
}

fn column_map<T: Serialize>(value: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Ok(map)
        }
    }
}

impl Record for Restaurant {
    fn serialize_rules(&self) -> &'static [&'static str] {
        &["-restaurant_pizzas.restaurant"]
    }

    fn columns(&self) -> Result<Map<String, Value>, serde_json::Error> {
        column_map(self)
    }

    fn relations(&self) -> Vec<Relation<'_>> {
        vec![Relation::many("restaurant_pizzas", move |conn| {
            store::restaurant_pizzas_of_restaurant(conn, self)
        })]
    }
}

impl Record for Pizza {
    fn serialize_rules(&self) -> &'static [&'static str] {
        &["-restaurant_pizzas"]
    }

    fn columns(&self) -> Result<Map<String, Value>, serde_json::Error> {
        column_map(self)
    }

    fn relations(&self) -> Vec<Relation<'_>> {
        vec![Relation::many("restaurant_pizzas", move |conn| {
            store::restaurant_pizzas_of_pizza(conn, self)
        })]
    }
}

impl Record for RestaurantPizza {
    fn serialize_rules(&self) -> &'static [&'static str] {
        &["-pizza.restaurant_pizzas", "-restaurant.restaurant_pizzas"]
    }

    fn columns(&self) -> Result<Map<String, Value>, serde_json::Error> {
        column_map(self)
    }

    fn relations(&self) -> Vec<Relation<'_>> {
        let (pizza_id, restaurant_id) = (self.pizza_id, self.restaurant_id);
        vec![
            Relation::one("pizza", move |conn| store::find_pizza(conn, pizza_id)),
            Relation::one("restaurant", move |conn| {
                store::find_restaurant(conn, restaurant_id)
            }),
        ]
    }
}

fn parse_rules<'a>(rules: &[&'a str]) -> Vec<Vec<&'a str>> {
    rules
        .iter()
        .copied()
        .map(|rule| rule.strip_prefix('-').unwrap_or(rule))
        .filter(|rule| !rule.is_empty())
        .map(|rule| rule.split('.').collect())
        .collect()
}

/// Renders `record` and its relations, applying the record's own rules
/// together with `rules` supplied by the caller.
pub fn to_dict(
    record: &dyn Record,
    conn: &mut SqliteConnection,
    rules: &[&str],
) -> Result<Value, StoreError> {
    render(record, conn, parse_rules(rules), 0)
}

pub fn to_dict_all<R: Record>(
    records: &[R],
    conn: &mut SqliteConnection,
    rules: &[&str],
) -> Result<Value, StoreError> {
    records
        .iter()
        .map(|record| to_dict(record, conn, rules))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn render(
    record: &dyn Record,
    conn: &mut SqliteConnection,
    mut rules: Vec<Vec<&str>>,
    depth: usize,
) -> Result<Value, StoreError> {
    rules.extend(parse_rules(record.serialize_rules()));

    let excluded = |field: &str| rules.iter().any(|rule| rule.len() == 1 && rule[0] == field);

    let mut fields = record.columns()?;
    fields.retain(|name, _| !excluded(name.as_str()));

    if depth >= MAX_DEPTH {
        return Ok(Value::Object(fields));
    }

    for relation in record.relations() {
        if excluded(relation.name) {
            continue;
        }
        let nested = rules
            .iter()
            .filter(|rule| rule.len() > 1 && rule[0] == relation.name)
            .map(|rule| rule[1..].to_vec())
            .collect::<Vec<_>>();

        let value = match (relation.load)(conn)? {
            Related::One(None) => Value::Null,
            Related::One(Some(child)) => render(child.as_ref(), conn, nested, depth + 1)?,
            Related::Many(children) => Value::Array(
                children
                    .iter()
                    .map(|child| render(child.as_ref(), conn, nested.clone(), depth + 1))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        fields.insert(relation.name.to_string(), value);
    }

    Ok(Value::Object(fields))
}
