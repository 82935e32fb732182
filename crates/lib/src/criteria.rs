use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{sortify, Document};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Prefix(String),
    Exists(bool),
    /// Every word of the needle appears in the normalized field text.
    Contains(String),
}

fn candidates(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(seq) => Box::new(seq.iter()),
        scalar => Box::new(std::iter::once(scalar)),
    }
}

impl Condition {
    #[must_use]
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => {
                value.is_some_and(|v| v == expected || candidates(v).any(|c| c == expected))
            }
            Condition::Ne(expected) => !Condition::Eq(expected.clone()).matches(value),
            Condition::In(set) => {
                value.is_some_and(|v| candidates(v).any(|c| set.iter().any(|s| s == c)))
            }
            Condition::Nin(set) => !Condition::In(set.clone()).matches(value),
            Condition::Prefix(prefix) => value.is_some_and(|v| {
                candidates(v).any(|c| c.as_str().is_some_and(|s| s.starts_with(prefix.as_str())))
            }),
            Condition::Exists(expected) => value.is_some() == *expected,
            Condition::Contains(needle) => {
                let words = sortify(needle);
                value.is_some_and(|v| {
                    candidates(v).any(|c| {
                        c.as_str().is_some_and(|text| {
                            let text = sortify(text);
                            words.split(' ').all(|word| text.contains(word))
                        })
                    })
                })
            }
        }
    }
}

/// A composite filter over stored documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criteria {
    #[default]
    All,
    And(Vec<Criteria>),
    Or(Vec<Criteria>),
    Not(Box<Criteria>),
    Field(String, Condition),
}

impl Criteria {
    pub fn field(name: impl Into<String>, condition: Condition) -> Self {
        Criteria::Field(name.into(), condition)
    }

    /// Conjoins clauses, flattening nested conjunctions and dropping `All`.
    pub fn and(clauses: impl IntoIterator<Item = Criteria>) -> Self {
        let mut flat = vec![];
        for clause in clauses {
            match clause {
                Criteria::All => {}
                Criteria::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Criteria::All,
            1 => flat.remove(0),
            _ => Criteria::And(flat),
        }
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Criteria::All)
    }

    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Criteria::All => true,
            Criteria::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Criteria::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
            Criteria::Not(inner) => !inner.matches(doc),
            Criteria::Field(name, condition) => condition.matches(doc.get(name)),
        }
    }
}
