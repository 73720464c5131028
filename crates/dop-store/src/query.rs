//! Conjunctive query language understood by the object store.
//!
//! A query is a list of `field:value` terms joined by ` AND `. Values are
//! always quoted and escaped; numeric ranges render as
//! `field:[start TO end]` (inclusive).

use std::fmt;

use dop_types::{scalar_to_string, DigitalObject};
use serde_json::Value;

/// Characters that must be backslash-escaped inside a term value.
const RESERVED: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '|', '&',
    '/',
];

/// Quote a raw value and escape every reserved character.
///
/// Spaces are protected by the surrounding quotes.
pub fn escape_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// The object attribute a term constrains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Field {
    /// The object type.
    Type,
    /// The object id.
    Id,
    /// A content attribute addressed by `/`-separated path.
    Content(String),
    /// A store-maintained metadata attribute (`createdBy`, `modifiedOn`, ...).
    Metadata(String),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => write!(f, "type"),
            Self::Id => write!(f, "id"),
            Self::Content(path) => write!(f, "/{}", path.trim_start_matches('/')),
            Self::Metadata(name) => write!(f, "metadata/{name}"),
        }
    }
}

/// How a term matches its field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// Exact match against the scalar rendering of the field.
    Equals(String),
    /// Inclusive numeric range.
    Range { start: i64, end: i64 },
}

/// A single `field:value` clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Term {
    pub field: Field,
    pub predicate: Predicate,
}

impl Term {
    /// Returns `true` if the object satisfies this clause.
    pub fn matches(&self, object: &DigitalObject) -> bool {
        let Some(actual) = self.resolve(object) else {
            return false;
        };
        match &self.predicate {
            Predicate::Equals(expected) => scalar_to_string(&actual).as_deref() == Some(expected),
            Predicate::Range { start, end } => actual
                .as_i64()
                .map(|n| (*start..=*end).contains(&n))
                .unwrap_or(false),
        }
    }

    fn resolve(&self, object: &DigitalObject) -> Option<Value> {
        match &self.field {
            Field::Type => Some(Value::String(object.object_type.clone())),
            Field::Id => object.id.clone().map(Value::String),
            Field::Content(path) => object.content_at(path).cloned(),
            Field::Metadata(name) => {
                let metadata = serde_json::to_value(object.metadata.as_ref()?).ok()?;
                metadata.get(name).cloned()
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Predicate::Equals(value) => write!(f, "{}:{}", self.field, escape_value(value)),
            Predicate::Range { start, end } => write!(f, "{}:[{start} TO {end}]", self.field),
        }
    }
}

/// A conjunction of terms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    terms: Vec<Term>,
}

impl Query {
    /// An empty query (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Query for objects of the given type.
    pub fn of_type(object_type: impl Into<String>) -> Self {
        Self::new().equals(Field::Type, object_type)
    }

    /// Add an exact-match clause.
    pub fn equals(mut self, field: Field, value: impl Into<String>) -> Self {
        self.terms.push(Term {
            field,
            predicate: Predicate::Equals(value.into()),
        });
        self
    }

    /// Add an exact-match clause on a content path.
    pub fn content(self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals(Field::Content(path.into()), value)
    }

    /// Add an exact-match clause on a metadata attribute.
    pub fn metadata(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals(Field::Metadata(name.into()), value)
    }

    /// Add an inclusive numeric range clause.
    pub fn range(mut self, field: Field, start: i64, end: i64) -> Self {
        self.terms.push(Term {
            field,
            predicate: Predicate::Range { start, end },
        });
        self
    }

    /// The clauses of this query.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Returns `true` if the object satisfies every clause.
    pub fn matches(&self, object: &DigitalObject) -> bool {
        self.terms.iter().all(|term| term.matches(object))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dop_types::ObjectMetadata;
    use serde_json::{json, Map};

    fn specimen() -> DigitalObject {
        let Value::Object(content) = json!({"name": "Quercus robur", "count": 4, "loc": {"country": "NL"}})
        else {
            unreachable!()
        };
        let mut object = DigitalObject::new("Specimen", content).with_id("test/abc");
        object.metadata = Some(ObjectMetadata {
            created_on: 1_000,
            created_by: "alice".into(),
            modified_on: 2_000,
            modified_by: "bob".into(),
        });
        object
    }

    #[test]
    fn escape_reserved_characters() {
        assert_eq!(escape_value("20.5000/x-1"), r#""20.5000\/x\-1""#);
        assert_eq!(escape_value("a b"), r#""a b""#);
        assert_eq!(escape_value(r#"q"(1)"#), r#""q\"\(1\)""#);
        assert_eq!(escape_value(r"back\slash"), r#""back\\slash""#);
    }

    #[test]
    fn renders_conjunction() {
        let query = Query::of_type("Specimen")
            .equals(Field::Id, "test/abc")
            .metadata("modifiedBy", "bob")
            .range(Field::Metadata("modifiedOn".into()), 10, 20);
        assert_eq!(
            query.to_string(),
            r#"type:"Specimen" AND id:"test\/abc" AND metadata/modifiedBy:"bob" AND metadata/modifiedOn:[10 TO 20]"#
        );
    }

    #[test]
    fn content_terms_render_with_leading_slash() {
        let query = Query::new().content("loc/country", "NL");
        assert_eq!(query.to_string(), r#"/loc/country:"NL""#);
    }

    #[test]
    fn matches_type_id_content_and_metadata() {
        let object = specimen();
        assert!(Query::of_type("Specimen")
            .equals(Field::Id, "test/abc")
            .content("name", "Quercus robur")
            .content("count", "4")
            .content("loc/country", "NL")
            .metadata("createdBy", "alice")
            .matches(&object));
        assert!(!Query::of_type("Agent").matches(&object));
        assert!(!Query::new().content("missing", "x").matches(&object));
    }

    #[test]
    fn range_is_inclusive() {
        let object = specimen();
        let field = Field::Metadata("modifiedOn".into());
        assert!(Query::new().range(field.clone(), 2_000, 2_000).matches(&object));
        assert!(!Query::new().range(field.clone(), 0, 1_999).matches(&object));
        assert!(Query::new().range(field, 1_500, 7_000).matches(&object));
    }

    #[test]
    fn metadata_terms_fail_without_metadata() {
        let object = DigitalObject::new("Specimen", Map::new());
        assert!(!Query::new().metadata("createdBy", "alice").matches(&object));
        assert!(Query::new().matches(&object));
    }
}
