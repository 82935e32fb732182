use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Document = serde_json::Map<String, Value>;

pub const PATH_SEPARATOR: char = '/';

fn default_true() -> bool {
    true
}

/// A typed, taggable content record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub sort_title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub published: bool,
    #[serde(default)]
    pub trash: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Schema-defined custom fields, plus anything attached by joins.
    #[serde(flatten)]
    pub fields: Document,
}

impl Item {
    /// Values of `property` as a list of strings; `tags` reads the tag set.
    #[must_use]
    pub fn values(&self, property: &str) -> Vec<String> {
        if property == "tags" {
            return self.tags.clone();
        }
        self.fields.get(property).map(string_values).unwrap_or_default()
    }
}

/// A navigable record that can serve as a permalink parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerPage {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub settings: Document,
}

impl ContainerPage {
    /// Declared values for `property` in the page settings, empty when absent.
    #[must_use]
    pub fn setting_values(&self, property: &str) -> Vec<String> {
        self.settings
            .get(property)
            .map(string_values)
            .unwrap_or_default()
    }

    /// The page slug without a trailing separator.
    #[must_use]
    pub fn base_path(&self) -> &str {
        self.slug.trim_end_matches(PATH_SEPARATOR)
    }
}

/// A string is a one-element list; arrays keep only their string elements.
#[must_use]
pub fn string_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(v) => vec![v.clone()],
        Value::Array(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        _ => vec![],
    }
}

fn collapse(input: &str, separator: char) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending && !out.is_empty() {
                out.push(separator);
            }
            pending = false;
            out.push(ch);
        } else {
            pending = true;
        }
    }
    out
}

/// URL-safe slug derived from a title.
#[must_use]
pub fn slugify(title: &str) -> String {
    collapse(title, '-')
}

/// Normalized form used for sorting and text search.
#[must_use]
pub fn sortify(text: &str) -> String {
    collapse(text, ' ')
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{slugify, sortify, ContainerPage, Item};

    #[test]
    fn slugs_and_sort_titles() {
        assert_eq!("hello-world", slugify("  Hello, World! "));
        assert_eq!("élan-vital-2", slugify("Élan  vital -- 2"));
        assert_eq!("the quick fox", sortify("The Quick_Fox"));
        assert_eq!("", slugify("?!"));
    }

    #[test]
    fn item_keeps_custom_fields() {
        let item: Item = serde_json::from_value(json!({
            "_id": "a1",
            "type": "blogPost",
            "title": "First",
            "slug": "first",
            "tags": ["red"],
            "categories": ["news", 3, "events"],
            "color": "teal"
        }))
        .unwrap();

        assert!(item.published);
        assert!(!item.trash);
        assert_eq!(vec!["red".to_owned()], item.values("tags"));
        assert_eq!(
            vec!["news".to_owned(), "events".to_owned()],
            item.values("categories")
        );
        assert_eq!(vec!["teal".to_owned()], item.values("color"));
        assert!(item.values("missing").is_empty());
    }

    #[test]
    fn page_settings() {
        let page: ContainerPage = serde_json::from_value(json!({
            "_id": "p1",
            "type": "blog",
            "slug": "/news/",
            "settings": { "tags": ["red", "blue"] }
        }))
        .unwrap();

        assert_eq!("/news", page.base_path());
        assert_eq!(vec!["red", "blue"], page.setting_values("tags"));
        assert!(page.setting_values("notTags").is_empty());
    }
}
