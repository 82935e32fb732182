pub mod keeper;

pub use keeper::Keeper;

use camino::Utf8Path;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::markup;
use crate::record::{slugify, sortify, string_values, Document};

const TIMESTAMP_FIELDS: [&str; 2] = ["createdAt", "publishedAt"];

#[derive(Debug, thiserror::Error)]
pub enum ReadFromPathError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Frontmatter is not a string-keyed mapping: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Path has no file name: {0}")]
    NoFileName(String),
}

#[derive(Debug, Clone)]
pub struct FrontmatterFile {
    pub name: String,
    pub frontmatter: Option<serde_yaml::Mapping>,
    pub body: String,
    pub created: DateTime<Utc>,
}

fn split_frontmatter(string: &str) -> Result<(Option<serde_yaml::Mapping>, &str), serde_yaml::Error> {
    let Some(rest) = string.strip_prefix("---\n") else {
        return Ok((None, string));
    };
    let Some((frontmatter, body)) = rest.split_once("---\n") else {
        return Ok((None, string));
    };
    let frontmatter = serde_yaml::from_str(frontmatter)?;
    Ok((Some(frontmatter), body))
}

fn normalize_timestamp(value: &Value) -> Option<Value> {
    let text = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return serde_json::to_value(dt.with_timezone(&Utc)).ok();
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    let dt = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    serde_json::to_value(dt).ok()
}

impl FrontmatterFile {
    pub fn from_string(
        name: String,
        string: &str,
        created: DateTime<Utc>,
    ) -> Result<Self, serde_yaml::Error> {
        let (frontmatter, body) = split_frontmatter(string)?;
        Ok(FrontmatterFile {
            name,
            frontmatter,
            body: body.to_owned(),
            created,
        })
    }

    pub fn read_from_path(path: &Utf8Path) -> Result<Self, ReadFromPathError> {
        let name = path
            .file_name()
            .ok_or_else(|| ReadFromPathError::NoFileName(path.to_string()))?
            .to_owned();
        let metadata = std::fs::metadata(path)?;
        let created = metadata.created().or_else(|_| metadata.modified())?;
        let string = std::fs::read_to_string(path)?;
        Ok(Self::from_string(name, &string, created.into())?)
    }

    fn stem(&self) -> &str {
        Utf8Path::new(&self.name).file_stem().unwrap_or(&self.name)
    }

    /// The stored form of this file, with identity, slug, sort and search fields filled in.
    pub fn to_document(&self) -> Result<Document, ReadFromPathError> {
        let mut doc = match &self.frontmatter {
            Some(frontmatter) => markup::yaml_to_json(frontmatter)?,
            None => Document::new(),
        };

        let stem = self.stem().to_owned();
        let id = doc
            .get("_id")
            .and_then(Value::as_str)
            .map_or_else(|| stem.clone(), str::to_owned);
        let title = doc
            .get("title")
            .and_then(Value::as_str)
            .map_or_else(|| stem.clone(), str::to_owned);
        let slug = doc
            .get("slug")
            .and_then(Value::as_str)
            .map_or_else(|| slugify(&title), str::to_owned);

        let mut tags = doc.get("tags").map(string_values).unwrap_or_default();
        tags.sort();
        tags.dedup();

        for field in TIMESTAMP_FIELDS {
            let Some(value) = doc.remove(field) else {
                continue;
            };
            match normalize_timestamp(&value) {
                Some(value) => {
                    doc.insert(field.to_owned(), value);
                }
                None => warn!("Dropping unreadable {field} ({value}) in {}", self.name),
            }
        }
        if !doc.contains_key("createdAt") {
            doc.insert("createdAt".to_owned(), serde_json::to_value(self.created)?);
        }

        let search_text = sortify(&format!("{title} {} {}", tags.join(" "), self.body));

        doc.insert("_id".to_owned(), Value::String(id));
        doc.insert("sortTitle".to_owned(), Value::String(sortify(&title)));
        doc.insert("title".to_owned(), Value::String(title));
        doc.insert("slug".to_owned(), Value::String(slug));
        doc.insert("tags".to_owned(), tags.into_iter().map(Value::String).collect());
        doc.entry("published").or_insert(Value::Bool(true));
        doc.entry("trash").or_insert(Value::Bool(false));
        doc.insert("body".to_owned(), Value::String(self.body.clone()));
        doc.insert("searchText".to_owned(), Value::String(search_text));

        Ok(doc)
    }
}
