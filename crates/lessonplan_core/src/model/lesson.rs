//! Lesson catalog model.
//!
//! # Responsibility
//! - Describe lessons as loaded from the content library.
//! - Provide read-only lookups in catalog order.
//!
//! # Invariants
//! - The catalog is immutable for the lifetime of a session.
//! - Catalog order is the order lessons were supplied; the first record wins
//!   when an id repeats.
//! - Activities are opaque to planning logic and preserved field-for-field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lesson identifier as used by units and half-term slots.
///
/// Kept as a plain string: persisted references may point at lessons that
/// are no longer in the catalog and must survive untouched.
pub type LessonId = String;

/// One teaching item inside a lesson.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Activity {
    fields: Map<String, Value>,
}

impl Activity {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Display title, read from `activity` or `title` when present.
    pub fn title(&self) -> Option<&str> {
        self.fields
            .get("activity")
            .or_else(|| self.fields.get("title"))
            .and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Catalog entry: a lesson with its activities grouped by category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default)]
    pub id: LessonId,
    #[serde(default)]
    pub title: String,
    /// Minutes.
    #[serde(default)]
    pub total_duration: u32,
    #[serde(default, alias = "categoryOrder")]
    pub categories: Vec<String>,
    #[serde(default, alias = "grouped")]
    pub activities: BTreeMap<String, Vec<Activity>>,
}

impl Lesson {
    pub fn new(id: impl Into<LessonId>, title: impl Into<String>, total_duration: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            total_duration,
            ..Self::default()
        }
    }

    /// Activities in category order; categories missing from `categories`
    /// follow in name order.
    pub fn activities_in_order(&self) -> Vec<(&str, &Activity)> {
        let mut ordered = Vec::new();
        for category in &self.categories {
            if let Some(items) = self.activities.get(category) {
                ordered.extend(items.iter().map(|item| (category.as_str(), item)));
            }
        }
        for (category, items) in &self.activities {
            if self.categories.contains(category) {
                continue;
            }
            ordered.extend(items.iter().map(|item| (category.as_str(), item)));
        }
        ordered
    }
}

/// Catalog parse error.
#[derive(Debug)]
pub enum CatalogError {
    Parse(serde_json::Error),
    /// JSON was valid but not an array or object of lessons.
    UnsupportedShape(&'static str),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid lesson catalog json: {err}"),
            Self::UnsupportedShape(found) => {
                write!(f, "lesson catalog must be an array or object, got {found}")
            }
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::UnsupportedShape(_) => None,
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Read-only lesson lookup keyed by id, iterated in catalog order.
#[derive(Debug, Clone, Default)]
pub struct LessonCatalog {
    lessons: Vec<Lesson>,
    index: HashMap<LessonId, usize>,
}

impl LessonCatalog {
    pub fn new(lessons: impl IntoIterator<Item = Lesson>) -> Self {
        let mut catalog = Self::default();
        for lesson in lessons {
            if catalog.index.contains_key(&lesson.id) {
                continue;
            }
            catalog
                .index
                .insert(lesson.id.clone(), catalog.lessons.len());
            catalog.lessons.push(lesson);
        }
        catalog
    }

    /// Parses either `[lesson, ...]` or `{ "<id>": lesson, ... }`.
    ///
    /// In the keyed form the key fills a missing or blank record id.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let value: Value = serde_json::from_str(raw)?;
        match value {
            Value::Array(items) => {
                let lessons = items
                    .into_iter()
                    .map(serde_json::from_value::<Lesson>)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::new(lessons))
            }
            Value::Object(entries) => {
                let mut lessons = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    let mut lesson: Lesson = serde_json::from_value(item)?;
                    if lesson.id.trim().is_empty() {
                        lesson.id = key;
                    }
                    lessons.push(lesson);
                }
                Ok(Self::new(lessons))
            }
            Value::Null => Err(CatalogError::UnsupportedShape("null")),
            Value::Bool(_) => Err(CatalogError::UnsupportedShape("boolean")),
            Value::Number(_) => Err(CatalogError::UnsupportedShape("number")),
            Value::String(_) => Err(CatalogError::UnsupportedShape("string")),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Lesson> {
        self.index.get(id).map(|position| &self.lessons[*position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Lesson ids in catalog order.
    pub fn lesson_ids(&self) -> Vec<LessonId> {
        self.lessons.iter().map(|lesson| lesson.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lesson> {
        self.lessons.iter()
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    /// Lessons whose title, category names or activity titles contain
    /// `text`, case-insensitively. Blank text yields every lesson.
    pub fn search(&self, text: &str) -> Vec<&Lesson> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.lessons.iter().collect();
        }
        self.lessons
            .iter()
            .filter(|lesson| lesson_matches(lesson, needle.as_str()))
            .collect()
    }
}

fn lesson_matches(lesson: &Lesson, needle: &str) -> bool {
    if lesson.title.to_lowercase().contains(needle) {
        return true;
    }
    if lesson
        .activities
        .keys()
        .chain(lesson.categories.iter())
        .any(|category| category.to_lowercase().contains(needle))
    {
        return true;
    }
    lesson
        .activities
        .values()
        .flatten()
        .filter_map(Activity::title)
        .any(|title| title.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::{CatalogError, LessonCatalog};

    const CATALOG_JSON: &str = r#"{
        "1": {
            "title": "Lesson 1",
            "totalDuration": 25,
            "categoryOrder": ["Welcome", "Singing"],
            "grouped": {
                "Welcome": [{ "activity": "Hello Song", "time": 5 }],
                "Singing": [{ "activity": "Twinkle Twinkle", "time": 10 }]
            }
        },
        "2": { "title": "Lesson 2", "totalDuration": 30 }
    }"#;

    #[test]
    fn keyed_catalog_uses_keys_as_ids() {
        let catalog = LessonCatalog::from_json(CATALOG_JSON).unwrap();
        assert_eq!(catalog.len(), 2);
        let lesson = catalog.get("1").unwrap();
        assert_eq!(lesson.title, "Lesson 1");
        assert_eq!(lesson.total_duration, 25);
        assert_eq!(lesson.categories, vec!["Welcome", "Singing"]);
        let ordered = lesson.activities_in_order();
        assert_eq!(ordered[0].0, "Welcome");
        assert_eq!(ordered[1].1.title(), Some("Twinkle Twinkle"));
    }

    #[test]
    fn search_matches_activity_titles_case_insensitively() {
        let catalog = LessonCatalog::from_json(CATALOG_JSON).unwrap();
        let hits = catalog.search("twinkle");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
        assert_eq!(catalog.search("  ").len(), 2);
    }

    #[test]
    fn scalar_json_is_rejected() {
        let err = LessonCatalog::from_json("42").unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedShape("number")));
    }
}
