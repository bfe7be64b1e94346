//! Hydrated entity records

use super::value::FieldValue;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Language key of the default translation
pub const LANGCODE_DEFAULT: &str = "x-default";

/// Column name → value for one field item
pub type FieldItem = BTreeMap<String, FieldValue>;

/// Language → ordered field items
pub type LanguageItems = IndexMap<String, Vec<FieldItem>>;

/// A typed entity stored as triples
///
/// The id is the subject URI and doubles as the entity's identity. Field values
/// are indexed by field name, then language, then delta. The default
/// translation lives under [`LANGCODE_DEFAULT`]; other translations are listed
/// in `translations`. A record built with [`Record::new`] takes the engine's
/// default language on its first save unless one was set explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    entity_type: String,
    id: Option<String>,
    bundle: String,
    graph: Option<String>,
    original_graph: Option<String>,
    langcode: Option<String>,
    translations: IndexSet<String>,
    values: IndexMap<String, LanguageItems>,
    is_new: bool,
}

impl Record {
    /// New, unsaved record
    pub fn new(entity_type: impl Into<String>, bundle: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: None,
            bundle: bundle.into(),
            graph: None,
            original_graph: None,
            langcode: None,
            translations: IndexSet::new(),
            values: IndexMap::new(),
            is_new: true,
        }
    }

    /// Record hydrated from the store
    pub(crate) fn loaded(
        entity_type: &str,
        id: &str,
        bundle: &str,
        graph: &str,
        langcode: &str,
    ) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            id: Some(id.to_string()),
            bundle: bundle.to_string(),
            graph: Some(graph.to_string()),
            original_graph: Some(graph.to_string()),
            langcode: Some(langcode.to_string()),
            translations: IndexSet::new(),
            values: IndexMap::new(),
            is_new: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    pub fn with_langcode(mut self, langcode: impl Into<String>) -> Self {
        self.langcode = Some(langcode.into());
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// Active graph id
    pub fn graph(&self) -> Option<&str> {
        self.graph.as_deref()
    }

    pub fn set_graph(&mut self, graph: impl Into<String>) {
        self.graph = Some(graph.into());
    }

    /// Graph the record was loaded from or last saved to
    pub fn original_graph(&self) -> Option<&str> {
        self.original_graph.as_deref()
    }

    pub(crate) fn track_original_graph(&mut self) {
        self.original_graph = self.graph.clone();
    }

    /// Language of the default translation, once known
    pub fn langcode(&self) -> Option<&str> {
        self.langcode.as_deref()
    }

    /// Settle the default language of a record that has none yet
    ///
    /// Items already stored under that language become the default
    /// translation unless the default translation has its own.
    pub(crate) fn adopt_langcode(&mut self, langcode: &str) {
        if self.langcode.is_some() {
            return;
        }
        self.langcode = Some(langcode.to_string());
        if !self.translations.shift_remove(langcode) {
            return;
        }
        for languages in self.values.values_mut() {
            if let Some(items) = languages.shift_remove(langcode) {
                languages.entry(LANGCODE_DEFAULT.to_string()).or_insert(items);
            }
        }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Force the new flag; a new record with a taken id fails to save
    pub fn enforce_is_new(&mut self, value: bool) {
        self.is_new = value;
    }

    /// Non-default languages this record has a translation for
    pub fn translations(&self) -> impl Iterator<Item = &str> {
        self.translations.iter().map(|s| s.as_str())
    }

    pub fn has_translation(&self, langcode: &str) -> bool {
        langcode == LANGCODE_DEFAULT
            || self.langcode.as_deref() == Some(langcode)
            || self.translations.contains(langcode)
    }

    pub(crate) fn add_translation(&mut self, langcode: &str) {
        if langcode != LANGCODE_DEFAULT && self.langcode.as_deref() != Some(langcode) {
            self.translations.insert(langcode.to_string());
        }
    }

    /// Replace the default-language items of a field
    pub fn set_items(&mut self, field: impl Into<String>, items: Vec<FieldItem>) {
        self.set_translation_items(LANGCODE_DEFAULT, field, items);
    }

    /// Single-valued shortcut writing the `value` column
    pub fn set_value(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.set_column(field, "value", value);
    }

    /// Single item with one column
    pub fn set_column(
        &mut self,
        field: impl Into<String>,
        column: impl Into<String>,
        value: impl Into<FieldValue>,
    ) {
        let mut item = FieldItem::new();
        item.insert(column.into(), value.into());
        self.set_items(field, vec![item]);
    }

    /// Replace the items of a field for one language, registering the translation
    pub fn set_translation_items(
        &mut self,
        langcode: &str,
        field: impl Into<String>,
        items: Vec<FieldItem>,
    ) {
        let langcode = self.normalize_langcode(langcode);
        self.add_translation(&langcode);
        self.values
            .entry(field.into())
            .or_default()
            .insert(langcode, items);
    }

    pub fn set_translation_value(
        &mut self,
        langcode: &str,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
    ) {
        let mut item = FieldItem::new();
        item.insert("value".to_string(), value.into());
        self.set_translation_items(langcode, field, vec![item]);
    }

    /// Default-language items of a field
    pub fn get(&self, field: &str) -> Option<&[FieldItem]> {
        self.get_translation(field, LANGCODE_DEFAULT)
    }

    pub fn get_translation(&self, field: &str, langcode: &str) -> Option<&[FieldItem]> {
        let langcode = self.normalize_langcode(langcode);
        self.values
            .get(field)
            .and_then(|langs| langs.get(&langcode))
            .map(|items| items.as_slice())
    }

    /// First default-language value of the `value` column
    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.get(field)
            .and_then(|items| items.first())
            .and_then(|item| item.get("value"))
    }

    pub fn remove(&mut self, field: &str) -> Option<LanguageItems> {
        self.values.shift_remove(field)
    }

    /// Field names with at least one language
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|s| s.as_str())
    }

    pub(crate) fn field_languages(&self) -> impl Iterator<Item = (&str, &LanguageItems)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn normalize_langcode(&self, langcode: &str) -> String {
        if self.langcode.as_deref() == Some(langcode) {
            LANGCODE_DEFAULT.to_string()
        } else {
            langcode.to_string()
        }
    }
}
