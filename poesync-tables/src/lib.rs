//! Local string storage for poesync.
//!
//! A [`TableCollection`] is a named set of per-locale [`StringTable`]s. The
//! collection also carries the ordered list of locales the host application
//! declares as available, which is what the synchronization pipeline mirrors.
//!
//! ```ignore
//! use poesync_tables::{TableCollection, StringTable};
//!
//! let mut strings = TableCollection::new("Strings");
//! let mut en = StringTable::new("en");
//! en.insert("greeting", "Hello, %@!");
//! strings.add_table(en);
//!
//! assert_eq!(strings.localize("en", "greeting", &["World"]), "Hello, World!");
//! ```
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

pub mod error;
pub mod format;
pub mod store;
pub mod xliff;

pub use error::{TableError, TableResult};
pub use format::{LocaleString, Subscription, format_positional};
pub use store::{init_collection, load_collection, load_table_from_file};
pub use xliff::{TransUnit, parse_xliff, read_xliff_file, write_xliff};

/// Translated entries for a single locale, keyed by entry name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    locale: String,
    entries: BTreeMap<String, String>,
}

impl StringTable {
    pub fn new(locale: &str) -> Self {
        StringTable {
            locale: locale.to_owned(),
            entries: BTreeMap::new(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn insert(&mut self, key: &str, value: &str) -> &mut Self {
        self.entries.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry from the table
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Import interchange units into the table
    ///
    /// Units without a translation are ignored. Returns the number of
    /// entries written.
    pub fn import(&mut self, units: &[TransUnit]) -> usize {
        let mut imported = 0;
        for unit in units {
            if let Some(target) = unit.target.as_deref().filter(|t| !t.is_empty()) {
                self.entries.insert(unit.key.clone(), target.to_owned());
                imported += 1;
            }
        }
        imported
    }
}

/// A named collection of per-locale string tables
#[derive(Debug, Clone)]
pub struct TableCollection {
    name: String,
    /// Directory the collection was loaded from, if any
    root: Option<PathBuf>,
    /// Locales declared by the host application, in declaration order
    locales: Vec<String>,
    tables: HashMap<String, StringTable>,
    dirty: BTreeSet<String>,
}

impl TableCollection {
    pub fn new(name: &str) -> Self {
        TableCollection {
            name: name.to_owned(),
            root: None,
            locales: Vec::new(),
            tables: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub(crate) fn with_root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Declare a locale as available without creating a table for it
    pub fn declare_locale(&mut self, locale: &str) -> &mut Self {
        if !self.locales.iter().any(|l| l == locale) {
            self.locales.push(locale.to_owned());
        }
        self
    }

    /// Add a table, declaring its locale if needed
    pub fn add_table(&mut self, table: StringTable) -> &mut Self {
        let locale = table.locale.clone();
        self.declare_locale(&locale);
        self.tables.insert(locale, table);
        self
    }

    /// Locales the host application declares, in order
    pub fn available_locales(&self) -> &[String] {
        &self.locales
    }

    pub fn table(&self, locale: &str) -> Option<&StringTable> {
        self.tables.get(locale)
    }

    /// Mutable access to a table; the table is marked dirty for the next commit
    pub fn table_mut(&mut self, locale: &str) -> Option<&mut StringTable> {
        let table = self.tables.get_mut(locale)?;
        self.dirty.insert(locale.to_owned());
        Some(table)
    }

    /// Locales whose tables changed since the last commit
    pub fn dirty_locales(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty.clear();
    }

    /// Look up `key` for `locale` and substitute `%@` placeholders with `args`
    ///
    /// Falls back to the key itself when the locale or entry is missing.
    pub fn localize<S: AsRef<str>>(&self, locale: &str, key: &str, args: &[S]) -> String {
        match self.table(locale).and_then(|t| t.get(key)) {
            Some(message) => format_positional(message, args),
            None => {
                tracing::debug!(locale, key, "No entry found, using key");
                key.to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(key: &str, target: Option<&str>) -> TransUnit {
        TransUnit {
            key: key.to_string(),
            source: Some(key.to_string()),
            target: target.map(str::to_string),
        }
    }

    #[test]
    fn test_localization() {
        let mut en = StringTable::new("en");
        en.insert("greeting", "Hello, %@!")
            .insert("farewell", "Goodbye, %@!");

        let mut strings = TableCollection::new("Strings");
        strings.add_table(en);

        assert_eq!(strings.localize("en", "greeting", &["World"]), "Hello, World!");
        assert_eq!(strings.localize("en", "farewell", &["World"]), "Goodbye, World!");
    }

    #[test]
    fn test_localize_missing_returns_key() {
        let mut strings = TableCollection::new("Strings");
        strings.add_table(StringTable::new("en"));

        let no_args: [&str; 0] = [];
        assert_eq!(strings.localize("en", "nonexistent", &no_args), "nonexistent");
        assert_eq!(strings.localize("fr", "nonexistent", &no_args), "nonexistent");
    }

    #[test]
    fn test_declared_locales_keep_order_without_duplicates() {
        let mut strings = TableCollection::new("Strings");
        strings
            .declare_locale("fr")
            .declare_locale("en")
            .declare_locale("fr");
        strings.add_table(StringTable::new("de"));

        assert_eq!(strings.available_locales(), &["fr", "en", "de"]);
        assert!(strings.table("fr").is_none());
        assert!(strings.table("de").is_some());
    }

    #[test]
    fn test_import_skips_untranslated_units() {
        let mut table = StringTable::new("fr");
        let units = vec![
            unit("hello", Some("Bonjour")),
            unit("empty", Some("")),
            unit("missing", None),
        ];

        assert_eq!(table.import(&units), 1);
        assert_eq!(table.get("hello"), Some("Bonjour"));
        assert_eq!(table.get("empty"), None);
        assert_eq!(table.get("missing"), None);
    }

    #[test]
    fn test_table_mut_marks_dirty() {
        let mut strings = TableCollection::new("Strings");
        strings.add_table(StringTable::new("en"));
        strings.add_table(StringTable::new("fr"));
        assert_eq!(strings.dirty_locales().count(), 0);

        strings.table_mut("fr").unwrap().insert("k", "v");
        assert!(strings.table_mut("xx").is_none());

        assert_eq!(strings.dirty_locales().collect::<Vec<_>>(), vec!["fr"]);
    }
}
