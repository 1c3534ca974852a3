use crate::error::{TableError, TableResult};
use crate::{StringTable, TableCollection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the collection manifest
pub const MANIFEST_FILE: &str = "collection.json";

/// On-disk description of a collection
///
/// ```json
/// {
///     "name": "Strings",
///     "locales": ["en", "fr", "de"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    name: String,
    #[serde(default)]
    locales: Vec<String>,
}

/// Load one table from a JSON file
///
/// The JSON file has the following structure:
/// ```json
/// {
///     "@metadata": { ... },  // Ignored
///     "entry-key": "entry text",
///     "another-key": "another text"
/// }
/// ```
pub fn load_table_from_file(path: &Path, locale: &str) -> TableResult<StringTable> {
    let content = fs::read_to_string(path).map_err(|e| TableError::io(path, e))?;
    let json: Value = serde_json::from_str(&content).map_err(|e| TableError::json(path, e))?;

    let obj = json.as_object().ok_or_else(|| {
        TableError::Invalid(format!(
            "Invalid JSON in '{}': root must be an object",
            path.display()
        ))
    })?;

    let mut table = StringTable::new(locale);
    for (key, value) in obj {
        if key.starts_with('@') {
            continue;
        }

        if let Some(text) = value.as_str() {
            table.insert(key, text);
        } else {
            tracing::warn!(key = %key, path = %path.display(), "Entry is not a string, skipping");
        }
    }

    Ok(table)
}

/// Load a collection from `<store_dir>/<name>/`
///
/// Every locale listed in the manifest is declared on the collection; a table
/// is loaded for each locale that has a `<locale>.json` file.
pub fn load_collection(store_dir: &Path, name: &str) -> TableResult<TableCollection> {
    let dir = store_dir.join(name);
    let manifest_path = dir.join(MANIFEST_FILE);

    if !manifest_path.is_file() {
        return Err(TableError::CollectionNotFound {
            name: name.to_string(),
            path: dir,
        });
    }

    let content =
        fs::read_to_string(&manifest_path).map_err(|e| TableError::io(&manifest_path, e))?;
    let manifest: Manifest =
        serde_json::from_str(&content).map_err(|e| TableError::json(&manifest_path, e))?;

    if manifest.name != name {
        tracing::warn!(
            expected = name,
            found = %manifest.name,
            "Collection manifest name does not match its directory"
        );
    }

    let mut collection = TableCollection::new(name).with_root(dir.clone());
    for locale in &manifest.locales {
        collection.declare_locale(locale);
        let table_path = table_path(&dir, locale);
        if table_path.is_file() {
            collection.add_table(load_table_from_file(&table_path, locale)?);
        } else {
            tracing::debug!(locale = %locale, "Declared locale has no table");
        }
    }

    Ok(collection)
}

/// Create (or extend) a collection at `<store_dir>/<name>/` with empty tables
///
/// Existing tables are left untouched.
pub fn init_collection(
    store_dir: &Path,
    name: &str,
    locales: &[String],
) -> TableResult<TableCollection> {
    let dir = store_dir.join(name);
    fs::create_dir_all(&dir).map_err(|e| TableError::io(&dir, e))?;

    let mut declared = match load_collection(store_dir, name) {
        Ok(existing) => existing.available_locales().to_vec(),
        Err(TableError::CollectionNotFound { .. }) => Vec::new(),
        Err(e) => return Err(e),
    };
    for locale in locales {
        if !declared.contains(locale) {
            declared.push(locale.clone());
        }
    }

    let manifest = Manifest {
        name: name.to_string(),
        locales: declared,
    };
    let manifest_path = dir.join(MANIFEST_FILE);
    let data = serde_json::to_vec_pretty(&manifest).map_err(|e| TableError::json(&manifest_path, e))?;
    atomic_write(&manifest_path, &data)?;

    for locale in locales {
        let path = table_path(&dir, locale);
        if !path.exists() {
            write_table(&path, name, &StringTable::new(locale))?;
        }
    }

    load_collection(store_dir, name)
}

impl TableCollection {
    /// Persist every table changed since the last commit
    ///
    /// Returns the number of tables written. Committing with no pending
    /// changes writes nothing. Collections built in memory have nowhere to
    /// write to and only reset their change tracking.
    pub fn commit(&mut self) -> TableResult<usize> {
        let Some(root) = self.root().map(Path::to_path_buf) else {
            let pending = self.dirty_locales().count();
            self.mark_clean();
            return Ok(pending);
        };

        let mut written = 0;
        for locale in self.dirty_locales() {
            if let Some(table) = self.table(locale) {
                write_table(&table_path(&root, locale), self.name(), table)?;
                written += 1;
            }
        }
        self.mark_clean();

        tracing::debug!(collection = %self.name(), tables = written, "Committed string tables");
        Ok(written)
    }
}

fn table_path(dir: &Path, locale: &str) -> PathBuf {
    dir.join(format!("{locale}.json"))
}

fn write_table(path: &Path, collection: &str, table: &StringTable) -> TableResult<()> {
    let mut obj = Map::new();
    obj.insert(
        "@metadata".to_string(),
        serde_json::json!({ "collection": collection, "locale": table.locale() }),
    );
    for (key, value) in table.entries() {
        obj.insert(key.clone(), Value::String(value.clone()));
    }

    let mut data =
        serde_json::to_vec_pretty(&Value::Object(obj)).map_err(|e| TableError::json(path, e))?;
    data.push(b'\n');
    atomic_write(path, &data)
}

/// Write `data` to `path` through a temp file in the same directory
fn atomic_write(path: &Path, data: &[u8]) -> TableResult<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| TableError::io(dir, e))?;
    tmp.write_all(data).map_err(|e| TableError::io(path, e))?;
    tmp.persist(path).map_err(|e| TableError::io(path, e.error))?;
    Ok(())
}
