use poesync_tables::{TableCollection, TableError, TableResult, TransUnit};

/// Local storage the pipeline merges downloaded translations into
pub trait TableSink {
    /// Whether a table exists for `locale`
    fn has_table(&self, locale: &str) -> bool;

    /// Clear the table for `locale`, then import `units` into it
    ///
    /// Returns the number of entries imported.
    fn replace_entries(&mut self, locale: &str, units: &[TransUnit]) -> TableResult<usize>;

    /// Persist pending changes; safe to call with nothing pending
    fn commit(&mut self) -> TableResult<usize>;
}

impl TableSink for TableCollection {
    fn has_table(&self, locale: &str) -> bool {
        self.table(locale).is_some()
    }

    fn replace_entries(&mut self, locale: &str, units: &[TransUnit]) -> TableResult<usize> {
        let name = self.name().to_string();
        let table = self.table_mut(locale).ok_or_else(|| {
            TableError::Invalid(format!("No table for '{locale}' in collection '{name}'"))
        })?;
        table.clear();
        Ok(table.import(units))
    }

    fn commit(&mut self) -> TableResult<usize> {
        TableCollection::commit(self)
    }
}
