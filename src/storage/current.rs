use redb::{ReadableTable, ReadableTableMetadata, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // Upload slot operations
    // ========================================================================

    /// Replace whatever the slot holds with `record`, in one transaction.
    ///
    /// The record is always stored under [`CURRENT_FILE_ID`], whatever its `id` says.
    pub fn replace_current(&self, record: &FileRecord) -> Result<(), DatabaseError> {
        let mut record = record.clone();
        record.id = CURRENT_FILE_ID;
        let data = rmp_serde::to_vec_named(&record)?;

        let write_txn = self.begin_write()?;
        clear_rows(&write_txn)?;
        {
            let mut table = write_txn.open_table(UPLOADED_FILES)?;
            table.insert(CURRENT_FILE_ID, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete every row. Returns the number removed.
    pub fn clear_current(&self) -> Result<u64, DatabaseError> {
        let write_txn = self.begin_write()?;
        let removed = clear_rows(&write_txn)?;
        write_txn.commit()?;
        Ok(removed)
    }

    /// The record currently in the slot, if any.
    pub fn get_current(&self) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(UPLOADED_FILES)?;

        match table.get(CURRENT_FILE_ID)? {
            Some(data) => {
                let record: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Number of rows in the slot table. Zero or one unless something bypassed this module.
    pub fn row_count(&self) -> Result<u64, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(UPLOADED_FILES)?;
        Ok(table.len()?)
    }
}

fn clear_rows(write_txn: &WriteTransaction) -> Result<u64, DatabaseError> {
    let mut table = write_txn.open_table(UPLOADED_FILES)?;
    let keys: Vec<u64> = table
        .iter()?
        .map(|r| r.map(|(k, _)| k.value()))
        .collect::<Result<Vec<_>, _>>()?;

    for key in &keys {
        table.remove(*key)?;
    }
    Ok(keys.len() as u64)
}
