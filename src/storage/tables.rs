use redb::TableDefinition;

/// Upload slot: fixed id -> FileRecord (msgpack). Holds zero or one row.
pub const UPLOADED_FILES: TableDefinition<u64, &[u8]> = TableDefinition::new("uploaded_files");

/// The only key ever written to `UPLOADED_FILES`.
pub const CURRENT_FILE_ID: u64 = 1;
