//! CQL text issued by the setup.
//!
//! The downstream job relies on these exact shapes, so they are built in one place.
//! Names are [`CqlIdentifier`]s, which were validated on construction, so no
//! escaping is needed here.

use crate::config::CqlIdentifier;

/// `CREATE KEYSPACE` with SimpleStrategy and replication factor 1.
pub fn create_keyspace(keyspace: &CqlIdentifier) -> String {
    format!(
        "CREATE KEYSPACE {keyspace} WITH replication = \
        {{'class': 'SimpleStrategy', 'replication_factor' : 1}}"
    )
}

/// `CREATE TABLE` for the input table.
pub fn create_input_table(keyspace: &CqlIdentifier, table: &CqlIdentifier) -> String {
    format!(
        "CREATE TABLE {keyspace}.{table} (user_id text, category_id text, \
        sub_category_id text, title text, body text, \
        PRIMARY KEY (user_id, category_id, sub_category_id))"
    )
}

/// `CREATE INDEX` on the `title` column of the input table.
///
/// The table is not qualified, the keyspace has to be in use.
pub fn create_title_index(table: &CqlIdentifier) -> String {
    format!("CREATE INDEX title on {table}(title)")
}

/// `CREATE TABLE` for the output table.
pub fn create_output_table(keyspace: &CqlIdentifier, table: &CqlIdentifier) -> String {
    format!(
        "CREATE TABLE {keyspace}.{table} (row_id text, word text, count_num text, \
        PRIMARY KEY (row_id, word))"
    )
}

/// Insert of one input row, bound to five positional values.
pub fn insert_input_row(table: &CqlIdentifier) -> String {
    format!(
        "INSERT INTO {table} (user_id, category_id, sub_category_id, title, body) \
        values (?, ?, ?, ?, ?)"
    )
}
