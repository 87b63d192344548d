//! LanceDB connection helpers and the key/value `meta` table that keeps
//! per-collection settings (currently the distance metric).

use std::sync::Arc;

use anyhow::{anyhow, Result};
use arrow_array::{Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::Schema;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};

use crate::schema::build_meta_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

/// Creates an empty table with `schema` unless `name` already exists.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    let empty = RecordBatchIterator::new(Vec::new().into_iter(), schema);
    conn.create_table(name, Box::new(empty)).execute().await?;
    Ok(())
}

pub struct MetaTable<'a> {
    conn: &'a Connection,
    name: &'a str,
}

impl<'a> MetaTable<'a> {
    pub fn new(conn: &'a Connection, name: &'a str) -> Self {
        Self { conn, name }
    }

    /// Inserts or replaces `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        ensure_table(self.conn, self.name, build_meta_schema()).await?;
        let row = RecordBatch::try_new(
            build_meta_schema(),
            vec![
                Arc::new(StringArray::from(vec![key])),
                Arc::new(StringArray::from(vec![value])),
                Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
            ],
        )?;
        let schema = row.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(row)].into_iter(), schema));
        let table = self.conn.open_table(self.name).execute().await?;
        let mut merge = table.merge_insert(&["key"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge.execute(reader).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        if !table_exists(self.conn, self.name).await? {
            return Ok(None);
        }
        let table = self.conn.open_table(self.name).execute().await?;
        let filter = format!("key = '{}'", key.replace('\'', "''"));
        let mut stream = table.query().only_if(filter).limit(1).execute().await?;
        while let Some(batch) = stream.try_next().await? {
            if batch.num_rows() == 0 {
                continue;
            }
            let values = batch
                .column_by_name("value")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow!("{}.value column missing", self.name))?;
            return Ok(Some(values.value(0).to_string()));
        }
        Ok(None)
    }
}
