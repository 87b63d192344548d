//! Embedded on-disk store backed by LanceDB.
//!
//! One Lance table per collection. The vector width lives in the table
//! schema; the metric is recorded in a reserved meta table since Lance
//! picks the distance per query.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use recalldb_core::traits::VectorStore;
use recalldb_core::types::{DistanceMetric, DocumentRecord, RecordMetadata, ScoredRecord};
use tracing::debug;

use crate::schema::{build_records_schema, vector_dim, VECTOR_COLUMN};
use crate::table::{ensure_table, open_db, table_exists, MetaTable};

/// Not usable as a collection name.
pub const META_TABLE: &str = "_recalldb_meta";

pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        let db = open_db(db_path.to_string_lossy().as_ref()).await?;
        Ok(Self { db })
    }

    async fn metric(&self, collection: &str) -> Result<DistanceMetric> {
        let stored = MetaTable::new(&self.db, META_TABLE).get(&metric_key(collection)).await?;
        Ok(stored.as_deref().and_then(DistanceMetric::parse).unwrap_or_default())
    }
}

fn metric_key(collection: &str) -> String {
    format!("metric:{collection}")
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::Dot => DistanceType::Dot,
        DistanceMetric::Euclid => DistanceType::L2,
    }
}

/// Lance reports distances (lower is better); stores report scores.
fn distance_to_score(metric: DistanceMetric, distance: f32) -> f32 {
    match metric {
        DistanceMetric::Cosine | DistanceMetric::Dot => 1.0 - distance,
        DistanceMetric::Euclid => -distance,
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn collection_dimension(&self, name: &str) -> Result<Option<usize>> {
        if !table_exists(&self.db, name).await? {
            return Ok(None);
        }
        let table = self.db.open_table(name).execute().await?;
        let schema = table.schema().await?;
        Ok(vector_dim(&schema))
    }

    async fn create_collection(&self, name: &str, dimension: usize, metric: DistanceMetric) -> Result<()> {
        if name == META_TABLE {
            bail!("'{name}' is reserved for collection settings");
        }
        let dim = i32::try_from(dimension).map_err(|_| anyhow!("dimension {dimension} too large"))?;
        ensure_table(&self.db, name, build_records_schema(dim)).await?;
        MetaTable::new(&self.db, META_TABLE).set(&metric_key(name), metric.as_str()).await?;
        debug!(collection = name, dimension, metric = metric.as_str(), "created lance collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let Some(dim) = self.collection_dimension(collection).await? else {
            bail!("collection '{collection}' does not exist");
        };
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dim) {
            bail!("record {} has {} dims, collection '{}' expects {}", bad.id, bad.embedding.len(), collection, dim);
        }
        let batch = records_to_batch(records, dim as i32)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self.db.open_table(collection).execute().await?;
        let mut mi = table.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await?;
        Ok(())
    }

    async fn search(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        if !table_exists(&self.db, collection).await? {
            return Ok(Vec::new());
        }
        let metric = self.metric(collection).await?;
        let table = self.db.open_table(collection).execute().await?;
        let mut stream = table
            .vector_search(query.to_vec())?
            .distance_type(distance_type(metric))
            .limit(k)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(batch_to_hits(&batch, metric)?);
        }
        // stable: keeps Lance's order among equal scores
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

fn records_to_batch(records: &[DocumentRecord], dim: i32) -> Result<RecordBatch> {
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let filenames: Vec<&str> = records.iter().map(|r| r.filename.as_str()).collect();
    let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
    let dates: Vec<Option<&str>> = records.iter().map(|r| r.metadata.date.as_deref()).collect();
    let entities: Vec<Option<&str>> = records.iter().map(|r| r.metadata.entity_name.as_deref()).collect();
    let vectors = records
        .iter()
        .map(|r| Some(r.embedding.iter().copied().map(Some).collect::<Vec<_>>()));
    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim);

    let batch = RecordBatch::try_new(
        build_records_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(filenames)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(dates)),
            Arc::new(StringArray::from(entities)),
            Arc::new(vectors),
        ],
    )?;
    Ok(batch)
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

fn optional(col: &StringArray, i: usize) -> Option<String> {
    if col.is_null(i) { None } else { Some(col.value(i).to_string()) }
}

fn batch_to_hits(batch: &RecordBatch, metric: DistanceMetric) -> Result<Vec<ScoredRecord>> {
    let ids = string_col(batch, "id")?;
    let filenames = string_col(batch, "filename")?;
    let contents = string_col(batch, "content")?;
    let dates = string_col(batch, "date")?;
    let entities = string_col(batch, "entity_name")?;
    let vectors = batch
        .column_by_name(VECTOR_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| anyhow!("vector column missing"))?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| anyhow!("_distance column missing"))?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let embedding = vectors.value(i).as_primitive::<Float32Type>().values().to_vec();
        let record = DocumentRecord {
            id: ids.value(i).to_string(),
            filename: filenames.value(i).to_string(),
            content: contents.value(i).to_string(),
            embedding,
            metadata: RecordMetadata { date: optional(dates, i), entity_name: optional(entities, i) },
        };
        out.push(ScoredRecord { record, score: distance_to_score(metric, distances.value(i)) });
    }
    Ok(out)
}
