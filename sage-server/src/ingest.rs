//! Embedding ingestion job: load the record collection into the vector
//! store, incrementally unless forced, in fixed-size batches.

use serde::{Deserialize, Serialize};

use sage_core::embedding::{EmbedError, Embedder};
use sage_core::llm::LanguageModel;
use sage_core::record::Record;
use sage_core::store::{StoreError, UpsertRecord, VectorStore};

use crate::provider::Providers;

/// Records per upsert batch. Bounds outstanding remote calls and payload
/// size; batches run strictly one after another.
pub const BATCH_SIZE: usize = 5;

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestSummary {
    pub success: bool,
    pub message: String,
    pub processed: usize,
}

/// Embedding progress over the record collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestStatus {
    pub total_records: usize,
    pub embedded_count: usize,
    pub remaining_count: usize,
    pub percentage: f32,
}

/// The text handed to the embedder: the original content plus short
/// sentences derived from the optional descriptive fields. The display text
/// stored alongside stays unenriched.
pub fn enrich_text(record: &Record) -> String {
    let mut enriched = record.text.clone();
    if let Some(region) = &record.region {
        enriched.push_str(&format!(" This comes from the {region} region."));
    }
    if let Some(kind) = &record.kind {
        enriched.push_str(&format!(" It is a kind of {kind}."));
    }
    enriched
}

/// Embed and upsert records the store does not know yet (all of them when
/// `force` is set). Per-item failures are logged and skipped; the job keeps
/// going and reports how much it actually processed.
pub async fn run_ingestion<S, E, L>(
    providers: &Providers<S, E, L>,
    records: &[Record],
    force: bool,
) -> Result<IngestSummary, StoreError>
where
    S: VectorStore,
    E: Embedder,
    L: LanguageModel,
{
    let existing = if force {
        Default::default()
    } else {
        providers.store.existing_ids().await?
    };

    let pending: Vec<&Record> = records
        .iter()
        .filter(|r| !existing.contains(&r.id))
        .collect();

    if pending.is_empty() {
        return Ok(IngestSummary {
            success: true,
            message: "all records are already embedded".into(),
            processed: existing.len(),
        });
    }

    tracing::info!(
        pending = pending.len(),
        total = records.len(),
        force,
        "starting ingestion"
    );

    let mut processed = 0;
    for batch in pending.chunks(BATCH_SIZE) {
        let mut upserts = Vec::with_capacity(batch.len());
        for record in batch {
            let index_text = enrich_text(record);
            let embedding = match providers.embedder.get_embedding(&index_text).await {
                Ok(vector) => Some(vector),
                // The store embeds server-side from the index text.
                Err(EmbedError::Disabled(_)) => None,
                Err(e) => {
                    tracing::warn!(id = %record.id, "skipping record, embedding failed: {e}");
                    continue;
                }
            };
            upserts.push(UpsertRecord {
                id: record.id.clone(),
                text: record.text.clone(),
                index_text,
                embedding,
                metadata: serde_json::json!({
                    "region": record.region,
                    "type": record.kind,
                }),
            });
        }

        if upserts.is_empty() {
            continue;
        }
        let count = upserts.len();
        match providers.store.add_documents(upserts).await {
            Ok(()) => processed += count,
            Err(e) => tracing::warn!("batch upsert failed, continuing: {e}"),
        }
    }

    Ok(IngestSummary {
        success: true,
        message: format!("embedded {processed} new records"),
        processed,
    })
}

/// How much of the record collection the store already covers.
pub async fn ingestion_status<S, E, L>(
    providers: &Providers<S, E, L>,
    records: &[Record],
) -> Result<IngestStatus, StoreError>
where
    S: VectorStore,
    E: Embedder,
    L: LanguageModel,
{
    let existing = providers.store.existing_ids().await?;
    let total_records = records.len();
    let embedded_count = records.iter().filter(|r| existing.contains(&r.id)).count();
    let remaining_count = total_records - embedded_count;
    let percentage = if total_records == 0 {
        100.0
    } else {
        embedded_count as f32 * 100.0 / total_records as f32
    };

    Ok(IngestStatus {
        total_records,
        embedded_count,
        remaining_count,
        percentage,
    })
}
