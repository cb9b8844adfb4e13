//! PostgreSQL implementation of [`BatchRepository`]

use crate::adapters::database::traits::BatchRepository;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{
    batch_run_error_from_row, feedback_result_from_row, mapping_rule_from_row, PostgreSQLBatchRun,
};
use crate::domain::{
    BatchFeedbackResult, BatchName, BatchRun, BatchRunError, BatchStatus, BatchfeedError,
    FeedKind, MappingRule, ReplyEffect, Result,
};
use async_trait::async_trait;
use std::sync::Arc;

fn db_err(context: &str) -> impl Fn(tokio_postgres::Error) -> BatchfeedError + '_ {
    move |e| BatchfeedError::Database(format!("{context}: {e}"))
}

/// Repository on top of a pooled PostgreSQL client
pub struct PostgreSQLBatchRepository {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLBatchRepository {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn new_with_arc(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }

    async fn select_one(
        &self,
        filter: &str,
        param: &(dyn tokio_postgres::types::ToSql + Sync),
    ) -> Result<Option<BatchRun>> {
        let conn = self.client.get_connection().await?;
        let query = format!(
            "SELECT {} FROM batch_runs WHERE {filter} = $1",
            PostgreSQLBatchRun::COLUMNS
        );
        let row = conn
            .query_opt(&query, &[param])
            .await
            .map_err(db_err("Failed to load batch run"))?;
        row.map(|r| PostgreSQLBatchRun::from_row(&r).into_domain())
            .transpose()
    }
}

#[async_trait]
impl BatchRepository for PostgreSQLBatchRepository {
    async fn ensure_schema(&self) -> Result<()> {
        self.client.test_connection().await?;
        self.client.ensure_schema().await
    }

    async fn create_batch_run(&self, name: &BatchName, feed: FeedKind) -> Result<BatchRun> {
        let conn = self.client.get_connection().await?;
        let query = format!(
            "INSERT INTO batch_runs (name, feed, status) VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO NOTHING RETURNING {}",
            PostgreSQLBatchRun::COLUMNS
        );
        let row = conn
            .query_opt(
                &query,
                &[&name.as_str(), &feed.as_str(), &BatchStatus::Created.as_str()],
            )
            .await
            .map_err(db_err("Failed to insert batch run"))?;

        match row {
            Some(row) => PostgreSQLBatchRun::from_row(&row).into_domain(),
            None => Err(BatchfeedError::Conflict(format!(
                "Batch run \'{name}\' already exists"
            ))),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<BatchRun>> {
        self.select_one("name", &name).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<BatchRun>> {
        self.select_one("id", &id).await
    }

    async fn find_all(&self) -> Result<Vec<BatchRun>> {
        let conn = self.client.get_connection().await?;
        let query = format!(
            "SELECT {} FROM batch_runs ORDER BY created_at DESC, id DESC",
            PostgreSQLBatchRun::COLUMNS
        );
        let rows = conn
            .query(&query, &[])
            .await
            .map_err(db_err("Failed to list batch runs"))?;
        rows.iter()
            .map(|r| PostgreSQLBatchRun::from_row(r).into_domain())
            .collect()
    }

    async fn update_status(&self, id: i64, status: BatchStatus) -> Result<BatchRun> {
        let conn = self.client.get_connection().await?;
        let query = format!(
            "UPDATE batch_runs SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PostgreSQLBatchRun::COLUMNS
        );
        let row = conn
            .query_opt(&query, &[&id, &status.as_str()])
            .await
            .map_err(db_err("Failed to update batch status"))?
            .ok_or_else(|| BatchfeedError::NotFound(format!("Batch run with id {id}")))?;
        PostgreSQLBatchRun::from_row(&row).into_domain()
    }

    async fn apply_reply(&self, id: i64, effect: &ReplyEffect) -> Result<BatchRun> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(db_err("Failed to start transaction"))?;

        let status = effect.target_status();
        let returning = PostgreSQLBatchRun::COLUMNS;
        let row = match effect {
            ReplyEffect::Notification {
                vendor_status,
                errors,
            } => {
                let insert = tx
                    .prepare(
                        "INSERT INTO batch_run_errors (batch_id, record_id, error_code, error_message) \
                         VALUES ($1, $2, $3, $4)",
                    )
                    .await
                    .map_err(db_err("Failed to prepare error insert"))?;
                for error in errors {
                    tx.execute(
                        &insert,
                        &[&id, &error.record_id, &error.code, &error.message],
                    )
                    .await
                    .map_err(db_err("Failed to insert batch run error"))?;
                }

                let query = format!(
                    "UPDATE batch_runs SET status = $2, notification_status = $3, updated_at = NOW() \
                     WHERE id = $1 RETURNING {returning}"
                );
                tx.query_opt(&query, &[&id, &status.as_str(), vendor_status])
                    .await
                    .map_err(db_err("Failed to update batch run"))?
            }
            ReplyEffect::Feedback {
                record_count,
                results,
            } => {
                let insert = tx
                    .prepare(
                        "INSERT INTO batch_feedback_results \
                         (batch_id, record_id, match_id, match_name, match_score, status) \
                         VALUES ($1, $2, $3, $4, $5, $6)",
                    )
                    .await
                    .map_err(db_err("Failed to prepare feedback insert"))?;
                for result in results {
                    tx.execute(
                        &insert,
                        &[
                            &id,
                            &result.record_id,
                            &result.match_id,
                            &result.match_name,
                            &result.score,
                            &result.status,
                        ],
                    )
                    .await
                    .map_err(db_err("Failed to insert feedback result"))?;
                }

                let query = format!(
                    "UPDATE batch_runs SET status = $2, feedback_count = $3, updated_at = NOW() \
                     WHERE id = $1 RETURNING {returning}"
                );
                tx.query_opt(&query, &[&id, &status.as_str(), record_count])
                    .await
                    .map_err(db_err("Failed to update batch run"))?
            }
        };

        // Dropping the transaction without commit rolls the inserts back
        let row = row.ok_or_else(|| BatchfeedError::NotFound(format!("Batch run with id {id}")))?;
        let run = PostgreSQLBatchRun::from_row(&row).into_domain()?;

        tx.commit()
            .await
            .map_err(db_err("Failed to commit reply"))?;

        tracing::debug!(
            batch = %run.name,
            kind = effect.kind(),
            rows = effect.row_count(),
            "Reply persisted"
        );
        Ok(run)
    }

    async fn errors_for(&self, id: i64) -> Result<Vec<BatchRunError>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(
                "SELECT id, batch_id, record_id, error_code, error_message \
                 FROM batch_run_errors WHERE batch_id = $1 ORDER BY id",
                &[&id],
            )
            .await
            .map_err(db_err("Failed to load batch run errors"))?;
        Ok(rows.iter().map(batch_run_error_from_row).collect())
    }

    async fn feedback_for(&self, id: i64) -> Result<Vec<BatchFeedbackResult>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(
                "SELECT id, batch_id, record_id, match_id, match_name, match_score, status \
                 FROM batch_feedback_results WHERE batch_id = $1 ORDER BY id",
                &[&id],
            )
            .await
            .map_err(db_err("Failed to load feedback results"))?;
        Ok(rows.iter().map(feedback_result_from_row).collect())
    }

    async fn load_mapping_rules(&self, kind: FeedKind) -> Result<Vec<MappingRule>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(
                "SELECT target_path, source_field, default_value, category \
                 FROM mapping_rules WHERE feed = $1 ORDER BY position",
                &[&kind.as_str()],
            )
            .await
            .map_err(db_err("Failed to load mapping rules"))?;
        Ok(rows.iter().map(mapping_rule_from_row).collect())
    }

    async fn replace_mapping_rules(&self, kind: FeedKind, rules: &[MappingRule]) -> Result<()> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(db_err("Failed to start transaction"))?;

        tx.execute("DELETE FROM mapping_rules WHERE feed = $1", &[&kind.as_str()])
            .await
            .map_err(db_err("Failed to clear mapping rules"))?;

        let insert = tx
            .prepare(
                "INSERT INTO mapping_rules \
                 (feed, position, target_path, source_field, default_value, category) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .await
            .map_err(db_err("Failed to prepare rule insert"))?;
        for (position, rule) in rules.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                BatchfeedError::Validation("Too many mapping rules".to_string())
            })?;
            tx.execute(
                &insert,
                &[
                    &kind.as_str(),
                    &position,
                    &rule.target_path,
                    &rule.source_field,
                    &rule.default_value,
                    &rule.category,
                ],
            )
            .await
            .map_err(db_err("Failed to insert mapping rule"))?;
        }

        tx.commit()
            .await
            .map_err(db_err("Failed to commit mapping rules"))?;

        tracing::info!(feed = %kind, rules = rules.len(), "Mapping rules replaced");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}
