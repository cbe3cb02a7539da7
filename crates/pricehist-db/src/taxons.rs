use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricehist_core::{parse_taxon_iri, TaxonResolver};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaxonRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a duplicate code).
pub async fn create_taxon(pool: &PgPool, code: &str, name: &str) -> Result<TaxonRow, DbError> {
    let row = sqlx::query_as::<_, TaxonRow>(
        "INSERT INTO taxons (code, name) VALUES ($1, $2) \
         RETURNING id, code, name, created_at",
    )
    .bind(code)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_taxon_by_code(pool: &PgPool, code: &str) -> Result<Option<TaxonRow>, DbError> {
    let row = sqlx::query_as::<_, TaxonRow>(
        "SELECT id, code, name, created_at FROM taxons WHERE code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Resolves taxon IRIs against the `taxons` table.
#[derive(Debug, Clone)]
pub struct PgTaxonResolver {
    pool: PgPool,
}

impl PgTaxonResolver {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaxonResolver for PgTaxonResolver {
    type Error = DbError;

    async fn resolve(&self, iri: &str) -> Result<String, DbError> {
        let code = parse_taxon_iri(iri)?;
        get_taxon_by_code(&self.pool, code)
            .await?
            .map(|taxon| taxon.code)
            .ok_or_else(|| DbError::TaxonNotFound(iri.to_string()))
    }
}
