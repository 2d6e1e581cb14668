use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;

use super::model::{Recommendation, Scope};

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Overwrites the whole list for `(rec.scope, rec.subject)`.
    async fn replace(&self, rec: &Recommendation) -> anyhow::Result<()>;

    async fn get(&self, scope: Scope, subject: &str) -> anyhow::Result<Option<Recommendation>>;
}

#[derive(Debug, FromRow)]
struct RecommendationRow {
    scope: String,
    subject: String,
    items: Json<Vec<String>>,
    generated_at: OffsetDateTime,
}

impl TryFrom<RecommendationRow> for Recommendation {
    type Error = anyhow::Error;

    fn try_from(r: RecommendationRow) -> anyhow::Result<Self> {
        Ok(Self {
            scope: r.scope.parse::<Scope>()?,
            subject: r.subject,
            items: r.items.0,
            generated_at: r.generated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgRecommendations {
    db: PgPool,
}

impl PgRecommendations {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecommendationStore for PgRecommendations {
    async fn replace(&self, rec: &Recommendation) -> anyhow::Result<()> {
        // single statement: readers see the old list or the new one
        sqlx::query(
            r#"
            INSERT INTO recommendations (scope, subject, items, generated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (scope, subject)
            DO UPDATE SET items = EXCLUDED.items, generated_at = EXCLUDED.generated_at
            "#,
        )
        .bind(rec.scope.as_str())
        .bind(&rec.subject)
        .bind(Json(&rec.items))
        .bind(rec.generated_at)
        .execute(&self.db)
        .await
        .with_context(|| format!("replace {} recommendation for {}", rec.scope, rec.subject))?;
        Ok(())
    }

    async fn get(&self, scope: Scope, subject: &str) -> anyhow::Result<Option<Recommendation>> {
        let row = sqlx::query_as::<_, RecommendationRow>(
            r#"
            SELECT scope, subject, items, generated_at
              FROM recommendations
             WHERE scope = $1 AND subject = $2
            "#,
        )
        .bind(scope.as_str())
        .bind(subject)
        .fetch_optional(&self.db)
        .await
        .context("get recommendation")?;

        row.map(Recommendation::try_from).transpose()
    }
}
