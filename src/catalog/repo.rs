use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use time::format_description::well_known::Rfc3339;

use super::models::{
    Cafe, CafeFields, ItemFields, MenuItem, NutritionalInformations, UserInteraction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Recorded,
    AlreadyLiked,
    UnknownItem,
}

/// Read side of the cafe catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn get_all_cafes(&self) -> anyhow::Result<Vec<Cafe>>;
    /// Items of one cafe, in menu order.
    async fn get_cafe_items(&self, slug: &str) -> anyhow::Result<Vec<MenuItem>>;
}

/// Idempotent partial updates keyed by slug. An unknown key is an error.
#[async_trait]
pub trait CatalogUpdater: Send + Sync {
    async fn update_cafe(&self, slug: &str, fields: &CafeFields) -> anyhow::Result<()>;

    async fn update_menu_item(
        &self,
        cafe_slug: &str,
        item_slug: &str,
        fields: &ItemFields,
    ) -> anyhow::Result<()>;

    /// Writes only `health_score`, whatever else `fields` carries.
    async fn update_cafe_health_score(&self, slug: &str, fields: &CafeFields) -> anyhow::Result<()> {
        let only_score = CafeFields {
            health_score: fields.health_score,
            ..CafeFields::default()
        };
        self.update_cafe(slug, &only_score).await
    }

    async fn record_like(
        &self,
        cafe_slug: &str,
        item_slug: &str,
        interaction: &UserInteraction,
    ) -> anyhow::Result<LikeOutcome>;
}

#[derive(Debug, FromRow)]
struct CafeRow {
    slug: String,
    name: String,
    health_score: Option<f64>,
}

#[derive(Debug, FromRow)]
struct MenuItemRow {
    slug: String,
    name: String,
    nutritional_informations: Json<NutritionalInformations>,
    likes: Json<Vec<UserInteraction>>,
    health_score: Option<f64>,
}

impl From<CafeRow> for Cafe {
    fn from(r: CafeRow) -> Self {
        Self {
            slug: r.slug,
            name: r.name,
            health_score: r.health_score,
        }
    }
}

impl From<MenuItemRow> for MenuItem {
    fn from(r: MenuItemRow) -> Self {
        Self {
            slug: r.slug,
            name: r.name,
            nutritional_informations: r.nutritional_informations.0,
            likes: r.likes.0,
            health_score: r.health_score,
        }
    }
}

#[derive(Clone)]
pub struct PgCatalog {
    db: PgPool,
}

impl PgCatalog {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogSource for PgCatalog {
    async fn get_all_cafes(&self) -> anyhow::Result<Vec<Cafe>> {
        let rows = sqlx::query_as::<_, CafeRow>(
            r#"
            SELECT slug, name, health_score
              FROM cafes
             ORDER BY created_at ASC, slug ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list cafes")?;
        Ok(rows.into_iter().map(Cafe::from).collect())
    }

    async fn get_cafe_items(&self, slug: &str) -> anyhow::Result<Vec<MenuItem>> {
        let rows = sqlx::query_as::<_, MenuItemRow>(
            r#"
            SELECT slug, name, nutritional_informations, likes, health_score
              FROM menu_items
             WHERE cafe_slug = $1
             ORDER BY position ASC, slug ASC
            "#,
        )
        .bind(slug)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("list items of cafe {}", slug))?;
        Ok(rows.into_iter().map(MenuItem::from).collect())
    }
}

#[async_trait]
impl CatalogUpdater for PgCatalog {
    async fn update_cafe(&self, slug: &str, fields: &CafeFields) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE cafes
               SET name = COALESCE($2, name),
                   health_score = COALESCE($3, health_score)
             WHERE slug = $1
            "#,
        )
        .bind(slug)
        .bind(fields.name.as_deref())
        .bind(fields.health_score)
        .execute(&self.db)
        .await
        .with_context(|| format!("update cafe {}", slug))?;

        anyhow::ensure!(res.rows_affected() > 0, "cafe {} not found", slug);
        Ok(())
    }

    async fn update_menu_item(
        &self,
        cafe_slug: &str,
        item_slug: &str,
        fields: &ItemFields,
    ) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE menu_items
               SET name = COALESCE($3, name),
                   health_score = COALESCE($4, health_score)
             WHERE cafe_slug = $1 AND slug = $2
            "#,
        )
        .bind(cafe_slug)
        .bind(item_slug)
        .bind(fields.name.as_deref())
        .bind(fields.health_score)
        .execute(&self.db)
        .await
        .with_context(|| format!("update item {}/{}", cafe_slug, item_slug))?;

        anyhow::ensure!(
            res.rows_affected() > 0,
            "item {}/{} not found",
            cafe_slug,
            item_slug
        );
        Ok(())
    }

    async fn record_like(
        &self,
        cafe_slug: &str,
        item_slug: &str,
        interaction: &UserInteraction,
    ) -> anyhow::Result<LikeOutcome> {
        let at = interaction
            .interaction_time
            .format(&Rfc3339)
            .context("format interaction time")?;

        // Conditional append: the containment check keeps one like per user.
        let res = sqlx::query(
            r#"
            UPDATE menu_items
               SET likes = likes || jsonb_build_array(
                       jsonb_build_object('user_id', $3::text, 'interaction_time', $4::text))
             WHERE cafe_slug = $1 AND slug = $2
               AND NOT likes @> jsonb_build_array(jsonb_build_object('user_id', $3::text))
            "#,
        )
        .bind(cafe_slug)
        .bind(item_slug)
        .bind(interaction.user_id.to_string())
        .bind(at)
        .execute(&self.db)
        .await
        .with_context(|| format!("record like on {}/{}", cafe_slug, item_slug))?;

        if res.rows_affected() > 0 {
            return Ok(LikeOutcome::Recorded);
        }

        let exists: Option<(String,)> = sqlx::query_as(
            "SELECT slug FROM menu_items WHERE cafe_slug = $1 AND slug = $2",
        )
        .bind(cafe_slug)
        .bind(item_slug)
        .fetch_optional(&self.db)
        .await
        .context("lookup liked item")?;

        Ok(match exists {
            Some(_) => LikeOutcome::AlreadyLiked,
            None => LikeOutcome::UnknownItem,
        })
    }
}
