//! Space catalog and billing identities (read-only views).

use crate::db_err;
use async_trait::async_trait;
use bookings_core::repository::{Result, SpaceCatalog};
use bookings_core::{BillingIdentity, BillingKind, RequesterId, Space, SpaceId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// sqlx-backed [`SpaceCatalog`].
pub struct PgSpaceCatalog {
    pool: PgPool,
}

impl PgSpaceCatalog {
    /// Wraps a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_space(row: &PgRow) -> Result<Space> {
        let billing_kind: String = row.try_get("billing_kind").map_err(db_err)?;

        Ok(Space {
            id: SpaceId::from_uuid(row.try_get::<Uuid, _>("id").map_err(db_err)?),
            name: row.try_get("name").map_err(db_err)?,
            building_code: row.try_get("building_code").map_err(db_err)?,
            space_code: row.try_get("space_code").map_err(db_err)?,
            category: row.try_get("category").map_err(db_err)?,
            billing_kind: BillingKind::parse(&billing_kind)?,
            active: row.try_get("active").map_err(db_err)?,
        })
    }
}

#[async_trait]
impl SpaceCatalog for PgSpaceCatalog {
    async fn find(&self, id: SpaceId) -> Result<Option<Space>> {
        let row = sqlx::query(
            "SELECT id, name, building_code, space_code, category, billing_kind, active \
             FROM spaces WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(Self::row_to_space).transpose()
    }

    async fn active_with_codes(&self) -> Result<Vec<Space>> {
        let rows = sqlx::query(
            "SELECT id, name, building_code, space_code, category, billing_kind, active \
             FROM spaces \
             WHERE active = TRUE \
               AND building_code IS NOT NULL \
               AND space_code IS NOT NULL \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(Self::row_to_space).collect()
    }

    async fn billing_identity(&self, id: RequesterId) -> Result<Option<BillingIdentity>> {
        let row = sqlx::query(
            "SELECT requester_id, full_name, document, email, address, city_code, region_code \
             FROM billing_identities WHERE requester_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|row| {
            Ok(BillingIdentity {
                requester_id: RequesterId::from_uuid(
                    row.try_get::<Uuid, _>("requester_id").map_err(db_err)?,
                ),
                full_name: row.try_get("full_name").map_err(db_err)?,
                document: row.try_get("document").map_err(db_err)?,
                email: row.try_get("email").map_err(db_err)?,
                address: row.try_get("address").map_err(db_err)?,
                city_code: row.try_get("city_code").map_err(db_err)?,
                region_code: row.try_get("region_code").map_err(db_err)?,
            })
        })
        .transpose()
    }
}
