// Tenant database model
// Tenants are the isolation unit: every user, refresh token, and audit entry
// carries a tenant id. Tenants are never deleted; deactivation is terminal.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::tenants;

/// Tenant database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tenants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// New tenant for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = tenants)]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
}

/// Errors for tenant operations
#[derive(thiserror::Error, Debug)]
pub enum TenantError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Tenant not found")]
    NotFound,

    #[error("Tenant slug already taken")]
    SlugTaken,
}

impl Tenant {
    /// Find tenant by ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        tenant_id: Uuid,
    ) -> Result<Self, TenantError> {
        use crate::schema::tenants::dsl::*;

        tenants
            .filter(id.eq(tenant_id))
            .first::<Tenant>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantError::NotFound,
                _ => TenantError::Database(e),
            })
    }

    /// Find tenant by URL-safe slug
    pub async fn find_by_slug(
        conn: &mut AsyncPgConnection,
        slug_str: &str,
    ) -> Result<Self, TenantError> {
        use crate::schema::tenants::dsl::*;

        tenants
            .filter(slug.eq(slug_str))
            .first::<Tenant>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantError::NotFound,
                _ => TenantError::Database(e),
            })
    }

    /// Create a new tenant. A duplicate slug maps to `SlugTaken` via the
    /// unique constraint rather than a racy pre-check.
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_tenant: NewTenant,
    ) -> Result<Self, TenantError> {
        use crate::schema::tenants::dsl::*;

        diesel::insert_into(tenants)
            .values(&new_tenant)
            .get_result::<Tenant>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => TenantError::SlugTaken,
                _ => TenantError::Database(e),
            })
    }

}
