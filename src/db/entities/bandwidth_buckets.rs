use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per truncated-to-hour time slot. Counters only ever increase;
/// rows are never deleted by normal operation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bandwidth_buckets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub hour: DateTime,
    pub requests: i64,
    pub bytes_sent: i64,
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub status_200: i64,
    pub status_206: i64,
    pub status_304: i64,
    pub status_404: i64,
    pub status_5xx: i64,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
