use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cache_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub path: String,
    pub cache_key: String,
    pub hit_count: i64,
    pub miss_count: i64,
    pub bytes_served: i64,
    pub is_cached: bool,
    pub cache_size: Option<i64>,
    pub first_cached: Option<DateTime>,
    pub last_hit: Option<DateTime>,
    pub last_miss: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Cache key the upstream proxy derives for a plain GET of this path.
    pub fn default_cache_key(path: &str) -> String {
        format!("http$GET$localhost{}", path)
    }
}
