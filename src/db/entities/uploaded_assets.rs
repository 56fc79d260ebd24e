use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Asset rows are created by the upload pipeline; this system only advances
/// the download/bandwidth counters and the last-accessed stamp.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "uploaded_assets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub filename: String,
    pub bucket: String,
    #[sea_orm(unique)]
    pub path: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub asset_kind: String, // 'image' | 'video'
    pub download_count: i64,
    pub bandwidth_used: i64,
    pub is_active: bool,
    pub created_at: DateTime,
    pub last_accessed: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
