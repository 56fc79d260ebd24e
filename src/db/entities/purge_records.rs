use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit row for one purge invocation. Written once, never mutated after
/// completion.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purge_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub purge_type: String, // 'single' | 'bucket' | 'pattern' | 'full'
    pub target: String,
    pub files_purged: i32,
    pub bytes_freed: i64,
    pub triggered_by: String,
    pub reason: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime,
    pub completed_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Scope variant of a purge operation as stored in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurgeType {
    Single,
    Bucket,
    Pattern,
    Full,
}

impl std::fmt::Display for PurgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurgeType::Single => write!(f, "single"),
            PurgeType::Bucket => write!(f, "bucket"),
            PurgeType::Pattern => write!(f, "pattern"),
            PurgeType::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for PurgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(PurgeType::Single),
            "bucket" => Ok(PurgeType::Bucket),
            "pattern" => Ok(PurgeType::Pattern),
            "full" => Ok(PurgeType::Full),
            _ => Err(format!("Invalid purge type: {}", s)),
        }
    }
}

impl Model {
    /// Get the purge type as an enum
    pub fn get_purge_type(&self) -> Result<PurgeType, String> {
        self.purge_type.parse()
    }
}
