pub mod bandwidth_buckets;
pub mod cache_entries;
pub mod purge_records;
pub mod uploaded_assets;

// Re-export entities for convenience
pub use bandwidth_buckets::{
    ActiveModel as BandwidthBucketActiveModel, Entity as BandwidthBucket,
    Model as BandwidthBucketModel,
};
pub use cache_entries::{
    ActiveModel as CacheEntryActiveModel, Entity as CacheEntry, Model as CacheEntryModel,
};
pub use purge_records::{
    ActiveModel as PurgeRecordActiveModel, Entity as PurgeRecord, Model as PurgeRecordModel,
    PurgeType,
};
pub use uploaded_assets::{
    ActiveModel as UploadedAssetActiveModel, Entity as UploadedAsset, Model as UploadedAssetModel,
};
