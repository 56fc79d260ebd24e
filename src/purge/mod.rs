pub mod engine;

pub use engine::{PurgeOutcome, PurgeScope, PurgeService};
