//! Assignment of order items to merchants.

mod directory;
mod engine;
mod ranking;

pub use directory::{
    DirectoryError, DirectoryListing, InMemoryMerchantDirectory, MerchantCandidate,
    MerchantDirectory,
};
pub use engine::{AssignmentEngine, AssignmentPolicy, DEFAULT_MAX_DELIVERY_DISTANCE_KM};
pub use ranking::{compare_candidates, rank_candidates, sort_candidates};
