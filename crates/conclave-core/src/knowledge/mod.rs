//! Knowledge deduplication and promotion
//!
//! Reconciles the two knowledge sources an agent sees: settled project
//! settings and freeform memory entries.

pub mod dedup;
pub mod mapping;
pub mod promotion;

pub use dedup::build_unified_knowledge;
pub use mapping::{
    has_data, is_overlapping, memory_category_for, settings_categories_for,
    OVERLAPPING_SETTINGS_CATEGORIES,
};
pub use promotion::{
    convert_memory_to_settings, find_conflict, PromotionCandidate, PromotionError,
    PromotionPreview, PromotionResult, PromotionService,
};
