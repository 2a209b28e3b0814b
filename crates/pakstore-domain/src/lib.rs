#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod identity;
pub mod ignore;
pub mod model;
pub mod navigation;
pub mod reconcile;
pub mod version;

pub use identity::{
    assign_records, find_pak, find_record, rule_matches, MatchRule, ALL_RULES, LEGACY_RULES,
};
pub use ignore::IgnoreSet;
pub use model::{
    Catalog, IdentityFields, InstalledRecord, Pak, PakType, RecordKey, PAK_STORE_ID,
    PAK_STORE_NAME, PAK_STORE_REPO,
};
pub use navigation::{transition, Action, ListPosition, NavStack, Origin, Screen};
pub use reconcile::{
    derive_state, CurrentInstall, DerivedState, PendingUpdate, PlatformFilter,
    ReconcileOptions,
};
pub use version::{compare, compare_i32, has_update};
