//! Edit tracking for database schema designs.
//!
//! A working copy of a database's schema tree is reconciled with its
//! baseline by [`diff_merge::DiffMerge`], which records what changed in an
//! [`edit_status::EditStatusStore`]. The [`apply`] and [`selective_apply`]
//! transformers turn the merged tree back into something that can be rolled
//! out, and [`diff_ddl`] asks an external service for the DDL.

pub mod apply;
pub mod catalog;
pub mod diff_ddl;
pub mod diff_merge;
pub mod edit_status;
pub mod knobs;
pub mod metadata;
mod metrics;
pub mod resource_key;
pub mod selection;
pub mod selective_apply;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod test_helpers;

pub use self::{
    diff_merge::{
        DiffMerge,
        MergedDatabase,
    },
    edit_status::{
        EditStatus,
        EditStatusStore,
    },
    resource_key::ResourceKey,
    session::SchemaEditSession,
};
