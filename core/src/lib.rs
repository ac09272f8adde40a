//! Storage and consistency core of the scribe document server.
//!
//! Everything lives in [`storage`]: the [`storage::Workspace`] store object, the backlink
//! index it maintains and the trash lifecycle.

pub mod storage;
