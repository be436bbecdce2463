//! Engine modules: turn configuration into the document the installer reads.
//!
//! `storage` generates ordered, validated curtin storage nodes; `render`
//! serializes the finished document tree.

pub mod render;
pub mod storage;
