//! Typed endpoint wrappers, one module per API section.

pub mod asset;

pub use asset::{
    AssetHolder, AssetInfo, AssetListItem, AssetNames, AssetSummary, AssetTxs,
    TokenRegistryMetadata,
};
