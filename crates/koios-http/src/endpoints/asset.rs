//! Asset endpoints.

use serde::{Deserialize, Serialize};

use koios_core::error::{KoiosError, RequestFailure};
use koios_core::response::ApiResponse;

use crate::client::{Client, Request};
use crate::types::{Address, AssetName, Lovelace, PolicyId, TxHash};

/// Asset metadata registered on the Cardano Token Registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRegistryMetadata {
    pub decimals: i64,
    pub description: String,
    /// PNG image as a byte string.
    pub logo: String,
    pub name: String,
    pub ticker: String,
    pub url: String,
}

/// Aggregated asset summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub asset_name: AssetName,
    pub policy_id: PolicyId,
    /// Registered wallets holding the asset.
    pub staked_wallets: i64,
    /// Transactions including the asset.
    pub total_transactions: i64,
    /// Payment addresses not belonging to registered wallets.
    pub unstaked_addresses: i64,
}

/// Information about an asset including first minting and registry metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub asset_name: AssetName,
    #[serde(default)]
    pub asset_name_ascii: String,
    /// CIP14 fingerprint.
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub minting_tx_metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub token_registry_metadata: Option<TokenRegistryMetadata>,
    pub policy_id: PolicyId,
    pub total_supply: Lovelace,
    #[serde(default)]
    pub creation_time: String,
}

/// Transaction hashes of an asset, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTxs {
    pub asset_name: AssetName,
    pub policy_id: PolicyId,
    pub tx_hashes: Vec<TxHash>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetNames {
    #[serde(default)]
    pub hex: Vec<String>,
    #[serde(default)]
    pub ascii: Vec<String>,
}

/// Item of `/asset_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetListItem {
    pub policy_id: PolicyId,
    pub asset_names: AssetNames,
}

/// Payment address holding an asset, with its balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHolder {
    pub payment_address: Address,
    pub quantity: Lovelace,
}

fn asset_request(
    path: &str,
    policy: &PolicyId,
    name: &AssetName,
) -> Result<Request, RequestFailure> {
    if policy.is_empty() {
        return Err(RequestFailure::rejected(KoiosError::InvalidArgument(
            "missing policy id".into(),
        )));
    }
    Ok(Request::get(path).query([
        ("_asset_policy", policy.as_str()),
        ("_asset_name", name.as_str()),
    ]))
}

impl Client {
    /// List of all native assets (paginated by the service).
    pub async fn asset_list(&self) -> Result<ApiResponse<Vec<AssetListItem>>, RequestFailure> {
        self.call(Request::get("/asset_list")).await
    }

    /// All addresses holding a given asset.
    pub async fn asset_address_list(
        &self,
        policy: &PolicyId,
        name: &AssetName,
    ) -> Result<ApiResponse<Vec<AssetHolder>>, RequestFailure> {
        let req = asset_request("/asset_address_list", policy, name)?;
        self.call(req).await
    }

    /// Information of an asset including first minting and token registry metadata.
    pub async fn asset_info(
        &self,
        policy: &PolicyId,
        name: &AssetName,
    ) -> Result<ApiResponse<AssetInfo>, RequestFailure> {
        let req = asset_request("/asset_info", policy, name)?;
        self.call::<Vec<AssetInfo>>(req).await?.into_single()
    }

    /// Summary of an asset.
    pub async fn asset_summary(
        &self,
        policy: &PolicyId,
        name: &AssetName,
    ) -> Result<ApiResponse<AssetSummary>, RequestFailure> {
        let req = asset_request("/asset_summary", policy, name)?;
        self.call::<Vec<AssetSummary>>(req).await?.into_single()
    }

    /// All transaction hashes of an asset, newest first.
    pub async fn asset_txs(
        &self,
        policy: &PolicyId,
        name: &AssetName,
    ) -> Result<ApiResponse<AssetTxs>, RequestFailure> {
        let req = asset_request("/asset_txs", policy, name)?;
        self.call::<Vec<AssetTxs>>(req).await?.into_single()
    }
}
