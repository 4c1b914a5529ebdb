//! Pyth price account polling.
//!
//! All configured price accounts are fetched with one `getMultipleAccounts`
//! call and decoded in place. Only the header and the aggregate price are
//! read from the (v2) price account layout.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use super::account::parse_pubkey;
use crate::domain::{AssetId, OracleAccount, OraclePrice};
use crate::error::{LedgerError, Result};
use crate::port::PriceOracle;

const MAGIC: u32 = 0xa1b2_c3d4;
const ACCOUNT_TYPE_PRICE: u32 = 3;
const STATUS_TRADING: u32 = 1;

const OFFSET_MAGIC: usize = 0;
const OFFSET_ACCOUNT_TYPE: usize = 8;
const OFFSET_EXPONENT: usize = 20;
const OFFSET_AGG_PRICE: usize = 208;
const OFFSET_AGG_CONFIDENCE: usize = 216;
const OFFSET_AGG_STATUS: usize = 224;
const MIN_LEN: usize = OFFSET_AGG_STATUS + 4;

fn read<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[offset..offset + N]);
    out
}

/// `value * 10^exponent`, if representable.
fn scaled(value: i128, exponent: i32) -> Option<Decimal> {
    if exponent <= 0 {
        Decimal::try_from_i128_with_scale(value, exponent.unsigned_abs()).ok()
    } else {
        let factor = 10i128.checked_pow(exponent.unsigned_abs())?;
        Decimal::try_from_i128_with_scale(value.checked_mul(factor)?, 0).ok()
    }
}

/// Decode a price account's aggregate price.
///
/// Returns `Ok(None)` when the aggregate is not currently trading.
pub fn decode_price_account(address: &str, data: &[u8]) -> Result<Option<OraclePrice>> {
    let decode_error = |reason: &str| LedgerError::Decode {
        account: "PythPrice",
        address: address.to_string(),
        reason: reason.to_string(),
    };

    if data.len() < MIN_LEN {
        return Err(decode_error("account too short").into());
    }
    if u32::from_le_bytes(read(data, OFFSET_MAGIC)) != MAGIC {
        return Err(decode_error("bad magic").into());
    }
    if u32::from_le_bytes(read(data, OFFSET_ACCOUNT_TYPE)) != ACCOUNT_TYPE_PRICE {
        return Err(decode_error("not a price account").into());
    }

    if u32::from_le_bytes(read(data, OFFSET_AGG_STATUS)) != STATUS_TRADING {
        return Ok(None);
    }

    let exponent = i32::from_le_bytes(read(data, OFFSET_EXPONENT));
    let price = i64::from_le_bytes(read(data, OFFSET_AGG_PRICE));
    let confidence = u64::from_le_bytes(read(data, OFFSET_AGG_CONFIDENCE));

    let price = scaled(i128::from(price), exponent).ok_or_else(|| decode_error("price out of range"))?;
    let confidence = scaled(i128::from(confidence), exponent)
        .ok_or_else(|| decode_error("confidence out of range"))?;
    Ok(Some(OraclePrice::new(price, confidence)))
}

/// [`PriceOracle`] reading Pyth price accounts over RPC.
pub struct PythOracle {
    rpc: Arc<RpcClient>,
    program_id: Pubkey,
}

impl PythOracle {
    /// `program_id` is the Pyth program owning price accounts on the cluster.
    pub fn new(rpc: Arc<RpcClient>, program_id: Pubkey) -> Self {
        Self { rpc, program_id }
    }
}

#[async_trait]
impl PriceOracle for PythOracle {
    async fn poll_prices(
        &self,
        accounts: &[(AssetId, OracleAccount)],
    ) -> Result<HashMap<AssetId, OraclePrice>> {
        let keys = accounts
            .iter()
            .map(|(_, account)| parse_pubkey(account.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let fetched = self.rpc.get_multiple_accounts(&keys).await?;

        let mut prices = HashMap::with_capacity(accounts.len());
        for ((asset, oracle), account) in accounts.iter().zip(fetched) {
            let Some(account) = account else {
                warn!(asset = %asset, oracle = %oracle, "Price account not found");
                continue;
            };
            if account.owner != self.program_id {
                warn!(
                    asset = %asset,
                    oracle = %oracle,
                    owner = %account.owner,
                    "Price account not owned by the oracle program"
                );
                continue;
            }
            match decode_price_account(oracle.as_str(), &account.data) {
                Ok(Some(price)) => {
                    prices.insert(asset.clone(), price);
                }
                Ok(None) => {
                    debug!(asset = %asset, oracle = %oracle, "Price not trading, keeping last price");
                }
                Err(e) => {
                    warn!(asset = %asset, error = %e, "Failed to decode price account");
                }
            }
        }
        Ok(prices)
    }
}
