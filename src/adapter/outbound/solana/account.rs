//! Anchor account codecs for the perpetuals program.
//!
//! Anchor prefixes every account with an 8-byte discriminator,
//! `sha256("account:<Name>")[..8]`. The layouts below cover the leading
//! fields the agent reads; trailing fields are left undecoded.

use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

use crate::domain::{
    AssetId, Custody, CustodyAddress, OracleAccount, PoolAddress, Position, Side, TokenAccount,
    WalletAddress,
};
use crate::error::{LedgerError, Result};

pub const DISCRIMINATOR_LEN: usize = 8;

/// Discriminator of the Anchor account named `name`.
#[must_use]
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    hashed_prefix(&format!("account:{name}"))
}

/// Discriminator of the Anchor instruction named `name` (snake case).
#[must_use]
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    hashed_prefix(&format!("global:{name}"))
}

fn hashed_prefix(preimage: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(preimage.as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

/// Parse a base58 address.
pub fn parse_pubkey(address: &str) -> Result<Pubkey> {
    Pubkey::from_str(address).map_err(|e| {
        LedgerError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) enum RawSide {
    None,
    Long,
    Short,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawPosition {
    pub owner: [u8; 32],
    pub pool: [u8; 32],
    pub custody: [u8; 32],
    pub collateral_custody: [u8; 32],
    pub open_time: i64,
    pub update_time: i64,
    pub side: RawSide,
    pub price: u64,
    pub size_usd: u64,
    pub borrow_size_usd: u64,
    pub collateral_usd: u64,
    pub unrealized_profit_usd: u64,
    pub unrealized_loss_usd: u64,
    pub cumulative_interest_snapshot: u128,
    pub locked_amount: u64,
    pub collateral_amount: u64,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawOracleParams {
    pub oracle_account: [u8; 32],
    pub oracle_type: u8,
    pub max_price_error: u64,
    pub max_price_age_sec: u32,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawCustody {
    pub pool: [u8; 32],
    pub mint: [u8; 32],
    pub token_account: [u8; 32],
    pub decimals: u8,
    pub is_stable: bool,
    pub oracle: RawOracleParams,
}

fn key(bytes: [u8; 32]) -> String {
    Pubkey::new_from_array(bytes).to_string()
}

fn decode_body<T: BorshDeserialize>(
    account: &'static str,
    address: &str,
    data: &[u8],
) -> Result<T> {
    let decode_error = |reason: String| LedgerError::Decode {
        account,
        address: address.to_string(),
        reason,
    };

    if data.len() < DISCRIMINATOR_LEN {
        return Err(decode_error(format!("{} bytes is too short", data.len())).into());
    }
    let (discriminator, mut body) = data.split_at(DISCRIMINATOR_LEN);
    if discriminator != account_discriminator(account).as_slice() {
        return Err(decode_error("discriminator mismatch".to_string()).into());
    }
    T::deserialize(&mut body).map_err(|e| decode_error(e.to_string()).into())
}

/// Decode a `Position` account.
pub fn decode_position(address: &str, data: &[u8]) -> Result<Position> {
    let raw: RawPosition = decode_body("Position", address, data)?;
    let side = match raw.side {
        RawSide::Long => Side::Long,
        RawSide::Short => Side::Short,
        RawSide::None => {
            return Err(LedgerError::Decode {
                account: "Position",
                address: address.to_string(),
                reason: "position has no side".to_string(),
            }
            .into())
        }
    };

    Ok(Position {
        owner: WalletAddress::new(key(raw.owner)),
        pool: PoolAddress::new(key(raw.pool)),
        custody: CustodyAddress::new(key(raw.custody)),
        side,
        price: raw.price,
        size_usd: raw.size_usd,
        collateral_usd: raw.collateral_usd,
        collateral_amount: raw.collateral_amount,
        open_time: raw.open_time,
        update_time: raw.update_time,
    })
}

/// Decode a `Custody` account.
pub fn decode_custody(address: &str, data: &[u8]) -> Result<Custody> {
    let raw: RawCustody = decode_body("Custody", address, data)?;
    Ok(Custody {
        pool: PoolAddress::new(key(raw.pool)),
        mint: AssetId::new(key(raw.mint)),
        token_account: TokenAccount::new(key(raw.token_account)),
        decimals: raw.decimals,
        oracle_account: OracleAccount::new(key(raw.oracle.oracle_account)),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn encode<T: BorshSerialize>(account: &str, raw: &T) -> Vec<u8> {
        let mut data = account_discriminator(account).to_vec();
        data.extend(borsh::to_vec(raw).unwrap());
        // Fields past the decoded prefix.
        data.extend([0u8; 16]);
        data
    }

    pub(crate) fn raw_position(side: RawSide) -> RawPosition {
        RawPosition {
            owner: [1; 32],
            pool: [2; 32],
            custody: [3; 32],
            collateral_custody: [3; 32],
            open_time: 1_700_000_000,
            update_time: 1_700_000_100,
            side,
            price: 25_000_000,
            size_usd: 1_000_000_000,
            borrow_size_usd: 900_000_000,
            collateral_usd: 100_000_000,
            unrealized_profit_usd: 0,
            unrealized_loss_usd: 0,
            cumulative_interest_snapshot: 0,
            locked_amount: 40_000_000_000,
            collateral_amount: 4_000_000_000,
        }
    }

    pub(crate) fn raw_custody() -> RawCustody {
        RawCustody {
            pool: [2; 32],
            mint: [4; 32],
            token_account: [5; 32],
            decimals: 9,
            is_stable: false,
            oracle: RawOracleParams {
                oracle_account: [6; 32],
                oracle_type: 2,
                max_price_error: 10_000,
                max_price_age_sec: 60,
            },
        }
    }

    #[test]
    fn discriminators_are_namespaced() {
        assert_ne!(account_discriminator("Position"), account_discriminator("Custody"));
        assert_ne!(
            account_discriminator("liquidate"),
            instruction_discriminator("liquidate")
        );
    }

    #[test]
    fn decodes_position_prefix() {
        let data = encode("Position", &raw_position(RawSide::Short));

        let position = decode_position("pos", &data).unwrap();

        assert_eq!(position.side, Side::Short);
        assert_eq!(position.owner.as_str(), Pubkey::new_from_array([1; 32]).to_string());
        assert_eq!(position.custody.as_str(), Pubkey::new_from_array([3; 32]).to_string());
        assert_eq!(position.collateral_amount, 4_000_000_000);
        assert_eq!(position.update_time, 1_700_000_100);
    }

    #[test]
    fn decodes_custody_prefix() {
        let data = encode("Custody", &raw_custody());

        let custody = decode_custody("cust", &data).unwrap();

        assert_eq!(custody.decimals, 9);
        assert_eq!(custody.mint.as_str(), Pubkey::new_from_array([4; 32]).to_string());
        assert_eq!(
            custody.oracle_account.as_str(),
            Pubkey::new_from_array([6; 32]).to_string()
        );
    }

    #[test]
    fn rejects_wrong_account_type() {
        let data = encode("Custody", &raw_custody());
        let err = decode_position("pos", &data).unwrap_err();
        assert!(err.to_string().contains("discriminator mismatch"));
    }

    #[test]
    fn rejects_truncated_and_sideless_positions() {
        assert!(decode_position("pos", &[0u8; 4]).is_err());

        let data = encode("Position", &raw_position(RawSide::None));
        assert!(decode_position("pos", &data).is_err());

        let data = encode("Position", &raw_position(RawSide::Long));
        assert!(decode_position("pos", &data[..40]).is_err());
    }

    #[test]
    fn parse_pubkey_rejects_garbage() {
        assert!(parse_pubkey("not-a-key").is_err());
        assert!(parse_pubkey(&Pubkey::new_unique().to_string()).is_ok());
    }
}
