//! Program-derived addresses and instruction assembly.

use borsh::BorshSerialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

use super::account::instruction_discriminator;

pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// The program's global state account.
#[must_use]
pub fn perpetuals_pda(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"perpetuals"], program_id).0
}

/// Authority the program signs token transfers with.
#[must_use]
pub fn transfer_authority_pda(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"transfer_authority"], program_id).0
}

/// Associated token account of `owner` for `mint`.
#[must_use]
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

#[derive(BorshSerialize)]
struct GetLiquidationPriceParams {
    add_collateral: u64,
    remove_collateral: u64,
}

fn instruction_data<T: BorshSerialize>(name: &str, params: &T) -> Vec<u8> {
    let mut data = instruction_discriminator(name).to_vec();
    // Serializing into a Vec cannot fail.
    let _ = params.serialize(&mut data);
    data
}

/// Accounts of a `get_liquidation_price` view call.
#[derive(Debug, Clone)]
pub struct LiquidationPriceAccounts {
    pub pool: Pubkey,
    pub position: Pubkey,
    pub custody: Pubkey,
    pub custody_oracle: Pubkey,
}

/// `get_liquidation_price` with no collateral change.
#[must_use]
pub fn get_liquidation_price(program_id: &Pubkey, accounts: &LiquidationPriceAccounts) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(perpetuals_pda(program_id), false),
            AccountMeta::new_readonly(accounts.pool, false),
            AccountMeta::new_readonly(accounts.position, false),
            AccountMeta::new_readonly(accounts.custody, false),
            AccountMeta::new_readonly(accounts.custody_oracle, false),
        ],
        data: instruction_data(
            "get_liquidation_price",
            &GetLiquidationPriceParams {
                add_collateral: 0,
                remove_collateral: 0,
            },
        ),
    }
}

/// Accounts of a `liquidate` instruction.
#[derive(Debug, Clone)]
pub struct LiquidateAccounts {
    pub liquidator: Pubkey,
    pub owner: Pubkey,
    pub mint: Pubkey,
    pub pool: Pubkey,
    pub position: Pubkey,
    pub custody: Pubkey,
    pub custody_oracle: Pubkey,
    pub custody_token_account: Pubkey,
}

/// `liquidate`: settles to the owner's token account and pays the reward to
/// the liquidator's.
#[must_use]
pub fn liquidate(program_id: &Pubkey, accounts: &LiquidateAccounts) -> Instruction {
    let receiving_account = associated_token_address(&accounts.owner, &accounts.mint);
    let rewards_receiving_account = associated_token_address(&accounts.liquidator, &accounts.mint);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(accounts.liquidator, true),
            AccountMeta::new(receiving_account, false),
            AccountMeta::new(rewards_receiving_account, false),
            AccountMeta::new_readonly(transfer_authority_pda(program_id), false),
            AccountMeta::new_readonly(perpetuals_pda(program_id), false),
            AccountMeta::new(accounts.pool, false),
            AccountMeta::new(accounts.position, false),
            AccountMeta::new(accounts.custody, false),
            AccountMeta::new_readonly(accounts.custody_oracle, false),
            AccountMeta::new(accounts.custody_token_account, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: instruction_discriminator("liquidate").to_vec(),
    }
}
