//! Solana RPC implementation of the ledger and liquidation ports.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rust_decimal::Decimal;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSimulateTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::{Instruction, InstructionError};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::{Transaction, TransactionError};
use tracing::{debug, info};

use super::account::{decode_custody, decode_position, parse_pubkey};
use super::instruction::{
    get_liquidation_price, liquidate, LiquidateAccounts, LiquidationPriceAccounts,
};
use super::subscription::{accounts_of_type, subscribe_positions, SubscriptionParams};
use crate::application::retry::RetryPolicy;
use crate::domain::{
    Custody, CustodyAddress, LiquidationTarget, Position, PositionAddress, PositionSnapshot,
    TransactionId,
};
use crate::error::{ExecutionError, LedgerError, Result};
use crate::port::{
    CustodySource, LiquidationPriceView, LiquidationSubmitter, PositionSource, PositionSubscription,
};

/// Client for the perpetuals program.
///
/// Reads positions and custodies, runs the liquidation price view call as a
/// simulated transaction, and signs liquidations with the liquidator wallet.
pub struct SolanaClient {
    rpc: Arc<RpcClient>,
    ws_url: String,
    program_id: Pubkey,
    commitment: CommitmentConfig,
    wallet: Arc<Keypair>,
    retry: RetryPolicy,
}

impl SolanaClient {
    pub fn new(
        rpc: Arc<RpcClient>,
        ws_url: String,
        program_id: Pubkey,
        commitment: CommitmentConfig,
        wallet: Arc<Keypair>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            rpc,
            ws_url,
            program_id,
            commitment,
            wallet,
            retry,
        }
    }

    #[must_use]
    pub fn liquidator(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    /// Simulate `instruction` paid by the liquidator, without signatures.
    async fn simulate(
        &self,
        instruction: Instruction,
    ) -> Result<solana_client::rpc_response::RpcSimulateTransactionResult> {
        let transaction = Transaction::new_with_payer(&[instruction], Some(&self.liquidator()));
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.commitment),
            ..Default::default()
        };
        let response = self
            .rpc
            .simulate_transaction_with_config(&transaction, config)
            .await?;
        Ok(response.value)
    }

    fn liquidate_instruction(&self, target: &LiquidationTarget) -> Result<Instruction> {
        let accounts = LiquidateAccounts {
            liquidator: self.liquidator(),
            owner: parse_pubkey(target.position.owner.as_str())?,
            mint: parse_pubkey(target.custody.mint.as_str())?,
            pool: parse_pubkey(target.position.pool.as_str())?,
            position: parse_pubkey(target.address.as_str())?,
            custody: parse_pubkey(target.position.custody.as_str())?,
            custody_oracle: parse_pubkey(target.custody.oracle_account.as_str())?,
            custody_token_account: parse_pubkey(target.custody.token_account.as_str())?,
        };
        Ok(liquidate(&self.program_id, &accounts))
    }
}

/// Anchor's `AccountNotInitialized`, raised when a closed account is passed.
const ACCOUNT_NOT_INITIALIZED: u32 = 3012;

/// Whether a failed simulation means the position account was already closed.
fn is_closed_account(err: &TransactionError, logs: Option<&Vec<String>>) -> bool {
    matches!(
        err,
        TransactionError::InstructionError(_, InstructionError::Custom(ACCOUNT_NOT_INITIALIZED))
    ) || logs.is_some_and(|logs| logs.iter().any(|line| line.contains("AccountNotInitialized")))
}

fn format_simulation_error(err: &TransactionError, logs: Option<&Vec<String>>) -> String {
    match logs.and_then(|logs| logs.iter().rev().find(|line| line.contains("Error"))) {
        Some(line) => format!("{err}: {line}"),
        None => err.to_string(),
    }
}

#[async_trait]
impl PositionSource for SolanaClient {
    async fn load_all_positions(&self) -> Result<PositionSnapshot> {
        // Taken before the read: every mutation at or after it gets replayed.
        let slot = self.rpc.get_slot().await?;
        let accounts = self
            .rpc
            .get_program_accounts_with_config(
                &self.program_id,
                accounts_of_type("Position", self.commitment),
            )
            .await?;

        let mut positions = Vec::with_capacity(accounts.len());
        for (address, account) in accounts {
            let address = address.to_string();
            match decode_position(&address, &account.data) {
                Ok(position) => positions.push((PositionAddress::new(address), position)),
                Err(e) => debug!(position = %address, error = %e, "Skipping position account"),
            }
        }
        debug!(positions = positions.len(), slot, "Loaded position accounts");
        Ok(PositionSnapshot { slot, positions })
    }

    async fn subscribe_positions(&self) -> Result<PositionSubscription> {
        subscribe_positions(SubscriptionParams {
            ws_url: self.ws_url.clone(),
            program_id: self.program_id,
            commitment: self.commitment,
            retry: self.retry.clone(),
        })
        .await
    }
}

#[async_trait]
impl CustodySource for SolanaClient {
    async fn load_all_custodies(&self) -> Result<Vec<(CustodyAddress, Custody)>> {
        let accounts = self
            .rpc
            .get_program_accounts_with_config(
                &self.program_id,
                accounts_of_type("Custody", self.commitment),
            )
            .await?;

        accounts
            .into_iter()
            .map(|(address, account)| {
                let address = address.to_string();
                let custody = decode_custody(&address, &account.data)?;
                Ok((CustodyAddress::new(address), custody))
            })
            .collect()
    }

    async fn fetch_custody(&self, address: &CustodyAddress) -> Result<Option<Custody>> {
        let key = parse_pubkey(address.as_str())?;
        let account = self
            .rpc
            .get_account_with_commitment(&key, self.commitment)
            .await?
            .value;

        match account {
            Some(account) if account.owner == self.program_id => {
                decode_custody(address.as_str(), &account.data).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl LiquidationPriceView for SolanaClient {
    async fn liquidation_price(
        &self,
        address: &PositionAddress,
        position: &Position,
        custody: &Custody,
    ) -> Result<Option<Decimal>> {
        let accounts = LiquidationPriceAccounts {
            pool: parse_pubkey(position.pool.as_str())?,
            position: parse_pubkey(address.as_str())?,
            custody: parse_pubkey(position.custody.as_str())?,
            custody_oracle: parse_pubkey(custody.oracle_account.as_str())?,
        };

        let result = self
            .simulate(get_liquidation_price(&self.program_id, &accounts))
            .await?;
        if let Some(err) = result.err {
            return Err(LedgerError::View(format_simulation_error(&err, result.logs.as_ref())).into());
        }

        let Some(return_data) = result.return_data else {
            return Ok(None);
        };
        let raw = BASE64
            .decode(&return_data.data.0)
            .map_err(|e| LedgerError::Decode {
                account: "get_liquidation_price",
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        // Return data is right-trimmed of zero bytes.
        if raw.len() > 8 {
            return Err(LedgerError::Decode {
                account: "get_liquidation_price",
                address: address.to_string(),
                reason: format!("expected a u64, got {} bytes", raw.len()),
            }
            .into());
        }
        let mut bytes = [0u8; 8];
        bytes[..raw.len()].copy_from_slice(&raw);
        let value = u64::from_le_bytes(bytes);

        Decimal::try_from_i128_with_scale(i128::from(value), u32::from(custody.decimals))
            .map(Some)
            .map_err(|e| {
                LedgerError::Decode {
                    account: "get_liquidation_price",
                    address: address.to_string(),
                    reason: e.to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl LiquidationSubmitter for SolanaClient {
    async fn simulate_liquidation(&self, target: &LiquidationTarget) -> Result<()> {
        let instruction = self.liquidate_instruction(target)?;
        let result = self.simulate(instruction).await?;
        match result.err {
            Some(err) => {
                let reason = format_simulation_error(&err, result.logs.as_ref());
                if is_closed_account(&err, result.logs.as_ref()) {
                    Err(ExecutionError::PositionClosed(reason).into())
                } else {
                    Err(ExecutionError::SimulationRejected(reason).into())
                }
            }
            None => Ok(()),
        }
    }

    async fn submit_liquidation(&self, target: &LiquidationTarget) -> Result<TransactionId> {
        let instruction = self.liquidate_instruction(target)?;
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| ExecutionError::SubmissionFailed(e.to_string()))?;
        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&self.liquidator()),
            &[self.wallet.as_ref()],
            blockhash,
        );

        let signature = self
            .rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| ExecutionError::SubmissionFailed(e.to_string()))?;
        info!(position = %target.address, signature = %signature, "Liquidation confirmed");
        Ok(TransactionId::new(signature.to_string()))
    }
}
