//! Live position account subscription over the pubsub websocket.
//!
//! A background task owns the websocket. It reports readiness once the first
//! `programSubscribe` is acknowledged, forwards every decoded mutation with
//! its slot, and reconnects with backoff when the stream drops. Mutations
//! made while disconnected are not replayed.

use futures_util::StreamExt;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_client::rpc_response::{Response, RpcKeyedAccount};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::account::{account_discriminator, decode_position};
use crate::application::retry::RetryPolicy;
use crate::domain::{PositionAddress, PositionUpdate};
use crate::error::{LedgerError, Result};
use crate::port::{PositionSubscription, SubscriptionHandle};

const UPDATE_BUFFER: usize = 4096;

/// Program accounts of type `account`, base64-encoded at `commitment`.
pub(crate) fn accounts_of_type(account: &str, commitment: CommitmentConfig) -> RpcProgramAccountsConfig {
    RpcProgramAccountsConfig {
        filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
            0,
            &account_discriminator(account),
        ))]),
        account_config: RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            commitment: Some(commitment),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[derive(Clone)]
pub(crate) struct SubscriptionParams {
    pub ws_url: String,
    pub program_id: Pubkey,
    pub commitment: CommitmentConfig,
    pub retry: RetryPolicy,
}

/// Open the subscription, returning once the first subscribe is acknowledged.
pub(crate) async fn subscribe_positions(params: SubscriptionParams) -> Result<PositionSubscription> {
    let (tx, updates) = mpsc::channel(UPDATE_BUFFER);
    let (handle, stop) = SubscriptionHandle::channel();
    let (ready_tx, ready_rx) = oneshot::channel();

    tokio::spawn(run(params, tx, stop, ready_tx));

    match ready_rx.await {
        Ok(Ok(())) => Ok(PositionSubscription { updates, handle }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(LedgerError::Subscription("subscription task exited".into()).into()),
    }
}

fn stopped(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow() || stop.has_changed().is_err()
}

async fn run(
    params: SubscriptionParams,
    tx: mpsc::Sender<PositionUpdate>,
    mut stop: watch::Receiver<bool>,
    ready: oneshot::Sender<Result<()>>,
) {
    let mut ready = Some(ready);
    let mut failures = 0u32;

    loop {
        let outcome = stream_positions(&params, &tx, &mut stop, &mut ready).await;
        if stopped(&stop) || tx.is_closed() {
            break;
        }

        match outcome {
            Err(e) => {
                if let Some(ready) = ready.take() {
                    let _ = ready.send(Err(e));
                    return;
                }
                failures += 1;
                warn!(error = %e, failures, "Position subscription failed");
            }
            Ok(()) => {
                failures = 1;
                warn!("Position subscription stream ended");
            }
        }

        let delay = params.retry.delay(failures);
        info!(delay_ms = delay.as_millis() as u64, "Resubscribing to position accounts");
        tokio::select! {
            _ = sleep(delay) => {}
            _ = stop.changed() => break,
        }
    }
    debug!("Position subscription task exiting");
}

async fn stream_positions(
    params: &SubscriptionParams,
    tx: &mpsc::Sender<PositionUpdate>,
    stop: &mut watch::Receiver<bool>,
    ready: &mut Option<oneshot::Sender<Result<()>>>,
) -> Result<()> {
    let client = PubsubClient::new(&params.ws_url)
        .await
        .map_err(|e| LedgerError::Subscription(e.to_string()))?;
    let (mut stream, unsubscribe) = client
        .program_subscribe(
            &params.program_id,
            Some(accounts_of_type("Position", params.commitment)),
        )
        .await
        .map_err(|e| LedgerError::Subscription(e.to_string()))?;

    if let Some(ready) = ready.take() {
        let _ = ready.send(Ok(()));
    }
    info!(program = %params.program_id, "Subscribed to position accounts");

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            item = stream.next() => {
                let Some(response) = item else { break };
                let Some(update) = to_update(response) else { continue };
                if tx.send(update).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(stream);
    unsubscribe().await;
    Ok(())
}

fn to_update(response: Response<RpcKeyedAccount>) -> Option<PositionUpdate> {
    let slot = response.context.slot;
    let keyed = response.value;

    let Some(account) = keyed.account.decode::<Account>() else {
        warn!(position = %keyed.pubkey, "Undecodable account notification");
        return None;
    };
    match decode_position(&keyed.pubkey, &account.data) {
        Ok(position) => Some(PositionUpdate {
            address: PositionAddress::new(keyed.pubkey),
            position,
            slot,
        }),
        Err(e) => {
            debug!(position = %keyed.pubkey, slot, error = %e, "Skipping position notification");
            None
        }
    }
}
