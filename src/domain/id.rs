//! Ledger address newtypes.
//!
//! Every on-chain address is carried in its canonical base58 string form,
//! converted once at the adapter boundary and used as the map key everywhere
//! after that. Distinct newtypes keep a position address from ever being
//! looked up in the custody cache by mistake.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! address_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "` from its base58 form.")]
            pub fn new(address: impl Into<String>) -> Self {
                Self(address.into())
            }

            /// Get the address as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

address_id!(
    /// Address of a position account.
    PositionAddress
);

address_id!(
    /// Address of a custody account.
    CustodyAddress
);

address_id!(
    /// Address of a liquidity pool account.
    PoolAddress
);

address_id!(
    /// Address of a wallet (position owner or liquidator).
    WalletAddress
);

address_id!(
    /// Asset identity: the mint a custody holds and a price is quoted for.
    AssetId
);

address_id!(
    /// Address of an oracle price account.
    OracleAccount
);

address_id!(
    /// Address of an SPL token account.
    TokenAccount
);

/// Identifier of a submitted transaction (its signature).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    /// Create a new `TransactionId`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying signature string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
