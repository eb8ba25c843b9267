//! Chain RPC Provider - alloy-rs 0.9 Signing Connection
//!
//! Connects to the configured RPC endpoint with a local private-key
//! wallet and the recommended fillers (nonce, gas, chain id), so every
//! contract call can be signed and broadcast directly.
//!
//! The builder's filler stack is a deeply nested generic type; it is
//! named once by the `SigningProvider` alias to keep the adapter API clean.

use std::sync::Arc;

use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::Address;
use alloy::providers::fillers::{FillProvider, JoinFill, RecommendedFillers, WalletFiller};
use alloy::providers::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy::transports::BoxTransport;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::config::ChainConfig;

/// Environment variable holding the hex-encoded signing key.
pub const WALLET_KEY_ENV: &str = "WALLET_PRIVATE_KEY";

/// Concrete type of the wallet-enabled provider built in [`ChainProvider::connect`].
pub type SigningProvider = FillProvider<
    JoinFill<
        JoinFill<Identity, <Ethereum as RecommendedFillers>::RecommendedFillers>,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<BoxTransport>,
    BoxTransport,
    Ethereum,
>;

/// Shared signing provider backed by alloy-rs 0.9.
pub struct ChainProvider {
    /// Wallet-enabled provider.
    provider: Arc<SigningProvider>,
    /// Address of the signing wallet.
    account: Address,
    /// Chain id reported by the node.
    chain_id: u64,
}

impl ChainProvider {
    /// Connect with the key from `WALLET_PRIVATE_KEY`.
    pub async fn from_env(config: &ChainConfig) -> Result<Self> {
        let key = std::env::var(WALLET_KEY_ENV)
            .with_context(|| format!("{WALLET_KEY_ENV} not set"))?;
        Self::connect(config, &key).await
    }

    /// Connect to the RPC endpoint and validate the chain id.
    #[instrument(skip_all)]
    pub async fn connect(config: &ChainConfig, private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .context("Invalid wallet private key")?;
        let account = signer.address();

        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .on_builtin(&config.rpc_url)
            .await
            .context("Failed to connect to RPC endpoint")?;

        let provider: Arc<SigningProvider> = Arc::new(provider);

        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain ID")?;

        if let Some(expected) = config.chain_id {
            anyhow::ensure!(
                chain_id == expected,
                "Expected chain_id={expected}, node reports {chain_id}"
            );
        }

        info!(chain_id, account = %account, "Connected to chain RPC");

        Ok(Self {
            provider,
            account,
            chain_id,
        })
    }

    /// Get a shared reference to the alloy provider.
    pub fn inner(&self) -> Arc<SigningProvider> {
        Arc::clone(&self.provider)
    }

    /// Signing wallet address.
    pub fn account(&self) -> Address {
        self.account
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Check if the RPC connection is healthy via a lightweight call.
    pub async fn is_healthy(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }
}
