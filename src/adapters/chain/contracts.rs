//! Exchange Contract Bindings - Orders, Processor and OrderStore
//!
//! Implements the `OrderContract` and `OrderStore` ports with alloy
//! `sol!` bindings. Contract addresses come from `config.toml` and are
//! checked for deployed code at startup.

use std::sync::Arc;

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::sol;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::domain::classifier::OrderType;
use crate::domain::order::{OrderId, OrderRecord, UserOrder};
use crate::ports::execution::{OrderContract, PendingTx, TxReceipt};
use crate::ports::order_store::OrderStore;

use super::provider::{ChainProvider, SigningProvider};

sol! {
    /// Order tuple shared by the Orders and OrderStore contracts.
    #[derive(Debug)]
    struct Order {
        uint256 orderId;
        address user;
        address asset;
        string market;
        uint256 margin;
        uint256 size;
        uint256 price;
        uint256 fee;
        bool isLong;
        uint8 orderType;
        bool isReduceOnly;
        uint256 timestamp;
        uint256 expiry;
        uint256 cancelOrderId;
    }

    #[sol(rpc)]
    interface IOrders {
        function submitOrder(Order params, uint256 tpPrice, uint256 slPrice) external payable;
        function cancelOrder(uint256 orderId) external;
        function cancelOrders(uint256[] orderIds) external;
    }

    #[sol(rpc)]
    interface IProcessor {
        function selfExecuteOrder(uint256 orderId) external;
    }

    #[sol(rpc)]
    interface IOrderStore {
        function getUserOrders(address user) external view returns (Order[] memory);
    }
}

/// Exchange contract addresses loaded from config.
#[derive(Debug, Clone, Copy)]
pub struct ContractAddresses {
    /// Order entry (submit, cancel).
    pub orders: Address,
    /// Order execution.
    pub processor: Address,
    /// Order storage (read-only here).
    pub order_store: Address,
}

/// Signs and broadcasts order transactions via alloy-rs 0.9.
pub struct OrderContracts {
    /// Shared signing provider.
    provider: Arc<ChainProvider>,
    /// Contract addresses from config.
    addresses: ContractAddresses,
}

impl OrderContracts {
    /// Create contract bindings, validating that each address has code.
    #[instrument(skip_all)]
    pub async fn new(provider: Arc<ChainProvider>, addresses: ContractAddresses) -> Result<Self> {
        let inner = provider.inner();

        for (name, addr) in [
            ("Orders", addresses.orders),
            ("Processor", addresses.processor),
            ("OrderStore", addresses.order_store),
        ] {
            let code = inner
                .get_code_at(addr)
                .await
                .with_context(|| format!("Failed to query code for {name}"))?;

            if code.is_empty() {
                bail!("Contract {name} at {addr} has no deployed code, check config.toml");
            }

            info!(contract = name, address = %addr, "Validated on-chain");
        }

        Ok(Self {
            provider,
            addresses,
        })
    }

    fn orders(&self) -> IOrders::IOrdersInstance<alloy::transports::BoxTransport, Arc<SigningProvider>> {
        IOrders::new(self.addresses.orders, self.provider.inner())
    }
}

/// Wrap alloy's pending transaction into the port's `PendingTx`.
fn pending<T, N>(tx: alloy::providers::PendingTransactionBuilder<T, N>) -> PendingTx
where
    T: alloy::transports::Transport + Clone,
    N: alloy::network::Network,
{
    let tx_hash = tx.tx_hash().to_string();
    let hash = tx_hash.clone();

    PendingTx::new(tx_hash, async move {
        let receipt = tx
            .get_receipt()
            .await
            .with_context(|| format!("Failed to fetch receipt for {hash}"))?;
        Ok(TxReceipt {
            tx_hash: hash,
            status: u64::from(receipt.status()),
        })
    })
}

fn to_sol(record: &OrderRecord) -> Order {
    Order {
        orderId: U256::from(record.order_id),
        user: record.user,
        asset: record.asset,
        market: record.market.clone(),
        margin: record.margin,
        size: record.size,
        price: record.price,
        fee: record.fee,
        isLong: record.is_long,
        orderType: record.order_type.as_u8(),
        isReduceOnly: record.is_reduce_only,
        timestamp: U256::from(record.timestamp),
        expiry: U256::from(record.expiry),
        cancelOrderId: U256::from(record.cancel_order_id),
    }
}

fn from_sol(order: Order) -> UserOrder {
    let order_type = OrderType::from_u8(order.orderType).unwrap_or_else(|| {
        warn!(order_type = order.orderType, "Unknown order type, treating as market");
        OrderType::Market
    });

    OrderRecord {
        order_id: saturating_u64(order.orderId),
        user: order.user,
        asset: order.asset,
        market: order.market,
        margin: order.margin,
        size: order.size,
        price: order.price,
        fee: order.fee,
        is_long: order.isLong,
        order_type,
        is_reduce_only: order.isReduceOnly,
        timestamp: saturating_u64(order.timestamp),
        expiry: saturating_u64(order.expiry),
        cancel_order_id: saturating_u64(order.cancelOrderId),
    }
}

fn saturating_u64(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[async_trait]
impl OrderContract for OrderContracts {
    #[instrument(skip(self, order), fields(market = %order.market))]
    async fn submit_order(
        &self,
        order: &OrderRecord,
        tp_price: U256,
        sl_price: U256,
        value: Option<U256>,
    ) -> Result<PendingTx> {
        let orders = self.orders();
        let mut call = orders.submitOrder(to_sol(order), tp_price, sl_price);
        if let Some(value) = value {
            call = call.value(value);
        }

        let tx = call.send().await.context("submitOrder failed")?;
        Ok(pending(tx))
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, order_id: OrderId) -> Result<PendingTx> {
        let tx = self
            .orders()
            .cancelOrder(U256::from(order_id))
            .send()
            .await
            .context("cancelOrder failed")?;
        Ok(pending(tx))
    }

    #[instrument(skip(self), fields(count = order_ids.len()))]
    async fn cancel_orders(&self, order_ids: &[OrderId]) -> Result<PendingTx> {
        let ids = order_ids.iter().copied().map(U256::from).collect();
        let tx = self
            .orders()
            .cancelOrders(ids)
            .send()
            .await
            .context("cancelOrders failed")?;
        Ok(pending(tx))
    }

    #[instrument(skip(self))]
    async fn self_execute_order(&self, order_id: OrderId) -> Result<PendingTx> {
        let processor = IProcessor::new(self.addresses.processor, self.provider.inner());
        let tx = processor
            .selfExecuteOrder(U256::from(order_id))
            .send()
            .await
            .context("selfExecuteOrder failed")?;
        Ok(pending(tx))
    }
}

#[async_trait]
impl OrderStore for OrderContracts {
    #[instrument(skip(self))]
    async fn get_user_orders(&self, user: Address) -> Result<Vec<UserOrder>> {
        let store = IOrderStore::new(self.addresses.order_store, self.provider.inner());
        let orders = store
            .getUserOrders(user)
            .call()
            .await
            .context("getUserOrders failed")?
            ._0;

        Ok(orders.into_iter().map(from_sol).collect())
    }
}
