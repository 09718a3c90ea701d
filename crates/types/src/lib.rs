pub mod cart;
pub mod checkout;
pub mod config;
pub mod customer;
pub mod money;

pub use cart::{CartLineItem, CartSnapshot, SnapshotError, MIN_FINANCEABLE_MINOR};
pub use checkout::{
    CheckoutItem, CheckoutMetadata, CheckoutRequest, ContactAddress, ContactBlock, MerchantBlock,
    PersonName,
};
pub use config::{AffirmEnv, AffirmKeys, ConfigError, GatewayConfig};
pub use customer::{Address, Customer, FALLBACK_ADDRESS, FALLBACK_FIRST_NAME, FALLBACK_LAST_NAME};
pub use money::to_minor_units;
