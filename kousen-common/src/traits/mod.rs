// File: kousen-common/src/traits/mod.rs
pub mod gateway_traits;

pub use gateway_traits::GatewayClient;
