// File: kousen-core/src/test_utils.rs

use async_trait::async_trait;

use crate::Error;
use kousen_common::models::{CurrentUser, SentMessage};
use kousen_common::traits::GatewayClient;

/// Client that accepts every send and identifies as user 1.
pub struct NullClient;

#[async_trait]
impl GatewayClient for NullClient {
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<SentMessage, Error> {
        Ok(SentMessage {
            id: 1,
            channel_id,
            content: content.to_string(),
        })
    }

    async fn fetch_my_user(&self) -> Result<CurrentUser, Error> {
        Ok(CurrentUser {
            id: 1,
            name: "kousen".into(),
        })
    }
}
