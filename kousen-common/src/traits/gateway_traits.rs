// File: kousen-common/src/traits/gateway_traits.rs

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{Author, CurrentUser, SentMessage};

/// The transport/REST collaborator the dispatcher talks to.
///
/// Implemented by the twilight adapter in `kousen-core` and by the console
/// client in `kousen-server`; tests mock it with `mockall`.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Send `content` to `channel_id`, returning a handle to the sent message.
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<SentMessage, Error>;

    /// Fetch the bot's own identity. Called once per connection lifecycle.
    async fn fetch_my_user(&self) -> Result<CurrentUser, Error>;

    /// Look up a user in the collaborator's cache, if it keeps one.
    fn cached_user(&self, _user_id: u64) -> Option<Author> {
        None
    }
}
