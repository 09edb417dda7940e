// File: kousen-server/src/console.rs
//
// A `GatewayClient` for local testing: responses go to stdout, the bot's
// identity is fixed.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use kousen_common::Error;
use kousen_common::models::{Author, CurrentUser, SentMessage};
use kousen_common::traits::GatewayClient;

pub const CONSOLE_CHANNEL: u64 = 1;
pub const CONSOLE_USER: u64 = 2;
pub const CONSOLE_BOT: u64 = 3;

pub struct ConsoleClient {
    next_id: AtomicU64,
}

impl ConsoleClient {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    pub fn console_author() -> Author {
        Author::human(CONSOLE_USER, "console")
    }
}

#[async_trait]
impl GatewayClient for ConsoleClient {
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<SentMessage, Error> {
        println!("[kousen #{channel_id}] {content}");
        Ok(SentMessage {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            channel_id,
            content: content.to_string(),
        })
    }

    async fn fetch_my_user(&self) -> Result<CurrentUser, Error> {
        Ok(CurrentUser {
            id: CONSOLE_BOT,
            name: "kousen".to_string(),
        })
    }

    fn cached_user(&self, user_id: u64) -> Option<Author> {
        (user_id == CONSOLE_USER).then(Self::console_author)
    }
}
