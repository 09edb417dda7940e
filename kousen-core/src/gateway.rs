// File: kousen-core/src/gateway.rs
//
// Discord transport over twilight: a `GatewayClient` for responses and a
// shard runner that feeds inbound messages into `Bot::run`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{
    self as gateway, CloseFrame, Config, Event, EventTypeFlags, Intents, MessageSender, Shard,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_http::client::ClientBuilder;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, UserMarker};

use crate::Error;
use crate::bot::Bot;
use kousen_common::models::{Author, CurrentUser, MessageEvent, SentMessage};
use kousen_common::traits::GatewayClient;

/// Intents needed to read message commands.
pub fn intents() -> Intents {
    Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES | Intents::MESSAGE_CONTENT
}

/// Responses and identity lookups through twilight's HTTP client, with an
/// optional in-memory cache consulted first.
pub struct TwilightClient {
    http: Arc<HttpClient>,
    cache: Option<Arc<InMemoryCache>>,
}

impl TwilightClient {
    pub fn new(http: Arc<HttpClient>, cache: Option<Arc<InMemoryCache>>) -> Self {
        Self { http, cache }
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }
}

#[async_trait]
impl GatewayClient for TwilightClient {
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<SentMessage, Error> {
        let channel = Id::<ChannelMarker>::new_checked(channel_id)
            .ok_or_else(|| Error::Platform(format!("Invalid channel ID: {channel_id}")))?;

        let message = self
            .http
            .create_message(channel)
            .content(content)
            .await
            .map_err(|e| Error::Platform(format!("Error sending Discord message: {e:?}")))?
            .model()
            .await
            .map_err(|e| Error::Platform(format!("Error reading sent Discord message: {e:?}")))?;

        Ok(SentMessage {
            id: message.id.get(),
            channel_id,
            content: message.content,
        })
    }

    async fn fetch_my_user(&self) -> Result<CurrentUser, Error> {
        if let Some(me) = self.cache.as_ref().and_then(|c| c.current_user()) {
            return Ok(CurrentUser::from(&me));
        }
        let me = self
            .http
            .current_user()
            .await
            .map_err(|e| Error::Platform(format!("Error fetching current user: {e:?}")))?
            .model()
            .await
            .map_err(|e| Error::Platform(format!("Error reading current user: {e:?}")))?;
        Ok(CurrentUser::from(&me))
    }

    fn cached_user(&self, user_id: u64) -> Option<Author> {
        let id = Id::<UserMarker>::new_checked(user_id)?;
        let cache = self.cache.as_ref()?;
        cache.user(id).map(|user| Author::from(user.value()))
    }
}

/// Reads gateway events from one shard: keeps the cache current, sets the
/// bot's mention prefixes on READY and forwards messages to `tx`.
async fn shard_runner(
    mut shard: Shard,
    tx: UnboundedSender<MessageEvent>,
    bot: Arc<Bot>,
    cache: Arc<InMemoryCache>,
) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
                continue;
            }
        };
        cache.update(&event);

        match &event {
            Event::Ready(ready) => {
                info!(
                    "Shard {shard_id} => READY as {} (ID={})",
                    ready.user.name, ready.user.id
                );
                bot.set_mention_prefixes(&CurrentUser::from(&ready.user));
            }
            Event::MessageCreate(msg) => {
                if tx.send(MessageEvent::from(&msg.0)).is_err() {
                    warn!("Shard {shard_id} => event loop is gone, stopping.");
                    break;
                }
            }
            _ => {
                trace!("Shard {shard_id} => unhandled event: {event:?}");
            }
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

/// A running Discord connection: shard tasks plus the bot's event loop.
pub struct DiscordGateway {
    shard_tasks: Vec<JoinHandle<()>>,
    shard_senders: Vec<MessageSender>,
    event_loop: JoinHandle<()>,
}

impl DiscordGateway {
    /// Create the recommended shards and start feeding `bot`. `http` and
    /// `cache` come from [`DiscordGateway::client`]; the bot should be built
    /// with the `TwilightClient` returned alongside them.
    pub async fn connect(
        token: String,
        http: Arc<HttpClient>,
        cache: Arc<InMemoryCache>,
        bot: Arc<Bot>,
    ) -> Result<Self, Error> {
        let (tx, rx) = unbounded_channel::<MessageEvent>();

        let config = Config::new(token, intents());
        let shards = gateway::create_recommended(&http, config, |_, b| b.build())
            .await
            .map_err(|e| Error::Platform(format!("create_recommended error: {e}")))?;

        let mut shard_tasks = Vec::new();
        let mut shard_senders = Vec::new();
        for shard in shards {
            shard_senders.push(shard.sender());
            let handle = tokio::spawn(shard_runner(shard, tx.clone(), bot.clone(), cache.clone()));
            shard_tasks.push(handle);
        }
        debug!("Spawned {} shard runner(s)", shard_tasks.len());

        let event_loop = tokio::spawn(bot.run(rx));
        Ok(Self {
            shard_tasks,
            shard_senders,
            event_loop,
        })
    }

    /// The HTTP client, cache and `GatewayClient` to build a bot with.
    pub fn client(token: String) -> (Arc<HttpClient>, Arc<InMemoryCache>, TwilightClient) {
        let http = Arc::new(
            ClientBuilder::new()
                .token(token)
                .timeout(Duration::from_secs(30))
                .build(),
        );
        let cache = Arc::new(
            InMemoryCache::builder()
                .resource_types(
                    ResourceType::GUILD
                        | ResourceType::CHANNEL
                        | ResourceType::MESSAGE
                        | ResourceType::USER
                        | ResourceType::USER_CURRENT,
                )
                .build(),
        );
        let client = TwilightClient::new(http.clone(), Some(cache.clone()));
        (http, cache, client)
    }

    /// Close every shard and wait for the runners and event loop to finish.
    pub async fn disconnect(self) {
        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        for task in self.shard_tasks {
            let _ = task.await;
        }
        // The runners held the only senders, so the loop ends on its own.
        let _ = self.event_loop.await;
        info!("(DiscordGateway) Disconnected.");
    }
}
