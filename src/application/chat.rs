//! Chat service.
//!
//! Same lifecycle as the cart, with one twist: the conversation's identity
//! is allocated by the server on the first successful send. Until then the
//! optimistic messages live under the provisional draft key; on first
//! success the slot is migrated atomically to the thread key and the
//! thread id is persisted durably so a reload resumes the same slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, instrument};

use crate::cache::{CacheValue, QueryCache, QueryKey, QueryStatus};
use crate::config::CoreConfig;
use crate::domain::chat::{ChatMessage, ChatThread, ThreadId};
use crate::mutation::{CommitFn, MutationCoordinator, MutationDescriptor, MutationError, ReconcileFn};
use crate::remote::{ServerResult, StoreClient};
use crate::session::DurableStore;

/// Durable-store key holding the adopted thread id.
pub const THREAD_ID_KEY: &str = "chat.thread_id";

/// Read-only snapshot handed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatView {
    pub messages: Vec<ChatMessage>,
    pub is_typing: bool,
    pub is_loading: bool,
    pub error: Option<MutationError>,
}

pub struct ChatService {
    cache: Arc<QueryCache>,
    coordinator: Arc<MutationCoordinator>,
    client: Arc<dyn StoreClient>,
    durable: Arc<dyn DurableStore>,
    config: CoreConfig,
    is_typing: Arc<AtomicBool>,
    last_error: Mutex<Option<MutationError>>,
    /// Serializes sends so thread adoption is visible to the next send.
    /// The coordinator lane alone cannot order this: before adoption the
    /// send targets the draft key, after it the thread key.
    send_lane: tokio::sync::Mutex<()>,
}

fn reconcile_thread(prev: Option<CacheValue>, result: ServerResult) -> CacheValue {
    let thread = match prev {
        Some(CacheValue::Chat(thread)) => thread,
        _ => ChatThread::default(),
    };
    match result {
        // The snapshot predates the optimistic pending message, so the
        // confirmed message lands exactly once.
        ServerResult::ChatAck { message, .. } => CacheValue::Chat(thread.with_message(message)),
        _ => CacheValue::Chat(thread),
    }
}

impl ChatService {
    pub fn new(
        cache: Arc<QueryCache>,
        coordinator: Arc<MutationCoordinator>,
        client: Arc<dyn StoreClient>,
        durable: Arc<dyn DurableStore>,
        config: CoreConfig,
    ) -> Self {
        Self {
            cache,
            coordinator,
            client,
            durable,
            config,
            is_typing: Arc::new(AtomicBool::new(false)),
            last_error: Mutex::new(None),
            send_lane: tokio::sync::Mutex::new(()),
        }
    }

    /// The persisted thread identity, if a conversation exists.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.durable
            .get(THREAD_ID_KEY)
            .and_then(|value| ThreadId::parse(&value))
    }

    fn active_key(&self) -> QueryKey {
        match self.thread_id() {
            Some(id) => QueryKey::ChatThread(id),
            None => QueryKey::ChatDraft,
        }
    }

    fn record_error(&self, error: Option<MutationError>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = error;
    }

    /// Resume the persisted conversation from the durable server log.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<(), MutationError> {
        let Some(thread_id) = self.thread_id() else {
            return Ok(());
        };
        let key = QueryKey::ChatThread(thread_id);
        self.cache.set_status(&key, QueryStatus::Loading);
        match self.client.fetch_thread(thread_id).await {
            Ok(thread) => {
                // A reload never clears a surfaced mutation error; only the
                // next successful send does.
                self.cache
                    .write(&key, Some(CacheValue::Chat(thread)), QueryStatus::Success);
                Ok(())
            }
            Err(remote) => {
                self.cache.set_status(&key, QueryStatus::Error);
                let error = MutationError::from(remote);
                self.record_error(Some(error.clone()));
                Err(error)
            }
        }
    }

    /// Reload the thread when flagged or past its staleness horizon.
    pub async fn refresh_if_needed(&self) -> Result<(), MutationError> {
        let Some(thread_id) = self.thread_id() else {
            return Ok(());
        };
        let key = QueryKey::ChatThread(thread_id);
        let needs_reload = match self.cache.read(&key) {
            None => true,
            Some(entry) => {
                entry.value.is_none()
                    || entry.refetch_forced
                    || entry.is_stale(time::OffsetDateTime::now_utc(), self.config.stale_horizon())
            }
        };
        if needs_reload { self.load().await } else { Ok(()) }
    }

    /// Send a message optimistically.
    ///
    /// On the first successful send the draft slot is adopted into the
    /// server-allocated thread key; the assistant reply is surfaced after
    /// the typing delay without blocking settlement.
    #[instrument(skip(self, body))]
    pub async fn send_message(&self, body: impl Into<String>) -> Result<(), MutationError> {
        let body = body.into().trim().to_string();
        if body.is_empty() {
            let error = MutationError::Validation("message body is empty".to_string());
            self.record_error(Some(error.clone()));
            return Err(error);
        }

        // Held through adoption: a queued send must resolve the thread id
        // only after the in-flight send has migrated the draft and
        // persisted the id, or it would make the server allocate a second
        // thread and strand the first message.
        let _serial = self.send_lane.lock().await;

        let existing = self.thread_id();
        let target = self.active_key();
        let current = match self.cache.read(&target).and_then(|entry| entry.value) {
            Some(CacheValue::Chat(thread)) => thread,
            _ => ChatThread::default(),
        };
        let optimistic = current.with_message(ChatMessage::pending_user(body.clone()));

        let client = Arc::clone(&self.client);
        let commit: CommitFn =
            Box::new(move || Box::pin(async move { client.send_message(existing, body).await }));
        let reconcile: ReconcileFn = Box::new(reconcile_thread);

        let outcome = self
            .coordinator
            .run(MutationDescriptor::new(
                target,
                CacheValue::Chat(optimistic),
                commit,
                reconcile,
            ))
            .await;

        match outcome {
            Ok(ServerResult::ChatAck {
                thread_id, reply, ..
            }) => {
                let thread_key = QueryKey::ChatThread(thread_id);
                if existing.is_none() {
                    // Adopt the server-allocated identity: the slot moves
                    // atomically, then the id is persisted for reloads.
                    self.cache.migrate(&QueryKey::ChatDraft, &thread_key);
                    self.durable.set(THREAD_ID_KEY, &thread_id.to_string());
                    debug!(thread_id = %thread_id, "Chat thread adopted");
                }
                self.record_error(None);
                self.spawn_typing_reply(thread_key, reply);
                Ok(())
            }
            Ok(_) => {
                self.record_error(None);
                Ok(())
            }
            Err(error) => {
                self.record_error(Some(error.clone()));
                if error.is_conflict() && existing.is_some() {
                    let _ = self.load().await;
                }
                Err(error)
            }
        }
    }

    /// Surface the assistant reply after the typing delay, then mark the
    /// thread stale so the next observation reconciles with the server
    /// log. Detached: settlement never waits on this.
    fn spawn_typing_reply(&self, key: QueryKey, reply: ChatMessage) {
        self.is_typing.store(true, Ordering::SeqCst);
        let cache = Arc::clone(&self.cache);
        let typing = Arc::clone(&self.is_typing);
        let delay = self.config.typing_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let thread = match cache.read(&key).and_then(|entry| entry.value) {
                Some(CacheValue::Chat(thread)) => thread,
                _ => ChatThread::default(),
            };
            cache.write(
                &key,
                Some(CacheValue::Chat(thread.with_message(reply))),
                QueryStatus::Success,
            );
            cache.mark_stale(&key);
            typing.store(false, Ordering::SeqCst);
        });
    }

    /// Derived view over the active conversation slot.
    pub fn view(&self) -> ChatView {
        let entry = self.cache.read(&self.active_key());
        let is_loading = entry.as_ref().is_some_and(|entry| entry.is_loading());
        let messages = match entry.and_then(|entry| entry.value) {
            Some(CacheValue::Chat(thread)) => thread.messages,
            _ => Vec::new(),
        };
        ChatView {
            messages,
            is_typing: self.is_typing.load(Ordering::SeqCst),
            is_loading,
            error: self
                .last_error
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        }
    }
}
