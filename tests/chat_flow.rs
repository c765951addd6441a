//! Chat thread lifecycle: provisional draft, atomic adoption of the
//! server-allocated thread, durable resume, and the typing delay.

use std::sync::Arc;
use std::time::Duration;

use bottega_core::application::chat::THREAD_ID_KEY;
use bottega_core::cache::QueryKey;
use bottega_core::domain::chat::MessageRole;
use bottega_core::remote::RemoteErrorKind;
use bottega_core::remote::memory::InMemoryStoreClient;
use bottega_core::session::{DurableStore, MemoryStore};
use bottega_core::{ChatService, CoreConfig, MutationCoordinator, MutationError, QueryCache};

struct Fixture {
    cache: Arc<QueryCache>,
    client: Arc<InMemoryStoreClient>,
    durable: Arc<MemoryStore>,
    chat: Arc<ChatService>,
}

fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let cache = Arc::new(QueryCache::new());
    let client = Arc::new(InMemoryStoreClient::new());
    let durable = Arc::new(MemoryStore::new());
    let coordinator = Arc::new(MutationCoordinator::new(cache.clone()));
    let chat = Arc::new(ChatService::new(
        cache.clone(),
        coordinator,
        client.clone(),
        durable.clone(),
        CoreConfig::default(),
    ));
    Fixture {
        cache,
        client,
        durable,
        chat,
    }
}

#[tokio::test(start_paused = true)]
async fn first_message_migrates_draft_to_thread_atomically() {
    let fx = fixture();
    assert!(fx.chat.thread_id().is_none());

    fx.chat
        .send_message("where is my order?")
        .await
        .expect("send");

    // Exactly one live slot: the draft is gone, the thread holds the
    // confirmed user message.
    let thread_id = fx.chat.thread_id().expect("adopted thread id");
    assert!(fx.cache.read(&QueryKey::ChatDraft).is_none());
    let entry = fx
        .cache
        .read(&QueryKey::ChatThread(thread_id))
        .expect("thread entry");
    let thread = entry.value.expect("value").as_chat().cloned().expect("chat");
    assert_eq!(thread.len(), 1);
    assert_eq!(thread.messages[0].role, MessageRole::User);
    assert!(!thread.messages[0].pending);

    // The id is durable for the next session.
    assert_eq!(
        fx.durable.get(THREAD_ID_KEY),
        Some(thread_id.to_string())
    );

    // The assistant reply is withheld until the typing delay elapses.
    assert!(fx.chat.view().is_typing);
    assert_eq!(fx.chat.view().messages.len(), 1);

    tokio::time::sleep(Duration::from_millis(1_300)).await;

    let view = fx.chat.view();
    assert!(!view.is_typing);
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.messages[1].role, MessageRole::Assistant);
}

#[tokio::test(start_paused = true)]
async fn second_message_targets_the_adopted_thread() {
    let fx = fixture();
    fx.chat.send_message("first").await.expect("send");
    tokio::time::sleep(Duration::from_millis(1_300)).await;

    fx.chat.send_message("second").await.expect("send");
    tokio::time::sleep(Duration::from_millis(1_300)).await;

    assert!(fx.cache.read(&QueryKey::ChatDraft).is_none());
    let view = fx.chat.view();
    // Two user messages, two assistant replies.
    assert_eq!(view.messages.len(), 4);
    let user_count = view
        .messages
        .iter()
        .filter(|message| message.role == MessageRole::User)
        .count();
    assert_eq!(user_count, 2);
}

#[tokio::test(start_paused = true)]
async fn reload_resumes_the_same_thread_from_durable_id() {
    let fx = fixture();
    fx.chat.send_message("remember me").await.expect("send");
    tokio::time::sleep(Duration::from_millis(1_300)).await;
    let thread_id = fx.chat.thread_id().expect("thread id");

    // A fresh session: new cache and service, same durable store and
    // server.
    let cache = Arc::new(QueryCache::new());
    let coordinator = Arc::new(MutationCoordinator::new(cache.clone()));
    let resumed = ChatService::new(
        cache,
        coordinator,
        fx.client.clone(),
        fx.durable.clone(),
        CoreConfig::default(),
    );
    assert_eq!(resumed.thread_id(), Some(thread_id));

    resumed.load().await.expect("resume load");
    let view = resumed.view();
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.messages[0].body, "remember me");
}

#[tokio::test(start_paused = true)]
async fn concurrent_first_sends_share_one_thread() {
    let fx = fixture();
    fx.client.set_latency(Duration::from_millis(50));

    // Both sends start before any thread exists. The second must wait for
    // the first's adoption and land on the same conversation instead of
    // making the server allocate a second one.
    let first = tokio::spawn({
        let chat = fx.chat.clone();
        async move { chat.send_message("first question").await }
    });
    tokio::task::yield_now().await;
    let second = tokio::spawn({
        let chat = fx.chat.clone();
        async move { chat.send_message("second question").await }
    });

    first.await.expect("join first").expect("send");
    second.await.expect("join second").expect("send");
    tokio::time::sleep(Duration::from_millis(1_300)).await;

    assert!(fx.cache.read(&QueryKey::ChatDraft).is_none());
    let thread_id = fx.chat.thread_id().expect("thread id");
    let user_bodies: Vec<_> = fx
        .chat
        .view()
        .messages
        .iter()
        .filter(|message| message.role == MessageRole::User)
        .map(|message| message.body.clone())
        .collect();
    assert_eq!(user_bodies, vec!["first question", "second question"]);

    // One server-side conversation holds both messages.
    let server = fx.client.server_thread(thread_id).expect("server thread");
    let server_user_count = server
        .messages
        .iter()
        .filter(|message| message.role == MessageRole::User)
        .count();
    assert_eq!(server_user_count, 2);
}

#[tokio::test]
async fn failed_first_send_keeps_the_draft_provisional() {
    let fx = fixture();
    fx.client.fail_next(RemoteErrorKind::Network);

    let error = fx
        .chat
        .send_message("lost in transit")
        .await
        .expect_err("network failure");
    assert!(matches!(error, MutationError::Network(_)));

    // No thread was adopted and the draft rolled back to absent.
    assert!(fx.chat.thread_id().is_none());
    assert!(fx.cache.read(&QueryKey::ChatDraft).is_none());
    assert_eq!(fx.chat.view().error, Some(error));
}

#[tokio::test]
async fn empty_message_is_rejected_locally() {
    let fx = fixture();
    let error = fx
        .chat
        .send_message("   ")
        .await
        .expect_err("empty body");
    assert!(matches!(error, MutationError::Validation(_)));
    // Nothing was written optimistically.
    assert!(fx.cache.read(&QueryKey::ChatDraft).is_none());
}

#[tokio::test(start_paused = true)]
async fn typing_delay_does_not_block_settlement() {
    let fx = fixture();

    // send_message returns before the typing delay elapses; the reply
    // lands later without any further calls.
    fx.chat.send_message("quick question").await.expect("send");
    assert_eq!(fx.chat.view().messages.len(), 1);
    assert!(fx.chat.view().is_typing);

    tokio::time::sleep(Duration::from_millis(1_300)).await;
    assert_eq!(fx.chat.view().messages.len(), 2);

    // The thread was re-marked stale so the next observation reconciles
    // with the server log.
    let thread_id = fx.chat.thread_id().expect("thread id");
    let entry = fx
        .cache
        .read(&QueryKey::ChatThread(thread_id))
        .expect("entry");
    assert!(entry.stale_after.is_some());
}
