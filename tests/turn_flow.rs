//! End-to-end turn flow: streamed reply -> parser -> dispatcher -> session

mod common;

use std::sync::Arc;

use patter::commands::fallback::RecommendationHeuristic;
use patter::config::HeuristicsConfig;
use patter::{
    CommandKind, Dispatcher, HostPlatform, NavigationTarget, NullHost, Session, SessionStore,
};

use common::stream_reply;

#[test]
fn streamed_reply_round_trips_blocks_and_prose() {
    let reply = "Great choice!\n\
                 :::open_product\n\
                 handle: blue-runner\n\
                 title: Blue Runner Sneaker\n\
                 :::\n\
                 I can also add the matching socks.\n\
                 :::add_to_cart\n\
                 name: Wool Socks\n\
                 :::\n\
                 Anything else?";

    // Chunk boundaries fall everywhere, including inside fences
    for chunk_size in [1, 3, 7, 64, 4096] {
        let (blocks, speakable) = stream_reply(reply, chunk_size);

        assert_eq!(blocks.len(), 2, "chunk size {chunk_size}");
        assert_eq!(blocks[0].kind, CommandKind::OpenProduct);
        assert_eq!(blocks[0].attr("handle"), Some("blue-runner"));
        assert_eq!(blocks[1].kind, CommandKind::AddToCart);
        assert_eq!(blocks[1].attr("name"), Some("Wool Socks"));

        assert_eq!(
            speakable,
            "Great choice!\nI can also add the matching socks.\nAnything else?"
        );
    }
}

#[tokio::test]
async fn last_navigation_in_reply_wins() {
    let reply = "Taking you to your cart.\n\
                 :::navigate_to_cart\n\
                 :::\n\
                 Actually, let's check out.\n\
                 :::navigate_to_checkout\n\
                 :::\n";

    let host = Arc::new(NullHost::new());
    let mut dispatcher = Dispatcher::new(Arc::clone(&host) as Arc<dyn HostPlatform>, None);

    let (blocks, _) = stream_reply(reply, 5);
    for block in &blocks {
        dispatcher.dispatch(block).await;
    }

    assert_eq!(
        dispatcher.pending_navigation(),
        Some(&NavigationTarget::Checkout)
    );

    // Deferred execution funnels through the host exactly once
    let target = dispatcher.take_pending().unwrap();
    dispatcher.navigate(&target).await.unwrap();
    assert_eq!(host.navigations(), vec!["/checkout".to_string()]);
}

#[test]
fn recommendation_prose_without_commands_synthesizes_search() {
    let reply = "I'd recommend the Trail Nine at $449, or the City Glide, \
                 currently $329 with free shipping.";
    let (blocks, speakable) = stream_reply(reply, 16);
    assert!(blocks.is_empty());

    let heuristic = RecommendationHeuristic::new(HeuristicsConfig::default());
    assert!(heuristic.looks_like_recommendation(&speakable));

    let query = heuristic.search_query_from("show me something under 500");
    assert_eq!(query, "under 500");
    assert!(query.split_whitespace().count() <= 4);
}

#[test]
fn session_survives_a_page_navigation() {
    let dir = tempfile::tempdir().unwrap();

    // First page: converse, then flush right before navigating away
    let original_id;
    {
        let store = SessionStore::new(dir.path());
        let mut session = Session::new();
        session.is_open = true;
        session.push_user("take me to checkout");
        session.push_assistant("Heading to checkout.");
        session.checkout_intent = true;
        original_id = session.session_id.clone();
        store.flush(&session).unwrap();
    }

    // New page: a fresh store (fresh script lifetime) restores everything
    let store = SessionStore::new(dir.path());
    let restored = store.load().unwrap();

    assert_eq!(restored.session_id, original_id);
    assert!(restored.is_open);
    assert!(restored.checkout_intent);
    assert_eq!(restored.turn_history.len(), 2);
    assert_eq!(restored.last_assistant_text, "Heading to checkout.");
}

#[tokio::test]
async fn malformed_blocks_never_disturb_the_turn() {
    let reply = "Here's what I found.\n\
                 :::open_product\n\
                 no delimiter on this line\n\
                 handle: enamel-mug\n\
                 :::\n\
                 :::teleport_user\n\
                 where: moon\n\
                 :::\n\
                 Enjoy!";

    let host = Arc::new(NullHost::new());
    let mut dispatcher = Dispatcher::new(Arc::clone(&host) as Arc<dyn HostPlatform>, None);

    let (blocks, speakable) = stream_reply(reply, 9);

    // The malformed line is skipped, the unknown block dropped entirely
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].attr("handle"), Some("enamel-mug"));
    assert!(speakable.starts_with("Here's what I found."));
    assert!(speakable.ends_with("Enjoy!"));
    assert!(!speakable.contains(":::"));

    for block in &blocks {
        dispatcher.dispatch(block).await;
    }
    assert_eq!(
        dispatcher.pending_navigation(),
        Some(&NavigationTarget::Product {
            handle: "enamel-mug".to_string()
        })
    );
}
