use std::sync::Arc;

use citybrief::sessions::{ConversationStore, DEFAULT_MAX_TURNS};

#[tokio::test]
async fn test_append_and_get() {
    let store = ConversationStore::default();

    let len = store.append("s1", "发生了什么？", "地铁新线开通。").await;
    assert_eq!(len, 1);
    store.append("s1", "什么时候？", "今天。").await;

    let turns = store.get("s1").await;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].question, "发生了什么？");
    assert_eq!(turns[1].answer, "今天。");
}

#[tokio::test]
async fn test_eleven_appends_keep_last_ten_in_order() {
    let store = ConversationStore::default();
    for i in 0..11 {
        store.append("s", format!("q{}", i), format!("a{}", i)).await;
    }

    let turns = store.get("s").await;
    assert_eq!(turns.len(), DEFAULT_MAX_TURNS);
    let questions: Vec<&str> = turns.iter().map(|t| t.question.as_str()).collect();
    let expected: Vec<String> = (1..11).map(|i| format!("q{}", i)).collect();
    assert_eq!(questions, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_custom_cap() {
    let store = ConversationStore::new(2);
    for i in 0..5 {
        assert!(store.append("s", format!("q{}", i), "a").await <= 2);
    }
    assert_eq!(store.turn_count("s").await, 2);
    assert_eq!(store.get("s").await[0].question, "q3");
}

#[tokio::test]
async fn test_recent_returns_tail_in_order() {
    let store = ConversationStore::default();
    for i in 0..5 {
        store.append("s", format!("q{}", i), "a").await;
    }

    let recent = store.recent("s", 3).await;
    let questions: Vec<&str> = recent.iter().map(|t| t.question.as_str()).collect();
    assert_eq!(questions, vec!["q2", "q3", "q4"]);
    assert_eq!(store.recent("s", 10).await.len(), 5);
    assert!(store.recent("missing", 3).await.is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_empty() {
    let store = ConversationStore::default();
    assert!(store.get("nope").await.is_empty());
    assert_eq!(store.turn_count("nope").await, 0);
    assert_eq!(store.session_count().await, 0);
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let store = ConversationStore::default();
    store.append("s", "q", "a").await;

    assert!(store.clear("s").await);
    assert!(!store.clear("s").await);
    assert!(store.get("s").await.is_empty());

    // A cleared session starts over on the next append
    assert_eq!(store.append("s", "q2", "a2").await, 1);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let store = ConversationStore::default();
    store.append("a", "qa", "aa").await;
    store.append("b", "qb", "ab").await;
    store.clear("a").await;

    assert!(store.get("a").await.is_empty());
    assert_eq!(store.get("b").await.len(), 1);
    assert_eq!(store.session_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_appends_are_all_recorded() {
    let store = Arc::new(ConversationStore::new(100));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let session = if i % 2 == 0 { "even" } else { "odd" };
                store.append(session, format!("q{}", i), "a").await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("append task");
    }

    assert_eq!(store.turn_count("even").await, 10);
    assert_eq!(store.turn_count("odd").await, 10);
    assert!(store
        .get("even")
        .await
        .iter()
        .all(|t| t.question.trim_start_matches('q').parse::<u32>().unwrap() % 2 == 0));
}
