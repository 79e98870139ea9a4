mod common;

use common::*;
use futures::StreamExt;
use futures::stream;
use kestrel_daemon::RankedList;
use kestrel_plugin::{Category, Kind, Query, ResultStream, Searchable, Source, Tag};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Slow for short queries, fast for long ones. Counts evaluations that ran
/// to completion.
struct LengthDelayed {
    finished: Arc<AtomicUsize>,
}

impl Source for LengthDelayed {
    fn name(&self) -> &str {
        "length"
    }

    fn category(&self) -> Category {
        Category::Tools
    }

    fn search(&self, query: &Query) -> ResultStream {
        let text = query.text.clone();
        let finished = self.finished.clone();
        let delay = if text.len() <= 3 {
            Duration::from_millis(150)
        } else {
            Duration::from_millis(10)
        };
        stream::once(async move {
            tokio::time::sleep(delay).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Searchable::new(
                Kind::Tag(Tag { tag: text.clone() }),
                &text,
                text.clone(),
            )])
        })
        .boxed()
    }
}

#[tokio::test]
async fn superseded_query_never_overwrites_the_newer_list() {
    let finished = Arc::new(AtomicUsize::new(0));
    let coordinator = coordinator(
        vec![Arc::new(LengthDelayed {
            finished: finished.clone(),
        })],
        memory_store(),
    );
    let mut rx = coordinator.subscribe();

    let first = coordinator.submit(Query::new("abc", false));
    let second = coordinator.submit(Query::new("abcd", false));
    assert!(second > first);

    let mut seen: Vec<Arc<RankedList>> = Vec::new();
    let collect = async {
        loop {
            if rx.changed().await.is_err() {
                break;
            }
            seen.push(rx.borrow_and_update().clone());
        }
    };
    // long enough for the slow "abc" evaluation to have finished
    let _ = tokio::time::timeout(Duration::from_millis(400), collect).await;

    assert!(!seen.is_empty());
    for list in &seen {
        assert_eq!(list.generation, second);
        assert!(keys(list).iter().all(|k| *k == "tag://abcd"));
    }
    let last = coordinator.current();
    assert!(last.complete);
    assert_eq!(keys(&last), vec!["tag://abcd"]);
    // the superseded evaluation was cancelled before its batch was produced
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_stops_publishing() {
    let finished = Arc::new(AtomicUsize::new(0));
    let coordinator = coordinator(
        vec![Arc::new(LengthDelayed {
            finished: finished.clone(),
        })],
        memory_store(),
    );
    coordinator.submit(Query::new("abc", false));
    coordinator.cancel();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(coordinator.current().items.is_empty());
    assert_eq!(finished.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn superseded_search_returns_without_hanging() {
    let finished = Arc::new(AtomicUsize::new(0));
    let coordinator = Arc::new(coordinator(
        vec![Arc::new(LengthDelayed { finished })],
        memory_store(),
    ));

    let background = coordinator.clone();
    let slow = tokio::spawn(async move { background.search(Query::new("abc", false)).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let fast = coordinator.search(Query::new("abcd", false)).await;

    assert_eq!(keys(&fast), vec!["tag://abcd"]);
    let superseded = within(slow).await.unwrap();
    assert_ne!(superseded.query.as_ref().map(|q| q.text.as_str()), Some("abc"));
}
