use std::time::Duration;

use futures_util::StreamExt;
use marquee::{
    source, spawn_pipeline, AllowSet, BlobStream, CaseMode, MessageBuilder, PipelineConfig,
    SelectionPolicy,
};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_stream::wrappers::ReceiverStream;

fn unthrottled() -> PipelineConfig {
    PipelineConfig {
        interval: None,
        ..PipelineConfig::default()
    }
}

#[test_log::test(tokio::test)]
async fn static_hello_world_becomes_display_string() {
    let source = source::static_text("Hello World").unwrap();
    let mut messages = spawn_pipeline(source, &unthrottled());

    for _ in 0..3 {
        assert_eq!(messages.next().await.as_deref(), Some("Hello-World"));
    }
}

#[test_log::test(tokio::test)]
async fn word_groups_cycle_in_order() {
    let source = source::static_text("a bb ccc dddddddddddddddddddd").unwrap();
    let config = PipelineConfig {
        builder: MessageBuilder::word_groups(),
        ..unthrottled()
    };
    let mut messages = spawn_pipeline(source, &config);

    let first: Vec<String> = (&mut messages).take(4).collect().await;
    assert_eq!(
        first,
        ["a-bb-ccc", "dddddddddddddddddddd", "a-bb-ccc", "dddddddddddddddddddd"]
    );
}

#[test_log::test(tokio::test)]
async fn prefix_and_case_apply_after_sanitizing() {
    let source = source::static_text("hello world\nsecond line").unwrap();
    let config = PipelineConfig {
        prefix: Some("my-".into()),
        case: Some(CaseMode::Upper),
        ..unthrottled()
    };
    let mut messages = spawn_pipeline(source, &config);

    assert_eq!(messages.next().await.as_deref(), Some("MY-HELLO-WORLD"));
    assert_eq!(messages.next().await.as_deref(), Some("MY-SECOND-LINE"));
}

#[test_log::test(tokio::test)]
async fn permissive_pipeline_keeps_spaces() {
    let source = source::static_text("up | down").unwrap();
    let config = PipelineConfig {
        allow: AllowSet::Permissive,
        ..unthrottled()
    };
    let mut messages = spawn_pipeline(source, &config);
    assert_eq!(messages.next().await.as_deref(), Some("up | down"));
}

#[test_log::test(tokio::test)]
async fn long_lines_are_truncated() {
    let source = source::static_text("x".repeat(100)).unwrap();
    let mut messages = spawn_pipeline(source, &unthrottled());
    assert_eq!(messages.next().await, Some("x".repeat(40)));
}

#[test_log::test(tokio::test)]
async fn random_policy_only_yields_candidates() {
    let source = source::static_text("alpha\nbeta\ngamma").unwrap();
    let config = PipelineConfig {
        policy: SelectionPolicy::Random,
        ..unthrottled()
    };
    let mut messages = spawn_pipeline(source, &config);

    for _ in 0..30 {
        let message = messages.next().await.unwrap();
        assert!(["alpha", "beta", "gamma"].contains(&message.as_str()));
    }
}

#[test_log::test(tokio::test(start_paused = true))]
async fn rate_limit_spaces_messages() {
    let interval = Duration::from_secs(60);
    let source = source::static_text("one\ntwo").unwrap();
    let config = PipelineConfig {
        interval: Some(interval),
        ..PipelineConfig::default()
    };
    let mut messages = spawn_pipeline(source, &config);

    let start = Instant::now();
    assert_eq!(messages.next().await.as_deref(), Some("one"));
    assert!(start.elapsed() < interval);

    assert_eq!(messages.next().await.as_deref(), Some("two"));
    assert!(start.elapsed() >= interval);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn source_change_is_not_buried_behind_stale_messages() {
    let interval = Duration::from_secs(300);
    let (blobs, rx) = mpsc::channel::<String>(1);
    let source: BlobStream = Box::pin(ReceiverStream::new(rx));
    let config = PipelineConfig {
        interval: Some(interval),
        ..PipelineConfig::default()
    };
    let mut messages = spawn_pipeline(source, &config);

    blobs.send("old".into()).await.unwrap();
    assert_eq!(messages.next().await.as_deref(), Some("old"));
    blobs.send("new".into()).await.unwrap();

    let start = Instant::now();
    let mut stale = 0;
    loop {
        match messages.next().await.as_deref() {
            Some("old") => stale += 1,
            Some(message) => {
                assert_eq!(message, "new");
                break;
            }
            None => panic!("pipeline ended before the new content arrived"),
        }
    }

    // At most one message parked in each of chooser, sanitize and truncate.
    assert!(stale <= 3, "{stale} stale messages after the source changed");
    assert!(start.elapsed() <= interval * 4);
}

#[test_log::test(tokio::test)]
async fn file_changes_flow_through() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.txt");
    std::fs::write(&path, "first status\n").unwrap();

    let source = source::watch_file(&path, Duration::from_millis(20))
        .await
        .unwrap();
    let mut messages = spawn_pipeline(source, &unthrottled());
    assert_eq!(messages.next().await.as_deref(), Some("first-status"));

    std::fs::write(&path, "second status\n").unwrap();
    let switched = timeout(Duration::from_secs(5), async {
        while let Some(message) = messages.next().await {
            if message == "second-status" {
                return;
            }
        }
    })
    .await;
    assert!(switched.is_ok(), "pipeline should pick up the new file content");
}
