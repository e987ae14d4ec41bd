mod support;

use std::sync::Arc;
use std::time::Duration;

use common::PipelineConfig;
use newsreel::storage::MemoryTitleStore;
use support::{
    articles, orchestrator, orchestrator_with, BrokenStore, EchoEnhancer, EchoImages, RecordingAssembler,
    StubMetadata,
};

#[tokio::test]
async fn full_run_keeps_rank_order_for_frames_and_texts() {
    let store = Arc::new(MemoryTitleStore::new());
    let (orch, harness) = orchestrator(
        articles(&["Alpha", "Beta", "Gamma"]),
        store.clone(),
        EchoEnhancer::default(),
        StubMetadata::answering("Quantum Leap", "Watch this #AI"),
        RecordingAssembler::default(),
    );

    let result = orch.run().await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.frame_count, 4);
    assert_eq!(result.video.as_deref(), Some(b"MP4".as_slice()));
    assert_eq!(result.title, "Quantum Leap");
    assert_eq!(result.description, "Watch this #AI");

    let frames = harness.assembler.frames.lock().await.clone();
    let frames: Vec<String> = frames.into_iter().map(|f| String::from_utf8(f).unwrap()).collect();
    assert_eq!(frames, vec!["T:P:Alpha", "C:P:Alpha", "T:P:Beta", "C:P:Beta"]);

    let texts = harness.metadata.seen.lock().await.clone();
    assert_eq!(texts, vec!["H:Alpha", "S:about Alpha", "H:Beta", "S:about Beta"]);

    // One background per article, shared by both variants.
    assert_eq!(*harness.images.generated.lock().await, vec!["P:Alpha", "P:Beta"]);
    assert_eq!(*harness.assembler.audio.lock().await, b"ID3".to_vec());
    assert_eq!(store.titles().await, vec!["Alpha", "Beta"]);
}

#[tokio::test]
async fn unusable_metadata_still_produces_a_video() {
    let (orch, _harness) = orchestrator(
        articles(&["Alpha", "Beta"]),
        Arc::new(MemoryTitleStore::new()),
        EchoEnhancer::default(),
        StubMetadata::unparseable(),
        RecordingAssembler::default(),
    );

    let result = orch.run().await;

    assert!(result.success);
    assert!(result.video.is_some());
    assert_eq!(result.title, "");
    assert_eq!(result.description, "");
}

#[tokio::test]
async fn enhancement_failure_aborts_the_run() {
    let store = Arc::new(MemoryTitleStore::new());
    let (orch, harness) = orchestrator(
        articles(&["Alpha", "Beta"]),
        store.clone(),
        EchoEnhancer::failing_on("Beta"),
        StubMetadata::answering("t", "d"),
        RecordingAssembler::default(),
    );

    let result = orch.run().await;

    assert!(!result.success);
    assert!(result.video.is_none());
    assert!(result.error.unwrap().contains("garbled answer for Beta"));
    assert!(harness.assembler.frames.lock().await.is_empty());
    assert!(harness.metadata.seen.lock().await.is_empty());
    // The accepted batch stays recorded even though the run failed.
    assert_eq!(store.titles().await, vec!["Alpha", "Beta"]);
}

#[tokio::test]
async fn assembly_failure_is_reported() {
    let (orch, _harness) = orchestrator(
        articles(&["Alpha", "Beta"]),
        Arc::new(MemoryTitleStore::new()),
        EchoEnhancer::default(),
        StubMetadata::answering("t", "d"),
        RecordingAssembler {
            fail: true,
            ..Default::default()
        },
    );

    let result = orch.run().await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("502"));
}

#[tokio::test]
async fn nothing_new_is_not_an_error() {
    let store = Arc::new(MemoryTitleStore::with_titles(["Alpha", "Gamma"]));
    let (orch, harness) = orchestrator(
        articles(&["Alpha", "Beta", "Gamma", "Delta", "Epsilon"]),
        store,
        EchoEnhancer::default(),
        StubMetadata::answering("t", "d"),
        RecordingAssembler::default(),
    );

    let result = orch.run().await;

    assert!(result.success);
    assert!(result.video.is_none());
    assert_eq!(result.frame_count, 0);
    assert!(harness.images.generated.lock().await.is_empty());
}

#[tokio::test]
async fn second_run_moves_on_to_the_next_batch() {
    let store = Arc::new(MemoryTitleStore::new());
    let candidates = articles(&["Alpha", "Beta", "Gamma", "Delta"]);

    let (first, _) = orchestrator(
        candidates.clone(),
        store.clone(),
        EchoEnhancer::default(),
        StubMetadata::answering("t", "d"),
        RecordingAssembler::default(),
    );
    assert!(first.run().await.success);

    let (second, harness) = orchestrator(
        candidates,
        store.clone(),
        EchoEnhancer::default(),
        StubMetadata::answering("t", "d"),
        RecordingAssembler::default(),
    );
    let result = second.run().await;

    assert!(result.success);
    assert_eq!(result.frame_count, 4);
    assert_eq!(*harness.images.generated.lock().await, vec!["P:Gamma", "P:Delta"]);
    assert_eq!(store.titles().await, vec!["Alpha", "Beta", "Gamma", "Delta"]);
}

#[tokio::test]
async fn storage_failure_aborts_before_any_work() {
    let (orch, harness) = orchestrator(
        articles(&["Alpha", "Beta"]),
        Arc::new(BrokenStore),
        EchoEnhancer::default(),
        StubMetadata::answering("t", "d"),
        RecordingAssembler::default(),
    );

    let result = orch.run().await;

    assert!(!result.success);
    assert!(result.video.is_none());
    let error = result.error.unwrap();
    assert!(error.contains("storage error"), "{}", error);
    assert!(harness.enhancer.calls.lock().await.is_empty());
    assert!(harness.images.generated.lock().await.is_empty());
    assert!(harness.metadata.seen.lock().await.is_empty());
    assert!(harness.assembler.frames.lock().await.is_empty());
}

#[tokio::test]
async fn image_failure_aborts_the_run_without_assembling() {
    let (orch, harness) = orchestrator_with(
        support::fast_pipeline(),
        articles(&["Alpha", "Beta"]),
        Arc::new(MemoryTitleStore::new()),
        EchoEnhancer::default(),
        EchoImages::failing_on("P:Beta"),
        StubMetadata::answering("t", "d"),
        RecordingAssembler::default(),
    );

    let result = orch.run().await;

    assert!(!result.success);
    assert!(result.video.is_none());
    assert!(result.error.unwrap().contains("no image for P:Beta"));
    assert_eq!(*harness.enhancer.calls.lock().await, vec!["Alpha", "Beta"]);
    assert_eq!(*harness.images.generated.lock().await, vec!["P:Alpha"]);
    assert!(harness.metadata.seen.lock().await.is_empty());
    assert!(harness.assembler.frames.lock().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn articles_are_spaced_by_the_configured_delay() {
    let pipeline = PipelineConfig {
        batch_size: 3,
        inter_article_delay_seconds: 5,
        feed_delay_seconds: 0,
        ..PipelineConfig::default()
    };
    let (orch, harness) = orchestrator_with(
        pipeline,
        articles(&["Alpha", "Beta", "Gamma"]),
        Arc::new(MemoryTitleStore::new()),
        EchoEnhancer::default(),
        EchoImages::default(),
        StubMetadata::answering("t", "d"),
        RecordingAssembler::default(),
    );

    let started = tokio::time::Instant::now();
    let result = orch.run().await;
    let elapsed = started.elapsed();

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.frame_count, 6);
    // Two gaps for three articles; none before the first.
    assert!(elapsed >= Duration::from_secs(10), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(15), "{:?}", elapsed);
    assert_eq!(*harness.enhancer.calls.lock().await, vec!["Alpha", "Beta", "Gamma"]);
}
