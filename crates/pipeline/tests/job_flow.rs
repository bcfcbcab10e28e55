//! End-to-end job flow through the public pipeline API with in-process
//! task and frame doubles.

use std::sync::Arc;

use framechain_db::models::catalog::{NewScript, NewThumbnail};
use framechain_db::models::status::JobStatus;
use framechain_db::repositories::{AssetCatalog, InMemoryAssetCatalog, InMemoryGenerationStore};
use framechain_pipeline::testing::{FakeFrameExtractor, ScriptedTaskClient};
use framechain_pipeline::{
    CreateJob, GenerationDriver, JobCoordinator, PollPolicy, SegmentOrchestrator,
};
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn twenty_five_seconds_in_three_chained_segments() {
    let store = Arc::new(InMemoryGenerationStore::new());
    let catalog = Arc::new(InMemoryAssetCatalog::new());
    let client = Arc::new(ScriptedTaskClient::new());
    let frames = Arc::new(FakeFrameExtractor::new());

    let script = catalog
        .register_script(NewScript {
            topic: Some("Tides".into()),
            content: "The tide rolls over the rocks.".into(),
            duration_secs: 25,
        })
        .await
        .unwrap();
    let thumbnail = catalog
        .register_thumbnail(NewThumbnail {
            script_id: script.id,
            url: "https://cdn.test/tides.jpg".into(),
        })
        .await
        .unwrap();

    let coordinator = JobCoordinator::new(store.clone(), catalog, 10);
    let orchestrator = Arc::new(SegmentOrchestrator::new(
        store.clone(),
        client.clone(),
        frames.clone(),
        PollPolicy::default(),
    ));
    let driver = GenerationDriver::new(store, orchestrator.clone());

    let created = coordinator
        .create_job(CreateJob {
            script_id: script.id,
            thumbnail_id: thumbnail.id,
            total_duration_secs: None,
            max_segment_secs: None,
        })
        .await
        .unwrap();
    assert_eq!(created.total_segments, 3);

    let job = driver
        .run(created.job_id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.segments.len(), 3);
    assert!(job.segments.iter().all(Option::is_some));

    let durations: Vec<_> = client
        .submissions()
        .iter()
        .map(|s| s.duration_secs)
        .collect();
    assert_eq!(durations, vec![10, 10, 5]);

    // Each frame was taken from the clip of the same segment.
    let calls = frames.calls();
    assert_eq!(calls.len(), 3);
    for (index, (video_url, _)) in calls.iter().enumerate() {
        assert_eq!(video_url, &job.segments[index].as_ref().unwrap().video_url);
    }

    // Re-requesting a finished segment is a read.
    let again = orchestrator
        .generate_segment(
            created.job_id,
            2,
            &job.segments[1].as_ref().unwrap().frame_url,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(&again, job.segments[2].as_ref().unwrap());
    assert_eq!(client.submissions().len(), 3);

    let progress = coordinator.progress(created.job_id).await.unwrap();
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.next_segment_index, None);
}
