use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use lexio::{
    audio_file_name, AudioDownloadJob, AudioDownloadOptions, AudioItem, FetchEvent, JobManager,
    QueryEvent, WordFetchJob, WordFetchOptions, WordGroup, WordQueryJob, WordQueryOptions,
};
use lexio_e2e::{
    init_tracing, GatedWordSource, StaticMediaSource, StaticQueryApi, StaticWordSource,
};
use tokio::{
    sync::{mpsc, Semaphore},
    time::timeout,
};

const EVENT_WAIT: Duration = Duration::from_secs(5);

async fn run_to_completion(job: Arc<dyn lexio::Job>) {
    init_tracing();
    let (manager, mut manager_events) = JobManager::new();
    manager.start(job).await;
    timeout(EVENT_WAIT, manager_events.recv())
        .await
        .unwrap()
        .unwrap();
    manager.destroy().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_collects_every_page_of_a_group() {
    let group = WordGroup::new("G", "1");
    let source = StaticWordSource::new().with_group(
        &group,
        vec![vec!["a".into()], vec!["b".into()], vec!["c".into()]],
    );
    let (events_send, mut events) = mpsc::unbounded_channel();
    let job = WordFetchJob::new(Arc::new(source), vec![group.clone()], events_send);

    run_to_completion(Arc::new(job)).await;

    let mut ticks = 0;
    let mut page_counts = Vec::new();
    let mut done = None;
    while let Ok(event) = events.try_recv() {
        match event {
            FetchEvent::Tick => ticks += 1,
            FetchEvent::PageCount { pages, .. } => page_counts.push(pages),
            FetchEvent::GroupDone { group, words } => done = Some((group, words)),
        }
    }
    assert_eq!(ticks, 3);
    assert_eq!(page_counts, vec![3]);

    let (done_group, mut words) = done.unwrap();
    assert_eq!(done_group, group);
    words.sort();
    assert_eq!(words, vec!["a", "b", "c"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_of_an_empty_group_completes_immediately() {
    let group = WordGroup::new("empty", "9");
    let source = StaticWordSource::new().with_group(&group, Vec::new());
    let (events_send, mut events) = mpsc::unbounded_channel();
    let job = WordFetchJob::new(Arc::new(source), vec![group.clone()], events_send);

    run_to_completion(Arc::new(job)).await;

    let mut ticks = 0;
    let mut done = None;
    while let Ok(event) = events.try_recv() {
        match event {
            FetchEvent::Tick => ticks += 1,
            FetchEvent::PageCount { pages, .. } => assert_eq!(pages, 0),
            FetchEvent::GroupDone { words, .. } => done = Some(words),
        }
    }
    assert_eq!(ticks, 0);
    assert_eq!(done.unwrap(), Vec::<String>::new());
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_with_no_groups_emits_nothing() {
    let (events_send, mut events) = mpsc::unbounded_channel();
    let job = WordFetchJob::new(
        Arc::new(StaticWordSource::new()),
        Vec::new(),
        events_send,
    );

    run_to_completion(Arc::new(job)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_fetch_lets_in_flight_pages_finish() {
    init_tracing();
    let gate = Arc::new(Semaphore::new(0));
    let (started_send, mut started) = mpsc::unbounded_channel();
    let source = GatedWordSource::new(4, gate.clone(), started_send);

    let (events_send, mut events) = mpsc::unbounded_channel();
    let job = WordFetchJob::new_with_options(
        Arc::new(source),
        vec![WordGroup::new("G", "1"), WordGroup::new("H", "2")],
        events_send,
        WordFetchOptions {
            page_workers: NonZeroUsize::new(1).unwrap(),
        },
    );

    let (manager, mut manager_events) = JobManager::new();
    manager.start(Arc::new(job)).await;

    // Wait until the first page fetch is running, give the job time to
    // queue the next page and block on the one after, then tear down
    // while everything is still stuck on the gate.
    timeout(EVENT_WAIT, started.recv()).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let teardown = tokio::spawn(async move {
        manager.destroy().await;
        manager
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    gate.add_permits(16);
    let manager = timeout(EVENT_WAIT, teardown).await.unwrap().unwrap();

    assert_eq!(manager.running(), 0);
    timeout(EVENT_WAIT, manager_events.recv())
        .await
        .unwrap()
        .unwrap();

    // The two dispatched pages after the running one still finished
    // and ticked, but the interrupted group never completed and the
    // second group was never started.
    let mut ticks = 0;
    let mut page_counts = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            FetchEvent::Tick => ticks += 1,
            FetchEvent::PageCount { group, pages } => {
                assert_eq!(group, WordGroup::new("G", "1"));
                assert_eq!(pages, 4);
                page_counts += 1;
            }
            FetchEvent::GroupDone { group, .. } => {
                panic!("no group should complete, got {}", group.name)
            }
        }
    }
    assert_eq!(page_counts, 1);
    assert_eq!(ticks, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn query_reports_per_row_outcomes_and_a_sorted_aggregate() {
    let api = StaticQueryApi::new().failing_for("w1").failing_for("w3");
    let rows: Vec<(usize, String)> = (0..5).map(|i| (i, format!("w{i}"))).collect();

    let (events_send, mut events) = mpsc::unbounded_channel();
    let job = WordQueryJob::new_with_options(
        Arc::new(api),
        rows,
        events_send,
        WordQueryOptions {
            lookup_workers: NonZeroUsize::new(3).unwrap(),
            rate_per_minute: 0,
        },
    );

    run_to_completion(Arc::new(job)).await;

    let mut successes = Vec::new();
    let mut failures = Vec::new();
    let mut ticks = 0;
    let mut aggregate = None;
    while let Ok(event) = events.try_recv() {
        match event {
            QueryEvent::RowSuccess { row, word, record } => {
                assert_eq!(record.term, word);
                successes.push(row);
            }
            QueryEvent::RowFailed { row, .. } => failures.push(row),
            QueryEvent::Tick => ticks += 1,
            QueryEvent::BatchDone { results } => aggregate = Some(results),
        }
    }

    successes.sort_unstable();
    failures.sort_unstable();
    assert_eq!(successes, vec![0, 2, 4]);
    assert_eq!(failures, vec![1, 3]);
    assert_eq!(ticks, 5);

    let aggregate = aggregate.unwrap();
    assert_eq!(aggregate.len(), 5);
    for (row, outcome) in aggregate.iter().enumerate() {
        assert_eq!(outcome.row, row);
        assert_eq!(outcome.word, format!("w{row}"));
        assert_eq!(outcome.record.is_some(), row != 1 && row != 3);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn audio_downloads_report_and_clean_up() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join(audio_file_name("us", "good"));
    let bad = dir.path().join(audio_file_name("us", "bad"));

    let items = vec![
        AudioItem {
            path: good.clone(),
            url: "https://cdn.example/good.mp3".into(),
        },
        AudioItem {
            path: bad.clone(),
            url: "https://cdn.example/bad.mp3".into(),
        },
    ];

    let (events_send, mut events) = mpsc::unbounded_channel();
    let job = AudioDownloadJob::new_with_options(
        Arc::new(StaticMediaSource::new("audio-bytes")),
        items,
        events_send,
        AudioDownloadOptions {
            download_workers: NonZeroUsize::new(3).unwrap(),
            rate_per_minute: 0,
        },
    );

    run_to_completion(Arc::new(job)).await;

    let mut ticks = Vec::new();
    while let Ok(tick) = events.try_recv() {
        ticks.push(tick);
    }
    assert_eq!(ticks.len(), 2);
    for tick in &ticks {
        if tick.path == good {
            assert!(tick.ok);
        } else {
            assert_eq!(tick.path, bad);
            assert!(!tick.ok);
        }
    }

    assert_eq!(std::fs::read(&good).unwrap(), b"audio-bytes");
    assert!(!bad.exists(), "partial download was not cleaned up");
}
