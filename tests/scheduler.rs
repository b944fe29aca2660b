// tests/scheduler.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Behavior, MockScraper, RecordingSink};
use free_events_scraper::scrape::scheduler::{spawn_scheduler, RunStatus, SchedulerCfg};
use free_events_scraper::{Orchestrator, RateLimiter};
use tokio_util::sync::CancellationToken;

fn orchestrator(sink: Arc<RecordingSink>, behavior: Behavior) -> Arc<Orchestrator> {
    Arc::new(
        Orchestrator::new(sink, Arc::new(RateLimiter::per_second(100, 10)), 2)
            .with_scraper(MockScraper::new("Reddit", behavior)),
    )
}

#[tokio::test(start_paused = true)]
async fn runs_at_startup_then_every_interval() {
    let sink = Arc::new(RecordingSink::default());
    let orch = orchestrator(sink.clone(), Behavior::Ok(2));
    let status = RunStatus::new(orch.scraper_count());
    let shutdown = CancellationToken::new();

    let handle = spawn_scheduler(
        Arc::clone(&orch),
        SchedulerCfg {
            interval: Duration::from_secs(60),
            run_timeout: Duration::from_secs(30),
        },
        status.clone(),
        shutdown.clone(),
    );

    // Ticks at 0s, 60s and 120s.
    tokio::time::sleep(Duration::from_secs(125)).await;
    let snap = status.snapshot();
    assert_eq!(snap.runs, 3);
    assert_eq!(snap.scrapers, 1);
    assert_eq!(snap.last_run.as_ref().map(|r| r.records_forwarded), Some(2));
    assert_eq!(sink.calls().len(), 3);

    shutdown.cancel();
    handle.await.unwrap();

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(status.snapshot().runs, 3);
}

#[tokio::test(start_paused = true)]
async fn each_run_is_bounded_by_the_run_timeout() {
    let sink = Arc::new(RecordingSink::default());
    let orch = orchestrator(
        sink.clone(),
        Behavior::Slow {
            delay: Duration::from_secs(3600),
            records: 5,
        },
    );
    let status = RunStatus::new(orch.scraper_count());
    let shutdown = CancellationToken::new();

    let handle = spawn_scheduler(
        orch,
        SchedulerCfg {
            interval: Duration::from_secs(600),
            run_timeout: Duration::from_secs(10),
        },
        status.clone(),
        shutdown.clone(),
    );

    tokio::time::sleep(Duration::from_secs(15)).await;
    let last = status.snapshot().last_run.expect("first run finished");
    assert_eq!(last.cancelled, 1);
    assert_eq!(last.records_forwarded, 1);

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_the_run_in_flight() {
    let sink = Arc::new(RecordingSink::default());
    let orch = orchestrator(
        sink.clone(),
        Behavior::Slow {
            delay: Duration::from_secs(3600),
            records: 5,
        },
    );
    let status = RunStatus::new(orch.scraper_count());
    let shutdown = CancellationToken::new();

    let handle = spawn_scheduler(
        orch,
        SchedulerCfg {
            interval: Duration::from_secs(60),
            run_timeout: Duration::from_secs(1800),
        },
        status.clone(),
        shutdown.clone(),
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler should stop promptly")
        .unwrap();

    let last = status.snapshot().last_run.expect("cancelled run is still recorded");
    assert_eq!(last.cancelled, 1);
}
