//! Pipeline tests: dispenser, workers and aggregator driven with closure probers and in-memory sinks.

use anyhow::anyhow;
use crossbeam_channel::{bounded, unbounded};
use endurance::engine::{FileSink, FlushRecord, HttpProber, ProbeOutcome, Prober, ResultSink};
use endurance::pipeline::{
    Aggregator, AggregatorPhase, DispenseStop, WorkerTiming, create_pipeline_channels,
    execute_trial, run_aggregator, run_dispenser, run_worker, spawn_dispenser, spawn_workers,
};
use endurance::{ResultBatch, TrialOpts, run_trial};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn fast_opts(workers: usize, duration: Duration) -> TrialOpts {
    TrialOpts {
        workers,
        duration,
        pacing: Duration::from_micros(200),
        report_interval: Duration::from_millis(20),
        flush_interval: Duration::from_millis(50),
        queue_capacity: 16,
    }
}

fn targets(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn batch(worker: usize, success: u32, failure: u32, is_final: bool) -> ResultBatch {
    ResultBatch {
        worker,
        success,
        failure,
        is_final,
    }
}

/// Sink that fails every write.
struct FailingSink;

impl ResultSink for FailingSink {
    fn write_flush(&mut self, _record: &FlushRecord) -> anyhow::Result<()> {
        Err(anyhow!("disk full"))
    }
}

// --- dispenser ---

#[test]
fn test_dispenser_cycles_in_order_without_loss() {
    let (tx, rx) = bounded::<String>(2);
    let list = targets(&["a", "b", "c"]);
    let consumer = thread::spawn(move || {
        // Let the queue fill so the dispenser has to block.
        thread::sleep(Duration::from_millis(50));
        rx.iter().collect::<Vec<_>>()
    });
    let (count, stop) = run_dispenser(&list, tx, Instant::now() + Duration::from_millis(150));
    let received = consumer.join().unwrap();

    assert_eq!(stop, DispenseStop::Deadline);
    assert_eq!(received.len() as u64, count);
    assert!(count > 0);
    for (i, target) in received.iter().enumerate() {
        assert_eq!(target, &list[i % list.len()]);
    }
}

#[test]
fn test_dispenser_full_queue_stops_at_deadline() {
    let (tx, rx) = bounded::<String>(4);
    let list = targets(&["a", "b"]);
    let start = Instant::now();
    let (count, stop) = run_dispenser(&list, tx, start + Duration::from_millis(100));
    let elapsed = start.elapsed();

    assert_eq!(stop, DispenseStop::Deadline);
    assert_eq!(count, 4);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2));
    // Queue closed after the dispenser returned; buffered items are still there.
    assert_eq!(rx.iter().count(), 4);
}

#[test]
fn test_dispenser_stops_when_workers_gone() {
    let (tx, rx) = bounded::<String>(4);
    drop(rx);
    let (count, stop) = run_dispenser(&targets(&["a"]), tx, Instant::now() + Duration::from_secs(30));
    assert_eq!(stop, DispenseStop::Disconnected);
    assert_eq!(count, 0);
}

#[test]
fn test_spawn_dispenser_closes_queue() {
    let (tx, rx) = bounded::<String>(1000);
    let handle = spawn_dispenser(Arc::from(targets(&["x"])), tx, Duration::from_millis(30));
    let drained = rx.iter().count() as u64;
    let count = handle.join().unwrap();
    assert_eq!(drained, count);
}

// --- worker ---

fn prefilled_queue(items: &[&str]) -> crossbeam_channel::Receiver<String> {
    let (tx, rx) = bounded::<String>(items.len().max(1));
    for item in items {
        tx.send(item.to_string()).unwrap();
    }
    rx
}

#[test]
fn test_worker_single_final_batch_with_counts() {
    let rx = prefilled_queue(&["ok", "bad", "ok", "ok", "bad"]);
    let (batch_tx, batch_rx) = unbounded();
    let prober = |t: &str| t == "ok";
    let timing = WorkerTiming {
        pacing: Duration::ZERO,
        report_interval: Duration::from_secs(3600),
    };

    let issued = run_worker(7, rx, batch_tx, &prober, timing);
    let batches: Vec<_> = batch_rx.iter().collect();

    assert_eq!(issued, 5);
    assert_eq!(batches, vec![batch(7, 3, 2, true)]);
}

#[test]
fn test_worker_periodic_batches_then_final() {
    let rx = prefilled_queue(&["a", "b", "c"]);
    let (batch_tx, batch_rx) = unbounded();
    let prober = |_: &str| true;
    let timing = WorkerTiming {
        pacing: Duration::from_millis(2),
        report_interval: Duration::from_millis(1),
    };

    let issued = run_worker(0, rx, batch_tx, &prober, timing);
    let batches: Vec<_> = batch_rx.iter().collect();

    assert_eq!(issued, 3);
    // Every request crosses the report interval, so each gets its own batch; the final one is empty.
    assert_eq!(batches.len(), 4);
    assert!(batches[..3].iter().all(|b| !b.is_final && b.success == 1));
    assert_eq!(batches[3], batch(0, 0, 0, true));
}

#[test]
fn test_worker_empty_queue_sends_zero_final() {
    let (tx, rx) = bounded::<String>(1);
    drop(tx);
    let (batch_tx, batch_rx) = unbounded();
    let prober = |_: &str| true;
    let timing = WorkerTiming {
        pacing: Duration::ZERO,
        report_interval: Duration::from_millis(10),
    };
    assert_eq!(run_worker(3, rx, batch_tx, &prober, timing), 0);
    assert_eq!(batch_rx.iter().collect::<Vec<_>>(), vec![batch(3, 0, 0, true)]);
}

#[test]
fn test_worker_stops_when_aggregator_gone() {
    let (tx, rx) = bounded::<String>(100);
    for _ in 0..100 {
        tx.send("t".to_string()).unwrap();
    }
    let (batch_tx, batch_rx) = bounded::<ResultBatch>(0);
    drop(batch_rx);
    let prober = |_: &str| true;
    let timing = WorkerTiming {
        pacing: Duration::ZERO,
        report_interval: Duration::ZERO,
    };
    // First report fails, worker returns after one request instead of draining the queue.
    assert_eq!(run_worker(0, rx, batch_tx, &prober, timing), 1);
    assert_eq!(tx.len(), 99);
}

#[test]
fn test_spawned_workers_each_send_exactly_one_final_last() {
    let opts = fast_opts(4, Duration::from_millis(150));
    let channels = create_pipeline_channels(&opts);
    let dispenser = spawn_dispenser(Arc::from(targets(&["a", "b"])), channels.target_tx, opts.duration);
    let prober: Arc<dyn Prober> = Arc::new(|_: &str| true);
    let handles = spawn_workers(
        channels.target_rx,
        &channels.batch_tx,
        prober,
        opts.workers,
        WorkerTiming {
            pacing: opts.pacing,
            report_interval: opts.report_interval,
        },
    );
    drop(channels.batch_tx);

    let mut per_worker: HashMap<usize, Vec<ResultBatch>> = HashMap::new();
    for b in channels.batch_rx.iter() {
        per_worker.entry(b.worker).or_default().push(b);
    }
    let issued: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    dispenser.join().unwrap();

    assert_eq!(per_worker.len(), 4);
    let mut reported = 0_u64;
    for batches in per_worker.values() {
        assert_eq!(batches.iter().filter(|b| b.is_final).count(), 1);
        assert!(batches.last().unwrap().is_final);
        reported += batches.iter().map(|b| b.requests()).sum::<u64>();
    }
    assert_eq!(reported, issued);
}

// --- aggregator state ---

#[test]
fn test_aggregator_counts_down_finals() {
    let mut agg = Aggregator::new(2);
    agg.absorb(&batch(0, 3, 1, false)).unwrap();
    agg.absorb(&batch(1, 2, 0, true)).unwrap();
    assert_eq!(agg.phase(), AggregatorPhase::Running);
    assert_eq!(agg.workers_remaining(), 1);
    agg.absorb(&batch(0, 1, 1, true)).unwrap();
    assert_eq!(agg.phase(), AggregatorPhase::Draining);
    assert_eq!(agg.window(), (6, 2));
}

#[test]
fn test_aggregator_rejects_batches_after_last_final() {
    let mut agg = Aggregator::new(1);
    agg.absorb(&batch(0, 0, 0, true)).unwrap();
    assert!(agg.absorb(&batch(0, 1, 0, true)).is_err());
}

#[test]
fn test_aggregator_flush_resets_window_keeps_totals() {
    let mut agg = Aggregator::new(1);
    let mut sink: Vec<FlushRecord> = Vec::new();
    agg.absorb(&batch(0, 5, 2, false)).unwrap();
    agg.flush(&mut sink, false).unwrap();
    assert_eq!(agg.window(), (0, 0));
    agg.absorb(&batch(0, 1, 0, true)).unwrap();
    agg.flush(&mut sink, true).unwrap();

    assert_eq!(agg.phase(), AggregatorPhase::Terminated);
    let totals = agg.totals();
    assert_eq!((totals.successes, totals.failures, totals.flushes), (6, 2, 2));
    assert_eq!(
        sink.iter().map(|r| (r.success, r.failure, r.drain)).collect::<Vec<_>>(),
        vec![(5, 2, false), (1, 0, true)]
    );
}

#[test]
fn test_aggregator_failed_flush_keeps_window() {
    let mut agg = Aggregator::new(1);
    agg.absorb(&batch(0, 4, 4, false)).unwrap();
    assert!(agg.flush(&mut FailingSink, false).is_err());
    assert_eq!(agg.window(), (4, 4));
    assert_eq!(agg.totals().flushes, 0);
}

// --- run_aggregator ---

#[test]
fn test_run_aggregator_periodic_flush_without_batches() {
    let (tx, rx) = bounded::<ResultBatch>(0);
    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        tx.send(batch(0, 9, 1, true)).unwrap();
    });
    let mut sink: Vec<FlushRecord> = Vec::new();
    let totals = run_aggregator(rx, &mut sink, 1, Duration::from_millis(20), None).unwrap();
    producer.join().unwrap();

    assert!(sink.len() >= 3, "expected periodic flushes, got {}", sink.len());
    let (last, periodic) = sink.split_last().unwrap();
    assert!(last.drain);
    assert_eq!((last.success, last.failure), (9, 1));
    assert!(periodic.iter().all(|r| !r.drain && r.success == 0 && r.failure == 0));
    assert_eq!(totals.flushes, sink.len());
}

#[test]
fn test_run_aggregator_drain_flush_is_unconditional() {
    let (tx, rx) = bounded::<ResultBatch>(0);
    let producer = thread::spawn(move || {
        tx.send(batch(0, 1, 0, false)).unwrap();
        tx.send(batch(1, 0, 0, true)).unwrap();
        tx.send(batch(0, 2, 3, true)).unwrap();
    });
    let mut sink: Vec<FlushRecord> = Vec::new();
    let totals = run_aggregator(rx, &mut sink, 2, Duration::from_secs(3600), None).unwrap();
    producer.join().unwrap();

    assert_eq!(sink.len(), 1);
    assert!(sink[0].drain);
    assert_eq!((sink[0].success, sink[0].failure), (3, 3));
    assert_eq!((totals.successes, totals.failures), (3, 3));
}

#[test]
fn test_run_aggregator_progress_callback_sees_every_request() {
    let (tx, rx) = bounded::<ResultBatch>(0);
    let seen = Arc::new(AtomicU64::new(0));
    let seen_cb = Arc::clone(&seen);
    let producer = thread::spawn(move || {
        tx.send(batch(0, 4, 1, false)).unwrap();
        tx.send(batch(0, 2, 0, true)).unwrap();
    });
    let mut sink: Vec<FlushRecord> = Vec::new();
    run_aggregator(
        rx,
        &mut sink,
        1,
        Duration::from_secs(3600),
        Some(Box::new(move |n| {
            seen_cb.fetch_add(n as u64, Ordering::Relaxed);
        })),
    )
    .unwrap();
    producer.join().unwrap();
    assert_eq!(seen.load(Ordering::Relaxed), 7);
}

#[test]
fn test_run_aggregator_disconnect_with_outstanding_workers() {
    let (tx, rx) = bounded::<ResultBatch>(0);
    let producer = thread::spawn(move || {
        tx.send(batch(0, 5, 0, true)).unwrap();
        // Worker 1 never reports.
    });
    let mut sink: Vec<FlushRecord> = Vec::new();
    let err = run_aggregator(rx, &mut sink, 2, Duration::from_secs(3600), None).unwrap_err();
    producer.join().unwrap();

    assert!(err.to_string().contains("1 of 2 workers"));
    assert_eq!(sink.len(), 1);
    assert!(sink[0].drain);
    assert_eq!(sink[0].success, 5);
}

#[test]
fn test_run_aggregator_sink_failure_is_fatal() {
    let (tx, rx) = bounded::<ResultBatch>(0);
    let producer = thread::spawn(move || {
        let _ = tx.send(batch(0, 1, 0, true));
    });
    let err = run_aggregator(rx, &mut FailingSink, 1, Duration::from_secs(3600), None).unwrap_err();
    producer.join().unwrap();
    assert!(err.to_string().contains("disk full"));
}

// --- whole trials ---

#[test]
fn test_trial_counts_are_conserved() {
    let calls = Arc::new(AtomicU64::new(0));
    let hits = Arc::new(AtomicU64::new(0));
    let (calls_p, hits_p) = (Arc::clone(&calls), Arc::clone(&hits));
    let prober: Arc<dyn Prober> = Arc::new(move |t: &str| {
        calls_p.fetch_add(1, Ordering::Relaxed);
        let hit = t != "http://down";
        if hit {
            hits_p.fetch_add(1, Ordering::Relaxed);
        }
        hit
    });
    let mut sink: Vec<FlushRecord> = Vec::new();
    let summary = run_trial(
        targets(&["http://a", "http://down", "http://b"]),
        &fast_opts(3, Duration::from_millis(300)),
        &mut sink,
        prober,
    )
    .unwrap();

    let flushed_s: u64 = sink.iter().map(|r| r.success).sum();
    let flushed_f: u64 = sink.iter().map(|r| r.failure).sum();
    assert_eq!(summary.issued, calls.load(Ordering::Relaxed));
    assert_eq!(summary.issued, summary.dispensed);
    assert_eq!(flushed_s + flushed_f, summary.issued);
    assert_eq!(flushed_s, hits.load(Ordering::Relaxed));
    assert_eq!((summary.successes, summary.failures), (flushed_s, flushed_f));
    assert_eq!(summary.flushes, sink.len());
    assert_eq!(summary.workers, 3);

    let (last, rest) = sink.split_last().unwrap();
    assert!(last.drain);
    assert!(rest.iter().all(|r| !r.drain));
}

#[test]
fn test_trial_single_worker() {
    let prober: Arc<dyn Prober> = Arc::new(|_: &str| false);
    let mut sink: Vec<FlushRecord> = Vec::new();
    let summary = run_trial(
        targets(&["http://a"]),
        &fast_opts(1, Duration::from_millis(100)),
        &mut sink,
        prober,
    )
    .unwrap();
    assert_eq!(summary.successes, 0);
    assert_eq!(summary.failures, summary.issued);
    assert!(sink.last().unwrap().drain);
}

#[test]
fn test_trial_rejects_empty_targets() {
    let prober: Arc<dyn Prober> = Arc::new(|_: &str| true);
    let mut sink: Vec<FlushRecord> = Vec::new();
    let err = run_trial(Vec::new(), &fast_opts(2, Duration::from_millis(50)), &mut sink, prober)
        .unwrap_err();
    assert!(err.to_string().contains("empty"));
    assert!(sink.is_empty());
}

#[test]
fn test_trial_rejects_invalid_opts_before_start() {
    let calls = Arc::new(AtomicU64::new(0));
    let calls_p = Arc::clone(&calls);
    let prober: Arc<dyn Prober> = Arc::new(move |_: &str| {
        calls_p.fetch_add(1, Ordering::Relaxed);
        true
    });
    let mut sink: Vec<FlushRecord> = Vec::new();
    let opts = TrialOpts {
        workers: 0,
        ..fast_opts(1, Duration::from_millis(50))
    };
    assert!(run_trial(targets(&["http://a"]), &opts, &mut sink, prober).is_err());
    assert_eq!(calls.load(Ordering::Relaxed), 0);
    assert!(sink.is_empty());
}

#[test]
fn test_trial_sink_failure_aborts_promptly() {
    let prober: Arc<dyn Prober> = Arc::new(|_: &str| true);
    let opts = TrialOpts {
        flush_interval: Duration::from_millis(10),
        report_interval: Duration::from_millis(5),
        ..fast_opts(2, Duration::from_secs(30))
    };
    let start = Instant::now();
    let err = execute_trial(targets(&["http://a"]), &opts, &mut FailingSink, prober, None)
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_trial_writes_results_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.txt");
    std::fs::write(&path, "previous run\n").unwrap();

    let prober: Arc<dyn Prober> = Arc::new(|_: &str| false);
    let mut sink = FileSink::open(&path).unwrap();
    let summary = run_trial(
        targets(&["http://a", "http://b"]),
        &fast_opts(2, Duration::from_millis(200)),
        &mut sink,
        prober,
    )
    .unwrap();
    drop(sink);

    let contents = std::fs::read_to_string(&path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("previous run"));
    let mut total = 0_u64;
    let mut count = 0_usize;
    for line in lines {
        let (ts, counts) = line.rsplit_once(": ").unwrap();
        assert!(!ts.is_empty());
        let (s, f) = counts.split_once('/').unwrap();
        total += s.parse::<u64>().unwrap() + f.parse::<u64>().unwrap();
        count += 1;
    }
    assert_eq!(count, summary.flushes);
    assert_eq!(total, summary.issued);
}

// --- HTTP prober ---

fn no_proxy_prober() -> HttpProber {
    let client = reqwest::blocking::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    HttpProber::with_client(client)
}

#[test]
fn test_http_prober_server_error_is_hit() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf);
        stream
            .write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            )
            .unwrap();
    });
    let outcome = no_proxy_prober().probe(&format!("http://{addr}/"));
    server.join().unwrap();
    assert_eq!(outcome, ProbeOutcome::Hit);
}

#[test]
fn test_http_prober_refused_is_miss() {
    let addr = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    // Listener dropped: nothing accepts on this port.
    assert_eq!(
        no_proxy_prober().probe(&format!("http://{addr}/")),
        ProbeOutcome::Miss
    );
}

#[test]
fn test_http_prober_bad_url_is_miss() {
    assert_eq!(no_proxy_prober().probe("not a url"), ProbeOutcome::Miss);
}
