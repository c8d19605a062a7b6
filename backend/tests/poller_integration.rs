
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use market::OrderBookSnapshot;
use mock_exchange::MockExchange;
use tracing_test::traced_test;

use spreadwatch::config::AppConfig;
use spreadwatch::error::CycleError;
use spreadwatch::metrics::{Counters, SnapshotStore};
use spreadwatch::poller::{CyclePhase, PollerConfig, SpreadPoller};
use spreadwatch::universe::RankingConfig;

fn config(top_n: usize, rerank_every_cycles: u64) -> PollerConfig {
    PollerConfig {
        period: Duration::from_secs(10),
        fetch_timeout: Duration::from_secs(5),
        rank_timeout: Duration::from_secs(30),
        rerank_every_cycles,
        ranking: RankingConfig {
            top_n,
            volume_quote_asset: "BTC".into(),
            trades_quote_asset: "USDT".into(),
            concurrency: 4,
        },
    }
}

fn poller(
    mock: &MockExchange,
    cfg: PollerConfig,
) -> (SpreadPoller<MockExchange>, SnapshotStore, Counters) {
    let store = SnapshotStore::new();
    let counters = Counters::default();
    let poller = SpreadPoller::new(
        Arc::new(mock.clone()),
        cfg,
        store.clone(),
        counters.clone(),
    );
    (poller, store, counters)
}

/// Two BTC-quoted instruments worth tracking plus noise the ranking must ignore.
async fn seeded_exchange() -> MockExchange {
    let mock = MockExchange::new();
    mock.list("ETHBTC", "BTC", Some("20.0"), Some(900)).await;
    mock.list("LTCBTC", "BTC", Some("5.0"), Some(400)).await;
    mock.list("XRPBTC", "BTC", Some("1.0"), Some(100)).await;
    mock.list("BTCUSDT", "USDT", Some("1000000"), Some(50_000)).await;
    mock.list("ETHEUR", "EUR", Some("999999"), Some(99_999)).await;

    mock.set_spread("ETHBTC", 0.2).await;
    mock.set_spread("LTCBTC", 0.4).await;
    mock.set_spread("XRPBTC", 0.1).await;
    mock
}

#[tokio::test]
async fn first_cycle_ranks_and_publishes_empty_baseline() {
    let mock = seeded_exchange().await;
    let (mut poller, store, counters) = poller(&mock, config(2, 0));

    let report = poller.run_cycle().await.unwrap();

    assert_eq!(report.cycle, 1);
    assert!(report.reranked);
    assert!(report.baseline);
    assert_eq!(report.published, 0);
    assert_eq!(poller.tracked_symbols(), ["ETHBTC", "LTCBTC"]);

    assert!(store.scrape().records.is_empty());
    assert_eq!(counters.load().cycles_ok, 1);

    // Only the two ranked quote assets have their tickers pulled.
    assert_eq!(mock.ticker_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn second_cycle_publishes_deltas_against_previous_spreads() {
    let mock = seeded_exchange().await;
    let (mut poller, store, _) = poller(&mock, config(2, 0));

    poller.run_cycle().await.unwrap();

    mock.set_spread("ETHBTC", 0.5).await;
    mock.set_spread("LTCBTC", 0.1).await;

    let report = poller.run_cycle().await.unwrap();
    assert!(!report.baseline);
    assert!(!report.reranked);
    assert_eq!(report.published, 2);

    let snap = store.scrape();
    let eth = snap.records.iter().find(|r| r.symbol == "ETHBTC").unwrap();
    let ltc = snap.records.iter().find(|r| r.symbol == "LTCBTC").unwrap();

    assert!((eth.spread - 0.5).abs() < 1e-9);
    assert!((eth.delta.unwrap() - 0.3).abs() < 1e-9);
    assert!((ltc.delta.unwrap() - 0.3).abs() < 1e-9);

    // Ranking happens once when re-ranking is disabled.
    assert_eq!(mock.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_fetch_keeps_previous_snapshot_and_history() {
    let mock = seeded_exchange().await;
    let (mut poller, store, counters) = poller(&mock, config(2, 0));

    poller.run_cycle().await.unwrap();
    mock.set_spread("ETHBTC", 0.3).await;
    poller.run_cycle().await.unwrap();
    let served = store.scrape();

    mock.set_spread("ETHBTC", 9.0).await;
    mock.fail_books(true);

    let err = poller.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::Exchange { .. }));
    assert_eq!(err.phase(), CyclePhase::Fetch);
    assert!(Arc::ptr_eq(&served, &store.scrape()));

    let c = counters.load();
    assert_eq!(c.cycles_ok, 2);
    assert_eq!(c.cycles_failed, 1);

    // The failed cycle left no trace in the delta history.
    mock.fail_books(false);
    mock.set_spread("ETHBTC", 0.4).await;
    poller.run_cycle().await.unwrap();

    let snap = store.scrape();
    let eth = snap.records.iter().find(|r| r.symbol == "ETHBTC").unwrap();
    assert!((eth.delta.unwrap() - 0.1).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out_and_publishes_nothing() {
    let mock = seeded_exchange().await;
    mock.set_book_delay(Duration::from_secs(30)).await;
    let (mut poller, store, counters) = poller(&mock, config(2, 0));

    let before = store.scrape();
    let err = poller.run_cycle().await.unwrap_err();

    assert!(matches!(
        err,
        CycleError::Timeout { phase: CyclePhase::Fetch, after } if after == Duration::from_secs(5)
    ));
    assert!(Arc::ptr_eq(&before, &store.scrape()));
    assert_eq!(counters.load().cycles_failed, 1);

    // Ranking completed before the book fetch and is kept for the next cycle.
    assert_eq!(poller.tracked_symbols(), ["ETHBTC", "LTCBTC"]);
    assert_eq!(mock.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_ranking_times_out_in_rank_phase() {
    let mock = seeded_exchange().await;
    mock.set_ticker_delay(Duration::from_secs(60)).await;
    let (mut poller, store, _) = poller(&mock, config(2, 0));

    let before = store.scrape();
    let err = poller.run_cycle().await.unwrap_err();

    assert!(matches!(
        err,
        CycleError::Timeout { phase: CyclePhase::Rank, after } if after == Duration::from_secs(30)
    ));
    assert!(poller.tracked_symbols().is_empty());
    assert!(Arc::ptr_eq(&before, &store.scrape()));
    assert_eq!(mock.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn default_config_ranks_a_full_universe_and_publishes() {
    let mock = MockExchange::new();
    for i in 1..=100 {
        let volume = i.to_string();
        mock.list(&format!("C{i:03}BTC"), "BTC", Some(&volume), Some(i)).await;
    }
    for i in 1..=300 {
        mock.list(&format!("C{i:03}USDT"), "USDT", Some("1000"), Some(i)).await;
    }
    for i in 96..=100 {
        mock.set_spread(&format!("C{i:03}BTC"), 0.1).await;
    }
    mock.set_ticker_delay(Duration::from_millis(30)).await;

    let cfg = AppConfig::from_lookup(|_| None).unwrap().poller_config();
    let fetch_timeout = cfg.fetch_timeout;
    let (mut poller, store, counters) = poller(&mock, cfg);

    let started = tokio::time::Instant::now();
    let first = poller.run_cycle().await.unwrap();
    assert!(first.reranked);
    assert!(started.elapsed() < fetch_timeout);

    assert_eq!(
        poller.tracked_symbols(),
        ["C100BTC", "C099BTC", "C098BTC", "C097BTC", "C096BTC"]
    );
    assert_eq!(mock.ticker_calls.load(Ordering::SeqCst), 400);
    assert!(mock.max_tickers_in_flight.load(Ordering::SeqCst) > 1);

    let second = poller.run_cycle().await.unwrap();
    assert!(!second.reranked);
    assert_eq!(second.published, 5);
    assert_eq!(store.scrape().records.len(), 5);
    assert_eq!(counters.load().cycles_failed, 0);
}

#[tokio::test]
async fn ranking_failure_keeps_tracked_set_and_snapshot() {
    let mock = seeded_exchange().await;
    let (mut poller, store, counters) = poller(&mock, config(2, 1));

    mock.fail_tickers(true);
    let err = poller.run_cycle().await.unwrap_err();
    assert_eq!(err.phase(), CyclePhase::Rank);
    assert!(poller.tracked_symbols().is_empty());
    assert_eq!(mock.in_flight.load(Ordering::SeqCst), 0);

    mock.fail_tickers(false);
    poller.run_cycle().await.unwrap();
    mock.set_spread("ETHBTC", 0.6).await;
    poller.run_cycle().await.unwrap();
    let served = store.scrape();
    assert_eq!(served.records.len(), 2);

    // Re-ranking is due every cycle; a venue error mid-pass ranks nothing.
    mock.set_ticker("XRPBTC", Some("50.0"), Some(100)).await;
    mock.fail_tickers(true);
    let err = poller.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Exchange { phase: CyclePhase::Rank, .. }));
    assert_eq!(poller.tracked_symbols(), ["ETHBTC", "LTCBTC"]);
    assert!(Arc::ptr_eq(&served, &store.scrape()));

    let c = counters.load();
    assert_eq!(c.cycles_ok, 2);
    assert_eq!(c.cycles_failed, 2);
}

#[tokio::test]
async fn one_sided_book_skips_only_that_instrument() {
    let mock = seeded_exchange().await;
    mock.set_book(
        "LTCBTC",
        OrderBookSnapshot {
            bids: vec![],
            asks: mock_exchange::book_with_spread(50.0, 0.1).asks,
        },
    )
    .await;
    let (mut poller, store, counters) = poller(&mock, config(2, 0));

    let first = poller.run_cycle().await.unwrap();
    assert_eq!(first.empty_books, 1);

    let second = poller.run_cycle().await.unwrap();
    assert_eq!(second.empty_books, 1);
    assert_eq!(second.published, 1);

    let snap = store.scrape();
    assert_eq!(snap.records[0].symbol, "ETHBTC");
    assert_eq!(counters.load().empty_books, 2);
}

#[tokio::test]
async fn malformed_tickers_are_counted_and_left_unranked() {
    let mock = seeded_exchange().await;
    mock.list("BADBTC", "BTC", Some("lots"), Some(1)).await;
    mock.list("NOVOLBTC", "BTC", None, Some(1)).await;
    let (mut poller, _, counters) = poller(&mock, config(5, 0));

    poller.run_cycle().await.unwrap();

    assert_eq!(poller.tracked_symbols(), ["ETHBTC", "LTCBTC", "XRPBTC"]);
    assert_eq!(counters.load().malformed_tickers, 2);
}

#[tokio::test]
async fn rerank_admits_new_symbols_without_a_prior_value() {
    let mock = seeded_exchange().await;
    let (mut poller, store, _) = poller(&mock, config(2, 1));

    poller.run_cycle().await.unwrap();
    assert_eq!(poller.tracked_symbols(), ["ETHBTC", "LTCBTC"]);

    mock.set_ticker("XRPBTC", Some("50.0"), Some(100)).await;

    let report = poller.run_cycle().await.unwrap();
    assert!(report.reranked);
    assert_eq!(poller.tracked_symbols(), ["XRPBTC", "ETHBTC"]);
    assert_eq!(mock.list_calls.load(Ordering::SeqCst), 2);

    let snap = store.scrape();
    assert_eq!(snap.records.len(), 2);

    let xrp = snap.records.iter().find(|r| r.symbol == "XRPBTC").unwrap();
    let eth = snap.records.iter().find(|r| r.symbol == "ETHBTC").unwrap();
    assert_eq!(xrp.delta, None);
    assert_eq!(eth.delta, Some(0.0));

    // LTCBTC dropped out of the tracked set and is no longer published.
    assert!(snap.records.iter().all(|r| r.symbol != "LTCBTC"));
}

#[tokio::test(start_paused = true)]
async fn overrunning_cycles_never_overlap() {
    let mock = seeded_exchange().await;
    // Two tracked books at 6s each overrun the 10s period.
    mock.set_book_delay(Duration::from_secs(6)).await;

    let mut cfg = config(2, 0);
    cfg.fetch_timeout = Duration::from_secs(60);
    let (poller, _, counters) = poller(&mock, cfg);

    let handle = tokio::spawn(poller.run());
    tokio::time::sleep(Duration::from_secs(65)).await;
    handle.abort();

    assert_eq!(mock.max_in_flight.load(Ordering::SeqCst), 1);

    let c = counters.load();
    assert!(c.cycles_ok >= 3, "cycles_ok = {}", c.cycles_ok);
    assert_eq!(c.cycles_failed, 0);
    assert!(c.skipped_ticks >= 1);
}

#[tokio::test]
#[traced_test]
async fn aborted_cycle_is_logged() {
    let mock = seeded_exchange().await;
    mock.fail_books(true);
    let (mut poller, _, _) = poller(&mock, config(2, 0));

    assert!(poller.run_cycle().await.is_err());
    assert!(logs_contain("cycle aborted; serving previous snapshot"));
    assert!(logs_contain("phase=fetch"));
}

#[tokio::test]
async fn universe_is_ranked_by_volume_and_by_trades() {
    use spreadwatch::universe::rank_universe;

    let mock = seeded_exchange().await;
    mock.list("ETHUSDT", "USDT", Some("500000"), Some(90_000)).await;
    mock.list("SOLUSDT", "USDT", Some("100"), Some(70_000)).await;

    let counters = Counters::default();
    let ranking = rank_universe(&mock, &config(2, 0).ranking, &counters)
        .await
        .unwrap();

    let by_volume: Vec<_> = ranking.by_volume.iter().map(|e| e.symbol.as_str()).collect();
    let by_trades: Vec<_> = ranking.by_trades.iter().map(|e| e.symbol.as_str()).collect();

    assert_eq!(by_volume, ["ETHBTC", "LTCBTC"]);
    assert_eq!(by_trades, ["ETHUSDT", "SOLUSDT"]);
    assert_eq!(ranking.by_trades[0].metric, 90_000.0);
    assert_eq!(ranking.tracked_symbols(), ["ETHBTC", "LTCBTC"]);
}

#[tokio::test]
#[traced_test]
async fn notional_is_reported_at_info_per_symbol() {
    let mock = seeded_exchange().await;
    let (mut poller, _, _) = poller(&mock, config(2, 0));

    poller.run_cycle().await.unwrap();

    logs_assert(|lines: &[&str]| {
        let sampled: Vec<_> = lines.iter().filter(|l| l.contains("book sampled")).collect();
        if sampled.len() != 2 {
            return Err(format!("expected 2 sampled books, got {}", sampled.len()));
        }
        if !sampled.iter().all(|l| l.contains(" INFO ") && l.contains("notional=")) {
            return Err(format!("notional not at info: {sampled:?}"));
        }
        Ok(())
    });
}
