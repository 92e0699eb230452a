mod support;

use rust_decimal_macros::dec;

use clinical_kpi::application::{
    LatestMetricsQuery, QueryConfig, ReconcileConfig, Reconciler, RunReporter,
};
use clinical_kpi::domain::{MarketId, Measurement, ProviderId};
use clinical_kpi::port::outbound::store::MetricsStore;
use clinical_kpi::testkit::domain::{at, kpis, now, staging};

use support::db::TempDb;

/// Stage and reconcile one provider with a baseline at the 13th.
fn reconcile_provider(db: &TempDb, provider: i64, completed: i64, last_day: u32, markets: &str) {
    let mut snapshot = kpis(dec!(72), dec!(0.93), 1700);
    snapshot.completed_care_requests = completed;
    snapshot.last_care_request_completed_at = Some(at(last_day, 15));
    db.seed_historical(provider, kpis(dec!(70), dec!(0.9), 1800), at(13, 0));
    db.store()
        .add_staging(&staging(provider, snapshot, Some(markets)))
        .unwrap();
    Reconciler::new(db.store(), ReconcileConfig::default(), RunReporter::disabled())
        .run_at(now())
        .unwrap();
}

#[test]
fn latest_for_provider_reads_calculated_metrics() {
    let db = TempDb::create();
    reconcile_provider(&db, 1, 200, 18, "1");
    let query = LatestMetricsQuery::new(db.store(), QueryConfig::default());

    let view = query.latest_for_provider(ProviderId::new(1)).unwrap().unwrap();

    assert!(!view.withheld);
    assert_eq!(view.completed_care_requests, 200);
    assert_eq!(view.last_care_request_completed_at, Some(at(18, 15)));
    let kpis = view.kpis.unwrap();
    assert_eq!(kpis.average_net_promoter_score, Measurement::Known(dec!(72)));
    assert_eq!(kpis.changes.average_net_promoter_score_change, Measurement::Known(dec!(2)));
    assert_eq!(kpis.changes.chart_closure_rate_change, Measurement::Known(dec!(0.03)));
    assert_eq!(kpis.changes.median_on_scene_time_secs_change, Some(-100));
    assert_eq!(kpis.change_days, 7);
}

#[test]
fn threshold_withholds_kpis() {
    let db = TempDb::create();
    reconcile_provider(&db, 2, 40, 18, "1");
    let config = QueryConfig {
        completed_care_requests_threshold: 41,
        ..QueryConfig::default()
    };
    let query = LatestMetricsQuery::new(db.store(), config);

    let view = query.latest_for_provider(ProviderId::new(2)).unwrap().unwrap();

    assert!(view.withheld);
    assert!(view.kpis.is_none());
}

#[test]
fn threshold_is_inclusive() {
    let db = TempDb::create();
    reconcile_provider(&db, 3, 80, 18, "1");
    let query = LatestMetricsQuery::new(db.store(), QueryConfig::default());

    let view = query.latest_for_provider(ProviderId::new(3)).unwrap().unwrap();

    assert!(!view.withheld);
}

#[test]
fn latest_for_market_filters_inactive_and_foreign_providers() {
    let db = TempDb::create();
    reconcile_provider(&db, 1, 200, 18, "5|6");
    reconcile_provider(&db, 2, 200, 3, "5");
    reconcile_provider(&db, 3, 200, 16, "6");
    reconcile_provider(&db, 4, 200, 14, "5");
    let query = LatestMetricsQuery::new(db.store(), QueryConfig::default());

    let views = query.latest_for_market(MarketId::new(5), 7, now()).unwrap();

    let ids: Vec<ProviderId> = views.iter().map(|v| v.provider_id).collect();
    assert_eq!(ids, vec![ProviderId::new(1), ProviderId::new(4)]);
}

#[test]
fn latest_for_market_without_members_is_empty() {
    let db = TempDb::create();
    let query = LatestMetricsQuery::new(db.store(), QueryConfig::default());

    assert!(query.latest_for_market(MarketId::new(99), 30, now()).unwrap().is_empty());
}

#[test]
fn provider_without_calculated_row_has_no_view() {
    let db = TempDb::create();
    db.store()
        .add_staging(&staging(8, kpis(dec!(1), dec!(1), 1), None))
        .unwrap();
    Reconciler::new(db.store(), ReconcileConfig::default(), RunReporter::disabled())
        .run_at(now())
        .unwrap();
    let query = LatestMetricsQuery::new(db.store(), QueryConfig::default());

    assert!(query.latest_for_provider(ProviderId::new(8)).unwrap().is_none());
}
