use std::fmt::Write as _;
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use oddslab::dataset::{StoredFixture, parse_fixture_csv};
use oddslab::holdout;
use oddslab::metrics::Prob3;
use oddslab::simulation;

fn sample_csv(rows: usize) -> String {
    let mut out = String::from(
        "fixture_id,league_id,date,home_team,away_team,home_win_odds,draw_odds,away_win_odds,outcome\n",
    );
    for i in 0..rows {
        let _ = writeln!(
            out,
            "{},47,2024-{:02}-{:02},\"Team, Home {}\",Away {},{:.2},{:.2},{:.2},{}",
            1000 + i,
            (i / 28) % 12 + 1,
            i % 28 + 1,
            i,
            i,
            1.5 + (i % 10) as f64 * 0.1,
            3.2 + (i % 5) as f64 * 0.1,
            2.4 + (i % 7) as f64 * 0.3,
            i % 3
        );
    }
    out
}

fn sample_fixtures(n: usize) -> (Vec<StoredFixture>, Vec<Prob3>) {
    let fixtures = (0..n)
        .map(|i| StoredFixture {
            fixture_id: 1000 + i as u64,
            league_id: 47,
            date: format!("2024-{:02}-{:02}", (i / 28) % 12 + 1, i % 28 + 1),
            home_team: format!("Home {i}"),
            away_team: format!("Away {i}"),
            home_odds: 1.5 + (i % 10) as f64 * 0.1,
            draw_odds: 3.2 + (i % 5) as f64 * 0.1,
            away_odds: 2.4 + (i % 7) as f64 * 0.3,
            outcome_code: Some((i % 3) as u8),
        })
        .collect();
    let probs = (0..n)
        .map(|i| {
            let lead = 0.45 + (i % 30) as f64 * 0.01;
            let rest = (1.0 - lead) / 2.0;
            match i % 3 {
                0 => Prob3 {
                    home: lead,
                    draw: rest,
                    away: rest,
                },
                1 => Prob3 {
                    home: rest,
                    draw: lead,
                    away: rest,
                },
                _ => Prob3 {
                    home: rest,
                    draw: rest,
                    away: lead,
                },
            }
        })
        .collect();
    (fixtures, probs)
}

fn bench_csv_parse(c: &mut Criterion) {
    let raw = sample_csv(500);
    c.bench_function("fixture_csv_parse_500", |b| {
        b.iter(|| {
            let parsed = parse_fixture_csv(black_box(&raw), 47).unwrap();
            black_box(parsed.rows.len());
        });
    });
}

fn bench_simulate(c: &mut Criterion) {
    let (fixtures, probs) = sample_fixtures(2000);
    let thresholds = oddslab::thresholds::BetThresholds::defaults(47);
    c.bench_function("simulate_2000", |b| {
        b.iter(|| {
            let result =
                simulation::simulate(black_box(&fixtures), black_box(&probs), &thresholds).unwrap();
            black_box(result.summary.bets);
        });
    });
}

fn bench_bootstrap(c: &mut Criterion) {
    let (fixtures, probs) = sample_fixtures(2000);
    let thresholds = oddslab::thresholds::BetThresholds::defaults(47);
    let result = simulation::simulate(&fixtures, &probs, &thresholds).unwrap();
    c.bench_function("bootstrap_roi_1000", |b| {
        b.iter(|| {
            let interval =
                simulation::bootstrap_roi_interval(black_box(&result.records), 1000, 1912);
            black_box(interval);
        });
    });
}

fn bench_holdout(c: &mut Criterion) {
    let (fixtures, probs) = sample_fixtures(2000);
    let thresholds = oddslab::thresholds::BetThresholds::defaults(47);
    c.bench_function("holdout_run_2000", |b| {
        b.iter(|| {
            let report = holdout::run_holdout(
                47,
                black_box(&fixtures),
                black_box(&probs),
                thresholds,
                holdout::GateCriteria::default(),
            )
            .unwrap();
            black_box(report.gate_passed);
        });
    });
}

criterion_group!(
    benches,
    bench_csv_parse,
    bench_simulate,
    bench_bootstrap,
    bench_holdout
);
criterion_main!(benches);
