use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glyco_core::{DailySchedule, ForecastInput, ForecastSettings, SensitivityMode, forecast};
use glyco_traits::{CarbRecord, DoseRecord, DosingLimits, GlucoseSample, TargetRange};

// Synthetic day: slow sine with xorshift noise every 5 min, hourly temp
// basals, a bolus and a meal every four hours.
fn synth_input(hours: i64, seed: u32) -> (ForecastInput, DateTime<Utc>) {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let start = now - Duration::hours(hours);
    let mut state = seed.max(1);
    let mut noise = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (f64::from(x) / f64::from(u32::MAX)) * 4.0 - 2.0
    };

    let samples = hours * 12;
    let glucose = (0..=samples)
        .map(|k| {
            let phase = k as f64 / 40.0;
            GlucoseSample::new(start + Duration::minutes(5 * k), 140.0 + 40.0 * phase.sin() + noise())
        })
        .collect();
    let doses = (0..hours)
        .flat_map(|h| {
            let t = start + Duration::hours(h);
            let mut v = vec![DoseRecord::temp_basal(t, t + Duration::minutes(30), 0.5 + (h % 3) as f64 * 0.5)];
            if h % 4 == 0 {
                v.push(DoseRecord::bolus(t + Duration::minutes(7), 3.0));
            }
            v
        })
        .collect();
    let carbs = (0..hours)
        .step_by(4)
        .map(|h| CarbRecord::new(start + Duration::hours(h) + Duration::minutes(2), 45.0))
        .collect();

    let from = start - Duration::hours(8);
    let to = now + Duration::hours(8);
    let input = ForecastInput::builder()
        .with_glucose(glucose)
        .with_doses(doses)
        .with_carbs(carbs)
        .with_basal(
            DailySchedule::new(vec![(0, 0.8), (6 * 60, 1.2), (20 * 60, 0.9)])
                .unwrap()
                .table_between(from, to),
        )
        .with_sensitivity(DailySchedule::constant(45.0).table_between(from, to))
        .with_carb_ratio(DailySchedule::constant(11.0).table_between(from, to))
        .with_target(DailySchedule::constant(TargetRange::new(100.0, 115.0)).table_between(from, to))
        .with_limits(DosingLimits {
            max_bolus: 6.0,
            max_basal_rate: 3.0,
            suspend_threshold: 70.0,
            bolus_increment: Some(0.05),
        })
        .try_build()
        .unwrap();
    (input, now)
}

pub fn bench_forecast(c: &mut Criterion) {
    let mut g = c.benchmark_group("forecast");
    // Quick runs without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p glyco_core --bench forecast
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(10));
        }
    } else {
        g.sample_size(30);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    for &hours in &[6i64, 24] {
        for mode in [SensitivityMode::DoseStart, SensitivityMode::EffectTime] {
            let (mut input, now) = synth_input(hours, 0xC0FFEE);
            input.settings = ForecastSettings {
                sensitivity_mode: mode,
                ..input.settings
            };
            g.bench_function(format!("{hours}h_{mode:?}"), |b| {
                b.iter(|| black_box(forecast(black_box(&input), now)))
            });
        }
    }
    g.finish();
}

criterion_group!(benches, bench_forecast);
criterion_main!(benches);
