#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = glyco_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A validated config must convert into engine settings and schedules.
    let settings = glyco_core::ForecastSettings::from(&cfg);
    assert!(settings.validate().is_ok());
    assert!(glyco_core::InMemoryHistory::try_from(&cfg.schedules).is_ok());
});
