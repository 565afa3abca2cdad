#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Any fixture that deserializes must forecast without panicking.
    let Ok(input) = glyco_core::ForecastInput::from_fixture_json(data) else {
        return;
    };
    let now = input
        .glucose
        .last()
        .map_or_else(chrono::Utc::now, |s| s.time);
    let _ = glyco_core::forecast(&input, now);
});
