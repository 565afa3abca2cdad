//! JSON fixtures for reproducing a forecast.
//!
//! A fixture is a `ForecastInput` rendered as pretty JSON with RFC 3339
//! timestamps; absent optional fields are omitted.

use std::{fs, io::Write, path::Path};

use eyre::WrapErr;

use crate::types::{ForecastInput, ForecastOutput};

impl ForecastInput {
    pub fn to_fixture_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_fixture_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

impl ForecastOutput {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Replace `path` in one step: write a sibling temp file, sync, rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

pub fn write_fixture(path: &Path, input: &ForecastInput) -> eyre::Result<()> {
    let json = input.to_fixture_json().wrap_err("serialize fixture")?;
    write_atomic(path, json.as_bytes()).wrap_err_with(|| format!("write fixture {path:?}"))
}

pub fn read_fixture(path: &Path) -> eyre::Result<ForecastInput> {
    let text = fs::read_to_string(path).wrap_err_with(|| format!("read fixture {path:?}"))?;
    ForecastInput::from_fixture_json(&text).wrap_err_with(|| format!("parse fixture {path:?}"))
}
