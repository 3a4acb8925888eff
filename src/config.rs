use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::Deserialize;

use crate::common::{Error, Result};

const PROBE_FIRST: u8 = 0x08;
const PROBE_LAST: u8 = 0x77;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl Config {
    /// Parses a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    fn validate(&self) -> Result<()> {
        check_probe_range(&self.probe.range())
    }
}

/// Rejects probe ranges that are empty or leave the 7-bit address space.
pub(crate) fn check_probe_range(range: &RangeInclusive<u8>) -> Result<()> {
    if range.start() > range.end() || *range.end() > 0x7F {
        return Err(Error::Config(format!(
            "probe range {:#04x}..={:#04x} is not a valid 7-bit address range",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct BusConfig {
    /// Transport locator; empty selects the platform default.
    #[serde(default)]
    pub locator: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_first")]
    pub first: u8,

    #[serde(default = "default_probe_last")]
    pub last: u8,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            first: PROBE_FIRST,
            last: PROBE_LAST,
        }
    }
}

impl ProbeConfig {
    pub fn range(&self) -> RangeInclusive<u8> {
        self.first..=self.last
    }
}

fn default_probe_first() -> u8 {
    PROBE_FIRST
}

fn default_probe_last() -> u8 {
    PROBE_LAST
}
