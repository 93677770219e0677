//! Server configuration
//!
//! Build-time defaults come from build.rs; the environment overrides them at
//! startup.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default port (set at compile time via build.rs)
pub const DEFAULT_PORT: u16 = {
    match option_env!("INDICATOR_DEFAULT_PORT") {
        Some(s) => {
            // const-compatible parsing
            let bytes = s.as_bytes();
            let mut result: u16 = 0;
            let mut i = 0;
            while i < bytes.len() {
                result = result * 10 + (bytes[i] - b'0') as u16;
                i += 1;
            }
            result
        }
        None => 8083,
    }
};

/// Default base address (set at compile time via build.rs)
pub const DEFAULT_BASE_ADDR: &str = match option_env!("INDICATOR_DEFAULT_BASE_ADDR") {
    Some(s) => s,
    None => "0x40000000",
};

pub const DEFAULT_MEM_PATH: &str = "/dev/mem";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// One device instance per base address.
    pub base_addrs: Vec<usize>,
    pub mem_path: PathBuf,
    /// Back devices with memory instead of `mem_path`.
    pub simulate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            base_addrs: parse_addr_list(DEFAULT_BASE_ADDR).unwrap_or_default(),
            mem_path: PathBuf::from(DEFAULT_MEM_PATH),
            simulate: false,
        }
    }
}

impl Config {
    /// Read `PORT`, `INDICATOR_ADDRS`, `INDICATOR_MEM` and
    /// `INDICATOR_SIMULATE` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Parse(port.clone()))?;
        }
        if let Some(addrs) = lookup("INDICATOR_ADDRS") {
            config.base_addrs = parse_addr_list(&addrs)?;
        }
        if let Some(path) = lookup("INDICATOR_MEM") {
            config.mem_path = PathBuf::from(path);
        }
        if let Some(flag) = lookup("INDICATOR_SIMULATE") {
            config.simulate = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }

        Ok(config)
    }
}

/// Parse a hex (`0x` prefix) or decimal address.
pub fn parse_addr(text: &str) -> Result<usize> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| Error::Parse(text.to_string()))
}

/// Parse a comma separated address list. Empty entries are skipped.
pub fn parse_addr_list(text: &str) -> Result<Vec<usize>> {
    text.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(parse_addr)
        .collect()
}
