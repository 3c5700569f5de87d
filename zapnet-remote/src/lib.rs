//! Host-side Etherbone client: reads and writes an instrument's registers over UDP.
#![deny(missing_docs)]

mod client;
mod error;
mod logger;

pub use client::{RemoteClient, DEFAULT_TIMEOUT, MAX_WORDS_PER_RECORD};
pub use error::Error;
pub use logger::{init_logger, verbosity_filter, StderrLogger};

/// Parses a decimal or `0x`-prefixed hexadecimal 32-bit number.
pub fn parse_u32(text: &str) -> Result<u32, Error> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse::<u32>(),
    };
    parsed.map_err(|_| Error::BadNumber(text.to_string()))
}
