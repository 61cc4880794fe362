// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Providers allow the demuxer to work in different contexts by
//! allowing implementations of core services to be plugged in. Logging
//! and the hash seed source are both done as providers: one flavor fit
//! for a running stack, another for unit testing. If a service doesn't
//! have at least two obvious implementations, then it probably doesn't
//! need to be a provider.

use std::fmt;
use std::fmt::Display;

/// A logging provider provides the means to log messages to some
/// destination based on the context in which the demuxer is running.
///
/// Logging levels are provided by [`LogLevel`]. These levels will map
/// to the underlying provider with varying degrees of success.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug)]
pub enum LogLevel {
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

#[derive(Clone, Copy)]
pub struct PrintlnLog;

impl LogProvider for PrintlnLog {
    fn log(&self, level: LogLevel, msg: &str) {
        println!("{level} {msg}");
    }
}

/// Log through the stack's structured logger.
#[derive(Clone)]
pub struct SlogLog {
    log: slog::Logger,
}

impl SlogLog {
    pub fn new(log: slog::Logger) -> Self {
        Self { log: log.new(slog::o!("component" => "tdemux")) }
    }
}

impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Note => slog::info!(self.log, "{}", msg),
            LogLevel::Warn => slog::warn!(self.log, "{}", msg),
            LogLevel::Error => slog::error!(self.log, "{}", msg),
        }
    }
}

/// The source of the per-group secret used to seed endpoint
/// selection hashes.
///
/// The seed only needs to be unpredictable to outside observers; it
/// is not used for anything cryptographic.
pub trait SeedProvider: Send + Sync {
    fn next_seed(&self) -> u32;
}

/// Draw seeds from the thread-local `rand` generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandSeed;

impl SeedProvider for RandSeed {
    fn next_seed(&self) -> u32 {
        rand::random()
    }
}

/// Always hand out the same seed, making endpoint selection
/// reproducible across runs.
#[derive(Clone, Copy, Debug)]
pub struct FixedSeed(pub u32);

impl SeedProvider for FixedSeed {
    fn next_seed(&self) -> u32 {
        self.0
    }
}
