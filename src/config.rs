//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Presses needed inside one window to trigger a panic
pub const DEFAULT_PRESS_THRESHOLD: u32 = 3;
/// Window within which consecutive presses accumulate
pub const DEFAULT_PRESS_WINDOW: Duration = Duration::from_millis(2000);
/// Delay before the demo trigger fires, when enabled
pub const DEFAULT_DEMO_DELAY: Duration = Duration::from_millis(5000);

/// Settings for the press-count detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorSettings {
    /// Number of qualifying presses that trigger a panic
    pub threshold: u32,
    /// Maximum silence between presses before the count restarts
    pub window: Duration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PRESS_THRESHOLD,
            window: DEFAULT_PRESS_WINDOW,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for the method channel
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Press detection settings
    pub detector: DetectorSettings,

    /// Delay for the one-shot demo trigger; `None` keeps it disabled
    pub demo_delay: Option<Duration>,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("panic-trigger");

        let socket_path = lookup("PANIC_TRIGGER_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        let threshold = match lookup("PANIC_PRESS_THRESHOLD") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("invalid PANIC_PRESS_THRESHOLD: {raw:?}"))?,
            None => DEFAULT_PRESS_THRESHOLD,
        };
        if threshold == 0 {
            bail!("PANIC_PRESS_THRESHOLD must be at least 1");
        }

        let window = parse_millis(&lookup, "PANIC_PRESS_WINDOW_MS")?
            .unwrap_or(DEFAULT_PRESS_WINDOW);

        let demo_enabled = lookup("PANIC_DEMO_TRIGGER")
            .map(|raw| is_truthy(&raw))
            .unwrap_or(false);
        let demo_delay = if demo_enabled {
            Some(parse_millis(&lookup, "PANIC_DEMO_DELAY_MS")?.unwrap_or(DEFAULT_DEMO_DELAY))
        } else {
            None
        };

        Ok(Self {
            socket_path,
            data_dir,
            detector: DetectorSettings { threshold, window },
            demo_delay,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .with_context(|| format!("invalid {key}: {raw:?}"))
        })
        .transpose()
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
