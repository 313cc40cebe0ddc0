//! Configuration resolution.

use std::path::Path;
use std::time::Duration;

use hybrid_collector::{Backoff, FetchPolicy};

/// Environment variable naming the sources file.
pub const CONFIG_ENV: &str = "HYBRID_COLLECTOR_CONFIG";

/// Local sources file, preferred over the bundled example when present.
pub const LOCAL_CONFIG: &str = "config/sources.yml";

pub const EXAMPLE_CONFIG: &str = "config/sources.example.yml";

/// Resolve the sources file path.
pub fn resolve_config_path(explicit: Option<&str>) -> String {
    resolve_config_path_in(
        explicit,
        std::env::var(CONFIG_ENV).ok().as_deref(),
        Path::new("."),
    )
}

/// Resolution order: explicit path, non-empty env value, `config/sources.yml`
/// under `base_dir` if it exists, the bundled example.
pub fn resolve_config_path_in(explicit: Option<&str>, env_path: Option<&str>, base_dir: &Path) -> String {
    if let Some(path) = explicit {
        return path.to_string();
    }

    if let Some(env_path) = env_path.filter(|p| !p.is_empty()) {
        return env_path.to_string();
    }

    if base_dir.join(LOCAL_CONFIG).exists() {
        return LOCAL_CONFIG.to_string();
    }

    EXAMPLE_CONFIG.to_string()
}

/// Build the fetch policy from command-line settings. A zero backoff
/// retries without sleeping.
pub fn fetch_policy(timeout_secs: u64, max_attempts: u32, backoff_ms: u64) -> FetchPolicy {
    let backoff = match backoff_ms {
        0 => Backoff::NONE,
        ms => Backoff::exponential(Duration::from_millis(ms), Backoff::default().max),
    };
    FetchPolicy::default()
        .with_timeout(Duration::from_secs(timeout_secs))
        .with_max_attempts(max_attempts)
        .with_backoff(backoff)
}
