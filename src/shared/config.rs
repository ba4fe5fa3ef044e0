use dotenvy::dotenv;
use std::env;

/// Runtime configuration, loaded from the environment. All values have
/// working defaults so a bare `deskserver` starts without a .env file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Exact emails elevated to ADMIN on first contact (bootstrap rule).
    pub bootstrap_admins: Vec<String>,
    /// Email local-part prefixes elevated to ADMIN on first contact.
    pub bootstrap_prefixes: Vec<String>,
    /// Coalescing window for refetch-on-change subscriptions.
    pub sync_debounce_ms: u64,
}

impl AppConfig {
    pub fn load() -> Self {
        dotenv().ok();

        let bind_addr =
            env::var("DESK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let bootstrap_admins = env::var("DESK_BOOTSTRAP_ADMINS")
            .map(|v| split_csv(&v))
            .unwrap_or_default();

        let bootstrap_prefixes = env::var("DESK_BOOTSTRAP_PREFIXES")
            .map(|v| split_csv(&v))
            .unwrap_or_else(|_| vec!["admin".to_string(), "dev".to_string()]);

        let sync_debounce_ms = env::var("DESK_SYNC_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(250);

        Self {
            bind_addr,
            bootstrap_admins,
            bootstrap_prefixes,
            sync_debounce_ms,
        }
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_lowercases() {
        assert_eq!(
            split_csv(" TI@example.com , admin , "),
            vec!["ti@example.com".to_string(), "admin".to_string()]
        );
    }

    #[test]
    fn split_csv_empty_input() {
        assert!(split_csv("").is_empty());
    }
}
