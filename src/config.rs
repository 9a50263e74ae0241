use std::net::SocketAddr;

const DEFAULT_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Snapshot file for forms and responses; `None` keeps everything in memory.
    pub local_state_path: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("BACKEND_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);
        let local_state_path = match std::env::var("LOCAL_STATE_PATH") {
            Ok(v) if v.trim().eq_ignore_ascii_case("off") => None,
            Ok(v) if !v.trim().is_empty() => Some(v),
            _ => Some(format!("{}/local_state.json", env!("CARGO_MANIFEST_DIR"))),
        };
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|raw| parse_origins(&raw))
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_ORIGIN.to_string()]);

        Self {
            host,
            port,
            local_state_path,
            allowed_origins,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            local_state_path: None,
            allowed_origins: vec![DEFAULT_ORIGIN.to_string()],
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blank_entries_dropped() {
        let parsed = parse_origins(" http://localhost:5173, ,https://forms.example.com ");
        assert_eq!(parsed, vec!["http://localhost:5173", "https://forms.example.com"]);
    }

    #[test]
    fn in_memory_config_has_no_snapshot() {
        let cfg = AppConfig::in_memory();
        assert!(cfg.local_state_path.is_none());
        assert_eq!(cfg.socket_addr().unwrap().port(), 0);
    }
}
