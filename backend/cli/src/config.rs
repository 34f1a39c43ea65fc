use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use mdchat_config::defaults::{DEFAULT_BIND, DEFAULT_PORT};
use mdchat_config::{config_dir, config_file_path, load_and_prepare, MdChatConfig};

const SESSION_FILE: &str = "session.json";

/// Loads the config at `path`, or at the default location.
pub async fn load(path: Option<&Path>) -> Result<MdChatConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path(&config_dir()),
    };
    load_and_prepare(&path)
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Address the gateway listens on. `port` overrides the configured port.
pub fn listen_addr(config: &MdChatConfig, port: Option<u16>) -> Result<SocketAddr> {
    let server = config.server();
    let bind = server.bind.unwrap_or_else(|| DEFAULT_BIND.to_string());
    let ip = bind
        .parse()
        .with_context(|| format!("Invalid bind address '{bind}'"))?;
    Ok(SocketAddr::new(
        ip,
        port.or(server.port).unwrap_or(DEFAULT_PORT),
    ))
}

/// Base URL a local client uses to reach the configured gateway.
pub fn gateway_url(config: &MdChatConfig) -> Result<String> {
    let mut addr = listen_addr(config, None)?;
    if addr.ip().is_unspecified() {
        addr.set_ip(Ipv4Addr::LOCALHOST.into());
    }
    Ok(format!("http://{addr}"))
}

pub fn session_path(config: &MdChatConfig) -> PathBuf {
    config
        .storage()
        .session_file
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir().join(SESSION_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdchat_config::{ServerConfig, StorageConfig};

    fn with_server(bind: &str, port: u16) -> MdChatConfig {
        MdChatConfig {
            server: Some(ServerConfig {
                bind: Some(bind.into()),
                port: Some(port),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn port_flag_overrides_config() {
        let config = with_server("127.0.0.1", 5000);
        assert_eq!(
            listen_addr(&config, Some(7000)).unwrap(),
            "127.0.0.1:7000".parse().unwrap()
        );
        assert_eq!(listen_addr(&config, None).unwrap().port(), 5000);
    }

    #[test]
    fn wildcard_bind_is_reached_over_loopback() {
        assert_eq!(
            gateway_url(&with_server("0.0.0.0", 8080)).unwrap(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn bad_bind_address_is_an_error() {
        assert!(listen_addr(&with_server("localhost:99", 1), None).is_err());
    }

    #[test]
    fn session_file_comes_from_storage_config() {
        let config = MdChatConfig {
            storage: Some(StorageConfig {
                session_file: Some("/tmp/mdchat/session.json".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            session_path(&config),
            PathBuf::from("/tmp/mdchat/session.json")
        );
    }

    #[tokio::test]
    async fn missing_config_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(Some(&dir.path().join("config.yaml"))).await.unwrap();
        assert_eq!(config.render().parser.as_deref(), Some("full"));
        assert_eq!(
            session_path(&config),
            dir.path().join("session.json")
        );
    }
}
