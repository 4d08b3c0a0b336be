//! Connection manager: owns the single active `ChainConnection`.
//!
//! State lives in a `tokio::sync::watch` channel so the rendering layer and
//! the deep-link driver can subscribe to changes. Every `connect` and
//! `disconnect` bumps a generation number under the channel's lock; a
//! `get_info` answer is applied only if its generation is still current, so
//! a slow answer for chain A can never overwrite a newer connection to B.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::ConnectError;
use crate::source::ChainSource;
use crate::storage::{SessionStorage, CHAIN_NAME_KEY, ENDPOINT_KEY};
use crate::types::ChainConnection;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChainPreset {
    /// URL-safe key accepted by the `chain` link parameter.
    pub key: &'static str,
    pub name: &'static str,
    pub endpoint: &'static str,
    pub history_endpoint: Option<&'static str>,
}

pub const PRESET_CHAINS: [ChainPreset; 6] = [
    ChainPreset {
        key: "eosmainnet",
        name: "EOS Mainnet",
        endpoint: "https://eos.greymass.com",
        history_endpoint: None,
    },
    ChainPreset {
        key: "jungle4testnet",
        name: "Jungle4 Testnet",
        endpoint: "https://jungle4.greymass.com",
        history_endpoint: None,
    },
    ChainPreset {
        key: "waxmainnet",
        name: "WAX Mainnet",
        endpoint: "https://wax.greymass.com",
        history_endpoint: None,
    },
    ChainPreset {
        key: "telosmainnet",
        name: "Telos Mainnet",
        endpoint: "https://telos.greymass.com",
        history_endpoint: None,
    },
    ChainPreset {
        key: "fiomainnet",
        name: "FIO Mainnet",
        endpoint: "https://fio.greymass.com",
        history_endpoint: None,
    },
    ChainPreset {
        key: "libre",
        name: "Libre",
        endpoint: "https://libre.greymass.com",
        history_endpoint: None,
    },
];

pub fn presets() -> &'static [ChainPreset] {
    &PRESET_CHAINS
}

fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Match a preset by key, by name (case and whitespace insensitive) or by
/// endpoint.
pub fn find_preset(query: &str) -> Option<&'static ChainPreset> {
    let wanted = squash(query);
    if wanted.is_empty() {
        return None;
    }
    let endpoint = query.trim().trim_end_matches('/');
    PRESET_CHAINS
        .iter()
        .find(|p| p.key == wanted || squash(p.name) == wanted || p.endpoint == endpoint)
}

/// Key to put in a `chain` link parameter for a connection name.
pub fn preset_key_for(name: &str) -> Option<&'static str> {
    find_preset(name).map(|p| p.key)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// Held only while `Connected`.
    pub connection: Option<Arc<ChainConnection>>,
    /// Message from the last failed connect.
    pub error: Option<String>,
    pub generation: u64,
    /// Target of the connect in flight.
    pub pending_endpoint: Option<String>,
    pub pending_name: Option<String>,
}

impl ConnectionState {
    pub fn is_connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }

    /// Connected to, or currently connecting to, a chain with this name.
    pub fn targets(&self, name: &str) -> bool {
        match self.status {
            ConnectionStatus::Connected => self
                .connection
                .as_ref()
                .is_some_and(|c| c.name == name),
            ConnectionStatus::Connecting => self.pending_name.as_deref() == Some(name),
            ConnectionStatus::Disconnected => false,
        }
    }
}

/// Summary shown next to the chat: network name, head block, producer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    pub name: String,
    pub endpoint: String,
    pub head_block_num: u64,
    pub head_producer: String,
    pub chain_id_short: String,
}

impl ChainStatus {
    pub fn from_connection(conn: &ChainConnection) -> Self {
        let short: String = conn.chain_id.chars().take(12).collect();
        let chain_id_short = if conn.chain_id.chars().count() > 12 {
            format!("{short}...")
        } else {
            short
        };
        Self {
            name: conn.name.clone(),
            endpoint: conn.endpoint.clone(),
            head_block_num: conn.head_block_num,
            head_producer: conn.head_producer.clone(),
            chain_id_short,
        }
    }
}

pub struct ConnectionManager {
    source: Arc<dyn ChainSource>,
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(source: Arc<dyn ChainSource>, storage: Arc<dyn SessionStorage>) -> Self {
        let (state, _) = watch::channel(ConnectionState::default());
        Self {
            source,
            storage,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// True while no connect or disconnect has happened since `generation`
    /// was read.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// The held connection, only while `Connected`.
    pub fn active(&self) -> Option<Arc<ChainConnection>> {
        let state = self.state.borrow();
        match state.status {
            ConnectionStatus::Connected => state.connection.clone(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<ChainStatus> {
        self.active().map(|c| ChainStatus::from_connection(&c))
    }

    /// Resolves once no connect is in flight and returns the settled state.
    pub async fn wait_settled(&self) -> ConnectionState {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so this only returns once settled.
        let _ = rx.wait_for(|s| !s.is_connecting()).await;
        self.snapshot()
    }

    pub async fn connect(
        &self,
        endpoint: &str,
        name: Option<&str>,
        history_endpoint: Option<&str>,
    ) -> Result<Arc<ChainConnection>, ConnectError> {
        let endpoint = normalize_endpoint(endpoint)?;
        let history_endpoint = match history_endpoint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(h) => Some(normalize_endpoint(h)?),
            None => None,
        };
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| endpoint.clone());

        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            s.status = ConnectionStatus::Connecting;
            s.connection = None;
            s.error = None;
            s.pending_endpoint = Some(endpoint.clone());
            s.pending_name = Some(name.clone());
        });
        log::info!("🔌 connecting to {name} ({endpoint}) gen={generation}");

        let result = self.source.get_info(&endpoint).await;

        let mut connected = None;
        let applied = self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.pending_endpoint = None;
            s.pending_name = None;
            match &result {
                Ok(info) => {
                    let conn = Arc::new(ChainConnection {
                        endpoint: endpoint.clone(),
                        history_endpoint: history_endpoint.clone(),
                        name: name.clone(),
                        chain_id: info.chain_id.clone(),
                        head_block_num: info.head_block_num,
                        head_producer: info.head_block_producer.clone(),
                    });
                    s.status = ConnectionStatus::Connected;
                    s.connection = Some(conn.clone());
                    connected = Some(conn);
                }
                Err(e) => {
                    s.status = ConnectionStatus::Disconnected;
                    s.connection = None;
                    s.error = Some(e.to_string());
                }
            }
            true
        });

        if !applied {
            log::info!("dropping superseded connect to {endpoint} gen={generation}");
            return Err(ConnectError::Superseded);
        }

        match (result, connected) {
            (Ok(info), Some(conn)) => {
                log::info!(
                    "✅ connected to {} head={} producer={}",
                    conn.name,
                    info.head_block_num,
                    info.head_block_producer
                );
                self.storage.set(ENDPOINT_KEY, &conn.endpoint);
                self.storage.set(CHAIN_NAME_KEY, &conn.name);
                Ok(conn)
            }
            (Err(e), _) => {
                log::warn!("connect to {endpoint} failed: {e}");
                Err(ConnectError::Source(e))
            }
            (Ok(_), None) => Err(ConnectError::Superseded),
        }
    }

    pub async fn connect_preset(
        &self,
        query: &str,
        history_override: Option<&str>,
    ) -> Result<Arc<ChainConnection>, ConnectError> {
        let preset =
            find_preset(query).ok_or_else(|| ConnectError::UnknownPreset(query.to_string()))?;
        self.connect(
            preset.endpoint,
            Some(preset.name),
            history_override.or(preset.history_endpoint),
        )
        .await
    }

    pub fn disconnect(&self) {
        self.state.send_modify(|s| {
            s.generation += 1;
            s.status = ConnectionStatus::Disconnected;
            s.connection = None;
            s.error = None;
            s.pending_endpoint = None;
            s.pending_name = None;
        });
        self.storage.remove(ENDPOINT_KEY);
        self.storage.remove(CHAIN_NAME_KEY);
        log::info!("🔌 disconnected");
    }

    /// Reconnect to the endpoint remembered from the last session. Missing
    /// storage keys are not an error.
    pub async fn restore_session(
        &self,
        history_override: Option<&str>,
    ) -> Result<Option<Arc<ChainConnection>>, ConnectError> {
        let Some(endpoint) = self.storage.get(ENDPOINT_KEY) else {
            return Ok(None);
        };
        let name = self.storage.get(CHAIN_NAME_KEY);
        let history = history_override
            .or_else(|| find_preset(&endpoint).and_then(|p| p.history_endpoint));
        log::debug!("restoring session {endpoint}");
        self.connect(&endpoint, name.as_deref(), history)
            .await
            .map(Some)
    }
}

/// Trims and checks an endpoint before any state changes.
fn normalize_endpoint(raw: &str) -> Result<String, ConnectError> {
    let trimmed = raw.trim().trim_end_matches('/');
    match url::Url::parse(trimmed) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {
            Ok(trimmed.to_string())
        }
        _ => Err(ConnectError::InvalidEndpoint(raw.trim().to_string())),
    }
}
