use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Config;
use crate::feedback::FeedbackBus;
use crate::gateway::{BusyControl, RequestGateway, Transport};
use crate::store::SqliteStore;
use crate::throttle::AttemptThrottle;
use crate::views::Views;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub gateway: RequestGateway,
    pub throttle: Option<AttemptThrottle>,
    pub views: Views,
    pub bus: FeedbackBus,
    pub controls: HashMap<String, BusyControl>,
}

impl AppState {
    pub fn new(config: Config, transport: Box<dyn Transport>) -> anyhow::Result<Self> {
        let mut gateway = RequestGateway::new(&config.origin, transport)?;
        gateway.set_token(config.token.clone());
        let mut state = Self {
            config,
            workspace: None,
            gateway,
            throttle: None,
            views: Views::default(),
            bus: FeedbackBus::default(),
            controls: HashMap::new(),
        };
        if let Some(ws) = state.config.workspace.clone() {
            state.open_workspace(ws)?;
        }
        Ok(state)
    }

    pub fn open_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let store = SqliteStore::open(&path)?;
        tracing::info!(workspace = %store.workspace().display(), "workspace opened");
        self.throttle = Some(AttemptThrottle::new(
            self.config.max_attempts,
            Box::new(store),
        ));
        self.workspace = Some(path);
        Ok(())
    }
}
