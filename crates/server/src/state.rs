//! Application State
//!
//! Shared state across all handlers. Every external dependency (agent
//! connector, knowledge retriever, telephony API) is injected here so the
//! router can be exercised with fakes.

use serde_json::Value;
use std::sync::Arc;

use voice_bridge_config::Settings;
use voice_bridge_core::KnowledgeRetriever;
use voice_bridge_rag::{StaticRetriever, VectorStore};
use voice_bridge_relay::{CallRelayConfig, InstructionComposer};

use crate::agent_client::{AgentConnector, WebSocketAgentConnector};
use crate::sessions::SessionRegistry;
use crate::twilio::OutboundCaller;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub relay_config: CallRelayConfig,
    pub connector: Arc<dyn AgentConnector>,
    pub retriever: Arc<dyn KnowledgeRetriever>,
    pub composer: Arc<InstructionComposer>,
    pub sessions: Arc<SessionRegistry>,
    /// Absent without telephony credentials
    pub caller: Option<Arc<dyn OutboundCaller>>,
    /// Checked by the readiness probe when retrieval is enabled
    pub vector_store: Option<Arc<VectorStore>>,
}

impl AppState {
    /// State with the websocket agent connector, no knowledge base and no
    /// outbound calling
    pub fn new(config: Settings, agent_settings: Option<Value>) -> Self {
        let relay_config = CallRelayConfig::from_settings(&config.relay, agent_settings);
        let connector = Arc::new(WebSocketAgentConnector::from_config(&config.agent));
        let composer = Arc::new(InstructionComposer::new(&config.persona));

        Self {
            config: Arc::new(config),
            relay_config,
            connector,
            retriever: Arc::new(StaticRetriever),
            composer,
            sessions: Arc::new(SessionRegistry::new()),
            caller: None,
            vector_store: None,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn AgentConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn KnowledgeRetriever>) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_composer(mut self, composer: InstructionComposer) -> Self {
        self.composer = Arc::new(composer);
        self
    }

    pub fn with_caller(mut self, caller: Arc<dyn OutboundCaller>) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_vector_store(mut self, store: Arc<VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }
}
