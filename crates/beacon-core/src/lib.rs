pub mod auth;
pub mod events;
pub mod intents;

use beacon_db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub events: events::EventBus,
    pub config: AppConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Cluster label carried in the `_trace` field of every outbound frame.
    pub cluster: String,
    /// Deployment mode label (`dev`, `prod`, ...).
    pub mode: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cluster: "local".to_string(),
            mode: "dev".to_string(),
        }
    }
}

impl AppConfig {
    /// Deployment-identifying string for outbound `_trace` annotations.
    pub fn trace_tag(&self) -> String {
        format!(
            "beacon-{}-gateway-{}-{}",
            self.cluster,
            self.mode,
            std::process::id()
        )
    }
}
