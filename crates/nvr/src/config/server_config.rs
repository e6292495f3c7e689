use crate::config::{default_bind, default_port};

use serde::{Deserialize, Serialize};

/// Control server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the control server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port for the control server.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `bind:port` for the listener.
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
