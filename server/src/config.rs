//! Runtime configuration collected from the environment.

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_EVENT_BUFFER: usize = 256;
const DEFAULT_AI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// HS256 secret for the `accessToken` cookie issued by the auth service.
    pub jwt_secret: String,
    /// Capacity of each connection's outbound event queue.
    pub event_buffer: usize,
    /// Model identifier passed to the generative backend.
    pub ai_model: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            jwt_secret: std::env::var("DRIFTCHAT_JWT_SECRET")
                .unwrap_or_else(|_| "driftchat-dev-secret".to_string()),
            event_buffer: std::env::var("EVENT_BUFFER_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_EVENT_BUFFER),
            ai_model: std::env::var("DRIFTCHAT_AI_MODEL")
                .unwrap_or_else(|_| DEFAULT_AI_MODEL.to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            jwt_secret: "driftchat-dev-secret".to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            ai_model: DEFAULT_AI_MODEL.to_string(),
        }
    }
}
