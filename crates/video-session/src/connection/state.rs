/// Lifecycle of a managed video session.
///
/// ```text
/// Idle --establish--> Connecting --ok--> Connected --teardown--> Idle
///                      |    ^
///                      |    | retry (fixed delay, bounded)
///                      +----+
///                      |
///                      +--exhausted / fatal--> Failed
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Idle,
    /// `attempt` is 1-based.
    Connecting { attempt: u32 },
    Connected { user_id: String },
    /// Terminal until the next establish; `message` is what gets rendered.
    Failed { message: String },
}

impl ConnectionState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting { .. } => "connecting",
            ConnectionState::Connected { .. } => "connected",
            ConnectionState::Failed { .. } => "failed",
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}
