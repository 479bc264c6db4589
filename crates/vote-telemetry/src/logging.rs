//! Structured log helpers.
//!
//! Every event carries a fixed `component` field so log queries can split
//! vote handling from the rest of the bot:
//! - `component`: `voting` or `bot`
//! - `voter_id`, `post_id`, `channel`: vote context where applicable
//! - additional context fields

/// Component name for interactive vote handling.
pub const COMPONENT_VOTING: &str = "voting";

/// Component name for the bot runtime.
pub const COMPONENT_BOT: &str = "bot";

/// Log a structured event with a component field.
#[macro_export]
macro_rules! log_event {
    ($level:ident, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a vote-related event with standard fields.
#[macro_export]
macro_rules! log_vote_event {
    ($level:ident, $msg:expr, $voter_id:expr, $channel:expr, $post_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $crate::logging::COMPONENT_VOTING,
            voter_id = %$voter_id,
            channel = %$channel,
            post_id = %$post_id,
            $($($field)*,)?
            $msg
        )
    };
}
