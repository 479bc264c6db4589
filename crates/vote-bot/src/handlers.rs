//! # Update Handlers
//!
//! Routes Bot API updates to the core:
//! - callback `v:<channel>:<post_id>` → [`VoteApi::cast_vote`], answered with an alert
//! - `/participate @channel` in a private chat → [`ParticipationApi::participate`]
//! - `/start`, `/help` → fixed help text

use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message, User};

use vote_integrity::ports::inbound::{ParticipationApi, VoteApi};
use vote_integrity::{
    ChannelId, ParticipantProfile, RejectReason, UserId, VoteAction, VoteOutcome, VoteResult,
};
use vote_telemetry::logging::COMPONENT_BOT;
use vote_telemetry::{log_event, log_vote_event, PARTICIPATIONS, VOTE_CASTS};

pub const HELP_TEXT: &str = "❖ Channel vote bot ❖\n\n\
    How to use:\n\
    1. Add the bot to your channel as an admin\n\
    2. Send /participate @yourchannel here\n\
    3. The bot posts your card with a vote button in the channel\n\n\
    Only channel subscribers can vote, and a vote is removed when the voter leaves.\n\n\
    Commands:\n\
    /participate @channel - post your participant card\n\
    /help - show this message";

pub const PARTICIPATE_USAGE: &str = "Usage: /participate @channel";

/// Text commands understood in private chats.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// Argument as typed, if any.
    Participate(Option<String>),
}

/// Parse a command message. Accepts the `/cmd@BotName` form.
pub fn parse_command(text: &str) -> Option<Command> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?.strip_prefix('/')?;
    let name = head.split('@').next().unwrap_or(head);

    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        "participate" => Some(Command::Participate(parts.next().map(str::to_string))),
        _ => None,
    }
}

/// Alert text answering a vote click.
pub fn vote_answer(result: &VoteResult<VoteOutcome>) -> &'static str {
    match result {
        Ok(VoteOutcome::Accepted { .. }) => "✅ Vote counted! Thank you for voting.",
        Ok(VoteOutcome::Rejected(RejectReason::DuplicateVote)) => {
            "❌ You have already voted for this participant!"
        }
        Ok(VoteOutcome::Rejected(RejectReason::NotSubscribed)) => {
            "❌ You must be subscribed to the required channels to vote!"
        }
        Ok(VoteOutcome::Rejected(RejectReason::InvalidTarget)) => "❌ Invalid vote data!",
        Err(_) => "❌ Error processing vote. Please try again.",
    }
}

/// Outcome label for `vote_casts_total`.
pub fn vote_metric_label(result: &VoteResult<VoteOutcome>) -> &'static str {
    match result {
        Ok(outcome) => outcome.label(),
        Err(_) => "error",
    }
}

pub fn profile_from_user(user: &User) -> ParticipantProfile {
    ParticipantProfile {
        user_id: UserId(user.id.0),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
    }
}

/// Shared handler dependencies.
pub struct AppState {
    pub votes: Arc<dyn VoteApi>,
    pub participation: Arc<dyn ParticipationApi>,
}

impl AppState {
    pub fn new(votes: Arc<dyn VoteApi>, participation: Arc<dyn ParticipationApi>) -> Self {
        Self {
            votes,
            participation,
        }
    }
}

/// Update routing tree.
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(
            |bot: Bot, state: Arc<AppState>, msg: Message| async move {
                handle_message(&bot, &state, &msg).await
            },
        ))
        .branch(Update::filter_callback_query().endpoint(
            |bot: Bot, state: Arc<AppState>, q: CallbackQuery| async move {
                handle_callback_query(&bot, &state, q).await
            },
        ))
}

async fn handle_message(bot: &Bot, state: &AppState, msg: &Message) -> anyhow::Result<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(command) = msg.text().and_then(parse_command) else {
        return Ok(());
    };

    match command {
        Command::Start | Command::Help => {
            bot.send_message(msg.chat.id, HELP_TEXT).await?;
        }
        Command::Participate(None) => {
            bot.send_message(msg.chat.id, PARTICIPATE_USAGE).await?;
        }
        Command::Participate(Some(raw)) => {
            let Some(user) = msg.from.as_ref() else {
                return Ok(());
            };
            let reply = participate(state, &raw, &profile_from_user(user)).await;
            bot.send_message(msg.chat.id, reply).await?;
        }
    }
    Ok(())
}

/// Run a participation request and build the reply text.
pub async fn participate(state: &AppState, raw_channel: &str, profile: &ParticipantProfile) -> String {
    let channel = match ChannelId::new(raw_channel) {
        Ok(channel) => channel,
        Err(_) => return format!("❌ {raw_channel} is not a valid channel username.\n{PARTICIPATE_USAGE}"),
    };

    match state.participation.participate(&channel, profile).await {
        Ok(post) => {
            PARTICIPATIONS.with_label_values(&["posted"]).inc();
            log_event!(
                info,
                COMPONENT_BOT,
                "Participant card posted",
                user_id = %profile.user_id,
                channel = %channel,
                post_id = %post.post_id
            );
            format!(
                "✅ Successfully participated in {channel}!\n\nYour card is posted; share the channel with your audience."
            )
        }
        Err(e) => {
            PARTICIPATIONS.with_label_values(&["failed"]).inc();
            log_event!(
                warn,
                COMPONENT_BOT,
                "Participation failed",
                user_id = %profile.user_id,
                channel = %channel,
                error = %e
            );
            format!(
                "❌ Could not post your card in {channel}. Make sure the bot is an admin there and try again."
            )
        }
    }
}

async fn handle_callback_query(bot: &Bot, state: &AppState, q: CallbackQuery) -> anyhow::Result<()> {
    let Some(data) = q.data.as_deref() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let action = match VoteAction::decode(data) {
        Ok(Some(action)) => action,
        Ok(None) => {
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
        Err(e) => {
            log_event!(debug, COMPONENT_BOT, "Malformed vote callback", data = data, error = %e);
            bot.answer_callback_query(q.id)
                .text(vote_answer(&Ok(VoteOutcome::Rejected(RejectReason::InvalidTarget))))
                .show_alert(true)
                .await?;
            return Ok(());
        }
    };

    let voter = UserId(q.from.id.0);
    let result = state
        .votes
        .cast_vote(voter, &action.channel, &action.post_id)
        .await;

    VOTE_CASTS
        .with_label_values(&[vote_metric_label(&result)])
        .inc();
    match &result {
        Ok(outcome) => log_vote_event!(
            info,
            "Vote processed",
            voter,
            action.channel,
            action.post_id,
            outcome = outcome.label()
        ),
        Err(e) => log_vote_event!(
            error,
            "Vote failed",
            voter,
            action.channel,
            action.post_id,
            error = %e
        ),
    }

    bot.answer_callback_query(q.id)
        .text(vote_answer(&result))
        .show_alert(true)
        .await?;
    Ok(())
}
