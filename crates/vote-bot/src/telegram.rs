//! # Telegram Adapters
//!
//! Bot API implementations of the outbound ports: message send/edit and
//! membership lookup ([`TelegramPlatform`]) and the operational log channel
//! ([`TelegramLog`]).

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, Recipient,
    UserId as TgUserId,
};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

use vote_integrity::ports::outbound::{MessagingPlatform, OperationalLog};
use vote_integrity::{
    ChannelId, EditError, LookupError, MembershipStatus, MessageRef, SendError, UserId, VoteButton,
};
use vote_telemetry::BUTTON_REFRESH_FAILURES;

/// Single-button keyboard under a participant card.
pub fn vote_keyboard(button: &VoteButton) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        button.label.clone(),
        button.action.clone(),
    )]])
}

/// Map a Bot API member kind onto the core's membership states.
pub fn membership_from_kind(kind: &ChatMemberKind) -> MembershipStatus {
    if kind.is_owner() {
        MembershipStatus::Owner
    } else if kind.is_administrator() {
        MembershipStatus::Administrator
    } else if let ChatMemberKind::Restricted(restricted) = kind {
        MembershipStatus::Restricted {
            is_member: restricted.is_member,
        }
    } else if kind.is_member() {
        MembershipStatus::Member
    } else if kind.is_banned() {
        MembershipStatus::Banned
    } else {
        MembershipStatus::Left
    }
}

/// Classify a failed `editMessageReplyMarkup` call.
pub fn edit_error_from(err: RequestError) -> EditError {
    match err {
        RequestError::Api(ApiError::MessageNotModified) => EditError::NotModified,
        RequestError::Api(ApiError::MessageToEditNotFound) => EditError::MessageNotFound,
        other => EditError::Platform {
            reason: other.to_string(),
        },
    }
}

fn recipient(channel: &ChannelId) -> Recipient {
    Recipient::ChannelUsername(channel.as_str().to_string())
}

/// Bot API client for channel messages and membership lookups.
#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessagingPlatform for TelegramPlatform {
    async fn send_message(
        &self,
        channel: &ChannelId,
        text: &str,
        button: &VoteButton,
    ) -> Result<MessageRef, SendError> {
        let message = self
            .bot
            .send_message(recipient(channel), text)
            .reply_markup(vote_keyboard(button))
            .await
            .map_err(|e| SendError {
                channel: channel.clone(),
                reason: e.to_string(),
            })?;

        debug!(channel = %channel, message_id = message.id.0, "Participant card sent");
        Ok(MessageRef(message.id.0))
    }

    async fn edit_message_button(
        &self,
        channel: &ChannelId,
        message_ref: MessageRef,
        button: &VoteButton,
    ) -> Result<(), EditError> {
        let result = self
            .bot
            .edit_message_reply_markup(recipient(channel), MessageId(message_ref.0))
            .reply_markup(vote_keyboard(button))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = edit_error_from(err);
                if err != EditError::NotModified {
                    BUTTON_REFRESH_FAILURES.inc();
                }
                Err(err)
            }
        }
    }

    async fn get_membership(
        &self,
        channel: &ChannelId,
        user: UserId,
    ) -> Result<MembershipStatus, LookupError> {
        let member = self
            .bot
            .get_chat_member(recipient(channel), TgUserId(user.0))
            .await
            .map_err(|e| LookupError::new(user, channel.clone(), e.to_string()))?;

        Ok(membership_from_kind(&member.kind))
    }
}

/// Operational log written to a Telegram chat. Silent when no chat is set.
#[derive(Clone)]
pub struct TelegramLog {
    bot: Bot,
    chat_id: Option<ChatId>,
}

impl TelegramLog {
    pub fn new(bot: Bot, chat_id: Option<i64>) -> Self {
        Self {
            bot,
            chat_id: chat_id.map(ChatId),
        }
    }
}

#[async_trait]
impl OperationalLog for TelegramLog {
    async fn publish(&self, text: &str) {
        let Some(chat_id) = self.chat_id else {
            return;
        };
        if let Err(e) = self.bot.send_message(chat_id, text).await {
            warn!(chat_id = chat_id.0, error = %e, "Failed to publish to log channel");
        }
    }
}
