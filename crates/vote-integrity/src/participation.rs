//! Participation: posting a participant card into a channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{ChannelId, ParticipantPost, ParticipantProfile, VoteAction, VoteButton};
use crate::error::VoteResult;
use crate::ports::inbound::ParticipationApi;
use crate::ports::outbound::{MessagingPlatform, OperationalLog, ParticipantRegistry};

/// Text of a participant card.
pub fn render_card(profile: &ParticipantProfile) -> String {
    format!(
        "❖ Participant details ❖\n\n\
         ▶ User: {}\n\
         ▶ User ID: {}\n\
         ▶ Username: {}\n\n\
         ❖ Note: only channel subscribers can vote ❖",
        profile.display_name(),
        profile.user_id,
        profile.username_display()
    )
}

pub struct ParticipationService<R, M, G>
where
    R: ParticipantRegistry,
    M: MessagingPlatform,
    G: OperationalLog,
{
    registry: Arc<R>,
    platform: Arc<M>,
    log: Arc<G>,
    emoji: String,
}

impl<R, M, G> ParticipationService<R, M, G>
where
    R: ParticipantRegistry,
    M: MessagingPlatform,
    G: OperationalLog,
{
    pub fn new(registry: Arc<R>, platform: Arc<M>, log: Arc<G>, emoji: impl Into<String>) -> Self {
        Self {
            registry,
            platform,
            log,
            emoji: emoji.into(),
        }
    }
}

#[async_trait]
impl<R, M, G> ParticipationApi for ParticipationService<R, M, G>
where
    R: ParticipantRegistry,
    M: MessagingPlatform,
    G: OperationalLog,
{
    async fn participate(
        &self,
        channel: &ChannelId,
        profile: &ParticipantProfile,
    ) -> VoteResult<ParticipantPost> {
        let mut post = self.registry.create_post(channel, profile.user_id).await?;

        let action = VoteAction::new(channel.clone(), post.post_id.clone());
        let button = VoteButton::render(&self.emoji, &action, 0)?;

        let message_ref = match self
            .platform
            .send_message(channel, &render_card(profile), &button)
            .await
        {
            Ok(message_ref) => message_ref,
            Err(err) => {
                warn!(
                    post_id = %post.post_id,
                    channel = %channel,
                    error = %err,
                    "Participant card could not be posted"
                );
                return Err(err.into());
            }
        };

        self.registry
            .attach_message_ref(&post.post_id, message_ref)
            .await?;
        post.channel_message_ref = Some(message_ref);

        info!(
            post_id = %post.post_id,
            channel = %channel,
            participant = %profile.user_id,
            message_ref = %message_ref,
            "Participant card posted"
        );

        self.log
            .publish(&format!(
                "New participant in {}: {} ({}), id {}, post {}",
                channel,
                profile.display_name(),
                profile.username_display(),
                profile.user_id,
                post.post_id
            ))
            .await;

        Ok(post)
    }
}
