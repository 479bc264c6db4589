//! Membership oracle backed by the messaging platform.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{ChannelId, UserId};
use crate::error::LookupError;
use crate::ports::outbound::{MembershipOracle, MessagingPlatform};

/// Maps the platform's membership status to a qualifying flag.
pub struct PlatformMembershipOracle<M: MessagingPlatform> {
    platform: Arc<M>,
}

impl<M: MessagingPlatform> PlatformMembershipOracle<M> {
    pub fn new(platform: Arc<M>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl<M: MessagingPlatform> MembershipOracle for PlatformMembershipOracle<M> {
    async fn is_qualifying(
        &self,
        user: UserId,
        channel: &ChannelId,
    ) -> Result<bool, LookupError> {
        let status = self.platform.get_membership(channel, user).await?;
        debug!(user_id = %user, channel = %channel, ?status, "Membership lookup");
        Ok(status.is_qualifying())
    }
}
