// Gateway event dispatch: guild lifecycle and member-join logging

use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};

use crate::features::embed_renderer::{compose_member_join, MemberJoinNotice, MemberJoinOccurrence};
use crate::features::settings_manager::SettingsManager;
use crate::models::event::Event;
use crate::models::guild::GuildSettings;
use crate::{Data, Error};

/// Entry point wired into `FrameworkOptions::event_handler`
pub async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!(
                "Connected as {} in {} guild(s)",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
            for guild in &data_about_bot.guilds {
                init_guild(&data.settings, guild.id).await;
            }
        }
        serenity::FullEvent::GuildCreate { guild, is_new } => {
            if *is_new == Some(true) {
                info!("Joined guild {} ({})", guild.name, guild.id);
                init_guild(&data.settings, guild.id).await;
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            log_member_join(ctx, &data.settings, new_member).await;
        }
        _ => {}
    }

    Ok(())
}

/// Make sure a guild has a settings row
async fn init_guild(settings: &SettingsManager, guild_id: serenity::GuildId) {
    match settings.get_or_create(guild_id).await {
        Ok((_, true)) => info!("Created default settings for guild {}", guild_id),
        Ok((_, false)) => {}
        Err(e) => error!("Failed to create settings for guild {}: {:?}", guild_id, e),
    }
}

/// Where the member-join log goes and what it says, or `None` when the guild
/// has no settings or the event is disabled or has no channel.
pub fn plan_member_join(
    settings: Option<&GuildSettings>,
    occurrence: &MemberJoinOccurrence,
) -> Option<(serenity::ChannelId, MemberJoinNotice)> {
    let config = settings?.loggings.get(Event::MemberJoin);
    let channel = config.target_channel()?;
    Some((channel, compose_member_join(config, occurrence)))
}

async fn log_member_join(
    ctx: &serenity::Context,
    settings: &SettingsManager,
    member: &serenity::Member,
) {
    let guild = settings.get(member.guild_id).await;
    let occurrence = MemberJoinOccurrence::from_member(member);
    let Some((channel, notice)) = plan_member_join(guild.as_ref(), &occurrence) else {
        return;
    };

    if notice.warning.is_some() {
        warn!(
            "Custom member join embed for guild {} is malformed, using the default",
            member.guild_id
        );
    }

    if let Err(e) = channel.send_message(&ctx.http, notice.to_message()).await {
        error!(
            "Failed to send member join log to {} in guild {}: {:?}",
            channel, member.guild_id, e
        );
    }
}
