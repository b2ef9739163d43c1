// Settings changes behind the /logging command

use poise::serenity_prelude as serenity;

use crate::features::settings_manager::{SettingsError, SettingsManager};
use crate::models::embed::LogEmbed;
use crate::models::event::Event;
use crate::models::guild::GuildSettings;
use crate::utils::sanitizer::validate_format;

fn parse_event(event_type: &str) -> Result<Event, SettingsError> {
    Event::parse(event_type).ok_or_else(|| SettingsError::UnknownEvent(event_type.to_string()))
}

/// Enable logging of `event_type` into `channel`
pub async fn set_channel(
    manager: &SettingsManager,
    guild_id: serenity::GuildId,
    event_type: &str,
    channel: serenity::ChannelId,
) -> Result<GuildSettings, SettingsError> {
    let event = parse_event(event_type)?;

    manager
        .update(guild_id, |settings| {
            let config = settings.loggings.get_mut(event);
            config.enabled = true;
            config.channel = Some(channel);
            Ok(())
        })
        .await
}

/// Store a custom embed template for `event_type`.
///
/// The raw template is stored; placeholders are resolved when rendering.
/// `None` or an empty string clears the customization. Returns the
/// sanitized preview of the new template, if one was set.
pub async fn set_format(
    manager: &SettingsManager,
    guild_id: serenity::GuildId,
    event_type: &str,
    format: Option<String>,
) -> Result<(GuildSettings, Option<LogEmbed>), SettingsError> {
    let event = parse_event(event_type)?;
    let format = format.unwrap_or_default();

    let preview = if format.is_empty() {
        None
    } else {
        Some(validate_format(&format)?)
    };

    let settings = manager
        .update(guild_id, move |settings| {
            settings.loggings.get_mut(event).custom_template = format;
            Ok(())
        })
        .await?;

    Ok((settings, preview))
}
