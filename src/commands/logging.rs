// /logging command - per-guild log settings

use poise::serenity_prelude as serenity;
use tracing::{error, info};

use crate::features::log_settings;
use crate::features::settings_manager::SettingsError;
use crate::models::event::Event;
use crate::utils::config::colors;
use crate::{Context, Error};

/// Log settings
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    description_localized("ja", "ログ設定"),
    subcommands("set_channel", "set_format")
)]
pub async fn logging(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Set the log channel
#[poise::command(
    slash_command,
    guild_only,
    rename = "set-channel",
    description_localized("ja", "ログチャンネルを設定します")
)]
pub async fn set_channel(
    ctx: Context<'_>,
    #[rename = "type"]
    #[description = "Event type e.g. member_join"]
    #[description_localized("ja", "イベントの種類 例: member_join")]
    #[autocomplete = "autocomplete_event"]
    event_type: String,
    #[description = "Channel to log into (defaults to this channel)"]
    #[description_localized("ja", "設定するチャンネル")]
    channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say("This command can only be used in a server.").await?;
        return Ok(());
    };

    let channel_id = channel.map(|c| c.id()).unwrap_or_else(|| ctx.channel_id());

    match log_settings::set_channel(&ctx.data().settings, guild_id, &event_type, channel_id).await {
        Ok(_) => {
            info!("Guild {}: {} logs go to {}", guild_id, event_type, channel_id);
            let embed = serenity::CreateEmbed::new()
                .title("Log Channel Updated")
                .description(format!("**{}** logs will be posted in <#{}>", event_type, channel_id))
                .color(colors::SUCCESS);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(e) => reply_error(ctx, guild_id, e).await?,
    }

    Ok(())
}

/// Set the log format
#[poise::command(
    slash_command,
    guild_only,
    rename = "set-format",
    description_localized("ja", "ログのフォーマットを設定します")
)]
pub async fn set_format(
    ctx: Context<'_>,
    #[rename = "type"]
    #[description = "Event type e.g. member_join"]
    #[description_localized("ja", "イベントの種類 例: member_join")]
    #[autocomplete = "autocomplete_event"]
    event_type: String,
    #[description = "Embed JSON to use (leave empty for the default embed)"]
    #[description_localized("ja", "設定するフォーマット(埋め込みjson)")]
    format: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say("This command can only be used in a server.").await?;
        return Ok(());
    };

    match log_settings::set_format(&ctx.data().settings, guild_id, &event_type, format).await {
        Ok((_, preview)) => {
            info!("Guild {}: {} format updated", guild_id, event_type);
            let mut reply = poise::CreateReply::default().content(match preview {
                Some(_) => "Log format updated. Preview:",
                None => "Log format reset to the default embed.",
            });
            if let Some(preview) = preview {
                reply = reply.embed(preview.to_create_embed());
            }
            ctx.send(reply).await?;
        }
        Err(e) => reply_error(ctx, guild_id, e).await?,
    }

    Ok(())
}

/// Translate a settings failure into a user-facing message
fn error_message(e: &SettingsError) -> &'static str {
    match e {
        SettingsError::UnknownEvent(_) => "Error: not a valid event type.",
        SettingsError::InvalidFormat(_) => "Error: the format is not valid embed JSON.",
        SettingsError::Store(_) => "Error: failed to save the settings. Please try again later.",
    }
}

async fn reply_error(ctx: Context<'_>, guild_id: serenity::GuildId, e: SettingsError) -> Result<(), Error> {
    if let SettingsError::Store(_) = e {
        error!("Failed to save settings for guild {}: {:?}", guild_id, e);
    }

    let embed = serenity::CreateEmbed::new()
        .description(error_message(&e))
        .color(colors::ERROR);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Autocomplete for event types
async fn autocomplete_event<'a>(
    _ctx: Context<'a>,
    partial: &'a str,
) -> impl Iterator<Item = String> + 'a {
    Event::matching_prefix(partial).map(|event| event.to_string())
}
