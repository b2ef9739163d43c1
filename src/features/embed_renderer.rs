// Embed Renderer - builds the log embed for an event occurrence

use chrono::{DateTime, Utc};
use poise::serenity_prelude::{self as serenity, Mentionable};

use crate::models::embed::{LogEmbed, TemplateError};
use crate::models::guild::EventConfig;
use crate::utils::config::colors;
use crate::utils::sanitizer::{format_timestamp, replace_tokens, DEFAULT_AVATAR_URL};

/// Shown above the default embed when a custom template could not be rendered
pub const MALFORMED_TEMPLATE_WARNING: &str =
    "-# Failed to build the member join message. Fix the custom embed in /logging set-format.";

/// What we know about a member who just joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberJoinOccurrence {
    pub display_name: String,
    pub username: String,
    pub mention: String,
    pub avatar_url: String,
}

impl MemberJoinOccurrence {
    pub fn from_member(member: &serenity::Member) -> Self {
        Self {
            display_name: member.display_name().to_string(),
            username: member.user.name.clone(),
            mention: member.user.mention().to_string(),
            avatar_url: member.user.face(),
        }
    }
}

impl Default for MemberJoinOccurrence {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            username: String::new(),
            mention: String::new(),
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
        }
    }
}

/// Fixed embed used without a custom template, and as the fallback
pub fn default_member_join_embed(occurrence: &MemberJoinOccurrence) -> LogEmbed {
    LogEmbed {
        title: Some("Member joined".to_string()),
        description: Some(occurrence.mention.clone()),
        color: Some(colors::MEMBER_JOIN),
        ..Default::default()
    }
}

/// Render the member-join embed: the default one for an empty template,
/// otherwise the custom template with the member's placeholders filled in.
pub fn render_member_join(
    config: &EventConfig,
    occurrence: &MemberJoinOccurrence,
) -> Result<LogEmbed, TemplateError> {
    render_member_join_at(config, occurrence, Utc::now())
}

pub fn render_member_join_at(
    config: &EventConfig,
    occurrence: &MemberJoinOccurrence,
    now: DateTime<Utc>,
) -> Result<LogEmbed, TemplateError> {
    if !config.has_custom_template() {
        return Ok(default_member_join_embed(occurrence));
    }

    let timestamp = format_timestamp(now);
    let replaces = [
        ("{display name}", occurrence.display_name.as_str()),
        ("{username}", occurrence.username.as_str()),
        ("{mention}", occurrence.mention.as_str()),
        ("{avatar url}", occurrence.avatar_url.as_str()),
        ("{timestamp}", timestamp.as_str()),
    ];

    let rendered = replace_tokens(&config.custom_template, &replaces, escape_json_str);

    LogEmbed::parse(&rendered)
}

/// A rendered member-join message, ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct MemberJoinNotice {
    pub warning: Option<&'static str>,
    pub embed: LogEmbed,
}

/// Never drops the occurrence: a broken template falls back to the default
/// embed with a visible warning.
pub fn compose_member_join(config: &EventConfig, occurrence: &MemberJoinOccurrence) -> MemberJoinNotice {
    match render_member_join(config, occurrence) {
        Ok(embed) => MemberJoinNotice {
            warning: None,
            embed,
        },
        Err(_) => MemberJoinNotice {
            warning: Some(MALFORMED_TEMPLATE_WARNING),
            embed: default_member_join_embed(occurrence),
        },
    }
}

impl MemberJoinNotice {
    pub fn to_message(&self) -> serenity::CreateMessage {
        let mut message = serenity::CreateMessage::new().embed(self.embed.to_create_embed());
        if let Some(warning) = self.warning {
            message = message.content(warning);
        }
        message
    }
}

// Values land inside JSON string literals, so quotes and backslashes in
// member names must not end the string early.
fn escape_json_str(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
