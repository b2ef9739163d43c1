use poise::serenity_prelude as serenity;

use crate::models::event::Event;

/// Per-event logging configuration.
///
/// `channel` and `custom_template` only mean something while `enabled` is set.
/// An empty template always means "use the default embed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventConfig {
    pub enabled: bool,
    pub channel: Option<serenity::ChannelId>,
    pub custom_template: String,
}

impl EventConfig {
    /// Channel to post into, if this event should be logged at all
    pub fn target_channel(&self) -> Option<serenity::ChannelId> {
        if self.enabled {
            self.channel
        } else {
            None
        }
    }

    pub fn has_custom_template(&self) -> bool {
        !self.custom_template.is_empty()
    }
}

/// One `EventConfig` per registered event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Loggings {
    pub member_join: EventConfig,
}

impl Loggings {
    pub fn get(&self, event: Event) -> &EventConfig {
        match event {
            Event::MemberJoin => &self.member_join,
        }
    }

    pub fn get_mut(&mut self, event: Event) -> &mut EventConfig {
        match event {
            Event::MemberJoin => &mut self.member_join,
        }
    }
}

/// Logging settings of a single guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSettings {
    id: serenity::GuildId,
    pub loggings: Loggings,
}

impl GuildSettings {
    /// Settings for a newly seen guild: every event disabled
    pub fn new(id: serenity::GuildId) -> Self {
        Self {
            id,
            loggings: Loggings::default(),
        }
    }

    pub fn id(&self) -> serenity::GuildId {
        self.id
    }
}

/// Persisted shape: one flattened row per guild, one column group per event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildSettingsRecord {
    pub guild_id: u64,
    pub member_join_enabled: bool,
    pub member_join_channel: u64,
    pub member_join_format: String,
}

impl From<&GuildSettings> for GuildSettingsRecord {
    fn from(settings: &GuildSettings) -> Self {
        let member_join = &settings.loggings.member_join;
        Self {
            guild_id: settings.id.get(),
            member_join_enabled: member_join.enabled,
            member_join_channel: member_join.channel.map(|c| c.get()).unwrap_or(0),
            member_join_format: member_join.custom_template.clone(),
        }
    }
}

impl GuildSettingsRecord {
    /// Map a stored row back to settings. Returns `None` for a zero guild id.
    pub fn into_settings(self) -> Option<GuildSettings> {
        if self.guild_id == 0 {
            return None;
        }

        Some(GuildSettings {
            id: serenity::GuildId::new(self.guild_id),
            loggings: Loggings {
                member_join: EventConfig {
                    enabled: self.member_join_enabled,
                    channel: (self.member_join_channel != 0)
                        .then(|| serenity::ChannelId::new(self.member_join_channel)),
                    custom_template: self.member_join_format,
                },
            },
        })
    }
}
