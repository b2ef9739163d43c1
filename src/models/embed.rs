// Structured embed data parsed from user templates

use poise::serenity_prelude as serenity;
use serde::Deserialize;

/// Error raised when a template is not valid embed data
#[derive(Debug, thiserror::Error)]
#[error("invalid embed format: {0}")]
pub struct TemplateError(#[from] serde_json::Error);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbedMedia {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Embed body as accepted in a custom template (Discord's embed JSON shape).
/// Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogEmbed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    #[serde(alias = "colour")]
    pub color: Option<u32>,
    pub timestamp: Option<serenity::Timestamp>,
    pub footer: Option<EmbedFooter>,
    pub image: Option<EmbedMedia>,
    pub thumbnail: Option<EmbedMedia>,
    pub author: Option<EmbedAuthor>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

impl LogEmbed {
    /// Parse embed JSON
    pub fn parse(json: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert into serenity's embed builder
    pub fn to_create_embed(&self) -> serenity::CreateEmbed {
        let mut embed = serenity::CreateEmbed::new();

        if let Some(title) = &self.title {
            embed = embed.title(title);
        }
        if let Some(description) = &self.description {
            embed = embed.description(description);
        }
        if let Some(url) = &self.url {
            embed = embed.url(url);
        }
        if let Some(color) = self.color {
            embed = embed.colour(color);
        }
        if let Some(timestamp) = self.timestamp {
            embed = embed.timestamp(timestamp);
        }
        if let Some(footer) = &self.footer {
            let mut create = serenity::CreateEmbedFooter::new(&footer.text);
            if let Some(icon_url) = &footer.icon_url {
                create = create.icon_url(icon_url);
            }
            embed = embed.footer(create);
        }
        if let Some(image) = &self.image {
            embed = embed.image(&image.url);
        }
        if let Some(thumbnail) = &self.thumbnail {
            embed = embed.thumbnail(&thumbnail.url);
        }
        if let Some(author) = &self.author {
            let mut create = serenity::CreateEmbedAuthor::new(&author.name);
            if let Some(url) = &author.url {
                create = create.url(url);
            }
            if let Some(icon_url) = &author.icon_url {
                create = create.icon_url(icon_url);
            }
            embed = embed.author(create);
        }

        embed.fields(
            self.fields
                .iter()
                .map(|field| (field.name.clone(), field.value.clone(), field.inline)),
        )
    }
}
