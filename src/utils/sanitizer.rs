// System placeholder substitution for embed templates

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::embed::{LogEmbed, TemplateError};

/// Avatar shown when no member-specific avatar is available
pub const DEFAULT_AVATAR_URL: &str = "https://cdn.discordapp.com/embed/avatars/0.png";

/// Current UTC time in RFC3339, e.g. `2024-05-01T12:00:00Z`
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Replace the system-level placeholders (`{timestamp}`, `{avatar url}`).
/// Other `{...}` tokens are left as they are.
pub fn sanitize_format(format: &str) -> String {
    sanitize_format_at(format, Utc::now())
}

pub fn sanitize_format_at(format: &str, now: DateTime<Utc>) -> String {
    let timestamp = format_timestamp(now);
    let replaces = [
        ("{timestamp}", timestamp.as_str()),
        ("{avatar url}", DEFAULT_AVATAR_URL),
    ];

    replace_tokens(format, &replaces, str::to_string)
}

/// Single left-to-right pass over `template`. Each known token is replaced by
/// `encode(value)`; substituted text is never scanned again.
pub fn replace_tokens<F>(template: &str, replaces: &[(&str, &str)], encode: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        match replaces.iter().find(|(token, _)| rest.starts_with(*token)) {
            Some(&(token, value)) => {
                out.push_str(&encode(value));
                rest = &rest[token.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Write-time check: the sanitized template must parse as embed data.
/// Returns the parsed preview.
pub fn validate_format(format: &str) -> Result<LogEmbed, TemplateError> {
    LogEmbed::parse(&sanitize_format(format))
}
