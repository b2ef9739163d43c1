// Loggable event kinds

use std::fmt;

/// A kind of guild activity that can be logged.
///
/// The string form is what gets stored and what users type into commands,
/// so it must never change once released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    MemberJoin,
}

impl Event {
    /// Every registered event, in display order
    pub const ALL: [Event; 1] = [Event::MemberJoin];

    pub fn as_str(self) -> &'static str {
        match self {
            Event::MemberJoin => "member_join",
        }
    }

    /// Exact lookup against the registered set (no case folding, no prefixes)
    pub fn parse(s: &str) -> Option<Event> {
        Self::ALL.into_iter().find(|event| event.as_str() == s)
    }

    /// Events whose identifier starts with `prefix`, used for autocomplete
    pub fn matching_prefix(prefix: &str) -> impl Iterator<Item = Event> + '_ {
        Self::ALL
            .into_iter()
            .filter(move |event| event.as_str().starts_with(prefix))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
