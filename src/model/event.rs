use crate::model::{FilterKey, LedgerDate};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};

/// One event worksheet to create: a date, and in the venue-keyed layout, a venue.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    venue: Option<String>,
    date: LedgerDate,
    /// The date exactly as the user wrote it, used for titles.
    date_label: String,
}

impl EventEntry {
    pub fn new(venue: Option<String>, date_label: impl Into<String>) -> anyhow::Result<Self> {
        let date_label = date_label.into().trim().to_string();
        let date = LedgerDate::parse_event(&date_label)?;
        if let Some(v) = &venue {
            ensure!(!v.is_empty(), "The venue for {date_label} is empty");
            ensure!(
                !v.contains(['\'', '"']),
                "The venue '{v}' contains a quote character"
            );
        }
        Ok(Self {
            venue,
            date,
            date_label,
        })
    }

    pub fn venue(&self) -> Option<&str> {
        self.venue.as_deref()
    }

    pub fn date(&self) -> LedgerDate {
        self.date
    }

    /// The short worksheet title: the venue if there is one, otherwise the date.
    pub fn label(&self) -> &str {
        self.venue.as_deref().unwrap_or(&self.date_label)
    }

    /// The title written into the worksheet's title cell, e.g. `HORUS 2025-05-22` or
    /// `HORUS Москва 2025-05-22`.
    pub fn composite_title(&self, artist: &str) -> String {
        match &self.venue {
            Some(venue) => format!("{artist} {venue} {}", self.date_label),
            None => format!("{artist} {}", self.date_label),
        }
    }
}

/// A parsed event payload such as `HORUS,2025-05-22,2025-05-23` or
/// `HORUS,Москва:2025-05-22,Казань:2025-05-23`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventRequest {
    pub artist: String,
    pub entries: Vec<EventEntry>,
}

impl EventRequest {
    pub fn parse(payload: &str, filter_key: FilterKey) -> anyhow::Result<Self> {
        let mut tokens = payload.split(',').map(str::trim);
        let artist = tokens.next().unwrap_or_default();
        ensure!(!artist.is_empty(), "The artist name is empty");
        ensure!(
            !artist.contains(['\'', '"']),
            "The artist name '{artist}' contains a quote character"
        );

        let mut entries = Vec::new();
        for token in tokens.filter(|t| !t.is_empty()) {
            let entry = match filter_key {
                FilterKey::Date => EventEntry::new(None, token),
                FilterKey::Venue => match token.split_once(':') {
                    Some((venue, date)) => EventEntry::new(Some(venue.trim().to_string()), date),
                    None => bail!("Expected city:date, got '{token}'"),
                },
            }
            .with_context(|| format!("Invalid event '{token}'"))?;
            entries.push(entry);
        }
        ensure!(!entries.is_empty(), "No event dates were given for {artist}");

        Ok(Self {
            artist: artist.to_string(),
            entries,
        })
    }
}
