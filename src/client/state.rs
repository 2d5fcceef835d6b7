//! Module `state`
//!
//! Defines `ClientState`, the station identity the relay knows for one
//! connected client.

use crate::protocol::messages::StationAnnouncement;

/// Station name, band and mode last announced by a client.
///
/// Starts empty and is only filled in by station announcements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    station: Option<String>,
    band: Option<String>,
    mode: Option<String>,
}

impl ClientState {
    /// Merges the non-empty fields of `announcement`.
    ///
    /// A field that is missing or blank in the announcement keeps its
    /// previous value.
    pub fn apply(&mut self, announcement: &StationAnnouncement) {
        merge(&mut self.station, &announcement.station);
        merge(&mut self.band, &announcement.band);
        merge(&mut self.mode, &announcement.mode);
    }

    pub fn station(&self) -> Option<&str> {
        self.station.as_deref()
    }

    pub fn band(&self) -> Option<&str> {
        self.band.as_deref()
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }
}

fn merge(current: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming.as_deref().map(str::trim) {
        if !value.is_empty() {
            *current = Some(value.to_string());
        }
    }
}
