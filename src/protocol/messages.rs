//! Typed message views
//!
//! Real clients send both the closed form `<BAMS><STATION>A</STATION></BAMS>`
//! and the open form `<BAMS><STATION>A</STATION>`. Fields are looked up in the
//! parent tag's value first and at the top level second, so both read the same.

use crate::protocol::tags::{Tags, parse_tags, tag_values};

pub const STATION_ANNOUNCEMENT: &str = "BAMS";
pub const STATION: &str = "STATION";
pub const BAND: &str = "BAND";
pub const MODE: &str = "MODE";

pub const NETWORK_CONTROL: &str = "NTWK";
pub const OPEN: &str = "OPEN";
pub const CHECK: &str = "CHECK";
pub const TRANSACTION: &str = "TRANSACTION";
pub const FROM: &str = "FROM";
pub const XML_DATA: &str = "XMLDATA";
pub const FIELD_CALL: &str = "FLDCALL";
pub const FIELD_BAND: &str = "FLDBAND";
pub const FIELD_MODE: &str = "FLDMODE";

pub const ROSTER_QUERY: &str = "WHO";

pub const CHAT: &str = "MESG";
pub const TO: &str = "TO";
pub const MESSAGE_TEXT: &str = "MSGTXT";

pub const CLOCK_SYNC: &str = "SCLK";

pub const GREETING: &str = "HELLO";
pub const GREETING_TEXT: &str = "N3FJP Compatible Server";

/// Fields of a tag, read from its own value first and the message top level second.
struct Scope<'a> {
    inner: Tags,
    outer: &'a Tags,
}

impl<'a> Scope<'a> {
    fn of(tags: &'a Tags, parent: &str) -> Self {
        Self {
            inner: tags.nested(parent),
            outer: tags,
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.inner.contains(name) || self.outer.contains(name)
    }

    fn text(&self, name: &str) -> Option<String> {
        self.inner
            .text(name)
            .or_else(|| self.outer.text(name))
            .map(str::to_string)
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.inner.value(name).or_else(|| self.outer.value(name))
    }
}

/// Band/mode identity broadcast by a station.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationAnnouncement {
    pub station: Option<String>,
    pub band: Option<String>,
    pub mode: Option<String>,
}

impl StationAnnouncement {
    pub fn from_tags(tags: &Tags) -> Option<Self> {
        if !tags.contains(STATION_ANNOUNCEMENT) {
            return None;
        }
        let scope = Scope::of(tags, STATION_ANNOUNCEMENT);
        Some(Self {
            station: scope.text(STATION),
            band: scope.text(BAND),
            mode: scope.text(MODE),
        })
    }
}

/// Log-entry fields carried in a transaction's structured data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEntry {
    pub call: Option<String>,
    pub band: Option<String>,
    pub mode: Option<String>,
}

impl LogEntry {
    pub fn parse(xml_data: &str) -> Self {
        let fields = parse_tags(xml_data);
        Self {
            call: fields.text(FIELD_CALL).map(str::to_string),
            band: fields.text(FIELD_BAND).map(str::to_string),
            mode: fields.text(FIELD_MODE).map(str::to_string),
        }
    }
}

/// A log-entry add/update/delete event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    /// `ADD`, `UPDATE`, `DELETE` or whatever the client sent.
    pub kind: Option<String>,
    pub from: Option<String>,
    pub entry: Option<LogEntry>,
}

impl Transaction {
    /// Line written to the capture log for this event.
    pub fn summary(&self) -> String {
        let kind = self.kind.as_deref().unwrap_or("UNKNOWN");
        match &self.entry {
            Some(entry) => format!(
                "TRANSACTION {}: {} {}m {}",
                kind,
                entry.call.as_deref().unwrap_or("?"),
                entry.band.as_deref().unwrap_or("?"),
                entry.mode.as_deref().unwrap_or("?"),
            ),
            None => format!("TRANSACTION {}", kind),
        }
    }
}

/// Sub-indicators of a network-control message; several may be set at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkControl {
    pub open: bool,
    pub check: bool,
    pub transaction: Option<Transaction>,
}

impl NetworkControl {
    pub fn from_tags(tags: &Tags) -> Option<Self> {
        if !tags.contains(NETWORK_CONTROL) {
            return None;
        }
        let scope = Scope::of(tags, NETWORK_CONTROL);

        let transaction = scope.contains(TRANSACTION).then(|| Transaction {
            kind: scope.text(TRANSACTION),
            from: scope.text(FROM),
            entry: scope.value(XML_DATA).map(LogEntry::parse),
        });

        Some(Self {
            open: scope.contains(OPEN),
            check: scope.contains(CHECK),
            transaction,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatMessage {
    pub to: Option<String>,
    pub from: Option<String>,
    pub text: Option<String>,
}

impl ChatMessage {
    pub fn from_tags(tags: &Tags) -> Option<Self> {
        if !tags.contains(CHAT) {
            return None;
        }
        let scope = Scope::of(tags, CHAT);
        Some(Self {
            to: scope.text(TO),
            from: scope.text(FROM),
            text: scope.value(MESSAGE_TEXT).map(str::to_string),
        })
    }
}

/// Timestamp pushed by a client. Fields that are missing or not numeric stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockSync {
    pub year: Option<u32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
    pub millisecond: Option<u32>,
}

impl ClockSync {
    pub fn from_tags(tags: &Tags) -> Option<Self> {
        if !tags.contains(CLOCK_SYNC) {
            return None;
        }
        let scope = Scope::of(tags, CLOCK_SYNC);
        let number = |name: &str| scope.text(name).and_then(|v| v.parse().ok());
        Some(Self {
            year: number("YEAR"),
            month: number("MONTH"),
            day: number("DAY"),
            hour: number("HOUR"),
            minute: number("MINUTE"),
            second: number("SECOND"),
            millisecond: number("MILLISECOND"),
        })
    }
}

/// Body sent unprompted to every new connection.
pub fn greeting() -> String {
    format!("<{0}>{1}<{0}>", GREETING, GREETING_TEXT)
}

/// Body acknowledging a network-control indicator such as [`CHECK`].
pub fn acknowledgement(indicator: &str) -> String {
    format!("<{}><{}>", NETWORK_CONTROL, indicator)
}

/// Body answering a roster query.
pub fn roster_reply<S: AsRef<str>>(stations: &[S]) -> String {
    let mut body = format!("<{}>", ROSTER_QUERY);
    for station in stations {
        body.push_str(&format!("<{0}>{1}</{0}>", STATION, station.as_ref()));
    }
    body
}

/// Station names listed in a roster reply.
pub fn parse_roster(body: &str) -> Vec<String> {
    tag_values(body, STATION)
}
