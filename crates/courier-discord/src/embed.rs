//! Embed building — turns a relay `EmbedRequest` into a serenity `CreateEmbed`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serenity::builder::CreateEmbed;
use serenity::model::Timestamp;
use tracing::debug;

use courier_core::types::EmbedRequest;

/// Discord colours are 24-bit RGB; anything above is ignored.
const RGB_MASK: u32 = 0x00FF_FFFF;

/// Convert to a serenity `CreateEmbed` builder.
///
/// Fields keep their input order and inline flags. A timestamp that does
/// not parse is left off the embed rather than failing the send.
pub fn build_embed(req: &EmbedRequest) -> CreateEmbed {
    let mut e = CreateEmbed::new();
    if let Some(ref t) = req.title {
        e = e.title(t);
    }
    if let Some(ref d) = req.description {
        e = e.description(d);
    }
    if let Some(c) = req.color {
        e = e.colour(c & RGB_MASK);
    }
    if let Some(ref raw) = req.timestamp {
        match parse_timestamp(raw) {
            Some(ts) => e = e.timestamp(ts),
            None => debug!(timestamp = %raw, "embed timestamp not ISO-8601, omitted"),
        }
    }
    for field in req.fields.iter().flatten() {
        e = e.field(&field.name, &field.value, field.inline);
    }
    e
}

/// Offset-less ISO-8601 layouts, extended then basic, most precise first.
/// `%.f` also matches when there is no fractional part.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

/// The same layouts with a numeric offset (`+02`, `+0200`, `+02:00`).
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%#z",
];

/// Parse an ISO-8601 timestamp.
///
/// RFC 3339 goes straight through serenity. Otherwise extended and basic
/// forms with minute or second precision are accepted, with `Z`, a numeric
/// offset, or no offset (read as UTC); a bare date is midnight UTC.
/// Fractional seconds are kept.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(ts) = Timestamp::parse(raw) {
        return Some(ts);
    }

    let utc = match raw.strip_suffix(['Z', 'z']) {
        Some(local) => parse_local(local)?,
        None => OFFSET_FORMATS
            .iter()
            .find_map(|f| DateTime::parse_from_str(raw, f).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| parse_local(raw))?,
    };

    Timestamp::parse(&utc.to_rfc3339_opts(SecondsFormat::AutoSi, true)).ok()
}

fn parse_local(raw: &str) -> Option<DateTime<Utc>> {
    LOCAL_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
