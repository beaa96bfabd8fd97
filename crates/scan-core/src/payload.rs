//! Payload builders
//!
//! Produce the canonical strings that [`crate::content::ContentParser`] reads
//! back, so generated codes classify as the type they were built from.

use chrono::{DateTime, Utc};

use crate::content::ParsedContent;

/// Encode structured content as QR payload text
pub fn encode(content: &ParsedContent) -> String {
    match content {
        ParsedContent::Wifi {
            ssid,
            password,
            encryption,
            hidden,
        } => wifi(ssid, password, encryption, *hidden),
        ParsedContent::Contact {
            name,
            phone,
            email,
            address,
            organization,
            title,
            url,
        } => vcard(&ContactCard {
            name,
            phone,
            email,
            address,
            organization,
            title,
            url,
        }),
        ParsedContent::CalendarEvent {
            title,
            description,
            location,
            start_time_ms,
            end_time_ms,
            is_all_day,
        } => event(&EventDraft {
            title,
            description,
            location,
            start_time_ms: *start_time_ms,
            end_time_ms: *end_time_ms,
            is_all_day: *is_all_day,
        }),
        ParsedContent::Email {
            address,
            subject,
            body,
        } => mailto(address, subject, body),
        ParsedContent::Url { url } => url.clone(),
        ParsedContent::GeoLocation {
            latitude,
            longitude,
            query,
        } => geo(*latitude, *longitude, query),
        ParsedContent::Phone { number } => tel(number),
        ParsedContent::Sms { number, message } => sms(number, message),
        ParsedContent::Text { raw } => raw.clone(),
    }
}

/// `WIFI:T:<enc>;S:<ssid>;P:<pass>;H:true;;`. Open networks omit the password.
pub fn wifi(ssid: &str, password: &str, encryption: &str, hidden: bool) -> String {
    let encryption = if encryption.is_empty() { "nopass" } else { encryption };
    let mut out = format!("WIFI:T:{};S:{};", escape_field(encryption), escape_field(ssid));
    if !encryption.eq_ignore_ascii_case("nopass") {
        out.push_str(&format!("P:{};", escape_field(password)));
    }
    if hidden {
        out.push_str("H:true;");
    }
    out.push(';');
    out
}

/// Borrowed contact fields for [`vcard`] and [`mecard`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactCard<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
    pub address: &'a str,
    pub organization: &'a str,
    pub title: &'a str,
    pub url: &'a str,
}

/// vCard 3.0, empty fields omitted
pub fn vcard(card: &ContactCard<'_>) -> String {
    let mut lines = vec!["BEGIN:VCARD".to_string(), "VERSION:3.0".to_string()];
    let fields = [
        ("FN", card.name),
        ("ORG", card.organization),
        ("TITLE", card.title),
        ("TEL", card.phone),
        ("EMAIL", card.email),
        ("ADR", card.address),
        ("URL", card.url),
    ];
    for (key, value) in fields {
        if !value.is_empty() {
            lines.push(format!("{}:{}", key, escape_text(value)));
        }
    }
    lines.push("END:VCARD".to_string());
    lines.join("\n")
}

/// Compact MeCard form
pub fn mecard(card: &ContactCard<'_>) -> String {
    let mut out = String::from("MECARD:");
    let fields = [
        ("N", card.name),
        ("ORG", card.organization),
        ("TITLE", card.title),
        ("TEL", card.phone),
        ("EMAIL", card.email),
        ("ADR", card.address),
        ("URL", card.url),
    ];
    for (key, value) in fields {
        if !value.is_empty() {
            out.push_str(&format!("{}:{};", key, escape_field(value)));
        }
    }
    out.push(';');
    out
}

/// Borrowed event fields for [`event`]
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDraft<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub is_all_day: bool,
}

/// `BEGIN:VEVENT` block; all-day events use `YYYYMMDD` dates, others UTC date-times
pub fn event(draft: &EventDraft<'_>) -> String {
    let mut lines = vec!["BEGIN:VEVENT".to_string()];
    let text_fields = [
        ("SUMMARY", draft.title),
        ("DESCRIPTION", draft.description),
        ("LOCATION", draft.location),
    ];
    for (key, value) in text_fields {
        if !value.is_empty() {
            lines.push(format!("{}:{}", key, escape_text(value)));
        }
    }
    for (key, ms) in [("DTSTART", draft.start_time_ms), ("DTEND", draft.end_time_ms)] {
        if let Some(stamp) = ical_stamp(ms, draft.is_all_day) {
            lines.push(format!("{}:{}", key, stamp));
        }
    }
    lines.push("END:VEVENT".to_string());
    lines.join("\n")
}

/// `mailto:` URI. Values are written verbatim, mirroring the parser which does not decode them.
pub fn mailto(address: &str, subject: &str, body: &str) -> String {
    let params: Vec<String> = [("subject", subject), ("body", body)]
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();

    if params.is_empty() {
        format!("mailto:{}", address)
    } else {
        format!("mailto:{}?{}", address, params.join("&"))
    }
}

pub fn geo(latitude: f64, longitude: f64, query: &str) -> String {
    if query.is_empty() {
        format!("geo:{},{}", latitude, longitude)
    } else {
        format!("geo:{},{}?q={}", latitude, longitude, query)
    }
}

pub fn tel(number: &str) -> String {
    format!("tel:{}", number)
}

/// `SMSTO:<number>:<message>`; the message may contain colons
pub fn sms(number: &str, message: &str) -> String {
    format!("SMSTO:{}:{}", number, message)
}

fn ical_stamp(ms: i64, all_day: bool) -> Option<String> {
    if ms == 0 {
        return None;
    }
    let at = DateTime::<Utc>::from_timestamp_millis(ms)?;
    Some(if all_day {
        at.format("%Y%m%d").to_string()
    } else {
        at.format("%Y%m%dT%H%M%SZ").to_string()
    })
}

/// Backslash-escape the characters reserved by `KEY:value;` formats
fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for c in value.chars() {
        if matches!(c, '\\' | ';' | ',' | '"' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// vCard/iCalendar text escaping
fn escape_text(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{classify, ContentType};

    #[test]
    fn test_wifi_payload() {
        assert_eq!(
            wifi("Home;Net", "p@ss", "WPA", false),
            r"WIFI:T:WPA;S:Home\;Net;P:p@ss;;"
        );
        assert_eq!(wifi("Cafe", "ignored", "", true), "WIFI:T:nopass;S:Cafe;H:true;;");
    }

    #[test]
    fn test_structured_content_survives_encoding() {
        let samples = vec![
            ParsedContent::Wifi {
                ssid: "Lab, 2nd floor".into(),
                password: "a;b:c\\d".into(),
                encryption: "WPA".into(),
                hidden: true,
            },
            ParsedContent::Contact {
                name: "Ada Lovelace".into(),
                phone: "+44 20 7946 0000".into(),
                email: "ada@example.org".into(),
                address: "".into(),
                organization: "Analytical Engines".into(),
                title: "Programmer".into(),
                url: "https://example.org".into(),
            },
            ParsedContent::CalendarEvent {
                title: "Review".into(),
                description: "Quarterly".into(),
                location: "Room 4".into(),
                start_time_ms: 1_710_493_200_000,
                end_time_ms: 1_710_498_600_000,
                is_all_day: false,
            },
            ParsedContent::Email {
                address: "team@example.com".into(),
                subject: "Hello".into(),
                body: "World".into(),
            },
            ParsedContent::Sms {
                number: "+15550100".into(),
                message: "at 10:30".into(),
            },
            ParsedContent::Phone { number: "+15550100".into() },
        ];

        for sample in samples {
            assert_eq!(classify(&encode(&sample)), sample);
        }
    }

    #[test]
    fn test_all_day_event_encoding() {
        let payload = event(&EventDraft {
            title: "Holiday",
            start_time_ms: 1_704_067_200_000,
            is_all_day: true,
            ..Default::default()
        });
        assert!(payload.contains("DTSTART:20240101"));
        assert!(!payload.contains("DTEND"));
        match classify(&payload) {
            ParsedContent::CalendarEvent { is_all_day, .. } => assert!(is_all_day),
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_geo_payload_classifies() {
        let payload = geo(48.8584, 2.2945, "Eiffel Tower");
        assert_eq!(payload, "geo:48.8584,2.2945?q=Eiffel Tower");
        assert_eq!(classify(&payload).content_type(), ContentType::Geo);
    }

    #[test]
    fn test_mecard_payload_classifies_as_contact() {
        let payload = mecard(&ContactCard {
            name: "Grace",
            phone: "555-0100",
            ..Default::default()
        });
        assert_eq!(payload, r"MECARD:N:Grace;TEL:555-0100;;");
        assert_eq!(classify(&payload).content_type(), ContentType::Contact);
    }
}
