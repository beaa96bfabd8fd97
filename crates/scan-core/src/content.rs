//! Content classification and parsing
//!
//! Decoded text is classified by ordered, case-insensitive checks (first match
//! wins) and then split into fields with a grammar specific to the format:
//!
//! 1. `WIFI:` network credentials
//! 2. vCard or MeCard contact
//! 3. `BEGIN:VEVENT` / `BEGIN:VCALENDAR` event
//! 4. `mailto:` / `MATMSG:` e-mail
//! 5. `geo:` location
//! 6. `sms:` / `SMSTO:` message
//! 7. `tel:` or a bare 7-15 digit number
//! 8. http(s) or `www.` URL
//! 9. anything else is plain text
//!
//! Parsing never fails. Malformed numbers and dates fall back to zero.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("static phone regex must compile"));

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(https?://|www\.)[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,}(?::[0-9]{1,5})?(?:[/?#]\S*)?$",
    )
    .expect("static url regex must compile")
});

/// Keys used by the `KEY:value;` formats (WIFI, MECARD, MATMSG)
const MECARD_KEYS: &[&str] = &[
    "T", "S", "P", "H", "N", "TEL", "EMAIL", "ADR", "ORG", "TITLE", "URL", "NOTE", "TO", "SUB",
    "BODY",
];

static MECARD_FIELDS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    MECARD_KEYS
        .iter()
        .map(|key| {
            let pattern = format!(r"(?i)(?:^|;){}:((?:\\.|[^;\\])*)(?:;|$)", regex::escape(key));
            let re = Regex::new(&pattern).expect("static mecard regex must compile");
            (*key, re)
        })
        .collect()
});

/// Coarse content tag; this is what gets persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Wifi,
    Contact,
    Calendar,
    Email,
    Url,
    Geo,
    Phone,
    Sms,
    Text,
}

impl ContentType {
    pub fn detect(content: &str) -> Self {
        ContentParser::new().parse(content).content_type()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Wifi => "wifi",
            ContentType::Contact => "contact",
            ContentType::Calendar => "calendar",
            ContentType::Email => "email",
            ContentType::Url => "url",
            ContentType::Geo => "geo",
            ContentType::Phone => "phone",
            ContentType::Sms => "sms",
            ContentType::Text => "text",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wifi" => Ok(ContentType::Wifi),
            "contact" => Ok(ContentType::Contact),
            "calendar" => Ok(ContentType::Calendar),
            "email" => Ok(ContentType::Email),
            "url" => Ok(ContentType::Url),
            "geo" => Ok(ContentType::Geo),
            "phone" => Ok(ContentType::Phone),
            "sms" => Ok(ContentType::Sms),
            "text" => Ok(ContentType::Text),
            other => Err(format!("unknown content type '{}'", other)),
        }
    }
}

/// Structured view of decoded text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedContent {
    Wifi {
        ssid: String,
        password: String,
        encryption: String,
        hidden: bool,
    },
    Contact {
        name: String,
        phone: String,
        email: String,
        address: String,
        organization: String,
        title: String,
        url: String,
    },
    CalendarEvent {
        title: String,
        description: String,
        location: String,
        start_time_ms: i64,
        end_time_ms: i64,
        is_all_day: bool,
    },
    Email {
        address: String,
        subject: String,
        body: String,
    },
    Url {
        url: String,
    },
    GeoLocation {
        latitude: f64,
        longitude: f64,
        query: String,
    },
    Phone {
        number: String,
    },
    Sms {
        number: String,
        message: String,
    },
    Text {
        raw: String,
    },
}

impl ParsedContent {
    pub fn content_type(&self) -> ContentType {
        match self {
            ParsedContent::Wifi { .. } => ContentType::Wifi,
            ParsedContent::Contact { .. } => ContentType::Contact,
            ParsedContent::CalendarEvent { .. } => ContentType::Calendar,
            ParsedContent::Email { .. } => ContentType::Email,
            ParsedContent::Url { .. } => ContentType::Url,
            ParsedContent::GeoLocation { .. } => ContentType::Geo,
            ParsedContent::Phone { .. } => ContentType::Phone,
            ParsedContent::Sms { .. } => ContentType::Sms,
            ParsedContent::Text { .. } => ContentType::Text,
        }
    }

    /// One-line human readable description
    pub fn summary(&self) -> String {
        match self {
            ParsedContent::Wifi { ssid, encryption, .. } => format!("WiFi {} ({})", ssid, encryption),
            ParsedContent::Contact { name, phone, .. } if phone.is_empty() => format!("Contact {}", name),
            ParsedContent::Contact { name, phone, .. } => format!("Contact {} <{}>", name, phone),
            ParsedContent::CalendarEvent { title, .. } => format!("Event {}", title),
            ParsedContent::Email { address, subject, .. } if subject.is_empty() => format!("Email {}", address),
            ParsedContent::Email { address, subject, .. } => format!("Email {}: {}", address, subject),
            ParsedContent::Url { url } => format!("Link {}", url),
            ParsedContent::GeoLocation { latitude, longitude, .. } => {
                format!("Location {:.6},{:.6}", latitude, longitude)
            }
            ParsedContent::Phone { number } => format!("Phone {}", number),
            ParsedContent::Sms { number, .. } => format!("SMS to {}", number),
            ParsedContent::Text { raw } => raw.clone(),
        }
    }
}

/// Classifier and field extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentParser;

impl ContentParser {
    pub fn new() -> Self {
        Self
    }

    /// Classify and parse; the result is always one variant
    pub fn parse(&self, content: &str) -> ParsedContent {
        let trimmed = content.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.starts_with("WIFI:") {
            self.parse_wifi(trimmed)
        } else if upper.contains("BEGIN:VCARD") {
            self.parse_vcard(trimmed)
        } else if upper.contains("MECARD:") {
            self.parse_mecard(trimmed)
        } else if upper.starts_with("BEGIN:VEVENT") || upper.starts_with("BEGIN:VCALENDAR") {
            self.parse_event(trimmed)
        } else if upper.starts_with("MAILTO:") {
            self.parse_mailto(trimmed)
        } else if upper.starts_with("MATMSG:") {
            self.parse_matmsg(trimmed)
        } else if upper.starts_with("GEO:") {
            self.parse_geo(trimmed)
        } else if upper.starts_with("SMSTO:") {
            self.parse_smsto(trimmed)
        } else if upper.starts_with("SMS:") {
            self.parse_sms(trimmed)
        } else if upper.starts_with("TEL:") {
            ParsedContent::Phone {
                number: trimmed[4..].trim().to_string(),
            }
        } else if is_phone_number(trimmed) {
            ParsedContent::Phone {
                number: trimmed.to_string(),
            }
        } else if URL_RE.is_match(trimmed) {
            let url = if upper.starts_with("WWW.") {
                format!("https://{}", trimmed)
            } else {
                trimmed.to_string()
            };
            ParsedContent::Url { url }
        } else {
            ParsedContent::Text {
                raw: content.to_string(),
            }
        }
    }

    fn parse_wifi(&self, content: &str) -> ParsedContent {
        let body = &content[5..];
        let encryption = mecard_field(body, "T").unwrap_or_else(|| "nopass".to_string());
        ParsedContent::Wifi {
            ssid: mecard_field(body, "S").unwrap_or_default(),
            password: mecard_field(body, "P").unwrap_or_default(),
            encryption,
            hidden: mecard_field(body, "H").is_some_and(|h| h.eq_ignore_ascii_case("true")),
        }
    }

    fn parse_mecard(&self, content: &str) -> ParsedContent {
        let start = content
            .to_ascii_uppercase()
            .find("MECARD:")
            .map(|i| i + "MECARD:".len())
            .unwrap_or(0);
        let body = &content[start..];
        let field = |key: &str| mecard_field(body, key).unwrap_or_default();

        ParsedContent::Contact {
            name: mecard_name(&field("N")),
            phone: field("TEL"),
            email: field("EMAIL"),
            address: field("ADR"),
            organization: field("ORG"),
            title: field("TITLE"),
            url: field("URL"),
        }
    }

    fn parse_vcard(&self, content: &str) -> ParsedContent {
        let props = Properties::parse(content);
        let name = match props.value("FN") {
            full if !full.is_empty() => full,
            _ => props.get("N").map(structured_name).unwrap_or_default(),
        };

        ParsedContent::Contact {
            name,
            phone: props.value("TEL"),
            email: props.value("EMAIL"),
            address: props.get("ADR").map(join_components).unwrap_or_default(),
            organization: props.get("ORG").map(join_components).unwrap_or_default(),
            title: props.value("TITLE"),
            url: props.value("URL"),
        }
    }

    fn parse_event(&self, content: &str) -> ParsedContent {
        let props = Properties::parse(content);
        let start_raw = props.value("DTSTART");
        let end_raw = props.value("DTEND");

        ParsedContent::CalendarEvent {
            title: props.value("SUMMARY"),
            description: props.value("DESCRIPTION"),
            location: props.value("LOCATION"),
            start_time_ms: parse_timestamp(&start_raw),
            end_time_ms: parse_timestamp(&end_raw),
            is_all_day: start_raw.len() == 8,
        }
    }

    fn parse_mailto(&self, content: &str) -> ParsedContent {
        let rest = &content["mailto:".len()..];
        let (address, query) = split_once_or_all(rest, '?');
        let params = query_params(query);

        ParsedContent::Email {
            address: address.to_string(),
            subject: params.get("subject").cloned().unwrap_or_default(),
            body: params.get("body").cloned().unwrap_or_default(),
        }
    }

    fn parse_matmsg(&self, content: &str) -> ParsedContent {
        let body = &content["MATMSG:".len()..];
        ParsedContent::Email {
            address: mecard_field(body, "TO").unwrap_or_default(),
            subject: mecard_field(body, "SUB").unwrap_or_default(),
            body: mecard_field(body, "BODY").unwrap_or_default(),
        }
    }

    fn parse_geo(&self, content: &str) -> ParsedContent {
        let rest = &content["geo:".len()..];
        let (coordinates, query) = split_once_or_all(rest, '?');
        // `geo:lat,lon;u=35` carries an uncertainty parameter
        let coordinates = coordinates.split(';').next().unwrap_or_default();
        let mut parts = coordinates.split(',');
        let latitude = parse_coordinate(parts.next());
        let longitude = parse_coordinate(parts.next());
        let query = query_params(query)
            .remove("q")
            .unwrap_or_else(|| query.to_string());

        ParsedContent::GeoLocation {
            latitude,
            longitude,
            query,
        }
    }

    fn parse_sms(&self, content: &str) -> ParsedContent {
        let rest = &content["sms:".len()..];
        let split_at = rest.find(['?', '&']);
        let (number, query) = match split_at {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };

        ParsedContent::Sms {
            number: number.to_string(),
            message: query_params(query).remove("body").unwrap_or_default(),
        }
    }

    fn parse_smsto(&self, content: &str) -> ParsedContent {
        let rest = &content["SMSTO:".len()..];
        let (number, message) = split_once_or_all(rest, ':');
        ParsedContent::Sms {
            number: number.to_string(),
            message: message.to_string(),
        }
    }
}

/// Shorthand for `ContentParser::new().parse(content)`
pub fn classify(content: &str) -> ParsedContent {
    ContentParser::new().parse(content)
}

fn is_phone_number(content: &str) -> bool {
    let stripped: String = content
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    PHONE_RE.is_match(&stripped)
}

fn mecard_field(body: &str, key: &str) -> Option<String> {
    let re = MECARD_FIELDS.get(key)?;
    re.captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape(m.as_str()))
}

/// Undo backslash escaping of `\ ; , " :`
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `Doe,John` -> `John Doe`
fn mecard_name(raw: &str) -> String {
    match raw.split_once(',') {
        Some((last, first)) if !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => raw.trim().trim_end_matches(',').to_string(),
    }
}

/// vCard `N:Doe;John;;;` -> `John Doe`
fn structured_name(raw: &str) -> String {
    let mut parts = raw.split(';');
    let family = parts.next().unwrap_or_default().trim();
    let given = parts.next().unwrap_or_default().trim();
    [given, family]
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_components(raw: &str) -> String {
    raw.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_once_or_all(s: &str, sep: char) -> (&str, &str) {
    s.split_once(sep).unwrap_or((s, ""))
}

/// `&`-separated `key=value` pairs, keys lowercased, values left percent-encoded
fn query_params(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = split_once_or_all(pair, '=');
        params
            .entry(key.to_ascii_lowercase())
            .or_insert_with(|| value.to_string());
    }
    params
}

fn parse_coordinate(raw: Option<&str>) -> f64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// iCalendar date or date-time to epoch milliseconds, 0 when unparseable.
/// Times without a zone are taken as UTC.
pub fn parse_timestamp(raw: &str) -> i64 {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 8 {
        return 0;
    }

    let field = |range: std::ops::Range<usize>| digits[range].parse::<u32>().ok();
    let Some(date) = field(0..4)
        .and_then(|y| NaiveDate::from_ymd_opt(y as i32, field(4..6)?, field(6..8)?))
    else {
        return 0;
    };

    let date_time = if digits.len() >= 14 {
        match (field(8..10), field(10..12), field(12..14)) {
            (Some(h), Some(m), Some(s)) => date.and_hms_opt(h, m, s),
            _ => None,
        }
    } else {
        date.and_hms_opt(0, 0, 0)
    };

    date_time
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

/// Line-oriented `NAME;PARAM=X:value` properties (vCard, iCalendar)
struct Properties {
    values: Vec<(String, String)>,
}

impl Properties {
    fn parse(content: &str) -> Self {
        let mut lines: Vec<String> = Vec::new();
        for line in content.lines() {
            // Folded continuation lines start with a space or tab
            if let Some(continued) = line.strip_prefix([' ', '\t']) {
                if let Some(last) = lines.last_mut() {
                    last.push_str(continued);
                    continue;
                }
            }
            lines.push(line.trim_end_matches('\r').to_string());
        }

        let values = lines
            .iter()
            .filter_map(|line| {
                let (prop, value) = line.split_once(':')?;
                let name = prop.split(';').next()?.trim();
                // Grouped properties: `item1.TEL`
                let name = name.rsplit('.').next().unwrap_or(name);
                Some((name.to_ascii_uppercase(), value.trim().to_string()))
            })
            .collect();

        Self { values }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn value(&self, name: &str) -> String {
        self.get(name).map(unescape_text).unwrap_or_default()
    }
}

/// vCard/iCalendar text escapes: `\n`, `\,`, `\;`, `\\`
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
