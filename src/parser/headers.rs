use once_cell::sync::Lazy;
use tracing::debug;
use url::Url;

/// Known header names, UPnP's GENA/SSDP vocabulary included.
///
/// Unknown names are kept verbatim under [`HeaderId::Unknown`] rather than
/// dropped, so protocol layers can still see vendor extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderId {
    Accept,
    AcceptCharset,
    AcceptEncoding,
    AcceptLanguage,
    Allow,
    Authorization,
    CacheControl,
    Callback,
    Connection,
    ContentEncoding,
    ContentLanguage,
    ContentLength,
    ContentLocation,
    ContentRange,
    ContentType,
    Date,
    Etag,
    Expect,
    Expires,
    Host,
    IfMatch,
    IfModifiedSince,
    IfNoneMatch,
    IfRange,
    IfUnmodifiedSince,
    LastModified,
    Location,
    Man,
    MaxForwards,
    Mx,
    Nt,
    Nts,
    Pragma,
    Range,
    Referer,
    RetryAfter,
    Seq,
    Server,
    Sid,
    SoapAction,
    St,
    Te,
    Timeout,
    TransferEncoding,
    Upgrade,
    UserAgent,
    Usn,
    Via,
    Warning,
    WwwAuthenticate,
    Unknown,
}

/// Grammar used to parse a header's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Single identifier-like value (media type, token)
    Ident,
    /// Comma-separated list of tokens
    List,
    /// Comma-separated media ranges with quality values
    MediaRanges,
    /// Unsigned integer
    Number,
    /// HTTP-date (RFC 1123 / RFC 850 / asctime)
    Date,
    /// `host[:port]`
    HostPort,
    /// URI, validated but stored as text
    Uri,
    /// Kept verbatim
    Raw,
}

type TableEntry = (&'static str, HeaderId, ValueKind);

/// Case-insensitive lookup table, sorted once at first use.
static HEADER_TABLE: Lazy<Vec<TableEntry>> = Lazy::new(|| {
    let mut table: Vec<TableEntry> = vec![
        ("accept", HeaderId::Accept, ValueKind::MediaRanges),
        ("accept-charset", HeaderId::AcceptCharset, ValueKind::List),
        ("accept-encoding", HeaderId::AcceptEncoding, ValueKind::List),
        ("accept-language", HeaderId::AcceptLanguage, ValueKind::List),
        ("allow", HeaderId::Allow, ValueKind::List),
        ("authorization", HeaderId::Authorization, ValueKind::Raw),
        ("cache-control", HeaderId::CacheControl, ValueKind::List),
        ("callback", HeaderId::Callback, ValueKind::Uri),
        ("connection", HeaderId::Connection, ValueKind::List),
        ("content-encoding", HeaderId::ContentEncoding, ValueKind::List),
        ("content-language", HeaderId::ContentLanguage, ValueKind::List),
        ("content-length", HeaderId::ContentLength, ValueKind::Number),
        ("content-location", HeaderId::ContentLocation, ValueKind::Uri),
        ("content-range", HeaderId::ContentRange, ValueKind::Raw),
        ("content-type", HeaderId::ContentType, ValueKind::Ident),
        ("date", HeaderId::Date, ValueKind::Date),
        ("etag", HeaderId::Etag, ValueKind::Raw),
        ("expect", HeaderId::Expect, ValueKind::Raw),
        ("expires", HeaderId::Expires, ValueKind::Date),
        ("host", HeaderId::Host, ValueKind::HostPort),
        ("if-match", HeaderId::IfMatch, ValueKind::Raw),
        ("if-modified-since", HeaderId::IfModifiedSince, ValueKind::Date),
        ("if-none-match", HeaderId::IfNoneMatch, ValueKind::Raw),
        ("if-range", HeaderId::IfRange, ValueKind::Raw),
        (
            "if-unmodified-since",
            HeaderId::IfUnmodifiedSince,
            ValueKind::Date,
        ),
        ("last-modified", HeaderId::LastModified, ValueKind::Date),
        ("location", HeaderId::Location, ValueKind::Uri),
        ("man", HeaderId::Man, ValueKind::Raw),
        ("max-forwards", HeaderId::MaxForwards, ValueKind::Number),
        ("mx", HeaderId::Mx, ValueKind::Number),
        ("nt", HeaderId::Nt, ValueKind::Raw),
        ("nts", HeaderId::Nts, ValueKind::Raw),
        ("pragma", HeaderId::Pragma, ValueKind::List),
        ("range", HeaderId::Range, ValueKind::Raw),
        ("referer", HeaderId::Referer, ValueKind::Uri),
        ("retry-after", HeaderId::RetryAfter, ValueKind::Number),
        ("seq", HeaderId::Seq, ValueKind::Number),
        ("server", HeaderId::Server, ValueKind::Raw),
        ("sid", HeaderId::Sid, ValueKind::Raw),
        ("soapaction", HeaderId::SoapAction, ValueKind::Raw),
        ("st", HeaderId::St, ValueKind::Raw),
        ("te", HeaderId::Te, ValueKind::List),
        ("timeout", HeaderId::Timeout, ValueKind::Raw),
        (
            "transfer-encoding",
            HeaderId::TransferEncoding,
            ValueKind::List,
        ),
        ("upgrade", HeaderId::Upgrade, ValueKind::List),
        ("user-agent", HeaderId::UserAgent, ValueKind::Raw),
        ("usn", HeaderId::Usn, ValueKind::Raw),
        ("via", HeaderId::Via, ValueKind::List),
        ("warning", HeaderId::Warning, ValueKind::Raw),
        ("www-authenticate", HeaderId::WwwAuthenticate, ValueKind::Raw),
    ];
    table.sort_unstable_by_key(|(name, _, _)| *name);
    table
});

/// Look up a header name (case-insensitive).
pub fn lookup(name: &str) -> (HeaderId, ValueKind) {
    let lower = name.to_ascii_lowercase();
    match HEADER_TABLE.binary_search_by(|(n, _, _)| (*n).cmp(lower.as_str())) {
        Ok(i) => {
            let (_, id, kind) = HEADER_TABLE[i];
            (id, kind)
        }
        Err(_) => (HeaderId::Unknown, ValueKind::Raw),
    }
}

/// Quality weight in thousandths, clamped to `[0, 1000]`.
///
/// Grammar: `q = 0("."0*3DIGIT) | 1("."0*3"0")`; anything else is a parse
/// error local to the enclosing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(pub u16);

impl Quality {
    pub const MAX: Quality = Quality(1000);

    pub fn parse(s: &str) -> Option<Self> {
        let (int_part, frac) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let frac_milli: u16 = {
            let mut padded = frac.to_string();
            while padded.len() < 3 {
                padded.push('0');
            }
            padded.parse().ok()?
        };
        match int_part {
            "0" => Some(Quality(frac_milli)),
            "1" if frac_milli == 0 => Some(Quality::MAX),
            _ => None,
        }
    }
}

/// One `Accept`-style media range like `text/html;q=0.9`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRange {
    pub media_type: String,
    pub subtype: String,
    pub quality: Quality,
}

impl MediaRange {
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(';').map(str::trim);
        let range = parts.next()?;
        let (media_type, subtype) = range.split_once('/')?;
        if media_type.is_empty() || subtype.is_empty() {
            return None;
        }
        if media_type == "*" && subtype != "*" {
            return None;
        }
        let mut quality = Quality::MAX;
        for param in parts {
            let (name, value) = param.split_once('=')?;
            if name.trim().eq_ignore_ascii_case("q") {
                quality = Quality::parse(value.trim())?;
            }
            // other parameters (level, charset) are accepted and ignored
        }
        Some(Self {
            media_type: media_type.trim().to_string(),
            subtype: subtype.trim().to_string(),
            quality,
        })
    }

    /// Exact type/subtype > subtype-wildcard > `*/*`.
    fn specificity(&self) -> u8 {
        match (self.media_type.as_str(), self.subtype.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }
}

/// Parse and sort a comma-separated media-range list, highest preference
/// first; ties in quality break by specificity, then input order.
pub fn parse_media_ranges(raw: &str) -> Option<Vec<MediaRange>> {
    let mut ranges = raw
        .split(',')
        .map(|item| MediaRange::parse(item.trim()))
        .collect::<Option<Vec<_>>>()?;
    if ranges.is_empty() {
        return None;
    }
    ranges.sort_by(|a, b| {
        b.quality
            .cmp(&a.quality)
            .then(b.specificity().cmp(&a.specificity()))
    });
    Some(ranges)
}

/// Calendar HTTP-date; comparable by conversion to seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_number(name: &str) -> Option<u8> {
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u8 + 1)
}

fn parse_clock(s: &str) -> Option<(u8, u8, u8)> {
    let mut it = s.split(':');
    let h: u8 = it.next()?.parse().ok()?;
    let m: u8 = it.next()?.parse().ok()?;
    let sec: u8 = it.next()?.parse().ok()?;
    if it.next().is_some() || h > 23 || m > 59 || sec > 60 {
        return None;
    }
    Some((h, m, sec))
}

impl HttpDate {
    /// Accepts the three formats of RFC 2616 §3.3.1: RFC 1123
    /// (`Sun, 06 Nov 1994 08:49:37 GMT`), RFC 850
    /// (`Sunday, 06-Nov-94 08:49:37 GMT`) and asctime
    /// (`Sun Nov  6 08:49:37 1994`).
    pub fn parse(s: &str) -> Option<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        match fields.as_slice() {
            // RFC 1123
            [_wkday, day, month, year, clock, "GMT"] => {
                let (hour, minute, second) = parse_clock(clock)?;
                Some(Self {
                    year: year.parse().ok()?,
                    month: month_number(month)?,
                    day: day.parse().ok()?,
                    hour,
                    minute,
                    second,
                })
            }
            // RFC 850: day-month-year packed into one field
            [_weekday, dmy, clock, "GMT"] => {
                let mut it = dmy.split('-');
                let day: u8 = it.next()?.parse().ok()?;
                let month = month_number(it.next()?)?;
                let yy: u16 = it.next()?.parse().ok()?;
                if it.next().is_some() {
                    return None;
                }
                let year = if yy < 70 { 2000 + yy } else { 1900 + yy };
                let (hour, minute, second) = parse_clock(clock)?;
                Some(Self {
                    year,
                    month,
                    day,
                    hour,
                    minute,
                    second,
                })
            }
            // asctime
            [_wkday, month, day, clock, year] => {
                let (hour, minute, second) = parse_clock(clock)?;
                Some(Self {
                    year: year.parse().ok()?,
                    month: month_number(month)?,
                    day: day.parse().ok()?,
                    hour,
                    minute,
                    second,
                })
            }
            _ => None,
        }
        .filter(|d| (1..=12).contains(&d.month) && (1..=31).contains(&d.day))
    }

    /// Seconds since the Unix epoch (days-from-civil algorithm).
    pub fn to_unix_seconds(&self) -> i64 {
        let y = i64::from(self.year) - i64::from(self.month <= 2);
        let era = y.div_euclid(400);
        let yoe = y - era * 400;
        let m = i64::from(self.month);
        let d = i64::from(self.day);
        let doy = (153 * (m + if m > 2 { -3 } else { 9 }) + 2) / 5 + d - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        let days = era * 146_097 + doe - 719_468;
        days * 86_400
            + i64::from(self.hour) * 3_600
            + i64::from(self.minute) * 60
            + i64::from(self.second)
    }
}

/// Typed value of one parsed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Ident(String),
    List(Vec<String>),
    MediaRanges(Vec<MediaRange>),
    Number(u64),
    Date(HttpDate),
    HostPort { host: String, port: Option<u16> },
    Uri(String),
    Raw(String),
}

/// One header line: known id (or `Unknown`), original name, typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    pub id: HeaderId,
    pub name: String,
    pub value: HeaderValue,
}

fn parse_host_port(raw: &str) -> Option<HeaderValue> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    // An IPv6 literal must be bracketed; the brackets are stripped.
    if let Some(rest) = raw.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        if host.is_empty() {
            return None;
        }
        let port = match after {
            "" => None,
            _ => Some(after.strip_prefix(':')?.parse().ok()?),
        };
        return Some(HeaderValue::HostPort {
            host: host.to_string(),
            port,
        });
    }
    let mut parts = raw.split(':');
    let host = parts.next()?.to_string();
    let port = match parts.next() {
        Some(p) => Some(p.parse().ok()?),
        None => None,
    };
    // At most one colon outside brackets.
    if host.is_empty() || parts.next().is_some() {
        return None;
    }
    Some(HeaderValue::HostPort { host, port })
}

fn parse_uri(raw: &str) -> Option<HeaderValue> {
    // GENA callback URIs arrive angle-bracketed: <http://host/path>
    let trimmed = raw.trim().trim_start_matches('<').trim_end_matches('>');
    Url::parse(trimmed).ok()?;
    Some(HeaderValue::Uri(trimmed.to_string()))
}

/// Parse one header value against its typed grammar.
///
/// `None` means the value failed its grammar; the caller skips the header and
/// keeps going; a slightly lossy message beats aborting the whole parse.
pub fn parse_value(kind: ValueKind, raw: &str) -> Option<HeaderValue> {
    let trimmed = raw.trim();
    match kind {
        ValueKind::Ident => {
            if trimmed.is_empty() {
                None
            } else {
                Some(HeaderValue::Ident(trimmed.to_string()))
            }
        }
        ValueKind::List => {
            let items: Vec<String> = trimmed
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if items.is_empty() {
                None
            } else {
                Some(HeaderValue::List(items))
            }
        }
        ValueKind::MediaRanges => parse_media_ranges(trimmed).map(HeaderValue::MediaRanges),
        ValueKind::Number => trimmed.parse().ok().map(HeaderValue::Number),
        ValueKind::Date => HttpDate::parse(trimmed).map(HeaderValue::Date),
        ValueKind::HostPort => parse_host_port(trimmed),
        ValueKind::Uri => parse_uri(trimmed),
        ValueKind::Raw => Some(HeaderValue::Raw(trimmed.to_string())),
    }
}

/// Build a header from a raw name/value pair, or `None` when the value fails
/// its grammar.
pub fn build_header(name: &str, raw_value: &str) -> Option<HttpHeader> {
    let (id, kind) = lookup(name);
    match parse_value(kind, raw_value) {
        Some(value) => Some(HttpHeader {
            id,
            name: name.to_string(),
            value,
        }),
        None => {
            debug!(header = name, value = raw_value, "header value failed its grammar, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        assert_eq!(
            lookup("Content-Length"),
            (HeaderId::ContentLength, ValueKind::Number)
        );
        assert_eq!(
            lookup("TRANSFER-ENCODING"),
            (HeaderId::TransferEncoding, ValueKind::List)
        );
        assert_eq!(lookup("sid"), (HeaderId::Sid, ValueKind::Raw));
        assert_eq!(lookup("X-Vendor-Thing"), (HeaderId::Unknown, ValueKind::Raw));
    }

    #[test]
    fn test_quality_grammar() {
        assert_eq!(Quality::parse("1"), Some(Quality::MAX));
        assert_eq!(Quality::parse("1.000"), Some(Quality::MAX));
        assert_eq!(Quality::parse("0"), Some(Quality(0)));
        assert_eq!(Quality::parse("0.5"), Some(Quality(500)));
        assert_eq!(Quality::parse("0.125"), Some(Quality(125)));
        assert_eq!(Quality::parse("1.5"), None);
        assert_eq!(Quality::parse("0.1234"), None);
        assert_eq!(Quality::parse("-1"), None);
        assert_eq!(Quality::parse("q"), None);
    }

    #[test]
    fn test_media_range_sort_by_quality() {
        let ranges =
            parse_media_ranges("text/plain;q=0.5, text/html;q=0.9, */*;q=0.1").unwrap();
        let names: Vec<String> = ranges
            .iter()
            .map(|r| format!("{}/{}", r.media_type, r.subtype))
            .collect();
        assert_eq!(names, vec!["text/html", "text/plain", "*/*"]);
    }

    #[test]
    fn test_media_range_tie_breaks_by_specificity() {
        let ranges = parse_media_ranges("*/*, text/*, text/html").unwrap();
        let names: Vec<String> = ranges
            .iter()
            .map(|r| format!("{}/{}", r.media_type, r.subtype))
            .collect();
        assert_eq!(names, vec!["text/html", "text/*", "*/*"]);
    }

    #[test]
    fn test_media_range_rejects_wildcard_type_exact_subtype() {
        assert!(MediaRange::parse("*/html").is_none());
    }

    #[test]
    fn test_http_date_rfc1123() {
        let d = HttpDate::parse("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!((d.year, d.month, d.day), (1994, 11, 6));
        assert_eq!(d.to_unix_seconds(), 784_111_777);
    }

    #[test]
    fn test_http_date_rfc850_and_asctime_agree() {
        let rfc1123 = HttpDate::parse("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        let rfc850 = HttpDate::parse("Sunday, 06-Nov-94 08:49:37 GMT").unwrap();
        let asctime = HttpDate::parse("Sun Nov  6 08:49:37 1994").unwrap();
        assert_eq!(rfc1123.to_unix_seconds(), rfc850.to_unix_seconds());
        assert_eq!(rfc1123.to_unix_seconds(), asctime.to_unix_seconds());
    }

    #[test]
    fn test_host_port() {
        assert_eq!(
            parse_value(ValueKind::HostPort, "example.com:8080"),
            Some(HeaderValue::HostPort {
                host: "example.com".into(),
                port: Some(8080)
            })
        );
        assert_eq!(
            parse_value(ValueKind::HostPort, "example.com"),
            Some(HeaderValue::HostPort {
                host: "example.com".into(),
                port: None
            })
        );
        assert_eq!(parse_value(ValueKind::HostPort, "example.com:notaport"), None);
    }

    #[test]
    fn test_host_port_rejects_second_colon() {
        assert_eq!(parse_value(ValueKind::HostPort, "example.com:80:90"), None);
        assert_eq!(parse_value(ValueKind::HostPort, "::1"), None);
        assert_eq!(parse_value(ValueKind::HostPort, ":80"), None);
    }

    #[test]
    fn test_host_port_bracketed_ipv6() {
        assert_eq!(
            parse_value(ValueKind::HostPort, "[fe80::1]:49152"),
            Some(HeaderValue::HostPort {
                host: "fe80::1".into(),
                port: Some(49152)
            })
        );
        assert_eq!(
            parse_value(ValueKind::HostPort, "[::1]"),
            Some(HeaderValue::HostPort {
                host: "::1".into(),
                port: None
            })
        );
        assert_eq!(parse_value(ValueKind::HostPort, "[::1]junk"), None);
    }

    #[test]
    fn test_callback_uri_angle_brackets() {
        assert_eq!(
            parse_value(ValueKind::Uri, "<http://192.168.1.10:5000/notify>"),
            Some(HeaderValue::Uri("http://192.168.1.10:5000/notify".into()))
        );
        assert_eq!(parse_value(ValueKind::Uri, "not a uri"), None);
    }

    #[test]
    fn test_build_header_unknown_kept_verbatim() {
        let h = build_header("X-AV-Vendor", "  some opaque value ").unwrap();
        assert_eq!(h.id, HeaderId::Unknown);
        assert_eq!(h.name, "X-AV-Vendor");
        assert_eq!(h.value, HeaderValue::Raw("some opaque value".into()));
    }

    #[test]
    fn test_build_header_bad_value_skipped() {
        assert!(build_header("Content-Length", "twelve").is_none());
        assert!(build_header("Date", "yesterday-ish").is_none());
    }
}
