use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

const TEMPERATURE: &str = "temperature";
const HUMIDITY: &str = "humidity";
const PRESSURE: &str = "pressure";
const CO2: &str = "co2";
const CREATED: &str = "created";

/// Reasons a submitted reading is rejected. All of them surface to the client
/// as the same `Invalid data` response.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum InvalidData {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not numeric")]
    NotNumeric(&'static str),
    #[error("cannot parse `{0}` as timestamp")]
    InvalidTimestamp(String),
}

/// A sensor reading as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentalData {
    pub temperature: f64, // °C
    pub humidity: f64,    // percent
    pub pressure: f64,    // hPa
    pub co2: f64,         // ppm
    pub measured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl EnvironmentalData {
    /// Builds a record from a decoded request body.
    ///
    /// All five keys must be present and non-null. Measurements are coerced
    /// to floats the lenient way (strings contribute their numeric prefix),
    /// `created` must be a parseable timestamp.
    pub fn from_payload(payload: &Value, now: DateTime<Utc>) -> Result<Self, InvalidData> {
        let fields = payload.as_object().ok_or(InvalidData::NotAnObject)?;

        // presence first, so a missing key wins over a malformed one
        for key in [TEMPERATURE, HUMIDITY, PRESSURE, CO2, CREATED] {
            required(fields, key)?;
        }

        let created = match required(fields, CREATED)? {
            Value::String(s) => s,
            other => return Err(InvalidData::InvalidTimestamp(other.to_string())),
        };

        Ok(Self {
            temperature: coerce_f64(fields, TEMPERATURE)?,
            humidity: coerce_f64(fields, HUMIDITY)?,
            pressure: coerce_f64(fields, PRESSURE)?,
            co2: coerce_f64(fields, CO2)?,
            measured_at: parse_timestamp(created)?,
            created_at: now,
        })
    }
}

fn required<'a>(fields: &'a Map<String, Value>, key: &'static str) -> Result<&'a Value, InvalidData> {
    match fields.get(key) {
        None | Some(Value::Null) => Err(InvalidData::MissingField(key)),
        Some(value) => Ok(value),
    }
}

fn coerce_f64(fields: &Map<String, Value>, key: &'static str) -> Result<f64, InvalidData> {
    match required(fields, key)? {
        Value::Number(n) => n.as_f64().ok_or(InvalidData::NotNumeric(key)),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => Ok(leading_f64(s)),
        // structured values cast by emptiness, like a decoded PHP array
        Value::Array(items) => Ok(if items.is_empty() { 0.0 } else { 1.0 }),
        Value::Object(members) => Ok(if members.is_empty() { 0.0 } else { 1.0 }),
        Value::Null => Err(InvalidData::MissingField(key)),
    }
}

/// Numeric prefix of `s`, `0.0` if there is none. `" 12.5abc"` gives `12.5`.
fn leading_f64(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_end = digits(end);
    let mut mantissa_end = int_end;
    if mantissa_end < bytes.len() && bytes[mantissa_end] == b'.' {
        mantissa_end = digits(mantissa_end + 1);
    }
    // a lone sign or dot is not a number
    if !s[end..mantissa_end].bytes().any(|b| b.is_ascii_digit()) {
        return 0.0;
    }
    end = mantissa_end;

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        let exp_end = digits(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

const DATE_TIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

/// Parses the caller-supplied measurement time.
///
/// Accepts RFC 3339 and the common ISO-8601 variants: extended or basic
/// format, seconds and fraction optional (`.` or `,`), offset `Z`, `±HH`,
/// `±HHMM` or `±HH:MM`, or a bare date (midnight). Timestamps without an
/// offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, InvalidData> {
    let trimmed = s.trim();
    let mut normalized = trimmed.replace(',', ".");
    if normalized.ends_with(['Z', 'z']) {
        normalized.pop();
        normalized.push_str("+00:00");
    }
    let s = normalized.as_str();

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in DATE_TIME_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(s, &format!("{fmt}%#z")) {
            return Ok(ts.with_timezone(&Utc));
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Some(midnight) = NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(midnight.and_utc());
        }
    }

    Err(InvalidData::InvalidTimestamp(trimmed.to_string()))
}
