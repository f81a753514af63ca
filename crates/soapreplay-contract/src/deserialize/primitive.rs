//! Scalar lexical forms
//!
//! Parses XML Schema lexical representations into [`PrimitiveValue`]s and
//! maps schema type names (`xs:int`, `ser:guid`, ...) to primitive types.

use crate::error::DeserializeError;
use crate::typeref::{PrimitiveKind, TypeRef};
use crate::value::{DateTimeKind, PrimitiveValue, TICKS_PER_SECOND};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use soapreplay_trace::NamespaceScope;
use uuid::Uuid;

/// XML Schema namespace
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Serialization namespace for `char`, `guid` and `duration`
pub const SERIALIZATION_NS: &str = "http://schemas.microsoft.com/2003/10/Serialization/";

/// Primitive type named by a schema type
#[must_use]
pub fn schema_type(namespace: Option<&str>, local: &str) -> Option<TypeRef> {
    let kind = match (namespace?, local) {
        (XS_NS, "string") => PrimitiveKind::String,
        (XS_NS, "boolean") => PrimitiveKind::Bool,
        (XS_NS, "unsignedByte") => PrimitiveKind::Byte,
        (XS_NS, "byte") => PrimitiveKind::SByte,
        (XS_NS, "short") => PrimitiveKind::Int16,
        (XS_NS, "unsignedShort") => PrimitiveKind::UInt16,
        (XS_NS, "int") => PrimitiveKind::Int32,
        (XS_NS, "unsignedInt") => PrimitiveKind::UInt32,
        (XS_NS, "long") => PrimitiveKind::Int64,
        (XS_NS, "unsignedLong") => PrimitiveKind::UInt64,
        (XS_NS, "float") => PrimitiveKind::Single,
        (XS_NS, "double") => PrimitiveKind::Double,
        (XS_NS, "decimal") => PrimitiveKind::Decimal,
        (XS_NS, "dateTime") => PrimitiveKind::DateTime,
        (XS_NS, "QName") => PrimitiveKind::QName,
        (XS_NS, "anyURI") => PrimitiveKind::Uri,
        (XS_NS, "base64Binary") => {
            return Some(TypeRef::array_of(PrimitiveKind::Byte.into()));
        }
        (SERIALIZATION_NS, "char") => PrimitiveKind::Char,
        (SERIALIZATION_NS, "guid") => PrimitiveKind::Guid,
        (SERIALIZATION_NS, "duration") | (XS_NS, "duration") => PrimitiveKind::TimeSpan,
        _ => return None,
    };
    Some(TypeRef::Primitive(kind))
}

/// Parse element text as `kind`
///
/// `scope` resolves the prefix of qualified-name values.
pub fn parse_primitive(
    kind: PrimitiveKind,
    text: &str,
    scope: &NamespaceScope,
) -> Result<PrimitiveValue, DeserializeError> {
    let invalid = || DeserializeError::invalid(kind.keyword(), text);
    let t = text.trim();
    Ok(match kind {
        PrimitiveKind::Bool => match t {
            "true" | "1" => PrimitiveValue::Bool(true),
            "false" | "0" => PrimitiveValue::Bool(false),
            _ => return Err(invalid()),
        },
        PrimitiveKind::Byte => PrimitiveValue::Byte(t.parse().map_err(|_| invalid())?),
        PrimitiveKind::SByte => PrimitiveValue::SByte(t.parse().map_err(|_| invalid())?),
        PrimitiveKind::Int16 => PrimitiveValue::Int16(t.parse().map_err(|_| invalid())?),
        PrimitiveKind::UInt16 => PrimitiveValue::UInt16(t.parse().map_err(|_| invalid())?),
        PrimitiveKind::Int32 => PrimitiveValue::Int32(t.parse().map_err(|_| invalid())?),
        PrimitiveKind::UInt32 => PrimitiveValue::UInt32(t.parse().map_err(|_| invalid())?),
        PrimitiveKind::Int64 => PrimitiveValue::Int64(t.parse().map_err(|_| invalid())?),
        PrimitiveKind::UInt64 => PrimitiveValue::UInt64(t.parse().map_err(|_| invalid())?),
        PrimitiveKind::Single => PrimitiveValue::Single(parse_float(t).ok_or_else(invalid)? as f32),
        PrimitiveKind::Double => PrimitiveValue::Double(parse_float(t).ok_or_else(invalid)?),
        PrimitiveKind::Decimal => {
            if !is_decimal(t) {
                return Err(invalid());
            }
            PrimitiveValue::Decimal(t.to_string())
        }
        PrimitiveKind::Char => {
            let code: u32 = t.parse().map_err(|_| invalid())?;
            if code > 0xFFFF {
                return Err(invalid());
            }
            PrimitiveValue::Char(char::from_u32(code).ok_or_else(invalid)?)
        }
        PrimitiveKind::String => PrimitiveValue::String(text.to_string()),
        PrimitiveKind::DateTime => {
            let (value, kind) = parse_date_time(t).ok_or_else(invalid)?;
            PrimitiveValue::DateTime { value, kind }
        }
        PrimitiveKind::TimeSpan => PrimitiveValue::TimeSpan(parse_duration(t).ok_or_else(invalid)?),
        PrimitiveKind::Guid => PrimitiveValue::Guid(Uuid::parse_str(t).map_err(|_| invalid())?),
        PrimitiveKind::QName => {
            let name = scope.resolve_qname(t);
            PrimitiveValue::QName {
                namespace: name.namespace.unwrap_or_default(),
                name: name.local,
            }
        }
        PrimitiveKind::Uri => PrimitiveValue::Uri(t.to_string()),
    })
}

fn parse_float(t: &str) -> Option<f64> {
    match t {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => t.parse().ok(),
    }
}

fn is_decimal(t: &str) -> bool {
    let digits = t.strip_prefix(['+', '-']).unwrap_or(t);
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    !(whole.is_empty() && frac.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && frac.chars().all(|c| c.is_ascii_digit())
}

/// Parse `xs:dateTime` (or a bare date)
fn parse_date_time(t: &str) -> Option<(NaiveDateTime, DateTimeKind)> {
    if let Some(utc) = t.strip_suffix('Z') {
        return parse_naive(utc).map(|v| (v, DateTimeKind::Utc));
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(t) {
        return Some((with_offset.naive_local(), DateTimeKind::Local));
    }
    parse_naive(t).map(|v| (v, DateTimeKind::Unspecified))
}

fn parse_naive(t: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(t, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse `xs:duration` into ticks
///
/// Years and months have no fixed length and are rejected.
fn parse_duration(t: &str) -> Option<i64> {
    let (negative, rest) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    let rest = rest.strip_prefix('P')?;
    let (date, time) = rest.split_once('T').unwrap_or((rest, ""));
    if rest.is_empty() || (rest.contains('T') && time.is_empty()) {
        return None;
    }

    let mut ticks: i64 = 0;
    for (value, unit) in components(date)? {
        match unit {
            'D' => ticks = ticks.checked_add(scaled(value, 86_400 * TICKS_PER_SECOND)?)?,
            _ => return None,
        }
    }
    for (value, unit) in components(time)? {
        let term = match unit {
            'H' => scaled(value, 3_600 * TICKS_PER_SECOND)?,
            'M' => scaled(value, 60 * TICKS_PER_SECOND)?,
            'S' => {
                let (whole, frac) = value.split_once('.').unwrap_or((value, ""));
                let frac: String = frac.chars().chain(std::iter::repeat('0')).take(7).collect();
                scaled(whole, TICKS_PER_SECOND)?.checked_add(frac.parse::<i64>().ok()?)?
            }
            _ => return None,
        };
        ticks = ticks.checked_add(term)?;
    }
    Some(if negative { -ticks } else { ticks })
}

/// `value * scale`, `None` on bad digits or overflow
fn scaled(value: &str, scale: i64) -> Option<i64> {
    value.parse::<i64>().ok()?.checked_mul(scale)
}

/// Split `1D2H` style text into `(number, unit)` pairs
fn components(s: &str) -> Option<Vec<(&str, char)>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c.is_ascii_alphabetic() {
            if i == start {
                return None;
            }
            out.push((&s[start..i], c));
            start = i + 1;
        }
    }
    (start == s.len()).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(kind: PrimitiveKind, text: &str) -> PrimitiveValue {
        parse_primitive(kind, text, &NamespaceScope::new()).unwrap()
    }

    #[test]
    fn integers_and_bools() {
        assert_eq!(parse(PrimitiveKind::Int32, " 42 "), PrimitiveValue::Int32(42));
        assert_eq!(parse(PrimitiveKind::Bool, "1"), PrimitiveValue::Bool(true));
        assert!(parse_primitive(PrimitiveKind::Byte, "300", &NamespaceScope::new()).is_err());
    }

    #[test]
    fn floats_and_decimals() {
        assert_eq!(parse(PrimitiveKind::Double, "INF"), PrimitiveValue::Double(f64::INFINITY));
        assert_eq!(parse(PrimitiveKind::Decimal, "-12.50"), PrimitiveValue::Decimal("-12.50".into()));
        assert!(parse_primitive(PrimitiveKind::Decimal, "1e3", &NamespaceScope::new()).is_err());
    }

    #[test]
    fn chars_are_code_points() {
        assert_eq!(parse(PrimitiveKind::Char, "65"), PrimitiveValue::Char('A'));
        assert_eq!(parse(PrimitiveKind::Char, "65535"), PrimitiveValue::Char('\u{FFFF}'));
        assert!(parse_primitive(PrimitiveKind::Char, "65536", &NamespaceScope::new()).is_err());
        assert!(parse_primitive(PrimitiveKind::Char, "128512", &NamespaceScope::new()).is_err());
    }

    #[test]
    fn date_time_kinds() {
        let PrimitiveValue::DateTime { kind, .. } = parse(PrimitiveKind::DateTime, "2024-03-01T10:00:00Z") else {
            panic!("not a date-time");
        };
        assert_eq!(kind, DateTimeKind::Utc);
        let PrimitiveValue::DateTime { kind, value } =
            parse(PrimitiveKind::DateTime, "2024-03-01T10:00:00.5+02:00")
        else {
            panic!("not a date-time");
        };
        assert_eq!(kind, DateTimeKind::Local);
        assert_eq!(value.to_string(), "2024-03-01 10:00:00.500");
        let PrimitiveValue::DateTime { kind, .. } = parse(PrimitiveKind::DateTime, "2024-03-01T10:00:00") else {
            panic!("not a date-time");
        };
        assert_eq!(kind, DateTimeKind::Unspecified);
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("PT1H30M"), Some(90 * 60 * TICKS_PER_SECOND));
        assert_eq!(parse_duration("-P1DT0.5S"), Some(-(86_400 * TICKS_PER_SECOND + 5_000_000)));
        assert_eq!(parse_duration("P1Y"), None);
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_duration("P"), None);
    }

    #[test]
    fn oversized_durations_are_invalid() {
        assert_eq!(parse_duration("P10675199D"), Some(10_675_199 * 86_400 * TICKS_PER_SECOND));
        assert_eq!(parse_duration("P10675200D"), None);
        assert_eq!(parse_duration("P10675199DT24H"), None);
        assert_eq!(parse_duration("PT9223372036854775807S"), None);
        assert!(matches!(
            parse_primitive(PrimitiveKind::TimeSpan, "P10675200D", &NamespaceScope::new()),
            Err(DeserializeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn guid_and_qname() {
        let id = "0f8fad5b-d9cb-469f-a165-70867728950e";
        assert_eq!(parse(PrimitiveKind::Guid, id), PrimitiveValue::Guid(Uuid::parse_str(id).unwrap()));
        let mut scope = NamespaceScope::new();
        scope.push_decls(&[soapreplay_trace::NamespaceDecl {
            prefix: Some("c".into()),
            uri: "urn:calc".into(),
        }]);
        assert_eq!(
            parse_primitive(PrimitiveKind::QName, "c:Add", &scope).unwrap(),
            PrimitiveValue::QName { namespace: "urn:calc".into(), name: "Add".into() }
        );
    }

    #[test]
    fn schema_types() {
        assert_eq!(schema_type(Some(XS_NS), "int"), Some(TypeRef::Primitive(PrimitiveKind::Int32)));
        assert_eq!(schema_type(Some(SERIALIZATION_NS), "guid"), Some(TypeRef::Primitive(PrimitiveKind::Guid)));
        assert_eq!(schema_type(Some("urn:other"), "int"), None);
        assert_eq!(schema_type(None, "int"), None);
    }
}
