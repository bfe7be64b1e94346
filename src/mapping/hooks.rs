//! Value massage hooks
//!
//! Hooks run on every encode and decode, before the value is wrapped into a
//! term (outbound) and right after the term's lexical form is read (inbound).
//! A hook that does not apply must return the value unchanged.

use super::registry::ColumnInfo;
use crate::entity::FieldValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

/// Everything a hook may need to decide whether it applies
#[derive(Debug, Clone, Copy)]
pub struct ValueContext<'a> {
    pub entity_type: &'a str,
    pub bundle: &'a str,
    pub field: &'a str,
    pub column: &'a str,
    pub langcode: Option<&'a str>,
    pub mapping: &'a ColumnInfo,
}

/// Rewrites values crossing the store boundary
pub trait ValueHook: Send + Sync {
    /// Before a value is encoded
    fn outbound(&self, _ctx: &ValueContext<'_>, value: FieldValue) -> FieldValue {
        value
    }

    /// After a lexical value is read from the store
    fn inbound(&self, _ctx: &ValueContext<'_>, value: String) -> String {
        value
    }
}

/// Stores `timestamp` columns mapped to `xsd:dateTime`/`xsd:date` as ISO dates
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampDateHook;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";
const DATE_FORMAT: &str = "%Y-%m-%d";

impl TimestampDateHook {
    fn date_format(mapping: &ColumnInfo) -> Option<&'static str> {
        if mapping.data_type != "timestamp" {
            return None;
        }
        match &mapping.format {
            f if f.is_xsd("dateTime") => Some(DATETIME_FORMAT),
            f if f.is_xsd("date") => Some(DATE_FORMAT),
            _ => None,
        }
    }

    fn timestamp(value: &FieldValue) -> Option<i64> {
        match value {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Float(f) => Some(*f as i64),
            FieldValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn parse_date(value: &str) -> Option<i64> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.timestamp());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
            return Some(dt.and_utc().timestamp());
        }
        NaiveDate::parse_from_str(value, DATE_FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
    }
}

impl ValueHook for TimestampDateHook {
    fn outbound(&self, ctx: &ValueContext<'_>, value: FieldValue) -> FieldValue {
        let Some(format) = Self::date_format(ctx.mapping) else {
            return value;
        };
        match Self::timestamp(&value).and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)) {
            Some(dt) => FieldValue::String(dt.format(format).to_string()),
            None => value,
        }
    }

    fn inbound(&self, ctx: &ValueContext<'_>, value: String) -> String {
        if Self::date_format(ctx.mapping).is_none() {
            return value;
        }
        match Self::parse_date(&value) {
            Some(ts) => ts.to_string(),
            None => {
                debug!("{}.{}: '{}' is not a date, kept as is", ctx.field, ctx.column, value);
                value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ValueFormat;
    use crate::rdf::XSD_NS;

    fn column(data_type: &str, datatype: &str) -> ColumnInfo {
        ColumnInfo {
            predicate: "http://ex/created".to_string(),
            format: ValueFormat::Typed(format!("{}{}", XSD_NS, datatype)),
            serialize: false,
            data_type: data_type.to_string(),
        }
    }

    fn ctx(mapping: &ColumnInfo) -> ValueContext<'_> {
        ValueContext {
            entity_type: "rdf_entity",
            bundle: "fruit",
            field: "created",
            column: "value",
            langcode: None,
            mapping,
        }
    }

    #[test]
    fn test_timestamp_to_datetime_and_back() {
        let mapping = column("timestamp", "dateTime");
        let hook = TimestampDateHook;
        let out = hook.outbound(&ctx(&mapping), FieldValue::from(1_500_000_000));
        assert_eq!(out, FieldValue::from("2017-07-14T02:40:00+00:00"));

        let back = hook.inbound(&ctx(&mapping), "2017-07-14T02:40:00+00:00".to_string());
        assert_eq!(back, "1500000000");
    }

    #[test]
    fn test_timestamp_to_date() {
        let mapping = column("timestamp", "date");
        let hook = TimestampDateHook;
        let out = hook.outbound(&ctx(&mapping), FieldValue::from(86_400 * 2));
        assert_eq!(out, FieldValue::from("1970-01-03"));
        assert_eq!(hook.inbound(&ctx(&mapping), "1970-01-03".to_string()), "172800");
    }

    #[test]
    fn test_other_columns_untouched() {
        let hook = TimestampDateHook;
        let integer = column("integer", "dateTime");
        assert_eq!(hook.outbound(&ctx(&integer), FieldValue::from(5)), FieldValue::from(5));

        let wrong_format = column("timestamp", "integer");
        assert_eq!(hook.inbound(&ctx(&wrong_format), "5".to_string()), "5");
    }

    #[test]
    fn test_unparseable_date_passes_through() {
        let mapping = column("timestamp", "dateTime");
        assert_eq!(TimestampDateHook.inbound(&ctx(&mapping), "yesterday".to_string()), "yesterday");
    }
}
