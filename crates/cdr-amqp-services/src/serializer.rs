//! CDR record serializer
//!
//! Maps a [`CdrRecord`] and the active [`GlobalConfig`] to the JSON message
//! published on the broker. The mandatory key set is fixed; `uniqueid` and
//! `userfield` are present only when enabled in the configuration and are
//! omitted entirely (never `null`) otherwise.

use bytes::Bytes;
use cdr_amqp_core::{models::CdrRecord, AppError, AppResult, GlobalConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

/// Keys present in every published CDR
pub const MANDATORY_KEYS: &[&str] = &[
    "clid",
    "src",
    "dst",
    "dcontext",
    "channel",
    "dstchannel",
    "lastapp",
    "lastdata",
    "start",
    "answer",
    "end",
    "durationsec",
    "billsec",
    "disposition",
    "accountcode",
    "amaflags",
    "peeraccount",
    "linkedid",
];

/// Structured timestamp rendered for `start`, `answer` and `end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    /// UTC time with millisecond precision, e.g. `2023-11-14T22:13:20.000+0000`
    pub timestamp: String,
    /// Seconds since the Unix epoch
    pub sec: i64,
    /// Microseconds within the second
    pub usec: i64,
}

impl Timestamp {
    pub fn from_datetime(time: &DateTime<Utc>) -> Self {
        Self {
            timestamp: time.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string(),
            sec: time.timestamp(),
            usec: i64::from(time.timestamp_subsec_micros()),
        }
    }

    /// The epoch, used when a time was never set (e.g. unanswered calls)
    pub fn zero() -> Self {
        Self::from_datetime(&DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl From<Option<&DateTime<Utc>>> for Timestamp {
    fn from(time: Option<&DateTime<Utc>>) -> Self {
        time.map(Timestamp::from_datetime)
            .unwrap_or_else(Timestamp::zero)
    }
}

/// Message built from one CDR
///
/// Field order matches the published key order.
#[derive(Debug, Clone, Serialize)]
pub struct CdrMessage<'a> {
    pub clid: &'a str,
    pub src: &'a str,
    pub dst: &'a str,
    pub dcontext: &'a str,
    pub channel: &'a str,
    pub dstchannel: &'a str,
    pub lastapp: &'a str,
    pub lastdata: &'a str,
    pub start: Timestamp,
    pub answer: Timestamp,
    pub end: Timestamp,
    pub durationsec: i64,
    pub billsec: i64,
    pub disposition: &'static str,
    pub accountcode: &'a str,
    pub amaflags: &'static str,
    pub peeraccount: &'a str,
    pub linkedid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uniqueid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userfield: Option<&'a str>,
}

/// Build the message for `record` under `config`
pub fn serialize<'a>(record: &'a CdrRecord, config: &GlobalConfig) -> CdrMessage<'a> {
    CdrMessage {
        clid: &record.clid,
        src: &record.src,
        dst: &record.dst,
        dcontext: &record.dcontext,
        channel: &record.channel,
        dstchannel: &record.dstchannel,
        lastapp: &record.lastapp,
        lastdata: &record.lastdata,
        start: Timestamp::from_datetime(&record.start),
        answer: Timestamp::from(record.answer.as_ref()),
        end: Timestamp::from_datetime(&record.end),
        durationsec: record.duration,
        billsec: record.billsec,
        disposition: record.disposition.as_str(),
        accountcode: &record.accountcode,
        amaflags: record.amaflags.as_str(),
        peeraccount: &record.peeraccount,
        linkedid: &record.linkedid,
        uniqueid: config.log_unique_id.then_some(record.uniqueid.as_str()),
        userfield: config.log_user_field.then_some(record.userfield.as_str()),
    }
}

impl CdrMessage<'_> {
    /// Encode to the UTF-8 JSON wire payload
    pub fn encode(&self) -> AppResult<Bytes> {
        serde_json::to_vec(self).map(Bytes::from).map_err(|e| {
            error!("Failed to build string from JSON: {}", e);
            AppError::Serialization(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdr_amqp_core::models::{AmaFlags, Disposition};
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn sample_record() -> CdrRecord {
        let start = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        CdrRecord {
            clid: "\"Alice\" <1000>".to_string(),
            src: "1000".to_string(),
            dst: "1001".to_string(),
            dcontext: "default".to_string(),
            channel: "PJSIP/1000-000001".to_string(),
            dstchannel: "PJSIP/1001-000002".to_string(),
            lastapp: "Dial".to_string(),
            lastdata: "PJSIP/1001".to_string(),
            start,
            answer: Some(start + chrono::Duration::seconds(2)),
            end: start + chrono::Duration::seconds(12),
            duration: 12,
            billsec: 10,
            disposition: Disposition::Answered,
            accountcode: String::new(),
            amaflags: AmaFlags::Documentation,
            peeraccount: String::new(),
            linkedid: "1700000000.1".to_string(),
            uniqueid: "1700000000.1".to_string(),
            userfield: "vip".to_string(),
        }
    }

    fn keys(value: &serde_json::Value) -> BTreeSet<String> {
        value.as_object().unwrap().keys().cloned().collect()
    }

    fn config(log_unique_id: bool, log_user_field: bool) -> GlobalConfig {
        GlobalConfig {
            connection: "c1".to_string(),
            log_unique_id,
            log_user_field,
            ..Default::default()
        }
    }

    #[test]
    fn test_mandatory_keys_only() {
        let record = sample_record();
        let value = serde_json::to_value(serialize(&record, &config(false, false))).unwrap();

        let expected: BTreeSet<String> = MANDATORY_KEYS.iter().map(|k| k.to_string()).collect();
        assert_eq!(keys(&value), expected);
    }

    #[test]
    fn test_optional_keys_follow_flags() {
        let record = sample_record();

        for (unique, user) in [(false, false), (true, false), (false, true), (true, true)] {
            let value = serde_json::to_value(serialize(&record, &config(unique, user))).unwrap();
            let keys = keys(&value);
            assert_eq!(keys.contains("uniqueid"), unique);
            assert_eq!(keys.contains("userfield"), user);
            assert_eq!(keys.len(), MANDATORY_KEYS.len() + unique as usize + user as usize);
        }

        let value = serde_json::to_value(serialize(&record, &config(true, true))).unwrap();
        assert_eq!(value["uniqueid"], "1700000000.1");
        assert_eq!(value["userfield"], "vip");
    }

    #[test]
    fn test_field_values() {
        let record = sample_record();
        let value = serde_json::to_value(serialize(&record, &config(false, false))).unwrap();

        assert_eq!(value["clid"], "\"Alice\" <1000>");
        assert_eq!(value["durationsec"], 12);
        assert_eq!(value["billsec"], 10);
        assert_eq!(value["disposition"], "ANSWERED");
        assert_eq!(value["amaflags"], "DOCUMENTATION");
        assert_eq!(value["linkedid"], "1700000000.1");
        assert_eq!(value["start"]["timestamp"], "2023-11-14T22:13:20.000+0000");
        assert_eq!(value["start"]["sec"], 1_700_000_000);
        assert_eq!(value["answer"]["sec"], 1_700_000_002);
        assert_eq!(value["end"]["sec"], 1_700_000_012);
    }

    #[test]
    fn test_unanswered_call_renders_zero_timestamp() {
        let record = CdrRecord {
            answer: None,
            disposition: Disposition::NoAnswer,
            ..sample_record()
        };
        let value = serde_json::to_value(serialize(&record, &config(false, false))).unwrap();

        assert!(value["answer"].is_object());
        assert_eq!(value["answer"]["sec"], 0);
        assert_eq!(value["answer"]["usec"], 0);
        assert_eq!(value["answer"]["timestamp"], "1970-01-01T00:00:00.000+0000");
        assert_eq!(value["disposition"], "NO ANSWER");
    }

    #[test]
    fn test_subsecond_precision() {
        let time = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let ts = Timestamp::from_datetime(&time);
        assert_eq!(ts.usec, 123_456);
        assert_eq!(ts.timestamp, "2023-11-14T22:13:20.123+0000");
    }

    #[test]
    fn test_encode_is_json_object() {
        let record = sample_record();
        let body = serialize(&record, &config(true, false)).encode().unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed.get("uniqueid").is_some());
        assert!(parsed.get("userfield").is_none());
        assert!(std::str::from_utf8(&body).unwrap().starts_with("{\"clid\":"));
    }
}
