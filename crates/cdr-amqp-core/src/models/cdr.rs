//! CDR (Call Detail Record) model
//!
//! Represents a completed call as handed over by the CDR subsystem. All
//! values arrive pre-computed and are only read by the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final disposition of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    #[serde(rename = "NO ANSWER")]
    NoAnswer,
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "BUSY")]
    Busy,
    #[serde(rename = "ANSWERED")]
    Answered,
    #[serde(rename = "CONGESTION")]
    Congestion,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Disposition {
    /// Map a raw disposition code from the CDR subsystem
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Disposition::NoAnswer,
            1 => Disposition::Null,
            2 => Disposition::Failed,
            4 => Disposition::Busy,
            8 => Disposition::Answered,
            16 => Disposition::Congestion,
            _ => Disposition::Unknown,
        }
    }

    /// Canonical name used in published messages
    ///
    /// A `NULL` disposition is reported as `NO ANSWER`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::NoAnswer | Disposition::Null => "NO ANSWER",
            Disposition::Failed => "FAILED",
            Disposition::Busy => "BUSY",
            Disposition::Answered => "ANSWERED",
            Disposition::Congestion => "CONGESTION",
            Disposition::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Automated Message Accounting flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AmaFlags {
    Omit,
    Billing,
    Documentation,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl AmaFlags {
    /// Map a raw AMA flag code from the CDR subsystem
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => AmaFlags::Omit,
            2 => AmaFlags::Billing,
            3 => AmaFlags::Documentation,
            _ => AmaFlags::Unknown,
        }
    }

    /// Canonical name used in published messages
    pub fn as_str(&self) -> &'static str {
        match self {
            AmaFlags::Omit => "OMIT",
            AmaFlags::Billing => "BILLING",
            AmaFlags::Documentation => "DOCUMENTATION",
            AmaFlags::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AmaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completed call detail record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdrRecord {
    /// Caller ID, e.g. `"Alice" <1000>`
    #[serde(default)]
    pub clid: String,

    /// Source extension
    #[serde(default)]
    pub src: String,

    /// Destination extension
    #[serde(default)]
    pub dst: String,

    /// Destination context
    #[serde(default)]
    pub dcontext: String,

    #[serde(default)]
    pub channel: String,

    #[serde(default)]
    pub dstchannel: String,

    /// Last application executed
    #[serde(default)]
    pub lastapp: String,

    /// Arguments of the last application
    #[serde(default)]
    pub lastdata: String,

    /// Call start timestamp
    pub start: DateTime<Utc>,

    /// Answer timestamp (None if never answered)
    #[serde(default)]
    pub answer: Option<DateTime<Utc>>,

    /// Call end timestamp
    pub end: DateTime<Utc>,

    /// Total call duration in seconds
    #[serde(default)]
    pub duration: i64,

    /// Billable duration in seconds (from answer to hangup)
    #[serde(default)]
    pub billsec: i64,

    pub disposition: Disposition,

    #[serde(default)]
    pub accountcode: String,

    pub amaflags: AmaFlags,

    #[serde(default)]
    pub peeraccount: String,

    #[serde(default)]
    pub linkedid: String,

    #[serde(default)]
    pub uniqueid: String,

    #[serde(default)]
    pub userfield: String,
}

impl Default for CdrRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            clid: String::new(),
            src: String::new(),
            dst: String::new(),
            dcontext: String::new(),
            channel: String::new(),
            dstchannel: String::new(),
            lastapp: String::new(),
            lastdata: String::new(),
            start: now,
            answer: None,
            end: now,
            duration: 0,
            billsec: 0,
            disposition: Disposition::NoAnswer,
            accountcode: String::new(),
            amaflags: AmaFlags::Documentation,
            peeraccount: String::new(),
            linkedid: String::new(),
            uniqueid: String::new(),
            userfield: String::new(),
        }
    }
}
