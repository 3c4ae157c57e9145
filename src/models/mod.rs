//! Core data models for records and match outcomes.

mod outcome;
mod record;

pub use outcome::{
    BatchResult, MatchMethod, MatchOutcome, MatchResult, MatchStats, MatchStatus,
    REASON_NO_FILES, REASON_NO_MATCH,
};
pub use record::{FieldMapping, Record, RecordSet};
