//! Source operator and event-time extraction

use crate::velostream::sql::error::{SqlError, SqlResult};
use crate::velostream::sql::execution::expression::{ArgCoercer, ParamType};
use crate::velostream::sql::execution::types::{FieldValue, SourceRecord, SqlType, StreamRecord};
use crate::velostream::sql::plan::TimestampExtractionPolicy;
use std::fmt;
use std::sync::Arc;

/// Derives the event time of a source record
pub trait TimestampExtractor: Send + Sync + fmt::Debug {
    /// Event time in milliseconds since epoch
    fn extract(&self, record: &StreamRecord) -> SqlResult<i64>;
}

/// Uses the timestamp the record was delivered with
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataTimestampExtractor;

impl TimestampExtractor for MetadataTimestampExtractor {
    fn extract(&self, record: &StreamRecord) -> SqlResult<i64> {
        Ok(record.timestamp)
    }
}

/// Reads the event time from a column.
///
/// Numeric values and numeric strings are taken as milliseconds since epoch;
/// other strings are parsed as RFC 3339 timestamps.
#[derive(Debug, Clone, Copy)]
pub struct ColumnTimestampExtractor {
    index: usize,
}

impl ColumnTimestampExtractor {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl TimestampExtractor for ColumnTimestampExtractor {
    fn extract(&self, record: &StreamRecord) -> SqlResult<i64> {
        if let Some(FieldValue::String(s)) = record.column(self.index) {
            if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(s) {
                return Ok(ts.timestamp_millis());
            }
        }
        let target = ParamType::Primitive(SqlType::BigInt);
        match ArgCoercer::coerce_arg(&record.columns, &target, self.index)?.as_ref() {
            FieldValue::BigInt(ts) => Ok(*ts),
            other => Err(SqlError::execution_error(format!(
                "Timestamp column {} produced {}",
                self.index,
                other.type_name()
            ))),
        }
    }
}

/// Extractor for a source's declared policy
pub fn extractor_for(policy: TimestampExtractionPolicy) -> Arc<dyn TimestampExtractor> {
    match policy {
        TimestampExtractionPolicy::RecordMetadata => Arc::new(MetadataTimestampExtractor),
        TimestampExtractionPolicy::Column { index } => Arc::new(ColumnTimestampExtractor::new(index)),
    }
}

/// Accepts records of one topic and stamps them with their event time
#[derive(Debug)]
pub struct SourceOperator {
    topic: String,
    extractor: Arc<dyn TimestampExtractor>,
    logger: String,
}

impl SourceOperator {
    pub fn new(
        topic: impl Into<String>,
        extractor: Arc<dyn TimestampExtractor>,
        logger: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            extractor,
            logger: logger.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// `None` when the record belongs to another topic
    pub fn accept(&self, record: &SourceRecord) -> SqlResult<Option<StreamRecord>> {
        if record.topic != self.topic {
            return Ok(None);
        }
        let timestamp = self.extractor.extract(&record.record)?;
        log::trace!(
            target: self.logger.as_str(),
            "Accepted record at offset {} (partition {}, event time {})",
            record.record.offset,
            record.record.partition,
            timestamp
        );
        Ok(Some(record.record.clone().with_timestamp(timestamp)))
    }
}
