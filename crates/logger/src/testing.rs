use crate::error::{Error, Result};
use crate::sink::RecordSink;
use std::sync::{Arc, Mutex};

/// In-memory sink collecting every appended record.
#[derive(Clone, Default)]
pub(crate) struct MemorySink {
    records: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub(crate) fn lines(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|line| match serde_json::from_slice(line).unwrap() {
                serde_json::Value::Object(map) => map,
                other => panic!("expected object, got {other}"),
            })
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn append(&self, record: &[u8]) -> Result<()> {
        self.records.lock().unwrap().push(record.to_vec());
        Ok(())
    }
}

/// Sink whose every write fails.
pub(crate) struct BrokenSink;

impl RecordSink for BrokenSink {
    fn append(&self, _record: &[u8]) -> Result<()> {
        Err(Error::Config("disk on fire".into()))
    }
}
