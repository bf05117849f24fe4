use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeZone;
use mongodb::bson::{Document, doc};

use super::*;
use crate::config::{
    ENV_SINK_CONNECTION_STRING, ENV_SINK_CONTAINER, ENV_SOURCE_COLLECTION,
    ENV_SOURCE_CONNECTION_STRING, ENV_SOURCE_DATABASE,
};
use crate::model::{EncodedPayload, RecordBatch};

/// Calls observed by the spy collaborators
#[derive(Debug, Default)]
struct CallLog {
    connects: usize,
    fetches: usize,
    disconnects: usize,
    existence_checks: usize,
    writes: Vec<(String, String, String)>,
}

type SharedLog = Arc<Mutex<CallLog>>;

struct SpySource {
    log: SharedLog,
    records: Vec<Document>,
    failing_connects: usize,
    fail_disconnect: bool,
}

impl SpySource {
    fn new(log: &SharedLog, records: Vec<Document>) -> Self {
        Self {
            log: log.clone(),
            records,
            failing_connects: 0,
            fail_disconnect: false,
        }
    }
}

#[async_trait]
impl SourceConnector for SpySource {
    type Connection = usize;

    async fn connect(&self, _uri: &str, _timeouts: &ConnectTimeouts) -> Result<usize> {
        let mut log = self.log.lock().unwrap();
        log.connects += 1;
        if log.connects <= self.failing_connects {
            return Err(ExportError::connectivity(format!(
                "connect attempt {} refused",
                log.connects
            )));
        }
        Ok(log.connects)
    }

    async fn fetch_all(
        &self,
        _connection: &usize,
        _database: &str,
        collection: &str,
    ) -> Result<RecordBatch> {
        self.log.lock().unwrap().fetches += 1;
        RecordBatch::new(self.records.clone(), collection)
    }

    async fn disconnect(&self, _connection: usize) -> Result<()> {
        self.log.lock().unwrap().disconnects += 1;
        if self.fail_disconnect {
            return Err(ExportError::disconnect("socket already closed"));
        }
        Ok(())
    }
}

struct SpySink {
    log: SharedLog,
    container_exists: bool,
    fail_write: bool,
}

impl SpySink {
    fn new(log: &SharedLog) -> Self {
        Self {
            log: log.clone(),
            container_exists: true,
            fail_write: false,
        }
    }
}

#[async_trait]
impl SinkUploader for SpySink {
    type Container = String;

    fn container(&self, connection_string: &str, name: &str) -> Result<String> {
        if connection_string == "invalid" {
            return Err(ExportError::config_invalid("unparseable connection string"));
        }
        Ok(name.to_string())
    }

    async fn container_exists(&self, _container: &String) -> Result<bool> {
        self.log.lock().unwrap().existence_checks += 1;
        Ok(self.container_exists)
    }

    async fn write(
        &self,
        container: &String,
        blob_name: &str,
        payload: &EncodedPayload,
    ) -> Result<()> {
        let body = String::from_utf8_lossy(payload.as_bytes()).into_owned();
        self.log
            .lock()
            .unwrap()
            .writes
            .push((container.clone(), blob_name.to_string(), body));
        if self.fail_write {
            return Err(ExportError::transport("connection reset during upload"));
        }
        Ok(())
    }
}

fn settings() -> RunSettings {
    RunSettings {
        source_connection_string: Some("mongodb://localhost:27017".to_string()),
        source_database: Some("shop".to_string()),
        source_collection: Some("orders".to_string()),
        sink_connection_string: Some("memory://".to_string()),
        sink_container: Some("exports".to_string()),
    }
}

fn trigger() -> TriggerEvent {
    TriggerEvent::at(Utc.with_ymd_and_hms(2024, 5, 17, 3, 0, 0).unwrap())
}

fn sample_records() -> Vec<Document> {
    vec![doc! { "a": 1, "b": 2 }, doc! { "a": 3, "b": 4 }]
}

fn pipeline(source: SpySource, sink: SpySink) -> ExportPipeline<SpySource, SpySink> {
    ExportPipeline::new(source, sink).with_retry(RetryPolicy::new(3, Duration::from_millis(1_000)))
}

#[tokio::test]
async fn test_end_to_end_success() {
    let log = SharedLog::default();
    let pipeline = pipeline(SpySource::new(&log, sample_records()), SpySink::new(&log));

    let outcome = pipeline.run(&trigger(), &settings()).await;

    assert_eq!(
        outcome.terminal,
        Terminal::Success {
            blob_name: "data-export-2024-05-17T03:00:00.000Z.csv".to_string(),
            records: 2,
            bytes: 16,
        }
    );
    assert_eq!(
        outcome.states,
        vec![
            RunState::Init,
            RunState::Validated,
            RunState::Connected,
            RunState::Fetched,
            RunState::Encoded,
            RunState::Uploaded,
            RunState::Disconnected,
        ]
    );

    let log = log.lock().unwrap();
    assert_eq!(log.connects, 1);
    assert_eq!(log.disconnects, 1);
    assert_eq!(
        log.writes,
        vec![(
            "exports".to_string(),
            "data-export-2024-05-17T03:00:00.000Z.csv".to_string(),
            "\"a\",\"b\"\n1,2\n3,4\n".to_string(),
        )]
    );
}

#[tokio::test]
async fn test_missing_setting_aborts_before_connect() {
    let names = [
        ENV_SOURCE_CONNECTION_STRING,
        ENV_SOURCE_DATABASE,
        ENV_SOURCE_COLLECTION,
        ENV_SINK_CONNECTION_STRING,
        ENV_SINK_CONTAINER,
    ];

    for name in names {
        let mut incomplete = settings();
        match name {
            ENV_SOURCE_CONNECTION_STRING => incomplete.source_connection_string = None,
            ENV_SOURCE_DATABASE => incomplete.source_database = None,
            ENV_SOURCE_COLLECTION => incomplete.source_collection = None,
            ENV_SINK_CONNECTION_STRING => incomplete.sink_connection_string = None,
            _ => incomplete.sink_container = Some(String::new()),
        }

        let log = SharedLog::default();
        let pipeline = pipeline(SpySource::new(&log, sample_records()), SpySink::new(&log));
        let outcome = pipeline.run(&trigger(), &incomplete).await;

        assert_eq!(
            outcome.terminal,
            Terminal::Failed {
                kind: ErrorKind::ConfigMissing,
                at: RunState::Init,
            },
            "missing {name}"
        );
        assert_eq!(outcome.states, vec![RunState::Init]);

        let log = log.lock().unwrap();
        assert_eq!(log.connects, 0, "missing {name}");
        assert_eq!(log.disconnects, 0);
    }
}

#[tokio::test]
async fn test_empty_collection_still_disconnects() {
    let log = SharedLog::default();
    let pipeline = pipeline(SpySource::new(&log, Vec::new()), SpySink::new(&log));

    let outcome = pipeline.run(&trigger(), &settings()).await;

    assert_eq!(
        outcome.terminal,
        Terminal::Failed {
            kind: ErrorKind::NoData,
            at: RunState::Connected,
        }
    );
    assert_eq!(outcome.states.last(), Some(&RunState::Disconnected));

    let log = log.lock().unwrap();
    assert_eq!(log.fetches, 1);
    assert_eq!(log.disconnects, 1);
    assert_eq!(log.existence_checks, 0);
    assert!(log.writes.is_empty());
}

#[tokio::test]
async fn test_missing_container_never_writes() {
    let log = SharedLog::default();
    let mut sink = SpySink::new(&log);
    sink.container_exists = false;
    let pipeline = pipeline(SpySource::new(&log, sample_records()), sink);

    let outcome = pipeline.run(&trigger(), &settings()).await;

    assert_eq!(
        outcome.terminal,
        Terminal::Failed {
            kind: ErrorKind::ContainerNotFound,
            at: RunState::Encoded,
        }
    );

    let log = log.lock().unwrap();
    assert_eq!(log.existence_checks, 1);
    assert!(log.writes.is_empty());
    assert_eq!(log.disconnects, 1);
}

#[tokio::test]
async fn test_upload_failure_is_not_retried() {
    let log = SharedLog::default();
    let mut sink = SpySink::new(&log);
    sink.fail_write = true;
    let pipeline = pipeline(SpySource::new(&log, sample_records()), sink);

    let outcome = pipeline.run(&trigger(), &settings()).await;

    assert_eq!(outcome.failure_kind(), Some(ErrorKind::Transport));

    let log = log.lock().unwrap();
    assert_eq!(log.writes.len(), 1);
    assert_eq!(log.connects, 1);
    assert_eq!(log.disconnects, 1);
}

#[tokio::test]
async fn test_invalid_sink_connection_string_fails_before_connect() {
    let log = SharedLog::default();
    let pipeline = pipeline(SpySource::new(&log, sample_records()), SpySink::new(&log));
    let mut invalid = settings();
    invalid.sink_connection_string = Some("invalid".to_string());

    let outcome = pipeline.run(&trigger(), &invalid).await;

    assert_eq!(
        outcome.terminal,
        Terminal::Failed {
            kind: ErrorKind::ConfigInvalid,
            at: RunState::Validated,
        }
    );
    let log = log.lock().unwrap();
    assert_eq!(log.connects, 0);
    assert_eq!(log.fetches, 0);
    assert_eq!(log.disconnects, 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_recovers_within_retry_budget() {
    let log = SharedLog::default();
    let mut source = SpySource::new(&log, sample_records());
    source.failing_connects = 2;
    let pipeline = pipeline(source, SpySink::new(&log));

    let outcome = pipeline.run(&trigger(), &settings()).await;

    assert!(outcome.is_success());
    let log = log.lock().unwrap();
    assert_eq!(log.connects, 3);
    assert_eq!(log.disconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_exhausts_retry_budget() {
    let log = SharedLog::default();
    let mut source = SpySource::new(&log, sample_records());
    source.failing_connects = usize::MAX;
    let pipeline = pipeline(source, SpySink::new(&log));

    let outcome = pipeline.run(&trigger(), &settings()).await;

    assert_eq!(
        outcome.terminal,
        Terminal::Failed {
            kind: ErrorKind::Connectivity,
            at: RunState::Validated,
        }
    );
    let log = log.lock().unwrap();
    assert_eq!(log.connects, 3);
    assert_eq!(log.fetches, 0);
    assert_eq!(log.disconnects, 0);
}

#[tokio::test]
async fn test_disconnect_failure_does_not_mask_success() {
    let log = SharedLog::default();
    let mut source = SpySource::new(&log, sample_records());
    source.fail_disconnect = true;
    let pipeline = pipeline(source, SpySink::new(&log));

    let outcome = pipeline.run(&trigger(), &settings()).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.states.last(), Some(&RunState::Disconnected));
    assert_eq!(log.lock().unwrap().disconnects, 1);
}

#[tokio::test]
async fn test_disconnect_failure_does_not_mask_primary_error() {
    let log = SharedLog::default();
    let mut source = SpySource::new(&log, Vec::new());
    source.fail_disconnect = true;
    let pipeline = pipeline(source, SpySink::new(&log));

    let outcome = pipeline.run(&trigger(), &settings()).await;

    assert_eq!(outcome.failure_kind(), Some(ErrorKind::NoData));
}

#[tokio::test]
async fn test_outcome_carries_trigger_timestamp() {
    let log = SharedLog::default();
    let pipeline = pipeline(SpySource::new(&log, sample_records()), SpySink::new(&log));
    let mut late = trigger();
    late.past_due = true;

    let outcome = pipeline.run(&late, &settings()).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.fired_at, late.fired_at);
}
