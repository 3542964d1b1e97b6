use crate::error::RouterError;
use engine_config::settings::load::CsvOptions;
use engine_core::{budget::ErrorCoordinator, hashing::Hashinator};
use model::{
    execution::{
        errors::ConversionError,
        failed_row::{FailureKind, RowError},
    },
    records::record::{QueueItem, Record},
    schema::descriptor::LoadDescriptor,
};
use std::{io::Read, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Counts kept by the router for the final log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Records read after header and skip handling.
    pub read: u64,
    pub routed: u64,
    pub rejected: u64,
}

/// Reads CSV records and hands each to the queue of the partition owning it.
///
/// Stops early when the shared stop flag is raised. Every partition queue
/// receives exactly one end-of-stream marker, whatever the outcome.
pub struct CsvRouter {
    options: CsvOptions,
    descriptor: Arc<LoadDescriptor>,
    hashinator: Hashinator,
    queues: Vec<mpsc::Sender<QueueItem>>,
    coordinator: Arc<ErrorCoordinator>,
}

impl CsvRouter {
    pub fn new(
        options: CsvOptions,
        descriptor: Arc<LoadDescriptor>,
        queues: Vec<mpsc::Sender<QueueItem>>,
        coordinator: Arc<ErrorCoordinator>,
    ) -> Self {
        let hashinator = Hashinator::new(descriptor.partition_count);
        Self {
            options,
            descriptor,
            hashinator,
            queues,
            coordinator,
        }
    }

    /// Reading runs on the blocking pool; queues are fed with blocking sends.
    pub async fn run<R: Read + Send + 'static>(
        self,
        input: R,
    ) -> Result<RouterStats, RouterError> {
        tokio::task::spawn_blocking(move || self.route(input)).await?
    }

    fn route<R: Read>(self, input: R) -> Result<RouterStats, RouterError> {
        let mut stats = RouterStats::default();
        let result = self.route_all(input, &mut stats);

        for queue in &self.queues {
            // A closed queue belongs to a worker that already stopped.
            let _ = queue.blocking_send(QueueItem::EndOfStream);
        }

        info!(
            read = stats.read,
            routed = stats.routed,
            rejected = stats.rejected,
            "Finished reading input"
        );
        result.map(|()| stats)
    }

    fn route_all<R: Read>(&self, input: R, stats: &mut RouterStats) -> Result<(), RouterError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter as u8)
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        let to_skip = self.options.skip + u64::from(self.options.header);
        let mut seen = 0u64;
        let mut bytes = ::csv::ByteRecord::new();

        loop {
            if self.coordinator.is_stopped() {
                debug!("Stop requested, no more records will be read");
                return Ok(());
            }
            if self
                .options
                .limit_rows
                .is_some_and(|limit| stats.read >= limit)
            {
                return Ok(());
            }

            if !reader.read_byte_record(&mut bytes)? {
                return Ok(());
            }

            seen += 1;
            if seen <= to_skip {
                continue;
            }
            stats.read += 1;

            let line = bytes.position().map_or(seen, |p| p.line());
            let raw = self.raw_text(&bytes);
            let parsed = match ::csv::StringRecord::from_byte_record(bytes.clone()) {
                Ok(record) => self.to_record(line, raw, &record),
                Err(e) => {
                    stats.rejected += 1;
                    let message = format!("invalid UTF-8: {}", e.utf8_error());
                    self.reject(RowError::new(line, raw, message, FailureKind::Malformed));
                    continue;
                }
            };

            let partition = match self.partition_of(&parsed) {
                Ok(partition) => partition,
                Err(row_error) => {
                    stats.rejected += 1;
                    self.reject(row_error);
                    continue;
                }
            };

            if self.queues[partition].blocking_send(parsed.into()).is_err() {
                warn!(partition, "Partition queue closed, stopping input");
                return Ok(());
            }
            stats.routed += 1;
        }
    }

    fn to_record(&self, line: u64, raw: String, record: &::csv::StringRecord) -> Record {
        let null = self.options.null_string.as_deref();
        let fields = record
            .iter()
            .map(|field| (Some(field) != null).then(|| field.to_string()))
            .collect();
        Record::new(line, raw, fields)
    }

    /// The record re-rendered with the input delimiter and quoting. Bytes that
    /// are not UTF-8 are replaced.
    fn raw_text(&self, record: &::csv::ByteRecord) -> String {
        let mut writer = ::csv::WriterBuilder::new()
            .delimiter(self.options.delimiter as u8)
            .from_writer(Vec::new());
        let rendered = writer
            .write_byte_record(record)
            .ok()
            .and_then(|()| writer.into_inner().ok());

        match rendered {
            Some(text) => String::from_utf8_lossy(&text)
                .trim_end_matches(['\r', '\n'])
                .to_string(),
            None => record
                .iter()
                .map(String::from_utf8_lossy)
                .collect::<Vec<_>>()
                .join(&self.options.delimiter.to_string()),
        }
    }

    fn partition_of(&self, record: &Record) -> Result<usize, RowError> {
        let expected = self.descriptor.column_count();
        if record.len() != expected {
            let message = ConversionError::FieldCount {
                expected,
                actual: record.len(),
            };
            return Err(RowError::new(
                record.line,
                record.raw.clone(),
                message.to_string(),
                FailureKind::Malformed,
            ));
        }

        let Some(partition_column) = self.descriptor.mode.partition_column() else {
            return Ok(0);
        };

        let key = partition_column
            .column_type
            .parse(record.field(partition_column.index))
            .map_err(|e| RowError::conversion(record, e.to_string()))?;
        let partition = self
            .hashinator
            .partition_for_value(&key, partition_column.column_type);

        Ok(partition as usize % self.queues.len().max(1))
    }

    fn reject(&self, row_error: RowError) {
        if self.coordinator.report(row_error) {
            debug!("Error budget exceeded while reading input");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::{column_type::ColumnType, value::Value},
        schema::{
            column::{ColumnInfo, PartitionColumn},
            descriptor::LoadMode,
        },
    };
    use tokio_util::sync::CancellationToken;

    fn descriptor(partition_count: u32) -> Arc<LoadDescriptor> {
        Arc::new(LoadDescriptor {
            mode: LoadMode::SinglePartitionTable {
                table: "PEOPLE".into(),
                partition_column: PartitionColumn {
                    index: 0,
                    column_type: ColumnType::BigInt,
                },
            },
            columns: vec![
                ColumnInfo::new("id", ColumnType::BigInt),
                ColumnInfo::new("name", ColumnType::VarChar),
            ],
            partition_count,
        })
    }

    fn queues(n: usize) -> (Vec<mpsc::Sender<QueueItem>>, Vec<mpsc::Receiver<QueueItem>>) {
        (0..n).map(|_| mpsc::channel(256)).unzip()
    }

    fn collect(rx: &mut mpsc::Receiver<QueueItem>) -> (Vec<Record>, usize) {
        let mut records = Vec::new();
        let mut ends = 0;
        while let Ok(item) = rx.try_recv() {
            match item {
                QueueItem::Data(record) => records.push(record),
                QueueItem::EndOfStream => ends += 1,
            }
        }
        (records, ends)
    }

    #[tokio::test]
    async fn routes_by_partition_key_and_ends_every_queue() {
        let (tx, mut rx) = queues(4);
        let coordinator = Arc::new(ErrorCoordinator::new(10, CancellationToken::new()));
        let router = CsvRouter::new(CsvOptions::default(), descriptor(4), tx, coordinator);
        let input: String = (1..=40).map(|i| format!("{i},name{i}\n")).collect();

        let stats = router.run(std::io::Cursor::new(input)).await.unwrap();
        assert_eq!(stats.routed, 40);

        let hashinator = Hashinator::new(4);
        let mut total = 0;
        for (partition, rx) in rx.iter_mut().enumerate() {
            let (records, ends) = collect(rx);
            assert_eq!(ends, 1);
            let mut previous = 0;
            for record in &records {
                let id: i64 = record.field(0).unwrap().parse().unwrap();
                let owner = hashinator.partition_for_value(&Value::Int(id), ColumnType::BigInt);
                assert_eq!(owner as usize, partition);
                assert!(record.line > previous);
                previous = record.line;
            }
            total += records.len();
        }
        assert_eq!(total, 40);
    }

    #[tokio::test]
    async fn reports_malformed_rows_and_bad_keys() {
        let (tx, mut rx) = queues(1);
        let coordinator = Arc::new(ErrorCoordinator::new(10, CancellationToken::new()));
        let router = CsvRouter::new(
            CsvOptions::default(),
            descriptor(1),
            tx,
            Arc::clone(&coordinator),
        );

        let stats = router
            .run("1,a\n2\nx,b\n4,d\n".as_bytes())
            .await
            .unwrap();

        assert_eq!(stats.read, 4);
        assert_eq!(stats.routed, 2);
        let errors = coordinator.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 2);
        assert_eq!(errors[0].kind, FailureKind::Malformed);
        assert!(errors[0].message.starts_with("Missing or Invalid Data in Row."));
        assert_eq!(errors[1].line, 3);
        assert_eq!(errors[1].kind, FailureKind::Conversion);

        let (records, ends) = collect(&mut rx[0]);
        assert_eq!(records.len(), 2);
        assert_eq!(ends, 1);
    }

    #[tokio::test]
    async fn invalid_utf8_row_keeps_its_raw_text() {
        let (tx, mut rx) = queues(1);
        let coordinator = Arc::new(ErrorCoordinator::new(10, CancellationToken::new()));
        let router = CsvRouter::new(
            CsvOptions::default(),
            descriptor(1),
            tx,
            Arc::clone(&coordinator),
        );

        let stats = router
            .run(&b"1,a\n2,b\xff\n3,c\n"[..])
            .await
            .unwrap();

        assert_eq!(stats.read, 3);
        assert_eq!(stats.routed, 2);
        assert_eq!(stats.rejected, 1);
        let errors = coordinator.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 2);
        assert_eq!(errors[0].kind, FailureKind::Malformed);
        assert_eq!(errors[0].raw, "2,b\u{FFFD}");
        assert!(errors[0].message.starts_with("invalid UTF-8"));

        let (records, ends) = collect(&mut rx[0]);
        assert_eq!(records.iter().map(|r| r.line).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(ends, 1);
    }

    #[tokio::test]
    async fn reading_does_not_hold_the_runtime_thread() {
        let (tx, mut rx) = mpsc::channel(1);
        let coordinator = Arc::new(ErrorCoordinator::new(10, CancellationToken::new()));
        let router = CsvRouter::new(CsvOptions::default(), descriptor(1), vec![tx], coordinator);
        let input: String = (1..=50).map(|i| format!("{i},name{i}\n")).collect();

        // The consumer shares this single-threaded runtime with the caller.
        let consumer = tokio::spawn(async move {
            let mut rows = 0;
            while let Some(item) = rx.recv().await {
                match item {
                    QueueItem::Data(_) => rows += 1,
                    QueueItem::EndOfStream => break,
                }
            }
            rows
        });

        let stats = router.run(std::io::Cursor::new(input)).await.unwrap();

        assert_eq!(stats.routed, 50);
        assert_eq!(consumer.await.unwrap(), 50);
    }

    #[tokio::test]
    async fn honours_header_skip_limit_and_null_string() {
        let (tx, mut rx) = queues(1);
        let coordinator = Arc::new(ErrorCoordinator::new(10, CancellationToken::new()));
        let options = CsvOptions {
            delimiter: '|',
            header: true,
            skip: 1,
            limit_rows: Some(2),
            null_string: Some("\\N".into()),
        };
        let router = CsvRouter::new(options, descriptor(1), tx, coordinator);

        router
            .run("id|name\n1|skipped\n2|\\N\n3|\"c|d\"\n4|e\n".as_bytes())
            .await
            .unwrap();

        let (records, _) = collect(&mut rx[0]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].line, 3);
        assert_eq!(records[0].fields[1], None);
        assert_eq!(records[1].field(1), Some("c|d"));
        assert_eq!(records[1].raw, "3|\"c|d\"");
    }

    #[tokio::test]
    async fn stops_reading_once_stopped() {
        let (tx, mut rx) = queues(1);
        let stop = CancellationToken::new();
        let coordinator = Arc::new(ErrorCoordinator::new(1, stop.clone()));
        let router = CsvRouter::new(CsvOptions::default(), descriptor(1), tx, coordinator);

        // The first bad row exhausts the budget.
        let stats = router.run("x,a\n2,b\n3,c\n".as_bytes()).await.unwrap();

        assert!(stop.is_cancelled());
        assert_eq!(stats.routed, 0);
        let (records, ends) = collect(&mut rx[0]);
        assert!(records.is_empty());
        assert_eq!(ends, 1);
    }
}
