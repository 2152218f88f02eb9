use crate::common::{SerializationHook, TEMP_FILE_SUFFIX};
use crate::datastore_config::DatastoreConfig;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::store::LogRecord;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The append-only datafile of a datastore.
///
/// Every mutation appends one line per affected document or index. Loading replays the
/// lines in order; compaction rewrites the file with one line per live document and index
/// through a temporary `<file>~` that is renamed over the datafile once it is synced. An
/// in-memory datastore has no datafile and every operation here is a no-op.
pub struct Persistence {
    filename: Option<PathBuf>,
    after_serialization: Option<SerializationHook>,
    before_deserialization: Option<SerializationHook>,
}

impl Persistence {
    pub fn new(config: &DatastoreConfig) -> Persistence {
        Persistence {
            filename: config.filename(),
            after_serialization: config.after_serialization(),
            before_deserialization: config.before_deserialization(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.filename.is_none()
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Appends `records` with a single write.
    pub fn persist_new_state(&self, records: &[LogRecord]) -> LodeResult<()> {
        let Some(filename) = &self.filename else {
            return Ok(());
        };
        if records.is_empty() {
            return Ok(());
        }

        let mut batch = String::new();
        for record in records {
            batch.push_str(&self.encode(record)?);
            batch.push('\n');
        }

        let mut file = OpenOptions::new().create(true).append(true).open(filename)?;
        file.write_all(batch.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Reads every record of the datafile in order.
    ///
    /// A datafile left behind by a compaction that crashed before its rename is recovered
    /// from the temporary file first. An unparseable last line is dropped with a warning,
    /// an unparseable line anywhere else fails the read.
    pub fn read_records(&self) -> LodeResult<Vec<LogRecord>> {
        let Some(filename) = &self.filename else {
            return Ok(Vec::new());
        };
        self.ensure_datafile_integrity(filename)?;

        let content = fs::read_to_string(filename)?;
        let lines: Vec<(usize, &str)> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();

        let mut records = Vec::with_capacity(lines.len());
        for (position, (line_number, line)) in lines.iter().enumerate() {
            match self.decode(line) {
                Ok(record) => records.push(record),
                Err(e) if position + 1 == lines.len() => {
                    log::warn!(
                        "Discarding unreadable last line {} of {}: {}",
                        line_number + 1,
                        filename.display(),
                        e
                    );
                }
                Err(e) => {
                    log::error!(
                        "Unreadable line {} in {}: {}",
                        line_number + 1,
                        filename.display(),
                        e
                    );
                    return Err(LodeError::new_with_cause(
                        &format!(
                            "Unreadable line {} in {}",
                            line_number + 1,
                            filename.display()
                        ),
                        ErrorKind::EncodingError,
                        e,
                    ));
                }
            }
        }
        log::debug!("Read {} records from {}", records.len(), filename.display());
        Ok(records)
    }

    /// Replaces the datafile with `records`, crash safe.
    pub fn compact(&self, records: &[LogRecord]) -> LodeResult<()> {
        let Some(filename) = &self.filename else {
            return Ok(());
        };
        let temp = temp_path(filename);

        let mut content = String::new();
        for record in records {
            content.push_str(&self.encode(record)?);
            content.push('\n');
        }

        {
            let mut file = File::create(&temp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, filename)?;
        sync_parent_dir(filename);
        log::debug!(
            "Compacted {} into {} records",
            filename.display(),
            records.len()
        );
        Ok(())
    }

    /// Deletes the datafile and any leftover temporary file.
    pub fn drop_file(&self) -> LodeResult<()> {
        let Some(filename) = &self.filename else {
            return Ok(());
        };
        for path in [filename.clone(), temp_path(filename)] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn ensure_datafile_integrity(&self, filename: &Path) -> LodeResult<()> {
        if let Some(parent) = filename.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        if filename.exists() {
            return Ok(());
        }

        let temp = temp_path(filename);
        if temp.exists() {
            log::warn!(
                "Datafile {} missing, recovering it from {}",
                filename.display(),
                temp.display()
            );
            fs::rename(&temp, filename)?;
            sync_parent_dir(filename);
        } else {
            File::create(filename)?;
        }
        Ok(())
    }

    fn encode(&self, record: &LogRecord) -> LodeResult<String> {
        let line = record.to_line()?;
        let line = match &self.after_serialization {
            Some(hook) => hook(&line),
            None => line,
        };
        if line.contains('\n') {
            log::error!("Serialized record contains a line break");
            return Err(LodeError::new(
                "Serialized record contains a line break",
                ErrorKind::EncodingError,
            ));
        }
        Ok(line)
    }

    fn decode(&self, line: &str) -> LodeResult<LogRecord> {
        match &self.before_deserialization {
            Some(hook) => LogRecord::from_line(&hook(line)),
            None => LogRecord::from_line(line),
        }
    }
}

fn temp_path(filename: &Path) -> PathBuf {
    let mut name = filename.as_os_str().to_owned();
    name.push(TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}

// directories cannot be opened for sync on every platform
fn sync_parent_dir(filename: &Path) {
    let Some(parent) = filename.parent() else {
        return;
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        log::debug!("Could not sync directory {}: {}", parent.display(), e);
    }
}
