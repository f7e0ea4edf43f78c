//! Partitioned sink: one output file and one preset set per category, owned by a single consumer.

use crossbeam_channel::{Receiver, select};
use log::{debug, info};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::types::{Category, ClassificationRecord, UnknownPolicy};
use crate::utils::config::{Config, PRESETS_FILE_NAME, QUERIES_FILE_NAME};

use super::classify::classify;
use super::shutdown::Shutdown;

const NEWLINE: &str = "\n";

/// Sink settings taken from [`Config`].
#[derive(Clone, Debug)]
pub struct SinkSettings {
    pub output_dir: PathBuf,
    pub csv_separator: String,
    pub presets_separator: String,
    pub unknown_policy: UnknownPolicy,
}

impl From<&Config> for SinkSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            output_dir: cfg.output_dir.clone(),
            csv_separator: cfg.csv_separator.clone(),
            presets_separator: cfg.presets_separator.clone(),
            unknown_policy: cfg.unknown_policy,
        }
    }
}

/// `<output_dir>/<Category>`
pub fn category_dir(output_dir: &Path, category: Category) -> PathBuf {
    output_dir.join(category.as_str())
}

/// Writer plus accumulated preset identifiers for one category.
struct CategoryLedger {
    category: Category,
    dir: PathBuf,
    writer: BufWriter<File>,
    presets: HashSet<String>,
    rows: usize,
}

impl CategoryLedger {
    fn open(output_dir: &Path, category: Category, separator: &str) -> Result<Self, PipelineError> {
        let dir = category_dir(output_dir, category);
        fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;

        // no list survives from an earlier run until this one finishes cleanly
        let presets_path = dir.join(PRESETS_FILE_NAME);
        File::create(&presets_path).map_err(|e| PipelineError::io(&presets_path, e))?;

        let path = dir.join(QUERIES_FILE_NAME);
        let file = File::create(&path).map_err(|e| PipelineError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(format!("text{separator}query{NEWLINE}").as_bytes())
            .map_err(|e| PipelineError::io(&path, e))?;

        Ok(Self {
            category,
            dir,
            writer,
            presets: HashSet::new(),
            rows: 0,
        })
    }

    fn sorted_presets(&self) -> Vec<&str> {
        let mut presets: Vec<&str> = self.presets.iter().map(String::as_str).collect();
        presets.sort_unstable();
        presets
    }

    fn write_presets(&self, separator: &str) -> Result<(), PipelineError> {
        let path = self.dir.join(PRESETS_FILE_NAME);
        let line = self.sorted_presets().join(separator);
        fs::write(&path, line).map_err(|e| PipelineError::io(&path, e))
    }

    fn close(mut self) -> Result<(), PipelineError> {
        let path = self.dir.join(QUERIES_FILE_NAME);
        self.writer
            .flush()
            .map_err(|e| PipelineError::io(&path, e))?;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| PipelineError::io(&path, e.into_error()))?;
        file.sync_all().map_err(|e| PipelineError::io(&path, e))
    }
}

/// What [`PartitionedSink::accept`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    Written(Category),
    SkippedUnknown,
}

/// Rows written per category and unknowns skipped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SinkStats {
    pub written: Vec<(Category, usize)>,
    pub skipped_unknown: usize,
}

/// Exclusive owner of every category's output. Not shared between threads.
pub struct PartitionedSink {
    settings: SinkSettings,
    ledgers: Vec<CategoryLedger>,
    skipped_unknown: usize,
}

impl PartitionedSink {
    /// Create every category directory and truncate its files. On failure nothing stays open.
    pub fn create(settings: SinkSettings) -> Result<Self, PipelineError> {
        let mut ledgers = Vec::with_capacity(Category::PERSISTED.len());
        for category in Category::PERSISTED {
            // on error, ledgers opened so far are dropped (and closed) with the Vec
            ledgers.push(CategoryLedger::open(
                &settings.output_dir,
                category,
                &settings.csv_separator,
            )?);
        }
        debug!("Sink ready under {}", settings.output_dir.display());
        Ok(Self {
            settings,
            ledgers,
            skipped_unknown: 0,
        })
    }

    fn ledger_mut(&mut self, category: Category) -> Option<&mut CategoryLedger> {
        self.ledgers.iter_mut().find(|l| l.category == category)
    }

    fn validate(&self, record: &ClassificationRecord) -> Result<(), PipelineError> {
        if record.text.is_empty() || record.filter_value.is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        let sep = &self.settings.csv_separator;
        for value in [&record.text, &record.filter_value] {
            if value.contains(sep.as_str()) || value.contains(NEWLINE) {
                return Err(PipelineError::SeparatorCollision {
                    value: value.clone(),
                    separator: sep.clone(),
                });
            }
        }
        Ok(())
    }

    /// Validate and persist one record. Nothing is written for a rejected record.
    pub fn accept(&mut self, record: ClassificationRecord) -> Result<Accepted, PipelineError> {
        self.validate(&record)?;

        let line = format!(
            "{}{}{}{NEWLINE}",
            record.text, self.settings.csv_separator, record.filter_value
        );
        let policy = self.settings.unknown_policy;
        let Some(ledger) = self.ledger_mut(record.category) else {
            return match policy {
                UnknownPolicy::Skip => {
                    info!("Query {:?} has been skipped (unknown category)", record.text);
                    self.skipped_unknown += 1;
                    Ok(Accepted::SkippedUnknown)
                }
                UnknownPolicy::Fail => Err(PipelineError::UnknownCategory { text: record.text }),
            };
        };

        ledger.writer.write_all(line.as_bytes()).map_err(|e| {
            PipelineError::io(ledger.dir.join(QUERIES_FILE_NAME), e)
        })?;
        ledger.rows += 1;
        ledger
            .presets
            .extend(record.preset_ids.into_iter().filter(|id| !id.is_empty()));
        info!("{:?} query has finished ({})", record.text, record.category);
        Ok(Accepted::Written(record.category))
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            written: self.ledgers.iter().map(|l| (l.category, l.rows)).collect(),
            skipped_unknown: self.skipped_unknown,
        }
    }

    /// Clean end of stream: write every sorted preset list, then flush and close everything.
    pub fn finish(self) -> Result<SinkStats, PipelineError> {
        let stats = self.stats();
        let sep = self.settings.presets_separator.clone();
        let errors: Vec<PipelineError> = self
            .ledgers
            .iter()
            .filter_map(|l| l.write_presets(&sep).err())
            .collect();
        match PipelineError::collect(errors.into_iter().chain(self.close().err())) {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }

    /// Flush and close every writer, attempting all of them and aggregating failures.
    /// Rows already written stay on disk.
    pub fn close(self) -> Result<(), PipelineError> {
        let errors: Vec<PipelineError> = self
            .ledgers
            .into_iter()
            .filter_map(|l| l.close().err())
            .collect();
        PipelineError::collect(errors).map_or(Ok(()), Err)
    }

    /// Consume bodies until the stream closes cleanly, then [`finish`](Self::finish).
    ///
    /// On a fatal error the shutdown signal fires, consumption stops, and everything written so
    /// far is flushed and kept. When shutdown fired elsewhere this returns [`PipelineError::Aborted`].
    pub fn run(
        mut self,
        bodies: Receiver<Vec<u8>>,
        shutdown: &Shutdown,
    ) -> Result<SinkStats, PipelineError> {
        let outcome = loop {
            let next = select! {
                recv(bodies) -> msg => msg.ok(),
                recv(shutdown.done()) -> _ => None,
            };
            // closed stream after a shutdown elsewhere is an abort, not a clean end
            let Some(body) = next else {
                break if shutdown.is_triggered() {
                    Err(PipelineError::Aborted)
                } else {
                    Ok(())
                };
            };
            if let Err(err) = classify(&body).and_then(|record| self.accept(record)) {
                shutdown.trigger();
                break Err(err);
            }
        };
        drop(bodies);

        let result = match outcome {
            Ok(()) => self.finish(),
            Err(err) => {
                let closed = self.close().err();
                Err(PipelineError::collect(std::iter::once(err).chain(closed))
                    .unwrap_or(PipelineError::Aborted))
            }
        };
        info!("Saver has finished");
        result
    }
}

/// Read back a category's preset identifiers (empty when the list is empty).
pub fn read_preset_list(
    output_dir: &Path,
    category: Category,
    separator: &str,
) -> Result<Vec<String>, PipelineError> {
    let path = category_dir(output_dir, category).join(PRESETS_FILE_NAME);
    let line = fs::read_to_string(&path).map_err(|e| PipelineError::io(&path, e))?;
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Ok(Vec::new());
    }
    Ok(line.split(separator).map(str::to_string).collect())
}
