//! Corpus partitions
//!
//! Three disjoint ordered lists of classified drivers: *valid* (ran to
//! completion or exited through the catch-all handler), *crashes*
//! (new-fingerprint crashing drivers), and *uncompilable*. Entries live
//! until process exit and are flushed to per-partition directories of
//! driver source files plus a JSONL metadata sidecar on shutdown.

use std::path::Path;

use serde::Serialize;

use crate::emitter::{Emitter, Scaffold};
use crate::error::Result;
use crate::exec::CrashMemo;
use crate::ir::Driver;
use crate::random::Rng;

/// Which corpus list an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Ran to completion (or caught an exception)
    Valid,
    /// Crashed with a new fingerprint
    Crash,
    /// Failed to compile
    Uncompilable,
}

/// A driver plus its outcome memo.
#[derive(Debug, Clone)]
pub struct ClassifiedDriver {
    /// Sequential id, unique across all partitions
    pub id: u32,
    /// The driver itself
    pub driver: Driver,
    /// Crash/compile memo (empty default for valid entries)
    pub memo: CrashMemo,
    /// Return code observed at classification
    pub return_code: i32,
    /// Seconds since loop start at admission
    pub timestamp_secs: u64,
    /// Whether the entry has been written out
    pub flushed: bool,
}

#[derive(Serialize)]
struct CorpusRecord<'a> {
    id: u32,
    partition: Partition,
    timestamp_secs: u64,
    return_code: i32,
    fingerprint: Option<&'a str>,
    location: Option<&'a str>,
    crash_line: Option<u32>,
    compile_error: Option<&'a str>,
}

/// Hour horizons used for the timestamped valid-corpus partitions.
const FLUSH_HORIZONS_HOURS: [u64; 5] = [1, 3, 6, 12, 24];

/// The three-partition corpus.
#[derive(Debug, Default)]
pub struct DriverQueue {
    valid: Vec<ClassifiedDriver>,
    crashes: Vec<ClassifiedDriver>,
    uncompilable: Vec<ClassifiedDriver>,
    next_id: u32,
}

impl DriverQueue {
    /// Empty corpus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn classify(
        &mut self,
        driver: Driver,
        memo: CrashMemo,
        return_code: i32,
        timestamp_secs: u64,
    ) -> ClassifiedDriver {
        self.next_id += 1;
        ClassifiedDriver {
            id: self.next_id,
            driver,
            memo,
            return_code,
            timestamp_secs,
            flushed: false,
        }
    }

    /// Admit a coverage-improving driver.
    pub fn add_valid(&mut self, driver: Driver, return_code: i32, timestamp_secs: u64) -> u32 {
        let entry = self.classify(driver, CrashMemo::default(), return_code, timestamp_secs);
        let id = entry.id;
        self.valid.push(entry);
        id
    }

    /// Admit a new-fingerprint crashing driver.
    pub fn add_crash(
        &mut self,
        driver: Driver,
        memo: CrashMemo,
        return_code: i32,
        timestamp_secs: u64,
    ) -> u32 {
        let entry = self.classify(driver, memo, return_code, timestamp_secs);
        let id = entry.id;
        self.crashes.push(entry);
        id
    }

    /// Admit an uncompilable driver with its diagnostics.
    pub fn add_uncompilable(
        &mut self,
        driver: Driver,
        memo: CrashMemo,
        timestamp_secs: u64,
    ) -> u32 {
        let entry = self.classify(driver, memo, -1, timestamp_secs);
        let id = entry.id;
        self.uncompilable.push(entry);
        id
    }

    /// Valid entries, admission order.
    #[must_use]
    pub fn valid(&self) -> &[ClassifiedDriver] {
        &self.valid
    }

    /// Crash entries, admission order.
    #[must_use]
    pub fn crashes(&self) -> &[ClassifiedDriver] {
        &self.crashes
    }

    /// Uncompilable entries, admission order.
    #[must_use]
    pub fn uncompilable(&self) -> &[ClassifiedDriver] {
        &self.uncompilable
    }

    /// Valid entries admitted no later than `max_secs`.
    pub fn valid_by_timestamp(&self, max_secs: u64) -> impl Iterator<Item = &ClassifiedDriver> {
        self.valid.iter().filter(move |e| e.timestamp_secs <= max_secs)
    }

    /// (valid, crash, uncompilable) counts.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.valid.len(), self.crashes.len(), self.uncompilable.len())
    }

    /// Flush all three partitions under `out_dir`: one source file per
    /// driver, hour-horizon subsets of the valid corpus, and a JSONL
    /// metadata sidecar.
    pub fn flush(
        &mut self,
        emitter: &Emitter<'_>,
        rng: &mut Rng,
        out_dir: &Path,
        includes: &[String],
    ) -> Result<()> {
        let valid_dir = out_dir.join("out_valid");
        let crash_dir = out_dir.join("out_crash");
        let uncompilable_dir = out_dir.join("out_uncompilable");
        std::fs::create_dir_all(&valid_dir)?;
        std::fs::create_dir_all(&crash_dir)?;
        std::fs::create_dir_all(&uncompilable_dir)?;

        let mut jsonl = String::new();

        for entry in &mut self.valid {
            let caught = entry.return_code == crate::exec::CAUGHT_EXCEPTION_RETURN;
            let scaffold = Scaffold::for_corpus(includes.to_vec(), caught, None);
            let source = emitter.driver_source(&mut entry.driver, rng, &scaffold);
            std::fs::write(valid_dir.join(format!("driver_{}.cpp", entry.id)), &source)?;
            entry.flushed = true;
            push_record(&mut jsonl, entry, Partition::Valid)?;
        }
        for horizon in FLUSH_HORIZONS_HOURS {
            let horizon_dir = valid_dir.join(horizon.to_string());
            std::fs::create_dir_all(&horizon_dir)?;
            let max_secs = horizon * 3600;
            let subset: Vec<u32> = self
                .valid_by_timestamp(max_secs)
                .map(|e| e.id)
                .collect();
            for id in subset {
                let entry = self
                    .valid
                    .iter_mut()
                    .find(|e| e.id == id)
                    .expect("subset id present");
                let caught = entry.return_code == crate::exec::CAUGHT_EXCEPTION_RETURN;
                let scaffold = Scaffold::for_corpus(includes.to_vec(), caught, None);
                let source = emitter.driver_source(&mut entry.driver, rng, &scaffold);
                std::fs::write(horizon_dir.join(format!("driver_{id}.cpp")), &source)?;
            }
        }

        for entry in &mut self.crashes {
            let crash_tag = entry
                .memo
                .crash_line
                .and_then(|line| crash_statement_index(line, includes.len()));
            let scaffold = Scaffold::for_corpus(includes.to_vec(), false, crash_tag);
            let mut source = String::new();
            if let Some(location) = &entry.memo.location {
                source.push_str(&format!("// location: {location}\n"));
            }
            if let Some(fingerprint) = &entry.memo.fingerprint {
                source.push_str(&format!("// crash fp: {fingerprint}\n"));
            }
            source.push_str(&emitter.driver_source(&mut entry.driver, rng, &scaffold));
            std::fs::write(crash_dir.join(format!("driver_{}.cpp", entry.id)), &source)?;
            entry.flushed = true;
            push_record(&mut jsonl, entry, Partition::Crash)?;
        }

        for entry in &mut self.uncompilable {
            let scaffold = Scaffold::for_corpus(includes.to_vec(), false, None);
            let mut source = String::new();
            if let Some(diag) = &entry.memo.compile_error {
                source.push_str(&format!(
                    "/* compilation output:\n{}\n*/\n",
                    diag.replace("*/", "* /")
                ));
            }
            source.push_str(&emitter.driver_source(&mut entry.driver, rng, &scaffold));
            std::fs::write(
                uncompilable_dir.join(format!("driver_{}.cpp", entry.id)),
                &source,
            )?;
            entry.flushed = true;
            push_record(&mut jsonl, entry, Partition::Uncompilable)?;
        }

        std::fs::write(out_dir.join("corpus.jsonl"), jsonl)?;
        Ok(())
    }
}

fn push_record(jsonl: &mut String, entry: &ClassifiedDriver, partition: Partition) -> Result<()> {
    let record = CorpusRecord {
        id: entry.id,
        partition,
        timestamp_secs: entry.timestamp_secs,
        return_code: entry.return_code,
        fingerprint: entry.memo.fingerprint.as_deref(),
        location: entry.memo.location.as_deref(),
        crash_line: entry.memo.crash_line,
        compile_error: entry.memo.compile_error.as_deref(),
    };
    jsonl.push_str(&serde_json::to_string(&record)?);
    jsonl.push('\n');
    Ok(())
}

/// Map a crash line in the temporary driver back to its statement
/// index. The temporary layout is: includes, a blank line, `int main()
/// {`, ` try {`, then one statement per line.
#[must_use]
pub fn crash_statement_index(crash_line: u32, include_count: usize) -> Option<usize> {
    let first_statement_line = include_count as u32 + 4;
    crash_line.checked_sub(first_statement_line).map(|i| i as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IdGen, Operand, PrimitiveOp, Statement};
    use crate::model::{Executable, ModelBuilder};
    use crate::types::context::TemplateContext;
    use crate::types::TypeTable;

    fn tiny_driver(types: &TypeTable) -> Driver {
        let mut ids = IdGen::new();
        let stmt = Statement::primitive_unary(
            ids.fresh(),
            PrimitiveOp::Nop,
            Operand::constant(types.int_value(), "1"),
        );
        Driver::new(vec![stmt], TemplateContext::new(), ids.high_water())
    }

    #[test]
    fn test_ids_are_sequential_across_partitions() {
        let (_, types) = ModelBuilder::new().build();
        let mut queue = DriverQueue::new();
        let a = queue.add_valid(tiny_driver(&types), 0, 1);
        let b = queue.add_crash(tiny_driver(&types), CrashMemo::default(), 139, 2);
        let c = queue.add_uncompilable(
            tiny_driver(&types),
            CrashMemo::for_compile_error("boom"),
            3,
        );
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(queue.counts(), (1, 1, 1));
    }

    #[test]
    fn test_valid_by_timestamp_filters() {
        let (_, types) = ModelBuilder::new().build();
        let mut queue = DriverQueue::new();
        queue.add_valid(tiny_driver(&types), 0, 100);
        queue.add_valid(tiny_driver(&types), 0, 4000);
        assert_eq!(queue.valid_by_timestamp(3600).count(), 1);
        assert_eq!(queue.valid_by_timestamp(5000).count(), 2);
    }

    #[test]
    fn test_crash_statement_index_mapping() {
        // one include: line 1 include, 2 blank, 3 main, 4 try, 5 stmt 0
        assert_eq!(crash_statement_index(5, 1), Some(0));
        assert_eq!(crash_statement_index(7, 1), Some(2));
        assert_eq!(crash_statement_index(3, 1), None);
    }

    #[test]
    fn test_flush_writes_partitions_and_jsonl() {
        let mut b = ModelBuilder::new();
        let int = b.types().int_value();
        b.add_executable(Executable::free_function("f", "f", int, vec![]));
        let (model, types) = b.build();
        let mut rng = crate::random::Rng::from_seed(1);

        let mut queue = DriverQueue::new();
        queue.add_valid(tiny_driver(&types), 0, 10);
        let crash_memo = CrashMemo {
            valid_crash: true,
            fingerprint: Some("/src/a.cpp:1".to_string()),
            location: Some("/src/a.cpp:1".to_string()),
            ..CrashMemo::default()
        };
        queue.add_crash(tiny_driver(&types), crash_memo, 139, 20);
        queue.add_uncompilable(
            tiny_driver(&types),
            CrashMemo::for_compile_error("expected ';'"),
            30,
        );

        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(&model, &types);
        queue
            .flush(&emitter, &mut rng, dir.path(), &["lib.hpp".to_string()])
            .unwrap();

        assert!(dir.path().join("out_valid/driver_1.cpp").exists());
        assert!(dir.path().join("out_valid/1/driver_1.cpp").exists());
        assert!(dir.path().join("out_crash/driver_2.cpp").exists());
        assert!(dir.path().join("out_uncompilable/driver_3.cpp").exists());

        let crash_text =
            std::fs::read_to_string(dir.path().join("out_crash/driver_2.cpp")).unwrap();
        assert!(crash_text.contains("// crash fp: /src/a.cpp:1"));

        let jsonl = std::fs::read_to_string(dir.path().join("corpus.jsonl")).unwrap();
        assert_eq!(jsonl.lines().count(), 3);
        assert!(jsonl.contains("\"partition\":\"crash\""));
        assert!(queue.valid()[0].flushed);
    }

    #[test]
    fn test_flush_horizon_subsets() {
        let (model, types) = {
            let b = ModelBuilder::new();
            b.build()
        };
        let mut rng = crate::random::Rng::from_seed(2);
        let mut queue = DriverQueue::new();
        queue.add_valid(tiny_driver(&types), 0, 100);
        queue.add_valid(tiny_driver(&types), 0, 2 * 3600);

        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(&model, &types);
        queue.flush(&emitter, &mut rng, dir.path(), &[]).unwrap();

        // 1h horizon holds only the early driver; 3h holds both
        assert!(dir.path().join("out_valid/1/driver_1.cpp").exists());
        assert!(!dir.path().join("out_valid/1/driver_2.cpp").exists());
        assert!(dir.path().join("out_valid/3/driver_2.cpp").exists());
    }
}
