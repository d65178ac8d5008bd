// The response file: one CSV line per (rater, ratee) pair.

use crate::survey::*;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use peer_rating::store::RatingStore;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub const STORE_HEADER: [&str; 9] = [
    "rater_id",
    "subgroup_id",
    "ratee_id",
    "criterion_1",
    "criterion_2",
    "criterion_3",
    "criterion_4",
    "criterion_5",
    "timestamp",
];

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct StoreRow {
    rater_id: String,
    subgroup_id: String,
    ratee_id: String,
    criterion_1: u32,
    criterion_2: u32,
    criterion_3: u32,
    criterion_4: u32,
    criterion_5: u32,
    timestamp: String,
}

impl From<&RatingRecord> for StoreRow {
    fn from(r: &RatingRecord) -> Self {
        let [c1, c2, c3, c4, c5] = r.scores;
        StoreRow {
            rater_id: r.rater.clone(),
            subgroup_id: r.subgroup.clone(),
            ratee_id: r.ratee.clone(),
            criterion_1: c1,
            criterion_2: c2,
            criterion_3: c3,
            criterion_4: c4,
            criterion_5: c5,
            timestamp: r.timestamp.clone(),
        }
    }
}

impl From<StoreRow> for RatingRecord {
    fn from(row: StoreRow) -> Self {
        RatingRecord {
            rater: row.rater_id,
            subgroup: row.subgroup_id,
            ratee: row.ratee_id,
            scores: [
                row.criterion_1,
                row.criterion_2,
                row.criterion_3,
                row.criterion_4,
                row.criterion_5,
            ],
            timestamp: row.timestamp,
        }
    }
}

/// Serializes records with the layout of the response file.
pub fn records_to_csv(records: &[RatingRecord], with_header: bool) -> SurveyResult<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(vec![]);
    if with_header && records.is_empty() {
        wtr.write_record(STORE_HEADER).context(WritingCsvSnafu {})?;
    }
    for r in records.iter() {
        wtr.serialize(StoreRow::from(r)).context(WritingCsvSnafu {})?;
    }
    wtr.into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
        .context(WritingCsvSnafu {})
}

/// A rating store backed by a single CSV file, only ever appended to.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: &Path) -> CsvStore {
        CsvStore {
            path: path.to_path_buf(),
        }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }
}

/// What appending a batch needs from the response file.
trait AppendTarget: Write {
    fn current_len(&self) -> io::Result<u64>;
    fn truncate_to(&self, len: u64) -> io::Result<()>;
    fn sync(&self) -> io::Result<()>;
}

impl AppendTarget for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Writes `data` at the end of a file that was `start` bytes long.
///
/// On failure the bytes of this batch are removed again, unless the file grew
/// past them in the meantime.
fn write_batch<F: AppendTarget>(file: &mut F, start: u64, data: &[u8]) -> io::Result<()> {
    let mut written = 0;
    let res = loop {
        if written == data.len() {
            break file.flush().and_then(|_| file.sync());
        }
        match file.write(&data[written..]) {
            Ok(0) => {
                break Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write the whole batch",
                ))
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => break Err(e),
        }
    };
    if let Err(e) = res {
        match file.current_len() {
            Ok(len) if len == start + written as u64 => {
                warn!("Write failed after {} byte(s), rolling back to {} byte(s)", written, start);
                if let Err(e2) = file.truncate_to(start) {
                    warn!("Rollback failed: {}", e2);
                }
            }
            Ok(len) => warn!(
                "Write failed after {} byte(s), but the file grew to {} byte(s) in the meantime: no rollback",
                written, len
            ),
            Err(e2) => warn!("Write failed, and the file length is unknown: {}", e2),
        }
        return Err(e);
    }
    Ok(())
}

impl CsvStore {
    fn check_header(&self, header: &csv::StringRecord) -> SurveyResult<()> {
        if !header.iter().eq(STORE_HEADER.iter().cloned()) {
            return StoreSchemaSnafu {
                path: self.path_str(),
                found: header.iter().collect::<Vec<&str>>().join(","),
            }
            .fail();
        }
        Ok(())
    }

    /// Creates the file with the header and the first batch.
    ///
    /// The content is prepared aside and linked in place only if no file exists yet,
    /// so the file is never seen without its header. Returns false if the file
    /// already exists.
    fn create_with(&self, records: &[RatingRecord]) -> SurveyResult<bool> {
        let path = self.path_str();
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            // Let the regular open report the problem.
            return Ok(false);
        }
        let data = records_to_csv(records, true)?;
        let mut tmp =
            NamedTempFile::new_in(dir).context(StoreWriteSnafu { path: path.clone() })?;
        tmp.write_all(&data)
            .and_then(|_| tmp.as_file().sync_data())
            .context(StoreWriteSnafu { path: path.clone() })?;
        match tmp.persist_noclobber(&self.path) {
            Ok(_) => {
                debug!("CsvStore: created {} with {} record(s)", path, records.len());
                Ok(true)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.error).context(StoreWriteSnafu { path }),
        }
    }
}

impl RatingStore for CsvStore {
    type Error = SurveyError;

    /// The batch is written with a single append, after checking that the file
    /// is a response file. If the write fails, the batch is rolled back.
    fn append(&mut self, records: &[RatingRecord]) -> SurveyResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        if !self.path.exists() && self.create_with(records)? {
            return Ok(());
        }
        let path = self.path_str();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .context(StoreWriteSnafu { path: path.clone() })?;
        let start = file
            .current_len()
            .context(StoreWriteSnafu { path: path.clone() })?;

        let mut data: Vec<u8> = Vec::new();
        if start == 0 {
            // Created empty by someone else.
            data.extend(records_to_csv(records, true)?);
        } else {
            {
                let mut rdr = csv::ReaderBuilder::new()
                    .has_headers(true)
                    .from_reader(&file);
                let header = rdr
                    .headers()
                    .context(StoreReadSnafu { path: path.clone() })?
                    .clone();
                self.check_header(&header)?;
            }
            let mut last = [0u8; 1];
            file.seek(SeekFrom::Start(start - 1))
                .and_then(|_| file.read_exact(&mut last))
                .context(StoreWriteSnafu { path: path.clone() })?;
            if last[0] != b'\n' {
                data.push(b'\n');
            }
            data.extend(records_to_csv(records, false)?);
        }
        debug!(
            "CsvStore::append: {} record(s), {} byte(s) at offset {} of {}",
            records.len(),
            data.len(),
            start,
            path
        );
        write_batch(&mut file, start, &data).context(StoreWriteSnafu { path })
    }

    fn read_all(&self) -> SurveyResult<Vec<RatingRecord>> {
        let path = self.path_str();
        // A store that was never written to is empty.
        match fs::metadata(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No responses yet: {} does not exist", path);
                return Ok(Vec::new());
            }
            Ok(m) if m.len() == 0 => return Ok(Vec::new()),
            _ => {}
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .context(StoreReadSnafu { path: path.clone() })?;
        let header = rdr
            .headers()
            .context(StoreReadSnafu { path: path.clone() })?
            .clone();
        self.check_header(&header)?;
        let mut res: Vec<RatingRecord> = Vec::new();
        for row in rdr.deserialize::<StoreRow>() {
            let row = row.context(StoreReadSnafu { path: path.clone() })?;
            res.push(RatingRecord::from(row));
        }
        debug!("CsvStore::read_all: {} record(s) from {}", res.len(), path);
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peer_rating::builder::ScoreSheet;
    use peer_rating::roster::{Roster, Subgroup};
    use peer_rating::store::submit;
    use std::cell::RefCell;

    fn rec(rater: &str, ratee: &str, scores: Scores) -> RatingRecord {
        RatingRecord {
            rater: rater.to_string(),
            subgroup: "G1".to_string(),
            ratee: ratee.to_string(),
            scores,
            timestamp: "2024-05-02T10:00:00".to_string(),
        }
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(&dir.path().join("responses.csv"));
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn append_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.csv");
        let mut store = CsvStore::new(&path);
        let first = vec![rec("A", "B", [5, 5, 5, 5, 5]), rec("A", "C", [1, 2, 3, 4, 5])];
        let second = vec![rec("B", "A", [3, 3, 3, 3, 3])];
        store.append(&first).unwrap();
        store.append(&second).unwrap();
        store.append(&[]).unwrap();

        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[..2], first[..]);
        assert_eq!(all[2], second[0]);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], STORE_HEADER.join(","));
        assert_eq!(lines[2], "A,G1,C,1,2,3,4,5,2024-05-02T10:00:00");
    }

    #[test]
    fn names_with_commas_survive() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvStore::new(&dir.path().join("responses.csv"));
        let r = rec("Prazeres, Artur", "Maia, Walter", [4, 4, 4, 4, 4]);
        store.append(&[r.clone()]).unwrap();
        assert_eq!(store.read_all().unwrap(), vec![r]);
    }

    #[test]
    fn wrong_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        fs::write(&path, "timestamp,name,score\n2024,A,3\n").unwrap();
        let store = CsvStore::new(&path);
        assert!(matches!(
            store.read_all(),
            Err(SurveyError::StoreSchema { .. })
        ));
    }

    #[test]
    fn malformed_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.csv");
        let contents = format!("{}\nA,G1,B,5,5,x,5,5,t0\n", STORE_HEADER.join(","));
        fs::write(&path, contents).unwrap();
        let store = CsvStore::new(&path);
        assert!(matches!(store.read_all(), Err(SurveyError::StoreRead { .. })));
    }

    #[test]
    fn unwritable_store_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a file.
        let mut store = CsvStore::new(dir.path());
        let roster = Roster::new(vec![Subgroup::new("G1", &["A", "B"])]).unwrap();
        let mut sheet = ScoreSheet::new(&roster, "A").unwrap();
        sheet.set_scores("B", &[Some(4); NUM_CRITERIA]).unwrap();
        let res = submit(&mut store, &sheet, ScoreRange::DEFAULT, "t0");
        assert!(matches!(
            res,
            Err(peer_rating::store::SubmitError::Store(SurveyError::StoreWrite { .. }))
        ));
    }

    #[test]
    fn foreign_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("respostas.csv");
        let contents = "timestamp,avaliador_nome,avaliador_subgrupo\n2024,A,G1\n";
        fs::write(&path, contents).unwrap();
        let mut store = CsvStore::new(&path);
        assert!(matches!(
            store.append(&[rec("A", "B", [4, 4, 4, 4, 4])]),
            Err(SurveyError::StoreSchema { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), contents);
    }

    #[test]
    fn append_after_a_line_without_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.csv");
        let contents = format!("{}\nA,G1,B,5,5,5,5,5,t0", STORE_HEADER.join(","));
        fs::write(&path, contents).unwrap();
        let mut store = CsvStore::new(&path);
        let r = rec("B", "A", [2, 2, 2, 2, 2]);
        store.append(&[r.clone()]).unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].scores, [5; NUM_CRITERIA]);
        assert_eq!(all[1], r);
    }

    #[test]
    fn empty_file_gets_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.csv");
        fs::write(&path, "").unwrap();
        let mut store = CsvStore::new(&path);
        store.append(&[rec("A", "B", [3, 3, 3, 3, 3])]).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(&STORE_HEADER.join(",")));
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_first_submissions() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        for i in 0..50 {
            let path = dir.path().join(format!("responses_{}.csv", i));
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = ["A", "C"]
                .iter()
                .map(|rater| {
                    let barrier = barrier.clone();
                    let mut store = CsvStore::new(&path);
                    let batch = vec![rec(rater, "B", [4, 4, 4, 4, 4])];
                    thread::spawn(move || {
                        barrier.wait();
                        store.append(&batch).map_err(|e| e.to_string())
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap().unwrap();
            }
            let all = CsvStore::new(&path).read_all().unwrap();
            assert_eq!(all.len(), 2);
            let headers = fs::read_to_string(&path)
                .unwrap()
                .lines()
                .filter(|l| l.starts_with("rater_id"))
                .count();
            assert_eq!(headers, 1);
        }
    }

    // Accepts `room` bytes, then fails. `others` lands in the file at that
    // moment, as if another rater had appended.
    struct ShortFile {
        data: RefCell<Vec<u8>>,
        room: usize,
        others: Vec<u8>,
    }

    impl ShortFile {
        fn new(data: &[u8], room: usize, others: &[u8]) -> ShortFile {
            ShortFile {
                data: RefCell::new(data.to_vec()),
                room,
                others: others.to_vec(),
            }
        }
    }

    impl Write for ShortFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.room == 0 {
                self.data.borrow_mut().extend(self.others.drain(..));
                return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
            }
            let n = buf.len().min(self.room).min(4);
            self.data.borrow_mut().extend_from_slice(&buf[..n]);
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl AppendTarget for ShortFile {
        fn current_len(&self) -> io::Result<u64> {
            Ok(self.data.borrow().len() as u64)
        }

        fn truncate_to(&self, len: u64) -> io::Result<()> {
            self.data.borrow_mut().truncate(len as usize);
            Ok(())
        }

        fn sync(&self) -> io::Result<()> {
            Ok(())
        }
    }

    const BEFORE: &[u8] = b"header\nA,G1,C,1,1,1,1,1,t0\n";
    const BATCH: &[u8] = b"B,G1,C,5,5,5,5,5,t1\n";

    #[test]
    fn failed_write_is_rolled_back() {
        let mut f = ShortFile::new(BEFORE, 10, b"");
        assert!(write_batch(&mut f, BEFORE.len() as u64, BATCH).is_err());
        assert_eq!(f.data.borrow().as_slice(), BEFORE);
    }

    #[test]
    fn rollback_keeps_rows_of_other_writers() {
        let others = b"D,G1,C,2,2,2,2,2,t2\n";
        let mut f = ShortFile::new(BEFORE, 8, others);
        assert!(write_batch(&mut f, BEFORE.len() as u64, BATCH).is_err());
        let data = f.data.borrow();
        assert_eq!(data.len(), BEFORE.len() + 8 + others.len());
        assert!(data.ends_with(others));
    }

    #[test]
    fn complete_write() {
        let mut f = ShortFile::new(BEFORE, 100, b"");
        write_batch(&mut f, BEFORE.len() as u64, BATCH).unwrap();
        assert_eq!(f.data.borrow().len(), BEFORE.len() + BATCH.len());
    }
}
