use crate::domain::{PersistenceError, PersistenceResult, Spreadsheet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

fn map_json_error(err: serde_json::Error) -> PersistenceError {
    if err.is_io() {
        PersistenceError::Io(err.into())
    } else {
        PersistenceError::CorruptFile(err.to_string())
    }
}

impl Spreadsheet {
    /// Writes the raw expressions as an indented JSON array of arrays.
    /// Computed values are not written.
    pub fn save_to<W: Write>(&self, sink: W) -> PersistenceResult<()> {
        serde_json::to_writer_pretty(sink, self).map_err(map_json_error)
    }

    /// Replaces the whole grid with the document read from `source` and
    /// recalculates it. On error the grid is left as it was.
    pub fn load_from<R: Read>(&mut self, source: R) -> PersistenceResult<()> {
        let loaded: Spreadsheet = serde_json::from_reader(source).map_err(|err| {
            let err = map_json_error(err);
            log::warn!("rejected grid document: {}", err);
            err
        })?;
        self.replace_with(loaded);
        Ok(())
    }
}

pub struct FileRepository;

impl FileRepository {
    pub fn save_spreadsheet(spreadsheet: &Spreadsheet, path: &Path) -> PersistenceResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        spreadsheet.save_to(&mut writer)?;
        writer.flush()?;
        log::info!(
            "saved {}x{} grid to {}",
            spreadsheet.rows(),
            spreadsheet.cols(),
            path.display()
        );
        Ok(())
    }

    pub fn load_spreadsheet(spreadsheet: &mut Spreadsheet, path: &Path) -> PersistenceResult<()> {
        let reader = BufReader::new(File::open(path)?);
        spreadsheet.load_from(reader)?;
        log::info!(
            "loaded {}x{} grid from {}",
            spreadsheet.rows(),
            spreadsheet.cols(),
            path.display()
        );
        Ok(())
    }
}
