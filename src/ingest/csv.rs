use crate::db::bootstrap::ensure_schema;
use crate::db::db_pool::DbPool;
use crate::ingest::IngestError;
use ::csv::{ReaderBuilder, StringRecord, Trim};
use duckdb::params;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

const EXTENSION_COLUMN: &str = "ANEXO";
const NAME_COLUMN: &str = "DISPLAY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub numero_anexo: i64,
    pub nombre_referencia: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Rows with a name but an extension that is not a number.
    pub skipped: usize,
}

/// Replaces `directorio_telefonico` with the contents of an ANEXO/DISPLAY export.
pub struct DirectoryCsvLoader {
    pool: DbPool,
}

impl DirectoryCsvLoader {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn load_path(&self, path: &Path) -> Result<LoadReport, IngestError> {
        info!("Loading phone directory from {}", path.display());
        let file = File::open(path)?;
        self.load_reader(file)
    }

    pub fn load_reader<R: Read>(&self, reader: R) -> Result<LoadReport, IngestError> {
        let (entries, skipped) = read_entries(reader)?;

        let mut conn = self.pool.get()?;
        ensure_schema(&conn)?;

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM directorio_telefonico", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO directorio_telefonico (numero_anexo, nombre_referencia) VALUES (?, ?)",
            )?;
            for entry in &entries {
                stmt.execute(params![entry.numero_anexo, entry.nombre_referencia])?;
            }
        }
        tx.commit()?;

        info!("Loaded {} directory entries ({} skipped)", entries.len(), skipped);
        Ok(LoadReport {
            loaded: entries.len(),
            skipped,
        })
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, IngestError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| IngestError::MissingColumn(name.to_string()))
}

// Spreadsheet exports sometimes write whole numbers as "4410.0".
fn parse_extension(text: &str) -> Option<i64> {
    text.parse::<i64>().ok().or_else(|| {
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn read_entries<R: Read>(reader: R) -> Result<(Vec<DirectoryEntry>, usize), IngestError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let anexo_idx = column_index(&headers, EXTENSION_COLUMN)?;
    let display_idx = column_index(&headers, NAME_COLUMN)?;

    let mut entries = Vec::new();
    let mut skipped = 0;
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let name = record.get(display_idx).unwrap_or_default();
        if name.is_empty() {
            continue;
        }

        let anexo = record.get(anexo_idx).unwrap_or_default();
        match parse_extension(anexo) {
            Some(numero_anexo) => entries.push(DirectoryEntry {
                numero_anexo,
                nombre_referencia: name.to_string(),
            }),
            None => {
                warn!("Skipping row {}: '{}' is not a numeric extension", line + 2, anexo);
                skipped += 1;
            }
        }
    }

    Ok((entries, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::in_memory_pool;
    use std::io::Write;

    const EXPORT: &str = "ANEXO,DISPLAY,AREA\n\
                          4410,  Farmacia Central ,Apoyo\n\
                          4411,,Apoyo\n\
                          central,Mesa Central,Admin\n\
                          4530.0,Laboratorio Clínico,Apoyo\n";

    fn names(pool: &DbPool) -> Vec<(i64, String)> {
        let conn = pool.get().unwrap();
        let mut stmt = conn
            .prepare("SELECT numero_anexo, nombre_referencia FROM directorio_telefonico ORDER BY numero_anexo")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn test_load_file_replaces_directory() {
        let pool = in_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            ensure_schema(&conn).unwrap();
            conn.execute(
                "INSERT INTO directorio_telefonico (numero_anexo, nombre_referencia) VALUES (1, 'Viejo')",
                [],
            )
            .unwrap();
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();

        let loader = DirectoryCsvLoader::new(pool.clone());
        let report = loader.load_path(file.path()).unwrap();

        assert_eq!(report, LoadReport { loaded: 2, skipped: 1 });
        assert_eq!(
            names(&pool),
            vec![
                (4410, "Farmacia Central".to_string()),
                (4530, "Laboratorio Clínico".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_display_column() {
        let loader = DirectoryCsvLoader::new(in_memory_pool().unwrap());
        let err = loader.load_reader("ANEXO,NOMBRE\n1,x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn(col) if col == "DISPLAY"));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let (entries, skipped) = read_entries(" anexo , display \n7,Portería\n".as_bytes()).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(
            entries,
            vec![DirectoryEntry {
                numero_anexo: 7,
                nombre_referencia: "Portería".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_file() {
        let loader = DirectoryCsvLoader::new(in_memory_pool().unwrap());
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            loader.load_path(&dir.path().join("nope.csv")),
            Err(IngestError::IoError(_))
        ));
    }
}
