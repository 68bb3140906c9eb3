//! Opening catalog and longest-prefix matching.
//!
//! The catalog is read from tab-separated files with rows of
//! `code<TAB>name<TAB>movetext`. Movetext is replayed from the initial
//! position so every entry holds a legal UCI prefix; rows that do not replay
//! are skipped with a diagnostic and the rest of the catalog still loads.

use std::fs;
use std::io::BufRead;
use std::path::Path;

use chess::Position;
use serde::Serialize;

use crate::error::{AnnotatorError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpeningRecord {
    pub code: String,
    pub name: String,
    /// Canonical move prefix in UCI.
    pub moves: Vec<String>,
}

/// Why a catalog row or file was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogDiagnostic {
    pub source: String,
    /// 1-based; 0 when the whole file was unreadable.
    pub line: usize,
    pub code: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpeningMatch {
    pub code: String,
    pub name: String,
    /// Plies matched.
    pub length: usize,
}

impl OpeningMatch {
    pub fn unknown() -> Self {
        Self {
            code: "Unknown".to_string(),
            name: "Unknown".to_string(),
            length: 0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.length > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpeningCatalog {
    records: Vec<OpeningRecord>,
    diagnostics: Vec<CatalogDiagnostic>,
}

impl OpeningCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.tsv` file in `dir`, in file-name order.
    #[tracing::instrument(level = "debug", skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let catalog_err = |source| AnnotatorError::Catalog {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(catalog_err)? {
            let path = entry.map_err(catalog_err)?.path();
            if path.extension().is_some_and(|ext| ext == "tsv") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            let source = path.display().to_string();
            match fs::File::open(&path) {
                Ok(file) => catalog.load_tsv(std::io::BufReader::new(file), &source),
                Err(e) => catalog.skip(&source, 0, "", "", format!("unreadable file: {e}")),
            }
        }

        tracing::info!(
            openings = catalog.records.len(),
            skipped = catalog.diagnostics.len(),
            "Opening catalog loaded"
        );
        Ok(catalog)
    }

    /// Append the rows of one TSV source. Bad rows become diagnostics.
    pub fn load_tsv(&mut self, reader: impl BufRead, source: &str) {
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    self.skip(source, line_no, "", "", format!("read error: {e}"));
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if line_no == 1 && fields[0].trim().eq_ignore_ascii_case("eco") {
                continue;
            }
            if fields.len() < 3 {
                self.skip(source, line_no, fields[0].trim(), "", "expected 3 tab-separated fields".to_string());
                continue;
            }

            let code = fields[0].trim();
            let name = fields[1].trim();
            match replay_movetext(fields[2]) {
                Ok(moves) if moves.is_empty() => {
                    self.skip(source, line_no, code, name, "no moves".to_string())
                }
                Ok(moves) => self.records.push(OpeningRecord {
                    code: code.to_string(),
                    name: name.to_string(),
                    moves,
                }),
                Err(reason) => self.skip(source, line_no, code, name, reason),
            }
        }
    }

    pub fn push(&mut self, record: OpeningRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[OpeningRecord] {
        &self.records
    }

    pub fn diagnostics(&self) -> &[CatalogDiagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The entry with the longest prefix of `played` (UCI); the first such
    /// entry in catalog order on ties.
    pub fn matches(&self, played: &[String]) -> OpeningMatch {
        let mut best = OpeningMatch::unknown();
        for record in &self.records {
            let len = record.moves.len();
            if len > best.length && len <= played.len() && played[..len] == record.moves[..] {
                best = OpeningMatch {
                    code: record.code.clone(),
                    name: record.name.clone(),
                    length: len,
                };
            }
        }
        best
    }

    fn skip(&mut self, source: &str, line: usize, code: &str, name: &str, reason: String) {
        tracing::warn!(source, line, code, %reason, "Skipping opening catalog row");
        self.diagnostics.push(CatalogDiagnostic {
            source: source.to_string(),
            line,
            code: code.to_string(),
            name: name.to_string(),
            reason,
        });
    }
}

/// SAN movetext to UCI, dropping move numbers (`1.`, `1...`, `1.e4`).
fn replay_movetext(movetext: &str) -> std::result::Result<Vec<String>, String> {
    let mut position = Position::startpos();
    let mut moves = Vec::new();

    for token in movetext.split_whitespace() {
        let san = match token.rfind('.') {
            Some(idx) => &token[idx + 1..],
            None => token,
        };
        if san.is_empty() {
            continue;
        }
        let mv = position
            .parse_san(san)
            .map_err(|e| format!("move {} ({san}): {e}", moves.len() + 1))?;
        moves.push(position.uci(mv));
        position = position
            .play(mv)
            .map_err(|e| format!("move {} ({san}): {e}", moves.len()))?;
    }
    Ok(moves)
}
