//! Molecular indexing schemes: named combinations of per-position index sequences.
//!
//! A scheme's name is a pure function of its pair set, so lookups and creation share
//! one key and creating the same combination twice yields the same scheme.

use crate::error::{LabError, Result};
use labtrack_schemas::indexing::{
    IndexPairRecord, IndexPosition, IndexTechnology, IndexingSchemeRecord,
};
use log::info;
use std::collections::{BTreeMap, HashMap};

const SEQUENCE_ALPHABET: &[char] = &['A', 'C', 'G', 'T', 'U'];

/// Upper-cases a sequence and checks it only uses A, C, G, T and U.
pub fn normalize_sequence(position: IndexPosition, sequence: &str) -> Result<String> {
    let normalized = sequence.trim().to_ascii_uppercase();
    if normalized.is_empty() || !normalized.chars().all(|c| SEQUENCE_ALPHABET.contains(&c)) {
        return Err(LabError::InvalidIndexSequence {
            position: position.name(),
            sequence: sequence.to_string(),
        });
    }
    Ok(normalized)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MolecularIndexingScheme {
    name: String,
    technology: IndexTechnology,
    indexes: BTreeMap<IndexPosition, String>,
}

impl MolecularIndexingScheme {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn technology(&self) -> IndexTechnology {
        self.technology
    }

    /// Sequences by position, in canonical position order.
    pub fn indexes(&self) -> &BTreeMap<IndexPosition, String> {
        &self.indexes
    }

    pub fn sequence(&self, position: IndexPosition) -> Option<&str> {
        self.indexes.get(&position).map(String::as_str)
    }

    /// The dataset form of this scheme, as read back by
    /// [`IndexingSchemeResolver::load_records`].
    pub fn to_record(&self) -> IndexingSchemeRecord {
        IndexingSchemeRecord {
            indexes: self
                .indexes
                .iter()
                .map(|(position, sequence)| IndexPairRecord {
                    position: *position,
                    sequence: sequence.clone(),
                })
                .collect(),
        }
    }
}

/// A validated, order-independent pair set and the name derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CanonicalPairs {
    technology: IndexTechnology,
    indexes: BTreeMap<IndexPosition, String>,
}

impl CanonicalPairs {
    fn from_pairs(pairs: &[(IndexPosition, String)]) -> Result<Self> {
        let Some((first, _)) = pairs.first() else {
            return Err(LabError::InvalidPairSet("no index pairs given".to_string()));
        };
        let technology = first.technology();
        let mut indexes = BTreeMap::new();
        for (position, sequence) in pairs {
            if position.technology() != technology {
                return Err(LabError::InvalidPairSet(format!(
                    "{} mixes {} and {} indexes",
                    position.name(),
                    technology.prefix(),
                    position.technology().prefix()
                )));
            }
            let sequence = normalize_sequence(*position, sequence)?;
            if indexes.insert(*position, sequence).is_some() {
                return Err(LabError::InvalidPairSet(format!(
                    "{} appears more than once",
                    position.name()
                )));
            }
        }
        Ok(Self {
            technology,
            indexes,
        })
    }

    /// E.g. `Illumina_P5-ACGT_P7-TTTT`.
    fn name(&self) -> String {
        let mut name = self.technology.prefix().to_string();
        for (position, sequence) in &self.indexes {
            name.push('_');
            name.push_str(position.position_tag());
            name.push('-');
            name.push_str(sequence);
        }
        name
    }
}

/// Canonical scheme name for a pair set, in any order.
pub fn scheme_name(pairs: &[(IndexPosition, String)]) -> Result<String> {
    Ok(CanonicalPairs::from_pairs(pairs)?.name())
}

/// Where resolved schemes are kept.
pub trait IndexingSchemeStore {
    fn find_by_name(&self, name: &str) -> Option<&MolecularIndexingScheme>;

    fn persist(&mut self, scheme: MolecularIndexingScheme);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// HashMap-backed scheme store.
#[derive(Debug, Default, Clone)]
pub struct InMemorySchemeStore {
    schemes: HashMap<String, MolecularIndexingScheme>,
}

impl InMemorySchemeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All schemes, sorted by name.
    pub fn schemes(&self) -> Vec<&MolecularIndexingScheme> {
        let mut schemes: Vec<_> = self.schemes.values().collect();
        schemes.sort_by(|a, b| a.name.cmp(&b.name));
        schemes
    }
}

impl IndexingSchemeStore for InMemorySchemeStore {
    fn find_by_name(&self, name: &str) -> Option<&MolecularIndexingScheme> {
        self.schemes.get(name)
    }

    fn persist(&mut self, scheme: MolecularIndexingScheme) {
        self.schemes.insert(scheme.name.clone(), scheme);
    }

    fn len(&self) -> usize {
        self.schemes.len()
    }
}

/// Finds schemes by their pair set, creating them on request.
#[derive(Debug, Default, Clone)]
pub struct IndexingSchemeResolver<S: IndexingSchemeStore> {
    store: S,
}

impl<S: IndexingSchemeStore> IndexingSchemeResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// The existing scheme with exactly this pair set.
    ///
    /// # Errors
    ///
    /// `IndexingSchemeNotFound` when no scheme matches, or a validation error when the
    /// pairs are empty, repeat a position, mix technologies or hold a bad sequence.
    pub fn find_indexing_scheme(
        &self,
        pairs: &[(IndexPosition, String)],
    ) -> Result<&MolecularIndexingScheme> {
        let name = scheme_name(pairs)?;
        self.store
            .find_by_name(&name)
            .ok_or(LabError::IndexingSchemeNotFound(name))
    }

    /// Like [`find_indexing_scheme`](Self::find_indexing_scheme), but builds the scheme
    /// when it is missing, storing it when `persist` is set.
    pub fn find_or_create_indexing_scheme(
        &mut self,
        pairs: &[(IndexPosition, String)],
        persist: bool,
    ) -> Result<MolecularIndexingScheme> {
        let canonical = CanonicalPairs::from_pairs(pairs)?;
        let name = canonical.name();
        if let Some(existing) = self.store.find_by_name(&name) {
            return Ok(existing.clone());
        }
        let scheme = MolecularIndexingScheme {
            name,
            technology: canonical.technology,
            indexes: canonical.indexes,
        };
        if persist {
            info!("Created molecular indexing scheme {}", scheme.name);
            self.store.persist(scheme.clone());
        }
        Ok(scheme)
    }

    /// Seeds the resolver with schemes from a dataset.
    pub fn load_records(&mut self, records: &[IndexingSchemeRecord]) -> Result<usize> {
        let mut created = 0;
        for record in records {
            let pairs: Vec<(IndexPosition, String)> = record
                .indexes
                .iter()
                .map(|p| (p.position, p.sequence.clone()))
                .collect();
            let before = self.store.len();
            self.find_or_create_indexing_scheme(&pairs, true)?;
            created += self.store.len() - before;
        }
        Ok(created)
    }
}

/// Turns one upload row (column header to cell) into a pair set.
///
/// Headers are index position names; blank cells are skipped.
pub fn pairs_from_row<'r, I>(row: I) -> Result<Vec<(IndexPosition, String)>>
where
    I: IntoIterator<Item = (&'r str, &'r str)>,
{
    let mut pairs = Vec::new();
    for (header, cell) in row {
        if cell.trim().is_empty() {
            continue;
        }
        let position = IndexPosition::from_name(header)
            .ok_or_else(|| LabError::UnknownIndexPosition(header.to_string()))?;
        pairs.push((position, normalize_sequence(position, cell)?));
    }
    Ok(pairs)
}

/// One data row of an index upload file, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRow {
    /// One-based, not counting the header.
    pub row: usize,
    /// Column header and cell text for every header, in column order. Missing
    /// trailing cells are empty.
    pub cells: Vec<(String, String)>,
    /// Number of fields actually present in the row.
    pub field_count: usize,
}

impl UploadRow {
    /// The row's pair set. A row whose width differs from the header is rejected.
    pub fn pairs(&self) -> Result<Vec<(IndexPosition, String)>> {
        if self.field_count != self.cells.len() {
            return Err(LabError::UploadColumnCount {
                expected: self.cells.len(),
                found: self.field_count,
            });
        }
        pairs_from_row(self.cells.iter().map(|(h, c)| (h.as_str(), c.as_str())))
    }
}

/// Reads an index upload CSV. Only unreadable CSV fails here; row width and contents
/// are checked by [`UploadRow::pairs`].
pub fn read_index_upload(path: &str) -> Result<Vec<UploadRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| LabError::CsvError(path.to_string(), e))?;
    let headers = reader
        .headers()
        .map_err(|e| LabError::CsvError(path.to_string(), e))?
        .clone();
    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| LabError::CsvError(path.to_string(), e))?;
        rows.push(UploadRow {
            row: index + 1,
            cells: headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.to_string(), record.get(i).unwrap_or("").to_string()))
                .collect(),
            field_count: record.len(),
        });
    }
    Ok(rows)
}
