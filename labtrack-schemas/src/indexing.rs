use serde::{Deserialize, Serialize};

/// Sequencing platform an index position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexTechnology {
    Illumina,
    #[serde(rename = "454")]
    Ls454,
    Ion,
}

impl IndexTechnology {
    /// Prefix used in scheme and position names.
    pub fn prefix(&self) -> &'static str {
        match self {
            IndexTechnology::Illumina => "Illumina",
            IndexTechnology::Ls454 => "454",
            IndexTechnology::Ion => "Ion",
        }
    }
}

/// A slot in a sequencing read structure where a molecular index sits.
///
/// The declaration order is the canonical sort order for scheme names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexPosition {
    #[serde(rename = "Illumina_P5")]
    IlluminaP5,
    #[serde(rename = "Illumina_P7")]
    IlluminaP7,
    #[serde(rename = "Illumina_IS1")]
    IlluminaIs1,
    #[serde(rename = "Illumina_IS2")]
    IlluminaIs2,
    #[serde(rename = "Illumina_IS3")]
    IlluminaIs3,
    #[serde(rename = "Illumina_IS4")]
    IlluminaIs4,
    #[serde(rename = "Illumina_IS5")]
    IlluminaIs5,
    #[serde(rename = "Illumina_IS6")]
    IlluminaIs6,
    #[serde(rename = "454_A")]
    Ls454A,
    #[serde(rename = "454_B")]
    Ls454B,
    #[serde(rename = "Ion_A")]
    IonA,
    #[serde(rename = "Ion_B")]
    IonB,
}

impl IndexPosition {
    pub const ALL: [IndexPosition; 12] = [
        IndexPosition::IlluminaP5,
        IndexPosition::IlluminaP7,
        IndexPosition::IlluminaIs1,
        IndexPosition::IlluminaIs2,
        IndexPosition::IlluminaIs3,
        IndexPosition::IlluminaIs4,
        IndexPosition::IlluminaIs5,
        IndexPosition::IlluminaIs6,
        IndexPosition::Ls454A,
        IndexPosition::Ls454B,
        IndexPosition::IonA,
        IndexPosition::IonB,
    ];

    pub fn technology(&self) -> IndexTechnology {
        match self {
            IndexPosition::Ls454A | IndexPosition::Ls454B => IndexTechnology::Ls454,
            IndexPosition::IonA | IndexPosition::IonB => IndexTechnology::Ion,
            _ => IndexTechnology::Illumina,
        }
    }

    /// The position tag without its technology, e.g. "P5".
    pub fn position_tag(&self) -> &'static str {
        match self {
            IndexPosition::IlluminaP5 => "P5",
            IndexPosition::IlluminaP7 => "P7",
            IndexPosition::IlluminaIs1 => "IS1",
            IndexPosition::IlluminaIs2 => "IS2",
            IndexPosition::IlluminaIs3 => "IS3",
            IndexPosition::IlluminaIs4 => "IS4",
            IndexPosition::IlluminaIs5 => "IS5",
            IndexPosition::IlluminaIs6 => "IS6",
            IndexPosition::Ls454A | IndexPosition::IonA => "A",
            IndexPosition::Ls454B | IndexPosition::IonB => "B",
        }
    }

    /// Full name as used in upload headers, e.g. "Illumina_P5".
    pub fn name(&self) -> String {
        format!("{}_{}", self.technology().prefix(), self.position_tag())
    }

    /// Looks a position up by its full name, ignoring case.
    pub fn from_name(name: &str) -> Option<IndexPosition> {
        let wanted = name.trim();
        IndexPosition::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPairRecord {
    pub position: IndexPosition,
    pub sequence: String,
}

/// A known indexing scheme as listed in a dataset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingSchemeRecord {
    pub indexes: Vec<IndexPairRecord>,
}
