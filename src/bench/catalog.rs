//! The fixed, versioned battery of benchmark prompts.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Embedded catalog asset
const CATALOG_JSON: &str = include_str!("../../assets/catalog.json");

/// Schema version this build understands
pub const CATALOG_VERSION: u32 = 1;

/// Number of test cases every valid catalog holds
pub const CATALOG_SIZE: usize = 43;

/// Prompt category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Logic,
    Math,
    Code,
    Physics,
    Trick,
    Stress,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Category::Logic => "Logic",
            Category::Math => "Math",
            Category::Code => "Code",
            Category::Physics => "Physics",
            Category::Trick => "Trick",
            Category::Stress => "Stress",
        };
        f.pad(label)
    }
}

/// A single benchmark prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: u32,
    pub category: Category,
    pub name: String,
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: u32,
    tests: Vec<TestCase>,
}

/// Immutable, ordered collection of test cases
#[derive(Debug, Clone)]
pub struct Catalog {
    version: u32,
    tests: Vec<TestCase>,
}

static BUILTIN: OnceCell<Catalog> = OnceCell::new();

impl Catalog {
    /// The catalog compiled into this binary, parsed and validated once per process.
    pub fn builtin() -> Result<&'static Catalog> {
        BUILTIN.get_or_try_init(|| Catalog::from_json(CATALOG_JSON))
    }

    /// Parse and validate a catalog document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(raw)
            .map_err(|e| BenchError::CatalogCorrupt(format!("unparseable catalog: {}", e)))?;

        if file.version != CATALOG_VERSION {
            return Err(BenchError::CatalogCorrupt(format!(
                "unsupported catalog version {} (expected {})",
                file.version, CATALOG_VERSION
            )));
        }

        if file.tests.len() != CATALOG_SIZE {
            return Err(BenchError::CatalogCorrupt(format!(
                "expected {} tests, found {}",
                CATALOG_SIZE,
                file.tests.len()
            )));
        }

        for (index, test) in file.tests.iter().enumerate() {
            let expected = index as u32 + 1;
            if test.id != expected {
                return Err(BenchError::CatalogCorrupt(format!(
                    "test at position {} has id {} (expected {})",
                    index, test.id, expected
                )));
            }
            if test.name.trim().is_empty() {
                return Err(BenchError::CatalogCorrupt(format!(
                    "test {} has an empty name",
                    test.id
                )));
            }
            if test.prompt.trim().is_empty() {
                return Err(BenchError::CatalogCorrupt(format!(
                    "test {} has an empty prompt",
                    test.id
                )));
            }
        }

        Ok(Self {
            version: file.version,
            tests: file.tests,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    pub fn get(&self, id: u32) -> Option<&TestCase> {
        self.tests.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestCase> {
        self.tests.iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a TestCase;
    type IntoIter = std::slice::Iter<'a, TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.tests.iter()
    }
}
