//! Sheet kinds, code sequences and change reasons.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ValueObject};

/// Kind of warehouse document. Also the kind of every ledger movement it produces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    Import,
    Export,
    Transfer,
    Check,
}

impl SheetKind {
    pub const ALL: [SheetKind; 4] = [
        SheetKind::Import,
        SheetKind::Export,
        SheetKind::Transfer,
        SheetKind::Check,
    ];

    /// Two-letter code (`IP`, `EP`, `TF`, `CK`), also the document code prefix.
    pub fn code(&self) -> &'static str {
        self.sequence().prefix()
    }

    pub fn sequence(&self) -> SequenceType {
        match self {
            SheetKind::Import => SequenceType::Import,
            SheetKind::Export => SequenceType::Export,
            SheetKind::Transfer => SequenceType::Transfer,
            SheetKind::Check => SequenceType::Check,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SheetKind::Import => "import",
            SheetKind::Export => "export",
            SheetKind::Transfer => "transfer",
            SheetKind::Check => "check",
        }
    }

    pub fn is_import_export(&self) -> bool {
        matches!(self, SheetKind::Import | SheetKind::Export)
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts either the name (`export`) or the two-letter code (`EP`), case-insensitive.
impl FromStr for SheetKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SheetKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s) || k.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::validation(format!("unknown sheet kind '{s}'")))
    }
}

/// Counter families for document codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceType {
    Import,
    Export,
    Transfer,
    Check,
    Order,
}

impl SequenceType {
    pub fn prefix(&self) -> &'static str {
        match self {
            SequenceType::Import => "IP",
            SequenceType::Export => "EP",
            SequenceType::Transfer => "TF",
            SequenceType::Check => "CK",
            SequenceType::Order => "OD",
        }
    }
}

/// Why stock moved (`"supplier delivery"`, `"damaged"`), scoped to one sheet kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeReason {
    pub kind: SheetKind,
    pub name: String,
}

impl ChangeReason {
    pub const MAX_LEN: usize = 255;

    pub fn new(kind: SheetKind, name: impl AsRef<str>) -> DomainResult<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(DomainError::validation("change reason cannot be empty"));
        }
        if name.chars().count() > Self::MAX_LEN {
            return Err(DomainError::validation(format!(
                "change reason longer than {} characters",
                Self::MAX_LEN
            )));
        }
        Ok(Self {
            kind,
            name: name.to_string(),
        })
    }
}

impl ValueObject for ChangeReason {}
