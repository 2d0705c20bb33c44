//! Education catalog and prediction enrichment.
//!
//! The catalog is a JSON lookup table keyed by disease label. Each prediction
//! label is normalized and matched against catalog keys and aliases, then a
//! handful of fixed rules decide urgency, chat availability and extra notes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Attached to every enrichment.
pub const DISCLAIMER: &str = "This result is generated by an automated model for educational \
purposes only. It is not a medical diagnosis. Always consult a qualified healthcare \
professional about any skin concern.";

const FALLBACK_DESCRIPTION: &str =
    "This result does not match any condition in our education library.";
const FALLBACK_ACTION: &str = "Consult a healthcare professional for an evaluation.";
const LOW_CONFIDENCE_NOTE: &str = "The model is not confident about this result. \
Treat it with caution and have the area examined by a professional.";
const EMERGENCY_ACTION: &str =
    "Seek urgent medical care now. Contact emergency services or go to the nearest emergency department.";

/// Triage level for a condition.
///
/// `Low < Medium < High < Emergency`. `Unknown` is outside that scale and is
/// used only for labels the catalog does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Emergency,
    Unknown,
}

impl Urgency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Emergency => "emergency",
            Self::Unknown => "unknown",
        }
    }

    /// Position on the triage scale, `None` for `Unknown`.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Low => Some(0),
            Self::Medium => Some(1),
            Self::High => Some(2),
            Self::Emergency => Some(3),
            Self::Unknown => None,
        }
    }

    /// Raise to `floor` if currently below it. `Unknown` is left untouched.
    #[must_use]
    pub fn at_least(self, floor: Self) -> Self {
        match (self.rank(), floor.rank()) {
            (Some(current), Some(min)) if current < min => floor,
            _ => self,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "emergency" => Ok(Self::Emergency),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("Unknown urgency: {other}")),
        }
    }
}

/// One catalog entry as stored in the lookup file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiseaseInfo {
    pub display_name: String,
    pub urgency: Urgency,
    pub description: String,
    pub demo_description: String,
    pub recommended_action: String,
    pub chat_available: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// Catalog entry together with its normalized key.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry<'a> {
    pub label: &'a str,
    pub info: &'a DiseaseInfo,
}

/// Catalog loading errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read disease catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid disease catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Disease catalog entry {0:?} has an empty label")]
    EmptyLabel(String),
    #[error("Disease catalog entry {label:?} has an empty display name")]
    EmptyDisplayName { label: String },
    #[error("Disease catalog entry {label:?} uses urgency \"unknown\", which is reserved")]
    ReservedUrgency { label: String },
    #[error("Disease catalog label {normalized:?} is defined more than once (by {first:?} and {second:?})")]
    Duplicate {
        normalized: String,
        first: String,
        second: String,
    },
}

/// Normalize a disease label for lookup.
///
/// Trims, lowercases, turns `_`, `-` and `.` into spaces, collapses whitespace
/// and strips a trailing parenthesized suffix: `"Nevus (benign)"` → `"nevus"`.
#[must_use]
pub fn normalize_label(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let base = strip_paren_suffix(&lowered);

    base.chars()
        .map(|c| if matches!(c, '_' | '-' | '.') { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_paren_suffix(s: &str) -> &str {
    if !s.ends_with(')') {
        return s;
    }
    match s.rfind('(') {
        Some(idx) if !s[..idx].trim().is_empty() => s[..idx].trim_end(),
        _ => s,
    }
}

/// Immutable disease lookup table.
#[derive(Debug, Default)]
pub struct DiseaseCatalog {
    /// Normalized key → entry.
    entries: BTreeMap<String, DiseaseInfo>,
    /// Normalized key or alias → normalized key.
    index: HashMap<String, String>,
}

impl DiseaseCatalog {
    /// Load and validate the catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&raw)?;
        info!(path = %path.display(), entries = catalog.len(), "Disease catalog loaded");
        Ok(catalog)
    }

    /// Parse and validate a catalog from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let parsed: BTreeMap<String, DiseaseInfo> = serde_json::from_str(raw)?;

        let mut catalog = Self::default();
        // Normalized name → original spelling, for error messages.
        let mut seen: HashMap<String, String> = HashMap::new();

        for (raw_label, info) in parsed {
            let key = normalize_label(&raw_label);
            if key.is_empty() {
                return Err(CatalogError::EmptyLabel(raw_label));
            }
            if info.display_name.trim().is_empty() {
                return Err(CatalogError::EmptyDisplayName { label: raw_label });
            }
            if info.urgency == Urgency::Unknown {
                return Err(CatalogError::ReservedUrgency { label: raw_label });
            }

            let names = std::iter::once(raw_label.clone()).chain(info.aliases.iter().cloned());
            for name in names {
                let normalized = normalize_label(&name);
                if normalized.is_empty() {
                    continue;
                }
                if let Some(first) = seen.get(&normalized) {
                    return Err(CatalogError::Duplicate {
                        normalized,
                        first: first.clone(),
                        second: name,
                    });
                }
                seen.insert(normalized.clone(), name);
                catalog.index.insert(normalized, key.clone());
            }

            catalog.entries.insert(key, info);
        }

        Ok(catalog)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a label by key or alias after normalization.
    #[must_use]
    pub fn lookup(&self, label: &str) -> Option<CatalogEntry<'_>> {
        let key = self.index.get(&normalize_label(label))?;
        self.entries.get_key_value(key).map(|(label, info)| CatalogEntry {
            label: label.as_str(),
            info,
        })
    }

    /// All entries sorted by normalized label.
    pub fn entries(&self) -> impl Iterator<Item = CatalogEntry<'_>> {
        self.entries.iter().map(|(label, info)| CatalogEntry {
            label: label.as_str(),
            info,
        })
    }

    /// Attach education content to a predicted label.
    ///
    /// Rules, applied in order:
    /// 1. unknown label: urgency `Unknown`, chat off, generic text
    /// 2. `confidence < threshold`: flagged, urgency raised to at least `Medium`
    /// 3. `Emergency`: chat off, action replaced by the urgent-care instruction
    #[must_use]
    pub fn enrich(&self, label: &str, confidence: f64, threshold: f64) -> Enrichment {
        let normalized = normalize_label(label);

        let mut enrichment = match self.lookup(label) {
            Some(entry) => Enrichment {
                label: entry.label.to_string(),
                known: true,
                display_name: entry.info.display_name.clone(),
                urgency: entry.info.urgency,
                description: entry.info.description.clone(),
                demo_description: entry.info.demo_description.clone(),
                recommended_action: entry.info.recommended_action.clone(),
                chat_available: entry.info.chat_available,
                low_confidence: false,
                notes: Vec::new(),
                disclaimer: DISCLAIMER,
            },
            None => Enrichment {
                display_name: label.trim().to_string(),
                label: normalized,
                known: false,
                urgency: Urgency::Unknown,
                description: FALLBACK_DESCRIPTION.to_string(),
                demo_description: FALLBACK_DESCRIPTION.to_string(),
                recommended_action: FALLBACK_ACTION.to_string(),
                chat_available: false,
                low_confidence: false,
                notes: Vec::new(),
                disclaimer: DISCLAIMER,
            },
        };

        if confidence < threshold {
            enrichment.low_confidence = true;
            enrichment.urgency = enrichment.urgency.at_least(Urgency::Medium);
            enrichment.notes.push(LOW_CONFIDENCE_NOTE.to_string());
        }

        if enrichment.urgency == Urgency::Emergency {
            enrichment.chat_available = false;
            enrichment.recommended_action = EMERGENCY_ACTION.to_string();
        }

        enrichment
    }
}

/// Education content attached to a prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrichment {
    /// Normalized catalog key, or the normalized raw label when unknown.
    pub label: String,
    pub known: bool,
    pub display_name: String,
    pub urgency: Urgency,
    pub description: String,
    pub demo_description: String,
    pub recommended_action: String,
    pub chat_available: bool,
    pub low_confidence: bool,
    pub notes: Vec<String>,
    pub disclaimer: &'static str,
}
