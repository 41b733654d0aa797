//! Domain vocabulary detection for chunks and queries.
//!
//! Both vocabularies are ordered `(pattern, category)` tables. Text is
//! folded (lowercase, accents stripped, punctuation turned into spaces) and
//! padded with a space on each side, so a pattern with surrounding spaces
//! only matches whole words. The first entry that matches wins.

use serde::{Deserialize, Serialize};

use crate::text_util::normalize_words;

/// Physical boiler component a text is about.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ComponentTag {
    EconomiseurBt,
    EconomiseurHt,
    SurchauffeurBt,
    SurchauffeurHt,
    RechauffeurBt,
    RechauffeurHt,
    #[default]
    General,
}

/// Failure mode a text is about.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DefectTag {
    Corrosion,
    Surchauffe,
    Fissure,
    Percement,
    Erosion,
    Fatigue,
    Encrassement,
    #[default]
    General,
}

/// What kind of answer a question is looking for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Solution,
    Definition,
    Criticality,
    Maintenance,
    #[default]
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Economiseur,
    Surchauffeur,
    Rechauffeur,
}

impl ComponentTag {
    pub const ALL: [ComponentTag; 6] = [
        ComponentTag::EconomiseurBt,
        ComponentTag::EconomiseurHt,
        ComponentTag::SurchauffeurBt,
        ComponentTag::SurchauffeurHt,
        ComponentTag::RechauffeurBt,
        ComponentTag::RechauffeurHt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentTag::EconomiseurBt => "economiseur_bt",
            ComponentTag::EconomiseurHt => "economiseur_ht",
            ComponentTag::SurchauffeurBt => "surchauffeur_bt",
            ComponentTag::SurchauffeurHt => "surchauffeur_ht",
            ComponentTag::RechauffeurBt => "rechauffeur_bt",
            ComponentTag::RechauffeurHt => "rechauffeur_ht",
            ComponentTag::General => "general",
        }
    }

    /// Human-readable name used in answer footers.
    pub fn label(self) -> &'static str {
        match self {
            ComponentTag::EconomiseurBt => "Économiseur BT",
            ComponentTag::EconomiseurHt => "Économiseur HT",
            ComponentTag::SurchauffeurBt => "Surchauffeur BT",
            ComponentTag::SurchauffeurHt => "Surchauffeur HT",
            ComponentTag::RechauffeurBt => "Réchauffeur BT",
            ComponentTag::RechauffeurHt => "Réchauffeur HT",
            ComponentTag::General => "General",
        }
    }

    /// Parse the storage form produced by [`ComponentTag::as_str`].
    /// Unknown values map to `General`.
    pub fn parse(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == value)
            .unwrap_or_default()
    }

    fn family(self) -> Option<Family> {
        match self {
            ComponentTag::EconomiseurBt | ComponentTag::EconomiseurHt => {
                Some(Family::Economiseur)
            }
            ComponentTag::SurchauffeurBt | ComponentTag::SurchauffeurHt => {
                Some(Family::Surchauffeur)
            }
            ComponentTag::RechauffeurBt | ComponentTag::RechauffeurHt => {
                Some(Family::Rechauffeur)
            }
            ComponentTag::General => None,
        }
    }
}

impl DefectTag {
    pub const ALL: [DefectTag; 7] = [
        DefectTag::Corrosion,
        DefectTag::Surchauffe,
        DefectTag::Fissure,
        DefectTag::Percement,
        DefectTag::Erosion,
        DefectTag::Fatigue,
        DefectTag::Encrassement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DefectTag::Corrosion => "corrosion",
            DefectTag::Surchauffe => "surchauffe",
            DefectTag::Fissure => "fissure",
            DefectTag::Percement => "percement",
            DefectTag::Erosion => "erosion",
            DefectTag::Fatigue => "fatigue",
            DefectTag::Encrassement => "encrassement",
            DefectTag::General => "general",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DefectTag::Corrosion => "Corrosion",
            DefectTag::Surchauffe => "Surchauffe",
            DefectTag::Fissure => "Fissuration",
            DefectTag::Percement => "Percement",
            DefectTag::Erosion => "Érosion",
            DefectTag::Fatigue => "Fatigue",
            DefectTag::Encrassement => "Encrassement",
            DefectTag::General => "General",
        }
    }

    pub fn parse(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == value)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for DefectTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully qualified component names. Checked before [`COMPONENT_FAMILIES`].
const COMPONENT_PATTERNS: &[(&str, ComponentTag)] = &[
    ("economiseur bt", ComponentTag::EconomiseurBt),
    ("economiseur basse", ComponentTag::EconomiseurBt),
    (" eco bt ", ComponentTag::EconomiseurBt),
    ("lt economizer", ComponentTag::EconomiseurBt),
    ("low temperature economizer", ComponentTag::EconomiseurBt),
    ("economiseur ht", ComponentTag::EconomiseurHt),
    ("economiseur haute", ComponentTag::EconomiseurHt),
    (" eco ht ", ComponentTag::EconomiseurHt),
    ("ht economizer", ComponentTag::EconomiseurHt),
    ("high temperature economizer", ComponentTag::EconomiseurHt),
    ("surchauffeur bt", ComponentTag::SurchauffeurBt),
    ("surchauffeur basse", ComponentTag::SurchauffeurBt),
    (" sur bt ", ComponentTag::SurchauffeurBt),
    ("lt superheater", ComponentTag::SurchauffeurBt),
    ("low temperature superheater", ComponentTag::SurchauffeurBt),
    ("surchauffeur ht", ComponentTag::SurchauffeurHt),
    ("surchauffeur haute", ComponentTag::SurchauffeurHt),
    (" sur ht ", ComponentTag::SurchauffeurHt),
    ("ht superheater", ComponentTag::SurchauffeurHt),
    ("high temperature superheater", ComponentTag::SurchauffeurHt),
    ("rechauffeur bt", ComponentTag::RechauffeurBt),
    ("rechauffeur basse", ComponentTag::RechauffeurBt),
    (" rch bt ", ComponentTag::RechauffeurBt),
    ("lt reheater", ComponentTag::RechauffeurBt),
    ("low temperature reheater", ComponentTag::RechauffeurBt),
    ("rechauffeur ht", ComponentTag::RechauffeurHt),
    ("rechauffeur haute", ComponentTag::RechauffeurHt),
    (" rch ht ", ComponentTag::RechauffeurHt),
    ("ht reheater", ComponentTag::RechauffeurHt),
    ("high temperature reheater", ComponentTag::RechauffeurHt),
];

/// Bare family names, resolved to the member the plant refers to by default.
const COMPONENT_FAMILIES: &[(&str, ComponentTag)] = &[
    ("economiseur", ComponentTag::EconomiseurBt),
    ("economizer", ComponentTag::EconomiseurBt),
    ("surchauffeur", ComponentTag::SurchauffeurHt),
    ("superheater", ComponentTag::SurchauffeurHt),
    ("rechauffeur", ComponentTag::RechauffeurHt),
    ("reheater", ComponentTag::RechauffeurHt),
];

const DEFECT_PATTERNS: &[(&str, DefectTag)] = &[
    ("corrosion", DefectTag::Corrosion),
    ("caustic", DefectTag::Corrosion),
    ("acid attack", DefectTag::Corrosion),
    ("attaque acide", DefectTag::Corrosion),
    ("rouille", DefectTag::Corrosion),
    ("oxydation", DefectTag::Corrosion),
    (" rust ", DefectTag::Corrosion),
    (" surchauffe ", DefectTag::Surchauffe),
    (" surchauffes ", DefectTag::Surchauffe),
    ("overheat", DefectTag::Surchauffe),
    ("fluage", DefectTag::Surchauffe),
    ("creep", DefectTag::Surchauffe),
    ("fissur", DefectTag::Fissure),
    ("crack", DefectTag::Fissure),
    ("fente", DefectTag::Fissure),
    ("cassure", DefectTag::Fissure),
    ("rupture", DefectTag::Fissure),
    ("percement", DefectTag::Percement),
    ("perforation", DefectTag::Percement),
    (" perce ", DefectTag::Percement),
    (" trou ", DefectTag::Percement),
    ("fuite", DefectTag::Percement),
    ("leak", DefectTag::Percement),
    ("erosion", DefectTag::Erosion),
    ("usure", DefectTag::Erosion),
    ("abrasion", DefectTag::Erosion),
    (" wear ", DefectTag::Erosion),
    ("fatigue", DefectTag::Fatigue),
    ("cycles thermiques", DefectTag::Fatigue),
    ("contrainte", DefectTag::Fatigue),
    (" stress ", DefectTag::Fatigue),
    ("encrassement", DefectTag::Encrassement),
    ("fouling", DefectTag::Encrassement),
    (" depots ", DefectTag::Encrassement),
    (" deposits ", DefectTag::Encrassement),
];

/// Intent keyword families, checked in order.
const INTENT_PATTERNS: &[(&[&str], Intent)] = &[
    (
        &[
            "que faire",
            "solution",
            "reparer",
            "corriger",
            "remedier",
            "how to fix",
            " fix ",
            "repair",
            "resolve",
        ],
        Intent::Solution,
    ),
    (
        &[
            "qu est ce",
            "definition",
            "expliqu",
            "what is",
            "what are",
            "explain",
            "define",
            "meaning",
        ],
        Intent::Definition,
    ),
    (
        &[
            "criticite",
            "critique",
            "urgent",
            "priorite",
            "critical",
            "criticality",
            "priority",
            "severity",
        ],
        Intent::Criticality,
    ),
    (
        &[
            "maintenance",
            "controle",
            "inspection",
            "inspect",
            "entretien",
            "procedure",
        ],
        Intent::Maintenance,
    ),
];

/// Categories and keywords detected in a user question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// Detected components, each once, in vocabulary order.
    pub components: Vec<ComponentTag>,
    /// Detected defects, each once, in vocabulary order.
    pub defects: Vec<DefectTag>,
    /// The vocabulary pattern that triggered each detection.
    pub keywords: Vec<String>,
    pub intent: Intent,
}

fn first_match<T: Copy>(haystack: &str, table: &[(&str, T)]) -> Option<T> {
    table
        .iter()
        .find(|(pattern, _)| haystack.contains(pattern))
        .map(|&(_, category)| category)
}

/// Detect the component a text is about; `General` when none is named.
pub fn detect_component(text: &str) -> ComponentTag {
    let haystack = normalize_words(text);
    first_match(&haystack, COMPONENT_PATTERNS)
        .or_else(|| first_match(&haystack, COMPONENT_FAMILIES))
        .unwrap_or_default()
}

/// Detect the defect a text is about; `General` when none is named.
pub fn detect_defect(text: &str) -> DefectTag {
    first_match(&normalize_words(text), DEFECT_PATTERNS).unwrap_or_default()
}

/// Tag a text with its component and defect categories.
pub fn tag(text: &str) -> (ComponentTag, DefectTag) {
    (detect_component(text), detect_defect(text))
}

/// Classify the intent of a question.
pub fn classify_intent(text: &str) -> Intent {
    let haystack = normalize_words(text);
    INTENT_PATTERNS
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| haystack.contains(p)))
        .map(|&(_, intent)| intent)
        .unwrap_or_default()
}

/// Analyze a question: every component and defect it names, the patterns
/// that named them, and its intent.
pub fn analyze(question: &str) -> QueryAnalysis {
    let haystack = normalize_words(question);
    let mut analysis = QueryAnalysis {
        intent: classify_intent(question),
        ..QueryAnalysis::default()
    };

    for &(pattern, component) in COMPONENT_PATTERNS {
        if !analysis.components.contains(&component)
            && haystack.contains(pattern)
        {
            analysis.components.push(component);
            analysis.keywords.push(pattern.trim().to_string());
        }
    }
    for &(pattern, component) in COMPONENT_FAMILIES {
        let family_seen = analysis
            .components
            .iter()
            .any(|c| c.family() == component.family());
        if !family_seen && haystack.contains(pattern) {
            analysis.components.push(component);
            analysis.keywords.push(pattern.trim().to_string());
        }
    }
    for &(pattern, defect) in DEFECT_PATTERNS {
        if !analysis.defects.contains(&defect) && haystack.contains(pattern) {
            analysis.defects.push(defect);
            analysis.keywords.push(pattern.trim().to_string());
        }
    }

    analysis
}
