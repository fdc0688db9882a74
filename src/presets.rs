//! Suggested values offered by the cycle and classroom forms. Suggestions
//! never restrict what a user may submit.

use serde::Serialize;

pub const PRESETS_PRESCO: &[&str] = &["1ère Année", "2ème Année", "3ème Année"];

pub const PRESETS_FOND1: &[&str] = &[
    "1ère Année",
    "2ème Année",
    "3ème Année",
    "4ème Année",
    "5ème Année",
    "6ème Année",
    "7ème Année",
    "8ème Année",
    "9ème Année",
];

pub const PRESETS_FOND2: &[&str] = &["7ème Année", "8ème Année", "9ème Année (DEF)"];

pub const PRESETS_SECONDAIRE: &[&str] = &[
    "10ème Année",
    "11ème Année",
    "12ème Année (Terminale)",
    "1ère Année",
    "2ème Année",
    "2ème Année (CAP)",
    "3ème Année (BT1)",
    "4ème Année (BT2)",
];

pub const PRESETS_SUPERIEUR: &[&str] = &[
    "Licence 1",
    "Licence 2",
    "Licence 3",
    "Master 1",
    "Master 2",
    "Doctorat 1",
    "Doctorat 2",
];

pub const CYCLE_NAME_PRESETS: &[&str] = &[
    "Préscolaire (Jardin d'enfant, Crèche)",
    "Fondamental (1er Cycle)",
    "Fondamental (2ème Cycle)",
    "Secondaire (Lycée, Technique, Professionnel)",
    "Supérieure (Universitaire)",
];

pub const NOTATION_PRESETS: &[i64] = &[10, 20, 100];

pub const DEFAULT_NOTATION: i64 = 20;

// Checked in order; the first table with a matching keyword wins.
const KEYWORD_TABLES: &[(&[&str], &[&str])] = &[
    (
        &["présco", "presco", "jardin", "crèche", "creche"],
        PRESETS_PRESCO,
    ),
    (&["1er cycle", "premier cycle"], PRESETS_FOND1),
    (
        &["2ème cycle", "2eme cycle", "deuxième cycle", "deuxieme cycle"],
        PRESETS_FOND2,
    ),
    (
        &["secondaire", "lycée", "lycee", "technique", "professionnel"],
        PRESETS_SECONDAIRE,
    ),
    (&["supérieure", "superieure", "universit"], PRESETS_SUPERIEUR),
];

/// Classroom label suggestions for a cycle name.
pub fn label_presets_for_cycle(cycle_name: Option<&str>) -> &'static [&'static str] {
    let name = match cycle_name {
        Some(name) if !name.trim().is_empty() => name.to_lowercase(),
        _ => return &[],
    };

    KEYWORD_TABLES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| name.contains(keyword)))
        .map(|(_, presets)| *presets)
        .unwrap_or(&[])
}

#[derive(Debug, Serialize)]
pub struct PresetTables {
    pub presco: &'static [&'static str],
    pub fond1: &'static [&'static str],
    pub fond2: &'static [&'static str],
    pub secondaire: &'static [&'static str],
    pub superieur: &'static [&'static str],
}

pub fn all_label_presets() -> PresetTables {
    PresetTables {
        presco: PRESETS_PRESCO,
        fond1: PRESETS_FOND1,
        fond2: PRESETS_FOND2,
        secondaire: PRESETS_SECONDAIRE,
        superieur: PRESETS_SUPERIEUR,
    }
}
