//! System prompts and answer post-processing.

use crate::tagger::{Intent, QueryAnalysis};

const BASE_PROMPT: &str = "\
Tu es un expert en maintenance industrielle spécialisé dans les chaudières et l'analyse AMDEC.

Expertise:
- Analyses AMDEC et calculs de criticité (F×G×D)
- Défauts courants: corrosion, surchauffe, fissuration, percement, érosion, fatigue, encrassement
- Composants: économiseurs, surchauffeurs, réchauffeurs (BT/HT)
- Maintenance préventive et corrective

Style: précis et technique mais accessible, avec une structure claire. \
Appuie-toi uniquement sur le contexte technique fourni et signale quand il ne suffit pas.";

fn intent_instructions(intent: Intent) -> Option<&'static str> {
    match intent {
        Intent::Solution => Some(
            "Propose des actions correctives concrètes, classées par priorité, \
             avec les moyens de contrôle associés.",
        ),
        Intent::Definition => Some(
            "Donne une définition claire, puis le mécanisme, les causes \
             principales et les composants concernés.",
        ),
        Intent::Criticality => Some(
            "Évalue la criticité avec la méthode F×G×D: justifie chaque note \
             et indique le niveau de criticité obtenu.",
        ),
        Intent::Maintenance => Some(
            "Décris le plan de maintenance: opérations, fréquences, durées, \
             matériel et consignes de sécurité.",
        ),
        Intent::General => None,
    }
}

/// System prompt for a question of the given intent.
pub fn system_prompt(intent: Intent) -> String {
    match intent_instructions(intent) {
        Some(extra) => format!("{BASE_PROMPT}\n\nConsigne: {extra}"),
        None => BASE_PROMPT.to_string(),
    }
}

/// Append the detected components and defects to a generated answer.
/// The answer is returned unchanged when nothing was detected.
pub fn post_process(answer: &str, analysis: &QueryAnalysis) -> String {
    if analysis.components.is_empty() && analysis.defects.is_empty() {
        return answer.to_string();
    }

    let mut out = answer.trim_end().to_string();
    out.push_str("\n\n---");
    if !analysis.components.is_empty() {
        let labels: Vec<&str> =
            analysis.components.iter().map(|c| c.label()).collect();
        out.push_str(&format!("\nComposants détectés: {}", labels.join(", ")));
    }
    if !analysis.defects.is_empty() {
        let labels: Vec<&str> =
            analysis.defects.iter().map(|d| d.label()).collect();
        out.push_str(&format!("\nDéfauts détectés: {}", labels.join(", ")));
    }
    out
}
