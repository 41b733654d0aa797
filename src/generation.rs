//! Text generation collaborator.

use crate::{
    error::Result,
    tagger::{self, Intent},
    text_util::{ELLIPSIS, char_len, take_chars},
};

/// Produces an answer from a system prompt, the user's question and the
/// retrieved context. Implementations must accept an empty context.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        system_prompt: &str,
        question: &str,
        context: &str,
        temperature: f32,
    ) -> Result<String>;
}

/// Deterministic generator that answers from the context alone, used when
/// no language model is configured.
#[derive(Debug, Clone)]
pub struct OfflineGenerator {
    /// Characters of context quoted in the answer.
    pub excerpt_chars: usize,
}

impl Default for OfflineGenerator {
    fn default() -> Self {
        Self { excerpt_chars: 800 }
    }
}

const CAPABILITIES: &str = "\
Aucune documentation pertinente n'a été trouvée pour cette question.

Je peux vous aider sur:
- Composants: économiseurs, surchauffeurs, réchauffeurs (BT/HT)
- Défauts: corrosion, surchauffe, fissuration, percement, érosion, fatigue, encrassement
- Maintenance: procédures, fréquences, matériel
- AMDEC: calcul de criticité F×G×D";

fn lead_in(intent: Intent) -> &'static str {
    match intent {
        Intent::Solution => "Actions recommandées d'après la documentation:",
        Intent::Definition => "Définition d'après la documentation:",
        Intent::Criticality => "Éléments de criticité d'après la documentation:",
        Intent::Maintenance => "Procédure de maintenance d'après la documentation:",
        Intent::General => "Informations pertinentes d'après la documentation:",
    }
}

impl Generator for OfflineGenerator {
    fn generate(
        &self,
        _system_prompt: &str,
        question: &str,
        context: &str,
        _temperature: f32,
    ) -> Result<String> {
        let context = context.trim();
        if context.is_empty() {
            return Ok(CAPABILITIES.to_string());
        }

        let mut excerpt = take_chars(context, self.excerpt_chars).to_string();
        if char_len(context) > self.excerpt_chars {
            excerpt.push_str(ELLIPSIS);
        }
        let intent = tagger::classify_intent(question);
        Ok(format!("{}\n\n{excerpt}", lead_in(intent)))
    }
}
