//! Built-in reference knowledge indexed when no document yields a chunk.

use crate::{
    chunking::Chunk,
    tagger::{ComponentTag, DefectTag},
};

const SEED: &[(&str, &str, &str, ComponentTag, DefectTag)] = &[
    (
        "Base expertise AMDEC",
        "Défauts Économiseur BT",
        "CORROSION CAUSTIC ATTACK - ÉCONOMISEUR BT

Définition: corrosion caustique qui attaque surtout les collecteurs de sortie
des économiseurs basse température.

Causes principales:
- Concentration excessive de soude caustique (NaOH)
- Zones de stagnation avec évaporation
- pH local très élevé (>12)
- Température entre 250 et 350°C

Solutions:
1. Contrôle strict du pH de l'eau d'alimentation
2. Sodium limité à moins de 3 ppm
3. Meilleure circulation dans les collecteurs
4. Suivi des épaisseurs par ultrasons
5. Revêtement céramique des zones sensibles

Criticité: ÉLEVÉE (F=3, G=5, D=3, C=45)",
        ComponentTag::EconomiseurBt,
        DefectTag::Corrosion,
    ),
    (
        "Base expertise AMDEC",
        "Défauts Surchauffeur HT",
        "SURCHAUFFE LONG TERME - SURCHAUFFEUR HT

Définition: la surchauffe long terme (long-term overheat) dégrade
progressivement les tubes porteurs des surchauffeurs haute température.

Mécanisme:
- Exposition prolongée au-delà de 580°C
- Dégradation de la microstructure et carbures grossiers
- Perte de résistance mécanique jusqu'à la rupture par fluage

Actions correctives:
1. Optimisation de la combustion
2. Capteurs de température permanents
3. Meilleure circulation vapeur
4. Nettoyage régulier des surfaces d'échange

Criticité: CRITIQUE (F=2, G=5, D=2, C=20)",
        ComponentTag::SurchauffeurHt,
        DefectTag::Surchauffe,
    ),
    (
        "Guide maintenance préventive",
        "Procédures Économiseur",
        "MAINTENANCE PRÉVENTIVE - ÉCONOMISEUR BT

Inspection visuelle (mensuelle, 45 minutes): état externe, supports et
fixations.

Contrôle ultrasons (trimestriel, 90 minutes): mesure d'épaisseur des zones
sensibles et cartographie des amincissements.

Test d'étanchéité (semestriel, 120 minutes): pressurisation selon procédure,
contrôle des joints et brides.

Matériel: lampe torche, appareil ultrasons, kit de test d'étanchéité.",
        ComponentTag::EconomiseurBt,
        DefectTag::General,
    ),
    (
        "Méthode AMDEC",
        "Calcul criticité",
        "ANALYSE CRITICITÉ AMDEC - MÉTHODE F×G×D

La criticité se calcule par C = F × G × D.

F, fréquence d'apparition (1 à 4): de très rare (moins d'une fois en 10 ans)
à fréquente (plusieurs fois par an).
G, gravité (1 à 5): de négligeable à catastrophique (arrêt d'urgence).
D, détection (1 à 4): de certaine (surveillance continue) à improbable.

Niveaux: C ≤ 12 négligeable, maintenance corrective. 12 < C ≤ 16 moyenne,
préventive systématique. 16 < C ≤ 20 élevée, préventive conditionnelle.
C > 20 critique, remise en cause de la conception.",
        ComponentTag::General,
        DefectTag::General,
    ),
    (
        "Base expertise AMDEC",
        "Défauts Réchauffeur HT",
        "ACID ATTACK - RÉCHAUFFEUR HT

Définition: corrosion acide des branches de sortie des réchauffeurs haute
température.

Mécanisme:
- Condensation d'acides (H2SO4, HCl) sur paroi froide
- Attaque chimique localisée, surface en « fromage suisse »
- Perte progressive de matière

Prévention:
1. Température de paroi maintenue au-dessus de 150°C
2. Meilleure isolation thermique
3. Nettoyage chimique périodique
4. Revêtement résistant aux acides

Criticité: ÉLEVÉE (F=3, G=4, D=2, C=24)",
        ComponentTag::RechauffeurHt,
        DefectTag::Corrosion,
    ),
];

/// The five reference chunks, already tagged.
pub fn seed_chunks() -> Vec<Chunk> {
    SEED.iter()
        .map(|&(source, section, content, component, defect)| Chunk {
            content: content.to_string(),
            source: source.to_string(),
            section: section.to_string(),
            component,
            defect,
        })
        .collect()
}
