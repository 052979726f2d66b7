//! Battle format registry.
//!
//! The set of formats is closed: a [`Format`] can only be obtained from the
//! catalog below, so anything holding one is known to be valid. User input
//! goes through [`Format::from_str`] or [`resolve_aliases`] at the boundary.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unknown format: {0}")]
    Unknown(String),
}

/// Where a format's data is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Random battle sets from the pkmn/randbats repository
    RandBats,
    /// Curated competitive sets from the Smogon mirror
    Smogon,
}

impl Source {
    pub fn formats(self) -> &'static [Format] {
        match self {
            Source::RandBats => RANDBATS_FORMATS,
            Source::Smogon => SMOGON_FORMATS,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Source::RandBats => "randbats",
            Source::Smogon => "smogon",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A known battle format identifier, e.g. `gen9randombattle` or `gen9ou`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Format(&'static str);

// ============================================================================
// Catalog
// ============================================================================

const RANDBATS_FORMATS: &[Format] = &[
    Format("gen1randombattle"),
    Format("gen2randombattle"),
    Format("gen3randombattle"),
    Format("gen4randombattle"),
    Format("gen5randombattle"),
    Format("gen6randombattle"),
    Format("gen7letsgorandombattle"),
    Format("gen7randombattle"),
    Format("gen8bdsprandombattle"),
    Format("gen8randombattle"),
    Format("gen8randomdoublesbattle"),
    Format("gen9babyrandombattle"),
    Format("gen9randombattle"),
    Format("gen9randomdoublesbattle"),
];

const SMOGON_FORMATS: &[Format] = &[
    Format("gen9ou"),
    Format("gen9uu"),
    Format("gen9ru"),
    Format("gen9nu"),
    Format("gen9pu"),
    Format("gen9ubers"),
    Format("gen9doublesou"),
    Format("gen9vgc2024"),
    Format("gen8ou"),
    Format("gen8uu"),
    Format("gen8ru"),
    Format("gen8nu"),
    Format("gen8pu"),
    Format("gen8ubers"),
    Format("gen8doublesou"),
    Format("gen8vgc2022"),
    Format("gen8vgc2023"),
    Format("gen7ou"),
    Format("gen7uu"),
    Format("gen7ru"),
    Format("gen7nu"),
    Format("gen7pu"),
    Format("gen7ubers"),
    Format("gen7doublesou"),
    Format("gen7vgc2017"),
    Format("gen7vgc2018"),
    Format("gen7vgc2019"),
    Format("gen6ou"),
    Format("gen6uu"),
    Format("gen6ru"),
    Format("gen6nu"),
    Format("gen6pu"),
    Format("gen6ubers"),
    Format("gen6doublesou"),
    Format("gen6vgc2014"),
    Format("gen6vgc2015"),
    Format("gen6vgc2016"),
    Format("gen5ou"),
    Format("gen5uu"),
    Format("gen5ru"),
    Format("gen5nu"),
    Format("gen5pu"),
    Format("gen5ubers"),
    Format("gen5doublesou"),
    Format("gen5vgc2011"),
    Format("gen5vgc2012"),
    Format("gen5vgc2013"),
    Format("gen4ou"),
    Format("gen4uu"),
    Format("gen4nu"),
    Format("gen4pu"),
    Format("gen4ubers"),
    Format("gen4doublesou"),
    Format("gen4vgc2009"),
    Format("gen4vgc2010"),
    Format("gen3ou"),
    Format("gen3uu"),
    Format("gen3nu"),
    Format("gen3pu"),
    Format("gen3ubers"),
    Format("gen3doublesou"),
    Format("gen2ou"),
    Format("gen2uu"),
    Format("gen2nu"),
    Format("gen2pu"),
    Format("gen2ubers"),
    Format("gen2doublesou"),
    Format("gen1ou"),
    Format("gen1uu"),
    Format("gen1nu"),
    Format("gen1pu"),
    Format("gen1ubers"),
    Format("gen1doublesou"),
];

/// Aliases that expand to a fixed group of random battle formats.
/// `all` and `smogon` are handled separately since they cover a whole source.
const ALIASES: &[(&str, &[&str])] = &[
    ("gen1", &["gen1randombattle"]),
    ("gen2", &["gen2randombattle"]),
    ("gen3", &["gen3randombattle"]),
    ("gen4", &["gen4randombattle"]),
    ("gen5", &["gen5randombattle"]),
    ("gen6", &["gen6randombattle"]),
    ("gen7", &["gen7randombattle"]),
    ("gen8", &["gen8randombattle"]),
    ("gen9", &["gen9randombattle"]),
    (
        "classic",
        &["gen1randombattle", "gen2randombattle", "gen3randombattle", "gen4randombattle"],
    ),
    ("modern", &["gen8randombattle", "gen9randombattle"]),
    ("doubles", &["gen8randomdoublesbattle", "gen9randomdoublesbattle"]),
    ("letsgo", &["gen7letsgorandombattle"]),
    ("bdsp", &["gen8bdsprandombattle"]),
    ("baby", &["gen9babyrandombattle"]),
];

/// Formats tried, in order, when a lookup does not name a format.
pub const PREFERRED_FORMATS: &[Format] = &[
    Format("gen9randombattle"),
    Format("gen8randombattle"),
    Format("gen7randombattle"),
];

impl Format {
    /// Every known format: random battle formats first, then Smogon tiers.
    pub fn all() -> impl Iterator<Item = Format> {
        RANDBATS_FORMATS.iter().chain(SMOGON_FORMATS).copied()
    }

    pub fn id(self) -> &'static str {
        self.0
    }

    pub fn source(self) -> Source {
        if SMOGON_FORMATS.contains(&self) {
            Source::Smogon
        } else {
            Source::RandBats
        }
    }

    /// Generation digit following the `gen` prefix
    pub fn generation(self) -> Option<u8> {
        self.0
            .strip_prefix("gen")
            .and_then(|rest| rest.chars().next())
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8)
    }

    pub fn battle_type(self) -> BattleType {
        // Checked in precedence order; an id may contain more than one marker.
        if self.0.contains("doubles") {
            BattleType::Doubles
        } else if self.0.contains("letsgo") {
            BattleType::LetsGo
        } else if self.0.contains("bdsp") {
            BattleType::Bdsp
        } else if self.0.contains("baby") {
            BattleType::Baby
        } else {
            BattleType::Singles
        }
    }

    pub fn describe(self) -> FormatInfo {
        let generation = self.generation();
        let battle_type = self.battle_type();
        let source = self.source();

        let description = match battle_type {
            BattleType::Doubles => "Double battle format".to_string(),
            BattleType::LetsGo => "Let's Go format".to_string(),
            BattleType::Bdsp => "Brilliant Diamond/Shining Pearl format".to_string(),
            BattleType::Baby => "Baby Pokemon format".to_string(),
            BattleType::Singles => match source {
                Source::RandBats => format!("Generation {} random battle", generation_label(generation)),
                Source::Smogon => format!(
                    "Generation {} {} sets",
                    generation_label(generation),
                    self.tier().to_ascii_uppercase()
                ),
            },
        };

        FormatInfo {
            format: self,
            source,
            generation,
            battle_type,
            description,
            record_count: None,
        }
    }

    /// The part of the id after the generation, e.g. `ou` for `gen9ou`
    fn tier(self) -> &'static str {
        match self.0.strip_prefix("gen") {
            Some(rest) => rest.trim_start_matches(|c: char| c.is_ascii_digit()),
            None => self.0,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Format::all()
            .find(|f| f.0 == wanted)
            .ok_or_else(|| FormatError::Unknown(s.to_string()))
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

fn generation_label(generation: Option<u8>) -> String {
    generation
        .map(|g| g.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ============================================================================
// Aliases
// ============================================================================

/// Expand a mix of format ids and aliases into a set of formats.
///
/// Literal ids pass through, aliases expand to their group, and unknown
/// tokens are dropped without error.
pub fn resolve_aliases<I, S>(tokens: I) -> BTreeSet<Format>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut resolved = BTreeSet::new();
    for token in tokens {
        let token = token.as_ref().trim();
        match token {
            "all" => resolved.extend(RANDBATS_FORMATS),
            "smogon" => resolved.extend(SMOGON_FORMATS),
            _ => {
                if let Some((_, ids)) = ALIASES.iter().find(|(alias, _)| *alias == token) {
                    resolved.extend(ids.iter().filter_map(|id| id.parse::<Format>().ok()));
                } else if let Ok(format) = token.parse::<Format>() {
                    resolved.insert(format);
                }
            }
        }
    }
    resolved
}

/// Alias names with their expansions, for display
pub fn aliases() -> Vec<(&'static str, Vec<Format>)> {
    ALIASES
        .iter()
        .map(|(alias, _)| (*alias, resolve_aliases([*alias]).into_iter().collect()))
        .collect()
}

// ============================================================================
// Format description
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleType {
    Singles,
    Doubles,
    LetsGo,
    Bdsp,
    Baby,
}

impl BattleType {
    pub fn label(self) -> &'static str {
        match self {
            BattleType::Singles => "singles",
            BattleType::Doubles => "doubles",
            BattleType::LetsGo => "letsgo",
            BattleType::Bdsp => "bdsp",
            BattleType::Baby => "baby",
        }
    }
}

impl fmt::Display for BattleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatInfo {
    pub format: Format,
    pub source: Source,
    pub generation: Option<u8>,
    pub battle_type: BattleType,
    pub description: String,
    /// Number of records, filled in by a cache that has the format loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
}

impl FormatInfo {
    pub fn generation_display(&self) -> String {
        generation_label(self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(id: &str) -> Format {
        id.parse().unwrap()
    }

    #[test]
    fn test_parse_known_and_unknown() {
        assert_eq!(fmt("gen9randombattle").id(), "gen9randombattle");
        assert_eq!(fmt(" gen9ou ").id(), "gen9ou");
        assert_eq!(
            "gen10randombattle".parse::<Format>(),
            Err(FormatError::Unknown("gen10randombattle".to_string()))
        );
    }

    #[test]
    fn test_catalog_order_and_sources() {
        let all: Vec<Format> = Format::all().collect();
        assert_eq!(all.len(), RANDBATS_FORMATS.len() + SMOGON_FORMATS.len());
        assert_eq!(all[0].id(), "gen1randombattle");
        assert_eq!(all[RANDBATS_FORMATS.len()].id(), "gen9ou");
        assert_eq!(fmt("gen9randombattle").source(), Source::RandBats);
        assert_eq!(fmt("gen4vgc2010").source(), Source::Smogon);

        let unique: BTreeSet<Format> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_resolve_classic_alias() {
        let expected: BTreeSet<Format> = [
            "gen1randombattle",
            "gen2randombattle",
            "gen3randombattle",
            "gen4randombattle",
        ]
        .iter()
        .map(|id| fmt(id))
        .collect();

        assert_eq!(resolve_aliases(["classic"]), expected);
        // Overlapping input in any order collapses to the same set
        assert_eq!(resolve_aliases(["gen2", "classic", "gen1randombattle"]), expected);
    }

    #[test]
    fn test_resolve_drops_unknown_tokens() {
        let resolved = resolve_aliases(["nonsense", "gen9ou", "modern"]);
        let ids: Vec<&str> = resolved.iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec!["gen8randombattle", "gen9ou", "gen9randombattle"]);
        assert!(resolve_aliases(["", "gen0"]).is_empty());
    }

    #[test]
    fn test_resolve_source_aliases() {
        assert_eq!(resolve_aliases(["all"]).len(), RANDBATS_FORMATS.len());
        assert!(resolve_aliases(["all"]).iter().all(|f| f.source() == Source::RandBats));
        assert_eq!(resolve_aliases(["smogon"]).len(), SMOGON_FORMATS.len());
    }

    #[test]
    fn test_battle_type_precedence() {
        assert_eq!(fmt("gen9randomdoublesbattle").battle_type(), BattleType::Doubles);
        assert_eq!(fmt("gen7letsgorandombattle").battle_type(), BattleType::LetsGo);
        assert_eq!(fmt("gen8bdsprandombattle").battle_type(), BattleType::Bdsp);
        assert_eq!(fmt("gen9babyrandombattle").battle_type(), BattleType::Baby);
        assert_eq!(fmt("gen9randombattle").battle_type(), BattleType::Singles);
        assert_eq!(fmt("gen8doublesou").battle_type(), BattleType::Doubles);
    }

    #[test]
    fn test_describe() {
        let info = fmt("gen9randombattle").describe();
        assert_eq!(info.generation, Some(9));
        assert_eq!(info.battle_type, BattleType::Singles);
        assert_eq!(info.description, "Generation 9 random battle");
        assert_eq!(info.record_count, None);

        let info = fmt("gen9ou").describe();
        assert_eq!(info.source, Source::Smogon);
        assert_eq!(info.description, "Generation 9 OU sets");

        assert_eq!(fmt("gen8bdsprandombattle").describe().description, "Brilliant Diamond/Shining Pearl format");
    }

    #[test]
    fn test_aliases_listing() {
        let listed = aliases();
        let (name, formats) = listed.iter().find(|(a, _)| *a == "doubles").unwrap();
        assert_eq!(*name, "doubles");
        assert_eq!(formats.len(), 2);
    }
}
