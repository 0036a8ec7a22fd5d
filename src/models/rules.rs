use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single step of a hash rule.
///
/// Tables are written in YAML using serde's external tagging:
///
/// ```yaml
/// "119f3414":
///   - info: "v3.1 -> v3.2: Aglaea Hair Draw Hash"
///   - upgrade_hash: { to: "1e0c0119" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Log-only description of the rule
    Info(String),

    /// Rewrite every `hash = <old>` to `hash = <to>` and queue `to`.
    UpgradeHash { to: String },

    /// Like `UpgradeHash`, but only when one of `required_siblings` was seen in the file.
    /// Used for hashes that two unrelated parts share.
    UpgradeSharedHash {
        to: String,
        required_siblings: Vec<String>,
        description: String,
    },

    /// Disable every section declaring the hash
    CommentOut,

    /// Stop the rest of the rule when `hash` is already part of the file.
    CheckHashAbsent { hash: String },

    /// Split the section declaring the hash into one section per title/hash pair.
    MultiplySection { titles: Vec<String>, hashes: Vec<String> },

    /// Upgrade to `to` unless one of `missing` is already in the file, in which case
    /// the old section is redundant and gets commented out.
    UpgradeElseComment { to: String, missing: Vec<String> },

    /// Index-buffer split of an old single-IB part. Recorded but not applied.
    DuplicateIndexedSection {
        title: String,
        hash: String,
        target_indices: Vec<String>,
        source_indices: Vec<String>,
    },

    /// Vertex buffer layout conversion. Recorded but not applied.
    ConvertBufferFormat { operation: String, format: String },

    /// Add `run = CommandListSkinTexture` to the index buffer overrides of the hash.
    AddSkinTextureCheck,

    /// Insert `[TextureOverride<title>]` declaring `hashes[0]` after the current section,
    /// unless one of `hashes` is already in the file.
    AddSectionIfMissing {
        hashes: Vec<String>,
        title: String,
        #[serde(default)]
        content: String,
    },

    /// Copy the current section as `[TextureOverride<title>]` declaring `hashes[0]`,
    /// unless one of `hashes` is already in the file.
    MultiplySectionIfMissing { hashes: Vec<String>, title: String },

    /// Texcoord stride shrink of an old game version. Recorded but not applied.
    ShrinkTexcoordColor { version: String },

    /// Texcoord buffer element remap. Recorded but not applied.
    RemapTexcoord {
        id: String,
        old_format: Vec<String>,
        new_format: Vec<String>,
    },

    /// Blend buffer bone index remap. Recorded but not applied.
    RemapBlendIndices {
        hash: String,
        old_indices: Vec<u32>,
        new_indices: Vec<u32>,
    },

    /// Re-split of indexed index buffer sections. Recorded but not applied.
    TransferIndexedSections {
        target_indices: Vec<String>,
        source_indices: Vec<String>,
    },
}

impl Action {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Info(_) => "info",
            Action::UpgradeHash { .. } => "upgrade_hash",
            Action::UpgradeSharedHash { .. } => "upgrade_shared_hash",
            Action::CommentOut => "comment_out",
            Action::CheckHashAbsent { .. } => "check_hash_absent",
            Action::MultiplySection { .. } => "multiply_section",
            Action::UpgradeElseComment { .. } => "upgrade_else_comment",
            Action::DuplicateIndexedSection { .. } => "duplicate_indexed_section",
            Action::ConvertBufferFormat { .. } => "convert_buffer_format",
            Action::AddSkinTextureCheck => "add_skin_texture_check",
            Action::AddSectionIfMissing { .. } => "add_section_if_missing",
            Action::MultiplySectionIfMissing { .. } => "multiply_section_if_missing",
            Action::ShrinkTexcoordColor { .. } => "shrink_texcoord_color",
            Action::RemapTexcoord { .. } => "remap_texcoord",
            Action::RemapBlendIndices { .. } => "remap_blend_indices",
            Action::TransferIndexedSections { .. } => "transfer_indexed_sections",
        }
    }
}

/// Blend, draw and position hashes of one character part.
///
/// Written in tables as a `[blend, draw, position]` sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct HashTrio {
    pub blend: String,
    pub draw: String,
    pub position: String,
}

impl HashTrio {
    pub fn new(blend: &str, draw: &str, position: &str) -> Self {
        Self {
            blend: blend.to_lowercase(),
            draw: draw.to_lowercase(),
            position: position.to_lowercase(),
        }
    }
}

impl From<(String, String, String)> for HashTrio {
    fn from((blend, draw, position): (String, String, String)) -> Self {
        Self::new(&blend, &draw, &position)
    }
}

impl From<HashTrio> for (String, String, String) {
    fn from(trio: HashTrio) -> Self {
        (trio.blend, trio.draw, trio.position)
    }
}

/// Picks the blend hash for a position hash shared by several parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionVariant {
    /// Case-insensitive keyword looked up in the section header
    pub keyword: String,
    pub blend: String,
}

/// Static per-game rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    /// Short tag used by archives and the CLI (e.g. "hsr")
    pub game: String,
    pub title: String,
    pub version: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    /// Part name -> hash trio
    #[serde(default)]
    pub trios: IndexMap<String, HashTrio>,

    #[serde(default)]
    pub shared_positions: IndexMap<String, Vec<PositionVariant>>,

    #[serde(default)]
    pub rules: IndexMap<String, Vec<Action>>,
}

impl RuleTable {
    /// Empty table for a game without any rules
    pub fn empty(game: &str) -> Self {
        Self {
            game: game.to_string(),
            title: game.to_string(),
            version: String::new(),
            aliases: Vec::new(),
            trios: IndexMap::new(),
            shared_positions: IndexMap::new(),
            rules: IndexMap::new(),
        }
    }

    /// Parse a YAML table. Hash keys and values are lower-cased so lookups can use
    /// normalized line values directly.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml_ng::Error> {
        let table: RuleTable = serde_yaml_ng::from_str(yaml)?;
        Ok(table.normalized())
    }

    fn normalized(self) -> Self {
        let trios = self
            .trios
            .into_iter()
            .map(|(part, trio)| (part, HashTrio::new(&trio.blend, &trio.draw, &trio.position)))
            .collect();

        let shared_positions = self
            .shared_positions
            .into_iter()
            .map(|(hash, variants)| {
                let variants = variants
                    .into_iter()
                    .map(|v| PositionVariant {
                        keyword: v.keyword.to_lowercase(),
                        blend: v.blend.to_lowercase(),
                    })
                    .collect();
                (hash.to_lowercase(), variants)
            })
            .collect();

        let rules = self
            .rules
            .into_iter()
            .map(|(hash, actions)| (hash.to_lowercase(), actions))
            .collect();

        Self {
            trios,
            shared_positions,
            rules,
            ..self
        }
    }

    pub fn with_rule(mut self, hash: &str, actions: Vec<Action>) -> Self {
        self.rules.insert(hash.to_lowercase(), actions);
        self
    }

    pub fn with_trio(mut self, part: &str, trio: HashTrio) -> Self {
        self.trios.insert(part.to_string(), trio);
        self
    }

    pub fn matches_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        self.game.eq_ignore_ascii_case(tag) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(tag))
    }

    pub fn actions_for(&self, hash: &str) -> Option<&[Action]> {
        self.rules.get(hash).map(Vec::as_slice)
    }

    /// First part whose position slot is `hash`.
    pub fn trio_by_position(&self, hash: &str) -> Option<(&str, &HashTrio)> {
        self.trios
            .iter()
            .find(|(_, trio)| trio.position == hash)
            .map(|(part, trio)| (part.as_str(), trio))
    }

    /// First part whose blend slot is `hash`.
    pub fn trio_by_blend(&self, hash: &str) -> Option<(&str, &HashTrio)> {
        self.trios
            .iter()
            .find(|(_, trio)| trio.blend == hash)
            .map(|(part, trio)| (part.as_str(), trio))
    }

    pub fn is_blend_hash(&self, hash: &str) -> bool {
        self.trios.values().any(|trio| trio.blend == hash)
    }

    /// Blend hash to convert a position override to.
    ///
    /// Shared position hashes resolve through the header keyword; `None` when the
    /// hash is unknown or ambiguous for this header.
    pub fn blend_for_position(&self, hash: &str, section_name: &str) -> Option<String> {
        let (_, trio) = self.trio_by_position(hash)?;
        match self.shared_positions.get(hash) {
            Some(variants) => {
                let name = section_name.to_lowercase();
                variants
                    .iter()
                    .find(|v| name.contains(&v.keyword))
                    .map(|v| v.blend.clone())
            }
            None => Some(trio.blend.clone()),
        }
    }
}
