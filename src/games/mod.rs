//! Per-game rule tables.
//!
//! The tables shipped with the fixer are embedded at build time and parsed once.
//! Host applications can register more tables, or replace a shipped one, through
//! [`GameRegistry::register`].

use crate::models::RuleTable;
use crate::services::errors::FixError;
use std::sync::LazyLock;

const EMBEDDED: [(&str, &str); 2] = [
    ("hsr.yaml", include_str!("../../data/rules/hsr.yaml")),
    ("zzz.yaml", include_str!("../../data/rules/zzz.yaml")),
];

/// Parsed once; a broken table is kept as its error message so every caller sees it.
static BUILTIN_TABLES: LazyLock<Result<Vec<RuleTable>, (String, String)>> = LazyLock::new(|| {
    EMBEDDED
        .iter()
        .map(|(name, yaml)| RuleTable::from_yaml(yaml).map_err(|e| (name.to_string(), e.to_string())))
        .collect()
});

/// Rule tables keyed by game tag
#[derive(Debug, Clone)]
pub struct GameRegistry {
    tables: Vec<RuleTable>,
}

impl GameRegistry {
    /// Registry without any table
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    /// Registry holding the embedded tables
    pub fn builtin() -> Result<Self, FixError> {
        match &*BUILTIN_TABLES {
            Ok(tables) => Ok(Self { tables: tables.clone() }),
            Err((name, reason)) => Err(FixError::InvalidRuleTable {
                name: name.clone(),
                reason: reason.clone(),
            }),
        }
    }

    /// Add a table. A table for the same game replaces the previous one.
    pub fn register(&mut self, table: RuleTable) {
        match self
            .tables
            .iter_mut()
            .find(|t| t.game.eq_ignore_ascii_case(&table.game))
        {
            Some(existing) => {
                tracing::info!("Replacing rule table for {} with version {}", table.game, table.version);
                *existing = table;
            }
            None => {
                tracing::debug!("Registered rule table for {}", table.game);
                self.tables.push(table);
            }
        }
    }

    /// Table for a game tag or one of its aliases, ignoring case
    pub fn get(&self, tag: &str) -> Option<&RuleTable> {
        self.tables.iter().find(|t| t.matches_tag(tag))
    }

    pub fn resolve(&self, tag: &str) -> Result<&RuleTable, FixError> {
        self.get(tag).ok_or_else(|| FixError::UnknownGame(tag.to_string()))
    }

    pub fn games(&self) -> impl Iterator<Item = &RuleTable> {
        self.tables.iter()
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}
