//! Bidirectional position index.
//!
//! Links surface node ids to the DR node ids created from them during one
//! translation pass. Direct mappings form a partial bijection; synthetic DR
//! nodes (no surface origin) are recorded but stay outside it.

use std::collections::HashMap;

use deep_repr::DrNodeId;
use serde::{Deserialize, Serialize};
use surface_ast::{NodeId, Span};
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

// ── Mapping ────────────────────────────────────────────────────────────

/// Which translation direction created a mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reverse,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Reverse => write!(f, "reverse"),
        }
    }
}

/// Whether a DR node has a surface counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingOrigin {
    Direct,
    Synthetic,
}

/// One entry of the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionMapping {
    /// `None` for synthetic mappings.
    pub surface: Option<NodeId>,
    pub deep: DrNodeId,
    pub direction: Direction,
    pub origin: MappingOrigin,
}

impl std::fmt::Display for PositionMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.surface {
            Some(s) => write!(f, "{} <-> {} ({})", s, self.deep, self.direction),
            None => write!(f, "<synthetic> <-> {} ({})", self.deep, self.direction),
        }
    }
}

// ── Index ──────────────────────────────────────────────────────────────

/// Position index built during one translation pass.
#[derive(Clone, Debug, Default)]
pub struct PositionIndex {
    mappings: Vec<PositionMapping>,
    by_surface: HashMap<NodeId, usize>,
    by_deep: HashMap<DrNodeId, usize>,
    spans: HashMap<NodeId, Span>,
}

impl PositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a direct mapping. Either id already being mapped is a conflict.
    pub fn record_mapping(
        &mut self,
        surface: NodeId,
        deep: DrNodeId,
        direction: Direction,
    ) -> BridgeResult<()> {
        if let Some(&i) = self.by_surface.get(&surface) {
            return Err(BridgeError::IndexConflict {
                surface: Some(surface),
                deep,
                existing: self.mappings[i].to_string(),
            });
        }
        self.check_deep_free(Some(surface), &deep)?;

        debug!(%surface, %deep, %direction, "position mapping recorded");
        let slot = self.mappings.len();
        self.by_surface.insert(surface, slot);
        self.by_deep.insert(deep.clone(), slot);
        self.mappings.push(PositionMapping {
            surface: Some(surface),
            deep,
            direction,
            origin: MappingOrigin::Direct,
        });
        Ok(())
    }

    /// Record a DR node that has no surface origin.
    pub fn record_synthetic(&mut self, deep: DrNodeId, direction: Direction) -> BridgeResult<()> {
        self.check_deep_free(None, &deep)?;
        let slot = self.mappings.len();
        self.by_deep.insert(deep.clone(), slot);
        self.mappings.push(PositionMapping {
            surface: None,
            deep,
            direction,
            origin: MappingOrigin::Synthetic,
        });
        Ok(())
    }

    fn check_deep_free(&self, surface: Option<NodeId>, deep: &DrNodeId) -> BridgeResult<()> {
        match self.by_deep.get(deep) {
            Some(&i) => Err(BridgeError::IndexConflict {
                surface,
                deep: deep.clone(),
                existing: self.mappings[i].to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Remember where a surface node sits in the source.
    pub fn record_span(&mut self, surface: NodeId, span: Span) {
        self.spans.insert(surface, span);
    }

    pub fn lookup_deep(&self, surface: NodeId) -> Option<&DrNodeId> {
        self.by_surface.get(&surface).map(|&i| &self.mappings[i].deep)
    }

    pub fn lookup_surface(&self, deep: &DrNodeId) -> Option<NodeId> {
        self.by_deep.get(deep).and_then(|&i| self.mappings[i].surface)
    }

    /// Source span of the surface node a DR node came from.
    pub fn span_for_deep(&self, deep: &DrNodeId) -> Option<Span> {
        self.lookup_surface(deep)
            .and_then(|s| self.spans.get(&s).copied())
    }

    pub fn is_synthetic(&self, deep: &DrNodeId) -> bool {
        self.by_deep
            .get(deep)
            .is_some_and(|&i| self.mappings[i].origin == MappingOrigin::Synthetic)
    }

    pub fn mappings(&self) -> &[PositionMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn direct_count(&self) -> usize {
        self.mappings
            .iter()
            .filter(|m| m.origin == MappingOrigin::Direct)
            .count()
    }
}
