//! Transfer configuration.
//!
//! [`TransferConfig`] is plain data and deserializes with defaults for every
//! omitted option. Oracles (nearest positions, divisions) are attached through
//! [`crate::transfer::TransferBuilder`]; [`TransferConfig::validate`] checks
//! the options against what was attached.

use crate::mesh::BlockId;
use crate::transfer_error::TransferError;
use serde::{Deserialize, Serialize};

/// How source values are produced for a query point.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Continuous field function of each source problem.
    #[default]
    MeshFunction,
    /// Mean of the k nearest source nodes or element centroids.
    NearestLocation,
    /// Native shape functions of the containing source element.
    ShapeProjection,
    /// A spatial function provided by each source problem.
    UserCallback,
}

/// Which source locations a nearest-location transfer samples.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Nodes for nodal source fields, element centroids otherwise.
    #[default]
    VariableDefault,
    Nodes,
    Centroids,
}

/// How a spatial division participates in a transfer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivisionUse {
    /// Only points inside some division take part.
    SpatialRestriction,
    /// Source and target division indices must be equal.
    MatchDivisionIndex,
    /// A division index must equal the id of the problem on the other side.
    MatchSubappIndex,
}

impl DivisionUse {
    fn is_index_matching(self) -> bool {
        !matches!(self, DivisionUse::SpatialRestriction)
    }
}

/// Options of a general field transfer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    /// Variables read on the source problems.
    pub source_variables: Vec<String>,
    /// Variables written on the target problems, paired by position with
    /// `source_variables`.
    pub target_variables: Vec<String>,
    /// Component read for each source variable; empty means component 0.
    pub source_variable_components: Vec<usize>,
    /// Component written for each target variable; empty means component 0.
    pub target_variable_components: Vec<usize>,
    pub strategy: Strategy,
    /// Per-variable sampling locations for nearest-location transfers; empty
    /// means [`SourceType::VariableDefault`] for all.
    pub source_type: Vec<SourceType>,
    pub error_on_miss: bool,
    pub bbox_factor: f64,
    /// Per-axis full width overriding the inflated box; 0 keeps the axis.
    pub fixed_bounding_box_size: Option<[f64; 3]>,
    pub extrapolation_constant: Option<f64>,
    pub greedy_search: bool,
    pub use_nearest_app: bool,
    pub from_app_must_contain_point: bool,
    pub search_value_conflicts: bool,
    pub group_subapps: bool,
    pub num_nearest_points: usize,
    pub from_blocks: Vec<BlockId>,
    pub to_blocks: Vec<BlockId>,
    pub from_boundaries: Vec<String>,
    pub to_boundaries: Vec<String>,
    pub from_division_use: Option<DivisionUse>,
    pub to_division_use: Option<DivisionUse>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            source_variables: Vec::new(),
            target_variables: Vec::new(),
            source_variable_components: Vec::new(),
            target_variable_components: Vec::new(),
            strategy: Strategy::default(),
            source_type: Vec::new(),
            error_on_miss: false,
            bbox_factor: 1.0,
            fixed_bounding_box_size: None,
            extrapolation_constant: None,
            greedy_search: false,
            use_nearest_app: false,
            from_app_must_contain_point: false,
            search_value_conflicts: false,
            group_subapps: false,
            num_nearest_points: 1,
            from_blocks: Vec::new(),
            to_blocks: Vec::new(),
            from_boundaries: Vec::new(),
            to_boundaries: Vec::new(),
            from_division_use: None,
            to_division_use: None,
        }
    }
}

/// Which oracles accompany a configuration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AttachedOracles {
    pub nearest_positions: bool,
    pub from_division: bool,
    pub to_division: bool,
}

/// One source/target variable pair with resolved component selectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableMapping {
    pub source: String,
    pub source_component: usize,
    pub target: String,
    pub target_component: usize,
    pub source_type: SourceType,
}

fn invalid(option: &'static str, reason: impl Into<String>) -> TransferError {
    TransferError::InvalidConfig {
        option,
        reason: reason.into(),
    }
}

impl TransferConfig {
    /// Single-variable configuration using the same name on both sides.
    pub fn for_variable(name: impl Into<String>, strategy: Strategy) -> Self {
        let name = name.into();
        Self {
            source_variables: vec![name.clone()],
            target_variables: vec![name],
            strategy,
            ..Self::default()
        }
    }

    /// Reject option values and combinations the engine cannot honour.
    pub fn validate(&self, attached: AttachedOracles) -> Result<(), TransferError> {
        let n = self.source_variables.len();
        if n == 0 {
            return Err(invalid("source_variables", "at least one variable is required"));
        }
        if self.target_variables.len() != n {
            return Err(invalid(
                "target_variables",
                format!(
                    "{} target variables for {n} source variables",
                    self.target_variables.len()
                ),
            ));
        }
        for (option, len) in [
            ("source_variable_components", self.source_variable_components.len()),
            ("target_variable_components", self.target_variable_components.len()),
            ("source_type", self.source_type.len()),
        ] {
            if len != 0 && len != n {
                return Err(invalid(
                    option,
                    format!("{len} entries for {n} variables"),
                ));
            }
        }
        if self.num_nearest_points == 0 {
            return Err(invalid("num_nearest_points", "must be at least 1"));
        }
        if !(self.bbox_factor.is_finite() && self.bbox_factor > 0.0) {
            return Err(invalid(
                "bbox_factor",
                format!("must be positive, got {}", self.bbox_factor),
            ));
        }
        if let Some(size) = self.fixed_bounding_box_size {
            if size.iter().any(|s| !s.is_finite() || *s < 0.0) {
                return Err(invalid(
                    "fixed_bounding_box_size",
                    format!("entries must be finite and non-negative, got {size:?}"),
                ));
            }
        }
        if let Some(c) = self.extrapolation_constant {
            if !c.is_finite() {
                return Err(invalid("extrapolation_constant", "must be finite"));
            }
        }

        for (option, usage, has_oracle) in [
            ("from_division_use", self.from_division_use, attached.from_division),
            ("to_division_use", self.to_division_use, attached.to_division),
        ] {
            if usage.is_some() != has_oracle {
                return Err(invalid(
                    option,
                    "a division usage requires a division and vice versa",
                ));
            }
        }
        let matching = |u: Option<DivisionUse>| u == Some(DivisionUse::MatchDivisionIndex);
        if matching(self.from_division_use) != matching(self.to_division_use) {
            return Err(invalid(
                "to_division_use",
                "division index matching must be requested on both sides",
            ));
        }

        if attached.nearest_positions {
            if self.from_app_must_contain_point {
                return Err(invalid(
                    "from_app_must_contain_point",
                    "cannot be combined with nearest-position grouping",
                ));
            }
            if self.from_division_use.is_some() || self.to_division_use.is_some() {
                return Err(invalid(
                    "use_nearest_position",
                    "cannot be combined with mesh divisions",
                ));
            }
        }

        if self.group_subapps {
            if !attached.nearest_positions && self.from_division_use.is_none() {
                return Err(invalid(
                    "group_subapps",
                    "requires nearest positions or a source division to group by",
                ));
            }
            if self.use_nearest_app {
                return Err(invalid(
                    "group_subapps",
                    "cannot be combined with use_nearest_app",
                ));
            }
            if [self.from_division_use, self.to_division_use]
                .iter()
                .flatten()
                .any(|u| u.is_index_matching())
            {
                return Err(invalid(
                    "group_subapps",
                    "cannot be combined with division index matching",
                ));
            }
        }
        Ok(())
    }

    /// Variable pairs with defaults filled in. Assumes a validated config.
    pub fn variable_mappings(&self) -> Vec<VariableMapping> {
        (0..self.source_variables.len())
            .map(|i| VariableMapping {
                source: self.source_variables[i].clone(),
                source_component: self.source_variable_components.get(i).copied().unwrap_or(0),
                target: self.target_variables[i].clone(),
                target_component: self.target_variable_components.get(i).copied().unwrap_or(0),
                source_type: self.source_type.get(i).copied().unwrap_or_default(),
            })
            .collect()
    }
}
