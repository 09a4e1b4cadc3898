//! Configuration types for peers, joint assemblies and the link system.
//!
//! Thresholds and lengths use `f64::INFINITY` to mean "unbounded". When
//! serialized, unbounded values are written as `null` so they survive
//! formats (such as JSON) that have no representation for infinity.

use crate::error::ConfigError;
use crate::node_def::AttachNodeDef;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Serde adapter writing infinite values as `None`.
#[cfg(feature = "serde")]
mod unbounded {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

fn check_threshold(field: &'static str, value: f64) -> crate::Result<()> {
    if value.is_nan() || value < 0.0 {
        return Err(ConfigError::invalid_value(
            field,
            format!("{value} must be non-negative (use infinity for unbounded)"),
        ));
    }
    Ok(())
}

// ============================================================================
// Break thresholds
// ============================================================================

/// Force and torque a constraint tolerates before it breaks.
///
/// # Example
///
/// ```
/// use link_types::BreakThresholds;
///
/// let pivot = BreakThresholds::torque_only(50.0);
/// assert!(pivot.force.is_infinite());
/// assert!(pivot.is_exceeded_by(0.0, 60.0));
/// assert!(!pivot.is_exceeded_by(1e9, 10.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BreakThresholds {
    /// Linear break force (N).
    #[cfg_attr(feature = "serde", serde(with = "unbounded"))]
    pub force: f64,
    /// Break torque (N·m).
    #[cfg_attr(feature = "serde", serde(with = "unbounded"))]
    pub torque: f64,
}

impl Default for BreakThresholds {
    fn default() -> Self {
        Self::unbreakable()
    }
}

impl BreakThresholds {
    /// Create thresholds from force and torque.
    #[must_use]
    pub const fn new(force: f64, torque: f64) -> Self {
        Self { force, torque }
    }

    /// Thresholds that never break.
    #[must_use]
    pub const fn unbreakable() -> Self {
        Self {
            force: f64::INFINITY,
            torque: f64::INFINITY,
        }
    }

    /// Break by force only.
    #[must_use]
    pub const fn force_only(force: f64) -> Self {
        Self {
            force,
            torque: f64::INFINITY,
        }
    }

    /// Break by torque only.
    #[must_use]
    pub const fn torque_only(torque: f64) -> Self {
        Self {
            force: f64::INFINITY,
            torque,
        }
    }

    /// The same thresholds with the two axes exchanged.
    #[must_use]
    pub const fn crossed(self) -> Self {
        Self {
            force: self.torque,
            torque: self.force,
        }
    }

    /// Whether neither axis can ever break.
    #[must_use]
    pub fn is_unbreakable(&self) -> bool {
        self.force.is_infinite() && self.torque.is_infinite()
    }

    /// Whether a load of `force` and `torque` breaks the constraint.
    #[must_use]
    pub fn is_exceeded_by(&self, force: f64, torque: f64) -> bool {
        force > self.force || torque > self.torque
    }

    /// Validate the thresholds.
    pub fn validate(&self) -> crate::Result<()> {
        check_threshold("break_force", self.force)?;
        check_threshold("break_torque", self.torque)
    }
}

// ============================================================================
// Peer configuration
// ============================================================================

/// Allowed separation between a source's and a target's attach nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkLimits {
    /// Minimum node separation (m).
    pub min_length: f64,
    /// Maximum node separation (m).
    #[cfg_attr(feature = "serde", serde(with = "unbounded"))]
    pub max_length: f64,
}

impl Default for LinkLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl LinkLimits {
    /// Create limits.
    #[must_use]
    pub const fn new(min_length: f64, max_length: f64) -> Self {
        Self {
            min_length,
            max_length,
        }
    }

    /// No limits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            min_length: 0.0,
            max_length: f64::INFINITY,
        }
    }

    /// Check whether a separation is within limits.
    #[must_use]
    pub fn contains(&self, length: f64) -> bool {
        length >= self.min_length && length <= self.max_length
    }

    /// Validate the limits.
    pub fn validate(&self) -> crate::Result<()> {
        check_threshold("min_length", self.min_length)?;
        check_threshold("max_length", self.max_length)?;
        if self.min_length > self.max_length {
            return Err(ConfigError::invalid_value(
                "min_length",
                format!("{} exceeds max_length {}", self.min_length, self.max_length),
            ));
        }
        Ok(())
    }
}

/// Configuration of one link peer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeerConfig {
    /// Link type tag. Peers link only when tags match exactly.
    pub link_type: String,
    /// Name of the attach node used as the constraint anchor.
    pub attach_node: String,
    /// Definition used to synthesize the node when the part lacks it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub attach_node_definition: Option<String>,
    /// Allowed link length.
    #[cfg_attr(feature = "serde", serde(default))]
    pub limits: LinkLimits,
}

impl PeerConfig {
    /// Create a configuration anchored at an existing node.
    #[must_use]
    pub fn new(link_type: impl Into<String>, attach_node: impl Into<String>) -> Self {
        Self {
            link_type: link_type.into(),
            attach_node: attach_node.into(),
            attach_node_definition: None,
            limits: LinkLimits::unlimited(),
        }
    }

    /// Synthesize the attach node from a definition when it is missing.
    #[must_use]
    pub fn with_node_definition(mut self, definition: impl Into<String>) -> Self {
        self.attach_node_definition = Some(definition.into());
        self
    }

    /// Set link length limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LinkLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Parse the node definition, if any.
    pub fn parsed_node_definition(&self) -> crate::Result<Option<AttachNodeDef>> {
        self.attach_node_definition
            .as_deref()
            .map(str::parse)
            .transpose()
    }

    /// Check whether two peers may link by type.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.link_type == other.link_type
    }

    /// Validate the configuration.
    ///
    /// An unparseable node definition is not an error here: the peer
    /// loads without coupling support instead.
    pub fn validate(&self) -> crate::Result<()> {
        if self.link_type.trim().is_empty() {
            return Err(ConfigError::invalid_value("link_type", "must not be empty"));
        }
        if self.attach_node.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "attach_node",
                "must not be empty",
            ));
        }
        self.limits.validate()
    }
}

// ============================================================================
// Joint configuration
// ============================================================================

/// The joint assembly strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointVariant {
    /// Reuses the host's native rigid coupling.
    RigidStock,
    /// Two pivots joined by a spring strut.
    DualPivotStrut,
    /// A spring cable ending in a fixed plug.
    SpringCable,
}

impl std::fmt::Display for JointVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RigidStock => f.write_str("rigid-stock"),
            Self::DualPivotStrut => f.write_str("dual-pivot-strut"),
            Self::SpringCable => f.write_str("spring-cable"),
        }
    }
}

/// Parameters of the dual pivot strut.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StrutConfig {
    /// Link break thresholds.
    pub breaks: BreakThresholds,
    /// Strut spring force. Infinite means no strut constraint is built.
    #[cfg_attr(feature = "serde", serde(with = "unbounded"))]
    pub spring_force: f64,
    /// Strut spring damper.
    pub spring_damper: f64,
    /// Cone limit of the source pivot (degrees).
    pub source_cone_limit: Option<f64>,
    /// Cone limit of the target pivot (degrees).
    pub target_cone_limit: Option<f64>,
}

impl Default for StrutConfig {
    fn default() -> Self {
        Self {
            breaks: BreakThresholds::unbreakable(),
            spring_force: f64::INFINITY,
            spring_damper: 0.0,
            source_cone_limit: None,
            target_cone_limit: None,
        }
    }
}

impl StrutConfig {
    /// Set break thresholds.
    #[must_use]
    pub fn with_breaks(mut self, breaks: BreakThresholds) -> Self {
        self.breaks = breaks;
        self
    }

    /// Set the strut spring.
    #[must_use]
    pub fn with_spring(mut self, force: f64, damper: f64) -> Self {
        self.spring_force = force;
        self.spring_damper = damper;
        self
    }

    /// Set per-side cone limits (degrees).
    #[must_use]
    pub fn with_cone_limits(mut self, source: Option<f64>, target: Option<f64>) -> Self {
        self.source_cone_limit = source;
        self.target_cone_limit = target;
        self
    }

    /// Whether a strut constraint is built between the pivots.
    #[must_use]
    pub fn has_strut(&self) -> bool {
        self.spring_force.is_finite()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        self.breaks.validate()?;
        check_threshold("spring_force", self.spring_force)?;
        check_threshold("spring_damper", self.spring_damper)?;
        for (field, limit) in [
            ("source_cone_limit", self.source_cone_limit),
            ("target_cone_limit", self.target_cone_limit),
        ] {
            if let Some(angle) = limit {
                if !(0.0..=180.0).contains(&angle) {
                    return Err(ConfigError::invalid_value(
                        field,
                        format!("{angle} not in [0, 180] degrees"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// How configured thresholds map onto the cable spring's break axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BreakAxisMapping {
    /// Spring force threshold comes from the configured torque and vice
    /// versa.
    #[default]
    Crossed,
    /// Force maps to force, torque to torque.
    Direct,
}

impl BreakAxisMapping {
    /// Map configured thresholds to the spring's thresholds.
    #[must_use]
    pub const fn apply(self, breaks: BreakThresholds) -> BreakThresholds {
        match self {
            Self::Crossed => breaks.crossed(),
            Self::Direct => breaks,
        }
    }
}

/// Parameters of the spring cable.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CableConfig {
    /// Link break thresholds.
    pub breaks: BreakThresholds,
    /// Nominal cable length; the spring's maximum distance (m).
    pub max_length: f64,
    /// Spring force.
    pub spring: f64,
    /// Spring damper.
    pub damper: f64,
    /// Interaction distance of the cable end, for grab detection.
    pub interaction_distance: Option<f64>,
    /// Break axis mapping of the spring.
    #[cfg_attr(feature = "serde", serde(default))]
    pub axis_mapping: BreakAxisMapping,
}

impl Default for CableConfig {
    fn default() -> Self {
        Self {
            breaks: BreakThresholds::unbreakable(),
            max_length: 10.0,
            spring: 1000.0,
            damper: 1.0,
            interaction_distance: None,
            axis_mapping: BreakAxisMapping::Crossed,
        }
    }
}

impl CableConfig {
    /// Create a cable of the given nominal length.
    #[must_use]
    pub fn with_length(max_length: f64) -> Self {
        Self {
            max_length,
            ..Self::default()
        }
    }

    /// Set break thresholds.
    #[must_use]
    pub fn with_breaks(mut self, breaks: BreakThresholds) -> Self {
        self.breaks = breaks;
        self
    }

    /// Set the spring.
    #[must_use]
    pub fn with_spring(mut self, spring: f64, damper: f64) -> Self {
        self.spring = spring;
        self.damper = damper;
        self
    }

    /// Give the cable end a grab volume.
    #[must_use]
    pub fn with_interaction_distance(mut self, distance: f64) -> Self {
        self.interaction_distance = Some(distance);
        self
    }

    /// Set the break axis mapping.
    #[must_use]
    pub fn with_axis_mapping(mut self, mapping: BreakAxisMapping) -> Self {
        self.axis_mapping = mapping;
        self
    }

    /// Thresholds installed on the spring constraint.
    #[must_use]
    pub fn spring_breaks(&self) -> BreakThresholds {
        self.axis_mapping.apply(self.breaks)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        self.breaks.validate()?;
        if !self.max_length.is_finite() || self.max_length <= 0.0 {
            return Err(ConfigError::invalid_value(
                "max_length",
                format!("{} must be positive and finite", self.max_length),
            ));
        }
        check_threshold("spring", self.spring)?;
        check_threshold("damper", self.damper)?;
        if let Some(distance) = self.interaction_distance {
            if !distance.is_finite() || distance <= 0.0 {
                return Err(ConfigError::invalid_value(
                    "interaction_distance",
                    format!("{distance} must be positive and finite"),
                ));
            }
        }
        Ok(())
    }
}

/// Joint assembly configuration of a link source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "variant", rename_all = "snake_case"))]
pub enum JointConfig {
    /// Reuse the host's rigid coupling.
    RigidStock {
        /// Link break thresholds.
        breaks: BreakThresholds,
    },
    /// Dual pivot strut.
    DualPivotStrut(StrutConfig),
    /// Spring cable.
    SpringCable(CableConfig),
}

impl Default for JointConfig {
    fn default() -> Self {
        Self::RigidStock {
            breaks: BreakThresholds::unbreakable(),
        }
    }
}

impl JointConfig {
    /// Rigid stock joint with the given thresholds.
    #[must_use]
    pub const fn rigid(breaks: BreakThresholds) -> Self {
        Self::RigidStock { breaks }
    }

    /// The strategy this configuration selects.
    #[must_use]
    pub const fn variant(&self) -> JointVariant {
        match self {
            Self::RigidStock { .. } => JointVariant::RigidStock,
            Self::DualPivotStrut(_) => JointVariant::DualPivotStrut,
            Self::SpringCable(_) => JointVariant::SpringCable,
        }
    }

    /// Configured break thresholds.
    #[must_use]
    pub const fn breaks(&self) -> BreakThresholds {
        match self {
            Self::RigidStock { breaks } => *breaks,
            Self::DualPivotStrut(strut) => strut.breaks,
            Self::SpringCable(cable) => cable.breaks,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::RigidStock { breaks } => breaks.validate(),
            Self::DualPivotStrut(strut) => strut.validate(),
            Self::SpringCable(cable) => cable.validate(),
        }
    }
}

// ============================================================================
// System configuration
// ============================================================================

/// The scene the host is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GameScene {
    /// Background loading: no attach-node bookkeeping.
    Loading,
    /// Vessel editor.
    Editor,
    /// Live flight.
    #[default]
    Flight,
}

impl GameScene {
    /// Whether synthesized attach nodes are registered on their parts.
    #[must_use]
    pub const fn is_interactive(self) -> bool {
        matches!(self, Self::Editor | Self::Flight)
    }
}

/// Configuration of a link system.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkSystemConfig {
    /// Current scene.
    pub scene: GameScene,
    /// Fixed physics timestep (seconds).
    pub timestep: f64,
    /// Mass of each strut pivot body (kg).
    pub pivot_mass: f64,
    /// Cable stretch at or below this is reported as not stretched.
    pub stretch_epsilon: f64,
}

impl Default for LinkSystemConfig {
    fn default() -> Self {
        Self {
            scene: GameScene::Flight,
            timestep: 1.0 / 50.0,
            pivot_mass: 0.001,
            stretch_epsilon: 1e-4,
        }
    }
}

impl LinkSystemConfig {
    /// Configuration for a scene.
    #[must_use]
    pub fn for_scene(scene: GameScene) -> Self {
        Self {
            scene,
            ..Self::default()
        }
    }

    /// Set the timestep.
    #[must_use]
    pub fn with_timestep(mut self, timestep: f64) -> Self {
        self.timestep = timestep;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(ConfigError::invalid_value(
                "timestep",
                format!("{} must be positive and finite", self.timestep),
            ));
        }
        if !self.pivot_mass.is_finite() || self.pivot_mass <= 0.0 {
            return Err(ConfigError::invalid_value(
                "pivot_mass",
                format!("{} must be positive and finite", self.pivot_mass),
            ));
        }
        if !self.stretch_epsilon.is_finite() || self.stretch_epsilon < 0.0 {
            return Err(ConfigError::invalid_value(
                "stretch_epsilon",
                format!("{} must be non-negative", self.stretch_epsilon),
            ));
        }
        Ok(())
    }
}
