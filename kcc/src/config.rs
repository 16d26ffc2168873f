/*!
Actor-level controller configuration.

`KccSettings` is mutated by gameplay code between steps and read-only while
solving. Most fields are replicated by the network codec; tuning values that
stay local (teleport threshold, solver caps, snapping) are kept here too so an
actor's whole configuration can be authored in one RON document.
*/

use serde::{Deserialize, Serialize};

use crate::{
    bitmask_flags::{BitmaskFlags, FlagBitmask},
    define_bitmask_flags,
    error::ConfigError,
};

define_bitmask_flags!(Feature, u8, {
    StepUp,
    GroundSnap,
    PredictionCorrection,
    AntiJitter,
    Ccd,
});

/// Number of bits the feature set occupies on the wire.
pub const FEATURE_BITS: u32 = 5;

/// Actor collider shape. Only capsules collide; `None` disables the collider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShapeType {
    None = 0,
    #[default]
    Capsule = 1,
}

/// How an authority runs the controller for fixed and render updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AuthorityBehavior {
    #[default]
    PredictFixedInterpolateRender = 0,
    PredictFixedPredictRender = 1,
}

/// Which parts of the state proxies interpolate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum InterpolationMode {
    /// Interpolate transform and copy the full discrete state.
    #[default]
    Full = 0,
    /// Interpolate transform only.
    Transform = 1,
}

impl ShapeType {
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::Capsule,
            _ => Self::None,
        }
    }
}

impl AuthorityBehavior {
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::PredictFixedPredictRender,
            _ => Self::PredictFixedInterpolateRender,
        }
    }
}

impl InterpolationMode {
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::Transform,
            _ => Self::Full,
        }
    }
}

/// Controller configuration.
///
/// Notes
/// - Distances are in meters, angles in degrees, speeds in meters per second.
/// - `height` is the full capsule height including both caps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KccSettings {
    pub shape: ShapeType,
    pub is_trigger: bool,
    pub radius: f32,
    pub height: f32,
    /// Skin used to probe ground and step-up candidates around the capsule.
    pub extent: f32,
    /// Layer index (0..32) of the actor's own collider.
    pub collider_layer: u8,
    /// Layers the actor collides with.
    pub collision_layer_mask: u32,
    /// Raw [`Feature`] bits.
    pub features: u8,
    pub input_authority_behavior: AuthorityBehavior,
    pub state_authority_behavior: AuthorityBehavior,
    pub proxy_interpolation_mode: InterpolationMode,
    pub force_predicted_look_rotation: bool,
    pub allow_client_teleports: bool,
    /// Max distance per tick before a replicated move counts as a teleport.
    pub teleport_threshold: f32,
    /// Capacity shared by collisions, modifiers and ignores.
    pub max_total_interactions: usize,
    pub max_ground_angle: f32,
    pub max_wall_angle: f32,
    pub max_hang_angle: f32,
    pub max_sub_steps: u32,
    pub resolver_iterations: u32,
    pub snap_distance: f32,
    pub snap_speed: f32,
    /// Vertical acceleration applied while airborne (negative is down).
    pub gravity: f32,
}

impl Default for KccSettings {
    fn default() -> Self {
        Self {
            shape: ShapeType::Capsule,
            is_trigger: false,
            radius: 0.35,
            height: 1.8,
            extent: 0.035,
            collider_layer: 0,
            collision_layer_mask: u32::MAX,
            features: Feature::GroundSnap.mask(),
            input_authority_behavior: AuthorityBehavior::default(),
            state_authority_behavior: AuthorityBehavior::default(),
            proxy_interpolation_mode: InterpolationMode::default(),
            force_predicted_look_rotation: false,
            allow_client_teleports: false,
            teleport_threshold: 1.0,
            max_total_interactions: 8,
            max_ground_angle: 60.0,
            max_wall_angle: 5.0,
            max_hang_angle: 30.0,
            max_sub_steps: 4,
            resolver_iterations: 2,
            snap_distance: 0.25,
            snap_speed: 4.0,
            gravity: -20.0,
        }
    }
}

impl KccSettings {
    /// Parse settings from a RON document and validate them.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn feature_flags(&self) -> BitmaskFlags<u8> {
        BitmaskFlags::new(self.features & ((1 << FEATURE_BITS) - 1))
    }

    #[inline]
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.feature_flags().has(feature)
    }

    pub fn set_feature(&mut self, feature: Feature, enabled: bool) {
        let mut flags = self.feature_flags();
        flags.set(feature, enabled);
        self.features = flags.bits;
    }

    /// Reject configurations the solver cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.radius));
        }
        if !self.height.is_finite() || self.height < self.radius * 2.0 {
            return Err(ConfigError::InvalidHeight {
                height: self.height,
                radius: self.radius,
            });
        }
        if !self.extent.is_finite() || self.extent < 0.0 {
            return Err(ConfigError::InvalidExtent(self.extent));
        }
        for (name, value) in [
            ("max_ground_angle", self.max_ground_angle),
            ("max_wall_angle", self.max_wall_angle),
            ("max_hang_angle", self.max_hang_angle),
        ] {
            if !(0.0..=90.0).contains(&value) {
                return Err(ConfigError::InvalidAngle { name, value });
            }
        }
        if self.collider_layer >= 32 {
            return Err(ConfigError::InvalidColliderLayer(self.collider_layer));
        }
        if self.max_total_interactions == 0 {
            return Err(ConfigError::NoInteractionCapacity);
        }
        for (name, value) in [
            ("teleport_threshold", self.teleport_threshold),
            ("snap_distance", self.snap_distance),
            ("snap_speed", self.snap_speed),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue { name, value });
            }
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::InvalidValue {
                name: "gravity",
                value: self.gravity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert_eq!(KccSettings::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_degenerate_capsules() {
        let mut s = KccSettings {
            radius: 0.0,
            ..Default::default()
        };
        assert_eq!(s.validate(), Err(ConfigError::InvalidRadius(0.0)));

        s.radius = 0.5;
        s.height = 0.8;
        assert!(matches!(
            s.validate(),
            Err(ConfigError::InvalidHeight { .. })
        ));

        s.height = 2.0;
        s.extent = f32::NAN;
        assert!(matches!(s.validate(), Err(ConfigError::InvalidExtent(_))));
    }

    #[test]
    fn rejects_out_of_range_layer_and_capacity() {
        let s = KccSettings {
            collider_layer: 32,
            ..Default::default()
        };
        assert_eq!(s.validate(), Err(ConfigError::InvalidColliderLayer(32)));

        let s = KccSettings {
            max_total_interactions: 0,
            ..Default::default()
        };
        assert_eq!(s.validate(), Err(ConfigError::NoInteractionCapacity));
    }

    #[test]
    fn parses_partial_ron_with_defaults() {
        let s = KccSettings::from_ron_str("(radius: 0.5, height: 2.0, max_sub_steps: 8)").unwrap();
        assert_eq!(s.radius, 0.5);
        assert_eq!(s.height, 2.0);
        assert_eq!(s.max_sub_steps, 8);
        assert_eq!(s.max_ground_angle, 60.0);

        let err = KccSettings::from_ron_str("(radius: -1.0)").unwrap_err();
        assert_eq!(err, ConfigError::InvalidRadius(-1.0));

        assert!(matches!(
            KccSettings::from_ron_str("(radius: "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn ron_round_trip_keeps_settings() {
        let mut s = KccSettings::default();
        s.set_feature(Feature::StepUp, true);
        s.proxy_interpolation_mode = InterpolationMode::Transform;
        let text = s.to_ron_string().unwrap();
        assert_eq!(KccSettings::from_ron_str(&text).unwrap(), s);
    }

    #[test]
    fn feature_flags_toggle() {
        let mut s = KccSettings::default();
        assert!(s.has_feature(Feature::GroundSnap));
        s.set_feature(Feature::GroundSnap, false);
        s.set_feature(Feature::Ccd, true);
        assert!(!s.has_feature(Feature::GroundSnap));
        assert!(s.has_feature(Feature::Ccd));
        assert_eq!(s.features, 1 << 4);
    }
}
