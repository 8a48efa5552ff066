//! Built-in fan curve presets
//!
//! Each preset carries one curve for the CPU fan and one for the GPU fans.
//! Profiles refer to presets by name.

use std::sync::OnceLock;

use crate::constants::presets;
use crate::data::{ChannelRole, Profile};
use crate::engine::FanCurve;

/// A named CPU/GPU curve pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurvePreset {
    name: String,
    cpu: FanCurve,
    gpu: FanCurve,
}

impl CurvePreset {
    pub fn new(name: impl Into<String>, cpu: FanCurve, gpu: FanCurve) -> Self {
        Self {
            name: name.into(),
            cpu,
            gpu,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn curve(&self, role: ChannelRole) -> &FanCurve {
        match role {
            ChannelRole::Cpu => &self.cpu,
            ChannelRole::Gpu => &self.gpu,
        }
    }
}

/// The set of named presets available to profiles
#[derive(Debug, Clone)]
pub struct PresetLibrary {
    presets: Vec<CurvePreset>,
}

impl PresetLibrary {
    /// Shared library of the built-in presets
    pub fn builtin() -> &'static PresetLibrary {
        static LIBRARY: OnceLock<PresetLibrary> = OnceLock::new();
        LIBRARY.get_or_init(|| PresetLibrary {
            presets: builtin_presets(),
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.presets.iter().map(|p| p.name.clone()).collect()
    }

    /// Exact, case-sensitive lookup
    pub fn get(&self, name: &str) -> Option<&CurvePreset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Named preset, falling back to `Balanced` and then the first preset
    pub fn resolve(&self, name: &str) -> &CurvePreset {
        if let Some(preset) = self.get(name) {
            return preset;
        }
        tracing::debug!(preset = name, "Unknown fan preset, using fallback");
        self.get(presets::FALLBACK).unwrap_or(&self.presets[0])
    }

    /// Curve a channel of `role` should follow under `profile`
    ///
    /// `Custom` profiles use their own curve for the role when they carry one.
    pub fn curve_for_profile(&self, profile: &Profile, role: ChannelRole) -> FanCurve {
        if profile.curve_preset == presets::CUSTOM {
            if let Some(curve) = profile.custom_curves.as_ref().and_then(|c| c.curve_for(role)) {
                return curve.clone();
            }
        }
        self.resolve(&profile.curve_preset).curve(role).clone()
    }
}

fn builtin_presets() -> Vec<CurvePreset> {
    vec![
        CurvePreset::new(
            "Silent",
            FanCurve::from_key_points(&[
                (60, 0), (65, 20), (69, 25), (71, 30), (73, 35),
                (75, 40), (77, 45), (79, 50), (81, 55), (83, 60),
                (85, 65), (87, 70), (88, 75), (89, 80), (90, 85),
                (92, 90), (94, 95), (100, 100),
            ]),
            FanCurve::from_key_points(&[
                (59, 0), (61, 20), (63, 22), (65, 24), (67, 25),
                (69, 30), (71, 37), (73, 43), (75, 46), (77, 52),
                (81, 60), (83, 65), (85, 70), (87, 80), (89, 90),
                (100, 100),
            ]),
        ),
        CurvePreset::new(
            "Quiet",
            FanCurve::from_key_points(&[
                (50, 0), (60, 20), (64, 23), (66, 25), (68, 28),
                (70, 33), (72, 40), (74, 44), (76, 48), (78, 52),
                (80, 55), (82, 60), (84, 65), (86, 70), (88, 80),
                (90, 85), (92, 90), (94, 95), (100, 100),
            ]),
            FanCurve::from_key_points(&[
                (50, 0), (60, 20), (64, 25), (68, 30), (72, 40),
                (74, 44), (76, 48), (78, 52), (80, 55), (82, 60),
                (84, 65), (86, 70), (88, 80), (90, 90), (100, 100),
            ]),
        ),
        CurvePreset::new(
            "Balanced",
            FanCurve::from_key_points(&[
                (45, 0), (51, 20), (53, 23), (56, 26), (59, 30),
                (62, 33), (64, 35), (66, 40), (68, 45), (70, 50),
                (72, 52), (74, 53), (76, 57), (78, 60), (80, 65),
                (82, 70), (84, 75), (86, 80), (88, 85), (91, 90),
                (94, 95), (100, 100),
            ]),
            FanCurve::from_key_points(&[
                (45, 0), (51, 20), (53, 23), (56, 26), (59, 30),
                (62, 33), (64, 35), (66, 40), (68, 45), (70, 50),
                (72, 52), (74, 53), (76, 57), (78, 60), (80, 65),
                (82, 70), (84, 75), (86, 80), (88, 85), (90, 90),
                (100, 100),
            ]),
        ),
        CurvePreset::new(
            "Cool",
            FanCurve::from_key_points(&[
                (39, 0), (45, 20), (50, 25), (56, 30), (60, 35),
                (64, 42), (67, 45), (70, 50), (73, 55), (76, 60),
                (79, 70), (82, 75), (85, 85), (89, 90), (93, 95),
                (100, 100),
            ]),
            FanCurve::from_key_points(&[
                (39, 0), (44, 25), (49, 30), (54, 35), (59, 40),
                (64, 45), (69, 50), (74, 60), (79, 70), (84, 75),
                (88, 90), (91, 100),
            ]),
        ),
        CurvePreset::new(
            "Freezy",
            FanCurve::from_key_points(&[
                (29, 20), (39, 25), (45, 30), (50, 40), (55, 40),
                (60, 45), (65, 50), (70, 55), (75, 60), (77, 65),
                (79, 70), (82, 80), (85, 85), (89, 90), (94, 95),
                (100, 100),
            ]),
            FanCurve::from_key_points(&[
                (35, 25), (40, 30), (45, 35), (50, 40), (55, 45),
                (60, 50), (65, 60), (70, 65), (75, 70), (80, 75),
                (85, 85), (89, 95), (100, 100),
            ]),
        ),
        CurvePreset::new("CustomPreset", custom_preset_curve(), custom_preset_curve()),
    ]
}

/// Starting point offered to users editing their own curve
fn custom_preset_curve() -> FanCurve {
    FanCurve::from_key_points(&[
        (20, 12), (30, 14), (40, 22), (50, 35), (60, 44),
        (70, 56), (80, 79), (90, 85), (100, 90),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CurvePair;

    #[test]
    fn test_builtin_names() {
        let names = PresetLibrary::builtin().names();
        assert_eq!(
            names,
            vec!["Silent", "Quiet", "Balanced", "Cool", "Freezy", "CustomPreset"]
        );
    }

    #[test]
    fn test_resolve_exact_and_fallback() {
        let lib = PresetLibrary::builtin();
        assert_eq!(lib.resolve("Cool").name(), "Cool");
        assert_eq!(lib.resolve("does-not-exist").name(), "Balanced");
        // case-sensitive
        assert_eq!(lib.resolve("cool").name(), "Balanced");
    }

    #[test]
    fn test_cpu_and_gpu_tables_differ() {
        let cool = PresetLibrary::builtin().resolve("Cool");
        assert_eq!(cool.curve(ChannelRole::Cpu).lookup(91), 92);
        assert_eq!(cool.curve(ChannelRole::Gpu).lookup(91), 100);
    }

    #[test]
    fn test_preset_values() {
        let balanced = PresetLibrary::builtin().resolve("Balanced");
        let cpu = balanced.curve(ChannelRole::Cpu);
        assert_eq!(cpu.lookup(30), 0);
        assert_eq!(cpu.lookup(70), 50);
        assert_eq!(cpu.lookup(100), 100);

        let freezy = PresetLibrary::builtin().resolve("Freezy");
        assert_eq!(freezy.curve(ChannelRole::Cpu).lookup(0), 20);
        assert_eq!(freezy.curve(ChannelRole::Gpu).lookup(20), 25);
    }

    #[test]
    fn test_custom_profile_curves() {
        let lib = PresetLibrary::builtin();
        let own = FanCurve::from_key_points(&[(0, 42)]);
        let profile = Profile {
            curve_preset: "Custom".into(),
            custom_curves: Some(CurvePair::new(Some(own.clone()), None)),
            ..Profile::default()
        };

        assert_eq!(lib.curve_for_profile(&profile, ChannelRole::Cpu), own);
        // no custom GPU curve: the unknown name "Custom" falls back to Balanced
        assert_eq!(
            lib.curve_for_profile(&profile, ChannelRole::Gpu),
            *lib.resolve("Balanced").curve(ChannelRole::Gpu)
        );
    }

    #[test]
    fn test_custom_curves_ignored_for_named_preset() {
        let lib = PresetLibrary::builtin();
        let profile = Profile {
            curve_preset: "Quiet".into(),
            custom_curves: Some(CurvePair::new(Some(FanCurve::from_key_points(&[(0, 42)])), None)),
            ..Profile::default()
        };
        assert_eq!(
            lib.curve_for_profile(&profile, ChannelRole::Cpu),
            *lib.resolve("Quiet").curve(ChannelRole::Cpu)
        );
    }
}
