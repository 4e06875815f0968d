// src/analyzer/gradient.rs
//! Named color gradients and their renderable form.
//!
//! A gradient definition is a background color, an optional direction and an
//! ordered list of color stops. Definitions live in a registry keyed by
//! name; "classic", "prism", "rainbow" and "purple" are built in and callers
//! may register their own. Building turns a definition into a color lookup
//! table sized to the canvas axis it paints along, applying the layout
//! adjustments for stereo, split, radial and reflection configurations.

use std::collections::HashMap;

use crate::canvas::{Color, hsl, lerp_color, rgb};
use crate::error::{Result, WavescopeError};

/// Gradient orientation for the linear build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradientDir {
    #[default]
    Vertical,
    Horizontal,
}

/// One color stop. Without an explicit position, stops spread evenly.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub pos: Option<f32>,
    pub color: Color,
}

impl ColorStop {
    pub fn color(color: Color) -> Self {
        Self { pos: None, color }
    }

    pub fn at(pos: f32, color: Color) -> Self {
        Self {
            pos: Some(pos.clamp(0.0, 1.0)),
            color,
        }
    }
}

/// A registered gradient.
#[derive(Debug, Clone)]
pub struct GradientDef {
    pub bg_color: Color,
    pub dir: GradientDir,
    pub stops: Vec<ColorStop>,
}

/// Layout facts the build needs from the analyzer.
#[derive(Debug, Clone, Copy)]
pub struct GradientLayout {
    pub width: u32,
    pub height: u32,
    pub radial: bool,
    pub stereo: bool,
    pub split: bool,
    pub lumi: bool,
    pub reflex_ratio: f32,
}

/// Renderable gradient: a color LUT along the paint axis.
#[derive(Debug, Clone)]
pub enum BuiltGradient {
    /// Indexed by canvas y.
    Vertical(Vec<Color>),
    /// Indexed by canvas x.
    Horizontal(Vec<Color>),
    /// Indexed by distance from the canvas center.
    Radial(Vec<Color>),
}

/// Registry of named gradients.
pub struct GradientRegistry {
    map: HashMap<String, GradientDef>,
}

impl Default for GradientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GradientRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            map: HashMap::new(),
        };
        for (name, def) in builtins() {
            registry.map.insert(name.into(), def);
        }
        registry
    }

    /// Register (or replace) a gradient. The name must be non-empty and the
    /// definition must carry at least two color stops; on error nothing is
    /// stored.
    pub fn register(&mut self, name: &str, def: GradientDef) -> Result<()> {
        if name.trim().is_empty() {
            return Err(WavescopeError::GradientInvalidName);
        }
        if def.stops.len() < 2 {
            return Err(WavescopeError::GradientMissingColor);
        }
        self.map.insert(name.to_owned(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&GradientDef> {
        self.map
            .get(name)
            .ok_or_else(|| WavescopeError::UnknownGradient(name.to_owned()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.map.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn builtins() -> Vec<(&'static str, GradientDef)> {
    vec![
        (
            "classic",
            GradientDef {
                bg_color: rgb(17, 17, 17),
                dir: GradientDir::Vertical,
                stops: vec![
                    ColorStop::color(hsl(0.0, 1.0, 0.5)),
                    ColorStop::at(0.6, hsl(60.0, 1.0, 0.5)),
                    ColorStop::color(hsl(120.0, 1.0, 0.5)),
                ],
            },
        ),
        (
            "prism",
            GradientDef {
                bg_color: rgb(17, 17, 17),
                dir: GradientDir::Vertical,
                stops: [0.0f32, 60.0, 120.0, 180.0, 240.0]
                    .iter()
                    .map(|&h| ColorStop::color(hsl(h, 1.0, 0.5)))
                    .collect(),
            },
        ),
        (
            "rainbow",
            GradientDef {
                bg_color: rgb(17, 17, 17),
                dir: GradientDir::Horizontal,
                stops: [0.0f32, 60.0, 120.0, 180.0, 240.0, 300.0, 360.0]
                    .iter()
                    .map(|&h| ColorStop::color(hsl(h, 1.0, 0.5)))
                    .collect(),
            },
        ),
        (
            "purple",
            GradientDef {
                bg_color: rgb(17, 17, 17),
                dir: GradientDir::Vertical,
                stops: vec![
                    ColorStop::color(rgb(75, 0, 130)),
                    ColorStop::color(rgb(186, 85, 211)),
                ],
            },
        ),
    ]
}

/// Resolve stop positions and apply the layout adjustments, returning an
/// ordered (position, color) list covering [0, 1].
fn resolve_stops(def: &GradientDef, layout: &GradientLayout) -> Vec<(f32, Color)> {
    let n = def.stops.len();
    let base: Vec<(f32, Color)> = def
        .stops
        .iter()
        .enumerate()
        .map(|(i, stop)| {
            let pos = stop
                .pos
                .unwrap_or(if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 });
            (pos, stop.color)
        })
        .collect();

    let horizontal = def.dir == GradientDir::Horizontal && !layout.radial;
    let mut stops: Vec<(f32, Color)>;

    if layout.stereo && !horizontal {
        // Two channels share one canvas: halve the positions for the first
        // channel, then append the second channel's copy.
        stops = base.iter().map(|&(p, c)| (p / 2.0, c)).collect();
        if layout.split {
            // Split: each channel gets the full gradient in its half.
            stops.extend(base.iter().map(|&(p, c)| (0.5 + p / 2.0, c)));
        } else if layout.radial || layout.lumi {
            // Mirrored: the second channel reads the stops in reverse index
            // order so the two halves meet at the same color.
            stops.extend(base.iter().rev().map(|&(p, c)| (0.5 + (1.0 - p) / 2.0, c)));
        } else {
            stops.extend(base.iter().map(|&(p, c)| (0.5 + p / 2.0, c)));
        }
    } else {
        stops = base;
    }

    // Reflection compresses the analyzer's share of the gradient into the
    // non-reflected fraction of each half.
    if layout.reflex_ratio > 0.0 && !layout.radial && !layout.lumi {
        for (pos, _) in &mut stops {
            if *pos < 0.5 {
                *pos *= 1.0 - layout.reflex_ratio;
            }
        }
    }

    stops.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    stops
}

/// Build the renderable LUT for a definition under the given layout.
pub fn build(def: &GradientDef, layout: &GradientLayout) -> BuiltGradient {
    let stops = resolve_stops(def, layout);

    let horizontal = def.dir == GradientDir::Horizontal && !layout.radial;
    let axis_len = if layout.radial {
        (layout.width.min(layout.height) / 2).max(1) as usize
    } else if horizontal {
        layout.width.max(1) as usize
    } else {
        layout.height.max(1) as usize
    };

    let lut: Vec<Color> = (0..axis_len)
        .map(|i| {
            let t = if axis_len > 1 {
                i as f32 / (axis_len - 1) as f32
            } else {
                0.0
            };
            sample(&stops, t)
        })
        .collect();

    if layout.radial {
        // Radial LUTs are indexed by distance from the center, but position
        // 0 of the gradient is the top of a bar, i.e. the outer edge.
        let mut lut = lut;
        lut.reverse();
        BuiltGradient::Radial(lut)
    } else if horizontal {
        BuiltGradient::Horizontal(lut)
    } else {
        BuiltGradient::Vertical(lut)
    }
}

fn sample(stops: &[(f32, Color)], t: f32) -> Color {
    match stops {
        [] => rgb(255, 255, 255),
        [only] => only.1,
        _ => {
            if t <= stops[0].0 {
                return stops[0].1;
            }
            for pair in stops.windows(2) {
                let (p0, c0) = pair[0];
                let (p1, c1) = pair[1];
                if t <= p1 {
                    let span = (p1 - p0).max(f32::EPSILON);
                    return lerp_color(c0, c1, (t - p0) / span);
                }
            }
            stops[stops.len() - 1].1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_layout() -> GradientLayout {
        GradientLayout {
            width: 100,
            height: 100,
            radial: false,
            stereo: false,
            split: false,
            lumi: false,
            reflex_ratio: 0.0,
        }
    }

    #[test]
    fn builtin_gradients_exist() {
        let registry = GradientRegistry::new();
        for name in ["classic", "prism", "rainbow", "purple"] {
            assert!(registry.get(name).is_ok(), "missing builtin '{name}'");
        }
        assert!(registry.get("nope").is_err());
    }

    #[test]
    fn single_stop_registration_is_rejected_and_keeps_existing() {
        let mut registry = GradientRegistry::new();
        let bad = GradientDef {
            bg_color: rgb(0, 0, 0),
            dir: GradientDir::Vertical,
            stops: vec![ColorStop::color(rgb(255, 0, 0))],
        };
        let err = registry.register("classic", bad).unwrap_err();
        assert_eq!(err.code(), "ERR_GRADIENT_MISSING_COLOR");
        // The builtin survives with its three stops.
        assert_eq!(registry.get("classic").unwrap().stops.len(), 3);
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut registry = GradientRegistry::new();
        let def = GradientDef {
            bg_color: rgb(0, 0, 0),
            dir: GradientDir::Vertical,
            stops: vec![
                ColorStop::color(rgb(255, 0, 0)),
                ColorStop::color(rgb(0, 0, 255)),
            ],
        };
        let err = registry.register("  ", def).unwrap_err();
        assert_eq!(err.code(), "ERR_GRADIENT_INVALID_NAME");
    }

    #[test]
    fn vertical_lut_spans_the_stops() {
        let registry = GradientRegistry::new();
        let def = registry.get("purple").unwrap();
        let BuiltGradient::Vertical(lut) = build(def, &mono_layout()) else {
            panic!("expected vertical gradient");
        };
        assert_eq!(lut.len(), 100);
        assert_eq!(lut[0], rgb(75, 0, 130));
        assert_eq!(lut[99], rgb(186, 85, 211));
    }

    #[test]
    fn rainbow_builds_horizontally() {
        let registry = GradientRegistry::new();
        let def = registry.get("rainbow").unwrap();
        assert!(matches!(
            build(def, &mono_layout()),
            BuiltGradient::Horizontal(_)
        ));
    }

    #[test]
    fn stereo_halves_positions() {
        let registry = GradientRegistry::new();
        let def = registry.get("purple").unwrap();
        let layout = GradientLayout {
            stereo: true,
            ..mono_layout()
        };
        let stops = resolve_stops(def, &layout);
        assert_eq!(stops.len(), 4);
        assert_eq!(stops[0].0, 0.0);
        assert_eq!(stops[1].0, 0.5);
        assert_eq!(stops[2].0, 0.5);
        assert_eq!(stops[3].0, 1.0);
    }

    #[test]
    fn stereo_lumi_mirrors_second_channel() {
        let registry = GradientRegistry::new();
        let def = registry.get("purple").unwrap();
        let layout = GradientLayout {
            stereo: true,
            lumi: true,
            ..mono_layout()
        };
        let stops = resolve_stops(def, &layout);
        // Second half starts with the last stop color (reverse order).
        assert_eq!(stops[2].1, rgb(186, 85, 211));
        assert_eq!(stops[3].1, rgb(75, 0, 130));
    }

    #[test]
    fn reflection_compresses_low_positions() {
        let registry = GradientRegistry::new();
        let def = registry.get("classic").unwrap();
        let layout = GradientLayout {
            reflex_ratio: 0.4,
            ..mono_layout()
        };
        let stops = resolve_stops(def, &layout);
        // classic stops sit at 0, 0.6, 1.0; only the first is below 0.5.
        assert_eq!(stops[0].0, 0.0);
        assert_eq!(stops[1].0, 0.6);
    }

    #[test]
    fn radial_layout_builds_radial_lut() {
        let registry = GradientRegistry::new();
        let def = registry.get("classic").unwrap();
        let layout = GradientLayout {
            radial: true,
            ..mono_layout()
        };
        let BuiltGradient::Radial(lut) = build(def, &layout) else {
            panic!("expected radial gradient");
        };
        assert_eq!(lut.len(), 50);
    }
}
