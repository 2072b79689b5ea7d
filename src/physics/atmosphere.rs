use crate::physics::gravity::G0;

// ---------------------------------------------------------------------------
// Layered standard atmosphere (ISA 1976 profile, 0-86 km)
// ---------------------------------------------------------------------------

const R_AIR: f64 = 287.052_87; // specific gas constant for dry air, J/(kg·K)
const GAMMA: f64 = 1.4;

/// Below this density the free-fall estimators treat the air as vacuum, kg/m^3.
pub const THIN_ATMOSPHERE_DENSITY: f64 = 1e-5;

/// Atmospheric properties at a given geometric altitude.
#[derive(Debug, Clone, Copy)]
pub struct AtmoSample {
    pub density: f64,      // kg/m^3
    pub pressure: f64,     // Pa
    pub temperature: f64,  // K
    pub sound_speed: f64,  // m/s
}

/// One layer of the piecewise temperature profile.
#[derive(Debug, Clone, Copy)]
struct Layer {
    base: f64,   // m
    t_base: f64, // K
    lapse: f64,  // K/m, 0 = isothermal
    p_base: f64, // Pa
}

const LAYERS: [Layer; 7] = [
    Layer { base: 0.0, t_base: 288.15, lapse: -0.0065, p_base: 101_325.0 },
    Layer { base: 11_000.0, t_base: 216.65, lapse: 0.0, p_base: 22_632.1 },
    Layer { base: 20_000.0, t_base: 216.65, lapse: 0.001, p_base: 5_474.89 },
    Layer { base: 32_000.0, t_base: 228.65, lapse: 0.0028, p_base: 868.019 },
    Layer { base: 47_000.0, t_base: 270.65, lapse: 0.0, p_base: 110.906 },
    Layer { base: 51_000.0, t_base: 270.65, lapse: -0.0028, p_base: 66.9389 },
    Layer { base: 71_000.0, t_base: 214.65, lapse: -0.002, p_base: 3.956_42 },
];

const TOP: f64 = 86_000.0;

impl Layer {
    fn sample(&self, h: f64) -> (f64, f64) {
        if self.lapse == 0.0 {
            let p = self.p_base * ((-G0 / (R_AIR * self.t_base)) * (h - self.base)).exp();
            (self.t_base, p)
        } else {
            let t = self.t_base + self.lapse * (h - self.base);
            let p = self.p_base * (t / self.t_base).powf(-G0 / (self.lapse * R_AIR));
            (t, p)
        }
    }
}

/// Standard atmosphere lookup.
///
/// Negative altitudes clamp to sea level; above 86 km pressure decays
/// exponentially toward vacuum.
pub fn isa(altitude_m: f64) -> AtmoSample {
    let h = altitude_m.max(0.0);

    let (temperature, pressure) = if h >= TOP {
        let t = 186.87;
        let p = 0.3734 * (-0.000_15 * (h - TOP)).exp();
        (t, p.max(0.0))
    } else {
        LAYERS
            .iter()
            .rev()
            .find(|l| h >= l.base)
            .unwrap_or(&LAYERS[0])
            .sample(h)
    };

    let density = if temperature > 0.0 {
        pressure / (R_AIR * temperature)
    } else {
        0.0
    };

    AtmoSample {
        density,
        pressure,
        temperature,
        sound_speed: (GAMMA * R_AIR * temperature).sqrt(),
    }
}

/// Atmosphere of the body the vehicle is flying over.
///
/// Bodies without air have `density_scale == 0`; other bodies reuse the
/// standard profile scaled by their surface density relative to sea level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyAtmosphere {
    pub density_scale: f64,
}

impl BodyAtmosphere {
    pub const VACUUM: BodyAtmosphere = BodyAtmosphere { density_scale: 0.0 };
    pub const STANDARD: BodyAtmosphere = BodyAtmosphere { density_scale: 1.0 };

    pub fn has_air(&self) -> bool {
        self.density_scale > 0.0
    }

    pub fn density(&self, altitude_m: f64) -> f64 {
        if !self.has_air() {
            return 0.0;
        }
        isa(altitude_m).density * self.density_scale
    }

    /// True if the air at `altitude_m` is dense enough to matter for drag.
    pub fn is_dense_at(&self, altitude_m: f64) -> bool {
        self.density(altitude_m) >= THIN_ATMOSPHERE_DENSITY
    }
}

impl Default for BodyAtmosphere {
    fn default() -> Self {
        Self::STANDARD
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sea_level_standard_values() {
        let a = isa(0.0);
        assert!((a.temperature - 288.15).abs() < 0.01);
        assert!((a.pressure - 101_325.0).abs() < 1.0);
        assert!((a.density - 1.225).abs() < 0.001);
    }

    #[test]
    fn layers_are_continuous_at_boundaries() {
        for l in LAYERS.iter().skip(1) {
            let below = isa(l.base - 0.01).pressure;
            let above = isa(l.base).pressure;
            assert!((below - above).abs() / above < 1e-3, "jump at {} m", l.base);
        }
    }

    #[test]
    fn vacuum_body_has_no_density() {
        assert_eq!(BodyAtmosphere::VACUUM.density(0.0), 0.0);
        assert!(!BodyAtmosphere::VACUUM.is_dense_at(0.0));
    }

    #[test]
    fn standard_body_thins_out_with_altitude() {
        let air = BodyAtmosphere::STANDARD;
        assert!(air.is_dense_at(10_000.0));
        assert!(!air.is_dense_at(150_000.0));
    }
}
