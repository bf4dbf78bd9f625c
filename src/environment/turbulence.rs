use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Turbulence process selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurbulenceKind {
    None,
    /// Random-walk direction/magnitude with hard clamping.
    Standard,
    /// Exponentially correlated variant with softer spectral content.
    Berndt,
}

impl TurbulenceKind {
    pub fn from_index(v: f64) -> Self {
        match v as i64 {
            1 => TurbulenceKind::Standard,
            2 => TurbulenceKind::Berndt,
            _ => TurbulenceKind::None,
        }
    }
}

/// Gust and body-rate disturbances for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurbulenceSample {
    /// Linear gust velocity, NED frame (ft/s).
    pub linear_ned: Vector3<f64>,
    /// Rotational disturbance, body frame (rad/s).
    pub rates: Vector3<f64>,
}

/// An Ornstein-Uhlenbeck-flavored turbulence process.
///
/// A direction vector random-walks on the [-1,1] cube and is normalized on
/// use; a magnitude state random-walks within [-1,1] and scales the
/// commanded intensity. Rotational disturbances come from the frozen-field
/// approximation (temporal gradients divided by airspeed) plus an
/// independent spanwise gradient walk, scaled by wingspan. Amplitude decays
/// to zero within three wingspans of the ground.
#[derive(Debug, Clone)]
pub struct Turbulence {
    rng: ChaCha8Rng,
    direction: Vector3<f64>,
    magnitude: f64,
    span_gradient: f64,
    prev_linear: Vector3<f64>,
}

impl Turbulence {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            direction: Vector3::new(1.0, 0.0, 0.0),
            magnitude: 0.0,
            span_gradient: 0.0,
            prev_linear: Vector3::zeros(),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.direction = Vector3::new(1.0, 0.0, 0.0);
        self.magnitude = 0.0;
        self.span_gradient = 0.0;
        self.prev_linear = Vector3::zeros();
    }

    /// Advance the process one tick.
    ///
    /// `intensity_fps` is the commanded gust magnitude, `airspeed` the
    /// current true airspeed (ft/s), `span` the wingspan (ft), `altitude_agl`
    /// the height above terrain (ft).
    pub fn step(
        &mut self,
        kind: TurbulenceKind,
        dt: f64,
        intensity_fps: f64,
        airspeed: f64,
        span: f64,
        altitude_agl: f64,
    ) -> TurbulenceSample {
        if kind == TurbulenceKind::None || intensity_fps <= 0.0 || dt <= 0.0 {
            self.prev_linear = Vector3::zeros();
            return TurbulenceSample::default();
        }

        // The two variants differ in how fast the walk forgets its state.
        let (walk_rate, relax) = match kind {
            TurbulenceKind::Standard => (8.0, 0.0),
            TurbulenceKind::Berndt => (4.0, 1.0),
            TurbulenceKind::None => unreachable!(),
        };

        for axis in 0..3 {
            let kick: f64 = self.rng.gen_range(-1.0..=1.0);
            let d = &mut self.direction[axis];
            *d = (*d + (kick - relax * *d) * walk_rate * dt).clamp(-1.0, 1.0);
        }
        let mag_kick: f64 = self.rng.gen_range(-1.0..=1.0);
        self.magnitude =
            (self.magnitude + (mag_kick - relax * self.magnitude) * walk_rate * dt).clamp(-1.0, 1.0);
        let grad_kick: f64 = self.rng.gen_range(-1.0..=1.0);
        self.span_gradient = (self.span_gradient
            + (grad_kick - relax * self.span_gradient) * walk_rate * dt)
            .clamp(-1.0, 1.0);

        // Amplitude fades out within three wingspans of the surface.
        let ground_fade = if span > 0.0 {
            (altitude_agl / (3.0 * span)).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let dir_norm = self.direction.norm();
        let unit = if dir_norm > 1.0e-9 {
            self.direction / dir_norm
        } else {
            Vector3::new(1.0, 0.0, 0.0)
        };
        let linear = unit * (self.magnitude * intensity_fps * ground_fade);

        // Frozen-field gradients for pitch/yaw; spanwise walk for roll.
        let v = airspeed.max(1.0);
        let w_dot = (linear.z - self.prev_linear.z) / dt;
        let v_dot = (linear.y - self.prev_linear.y) / dt;
        let rates = if span > 0.0 {
            Vector3::new(
                self.span_gradient * self.magnitude.abs() * intensity_fps * ground_fade / span,
                w_dot / v,
                -v_dot / v,
            )
        } else {
            Vector3::zeros()
        };

        self.prev_linear = linear;
        TurbulenceSample {
            linear_ned: linear,
            rates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: TurbulenceKind, seed: u64, agl: f64, n: usize) -> Vec<TurbulenceSample> {
        let mut turb = Turbulence::new(seed);
        (0..n)
            .map(|_| turb.step(kind, 1.0 / 120.0, 10.0, 180.0, 36.0, agl))
            .collect()
    }

    #[test]
    fn deterministic_under_seed() {
        let a = run(TurbulenceKind::Standard, 42, 5000.0, 200);
        let b = run(TurbulenceKind::Standard, 42, 5000.0, 200);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.linear_ned, y.linear_ned);
            assert_eq!(x.rates, y.rates);
        }
    }

    #[test]
    fn magnitude_stays_bounded() {
        for s in run(TurbulenceKind::Standard, 7, 5000.0, 2000) {
            assert!(s.linear_ned.norm() <= 10.0 * 3.0f64.sqrt() + 1e-9);
        }
    }

    #[test]
    fn decays_on_the_ground() {
        for s in run(TurbulenceKind::Standard, 7, 0.0, 200) {
            assert_eq!(s.linear_ned, Vector3::zeros());
        }
    }

    #[test]
    fn none_kind_is_silent() {
        for s in run(TurbulenceKind::None, 7, 5000.0, 50) {
            assert_eq!(s.linear_ned, Vector3::zeros());
            assert_eq!(s.rates, Vector3::zeros());
        }
    }

    #[test]
    fn berndt_is_smoother_than_standard() {
        let std = run(TurbulenceKind::Standard, 11, 5000.0, 2000);
        let berndt = run(TurbulenceKind::Berndt, 11, 5000.0, 2000);
        let wiggle = |s: &[TurbulenceSample]| {
            s.windows(2)
                .map(|w| (w[1].linear_ned - w[0].linear_ned).norm())
                .sum::<f64>()
        };
        assert!(wiggle(&berndt) < wiggle(&std));
    }
}
