// wv-core/src/units.rs

use uom::si::f64::{
    Force as UomForce, Frequency as UomFrequency, Length as UomLength,
    LinearMassDensity as UomLinearMassDensity, Time as UomTime, Velocity as UomVelocity,
};

// Public canonical unit types (SI, f64)
pub type Force = UomForce;
pub type Frequency = UomFrequency;
pub type Length = UomLength;
pub type LinearDensity = UomLinearMassDensity;
pub type Time = UomTime;
pub type Velocity = UomVelocity;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn n(v: f64) -> Force {
    use uom::si::force::newton;
    Force::new::<newton>(v)
}

#[inline]
pub fn kgpm(v: f64) -> LinearDensity {
    use uom::si::linear_mass_density::kilogram_per_meter;
    LinearDensity::new::<kilogram_per_meter>(v)
}

#[inline]
pub fn mps(v: f64) -> Velocity {
    use uom::si::velocity::meter_per_second;
    Velocity::new::<meter_per_second>(v)
}

#[inline]
pub fn hz(v: f64) -> Frequency {
    use uom::si::frequency::hertz;
    Frequency::new::<hertz>(v)
}
