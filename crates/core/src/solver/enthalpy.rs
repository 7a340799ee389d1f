//! Enthalpy–temperature conversion with latent-heat plateaus
//!
//! The solver carries state as volumetric enthalpy (J/m³) rather than
//! temperature, so integrating through melting or vaporization never
//! hits a discontinuous heat-capacity branch. This module holds the
//! piecewise monotonic curve that converts between the two: sensible
//! segments with slope ρ·cp, and a latent band per phase transition
//! where enthalpy rises by ρ·L while temperature stays at the
//! transition point (or ramps linearly across a solidus–liquidus
//! mushy zone).

use crate::material::Material;

#[derive(Debug, Clone, Copy)]
struct VaporBand {
    temperature: f64,
    h_start: f64,
    h_end: f64,
}

/// Precomputed enthalpy–temperature curve for one material.
///
/// `temperature` and `enthalpy` are exact inverses on every branch
/// (up to floating point); both are total and monotonic.
#[derive(Debug, Clone, Copy)]
pub struct EnthalpyCurve {
    /// Volumetric heat capacity ρ·cp, J/(m³·K)
    rcp: f64,
    solidus: f64,
    liquidus: f64,
    /// Enthalpy where melting starts
    h_solidus: f64,
    /// Enthalpy where melting completes
    h_liquidus: f64,
    vapor: Option<VaporBand>,
}

impl EnthalpyCurve {
    /// Build the curve from material properties. Enthalpy zero is
    /// pinned at 0 K so all stored enthalpies stay non-negative.
    #[must_use]
    pub fn new(material: &Material) -> Self {
        let rcp = material.volumetric_heat_capacity();
        let h_solidus = rcp * material.solidus;
        let h_liquidus = h_solidus + material.density * material.latent_heat_fusion;
        let vapor = material.vaporization.map(|v| {
            let h_start = h_liquidus + rcp * (v.temperature - material.liquidus);
            VaporBand {
                temperature: v.temperature,
                h_start,
                h_end: h_start + material.density * v.latent_heat,
            }
        });
        Self {
            rcp,
            solidus: material.solidus,
            liquidus: material.liquidus,
            h_solidus,
            h_liquidus,
            vapor,
        }
    }

    /// Temperature (K) for a volumetric enthalpy (J/m³).
    #[must_use]
    pub fn temperature(&self, h: f64) -> f64 {
        if h <= self.h_solidus {
            return h / self.rcp;
        }
        if h < self.h_liquidus {
            // Inside the melt band: flat when solidus == liquidus,
            // otherwise a linear mushy-zone ramp.
            let fraction = (h - self.h_solidus) / (self.h_liquidus - self.h_solidus);
            return self.solidus + (self.liquidus - self.solidus) * fraction;
        }
        let sensible_liquid = self.liquidus + (h - self.h_liquidus) / self.rcp;
        match self.vapor {
            None => sensible_liquid,
            Some(band) => {
                if h <= band.h_start {
                    sensible_liquid
                } else if h < band.h_end {
                    band.temperature
                } else {
                    band.temperature + (h - band.h_end) / self.rcp
                }
            }
        }
    }

    /// Volumetric enthalpy (J/m³) for a temperature (K). Within a
    /// transition band the lower band edge is returned, which keeps
    /// the function a right inverse of [`temperature`](Self::temperature).
    #[must_use]
    pub fn enthalpy(&self, t: f64) -> f64 {
        if t <= self.solidus {
            return self.rcp * t;
        }
        if t < self.liquidus {
            let fraction = (t - self.solidus) / (self.liquidus - self.solidus);
            return self.h_solidus + (self.h_liquidus - self.h_solidus) * fraction;
        }
        let h_liquid = self.h_liquidus + self.rcp * (t - self.liquidus);
        match self.vapor {
            None => h_liquid,
            Some(band) => {
                if t <= band.temperature {
                    h_liquid
                } else {
                    band.h_end + self.rcp * (t - band.temperature)
                }
            }
        }
    }

    /// Fraction of the latent-heat band already absorbed, in [0, 1].
    /// 0 is fully solid, 1 fully molten.
    #[must_use]
    pub fn liquid_fraction(&self, h: f64) -> f64 {
        if self.h_liquidus <= self.h_solidus {
            // Zero latent heat: phase switches at the solidus point
            return if h >= self.h_solidus { 1.0 } else { 0.0 };
        }
        ((h - self.h_solidus) / (self.h_liquidus - self.h_solidus)).clamp(0.0, 1.0)
    }

    /// Enthalpy at which melting begins.
    #[must_use]
    pub fn melt_onset(&self) -> f64 {
        self.h_solidus
    }
}
