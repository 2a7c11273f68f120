use serde::{Deserialize, Serialize};

/// Wind turbine attributes as served by the topology provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindAsset {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Rotor radius in meters.
    pub radius_m: f64,
    /// Conversion efficiency in percent (0-100).
    pub efficiency_percent: f64,
    /// Current operating percentage (0-100).
    pub capacity_percent: f64,
}

/// Run-of-river hydro plant attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterAsset {
    pub id: String,
    /// Head height in meters.
    pub height_m: f64,
    /// Gravitational acceleration in m/s^2.
    pub gravity: f64,
    /// Water density in kg/m^3.
    pub density: f64,
    pub efficiency_percent: f64,
    pub capacity_percent: f64,
    /// Volumetric flow in m^3/s.
    pub volume_flow: f64,
}

/// Photovoltaic installation attributes, forwarded to the solar
/// forecast provider as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolarAsset {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Rated panel capacity in kW.
    pub rated_capacity_kw: f64,
    /// Azimuth alignment in degrees (0 = south).
    pub alignment_deg: f64,
    /// Panel tilt in degrees.
    pub slope_deg: f64,
    pub capacity_percent: f64,
}

/// Any producer without a physical model; reported at rated capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherAsset {
    pub id: String,
    pub rated_capacity_kw: f64,
    pub capacity_percent: f64,
}

/// All producing assets attached to one owner (a household or a
/// decentralized power plant).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetInventory {
    pub winds: Vec<WindAsset>,
    pub waters: Vec<WaterAsset>,
    pub solars: Vec<SolarAsset>,
    pub others: Vec<OtherAsset>,
}

impl AssetInventory {
    pub fn is_empty(&self) -> bool {
        self.winds.is_empty()
            && self.waters.is_empty()
            && self.solars.is_empty()
            && self.others.is_empty()
    }

    pub fn len(&self) -> usize {
        self.winds.len() + self.waters.len() + self.solars.len() + self.others.len()
    }
}
