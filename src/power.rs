//! Producer output model.
//!
//! Pure physical formulas computing the theoretical (potential) power of
//! wind and hydro producers. All results are in kW; no state is kept here.

use std::f64::consts::PI;

/// Specific gas constant of dry air, J/(kg*K).
const R_DRY_AIR: f64 = 287.058;
/// Specific gas constant of water vapour, J/(kg*K).
const R_VAPOUR: f64 = 461.495;

/// Density of humid air in kg/m^3.
///
/// `pressure_hpa` is station pressure in hPa, `humidity_percent` relative
/// humidity (0-100), `temperature_c` air temperature in degrees Celsius.
/// Uses the Magnus formula for saturation vapour pressure.
pub fn air_density(pressure_hpa: f64, humidity_percent: f64, temperature_c: f64) -> f64 {
    let saturation_hpa = 6.1078 * 10f64.powf(7.5 * temperature_c / (temperature_c + 237.3));
    let vapour_pa = humidity_percent / 100.0 * saturation_hpa * 100.0;
    let dry_pa = pressure_hpa * 100.0 - vapour_pa;
    let kelvin = temperature_c + 273.15;
    dry_pa / (R_DRY_AIR * kelvin) + vapour_pa / (R_VAPOUR * kelvin)
}

/// Theoretical wind turbine output in kW.
///
/// `P = 1/2 * rho * A * v^3 * eta`, swept area from the rotor radius,
/// efficiency given in percent.
pub fn wind_power(radius_m: f64, wind_speed_ms: f64, density: f64, efficiency_percent: f64) -> f64 {
    let swept_area = PI * radius_m * radius_m;
    0.5 * density * swept_area * wind_speed_ms.powi(3) * (efficiency_percent / 100.0) / 1000.0
}

/// Theoretical run-of-river hydro output in kW.
///
/// `P = rho * g * h * Q * eta`, efficiency given in percent.
pub fn hydro_power(
    height_m: f64,
    gravity: f64,
    density: f64,
    efficiency_percent: f64,
    volume_flow: f64,
) -> f64 {
    density * gravity * height_m * volume_flow * (efficiency_percent / 100.0) / 1000.0
}
