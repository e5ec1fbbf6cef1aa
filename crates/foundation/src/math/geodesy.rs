use crate::geo::LatLng;

/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (meters).
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Earth-centered, Earth-fixed position in meters. Marker anchors are
/// handed to the engine in this frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Ecef {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Distance from the Earth's center.
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y).hypot(self.z)
    }
}

/// Geodetic coordinates in radians and meters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Geodetic {
    pub lat_rad: f64,
    pub lon_rad: f64,
    pub alt_m: f64,
}

impl Geodetic {
    pub fn new(lat_rad: f64, lon_rad: f64, alt_m: f64) -> Self {
        Self {
            lat_rad,
            lon_rad,
            alt_m,
        }
    }

    /// Geodetic position of `point` at `alt_m` above the ellipsoid.
    pub fn from_lat_lng(point: LatLng, alt_m: f64) -> Self {
        Self::new(point.lat().to_radians(), point.lng().to_radians(), alt_m)
    }
}

pub fn geodetic_to_ecef(geo: Geodetic) -> Ecef {
    let sin_lat = geo.lat_rad.sin();
    let cos_lat = geo.lat_rad.cos();
    let sin_lon = geo.lon_rad.sin();
    let cos_lon = geo.lon_rad.cos();

    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let x = (n + geo.alt_m) * cos_lat * cos_lon;
    let y = (n + geo.alt_m) * cos_lat * sin_lon;
    let z = (n * (1.0 - WGS84_E2) + geo.alt_m) * sin_lat;

    Ecef::new(x, y, z)
}

/// Anchor point for a marker floating above `point`.
///
/// `relative_altitude` is expressed in globe radii, the unit globe viewers use
/// for point altitude (0.05 lifts a marker 5% of the radius off the surface).
pub fn marker_anchor(point: LatLng, relative_altitude: f64) -> Ecef {
    geodetic_to_ecef(Geodetic::from_lat_lng(
        point,
        relative_altitude.max(0.0) * WGS84_A,
    ))
}

#[cfg(test)]
mod tests {
    use super::{Geodetic, WGS84_A, WGS84_B, geodetic_to_ecef, marker_anchor};
    use crate::geo::LatLng;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn geodetic_to_ecef_equator_prime_meridian() {
        let ecef = geodetic_to_ecef(Geodetic::new(0.0, 0.0, 0.0));
        assert_close(ecef.x, WGS84_A, 1e-6);
        assert_close(ecef.y, 0.0, 1e-6);
        assert_close(ecef.z, 0.0, 1e-6);
    }

    #[test]
    fn geodetic_to_ecef_north_pole_uses_minor_axis() {
        let ecef = geodetic_to_ecef(Geodetic::new(std::f64::consts::FRAC_PI_2, 0.0, 0.0));
        assert_close(ecef.x, 0.0, 1e-6);
        assert_close(ecef.z, WGS84_B, 1e-6);
    }

    #[test]
    fn marker_anchor_sits_above_surface() {
        let dallas = LatLng::new(32.7795, -96.8086).unwrap();
        let surface = marker_anchor(dallas, 0.0);
        let lifted = marker_anchor(dallas, 0.05);
        // The lift follows the ellipsoid normal, so measure the offset itself
        // rather than the change in geocentric radius.
        let lift = (lifted.x - surface.x)
            .hypot(lifted.y - surface.y)
            .hypot(lifted.z - surface.z);
        assert_close(lift, 0.05 * WGS84_A, 1e-6);
        assert!(lifted.norm() > surface.norm());
        // Western hemisphere, north of the equator.
        assert!(lifted.y < 0.0);
        assert!(lifted.z > 0.0);
    }

    #[test]
    fn negative_altitude_is_clamped_to_surface() {
        let p = LatLng::new(10.0, 20.0).unwrap();
        assert_eq!(marker_anchor(p, -1.0), marker_anchor(p, 0.0));
    }
}
