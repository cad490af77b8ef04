/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Central angle in radians between two points given in degrees, using the
/// spherical law of cosines.
pub fn angular_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon1 - lon2).abs().to_radians();

    // Rounding can push the cosine just past 1.0 for coincident points.
    let cos_angle = lat1_rad.sin() * lat2_rad.sin()
        + lat1_rad.cos() * lat2_rad.cos() * delta_lon.cos();

    cos_angle.clamp(-1.0, 1.0).acos()
}

/// Great-circle distance in meters
pub fn circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    EARTH_RADIUS_M * angular_distance(lat1, lon1, lat2, lon2)
}
