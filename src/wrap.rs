use crate::geo::GeoBounds;

/// Longitude offset between adjacent world copies.
pub const WORLD_WIDTH: f64 = 360.0;

/// Every box equivalent to `view` under world wrapping, in this order: the
/// box itself, the two halves of an antimeridian split (only when
/// `west > east`), then the box one world to the west and one to the east.
///
/// The world copies are shifted from the unwrapped view (`east + 360` when
/// crossing), so they never cross the antimeridian themselves.
///
/// A feature is visible when it intersects any of them.
pub fn wrapped_bounds(view: &GeoBounds) -> Vec<GeoBounds> {
    let mut out = Vec::with_capacity(5);
    out.push(*view);
    let unwrapped = if view.crosses_antimeridian() {
        out.push(GeoBounds::new(view.south, view.west, view.north, 180.0));
        out.push(GeoBounds::new(view.south, -180.0, view.north, view.east));
        GeoBounds::new(view.south, view.west, view.north, view.east + WORLD_WIDTH)
    } else {
        *view
    };
    out.push(unwrapped.shifted(-WORLD_WIDTH));
    out.push(unwrapped.shifted(WORLD_WIDTH));
    out
}
