//! Hilbert-curve tile ids.
//!
//! Archives address tiles by a single integer: all tiles of lower zoom
//! levels come first, then the tiles of zoom `z` in Hilbert order.

/// Highest zoom level whose ids fit in a u64.
pub const MAX_ZOOM: u8 = 31;

/// Tile id for `(z, x, y)`, or `None` when the address lies outside the
/// zoom level's grid.
pub fn zxy_to_tile_id(z: u8, x: u32, y: u32) -> Option<u64> {
    if z > MAX_ZOOM {
        return None;
    }
    let n: u64 = 1 << z;
    let (mut x, mut y) = (x as u64, y as u64);
    if x >= n || y >= n {
        return None;
    }

    // Number of tiles on all coarser levels: 4^0 + ... + 4^(z-1)
    let base = ((1u64 << (2 * z as u64)) - 1) / 3;

    let mut d = 0u64;
    let mut s = n / 2;
    while s > 0 {
        let rx = u64::from(x & s != 0);
        let ry = u64::from(y & s != 0);
        d += s * s * ((3 * rx) ^ ry);
        if ry == 0 {
            if rx == 1 {
                x = n - 1 - x;
                y = n - 1 - y;
            }
            std::mem::swap(&mut x, &mut y);
        }
        s /= 2;
    }

    Some(base + d)
}
