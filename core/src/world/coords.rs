//! Coordinate arithmetic over the n-dimensional grid.
//!
//! Coordinates are signed integer vectors of the world dimensionality.
//! Linearization is row-major: the last component has stride 1.

pub type Coord = Vec<i64>;

pub fn zero(dims: usize) -> Coord {
    vec![0; dims]
}

/// Unit vector along `axis` (positive direction).
pub fn unit(dims: usize, axis: usize) -> Coord {
    let mut v = vec![0; dims];
    v[axis] = 1;
    v
}

pub fn add(a: &[i64], b: &[i64]) -> Coord {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

pub fn sub(a: &[i64], b: &[i64]) -> Coord {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// `a + k * dv`, componentwise.
pub fn scaled_add(a: &[i64], dv: &[i64], k: i64) -> Coord {
    a.iter().zip(dv).map(|(x, d)| x + k * d).collect()
}

/// Reduce a coordinate into the box `[0, shape)`. Wraps componentwise when
/// toroidal; returns `None` when any component falls outside a bounded world.
pub fn canonicalize(c: &[i64], shape: &[i64], toroidal: bool) -> Option<Coord> {
    debug_assert_eq!(c.len(), shape.len());
    let mut out = Vec::with_capacity(c.len());
    for (&x, &n) in c.iter().zip(shape) {
        if toroidal {
            out.push(x.rem_euclid(n));
        } else if x < 0 || x >= n {
            return None;
        } else {
            out.push(x);
        }
    }
    Some(out)
}

/// Row-major linear index of a canonical coordinate.
pub fn linear_index(c: &[i64], shape: &[i64]) -> usize {
    debug_assert_eq!(c.len(), shape.len());
    let mut idx: i64 = 0;
    for (&x, &n) in c.iter().zip(shape) {
        debug_assert!(x >= 0 && x < n);
        idx = idx * n + x;
    }
    idx as usize
}

pub fn from_linear_index(idx: usize, shape: &[i64]) -> Coord {
    let mut rem = idx as i64;
    let mut out = vec![0; shape.len()];
    for i in (0..shape.len()).rev() {
        out[i] = rem % shape[i];
        rem /= shape[i];
    }
    out
}

pub fn cell_count(shape: &[i64]) -> usize {
    shape.iter().product::<i64>() as usize
}

/// Componentwise delta from `from` to `to`. On a toroidal world every
/// component is reduced to the shortest signed distance, i.e. into
/// `(-n/2, n/2]` for shape dimension `n`.
pub fn shortest_delta(from: &[i64], to: &[i64], shape: &[i64], toroidal: bool) -> Coord {
    debug_assert_eq!(from.len(), to.len());
    from.iter()
        .zip(to)
        .zip(shape)
        .map(|((&f, &t), &n)| {
            let mut d = t - f;
            if toroidal {
                d = d.rem_euclid(n);
                if 2 * d > n {
                    d -= n;
                }
            }
            d
        })
        .collect()
}
