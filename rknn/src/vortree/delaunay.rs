//! Delaunay adjacency (the Voronoi neighbor relation) of a point set.
//!
//! Bowyer-Watson insertion inside a super triangle. Sites sharing a location
//! are collapsed before triangulating and then inherit the adjacency of their
//! location, plus links to each other.

use crate::geometry::{orientation, Point};
use std::collections::{BTreeSet, HashMap};

/// Scale of the super triangle relative to the data extent.
const SUPER_TRIANGLE_SCALE: f64 = 100.0;

/// Symmetric neighbor lists, indexed like `points`, each sorted ascending.
pub(crate) fn neighbor_lists(points: &[Point]) -> Vec<Vec<usize>> {
    let mut location_of: HashMap<(u64, u64), usize> = HashMap::new();
    let mut sites: Vec<Point> = Vec::new();
    let mut members: Vec<Vec<usize>> = Vec::new();

    for (i, p) in points.iter().enumerate() {
        // + 0.0 folds -0.0 into 0.0
        let key = ((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits());
        let site = *location_of.entry(key).or_insert_with(|| {
            sites.push(*p);
            members.push(Vec::new());
            sites.len() - 1
        });
        members[site].push(i);
    }

    let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); points.len()];
    let mut link = |a: usize, b: usize| {
        if a != b {
            adjacency[a].insert(b);
            adjacency[b].insert(a);
        }
    };

    for (a, b) in site_edges(&sites) {
        for &i in &members[a] {
            for &j in &members[b] {
                link(i, j);
            }
        }
    }
    for group in &members {
        for (pos, &i) in group.iter().enumerate() {
            for &j in &group[pos + 1..] {
                link(i, j);
            }
        }
    }

    adjacency
        .into_iter()
        .map(|set| set.into_iter().collect())
        .collect()
}

/// Delaunay edges over distinct sites.
fn site_edges(sites: &[Point]) -> BTreeSet<(usize, usize)> {
    match sites.len() {
        0 | 1 => BTreeSet::new(),
        2 => BTreeSet::from([(0, 1)]),
        _ if all_collinear(sites) => chain_edges(sites),
        _ => {
            let mut edges = bowyer_watson(sites);
            edges.extend(hull_edges(sites));
            edges
        }
    }
}

fn all_collinear(sites: &[Point]) -> bool {
    let (a, b) = (&sites[0], &sites[1]);
    sites[2..].iter().all(|c| orientation(a, b, c) == 0.0)
}

/// Consecutive sites along the common line.
fn chain_edges(sites: &[Point]) -> BTreeSet<(usize, usize)> {
    let origin = sites[0];
    let dx = sites[1].x - origin.x;
    let dy = sites[1].y - origin.y;
    let mut order: Vec<usize> = (0..sites.len()).collect();
    order.sort_by(|&i, &j| {
        let ti = (sites[i].x - origin.x) * dx + (sites[i].y - origin.y) * dy;
        let tj = (sites[j].x - origin.x) * dx + (sites[j].y - origin.y) * dy;
        ti.total_cmp(&tj)
    });
    order.windows(2).map(|w| edge(w[0], w[1])).collect()
}

fn edge(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Whether `p` lies strictly inside the circumcircle of `a`, `b`, `c`.
fn in_circumcircle(a: &Point, b: &Point, c: &Point, p: &Point) -> bool {
    let (adx, ady) = (a.x - p.x, a.y - p.y);
    let (bdx, bdy) = (b.x - p.x, b.y - p.y);
    let (cdx, cdy) = (c.x - p.x, c.y - p.y);
    let det = (adx * adx + ady * ady) * (bdx * cdy - cdx * bdy)
        - (bdx * bdx + bdy * bdy) * (adx * cdy - cdx * ady)
        + (cdx * cdx + cdy * cdy) * (adx * bdy - bdx * ady);
    let turn = orientation(a, b, c);
    if turn > 0.0 {
        det > 0.0
    } else if turn < 0.0 {
        det < 0.0
    } else {
        false
    }
}

fn bowyer_watson(sites: &[Point]) -> BTreeSet<(usize, usize)> {
    let n = sites.len();
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in sites {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let dx = max_x - min_x;
    let dy = max_y - min_y;
    let delta = dx.max(dy).max(f64::MIN_POSITIVE) * SUPER_TRIANGLE_SCALE;

    // super triangle vertices live at n, n + 1, n + 2
    let mut vertices = sites.to_vec();
    vertices.push(Point::new(min_x - delta, min_y - delta));
    vertices.push(Point::new(min_x + dx / 2.0, max_y + delta));
    vertices.push(Point::new(max_x + delta, min_y - delta));

    let mut triangles: Vec<[usize; 3]> = vec![[n, n + 1, n + 2]];

    for i in 0..n {
        let p = vertices[i];
        let (bad, good): (Vec<[usize; 3]>, Vec<[usize; 3]>) = triangles
            .into_iter()
            .partition(|t| in_circumcircle(&vertices[t[0]], &vertices[t[1]], &vertices[t[2]], &p));

        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for t in &bad {
            for k in 0..3 {
                *edge_count.entry(edge(t[k], t[(k + 1) % 3])).or_insert(0) += 1;
            }
        }

        triangles = good;
        triangles.extend(
            edge_count
                .into_iter()
                .filter(|&(_, count)| count == 1)
                .map(|((a, b), _)| [a, b, i]),
        );
    }

    let mut edges = BTreeSet::new();
    for t in triangles.iter().filter(|t| t.iter().all(|&v| v < n)) {
        for k in 0..3 {
            edges.insert(edge(t[k], t[(k + 1) % 3]));
        }
    }
    edges
}

/// Edges between consecutive convex hull vertices, collinear ones included.
///
/// Hull edges are always Delaunay edges; adding them covers triangles the
/// finite super triangle may have swallowed.
fn hull_edges(sites: &[Point]) -> BTreeSet<(usize, usize)> {
    let mut order: Vec<usize> = (0..sites.len()).collect();
    order.sort_by(|&i, &j| {
        sites[i]
            .x
            .total_cmp(&sites[j].x)
            .then(sites[i].y.total_cmp(&sites[j].y))
    });

    let half = |indices: &mut dyn Iterator<Item = usize>| {
        let mut chain: Vec<usize> = Vec::new();
        for i in indices {
            while chain.len() >= 2
                && orientation(
                    &sites[chain[chain.len() - 2]],
                    &sites[chain[chain.len() - 1]],
                    &sites[i],
                ) < 0.0
            {
                chain.pop();
            }
            chain.push(i);
        }
        chain
    };

    let lower = half(&mut order.iter().copied());
    let upper = half(&mut order.iter().rev().copied());
    lower
        .windows(2)
        .chain(upper.windows(2))
        .map(|w| edge(w[0], w[1]))
        .collect()
}
