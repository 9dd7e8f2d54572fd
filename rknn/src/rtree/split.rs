//! Quadratic node split.

use crate::geometry::Rect;

/// Partitions `rects` (the children of an overflowing node) into two groups
/// of indices, each holding at least `min_children` entries.
///
/// Seeds are the pair wasting the most area when covered together. Remaining
/// entries go, most decisive first, to the group whose rectangle grows
/// least; ties prefer the smaller group rectangle, then the smaller group.
/// As soon as one group exceeds `min_children`, everything left goes to the
/// other one.
pub(crate) fn quadratic_split(rects: &[Rect], min_children: usize) -> [Vec<usize>; 2] {
    let (seed0, seed1) = pick_seeds(rects);
    let mut groups = [vec![seed0], vec![seed1]];
    let mut covers = [rects[seed0], rects[seed1]];
    let mut remaining: Vec<usize> = (0..rects.len())
        .filter(|&i| i != seed0 && i != seed1)
        .collect();

    while !remaining.is_empty() {
        if groups[0].len() > min_children {
            groups[1].append(&mut remaining);
            break;
        }
        if groups[1].len() > min_children {
            groups[0].append(&mut remaining);
            break;
        }

        let pos = pick_next(rects, &remaining, &covers);
        let entry = remaining.remove(pos);
        let rect = rects[entry];

        let grow0 = covers[0].enlargement(&rect);
        let grow1 = covers[1].enlargement(&rect);
        let target = if grow0 < grow1 {
            0
        } else if grow1 < grow0 {
            1
        } else if covers[0].area() < covers[1].area() {
            0
        } else if covers[1].area() < covers[0].area() {
            1
        } else if groups[0].len() <= groups[1].len() {
            0
        } else {
            1
        };

        groups[target].push(entry);
        covers[target] = covers[target].union(&rect);
    }

    groups
}

fn pick_seeds(rects: &[Rect]) -> (usize, usize) {
    let mut best = (0, 1);
    let mut worst_waste = f64::NEG_INFINITY;
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            let waste = rects[i].union(&rects[j]).area() - rects[i].area() - rects[j].area();
            if waste > worst_waste {
                worst_waste = waste;
                best = (i, j);
            }
        }
    }
    best
}

/// Position in `remaining` of the entry with the strongest group preference.
fn pick_next(rects: &[Rect], remaining: &[usize], covers: &[Rect; 2]) -> usize {
    let mut best = 0;
    let mut best_diff = -1.0;
    for (pos, &entry) in remaining.iter().enumerate() {
        let d0 = covers[0].enlargement(&rects[entry]);
        let d1 = covers[1].enlargement(&rects[entry]);
        let diff = (d0 - d1).abs();
        if diff > best_diff {
            best_diff = diff;
            best = pos;
        }
    }
    best
}
