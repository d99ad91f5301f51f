use arucam_core::{quad_iou, signed_area, Quad};

/// Greedy non-maximum suppression over candidate quads.
///
/// Candidates are visited by decreasing area (stable, so equal areas keep
/// discovery order). A candidate survives when its intersection over union
/// with every already kept candidate is at most `max_overlap`. Returns the
/// indices of the survivors in visiting order.
pub fn non_max_suppression(quads: &[Quad], max_overlap: f32) -> Vec<usize> {
    let areas: Vec<f32> = quads.iter().map(|q| signed_area(q).abs()).collect();
    let mut order: Vec<usize> = (0..quads.len()).collect();
    order.sort_by(|&a, &b| areas[b].total_cmp(&areas[a]));

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for i in order {
        if kept
            .iter()
            .all(|&k| quad_iou(&quads[k], &quads[i]) <= max_overlap)
        {
            kept.push(i);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn square(x: f32, y: f32, s: f32) -> Quad {
        [
            Point2::new(x, y),
            Point2::new(x + s, y),
            Point2::new(x + s, y + s),
            Point2::new(x, y + s),
        ]
    }

    #[test]
    fn larger_quad_wins_overlap() {
        let small = square(11.0, 11.0, 18.0);
        let large = square(10.0, 10.0, 20.0);
        let kept = non_max_suppression(&[small, large], 0.5);
        assert_eq!(kept, vec![1]);
    }

    #[test]
    fn disjoint_quads_all_survive() {
        let quads = [square(0.0, 0.0, 10.0), square(50.0, 0.0, 12.0)];
        let kept = non_max_suppression(&quads, 0.5);
        assert_eq!(kept, vec![1, 0]);
    }

    #[test]
    fn ties_keep_discovery_order() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(0.5, 0.0, 10.0);
        assert_eq!(non_max_suppression(&[a, b], 0.5), vec![0]);
        assert_eq!(non_max_suppression(&[b, a], 0.5), vec![0]);
    }
}
