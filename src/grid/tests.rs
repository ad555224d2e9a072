use super::*;

fn domain() -> Bounds {
    Bounds::new(0.0, 0.0, 100.0, 100.0)
}

fn populated(depth: usize, points: Vec<Point>) -> SpatialGrid {
    let mut grid = SpatialGrid::build(depth, domain()).unwrap();
    grid.populate(points, 1.0, Tensor::identity()).unwrap();
    grid
}

#[test]
fn build_creates_complete_tree_with_quadrant_children() {
    let grid = SpatialGrid::build(2, domain()).unwrap();
    assert_eq!(grid.cell_count(), 1 + 4 + 16);
    for i in 0..grid.cell_count() {
        let cell = grid.cell(CellId(i));
        if let Some(children) = cell.children {
            for (q, child) in children.iter().enumerate() {
                let c = grid.cell(*child);
                assert_eq!(c.depth, cell.depth + 1);
                assert_eq!(c.parent, Some(CellId(i)));
                assert_eq!(c.bounds, cell.bounds.quadrant(q));
            }
            let area: f64 = children.iter().map(|c| grid.cell(*c).bounds.area()).sum();
            assert!((area - cell.bounds.area()).abs() < 1e-9);
        }
    }
}

#[test]
fn build_rejects_degenerate_bounds() {
    let flat = Bounds::new(0.0, 0.0, 0.0, 0.0);
    assert!(matches!(
        SpatialGrid::build(2, flat),
        Err(RefineError::InvalidBounds)
    ));
}

#[test]
fn build_rejects_depths_beyond_the_arena_limit() {
    for depth in [MAX_GRID_DEPTH + 1, 33, 64] {
        assert!(matches!(
            SpatialGrid::build(depth, domain()),
            Err(RefineError::InvalidParameter { name: "tree_depth", .. })
        ));
    }
}

#[test]
fn lateral_links_connect_same_depth_neighbors() {
    let grid = SpatialGrid::build(3, domain()).unwrap();
    let n = 8;
    for j in 0..n {
        for i in 0..n {
            let id = grid.locate(3, i, j).unwrap();
            let cell = grid.cell(id);
            assert_eq!(cell.depth, 3);
            assert_eq!(cell.right, grid.locate(3, i + 1, j));
            assert_eq!(cell.up, grid.locate(3, i, j + 1));
            if let Some(r) = cell.right {
                assert_eq!(grid.cell(r).depth, 3);
                assert_eq!(grid.cell(r).bounds.min_x, cell.bounds.max_x);
            }
        }
    }
    assert_eq!(grid.locate(3, 8, 0), None);
    assert_eq!(grid.locate(4, 0, 0), None);
}

#[test]
fn locate_matches_cell_bounds() {
    let grid = SpatialGrid::build(2, domain()).unwrap();
    let id = grid.locate(2, 3, 1).unwrap();
    assert_eq!(grid.cell(id).bounds, Bounds::new(75.0, 25.0, 100.0, 50.0));
    assert_eq!(grid.locate(0, 0, 0), Some(grid.root()));
}

#[test]
fn coords_invert_locate() {
    let grid = SpatialGrid::build(3, domain()).unwrap();
    for depth in 0..=3 {
        let n = 1 << depth;
        for j in 0..n {
            for i in 0..n {
                let id = grid.locate(depth, i, j).unwrap();
                assert_eq!(grid.coords(id), (i, j));
            }
        }
    }
}

#[test]
fn points_on_the_upper_edge_bin_into_the_last_leaf() {
    let grid = SpatialGrid::build(2, domain()).unwrap();
    let leaf = grid.leaf_for_point(&Point::new(100.0, 100.0));
    assert_eq!(Some(leaf), grid.locate(2, 3, 3));
    let leaf = grid.leaf_for_point(&Point::new(-5.0, 30.0));
    assert_eq!(Some(leaf), grid.locate(2, 0, 1));
}

#[test]
fn populate_gives_every_leaf_a_scale_zero_block() {
    let grid = populated(2, vec![Point::new(1.0, 1.0), Point::new(99.0, 99.0)]);
    assert_eq!(grid.block_count(), 16);
    assert_eq!(grid.shallowest_level_depth(0), Some(2));
    let all = grid.gather_levels(grid.root(), 0);
    assert_eq!(all.len(), 16);
    let total: usize = all.iter().map(|b| grid.block(*b).point_count()).sum();
    assert_eq!(total, 2);
}

#[test]
fn gather_levels_prefers_the_cell_own_block() {
    let mut grid = populated(1, vec![Point::new(10.0, 10.0)]);
    let root = grid.root();
    let kernel = crate::kernel::StickBallKernel::default();
    let block = LevelBlock::promote(root, 2.0, 1, &[], &kernel, 2.0, 1.0);
    let id = grid.attach_block(block).unwrap();
    assert_eq!(grid.gather_levels(root, 1), vec![id]);
    assert_eq!(grid.gather_levels(root, 0).len(), 4);
}

#[test]
fn absent_scale_yields_empty_gather() {
    let grid = populated(1, vec![Point::new(10.0, 10.0)]);
    assert!(grid.gather_levels(grid.root(), 7).is_empty());
}

#[test]
fn bounded_gather_prunes_disjoint_subtrees() {
    let grid = populated(2, vec![Point::new(10.0, 10.0)]);
    let required = Bounds::new(0.0, 0.0, 20.0, 20.0);
    let blocks = grid.gather_levels_within_bounds(grid.root(), 0, &required);
    assert_eq!(blocks.len(), 1);
    assert_eq!(grid.block(blocks[0]).point_count(), 1);
}

#[test]
fn attaching_twice_at_the_same_scale_is_rejected() {
    let mut grid = populated(1, Vec::new());
    let leaf = grid.locate(1, 0, 0).unwrap();
    let dup = LevelBlock::populate(leaf, 1.0, Vec::new(), Tensor::identity());
    assert!(matches!(
        grid.attach_block(dup),
        Err(RefineError::LevelOccupied { scale_index: 0, .. })
    ));
}

#[test]
fn neighborhood_sweeps_right_then_up() {
    let grid = SpatialGrid::build(2, domain()).unwrap();
    let start = grid.locate(2, 0, 0).unwrap();
    let rect = grid.cell(start).bounds.padded_up_right(10.0);
    let cells = grid.neighborhood_cells(start, &rect);
    let expected: Vec<CellId> = [(0, 0), (1, 0), (0, 1), (1, 1)]
        .iter()
        .map(|&(i, j)| grid.locate(2, i, j).unwrap())
        .collect();
    assert_eq!(cells, expected);

    let corner = grid.locate(2, 3, 3).unwrap();
    let rect = grid.cell(corner).bounds.padded_up_right(60.0);
    assert_eq!(grid.neighborhood_cells(corner, &rect), vec![corner]);
}

#[test]
fn count_only_gather_sums_block_sizes() {
    let points = vec![
        Point::new(5.0, 5.0),
        Point::new(30.0, 5.0),
        Point::new(30.0, 30.0),
        Point::new(80.0, 80.0),
    ];
    let grid = populated(2, points);
    let start = grid.locate(2, 0, 0).unwrap();
    let rect = grid.cell(start).bounds.padded_up_right(10.0);
    assert_eq!(grid.count_neighborhood(start, 0, &rect), 3);
    assert_eq!(grid.count_neighborhood(grid.root(), 0, grid.bounds()), 4);
}

#[test]
fn subtree_membership() {
    let grid = SpatialGrid::build(2, domain()).unwrap();
    let parent = grid.locate(1, 1, 0).unwrap();
    let inside = grid.locate(2, 3, 1).unwrap();
    let outside = grid.locate(2, 0, 0).unwrap();
    assert!(grid.is_within(inside, parent));
    assert!(grid.is_within(parent, parent));
    assert!(!grid.is_within(outside, parent));
    assert!(!grid.is_within(grid.root(), parent));
}
