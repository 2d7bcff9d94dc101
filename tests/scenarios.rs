use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use icwcluster::cluster::{ClusterBuilder, ClusterExtender, HalfMatchFinder, PrimaryClusterFinder};
use icwcluster::hierarchy::{Forest, HealthCheck, NodeId};
use icwcluster::matches::{asymmetric_pairs, validate_matches};
use icwcluster::{
    AppearanceWeightedBuilder, ClusterableMatch, ClusteringConfig, DistanceMetric,
    HierarchicalClustering, Match, OverlapWeightedEuclidean,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn cm(index: usize, cm: f64, coords: &[usize]) -> ClusterableMatch {
    let m = Arc::new(Match::new(format!("id{index}"), format!("Match {index}"), cm));
    ClusterableMatch::new(index, m, coords.iter().copied())
}

fn build(matches: &[ClusterableMatch]) -> (Forest, NodeId, icwcluster::Dendrogram) {
    let matrix = AppearanceWeightedBuilder::new(20.0).correlate(matches, &HashSet::new());
    let mut forest = Forest::new();
    let leaves: Vec<NodeId> = matches
        .iter()
        .map(|m| forest.add_leaf(Arc::new(m.clone()), Arc::new(matrix.coords(m.index))))
        .collect();
    let outcome = ClusterBuilder::new(&OverlapWeightedEuclidean)
        .build(&mut forest, &leaves)
        .unwrap();
    let root = outcome.root().unwrap();
    (forest, root, outcome.dendrogram)
}

#[test]
fn trivial_pair() {
    init_logs();
    let matches = vec![cm(0, 60.0, &[1]), cm(1, 50.0, &[0])];
    let (forest, root, dendrogram) = build(&matches);

    assert_eq!(dendrogram.n_merges(), 1);
    let node = forest.node(root).unwrap();
    assert_eq!(node.num_children(), 2);
    assert!(node.distance().unwrap().is_finite());

    let boundary: HashSet<usize> = [node.first_leaf(), node.second_leaf()]
        .iter()
        .map(|&l| forest.match_index(l).unwrap())
        .collect();
    assert_eq!(boundary, [0, 1].into_iter().collect());

    let (again, again_root, _) = build(&matches);
    assert_eq!(again.ordered_indexes(again_root), forest.ordered_indexes(root));
}

#[test]
fn isolated_pairs_are_joined_at_infinity() {
    init_logs();
    let matches = vec![
        cm(0, 90.0, &[1]),
        cm(1, 80.0, &[0]),
        cm(2, 70.0, &[3]),
        cm(3, 60.0, &[2]),
    ];
    let (forest, root, dendrogram) = build(&matches);

    assert_eq!(dendrogram.n_merges(), 3);
    assert_eq!(dendrogram.n_forced(), 1);

    let top = forest.node(root).unwrap().as_cluster().unwrap();
    assert!(top.distance.is_infinite());
    let mut pairs = Vec::new();
    for child in [top.first, top.second] {
        let node = forest.node(child).unwrap();
        assert_eq!(node.num_children(), 2);
        assert!(node.distance().unwrap().is_finite());
        let mut indexes = forest.ordered_indexes(child);
        indexes.sort_unstable();
        pairs.push(indexes);
    }
    pairs.sort();
    assert_eq!(pairs, vec![vec![0, 1], vec![2, 3]]);
}

#[test]
fn indirect_only_relationship() {
    // A lists B and C; B and C list nobody.
    let matches = vec![cm(0, 90.0, &[1, 2]), cm(1, 80.0, &[]), cm(2, 70.0, &[])];
    let matrix = AppearanceWeightedBuilder::new(20.0).correlate(&matches, &HashSet::new());

    for (b, c) in [(1, 2), (2, 1)] {
        let w = matrix.weight(b, c);
        assert!(w > 0.0 && w < 1.0, "weight ({b},{c}) = {w}");
    }
    assert_eq!(matrix.weight(0, 1), 1.0);
    assert_eq!(matrix.weight(1, 1), 1.0);
}

#[test]
fn self_distance_is_zero() {
    let matches = vec![cm(0, 90.0, &[1, 2]), cm(1, 80.0, &[0]), cm(2, 70.0, &[0, 1])];
    let matrix = AppearanceWeightedBuilder::new(20.0).correlate(&matches, &HashSet::new());
    for m in &matches {
        let coords = matrix.coords(m.index);
        assert_eq!(OverlapWeightedEuclidean.calculate(&coords, &coords), 0.0);
    }
}

#[test]
fn extension_preserves_existing_leaves() {
    init_logs();
    let five = [3, 4, 5, 6, 7];
    let mut base = vec![cm(0, 90.0, &[1, 2, 8]), cm(1, 80.0, &[0, 2, 8]), cm(2, 70.0, &[0, 1, 8])];
    base.extend(five.iter().map(|&i| cm(i, 60.0 - i as f64, &five)));
    let low = Arc::new(cm(8, 12.0, &[0, 1, 2]));

    let builder = AppearanceWeightedBuilder::new(20.0);
    let matrix = builder.correlate(&base, &HashSet::new());
    let mut forest = Forest::new();
    let leaves: Vec<NodeId> = base
        .iter()
        .map(|m| forest.add_leaf(Arc::new(m.clone()), Arc::new(matrix.coords(m.index))))
        .collect();
    let root = ClusterBuilder::new(&OverlapWeightedEuclidean)
        .build(&mut forest, &leaves)
        .unwrap()
        .root()
        .unwrap();
    let primary = HalfMatchFinder::new(3)
        .find(&forest, root, &HashSet::new(), &HashSet::new())
        .unwrap();

    let before: HashMap<usize, NodeId> = forest
        .ordered_leaves(root)
        .into_iter()
        .map(|leaf| (forest.match_index(leaf).unwrap(), leaf))
        .collect();

    let out = ClusterExtender::new(&OverlapWeightedEuclidean, &builder, 3)
        .extend(&mut forest, root, &matrix, &primary, &[low])
        .unwrap();

    let after: HashMap<usize, NodeId> = forest
        .ordered_leaves(out.root)
        .into_iter()
        .map(|leaf| (forest.match_index(leaf).unwrap(), leaf))
        .collect();
    assert_eq!(after.len(), before.len() + 1);
    for (index, leaf) in &before {
        assert_eq!(after.get(index), Some(leaf));
    }
    assert!(after.contains_key(&8));
    assert!(forest.health_check().is_healthy());
}

#[test]
fn raw_input_is_ranked_and_validated() {
    init_logs();
    let matches = vec![
        Match::new("low", "Low", 30.0),
        Match::new("high", "High", 95.0),
        Match::new("mid", "Mid", 60.0),
    ];
    let mut shared: HashMap<String, HashSet<String>> = HashMap::new();
    let set = |ids: &[&str]| ids.iter().map(|s| s.to_string()).collect::<HashSet<_>>();
    shared.insert("high".into(), set(&["mid", "low", "not-loaded"]));
    shared.insert("mid".into(), set(&["high", "low"]));
    shared.insert("low".into(), set(&["high"]));

    let ranked = icwcluster::rank_matches(matches.clone(), &shared);
    assert_eq!(ranked[0].matched.id, "high");
    assert_eq!(ranked[2].matched.id, "low");
    assert!(ranked.iter().all(|m| m.coords.contains(&m.index)));
    assert_eq!(asymmetric_pairs(&ranked), vec![(1, 2)]);

    let report = validate_matches(&ranked);
    assert!(report.is_healthy());
    assert!(!report.is_clean());

    let result = HierarchicalClustering::new(ClusteringConfig::default())
        .cluster_raw(matches, &shared)
        .unwrap();
    let mut order = result.ordered_indexes();
    order.sort_unstable();
    assert_eq!(order, vec![0, 1, 2]);
}
