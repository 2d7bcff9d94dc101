use std::collections::{HashMap, HashSet};

use icwcluster::{ClusteringConfig, HierarchicalClustering, Match, ProgressEvent};
use rand::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Four synthetic family lines of eight matches each. Members list most of
    // their own line and, rarely, someone from another line. A few low-cM
    // matches list part of one line and should be pulled into it by extension.
    let mut rng = StdRng::seed_from_u64(7);
    let mut matches = Vec::new();
    let mut lines: Vec<Vec<String>> = Vec::new();
    for line in 0..4 {
        let ids: Vec<String> = (0..8).map(|i| format!("L{line}-{i}")).collect();
        for id in &ids {
            let cm = rng.random_range(25.0..180.0);
            matches.push(Match::new(id.clone(), id.clone(), cm));
        }
        lines.push(ids);
    }

    let mut shared: HashMap<String, HashSet<String>> = HashMap::new();
    for (l, ids) in lines.iter().enumerate() {
        for id in ids {
            let set = shared.entry(id.clone()).or_default();
            for other in ids.iter().filter(|o| *o != id) {
                if rng.random_bool(0.8) {
                    set.insert(other.clone());
                }
            }
            if rng.random_bool(0.1) {
                let stray = &lines[(l + 1) % lines.len()][rng.random_range(0..8)];
                set.insert(stray.clone());
            }
        }
    }

    for (l, ids) in lines.iter().enumerate() {
        let id = format!("low-{l}");
        matches.push(Match::new(id.clone(), id.clone(), rng.random_range(10.0..19.0)));
        shared.insert(id, ids.iter().take(5).cloned().collect());
    }

    let progress = |event: ProgressEvent| {
        if let ProgressEvent::Describe { description, maximum } = event {
            println!("[{description}: {maximum}]");
        }
    };
    let config = ClusteringConfig::new()
        .with_extend_clusters(true)
        .with_max_gray_percent(30.0);
    let result = HierarchicalClustering::new(config)
        .with_progress(&progress)
        .cluster_raw(matches, &shared)?;

    println!(
        "leaves={} merges={} forced={}",
        result.ordered_indexes().len(),
        result.dendrogram.n_merges(),
        result.dendrogram.n_forced()
    );
    println!("clusters={}", result.assignment.len());
    for cluster in result.assignment.clusters() {
        let names: Vec<String> = cluster
            .members
            .iter()
            .filter_map(|&m| {
                result
                    .forest
                    .iter()
                    .find_map(|n| n.as_leaf().filter(|l| l.matched.index == m))
                    .map(|l| l.matched.matched.name.clone())
            })
            .collect();
        println!(
            "  cluster {} [{}..={}]: {:?}",
            cluster.number, cluster.range.start, cluster.range.end, names
        );
    }
    for (number, added) in &result.extended {
        println!("  cluster {number} extended with {added:?}");
    }

    Ok(())
}
