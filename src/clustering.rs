//! Connected components of picked coordinates.
//!
//! Coordinates are grouped by owning tomogram, each group gets its box
//! adjacency graph (see [crate::graphlaplace]) and the components are read
//! off the near-null space of the graph Laplacian: the count of near-zero
//! eigenvalues gives the expected number of components, and every
//! coordinate goes to the selected eigenvector column carrying the largest
//! absolute entry at its row. The argmax rule is a known approximation (a
//! robust method would run k-means on the spectral embedding) and is kept
//! as is: the contract here is to reproduce the xmipptomo
//! connected-components protocol, not to improve on it.

use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexMap;

use crate::coordset::{group_by_tomogram, Coordinate3D, CoordinateSet};
use crate::graphlaplace::{adjacency_matrix, GraphLaplacian, LaplacianSpectrum};
use crate::io::dump_group_matrices;

/// Clustering artifacts of one tomogram group. The matrices are kept
/// around so a caller can dump them for auditing.
pub(crate) struct GroupClustering {
    pub(crate) laplacian: GraphLaplacian,
    pub(crate) adjacency: ndarray::Array2<f64>,
    pub(crate) spectrum: LaplacianSpectrum,
    /// per cluster member indices into the group, empty clusters dropped
    pub(crate) members: Vec<Vec<usize>>,
} // end of struct GroupClustering

/// Spectral component extraction on one tomogram group.
/// If no eigenvalue passes the near-zero test the group yields no cluster
/// at all. This can happen when the multiplicity-of-zero count is thrown
/// off by the tolerance heuristic and is deliberately left as a silent
/// (logged) no-op, as the xmipptomo protocol behaves.
pub(crate) fn cluster_group(group: &[Coordinate3D], distance_threshold: f64) -> GroupClustering {
    let nbcoord = group.len();
    let adjacency = adjacency_matrix(group, distance_threshold);
    let laplacian = GraphLaplacian::from_adjacency(&adjacency);
    let spectrum = laplacian.eigen_decompose();
    let zero_indices = spectrum.near_zero_indices(nbcoord);
    if zero_indices.is_empty() && nbcoord > 0 {
        log::warn!(
            "cluster_group : no near zero eigenvalue among {} coordinates, group produces no cluster",
            nbcoord
        );
        return GroupClustering {
            laplacian,
            adjacency,
            spectrum,
            members: Vec::new(),
        };
    }
    //
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); zero_indices.len()];
    for k in 0..nbcoord {
        // argmax over the absolute entries of row k restricted to the
        // near-zero eigenvector columns. First maximum wins on ties.
        let mut ix_max = 0usize;
        let mut best = f64::NEG_INFINITY;
        for (ix, &j) in zero_indices.iter().enumerate() {
            let entry = spectrum.vectors[[k, j]].abs();
            if entry > best {
                best = entry;
                ix_max = ix;
            }
        }
        members[ix_max].push(k);
    }
    // an eigen index that wins no row stays empty and is dropped
    members.retain(|m| !m.is_empty());
    log::debug!(
        "cluster_group : {} coordinates -> {} clusters",
        nbcoord,
        members.len()
    );
    GroupClustering {
        laplacian,
        adjacency,
        spectrum,
        members,
    }
} // end of cluster_group

//==========================================================================

/// Pure clustering entry point: partition coordinates into connected
/// clusters, per tomogram.
///
/// Returns, for each tomogram in order of first appearance in the input,
/// the list of clusters as lists of coordinate object ids. An empty input
/// gives an empty map, a tomogram whose group yields no near-zero
/// eigenvalue gets an empty cluster list. Coordinates of different
/// tomograms are never clustered together.
pub fn find_clusters(
    coords: &[Coordinate3D],
    distance_threshold: f64,
) -> IndexMap<String, Vec<Vec<u64>>> {
    let groups = group_by_tomogram(coords);
    let mut clusters = IndexMap::<String, Vec<Vec<u64>>>::new();
    for (tomo, group) in &groups {
        let clustering = cluster_group(group, distance_threshold);
        let ids: Vec<Vec<u64>> = clustering
            .members
            .iter()
            .map(|member| member.iter().map(|&k| group[k].get_obj_id()).collect())
            .collect();
        clusters.insert(tomo.clone(), ids);
    }
    clusters
} // end of find_clusters

//==========================================================================

/// Protocol level driver: runs [find_clusters] over a [CoordinateSet] and
/// materializes one output set per cluster, with metadata copied from the
/// input set and a fresh global group id stamped on every member.
pub struct ClusterFinder {
    distance_threshold: f64,
    /// directory for the per tomogram matrix dumps, None disables dumping
    dump_dir: Option<PathBuf>,
} // end of struct ClusterFinder

impl ClusterFinder {
    pub fn new(distance_threshold: f64) -> Self {
        ClusterFinder {
            distance_threshold,
            dump_dir: None,
        }
    } // end of new

    pub fn get_distance_threshold(&self) -> f64 {
        self.distance_threshold
    }

    /// ask for dumps of the adjacency, degree, laplacian, eigenvector and
    /// eigenvalue matrices of every tomogram group, one text file each.
    pub fn set_dump_dir(&mut self, dir: &Path) {
        self.dump_dir = Some(dir.to_path_buf());
    }

    /// Run the clustering. Output sets come in tomogram discovery order,
    /// clusters of one tomogram in eigen index order; group ids are
    /// 1-based and increase across the whole run.
    pub fn run(&self, input: &CoordinateSet) -> Result<Vec<CoordinateSet>> {
        let groups = group_by_tomogram(input.get_items());
        let mut outputs = Vec::<CoordinateSet>::new();
        let mut outputset_index: u32 = 0;
        for (tomo, group) in &groups {
            let clustering = cluster_group(group, self.distance_threshold);
            if let Some(dir) = &self.dump_dir {
                dump_group_matrices(
                    dir,
                    tomo,
                    &clustering.adjacency,
                    &clustering.laplacian,
                    &clustering.spectrum,
                )?;
            }
            for member in &clustering.members {
                outputset_index += 1;
                let mut outset = input.derive_empty(&format!("_{}", outputset_index));
                outset.copy_info(input);
                for &k in member {
                    let mut coord = group[k].clone();
                    coord.set_group_id(outputset_index);
                    outset.append(coord);
                }
                outputs.push(outset);
            }
        }
        log::info!(
            "ClusterFinder::run : {} coordinates, {} tomograms, {} output clusters",
            input.len(),
            groups.len(),
            outputs.len()
        );
        Ok(outputs)
    } // end of run
} // end of impl ClusterFinder

//==========================================================================

#[cfg(test)]
mod tests {

    //    cargo test clustering  -- --nocapture
    //    RUST_LOG=tomocc::clustering=TRACE cargo test clustering -- --nocapture

    use super::*;
    use rand::prelude::*;
    use std::collections::BTreeSet;
    use std::mem;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    } // end of log_init_test

    fn coords_in(tomo: &str, first_id: u64, positions: &[[f64; 3]]) -> Vec<Coordinate3D> {
        positions
            .iter()
            .enumerate()
            .map(|(i, p)| Coordinate3D::new(first_id + i as u64, tomo, p[0], p[1], p[2]))
            .collect()
    }

    // partition as a set of sets, positional order of clusters and of
    // members inside a cluster carries no meaning
    fn as_partition(clusters: &[Vec<u64>]) -> BTreeSet<BTreeSet<u64>> {
        clusters
            .iter()
            .map(|c| c.iter().cloned().collect::<BTreeSet<u64>>())
            .collect()
    }

    //
    // a union-find over the box adjacency as oracle for the spectral path
    //

    fn uf_find(parents: &mut [usize], mut node: usize) -> usize {
        while parents[node] != node {
            parents[node] = parents[parents[node]];
            node = parents[node];
        }
        node
    }

    fn uf_union(parents: &mut [usize], ranks: &mut [usize], mut a: usize, mut b: usize) {
        if ranks[a] < ranks[b] {
            mem::swap(&mut a, &mut b);
        }
        parents[b] = a;
        if ranks[a] == ranks[b] {
            ranks[a] += 1;
        }
    }

    fn oracle_partition(coords: &[Coordinate3D], distance_threshold: f64) -> BTreeSet<BTreeSet<u64>> {
        let nbcoord = coords.len();
        let mut parents = (0..nbcoord).collect::<Vec<usize>>();
        let mut ranks = vec![1usize; nbcoord];
        for j in 0..nbcoord {
            for k in (j + 1)..nbcoord {
                let cj = coords[j].position();
                let ck = coords[k].position();
                if (cj[0] - ck[0]).abs() <= distance_threshold
                    && (cj[1] - ck[1]).abs() <= distance_threshold
                    && (cj[2] - ck[2]).abs() <= distance_threshold
                {
                    let rj = uf_find(&mut parents, j);
                    let rk = uf_find(&mut parents, k);
                    if rj != rk {
                        uf_union(&mut parents, &mut ranks, rj, rk);
                    }
                }
            }
        }
        let mut components = std::collections::HashMap::<usize, BTreeSet<u64>>::new();
        for k in 0..nbcoord {
            let root = uf_find(&mut parents, k);
            components
                .entry(root)
                .or_default()
                .insert(coords[k].get_obj_id());
        }
        components.into_values().collect()
    } // end of oracle_partition

    #[test]
    fn test_two_clusters_at_small_threshold() {
        log_init_test();
        //
        // a and b are within 5 of each other, c is far away
        let coords = coords_in("t1", 1, &[[0., 0., 0.], [1., 1., 1.], [100., 100., 100.]]);
        let clusters = find_clusters(&coords, 5.);
        assert_eq!(clusters.len(), 1);
        let t1 = clusters.get("t1").unwrap();
        let expected: BTreeSet<BTreeSet<u64>> =
            [[1u64, 2].into_iter().collect(), [3u64].into_iter().collect()]
                .into_iter()
                .collect();
        assert_eq!(as_partition(t1), expected);
    } // end of test_two_clusters_at_small_threshold

    #[test]
    fn test_one_cluster_at_large_threshold() {
        log_init_test();
        //
        let coords = coords_in("t1", 1, &[[0., 0., 0.], [1., 1., 1.], [100., 100., 100.]]);
        let clusters = find_clusters(&coords, 200.);
        let t1 = clusters.get("t1").unwrap();
        assert_eq!(t1.len(), 1);
        assert_eq!(as_partition(t1).iter().next().unwrap().len(), 3);
    } // end of test_one_cluster_at_large_threshold

    #[test]
    fn test_all_far_gives_singletons() {
        log_init_test();
        //
        let positions: Vec<[f64; 3]> = (0..6).map(|i| [100. * i as f64, 0., 0.]).collect();
        let coords = coords_in("t1", 1, &positions);
        let clusters = find_clusters(&coords, 5.);
        let t1 = clusters.get("t1").unwrap();
        assert_eq!(t1.len(), 6);
        for cluster in t1 {
            assert_eq!(cluster.len(), 1);
        }
    } // end of test_all_far_gives_singletons

    #[test]
    fn test_empty_input_is_a_no_op() {
        log_init_test();
        //
        let clusters = find_clusters(&[], 5.);
        assert!(clusters.is_empty());
        //
        let input = CoordinateSet::new("tomoset", 32, 13.68);
        let finder = ClusterFinder::new(5.);
        let outputs = finder.run(&input).unwrap();
        assert!(outputs.is_empty());
    } // end of test_empty_input_is_a_no_op

    #[test]
    fn test_tomograms_never_mix() {
        log_init_test();
        //
        // identical positions in two tomograms: proximity across volumes
        // means nothing
        let mut coords = coords_in("t1", 1, &[[0., 0., 0.], [1., 1., 1.]]);
        coords.extend(coords_in("t2", 3, &[[0., 0., 0.], [1., 1., 1.]]));
        let clusters = find_clusters(&coords, 5.);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters.get("t1").unwrap().len(), 1);
        assert_eq!(clusters.get("t2").unwrap().len(), 1);
        let t1_ids: BTreeSet<u64> = clusters.get("t1").unwrap()[0].iter().cloned().collect();
        assert_eq!(t1_ids, [1u64, 2].into_iter().collect::<BTreeSet<u64>>());
        let t2_ids: BTreeSet<u64> = clusters.get("t2").unwrap()[0].iter().cloned().collect();
        assert_eq!(t2_ids, [3u64, 4].into_iter().collect::<BTreeSet<u64>>());
    } // end of test_tomograms_never_mix

    #[test]
    fn test_duplicate_positions_share_a_cluster() {
        log_init_test();
        //
        let coords = coords_in(
            "t1",
            1,
            &[[10., 10., 10.], [10., 10., 10.], [500., 500., 500.]],
        );
        let clusters = find_clusters(&coords, 1.);
        let t1 = clusters.get("t1").unwrap();
        let expected: BTreeSet<BTreeSet<u64>> =
            [[1u64, 2].into_iter().collect(), [3u64].into_iter().collect()]
                .into_iter()
                .collect();
        assert_eq!(as_partition(t1), expected);
    } // end of test_duplicate_positions_share_a_cluster

    #[test]
    fn test_determinism() {
        log_init_test();
        //
        let coords = coords_in(
            "t1",
            1,
            &[
                [0., 0., 0.],
                [3., 1., 2.],
                [40., 40., 40.],
                [43., 41., 39.],
                [90., 0., 50.],
            ],
        );
        let first = find_clusters(&coords, 5.);
        let second = find_clusters(&coords, 5.);
        assert_eq!(
            as_partition(first.get("t1").unwrap()),
            as_partition(second.get("t1").unwrap())
        );
    } // end of test_determinism

    #[test]
    fn test_against_union_find_oracle() {
        log_init_test();
        //
        // three well separated blobs per tomogram, insertion order
        // shuffled so the adjacency blocks are interleaved
        let mut rng = StdRng::seed_from_u64(0x7530);
        let centers = [[0., 0., 0.], [300., 300., 300.], [600., 0., 300.]];
        let mut coords = Vec::<Coordinate3D>::new();
        let mut obj_id = 0u64;
        for tomo in ["t1", "t2"] {
            for center in &centers {
                for _ in 0..5 {
                    obj_id += 1;
                    coords.push(Coordinate3D::new(
                        obj_id,
                        tomo,
                        center[0] + rng.gen_range(-3.0..3.0),
                        center[1] + rng.gen_range(-3.0..3.0),
                        center[2] + rng.gen_range(-3.0..3.0),
                    ));
                }
            }
        }
        coords.shuffle(&mut rng);
        //
        let clusters = find_clusters(&coords, 10.);
        let groups = group_by_tomogram(&coords);
        for (tomo, group) in &groups {
            let spectral = as_partition(clusters.get(tomo).unwrap());
            let oracle = oracle_partition(group, 10.);
            assert_eq!(spectral, oracle, "partition mismatch in {}", tomo);
        }
    } // end of test_against_union_find_oracle

    #[test]
    fn test_random_cloud_against_oracle() {
        log_init_test();
        //
        let mut rng = StdRng::seed_from_u64(0x1234);
        let positions: Vec<[f64; 3]> = (0..15)
            .map(|_| {
                [
                    rng.gen_range(0.0..50.0),
                    rng.gen_range(0.0..50.0),
                    rng.gen_range(0.0..50.0),
                ]
            })
            .collect();
        let coords = coords_in("t1", 1, &positions);
        let clusters = find_clusters(&coords, 8.);
        let spectral = as_partition(clusters.get("t1").unwrap());
        let oracle = oracle_partition(&coords, 8.);
        assert_eq!(spectral, oracle);
    } // end of test_random_cloud_against_oracle

    #[test]
    fn test_run_output_sets() {
        log_init_test();
        //
        let mut input = CoordinateSet::new("tomoset", 32, 13.68);
        for coord in coords_in("t1", 1, &[[0., 0., 0.], [1., 1., 1.], [100., 100., 100.]]) {
            input.append(coord);
        }
        for coord in coords_in("t2", 4, &[[0., 0., 0.]]) {
            input.append(coord);
        }
        let finder = ClusterFinder::new(5.);
        let outputs = finder.run(&input).unwrap();
        // 2 clusters in t1, 1 singleton in t2
        assert_eq!(outputs.len(), 3);
        for (ix, outset) in outputs.iter().enumerate() {
            // metadata copied verbatim, group ids 1-based and dense
            assert_eq!(outset.get_box_size(), 32);
            assert_eq!(outset.get_sampling_rate(), 13.68);
            assert_eq!(outset.get_precedents(), "tomoset");
            assert_eq!(outset.get_suffix(), format!("_{}", ix + 1));
            assert!(!outset.is_empty());
            for coord in outset.iter_coordinates() {
                assert_eq!(coord.get_group_id(), (ix + 1) as u32);
            }
        }
        // clusters of one tomogram precede those of later tomograms
        let vols: Vec<&str> = outputs
            .iter()
            .map(|s| s.get_first_item().unwrap().get_vol_name())
            .collect();
        assert_eq!(vols, vec!["t1", "t1", "t2"]);
    } // end of test_run_output_sets
} // end of mod tests
