//! Dataset import from tab-delimited vertex and edge lists.
//!
//! # File formats
//!
//! Both files start with a header row, which is skipped.
//!
//! Vertex list columns: `index`, `pi`, `USN2010`, `NRC95`, `region`,
//! `institution`. `pi` must be numeric; the two rankings are optional and
//! any non-numeric entry (`NaN`, `-`, empty) is read as unranked.
//!
//! Edge list columns: `source`, `target`, followed by any number of ignored
//! columns. Each row is one placement, so repeated rows produce parallel
//! edges.
//!
//! Each dataset designates one sentinel vertex that aggregates "all other
//! institutions". It is removed together with every edge touching it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use epinet_types::{InstitutionMeta, NodeId};

use crate::error::GraphError;
use crate::hiring_graph::{HiringGraph, HiringGraphBuilder};

const VERTEX_FILE: &str = "vertex list";
const EDGE_FILE: &str = "edge list";

/// Locations of a dataset's files and its sentinel node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    /// Path to the tab-delimited vertex list.
    pub vertex_list: PathBuf,
    /// Path to the tab-delimited edge list.
    pub edge_list: PathBuf,
    /// The "other institutions" node to exclude, if the dataset has one.
    pub excluded_node: Option<NodeId>,
}

/// A loaded hiring network in both its variants.
///
/// Graph nodes are the institutions that appear in at least one placement.
/// Institutions without placements are kept in `metadata` only.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// One unweighted edge per placement.
    pub unweighted: HiringGraph,
    /// One weight-1.0 edge per placement, followed by a weight-0.0 edge for
    /// every ordered pair of nodes (self-pairs included).
    pub weighted: HiringGraph,
    /// Institution metadata keyed by node, for every listed vertex.
    pub metadata: BTreeMap<NodeId, InstitutionMeta>,
}

impl Dataset {
    /// Select a variant.
    pub const fn graph(&self, weighted: bool) -> &HiringGraph {
        if weighted { &self.weighted } else { &self.unweighted }
    }

    /// Return every institution in metadata order. These are the candidate
    /// starting nodes for a sweep, including institutions that have no node
    /// in either graph.
    pub fn start_nodes(&self) -> Vec<NodeId> {
        self.metadata.keys().copied().collect()
    }
}

/// Read and parse a dataset from disk.
///
/// # Errors
///
/// Returns [`GraphError::Io`] if a file cannot be read, or any error from
/// [`parse_dataset`].
pub fn load_dataset(paths: &DatasetPaths) -> Result<Dataset, GraphError> {
    let vertices = read(&paths.vertex_list)?;
    let edges = read(&paths.edge_list)?;
    let dataset = parse_dataset(&vertices, &edges, paths.excluded_node)?;
    tracing::info!(
        vertex_list = %paths.vertex_list.display(),
        edge_list = %paths.edge_list.display(),
        nodes = dataset.unweighted.node_count(),
        edges = dataset.unweighted.edge_count(),
        "Dataset loaded"
    );
    Ok(dataset)
}

fn read(path: &Path) -> Result<String, GraphError> {
    std::fs::read_to_string(path).map_err(|source| GraphError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parse a dataset from the contents of its vertex and edge lists.
///
/// # Errors
///
/// Returns [`GraphError::Parse`] for malformed rows, [`GraphError::DuplicateNode`]
/// for a repeated vertex index, and [`GraphError::UnknownNode`] for an edge
/// naming a vertex that is not in the vertex list.
pub fn parse_dataset(
    vertex_text: &str,
    edge_text: &str,
    excluded_node: Option<NodeId>,
) -> Result<Dataset, GraphError> {
    let metadata = parse_vertices(vertex_text, excluded_node)?;
    let placements = parse_edges(edge_text, excluded_node)?;

    let mut endpoints = BTreeSet::new();
    let mut unweighted = HiringGraphBuilder::new();
    let mut weighted = HiringGraphBuilder::new();
    for &(source, target) in &placements {
        for endpoint in [source, target] {
            if !metadata.contains_key(&endpoint) {
                return Err(GraphError::UnknownNode {
                    source_node: source,
                    target_node: target,
                    missing: endpoint,
                });
            }
            endpoints.insert(endpoint);
            unweighted.ensure_node(endpoint);
            weighted.ensure_node(endpoint);
        }
        unweighted.add_edge(source, target, None)?;
        weighted.add_edge(source, target, Some(1.0))?;
    }
    for &source in &endpoints {
        for &target in &endpoints {
            weighted.add_edge(source, target, Some(0.0))?;
        }
    }

    Ok(Dataset {
        unweighted: unweighted.build(),
        weighted: weighted.build(),
        metadata,
    })
}

/// Yield `(line_number, columns)` for every non-blank row after the header.
fn rows(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| (idx.saturating_add(1), line.trim_end().split('\t').collect()))
}

fn parse_error(file: &str, line: usize, reason: impl Into<String>) -> GraphError {
    GraphError::Parse {
        file: file.to_owned(),
        line,
        reason: reason.into(),
    }
}

fn parse_node(file: &str, line: usize, text: &str) -> Result<NodeId, GraphError> {
    text.parse()
        .map_err(|e| parse_error(file, line, format!("invalid node index {text:?}: {e}")))
}

fn parse_vertices(
    text: &str,
    excluded_node: Option<NodeId>,
) -> Result<BTreeMap<NodeId, InstitutionMeta>, GraphError> {
    let mut metadata = BTreeMap::new();
    for (line, cols) in rows(text) {
        let [index, pi, usn2010, nrc95, region, institution, ..] = cols.as_slice() else {
            return Err(parse_error(
                VERTEX_FILE,
                line,
                format!("expected 6 columns, found {}", cols.len()),
            ));
        };
        let node = parse_node(VERTEX_FILE, line, index)?;
        if Some(node) == excluded_node {
            continue;
        }
        let pi: f64 = pi
            .trim()
            .parse()
            .map_err(|e| parse_error(VERTEX_FILE, line, format!("invalid pi {pi:?}: {e}")))?;
        let meta = InstitutionMeta {
            pi,
            usn2010: optional_rank(usn2010),
            nrc95: optional_rank(nrc95),
            region: region.trim().to_owned(),
            institution: institution.trim().to_owned(),
        };
        if metadata.insert(node, meta).is_some() {
            return Err(GraphError::DuplicateNode(node));
        }
    }
    Ok(metadata)
}

fn optional_rank(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_edges(
    text: &str,
    excluded_node: Option<NodeId>,
) -> Result<Vec<(NodeId, NodeId)>, GraphError> {
    let mut placements = Vec::new();
    for (line, cols) in rows(text) {
        let [source, target, ..] = cols.as_slice() else {
            return Err(parse_error(
                EDGE_FILE,
                line,
                format!("expected at least 2 columns, found {}", cols.len()),
            ));
        };
        let source = parse_node(EDGE_FILE, line, source)?;
        let target = parse_node(EDGE_FILE, line, target)?;
        if excluded_node.is_some_and(|x| x == source || x == target) {
            continue;
        }
        placements.push((source, target));
    }
    Ok(placements)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const VERTICES: &str = "# u\tpi\tUSN2010\tNRC95\tRegion\tinstitution\n\
        1\t1.5\t1\t2\tNortheast \tAlpha University\n\
        2\t4.25\tNaN\t-\tWest\tBeta College\n\
        3\t10.0\t12\t9\tMidwest\tGamma Institute\n\
        9\t0.0\t-\t-\tNA\tAll others\n";

    const EDGES: &str = "# u\tv\trank\tgender\n\
        1\t2\t1\tF\n\
        1\t2\t2\tM\n\
        2\t3\t1\tM\n\
        9\t1\t1\tF\n\
        3\t9\t4\tM\n\
        \n";

    fn load() -> Dataset {
        parse_dataset(VERTICES, EDGES, Some(NodeId(9))).unwrap()
    }

    #[test]
    fn sentinel_node_and_its_edges_are_dropped() {
        let ds = load();
        assert_eq!(ds.start_nodes(), vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!(!ds.unweighted.contains(NodeId(9)));
        assert_eq!(ds.unweighted.edge_count(), 3);
    }

    #[test]
    fn metadata_reads_optional_rankings() {
        let ds = load();
        let alpha = ds.metadata.get(&NodeId(1)).unwrap();
        assert_eq!(alpha.region, "Northeast");
        assert_eq!(alpha.institution, "Alpha University");
        assert!(alpha.usn2010.is_some());
        let beta = ds.metadata.get(&NodeId(2)).unwrap();
        assert!(beta.usn2010.is_none());
        assert!(beta.nrc95.is_none());
        assert!((beta.pi - 4.25).abs() < 1e-12);
    }

    #[test]
    fn weighted_variant_adds_zero_weight_pairs() {
        let ds = load();
        // 3 placements + 3 * 3 ordered pairs.
        assert_eq!(ds.weighted.edge_count(), 12);
        let first = ds.weighted.out_edges(NodeId(1)).first().copied().unwrap();
        assert_eq!(first.weight, Some(1.0));
        assert!(ds.graph(true).is_reachable(NodeId(3), NodeId(1)));
        assert!(!ds.graph(false).is_reachable(NodeId(3), NodeId(1)));
    }

    #[test]
    fn vertices_without_placements_are_not_nodes() {
        let vertices = "header\n\
            1\t1.0\t1\t1\tW\tA\n\
            2\t2.0\t2\t2\tW\tB\n\
            3\t3.0\t3\t3\tW\tC\n\
            4\t4.0\t4\t4\tW\tD\n";
        let edges = "u\tv\n1\t2\n2\t3\n";
        let ds = parse_dataset(vertices, edges, None).unwrap();

        assert_eq!(ds.unweighted.node_count(), 3);
        assert_eq!(ds.weighted.node_count(), 3);
        assert!(!ds.unweighted.contains(NodeId(4)));
        // 2 placements + 3 * 3 ordered pairs over the connected nodes.
        assert_eq!(ds.weighted.edge_count(), 11);
        assert_eq!(ds.metadata.len(), 4);
        assert_eq!(ds.start_nodes().last(), Some(&NodeId(4)));
    }

    #[test]
    fn edge_to_unlisted_vertex_fails_fast() {
        let edges = "u\tv\n1\t42\n";
        let err = parse_dataset(VERTICES, edges, Some(NodeId(9))).unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode { missing, .. } if missing == NodeId(42)));
    }

    #[test]
    fn short_rows_report_line_numbers() {
        let vertices = "header\n1\t1.0\t1\n";
        let err = parse_dataset(vertices, "u\tv\n", None).unwrap_err();
        assert!(matches!(err, GraphError::Parse { line: 2, .. }));
    }

    #[test]
    fn duplicate_vertex_is_rejected() {
        let vertices = "header\n1\t1.0\t1\t1\tW\tA\n1\t2.0\t1\t1\tW\tB\n";
        let err = parse_dataset(vertices, "u\tv\n", None).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(NodeId(1))));
    }

    #[test]
    fn load_dataset_reads_files() {
        let dir = std::env::temp_dir().join(format!("epinet-loader-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let paths = DatasetPaths {
            vertex_list: dir.join("vertexlist.txt"),
            edge_list: dir.join("edgelist.txt"),
            excluded_node: Some(NodeId(9)),
        };
        std::fs::write(&paths.vertex_list, VERTICES).unwrap();
        std::fs::write(&paths.edge_list, EDGES).unwrap();

        let ds = load_dataset(&paths).unwrap();
        assert_eq!(ds.unweighted.node_count(), 3);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let paths = DatasetPaths {
            vertex_list: PathBuf::from("/nonexistent/epinet/vertexlist.txt"),
            edge_list: PathBuf::from("/nonexistent/epinet/edgelist.txt"),
            excluded_node: None,
        };
        assert!(matches!(load_dataset(&paths), Err(GraphError::Io { .. })));
    }
}
