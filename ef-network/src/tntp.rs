//! TNTP text formats (Transportation Networks for Research)
//!
//! Network file:
//!
//! ```text
//! <NUMBER OF ZONES> 24
//! <NUMBER OF NODES> 24
//! <FIRST THRU NODE> 1
//! <NUMBER OF LINKS> 76
//! <END OF METADATA>
//! ~ Init node  Term node  Capacity  Length  Free Flow Time  B  Power  Speed limit  Toll  Type ;
//!     1    2    25900.2    6    6    0.15    4    0    0    1    ;
//! ```
//!
//! Trips file:
//!
//! ```text
//! <NUMBER OF ZONES> 24
//! <TOTAL OD FLOW> 360600.0
//! <END OF METADATA>
//! Origin  1
//!     1 :      0.0;     2 :    100.0;     3 :    100.0;
//! ```
//!
//! Node numbers are 1-based in the files and 0-based `VertexId`s in memory.
//! Link rows become BPR cost functions; B and Power default to 0.15 and 4
//! when a row stops after the free-flow time. `<FIRST THRU NODE>` is read
//! but not enforced: every node may carry through traffic.

use std::path::Path;

use ef_common::{Error, Result};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::cost::{CostFunction, BPR_ALPHA, BPR_BETA};
use crate::demand::{Demand, Origin};
use crate::network::{Network, NetworkBuilder, VertexId};

/// Metadata block at the head of a TNTP file
#[derive(Debug, Default)]
struct Metadata {
    values: FxHashMap<String, String>,
    /// Index of the first line after `<END OF METADATA>`
    body_start: usize,
}

impl Metadata {
    fn usize_value(&self, key: &str) -> Result<Option<usize>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<usize>()
                .map(Some)
                .map_err(|_| Error::invalid(format!("<{key}> is not a count: {raw:?}"))),
        }
    }
}

fn parse_metadata(lines: &[&str]) -> Result<Metadata> {
    let mut meta = Metadata::default();
    for (idx, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('~') {
            continue;
        }
        if !line.starts_with('<') {
            // Metadata block missing its terminator; body starts here
            meta.body_start = idx;
            return Ok(meta);
        }
        let close = line
            .find('>')
            .ok_or_else(|| Error::parse(idx + 1, "unterminated metadata tag"))?;
        let key = line[1..close].trim().to_ascii_uppercase();
        if key == "END OF METADATA" {
            meta.body_start = idx + 1;
            return Ok(meta);
        }
        meta.values
            .insert(key, line[close + 1..].trim().to_string());
    }
    meta.body_start = lines.len();
    Ok(meta)
}

fn parse_node(token: &str, line: usize, n_nodes: usize) -> Result<VertexId> {
    let node: usize = token
        .parse()
        .map_err(|_| Error::parse(line, format!("bad node number {token:?}")))?;
    if node == 0 || node > n_nodes {
        return Err(Error::parse(
            line,
            format!("node {node} outside 1..={n_nodes}"),
        ));
    }
    Ok((node - 1) as VertexId)
}

fn parse_f64(token: &str, line: usize, what: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::parse(line, format!("bad {what} {token:?}")))
}

/// Parse a TNTP network file already read into memory
pub fn parse_network(text: &str) -> Result<Network> {
    let lines: Vec<&str> = text.lines().collect();
    let meta = parse_metadata(&lines)?;
    let n_nodes = meta
        .usize_value("NUMBER OF NODES")?
        .ok_or_else(|| Error::invalid("network file has no <NUMBER OF NODES>"))?;
    let expected_links = meta.usize_value("NUMBER OF LINKS")?;

    let mut builder = NetworkBuilder::with_capacity(n_nodes, expected_links.unwrap_or(0));
    let mut n_links = 0usize;

    for (idx, raw) in lines.iter().enumerate().skip(meta.body_start) {
        let line_no = idx + 1;
        let row = raw.split(';').next().unwrap_or("").trim();
        if row.is_empty() || row.starts_with('~') {
            continue;
        }
        let cols: Vec<&str> = row.split_whitespace().collect();
        if cols.len() < 5 {
            return Err(Error::parse(
                line_no,
                format!("expected at least 5 columns, found {}", cols.len()),
            ));
        }

        let from = parse_node(cols[0], line_no, n_nodes)?;
        let to = parse_node(cols[1], line_no, n_nodes)?;
        let capacity = parse_f64(cols[2], line_no, "capacity")?;
        let free_flow_time = parse_f64(cols[4], line_no, "free flow time")?;
        let alpha = match cols.get(5) {
            Some(tok) => parse_f64(tok, line_no, "B")?,
            None => BPR_ALPHA,
        };
        let beta = match cols.get(6) {
            Some(tok) => parse_f64(tok, line_no, "power")?,
            None => BPR_BETA,
        };
        if capacity <= 0.0 {
            return Err(Error::parse(line_no, "capacity must be positive"));
        }

        let cost_fn = CostFunction::Bpr {
            free_flow_time,
            capacity,
            alpha,
            beta,
        };
        builder
            .add_link(from, to, cost_fn)
            .map_err(|e| Error::parse(line_no, e.to_string()))?;
        n_links += 1;
    }

    if let Some(expected) = expected_links {
        if expected != n_links {
            warn!(expected, found = n_links, "link count differs from metadata");
        }
    }
    debug!(n_nodes, n_links, "parsed TNTP network");

    Ok(builder.build())
}

/// Parse a TNTP trips file for a network with `n_vertices` vertices
pub fn parse_trips(text: &str, n_vertices: usize) -> Result<Demand> {
    let lines: Vec<&str> = text.lines().collect();
    let meta = parse_metadata(&lines)?;

    let mut demand = Demand::default();
    let mut current: Option<(VertexId, Vec<(VertexId, f64)>)> = None;

    let flush = |demand: &mut Demand, entry: Option<(VertexId, Vec<(VertexId, f64)>)>| -> Result<()> {
        if let Some((origin, dests)) = entry {
            let origin = Origin::new(origin, dests)?;
            if !origin.is_empty() {
                demand.push(origin);
            }
        }
        Ok(())
    };

    for (idx, raw) in lines.iter().enumerate().skip(meta.body_start) {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('~') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("Origin") {
            flush(&mut demand, current.take())?;
            let origin = parse_node(rest.trim(), line_no, n_vertices)?;
            current = Some((origin, Vec::new()));
            continue;
        }

        let (_, dests) = current
            .as_mut()
            .ok_or_else(|| Error::parse(line_no, "destination entries before any Origin line"))?;
        for entry in line.split(';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (dest, volume) = entry
                .split_once(':')
                .ok_or_else(|| Error::parse(line_no, format!("expected 'dest : volume', got {entry:?}")))?;
            let dest = parse_node(dest.trim(), line_no, n_vertices)?;
            let volume = parse_f64(volume.trim(), line_no, "volume")?;
            dests.push((dest, volume));
        }
    }
    flush(&mut demand, current.take())?;

    if let Some(total) = meta.values.get("TOTAL OD FLOW").and_then(|v| v.parse::<f64>().ok()) {
        let found = demand.total_demand();
        if (total - found).abs() > 1e-6 * total.abs().max(1.0) {
            warn!(total, found, "OD total differs from metadata");
        }
    }
    debug!(
        origins = demand.origins().len(),
        pairs = demand.n_pairs(),
        "parsed TNTP trips"
    );

    Ok(demand)
}

/// Read a TNTP network file
pub fn read_network<P: AsRef<Path>>(path: P) -> Result<Network> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_network(&text)
}

/// Read a TNTP trips file for a network with `n_vertices` vertices
pub fn read_trips<P: AsRef<Path>>(path: P, n_vertices: usize) -> Result<Demand> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_trips(&text, n_vertices)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET: &str = "\
<NUMBER OF ZONES> 3
<NUMBER OF NODES> 3
<FIRST THRU NODE> 1
<NUMBER OF LINKS> 3
<END OF METADATA>


~ \tInit node \tTerm node \tCapacity \tLength \tFree Flow Time \tB\tPower\tSpeed limit \tToll \tType\t;
\t1\t2\t100\t1\t2\t0.15\t4\t0\t0\t1\t;
\t2\t1\t100\t1\t2\t0.15\t4\t0\t0\t1\t;
\t2\t3\t50\t1\t3\t;
";

    const TRIPS: &str = "\
<NUMBER OF ZONES> 3
<TOTAL OD FLOW> 150.0
<END OF METADATA>

Origin  1
    1 :      0.0;     2 :    100.0;     3 :     50.0;

Origin  2
    1 :      0.0;
";

    #[test]
    fn test_parse_network() {
        let net = parse_network(NET).unwrap();
        assert_eq!(net.n_vertices(), 3);
        assert_eq!(net.n_links(), 3);
        assert_eq!(net.endpoints(2), (1, 2));
        assert_eq!(net.reverse(0), Some(1));
        assert_eq!(net.cost(2), 3.0);
        match net.link(2).cost_fn {
            CostFunction::Bpr { alpha, beta, capacity, .. } => {
                assert_eq!(alpha, BPR_ALPHA);
                assert_eq!(beta, BPR_BETA);
                assert_eq!(capacity, 50.0);
            }
            other => panic!("unexpected cost function {other:?}"),
        }
    }

    #[test]
    fn test_parse_trips() {
        let demand = parse_trips(TRIPS, 3).unwrap();
        assert_eq!(demand.origins().len(), 1);
        let o = &demand.origins()[0];
        assert_eq!(o.origin(), 0);
        assert_eq!(o.destinations(), &[(1, 100.0), (2, 50.0)]);
    }

    #[test]
    fn test_bad_node_reports_line() {
        let text = "<NUMBER OF NODES> 2\n<END OF METADATA>\n1 3 10 1 1 ;\n";
        match parse_network(text) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_node_count() {
        assert!(matches!(
            parse_network("<END OF METADATA>\n"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_trips_without_origin() {
        let text = "<END OF METADATA>\n 2 : 5.0;\n";
        assert!(matches!(parse_trips(text, 3), Err(Error::Parse { line: 2, .. })));
    }
}
