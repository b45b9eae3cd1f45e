use std::io::Write;

use ef_common::Error;
use ef_network::tntp;

const NET: &str = "\
<NUMBER OF ZONES> 4
<NUMBER OF NODES> 4
<FIRST THRU NODE> 1
<NUMBER OF LINKS> 5
<END OF METADATA>

~ Init node  Term node  Capacity  Length  Free Flow Time  B  Power  Speed limit  Toll  Type ;
    1    2    10.0    1    1.0    0.15    4    0    0    1    ;
    1    3    10.0    1    2.0    0.15    4    0    0    1    ;
    2    4    10.0    1    1.0    0.15    4    0    0    1    ;
    3    4    10.0    1    1.0    0.15    4    0    0    1    ;
    4    3    10.0    1    1.0    0.15    4    0    0    1    ;
";

const TRIPS: &str = "\
<NUMBER OF ZONES> 4
<TOTAL OD FLOW> 25.0
<END OF METADATA>

Origin  1
    2 :      5.0;     4 :     20.0;
";

fn write_temp(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_read_network_and_trips_from_disk() {
    let net_file = write_temp(NET);
    let trips_file = write_temp(TRIPS);

    let net = tntp::read_network(net_file.path()).unwrap();
    assert_eq!(net.n_vertices(), 4);
    assert_eq!(net.n_links(), 5);
    assert_eq!(net.reverse(3), Some(4));
    assert_eq!(net.reverse(0), None);

    let demand = tntp::read_trips(trips_file.path(), net.n_vertices()).unwrap();
    assert_eq!(demand.total_demand(), 25.0);
    assert!(demand.validate(net.n_vertices()).is_ok());

    let sp = net.shortest_path_order(demand.origins()[0].origin());
    assert_eq!(sp.dist[3], 2.0);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("net.tntp");
    assert!(matches!(tntp::read_network(&missing), Err(Error::Io(_))));
}

#[test]
fn test_trips_node_outside_network() {
    let trips_file = write_temp("<END OF METADATA>\nOrigin 1\n 9 : 1.0;\n");
    assert!(matches!(
        tntp::read_trips(trips_file.path(), 4),
        Err(Error::Parse { line: 3, .. })
    ));
}
