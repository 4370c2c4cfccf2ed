use proptest::prelude::*;
use twinseed_engine::config::parser;
use twinseed_engine::partition::Partitioner;

fn bpn_config(mapped: &[(String, usize)], providers: usize) -> String {
    let mut yaml = String::from(
        r#"
version: "1.0"
name: prop_partition
input: testdata.json
registry:
  url: http://registry
connector:
  api_key: key
providers:
"#,
    );
    for i in 0..providers {
        yaml.push_str(&format!(
            "  - name: p{i}\n    submodel_url: http://sm-{i}\n    connector_url: http://edc-{i}\n"
        ));
    }
    yaml.push_str("partitioning:\n  strategy: bpn\n  bpn_map:\n");
    for (bpn, provider) in mapped {
        yaml.push_str(&format!("    {bpn}: p{provider}\n"));
    }
    yaml
}

proptest! {
    #[test]
    fn round_robin_cycles_through_every_target(targets in 1_usize..8, start in 0_u64..1_000) {
        let partitioner = Partitioner::round_robin(targets);
        let cycle: Vec<usize> = (start..start + targets as u64)
            .map(|seq| partitioner.assign(seq, "BPNL-ANY"))
            .collect();

        let mut sorted = cycle.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (0..targets).collect::<Vec<_>>());
        for seq in start..start + 3 * targets as u64 {
            prop_assert_eq!(
                partitioner.assign(seq, "BPNL-ANY"),
                partitioner.assign(seq + targets as u64, "BPNL-ANY")
            );
        }
    }

    #[test]
    fn bpn_assignment_ignores_sequence(
        providers in 1_usize..5,
        picks in proptest::collection::vec(0_usize..5, 1..6),
        sequences in proptest::collection::vec(any::<u64>(), 1..10),
    ) {
        let mapped: Vec<(String, usize)> = picks
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("BPNL{i:012}"), p % providers))
            .collect();
        let config = parser::parse_config_str(&bpn_config(&mapped, providers))
            .expect("generated yaml must parse");
        let partitioner = Partitioner::from_config(&config).expect("all providers exist");

        for (bpn, provider) in &mapped {
            for &seq in &sequences {
                prop_assert_eq!(partitioner.assign(seq, bpn), *provider);
            }
        }
        // Unmapped BPNs land on the first provider.
        for &seq in &sequences {
            prop_assert_eq!(partitioner.assign(seq, "BPNL-UNMAPPED"), 0);
        }
    }
}
