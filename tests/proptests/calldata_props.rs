use proptest::prelude::*;
use ptx_harness::replay::report::TxKeywords;
use ptx_harness::replay::{
    encode_calldata, function_selector, LoaderTarget, ReplayBuilder, ReportKind, Snapshot,
    TransactionSpec, VulnerabilityReport,
};

const PROPTEST_CASES: u32 = 64;

#[derive(Debug, Clone)]
enum StaticArg {
    Uint(u64),
    Int(i64),
    Address([u8; 20]),
    Bool(bool),
}

impl StaticArg {
    fn ty(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint256",
            Self::Int(_) => "int128",
            Self::Address(_) => "address",
            Self::Bool(_) => "bool",
        }
    }

    fn token(&self) -> String {
        match self {
            Self::Uint(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Address(bytes) => format!("0x{}", hex::encode(bytes)),
            Self::Bool(b) => b.to_string(),
        }
    }
}

fn static_arg() -> impl Strategy<Value = StaticArg> {
    prop_oneof![
        any::<u64>().prop_map(StaticArg::Uint),
        any::<i64>().prop_map(StaticArg::Int),
        any::<[u8; 20]>().prop_map(StaticArg::Address),
        any::<bool>().prop_map(StaticArg::Bool),
    ]
}

fn method_name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,15}"
}

fn split(args: &[StaticArg]) -> (Vec<String>, Vec<String>) {
    (
        args.iter().map(|a| a.ty().to_string()).collect(),
        args.iter().map(StaticArg::token).collect(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    #[test]
    fn static_calldata_is_selector_plus_one_word_per_arg(
        name in method_name(),
        args in prop::collection::vec(static_arg(), 0..8),
    ) {
        let (types, tokens) = split(&args);
        let calldata = encode_calldata(&name, &types, &tokens).expect("static args encode");
        prop_assert_eq!(calldata.len(), 8 + 64 * args.len());
        prop_assert_eq!(&calldata[..8], hex::encode(function_selector(&name, &types)));
        prop_assert!(calldata.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn encoding_is_deterministic(
        name in method_name(),
        args in prop::collection::vec(static_arg(), 0..6),
    ) {
        let (types, tokens) = split(&args);
        let first = encode_calldata(&name, &types, &tokens).expect("encodes");
        let second = encode_calldata(&name, &types, &tokens).expect("encodes");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn reserved_hex_marker_matches_decimal_for_integers(value in any::<u64>()) {
        let types = vec!["uint256".to_string()];
        let via_hex = encode_calldata("set", &types, &[format!("#x{value:x}")]).expect("hex encodes");
        let via_dec = encode_calldata("set", &types, &[value.to_string()]).expect("decimal encodes");
        prop_assert_eq!(via_hex, via_dec);
    }

    #[test]
    fn invocation_carries_one_pair_per_replayed_tx(
        values in prop::collection::vec(0u64..1_000_000, 1..12),
        snapshot in "0x[0-9a-f]{1,16}",
    ) {
        let mut tx_seq = vec![TransactionSpec {
            method_name: String::new(),
            arg_types: Vec::new(),
            args: Vec::new(),
            keywords: TxKeywords::default(),
        }];
        for (idx, value) in values.iter().enumerate() {
            tx_seq.push(TransactionSpec {
                method_name: format!("step{idx}"),
                arg_types: vec!["uint256".to_string()],
                args: vec![value.to_string()],
                keywords: TxKeywords { msg_value: value.to_string() },
            });
        }
        let report = VulnerabilityReport {
            kind: ReportKind::Io,
            snapshot: Snapshot::Value(snapshot.clone()),
            tx_seq,
        };
        let invocation = ReplayBuilder::new(LoaderTarget::new(0, "loader", "kernel.ptx"))
            .build(&report)
            .expect("builds")
            .expect("has exploit");

        prop_assert_eq!(invocation.args().len(), 4 + 2 * values.len() + 1);
        prop_assert_eq!(invocation.snapshot(), snapshot.as_str());
        let call_values: Vec<String> = invocation.pairs().iter().map(|(v, _)| v.to_string()).collect();
        let expected: Vec<String> = values.iter().map(u64::to_string).collect();
        prop_assert_eq!(call_values, expected);
    }
}
