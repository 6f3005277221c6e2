//! Calldata encoding for replayed transactions.
//!
//! Output is `selector || abi_encode_params(args)` as lowercase hex without a
//! `0x` prefix, which is what the GPU loader expects on its command line.

use crate::error::ReportError;
use crate::replay::report::TransactionSpec;
use crate::utils::hex::{canonical_decimal, reserved_hex_to_prefixed};
use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::keccak256;

/// How a raw report token is turned into something the ABI codec can coerce.
///
/// Dispatch is driven by the declared type (and the reserved hex marker), never by
/// what the token happens to look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedArg {
    /// `#x...` token rewritten to `0x...`.
    Hex(String),
    /// Token of an `int`-family type, in canonical decimal form.
    Integer(String),
    Literal(String),
}

impl NormalizedArg {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Hex(raw) | Self::Integer(raw) | Self::Literal(raw) => raw.as_str(),
        }
    }
}

fn is_integer_family(ty: &str) -> bool {
    ty.contains("int")
}

pub fn normalize_arg(ty: &str, token: &str) -> Option<NormalizedArg> {
    if let Some(prefixed) = reserved_hex_to_prefixed(token) {
        return Some(NormalizedArg::Hex(prefixed));
    }
    if is_integer_family(ty) {
        return canonical_decimal(token).map(NormalizedArg::Integer);
    }
    Some(NormalizedArg::Literal(token.to_string()))
}

/// First four bytes of `keccak256("name(t1,t2,...)")`.
pub fn function_selector(method_name: &str, arg_types: &[String]) -> [u8; 4] {
    let signature = format!("{}({})", method_name, arg_types.join(","));
    let digest = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&digest[..4]);
    selector
}

fn coerce_args(
    method_name: &str,
    arg_types: &[String],
    args: &[String],
) -> Result<Vec<DynSolValue>, ReportError> {
    let mut values = Vec::with_capacity(args.len());
    for (index, (ty, token)) in arg_types.iter().zip(args).enumerate() {
        let sol_type = DynSolType::parse(ty).map_err(|_| ReportError::UnknownType {
            method: method_name.to_string(),
            ty: ty.clone(),
        })?;
        let invalid = |reason: String| ReportError::InvalidArgument {
            method: method_name.to_string(),
            index,
            ty: ty.clone(),
            token: token.clone(),
            reason,
        };
        let normalized =
            normalize_arg(ty, token).ok_or_else(|| invalid("not an integer literal".to_string()))?;
        // `coerce_str` trims string tokens; report strings are already final.
        let value = match sol_type {
            DynSolType::String => DynSolValue::String(normalized.as_str().to_string()),
            _ => sol_type
                .coerce_str(normalized.as_str())
                .map_err(|err| invalid(err.to_string()))?,
        };
        values.push(value);
    }
    Ok(values)
}

/// Encode one call as hex calldata.
pub fn encode_calldata(
    method_name: &str,
    arg_types: &[String],
    args: &[String],
) -> Result<String, ReportError> {
    if arg_types.len() != args.len() {
        return Err(ReportError::Malformed(format!(
            "`{method_name}` declares {} argument type(s) but carries {} argument(s)",
            arg_types.len(),
            args.len()
        )));
    }
    let values = coerce_args(method_name, arg_types, args)?;
    let encoded = DynSolValue::Tuple(values).abi_encode_params();

    let mut calldata = Vec::with_capacity(4 + encoded.len());
    calldata.extend_from_slice(&function_selector(method_name, arg_types));
    calldata.extend_from_slice(&encoded);
    Ok(hex::encode(calldata))
}

pub fn encode_tx(tx: &TransactionSpec) -> Result<String, ReportError> {
    encode_calldata(&tx.method_name, &tx.arg_types, &tx.args)
}

#[cfg(test)]
mod tests {
    use super::{encode_calldata, function_selector, normalize_arg, NormalizedArg};
    use crate::error::ReportError;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_transfer_selector_matches_erc20() {
        let selector = function_selector("transfer", &strings(&["address", "uint256"]));
        assert_eq!(hex::encode(selector), "a9059cbb");
    }

    #[test]
    fn test_transfer_calldata_layout() {
        let calldata = encode_calldata(
            "transfer",
            &strings(&["address", "uint256"]),
            &strings(&["0x0000000000000000000000000000000000000abc", "100"]),
        )
        .expect("encodes");
        assert_eq!(calldata.len(), 8 + 2 * 64);
        assert!(calldata.starts_with("a9059cbb"));
        assert_eq!(
            &calldata[8..72],
            "0000000000000000000000000000000000000000000000000000000000000abc"
        );
        assert_eq!(
            &calldata[72..],
            "0000000000000000000000000000000000000000000000000000000000000064"
        );
    }

    #[test]
    fn test_reserved_hex_marker_wins_over_integer_coercion() {
        assert_eq!(
            normalize_arg("uint256", "#x64"),
            Some(NormalizedArg::Hex("0x64".to_string()))
        );
        let via_hex =
            encode_calldata("set", &strings(&["uint256"]), &strings(&["#x64"])).expect("encodes");
        let via_dec =
            encode_calldata("set", &strings(&["uint256"]), &strings(&["100"])).expect("encodes");
        assert_eq!(via_hex, via_dec);
    }

    #[test]
    fn test_integer_family_rejects_non_integer_token() {
        assert_eq!(normalize_arg("uint8", "0x10"), None);
        let err = encode_calldata("set", &strings(&["uint8"]), &strings(&["abc"]))
            .expect_err("must reject");
        assert!(matches!(err, ReportError::InvalidArgument { index: 0, .. }));
    }

    #[test]
    fn test_negative_int_is_twos_complement() {
        let calldata =
            encode_calldata("f", &strings(&["int256"]), &strings(&["-1"])).expect("encodes");
        assert_eq!(&calldata[8..], "f".repeat(64));
    }

    #[test]
    fn test_literal_passthrough_for_dynamic_string() {
        let calldata =
            encode_calldata("setName", &strings(&["string"]), &strings(&["hello"])).expect("encodes");
        // offset word + length word + one padded data word
        assert_eq!(calldata.len(), 8 + 2 * 96);
        assert_eq!(
            &calldata[8..72],
            "0000000000000000000000000000000000000000000000000000000000000020"
        );
        assert!(calldata[136..].starts_with(&hex::encode("hello")));
    }

    #[test]
    fn test_string_argument_keeps_surrounding_whitespace() {
        let calldata =
            encode_calldata("f", &strings(&["string"]), &strings(&[" padded "])).expect("encodes");
        // offset word, then the length word
        let length = u64::from_str_radix(&calldata[8 + 64..8 + 128], 16).expect("length word");
        assert_eq!(length, 8);
        assert!(calldata[8 + 128..].starts_with(&hex::encode(" padded ")));

        let trailing =
            encode_calldata("f", &strings(&["string"]), &strings(&["x  "])).expect("encodes");
        let length = u64::from_str_radix(&trailing[8 + 64..8 + 128], 16).expect("length word");
        assert_eq!(length, 3);
    }

    #[test]
    fn test_no_argument_call_is_bare_selector() {
        let calldata = encode_calldata("kill", &[], &[]).expect("encodes");
        assert_eq!(calldata, hex::encode(function_selector("kill", &[])));
        assert_eq!(calldata.len(), 8);
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        let err = encode_calldata("transfer", &strings(&["address", "uint256"]), &strings(&["1"]))
            .expect_err("must reject");
        assert!(matches!(err, ReportError::Malformed(_)));
    }

    #[test]
    fn test_unknown_type_is_reported() {
        let err = encode_calldata("f", &strings(&["uint7x"]), &strings(&["1"]))
            .expect_err("must reject");
        assert!(matches!(err, ReportError::UnknownType { .. }));
    }
}
