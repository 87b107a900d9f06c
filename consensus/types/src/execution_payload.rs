use crate::*;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// An opaque execution-layer transaction: consensus treats it as bytes.
pub type Transaction<N> = VariableList<u8, N>;
pub type Transactions<E> = VariableList<
    Transaction<<E as EthSpec>::MaxBytesPerTransaction>,
    <E as EthSpec>::MaxTransactionsPerPayload,
>;

pub type Withdrawals<E> = VariableList<Withdrawal, <E as EthSpec>::MaxWithdrawalsPerPayload>;

/// The execution-layer block carried inside a beacon block body.
///
/// The state transition only validates this structurally (hash chain,
/// randao, timestamp) and extracts its header; executing the transactions is
/// the execution engine's business. Field sets grow with the forks:
/// withdrawals arrive in Capella, the blob gas accounting in Deneb, and
/// nothing further through Fulu.
#[superstruct(
    variants(Bellatrix, Capella, Deneb, Electra, Fulu),
    variant_attributes(
        derive(
            Default,
            Debug,
            Clone,
            Serialize,
            Deserialize,
            Encode,
            Decode,
            TreeHash,
            PartialEq,
        ),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug)),
    cast_error(ty = "Error", expr = "BeaconStateError::IncorrectStateVariant"),
    partial_getter_error(ty = "Error", expr = "BeaconStateError::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Deserialize, Encode, TreeHash, PartialEq)]
#[serde(bound = "E: EthSpec", untagged)]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct ExecutionPayload<E: EthSpec> {
    #[superstruct(getter(copy))]
    pub parent_hash: ExecutionBlockHash,
    #[superstruct(getter(copy))]
    #[serde(with = "serde_utils::address_hex")]
    pub fee_recipient: Address,
    #[superstruct(getter(copy))]
    pub state_root: Hash256,
    #[superstruct(getter(copy))]
    pub receipts_root: Hash256,
    #[serde(with = "ssz_types::serde_utils::hex_fixed_vec")]
    pub logs_bloom: FixedVector<u8, E::BytesPerLogsBloom>,
    #[superstruct(getter(copy))]
    pub prev_randao: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    #[superstruct(getter(copy))]
    pub block_number: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    #[superstruct(getter(copy))]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    #[superstruct(getter(copy))]
    pub gas_used: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    #[superstruct(getter(copy))]
    pub timestamp: u64,
    #[serde(with = "ssz_types::serde_utils::hex_var_list")]
    pub extra_data: VariableList<u8, E::MaxExtraDataBytes>,
    #[serde(with = "serde_utils::quoted_u256")]
    #[superstruct(getter(copy))]
    pub base_fee_per_gas: Uint256,
    #[superstruct(getter(copy))]
    pub block_hash: ExecutionBlockHash,
    #[serde(with = "ssz_types::serde_utils::list_of_hex_var_list")]
    pub transactions: Transactions<E>,
    #[superstruct(only(Capella, Deneb, Electra, Fulu))]
    pub withdrawals: Withdrawals<E>,
    #[superstruct(only(Deneb, Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub blob_gas_used: u64,
    #[superstruct(only(Deneb, Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub excess_blob_gas: u64,
}

impl<E: EthSpec> ExecutionPayload<E> {
    pub fn fork_name(&self) -> ForkName {
        match self {
            ExecutionPayload::Bellatrix(_) => ForkName::Bellatrix,
            ExecutionPayload::Capella(_) => ForkName::Capella,
            ExecutionPayload::Deneb(_) => ForkName::Deneb,
            ExecutionPayload::Electra(_) => ForkName::Electra,
            ExecutionPayload::Fulu(_) => ForkName::Fulu,
        }
    }

    /// SSZ decode as the payload shape of `fork_name`.
    ///
    /// Payloads only exist from the merge onwards; earlier forks are a
    /// decoding error, not an empty payload.
    pub fn from_ssz_bytes_by_fork(
        bytes: &[u8],
        fork_name: ForkName,
    ) -> Result<Self, ssz::DecodeError> {
        use ssz::Decode;
        match fork_name {
            ForkName::Base | ForkName::Altair => Err(ssz::DecodeError::BytesInvalid(format!(
                "no execution payload exists at fork {fork_name}",
            ))),
            ForkName::Bellatrix => {
                ExecutionPayloadBellatrix::from_ssz_bytes(bytes).map(Self::Bellatrix)
            }
            ForkName::Capella => ExecutionPayloadCapella::from_ssz_bytes(bytes).map(Self::Capella),
            ForkName::Deneb => ExecutionPayloadDeneb::from_ssz_bytes(bytes).map(Self::Deneb),
            ForkName::Electra => ExecutionPayloadElectra::from_ssz_bytes(bytes).map(Self::Electra),
            ForkName::Fulu => ExecutionPayloadFulu::from_ssz_bytes(bytes).map(Self::Fulu),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;
    use ssz::Encode;

    type E = MainnetEthSpec;

    fn make_deneb_payload() -> ExecutionPayloadDeneb<E> {
        ExecutionPayloadDeneb {
            parent_hash: ExecutionBlockHash::repeat_byte(0x11),
            fee_recipient: Address::repeat_byte(0x12),
            state_root: Hash256::repeat_byte(0x13),
            receipts_root: Hash256::repeat_byte(0x14),
            logs_bloom: FixedVector::from(vec![0x15; 256]),
            prev_randao: Hash256::repeat_byte(0x16),
            block_number: 100,
            gas_limit: 60_000_000,
            gas_used: 30_000_000,
            timestamp: 1_800_000_000,
            extra_data: VariableList::from(vec![0xCC, 0xDD]),
            base_fee_per_gas: Uint256::from(2_000_000_000u64),
            block_hash: ExecutionBlockHash::repeat_byte(0x17),
            transactions: <_>::default(),
            withdrawals: <_>::default(),
            blob_gas_used: 262_144,
            excess_blob_gas: 131_072,
        }
    }

    #[test]
    fn fork_name_matches_variant() {
        let payload = ExecutionPayload::<E>::Deneb(make_deneb_payload());
        assert_eq!(payload.fork_name(), ForkName::Deneb);
        let payload = ExecutionPayload::<E>::Fulu(ExecutionPayloadFulu::default());
        assert_eq!(payload.fork_name(), ForkName::Fulu);
    }

    #[test]
    fn ssz_roundtrip_via_fork_dispatch() {
        let inner = make_deneb_payload();
        let wrapped = ExecutionPayload::<E>::Deneb(inner.clone());
        let bytes = wrapped.as_ssz_bytes();
        let decoded = ExecutionPayload::<E>::from_ssz_bytes_by_fork(&bytes, ForkName::Deneb)
            .expect("SSZ decode should succeed");
        assert_eq!(decoded, wrapped);

        // The same bytes decode as any same-layout later fork, landing on
        // that fork's variant.
        let as_electra =
            ExecutionPayload::<E>::from_ssz_bytes_by_fork(&bytes, ForkName::Electra).unwrap();
        assert_eq!(as_electra.fork_name(), ForkName::Electra);
    }

    #[test]
    fn ssz_decode_pre_bellatrix_fork_fails() {
        let bytes = [0u8; 32];
        assert!(ExecutionPayload::<E>::from_ssz_bytes_by_fork(&bytes, ForkName::Base).is_err());
        assert!(ExecutionPayload::<E>::from_ssz_bytes_by_fork(&bytes, ForkName::Altair).is_err());
    }

    #[test]
    fn enum_field_accessors() {
        let inner = make_deneb_payload();
        let payload = ExecutionPayload::<E>::Deneb(inner.clone());
        assert_eq!(payload.parent_hash(), inner.parent_hash);
        assert_eq!(payload.block_hash(), inner.block_hash);
        assert_eq!(payload.block_number(), inner.block_number);
        assert_eq!(payload.timestamp(), inner.timestamp);
        assert_eq!(payload.prev_randao(), inner.prev_randao);
        assert_eq!(payload.blob_gas_used().unwrap(), inner.blob_gas_used);
        // Bellatrix payloads have no withdrawals.
        let bellatrix = ExecutionPayload::<E>::Bellatrix(ExecutionPayloadBellatrix::default());
        assert!(bellatrix.withdrawals().is_err());
    }
}
