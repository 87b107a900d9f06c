use crate::*;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

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
pub struct ExecutionPayloadHeader<E: EthSpec> {
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
    #[superstruct(getter(copy))]
    pub transactions_root: Hash256,
    #[superstruct(only(Capella, Deneb, Electra, Fulu), partial_getter(copy))]
    pub withdrawals_root: Hash256,
    #[superstruct(only(Deneb, Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub blob_gas_used: u64,
    #[superstruct(only(Deneb, Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub excess_blob_gas: u64,
}

impl<E: EthSpec> ExecutionPayloadHeader<E> {
    pub fn fork_name(&self) -> ForkName {
        match self {
            ExecutionPayloadHeader::Bellatrix(_) => ForkName::Bellatrix,
            ExecutionPayloadHeader::Capella(_) => ForkName::Capella,
            ExecutionPayloadHeader::Deneb(_) => ForkName::Deneb,
            ExecutionPayloadHeader::Electra(_) => ForkName::Electra,
            ExecutionPayloadHeader::Fulu(_) => ForkName::Fulu,
        }
    }
}

impl<E: EthSpec> From<&ExecutionPayloadBellatrix<E>> for ExecutionPayloadHeaderBellatrix<E> {
    fn from(payload: &ExecutionPayloadBellatrix<E>) -> Self {
        Self {
            parent_hash: payload.parent_hash,
            fee_recipient: payload.fee_recipient,
            state_root: payload.state_root,
            receipts_root: payload.receipts_root,
            logs_bloom: payload.logs_bloom.clone(),
            prev_randao: payload.prev_randao,
            block_number: payload.block_number,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            timestamp: payload.timestamp,
            extra_data: payload.extra_data.clone(),
            base_fee_per_gas: payload.base_fee_per_gas,
            block_hash: payload.block_hash,
            transactions_root: payload.transactions.tree_hash_root(),
        }
    }
}

impl<E: EthSpec> From<&ExecutionPayloadCapella<E>> for ExecutionPayloadHeaderCapella<E> {
    fn from(payload: &ExecutionPayloadCapella<E>) -> Self {
        Self {
            parent_hash: payload.parent_hash,
            fee_recipient: payload.fee_recipient,
            state_root: payload.state_root,
            receipts_root: payload.receipts_root,
            logs_bloom: payload.logs_bloom.clone(),
            prev_randao: payload.prev_randao,
            block_number: payload.block_number,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            timestamp: payload.timestamp,
            extra_data: payload.extra_data.clone(),
            base_fee_per_gas: payload.base_fee_per_gas,
            block_hash: payload.block_hash,
            transactions_root: payload.transactions.tree_hash_root(),
            withdrawals_root: payload.withdrawals.tree_hash_root(),
        }
    }
}

impl<E: EthSpec> From<&ExecutionPayloadDeneb<E>> for ExecutionPayloadHeaderDeneb<E> {
    fn from(payload: &ExecutionPayloadDeneb<E>) -> Self {
        Self {
            parent_hash: payload.parent_hash,
            fee_recipient: payload.fee_recipient,
            state_root: payload.state_root,
            receipts_root: payload.receipts_root,
            logs_bloom: payload.logs_bloom.clone(),
            prev_randao: payload.prev_randao,
            block_number: payload.block_number,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            timestamp: payload.timestamp,
            extra_data: payload.extra_data.clone(),
            base_fee_per_gas: payload.base_fee_per_gas,
            block_hash: payload.block_hash,
            transactions_root: payload.transactions.tree_hash_root(),
            withdrawals_root: payload.withdrawals.tree_hash_root(),
            blob_gas_used: payload.blob_gas_used,
            excess_blob_gas: payload.excess_blob_gas,
        }
    }
}

impl<E: EthSpec> From<&ExecutionPayloadElectra<E>> for ExecutionPayloadHeaderElectra<E> {
    fn from(payload: &ExecutionPayloadElectra<E>) -> Self {
        Self {
            parent_hash: payload.parent_hash,
            fee_recipient: payload.fee_recipient,
            state_root: payload.state_root,
            receipts_root: payload.receipts_root,
            logs_bloom: payload.logs_bloom.clone(),
            prev_randao: payload.prev_randao,
            block_number: payload.block_number,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            timestamp: payload.timestamp,
            extra_data: payload.extra_data.clone(),
            base_fee_per_gas: payload.base_fee_per_gas,
            block_hash: payload.block_hash,
            transactions_root: payload.transactions.tree_hash_root(),
            withdrawals_root: payload.withdrawals.tree_hash_root(),
            blob_gas_used: payload.blob_gas_used,
            excess_blob_gas: payload.excess_blob_gas,
        }
    }
}

impl<E: EthSpec> From<&ExecutionPayloadFulu<E>> for ExecutionPayloadHeaderFulu<E> {
    fn from(payload: &ExecutionPayloadFulu<E>) -> Self {
        Self {
            parent_hash: payload.parent_hash,
            fee_recipient: payload.fee_recipient,
            state_root: payload.state_root,
            receipts_root: payload.receipts_root,
            logs_bloom: payload.logs_bloom.clone(),
            prev_randao: payload.prev_randao,
            block_number: payload.block_number,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            timestamp: payload.timestamp,
            extra_data: payload.extra_data.clone(),
            base_fee_per_gas: payload.base_fee_per_gas,
            block_hash: payload.block_hash,
            transactions_root: payload.transactions.tree_hash_root(),
            withdrawals_root: payload.withdrawals.tree_hash_root(),
            blob_gas_used: payload.blob_gas_used,
            excess_blob_gas: payload.excess_blob_gas,
        }
    }
}

impl<'a, E: EthSpec> From<ExecutionPayloadRef<'a, E>> for ExecutionPayloadHeader<E> {
    fn from(payload: ExecutionPayloadRef<'a, E>) -> Self {
        match payload {
            ExecutionPayloadRef::Bellatrix(payload) => {
                ExecutionPayloadHeader::Bellatrix(payload.into())
            }
            ExecutionPayloadRef::Capella(payload) => ExecutionPayloadHeader::Capella(payload.into()),
            ExecutionPayloadRef::Deneb(payload) => ExecutionPayloadHeader::Deneb(payload.into()),
            ExecutionPayloadRef::Electra(payload) => ExecutionPayloadHeader::Electra(payload.into()),
            ExecutionPayloadRef::Fulu(payload) => ExecutionPayloadHeader::Fulu(payload.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    type E = MainnetEthSpec;

    #[test]
    fn header_roots_match_payload_fields() {
        let mut payload = ExecutionPayloadCapella::<E>::default();
        payload.transactions = VariableList::from(vec![VariableList::from(vec![1, 2, 3])]);
        payload.withdrawals = VariableList::from(vec![Withdrawal {
            index: 0,
            validator_index: 3,
            address: Address::repeat_byte(1),
            amount: 32,
        }]);

        let header = ExecutionPayloadHeaderCapella::from(&payload);
        assert_eq!(header.transactions_root, payload.transactions.tree_hash_root());
        assert_eq!(header.withdrawals_root, payload.withdrawals.tree_hash_root());
        assert_eq!(header.block_hash, payload.block_hash);
    }

    #[test]
    fn header_from_payload_ref_preserves_fork() {
        let payload = ExecutionPayload::<E>::Deneb(ExecutionPayloadDeneb::default());
        let header = ExecutionPayloadHeader::from(payload.to_ref());
        assert_eq!(header.fork_name(), ForkName::Deneb);
    }
}
