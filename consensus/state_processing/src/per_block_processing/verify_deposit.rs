use super::errors::{BlockOperationError, DepositInvalid as Invalid, verify};
use super::signature_sets::deposit_pubkey_signature_message;
use merkle_proof::verify_merkle_proof;
use safe_arith::SafeArith;
use tree_hash::TreeHash;
use types::*;

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

/// Verify a deposit's proof of possession in isolation (deposit signatures
/// use the genesis fork domain and are checked outside any batch).
///
/// A deposit with an invalid signature is not an invalid block; it is simply
/// skipped by the caller, as the deposit contract cannot police signatures.
pub fn is_valid_deposit_signature(deposit_data: &DepositData, spec: &ChainSpec) -> Result<()> {
    let (pubkey, message, signature) = deposit_pubkey_signature_message(deposit_data, spec);

    verify!(bls::verify(&pubkey, message, &signature), Invalid::BadSignature);

    Ok(())
}

/// Verify that a deposit is included in the state's eth1 deposit root.
pub fn verify_deposit_merkle_proof<E: EthSpec>(
    state: &BeaconState<E>,
    deposit: &Deposit,
    deposit_index: u64,
    spec: &ChainSpec,
) -> Result<()> {
    let leaf = deposit.data.tree_hash_root();

    verify!(
        verify_merkle_proof(
            leaf,
            &deposit.proof,
            spec.deposit_contract_tree_depth.safe_add(1)? as usize,
            deposit_index as usize,
            state.eth1_data().deposit_root,
        ),
        Invalid::BadMerkleProof
    );

    Ok(())
}

/// Returns the index of an existing validator with the given deposit pubkey,
/// if any.
pub fn get_existing_validator_index<E: EthSpec>(
    state: &BeaconState<E>,
    pub_key: &bls::PublicKeyBytes,
) -> Result<Option<u64>> {
    let validator_index = state
        .get_validator_index(pub_key)
        .map_err(BlockOperationError::BeaconStateError)?;
    Ok(validator_index.map(|idx| idx as u64))
}
