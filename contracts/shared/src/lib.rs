//! Draw helpers shared by the lottery contracts.
//!
//! Winner selection is "seed → index modulo participant count". The seed
//! comes either from ledger state (`ledger_seed`) or from an injected
//! contract implementing `EntropyProvider`.
//!
//! Neither source is secure against the round manager or validators: ledger
//! sequence and timestamp are known before the draw transaction is
//! submitted. Callers that need unbiased draws must supply a provider.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{contractclient, xdr::ToXdr, Address, Bytes, BytesN, Env, Vec};

/// Cross-contract interface for a pluggable entropy source.
#[contractclient(name = "EntropyProviderClient")]
pub trait EntropyProvider {
    /// Return 32 bytes of entropy for the draw of `round`.
    fn entropy(env: Env, round: u64) -> BytesN<32>;
}

/// Derive a seed from current chain state and the participant list.
///
/// Preimage: ledger sequence (4 bytes BE) || ledger timestamp (8 bytes BE)
/// || XDR encoding of `participants`.
pub fn ledger_seed(env: &Env, participants: &Vec<Address>) -> BytesN<32> {
    let mut preimage = Bytes::from_array(env, &env.ledger().sequence().to_be_bytes());
    preimage.append(&Bytes::from_array(env, &env.ledger().timestamp().to_be_bytes()));
    preimage.append(&participants.clone().to_xdr(env));

    env.crypto().sha256(&preimage).into()
}

/// Map a seed onto `[0, len)`.
///
/// Interprets the first 8 bytes of `seed` as a big-endian u64 and reduces it
/// modulo `len`. `len` must be non-zero.
pub fn index_from_seed(seed: &BytesN<32>, len: u32) -> u32 {
    let arr = seed.to_array();
    let raw = u64::from_be_bytes([arr[0], arr[1], arr[2], arr[3], arr[4], arr[5], arr[6], arr[7]]);
    (raw % len as u64) as u32
}

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::{
        testutils::{Address as _, Ledger},
        vec, Address, BytesN, Env,
    };

    fn seed_with_prefix(env: &Env, prefix: u64) -> BytesN<32> {
        let mut arr = [0xFFu8; 32];
        arr[..8].copy_from_slice(&prefix.to_be_bytes());
        BytesN::from_array(env, &arr)
    }

    #[test]
    fn test_index_uses_leading_bytes_modulo_len() {
        let env = Env::default();

        assert_eq!(index_from_seed(&seed_with_prefix(&env, 0), 3), 0);
        assert_eq!(index_from_seed(&seed_with_prefix(&env, 7), 3), 1);
        assert_eq!(index_from_seed(&seed_with_prefix(&env, 8), 3), 2);
        assert_eq!(index_from_seed(&seed_with_prefix(&env, u64::MAX), 1), 0);
    }

    #[test]
    fn test_index_always_in_range() {
        let env = Env::default();
        for len in 1u32..=16 {
            for prefix in 0u64..40 {
                let seed = seed_with_prefix(&env, prefix * 0x0101_0101);
                assert!(index_from_seed(&seed, len) < len);
            }
        }
    }

    #[test]
    fn test_ledger_seed_is_deterministic_for_same_state() {
        let env = Env::default();
        let a = Address::generate(&env);
        let b = Address::generate(&env);
        let participants = vec![&env, a, b];

        assert_eq!(ledger_seed(&env, &participants), ledger_seed(&env, &participants));
    }

    #[test]
    fn test_ledger_seed_changes_with_chain_state_and_participants() {
        let env = Env::default();
        let a = Address::generate(&env);
        let b = Address::generate(&env);

        let one = vec![&env, a.clone()];
        let two = vec![&env, a, b];
        let before = ledger_seed(&env, &two);
        assert_ne!(ledger_seed(&env, &one), before);

        env.ledger().with_mut(|li| {
            li.sequence_number += 1;
            li.timestamp += 5;
        });
        assert_ne!(ledger_seed(&env, &two), before);
    }
}
