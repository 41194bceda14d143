//! Pooled Lottery Round Contract
//!
//! Participants deposit SEP-41 tokens to enter the open round. The manager
//! fixed at `init` closes the round with `distribute_prize`, which picks one
//! entry, pays it the whole escrow and reopens an empty round.
//!
//! ## Round Lifecycle
//! ```text
//! [open, escrow=0, participants=[]]
//!   --enter(value >= min_entry)--> escrow += value, participants += caller
//!   --distribute_prize(manager)--> escrow paid to winner, round reset
//! ```
//! The machine never terminates; each distribution opens round `n + 1`.
//!
//! ## Winner Selection
//! `index = seed[0..8] as u64 % participants.len()`. The seed comes from the
//! configured `EntropySource`. The default `Ledger` source hashes ledger
//! sequence, timestamp and the participant list; it is predictable by the
//! manager and validators.
//!
//! ## Storage Strategy
//! - `instance()`: Manager, Token, MinEntry, Entropy. Fixed at `init`.
//! - `persistent()`: Participants, Escrow, Round, and one RoundResult per
//!   settled round. TTL bumped on every write.
//!
//! The participant list is a single ledger entry, rewritten by every
//! `enter`. A round is capped at `MAX_PARTICIPANTS` entries to stay well
//! under the host's 64 KiB entry size limit.
//!
//! ## Invariant
//! `escrow == sum(values entered this round)` and
//! `participants.len() == entries this round`. Both are cleared in the same
//! invocation that pays the winner; a failed payout reverts the clear.
#![no_std]
#![allow(unexpected_cfgs)]

use lottery_shared::{index_from_seed, ledger_seed, EntropyProviderClient};
use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, token::TokenClient,
    Address, BytesN, Env, IntoVal, Val, Vec,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

/// Entries accepted per round. Further `enter` calls fail with `RoundFull`
/// until the manager distributes.
pub const MAX_PARTICIPANTS: u32 = 1_000;

/// Number of the round opened by `init`.
pub const FIRST_ROUND: u64 = 1;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized     = 2,
    /// Caller of a manager-only operation is not the manager.
    NotAuthorized      = 3,
    /// `min_entry` passed to `init` is negative.
    InvalidAmount      = 4,
    /// Value attached to `enter` is below `min_entry`.
    InsufficientEntry  = 5,
    /// `distribute_prize` called on a round with no entries.
    NoParticipants     = 6,
    RoundNotFound      = 7,
    Overflow           = 8,
    /// The open round already holds `MAX_PARTICIPANTS` entries.
    RoundFull          = 9,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    // --- instance() ---
    Manager,
    Token,
    MinEntry,
    Entropy,
    // --- persistent() ---
    /// Entry order of the open round; one element per successful `enter`.
    Participants,
    /// Tokens held for the open round.
    Escrow,
    /// Number of the open round.
    Round,
    /// Outcome of a settled round keyed by round number.
    RoundResult(u64),
}

/// Where `distribute_prize` takes its seed from.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntropySource {
    /// Hash of ledger sequence, timestamp and the participant list.
    Ledger,
    /// A contract implementing `EntropyProvider::entropy(round)`.
    Provider(Address),
}

/// Fixed configuration returned by `get_config`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LotteryConfig {
    pub manager: Address,
    pub token: Address,
    pub min_entry: i128,
    pub entropy: EntropySource,
}

/// Outcome of one distribution.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoundResult {
    pub round: u64,
    pub winner: Address,
    /// Full escrow of the round, paid to `winner`.
    pub prize: i128,
    pub participant_count: u32,
    /// Ledger sequence the draw happened in.
    pub ledger: u32,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct Initialized {
    pub manager: Address,
    pub token: Address,
    pub min_entry: i128,
}

#[contractevent]
pub struct Entered {
    #[topic]
    pub round: u64,
    #[topic]
    pub participant: Address,
    pub value: i128,
    pub escrow: i128,
}

#[contractevent]
pub struct PrizeDistributed {
    #[topic]
    pub round: u64,
    #[topic]
    pub winner: Address,
    pub prize: i128,
    pub participant_count: u32,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct LotteryRound;

#[contractimpl]
impl LotteryRound {
    // -----------------------------------------------------------------------
    // init
    // -----------------------------------------------------------------------

    /// Create the lottery. May only be called once.
    ///
    /// `manager` is the only address that can ever call `distribute_prize`.
    /// `token` is the SEP-41 contract all entries and payouts move through.
    pub fn init(
        env: Env,
        manager: Address,
        token: Address,
        min_entry: i128,
        entropy: EntropySource,
    ) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Manager) {
            return Err(Error::AlreadyInitialized);
        }
        if min_entry < 0 {
            return Err(Error::InvalidAmount);
        }

        manager.require_auth();

        env.storage().instance().set(&DataKey::Manager, &manager);
        env.storage().instance().set(&DataKey::Token, &token);
        env.storage().instance().set(&DataKey::MinEntry, &min_entry);
        env.storage().instance().set(&DataKey::Entropy, &entropy);

        set_persistent(&env, &DataKey::Round, &FIRST_ROUND);
        reset_round(&env);

        Initialized { manager, token, min_entry }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // enter
    // -----------------------------------------------------------------------

    /// Deposit `value` tokens from `caller` and register one entry.
    ///
    /// Anyone may enter, including the manager, and the same address may
    /// enter any number of times; each call adds one position to the list.
    pub fn enter(env: Env, caller: Address, value: i128) -> Result<(), Error> {
        require_initialized(&env)?;

        if value < load_min_entry(&env)? {
            return Err(Error::InsufficientEntry);
        }

        caller.require_auth();

        let escrow = load_escrow(&env)
            .checked_add(value)
            .ok_or(Error::Overflow)?;
        let mut participants = load_participants(&env);
        if participants.len() >= MAX_PARTICIPANTS {
            return Err(Error::RoundFull);
        }
        participants.push_back(caller.clone());

        if value > 0 {
            let token = load_token(&env)?;
            TokenClient::new(&env, &token).transfer(
                &caller,
                env.current_contract_address(),
                &value,
            );
        }

        set_persistent(&env, &DataKey::Escrow, &escrow);
        set_persistent(&env, &DataKey::Participants, &participants);

        Entered {
            round: load_round(&env),
            participant: caller,
            value,
            escrow,
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // distribute_prize
    // -----------------------------------------------------------------------

    /// Pick a winner, pay out the whole escrow and open the next round.
    /// Manager only.
    ///
    /// `caller` must sign the invocation; an unsigned call fails in the host
    /// auth check before the manager comparison can return `NotAuthorized`.
    ///
    /// Round state is cleared before the token transfer. If the transfer
    /// fails the invocation aborts and the clear is rolled back with it, so
    /// escrow and participants are never observed reset without a payout.
    pub fn distribute_prize(env: Env, caller: Address) -> Result<RoundResult, Error> {
        require_initialized(&env)?;
        require_manager(&env, &caller)?;

        let participants = load_participants(&env);
        let count = participants.len();
        if count == 0 {
            return Err(Error::NoParticipants);
        }

        let round = load_round(&env);
        let seed = draw_seed(&env, round, &participants)?;
        let winner = participants
            .get(index_from_seed(&seed, count))
            .ok_or(Error::NoParticipants)?;
        let prize = load_escrow(&env);
        let next_round = round.checked_add(1).ok_or(Error::Overflow)?;

        let result = RoundResult {
            round,
            winner: winner.clone(),
            prize,
            participant_count: count,
            ledger: env.ledger().sequence(),
        };

        set_persistent(&env, &DataKey::RoundResult(round), &result);
        set_persistent(&env, &DataKey::Round, &next_round);
        reset_round(&env);

        if prize > 0 {
            let token = load_token(&env)?;
            TokenClient::new(&env, &token).transfer(
                &env.current_contract_address(),
                &winner,
                &prize,
            );
        }

        PrizeDistributed {
            round,
            winner,
            prize,
            participant_count: count,
        }
        .publish(&env);

        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Entries of the open round in the order they were made.
    pub fn get_participants(env: Env) -> Result<Vec<Address>, Error> {
        require_initialized(&env)?;
        Ok(load_participants(&env))
    }

    /// Tokens held for the open round.
    pub fn get_escrow(env: Env) -> Result<i128, Error> {
        require_initialized(&env)?;
        Ok(load_escrow(&env))
    }

    pub fn get_manager(env: Env) -> Result<Address, Error> {
        load_manager(&env)
    }

    pub fn get_min_entry(env: Env) -> Result<i128, Error> {
        load_min_entry(&env)
    }

    pub fn get_config(env: Env) -> Result<LotteryConfig, Error> {
        Ok(LotteryConfig {
            manager: load_manager(&env)?,
            token: load_token(&env)?,
            min_entry: load_min_entry(&env)?,
            entropy: load_entropy(&env)?,
        })
    }

    /// Number of the round currently accepting entries.
    pub fn get_round(env: Env) -> Result<u64, Error> {
        require_initialized(&env)?;
        Ok(load_round(&env))
    }

    /// Outcome of a settled round.
    pub fn get_round_result(env: Env, round: u64) -> Result<RoundResult, Error> {
        require_initialized(&env)?;
        env.storage()
            .persistent()
            .get(&DataKey::RoundResult(round))
            .ok_or(Error::RoundNotFound)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_initialized(env: &Env) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Manager) {
        return Err(Error::NotInitialized);
    }
    Ok(())
}

/// Verify that `caller` is the stored manager and has signed the invocation.
fn require_manager(env: &Env, caller: &Address) -> Result<(), Error> {
    let manager = load_manager(env)?;
    caller.require_auth();
    if caller != &manager {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

fn draw_seed(env: &Env, round: u64, participants: &Vec<Address>) -> Result<BytesN<32>, Error> {
    match load_entropy(env)? {
        EntropySource::Ledger => Ok(ledger_seed(env, participants)),
        EntropySource::Provider(provider) => {
            Ok(EntropyProviderClient::new(env, &provider).entropy(&round))
        }
    }
}

fn load_manager(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Manager)
        .ok_or(Error::NotInitialized)
}

fn load_token(env: &Env) -> Result<Address, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Token)
        .ok_or(Error::NotInitialized)
}

fn load_min_entry(env: &Env) -> Result<i128, Error> {
    env.storage()
        .instance()
        .get(&DataKey::MinEntry)
        .ok_or(Error::NotInitialized)
}

fn load_entropy(env: &Env) -> Result<EntropySource, Error> {
    env.storage()
        .instance()
        .get(&DataKey::Entropy)
        .ok_or(Error::NotInitialized)
}

fn load_participants(env: &Env) -> Vec<Address> {
    env.storage()
        .persistent()
        .get(&DataKey::Participants)
        .unwrap_or_else(|| Vec::new(env))
}

fn load_escrow(env: &Env) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::Escrow)
        .unwrap_or(0)
}

fn load_round(env: &Env) -> u64 {
    env.storage()
        .persistent()
        .get(&DataKey::Round)
        .unwrap_or(FIRST_ROUND)
}

/// Clear participants and escrow together.
fn reset_round(env: &Env) {
    set_persistent(env, &DataKey::Participants, &Vec::<Address>::new(env));
    set_persistent(env, &DataKey::Escrow, &0i128);
}

/// Write a value to persistent storage and extend its TTL in one step.
fn set_persistent<V: IntoVal<Env, Val>>(env: &Env, key: &DataKey, value: &V) {
    env.storage().persistent().set(key, value);
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}
