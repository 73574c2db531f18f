//! Brainwriting Rotation — the pure rotation resolver.
//!
//! Brainwriting hands each participant's idea sheet to the next participant
//! every round. For a participant viewing round `r`, this module answers:
//! whose contribution sits at each prior round of the chain I am extending?
//!
//! The chain a participant sees at round `r` traces back to one *original
//! owner*: the participant `r - 1` rotation steps ahead of them in the
//! (host-excluded, ordered) participant list. Read top to bottom, the chain
//! walks backward through the rotation from that owner to the viewer's own
//! current, editable round.
//!
//! Everything here is pure and recomputed on every chain rebuild; equal
//! inputs always produce equal author sequences.

use brainwriting_core::error::EngineError;
use brainwriting_core::ids::{ParticipantName, SessionCode};

/// Index of the participant whose original round-1 sheet the viewer at
/// `my_index` is extending in `round`.
#[must_use]
pub fn original_owner_index(my_index: usize, round: u32, len: usize) -> usize {
    (my_index + (round as usize - 1)) % len
}

/// Index of the participant who authored round `k` of the chain owned by
/// `original_owner`.
///
/// Valid for `k ≥ 1`; at `k == round` this yields the viewer's own index.
#[must_use]
pub fn author_index_at(original_owner: usize, k: u32, len: usize) -> usize {
    let back = (k as usize - 1) % len;
    (original_owner + len - back) % len
}

/// Resolves the full author sequence for the chain a participant sees at
/// `round`: one author per round `1..=round`, the last being the participant
/// themself.
///
/// # Errors
///
/// Returns `EngineError::Validation` when `round` is zero, and
/// `EngineError::NotAParticipant` when `participants` is empty or does not
/// contain `me` — a data-consistency problem that must surface rather than
/// produce a garbage rotation.
pub fn chain_authors<'a>(
    session: &SessionCode,
    participants: &'a [ParticipantName],
    me: &ParticipantName,
    round: u32,
) -> Result<Vec<&'a ParticipantName>, EngineError> {
    if round == 0 {
        return Err(EngineError::Validation("round numbers are 1-based".into()));
    }
    let my_index = participants
        .iter()
        .position(|p| p == me)
        .ok_or_else(|| EngineError::NotAParticipant {
            session: session.clone(),
            participant: me.clone(),
        })?;

    let len = participants.len();
    let owner = original_owner_index(my_index, round, len);

    let mut authors = Vec::with_capacity(round as usize);
    for k in 1..round {
        authors.push(&participants[author_index_at(owner, k, len)]);
    }
    authors.push(&participants[my_index]);
    Ok(authors)
}
