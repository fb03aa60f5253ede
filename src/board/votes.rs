//! Vote containers: one vote per identity per target.
//!
//! Thread and post votes share one algorithm, parameterized by the container
//! type. Each mutation is one read-modify-replace cycle on the board root;
//! callers hold the board lock around it.
//!
//! Removal swaps the matched slot with the last one and truncates, so vote
//! order is insertion order only until the first removal.

use crate::board::object::BoardObject;
use crate::board::types::{PostVotesContainer, ThreadVotesContainer, Vote, VoteRefs};
use crate::error::{PqbbsError, Result};
use crate::graph::{ContainerHandle, Cursor, Identity, Reference, RootSnapshot, Typed};
use tracing::{debug, trace};

/// A container mapping targets to their vote lists.
pub trait VotesContainer: Typed<BoardObject> {
    /// "thread" or "post", for logs and errors.
    const SCOPE: &'static str;

    fn entries(&self) -> &[VoteRefs];

    fn entries_mut(&mut self) -> &mut Vec<VoteRefs>;

    /// Vote references held for `target`, empty if it has no entry.
    fn votes_for(&self, target: &Reference) -> &[Reference] {
        self.entries()
            .iter()
            .find(|e| &e.target == target)
            .map(|e| e.votes.as_slice())
            .unwrap_or(&[])
    }

    /// Vote list for `target`, appending an empty entry if there is none.
    fn votes_for_mut(&mut self, target: Reference) -> &mut Vec<Reference> {
        let entries = self.entries_mut();
        let index = match entries.iter().position(|e| e.target == target) {
            Some(index) => index,
            None => {
                entries.push(VoteRefs::new(target));
                entries.len() - 1
            }
        };
        &mut entries[index].votes
    }

    /// Vote list for `target`, without creating one.
    fn existing_votes_mut(&mut self, target: &Reference) -> Option<&mut Vec<Reference>> {
        self.entries_mut()
            .iter_mut()
            .find(|e| &e.target == target)
            .map(|e| &mut e.votes)
    }
}

impl VotesContainer for ThreadVotesContainer {
    const SCOPE: &'static str = "thread";

    fn entries(&self) -> &[VoteRefs] {
        &self.entries
    }

    fn entries_mut(&mut self) -> &mut Vec<VoteRefs> {
        &mut self.entries
    }
}

impl VotesContainer for PostVotesContainer {
    const SCOPE: &'static str = "post";

    fn entries(&self) -> &[VoteRefs] {
        &self.entries
    }

    fn entries_mut(&mut self) -> &mut Vec<VoteRefs> {
        &mut self.entries
    }
}

/// Index of the first vote in `votes` cast by `voter`.
fn position_of_voter(
    cursor: &Cursor<'_, BoardObject>,
    votes: &[Reference],
    voter: &Identity,
) -> Result<Option<usize>> {
    for (index, reference) in votes.iter().enumerate() {
        let vote: Vote = cursor
            .deserialize(reference)
            .map_err(|e| PqbbsError::corrupt(format!("vote {}", reference.short()), e))?;
        if &vote.voter == voter {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn find_container<C: VotesContainer>(
    cursor: &Cursor<'_, BoardObject>,
) -> Result<ContainerHandle<C>> {
    cursor.advance(|_: &C| true).map_err(|e| match e {
        PqbbsError::NotFound(_) => e,
        other => PqbbsError::corrupt(format!("{} votes container", C::SCOPE), other),
    })
}

/// Stores `vote` and records it for `target`, replacing the voter's earlier
/// vote if there is one.
pub(crate) fn add_vote<C: VotesContainer>(
    cursor: &mut Cursor<'_, BoardObject>,
    target: Reference,
    vote: Vote,
) -> Result<RootSnapshot> {
    let mut container = find_container::<C>(cursor)?;
    let existing = position_of_voter(cursor, container.votes_for(&target), &vote.voter)?;

    let vote_ref = cursor.save(&vote)?;
    let votes = container.votes_for_mut(target);
    match existing {
        Some(index) => votes[index] = vote_ref,
        None => votes.push(vote_ref),
    }
    trace!(
        scope = C::SCOPE,
        target = %target.short(),
        voter = %vote.voter.short(),
        replaced = existing.is_some(),
        "vote recorded"
    );

    let root = cursor.replace_current(container)?;
    debug!(
        board = %root.identity(),
        seq = root.seq(),
        scope = C::SCOPE,
        target = %target.short(),
        "vote added"
    );
    Ok(root)
}

/// Removes `voter`'s vote on `target`.
///
/// Returns `None` without touching the root if the voter has no vote there.
pub(crate) fn remove_vote<C: VotesContainer>(
    cursor: &mut Cursor<'_, BoardObject>,
    voter: &Identity,
    target: &Reference,
) -> Result<Option<RootSnapshot>> {
    let mut container = find_container::<C>(cursor)?;
    let Some(index) = position_of_voter(cursor, container.votes_for(target), voter)? else {
        trace!(
            scope = C::SCOPE,
            target = %target.short(),
            voter = %voter.short(),
            "no vote to remove"
        );
        return Ok(None);
    };

    if let Some(votes) = container.existing_votes_mut(target) {
        votes.swap_remove(index);
    }

    let root = cursor.replace_current(container)?;
    debug!(
        board = %root.identity(),
        seq = root.seq(),
        scope = C::SCOPE,
        target = %target.short(),
        "vote removed"
    );
    Ok(Some(root))
}

/// Resolves the votes recorded for `target` at the cursor's root.
pub(crate) fn list_votes<C: VotesContainer>(
    cursor: &Cursor<'_, BoardObject>,
    target: &Reference,
) -> Result<Vec<Vote>> {
    let container = find_container::<C>(cursor)?;
    container
        .votes_for(target)
        .iter()
        .map(|reference| {
            cursor
                .deserialize(reference)
                .map_err(|e| PqbbsError::corrupt(format!("vote {}", reference.short()), e))
        })
        .collect()
}
