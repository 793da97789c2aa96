//! The roster: who is in a lobby and where they are.
//!
//! Each member carries two transforms. `pending` is whatever the client
//! last reported; `committed` is what the rest of the lobby has been told.
//! On every tick the roster runs [`Roster::collect_changes`], which
//! promotes pending to committed for every member that moved and returns
//! the batch to broadcast.

use lobbyforge_protocol::{Inputs, NetworkPlayerInfo, PlayerData, PlayerId, Transform};

// ---------------------------------------------------------------------------
// MotionModel
// ---------------------------------------------------------------------------

/// Decides where a moving player actually ends up.
///
/// This is the hook for server-side physics. It receives the last
/// committed transform, the client's reported transform and its inputs.
pub trait MotionModel: Send + 'static {
    fn advance(&self, committed: &Transform, pending: &Transform, inputs: &Inputs) -> Transform;
}

/// Trusts the client: the reported transform becomes the committed one.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptPending;

impl MotionModel for AcceptPending {
    fn advance(&self, _committed: &Transform, pending: &Transform, _inputs: &Inputs) -> Transform {
        *pending
    }
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// Who is joining a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub player_id: PlayerId,
    pub name: String,
}

/// One player inside a lobby.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub player_id: PlayerId,
    pub name: String,
    pub committed: Transform,
    pub pending: Transform,
    pub inputs: Inputs,
}

impl Member {
    fn new(new: NewMember) -> Self {
        Self {
            player_id: new.player_id,
            name: new.name,
            committed: Transform::default(),
            pending: Transform::default(),
            inputs: Inputs::default(),
        }
    }

    /// A member is dirty when the client reported a transform the rest of
    /// the lobby hasn't seen yet.
    pub fn is_dirty(&self) -> bool {
        self.committed != self.pending
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Members in join order.
///
/// A `Vec` rather than a map: rosters are small and the join order is what
/// clients see in LobbyInfo.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.members.iter().any(|m| m.player_id == player_id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Member> {
        self.members.iter().find(|m| m.player_id == player_id)
    }

    /// Appends a member. Capacity is the caller's job.
    pub fn push(&mut self, new: NewMember) {
        self.members.push(Member::new(new));
    }

    /// Removes a member, returning it if it was present.
    pub fn remove(&mut self, player_id: PlayerId) -> Option<Member> {
        let index = self.members.iter().position(|m| m.player_id == player_id)?;
        Some(self.members.remove(index))
    }

    /// Records a client's reported transform and inputs.
    ///
    /// Returns `false` if the player isn't a member.
    pub fn set_pending(&mut self, player_id: PlayerId, transform: Transform, inputs: Inputs) -> bool {
        match self.members.iter_mut().find(|m| m.player_id == player_id) {
            Some(member) => {
                member.pending = transform;
                member.inputs = inputs;
                true
            }
            None => false,
        }
    }

    /// Commits every dirty member through `model` and returns what changed.
    ///
    /// The returned entries carry the newly committed transforms, in
    /// roster order.
    pub fn collect_changes(&mut self, model: &dyn MotionModel) -> Vec<PlayerData> {
        let mut changes = Vec::new();
        for member in self.members.iter_mut().filter(|m| m.is_dirty()) {
            member.committed = model.advance(&member.committed, &member.pending, &member.inputs);
            changes.push(PlayerData {
                id: member.player_id.0,
                transforms: member.committed,
                inputs: member.inputs,
            });
        }
        changes
    }

    /// Every member's ID, in join order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.members.iter().map(|m| m.player_id).collect()
    }

    /// The first member to have joined, if any.
    pub fn first(&self) -> Option<PlayerId> {
        self.members.first().map(|m| m.player_id)
    }

    /// The roster as clients see it in LobbyInfo and PlayerList.
    pub fn to_network(&self, host: PlayerId) -> Vec<NetworkPlayerInfo> {
        self.members
            .iter()
            .map(|m| NetworkPlayerInfo {
                id: m.player_id.0,
                name: m.name.clone(),
                cosmetics: Vec::new(),
                skin: String::new(),
                is_monster: false,
                is_host: m.player_id == host,
            })
            .collect()
    }
}
