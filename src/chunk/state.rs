//! The lifecycle state machine's shared framework: access-level
//! declarations, the request queue, and next-state resolution.
//!
//! This replaces the inheritance-based controller hierarchy the core was
//! modeled on (see `topo/controller/mod.rs`'s trait-object `ChunkState`)
//! with a tagged-variant enum (see [`ChunkState`] in `chunk::states`) plus
//! per-kind `const` descriptors, per the redesign notes this core carries.

use std::collections::VecDeque;

use crate::resource::Access;

/// Identifies a lifecycle state without carrying its payload, so requests
/// and transition decisions can name a target state without constructing
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Unloaded,
    Loading,
    Generating,
    Decorating,
    Saving,
    Hidden,
    Active,
    Used,
    Deactivating,
}

/// Static properties of a lifecycle state, looked up by [`StateKind`].
#[derive(Debug, Clone, Copy)]
pub struct StateDescriptor {
    pub core_access: Access,
    pub extended_access: Access,
    pub is_final: bool,
    pub allow_sharing_access: bool,
    pub allow_stealing: bool,
    pub wait_on_neighbors: bool,
}

impl StateKind {
    pub const fn descriptor(self) -> StateDescriptor {
        const fn d(
            core: Access,
            extended: Access,
            is_final: bool,
            sharing: bool,
            stealing: bool,
            wait: bool,
        ) -> StateDescriptor {
            StateDescriptor {
                core_access: core,
                extended_access: extended,
                is_final,
                allow_sharing_access: sharing,
                allow_stealing: stealing,
                wait_on_neighbors: wait,
            }
        }

        match self {
            StateKind::Unloaded => d(Access::None, Access::None, false, false, false, false),
            StateKind::Loading => d(Access::Write, Access::None, false, false, false, false),
            StateKind::Generating => d(Access::Write, Access::None, false, false, false, false),
            StateKind::Decorating => d(Access::Write, Access::Write, false, false, false, false),
            StateKind::Saving => d(Access::Read, Access::None, false, false, false, false),
            StateKind::Hidden => d(Access::Write, Access::Write, false, false, true, true),
            StateKind::Active => d(Access::Write, Access::Write, false, true, true, false),
            StateKind::Used => d(Access::None, Access::None, false, false, false, false),
            StateKind::Deactivating => d(Access::Read, Access::None, true, false, false, false),
        }
    }
}

/// Governs how a request is queued relative to what's already pending.
#[derive(Debug, Clone, Copy)]
pub struct RequestDescription {
    /// If false, a request is dropped when one of the same kind is already
    /// queued.
    pub allow_duplicate_by_type: bool,
    /// If true, this request is dropped outright while the chunk is
    /// deactivating.
    pub allow_skip_on_deactivation: bool,
    /// If true, this request is dropped if the current or next-required
    /// state is already of the same kind.
    pub allow_discard_on_repeat: bool,
}

impl RequestDescription {
    pub const DEFAULT: Self = Self {
        allow_duplicate_by_type: false,
        allow_skip_on_deactivation: false,
        allow_discard_on_repeat: true,
    };
}

impl Default for RequestDescription {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub kind: StateKind,
    pub desc: RequestDescription,
}

/// Describes how a state's declared next transition should be weighed
/// against queued requests and the chunk's requested/released status.
#[derive(Debug, Clone, Copy)]
pub struct TransitionDescription {
    pub prioritize_deactivation: bool,
    pub prioritize_loop: bool,
    /// If true, the declared next state must be honoured unless overridden
    /// by deactivation or loop priority (steps 1-2 of resolution).
    pub required: bool,
}

impl TransitionDescription {
    pub const REQUIRED: Self = Self {
        prioritize_deactivation: true,
        prioritize_loop: false,
        required: true,
    };

    pub const ALLOW: Self = Self {
        prioritize_deactivation: true,
        prioritize_loop: true,
        required: false,
    };
}

/// One lifecycle state's pending requests, shared across whichever
/// concrete state is currently active. Grounded on the resolution order in
/// `SPEC_FULL.md` §4.3.
#[derive(Debug, Default)]
pub struct RequestQueue {
    queue: VecDeque<Request>,
}

impl RequestQueue {
    pub fn push(&mut self, kind: StateKind, desc: RequestDescription, current: StateKind, next_required: Option<StateKind>, deactivating: bool) {
        if !desc.allow_duplicate_by_type && self.queue.iter().any(|r| r.kind == kind) {
            return;
        }
        if desc.allow_skip_on_deactivation && deactivating {
            return;
        }
        if desc.allow_discard_on_repeat && (current == kind || next_required == Some(kind)) {
            return;
        }
        self.queue.push_back(Request { kind, desc });
    }

    fn find_same_kind(&mut self, kind: StateKind) -> Option<Request> {
        let idx = self.queue.iter().position(|r| r.kind == kind)?;
        self.queue.remove(idx)
    }

    fn pop_front_allowed(&mut self, deactivating: bool) -> Option<Request> {
        let idx = self
            .queue
            .iter()
            .position(|r| !(deactivating && r.desc.allow_skip_on_deactivation))?;
        self.queue.remove(idx)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Resolves the next state per the six-step priority order: deactivation
/// priority, loop priority, required transitions, the queue, deactivation
/// fallback, and finally the declared next.
///
/// [Open question decision] when a declared transition sets both
/// `prioritize_deactivation` and `prioritize_loop` and both conditions
/// hold simultaneously, deactivation wins — see `DESIGN.md`.
pub fn choose_next(
    declared_next: StateKind,
    desc: TransitionDescription,
    queue: &mut RequestQueue,
    is_requested: bool,
    currently_deactivating: bool,
) -> StateKind {
    if desc.prioritize_deactivation && !is_requested {
        return queue
            .find_same_kind(StateKind::Deactivating)
            .map(|r| r.kind)
            .unwrap_or(StateKind::Deactivating);
    }

    if desc.prioritize_loop {
        if let Some(request) = queue.find_same_kind(declared_next) {
            return request.kind;
        }
    }

    if desc.required {
        return declared_next;
    }

    if let Some(request) = queue.pop_front_allowed(currently_deactivating) {
        return request.kind;
    }

    if !is_requested {
        return StateKind::Deactivating;
    }

    declared_next
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn required_transition_wins_absent_overrides() {
        let mut queue = RequestQueue::default();
        let next = choose_next(StateKind::Active, TransitionDescription::REQUIRED, &mut queue, true, false);
        assert_eq!(next, StateKind::Active);
    }

    #[test]
    fn deactivation_preempts_a_required_transition_when_unrequested() {
        let mut queue = RequestQueue::default();
        let next = choose_next(StateKind::Active, TransitionDescription::REQUIRED, &mut queue, false, false);
        assert_eq!(next, StateKind::Deactivating);
    }

    #[test]
    fn unrequested_allow_transition_falls_back_to_deactivating() {
        let mut queue = RequestQueue::default();
        let next = choose_next(StateKind::Hidden, TransitionDescription::ALLOW, &mut queue, false, false);
        assert_eq!(next, StateKind::Deactivating);
    }

    #[test]
    fn queued_request_overrides_an_allow_transition() {
        let mut queue = RequestQueue::default();
        queue.push(StateKind::Saving, RequestDescription::DEFAULT, StateKind::Active, None, false);
        let next = choose_next(StateKind::Hidden, TransitionDescription::ALLOW, &mut queue, true, false);
        assert_eq!(next, StateKind::Saving);
    }

    #[test]
    fn deactivation_wins_over_a_simultaneous_loop_priority_tie() {
        let mut queue = RequestQueue::default();
        queue.push(StateKind::Active, RequestDescription::DEFAULT, StateKind::Active, None, false);
        let desc = TransitionDescription {
            prioritize_deactivation: true,
            prioritize_loop: true,
            required: false,
        };
        let next = choose_next(StateKind::Active, desc, &mut queue, false, false);
        assert_eq!(next, StateKind::Deactivating);
    }

    #[test]
    fn duplicate_request_of_the_same_kind_is_dropped() {
        let mut queue = RequestQueue::default();
        queue.push(StateKind::Saving, RequestDescription::DEFAULT, StateKind::Active, None, false);
        queue.push(StateKind::Saving, RequestDescription::DEFAULT, StateKind::Active, None, false);
        assert_eq!(queue.queue.len(), 1);
    }
}
