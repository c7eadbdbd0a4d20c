use bitflags::bitflags;

bitflags! {
    /// State tags carried by an actor.
    ///
    /// Generators own two kinds of tags: a base tag held for as long as the
    /// generator controls the actor (`CHASE`, `FLEEING`, ...) and a `*_MOVE`
    /// tag held only while one of its splines is in flight. Combat and crowd
    /// control code set `ROOT`, `STUNNED` and friends from the outside.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct UnitState: u32 {
        const STUNNED        = 1 << 0;
        const ROOT           = 1 << 1;
        const DISTRACTED     = 1 << 2;
        const CONFUSED       = 1 << 3;
        const FLEEING        = 1 << 4;
        const CHASE          = 1 << 5;
        const FOLLOW         = 1 << 6;
        const ROAMING        = 1 << 7;
        const ROTATING       = 1 << 8;
        const EVADE          = 1 << 9;
        const ROAMING_MOVE   = 1 << 10;
        const CONFUSED_MOVE  = 1 << 11;
        const FLEEING_MOVE   = 1 << 12;
        const CHASE_MOVE     = 1 << 13;
        const FOLLOW_MOVE    = 1 << 14;

        /// Any spline-in-flight tag
        const MOVING = Self::ROAMING_MOVE.bits()
            | Self::CONFUSED_MOVE.bits()
            | Self::FLEEING_MOVE.bits()
            | Self::CHASE_MOVE.bits()
            | Self::FOLLOW_MOVE.bits();
        /// The actor cannot start a new movement
        const NOT_MOVE = Self::ROOT.bits() | Self::STUNNED.bits() | Self::DISTRACTED.bits();
        /// The actor is under a control-loss effect
        const LOST_CONTROL = Self::CONFUSED.bits() | Self::STUNNED.bits() | Self::FLEEING.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_covers_every_move_tag() {
        for tag in [
            UnitState::ROAMING_MOVE,
            UnitState::CONFUSED_MOVE,
            UnitState::FLEEING_MOVE,
            UnitState::CHASE_MOVE,
            UnitState::FOLLOW_MOVE,
        ] {
            assert!(UnitState::MOVING.contains(tag));
        }
        assert!(!UnitState::MOVING.intersects(UnitState::CHASE | UnitState::ROAMING));
    }

    #[test]
    fn test_clearing_moving_keeps_base_tags() {
        let mut state = UnitState::CHASE | UnitState::CHASE_MOVE;
        state.remove(UnitState::MOVING);
        assert_eq!(state, UnitState::CHASE);
    }
}
