use crate::models::follow::FollowStatus;

/// The single access rule for momentum, goals and activity history: owners
/// always see everything, public profiles are open, private profiles require
/// an accepted follow. Everyone else gets the public envelope only.
pub fn can_view_full(
    viewer_is_owner: bool,
    profile_is_public: bool,
    viewer_follow: Option<FollowStatus>,
) -> bool {
    viewer_is_owner
        || profile_is_public
        || matches!(viewer_follow, Some(FollowStatus::Accepted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_always_has_access() {
        assert!(can_view_full(true, false, None));
    }

    #[test]
    fn public_profiles_are_open() {
        assert!(can_view_full(false, true, None));
    }

    #[test]
    fn private_requires_accepted_follow() {
        assert!(!can_view_full(false, false, None));
        assert!(!can_view_full(false, false, Some(FollowStatus::Pending)));
        assert!(can_view_full(false, false, Some(FollowStatus::Accepted)));
    }
}
