/// Sentinel shown to non-owners when a logger hid their location.
pub const LOCATION_HIDDEN: &str = "Location Hidden";

/// Masks the location for viewers other than the owner.
pub fn visible_location(
    location_tag: Option<String>,
    location_is_hidden: bool,
    viewer_is_owner: bool,
) -> Option<String> {
    if location_is_hidden && !viewer_is_owner {
        location_tag.map(|_| LOCATION_HIDDEN.to_string())
    } else {
        location_tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_location_is_masked_for_others() {
        let tag = Some("Anytime Fitness (Buona Vista)".to_string());
        assert_eq!(
            visible_location(tag.clone(), true, false),
            Some(LOCATION_HIDDEN.to_string())
        );
        assert_eq!(visible_location(tag.clone(), true, true), tag);
    }

    #[test]
    fn absent_location_stays_absent_when_hidden() {
        assert_eq!(visible_location(None, true, false), None);
    }

    #[test]
    fn visible_location_passes_through() {
        let tag = Some("East Coast Park".to_string());
        assert_eq!(visible_location(tag.clone(), false, false), tag);
    }
}
