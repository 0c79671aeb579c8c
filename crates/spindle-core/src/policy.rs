//! Environment-adaptive capability policy.

/// Hardware model substring for the low-power controller head.
const LOW_POWER_MODEL: &str = "Pi 3";

/// Whether the 3D toolpath viewer should stay enabled.
///
/// Serving the panel locally from a Pi 3 head leaves no headroom for 3D
/// rendering, so the capability is switched off when the client addresses
/// a local host and the controller reports that board. An unreported
/// model changes nothing.
pub fn viewer3d_allowed(host: &str, model: Option<&str>) -> bool {
    !(host == "localhost" && model.is_some_and(|m| m.contains(LOW_POWER_MODEL)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_on_local_low_power_head() {
        assert!(!viewer3d_allowed("localhost", Some("Raspberry Pi 3 Model B+")));
    }

    #[test]
    fn remote_panel_keeps_viewer() {
        assert!(viewer3d_allowed("carve.local", Some("Raspberry Pi 3 Model B+")));
    }

    #[test]
    fn other_boards_keep_viewer() {
        assert!(viewer3d_allowed("localhost", Some("Raspberry Pi 4 Model B")));
        assert!(viewer3d_allowed("localhost", None));
    }
}
