/// Capability flags derived from one integer debug level.
///
/// Each level's effects are a strict superset of the previous level's:
/// level 1 draws the overlay, level 2 additionally persists it, level 3
/// additionally exports the transformed mesh and the reconstructed scene
/// cloud. Deriving the flags in one place keeps that contract enforceable
/// instead of scattering integer comparisons through the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugSinks {
    pub overlay: bool,
    pub persist_vis: bool,
    pub export_scene: bool,
}

impl DebugSinks {
    pub fn from_level(level: u8) -> Self {
        Self {
            overlay: level >= 1,
            persist_vis: level >= 2,
            export_scene: level >= 3,
        }
    }

    pub fn any(&self) -> bool {
        self.overlay || self.persist_vis || self.export_scene
    }
}
