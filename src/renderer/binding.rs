use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BindMode: u8 {
        const DRAW = 0b01;
        const READ = 0b10;
    }
}

/// Render targets the frame can write to. Offscreen slots keep their
/// identity across resizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetSlot {
    Screen,
    ShadowMap,
    WaterReflection,
    WaterRefraction,
    FogScene,
    AaScene,
}

impl TargetSlot {
    pub fn is_offscreen(self) -> bool {
        self != TargetSlot::Screen
    }

    pub fn is_depth_only(self) -> bool {
        self == TargetSlot::ShadowMap
    }

    pub fn label(self) -> &'static str {
        match self {
            TargetSlot::Screen => "Screen",
            TargetSlot::ShadowMap => "ShadowMap",
            TargetSlot::WaterReflection => "WaterReflection",
            TargetSlot::WaterRefraction => "WaterRefraction",
            TargetSlot::FogScene => "FogScene",
            TargetSlot::AaScene => "AaScene",
        }
    }
}

/// Tracks which target the encoder is currently writing to.
///
/// Only one target may be bound at a time. Binding over an active target
/// is a logic error in the frame executor and panics.
#[derive(Debug, Default)]
pub struct TargetBinder {
    bound: Option<(TargetSlot, BindMode)>,
    offscreen_binds: usize,
    history: Vec<TargetSlot>,
}

impl TargetBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, slot: TargetSlot, mode: BindMode) {
        if let Some((active, _)) = self.bound {
            assert!(
                !(active.is_depth_only() && slot.is_depth_only()),
                "depth-only pass on {} started while one is already running",
                slot.label()
            );
            panic!(
                "cannot bind {} while {} is still bound",
                slot.label(),
                active.label()
            );
        }
        assert!(!mode.is_empty(), "bind mode must include DRAW or READ");

        if slot.is_offscreen() {
            self.offscreen_binds += 1;
        }
        self.history.push(slot);
        self.bound = Some((slot, mode));
    }

    /// Returns to the screen.
    pub fn unbind(&mut self) {
        self.bound = None;
    }

    pub fn bound(&self) -> Option<TargetSlot> {
        self.bound.map(|(slot, _)| slot)
    }

    pub fn bound_mode(&self) -> Option<BindMode> {
        self.bound.map(|(_, mode)| mode)
    }

    pub fn offscreen_binds(&self) -> usize {
        self.offscreen_binds
    }

    pub fn history(&self) -> &[TargetSlot] {
        &self.history
    }

    /// Starts a new frame's bookkeeping. Panics if a pass was left open.
    pub fn begin_frame(&mut self) {
        assert!(
            self.bound.is_none(),
            "previous frame left {:?} bound",
            self.bound()
        );
        self.offscreen_binds = 0;
        self.history.clear();
    }
}
