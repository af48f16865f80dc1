use serde::{Deserialize, Serialize};

/// Post-process switches that wireframe mode suspends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEffects {
    pub fog: bool,
    pub anti_aliasing: bool,
}

/// While in wireframe the fog and AA passes would hide the lines, so they
/// are forced off and the user's choice lives in `saved` until wireframe
/// is left again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Normal { effects: PostEffects },
    Wireframe { saved: PostEffects },
}

impl Default for RenderMode {
    fn default() -> Self {
        RenderMode::Normal {
            effects: PostEffects::default(),
        }
    }
}

/// Per-frame feature switches read by the frame planner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureToggles {
    pub use_shadow: bool,
    pub render_water: bool,
    pub use_lighting: bool,
    pub show_ground: bool,
    pub hide_ground_in_water_passes: bool,
    mode: RenderMode,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            use_shadow: false,
            render_water: false,
            use_lighting: true,
            show_ground: true,
            hide_ground_in_water_passes: false,
            mode: RenderMode::default(),
        }
    }
}

impl FeatureToggles {
    pub fn with_effects(mut self, effects: PostEffects) -> Self {
        self.mode = RenderMode::Normal { effects };
        self
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn is_wireframe(&self) -> bool {
        matches!(self.mode, RenderMode::Wireframe { .. })
    }

    /// Effects that actually run this frame.
    pub fn effects(&self) -> PostEffects {
        match self.mode {
            RenderMode::Normal { effects } => effects,
            RenderMode::Wireframe { .. } => PostEffects::default(),
        }
    }

    pub fn render_fog(&self) -> bool {
        self.effects().fog
    }

    pub fn use_anti_aliasing(&self) -> bool {
        self.effects().anti_aliasing
    }

    pub fn set_wireframe(&mut self, enabled: bool) {
        self.mode = match (self.mode, enabled) {
            (RenderMode::Normal { effects }, true) => RenderMode::Wireframe { saved: effects },
            (RenderMode::Wireframe { saved }, false) => RenderMode::Normal { effects: saved },
            (mode, _) => mode,
        };
    }

    pub fn toggle_wireframe(&mut self) {
        self.set_wireframe(!self.is_wireframe());
    }

    /// In wireframe mode this only updates the value restored on exit.
    pub fn set_fog(&mut self, enabled: bool) {
        self.stored_effects_mut().fog = enabled;
    }

    /// In wireframe mode this only updates the value restored on exit.
    pub fn set_anti_aliasing(&mut self, enabled: bool) {
        self.stored_effects_mut().anti_aliasing = enabled;
    }

    pub fn toggle_fog(&mut self) {
        let current = self.stored_effects().fog;
        self.set_fog(!current);
    }

    pub fn toggle_anti_aliasing(&mut self) {
        let current = self.stored_effects().anti_aliasing;
        self.set_anti_aliasing(!current);
    }

    fn stored_effects(&self) -> PostEffects {
        match self.mode {
            RenderMode::Normal { effects } => effects,
            RenderMode::Wireframe { saved } => saved,
        }
    }

    fn stored_effects_mut(&mut self) -> &mut PostEffects {
        match &mut self.mode {
            RenderMode::Normal { effects } => effects,
            RenderMode::Wireframe { saved } => saved,
        }
    }
}
