/// Native calls issued while replaying one frame.
///
/// Each counter matches one [`GraphicsBackend`](crate::backend::GraphicsBackend)
/// call category, so a frame's cost can be read without a call log.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ReplayStats {
    /// Draw calls issued (indexed or not).
    pub draw_calls: u32,
    /// Touches processed: state and uniforms applied, nothing drawn.
    pub touches: u32,
    /// Render-state group transitions (depth write, depth test, color mask, blend, primitive).
    pub state_changes: u32,
    pub scissor_changes: u32,
    pub stencil_changes: u32,
    pub program_binds: u32,
    pub texture_binds: u32,
    pub vertex_binds: u32,
    pub index_binds: u32,
    pub uniform_writes: u32,
    /// Draws not issued because their program was inert or invalid.
    pub skipped_draws: u32,
    /// Handles that failed lookup during replay.
    pub invalid_handles: u32,
}

impl ReplayStats {
    /// Merge another frame's counts into this accumulator.
    pub fn accumulate(&mut self, other: &Self) {
        self.draw_calls += other.draw_calls;
        self.touches += other.touches;
        self.state_changes += other.state_changes;
        self.scissor_changes += other.scissor_changes;
        self.stencil_changes += other.stencil_changes;
        self.program_binds += other.program_binds;
        self.texture_binds += other.texture_binds;
        self.vertex_binds += other.vertex_binds;
        self.index_binds += other.index_binds;
        self.uniform_writes += other.uniform_writes;
        self.skipped_draws += other.skipped_draws;
        self.invalid_handles += other.invalid_handles;
    }

    /// Every native call except draws.
    pub fn total_binds(&self) -> u32 {
        self.state_changes
            + self.scissor_changes
            + self.stencil_changes
            + self.program_binds
            + self.texture_binds
            + self.vertex_binds
            + self.index_binds
            + self.uniform_writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_sums_fields() {
        let frame = ReplayStats {
            draw_calls: 3,
            program_binds: 1,
            skipped_draws: 2,
            ..Default::default()
        };
        let mut total = ReplayStats::default();
        total.accumulate(&frame);
        total.accumulate(&frame);
        assert_eq!(total.draw_calls, 6);
        assert_eq!(total.program_binds, 2);
        assert_eq!(total.skipped_draws, 4);
        assert_eq!(total.total_binds(), 2);
    }
}
