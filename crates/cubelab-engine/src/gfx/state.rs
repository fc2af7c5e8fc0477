use std::collections::HashSet;

use crate::renderer::VertexLayout;

use super::uniform::{UniformStorage, UniformWriteError};
use super::{BufferId, ProgramId, Released, TextureId, UniformLocation, UniformValue, VertexArrayId};

/// Number of texture units tracked by the draw state.
pub const TEXTURE_UNITS: u32 = 4;

/// GL-style binding state shared by the backends.
///
/// Bindings are plain handles; a handle released through the queue is
/// unbound by `forget` so no draw can reference a freed resource.
#[derive(Debug, Default)]
pub(crate) struct DrawState {
    active_unit: u32,
    units: [Option<TextureId>; TEXTURE_UNITS as usize],
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
}

impl DrawState {
    /// Returns `false` (and keeps the previous unit) if `unit` is out of range.
    pub(crate) fn set_active_unit(&mut self, unit: u32) -> bool {
        if unit >= TEXTURE_UNITS {
            return false;
        }
        self.active_unit = unit;
        true
    }

    pub(crate) fn active_unit(&self) -> u32 {
        self.active_unit
    }

    pub(crate) fn bind_texture(&mut self, texture: TextureId) {
        self.units[self.active_unit as usize] = Some(texture);
    }

    pub(crate) fn texture(&self, unit: u32) -> Option<TextureId> {
        self.units.get(unit as usize).copied().flatten()
    }

    pub(crate) fn use_program(&mut self, program: ProgramId) {
        self.program = Some(program);
    }

    pub(crate) fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub(crate) fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_array = Some(vertex_array);
    }

    pub(crate) fn vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array
    }

    pub(crate) fn forget(&mut self, released: Released) {
        match released {
            Released::Program(id) => {
                if self.program == Some(id) {
                    self.program = None;
                }
            }
            Released::Texture(id) => {
                for unit in self.units.iter_mut().filter(|u| **u == Some(id)) {
                    *unit = None;
                }
            }
            Released::VertexArray(id) => {
                if self.vertex_array == Some(id) {
                    self.vertex_array = None;
                }
            }
            Released::Buffer(_) => {}
        }
    }
}

/// Logs each distinct misuse once.
#[derive(Debug, Default)]
pub(crate) struct WarnOnce(HashSet<String>);

impl WarnOnce {
    pub(crate) fn warn(&mut self, message: String) {
        if !self.0.contains(&message) {
            log::warn!("{message}");
            self.0.insert(message);
        }
    }
}

/// Writes `value` into the current program's uniform storage.
///
/// Rejected writes (no program in use, a location from another program, a
/// wrong value type) are reported once and otherwise ignored.
pub(crate) fn stage_uniform(
    current: Option<ProgramId>,
    storage: Option<&mut UniformStorage>,
    location: UniformLocation,
    value: UniformValue,
    warn: &mut WarnOnce,
) {
    if current != Some(location.program) {
        warn.warn(format!(
            "set_uniform: location belongs to {} but the current program is {}",
            location.program,
            current.map_or_else(|| "none".to_string(), |p| p.to_string())
        ));
        return;
    }
    let Some(storage) = storage else {
        warn.warn(format!("set_uniform: {} is not alive", location.program));
        return;
    };
    match storage.write(&location, &value) {
        Ok(()) => {}
        Err(UniformWriteError::TypeMismatch { expected, got }) => warn.warn(format!(
            "set_uniform: {} offset {} expects {expected:?}, got {got:?}",
            location.program, location.offset
        )),
        Err(UniformWriteError::OutOfBounds) => warn.warn(format!(
            "set_uniform: offset {} is outside the uniform block of {}",
            location.offset, location.program
        )),
    }
}

/// Resource lookups a backend answers for draw validation.
pub(crate) trait DrawTables {
    fn program_alive(&self, program: ProgramId) -> bool;

    fn vertex_array(&self, vertex_array: VertexArrayId) -> Option<(BufferId, VertexLayout)>;

    /// Whole vertices stored in `buffer` when read with `layout`.
    fn vertices_in(&self, buffer: BufferId, layout: &VertexLayout) -> u32;

    fn texture_alive(&self, texture: TextureId) -> bool;
}

/// Everything a validated `draw_arrays` reads.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct ResolvedDraw {
    pub(crate) program: ProgramId,
    pub(crate) vertex_array: VertexArrayId,
    pub(crate) buffer: BufferId,
    pub(crate) layout: VertexLayout,
    /// Texture on unit 0, `None` meaning the white default.
    pub(crate) texture: Option<TextureId>,
}

/// Checks the bound state for `draw_arrays(first, count)`.
///
/// The error is the warning the backend reports before dropping the draw.
pub(crate) fn resolve_draw(
    state: &DrawState,
    tables: &impl DrawTables,
    first: u32,
    count: u32,
) -> Result<ResolvedDraw, String> {
    let program = state
        .program()
        .ok_or_else(|| "draw_arrays: no program in use".to_string())?;
    if !tables.program_alive(program) {
        return Err(format!("draw_arrays: {program} is not alive"));
    }
    let vertex_array = state
        .vertex_array()
        .ok_or_else(|| "draw_arrays: no vertex array bound".to_string())?;
    let (buffer, layout) = tables
        .vertex_array(vertex_array)
        .ok_or_else(|| format!("draw_arrays: {vertex_array} is not alive"))?;
    let available = tables.vertices_in(buffer, &layout);
    let end = first.saturating_add(count);
    if end > available {
        return Err(format!(
            "draw_arrays: range {first}..{end} exceeds {available} vertices in {vertex_array}"
        ));
    }

    let texture = state.texture(0).filter(|t| tables.texture_alive(*t));
    Ok(ResolvedDraw { program, vertex_array, buffer, layout, texture })
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::num::NonZeroU32;

    use super::*;

    fn tex(raw: u32) -> TextureId {
        TextureId::from_raw(NonZeroU32::new(raw).unwrap())
    }

    fn raw(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[derive(Default)]
    struct Tables {
        programs: HashSet<ProgramId>,
        vertex_arrays: HashMap<VertexArrayId, (BufferId, VertexLayout)>,
        floats: HashMap<BufferId, u32>,
        textures: HashSet<TextureId>,
    }

    impl DrawTables for Tables {
        fn program_alive(&self, program: ProgramId) -> bool {
            self.programs.contains(&program)
        }

        fn vertex_array(&self, vertex_array: VertexArrayId) -> Option<(BufferId, VertexLayout)> {
            self.vertex_arrays.get(&vertex_array).copied()
        }

        fn vertices_in(&self, buffer: BufferId, layout: &VertexLayout) -> u32 {
            self.floats.get(&buffer).map_or(0, |f| f / layout.floats_per_vertex())
        }

        fn texture_alive(&self, texture: TextureId) -> bool {
            self.textures.contains(&texture)
        }
    }

    /// One program and one 3-vertex position-only array, all bound.
    fn bound() -> (DrawState, Tables) {
        let p = ProgramId::from_raw(raw(1));
        let va = VertexArrayId::from_raw(raw(2));
        let b = BufferId::from_raw(raw(3));
        let mut tables = Tables::default();
        tables.programs.insert(p);
        tables.vertex_arrays.insert(va, (b, VertexLayout::interleaved(3, 0).unwrap()));
        tables.floats.insert(b, 9);

        let mut state = DrawState::default();
        state.use_program(p);
        state.bind_vertex_array(va);
        (state, tables)
    }

    #[test]
    fn textures_bind_to_the_active_unit() {
        let mut s = DrawState::default();
        s.bind_texture(tex(1));
        assert!(s.set_active_unit(2));
        s.bind_texture(tex(2));

        assert_eq!(s.texture(0), Some(tex(1)));
        assert_eq!(s.texture(2), Some(tex(2)));
        assert_eq!(s.texture(1), None);
    }

    #[test]
    fn out_of_range_unit_is_refused() {
        let mut s = DrawState::default();
        assert!(!s.set_active_unit(TEXTURE_UNITS));
        assert_eq!(s.active_unit(), 0);
    }

    #[test]
    fn forgetting_a_texture_unbinds_every_unit_holding_it() {
        let mut s = DrawState::default();
        s.bind_texture(tex(5));
        s.set_active_unit(1);
        s.bind_texture(tex(5));

        s.forget(Released::Texture(tex(5)));
        assert_eq!(s.texture(0), None);
        assert_eq!(s.texture(1), None);
    }

    #[test]
    fn bound_draw_resolves_to_its_buffer_and_layout() {
        let (state, tables) = bound();
        let draw = resolve_draw(&state, &tables, 0, 3).unwrap();
        assert_eq!(draw.buffer, BufferId::from_raw(raw(3)));
        assert_eq!(draw.layout.floats_per_vertex(), 3);
        assert_eq!(draw.texture, None);
    }

    #[test]
    fn draw_without_program_or_vertex_array_is_refused() {
        let (_, tables) = bound();
        let err = resolve_draw(&DrawState::default(), &tables, 0, 3).unwrap_err();
        assert!(err.contains("no program"));

        let (mut state, tables) = bound();
        state.forget(Released::VertexArray(VertexArrayId::from_raw(raw(2))));
        let err = resolve_draw(&state, &tables, 0, 3).unwrap_err();
        assert!(err.contains("no vertex array"));
    }

    #[test]
    fn released_program_is_not_alive() {
        let (state, mut tables) = bound();
        tables.programs.clear();
        let err = resolve_draw(&state, &tables, 0, 3).unwrap_err();
        assert!(err.contains("is not alive"));
    }

    #[test]
    fn range_past_the_buffer_is_refused() {
        let (state, tables) = bound();
        let err = resolve_draw(&state, &tables, 1, 3).unwrap_err();
        assert!(err.contains("range 1..4 exceeds 3 vertices"));
        assert!(resolve_draw(&state, &tables, u32::MAX, 3).is_err());
    }

    #[test]
    fn dead_texture_falls_back_to_the_default() {
        let (mut state, mut tables) = bound();
        state.bind_texture(tex(7));
        assert_eq!(resolve_draw(&state, &tables, 0, 3).unwrap().texture, None);

        tables.textures.insert(tex(7));
        assert_eq!(resolve_draw(&state, &tables, 0, 3).unwrap().texture, Some(tex(7)));
    }
}
