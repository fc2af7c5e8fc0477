use std::collections::BTreeMap;

use naga::{AddressSpace, Binding, Handle, ScalarKind, Type, TypeInner};

use crate::gfx::{UniformBlock, UniformKind, UniformMember, MAX_UNIFORM_BLOCK_SIZE};

use super::stage::CompiledStage;
use super::ShaderError;

/// Scalar type of a `@location` value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScalarType {
    Float,
    Sint,
    Uint,
    Bool,
}

impl ScalarType {
    fn of(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Float | ScalarKind::AbstractFloat => Self::Float,
            ScalarKind::Sint | ScalarKind::AbstractInt => Self::Sint,
            ScalarKind::Uint => Self::Uint,
            ScalarKind::Bool => Self::Bool,
        }
    }

    fn wgsl(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Sint => "i32",
            Self::Uint => "u32",
            Self::Bool => "bool",
        }
    }
}

/// A vertex shader input read from a vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexInput {
    pub location: u32,
    pub components: u32,
    pub scalar: ScalarType,
}

/// Shape of one `@location` value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Slot {
    components: u32,
    scalar: ScalarType,
}

impl Slot {
    fn of(inner: &TypeInner) -> Self {
        match *inner {
            TypeInner::Vector { size, scalar } => {
                Self { components: size as u32, scalar: ScalarType::of(scalar.kind) }
            }
            TypeInner::Scalar(scalar) => Self { components: 1, scalar: ScalarType::of(scalar.kind) },
            _ => Self { components: 1, scalar: ScalarType::Float },
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.components {
            1 => f.write_str(self.scalar.wgsl()),
            n => write!(f, "vec{n}<{}>", self.scalar.wgsl()),
        }
    }
}

/// What a linked program reads and binds.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ProgramInterface {
    pub vertex_inputs: Vec<VertexInput>,
    pub uniforms: Option<UniformBlock>,
    pub samples_texture: bool,
}

impl ProgramInterface {
    pub fn uniform(&self, name: &str) -> Option<&UniformMember> {
        self.uniforms.as_ref()?.member(name)
    }
}

/// Cross-checks two compiled stages and merges what they declare.
pub(crate) fn link_interface(
    vertex: &CompiledStage,
    fragment: &CompiledStage,
) -> Result<ProgramInterface, ShaderError> {
    let outputs = result_locations(vertex.module(), vertex.entry());
    let inputs = argument_locations(fragment.module(), fragment.entry());
    for (location, read) in &inputs {
        match outputs.get(location) {
            None => {
                return Err(ShaderError::link(format!(
                    "fragment input @location({location}) is not written by the vertex stage"
                )));
            }
            Some(written) if written.components != read.components => {
                return Err(ShaderError::link(format!(
                    "@location({location}) is written with {} components but read with {}",
                    written.components, read.components
                )));
            }
            Some(written) if written.scalar != read.scalar => {
                return Err(ShaderError::link(format!(
                    "@location({location}) is written as {written} but read as {read}"
                )));
            }
            Some(_) => {}
        }
    }

    let vs_bindings = check_bindings(vertex)?;
    let fs_bindings = check_bindings(fragment)?;

    let uniforms = match (vs_bindings.uniforms, fs_bindings.uniforms) {
        (Some(a), Some(b)) if a != b => {
            return Err(ShaderError::link(
                "vertex and fragment stages declare different uniform blocks at @group(0) @binding(0)",
            ));
        }
        (a, b) => a.or(b),
    };

    let vertex_inputs = argument_locations(vertex.module(), vertex.entry())
        .into_iter()
        .map(|(location, slot)| VertexInput {
            location,
            components: slot.components,
            scalar: slot.scalar,
        })
        .collect();

    Ok(ProgramInterface {
        vertex_inputs,
        uniforms,
        samples_texture: vs_bindings.samples_texture || fs_bindings.samples_texture,
    })
}

#[derive(Default)]
struct StageBindings {
    uniforms: Option<UniformBlock>,
    samples_texture: bool,
}

fn check_bindings(stage: &CompiledStage) -> Result<StageBindings, ShaderError> {
    let module = stage.module();
    let mut out = StageBindings::default();

    for (_, global) in module.global_variables.iter() {
        let name = global.name.as_deref().unwrap_or("<unnamed>");
        let at = global.binding.as_ref().map(|b| (b.group, b.binding));
        match global.space {
            AddressSpace::Uniform => {
                if at != Some((0, 0)) {
                    return Err(ShaderError::link(format!(
                        "{} uniform `{name}` must be bound at @group(0) @binding(0)",
                        stage.stage()
                    )));
                }
                out.uniforms = Some(uniform_block(module, name, global.ty)?);
            }
            AddressSpace::Handle => match &module.types[global.ty].inner {
                TypeInner::Image { .. } => {
                    if at != Some((1, 0)) {
                        return Err(ShaderError::link(format!(
                            "texture `{name}` must be bound at @group(1) @binding(0)"
                        )));
                    }
                    out.samples_texture = true;
                }
                TypeInner::Sampler { .. } => {
                    if at != Some((1, 1)) {
                        return Err(ShaderError::link(format!(
                            "sampler `{name}` must be bound at @group(1) @binding(1)"
                        )));
                    }
                }
                _ => {
                    return Err(ShaderError::link(format!(
                        "unsupported resource `{name}`"
                    )));
                }
            },
            AddressSpace::Storage { .. } => {
                return Err(ShaderError::link(format!(
                    "storage buffer `{name}` is not supported"
                )));
            }
            _ => {}
        }
    }
    Ok(out)
}

fn uniform_block(
    module: &naga::Module,
    name: &str,
    ty: Handle<Type>,
) -> Result<UniformBlock, ShaderError> {
    let inner = &module.types[ty].inner;
    let size = inner.size(module.to_ctx());
    if size > MAX_UNIFORM_BLOCK_SIZE {
        return Err(ShaderError::link(format!(
            "uniform `{name}` is {size} bytes, limit is {MAX_UNIFORM_BLOCK_SIZE}"
        )));
    }

    let members = match inner {
        TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|m| {
                let kind = uniform_kind(&module.types[m.ty].inner)?;
                Some(UniformMember {
                    name: m.name.clone()?,
                    offset: m.offset,
                    kind,
                })
            })
            .collect(),
        other => uniform_kind(other)
            .map(|kind| UniformMember { name: name.to_string(), offset: 0, kind })
            .into_iter()
            .collect(),
    };
    Ok(UniformBlock::new(size, members))
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match *inner {
        TypeInner::Scalar(s) if s.width == 4 => match s.kind {
            ScalarKind::Float => Some(UniformKind::Float),
            ScalarKind::Sint => Some(UniformKind::Int),
            ScalarKind::Uint => Some(UniformKind::UInt),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float && scalar.width == 4 => {
            match size as u32 {
                2 => Some(UniformKind::Vec2),
                3 => Some(UniformKind::Vec3),
                4 => Some(UniformKind::Vec4),
                _ => None,
            }
        }
        TypeInner::Matrix { columns, rows, scalar }
            if scalar.kind == ScalarKind::Float && scalar.width == 4 && columns == rows =>
        {
            match columns as u32 {
                3 => Some(UniformKind::Mat3),
                4 => Some(UniformKind::Mat4),
                _ => None,
            }
        }
        _ => None,
    }
}

/// `@location` arguments of an entry point, flattening struct arguments.
fn argument_locations(module: &naga::Module, entry: &naga::EntryPoint) -> BTreeMap<u32, Slot> {
    let mut out = BTreeMap::new();
    for arg in &entry.function.arguments {
        collect_locations(module, arg.binding.as_ref(), arg.ty, &mut out);
    }
    out
}

/// `@location` outputs of an entry point's return value.
fn result_locations(module: &naga::Module, entry: &naga::EntryPoint) -> BTreeMap<u32, Slot> {
    let mut out = BTreeMap::new();
    if let Some(result) = &entry.function.result {
        collect_locations(module, result.binding.as_ref(), result.ty, &mut out);
    }
    out
}

fn collect_locations(
    module: &naga::Module,
    binding: Option<&Binding>,
    ty: Handle<Type>,
    out: &mut BTreeMap<u32, Slot>,
) {
    let inner = &module.types[ty].inner;
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.insert(*location, Slot::of(inner));
        }
        Some(_) => {}
        None => {
            if let TypeInner::Struct { members, .. } = inner {
                for m in members {
                    if let Some(Binding::Location { location, .. }) = &m.binding {
                        out.insert(*location, Slot::of(&module.types[m.ty].inner));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{compile, ShaderStage};

    const VS: &str = r#"
struct Globals {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    tint: vec3<f32>,
    time: f32,
};
@group(0) @binding(0) var<uniform> globals: Globals;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.clip = globals.projection * globals.view * globals.model * vec4<f32>(position, 1.0);
    out.uv = uv;
    return out;
}
"#;

    const FS: &str = r#"
@group(1) @binding(0) var tex: texture_2d<f32>;
@group(1) @binding(1) var samp: sampler;

@fragment
fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, uv);
}
"#;

    fn link(vs: &str, fs: &str) -> Result<ProgramInterface, ShaderError> {
        let vs = compile(ShaderStage::Vertex, vs)?;
        let fs = compile(ShaderStage::Fragment, fs)?;
        link_interface(&vs, &fs)
    }

    #[test]
    fn reflects_inputs_uniforms_and_texture() {
        let iface = link(VS, FS).unwrap();
        assert_eq!(
            iface.vertex_inputs,
            vec![
                VertexInput { location: 0, components: 3, scalar: ScalarType::Float },
                VertexInput { location: 1, components: 2, scalar: ScalarType::Float },
            ]
        );
        assert!(iface.samples_texture);

        let block = iface.uniforms.as_ref().unwrap();
        assert_eq!(block.size(), 208);
        assert_eq!(iface.uniform("view").map(|m| m.offset), Some(64));
        assert_eq!(iface.uniform("tint").map(|m| m.kind), Some(UniformKind::Vec3));
        assert_eq!(iface.uniform("time").map(|m| m.offset), Some(204));
    }

    #[test]
    fn unwritten_fragment_input_fails_link() {
        let fs = r#"
@fragment
fn main(@location(3) shade: f32) -> @location(0) vec4<f32> {
    return vec4<f32>(shade);
}
"#;
        let err = link(VS, fs).unwrap_err();
        assert!(matches!(err, ShaderError::Link { ref reason } if reason.contains("@location(3)")));
    }

    #[test]
    fn mismatched_component_count_fails_link() {
        let fs = r#"
@fragment
fn main(@location(0) uv: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 1.0);
}
"#;
        assert!(matches!(link(VS, fs), Err(ShaderError::Link { .. })));
    }

    #[test]
    fn mismatched_scalar_type_fails_link() {
        let vs = r#"
struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) shade: f32,
};

@vertex
fn main(@location(0) position: vec3<f32>) -> VsOut {
    return VsOut(vec4<f32>(position, 1.0), position.x);
}
"#;
        let fs = r#"
@fragment
fn main(@location(0) @interpolate(flat) shade: i32) -> @location(0) vec4<f32> {
    return vec4<f32>(f32(shade));
}
"#;
        let err = link(vs, fs).unwrap_err();
        assert!(
            matches!(err, ShaderError::Link { ref reason } if reason.contains("written as f32 but read as i32"))
        );
    }

    #[test]
    fn integer_vertex_inputs_are_reflected_as_such() {
        let vs = r#"
@vertex
fn main(@location(0) cell: vec3<i32>, @location(1) id: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(vec3<f32>(cell), f32(id));
}
"#;
        let fs = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let iface = link(vs, fs).unwrap();
        assert_eq!(
            iface.vertex_inputs,
            vec![
                VertexInput { location: 0, components: 3, scalar: ScalarType::Sint },
                VertexInput { location: 1, components: 1, scalar: ScalarType::Uint },
            ]
        );
    }

    #[test]
    fn texture_in_the_wrong_group_fails_link() {
        let fs = r#"
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(1) @binding(1) var samp: sampler;

@fragment
fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, uv);
}
"#;
        assert!(matches!(link(VS, fs), Err(ShaderError::Link { .. })));
    }

    #[test]
    fn single_value_uniform_is_named_after_the_global() {
        let vs = r#"
@group(0) @binding(0) var<uniform> mvp: mat4x4<f32>;

@vertex
fn main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return mvp * vec4<f32>(position, 1.0);
}
"#;
        let fs = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let iface = link(vs, fs).unwrap();
        assert_eq!(iface.uniform("mvp").map(|m| m.kind), Some(UniformKind::Mat4));
        assert!(!iface.samples_texture);
    }

    #[test]
    fn stages_disagreeing_on_uniforms_fail_link() {
        let fs = r#"
@group(0) @binding(0) var<uniform> brightness: f32;

@fragment
fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, brightness, 1.0);
}
"#;
        assert!(matches!(link(VS, fs), Err(ShaderError::Link { .. })));
    }

    #[test]
    fn oversized_uniform_block_fails_link() {
        let vs = r#"
struct Big { m: array<mat4x4<f32>, 5> };
@group(0) @binding(0) var<uniform> big: Big;

@vertex
fn main() -> @builtin(position) vec4<f32> {
    return big.m[0][0];
}
"#;
        let fs = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let err = link(vs, fs).unwrap_err();
        assert!(matches!(err, ShaderError::Link { ref reason } if reason.contains("320")));
    }
}
