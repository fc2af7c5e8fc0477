use std::fmt;

use super::ShaderError;

/// One programmable stage of a shader program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// A parsed and validated WGSL stage.
///
/// Only lives between `compile` and program creation; the backend compiles
/// the source again for its own target.
#[derive(Debug)]
pub struct CompiledStage {
    stage: ShaderStage,
    module: naga::Module,
    entry_index: usize,
}

impl CompiledStage {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.module.entry_points[self.entry_index].name
    }

    pub(crate) fn module(&self) -> &naga::Module {
        &self.module
    }

    pub(crate) fn entry(&self) -> &naga::EntryPoint {
        &self.module.entry_points[self.entry_index]
    }
}

/// Parses and validates one stage of WGSL source.
///
/// The entry point is the only one declared for `stage`, or the one named
/// `main` when there are several.
pub fn compile(stage: ShaderStage, source: &str) -> Result<CompiledStage, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compilation {
        stage,
        diagnostic: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator.validate(&module).map_err(|e| ShaderError::Compilation {
        stage,
        diagnostic: e.emit_to_string(source),
    })?;

    let entry_index = select_entry_point(&module, stage)?;
    log::debug!(
        "compiled {stage} stage, entry point `{}`",
        module.entry_points[entry_index].name
    );

    Ok(CompiledStage {
        stage,
        module,
        entry_index,
    })
}

fn select_entry_point(module: &naga::Module, stage: ShaderStage) -> Result<usize, ShaderError> {
    let candidates: Vec<usize> = module
        .entry_points
        .iter()
        .enumerate()
        .filter(|(_, ep)| ep.stage == stage.naga())
        .map(|(i, _)| i)
        .collect();

    match candidates.as_slice() {
        [] => Err(ShaderError::Compilation {
            stage,
            diagnostic: format!("no @{stage} entry point"),
        }),
        [only] => Ok(*only),
        many => many
            .iter()
            .copied()
            .find(|i| module.entry_points[*i].name == "main")
            .ok_or_else(|| ShaderError::Compilation {
                stage,
                diagnostic: format!(
                    "{} @{stage} entry points and none is named `main`",
                    many.len()
                ),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_entry_point_is_selected() {
        let src = "@vertex fn vs(@location(0) p: vec3<f32>) -> @builtin(position) vec4<f32> { return vec4<f32>(p, 1.0); }";
        let compiled = compile(ShaderStage::Vertex, src).unwrap();
        assert_eq!(compiled.entry_point(), "vs");
        assert_eq!(compiled.stage(), ShaderStage::Vertex);
    }

    #[test]
    fn main_wins_among_several() {
        let src = r#"
@vertex fn other() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }
@vertex fn main() -> @builtin(position) vec4<f32> { return vec4<f32>(1.0); }
"#;
        assert_eq!(compile(ShaderStage::Vertex, src).unwrap().entry_point(), "main");
    }

    #[test]
    fn ambiguous_entry_points_fail() {
        let src = r#"
@vertex fn a() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }
@vertex fn b() -> @builtin(position) vec4<f32> { return vec4<f32>(1.0); }
"#;
        assert!(matches!(
            compile(ShaderStage::Vertex, src),
            Err(ShaderError::Compilation { stage: ShaderStage::Vertex, .. })
        ));
    }

    #[test]
    fn wrong_stage_fails() {
        let src = "@fragment fn fs() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let err = compile(ShaderStage::Vertex, src).unwrap_err();
        assert!(err.to_string().contains("vertex"));
    }

    #[test]
    fn syntax_error_reports_stage_and_diagnostic() {
        let src = "@fragment fn fs() -> @location(0) vec4<f32> { return vec4<f32>(1.0) }";
        match compile(ShaderStage::Fragment, src) {
            Err(ShaderError::Compilation { stage, diagnostic }) => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!diagnostic.is_empty());
            }
            other => panic!("expected compilation error, got {other:?}"),
        }
    }

    #[test]
    fn type_error_is_caught_by_validation() {
        let src = "@fragment fn fs() -> @location(0) vec4<f32> { let x: f32 = 1u; return vec4<f32>(x); }";
        assert!(matches!(
            compile(ShaderStage::Fragment, src),
            Err(ShaderError::Compilation { .. })
        ));
    }
}
