use std::collections::HashMap;
use std::path::Path;

use optiflow_core::EngineError;

use crate::device::{Device, ProgramId, TextureId, MAX_TEXTURE_UNITS};
use crate::transform::Transform;

/// Uniform receiving the per-pass quad transform.
pub const MODEL_MATRIX: &str = "modelMatrix";

#[derive(Debug, Clone)]
pub struct ShaderSource {
    /// Program name; the software device resolves its kernel by this label.
    pub label: String,
    pub vert: String,
    pub frag: String,
    /// Optional human-friendly origin (path/label) for logs.
    pub origin: Option<String>,
}

/// The programs the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Passthrough,
    Gaussian,
    GradientTemporal,
    GradientSpatial,
    OpticalFlow,
    FlowPassthrough,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 6] = [
        ProgramKind::Passthrough,
        ProgramKind::Gaussian,
        ProgramKind::GradientTemporal,
        ProgramKind::GradientSpatial,
        ProgramKind::OpticalFlow,
        ProgramKind::FlowPassthrough,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProgramKind::Passthrough => "passthrough",
            ProgramKind::Gaussian => "gaussian",
            ProgramKind::GradientTemporal => "gradient_t",
            ProgramKind::GradientSpatial => "gradient_s",
            ProgramKind::OpticalFlow => "optical_flow",
            ProgramKind::FlowPassthrough => "passthrough_of",
        }
    }

    /// Sampler uniforms in texture-unit order.
    pub fn samplers(self) -> &'static [&'static str] {
        match self {
            ProgramKind::Passthrough | ProgramKind::Gaussian | ProgramKind::GradientSpatial => {
                &["scene"]
            }
            ProgramKind::GradientTemporal => &["scene", "scene_previous"],
            ProgramKind::OpticalFlow => &["gradient_t", "gradient_s_x", "gradient_s_y"],
            ProgramKind::FlowPassthrough => &["color_in", "data_in"],
        }
    }

    /// Whether the program takes `width`/`height` uniforms.
    pub fn takes_size(self) -> bool {
        matches!(
            self,
            ProgramKind::Gaussian | ProgramKind::GradientSpatial | ProgramKind::OpticalFlow
        )
    }

    /// Vertex stage file stem; most programs share the passthrough stage.
    pub fn vert_stem(self) -> &'static str {
        match self {
            ProgramKind::Gaussian => "gaussian",
            ProgramKind::OpticalFlow => "optical_flow",
            _ => "passthrough",
        }
    }

    pub fn frag_stem(self) -> &'static str {
        self.label()
    }

    pub fn bindings(self) -> BindingTable {
        BindingTable::new(self.samplers())
    }
}

/// Explicit sampler-name → texture-unit table.
///
/// Orchestration code names its inputs; the table turns them into unit order so
/// a reordered pass cannot silently feed a texture to the wrong sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTable {
    names: Vec<&'static str>,
}

impl BindingTable {
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            names: names.to_vec(),
        }
    }

    pub fn unit(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| *n == name).map(|i| i as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        self.names.iter().enumerate().map(|(i, n)| (*n, i as u32))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Orders named inputs by unit. Every sampler must be supplied exactly once.
    pub fn resolve(&self, inputs: &[(&str, TextureId)]) -> Result<Vec<TextureId>, EngineError> {
        let mut slots: Vec<Option<TextureId>> = vec![None; self.names.len()];
        for (name, tex) in inputs {
            let unit = self.unit(name).ok_or_else(|| {
                EngineError::Other(format!(
                    "input `{name}` has no sampler (expected one of {:?})",
                    self.names
                ))
            })? as usize;
            if slots[unit].replace(*tex).is_some() {
                return Err(EngineError::Other(format!("input `{name}` bound twice")));
            }
        }
        slots
            .into_iter()
            .zip(&self.names)
            .map(|(slot, name)| {
                slot.ok_or_else(|| EngineError::Other(format!("sampler `{name}` left unbound")))
            })
            .collect()
    }
}

/// A compiled program plus its binding table.
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    label: String,
    bindings: BindingTable,
}

impl ShaderProgram {
    /// Compiles `source` and writes each sampler uniform from `bindings`.
    pub fn compile(
        device: &mut dyn Device,
        source: &ShaderSource,
        bindings: BindingTable,
    ) -> Result<Self, EngineError> {
        if bindings.len() > MAX_TEXTURE_UNITS {
            return Err(EngineError::bounds(format!(
                "program `{}` declares {} samplers",
                source.label,
                bindings.len()
            )));
        }
        let id = device.compile_program(source)?;
        for (name, unit) in bindings.iter() {
            device.set_uniform_i32(id, name, unit as i32);
        }
        tracing::debug!(
            program = %source.label,
            origin = source.origin.as_deref().unwrap_or("-"),
            samplers = bindings.len(),
            "compiled program"
        );
        Ok(Self {
            id,
            label: source.label.clone(),
            bindings,
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn set_i32(&self, device: &mut dyn Device, name: &str, value: i32) {
        device.set_uniform_i32(self.id, name, value);
    }

    pub fn set_transform(&self, device: &mut dyn Device, transform: &Transform) {
        device.set_uniform_mat4(self.id, MODEL_MATRIX, &transform.to_matrix());
    }

    pub fn destroy(self, device: &mut dyn Device) {
        device.delete_program(self.id);
    }
}

/// Vertex/fragment sources for every [`ProgramKind`].
#[derive(Debug, Clone)]
pub struct ShaderSet {
    sources: HashMap<ProgramKind, ShaderSource>,
}

const BUILTIN_STAGES: [(&str, &str); 9] = [
    ("passthrough.vert", include_str!("../shaders/passthrough.vert")),
    ("passthrough.frag", include_str!("../shaders/passthrough.frag")),
    ("gaussian.vert", include_str!("../shaders/gaussian.vert")),
    ("gaussian.frag", include_str!("../shaders/gaussian.frag")),
    ("gradient_t.frag", include_str!("../shaders/gradient_t.frag")),
    ("gradient_s.frag", include_str!("../shaders/gradient_s.frag")),
    ("optical_flow.vert", include_str!("../shaders/optical_flow.vert")),
    ("optical_flow.frag", include_str!("../shaders/optical_flow.frag")),
    ("passthrough_of.frag", include_str!("../shaders/passthrough_of.frag")),
];

impl ShaderSet {
    /// The sources compiled into this crate.
    pub fn builtin() -> Self {
        let stage = |file: &str| -> String {
            BUILTIN_STAGES
                .iter()
                .find(|(name, _)| *name == file)
                .map(|(_, src)| src.to_string())
                .unwrap_or_default()
        };
        let sources = ProgramKind::ALL
            .iter()
            .map(|&kind| {
                let vert = format!("{}.vert", kind.vert_stem());
                let frag = format!("{}.frag", kind.frag_stem());
                let src = ShaderSource {
                    label: kind.label().to_string(),
                    vert: stage(&vert),
                    frag: stage(&frag),
                    origin: Some(format!("builtin:{vert}+{frag}")),
                };
                (kind, src)
            })
            .collect();
        Self { sources }
    }

    /// Reads `<stem>.vert` / `<stem>.frag` for every program from `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        let dir = dir.as_ref();
        let read = |file: String| -> Result<(String, String), EngineError> {
            let path = dir.join(&file);
            let text = std::fs::read_to_string(&path)
                .map_err(|source| EngineError::Io { path: path.clone(), source })?;
            Ok((text, path.display().to_string()))
        };

        let mut sources = HashMap::new();
        for kind in ProgramKind::ALL {
            let (vert, vert_path) = read(format!("{}.vert", kind.vert_stem()))?;
            let (frag, frag_path) = read(format!("{}.frag", kind.frag_stem()))?;
            sources.insert(
                kind,
                ShaderSource {
                    label: kind.label().to_string(),
                    vert,
                    frag,
                    origin: Some(format!("{vert_path}+{frag_path}")),
                },
            );
        }
        Ok(Self { sources })
    }

    pub fn get(&self, kind: ProgramKind) -> Result<&ShaderSource, EngineError> {
        self.sources
            .get(&kind)
            .ok_or_else(|| EngineError::Other(format!("no shader source for `{}`", kind.label())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_orders_inputs_by_unit() {
        let table = ProgramKind::OpticalFlow.bindings();
        let units = table
            .resolve(&[
                ("gradient_s_y", TextureId(3)),
                ("gradient_t", TextureId(1)),
                ("gradient_s_x", TextureId(2)),
            ])
            .unwrap();
        assert_eq!(units, vec![TextureId(1), TextureId(2), TextureId(3)]);
    }

    #[test]
    fn resolve_rejects_unknown_missing_and_duplicate_names() {
        let table = ProgramKind::GradientTemporal.bindings();

        let err = table.resolve(&[("scene", TextureId(0)), ("prev", TextureId(1))]);
        assert!(err.unwrap_err().to_string().contains("`prev`"));

        let err = table.resolve(&[("scene", TextureId(0))]);
        assert!(err.unwrap_err().to_string().contains("scene_previous"));

        let err = table.resolve(&[
            ("scene", TextureId(0)),
            ("scene", TextureId(1)),
            ("scene_previous", TextureId(2)),
        ]);
        assert!(err.unwrap_err().to_string().contains("twice"));
    }

    #[test]
    fn builtin_set_has_every_program() {
        let set = ShaderSet::builtin();
        for kind in ProgramKind::ALL {
            let src = set.get(kind).unwrap();
            assert_eq!(src.label, kind.label());
            assert!(src.vert.contains("modelMatrix"), "{}", kind.label());
            for sampler in kind.samplers() {
                assert!(src.frag.contains(sampler), "{} lacks {sampler}", kind.label());
            }
        }
    }

    #[test]
    fn from_dir_reports_the_missing_file() {
        let dir = std::env::temp_dir().join("optiflow_runtime_no_shaders");
        let _ = std::fs::create_dir_all(&dir);
        match ShaderSet::from_dir(&dir) {
            Err(EngineError::Io { path, .. }) => assert!(path.ends_with("passthrough.vert")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
