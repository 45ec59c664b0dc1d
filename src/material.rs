//! Immutable material descriptors supplied by the asset layer.
//!
//! The renderer never mutates a [`Material`]; it only reads the shader source
//! and parameters when a pipeline is built for the material's id.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use ahash::HashMap;
use regex::Regex;

use crate::id::MaterialId;
use crate::Color;

/// Vertex entry point every material shader must declare.
pub const VERTEX_ENTRY_POINT: &str = "vs_main";
/// Fragment entry point every material shader must declare.
pub const FRAGMENT_ENTRY_POINT: &str = "fs_main";

/// Built-in WGSL used by [`Material::standard`]. Positions are in target
/// pixels, converted to clip space with the viewport uniform.
pub const STANDARD_SHADER_WGSL: &str = r#"
struct Viewport {
    size: vec2<f32>,
    _padding: vec2<f32>,
};

struct MaterialParams {
    tint: vec4<f32>,
};

@group(0) @binding(0) var<uniform> viewport: Viewport;
@group(0) @binding(1) var<uniform> params: MaterialParams;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) color: vec4<f32>) -> VertexOutput {
    var out: VertexOutput;
    let ndc = vec2<f32>(
        2.0 * position.x / viewport.size.x - 1.0,
        1.0 - 2.0 * position.y / viewport.size.y,
    );
    out.position = vec4<f32>(ndc, 0.0, 1.0);
    out.color = color * params.tint;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum BlendMode {
    /// Straight-alpha source over destination.
    #[default]
    Alpha,
    /// Source replaces destination.
    Opaque,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialParams {
    /// Multiplied into every vertex color.
    pub tint: Color,
    pub blend: BlendMode,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            tint: Color::WHITE,
            blend: BlendMode::Alpha,
        }
    }
}

/// WGSL source with a debugging label.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSource {
    pub label: String,
    pub wgsl: Arc<str>,
}

fn block_comment_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"))
}

fn line_comment_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"//[^\n]*").expect("valid line comment regex"))
}

fn params_binding_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"@group\s*\(\s*0\s*\)\s*@binding\s*\(\s*1\s*\)")
            .expect("valid params binding regex")
    })
}

fn vertex_entry_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(&format!(r"@vertex\s+fn\s+{VERTEX_ENTRY_POINT}\s*\("))
            .expect("valid vertex entry point regex")
    })
}

fn fragment_entry_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(&format!(r"@fragment\s+fn\s+{FRAGMENT_ENTRY_POINT}\s*\("))
            .expect("valid fragment entry point regex")
    })
}

impl ShaderSource {
    pub fn new(label: impl Into<String>, wgsl: impl Into<Arc<str>>) -> Self {
        Self {
            label: label.into(),
            wgsl: wgsl.into(),
        }
    }

    pub fn standard() -> Self {
        Self::new("standard", STANDARD_SHADER_WGSL)
    }

    fn stripped(&self) -> String {
        let no_block = block_comment_regex().replace_all(&self.wgsl, "");
        let stripped: Cow<'_, str> = line_comment_regex().replace_all(&no_block, "");
        stripped.into_owned()
    }

    /// Checks that both entry points are declared outside comments.
    pub fn validate(&self) -> Result<(), String> {
        let stripped = self.stripped();
        let mut missing = Vec::new();
        if !vertex_entry_regex().is_match(&stripped) {
            missing.push(VERTEX_ENTRY_POINT);
        }
        if !fragment_entry_regex().is_match(&stripped) {
            missing.push(FRAGMENT_ENTRY_POINT);
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "shader '{}' is missing entry point(s): {}",
                self.label,
                missing.join(", ")
            ))
        }
    }

    /// Whether the shader reads the material params uniform at `@group(0) @binding(1)`.
    pub fn binds_material_params(&self) -> bool {
        params_binding_regex().is_match(&self.stripped())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    uid: MaterialId,
    shader: ShaderSource,
    params: MaterialParams,
}

impl Material {
    pub fn new(uid: MaterialId, shader: ShaderSource, params: MaterialParams) -> Self {
        Self {
            uid,
            shader,
            params,
        }
    }

    /// Material using the built-in shader.
    pub fn standard(uid: MaterialId, params: MaterialParams) -> Self {
        Self::new(uid, ShaderSource::standard(), params)
    }

    pub fn uid(&self) -> MaterialId {
        self.uid
    }

    pub fn shader(&self) -> &ShaderSource {
        &self.shader
    }

    pub fn params(&self) -> &MaterialParams {
        &self.params
    }
}

/// Lookup of materials by id, implemented by the asset layer.
pub trait MaterialSource {
    fn material(&self, uid: MaterialId) -> Option<Arc<Material>>;
}

/// In-memory [`MaterialSource`].
#[derive(Default, Clone)]
pub struct MaterialRegistry {
    materials: HashMap<MaterialId, Arc<Material>>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `material`, returning the material previously stored under its id.
    pub fn insert(&mut self, material: Material) -> Option<Arc<Material>> {
        self.materials.insert(material.uid(), Arc::new(material))
    }

    pub fn remove(&mut self, uid: MaterialId) -> Option<Arc<Material>> {
        self.materials.remove(&uid)
    }

    pub fn contains(&self, uid: MaterialId) -> bool {
        self.materials.contains_key(&uid)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl MaterialSource for MaterialRegistry {
    fn material(&self, uid: MaterialId) -> Option<Arc<Material>> {
        self.materials.get(&uid).cloned()
    }
}
