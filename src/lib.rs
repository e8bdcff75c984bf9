pub mod core;

pub use crate::core::{
	backend::{headless::HeadlessBackend, wgpu_backend::WgpuBackend, Backend},
	config::{Control, SceneConfig, StartupPolicy},
	display::{HeadlessSurface, Surface, WinitSurface},
	error::{SessionError, ShaderError},
	program::Program,
	quad::FullscreenQuad,
	session::{RenderSession, SessionState},
	shader::{CompiledStage, ShaderSource, ShaderStage},
	uniform::UniformValue,
};

use rust_embed::Embed;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Shaders shipped inside the binary.
#[derive(Embed)]
#[folder = "src/shader/"]
#[prefix = "/"]
pub struct ShaderAssets;

pub const FALLBACK_VERTEX: &str = "/fallback.vert";
pub const FALLBACK_FRAGMENT: &str = "/fallback.frag";
