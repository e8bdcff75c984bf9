use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use super::{
	display::WindowSettings,
	shader::{ShaderSource, ShaderStage},
	uniform::UniformValue,
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// What to do when the configured shaders don't build at startup.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupPolicy {
	/// Run with the built-in fallback program until a recompile succeeds.
	#[default]
	Fallback,
	/// Refuse to start.
	Abort,
}

/// A widget of the debug panel, bound to one uniform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Control {
	Checkbox {
		label: String,
		uniform: String,
		value: bool,
	},
	Slider {
		label: String,
		uniform: String,
		value: f32,
		range: (f32, f32),
	},
	IntSlider {
		label: String,
		uniform: String,
		value: i32,
		range: (i32, i32),
	},
	Color {
		label: String,
		uniform: String,
		value: [f32; 3],
	},
}

/// Everything that makes one sandbox setup: the window, the shaders, the uniforms fed
/// every frame and the widgets of the panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
	pub window: WindowSettings,
	pub clear_color: [f32; 4],

	pub vertex_shader: PathBuf,
	/// The fragment shaders the panel can pick from.
	pub fragment_shaders: Vec<PathBuf>,
	pub selected_fragment: usize,

	/// Receives the frame counter.
	pub frame_uniform: Option<String>,
	/// Receives the elapsed time in seconds.
	pub time_uniform: Option<String>,
	/// Receive the cursor position in pixels.
	pub cursor_uniforms: Option<(String, String)>,
	/// Receive the surface size in pixels.
	pub resolution_uniforms: Option<(String, String)>,

	pub controls: Vec<Control>,

	pub on_startup_failure: StartupPolicy,
	pub show_ui: bool,
}

impl Default for SceneConfig {
	fn default() -> Self {
		let slider = |label: &str, uniform: &str, value| Control::Slider {
			label: label.into(),
			uniform: uniform.into(),
			value,
			range: (0.0, 1.0),
		};

		Self {
			window: WindowSettings::default(),
			clear_color: [0.0, 0.0, 0.0, 1.0],

			vertex_shader: "shaders/vertex.vert".into(),
			fragment_shaders: vec!["shaders/fragment.frag".into(), "shaders/pbr.frag".into()],
			selected_fragment: 0,

			frame_uniform: Some("u_time".into()),
			time_uniform: None,
			cursor_uniforms: Some(("u_mousePosX".into(), "u_mousePosY".into())),
			resolution_uniforms: Some(("u_resolutionX".into(), "u_resolutionY".into())),

			controls: vec![
				Control::Checkbox {
					label: "Mouse".into(),
					uniform: "u_mouseMove".into(),
					value: false,
				},
				Control::Color {
					label: "Albedo".into(),
					uniform: "u_albedo".into(),
					value: [0.0, 0.0, 1.0],
				},
				slider("Roughness", "u_roughness", 1.0),
				slider("Metallic", "u_metallic", 0.0),
				slider("Ambient", "u_ambient", 0.0),
			],

			on_startup_failure: StartupPolicy::Fallback,
			show_ui: true,
		}
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

impl Control {
	pub fn label(&self) -> &str {
		match self {
			Control::Checkbox { label, .. }
			| Control::Slider { label, .. }
			| Control::IntSlider { label, .. }
			| Control::Color { label, .. } => label,
		}
	}

	pub fn uniform(&self) -> &str {
		match self {
			Control::Checkbox { uniform, .. }
			| Control::Slider { uniform, .. }
			| Control::IntSlider { uniform, .. }
			| Control::Color { uniform, .. } => uniform,
		}
	}

	pub fn initial_value(&self) -> UniformValue {
		match *self {
			Control::Checkbox { value, .. } => UniformValue::Bool(value),
			Control::Slider { value, .. } => UniformValue::Float(value),
			Control::IntSlider { value, .. } => UniformValue::Int(value),
			Control::Color { value, .. } => UniformValue::Vec3(value),
		}
	}
}

impl SceneConfig {
	/// Load a scene file. Shader paths in it are relative to the file itself.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();

		let text = fs::read_to_string(path).with_context(|| format!("Couldn't read scene `{}`", path.display()))?;
		let mut scene = Self::from_ron(&text).with_context(|| format!("Invalid scene `{}`", path.display()))?;

		if let Some(base) = path.parent() {
			scene.rebase(base);
		}

		debug!("Loaded scene `{}`", path.display());
		Ok(scene)
	}

	pub fn from_ron(text: &str) -> Result<Self> {
		let scene: Self = ron::from_str(text)?;
		scene.validate()?;
		Ok(scene)
	}

	/// Resolve relative shader paths against `base`.
	pub fn rebase(&mut self, base: &Path) {
		self.vertex_shader = base.join(&self.vertex_shader);
		for fragment in &mut self.fragment_shaders {
			*fragment = base.join(&*fragment);
		}
	}

	pub fn validate(&self) -> Result<()> {
		ensure!(!self.fragment_shaders.is_empty(), "The scene lists no fragment shader");
		ensure!(
			self.selected_fragment < self.fragment_shaders.len(),
			"The selected fragment shader ({}) is out of range, there are {}",
			self.selected_fragment,
			self.fragment_shaders.len()
		);

		for control in &self.controls {
			let valid_range = match control {
				Control::Slider { range, .. } => range.0 < range.1,
				Control::IntSlider { range, .. } => range.0 < range.1,
				_ => true,
			};

			if !valid_range {
				bail!("The range of control `{}` is empty", control.label());
			}
		}

		Ok(())
	}

	pub fn vertex_source(&self) -> ShaderSource {
		ShaderSource::file(&self.vertex_shader, ShaderStage::Vertex)
	}

	pub fn fragment_source(&self, index: usize) -> Option<ShaderSource> {
		self.fragment_shaders
			.get(index)
			.map(|path| ShaderSource::file(path, ShaderStage::Fragment))
	}

	/// The fragment shader the scene starts with.
	pub fn initial_fragment_source(&self) -> ShaderSource {
		self.fragment_source(self.selected_fragment)
			.unwrap_or_else(|| ShaderSource::file(PathBuf::new(), ShaderStage::Fragment))
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_describe_the_pbr_preview() {
		let scene = SceneConfig::default();

		assert_eq!(scene.window.size, (1200, 650));
		assert_eq!(scene.window.title, "Hello, Window!");
		assert!(scene.validate().is_ok());

		let uniforms = scene.controls.iter().map(Control::uniform).collect::<Vec<_>>();
		assert_eq!(uniforms, ["u_mouseMove", "u_albedo", "u_roughness", "u_metallic", "u_ambient"]);
		assert_eq!(scene.controls[1].initial_value(), UniformValue::Vec3([0.0, 0.0, 1.0]));
	}

	#[test]
	fn scenes_parse_from_ron() {
		let scene = SceneConfig::from_ron(
			r#"(
				window: (title: "Gradient", size: (640, 480)),
				vertex_shader: "quad.vert",
				fragment_shaders: ["a.frag", "b.wgsl"],
				selected_fragment: 1,
				time_uniform: Some("u_seconds"),
				controls: [
					IntSlider(label: "Steps", uniform: "u_steps", value: 4, range: (1, 16)),
				],
				on_startup_failure: Abort,
			)"#,
		)
		.unwrap();

		assert_eq!(scene.window.size, (640, 480));
		assert_eq!(scene.on_startup_failure, StartupPolicy::Abort);
		assert_eq!(scene.time_uniform.as_deref(), Some("u_seconds"));
		assert_eq!(scene.initial_fragment_source().path(), Some(Path::new("b.wgsl")));
		assert_eq!(scene.controls[0].initial_value(), UniformValue::Int(4));
	}

	#[test]
	fn empty_fragment_lists_are_rejected() {
		let err = SceneConfig::from_ron("(fragment_shaders: [])").unwrap_err();
		assert!(err.to_string().contains("no fragment shader"), "{err}");
	}

	#[test]
	fn inverted_ranges_are_rejected() {
		let mut scene = SceneConfig::default();
		scene.controls.push(Control::Slider {
			label: "Backwards".into(),
			uniform: "u_backwards".into(),
			value: 0.5,
			range: (1.0, 0.0),
		});

		assert!(scene.validate().is_err());
	}

	#[test]
	fn shader_paths_are_relative_to_the_scene() {
		let mut scene = SceneConfig::default();
		scene.rebase(Path::new("scenes"));

		assert_eq!(scene.vertex_shader, Path::new("scenes/shaders/vertex.vert"));
		assert_eq!(scene.fragment_source(1).unwrap().path(), Some(Path::new("scenes/shaders/pbr.frag")));
	}

	#[test]
	fn shipped_scenes_are_valid() {
		for scene in ["scenes/pbr.ron", "scenes/basic.ron"] {
			let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(scene);
			let scene = SceneConfig::load(&path).unwrap();

			assert!(scene.vertex_shader.exists(), "{}", scene.vertex_shader.display());
			assert!(scene.fragment_shaders.iter().all(|path| path.exists()));
		}
	}
}
