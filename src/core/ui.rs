use egui::{ClippedPrimitive, Color32, Context, Key, PlatformOutput, RawInput, TexturesDelta};

use super::{
	config::{Control, SceneConfig},
	uniform::UniformValue,
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// The egui context of a session.
#[derive(Default)]
pub struct Gui {
	ctx: Context,
}

/// A finished UI pass, ready to be painted by a backend.
#[derive(Default)]
pub struct UiFrame {
	pub primitives: Vec<ClippedPrimitive>,
	pub textures_delta: TexturesDelta,
	pub pixels_per_point: f32,
}

impl Gui {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn context(&self) -> &Context {
		&self.ctx
	}

	pub fn begin(&mut self, input: RawInput) {
		self.ctx.begin_frame(input);
	}

	pub fn end(&mut self) -> (UiFrame, PlatformOutput) {
		let output = self.ctx.end_frame();
		let primitives = self.ctx.tessellate(output.shapes, output.pixels_per_point);

		let frame = UiFrame {
			primitives,
			textures_delta: output.textures_delta,
			pixels_per_point: output.pixels_per_point,
		};

		(frame, output.platform_output)
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// What the render loop knows about the current frame, and what the panel edits.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameState {
	pub frame: u64,
	pub elapsed: f32,
	pub fps: f32,
	pub cursor: (f64, f64),
	pub resolution: (u32, u32),
	/// One value per control of the scene, in the same order.
	pub values: Vec<UniformValue>,
	pub selected_fragment: usize,
}

impl FrameState {
	pub fn new(scene: &SceneConfig) -> Self {
		Self {
			frame: 0,
			elapsed: 0.0,
			fps: 0.0,
			cursor: (0.0, 0.0),
			resolution: scene.window.size,
			values: scene.controls.iter().map(Control::initial_value).collect(),
			selected_fragment: scene.selected_fragment,
		}
	}

	/// Every uniform the scene feeds this frame, built-ins first.
	pub fn uniforms<'a>(&'a self, scene: &'a SceneConfig) -> Vec<(&'a str, UniformValue)> {
		let mut uniforms = vec![];

		if let Some(name) = &scene.frame_uniform {
			// Wraps like the 32-bit counter shaders expect
			uniforms.push((name.as_str(), UniformValue::Int(self.frame as i32)));
		}
		if let Some(name) = &scene.time_uniform {
			uniforms.push((name.as_str(), UniformValue::Float(self.elapsed)));
		}
		if let Some((x, y)) = &scene.cursor_uniforms {
			uniforms.push((x.as_str(), UniformValue::Float(self.cursor.0 as f32)));
			uniforms.push((y.as_str(), UniformValue::Float(self.cursor.1 as f32)));
		}
		if let Some((x, y)) = &scene.resolution_uniforms {
			uniforms.push((x.as_str(), UniformValue::Float(self.resolution.0 as f32)));
			uniforms.push((y.as_str(), UniformValue::Float(self.resolution.1 as f32)));
		}

		uniforms.extend(
			scene
				.controls
				.iter()
				.zip(&self.values)
				.map(|(control, value)| (control.uniform(), *value)),
		);

		uniforms
	}
}

/// What the rest of the session should hear about the program.
#[derive(Copy, Clone, Debug, Default)]
pub struct PanelStatus<'a> {
	pub fallback: bool,
	pub last_error: Option<&'a str>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PanelResponse {
	/// The Compile button was clicked (or F5 pressed).
	pub recompile: bool,
	/// Another fragment shader was picked from the list.
	pub fragment_changed: bool,
}

/// Draw the debug panel: the Compile button, the fragment shader list and one widget per
/// control of the scene.
pub fn show_panel(ctx: &Context, scene: &SceneConfig, state: &mut FrameState, status: PanelStatus) -> PanelResponse {
	let mut response = PanelResponse {
		recompile: ctx.input(|input| input.key_pressed(Key::F5)),
		..Default::default()
	};

	egui::Window::new("Shader").resizable(false).show(ctx, |ui| {
		if ui.add_sized([100.0, 50.0], egui::Button::new("Compile")).clicked() {
			response.recompile = true;
		}

		ui.label("Fragment Shader File");
		let previous = state.selected_fragment;
		egui::Frame::group(ui.style()).show(ui, |ui| {
			for (index, path) in scene.fragment_shaders.iter().enumerate() {
				let name = path
					.file_name()
					.unwrap_or(path.as_os_str())
					.to_string_lossy()
					.into_owned();
				ui.selectable_value(&mut state.selected_fragment, index, name);
			}
		});
		response.fragment_changed = state.selected_fragment != previous;

		ui.separator();

		for (control, value) in scene.controls.iter().zip(state.values.iter_mut()) {
			match (control, value) {
				(Control::Checkbox { label, .. }, UniformValue::Bool(value)) => {
					ui.checkbox(value, label.as_str());
				}
				(Control::Slider { label, range, .. }, UniformValue::Float(value)) => {
					ui.add(egui::Slider::new(value, range.0..=range.1).text(label.as_str()));
				}
				(Control::IntSlider { label, range, .. }, UniformValue::Int(value)) => {
					ui.add(egui::Slider::new(value, range.0..=range.1).text(label.as_str()));
				}
				(Control::Color { label, .. }, UniformValue::Vec3(value)) => {
					// The picker round-trips through HSVA, only take its value on an actual edit
					let mut edited = *value;
					ui.horizontal(|ui| {
						if ui.color_edit_button_rgb(&mut edited).changed() {
							*value = edited;
						}
						ui.label(label.as_str());
					});
				}
				_ => {}
			}
		}

		ui.separator();
		ui.label(format!("{:.0} fps, frame {}", state.fps, state.frame));

		if status.fallback {
			ui.colored_label(Color32::YELLOW, "Running the built-in fallback shader");
		}

		if let Some(error) = status.last_error {
			ui.collapsing("Last compile error", |ui| {
				ui.colored_label(Color32::LIGHT_RED, egui::RichText::new(error).monospace());
			});
		}
	});

	response
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/
