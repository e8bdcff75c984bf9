use std::{collections::HashMap, sync::Arc};

use anyhow::{bail, Context, Result};
use egui_wgpu::{Renderer, ScreenDescriptor};
use image::RgbaImage;
use log::{debug, trace, warn};
use wgpu::{
	util::{BufferInitDescriptor, DeviceExt},
	BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
	BlendState, Buffer, BufferBindingType, BufferDescriptor, BufferUsages, Color, ColorTargetState, ColorWrites,
	CommandBuffer, CommandEncoder, CommandEncoderDescriptor, ErrorFilter, Extent3d, FragmentState, ImageCopyBuffer,
	ImageCopyTexture, ImageDataLayout, IndexFormat, LoadOp, Maintain, MapMode, MultisampleState, Operations, Origin3d,
	PipelineLayoutDescriptor, PrimitiveState, RenderPass, RenderPassColorAttachment, RenderPassDescriptor,
	RenderPipeline, RenderPipelineDescriptor, ShaderModule, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp,
	TextureAspect, TextureView, VertexBufferLayout, VertexState, VertexStepMode,
};
use winit::window::Window;

use super::{
	reflect::{self, ParsedStage},
	Backend, HandleAllocator, MeshHandle, ProgramHandle, ResourceCounts, StageHandle,
};
use crate::core::{
	gpu::Gpu,
	render_target::RenderTarget,
	shader::{ShaderLanguage, ShaderStage},
	ui::UiFrame,
	uniform::{UniformBlock, UniformLocation, UniformValue},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// The real thing: stages become wgpu shader modules, programs become render pipelines
/// with an optional uniform buffer, frames go to a window surface or an offscreen texture.
pub struct WgpuBackend {
	gpu: Gpu,
	target: RenderTarget,
	painter: Renderer,

	handles: HandleAllocator,
	stages: HashMap<StageHandle, GpuStage>,
	programs: HashMap<ProgramHandle, GpuProgram>,
	meshes: HashMap<MeshHandle, GpuMesh>,

	clear_color: [f32; 4],
	frame: Option<Frame>,
}

struct GpuStage {
	parsed: ParsedStage,
	module: ShaderModule,
}

struct GpuProgram {
	pipeline: RenderPipeline,
	uniforms: Option<GpuUniforms>,
}

/// The uniform block of a program. Values land in `staging` first and reach the GPU
/// buffer on the next draw.
struct GpuUniforms {
	block: UniformBlock,
	staging: Vec<u8>,
	buffer: Buffer,
	bind_group: BindGroup,
	dirty: bool,
}

struct GpuMesh {
	vertex_buffer: Buffer,
	index_buffer: Buffer,
	index_count: u32,
}

struct Frame {
	view: TextureView,
	encoder: CommandEncoder,
	command_buffers: Vec<CommandBuffer>,
	texture_frees: Vec<egui::TextureId>,
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

impl WgpuBackend {
	/// Render into `window`.
	pub fn for_window(window: Arc<Window>) -> Result<Self> {
		// Window is passed as arc so that the surface creation can be done safely
		let size = window.inner_size();

		let instance = Gpu::instance();
		let surface = instance
			.create_surface(window)
			.context("Couldn't create surface from window")?;

		let gpu = pollster::block_on(Gpu::new(instance, Some(&surface)))?;
		let target = RenderTarget::from_surface(surface, (size.width, size.height), &gpu)?;

		Ok(Self::with_target(gpu, target))
	}

	/// Render into a texture that can be read back with [`WgpuBackend::read_pixels`].
	pub fn offscreen(width: u32, height: u32) -> Result<Self> {
		let gpu = pollster::block_on(Gpu::new(Gpu::instance(), None))?;
		let target = RenderTarget::offscreen(width, height, &gpu);

		Ok(Self::with_target(gpu, target))
	}

	fn with_target(gpu: Gpu, target: RenderTarget) -> Self {
		let painter = Renderer::new(&gpu.device, target.format, None, 1);

		Self {
			gpu,
			target,
			painter,
			handles: HandleAllocator::default(),
			stages: HashMap::new(),
			programs: HashMap::new(),
			meshes: HashMap::new(),
			clear_color: [0.0, 0.0, 0.0, 1.0],
			frame: None,
		}
	}

	pub fn gpu(&self) -> &Gpu {
		&self.gpu
	}

	/// Copy the offscreen target back to the host.
	///
	/// Only offscreen backends can be read back; the last presented frame is what's read.
	pub fn read_pixels(&self) -> Result<RgbaImage> {
		let Some(texture) = self.target.texture() else {
			bail!("Only offscreen targets can be read back");
		};

		let (width, height) = (texture.width(), texture.height());

		// Rows of a texture-to-buffer copy have to be aligned
		let unpadded_row = width * 4;
		let padded_row = unpadded_row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

		let buffer = self.gpu.device.create_buffer(&BufferDescriptor {
			label: Some("Readback Buffer"),
			size: u64::from(padded_row) * u64::from(height),
			usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
			mapped_at_creation: false,
		});

		let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor {
			label: Some("Readback Encoder"),
		});

		encoder.copy_texture_to_buffer(
			ImageCopyTexture {
				texture,
				mip_level: 0,
				origin: Origin3d::ZERO,
				aspect: TextureAspect::All,
			},
			ImageCopyBuffer {
				buffer: &buffer,
				layout: ImageDataLayout {
					offset: 0,
					bytes_per_row: Some(padded_row),
					rows_per_image: Some(height),
				},
			},
			Extent3d {
				width,
				height,
				depth_or_array_layers: 1,
			},
		);

		self.gpu.queue.submit(Some(encoder.finish()));

		let slice = buffer.slice(..);
		let (tx, rx) = std::sync::mpsc::channel();
		slice.map_async(MapMode::Read, move |result| {
			let _ = tx.send(result);
		});

		let _ = self.gpu.device.poll(Maintain::Wait);
		rx.recv()
			.context("The readback buffer was dropped before being mapped")?
			.context("Couldn't map the readback buffer")?;

		let mapped = slice.get_mapped_range();
		let mut pixels = Vec::with_capacity((unpadded_row * height) as usize);
		for row in mapped.chunks(padded_row as usize) {
			pixels.extend_from_slice(&row[..unpadded_row as usize]);
		}
		drop(mapped);
		buffer.unmap();

		RgbaImage::from_raw(width, height, pixels).context("Readback size doesn't match the target")
	}

	/// Run `create` inside a validation error scope, turning whatever wgpu complains about
	/// into a diagnostic.
	fn scoped<T>(&self, create: impl FnOnce(&Gpu) -> T) -> Result<T, String> {
		self.gpu.device.push_error_scope(ErrorFilter::Validation);
		let created = create(&self.gpu);

		match pollster::block_on(self.gpu.device.pop_error_scope()) {
			Some(err) => Err(err.to_string()),
			None => Ok(created),
		}
	}
}

/// When the textures egui is done with can be freed.
#[derive(Debug, Default, PartialEq, Eq)]
struct TextureFrees {
	now: Vec<egui::TextureId>,
	/// Still sampled by the frame in flight, freed once it's submitted.
	after_frame: Vec<egui::TextureId>,
}

impl TextureFrees {
	fn plan(delta: &egui::TexturesDelta, frame_in_flight: bool) -> Self {
		let freed = delta.free.clone();

		if frame_in_flight {
			Self {
				now: vec![],
				after_frame: freed,
			}
		} else {
			Self {
				now: freed,
				after_frame: vec![],
			}
		}
	}
}

/// Begin a pass over the frame's colour target, keeping what was drawn before.
fn load_pass<'a>(encoder: &'a mut CommandEncoder, view: &'a TextureView, label: &'static str) -> RenderPass<'a> {
	encoder.begin_render_pass(&RenderPassDescriptor {
		label: Some(label),
		color_attachments: &[Some(RenderPassColorAttachment {
			view,
			resolve_target: None,
			ops: Operations {
				load: LoadOp::Load,
				store: StoreOp::Store,
			},
		})],
		depth_stencil_attachment: None,
		timestamp_writes: None,
		occlusion_query_set: None,
	})
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

impl Backend for WgpuBackend {
	fn compile_stage(
		&mut self,
		stage: ShaderStage,
		language: ShaderLanguage,
		source: &str,
	) -> Result<StageHandle, String> {
		// naga gives far better diagnostics than an uncaptured wgpu error, so parse first
		let parsed = reflect::parse_stage(stage, language, source)?;

		let module = self.scoped(|gpu| {
			let source = match language {
				ShaderLanguage::Wgsl => ShaderSource::Wgsl(source.into()),
				ShaderLanguage::Glsl => ShaderSource::Glsl {
					shader: source.into(),
					stage: stage.into(),
					defines: Default::default(),
				},
			};

			gpu.device.create_shader_module(ShaderModuleDescriptor {
				label: Some(&format!("{} Shader", stage)),
				source,
			})
		})?;

		let handle = self.handles.next();
		self.stages.insert(handle, GpuStage { parsed, module });
		Ok(handle)
	}

	fn release_stage(&mut self, stage: StageHandle) {
		self.stages.remove(&stage);
	}

	fn link_program(&mut self, vertex: StageHandle, fragment: StageHandle) -> Result<ProgramHandle, String> {
		let vertex = self.stages.get(&vertex).ok_or_else(|| format!("{} isn't a live stage", vertex))?;
		let fragment = self
			.stages
			.get(&fragment)
			.ok_or_else(|| format!("{} isn't a live stage", fragment))?;

		let block = reflect::link_stages(&vertex.parsed, &fragment.parsed)?;
		let format = self.target.format;

		let program = self.scoped(|gpu| {
			let bind_group_layout = block.as_ref().map(|_| {
				gpu.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
					label: Some("Uniform Bind Group Layout"),
					entries: &[BindGroupLayoutEntry {
						binding: 0,
						visibility: ShaderStages::VERTEX_FRAGMENT,
						ty: BindingType::Buffer {
							ty: BufferBindingType::Uniform,
							has_dynamic_offset: false,
							min_binding_size: None,
						},
						count: None,
					}],
				})
			});

			let uniforms = block.zip(bind_group_layout.as_ref()).map(|(block, layout)| {
				let buffer = gpu.device.create_buffer(&BufferDescriptor {
					label: Some("Uniform Buffer"),
					size: block.buffer_size(),
					usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
					mapped_at_creation: false,
				});

				let bind_group = gpu.device.create_bind_group(&BindGroupDescriptor {
					label: Some("Uniform Bind Group"),
					layout,
					entries: &[BindGroupEntry {
						binding: 0,
						resource: buffer.as_entire_binding(),
					}],
				});

				GpuUniforms {
					staging: vec![0; block.buffer_size() as usize],
					block,
					buffer,
					bind_group,
					dirty: true,
				}
			});

			let bind_group_layouts = bind_group_layout.iter().collect::<Vec<_>>();
			let pipeline_layout = gpu.device.create_pipeline_layout(&PipelineLayoutDescriptor {
				label: Some("Program Pipeline Layout"),
				bind_group_layouts: &bind_group_layouts,
				push_constant_ranges: &[],
			});

			let pipeline = gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
				label: Some("Program Pipeline"),
				layout: Some(&pipeline_layout),
				vertex: VertexState {
					module: &vertex.module,
					entry_point: &vertex.parsed.entry_point,
					buffers: &[VertexBufferLayout {
						array_stride: std::mem::size_of::<[f32; 3]>() as u64,
						step_mode: VertexStepMode::Vertex,
						attributes: &wgpu::vertex_attr_array![0 => Float32x3],
					}],
				},
				fragment: Some(FragmentState {
					module: &fragment.module,
					entry_point: &fragment.parsed.entry_point,
					targets: &[Some(ColorTargetState {
						format,
						blend: Some(BlendState::REPLACE),
						write_mask: ColorWrites::ALL,
					})],
				}),
				primitive: PrimitiveState::default(),
				depth_stencil: None,
				multisample: MultisampleState::default(),
				multiview: None,
			});

			GpuProgram { pipeline, uniforms }
		})?;

		let handle = self.handles.next();
		debug!("Created pipeline for {}", handle);
		self.programs.insert(handle, program);
		Ok(handle)
	}

	fn validate_program(&mut self, program: ProgramHandle) -> Result<(), String> {
		match self.programs.get(&program) {
			Some(program) => reflect::validate_uniforms(program.uniforms.as_ref().map(|uniforms| &uniforms.block)),
			None => Err(format!("{} isn't a live program", program)),
		}
	}

	fn release_program(&mut self, program: ProgramHandle) {
		self.programs.remove(&program);
	}

	fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
		self.programs.get(&program)?.uniforms.as_ref()?.block.location(name)
	}

	fn set_uniform(&mut self, program: ProgramHandle, location: UniformLocation, value: UniformValue) -> bool {
		let Some(uniforms) = self
			.programs
			.get_mut(&program)
			.and_then(|program| program.uniforms.as_mut())
		else {
			return false;
		};

		let written = uniforms.block.write(&mut uniforms.staging, location, value);
		uniforms.dirty |= written;
		written
	}

	fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
		let uniforms = self.programs.get(&program)?.uniforms.as_ref()?;
		uniforms.block.read(&uniforms.staging, uniforms.block.location(name)?)
	}

	fn create_mesh(&mut self, vertices: &[[f32; 3]], indices: &[u32]) -> MeshHandle {
		let vertex_buffer = self.gpu.device.create_buffer_init(&BufferInitDescriptor {
			label: Some("Vertex Buffer"),
			contents: bytemuck::cast_slice(vertices),
			usage: BufferUsages::VERTEX,
		});

		let index_buffer = self.gpu.device.create_buffer_init(&BufferInitDescriptor {
			label: Some("Index Buffer"),
			contents: bytemuck::cast_slice(indices),
			usage: BufferUsages::INDEX,
		});

		let handle = self.handles.next();
		self.meshes.insert(
			handle,
			GpuMesh {
				vertex_buffer,
				index_buffer,
				index_count: indices.len() as u32,
			},
		);
		handle
	}

	fn release_mesh(&mut self, mesh: MeshHandle) {
		self.meshes.remove(&mesh);
	}

	fn set_clear_color(&mut self, color: [f32; 4]) {
		self.clear_color = color;
	}

	fn resize(&mut self, width: u32, height: u32) {
		self.target.resize(width, height, &self.gpu);
	}

	fn begin_frame(&mut self) {
		if self.frame.is_some() {
			warn!("A frame is already in flight");
			return;
		}

		// Nothing to render to (minimized window, lost surface), skip the frame
		let Some(view) = self.target.acquire(&self.gpu) else {
			return;
		};

		let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor {
			label: Some("Frame Encoder"),
		});

		let [r, g, b, a] = self.clear_color.map(f64::from);
		encoder.begin_render_pass(&RenderPassDescriptor {
			label: Some("Clear Pass"),
			color_attachments: &[Some(RenderPassColorAttachment {
				view: &view,
				resolve_target: None,
				ops: Operations {
					load: LoadOp::Clear(Color { r, g, b, a }),
					store: StoreOp::Store,
				},
			})],
			depth_stencil_attachment: None,
			timestamp_writes: None,
			occlusion_query_set: None,
		});

		self.frame = Some(Frame {
			view,
			encoder,
			command_buffers: vec![],
			texture_frees: vec![],
		});
	}

	fn draw(&mut self, program: ProgramHandle, mesh: MeshHandle) {
		let Self {
			gpu,
			programs,
			meshes,
			frame,
			..
		} = self;

		let Some(frame) = frame.as_mut() else {
			trace!("Dropping draw of {} outside of a frame", program);
			return;
		};

		let (Some(program), Some(mesh)) = (programs.get_mut(&program), meshes.get(&mesh)) else {
			return;
		};

		if let Some(uniforms) = program.uniforms.as_mut() {
			if std::mem::take(&mut uniforms.dirty) {
				gpu.queue.write_buffer(&uniforms.buffer, 0, &uniforms.staging);
			}
		}

		let program = &*program;
		let mut pass = load_pass(&mut frame.encoder, &frame.view, "Program Pass");

		pass.set_pipeline(&program.pipeline);
		if let Some(uniforms) = &program.uniforms {
			pass.set_bind_group(0, &uniforms.bind_group, &[]);
		}
		pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
		pass.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
		pass.draw_indexed(0..mesh.index_count, 0, 0..1);
	}

	fn paint_ui(&mut self, ui: &UiFrame) {
		let Self {
			gpu,
			target,
			painter,
			frame,
			..
		} = self;

		// Uploads don't need an encoder, and egui sends the font atlas only once, so they
		// happen even when this frame was skipped
		for (id, delta) in &ui.textures_delta.set {
			painter.update_texture(&gpu.device, &gpu.queue, *id, delta);
		}

		let frees = TextureFrees::plan(&ui.textures_delta, frame.is_some());
		for id in &frees.now {
			painter.free_texture(id);
		}

		let Some(frame) = frame.as_mut() else {
			return;
		};

		let screen = ScreenDescriptor {
			size_in_pixels: [target.size.0, target.size.1],
			pixels_per_point: ui.pixels_per_point,
		};

		let command_buffers =
			painter.update_buffers(&gpu.device, &gpu.queue, &mut frame.encoder, &ui.primitives, &screen);
		frame.command_buffers.extend(command_buffers);

		{
			let mut pass = load_pass(&mut frame.encoder, &frame.view, "UI Pass");
			painter.render(&mut pass, &ui.primitives, &screen);
		}

		frame.texture_frees.extend(frees.after_frame);
	}

	fn end_frame(&mut self) {
		let Some(frame) = self.frame.take() else {
			return;
		};

		// Submit the encoded command buffers to the queue
		self.gpu.queue.submit(
			frame
				.command_buffers
				.into_iter()
				.chain(std::iter::once(frame.encoder.finish())),
		);

		self.target.present();

		for id in &frame.texture_frees {
			self.painter.free_texture(id);
		}
	}

	fn live_resources(&self) -> ResourceCounts {
		ResourceCounts {
			stages: self.stages.len(),
			programs: self.programs.len(),
			meshes: self.meshes.len(),
		}
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use egui::{Color32, ColorImage, TextureId, TextureOptions, TexturesDelta};

	use super::*;

	fn delta() -> TexturesDelta {
		TexturesDelta {
			set: vec![(
				TextureId::Managed(0),
				egui::epaint::ImageDelta::full(ColorImage::new([2, 2], Color32::WHITE), TextureOptions::default()),
			)],
			free: vec![TextureId::Managed(3), TextureId::User(7)],
		}
	}

	#[test]
	fn skipped_frames_free_textures_right_away() {
		let frees = TextureFrees::plan(&delta(), false);

		assert_eq!(frees.now, [TextureId::Managed(3), TextureId::User(7)]);
		assert!(frees.after_frame.is_empty());
	}

	#[test]
	fn frames_in_flight_keep_textures_until_submitted() {
		let frees = TextureFrees::plan(&delta(), true);

		assert!(frees.now.is_empty());
		assert_eq!(frees.after_frame, [TextureId::Managed(3), TextureId::User(7)]);
	}
}
