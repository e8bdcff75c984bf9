use anyhow::{Context, Result};
use log::{debug, warn};
use wgpu::{
	Extent3d, PresentMode, Surface, SurfaceConfiguration, SurfaceError, SurfaceTexture, Texture, TextureDescriptor,
	TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
};

use super::gpu::Gpu;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Format of the offscreen colour target, chosen so pixels can be read back as-is.
pub const OFFSCREEN_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

pub struct RenderTarget {
	kind: TargetKind,
	pub format: TextureFormat,
	pub size: (u32, u32),

	current_texture: Option<SurfaceTexture>,
}

enum TargetKind {
	Window {
		surface: Surface<'static>,
		config: SurfaceConfiguration,
	},
	Offscreen {
		texture: Texture,
	},
}

impl RenderTarget {
	pub fn from_surface(surface: Surface<'static>, size: (u32, u32), gpu: &Gpu) -> Result<Self> {
		// Describes what the surface is compatible with on the given adapter
		let capabilities = surface.get_capabilities(&gpu.adapter);

		// Shaders write linear values straight to the screen, so stay away from sRGB formats
		// when the surface offers something else
		let surface_format = capabilities
			.formats
			.iter()
			.copied()
			.find(|format| !format.is_srgb())
			.or_else(|| capabilities.formats.first().copied())
			.context("The surface isn't supported by the adapter")?;

		let present_mode = if capabilities.present_modes.contains(&PresentMode::Mailbox) {
			PresentMode::Mailbox
		} else {
			PresentMode::AutoVsync
		};

		let config = SurfaceConfiguration {
			usage: TextureUsages::RENDER_ATTACHMENT,
			format: surface_format,
			width: size.0.max(1),
			height: size.1.max(1),
			present_mode,
			desired_maximum_frame_latency: 2,
			alpha_mode: capabilities.alpha_modes[0],
			view_formats: vec![],
		};

		surface.configure(&gpu.device, &config);

		debug!("Configured {:?} surface at {}x{}", surface_format, config.width, config.height);

		Ok(Self {
			kind: TargetKind::Window { surface, config },
			format: surface_format,
			size,
			current_texture: None,
		})
	}

	pub fn offscreen(width: u32, height: u32, gpu: &Gpu) -> Self {
		Self {
			kind: TargetKind::Offscreen {
				texture: offscreen_texture(width.max(1), height.max(1), gpu),
			},
			format: OFFSCREEN_FORMAT,
			size: (width, height),
			current_texture: None,
		}
	}

	/// The texture of an offscreen target, `None` for window targets.
	pub fn texture(&self) -> Option<&Texture> {
		match &self.kind {
			TargetKind::Offscreen { texture } => Some(texture),
			TargetKind::Window { .. } => None,
		}
	}

	/// Get a view of the texture this frame renders into.
	///
	/// `None` means there's nothing to render to this frame (minimized window, lost
	/// surface) and the frame should be skipped.
	pub fn acquire(&mut self, gpu: &Gpu) -> Option<TextureView> {
		match &self.kind {
			TargetKind::Offscreen { texture } => Some(texture.create_view(&TextureViewDescriptor::default())),

			TargetKind::Window { surface, config } => {
				if self.size.0 == 0 || self.size.1 == 0 {
					return None;
				}

				let output = match surface.get_current_texture() {
					Ok(output) => output,
					Err(SurfaceError::Lost | SurfaceError::Outdated) => {
						debug!("Surface lost, reconfiguring");
						surface.configure(&gpu.device, config);
						return None;
					}
					Err(err) => {
						warn!("Couldn't acquire the next frame: {}", err);
						return None;
					}
				};

				let view = output.texture.create_view(&TextureViewDescriptor::default());
				self.current_texture = Some(output);
				Some(view)
			}
		}
	}

	/// Swap the draw buffers and show what we rendered to the screen.
	pub fn present(&mut self) {
		if let Some(output) = self.current_texture.take() {
			output.present();
		}
	}

	pub fn resize(&mut self, width: u32, height: u32, gpu: &Gpu) {
		self.size = (width, height);

		match &mut self.kind {
			TargetKind::Window { surface, config } => {
				// A zero-sized surface can't be configured, frames are skipped until it grows again
				if width > 0 && height > 0 {
					config.width = width;
					config.height = height;
					surface.configure(&gpu.device, config);
				}
			}
			TargetKind::Offscreen { texture } => {
				*texture = offscreen_texture(width.max(1), height.max(1), gpu);
			}
		}
	}
}

fn offscreen_texture(width: u32, height: u32, gpu: &Gpu) -> Texture {
	gpu.device.create_texture(&TextureDescriptor {
		label: Some("Offscreen Target"),
		size: Extent3d {
			width,
			height,
			depth_or_array_layers: 1,
		},
		mip_level_count: 1,
		sample_count: 1,
		dimension: TextureDimension::D2,
		format: OFFSCREEN_FORMAT,
		usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
		view_formats: &[],
	})
}
