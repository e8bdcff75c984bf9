use anyhow::{Context, Result};
use log::{error, info};
use wgpu::{
	Adapter, Backends, Device, DeviceDescriptor, Features, Instance, InstanceDescriptor, InstanceFlags, Limits,
	PowerPreference, Queue, RequestAdapterOptions, Surface,
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct Gpu {
	pub instance: Instance,
	pub adapter: Adapter,
	pub device: Device,
	pub queue: Queue,
}

impl Gpu {
	pub fn instance() -> Instance {
		// Instance is the instance of wgpu which serves as entrypoint for everything
		// wgpu-related
		#[cfg(debug_assertions)]
		// Not running in --release mode, activate validation and debug info for wgpu
		let instance = Instance::new(InstanceDescriptor {
			backends: Backends::PRIMARY,
			flags: InstanceFlags::VALIDATION | InstanceFlags::DEBUG,
			..Default::default()
		});

		#[cfg(not(debug_assertions))]
		// Running in --release mode, don't activate debugging infos for wgpu
		let instance = Instance::new(InstanceDescriptor {
			backends: Backends::PRIMARY,
			..Default::default()
		});

		instance
	}

	pub async fn new(instance: Instance, compatible_surface: Option<&Surface<'_>>) -> Result<Self> {
		// Adapter essentially represents the physical GPU + the Backend, e.g.
		// GTX1080_VK; GTX1080_DX12; etc
		let adapter = instance
			.request_adapter(&RequestAdapterOptions {
				power_preference: PowerPreference::HighPerformance,
				compatible_surface,
				force_fallback_adapter: false,
			})
			.await
			.context("Couldn't request a compatible adapter")?;

		info!("Using adapter {:?}", adapter.get_info().name);

		// Device esentially acts like a logical connection to the selected adapter in
		// an application-isolated way. Queue is the command queue for the GPU; anything
		// the GPU needs to do (rendering, uploading buffer data, etc) goes through it
		let (device, queue) = adapter
			.request_device(
				&(DeviceDescriptor {
					required_features: Features::empty(),
					required_limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
					label: Some("Sandbox Device"),
				}),
				None,
			)
			.await
			.context("Couldn't request device")?;

		// Compile and link errors are caught by error scopes, what ends up here is
		// out-of-memory or device loss
		device.on_uncaptured_error(Box::new(|err| {
			error!("Unrecoverable GPU error: {}", err);
			panic!("Unrecoverable GPU error: {}", err);
		}));

		Ok(Self {
			instance,
			adapter,
			device,
			queue,
		})
	}
}
