//! GPU device initialization and the pointwise convolution dispatch

use super::shaders;
use crate::grid::WorkgroupSize;
use crate::half4::Half4;
use crate::kernel::{Binding, ConvBuffers};
use crate::params::ConvParams;

/// Uniform block matching `ConvUniforms` in the shader
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ConvUniforms {
    clip: f32,
    input_h: u32,
    input_w: u32,
    output_h: u32,
    output_w: u32,
    src_depth: u32,
    weights_h: u32,
    weights_w: u32,
    workload_x: u32,
    workload_y: u32,
    workload_z: u32,
    _padding: u32,
}

fn to_u32(name: &str, value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("{} = {} does not fit in u32", name, value))
}

impl ConvUniforms {
    fn from_params(params: &ConvParams) -> Result<Self, String> {
        Ok(Self {
            clip: params.clip,
            input_h: to_u32("input height", params.input.height)?,
            input_w: to_u32("input width", params.input.width)?,
            output_h: to_u32("output height", params.output.height)?,
            output_w: to_u32("output width", params.output.width)?,
            src_depth: to_u32("src_depth", params.src_depth)?,
            weights_h: to_u32("weights height", params.weights.height)?,
            weights_w: to_u32("weights width", params.weights.width)?,
            workload_x: to_u32("workload x", params.workload.x)?,
            workload_y: to_u32("workload y", params.workload.y)?,
            workload_z: to_u32("workload z", params.workload.z)?,
            _padding: 0,
        })
    }
}

/// GPU device manager
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuDevice {
    /// Initialize GPU device
    pub fn new() -> Result<Self, String> {
        pollster::block_on(async { Self::new_async().await })
    }

    async fn new_async() -> Result<Self, String> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or("Failed to find GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Pointwise Conv Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| format!("Failed to create device: {}", e))?;

        Ok(Self { device, queue })
    }

    /// Check if GPU is available
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = wgpu::Instance::default();
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .is_some()
        })
    }

    fn check_limits(&self, workgroup: WorkgroupSize, groups: [u32; 3], largest: u64) -> Result<(), String> {
        let limits = self.device.limits();
        if workgroup.x > limits.max_compute_workgroup_size_x
            || workgroup.y > limits.max_compute_workgroup_size_y
            || workgroup.z > limits.max_compute_workgroup_size_z
            || workgroup.invocations() > limits.max_compute_invocations_per_workgroup
        {
            return Err(format!("Workgroup {:?} exceeds device limits", workgroup));
        }
        if groups.iter().any(|&g| g > limits.max_compute_workgroups_per_dimension) {
            return Err(format!("Workgroup count {:?} exceeds device limits", groups));
        }
        if largest > u64::from(limits.max_storage_buffer_binding_size) {
            return Err(format!(
                "Buffer of {} bytes exceeds storage binding limit {}",
                largest, limits.max_storage_buffer_binding_size
            ));
        }
        Ok(())
    }

    fn storage_buffer(&self, binding: Binding, data: &[Half4], read_back: bool) -> wgpu::Buffer {
        let mut usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        if read_back {
            usage |= wgpu::BufferUsages::COPY_SRC;
        }
        // wgpu rejects zero-sized bindings
        let size = std::mem::size_of_val(data).max(std::mem::size_of::<Half4>()) as u64;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(match binding {
                Binding::Input => "Input Feature Map",
                Binding::Output => "Output Feature Map",
                Binding::Weights => "Weights",
                Binding::Bias => "Bias",
            }),
            size,
            usage,
            mapped_at_creation: false,
        });
        if !data.is_empty() {
            self.queue.write_buffer(&buffer, 0, bytemuck::cast_slice(data));
        }
        buffer
    }

    /// Execute the pointwise convolution on GPU
    ///
    /// `output` is uploaded first so elements outside the workload keep their
    /// contents, then overwritten with the device result.
    pub fn pointwise_conv(
        &self,
        params: &ConvParams,
        buffers: &ConvBuffers<'_>,
        output: &mut [Half4],
    ) -> Result<(), String> {
        pollster::block_on(async { self.pointwise_conv_async(params, buffers, output).await })
    }

    async fn pointwise_conv_async(
        &self,
        params: &ConvParams,
        buffers: &ConvBuffers<'_>,
        output: &mut [Half4],
    ) -> Result<(), String> {
        let uniforms = ConvUniforms::from_params(params)?;
        let wg = params.workgroup;
        let groups = wg.workgroup_count(params.workload);
        let largest = [buffers.input, buffers.weights, buffers.bias, &*output]
            .iter()
            .map(|b| std::mem::size_of_val(*b) as u64)
            .max()
            .unwrap_or(0);
        self.check_limits(wg, groups, largest)?;

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Pointwise Conv Shader"),
                source: wgpu::ShaderSource::Wgsl(shaders::pointwise_conv_shader(wg.x, wg.y, wg.z).into()),
            });

        let input_buffer = self.storage_buffer(Binding::Input, buffers.input, false);
        let output_buffer = self.storage_buffer(Binding::Output, output, true);
        let weights_buffer = self.storage_buffer(Binding::Weights, buffers.weights, false);
        let bias_buffer = self.storage_buffer(Binding::Bias, buffers.bias, false);

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Conv Uniforms"),
            size: std::mem::size_of::<ConvUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let storage_entry = |binding: Binding, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding: binding as u32,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Pointwise Conv Bind Group Layout"),
                    entries: &[
                        storage_entry(Binding::Input, true),
                        storage_entry(Binding::Output, false),
                        storage_entry(Binding::Weights, true),
                        storage_entry(Binding::Bias, true),
                        wgpu::BindGroupLayoutEntry {
                            binding: 4,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                    ],
                });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Pointwise Conv Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: Binding::Input as u32,
                    resource: input_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: Binding::Output as u32,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: Binding::Weights as u32,
                    resource: weights_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: Binding::Bias as u32,
                    resource: bias_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Pointwise Conv Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Pointwise Conv Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: "main",
                compilation_options: Default::default(),
                cache: None,
            });

        let output_size = output_buffer.size();
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: output_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pointwise Conv Encoder"),
            });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Pointwise Conv Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }

        encoder.copy_buffer_to_buffer(&output_buffer, 0, &staging_buffer, 0, output_size);

        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });

        self.device.poll(wgpu::Maintain::Wait);

        receiver
            .receive()
            .await
            .ok_or("Failed to receive mapping result")?
            .map_err(|e| format!("Buffer mapping failed: {:?}", e))?;

        {
            let data = buffer_slice.get_mapped_range();
            let dst: &mut [u8] = bytemuck::cast_slice_mut(output);
            let len = dst.len();
            dst.copy_from_slice(&data[..len]);
        }

        staging_buffer.unmap();

        Ok(())
    }
}
