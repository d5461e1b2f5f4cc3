// Graphics pipeline creation and management
//
// A single color attachment, one subpass, and a fixed-function pipeline that
// draws the triangle hardcoded in the vertex shader.

use anyhow::{Context, Result};
use ash::vk;
use std::ffi::CStr;
use std::path::Path;
use std::sync::Arc;

use super::shader::ShaderModule;
use super::{Device, Swapchain};

const SHADER_ENTRY_POINT: &CStr = c"main";

// =============================================================================
// RENDER PASS
// =============================================================================

pub struct RenderPass {
    pub render_pass: vk::RenderPass,
    device: Arc<Device>,
}

impl RenderPass {
    /// Single color attachment, cleared on load and handed to presentation.
    pub fn new(device: Arc<Device>, format: vk::Format) -> Result<Arc<Self>> {
        let color_attachments = [color_attachment(format)];

        let color_attachment_refs = [vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build()];

        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs)
            .build()];

        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&color_attachments)
            .subpasses(&subpasses);

        let render_pass = unsafe { device.device.create_render_pass(&render_pass_info, None) }
            .context("Failed to create render pass")?;

        log::info!("Render pass created");
        Ok(Arc::new(Self {
            render_pass,
            device,
        }))
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        log::debug!("Destroying render pass...");
        unsafe {
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build()
}

// =============================================================================
// FIXED-FUNCTION STATE
// =============================================================================

fn input_assembly_state() -> vk::PipelineInputAssemblyStateCreateInfo {
    vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false)
        .build()
}

/// Viewport and scissor both cover the whole swapchain image.
fn viewport_and_scissor(extent: vk::Extent2D) -> (vk::Viewport, vk::Rect2D) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };

    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };

    (viewport, scissor)
}

fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false)
        .build()
}

fn multisample_state() -> vk::PipelineMultisampleStateCreateInfo {
    vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .min_sample_shading(1.0)
        .alpha_to_coverage_enable(false)
        .alpha_to_one_enable(false)
        .build()
}

/// Blending off: the fragment color is written as is.
fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .src_color_blend_factor(vk::BlendFactor::ONE)
        .dst_color_blend_factor(vk::BlendFactor::ZERO)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .build()
}

// =============================================================================
// GRAPHICS PIPELINE
// =============================================================================

pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    device: Arc<Device>,
}

impl GraphicsPipeline {
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        extent: vk::Extent2D,
        vertex_shader: &Path,
        fragment_shader: &Path,
    ) -> Result<Self> {
        let vert_module = ShaderModule::from_file(&device, vertex_shader)?;
        let frag_module = ShaderModule::from_file(&device, fragment_shader)?;
        log::debug!("Shader modules created");

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module.module)
                .name(SHADER_ENTRY_POINT)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module.module)
                .name(SHADER_ENTRY_POINT)
                .build(),
        ];

        // Vertices are hardcoded in the vertex shader
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();

        let input_assembly = input_assembly_state();

        let (viewport, scissor) = viewport_and_scissor(extent);
        let viewports = [viewport];
        let scissors = [scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = rasterization_state();
        let multisampling = multisample_state();

        let color_blend_attachments = [color_blend_attachment()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments)
            .blend_constants([0.0; 4]);

        // No descriptors, no push constants
        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe { device.device.create_pipeline_layout(&layout_info, None) }
            .context("Failed to create pipeline layout")?;

        // No depth/stencil state, no dynamic state
        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass.render_pass)
            .subpass(0)
            .base_pipeline_handle(vk::Pipeline::null())
            .base_pipeline_index(-1)
            .build();

        let pipelines = unsafe {
            device
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { device.device.destroy_pipeline_layout(layout, None) };
                return Err(e).context("Failed to create graphics pipeline");
            }
        };

        // Bytecode is baked into the pipeline now
        drop(frag_module);
        drop(vert_module);

        log::info!("Graphics pipeline created");
        Ok(Self {
            pipeline,
            layout,
            device,
        })
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        log::debug!("Destroying graphics pipeline...");
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

// =============================================================================
// FRAMEBUFFERS
// =============================================================================

/// One framebuffer per swapchain image view.
pub struct Framebuffers {
    pub framebuffers: Vec<vk::Framebuffer>,
    swapchain: Arc<Swapchain>,
    render_pass: Arc<RenderPass>,
}

impl Framebuffers {
    pub fn new(swapchain: Arc<Swapchain>, render_pass: Arc<RenderPass>) -> Result<Self> {
        let mut this = Self {
            framebuffers: Vec::with_capacity(swapchain.image_views.len()),
            swapchain,
            render_pass,
        };

        for &image_view in &this.swapchain.image_views {
            let attachments = [image_view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(this.render_pass.render_pass)
                .attachments(&attachments)
                .width(this.swapchain.extent.width)
                .height(this.swapchain.extent.height)
                .layers(1);

            let framebuffer = unsafe {
                this.swapchain
                    .device()
                    .device
                    .create_framebuffer(&framebuffer_info, None)
            }
            .context("Failed to create framebuffer")?;
            this.framebuffers.push(framebuffer);
        }

        log::info!("Created {} framebuffers", this.framebuffers.len());
        Ok(this)
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        log::debug!("Destroying {} framebuffers...", self.framebuffers.len());
        let device = &self.swapchain.device().device;
        unsafe {
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_attachment_clears_and_presents() {
        let attachment = color_attachment(vk::Format::B8G8R8A8_SRGB);
        assert_eq!(attachment.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(attachment.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn triangle_list_without_restart() {
        let state = input_assembly_state();
        assert_eq!(state.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(state.primitive_restart_enable, vk::FALSE);
    }

    #[test]
    fn viewport_and_scissor_cover_extent() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let (viewport, scissor) = viewport_and_scissor(extent);

        assert_eq!((viewport.x, viewport.y), (0.0, 0.0));
        assert_eq!((viewport.width, viewport.height), (800.0, 600.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));
        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 0));
        assert_eq!((scissor.extent.width, scissor.extent.height), (800, 600));
    }

    #[test]
    fn rasterizer_culls_back_faces_clockwise() {
        let state = rasterization_state();
        assert_eq!(state.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(state.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(state.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(state.line_width, 1.0);
        assert_eq!(state.depth_clamp_enable, vk::FALSE);
        assert_eq!(state.rasterizer_discard_enable, vk::FALSE);
        assert_eq!(state.depth_bias_enable, vk::FALSE);
    }

    #[test]
    fn single_sample_no_shading() {
        let state = multisample_state();
        assert_eq!(state.rasterization_samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(state.sample_shading_enable, vk::FALSE);
    }

    #[test]
    fn blending_disabled_all_channels_written() {
        let state = color_blend_attachment();
        assert_eq!(state.blend_enable, vk::FALSE);
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
    }
}
