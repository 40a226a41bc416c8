use core::slice;

use ash::vk;
use frame_capture::{FarPlane, FrameSource, SourceImage, VkError};
use tracing::debug;

use super::{RenderedFrame, Renderer, swapchain::Swapchain};

const BACKGROUND: [f32; 4] = [0.05, 0.05, 0.05, 1.0];
const SQUARE: [f32; 4] = [0.9, 0.4, 0.1, 1.0];
const SQUARE_DEPTH: f32 = 0.5;

impl Renderer {
    /// Renders and submits a frame without presenting it.
    ///
    /// Returns `None` when no image could be acquired, the swapchain is rebuilt on the next call.
    pub unsafe fn render(&mut self) -> Result<Option<RenderedFrame>, VkError> {
        if self.swapchain.needs_to_rebuild {
            unsafe { self.rebuild_swapchain() }?;
        }

        let device = self.vulkan.device();

        // The previous frame must be done with the command buffer.
        unsafe {
            device
                .wait_for_fences(slice::from_ref(&self.in_flight_fence), true, u64::MAX)
                .map_err(|e| VkError::new(e, "vkWaitForFences"))?;
        }

        // Acquire next image
        let image_index = {
            let result = unsafe {
                self.surface.swapchain_device().acquire_next_image(
                    self.swapchain.swapchain,
                    u64::MAX,
                    self.image_available,
                    vk::Fence::null(),
                )
            };

            let (image_index, suboptimal) = match result {
                Ok(v) => v,
                Err(e) => match e {
                    vk::Result::ERROR_OUT_OF_DATE_KHR => {
                        self.swapchain.needs_to_rebuild = true;
                        return Ok(None);
                    }

                    vk::Result::NOT_READY | vk::Result::TIMEOUT => return Ok(None),

                    e => return Err(VkError::new(e, "vkAcquireNextImageKHR")),
                },
            };

            if suboptimal {
                self.swapchain.needs_to_rebuild = true;
            }

            image_index
        };

        unsafe {
            device
                .reset_fences(slice::from_ref(&self.in_flight_fence))
                .map_err(|e| VkError::new(e, "vkResetFences"))?;

            device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| VkError::new(e, "vkResetCommandPool"))?;
        }

        unsafe { self.record(image_index) }?;

        // Submit
        {
            let render_finished = self.swapchain.render_finished[image_index as usize];

            let submit = vk::SubmitInfo::default()
                .command_buffers(slice::from_ref(&self.command_buffer))
                .wait_dst_stage_mask(slice::from_ref(
                    &vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                ))
                .wait_semaphores(slice::from_ref(&self.image_available))
                .signal_semaphores(slice::from_ref(&render_finished));

            let queue = self.vulkan.queue().lock();
            unsafe {
                device
                    .queue_submit(*queue, slice::from_ref(&submit), self.in_flight_fence)
                    .map_err(|e| VkError::new(e, "vkQueueSubmit"))?;
            }
            drop(queue);
        }

        self.frame += 1;

        let source = FrameSource {
            extent: self.swapchain.extent,
            color: SourceImage::presentable(
                self.swapchain.images[image_index as usize],
                self.surface_format.format,
            )
            .with_transfer_source(self.swapchain.color_transfer_source),
            depth: Some(SourceImage::depth_attachment(
                self.swapchain.depth.image,
                self.depth_format,
            )),
            frame_event: Some(self.frame_sync.event()),
        };

        Ok(Some(RenderedFrame {
            image_index,
            source,
        }))
    }

    /// Presents a frame returned by [`Renderer::render`].
    pub unsafe fn present(&mut self, frame: RenderedFrame) -> Result<(), VkError> {
        let render_finished = self.swapchain.render_finished[frame.image_index as usize];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(slice::from_ref(&render_finished))
            .swapchains(slice::from_ref(&self.swapchain.swapchain))
            .image_indices(slice::from_ref(&frame.image_index));

        let queue = self.vulkan.queue().lock();
        let result = unsafe {
            self.surface
                .swapchain_device()
                .queue_present(*queue, &present_info)
        };
        drop(queue);

        let suboptimal = match result {
            Ok(suboptimal) => suboptimal,
            Err(e) => match e {
                vk::Result::ERROR_OUT_OF_DATE_KHR => true,

                e => return Err(VkError::new(e, "vkQueuePresentKHR")),
            },
        };

        if suboptimal {
            self.swapchain.needs_to_rebuild = true;
        }

        Ok(())
    }

    unsafe fn record(&self, image_index: u32) -> Result<(), VkError> {
        let device = self.vulkan.device();
        let command_buffer = self.command_buffer;
        let extent = self.swapchain.extent;

        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| VkError::new(e, "vkBeginCommandBuffer"))?;
        }

        // Begin render pass, clearing to the background and the far plane.
        {
            let far_depth = match self.far_plane {
                FarPlane::Standard => 1.0,
                FarPlane::Reversed => 0.0,
            };

            let clear_values = [
                vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: BACKGROUND,
                    },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: far_depth,
                        stencil: 0,
                    },
                },
            ];

            let begin_info = vk::RenderPassBeginInfo::default()
                .render_pass(self.render_pass)
                .framebuffer(self.swapchain.framebuffers[image_index as usize])
                .render_area(vk::Rect2D::default().extent(extent))
                .clear_values(&clear_values);

            unsafe {
                device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE)
            };
        }

        // Draw the square by clearing a region of both attachments.
        if let Some(rect) = square_rect(extent, self.frame) {
            let attachments = [
                vk::ClearAttachment {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    color_attachment: 0,
                    clear_value: vk::ClearValue {
                        color: vk::ClearColorValue { float32: SQUARE },
                    },
                },
                vk::ClearAttachment {
                    aspect_mask: vk::ImageAspectFlags::DEPTH,
                    color_attachment: vk::ATTACHMENT_UNUSED,
                    clear_value: vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue {
                            depth: SQUARE_DEPTH,
                            stencil: 0,
                        },
                    },
                },
            ];

            let clear_rect = vk::ClearRect {
                rect,
                base_array_layer: 0,
                layer_count: 1,
            };

            unsafe {
                device.cmd_clear_attachments(
                    command_buffer,
                    &attachments,
                    slice::from_ref(&clear_rect),
                )
            };
        }

        unsafe {
            device.cmd_end_render_pass(command_buffer);

            // Captures wait on this before reading the attachments.
            self.frame_sync.cmd_signal(command_buffer);

            device
                .end_command_buffer(command_buffer)
                .map_err(|e| VkError::new(e, "vkEndCommandBuffer"))?;
        }

        Ok(())
    }

    unsafe fn rebuild_swapchain(&mut self) -> Result<(), VkError> {
        unsafe { self.vulkan.device_wait_idle() };

        let swapchain = match unsafe {
            Swapchain::new(
                self.vulkan.as_ref(),
                &self.surface,
                self.render_pass,
                self.surface_format,
                self.depth_format,
                self.window_extent,
                Some(self.swapchain.swapchain),
            )
        } {
            Ok(swapchain) => swapchain,
            Err(super::CreationError::VkError(e)) => return Err(e),
            Err(e) => {
                // Keep the old swapchain, it is retried on the next frame.
                debug!("Could not rebuild the swapchain: {e}");
                return Ok(());
            }
        };

        unsafe { self.swapchain.destroy(self.vulkan.as_ref(), &self.surface) };
        self.swapchain = swapchain;

        Ok(())
    }
}

/// A square a quarter of the shorter side, sweeping left to right.
fn square_rect(extent: vk::Extent2D, frame: u64) -> Option<vk::Rect2D> {
    let size = extent.width.min(extent.height) / 4;
    if size == 0 {
        return None;
    }

    let travel = u64::from(extent.width - size).max(1);
    let x = (frame * 4 % travel) as i32;
    let y = ((extent.height - size) / 2) as i32;

    Some(vk::Rect2D {
        offset: vk::Offset2D { x, y },
        extent: vk::Extent2D {
            width: size,
            height: size,
        },
    })
}
