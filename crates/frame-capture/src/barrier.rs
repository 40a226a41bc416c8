use alloc::vec::Vec;

use ash::vk;

use crate::{StagingResource, format::barrier_aspect};

/// The layout, access and pipeline stage a resource is used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceState {
    /// The image layout, [`vk::ImageLayout::UNDEFINED`] for buffers.
    pub layout: vk::ImageLayout,

    /// The accesses made in this state.
    pub access: vk::AccessFlags,

    /// The stages the accesses are made in.
    pub stage: vk::PipelineStageFlags,
}

impl ResourceState {
    /// A swapchain image between frames.
    pub const PRESENTABLE: Self = Self {
        layout: vk::ImageLayout::PRESENT_SRC_KHR,
        access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    };

    /// A colour attachment of an offscreen renderer between frames.
    pub const COLOR_ATTACHMENT: Self = Self {
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        access: vk::AccessFlags::from_raw(
            vk::AccessFlags::COLOR_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw(),
        ),
        stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    };

    /// A depth-stencil attachment between frames. Depth writes complete in the late fragment tests,
    /// the next frame's depth testing starts in the early fragment tests.
    pub const DEPTH_ATTACHMENT: Self = Self {
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        access: vk::AccessFlags::from_raw(
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
        stage: vk::PipelineStageFlags::from_raw(
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS.as_raw()
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS.as_raw()
                | vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT.as_raw(),
        ),
    };

    /// A source being read by a transfer.
    pub const TRANSFER_SOURCE: Self = Self {
        layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        access: vk::AccessFlags::TRANSFER_READ,
        stage: vk::PipelineStageFlags::TRANSFER,
    };

    /// A staging image being written by a transfer.
    pub const TRANSFER_DESTINATION: Self = Self {
        layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        access: vk::AccessFlags::TRANSFER_WRITE,
        stage: vk::PipelineStageFlags::TRANSFER,
    };

    /// A freshly created staging resource, contents are discarded.
    pub const UNINITIALISED: Self = Self {
        layout: vk::ImageLayout::UNDEFINED,
        access: vk::AccessFlags::empty(),
        stage: vk::PipelineStageFlags::TOP_OF_PIPE,
    };

    /// A staging image the host can read through a mapping.
    pub const HOST_READABLE: Self = Self {
        layout: vk::ImageLayout::GENERAL,
        access: vk::AccessFlags::HOST_READ,
        stage: vk::PipelineStageFlags::HOST,
    };

    /// This state with the layout ignored, for buffers.
    pub const fn without_layout(self) -> Self {
        Self {
            layout: vk::ImageLayout::UNDEFINED,
            access: self.access,
            stage: self.stage,
        }
    }
}

/// The resource a transition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum TransitionResource {
    /// A whole image, all aspects of its only mip level and layer.
    Image {
        /// The Vulkan image.
        image: vk::Image,

        /// The aspects covered.
        aspect: vk::ImageAspectFlags,
    },

    /// A buffer range.
    Buffer {
        /// The Vulkan buffer.
        buffer: vk::Buffer,

        /// Size of the range from offset zero.
        size: u64,
    },
}

impl TransitionResource {
    /// A whole image of `format`.
    pub fn image(image: vk::Image, format: vk::Format) -> Self {
        Self::Image {
            image,
            aspect: barrier_aspect(format),
        }
    }

    /// The subresource range of an image transition.
    pub fn subresource_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::default()
            .aspect_mask(aspect)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1)
    }
}

/// A change of one resource from one state to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The resource.
    pub resource: TransitionResource,

    /// The state the resource is in before the barrier.
    pub before: ResourceState,

    /// The state the resource is in after the barrier.
    pub after: ResourceState,
}

impl Transition {
    /// The reverse transition.
    pub fn inverse(self) -> Self {
        Self {
            resource: self.resource,
            before: self.after,
            after: self.before,
        }
    }
}

/// A single pipeline barrier command, merging the transitions of every resource in one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierPhase {
    /// The transitions made by the barrier.
    pub transitions: Vec<Transition>,
}

impl BarrierPhase {
    /// Union of the stages every transition waits on.
    pub fn src_stage(&self) -> vk::PipelineStageFlags {
        self.transitions
            .iter()
            .fold(vk::PipelineStageFlags::empty(), |stages, transition| {
                stages | transition.before.stage
            })
    }

    /// Union of the stages every transition blocks.
    pub fn dst_stage(&self) -> vk::PipelineStageFlags {
        self.transitions
            .iter()
            .fold(vk::PipelineStageFlags::empty(), |stages, transition| {
                stages | transition.after.stage
            })
    }

    /// The transition for `resource` in this phase.
    pub fn transition_for(&self, resource: TransitionResource) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|transition| transition.resource == resource)
    }

    /// Records the phase as one `vkCmdPipelineBarrier`.
    pub unsafe fn cmd_record(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        let mut image_barriers = Vec::with_capacity(self.transitions.len());
        let mut buffer_barriers = Vec::with_capacity(self.transitions.len());

        for transition in &self.transitions {
            match transition.resource {
                TransitionResource::Image { image, aspect } => image_barriers.push(
                    vk::ImageMemoryBarrier::default()
                        .src_access_mask(transition.before.access)
                        .dst_access_mask(transition.after.access)
                        .old_layout(transition.before.layout)
                        .new_layout(transition.after.layout)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .image(image)
                        .subresource_range(TransitionResource::subresource_range(aspect)),
                ),

                TransitionResource::Buffer { buffer, size } => buffer_barriers.push(
                    vk::BufferMemoryBarrier::default()
                        .src_access_mask(transition.before.access)
                        .dst_access_mask(transition.after.access)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .buffer(buffer)
                        .offset(0)
                        .size(size),
                ),
            }
        }

        unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                self.src_stage(),
                self.dst_stage(),
                vk::DependencyFlags::empty(),
                &[],
                &buffer_barriers,
                &image_barriers,
            );
        }
    }
}

/// The barriers bracketing a capture's transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierPlan {
    /// Before the transfer: source to transfer-source, staging to transfer-destination.
    pub acquire: BarrierPhase,

    /// After the transfer: source back to its steady state, staging to host readable.
    pub release: BarrierPhase,
}

impl BarrierPlan {
    /// Plans the barriers for reading `source` in `source_state` into `staging`.
    ///
    /// The source always ends in `source_state`, the staging resource ends host readable.
    pub fn new(
        source: TransitionResource,
        source_state: ResourceState,
        staging: &StagingResource,
    ) -> Self {
        let source_acquire = Transition {
            resource: source,
            before: source_state,
            after: ResourceState::TRANSFER_SOURCE,
        };

        let (staging_acquire, staging_release) = match *staging {
            StagingResource::Image { image, .. } => {
                let resource = TransitionResource::Image {
                    image,
                    aspect: vk::ImageAspectFlags::COLOR,
                };

                (
                    Transition {
                        resource,
                        before: ResourceState::UNINITIALISED,
                        after: ResourceState::TRANSFER_DESTINATION,
                    },
                    Transition {
                        resource,
                        before: ResourceState::TRANSFER_DESTINATION,
                        after: ResourceState::HOST_READABLE,
                    },
                )
            }

            StagingResource::Buffer { buffer, size, .. } => {
                let resource = TransitionResource::Buffer { buffer, size };

                (
                    Transition {
                        resource,
                        before: ResourceState::UNINITIALISED,
                        after: ResourceState::TRANSFER_DESTINATION.without_layout(),
                    },
                    Transition {
                        resource,
                        before: ResourceState::TRANSFER_DESTINATION.without_layout(),
                        after: ResourceState::HOST_READABLE.without_layout(),
                    },
                )
            }
        };

        Self {
            acquire: BarrierPhase {
                transitions: vec![source_acquire, staging_acquire],
            },
            release: BarrierPhase {
                transitions: vec![source_acquire.inverse(), staging_release],
            },
        }
    }
}
