//! Growable GPU vertex buffers.
//!
//! Point sets and color buffers are re-uploaded whenever a load or a toggle
//! changes them. Writes reuse the existing allocation while it is large
//! enough and otherwise grow by 2x.

use std::marker::PhantomData;

use wgpu::util::DeviceExt;

const MIN_CAPACITY_BYTES: usize = 64;

/// A typed GPU buffer that grows on demand and never shrinks.
pub struct DynamicBuffer<T> {
    buffer: wgpu::Buffer,
    capacity: usize, // bytes
    count: usize,    // items
    usage: wgpu::BufferUsages,
    label: String,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> DynamicBuffer<T> {
    /// Buffer initialized from `data`.
    pub fn new_with_data(
        device: &wgpu::Device,
        label: &str,
        data: &[T],
        usage: wgpu::BufferUsages,
    ) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = if bytes.len() >= MIN_CAPACITY_BYTES {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes,
                usage: usage | wgpu::BufferUsages::COPY_DST,
            })
        } else {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: MIN_CAPACITY_BYTES as u64,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: true,
            });
            buffer.slice(..).get_mapped_range_mut()[..bytes.len()]
                .copy_from_slice(bytes);
            buffer.unmap();
            buffer
        };

        Self {
            buffer,
            capacity: bytes.len().max(MIN_CAPACITY_BYTES),
            count: data.len(),
            usage,
            label: label.to_owned(),
            _marker: PhantomData,
        }
    }

    /// Replace the contents with `data`, growing if necessary.
    ///
    /// Returns `true` if the buffer was reallocated.
    pub fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[T],
    ) -> bool {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let reallocated = bytes.len() > self.capacity;
        if reallocated {
            let capacity = (bytes.len() * 2).max(self.capacity + 1024);
            self.buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size: capacity as u64,
                usage: self.usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.capacity = capacity;
        }
        if !bytes.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
        self.count = data.len();
        reallocated
    }

    /// Slice covering the written items only.
    #[must_use]
    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.buffer
            .slice(..(self.count * size_of::<T>()) as u64)
    }

    /// Number of items written.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether no items are written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
