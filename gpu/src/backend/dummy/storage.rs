//! Host memory backing dummy resources.

use std::ptr::NonNull;

use crate::types::{Color, TextureFormat};

/// A fixed-size, zero-initialised heap allocation handed out through raw
/// pointers.
///
/// Transfer buffers are mapped by the application and read or written by the
/// queue worker, never at the same time. Access goes through raw pointers so
/// neither side holds a Rust reference to the other's view.
#[derive(Debug)]
pub(crate) struct HostMemory {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: HostMemory owns its allocation. Concurrent access is serialised by
// the backend: a mapped backing is never referenced by a queued submission,
// and a backing referenced by a queued submission is never mapped.
unsafe impl Send for HostMemory {}
unsafe impl Sync for HostMemory {}

impl HostMemory {
    pub fn zeroed(len: usize) -> Self {
        let boxed: Box<[u8]> = vec![0u8; len].into_boxed_slice();
        let raw = Box::into_raw(boxed) as *mut u8;
        // SAFETY: Box::into_raw never returns null.
        let ptr = unsafe { NonNull::new_unchecked(raw) };
        Self { ptr, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Copy `dst.len()` bytes starting at `offset` out of the allocation.
    ///
    /// # Safety
    ///
    /// No mapping of this memory may be alive.
    pub unsafe fn read(&self, offset: usize, dst: &mut [u8]) {
        debug_assert!(offset + dst.len() <= self.len);
        // SAFETY: bounds are checked by the caller, the regions do not overlap
        // and no mapping aliases the source.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset), dst.as_mut_ptr(), dst.len());
        }
    }

    /// Copy `src` into the allocation starting at `offset`.
    ///
    /// # Safety
    ///
    /// No mapping of this memory may be alive.
    pub unsafe fn write(&self, offset: usize, src: &[u8]) {
        debug_assert!(offset + src.len() <= self.len);
        // SAFETY: as for `read`.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.as_ptr().add(offset), src.len());
        }
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        let slice = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
        // SAFETY: the pointer came from Box::into_raw of a boxed slice of `len`.
        drop(unsafe { Box::from_raw(slice) });
    }
}

/// Contents of every subresource of a texture, indexed
/// `layer * num_levels + level`.
#[derive(Debug, Clone)]
pub(crate) struct TextureStorage {
    subresources: Vec<Vec<u8>>,
    num_levels: u32,
}

impl TextureStorage {
    /// Zeroed storage for each (layer, level) pair with the given level sizes.
    pub fn new(layers: u32, level_sizes: &[u64]) -> Self {
        let mut subresources = Vec::with_capacity(layers as usize * level_sizes.len());
        for _ in 0..layers {
            for &size in level_sizes {
                subresources.push(vec![0u8; size as usize]);
            }
        }
        Self {
            subresources,
            num_levels: level_sizes.len() as u32,
        }
    }

    pub fn get(&self, level: u32, layer: u32) -> Option<&[u8]> {
        if level >= self.num_levels {
            return None;
        }
        self.subresources
            .get((layer * self.num_levels + level) as usize)
            .map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, level: u32, layer: u32) -> Option<&mut Vec<u8>> {
        if level >= self.num_levels {
            return None;
        }
        self.subresources
            .get_mut((layer * self.num_levels + level) as usize)
    }

    pub fn total_size(&self) -> u64 {
        self.subresources.iter().map(|s| s.len() as u64).sum()
    }
}

/// Encode a clear color as one texel of `format`.
///
/// Formats without an encoding here clear to zero.
pub(crate) fn encode_color(format: TextureFormat, color: Color) -> Vec<u8> {
    let unorm8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let unorm16 = |v: f32| ((v.clamp(0.0, 1.0) * 65535.0).round() as u16).to_ne_bytes();
    match format {
        TextureFormat::R8Unorm => vec![unorm8(color.r)],
        TextureFormat::Rg8Unorm => vec![unorm8(color.r), unorm8(color.g)],
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => vec![
            unorm8(color.r),
            unorm8(color.g),
            unorm8(color.b),
            unorm8(color.a),
        ],
        TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb => vec![
            unorm8(color.b),
            unorm8(color.g),
            unorm8(color.r),
            unorm8(color.a),
        ],
        TextureFormat::R16Unorm => unorm16(color.r).to_vec(),
        TextureFormat::R32Float => color.r.to_ne_bytes().to_vec(),
        TextureFormat::R32Uint => (color.r.max(0.0) as u32).to_ne_bytes().to_vec(),
        TextureFormat::Rg32Float => [color.r, color.g]
            .iter()
            .flat_map(|c| c.to_ne_bytes())
            .collect(),
        TextureFormat::Rgba32Float => color
            .to_array()
            .iter()
            .flat_map(|c| c.to_ne_bytes())
            .collect(),
        other => vec![0u8; other.block_size() as usize],
    }
}

/// Encode a depth/stencil clear value as one texel of `format`.
pub(crate) fn encode_depth(format: TextureFormat, depth: f32, stencil: u8) -> Vec<u8> {
    let depth = depth.clamp(0.0, 1.0);
    match format {
        TextureFormat::Depth16Unorm => ((depth * 65535.0).round() as u16).to_ne_bytes().to_vec(),
        TextureFormat::Depth24Unorm => {
            ((depth * 16_777_215.0).round() as u32).to_ne_bytes().to_vec()
        }
        TextureFormat::Depth24UnormStencil8 => {
            let packed = ((depth * 16_777_215.0).round() as u32) | ((stencil as u32) << 24);
            packed.to_ne_bytes().to_vec()
        }
        TextureFormat::Depth32Float => depth.to_ne_bytes().to_vec(),
        TextureFormat::Depth32FloatStencil8 => {
            let mut texel = depth.to_ne_bytes().to_vec();
            texel.extend_from_slice(&[stencil, 0, 0, 0]);
            texel
        }
        other => vec![0u8; other.block_size() as usize],
    }
}

/// Fill `data` with copies of `texel`.
pub(crate) fn fill_texels(data: &mut [u8], texel: &[u8]) {
    if texel.is_empty() {
        return;
    }
    for chunk in data.chunks_exact_mut(texel.len()) {
        chunk.copy_from_slice(texel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_memory_read_write() {
        let memory = HostMemory::zeroed(16);
        unsafe { memory.write(4, &[1, 2, 3]) };
        let mut out = [0u8; 5];
        unsafe { memory.read(3, &mut out) };
        assert_eq!(out, [0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_texture_storage_indexing() {
        let mut storage = TextureStorage::new(2, &[16, 4]);
        assert_eq!(storage.total_size(), 40);
        if let Some(level) = storage.get_mut(1, 1) {
            level[0] = 9;
        }
        assert_eq!(storage.get(1, 1).map(|l| l[0]), Some(9));
        assert_eq!(storage.get(1, 0).map(|l| l[0]), Some(0));
        assert!(storage.get(2, 0).is_none());
    }

    #[test]
    fn test_encode_color() {
        let red = Color::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(encode_color(TextureFormat::Rgba8Unorm, red), vec![255, 0, 0, 255]);
        assert_eq!(encode_color(TextureFormat::Bgra8Unorm, red), vec![0, 0, 255, 255]);
        assert_eq!(encode_color(TextureFormat::Rgba16Float, red).len(), 8);
    }

    #[test]
    fn test_encode_depth() {
        assert_eq!(encode_depth(TextureFormat::Depth32Float, 1.0, 0), 1.0f32.to_ne_bytes().to_vec());
        assert_eq!(encode_depth(TextureFormat::Depth16Unorm, 1.0, 0), vec![255, 255]);
    }

    #[test]
    fn test_fill_texels() {
        let mut data = [0u8; 8];
        fill_texels(&mut data, &[1, 2]);
        assert_eq!(data, [1, 2, 1, 2, 1, 2, 1, 2]);
    }
}
