//! Row and pixel dispatch over RGBA buffers.
//!
//! With the `parallel` feature the closures run on the rayon pool; without it
//! they run sequentially in row order. Callers must not depend on ordering.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Bytes per RGBA8 pixel.
pub(crate) const CHANNELS: usize = 4;

/// Apply `f(row_index, row_bytes)` to every row of a packed RGBA buffer.
pub(crate) fn for_each_row_mut<F>(data: &mut [u8], width: u32, f: F)
where
    F: Fn(usize, &mut [u8]) + Sync + Send,
{
    let row_len = width as usize * CHANNELS;
    if row_len == 0 {
        return;
    }

    #[cfg(feature = "parallel")]
    {
        data.par_chunks_exact_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(y, row));
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (y, row) in data.chunks_exact_mut(row_len).enumerate() {
            f(y, row);
        }
    }
}

/// Apply `f(pixel)` to every RGBA pixel of a packed buffer.
pub(crate) fn for_each_pixel_mut<F>(data: &mut [u8], f: F)
where
    F: Fn(&mut [u8]) + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        data.par_chunks_exact_mut(CHANNELS).for_each(&f);
    }

    #[cfg(not(feature = "parallel"))]
    {
        for px in data.chunks_exact_mut(CHANNELS) {
            f(px);
        }
    }
}
