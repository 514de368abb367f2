use crate::error::{allocation_error, Result};

/// Allocates a `Vec<f32>` of `len` elements, all initialized to zero, without
/// aborting the process when the allocator refuses the request.
///
/// Used for matrix storage and for the packing scratch buffers of the blocked
/// multiplier, so that an oversized benchmark configuration surfaces as an
/// [`AllocationError`](crate::error::MatbenchError::AllocationError) instead of
/// an abort.
///
/// # Arguments
///
/// * `len` - The number of `f32` elements the vector should hold.
///
/// # Errors
///
/// * If `len * size_of::<f32>()` overflows `usize`.
/// * If the global allocator cannot provide the buffer.
pub fn try_alloc_zeroed_f32_vec(len: usize) -> Result<Vec<f32>> {
    let size_bytes = len
        .checked_mul(std::mem::size_of::<f32>())
        .ok_or_else(|| allocation_error(usize::MAX, format!("size of {len} f32 overflows")))?;

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| allocation_error(size_bytes, e.to_string()))?;

    // Capacity is already reserved, so this never reallocates.
    buffer.resize(len, 0.0f32);

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatbenchError;

    #[test]
    fn test_alloc_zeroed() {
        let v = try_alloc_zeroed_f32_vec(37).unwrap();
        assert_eq!(v.len(), 37);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_alloc_empty() {
        let v = try_alloc_zeroed_f32_vec(0).unwrap();
        assert!(v.is_empty());
    }

    #[test]
    fn test_alloc_overflow_is_reported() {
        let err = try_alloc_zeroed_f32_vec(usize::MAX).unwrap_err();
        assert!(matches!(err, MatbenchError::AllocationError { .. }));
    }

    #[test]
    fn test_alloc_too_large_is_reported() {
        // Fits in usize after the multiply but no allocator can satisfy it.
        let err = try_alloc_zeroed_f32_vec(usize::MAX / 8).unwrap_err();
        assert!(matches!(err, MatbenchError::AllocationError { .. }));
    }
}
