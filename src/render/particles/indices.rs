//! 四边形索引生成
//!
//! 第 `i` 个四边形由两个三角形组成：`(4i, 4i+1, 4i+2)` 与 `(4i, 4i+2, 4i+3)`，
//! 沿对角线切分，与精灵顶点的绕序一致。
//!
//! 当 `count × 4 ≤ 65535` 时输出 16 位索引，否则输出 32 位索引。

use bytemuck::Pod;

/// 16 位索引可寻址的最大顶点数
pub const MAX_U16_VERTICES: usize = 65535;

/// 每个四边形的顶点数
pub const VERTICES_PER_QUAD: usize = 4;

/// 每个四边形的索引数
pub const INDICES_PER_QUAD: usize = 6;

/// 索引元素类型（`u16` 或 `u32`）
pub trait QuadIndex: Pod {
    /// 可寻址的最大顶点序号
    const MAX_VERTEX: usize;

    /// 从顶点序号转换
    fn from_vertex(vertex: usize) -> Self;
}

impl QuadIndex for u16 {
    const MAX_VERTEX: usize = u16::MAX as usize;

    #[inline]
    fn from_vertex(vertex: usize) -> Self {
        vertex as u16
    }
}

impl QuadIndex for u32 {
    const MAX_VERTEX: usize = u32::MAX as usize;

    #[inline]
    fn from_vertex(vertex: usize) -> Self {
        vertex as u32
    }
}

/// 四边形索引缓冲区
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuadIndices {
    /// 16 位索引
    U16(Vec<u16>),
    /// 32 位索引
    U32(Vec<u32>),
}

impl QuadIndices {
    /// 索引数量
    pub fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 可容纳的四边形数量
    pub fn quad_count(&self) -> usize {
        self.len() / INDICES_PER_QUAD
    }

    /// 第 `i` 个索引（统一为 `u32`）
    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            Self::U16(indices) => indices.get(i).map(|&v| v as u32),
            Self::U32(indices) => indices.get(i).copied(),
        }
    }

    /// 对应的 wgpu 索引格式
    pub fn format(&self) -> wgpu::IndexFormat {
        match self {
            Self::U16(_) => wgpu::IndexFormat::Uint16,
            Self::U32(_) => wgpu::IndexFormat::Uint32,
        }
    }

    /// 原始字节
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(indices) => bytemuck::cast_slice(indices),
            Self::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

/// `count` 个四边形能否使用 16 位索引
pub fn fits_u16(count: usize) -> bool {
    count
        .checked_mul(VERTICES_PER_QUAD)
        .map_or(false, |vertices| vertices <= MAX_U16_VERTICES)
}

/// 生成 `count` 个四边形的索引
pub fn create_indices_for_quads(count: usize) -> QuadIndices {
    let total = count * INDICES_PER_QUAD;

    if fits_u16(count) {
        let mut indices = vec![0u16; total];
        fill_quad_indices(&mut indices, count);
        QuadIndices::U16(indices)
    } else {
        let mut indices = vec![0u32; total];
        fill_quad_indices(&mut indices, count);
        QuadIndices::U32(indices)
    }
}

/// 写入预分配的索引缓冲区
///
/// # Panics
///
/// `out` 的元素宽度或长度与 `count` 不符时 panic。这属于调用方错误。
pub fn write_indices_for_quads(count: usize, out: &mut QuadIndices) {
    match out {
        QuadIndices::U16(indices) => {
            assert!(
                fits_u16(count),
                "{} quads cannot be addressed with 16-bit indices",
                count
            );
            fill_quad_indices(indices, count);
        }
        QuadIndices::U32(indices) => {
            assert!(
                !fits_u16(count),
                "{} quads must use 16-bit indices",
                count
            );
            fill_quad_indices(indices, count);
        }
    }
}

/// 向切片写入 `count` 个四边形的索引
///
/// # Panics
///
/// `out.len() != count * 6`，或 `T` 无法表示最大顶点序号时 panic。
pub fn fill_quad_indices<T: QuadIndex>(out: &mut [T], count: usize) {
    assert_eq!(
        out.len(),
        count * INDICES_PER_QUAD,
        "index buffer length {} does not match {} quads",
        out.len(),
        count
    );
    assert!(
        count == 0 || count * VERTICES_PER_QUAD - 1 <= T::MAX_VERTEX,
        "{} quads exceed the index element range",
        count
    );

    for (quad, chunk) in out.chunks_exact_mut(INDICES_PER_QUAD).enumerate() {
        let base = quad * VERTICES_PER_QUAD;
        chunk[0] = T::from_vertex(base);
        chunk[1] = T::from_vertex(base + 1);
        chunk[2] = T::from_vertex(base + 2);
        chunk[3] = T::from_vertex(base);
        chunk[4] = T::from_vertex(base + 2);
        chunk[5] = T::from_vertex(base + 3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_quad() {
        let indices = create_indices_for_quads(1);
        assert_eq!(indices, QuadIndices::U16(vec![0, 1, 2, 0, 2, 3]));
    }

    #[test]
    fn test_zero_quads() {
        let indices = create_indices_for_quads(0);
        assert!(indices.is_empty());
        assert_eq!(indices.format(), wgpu::IndexFormat::Uint16);
    }

    #[test]
    fn test_width_boundary() {
        // 16383 * 4 = 65532 <= 65535
        let below = create_indices_for_quads(16383);
        assert!(matches!(below, QuadIndices::U16(_)));

        // 16384 * 4 = 65536 > 65535
        let above = create_indices_for_quads(16384);
        assert!(matches!(above, QuadIndices::U32(_)));
        assert_eq!(above.get(16383 * 6 + 5), Some(16383 * 4 + 3));
    }

    #[test]
    fn test_as_bytes_length() {
        let indices = create_indices_for_quads(3);
        assert_eq!(indices.as_bytes().len(), 3 * 6 * 2);
    }

    #[test]
    fn test_write_into_preallocated() {
        let mut out = QuadIndices::U16(vec![0; 12]);
        write_indices_for_quads(2, &mut out);
        assert_eq!(out, QuadIndices::U16(vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]));
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_length_mismatch_panics() {
        let mut out = vec![0u16; 7];
        fill_quad_indices(&mut out, 1);
    }

    #[test]
    #[should_panic(expected = "exceed the index element range")]
    fn test_u16_slice_too_many_quads_panics() {
        let mut out = vec![0u16; 20_000 * INDICES_PER_QUAD];
        fill_quad_indices(&mut out, 20_000);
    }

    #[test]
    fn test_u16_slice_at_element_limit() {
        let count = (u16::MAX as usize + 1) / VERTICES_PER_QUAD;
        let mut out = vec![0u16; count * INDICES_PER_QUAD];
        fill_quad_indices(&mut out, count);
        assert_eq!(out[out.len() - 1], u16::MAX);
    }

    #[test]
    #[should_panic(expected = "must use 16-bit")]
    fn test_width_mismatch_panics() {
        let mut out = QuadIndices::U32(vec![0; 6]);
        write_indices_for_quads(1, &mut out);
    }

    proptest! {
        #[test]
        fn test_index_blocks(count in 0usize..20_000) {
            let indices = create_indices_for_quads(count);
            prop_assert_eq!(indices.len(), count * 6);
            prop_assert_eq!(
                matches!(indices, QuadIndices::U16(_)),
                count * 4 <= MAX_U16_VERTICES
            );

            for i in 0..count {
                let base = (i * 4) as u32;
                let expected = [base, base + 1, base + 2, base, base + 2, base + 3];
                for (k, value) in expected.iter().enumerate() {
                    prop_assert_eq!(indices.get(i * 6 + k), Some(*value));
                }
            }
        }
    }
}
