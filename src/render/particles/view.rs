//! 可按 `f32` / `u32` 两种视图写入的顶点数据区
//!
//! 每个槽位为 32 位字，浮点属性按位写入，颜色等整数属性直接写入。

/// 顶点数据区
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewableBuffer {
    words: Vec<u32>,
}

impl ViewableBuffer {
    /// 创建 `word_len` 个字的零初始化数据区
    pub fn new(word_len: usize) -> Self {
        Self {
            words: vec![0; word_len],
        }
    }

    /// 字数
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// 字节长度
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.words.len() * std::mem::size_of::<u32>()
    }

    /// 写入浮点值
    #[inline]
    pub fn set_f32(&mut self, offset: usize, value: f32) {
        self.words[offset] = value.to_bits();
    }

    /// 写入整数值
    #[inline]
    pub fn set_u32(&mut self, offset: usize, value: u32) {
        self.words[offset] = value;
    }

    /// 按浮点读取
    #[inline]
    pub fn f32_at(&self, offset: usize) -> f32 {
        f32::from_bits(self.words[offset])
    }

    /// 按整数读取
    #[inline]
    pub fn u32_at(&self, offset: usize) -> u32 {
        self.words[offset]
    }

    /// 原始字
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// 原始字节
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_share_storage() {
        let mut view = ViewableBuffer::new(2);
        view.set_f32(0, 1.5);
        view.set_u32(1, 0xff00_00ff);

        assert_eq!(view.f32_at(0), 1.5);
        assert_eq!(view.u32_at(0), 1.5f32.to_bits());
        assert_eq!(view.u32_at(1), 0xff00_00ff);
        assert_eq!(view.byte_len(), 8);
        assert_eq!(&view.as_bytes()[4..8], &0xff00_00ffu32.to_ne_bytes());
    }
}
