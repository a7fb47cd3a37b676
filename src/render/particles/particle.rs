//! 粒子与纹理
//!
//! 粒子是纯数据记录，由容器持有；纹理是外部管理的共享资源，
//! 粒子只通过 `Arc` 引用。

use glam::Vec2;
use std::fmt;
use std::sync::Arc;

/// 矩形
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// 纹理四角 UV
///
/// 顺序为左上、右上、右下、左下。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureUvs {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub x3: f32,
    pub y3: f32,
}

impl Default for TextureUvs {
    fn default() -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            x1: 1.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
            x3: 0.0,
            y3: 1.0,
        }
    }
}

impl TextureUvs {
    /// 根据源图尺寸中的帧矩形计算 UV
    pub fn from_frame(frame: Rectangle, source_width: f32, source_height: f32) -> Self {
        let left = frame.x / source_width;
        let top = frame.y / source_height;
        let right = (frame.x + frame.width) / source_width;
        let bottom = (frame.y + frame.height) / source_height;

        Self {
            x0: left,
            y0: top,
            x1: right,
            y1: top,
            x2: right,
            y2: bottom,
            x3: left,
            y3: bottom,
        }
    }
}

/// 粒子使用的纹理接口
///
/// `orig` 为未裁剪的原始矩形；尚未就绪的纹理返回 `None`，
/// 打包顶点属性时会报错。`trim` 为裁剪后的矩形（未裁剪时为 `None`）。
pub trait ParticleTexture: fmt::Debug + Send + Sync {
    fn orig(&self) -> Option<Rectangle>;

    fn trim(&self) -> Option<Rectangle>;

    fn uvs(&self) -> TextureUvs;
}

/// 图集中的一帧
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    orig: Rectangle,
    trim: Option<Rectangle>,
    uvs: TextureUvs,
}

impl Texture {
    pub fn new(orig: Rectangle, trim: Option<Rectangle>, uvs: TextureUvs) -> Self {
        Self { orig, trim, uvs }
    }

    /// 覆盖整张源图的纹理
    pub fn whole(width: f32, height: f32) -> Self {
        Self::new(
            Rectangle::new(0.0, 0.0, width, height),
            None,
            TextureUvs::default(),
        )
    }

    /// 从源图中的帧矩形创建
    pub fn from_frame(frame: Rectangle, source_width: f32, source_height: f32) -> Self {
        Self::new(
            Rectangle::new(0.0, 0.0, frame.width, frame.height),
            None,
            TextureUvs::from_frame(frame, source_width, source_height),
        )
    }

    /// 设置裁剪矩形（相对原始矩形）
    pub fn with_trim(mut self, trim: Rectangle) -> Self {
        self.trim = Some(trim);
        self
    }

    /// 设置原始（未裁剪）矩形
    pub fn with_orig(mut self, orig: Rectangle) -> Self {
        self.orig = orig;
        self
    }
}

impl ParticleTexture for Texture {
    fn orig(&self) -> Option<Rectangle> {
        Some(self.orig)
    }

    fn trim(&self) -> Option<Rectangle> {
        self.trim
    }

    fn uvs(&self) -> TextureUvs {
        self.uvs
    }
}

/// 默认打包颜色（白色，不透明）
pub const DEFAULT_COLOR: u32 = 0xFFFF_FFFF;

/// 粒子
///
/// `color` 为打包后的 32 位颜色（小端字节序为 R, G, B, A）。
/// `tint()` 与 `alpha()` 直接从 `color` 读取，直接写入 `color` 与调用 setter 等价。
#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub anchor_x: f32,
    pub anchor_y: f32,
    /// 弧度
    pub rotation: f32,
    pub color: u32,
    pub texture: Arc<dyn ParticleTexture>,
}

impl Particle {
    /// 使用默认属性创建粒子
    pub fn new(texture: Arc<dyn ParticleTexture>) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            anchor_x: 0.0,
            anchor_y: 0.0,
            rotation: 0.0,
            color: DEFAULT_COLOR,
            texture,
        }
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    pub fn with_anchor(mut self, anchor_x: f32, anchor_y: f32) -> Self {
        self.anchor_x = anchor_x;
        self.anchor_y = anchor_y;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_tint(mut self, rgb: u32) -> Self {
        self.set_tint(rgb);
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.set_alpha(alpha);
        self
    }

    /// 位置
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.x = position.x;
        self.y = position.y;
    }

    /// 透明度（0-1）
    pub fn alpha(&self) -> f32 {
        (self.color >> 24) as f32 / 255.0
    }

    /// 设置透明度，保留当前着色
    pub fn set_alpha(&mut self, alpha: f32) {
        let alpha = (alpha.clamp(0.0, 1.0) * 255.0) as u32;
        self.color = (self.color & 0x00FF_FFFF) | (alpha << 24);
    }

    /// 着色（0xRRGGBB）
    pub fn tint(&self) -> u32 {
        let r = self.color & 0xFF;
        let g = (self.color >> 8) & 0xFF;
        let b = (self.color >> 16) & 0xFF;
        (r << 16) | (g << 8) | b
    }

    /// 设置着色，保留当前透明度
    pub fn set_tint(&mut self, rgb: u32) {
        let r = (rgb >> 16) & 0xFF;
        let g = (rgb >> 8) & 0xFF;
        let b = rgb & 0xFF;
        self.color = (self.color & 0xFF00_0000) | (b << 16) | (g << 8) | r;
    }
}
